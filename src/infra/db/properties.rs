use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, PropertyCursor};
use crate::application::repos::{
    CreatePropertyParams, PropertiesRepo, PropertiesWriteRepo, PropertyQueryFilter, PropertyStats,
    RepoError, UpdatePropertyParams,
};
use crate::domain::entities::PropertyRecord;
use crate::domain::types::{PropertyKind, PropertyStatus};

use super::{PostgresRepositories, map_sqlx_error};

const PROPERTY_COLUMNS: &str = "id, title, description, kind, status, price, currency, area_m2, \
     bedrooms, bathrooms, city, region, quarter, address, owner_id, is_featured, is_verified, \
     views_count, favorites_count, published_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: Uuid,
    title: String,
    description: String,
    kind: PropertyKind,
    status: PropertyStatus,
    price: i64,
    currency: String,
    area_m2: f64,
    bedrooms: i32,
    bathrooms: i32,
    city: String,
    region: String,
    quarter: Option<String>,
    address: String,
    owner_id: Uuid,
    is_featured: bool,
    is_verified: bool,
    views_count: i32,
    favorites_count: i32,
    published_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PropertyRow> for PropertyRecord {
    fn from(row: PropertyRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            kind: row.kind,
            status: row.status,
            price: row.price,
            currency: row.currency,
            area_m2: row.area_m2,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            city: row.city,
            region: row.region,
            quarter: row.quarter,
            address: row.address,
            owner_id: row.owner_id,
            is_featured: row.is_featured,
            is_verified: row.is_verified,
            views_count: row.views_count,
            favorites_count: row.favorites_count,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn apply_filter<'q>(qb: &mut QueryBuilder<'q, sqlx::Postgres>, filter: &'q PropertyQueryFilter) {
    match filter.status {
        Some(status) => {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        // Sold and rented listings stay out of public lists by default.
        None => {
            qb.push(" AND status IN ('for_sale', 'for_rent') ");
        }
    }

    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ");
        qb.push_bind(kind);
    }

    if let Some(featured) = filter.featured {
        qb.push(" AND is_featured = ");
        qb.push_bind(featured);
    }

    if let Some(verified) = filter.verified {
        qb.push(" AND is_verified = ");
        qb.push_bind(verified);
    }

    if let Some(city) = filter.city.as_ref() {
        qb.push(" AND city ILIKE ");
        qb.push_bind(format!("%{}%", city));
    }

    if let Some(region) = filter.region.as_ref() {
        qb.push(" AND region = ");
        qb.push_bind(region);
    }

    if let Some(min_price) = filter.min_price {
        qb.push(" AND price >= ");
        qb.push_bind(min_price);
    }

    if let Some(max_price) = filter.max_price {
        qb.push(" AND price <= ");
        qb.push_bind(max_price);
    }

    if let Some(min_area) = filter.min_area {
        qb.push(" AND area_m2 >= ");
        qb.push_bind(min_area);
    }

    if let Some(max_area) = filter.max_area {
        qb.push(" AND area_m2 <= ");
        qb.push_bind(max_area);
    }

    if let Some(min_bedrooms) = filter.min_bedrooms {
        qb.push(" AND bedrooms >= ");
        qb.push_bind(min_bedrooms);
    }

    if let Some(max_bedrooms) = filter.max_bedrooms {
        qb.push(" AND bedrooms <= ");
        qb.push_bind(max_bedrooms);
    }

    if let Some(min_bathrooms) = filter.min_bathrooms {
        qb.push(" AND bathrooms >= ");
        qb.push_bind(min_bathrooms);
    }

    if let Some(max_bathrooms) = filter.max_bathrooms {
        qb.push(" AND bathrooms <= ");
        qb.push_bind(max_bathrooms);
    }

    if let Some(search) = filter.search.as_ref() {
        qb.push(" AND (title ILIKE ");
        qb.push_bind(format!("%{}%", search));
        qb.push(" OR description ILIKE ");
        qb.push_bind(format!("%{}%", search));
        qb.push(" OR city ILIKE ");
        qb.push_bind(format!("%{}%", search));
        qb.push(")");
    }
}

#[async_trait]
impl PropertiesRepo for PostgresRepositories {
    async fn list_properties(
        &self,
        filter: &PropertyQueryFilter,
        page: PageRequest<PropertyCursor>,
    ) -> Result<CursorPage<PropertyRecord>, RepoError> {
        let limit = page.limit.clamp(1, 100) as i64;
        let mut qb = QueryBuilder::new(format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE 1=1 "
        ));

        apply_filter(&mut qb, filter);

        if let Some(cursor) = page.cursor {
            qb.push(" AND (created_at, id) < (");
            qb.push_bind(cursor.created_at());
            qb.push(", ");
            qb.push_bind(cursor.id());
            qb.push(")");
        }

        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(limit + 1);

        let mut rows = qb
            .build_query_as::<PropertyRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let next_cursor = if (rows.len() as i64) > limit {
            let overflow = rows.pop().expect("overflow row exists when len > limit");
            Some(PropertyCursor::new(overflow.created_at, overflow.id).encode())
        } else {
            None
        };

        let records = rows.into_iter().map(PropertyRecord::from).collect();
        Ok(CursorPage::new(records, next_cursor))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PropertyRecord>, RepoError> {
        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PropertyRecord::from))
    }

    async fn retrieve_incrementing_views(
        &self,
        id: Uuid,
    ) -> Result<Option<PropertyRecord>, RepoError> {
        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            r#"
            UPDATE properties
               SET views_count = views_count + 1
             WHERE id = $1
            RETURNING {PROPERTY_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PropertyRecord::from))
    }

    async fn list_featured(&self, limit: u32) -> Result<Vec<PropertyRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PropertyRow>(&format!(
            r#"
            SELECT {PROPERTY_COLUMNS} FROM properties
             WHERE is_featured = TRUE AND status IN ('for_sale', 'for_rent')
             ORDER BY created_at DESC, id DESC
             LIMIT $1
            "#
        ))
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PropertyRecord::from).collect())
    }

    async fn stats(&self) -> Result<PropertyStats, RepoError> {
        #[derive(sqlx::FromRow)]
        struct StatsRow {
            total_properties: i64,
            for_sale: i64,
            for_rent: i64,
            featured_properties: i64,
            verified_properties: i64,
            total_views: i64,
            avg_price_for_sale: f64,
            avg_price_for_rent: f64,
        }

        let row: StatsRow = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT COUNT(*) AS total_properties,
                   COUNT(*) FILTER (WHERE status = 'for_sale') AS for_sale,
                   COUNT(*) FILTER (WHERE status = 'for_rent') AS for_rent,
                   COUNT(*) FILTER (WHERE is_featured) AS featured_properties,
                   COUNT(*) FILTER (WHERE is_verified) AS verified_properties,
                   COALESCE(SUM(views_count), 0)::int8 AS total_views,
                   COALESCE(AVG(price) FILTER (WHERE status = 'for_sale'), 0)::float8 AS avg_price_for_sale,
                   COALESCE(AVG(price) FILTER (WHERE status = 'for_rent'), 0)::float8 AS avg_price_for_rent
              FROM properties
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PropertyStats {
            total_properties: row.total_properties as u64,
            for_sale: row.for_sale as u64,
            for_rent: row.for_rent as u64,
            featured_properties: row.featured_properties as u64,
            verified_properties: row.verified_properties as u64,
            total_views: row.total_views,
            avg_price_for_sale: row.avg_price_for_sale,
            avg_price_for_rent: row.avg_price_for_rent,
        })
    }
}

#[async_trait]
impl PropertiesWriteRepo for PostgresRepositories {
    async fn create_property(
        &self,
        params: CreatePropertyParams,
    ) -> Result<PropertyRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            r#"
            INSERT INTO properties (
                id, title, description, kind, status, price, currency, area_m2,
                bedrooms, bathrooms, city, region, quarter, address, owner_id,
                is_featured, published_at, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8,
                $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $18
            )
            RETURNING {PROPERTY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(params.title)
        .bind(params.description)
        .bind(params.kind)
        .bind(params.status)
        .bind(params.price)
        .bind(params.currency)
        .bind(params.area_m2)
        .bind(params.bedrooms)
        .bind(params.bathrooms)
        .bind(params.city)
        .bind(params.region)
        .bind(params.quarter)
        .bind(params.address)
        .bind(params.owner_id)
        .bind(params.is_featured)
        .bind(params.published_at)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PropertyRecord::from(row))
    }

    async fn update_property(
        &self,
        params: UpdatePropertyParams,
    ) -> Result<PropertyRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            r#"
            UPDATE properties
               SET title = $2,
                   description = $3,
                   kind = $4,
                   status = $5,
                   price = $6,
                   currency = $7,
                   area_m2 = $8,
                   bedrooms = $9,
                   bathrooms = $10,
                   city = $11,
                   region = $12,
                   quarter = $13,
                   address = $14,
                   is_featured = $15,
                   published_at = $16,
                   updated_at = $17
             WHERE id = $1
            RETURNING {PROPERTY_COLUMNS}
            "#
        ))
        .bind(params.id)
        .bind(params.title)
        .bind(params.description)
        .bind(params.kind)
        .bind(params.status)
        .bind(params.price)
        .bind(params.currency)
        .bind(params.area_m2)
        .bind(params.bedrooms)
        .bind(params.bathrooms)
        .bind(params.city)
        .bind(params.region)
        .bind(params.quarter)
        .bind(params.address)
        .bind(params.is_featured)
        .bind(params.published_at)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PropertyRecord::from(row))
    }

    async fn delete_property(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}
