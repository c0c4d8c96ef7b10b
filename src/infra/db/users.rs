use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateResetTokenParams, CreateUserParams, RepoError, UpdateUserProfileParams, UsersRepo,
};
use crate::domain::entities::{PasswordResetTokenRecord, UserRecord};

use super::{PostgresRepositories, map_sqlx_error};

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, password_hash, \
     phone_number, is_agent, agency_name, license_number, is_staff, is_verified, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    phone_number: Option<String>,
    is_agent: bool,
    agency_name: Option<String>,
    license_number: Option<String>,
    is_staff: bool,
    is_verified: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            phone_number: row.phone_number,
            is_agent: row.is_agent,
            agency_name: row.agency_name,
            license_number: row.license_number,
            is_staff: row.is_staff,
            is_verified: row.is_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResetTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_digest: String,
    expires_at: OffsetDateTime,
    used: bool,
    created_at: OffsetDateTime,
}

impl From<ResetTokenRow> for PasswordResetTokenRecord {
    fn from(row: ResetTokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            token_digest: row.token_digest,
            expires_at: row.expires_at,
            used: row.used,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (
                id, email, username, first_name, last_name, password_hash,
                phone_number, is_agent, agency_name, license_number,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(params.email)
        .bind(params.username)
        .bind(params.first_name)
        .bind(params.last_name)
        .bind(params.password_hash)
        .bind(params.phone_number)
        .bind(params.is_agent)
        .bind(params.agency_name)
        .bind(params.license_number)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UserRecord::from(row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn update_profile(
        &self,
        params: UpdateUserProfileParams,
    ) -> Result<UserRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET username = $2,
                   first_name = $3,
                   last_name = $4,
                   phone_number = $5,
                   agency_name = $6,
                   license_number = $7,
                   updated_at = $8
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(params.id)
        .bind(params.username)
        .bind(params.first_name)
        .bind(params.last_name)
        .bind(params.phone_number)
        .bind(params.agency_name)
        .bind(params.license_number)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UserRecord::from(row))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepoError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(OffsetDateTime::now_utc())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn create_reset_token(
        &self,
        params: CreateResetTokenParams,
    ) -> Result<PasswordResetTokenRecord, RepoError> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token_digest, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, token_digest, expires_at, used, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.token_digest)
        .bind(params.expires_at)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PasswordResetTokenRecord::from(row))
    }

    async fn find_reset_token(
        &self,
        token_digest: &str,
    ) -> Result<Option<PasswordResetTokenRecord>, RepoError> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            "SELECT id, user_id, token_digest, expires_at, used, created_at \
             FROM password_reset_tokens WHERE token_digest = $1",
        )
        .bind(token_digest)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PasswordResetTokenRecord::from))
    }

    async fn mark_reset_token_used(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete_unused_reset_tokens(&self, user_id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1 AND used = FALSE")
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}
