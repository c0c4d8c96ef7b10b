//! End-to-end API tests against in-memory repositories.

mod support;

use axum::http::StatusCode;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use immob::cache::CacheConfig;
use immob::domain::entities::PropertyRecord;
use immob::domain::types::{PropertyKind, PropertyStatus};

use support::{test_app, test_app_with};

// ============================================================================
// Accounts and authentication
// ============================================================================

#[tokio::test]
async fn register_login_and_profile_flow() {
    let app = test_app();

    let (user_id, token) = app.register_and_login("amina@example.cm", "amina").await;

    let (status, profile) = app.request("GET", "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "amina@example.cm");
    assert_eq!(profile["id"], user_id.to_string());
    // Credentials never leave the server.
    assert!(profile.get("password_hash").is_none());

    let (status, _) = app.request("GET", "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .request("GET", "/api/v1/users/me", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn weak_passwords_are_rejected() {
    let app = test_app();

    for password in ["short1!A", "nouppercase1!aaaa", "NoSpecials123456", "Password123!"] {
        let (status, body) = app
            .request(
                "POST",
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "email": "weak@example.cm",
                    "username": "weak",
                    "password": password,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted: {password}");
        assert_eq!(body["error"]["code"], "bad_request");
    }
}

#[tokio::test]
async fn duplicate_email_registration_conflicts() {
    let app = test_app();
    app.register_and_login("taken@example.cm", "first").await;

    let (status, body) = app
        .request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "taken@example.cm",
                "username": "second",
                "password": "Str0ng!Passphrase#42",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn refresh_token_rotates_the_pair() {
    let app = test_app();
    let (status, user) = app
        .request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "rotate@example.cm",
                "username": "rotate",
                "password": "Str0ng!Passphrase#42",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{user}");

    let (_, tokens) = app
        .request(
            "POST",
            "/api/v1/auth/token",
            None,
            Some(json!({
                "email": "rotate@example.cm",
                "password": "Str0ng!Passphrase#42",
            })),
        )
        .await;

    let refresh = tokens["refresh_token"].as_str().expect("refresh token");
    let (status, refreshed) = app
        .request(
            "POST",
            "/api/v1/auth/token/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(refreshed["access_token"].is_string());

    // A refresh token is not accepted where an access token is required.
    let (status, _) = app
        .request("GET", "/api/v1/users/me", Some(refresh), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = test_app();
    app.register_and_login("reset@example.cm", "reset").await;

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/auth/password-reset",
            None,
            Some(json!({ "email": "reset@example.cm" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Unknown addresses get the same answer and no mail.
    let (status, _) = app
        .request(
            "POST",
            "/api/v1/auth/password-reset",
            None,
            Some(json!({ "email": "nobody@example.cm" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let deliveries = app.mailer.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].to, "reset@example.cm");

    let token = deliveries[0]
        .body
        .split("token=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .expect("reset link carries a token");

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/auth/password-reset/confirm",
            None,
            Some(json!({ "token": token, "new_password": "An0ther!Passphrase#7" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The token is single use.
    let (status, _) = app
        .request(
            "POST",
            "/api/v1/auth/password-reset/confirm",
            None,
            Some(json!({ "token": token, "new_password": "Th1rd!Passphrase#8" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Old password no longer works; the new one does.
    let (status, _) = app
        .request(
            "POST",
            "/api/v1/auth/token",
            None,
            Some(json!({ "email": "reset@example.cm", "password": "Str0ng!Passphrase#42" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/auth/token",
            None,
            Some(json!({ "email": "reset@example.cm", "password": "An0ther!Passphrase#7" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Favorites and the favorites counter
// ============================================================================

#[tokio::test]
async fn favorite_toggle_round_trip_restores_state() {
    let app = test_app();
    let (_owner_id, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    let (_user_id, user_token) = app.register_and_login("buyer@example.cm", "buyer").await;
    let property_id = app.create_property(&owner_token, "Villa Bonanjo").await;

    // First toggle adds.
    let (status, outcome) = app
        .request(
            "POST",
            "/api/v1/favorites/toggle",
            Some(&user_token),
            Some(json!({ "property_id": property_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(outcome["is_favorited"], true);
    assert_eq!(outcome["favorites_count"], 1);
    assert_eq!(app.store.favorite_rows(property_id), 1);
    assert_eq!(app.store.property(property_id).unwrap().favorites_count, 1);

    let (status, check) = app
        .request(
            "GET",
            &format!("/api/v1/favorites/check?property_id={property_id}"),
            Some(&user_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["is_favorited"], true);

    // Second toggle removes: the round trip restores the original state.
    let (status, outcome) = app
        .request(
            "POST",
            "/api/v1/favorites/toggle",
            Some(&user_token),
            Some(json!({ "property_id": property_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["is_favorited"], false);
    assert_eq!(outcome["favorites_count"], 0);
    assert_eq!(app.store.favorite_rows(property_id), 0);
    assert_eq!(app.store.property(property_id).unwrap().favorites_count, 0);
}

#[tokio::test]
async fn favorites_counter_matches_rows_after_any_sequence() {
    let app = test_app();
    let (_, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    let property_id = app.create_property(&owner_token, "Duplex Bastos").await;

    let mut tokens = Vec::new();
    for n in 0..3 {
        let (_, token) = app
            .register_and_login(&format!("fan{n}@example.cm"), &format!("fan{n}"))
            .await;
        tokens.push(token);
    }

    // Interleaved adds and removes; the denormalized counter must track the
    // row count after every step.
    for token in &tokens {
        app.request(
            "POST",
            "/api/v1/favorites/toggle",
            Some(token),
            Some(json!({ "property_id": property_id })),
        )
        .await;
        let rows = app.store.favorite_rows(property_id) as i32;
        assert_eq!(app.store.property(property_id).unwrap().favorites_count, rows);
    }
    assert_eq!(app.store.favorite_rows(property_id), 3);

    app.request(
        "POST",
        "/api/v1/favorites/toggle",
        Some(&tokens[1]),
        Some(json!({ "property_id": property_id })),
    )
    .await;
    assert_eq!(app.store.favorite_rows(property_id), 2);
    assert_eq!(app.store.property(property_id).unwrap().favorites_count, 2);
}

#[tokio::test]
async fn favoriting_notifies_the_owner() {
    let app = test_app();
    let (owner_id, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    let (_, user_token) = app.register_and_login("fan@example.cm", "fan").await;
    let property_id = app.create_property(&owner_token, "Studio Akwa").await;

    app.request(
        "POST",
        "/api/v1/favorites/toggle",
        Some(&user_token),
        Some(json!({ "property_id": property_id })),
    )
    .await;

    let (status, listing) = app
        .request("GET", "/api/v1/notifications", Some(&owner_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["unread_count"], 1);
    assert_eq!(listing["notifications"][0]["kind"], "favorite_update");
    assert_eq!(
        listing["notifications"][0]["user_id"],
        owner_id.to_string()
    );
}

#[tokio::test]
async fn counter_self_heals_after_cascade_delete() {
    let app = test_app();
    let (_, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    let (_, fan_token) = app.register_and_login("fan@example.cm", "fan").await;
    let (_, other_token) = app.register_and_login("other@example.cm", "other").await;
    let property_id = app.create_property(&owner_token, "Loft Bonamoussadi").await;

    app.request(
        "POST",
        "/api/v1/favorites/toggle",
        Some(&fan_token),
        Some(json!({ "property_id": property_id })),
    )
    .await;
    assert_eq!(app.store.property(property_id).unwrap().favorites_count, 1);

    // Deleting the account cascades the favorite row away without touching
    // the counter, leaving it stale.
    let (status, _) = app
        .request("DELETE", "/api/v1/users/me", Some(&fan_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.store.favorite_rows(property_id), 0);
    assert_eq!(app.store.property(property_id).unwrap().favorites_count, 1);

    // The next favorite write recomputes from the rows and heals the drift.
    app.request(
        "POST",
        "/api/v1/favorites/toggle",
        Some(&other_token),
        Some(json!({ "property_id": property_id })),
    )
    .await;
    assert_eq!(app.store.favorite_rows(property_id), 1);
    assert_eq!(app.store.property(property_id).unwrap().favorites_count, 1);
}

// ============================================================================
// Reviews and the likes counter
// ============================================================================

#[tokio::test]
async fn review_like_counter_matches_rows() {
    let app = test_app();
    let (_, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    let property_id = app.create_property(&owner_token, "Penthouse Bonapriso").await;

    let (_, reviewer_token) = app.register_and_login("critic@example.cm", "critic").await;
    let (status, review) = app
        .request(
            "POST",
            "/api/v1/reviews",
            Some(&reviewer_token),
            Some(json!({
                "property_id": property_id,
                "rating": 4,
                "title": "Great location",
                "comment": "Walking distance to everything.",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let review_id: Uuid = review["id"].as_str().unwrap().parse().unwrap();

    let mut likers = Vec::new();
    for n in 0..2 {
        let (_, token) = app
            .register_and_login(&format!("liker{n}@example.cm"), &format!("liker{n}"))
            .await;
        likers.push(token);
    }

    for (expected, token) in likers.iter().enumerate() {
        let (status, outcome) = app
            .request(
                "POST",
                &format!("/api/v1/reviews/{review_id}/like"),
                Some(token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["is_liked"], true);
        assert_eq!(outcome["likes_count"], (expected + 1) as i64);
        assert_eq!(app.store.like_rows(review_id), expected + 1);
        assert_eq!(
            app.store.review(review_id).unwrap().likes_count as usize,
            expected + 1
        );
    }

    // Unlike restores both the rows and the counter.
    let (status, outcome) = app
        .request(
            "POST",
            &format!("/api/v1/reviews/{review_id}/like"),
            Some(&likers[0]),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["is_liked"], false);
    assert_eq!(outcome["likes_count"], 1);
    assert_eq!(app.store.like_rows(review_id), 1);
}

#[tokio::test]
async fn second_review_for_same_property_conflicts() {
    let app = test_app();
    let (_, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    let property_id = app.create_property(&owner_token, "Flat Deido").await;
    let (_, reviewer_token) = app.register_and_login("critic@example.cm", "critic").await;

    let payload = json!({
        "property_id": property_id,
        "rating": 5,
        "title": "Lovely",
        "comment": "Would rent again.",
    });

    let (status, _) = app
        .request("POST", "/api/v1/reviews", Some(&reviewer_token), Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request("POST", "/api/v1/reviews", Some(&reviewer_token), Some(payload))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn review_stats_aggregate_approved_reviews() {
    let app = test_app();
    let (_, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    let property_id = app.create_property(&owner_token, "House Bali").await;

    for (n, rating) in [4, 5, 5].iter().enumerate() {
        let (_, token) = app
            .register_and_login(&format!("rev{n}@example.cm"), &format!("rev{n}"))
            .await;
        app.request(
            "POST",
            "/api/v1/reviews",
            Some(&token),
            Some(json!({
                "property_id": property_id,
                "rating": rating,
                "title": "Review",
                "comment": "Comment body.",
            })),
        )
        .await;
    }
    app.store.approve_all_reviews();

    let (status, stats) = app
        .request(
            "GET",
            &format!("/api/v1/reviews/stats?property_id={property_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_reviews"], 3);
    let avg = stats["avg_rating"].as_f64().unwrap();
    assert!((avg - 14.0 / 3.0).abs() < 1e-9);
}

// ============================================================================
// Property views counter
// ============================================================================

#[tokio::test]
async fn detail_retrieval_increments_views_exactly_once_per_call() {
    let app = test_app();
    let (_, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    let property_id = app.create_property(&owner_token, "Bungalow Kribi").await;
    assert_eq!(app.store.property(property_id).unwrap().views_count, 0);

    for expected in 1..=3 {
        let (status, detail) = app
            .request(
                "GET",
                &format!("/api/v1/properties/{property_id}"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["views_count"], expected);
    }

    assert_eq!(app.store.property(property_id).unwrap().views_count, 3);
}

// ============================================================================
// Response cache
// ============================================================================

#[tokio::test]
async fn property_list_is_cached_and_invalidated_by_writes() {
    let app = test_app();
    let (owner_id, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    app.create_property(&owner_token, "First listing").await;

    let (status, listing) = app
        .request("GET", "/api/v1/properties?status=for_sale", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["items"].as_array().unwrap().len(), 1);

    // A row inserted behind the service's back is invisible while the cached
    // entry lives: the cache serves the stale page verbatim.
    let now = OffsetDateTime::now_utc();
    app.store.insert_property_directly(PropertyRecord {
        id: Uuid::new_v4(),
        title: "Out-of-band listing".to_string(),
        description: "Inserted without invalidation.".to_string(),
        kind: PropertyKind::House,
        status: PropertyStatus::ForSale,
        price: 1_000_000,
        currency: "XAF".to_string(),
        area_m2: 80.0,
        bedrooms: 2,
        bathrooms: 1,
        city: "Douala".to_string(),
        region: "littoral".to_string(),
        quarter: None,
        address: "Hidden street".to_string(),
        owner_id,
        is_featured: false,
        is_verified: false,
        views_count: 0,
        favorites_count: 0,
        published_at: Some(now),
        created_at: now,
        updated_at: now,
    });

    let (_, stale) = app
        .request("GET", "/api/v1/properties?status=for_sale", None, None)
        .await;
    assert_eq!(stale["items"].as_array().unwrap().len(), 1, "cache hit expected");

    // An API write invalidates the list prefix; the next read sees all rows.
    app.create_property(&owner_token, "Second listing").await;

    let (_, fresh) = app
        .request("GET", "/api/v1/properties?status=for_sale", None, None)
        .await;
    assert_eq!(fresh["items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn expired_cache_entries_are_refreshed_without_invalidation() {
    let app = test_app_with(
        CacheConfig {
            property_list_ttl_secs: 0,
            ..Default::default()
        },
        1_000,
    );
    let (owner_id, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    app.create_property(&owner_token, "Visible listing").await;

    let (_, first) = app.request("GET", "/api/v1/properties", None, None).await;
    assert_eq!(first["items"].as_array().unwrap().len(), 1);

    let now = OffsetDateTime::now_utc();
    app.store.insert_property_directly(PropertyRecord {
        id: Uuid::new_v4(),
        title: "Second listing".to_string(),
        description: "Visible once the TTL lapses.".to_string(),
        kind: PropertyKind::Studio,
        status: PropertyStatus::ForRent,
        price: 250_000,
        currency: "XAF".to_string(),
        area_m2: 35.0,
        bedrooms: 1,
        bathrooms: 1,
        city: "Yaoundé".to_string(),
        region: "centre".to_string(),
        quarter: None,
        address: "Rue 1.234".to_string(),
        owner_id,
        is_featured: false,
        is_verified: false,
        views_count: 0,
        favorites_count: 0,
        published_at: Some(now),
        created_at: now,
        updated_at: now,
    });

    // Zero TTL: every read is a miss, so no invalidation is needed.
    let (_, second) = app.request("GET", "/api/v1/properties", None, None).await;
    assert_eq!(second["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn stats_and_featured_use_their_aggregate_cache_keys() {
    let app = test_app();
    let (_, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    app.create_property(&owner_token, "Counted listing").await;

    let (status, stats) = app.request("GET", "/api/v1/properties/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_properties"], 1);

    app.create_property(&owner_token, "Another listing").await;

    // The write deleted the aggregate key, so the stats are recomputed.
    let (_, stats) = app.request("GET", "/api/v1/properties/stats", None, None).await;
    assert_eq!(stats["total_properties"], 2);

    let (status, featured) = app
        .request("GET", "/api/v1/properties/featured", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(featured.as_array().unwrap().len(), 0);
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn notification_lifecycle_is_monotonic() {
    let app = test_app();
    let (_, token) = app.register_and_login("user@example.cm", "user").await;

    let mut ids = Vec::new();
    for n in 0..3 {
        let (status, notification) = app
            .request(
                "POST",
                "/api/v1/notifications",
                Some(&token),
                Some(json!({
                    "title": format!("Notification {n}"),
                    "message": "Something happened.",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(
            notification["id"]
                .as_str()
                .unwrap()
                .parse::<Uuid>()
                .unwrap(),
        );
    }

    let (_, listing) = app
        .request("GET", "/api/v1/notifications", Some(&token), None)
        .await;
    assert_eq!(listing["count"], 3);
    assert_eq!(listing["unread_count"], 3);

    // Bulk mark two specific notifications: one set-based transition.
    let (status, outcome) = app
        .request(
            "POST",
            "/api/v1/notifications/mark-read",
            Some(&token),
            Some(json!({ "notification_ids": [ids[0], ids[1]] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["count"], 2);

    // Marking the same ids again transitions nothing: read never reverts.
    let (_, outcome) = app
        .request(
            "POST",
            "/api/v1/notifications/mark-read",
            Some(&token),
            Some(json!({ "notification_ids": [ids[0], ids[1]] })),
        )
        .await;
    assert_eq!(outcome["count"], 0);

    // Retrieval implicitly marks the last unread one.
    let (status, retrieved) = app
        .request(
            "GET",
            &format!("/api/v1/notifications/{}", ids[2]),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retrieved["is_read"], true);
    assert!(retrieved["read_at"].is_string() || retrieved["read_at"].is_array());

    let (_, count) = app
        .request("GET", "/api/v1/notifications/unread-count", Some(&token), None)
        .await;
    assert_eq!(count["count"], 0);

    let (_, outcome) = app
        .request("POST", "/api/v1/notifications/mark-all-read", Some(&token), None)
        .await;
    assert_eq!(outcome["count"], 0);
}

#[tokio::test]
async fn mark_read_without_ids_marks_most_recent_unread() {
    let app = test_app();
    let (_, token) = app.register_and_login("user@example.cm", "user").await;

    for n in 0..2 {
        app.request(
            "POST",
            "/api/v1/notifications",
            Some(&token),
            Some(json!({
                "title": format!("Notification {n}"),
                "message": "Body.",
            })),
        )
        .await;
    }

    let (_, outcome) = app
        .request(
            "POST",
            "/api/v1/notifications/mark-read",
            Some(&token),
            Some(json!({})),
        )
        .await;
    assert_eq!(outcome["count"], 1);

    let (_, count) = app
        .request("GET", "/api/v1/notifications/unread-count", Some(&token), None)
        .await;
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn notifications_are_private_to_their_owner() {
    let app = test_app();
    let (_, alice_token) = app.register_and_login("alice@example.cm", "alice").await;
    let (_, bob_token) = app.register_and_login("bob@example.cm", "bob").await;

    let (_, notification) = app
        .request(
            "POST",
            "/api/v1/notifications",
            Some(&alice_token),
            Some(json!({ "title": "Private", "message": "For Alice only." })),
        )
        .await;
    let id = notification["id"].as_str().unwrap();

    let (status, _) = app
        .request(
            "GET",
            &format!("/api/v1/notifications/{id}"),
            Some(&bob_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Feedback
// ============================================================================

#[tokio::test]
async fn feedback_flow_with_staff_response_and_mail() {
    let app = test_app();

    // Anonymous submission with a contact address.
    let (status, anonymous) = app
        .request(
            "POST",
            "/api/v1/feedback",
            None,
            Some(json!({
                "kind": "bug",
                "title": "Search is broken",
                "message": "Filters reset on every page change.",
                "email": "visitor@example.cm",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let feedback_id = anonymous["id"].as_str().unwrap().to_string();

    let (user_id, user_token) = app.register_and_login("member@example.cm", "member").await;
    let (status, _) = app
        .request(
            "POST",
            "/api/v1/feedback",
            Some(&user_token),
            Some(json!({
                "kind": "praise",
                "rating": 5,
                "title": "Love it",
                "message": "Found a flat in two days.",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Non-staff list only their own submissions.
    let (_, own) = app
        .request("GET", "/api/v1/feedback", Some(&user_token), None)
        .await;
    assert_eq!(own.as_array().unwrap().len(), 1);

    // Non-staff cannot respond.
    let (status, _) = app
        .request(
            "POST",
            &format!("/api/v1/feedback/{feedback_id}/respond"),
            Some(&user_token),
            Some(json!({ "response": "Nice try." })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Staff see everything and can respond; the submitter gets mail.
    app.store.promote_to_staff(user_id);
    let (_, all) = app
        .request("GET", "/api/v1/feedback", Some(&user_token), None)
        .await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, responded) = app
        .request(
            "POST",
            &format!("/api/v1/feedback/{feedback_id}/respond"),
            Some(&user_token),
            Some(json!({ "response": "Fixed in the next release." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(responded["is_resolved"], true);

    let deliveries = app.mailer.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].to, "visitor@example.cm");
    assert!(deliveries[0].subject.contains("Search is broken"));
}

// ============================================================================
// Authorization and limits
// ============================================================================

#[tokio::test]
async fn only_owners_modify_their_properties() {
    let app = test_app();
    let (_, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    let (_, other_token) = app.register_and_login("other@example.cm", "other").await;
    let property_id = app.create_property(&owner_token, "Owned listing").await;

    let update = json!({
        "title": "Hijacked",
        "description": "Should not happen.",
        "kind": "apartment",
        "status": "for_sale",
        "price": 1,
        "area_m2": 1.0,
        "city": "Douala",
        "region": "littoral",
        "address": "Nowhere",
    });

    let (status, _) = app
        .request(
            "PATCH",
            &format!("/api/v1/properties/{property_id}"),
            Some(&other_token),
            Some(update.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            "DELETE",
            &format!("/api/v1/properties/{property_id}"),
            Some(&other_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            "PATCH",
            &format!("/api/v1/properties/{property_id}"),
            Some(&owner_token),
            Some(update),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let app = test_app();
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/properties")
        .body(Body::empty())
        .expect("request builds");
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router responds");

    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(
        response.headers()["referrer-policy"],
        "strict-origin-when-cross-origin"
    );
}

#[tokio::test]
async fn requests_beyond_the_window_ceiling_are_limited() {
    let app = test_app_with(CacheConfig::default(), 2);

    for _ in 0..2 {
        let (status, _) = app.request("GET", "/api/v1/properties", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.request("GET", "/api/v1/properties", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "rate_limited");
}

// ============================================================================
// Media uploads
// ============================================================================

#[tokio::test]
async fn property_image_upload_and_removal() {
    let app = test_app();
    let (_, owner_token) = app.register_and_login("owner@example.cm", "owner").await;
    let property_id = app.create_property(&owner_token, "Photogenic flat").await;

    let boundary = "immob-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"front.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\n\
         fake-jpeg-bytes\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"caption\"\r\n\r\n\
         Street view\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"is_primary\"\r\n\r\n\
         true\r\n\
         --{boundary}--\r\n"
    );

    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/properties/{property_id}/images"))
        .header(header::AUTHORIZATION, format!("Bearer {owner_token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request builds");

    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let image: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(image["is_primary"], true);
    assert_eq!(image["caption"], "Street view");
    let image_id = image["id"].as_str().unwrap();

    // The detail payload now carries the gallery.
    let (_, detail) = app
        .request(
            "GET",
            &format!("/api/v1/properties/{property_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(detail["images"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .request(
            "DELETE",
            &format!("/api/v1/properties/{property_id}/images/{image_id}"),
            Some(&owner_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, detail) = app
        .request(
            "GET",
            &format!("/api/v1/properties/{property_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(detail["images"].as_array().unwrap().len(), 0);
}
