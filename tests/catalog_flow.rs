mod common;

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use axum_storefront_api::{
    entity::{Categories, Coupons, categories, coupons, enums::{CouponStatus, Role}},
    jobs::sweep_expired_coupons,
    middleware::auth::ACCESS_TOKEN_HEADER,
    routes::create_app_router,
    services::auth_service::issue_access_token,
    state::AppState,
    storage::{AssetStore, StorageError, StoredAsset},
};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "storefront-test-boundary";

/// Store whose uploads always fail; remembers which folders it was asked to drop.
#[derive(Default)]
struct OfflineStore {
    dropped: Mutex<Vec<String>>,
}

#[async_trait]
impl AssetStore for OfflineStore {
    async fn upload(
        &self,
        _source: &Path,
        _folder: &str,
        _public_id: Option<&str>,
    ) -> Result<StoredAsset, StorageError> {
        Err(StorageError::InvalidPath("asset store offline".into()))
    }

    async fn delete_folder(&self, folder: &str) -> Result<(), StorageError> {
        self.dropped
            .lock()
            .expect("lock")
            .push(folder.to_string());
        Ok(())
    }
}

/// Multipart body with a `name` field and one PNG part per entry in `files`.
fn category_upload(name: &str, files: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
        )
        .as_bytes(),
    );
    for field in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{field}.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn app(state: &AppState) -> Router {
    Router::new()
        .nest("/api", create_app_router(state))
        .with_state(state.clone())
}

fn create_category_request(token: &str, name: &str) -> Request<Body> {
    category_request_with_files(token, name, &["image"])
}

fn category_request_with_files(token: &str, name: &str, files: &[&str]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/category")
        .header(ACCESS_TOKEN_HEADER, format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(category_upload(name, files)))
        .expect("request")
}

async fn categories_named(state: &AppState, name: &str) -> anyhow::Result<u64> {
    Ok(Categories::find()
        .filter(categories::Column::Name.eq(name))
        .count(&*state.orm)
        .await?)
}

fn category_name() -> String {
    format!("Cat{}", &Uuid::new_v4().simple().to_string()[..8])
}

#[tokio::test]
async fn failed_upload_rolls_back_the_category() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let store = Arc::new(OfflineStore::default());
    let assets: Arc<dyn AssetStore> = store.clone();
    let (state, _dir) = common::setup_state(&url, Some(assets)).await?;
    let admin = common::create_user(&state, Role::Admin).await?;
    let token = issue_access_token(admin.user_id, Role::Admin, &state.config.jwt_secret)?;

    let name = category_name();
    let response = app(&state)
        .oneshot(create_category_request(&token, &name))
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(categories_named(&state, &name).await?, 0);
    assert_eq!(store.dropped.lock().expect("lock").len(), 1);

    let mut staged = tokio::fs::read_dir(&state.config.upload_dir).await?;
    assert!(staged.next_entry().await?.is_none(), "staged upload left behind");

    Ok(())
}

#[tokio::test]
async fn successful_upload_leaves_no_staged_files() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let (state, _dir) = common::setup_state(&url, None).await?;
    let admin = common::create_user(&state, Role::Admin).await?;
    let token = issue_access_token(admin.user_id, Role::Admin, &state.config.jwt_secret)?;

    // The stray part is staged but never consumed by the handler.
    let name = category_name();
    let response = app(&state)
        .oneshot(category_request_with_files(&token, &name, &["image", "thumbnail"]))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(categories_named(&state, &name).await?, 1);

    let mut staged = tokio::fs::read_dir(&state.config.upload_dir).await?;
    assert!(staged.next_entry().await?.is_none(), "staged upload left behind");

    Ok(())
}

#[tokio::test]
async fn category_lifecycle_over_http() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let (state, _dir) = common::setup_state(&url, None).await?;
    let admin = common::create_user(&state, Role::Admin).await?;
    let token = issue_access_token(admin.user_id, Role::Admin, &state.config.jwt_secret)?;

    // Customers cannot create catalog entries.
    let shopper = common::create_user(&state, Role::User).await?;
    let shopper_token = issue_access_token(shopper.user_id, Role::User, &state.config.jwt_secret)?;
    let response = app(&state)
        .oneshot(create_category_request(&shopper_token, &category_name()))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let name = category_name();
    let response = app(&state)
        .oneshot(create_category_request(&token, &name))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
    let id = body["data"]["id"].as_str().expect("category id").to_string();
    let public_id = body["data"]["image"]["public_id"]
        .as_str()
        .expect("public id")
        .to_string();
    assert!(state.config.asset_root.join(&public_id).exists());

    // Same name again is a conflict and leaves a single row.
    let response = app(&state)
        .oneshot(create_category_request(&token, &name))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(categories_named(&state, &name).await?, 1);

    let response = app(&state)
        .oneshot(
            Request::builder()
                .uri(format!("/api/category/{id}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&state)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/category/{id}"))
                .header(ACCESS_TOKEN_HEADER, format!("Bearer {token}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(categories_named(&state, &name).await?, 0);
    assert!(!state.config.asset_root.join(&public_id).exists());

    Ok(())
}

#[tokio::test]
async fn sweep_expires_finished_coupons() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let (state, _dir) = common::setup_state(&url, None).await?;
    let admin = common::create_user(&state, Role::Admin).await?;

    let now = Utc::now();
    let coupon = |code: String, to_date: chrono::DateTime<Utc>| coupons::ActiveModel {
        id: Set(Uuid::new_v4()),
        coupon_code: Set(code),
        coupon_amount: Set(dec!(5)),
        coupon_status: Set(CouponStatus::Valid),
        is_fixed: Set(true),
        is_percentage: Set(false),
        from_date: Set((now - Duration::days(10)).fixed_offset()),
        to_date: Set(to_date.fixed_offset()),
        is_enabled: Set(true),
        enabled_at: Set(None),
        enabled_by: Set(None),
        disabled_at: Set(None),
        disabled_by: Set(None),
        added_by: Set(admin.user_id),
        updated_by: Set(None),
        created_at: Set(now.fixed_offset()),
        updated_at: Set(now.fixed_offset()),
    };
    let finished = coupon(common::unique_code(), now - Duration::hours(1))
        .insert(&*state.orm)
        .await?;
    let running = coupon(common::unique_code(), now + Duration::days(1))
        .insert(&*state.orm)
        .await?;

    let expired = sweep_expired_coupons(&*state.orm, now).await?;
    assert!(expired >= 1);

    let finished = Coupons::find_by_id(finished.id).one(&*state.orm).await?.expect("coupon");
    assert_eq!(finished.coupon_status, CouponStatus::Expired);
    let running = Coupons::find_by_id(running.id).one(&*state.orm).await?.expect("coupon");
    assert_eq!(running.coupon_status, CouponStatus::Valid);

    Ok(())
}
