#![allow(dead_code)]

use std::sync::Arc;

use axum_storefront_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
    entity::{enums::Role, products, users},
    mail::LogMailer,
    middleware::auth::AuthUser,
    pricing::applied_price,
    state::AppState,
    storage::{AssetStore, LocalAssetStore, new_folder_id},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tempfile::TempDir;
use uuid::Uuid;

/// Database URL for integration flows, or `None` to skip them.
pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            None
        }
    }
}

pub async fn setup_state(
    database_url: &str,
    assets: Option<Arc<dyn AssetStore>>,
) -> anyhow::Result<(AppState, TempDir)> {
    let dir = tempfile::tempdir()?;
    let mut config = AppConfig::local(database_url);
    config.asset_root = dir.path().join("assets");
    config.upload_dir = dir.path().join("uploads");
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;
    let orm = orm_from_pool(pool.clone());

    let assets = assets.unwrap_or_else(|| {
        Arc::new(LocalAssetStore::new(
            config.asset_root.clone(),
            config.asset_base_url.clone(),
        ))
    });
    let state = AppState {
        pool,
        orm: Arc::new(orm),
        config: Arc::new(config),
        assets,
        mailer: Arc::new(LogMailer),
    };
    Ok((state, dir))
}

fn short_tag() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub async fn create_user(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let tag = short_tag();
    let now = Utc::now().fixed_offset();
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(format!("user{tag}")),
        email: Set(format!("{tag}@example.com")),
        password_hash: Set("not-a-real-hash".into()),
        phone_numbers: Set(serde_json::json!(["0123456789"])),
        addresses: Set(serde_json::json!([])),
        role: Set(role),
        age: Set(None),
        is_email_verified: Set(true),
        is_logged_in: Set(true),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.orm)
    .await?;
    Ok(AuthUser::from(user))
}

pub async fn create_product(
    state: &AppState,
    added_by: Uuid,
    base_price: Decimal,
    stock: i32,
) -> anyhow::Result<products::Model> {
    let now = Utc::now().fixed_offset();
    let title = format!("Widget {}", short_tag());
    let product = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(title.to_lowercase().replace(' ', "-")),
        title: Set(title),
        description: Set("A product for flow tests".into()),
        folder_id: Set(new_folder_id()),
        base_price: Set(base_price),
        discount: Set(Decimal::ZERO),
        applied_price: Set(applied_price(base_price, Decimal::ZERO)),
        stock: Set(stock),
        rate: Set(Decimal::ZERO),
        rate_count: Set(0),
        images: Set(serde_json::json!([])),
        specs: Set(serde_json::json!({})),
        category_id: Set(Uuid::new_v4()),
        sub_category_id: Set(Uuid::new_v4()),
        brand_id: Set(Uuid::new_v4()),
        added_by: Set(added_by),
        updated_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.orm)
    .await?;
    Ok(product)
}

pub fn unique_code() -> String {
    format!("save{}", short_tag())
}
