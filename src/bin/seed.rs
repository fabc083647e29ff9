use axum_storefront_api::{
    config::AppConfig,
    db::{OrmConn, create_pool, orm_from_pool, run_migrations},
    entity::{Users, enums::Role, users},
    services::auth_service::hash_password,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    let orm = orm_from_pool(pool);

    let super_admin = ensure_account(
        &orm,
        "owner",
        "owner@example.com",
        "owner123",
        Role::SuperAdmin,
    )
    .await?;
    let admin =
        ensure_account(&orm, "admin", "admin@example.com", "admin123", Role::Admin).await?;
    let user =
        ensure_account(&orm, "shopper", "user@example.com", "user123", Role::User).await?;

    println!("Seed completed. Super admin: {super_admin}, admin: {admin}, user: {user}");
    Ok(())
}

/// Insert a verified account, or reset the role of an existing one.
async fn ensure_account(
    orm: &OrmConn,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(users::Column::Email.eq(email))
        .one(orm)
        .await?
    {
        let id = existing.id;
        let mut active: users::ActiveModel = existing.into();
        active.role = Set(role);
        active.is_email_verified = Set(true);
        active.is_deleted = Set(false);
        active.update(orm).await?;
        return Ok(id);
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let now = Utc::now().fixed_offset();
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        phone_numbers: Set(serde_json::json!([])),
        addresses: Set(serde_json::json!([])),
        role: Set(role),
        age: Set(None),
        is_email_verified: Set(true),
        is_logged_in: Set(false),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(orm)
    .await?;
    Ok(user.id)
}
