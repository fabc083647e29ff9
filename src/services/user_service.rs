use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, Set,
    sea_query::{Alias, Expr, extension::postgres::PgBinOper},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEvent},
    dto::users::{UpdateProfileRequest, UserList},
    entity::{Users, users},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    policy::{Action, authorize},
    query::{ListQuery, fetch_page},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Whether any of `phones` already belongs to another user.
pub async fn phone_numbers_taken<C>(
    db: &C,
    phones: &[String],
    exclude: Option<Uuid>,
) -> AppResult<bool>
where
    C: ConnectionTrait,
{
    if phones.is_empty() {
        return Ok(false);
    }

    let mut any_phone = Condition::any();
    for phone in phones {
        any_phone = any_phone.add(
            Expr::col((Users, users::Column::PhoneNumbers)).binary(
                PgBinOper::Contains,
                Expr::val(serde_json::json!([phone])).cast_as(Alias::new("jsonb")),
            ),
        );
    }

    let mut finder = Users::find().filter(any_phone);
    if let Some(id) = exclude {
        finder = finder.filter(users::Column::Id.ne(id));
    }
    Ok(finder.one(db).await?.is_some())
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    payload.validate()?;
    authorize(&user.actor(), Some(user.user_id), Action::UpdateProfile)?;

    let current = Users::find_by_id(user.user_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let mut active: users::ActiveModel = current.into();
    if let Some(phones) = payload.phone_numbers {
        if phone_numbers_taken(&*state.orm, &phones, Some(user.user_id)).await? {
            return Err(AppError::Conflict("Phone number is already taken".into()));
        }
        active.phone_numbers = Set(serde_json::json!(phones));
    }
    if let Some(addresses) = payload.addresses {
        active.addresses = Set(serde_json::json!(addresses));
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let updated = active.update(&*state.orm).await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "user_update", "users"),
    )
    .await;

    Ok(ApiResponse::success(
        "User updated",
        User::from(updated),
        Some(Meta::empty()),
    ))
}

/// Soft delete: the row stays but can no longer sign in or authenticate.
pub async fn delete_user(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    authorize(&actor.actor(), Some(id), Action::DeleteUser)?;

    let target = Users::find_by_id(id)
        .filter(users::Column::IsDeleted.eq(false))
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let mut active: users::ActiveModel = target.into();
    active.is_deleted = Set(true);
    active.is_logged_in = Set(false);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.update(&*state.orm).await?;

    audit::record(
        &state.pool,
        AuditEvent::new(actor.user_id, "user_delete", "users")
            .with_metadata(serde_json::json!({ "user_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "User deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_users(
    state: &AppState,
    actor: &AuthUser,
    query: ListQuery,
) -> AppResult<ApiResponse<UserList>> {
    authorize(&actor.actor(), None, Action::ListUsers)?;

    let (rows, meta) = fetch_page(
        &*state.orm,
        Users::find().filter(users::Column::IsDeleted.eq(false)),
        &query,
    )
    .await?;

    Ok(ApiResponse::success(
        "Ok",
        UserList {
            items: rows.into_iter().map(User::from).collect(),
        },
        Some(meta),
    ))
}
