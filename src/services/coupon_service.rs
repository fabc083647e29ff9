use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait, sea_query::LockType,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEvent},
    dto::coupons::{
        AddCouponRequest, CouponList, CouponWithUsers, UpdateCouponRequest,
        ValidateCouponRequest,
    },
    entity::{
        CouponUsers, Coupons, Users, coupon_users, coupons, enums::CouponStatus, users,
    },
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::AuthUser,
    models::{Coupon, CouponUser},
    policy::{Action, authorize},
    pricing::CouponDiscount,
    query::{ListQuery, fetch_page},
    response::{ApiResponse, Meta},
    state::AppState,
};

const DUPLICATE_CODE: &str = "Coupon code is already taken";

fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Coupon invariants shared by add and update.
fn check_terms(
    amount: rust_decimal::Decimal,
    is_fixed: bool,
    is_percentage: bool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> AppResult<CouponDiscount> {
    let discount = CouponDiscount::from_flags(amount, is_fixed, is_percentage)?;
    if to <= from {
        return Err(AppError::bad_request("toDate must be after fromDate"));
    }
    Ok(discount)
}

async fn code_taken<C>(db: &C, code: &str, exclude: Option<Uuid>) -> AppResult<bool>
where
    C: ConnectionTrait,
{
    let mut finder = Coupons::find().filter(coupons::Column::CouponCode.eq(code));
    if let Some(id) = exclude {
        finder = finder.filter(coupons::Column::Id.ne(id));
    }
    Ok(finder.one(db).await?.is_some())
}

async fn find_coupon(state: &AppState, id: Uuid) -> AppResult<coupons::Model> {
    Coupons::find_by_id(id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Coupon"))
}

async fn with_users(state: &AppState, coupon: coupons::Model) -> AppResult<CouponWithUsers> {
    let users = CouponUsers::find()
        .filter(coupon_users::Column::CouponId.eq(coupon.id))
        .all(&*state.orm)
        .await?;
    Ok(CouponWithUsers {
        coupon: Coupon::from(coupon),
        users: users.into_iter().map(CouponUser::from).collect(),
    })
}

pub async fn add_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: AddCouponRequest,
) -> AppResult<ApiResponse<CouponWithUsers>> {
    authorize(&user.actor(), None, Action::ManageCoupons)?;
    payload.validate()?;
    check_terms(
        payload.coupon_amount,
        payload.is_fixed,
        payload.is_percentage,
        payload.from_date,
        payload.to_date,
    )?;

    let code = normalize_code(&payload.coupon_code);
    if code_taken(&*state.orm, &code, None).await? {
        return Err(AppError::Conflict(DUPLICATE_CODE.into()));
    }

    let ids: HashSet<Uuid> = payload.users.iter().map(|u| u.user_id).collect();
    if ids.len() != payload.users.len() {
        return Err(AppError::bad_request("a user can only be assigned once"));
    }
    if !ids.is_empty() {
        let found = Users::find()
            .filter(users::Column::Id.is_in(ids.iter().copied()))
            .filter(users::Column::IsDeleted.eq(false))
            .count(&*state.orm)
            .await?;
        if found as usize != ids.len() {
            return Err(AppError::NotFound("User"));
        }
    }

    let now = Utc::now().fixed_offset();
    let txn = state.orm.begin().await?;
    let coupon = coupons::ActiveModel {
        id: Set(Uuid::new_v4()),
        coupon_code: Set(code),
        coupon_amount: Set(payload.coupon_amount),
        coupon_status: Set(CouponStatus::Valid),
        is_fixed: Set(payload.is_fixed),
        is_percentage: Set(payload.is_percentage),
        from_date: Set(payload.from_date.fixed_offset()),
        to_date: Set(payload.to_date.fixed_offset()),
        is_enabled: Set(true),
        enabled_at: Set(Some(now)),
        enabled_by: Set(Some(user.user_id)),
        disabled_at: Set(None),
        disabled_by: Set(None),
        added_by: Set(user.user_id),
        updated_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(|e| conflict_on_unique(e, DUPLICATE_CODE))?;

    let mut assigned = Vec::with_capacity(payload.users.len());
    for input in &payload.users {
        let row = coupon_users::ActiveModel {
            id: Set(Uuid::new_v4()),
            coupon_id: Set(coupon.id),
            user_id: Set(input.user_id),
            max_usage: Set(input.max_usage),
            usage_count: Set(0),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;
        assigned.push(CouponUser::from(row));
    }
    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "coupon_create", "coupons")
            .with_metadata(serde_json::json!({ "coupon_id": coupon.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon created",
        CouponWithUsers {
            coupon: Coupon::from(coupon),
            users: assigned,
        },
        Some(Meta::empty()),
    ))
}

/// Check that `user_id` may redeem `code` at `now`. Checks run in a fixed
/// order so the first failing condition decides the error.
///
/// The assignment row is read `FOR UPDATE`, so inside a transaction a second
/// checkout for the same user waits until the first one commits its usage.
pub async fn validate_coupon<C>(
    db: &C,
    code: &str,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<(coupons::Model, coupon_users::Model)>
where
    C: ConnectionTrait,
{
    let coupon = Coupons::find()
        .filter(coupons::Column::CouponCode.eq(normalize_code(code)))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Coupon"))?;

    if coupon.coupon_status == CouponStatus::Expired || coupon.to_date < now {
        return Err(AppError::bad_request("this coupon has expired"));
    }
    if coupon.from_date > now {
        return Err(AppError::bad_request("this coupon is not active yet"));
    }
    if !coupon.is_enabled {
        return Err(AppError::bad_request("this coupon is disabled"));
    }

    let assignment = CouponUsers::find()
        .filter(coupon_users::Column::CouponId.eq(coupon.id))
        .filter(coupon_users::Column::UserId.eq(user_id))
        .lock(LockType::Update)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Forbidden("this coupon is not assigned to you".into()))?;
    if assignment.usage_count >= assignment.max_usage {
        return Err(AppError::bad_request(
            "you have exceeded the usage limit of this coupon",
        ));
    }
    Ok((coupon, assignment))
}

pub async fn check_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: ValidateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    payload.validate()?;
    let (coupon, _) = validate_coupon(&*state.orm, &payload.code, user.user_id, Utc::now()).await?;
    Ok(ApiResponse::success(
        "Coupon is valid",
        Coupon::from(coupon),
        Some(Meta::empty()),
    ))
}

pub async fn update_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    authorize(&user.actor(), None, Action::ManageCoupons)?;
    payload.validate()?;
    let current = find_coupon(state, id).await?;

    let amount = payload.coupon_amount.unwrap_or(current.coupon_amount);
    let is_fixed = payload.is_fixed.unwrap_or(current.is_fixed);
    let is_percentage = payload.is_percentage.unwrap_or(current.is_percentage);
    let from = payload
        .from_date
        .unwrap_or_else(|| current.from_date.with_timezone(&Utc));
    let to = payload
        .to_date
        .unwrap_or_else(|| current.to_date.with_timezone(&Utc));
    check_terms(amount, is_fixed, is_percentage, from, to)?;

    let code = payload.coupon_code.as_deref().map(normalize_code);
    if let Some(code) = &code {
        if code_taken(&*state.orm, code, Some(current.id)).await? {
            return Err(AppError::Conflict(DUPLICATE_CODE.into()));
        }
    }

    let now = Utc::now();
    let mut active: coupons::ActiveModel = current.into();
    if let Some(code) = code {
        active.coupon_code = Set(code);
    }
    active.coupon_amount = Set(amount);
    active.is_fixed = Set(is_fixed);
    active.is_percentage = Set(is_percentage);
    active.from_date = Set(from.fixed_offset());
    active.to_date = Set(to.fixed_offset());
    // Extending an expired coupon into the future revives it.
    if to > now {
        active.coupon_status = Set(CouponStatus::Valid);
    }
    active.updated_by = Set(Some(user.user_id));
    active.updated_at = Set(now.fixed_offset());
    let coupon = active
        .update(&*state.orm)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_CODE))?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "coupon_update", "coupons")
            .with_metadata(serde_json::json!({ "coupon_id": coupon.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon updated",
        Coupon::from(coupon),
        Some(Meta::empty()),
    ))
}

pub async fn delete_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    authorize(&user.actor(), None, Action::ManageCoupons)?;
    find_coupon(state, id).await?;

    let txn = state.orm.begin().await?;
    CouponUsers::delete_many()
        .filter(coupon_users::Column::CouponId.eq(id))
        .exec(&txn)
        .await?;
    Coupons::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "coupon_delete", "coupons")
            .with_metadata(serde_json::json!({ "coupon_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

/// Flip the enabled flag, recording who did it and when.
pub async fn set_enabled(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    enabled: bool,
) -> AppResult<ApiResponse<Coupon>> {
    authorize(&user.actor(), None, Action::ManageCoupons)?;
    let current = find_coupon(state, id).await?;
    if current.is_enabled == enabled {
        let state_name = if enabled { "enabled" } else { "disabled" };
        return Err(AppError::bad_request(format!(
            "coupon is already {state_name}"
        )));
    }

    let now = Utc::now().fixed_offset();
    let mut active: coupons::ActiveModel = current.into();
    active.is_enabled = Set(enabled);
    if enabled {
        active.enabled_at = Set(Some(now));
        active.enabled_by = Set(Some(user.user_id));
    } else {
        active.disabled_at = Set(Some(now));
        active.disabled_by = Set(Some(user.user_id));
    }
    active.updated_at = Set(now);
    let coupon = active.update(&*state.orm).await?;

    audit::record(
        &state.pool,
        AuditEvent::new(
            user.user_id,
            if enabled { "coupon_enable" } else { "coupon_disable" },
            "coupons",
        )
        .with_metadata(serde_json::json!({ "coupon_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        if enabled {
            "Coupon enabled"
        } else {
            "Coupon disabled"
        },
        Coupon::from(coupon),
        Some(Meta::empty()),
    ))
}

pub async fn list_coupons(
    state: &AppState,
    user: &AuthUser,
    enabled: Option<bool>,
    query: ListQuery,
) -> AppResult<ApiResponse<CouponList>> {
    authorize(&user.actor(), None, Action::ManageCoupons)?;
    let mut select = Coupons::find();
    if let Some(enabled) = enabled {
        select = select.filter(coupons::Column::IsEnabled.eq(enabled));
    }
    let (rows, meta) = fetch_page(&*state.orm, select, &query).await?;
    Ok(ApiResponse::success(
        "Coupons",
        CouponList {
            items: rows.into_iter().map(Coupon::from).collect(),
        },
        Some(meta),
    ))
}

pub async fn get_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<CouponWithUsers>> {
    authorize(&user.actor(), None, Action::ManageCoupons)?;
    let coupon = find_coupon(state, id).await?;
    Ok(ApiResponse::success(
        "Coupon",
        with_users(state, coupon).await?,
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn coupon(now: DateTime<Utc>) -> coupons::Model {
        let at = now.fixed_offset();
        coupons::Model {
            id: Uuid::new_v4(),
            coupon_code: "summer".into(),
            coupon_amount: dec!(10),
            coupon_status: CouponStatus::Valid,
            is_fixed: false,
            is_percentage: true,
            from_date: (now - Duration::days(1)).fixed_offset(),
            to_date: (now + Duration::days(1)).fixed_offset(),
            is_enabled: true,
            enabled_at: Some(at),
            enabled_by: None,
            disabled_at: None,
            disabled_by: None,
            added_by: Uuid::new_v4(),
            updated_by: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn assignment(coupon_id: Uuid, user_id: Uuid, used: i32) -> coupon_users::Model {
        coupon_users::Model {
            id: Uuid::new_v4(),
            coupon_id,
            user_id,
            max_usage: 2,
            usage_count: used,
            created_at: Utc::now().fixed_offset(),
        }
    }

    #[tokio::test]
    async fn valid_coupon_passes() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let c = coupon(now);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![c.clone()]])
            .append_query_results([vec![assignment(c.id, user, 1)]])
            .into_connection();

        let (found, used) = validate_coupon(&db, "SUMMER", user, now).await.unwrap();
        assert_eq!(found.id, c.id);
        assert_eq!(used.usage_count, 1);
    }

    #[tokio::test]
    async fn assignment_row_is_locked() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let c = coupon(now);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![c.clone()]])
            .append_query_results([vec![assignment(c.id, user, 0)]])
            .into_connection();

        validate_coupon(&db, "summer", user, now).await.unwrap();
        let log = db.into_transaction_log();
        assert_eq!(log.len(), 2);
        assert!(!log[0].statements()[0].sql.contains("FOR UPDATE"));
        assert!(log[1].statements()[0].sql.ends_with("FOR UPDATE"));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<coupons::Model>::new()])
            .into_connection();
        let err = validate_coupon(&db, "nope", Uuid::new_v4(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Coupon")));
    }

    #[tokio::test]
    async fn expired_coupon_is_rejected() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.to_date = (now - Duration::minutes(1)).fixed_offset();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![c]])
            .into_connection();
        let err = validate_coupon(&db, "summer", Uuid::new_v4(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn disabled_coupon_is_rejected() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.is_enabled = false;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![c]])
            .into_connection();
        let err = validate_coupon(&db, "summer", Uuid::new_v4(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn unassigned_user_is_forbidden() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![coupon(now)]])
            .append_query_results([Vec::<coupon_users::Model>::new()])
            .into_connection();
        let err = validate_coupon(&db, "summer", Uuid::new_v4(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn usage_cap_is_enforced() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let c = coupon(now);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![c.clone()]])
            .append_query_results([vec![assignment(c.id, user, 2)]])
            .into_connection();
        let err = validate_coupon(&db, "summer", user, now).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn terms_require_an_ordered_window() {
        let now = Utc::now();
        assert!(check_terms(dec!(10), true, false, now, now + Duration::days(1)).is_ok());
        assert!(check_terms(dec!(10), true, false, now, now).is_err());
        assert!(check_terms(dec!(150), false, true, now, now + Duration::days(1)).is_err());
        assert!(check_terms(dec!(10), true, true, now, now + Duration::days(1)).is_err());
    }
}
