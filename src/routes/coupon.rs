use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::coupons::{
        AddCouponRequest, CouponList, CouponWithUsers, UpdateCouponRequest,
        ValidateCouponRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Coupon,
    query::ListQuery,
    response::ApiResponse,
    services::coupon_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_coupons).post(add_coupon))
        .route("/valid", post(validate_coupon))
        .route("/enabled", get(list_enabled))
        .route("/disabled", get(list_disabled))
        .route("/{id}/enable", put(enable_coupon))
        .route("/{id}/disable", put(disable_coupon))
        .route(
            "/{id}",
            get(get_coupon).put(update_coupon).delete(delete_coupon),
        )
}

#[utoipa::path(
    post,
    path = "/api/coupon",
    request_body = AddCouponRequest,
    responses(
        (status = 201, description = "Coupon created with its users", body = ApiResponse<CouponWithUsers>),
        (status = 400, description = "Invalid coupon terms"),
        (status = 404, description = "Assigned user not found"),
        (status = 409, description = "Coupon code already taken")
    ),
    security(("access_token" = [])),
    tag = "Coupons"
)]
pub async fn add_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddCouponRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CouponWithUsers>>)> {
    let resp = coupon_service::add_coupon(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/coupon/valid",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Coupon usable by the caller", body = ApiResponse<Coupon>),
        (status = 400, description = "Expired, not started, disabled or used up"),
        (status = 403, description = "Coupon not assigned to the caller"),
        (status = 404, description = "Unknown coupon")
    ),
    security(("access_token" = [])),
    tag = "Coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ValidateCouponRequest>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp = coupon_service::check_coupon(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/coupon/{id}",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    request_body = UpdateCouponRequest,
    responses(
        (status = 200, description = "Coupon updated", body = ApiResponse<Coupon>),
        (status = 404, description = "Coupon not found"),
        (status = 409, description = "Coupon code already taken")
    ),
    security(("access_token" = [])),
    tag = "Coupons"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCouponRequest>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp = coupon_service::update_coupon(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/coupon/{id}",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon deleted"),
        (status = 404, description = "Coupon not found")
    ),
    security(("access_token" = [])),
    tag = "Coupons"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = coupon_service::delete_coupon(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/coupon/{id}/enable",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon enabled", body = ApiResponse<Coupon>),
        (status = 400, description = "Already enabled")
    ),
    security(("access_token" = [])),
    tag = "Coupons"
)]
pub async fn enable_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp = coupon_service::set_enabled(&state, &user, id, true).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/coupon/{id}/disable",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon disabled", body = ApiResponse<Coupon>),
        (status = 400, description = "Already disabled")
    ),
    security(("access_token" = [])),
    tag = "Coupons"
)]
pub async fn disable_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp = coupon_service::set_enabled(&state, &user, id, false).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupon",
    params(ListQuery),
    responses(
        (status = 200, description = "List coupons", body = ApiResponse<CouponList>)
    ),
    security(("access_token" = [])),
    tag = "Coupons"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let resp = coupon_service::list_coupons(&state, &user, None, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupon/enabled",
    params(ListQuery),
    responses(
        (status = 200, description = "List enabled coupons", body = ApiResponse<CouponList>)
    ),
    security(("access_token" = [])),
    tag = "Coupons"
)]
pub async fn list_enabled(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let resp = coupon_service::list_coupons(&state, &user, Some(true), query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupon/disabled",
    params(ListQuery),
    responses(
        (status = 200, description = "List disabled coupons", body = ApiResponse<CouponList>)
    ),
    security(("access_token" = [])),
    tag = "Coupons"
)]
pub async fn list_disabled(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let resp = coupon_service::list_coupons(&state, &user, Some(false), query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupon/{id}",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon with assigned users", body = ApiResponse<CouponWithUsers>),
        (status = 404, description = "Coupon not found")
    ),
    security(("access_token" = [])),
    tag = "Coupons"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CouponWithUsers>>> {
    let resp = coupon_service::get_coupon(&state, &user, id).await?;
    Ok(Json(resp))
}
