use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::catalog::{BrandList, BrandTarget, CatalogUpdateUpload, CatalogUpload},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Brand,
    query::ListQuery,
    response::ApiResponse,
    rollback::RollbackLog,
    services::brand_service,
    state::AppState,
    uploads::stage_multipart,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_brands).post(create_brand))
        .route("/subCategory/{sub_category_id}", get(list_by_sub_category))
        .route("/category/{category_id}", get(list_by_category))
        .route("/{id}", put(update_brand).delete(delete_brand))
}

#[utoipa::path(
    post,
    path = "/api/brand",
    params(BrandTarget),
    request_body(content = CatalogUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Brand created", body = ApiResponse<Brand>),
        (status = 400, description = "Sub-category is not in the category"),
        (status = 404, description = "SubCategory not found"),
        (status = 409, description = "Brand name already taken in the sub-category")
    ),
    security(("access_token" = [])),
    tag = "Brands"
)]
pub async fn create_brand(
    State(state): State<AppState>,
    Extension(rollback): Extension<RollbackLog>,
    user: AuthUser,
    Query(target): Query<BrandTarget>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Brand>>)> {
    let form = stage_multipart(multipart, &state.config.upload_dir, &rollback).await?;
    let resp = brand_service::create_brand(&state, &user, &rollback, target, form).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/brand/{id}",
    params(
        ("id" = Uuid, Path, description = "Brand ID"),
        BrandTarget
    ),
    request_body(content = CatalogUpdateUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Brand updated", body = ApiResponse<Brand>),
        (status = 400, description = "Brand is not in the given sub-category"),
        (status = 403, description = "Only the owner or a super admin"),
        (status = 404, description = "Brand not found")
    ),
    security(("access_token" = [])),
    tag = "Brands"
)]
pub async fn update_brand(
    State(state): State<AppState>,
    Extension(rollback): Extension<RollbackLog>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(target): Query<BrandTarget>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Brand>>> {
    let form = stage_multipart(multipart, &state.config.upload_dir, &rollback).await?;
    let resp = brand_service::update_brand(&state, &user, id, target, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/brand/{id}",
    params(("id" = Uuid, Path, description = "Brand ID")),
    responses(
        (status = 200, description = "Brand and its products deleted"),
        (status = 403, description = "Only the owner or a super admin"),
        (status = 404, description = "Brand not found")
    ),
    security(("access_token" = [])),
    tag = "Brands"
)]
pub async fn delete_brand(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = brand_service::delete_brand(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/brand",
    params(ListQuery),
    responses(
        (status = 200, description = "List brands", body = ApiResponse<BrandList>)
    ),
    tag = "Brands"
)]
pub async fn list_brands(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<BrandList>>> {
    let resp = brand_service::list_brands(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/brand/subCategory/{subCategoryId}",
    params(
        ("subCategoryId" = Uuid, Path, description = "SubCategory ID"),
        ListQuery
    ),
    responses(
        (status = 200, description = "Brands of a sub-category", body = ApiResponse<BrandList>),
        (status = 404, description = "SubCategory not found")
    ),
    tag = "Brands"
)]
pub async fn list_by_sub_category(
    State(state): State<AppState>,
    Path(sub_category_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<BrandList>>> {
    let resp = brand_service::list_by_sub_category(&state, sub_category_id, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/brand/category/{categoryId}",
    params(
        ("categoryId" = Uuid, Path, description = "Category ID"),
        ListQuery
    ),
    responses(
        (status = 200, description = "Brands of a category", body = ApiResponse<BrandList>),
        (status = 404, description = "Category not found")
    ),
    tag = "Brands"
)]
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<BrandList>>> {
    let resp = brand_service::list_by_category(&state, category_id, query).await?;
    Ok(Json(resp))
}
