use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::catalog::{CatalogUpdateUpload, CatalogUpload, CategoryList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Category,
    query::ListQuery,
    response::ApiResponse,
    rollback::RollbackLog,
    services::category_service,
    state::AppState,
    uploads::stage_multipart,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

#[utoipa::path(
    post,
    path = "/api/category",
    request_body(content = CatalogUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Category created", body = ApiResponse<Category>),
        (status = 409, description = "Category name already taken")
    ),
    security(("access_token" = [])),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Extension(rollback): Extension<RollbackLog>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    let form = stage_multipart(multipart, &state.config.upload_dir, &rollback).await?;
    let resp = category_service::create_category(&state, &user, &rollback, form).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/category/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body(content = CatalogUpdateUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<Category>),
        (status = 400, description = "Name unchanged or image mismatch"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category name already taken")
    ),
    security(("access_token" = [])),
    tag = "Categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Extension(rollback): Extension<RollbackLog>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Category>>> {
    let form = stage_multipart(multipart, &state.config.upload_dir, &rollback).await?;
    let resp = category_service::update_category(&state, &user, id, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/category/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category and everything under it deleted"),
        (status = 404, description = "Category not found")
    ),
    security(("access_token" = [])),
    tag = "Categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = category_service::delete_category(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/category",
    params(ListQuery),
    responses(
        (status = 200, description = "List categories", body = ApiResponse<CategoryList>)
    ),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let resp = category_service::list_categories(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/category/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Get category", body = ApiResponse<Category>),
        (status = 404, description = "Category not found")
    ),
    tag = "Categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let resp = category_service::get_category(&state, id).await?;
    Ok(Json(resp))
}
