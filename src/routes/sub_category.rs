use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::catalog::{CatalogUpdateUpload, CatalogUpload, SubCategoryList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::SubCategory,
    query::ListQuery,
    response::ApiResponse,
    rollback::RollbackLog,
    services::sub_category_service,
    state::AppState,
    uploads::stage_multipart,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sub_categories))
        .route("/category/{category_id}", get(list_by_category))
        // POST takes the parent category id; the other verbs take the
        // sub-category's own id.
        .route(
            "/{id}",
            get(get_sub_category)
                .post(create_sub_category)
                .put(update_sub_category)
                .delete(delete_sub_category),
        )
}

#[utoipa::path(
    post,
    path = "/api/subCategory/{categoryId}",
    params(("categoryId" = Uuid, Path, description = "Parent category ID")),
    request_body(content = CatalogUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "SubCategory created", body = ApiResponse<SubCategory>),
        (status = 404, description = "Category not found"),
        (status = 409, description = "SubCategory name already taken")
    ),
    security(("access_token" = [])),
    tag = "SubCategories"
)]
pub async fn create_sub_category(
    State(state): State<AppState>,
    Extension(rollback): Extension<RollbackLog>,
    user: AuthUser,
    Path(category_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<SubCategory>>)> {
    let form = stage_multipart(multipart, &state.config.upload_dir, &rollback).await?;
    let resp =
        sub_category_service::create_sub_category(&state, &user, &rollback, category_id, form)
            .await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/subCategory/{id}",
    params(("id" = Uuid, Path, description = "SubCategory ID")),
    request_body(content = CatalogUpdateUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "SubCategory updated", body = ApiResponse<SubCategory>),
        (status = 404, description = "SubCategory not found"),
        (status = 409, description = "SubCategory name already taken")
    ),
    security(("access_token" = [])),
    tag = "SubCategories"
)]
pub async fn update_sub_category(
    State(state): State<AppState>,
    Extension(rollback): Extension<RollbackLog>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<SubCategory>>> {
    let form = stage_multipart(multipart, &state.config.upload_dir, &rollback).await?;
    let resp = sub_category_service::update_sub_category(&state, &user, id, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/subCategory/{id}",
    params(("id" = Uuid, Path, description = "SubCategory ID")),
    responses(
        (status = 200, description = "SubCategory, its brands and products deleted"),
        (status = 404, description = "SubCategory not found")
    ),
    security(("access_token" = [])),
    tag = "SubCategories"
)]
pub async fn delete_sub_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = sub_category_service::delete_sub_category(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/subCategory",
    params(ListQuery),
    responses(
        (status = 200, description = "List sub-categories", body = ApiResponse<SubCategoryList>)
    ),
    tag = "SubCategories"
)]
pub async fn list_sub_categories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<SubCategoryList>>> {
    let resp = sub_category_service::list_sub_categories(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/subCategory/category/{categoryId}",
    params(
        ("categoryId" = Uuid, Path, description = "Category ID"),
        ListQuery
    ),
    responses(
        (status = 200, description = "Sub-categories of a category", body = ApiResponse<SubCategoryList>),
        (status = 404, description = "Category not found")
    ),
    tag = "SubCategories"
)]
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<SubCategoryList>>> {
    let resp = sub_category_service::list_by_category(&state, category_id, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/subCategory/{id}",
    params(("id" = Uuid, Path, description = "SubCategory ID")),
    responses(
        (status = 200, description = "Get sub-category", body = ApiResponse<SubCategory>),
        (status = 404, description = "SubCategory not found")
    ),
    tag = "SubCategories"
)]
pub async fn get_sub_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SubCategory>>> {
    let resp = sub_category_service::get_sub_category(&state, id).await?;
    Ok(Json(resp))
}
