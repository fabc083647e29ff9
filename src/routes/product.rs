use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::products::{ProductList, ProductTarget, ProductUpdateUpload, ProductUpload},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Product,
    query::ListQuery,
    response::ApiResponse,
    rollback::RollbackLog,
    services::product_service,
    state::AppState,
    uploads::stage_multipart,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[utoipa::path(
    post,
    path = "/api/product",
    params(ProductTarget),
    request_body(content = ProductUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Product created", body = ApiResponse<Product>),
        (status = 400, description = "Invalid fields, images or brand placement"),
        (status = 403, description = "Only the brand owner or a super admin"),
        (status = 404, description = "Brand not found"),
        (status = 409, description = "Product title already taken")
    ),
    security(("access_token" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(rollback): Extension<RollbackLog>,
    user: AuthUser,
    Query(target): Query<ProductTarget>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let form = stage_multipart(multipart, &state.config.upload_dir, &rollback).await?;
    let resp = product_service::create_product(&state, &user, &rollback, target, form).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/product/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body(content = ProductUpdateUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 403, description = "Only the owner or a super admin"),
        (status = 404, description = "Product not found")
    ),
    security(("access_token" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Extension(rollback): Extension<RollbackLog>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    let form = stage_multipart(multipart, &state.config.upload_dir, &rollback).await?;
    let resp = product_service::update_product(&state, &user, id, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/product/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 403, description = "Only the owner or a super admin"),
        (status = 404, description = "Product not found")
    ),
    security(("access_token" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/product",
    params(ListQuery),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/product/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}
