use axum::Router;

use crate::{middleware::rollback::rollback_on_failure, state::AppState};

pub mod auth;
pub mod brand;
pub mod cart;
pub mod category;
pub mod coupon;
pub mod doc;
pub mod health;
pub mod order;
pub mod product;
pub mod review;
pub mod sub_category;
pub mod user;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/user", user::router())
        .nest("/category", category::router())
        .nest("/subCategory", sub_category::router())
        .nest("/brand", brand::router())
        .nest("/product", product::router())
        .nest("/cart", cart::router())
        .nest("/coupon", coupon::router())
        .nest("/order", order::router())
        .nest("/review", review::router())
}

/// API router with the request-scoped rollback middleware attached.
pub fn create_app_router(state: &AppState) -> Router<AppState> {
    create_api_router().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        rollback_on_failure,
    ))
}
