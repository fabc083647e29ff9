pub mod auth_service;
pub mod brand_service;
pub mod cart_service;
pub mod category_service;
pub mod coupon_service;
pub mod media;
pub mod order_service;
pub mod product_service;
pub mod review_service;
pub mod sub_category_service;
pub mod user_service;
