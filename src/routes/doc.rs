use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{ApiKey, ApiKeyValue, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            ForgotPasswordRequest, ResetPasswordRequest, SignInRequest, SignInResponse,
            SignUpRequest,
        },
        cart::AddToCartRequest,
        catalog::{BrandList, CatalogUpdateUpload, CatalogUpload, CategoryList, SubCategoryList},
        coupons::{
            AddCouponRequest, CouponList, CouponUserInput, CouponWithUsers, UpdateCouponRequest,
            ValidateCouponRequest,
        },
        orders::{CartToOrderRequest, CreateOrderRequest, OrderList, OrderWithItems, ShippingDetails},
        products::{ProductList, ProductUpdateUpload, ProductUpload},
        reviews::{AddReviewRequest, ReviewList, UpdateReviewRequest},
        users::{UpdateProfileRequest, UserList},
    },
    entity::enums::{CouponStatus, OrderStatus, PaymentMethod, Role},
    models::{
        Brand, Cart, CartItem, Category, Coupon, CouponUser, Order, OrderItem, Product, Review,
        SubCategory, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        auth, brand, cart, category, coupon, health, order, product, review, sub_category, user,
    },
};

/// Tokens travel in the `accesstoken` header as `<prefix><jwt>`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "access_token",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("accesstoken"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::sign_up,
        auth::verify_email,
        auth::sign_in,
        auth::forgot_password,
        auth::reset_password,
        user::update_profile,
        user::delete_user,
        user::list_users,
        category::create_category,
        category::update_category,
        category::delete_category,
        category::list_categories,
        category::get_category,
        sub_category::create_sub_category,
        sub_category::update_sub_category,
        sub_category::delete_sub_category,
        sub_category::list_sub_categories,
        sub_category::list_by_category,
        sub_category::get_sub_category,
        brand::create_brand,
        brand::update_brand,
        brand::delete_brand,
        brand::list_brands,
        brand::list_by_sub_category,
        brand::list_by_category,
        product::create_product,
        product::update_product,
        product::delete_product,
        product::list_products,
        product::get_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::remove_from_cart,
        coupon::add_coupon,
        coupon::validate_coupon,
        coupon::update_coupon,
        coupon::delete_coupon,
        coupon::enable_coupon,
        coupon::disable_coupon,
        coupon::list_coupons,
        coupon::list_enabled,
        coupon::list_disabled,
        coupon::get_coupon,
        order::create_order,
        order::cart_to_order,
        order::pay_order,
        order::cancel_order,
        order::deliver_order,
        order::list_orders,
        order::get_order,
        review::add_review,
        review::update_review,
        review::list_reviews
    ),
    components(
        schemas(
            Role,
            OrderStatus,
            PaymentMethod,
            CouponStatus,
            User,
            Category,
            SubCategory,
            Brand,
            Product,
            Cart,
            CartItem,
            Coupon,
            CouponUser,
            Order,
            OrderItem,
            Review,
            SignUpRequest,
            SignInRequest,
            SignInResponse,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            UpdateProfileRequest,
            UserList,
            CatalogUpload,
            CatalogUpdateUpload,
            CategoryList,
            SubCategoryList,
            BrandList,
            ProductUpload,
            ProductUpdateUpload,
            ProductList,
            AddToCartRequest,
            AddCouponRequest,
            CouponUserInput,
            UpdateCouponRequest,
            ValidateCouponRequest,
            CouponWithUsers,
            CouponList,
            ShippingDetails,
            CreateOrderRequest,
            CartToOrderRequest,
            OrderWithItems,
            OrderList,
            AddReviewRequest,
            UpdateReviewRequest,
            ReviewList,
            Meta,
            ApiResponse<User>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Cart>,
            ApiResponse<Coupon>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Sign up, sign in and password recovery"),
        (name = "Users", description = "Profile and account endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "SubCategories", description = "Sub-category endpoints"),
        (name = "Brands", description = "Brand endpoints"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Coupons", description = "Coupon administration and validation"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Reviews", description = "Product review endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_router_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/sign-in",
            "/api/category/{id}",
            "/api/brand/subCategory/{subCategoryId}",
            "/api/coupon/valid",
            "/api/order/cancel/{id}",
            "/api/review",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        // The mailed verification link must hit a documented route.
        let link = crate::services::auth_service::verification_link("http://host", "t");
        let route = link
            .trim_start_matches("http://host")
            .split('?')
            .next()
            .unwrap_or_default();
        assert!(doc.paths.paths.contains_key(route), "missing {route}");

        let schemes = doc.components.expect("components").security_schemes;
        assert!(schemes.contains_key("access_token"));
    }
}
