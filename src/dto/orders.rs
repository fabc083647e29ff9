use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::validate_phone_numbers,
    entity::enums::PaymentMethod,
    models::{Order, OrderItem},
};

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(min = 1))]
    pub country: String,
    #[validate(length(min = 1), custom(function = "validate_phone_numbers"))]
    pub phone_numbers: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 3))]
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(flatten)]
    #[validate(nested)]
    pub shipping: ShippingDetails,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartToOrderRequest {
    #[validate(length(min = 3))]
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(flatten)]
    #[validate(nested)]
    pub shipping: ShippingDetails,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}
