use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::prelude::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{
        brands, cart_items, categories, coupon_users, coupons,
        enums::{CouponStatus, OrderStatus, PaymentMethod, Role},
        order_items, orders, products, reviews, sub_categories, users,
    },
    storage::StoredAsset,
};

fn strings(value: &Json) -> Vec<String> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

fn image(url: Option<String>, public_id: Option<String>) -> Option<StoredAsset> {
    match (url, public_id) {
        (Some(secure_url), Some(public_id)) => Some(StoredAsset {
            secure_url,
            public_id,
        }),
        _ => None,
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone_numbers: Vec<String>,
    pub addresses: Vec<String>,
    pub role: Role,
    pub age: Option<i32>,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(m: users::Model) -> Self {
        Self {
            phone_numbers: strings(&m.phone_numbers),
            addresses: strings(&m.addresses),
            id: m.id,
            username: m.username,
            email: m.email,
            role: m.role,
            age: m.age,
            is_email_verified: m.is_email_verified,
            created_at: m.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub image: Option<StoredAsset>,
    pub folder_id: String,
    pub added_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<categories::Model> for Category {
    fn from(m: categories::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
            image: image(m.image_secure_url, m.image_public_id),
            folder_id: m.folder_id,
            added_by: m.added_by,
            updated_by: m.updated_by,
            created_at: m.created_at.with_timezone(&Utc),
            updated_at: m.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubCategory {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub image: Option<StoredAsset>,
    pub folder_id: String,
    pub category_id: Uuid,
    pub added_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<sub_categories::Model> for SubCategory {
    fn from(m: sub_categories::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
            image: image(m.image_secure_url, m.image_public_id),
            folder_id: m.folder_id,
            category_id: m.category_id,
            added_by: m.added_by,
            updated_by: m.updated_by,
            created_at: m.created_at.with_timezone(&Utc),
            updated_at: m.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub image: Option<StoredAsset>,
    pub folder_id: String,
    pub category_id: Uuid,
    pub sub_category_id: Uuid,
    pub added_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<brands::Model> for Brand {
    fn from(m: brands::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
            image: image(m.image_secure_url, m.image_public_id),
            folder_id: m.folder_id,
            category_id: m.category_id,
            sub_category_id: m.sub_category_id,
            added_by: m.added_by,
            updated_by: m.updated_by,
            created_at: m.created_at.with_timezone(&Utc),
            updated_at: m.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub folder_id: String,
    pub base_price: Decimal,
    pub discount: Decimal,
    pub applied_price: Decimal,
    pub stock: i32,
    pub rate: Decimal,
    pub rate_count: i32,
    pub images: Vec<StoredAsset>,
    #[schema(value_type = Object)]
    pub specs: serde_json::Value,
    pub category_id: Uuid,
    pub sub_category_id: Uuid,
    pub brand_id: Uuid,
    pub added_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<products::Model> for Product {
    fn from(m: products::Model) -> Self {
        Self {
            images: serde_json::from_value(m.images.clone()).unwrap_or_default(),
            id: m.id,
            title: m.title,
            slug: m.slug,
            description: m.description,
            folder_id: m.folder_id,
            base_price: m.base_price,
            discount: m.discount,
            applied_price: m.applied_price,
            stock: m.stock,
            rate: m.rate,
            rate_count: m.rate_count,
            specs: m.specs,
            category_id: m.category_id,
            sub_category_id: m.sub_category_id,
            brand_id: m.brand_id,
            added_by: m.added_by,
            updated_by: m.updated_by,
            created_at: m.created_at.with_timezone(&Utc),
            updated_at: m.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub base_price: Decimal,
    pub final_price: Decimal,
}

impl From<cart_items::Model> for CartItem {
    fn from(m: cart_items::Model) -> Self {
        Self {
            product_id: m.product_id,
            title: m.title,
            quantity: m.quantity,
            base_price: m.base_price,
            final_price: m.final_price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sub_total: Decimal,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub coupon_code: String,
    pub coupon_amount: Decimal,
    pub coupon_status: CouponStatus,
    pub is_fixed: bool,
    pub is_percentage: bool,
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    pub is_enabled: bool,
    pub enabled_at: Option<DateTime<Utc>>,
    pub enabled_by: Option<Uuid>,
    pub disabled_at: Option<DateTime<Utc>>,
    pub disabled_by: Option<Uuid>,
    pub added_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<coupons::Model> for Coupon {
    fn from(m: coupons::Model) -> Self {
        Self {
            id: m.id,
            coupon_code: m.coupon_code,
            coupon_amount: m.coupon_amount,
            coupon_status: m.coupon_status,
            is_fixed: m.is_fixed,
            is_percentage: m.is_percentage,
            from_date: m.from_date.with_timezone(&Utc),
            to_date: m.to_date.with_timezone(&Utc),
            is_enabled: m.is_enabled,
            enabled_at: m.enabled_at.map(|d| d.with_timezone(&Utc)),
            enabled_by: m.enabled_by,
            disabled_at: m.disabled_at.map(|d| d.with_timezone(&Utc)),
            disabled_by: m.disabled_by,
            added_by: m.added_by,
            updated_by: m.updated_by,
            created_at: m.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponUser {
    pub user_id: Uuid,
    pub max_usage: i32,
    pub usage_count: i32,
}

impl From<coupon_users::Model> for CouponUser {
    fn from(m: coupon_users::Model) -> Self {
        Self {
            user_id: m.user_id,
            max_usage: m.max_usage,
            usage_count: m.usage_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub coupon_id: Option<Uuid>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone_numbers: Vec<String>,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub delivered_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(m: orders::Model) -> Self {
        Self {
            phone_numbers: strings(&m.phone_numbers),
            id: m.id,
            user_id: m.user_id,
            coupon_id: m.coupon_id,
            address: m.address,
            city: m.city,
            postal_code: m.postal_code,
            country: m.country,
            shipping_price: m.shipping_price,
            total_price: m.total_price,
            payment_method: m.payment_method,
            status: m.status,
            paid_at: m.paid_at.map(|d| d.with_timezone(&Utc)),
            delivered_at: m.delivered_at.map(|d| d.with_timezone(&Utc)),
            delivered_by: m.delivered_by,
            cancelled_at: m.cancelled_at.map(|d| d.with_timezone(&Utc)),
            created_at: m.created_at.with_timezone(&Utc),
            updated_at: m.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub price: Decimal,
}

impl From<order_items::Model> for OrderItem {
    fn from(m: order_items::Model) -> Self {
        Self {
            id: m.id,
            product_id: m.product_id,
            title: m.title,
            quantity: m.quantity,
            price: m.price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub review_rate: i16,
    pub review_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<reviews::Model> for Review {
    fn from(m: reviews::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            product_id: m.product_id,
            review_rate: m.review_rate,
            review_comment: m.review_comment,
            created_at: m.created_at.with_timezone(&Utc),
            updated_at: m.updated_at.with_timezone(&Utc),
        }
    }
}
