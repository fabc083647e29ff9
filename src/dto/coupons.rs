use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{Coupon, CouponUser};

/// Codes are stored trimmed and lowercased, so the length bound applies to
/// that form.
fn validate_coupon_code(code: &str) -> Result<(), ValidationError> {
    let len = code.trim().chars().count();
    if (3..=20).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::new("length")
            .with_message("coupon code must be between 3 and 20 characters".into()))
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CouponUserInput {
    pub user_id: Uuid,
    #[validate(range(min = 1))]
    pub max_usage: i32,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddCouponRequest {
    #[validate(custom(function = "validate_coupon_code"))]
    pub coupon_code: String,
    pub coupon_amount: Decimal,
    #[serde(default)]
    pub is_fixed: bool,
    #[serde(default)]
    pub is_percentage: bool,
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    #[serde(default)]
    #[validate(nested)]
    pub users: Vec<CouponUserInput>,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponRequest {
    #[validate(custom(function = "validate_coupon_code"))]
    pub coupon_code: Option<String>,
    pub coupon_amount: Option<Decimal>,
    pub is_fixed: Option<bool>,
    pub is_percentage: Option<bool>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    #[validate(custom(function = "validate_coupon_code"))]
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponWithUsers {
    pub coupon: Coupon,
    pub users: Vec<CouponUser>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CouponList {
    #[schema(value_type = Vec<Coupon>)]
    pub items: Vec<Coupon>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_length_ignores_surrounding_whitespace() {
        assert!(validate_coupon_code("  ab ").is_err());
        assert!(validate_coupon_code(" abc ").is_ok());
        assert!(validate_coupon_code("  SUMMER2025SALE-XMAS  ").is_ok());
        assert!(validate_coupon_code("SUMMER2025SALE-XMAS-X").is_err());
    }

    #[test]
    fn update_checks_trimmed_code() {
        let short = UpdateCouponRequest {
            coupon_code: Some("  ab ".into()),
            ..Default::default()
        };
        assert!(short.validate().is_err());
        assert!(UpdateCouponRequest::default().validate().is_ok());
    }
}
