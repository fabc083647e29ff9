use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Product,
};

pub const MAX_IMAGES: usize = 5;
pub const MAX_STOCK: i32 = 100_000;
pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 100;

/// Multipart body for product creation. `specs` is a JSON object string and
/// `image` may repeat up to five times.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
#[schema(rename_all = "camelCase")]
pub struct ProductUpload {
    pub title: String,
    pub description: String,
    pub base_price: String,
    pub discount: Option<String>,
    pub stock: i32,
    pub specs: Option<String>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub image: Vec<String>,
}

/// Multipart body for product updates. Every part is optional; a new `image`
/// replaces the one identified by `oldPublicId`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
#[schema(rename_all = "camelCase")]
pub struct ProductUpdateUpload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub base_price: Option<String>,
    pub discount: Option<String>,
    pub stock: Option<i32>,
    pub specs: Option<String>,
    pub old_public_id: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductTarget {
    pub category_id: Uuid,
    pub sub_category_id: Uuid,
    pub brand_id: Uuid,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

pub fn validate_title(title: &str) -> AppResult<()> {
    let len = title.chars().count();
    if !(TITLE_MIN..=TITLE_MAX).contains(&len) {
        return Err(AppError::Validation(vec![format!(
            "title: must be between {TITLE_MIN} and {TITLE_MAX} characters"
        )]));
    }
    Ok(())
}

pub fn validate_stock(stock: i32) -> AppResult<()> {
    if !(0..=MAX_STOCK).contains(&stock) {
        return Err(AppError::Validation(vec![format!(
            "stock: must be between 0 and {MAX_STOCK}"
        )]));
    }
    Ok(())
}

/// `specs` arrives as a JSON string and must decode to an object.
pub fn parse_specs(raw: Option<&str>) -> AppResult<Option<serde_json::Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() => Ok(Some(value)),
        _ => Err(AppError::Validation(vec![
            "specs: must be a JSON object".into(),
        ])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specs_must_be_an_object() {
        assert!(parse_specs(None).unwrap().is_none());
        let specs = parse_specs(Some(r#"{"ram":"16GB"}"#)).unwrap().unwrap();
        assert_eq!(specs["ram"], "16GB");
        assert!(parse_specs(Some("[1,2]")).is_err());
        assert!(parse_specs(Some("not json")).is_err());
    }

    #[test]
    fn stock_is_bounded() {
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(MAX_STOCK).is_ok());
        assert!(validate_stock(-1).is_err());
        assert!(validate_stock(MAX_STOCK + 1).is_err());
    }
}
