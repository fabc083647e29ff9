//! Categories, sub-categories and brands share the same upload shape.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::{Brand, Category, SubCategory};

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 20;

/// Multipart body: a `name` field and an `image` file.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CatalogUpload {
    pub name: String,
    #[schema(value_type = String, format = Binary)]
    pub image: String,
}

/// Multipart body for updates: all parts optional. `oldPublicId` names the
/// image being replaced.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
#[schema(rename_all = "camelCase")]
pub struct CatalogUpdateUpload {
    pub name: Option<String>,
    pub old_public_id: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BrandTarget {
    pub category_id: Uuid,
    pub sub_category_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CategoryList {
    #[schema(value_type = Vec<Category>)]
    pub items: Vec<Category>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct SubCategoryList {
    #[schema(value_type = Vec<SubCategory>)]
    pub items: Vec<SubCategory>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct BrandList {
    #[schema(value_type = Vec<Brand>)]
    pub items: Vec<Brand>,
}

pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn validate_name(name: &str) -> crate::error::AppResult<()> {
    let len = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(crate::error::AppError::Validation(vec![format!(
            "name: must be between {NAME_MIN} and {NAME_MAX} characters"
        )]));
    }
    Ok(())
}
