use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEvent},
    dto::catalog::{CategoryList, slugify, validate_name},
    entity::{Brands, Categories, Products, SubCategories, brands, categories, products, sub_categories},
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::AuthUser,
    models::Category,
    policy::{Action, authorize},
    query::{ListQuery, fetch_page},
    response::{ApiResponse, Meta},
    rollback::{RecordKind, RollbackLog},
    services::media::{drop_folder, store_image},
    state::AppState,
    storage::{category_folder, new_folder_id},
    uploads::MultipartForm,
};

const DUPLICATE_NAME: &str = "Category name is already taken";

async fn find_category(state: &AppState, id: Uuid) -> AppResult<categories::Model> {
    Categories::find_by_id(id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Category"))
}

async fn name_taken(state: &AppState, name: &str) -> AppResult<bool> {
    Ok(Categories::find()
        .filter(categories::Column::Name.eq(name))
        .one(&*state.orm)
        .await?
        .is_some())
}

/// Creates the row first, tags it for rollback, then uploads the image.
/// A failed upload fails the request and the middleware removes the row and
/// the folder again.
pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    rollback: &RollbackLog,
    form: MultipartForm,
) -> AppResult<ApiResponse<Category>> {
    authorize(&user.actor(), None, Action::CreateCatalog)?;

    let name = form.require("name")?.to_string();
    validate_name(&name)?;
    let image = form
        .single_file("image")?
        .ok_or_else(|| AppError::bad_request("image is required"))?;

    if name_taken(state, &name).await? {
        return Err(AppError::Conflict(DUPLICATE_NAME.into()));
    }

    let now = Utc::now().fixed_offset();
    let folder_id = new_folder_id();
    let category = categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(slugify(&name)),
        name: Set(name),
        image_secure_url: Set(None),
        image_public_id: Set(None),
        folder_id: Set(folder_id.clone()),
        added_by: Set(user.user_id),
        updated_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.orm)
    .await
    .map_err(|e| conflict_on_unique(e, DUPLICATE_NAME))?;
    rollback.delete_record(RecordKind::Category, category.id);

    let folder = category_folder(&state.config.main_folder, &folder_id);
    rollback.delete_folder(folder.clone());
    let asset = store_image(state, image, &folder, None).await?;

    let mut active: categories::ActiveModel = category.into();
    active.image_secure_url = Set(Some(asset.secure_url));
    active.image_public_id = Set(Some(asset.public_id));
    let category = active.update(&*state.orm).await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "category_create", "categories")
            .with_metadata(serde_json::json!({ "category_id": category.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Category created",
        Category::from(category),
        Some(Meta::empty()),
    ))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    form: MultipartForm,
) -> AppResult<ApiResponse<Category>> {
    let current = find_category(state, id).await?;
    authorize(&user.actor(), Some(current.added_by), Action::ModifyCatalog)?;

    let new_name = form.text("name").map(str::to_string);
    if let Some(name) = &new_name {
        validate_name(name)?;
        if *name == current.name {
            return Err(AppError::bad_request(
                "please enter a different category name",
            ));
        }
        if name_taken(state, name).await? {
            return Err(AppError::Conflict(DUPLICATE_NAME.into()));
        }
    }
    let image = form.single_file("image")?;

    let folder = category_folder(&state.config.main_folder, &current.folder_id);
    let replaced = match image {
        Some(file) => {
            let public_id = replacement_public_id(
                form.text("oldPublicId"),
                current.image_public_id.as_deref(),
            )?;
            Some(store_image(state, file, &folder, public_id.as_deref()).await?)
        }
        None => None,
    };

    let mut active: categories::ActiveModel = current.into();
    if let Some(name) = new_name {
        active.slug = Set(slugify(&name));
        active.name = Set(name);
    }
    if let Some(asset) = replaced {
        active.image_secure_url = Set(Some(asset.secure_url));
        active.image_public_id = Set(Some(asset.public_id));
    }
    active.updated_by = Set(Some(user.user_id));
    active.updated_at = Set(Utc::now().fixed_offset());
    let category = active
        .update(&*state.orm)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_NAME))?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "category_update", "categories")
            .with_metadata(serde_json::json!({ "category_id": category.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Category updated",
        Category::from(category),
        Some(Meta::empty()),
    ))
}

/// Image replacement reuses the stored public id so URLs stay stable. When the
/// caller names the image being replaced it must be the stored one.
pub(crate) fn replacement_public_id(
    claimed: Option<&str>,
    stored: Option<&str>,
) -> AppResult<Option<String>> {
    match (claimed, stored) {
        (Some(claimed), Some(stored)) if claimed != stored => {
            Err(AppError::bad_request("oldPublicId does not match the current image"))
        }
        (_, stored) => Ok(stored.map(str::to_string)),
    }
}

pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let current = find_category(state, id).await?;
    authorize(&user.actor(), Some(current.added_by), Action::ModifyCatalog)?;

    let txn = state.orm.begin().await?;
    let removed_products = Products::delete_many()
        .filter(products::Column::CategoryId.eq(id))
        .exec(&txn)
        .await?
        .rows_affected;
    Brands::delete_many()
        .filter(brands::Column::CategoryId.eq(id))
        .exec(&txn)
        .await?;
    SubCategories::delete_many()
        .filter(sub_categories::Column::CategoryId.eq(id))
        .exec(&txn)
        .await?;
    Categories::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    drop_folder(
        state,
        &category_folder(&state.config.main_folder, &current.folder_id),
    )
    .await;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "category_delete", "categories").with_metadata(
            serde_json::json!({ "category_id": id, "products_removed": removed_products }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Category deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_categories(
    state: &AppState,
    query: ListQuery,
) -> AppResult<ApiResponse<CategoryList>> {
    let (rows, meta) = fetch_page(&*state.orm, Categories::find(), &query).await?;
    Ok(ApiResponse::success(
        "Categories",
        CategoryList {
            items: rows.into_iter().map(Category::from).collect(),
        },
        Some(meta),
    ))
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Category>> {
    let category = find_category(state, id).await?;
    Ok(ApiResponse::success(
        "Category",
        Category::from(category),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_keeps_the_stored_public_id() {
        let id = replacement_public_id(None, Some("ecommerce/Categories/ab12/x9"))
            .unwrap();
        assert_eq!(id.as_deref(), Some("ecommerce/Categories/ab12/x9"));

        let id = replacement_public_id(Some("p1"), Some("p1")).unwrap();
        assert_eq!(id.as_deref(), Some("p1"));
    }

    #[test]
    fn mismatched_old_public_id_is_rejected() {
        let err = replacement_public_id(Some("other"), Some("p1")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn missing_stored_image_uploads_fresh() {
        assert_eq!(replacement_public_id(Some("p1"), None).unwrap(), None);
    }
}
