use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEvent},
    dto::catalog::{SubCategoryList, slugify, validate_name},
    entity::{Brands, Categories, Products, SubCategories, brands, products, sub_categories},
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::AuthUser,
    models::SubCategory,
    policy::{Action, authorize},
    query::{ListQuery, fetch_page},
    response::{ApiResponse, Meta},
    rollback::{RecordKind, RollbackLog},
    services::{
        category_service::replacement_public_id,
        media::{drop_folder, store_image},
    },
    state::AppState,
    storage::{new_folder_id, sub_category_folder},
    uploads::MultipartForm,
};

const DUPLICATE_NAME: &str = "SubCategory name is already taken";

async fn find_sub_category(state: &AppState, id: Uuid) -> AppResult<sub_categories::Model> {
    SubCategories::find_by_id(id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("SubCategory"))
}

async fn name_taken(state: &AppState, name: &str) -> AppResult<bool> {
    Ok(SubCategories::find()
        .filter(sub_categories::Column::Name.eq(name))
        .one(&*state.orm)
        .await?
        .is_some())
}

/// Folder of a sub-category, which nests under its parent category's folder.
async fn folder_of(state: &AppState, sub_category: &sub_categories::Model) -> AppResult<String> {
    let category = Categories::find_by_id(sub_category.category_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    Ok(sub_category_folder(
        &state.config.main_folder,
        &category.folder_id,
        &sub_category.folder_id,
    ))
}

pub async fn create_sub_category(
    state: &AppState,
    user: &AuthUser,
    rollback: &RollbackLog,
    category_id: Uuid,
    form: MultipartForm,
) -> AppResult<ApiResponse<SubCategory>> {
    authorize(&user.actor(), None, Action::CreateCatalog)?;

    let name = form.require("name")?.to_string();
    validate_name(&name)?;
    let image = form
        .single_file("image")?
        .ok_or_else(|| AppError::bad_request("image is required"))?;

    let category = Categories::find_by_id(category_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    if name_taken(state, &name).await? {
        return Err(AppError::Conflict(DUPLICATE_NAME.into()));
    }

    let now = Utc::now().fixed_offset();
    let folder_id = new_folder_id();
    let sub_category = sub_categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(slugify(&name)),
        name: Set(name),
        image_secure_url: Set(None),
        image_public_id: Set(None),
        folder_id: Set(folder_id.clone()),
        category_id: Set(category.id),
        added_by: Set(user.user_id),
        updated_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.orm)
    .await
    .map_err(|e| conflict_on_unique(e, DUPLICATE_NAME))?;
    rollback.delete_record(RecordKind::SubCategory, sub_category.id);

    let folder = sub_category_folder(&state.config.main_folder, &category.folder_id, &folder_id);
    rollback.delete_folder(folder.clone());
    let asset = store_image(state, image, &folder, None).await?;

    let mut active: sub_categories::ActiveModel = sub_category.into();
    active.image_secure_url = Set(Some(asset.secure_url));
    active.image_public_id = Set(Some(asset.public_id));
    let sub_category = active.update(&*state.orm).await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "sub_category_create", "sub_categories")
            .with_metadata(serde_json::json!({ "sub_category_id": sub_category.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "SubCategory created",
        SubCategory::from(sub_category),
        Some(Meta::empty()),
    ))
}

pub async fn update_sub_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    form: MultipartForm,
) -> AppResult<ApiResponse<SubCategory>> {
    let current = find_sub_category(state, id).await?;
    authorize(&user.actor(), Some(current.added_by), Action::ModifyCatalog)?;

    let new_name = form.text("name").map(str::to_string);
    if let Some(name) = &new_name {
        validate_name(name)?;
        if *name == current.name {
            return Err(AppError::bad_request(
                "please enter a different sub-category name",
            ));
        }
        if name_taken(state, name).await? {
            return Err(AppError::Conflict(DUPLICATE_NAME.into()));
        }
    }

    let replaced = match form.single_file("image")? {
        Some(file) => {
            let public_id = replacement_public_id(
                form.text("oldPublicId"),
                current.image_public_id.as_deref(),
            )?;
            let folder = folder_of(state, &current).await?;
            Some(store_image(state, file, &folder, public_id.as_deref()).await?)
        }
        None => None,
    };

    let mut active: sub_categories::ActiveModel = current.into();
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
    let sub_category = active
        .update(&*state.orm)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_NAME))?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "sub_category_update", "sub_categories")
            .with_metadata(serde_json::json!({ "sub_category_id": sub_category.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "SubCategory updated",
        SubCategory::from(sub_category),
        Some(Meta::empty()),
    ))
}

pub async fn delete_sub_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let current = find_sub_category(state, id).await?;
    authorize(&user.actor(), Some(current.added_by), Action::ModifyCatalog)?;
    let folder = folder_of(state, &current).await?;

    let txn = state.orm.begin().await?;
    Products::delete_many()
        .filter(products::Column::SubCategoryId.eq(id))
        .exec(&txn)
        .await?;
    Brands::delete_many()
        .filter(brands::Column::SubCategoryId.eq(id))
        .exec(&txn)
        .await?;
    SubCategories::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    drop_folder(state, &folder).await;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "sub_category_delete", "sub_categories")
            .with_metadata(serde_json::json!({ "sub_category_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "SubCategory deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_sub_categories(
    state: &AppState,
    query: ListQuery,
) -> AppResult<ApiResponse<SubCategoryList>> {
    let (rows, meta) = fetch_page(&*state.orm, SubCategories::find(), &query).await?;
    Ok(ApiResponse::success(
        "SubCategories",
        SubCategoryList {
            items: rows.into_iter().map(SubCategory::from).collect(),
        },
        Some(meta),
    ))
}

pub async fn list_by_category(
    state: &AppState,
    category_id: Uuid,
    query: ListQuery,
) -> AppResult<ApiResponse<SubCategoryList>> {
    Categories::find_by_id(category_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Category"))?;

    let (rows, meta) = fetch_page(
        &*state.orm,
        SubCategories::find().filter(sub_categories::Column::CategoryId.eq(category_id)),
        &query,
    )
    .await?;
    Ok(ApiResponse::success(
        "SubCategories",
        SubCategoryList {
            items: rows.into_iter().map(SubCategory::from).collect(),
        },
        Some(meta),
    ))
}

pub async fn get_sub_category(
    state: &AppState,
    id: Uuid,
) -> AppResult<ApiResponse<SubCategory>> {
    let sub_category = find_sub_category(state, id).await?;
    Ok(ApiResponse::success(
        "SubCategory",
        SubCategory::from(sub_category),
        None,
    ))
}
