use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEvent},
    dto::catalog::{BrandList, BrandTarget, slugify, validate_name},
    entity::{Brands, Categories, Products, SubCategories, brands, categories, products, sub_categories},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Brand,
    policy::{Action, authorize},
    query::{ListQuery, fetch_page},
    response::{ApiResponse, Meta},
    rollback::{RecordKind, RollbackLog},
    services::{
        category_service::replacement_public_id,
        media::{drop_folder, store_image},
    },
    state::AppState,
    storage::{brand_folder, new_folder_id},
    uploads::MultipartForm,
};

const DUPLICATE_NAME: &str = "Brand name is already taken in this sub-category";

struct Placement {
    category: categories::Model,
    sub_category: sub_categories::Model,
}

/// Resolve the `categoryId`/`subCategoryId` pair; the sub-category must exist
/// and hang under the given category.
async fn resolve_target(state: &AppState, target: &BrandTarget) -> AppResult<Placement> {
    let sub_category = SubCategories::find_by_id(target.sub_category_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("SubCategory"))?;
    if sub_category.category_id != target.category_id {
        return Err(AppError::bad_request(
            "sub-category does not belong to this category",
        ));
    }
    let category = Categories::find_by_id(target.category_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    Ok(Placement {
        category,
        sub_category,
    })
}

async fn name_taken(
    state: &AppState,
    sub_category_id: Uuid,
    name: &str,
    exclude: Option<Uuid>,
) -> AppResult<bool> {
    let mut finder = Brands::find()
        .filter(brands::Column::SubCategoryId.eq(sub_category_id))
        .filter(brands::Column::Name.eq(name));
    if let Some(id) = exclude {
        finder = finder.filter(brands::Column::Id.ne(id));
    }
    Ok(finder.one(&*state.orm).await?.is_some())
}

async fn find_brand(state: &AppState, id: Uuid) -> AppResult<brands::Model> {
    Brands::find_by_id(id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Brand"))
}

pub async fn create_brand(
    state: &AppState,
    user: &AuthUser,
    rollback: &RollbackLog,
    target: BrandTarget,
    form: MultipartForm,
) -> AppResult<ApiResponse<Brand>> {
    authorize(&user.actor(), None, Action::CreateCatalog)?;

    let name = form.require("name")?.to_string();
    validate_name(&name)?;
    let image = form
        .single_file("image")?
        .ok_or_else(|| AppError::bad_request("image is required"))?;

    let placement = resolve_target(state, &target).await?;
    if name_taken(state, placement.sub_category.id, &name, None).await? {
        return Err(AppError::Conflict(DUPLICATE_NAME.into()));
    }

    let now = Utc::now().fixed_offset();
    let folder_id = new_folder_id();
    let brand = brands::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(slugify(&name)),
        name: Set(name),
        image_secure_url: Set(None),
        image_public_id: Set(None),
        folder_id: Set(folder_id.clone()),
        category_id: Set(placement.category.id),
        sub_category_id: Set(placement.sub_category.id),
        added_by: Set(user.user_id),
        updated_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.orm)
    .await?;
    rollback.delete_record(RecordKind::Brand, brand.id);

    let folder = brand_folder(
        &state.config.main_folder,
        &placement.category.folder_id,
        &placement.sub_category.folder_id,
        &folder_id,
    );
    rollback.delete_folder(folder.clone());
    let asset = store_image(state, image, &folder, None).await?;

    let mut active: brands::ActiveModel = brand.into();
    active.image_secure_url = Set(Some(asset.secure_url));
    active.image_public_id = Set(Some(asset.public_id));
    let brand = active.update(&*state.orm).await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "brand_create", "brands")
            .with_metadata(serde_json::json!({ "brand_id": brand.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Brand created",
        Brand::from(brand),
        Some(Meta::empty()),
    ))
}

pub async fn update_brand(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    target: BrandTarget,
    form: MultipartForm,
) -> AppResult<ApiResponse<Brand>> {
    let current = find_brand(state, id).await?;
    authorize(&user.actor(), Some(current.added_by), Action::ModifyCatalog)?;

    let placement = resolve_target(state, &target).await?;
    if current.sub_category_id != placement.sub_category.id
        || current.category_id != placement.category.id
    {
        return Err(AppError::bad_request(
            "brand does not belong to this category and sub-category",
        ));
    }

    let new_name = form.text("name").map(str::to_string);
    if let Some(name) = &new_name {
        validate_name(name)?;
        if *name == current.name {
            return Err(AppError::bad_request("please enter a different brand name"));
        }
        if name_taken(state, current.sub_category_id, name, Some(current.id)).await? {
            return Err(AppError::Conflict(DUPLICATE_NAME.into()));
        }
    }

    let replaced = match form.single_file("image")? {
        Some(file) => {
            let public_id = replacement_public_id(
                form.text("oldPublicId"),
                current.image_public_id.as_deref(),
            )?;
            let folder = brand_folder(
                &state.config.main_folder,
                &placement.category.folder_id,
                &placement.sub_category.folder_id,
                &current.folder_id,
            );
            Some(store_image(state, file, &folder, public_id.as_deref()).await?)
        }
        None => None,
    };

    let mut active: brands::ActiveModel = current.into();
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
    let brand = active.update(&*state.orm).await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "brand_update", "brands")
            .with_metadata(serde_json::json!({ "brand_id": brand.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Brand updated",
        Brand::from(brand),
        Some(Meta::empty()),
    ))
}

pub async fn delete_brand(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let current = find_brand(state, id).await?;
    authorize(&user.actor(), Some(current.added_by), Action::ModifyCatalog)?;
    let placement = resolve_target(
        state,
        &BrandTarget {
            category_id: current.category_id,
            sub_category_id: current.sub_category_id,
        },
    )
    .await?;

    let txn = state.orm.begin().await?;
    Products::delete_many()
        .filter(products::Column::BrandId.eq(id))
        .exec(&txn)
        .await?;
    Brands::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    drop_folder(
        state,
        &brand_folder(
            &state.config.main_folder,
            &placement.category.folder_id,
            &placement.sub_category.folder_id,
            &current.folder_id,
        ),
    )
    .await;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "brand_delete", "brands")
            .with_metadata(serde_json::json!({ "brand_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Brand deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

fn brand_page(rows: Vec<brands::Model>, meta: Meta) -> ApiResponse<BrandList> {
    ApiResponse::success(
        "Brands",
        BrandList {
            items: rows.into_iter().map(Brand::from).collect(),
        },
        Some(meta),
    )
}

pub async fn list_brands(state: &AppState, query: ListQuery) -> AppResult<ApiResponse<BrandList>> {
    let (rows, meta) = fetch_page(&*state.orm, Brands::find(), &query).await?;
    Ok(brand_page(rows, meta))
}

pub async fn list_by_sub_category(
    state: &AppState,
    sub_category_id: Uuid,
    query: ListQuery,
) -> AppResult<ApiResponse<BrandList>> {
    SubCategories::find_by_id(sub_category_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("SubCategory"))?;
    let (rows, meta) = fetch_page(
        &*state.orm,
        Brands::find().filter(brands::Column::SubCategoryId.eq(sub_category_id)),
        &query,
    )
    .await?;
    Ok(brand_page(rows, meta))
}

pub async fn list_by_category(
    state: &AppState,
    category_id: Uuid,
    query: ListQuery,
) -> AppResult<ApiResponse<BrandList>> {
    Categories::find_by_id(category_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    let (rows, meta) = fetch_page(
        &*state.orm,
        Brands::find().filter(brands::Column::CategoryId.eq(category_id)),
        &query,
    )
    .await?;
    Ok(brand_page(rows, meta))
}
