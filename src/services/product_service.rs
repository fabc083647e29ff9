use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEvent},
    dto::{
        catalog::slugify,
        products::{
            MAX_IMAGES, ProductList, ProductTarget, parse_specs, validate_stock, validate_title,
        },
    },
    entity::{Brands, Categories, Products, SubCategories, products},
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::AuthUser,
    models::Product,
    policy::{Action, authorize},
    pricing::{applied_price, validate_product_pricing},
    query::{ListQuery, fetch_page},
    response::{ApiResponse, Meta},
    rollback::{RecordKind, RollbackLog},
    services::media::{drop_folder, store_image},
    state::AppState,
    storage::{StoredAsset, new_folder_id, product_folder},
    uploads::MultipartForm,
};

const DUPLICATE_TITLE: &str = "Product title is already taken";

async fn find_product(state: &AppState, id: Uuid) -> AppResult<products::Model> {
    Products::find_by_id(id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

async fn title_taken(state: &AppState, title: &str, exclude: Option<Uuid>) -> AppResult<bool> {
    let mut finder = Products::find().filter(products::Column::Title.eq(title));
    if let Some(id) = exclude {
        finder = finder.filter(products::Column::Id.ne(id));
    }
    Ok(finder.one(&*state.orm).await?.is_some())
}

/// Full asset folder of a product, built from its parents' folder ids.
async fn folder_of(state: &AppState, product: &products::Model) -> AppResult<String> {
    let category = Categories::find_by_id(product.category_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    let sub_category = SubCategories::find_by_id(product.sub_category_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("SubCategory"))?;
    let brand = Brands::find_by_id(product.brand_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Brand"))?;
    Ok(product_folder(
        &state.config.main_folder,
        &category.folder_id,
        &sub_category.folder_id,
        &brand.folder_id,
        &product.folder_id,
    ))
}

fn stored_images(product: &products::Model) -> Vec<StoredAsset> {
    serde_json::from_value(product.images.clone()).unwrap_or_default()
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    rollback: &RollbackLog,
    target: ProductTarget,
    form: MultipartForm,
) -> AppResult<ApiResponse<Product>> {
    authorize(&user.actor(), None, Action::CreateCatalog)?;

    let brand = Brands::find_by_id(target.brand_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Brand"))?;
    if brand.category_id != target.category_id || brand.sub_category_id != target.sub_category_id
    {
        return Err(AppError::bad_request(
            "brand does not belong to this category and sub-category",
        ));
    }
    authorize(&user.actor(), Some(brand.added_by), Action::ModifyCatalog)?;

    let title = form.require("title")?.to_string();
    validate_title(&title)?;
    let description = form.require("description")?.to_string();
    let base_price: Decimal = form
        .parse("basePrice")?
        .ok_or_else(|| AppError::Validation(vec!["basePrice: is required".into()]))?;
    let discount: Decimal = form.parse("discount")?.unwrap_or(Decimal::ZERO);
    validate_product_pricing(base_price, discount)?;
    let stock: i32 = form
        .parse("stock")?
        .ok_or_else(|| AppError::Validation(vec!["stock: is required".into()]))?;
    validate_stock(stock)?;
    let specs = parse_specs(form.text("specs"))?.unwrap_or_else(|| serde_json::json!({}));

    let images = form.files_for("image");
    if images.is_empty() || images.len() > MAX_IMAGES {
        return Err(AppError::bad_request(format!(
            "a product needs between 1 and {MAX_IMAGES} images"
        )));
    }

    if title_taken(state, &title, None).await? {
        return Err(AppError::Conflict(DUPLICATE_TITLE.into()));
    }

    let now = Utc::now().fixed_offset();
    let product = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(slugify(&title)),
        title: Set(title),
        description: Set(description),
        folder_id: Set(new_folder_id()),
        base_price: Set(base_price.round_dp(2)),
        discount: Set(discount),
        applied_price: Set(applied_price(base_price, discount)),
        stock: Set(stock),
        rate: Set(Decimal::ZERO),
        rate_count: Set(0),
        images: Set(serde_json::json!([])),
        specs: Set(specs),
        category_id: Set(brand.category_id),
        sub_category_id: Set(brand.sub_category_id),
        brand_id: Set(brand.id),
        added_by: Set(user.user_id),
        updated_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.orm)
    .await
    .map_err(|e| conflict_on_unique(e, DUPLICATE_TITLE))?;
    rollback.delete_record(RecordKind::Product, product.id);

    let folder = folder_of(state, &product).await?;
    rollback.delete_folder(folder.clone());
    let mut uploaded = Vec::with_capacity(images.len());
    for file in images {
        uploaded.push(store_image(state, file, &folder, None).await?);
    }

    let mut active: products::ActiveModel = product.into();
    active.images = Set(serde_json::json!(uploaded));
    let product = active.update(&*state.orm).await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "product_create", "products")
            .with_metadata(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    form: MultipartForm,
) -> AppResult<ApiResponse<Product>> {
    let current = find_product(state, id).await?;
    authorize(&user.actor(), Some(current.added_by), Action::ModifyCatalog)?;

    let title = form.text("title").map(str::to_string);
    if let Some(title) = &title {
        validate_title(title)?;
        if title_taken(state, title, Some(current.id)).await? {
            return Err(AppError::Conflict(DUPLICATE_TITLE.into()));
        }
    }
    let base_price: Option<Decimal> = form.parse("basePrice")?;
    let discount: Option<Decimal> = form.parse("discount")?;
    let merged_base = base_price.unwrap_or(current.base_price);
    let merged_discount = discount.unwrap_or(current.discount);
    validate_product_pricing(merged_base, merged_discount)?;
    let stock: Option<i32> = form.parse("stock")?;
    if let Some(stock) = stock {
        validate_stock(stock)?;
    }
    let specs = parse_specs(form.text("specs"))?;

    let mut images = stored_images(&current);
    if let Some(file) = form.single_file("image")? {
        let old_public_id = form
            .text("oldPublicId")
            .ok_or_else(|| AppError::bad_request("oldPublicId is required to replace an image"))?;
        let slot = images
            .iter()
            .position(|img| img.public_id == old_public_id)
            .ok_or_else(|| AppError::bad_request("oldPublicId does not match any product image"))?;
        let folder = folder_of(state, &current).await?;
        images[slot] = store_image(state, file, &folder, Some(old_public_id)).await?;
    }

    let mut active: products::ActiveModel = current.into();
    if let Some(title) = title {
        active.slug = Set(slugify(&title));
        active.title = Set(title);
    }
    if let Some(description) = form.text("description") {
        active.description = Set(description.to_string());
    }
    active.base_price = Set(merged_base.round_dp(2));
    active.discount = Set(merged_discount);
    active.applied_price = Set(applied_price(merged_base, merged_discount));
    if let Some(stock) = stock {
        active.stock = Set(stock);
    }
    if let Some(specs) = specs {
        active.specs = Set(specs);
    }
    active.images = Set(serde_json::json!(images));
    active.updated_by = Set(Some(user.user_id));
    active.updated_at = Set(Utc::now().fixed_offset());
    let product = active
        .update(&*state.orm)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_TITLE))?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "product_update", "products")
            .with_metadata(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let current = find_product(state, id).await?;
    authorize(&user.actor(), Some(current.added_by), Action::ModifyCatalog)?;
    let folder = folder_of(state, &current).await?;

    Products::delete_by_id(id).exec(&*state.orm).await?;
    drop_folder(state, &folder).await;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "product_delete", "products")
            .with_metadata(serde_json::json!({ "product_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_products(
    state: &AppState,
    query: ListQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (rows, meta) = fetch_page(&*state.orm, Products::find(), &query).await?;
    Ok(ApiResponse::success(
        "Products",
        ProductList {
            items: rows.into_iter().map(Product::from).collect(),
        },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = find_product(state, id).await?;
    Ok(ApiResponse::success("Product", Product::from(product), None))
}
