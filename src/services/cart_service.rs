use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEvent},
    dto::cart::AddToCartRequest,
    entity::{CartItems, Carts, Products, cart_items, carts, products},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartItem},
    policy::{Action, authorize},
    pricing::line_total,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub(crate) async fn cart_lines<C>(db: &C, cart_id: Uuid) -> AppResult<Vec<cart_items::Model>>
where
    C: ConnectionTrait,
{
    Ok(CartItems::find()
        .filter(cart_items::Column::CartId.eq(cart_id))
        .order_by_asc(cart_items::Column::CreatedAt)
        .all(db)
        .await?)
}

fn cart_view(cart: carts::Model, lines: Vec<cart_items::Model>) -> Cart {
    Cart {
        id: cart.id,
        user_id: cart.user_id,
        sub_total: cart.sub_total,
        items: lines.into_iter().map(CartItem::from).collect(),
    }
}

fn sub_total(lines: &[cart_items::Model]) -> Decimal {
    lines.iter().map(|line| line.final_price).sum()
}

/// Add a product, or replace the quantity of a line already in the cart. The
/// line snapshots the product's current applied price.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    authorize(&user.actor(), None, Action::UseCart)?;
    payload.validate()?;

    let product = Products::find_by_id(payload.product_id)
        .filter(products::Column::Stock.gte(payload.quantity))
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let now = Utc::now().fixed_offset();
    let txn = state.orm.begin().await?;
    let cart = match Carts::find()
        .filter(carts::Column::UserId.eq(user.user_id))
        .one(&txn)
        .await?
    {
        Some(cart) => cart,
        None => {
            carts::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                sub_total: Set(Decimal::ZERO),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?
        }
    };

    let final_price = line_total(product.applied_price, payload.quantity);
    let existing = CartItems::find()
        .filter(cart_items::Column::CartId.eq(cart.id))
        .filter(cart_items::Column::ProductId.eq(product.id))
        .one(&txn)
        .await?;
    match existing {
        Some(line) => {
            let mut active: cart_items::ActiveModel = line.into();
            active.title = Set(product.title.clone());
            active.quantity = Set(payload.quantity);
            active.base_price = Set(product.applied_price);
            active.final_price = Set(final_price);
            active.update(&txn).await?;
        }
        None => {
            cart_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                title: Set(product.title.clone()),
                quantity: Set(payload.quantity),
                base_price: Set(product.applied_price),
                final_price: Set(final_price),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }
    }

    let lines = cart_lines(&txn, cart.id).await?;
    let mut active: carts::ActiveModel = cart.into();
    active.sub_total = Set(sub_total(&lines));
    active.updated_at = Set(now);
    let cart = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "cart_update", "carts").with_metadata(
            serde_json::json!({ "product_id": product.id, "quantity": payload.quantity }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Product added to cart",
        cart_view(cart, lines),
        Some(Meta::empty()),
    ))
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    authorize(&user.actor(), None, Action::UseCart)?;
    let cart = Carts::find()
        .filter(carts::Column::UserId.eq(user.user_id))
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Cart"))?;
    let lines = cart_lines(&*state.orm, cart.id).await?;
    Ok(ApiResponse::success("Cart", cart_view(cart, lines), None))
}

/// Remove one product from the caller's cart. The cart itself goes away with
/// its last line, in which case the response carries no cart.
pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<Option<Cart>>> {
    authorize(&user.actor(), None, Action::UseCart)?;

    let txn = state.orm.begin().await?;
    let cart = Carts::find()
        .filter(carts::Column::UserId.eq(user.user_id))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Cart"))?;

    let removed = CartItems::delete_many()
        .filter(cart_items::Column::CartId.eq(cart.id))
        .filter(cart_items::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    if removed.rows_affected == 0 {
        return Err(AppError::NotFound("Product in cart"));
    }

    let lines = cart_lines(&txn, cart.id).await?;
    let remaining = if lines.is_empty() {
        Carts::delete_by_id(cart.id).exec(&txn).await?;
        None
    } else {
        let mut active: carts::ActiveModel = cart.into();
        active.sub_total = Set(sub_total(&lines));
        active.updated_at = Set(Utc::now().fixed_offset());
        Some(cart_view(active.update(&txn).await?, lines))
    };
    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "cart_remove", "carts")
            .with_metadata(serde_json::json!({ "product_id": product_id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        remaining,
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(final_price: Decimal) -> cart_items::Model {
        cart_items::Model {
            id: Uuid::new_v4(),
            cart_id: Uuid::nil(),
            product_id: Uuid::new_v4(),
            title: "Phone".into(),
            quantity: 1,
            base_price: final_price,
            final_price,
            created_at: Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn sub_total_sums_line_prices() {
        let lines = vec![line(dec!(19.99)), line(dec!(5.01)), line(dec!(100))];
        assert_eq!(sub_total(&lines), dec!(125.00));
        assert_eq!(sub_total(&[]), Decimal::ZERO);
    }
}
