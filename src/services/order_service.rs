use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, LockType},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEvent},
    dto::orders::{CartToOrderRequest, CreateOrderRequest, OrderList, OrderWithItems, ShippingDetails},
    entity::{
        CartItems, Carts, CouponUsers, OrderItems, Orders, Products, cart_items, carts,
        coupon_users, enums::{OrderStatus, PaymentMethod}, order_items, orders, products,
    },
    error::{AppError, AppResult},
    invoice::Invoice,
    mail,
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    policy::{Action, authorize},
    pricing::{CouponDiscount, apply_coupon, line_total},
    query::{ListQuery, fetch_page},
    response::{ApiResponse, Meta},
    services::{cart_service::cart_lines, coupon_service::validate_coupon},
    state::AppState,
};

pub const CANCEL_WINDOW_HOURS: i64 = 24;

/// One line about to be ordered, priced at `unit_price`.
#[derive(Debug, Clone)]
pub struct PendingLine {
    pub product_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    /// Sum of line totals before the coupon.
    pub sub_total: Decimal,
    pub total: Decimal,
}

pub fn price_order(lines: &[PendingLine], coupon: Option<CouponDiscount>) -> AppResult<OrderTotals> {
    let sub_total: Decimal = lines
        .iter()
        .map(|line| line_total(line.unit_price, line.quantity))
        .sum();
    let total = match coupon {
        Some(discount) => apply_coupon(sub_total, discount)?,
        None => sub_total,
    };
    Ok(OrderTotals { sub_total, total })
}

/// Only Placed or Paid orders younger than the cancellation window may be
/// cancelled.
pub fn ensure_cancellable(
    status: OrderStatus,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if !matches!(status, OrderStatus::Placed | OrderStatus::Paid) {
        return Err(AppError::bad_request(format!(
            "a {} order cannot be cancelled",
            status.as_label()
        )));
    }
    if now - created_at > Duration::hours(CANCEL_WINDOW_HOURS) {
        return Err(AppError::bad_request(
            "orders can only be cancelled within 24 hours",
        ));
    }
    Ok(())
}

struct Placement<'a> {
    user_id: Uuid,
    lines: Vec<PendingLine>,
    coupon_code: Option<&'a str>,
    payment_method: PaymentMethod,
    shipping: &'a ShippingDetails,
}

/// Lock the products, check stock and coupon, write the order and its lines,
/// then take stock and coupon usage. Runs inside the caller's transaction.
async fn place_order(
    txn: &DatabaseTransaction,
    placement: Placement<'_>,
) -> AppResult<(orders::Model, Vec<order_items::Model>)> {
    if placement.lines.is_empty() {
        return Err(AppError::bad_request("nothing to order"));
    }

    let ids: Vec<Uuid> = placement.lines.iter().map(|l| l.product_id).collect();
    let locked: HashMap<Uuid, products::Model> = Products::find()
        .filter(products::Column::Id.is_in(ids))
        .lock(LockType::Update)
        .all(txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    for line in &placement.lines {
        let product = locked
            .get(&line.product_id)
            .ok_or(AppError::NotFound("Product"))?;
        if product.stock < line.quantity {
            return Err(AppError::bad_request(format!(
                "not enough stock for {}",
                product.title
            )));
        }
    }

    let now = Utc::now();
    let coupon = match placement.coupon_code {
        Some(code) => Some(validate_coupon(txn, code, placement.user_id, now).await?),
        None => None,
    };
    let discount = coupon
        .as_ref()
        .map(|(c, _)| CouponDiscount::from_flags(c.coupon_amount, c.is_fixed, c.is_percentage))
        .transpose()?;
    let totals = price_order(&placement.lines, discount)?;

    let at = now.fixed_offset();
    let shipping = placement.shipping;
    let order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(placement.user_id),
        coupon_id: Set(coupon.as_ref().map(|(c, _)| c.id)),
        address: Set(shipping.address.clone()),
        city: Set(shipping.city.clone()),
        postal_code: Set(shipping.postal_code.clone()),
        country: Set(shipping.country.clone()),
        phone_numbers: Set(serde_json::json!(shipping.phone_numbers)),
        shipping_price: Set(totals.sub_total),
        total_price: Set(totals.total),
        payment_method: Set(placement.payment_method),
        status: Set(OrderStatus::Placed),
        paid_at: Set(None),
        delivered_at: Set(None),
        delivered_by: Set(None),
        cancelled_at: Set(None),
        created_at: Set(at),
        updated_at: Set(at),
    }
    .insert(txn)
    .await?;

    let mut items = Vec::with_capacity(placement.lines.len());
    for line in placement.lines {
        let item = order_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            title: Set(line.title),
            quantity: Set(line.quantity),
            price: Set(line.unit_price),
            created_at: Set(at),
        }
        .insert(txn)
        .await?;

        Products::update_many()
            .col_expr(
                products::Column::Stock,
                Expr::col(products::Column::Stock).sub(line.quantity),
            )
            .filter(products::Column::Id.eq(line.product_id))
            .exec(txn)
            .await?;
        items.push(item);
    }

    if let Some((_, assignment)) = &coupon {
        let redeemed = CouponUsers::update_many()
            .col_expr(
                coupon_users::Column::UsageCount,
                Expr::col(coupon_users::Column::UsageCount).add(1),
            )
            .filter(coupon_users::Column::Id.eq(assignment.id))
            .filter(
                Expr::col(coupon_users::Column::UsageCount)
                    .lt(Expr::col(coupon_users::Column::MaxUsage)),
            )
            .exec(txn)
            .await?;
        if redeemed.rows_affected == 0 {
            return Err(AppError::bad_request(
                "you have exceeded the usage limit of this coupon",
            ));
        }
    }

    Ok((order, items))
}

/// Send the confirmation mail with the invoice attached. Failures are logged;
/// the order is already committed.
async fn send_confirmation(
    state: &AppState,
    user: &AuthUser,
    order: &orders::Model,
    items: &[order_items::Model],
) {
    let invoice = Invoice::from_order(&user.username, order, items);
    if let Err(err) = state
        .mailer
        .send(mail::order_confirmation_email(&user.email, &invoice))
        .await
    {
        tracing::warn!(order_id = %order.id, error = %err, "order confirmation email failed");
    }
}

fn order_view(order: orders::Model, items: Vec<order_items::Model>) -> OrderWithItems {
    OrderWithItems {
        order: Order::from(order),
        items: items.into_iter().map(OrderItem::from).collect(),
    }
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    authorize(&user.actor(), None, Action::PlaceOrder)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(payload.product_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let (order, items) = place_order(
        &txn,
        Placement {
            user_id: user.user_id,
            lines: vec![PendingLine {
                product_id: product.id,
                title: product.title,
                quantity: payload.quantity,
                unit_price: product.applied_price,
            }],
            coupon_code: payload.coupon_code.as_deref(),
            payment_method: payload.payment_method,
            shipping: &payload.shipping,
        },
    )
    .await?;
    txn.commit().await?;

    send_confirmation(state, user, &order, &items).await;
    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "order_create", "orders")
            .with_metadata(serde_json::json!({ "order_id": order.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed",
        order_view(order, items),
        Some(Meta::empty()),
    ))
}

/// Turn the caller's cart into an order at the prices snapshotted in the cart,
/// then drop the cart.
pub async fn cart_to_order(
    state: &AppState,
    user: &AuthUser,
    payload: CartToOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    authorize(&user.actor(), None, Action::PlaceOrder)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let cart = Carts::find()
        .filter(carts::Column::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Cart"))?;
    let lines = cart_lines(&txn, cart.id)
        .await?
        .into_iter()
        .map(|line| PendingLine {
            product_id: line.product_id,
            title: line.title,
            quantity: line.quantity,
            unit_price: line.base_price,
        })
        .collect();

    let (order, items) = place_order(
        &txn,
        Placement {
            user_id: user.user_id,
            lines,
            coupon_code: payload.coupon_code.as_deref(),
            payment_method: payload.payment_method,
            shipping: &payload.shipping,
        },
    )
    .await?;

    CartItems::delete_many()
        .filter(cart_items::Column::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    Carts::delete_by_id(cart.id).exec(&txn).await?;
    txn.commit().await?;

    send_confirmation(state, user, &order, &items).await;
    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "order_from_cart", "orders")
            .with_metadata(serde_json::json!({ "order_id": order.id, "cart_id": cart.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed",
        order_view(order, items),
        Some(Meta::empty()),
    ))
}

async fn lock_order(txn: &DatabaseTransaction, id: Uuid) -> AppResult<orders::Model> {
    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound("Order"))
}

async fn items_of<C>(db: &C, order_id: Uuid) -> AppResult<Vec<order_items::Model>>
where
    C: sea_orm::ConnectionTrait,
{
    Ok(OrderItems::find()
        .filter(order_items::Column::OrderId.eq(order_id))
        .all(db)
        .await?)
}

pub async fn pay_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, id).await?;
    authorize(&user.actor(), Some(order.user_id), Action::PayOrder)?;

    if order.status != OrderStatus::Placed {
        return Err(AppError::bad_request(format!(
            "a {} order cannot be paid",
            order.status.as_label()
        )));
    }

    let now = Utc::now().fixed_offset();
    let mut active: orders::ActiveModel = order.into();
    active.status = Set(OrderStatus::Paid);
    active.paid_at = Set(Some(now));
    active.updated_at = Set(now);
    let order = active.update(&txn).await?;
    let items = items_of(&txn, order.id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "order_paid", "orders")
            .with_metadata(serde_json::json!({ "order_id": order.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order paid",
        order_view(order, items),
        Some(Meta::empty()),
    ))
}

/// Cancel an order and give back what it took: stock for every line and one
/// use of the coupon, if any.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, id).await?;
    authorize(&user.actor(), Some(order.user_id), Action::CancelOrder)?;
    let now = Utc::now();
    ensure_cancellable(order.status, order.created_at.with_timezone(&Utc), now)?;

    let items = items_of(&txn, order.id).await?;
    for item in &items {
        Products::update_many()
            .col_expr(
                products::Column::Stock,
                Expr::col(products::Column::Stock).add(item.quantity),
            )
            .filter(products::Column::Id.eq(item.product_id))
            .exec(&txn)
            .await?;
    }
    if let Some(coupon_id) = order.coupon_id {
        CouponUsers::update_many()
            .col_expr(
                coupon_users::Column::UsageCount,
                Expr::col(coupon_users::Column::UsageCount).sub(1),
            )
            .filter(coupon_users::Column::CouponId.eq(coupon_id))
            .filter(coupon_users::Column::UserId.eq(order.user_id))
            .filter(coupon_users::Column::UsageCount.gt(0))
            .exec(&txn)
            .await?;
    }

    let mut active: orders::ActiveModel = order.into();
    active.status = Set(OrderStatus::Cancelled);
    active.cancelled_at = Set(Some(now.fixed_offset()));
    active.updated_at = Set(now.fixed_offset());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "order_cancel", "orders")
            .with_metadata(serde_json::json!({ "order_id": order.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        order_view(order, items),
        Some(Meta::empty()),
    ))
}

pub async fn deliver_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    authorize(&user.actor(), None, Action::DeliverOrder)?;

    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, id).await?;
    if !matches!(order.status, OrderStatus::Placed | OrderStatus::Paid) {
        return Err(AppError::bad_request(format!(
            "a {} order cannot be delivered",
            order.status.as_label()
        )));
    }

    let now = Utc::now().fixed_offset();
    let cash_unpaid = order.payment_method == PaymentMethod::Cash && order.paid_at.is_none();
    let mut active: orders::ActiveModel = order.into();
    active.status = Set(OrderStatus::Delivered);
    active.delivered_at = Set(Some(now));
    active.delivered_by = Set(Some(user.user_id));
    // Cash is collected on delivery.
    if cash_unpaid {
        active.paid_at = Set(Some(now));
    }
    active.updated_at = Set(now);
    let order = active.update(&txn).await?;
    let items = items_of(&txn, order.id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "order_deliver", "orders")
            .with_metadata(serde_json::json!({ "order_id": order.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order delivered",
        order_view(order, items),
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: ListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    authorize(&user.actor(), None, Action::ViewOwnOrders)?;
    let (rows, meta) = fetch_page(
        &*state.orm,
        Orders::find().filter(orders::Column::UserId.eq(user.user_id)),
        &query,
    )
    .await?;
    Ok(ApiResponse::success(
        "Orders",
        OrderList {
            items: rows.into_iter().map(Order::from).collect(),
        },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    authorize(&user.actor(), None, Action::ViewOwnOrders)?;
    let order = Orders::find_by_id(id)
        .filter(orders::Column::UserId.eq(user.user_id))
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    let items = OrderItems::find()
        .filter(order_items::Column::OrderId.eq(order.id))
        .order_by_asc(order_items::Column::CreatedAt)
        .all(&*state.orm)
        .await?;
    Ok(ApiResponse::success("Order", order_view(order, items), None))
}
