mod common;

use axum_storefront_api::{
    dto::{
        cart::AddToCartRequest,
        coupons::{AddCouponRequest, CouponUserInput},
        orders::{CartToOrderRequest, CreateOrderRequest, ShippingDetails},
        reviews::AddReviewRequest,
    },
    entity::{
        CouponUsers, Products, coupon_users,
        enums::{OrderStatus, PaymentMethod, Role},
    },
    error::AppError,
    services::{cart_service, coupon_service, order_service, review_service},
};
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tokio::sync::Barrier;

fn shipping() -> ShippingDetails {
    ShippingDetails {
        address: "12 Market Street".into(),
        city: "Cairo".into(),
        postal_code: "11511".into(),
        country: "Egypt".into(),
        phone_numbers: vec!["0123456789".into()],
    }
}

// Order with a coupon -> pay -> cancel restores stock and coupon usage.
#[tokio::test]
async fn coupon_order_pay_and_cancel_flow() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let (state, _dir) = common::setup_state(&url, None).await?;

    let admin = common::create_user(&state, Role::Admin).await?;
    let shopper = common::create_user(&state, Role::User).await?;
    let product = common::create_product(&state, admin.user_id, dec!(100.00), 5).await?;

    let code = common::unique_code();
    let coupon = coupon_service::add_coupon(
        &state,
        &admin,
        AddCouponRequest {
            coupon_code: code.clone(),
            coupon_amount: dec!(10),
            is_fixed: false,
            is_percentage: true,
            from_date: Utc::now() - Duration::hours(1),
            to_date: Utc::now() + Duration::days(1),
            users: vec![CouponUserInput {
                user_id: shopper.user_id,
                max_usage: 1,
            }],
        },
    )
    .await?
    .data
    .expect("coupon");
    assert_eq!(coupon.coupon.coupon_code, code.to_lowercase());

    let placed = order_service::create_order(
        &state,
        &shopper,
        CreateOrderRequest {
            product_id: product.id,
            quantity: 2,
            coupon_code: Some(code.clone()),
            payment_method: PaymentMethod::Card,
            shipping: shipping(),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(placed.order.status, OrderStatus::Placed);
    assert_eq!(placed.order.shipping_price, dec!(200.00));
    assert_eq!(placed.order.total_price, dec!(180.00));
    assert_eq!(placed.items.len(), 1);

    let stock = Products::find_by_id(product.id).one(&*state.orm).await?.expect("product").stock;
    assert_eq!(stock, 3);

    // The single allowed use is spent.
    let err = order_service::create_order(
        &state,
        &shopper,
        CreateOrderRequest {
            product_id: product.id,
            quantity: 1,
            coupon_code: Some(code.clone()),
            payment_method: PaymentMethod::Cash,
            shipping: shipping(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let paid = order_service::pay_order(&state, &shopper, placed.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(paid.order.status, OrderStatus::Paid);
    assert!(paid.order.paid_at.is_some());

    let cancelled = order_service::cancel_order(&state, &shopper, placed.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);

    let stock = Products::find_by_id(product.id).one(&*state.orm).await?.expect("product").stock;
    assert_eq!(stock, 5);
    let assignment = CouponUsers::find()
        .filter(coupon_users::Column::CouponId.eq(coupon.coupon.id))
        .filter(coupon_users::Column::UserId.eq(shopper.user_id))
        .one(&*state.orm)
        .await?
        .expect("assignment");
    assert_eq!(assignment.usage_count, 0);

    // A cancelled order cannot be cancelled again.
    let err = order_service::cancel_order(&state, &shopper, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

// Simultaneous checkouts with a single-use coupon redeem it exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_respect_coupon_usage_cap() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let (state, _dir) = common::setup_state(&url, None).await?;

    let admin = common::create_user(&state, Role::Admin).await?;
    let shopper = common::create_user(&state, Role::User).await?;
    let code = common::unique_code();
    let coupon = coupon_service::add_coupon(
        &state,
        &admin,
        AddCouponRequest {
            coupon_code: code.clone(),
            coupon_amount: dec!(5),
            is_fixed: true,
            is_percentage: false,
            from_date: Utc::now() - Duration::hours(1),
            to_date: Utc::now() + Duration::days(1),
            users: vec![CouponUserInput {
                user_id: shopper.user_id,
                max_usage: 1,
            }],
        },
    )
    .await?
    .data
    .expect("coupon");

    // One product per checkout so the product row locks do not serialise them.
    const CHECKOUTS: usize = 6;
    let mut products = Vec::with_capacity(CHECKOUTS);
    for _ in 0..CHECKOUTS {
        products.push(common::create_product(&state, admin.user_id, dec!(50.00), 3).await?);
    }

    let barrier = Arc::new(Barrier::new(CHECKOUTS));
    let mut handles = Vec::with_capacity(CHECKOUTS);
    for product in products {
        let (state, shopper, code, barrier) =
            (state.clone(), shopper.clone(), code.clone(), barrier.clone());
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            order_service::create_order(
                &state,
                &shopper,
                CreateOrderRequest {
                    product_id: product.id,
                    quantity: 1,
                    coupon_code: Some(code),
                    payment_method: PaymentMethod::Cash,
                    shipping: shipping(),
                },
            )
            .await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => placed += 1,
            Err(err) => assert!(matches!(err, AppError::BadRequest(_)), "{err:?}"),
        }
    }
    assert_eq!(placed, 1);

    let assignment = CouponUsers::find()
        .filter(coupon_users::Column::CouponId.eq(coupon.coupon.id))
        .filter(coupon_users::Column::UserId.eq(shopper.user_id))
        .one(&*state.orm)
        .await?
        .expect("assignment");
    assert_eq!(assignment.usage_count, 1);

    Ok(())
}

// Cart -> order -> delivery -> review updates the product rating.
#[tokio::test]
async fn cart_checkout_delivery_and_review_flow() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let (state, _dir) = common::setup_state(&url, None).await?;

    let admin = common::create_user(&state, Role::Admin).await?;
    let shopper = common::create_user(&state, Role::User).await?;
    let product = common::create_product(&state, admin.user_id, dec!(25.50), 10).await?;

    // Reviews need a delivered order first.
    let err = review_service::add_review(
        &state,
        &shopper,
        product.id,
        AddReviewRequest {
            review_rate: 4,
            review_comment: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let cart = cart_service::add_to_cart(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: product.id,
            quantity: 3,
        },
    )
    .await?
    .data
    .expect("cart");
    assert_eq!(cart.sub_total, dec!(76.50));

    // Asking for more than the stock holds is a miss.
    let err = cart_service::add_to_cart(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: product.id,
            quantity: 50,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let order = order_service::cart_to_order(
        &state,
        &shopper,
        CartToOrderRequest {
            coupon_code: None,
            payment_method: PaymentMethod::Cash,
            shipping: shipping(),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(order.order.total_price, dec!(76.50));

    let err = cart_service::get_cart(&state, &shopper).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("Cart")));

    // Customers cannot deliver.
    let err = order_service::deliver_order(&state, &shopper, order.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let delivered = order_service::deliver_order(&state, &admin, order.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(delivered.order.status, OrderStatus::Delivered);
    assert_eq!(delivered.order.delivered_by, Some(admin.user_id));
    assert!(delivered.order.paid_at.is_some());

    review_service::add_review(
        &state,
        &shopper,
        product.id,
        AddReviewRequest {
            review_rate: 4,
            review_comment: Some("Solid".into()),
        },
    )
    .await?;
    let rated = Products::find_by_id(product.id).one(&*state.orm).await?.expect("product");
    assert_eq!(rated.rate, dec!(4.00));
    assert_eq!(rated.rate_count, 1);

    let err = review_service::add_review(
        &state,
        &shopper,
        product.id,
        AddReviewRequest {
            review_rate: 5,
            review_comment: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

// Racing reviews for the same product end in one review and conflicts.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_reviews_conflict() -> anyhow::Result<()> {
    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let (state, _dir) = common::setup_state(&url, None).await?;

    let admin = common::create_user(&state, Role::Admin).await?;
    let shopper = common::create_user(&state, Role::User).await?;
    let product = common::create_product(&state, admin.user_id, dec!(12.00), 4).await?;

    let order = order_service::create_order(
        &state,
        &shopper,
        CreateOrderRequest {
            product_id: product.id,
            quantity: 1,
            coupon_code: None,
            payment_method: PaymentMethod::Cash,
            shipping: shipping(),
        },
    )
    .await?
    .data
    .expect("order");
    order_service::deliver_order(&state, &admin, order.order.id).await?;

    let product_id = product.id;
    const WRITERS: usize = 4;
    let barrier = Arc::new(Barrier::new(WRITERS));
    let mut handles = Vec::with_capacity(WRITERS);
    for rate in 1..=WRITERS as i16 {
        let (state, shopper, barrier) = (state.clone(), shopper.clone(), barrier.clone());
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            review_service::add_review(
                &state,
                &shopper,
                product_id,
                AddReviewRequest {
                    review_rate: rate,
                    review_comment: None,
                },
            )
            .await
        }));
    }

    let mut written = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => written += 1,
            Err(err) => assert!(matches!(err, AppError::Conflict(_)), "{err:?}"),
        }
    }
    assert_eq!(written, 1);

    let rated = Products::find_by_id(product.id).one(&*state.orm).await?.expect("product");
    assert_eq!(rated.rate_count, 1);

    Ok(())
}
