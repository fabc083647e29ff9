use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Select,
    Set, TransactionTrait,
    sea_query::{Expr, Func},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEvent},
    dto::reviews::{AddReviewRequest, ReviewList, UpdateReviewRequest},
    entity::{OrderItems, Orders, Products, Reviews, enums::OrderStatus, order_items, orders, products, reviews},
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::AuthUser,
    models::Review,
    policy::{Action, authorize},
    query::{ListQuery, fetch_page},
    response::{ApiResponse, Meta},
    state::AppState,
};

const DUPLICATE_REVIEW: &str = "you have already reviewed this product";

/// Recompute a product's average rate (2 dp) and review count from its reviews.
async fn refresh_rating<C>(db: &C, product_id: Uuid) -> AppResult<()>
where
    C: ConnectionTrait,
{
    let (average, count): (Option<Decimal>, i64) = Reviews::find()
        .select_only()
        .expr_as(Func::avg(Expr::col(reviews::Column::ReviewRate)), "average")
        .expr_as(Func::count(Expr::col(reviews::Column::Id)), "count")
        .filter(reviews::Column::ProductId.eq(product_id))
        .into_tuple()
        .one(db)
        .await?
        .unwrap_or((None, 0));

    Products::update_many()
        .col_expr(
            products::Column::Rate,
            Expr::value(average.unwrap_or(Decimal::ZERO).round_dp(2)),
        )
        .col_expr(products::Column::RateCount, Expr::value(count as i32))
        .filter(products::Column::Id.eq(product_id))
        .exec(db)
        .await?;
    Ok(())
}

fn delivered_lines(user_id: Uuid, product_id: Uuid) -> Select<order_items::Entity> {
    OrderItems::find()
        .inner_join(Orders)
        .filter(orders::Column::UserId.eq(user_id))
        .filter(orders::Column::Status.eq(OrderStatus::Delivered))
        .filter(order_items::Column::ProductId.eq(product_id))
}

async fn has_delivered_order<C>(db: &C, user_id: Uuid, product_id: Uuid) -> AppResult<bool>
where
    C: ConnectionTrait,
{
    Ok(delivered_lines(user_id, product_id).one(db).await?.is_some())
}

pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: AddReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    authorize(&user.actor(), None, Action::WriteReview)?;
    payload.validate()?;

    Products::find_by_id(product_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    if !has_delivered_order(&*state.orm, user.user_id, product_id).await? {
        return Err(AppError::bad_request(
            "you can only review products from a delivered order",
        ));
    }
    let existing = Reviews::find()
        .filter(reviews::Column::UserId.eq(user.user_id))
        .filter(reviews::Column::ProductId.eq(product_id))
        .one(&*state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(DUPLICATE_REVIEW.into()));
    }

    let now = Utc::now().fixed_offset();
    let txn = state.orm.begin().await?;
    let review = reviews::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(product_id),
        review_rate: Set(payload.review_rate),
        review_comment: Set(payload.review_comment),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(|e| conflict_on_unique(e, DUPLICATE_REVIEW))?;
    refresh_rating(&txn, product_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "review_create", "reviews")
            .with_metadata(serde_json::json!({ "review_id": review.id, "product_id": product_id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Review added",
        Review::from(review),
        Some(Meta::empty()),
    ))
}

pub async fn update_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    payload.validate()?;
    let current = Reviews::find_by_id(id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Review"))?;
    authorize(&user.actor(), Some(current.user_id), Action::UpdateReview)?;

    let product_id = current.product_id;
    let txn = state.orm.begin().await?;
    let mut active: reviews::ActiveModel = current.into();
    if let Some(rate) = payload.review_rate {
        active.review_rate = Set(rate);
    }
    if let Some(comment) = payload.review_comment {
        active.review_comment = Set(Some(comment));
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let review = active.update(&txn).await?;
    refresh_rating(&txn, product_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.user_id, "review_update", "reviews")
            .with_metadata(serde_json::json!({ "review_id": review.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Review updated",
        Review::from(review),
        Some(Meta::empty()),
    ))
}

pub async fn list_reviews(
    state: &AppState,
    product_id: Uuid,
    query: ListQuery,
) -> AppResult<ApiResponse<ReviewList>> {
    Products::find_by_id(product_id)
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let (rows, meta) = fetch_page(
        &*state.orm,
        Reviews::find().filter(reviews::Column::ProductId.eq(product_id)),
        &query,
    )
    .await?;
    Ok(ApiResponse::success(
        "Reviews",
        ReviewList {
            items: rows.into_iter().map(Review::from).collect(),
        },
        Some(meta),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, QueryTrait};

    #[test]
    fn delivered_order_lookup_joins_orders() {
        let sql = delivered_lines(Uuid::nil(), Uuid::nil())
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#"INNER JOIN "orders""#));
        assert!(sql.contains(r#""orders"."status" = 'delivered'"#));
        assert!(sql.contains(r#""order_items"."product_id" = '00000000-0000-0000-0000-000000000000'"#));
    }
}
