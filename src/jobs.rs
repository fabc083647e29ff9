//! Background jobs running alongside the HTTP server.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, UpdateMany, sea_query::Expr,
};
use tokio::task::JoinHandle;

use crate::{
    db::OrmConn,
    entity::{Coupons, coupons, enums::CouponStatus},
};

/// Mark every still-valid coupon whose window ended before `now` as expired.
/// Returns how many coupons changed.
pub async fn sweep_expired_coupons<C>(db: &C, now: DateTime<Utc>) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let result = expiry_update(now).exec(db).await?;
    Ok(result.rows_affected)
}

fn expiry_update(now: DateTime<Utc>) -> UpdateMany<Coupons> {
    Coupons::update_many()
        .col_expr(
            coupons::Column::CouponStatus,
            Expr::value(CouponStatus::Expired),
        )
        .col_expr(coupons::Column::UpdatedAt, Expr::value(now.fixed_offset()))
        .filter(coupons::Column::CouponStatus.eq(CouponStatus::Valid))
        .filter(coupons::Column::ToDate.lt(now.fixed_offset()))
}

pub fn is_expired(coupon: &coupons::Model, now: DateTime<Utc>) -> bool {
    coupon.coupon_status == CouponStatus::Expired || coupon.to_date < now
}

/// Run the sweep every `period` until the runtime shuts down.
pub fn spawn_coupon_sweeper(db: OrmConn, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep_expired_coupons(&db, Utc::now()).await {
                Ok(0) => tracing::debug!("coupon sweep: nothing expired"),
                Ok(expired) => tracing::info!(expired, "coupon sweep expired coupons"),
                Err(err) => tracing::error!(error = %err, "coupon sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait};
    use uuid::Uuid;

    fn coupon(to_date: DateTime<Utc>, status: CouponStatus) -> coupons::Model {
        let now = Utc::now().fixed_offset();
        coupons::Model {
            id: Uuid::new_v4(),
            coupon_code: "summer".into(),
            coupon_amount: dec!(10),
            coupon_status: status,
            is_fixed: false,
            is_percentage: true,
            from_date: now - ChronoDuration::days(10),
            to_date: to_date.fixed_offset(),
            is_enabled: true,
            enabled_at: None,
            enabled_by: None,
            disabled_at: None,
            disabled_by: None,
            added_by: Uuid::new_v4(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn expiry_update_only_touches_valid_past_coupons() {
        let sql = expiry_update(Utc::now())
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(
            sql.starts_with(r#"UPDATE "coupons" SET "coupon_status" = 'expired'"#),
            "{sql}"
        );
        assert!(
            sql.contains(r#"WHERE "coupons"."coupon_status" = 'valid' AND "coupons"."to_date" < "#),
            "{sql}"
        );
    }

    #[tokio::test]
    async fn sweep_reports_rows_changed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 3,
            }])
            .into_connection();

        let expired = sweep_expired_coupons(&db, Utc::now()).await.unwrap();
        assert_eq!(expired, 3);

        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[test]
    fn past_window_is_expired_future_is_not() {
        let now = Utc::now();
        assert!(is_expired(
            &coupon(now - ChronoDuration::minutes(1), CouponStatus::Valid),
            now
        ));
        assert!(!is_expired(
            &coupon(now + ChronoDuration::days(1), CouponStatus::Valid),
            now
        ));
        assert!(is_expired(
            &coupon(now + ChronoDuration::days(1), CouponStatus::Expired),
            now
        ));
    }
}
