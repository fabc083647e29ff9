use axum_storefront_api::{
    pricing::{CouponDiscount, applied_price, apply_coupon, line_total},
    query::{ListQuery, MAX_PAGE_SIZE},
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn cents(max: i64) -> impl Strategy<Value = Decimal> {
    (0..=max).prop_map(|c| Decimal::new(c, 2))
}

proptest! {
    #[test]
    fn applied_price_stays_within_base(base in cents(10_000_000), discount in 0u32..=100) {
        let price = applied_price(base, Decimal::from(discount));
        prop_assert!(price >= Decimal::ZERO);
        prop_assert!(price <= base);
        prop_assert_eq!(price, price.round_dp(2));
    }

    #[test]
    fn percentage_coupon_never_goes_negative(total in cents(10_000_000), percent in 1u32..=100) {
        let reduced = apply_coupon(total, CouponDiscount::Percentage(Decimal::from(percent)))
            .unwrap();
        prop_assert!(reduced >= Decimal::ZERO);
        prop_assert!(reduced <= total);
    }

    #[test]
    fn fixed_coupon_applies_only_below_total(total in cents(1_000_000), amount in 1i64..=1_000_000) {
        let amount = Decimal::new(amount, 2);
        match apply_coupon(total, CouponDiscount::Fixed(amount)) {
            Ok(reduced) => prop_assert_eq!(reduced, total - amount),
            Err(_) => prop_assert!(amount > total),
        }
    }

    #[test]
    fn line_total_scales_with_quantity(unit in cents(1_000_000), quantity in 1i32..=1000) {
        let total = line_total(unit, quantity);
        prop_assert_eq!(total, unit * Decimal::from(quantity));
    }

    #[test]
    fn page_window_is_clamped(page in -5i64..1000, size in -5i64..1000) {
        let query = ListQuery {
            page: Some(page),
            size: Some(size),
            ..Default::default()
        };
        let window = query.window();
        prop_assert!(window.page >= 1);
        prop_assert!((1..=MAX_PAGE_SIZE).contains(&window.size));
        prop_assert_eq!(window.skip, (window.page - 1) * window.size);
    }
}
