//! Price arithmetic shared by catalog, cart and order flows.
//!
//! All amounts are [`Decimal`] and rounded to two places at the boundary of
//! each operation, so stored prices never carry sub-cent noise.

use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

/// Base price after the product's own discount percentage.
pub fn applied_price(base: Decimal, discount_percent: Decimal) -> Decimal {
    (base * (Decimal::ONE - discount_percent / Decimal::ONE_HUNDRED)).round_dp(2)
}

pub fn validate_product_pricing(base: Decimal, discount_percent: Decimal) -> AppResult<()> {
    if base.is_sign_negative() {
        return Err(AppError::bad_request("base price must not be negative"));
    }
    if discount_percent.is_sign_negative() || discount_percent > Decimal::ONE_HUNDRED {
        return Err(AppError::bad_request("discount must be between 0 and 100"));
    }
    Ok(())
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    (unit_price * Decimal::from(quantity)).round_dp(2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponDiscount {
    Fixed(Decimal),
    Percentage(Decimal),
}

impl CouponDiscount {
    /// Build a discount from the stored coupon flags. Exactly one flag must be set.
    pub fn from_flags(amount: Decimal, is_fixed: bool, is_percentage: bool) -> AppResult<Self> {
        match (is_fixed, is_percentage) {
            (true, false) => {
                if amount < Decimal::ONE {
                    return Err(AppError::bad_request("coupon amount must be at least 1"));
                }
                Ok(CouponDiscount::Fixed(amount))
            }
            (false, true) => {
                if amount < Decimal::ONE || amount > Decimal::ONE_HUNDRED {
                    return Err(AppError::bad_request(
                        "percentage coupon must be between 1 and 100",
                    ));
                }
                Ok(CouponDiscount::Percentage(amount))
            }
            (true, true) => Err(AppError::bad_request(
                "coupon can be either fixed or percentage, not both",
            )),
            (false, false) => Err(AppError::bad_request(
                "coupon must be either fixed or percentage",
            )),
        }
    }
}

/// Reduce an order total by a coupon. A fixed amount larger than the total is
/// rejected rather than clamped.
pub fn apply_coupon(total: Decimal, discount: CouponDiscount) -> AppResult<Decimal> {
    match discount {
        CouponDiscount::Fixed(amount) => {
            if amount > total {
                return Err(AppError::bad_request("You cannot use this coupon"));
            }
            Ok((total - amount).round_dp(2))
        }
        CouponDiscount::Percentage(percent) => {
            let reduced = total * (Decimal::ONE - percent / Decimal::ONE_HUNDRED);
            Ok(reduced.round_dp(2).max(Decimal::ZERO))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn applied_price_subtracts_discount() {
        assert_eq!(applied_price(dec!(200), dec!(25)), dec!(150));
        assert_eq!(applied_price(dec!(99.99), dec!(0)), dec!(99.99));
        assert_eq!(applied_price(dec!(99.99), dec!(100)), dec!(0));
    }

    #[test]
    fn applied_price_rounds_to_cents() {
        assert_eq!(applied_price(dec!(10), dec!(33.333)), dec!(6.67));
    }

    #[test]
    fn pricing_validation_bounds() {
        assert!(validate_product_pricing(dec!(0), dec!(0)).is_ok());
        assert!(validate_product_pricing(dec!(-1), dec!(0)).is_err());
        assert!(validate_product_pricing(dec!(10), dec!(100.01)).is_err());
    }

    #[test]
    fn fixed_coupon_subtracts_amount() {
        let total = apply_coupon(dec!(120), CouponDiscount::Fixed(dec!(20))).unwrap();
        assert_eq!(total, dec!(100));
    }

    #[test]
    fn fixed_coupon_larger_than_total_is_rejected() {
        let err = apply_coupon(dec!(10), CouponDiscount::Fixed(dec!(10.01))).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn fixed_coupon_equal_to_total_gives_zero() {
        let total = apply_coupon(dec!(10), CouponDiscount::Fixed(dec!(10))).unwrap();
        assert_eq!(total, dec!(0));
    }

    #[test]
    fn percentage_coupon_scales_total() {
        let total = apply_coupon(dec!(80), CouponDiscount::Percentage(dec!(25))).unwrap();
        assert_eq!(total, dec!(60));
    }

    #[test]
    fn coupon_flags_must_pick_exactly_one_kind() {
        assert!(CouponDiscount::from_flags(dec!(5), true, true).is_err());
        assert!(CouponDiscount::from_flags(dec!(5), false, false).is_err());
        assert!(CouponDiscount::from_flags(dec!(101), false, true).is_err());
        assert_eq!(
            CouponDiscount::from_flags(dec!(150), true, false).unwrap(),
            CouponDiscount::Fixed(dec!(150))
        );
    }

    #[test]
    fn coupon_amount_must_be_at_least_one() {
        for (fixed, percentage) in [(true, false), (false, true)] {
            let err = CouponDiscount::from_flags(dec!(0.5), fixed, percentage).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
            assert!(CouponDiscount::from_flags(dec!(0), fixed, percentage).is_err());
            assert!(CouponDiscount::from_flags(dec!(1), fixed, percentage).is_ok());
        }
    }

    #[test]
    fn line_total_multiplies_quantity() {
        assert_eq!(line_total(dec!(19.99), 3), dec!(59.97));
    }
}
