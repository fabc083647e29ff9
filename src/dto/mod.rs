pub mod auth;
pub mod cart;
pub mod catalog;
pub mod coupons;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

use validator::ValidationError;

/// Phone numbers are exactly ten characters.
pub fn validate_phone_numbers(phones: &[String]) -> Result<(), ValidationError> {
    if phones.iter().all(|p| p.chars().count() == 10) {
        Ok(())
    } else {
        Err(ValidationError::new("phone_length")
            .with_message("phone numbers must be 10 characters".into()))
    }
}
