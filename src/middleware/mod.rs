pub mod auth;
pub mod rollback;
