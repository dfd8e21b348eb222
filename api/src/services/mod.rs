pub mod api_key;
pub mod auth;
pub mod classifier;
pub mod error;
pub mod uploads;
