pub mod auth;
pub mod error;
pub mod identity;
pub mod response;
