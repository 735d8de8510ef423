//! Authentication middleware for signed-in users

pub mod user_auth;

pub use user_auth::UserIdentity;
