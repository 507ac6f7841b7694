pub mod auth;

pub use auth::{authorize, AuthUser, CurrentToken, Requirements};
