//! Session credential lifecycle.
//!
//! The Luma API issues short-lived access tokens from `api/start`. Every authenticated call
//! reads the token through [`TokenManager`], which forgets it once expired or once the server
//! reports it unauthorized.

mod token;

pub use token::{SessionToken, TOKEN_LIFETIME, TokenManager};
