//! Marketplace Common Types
//!
//! Wire types shared by the backend and its clients.

pub mod auth;
pub mod provider;

pub use auth::{AuthResponse, IdTokenRequest, SignInRequest, SignUpRequest, WishlistResponse};
pub use provider::{ParseProviderError, Provider};
