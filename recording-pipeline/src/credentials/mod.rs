//! Credential retrieval and per-account token management (§4.11).

pub mod token_manager;

pub use token_manager::{AccessToken, TokenFetcher, TokenManager, UnconfiguredTokenFetcher};
