//! Vault API client and authentication flows.
//!
//! [`VaultClient`] wraps the KV v2 and self-token endpoints; [`oidc_auth`]
//! and [`approle_auth`] each leave the client holding a fresh live token on
//! success.

mod approle;
mod client;
mod error;
mod oidc;

pub use approle::approle_auth;
pub use client::{KvEntry, VaultClient};
pub use error::VaultError;
pub use oidc::oidc_auth;
