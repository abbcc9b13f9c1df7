//! vx: Vault-backed secret manager for monorepos.
//!
//! This crate resolves secrets from a HashiCorp Vault KV v2 store and
//! injects them as environment variables into child processes. A root
//! `vx.toml` declares the Vault connection, environments, shared secrets,
//! and workspace subtrees; workspace configs overlay additional secrets
//! for their subdirectory.
//!
//! # Architecture
//!
//! - **Config**: TOML schema, upward root discovery, and the pure
//!   root ⊕ workspace ⊕ environment merge
//! - **Resolver**: `${env}` templates grouped by Vault path, fetched
//!   concurrently with bounded parallelism and a TTL cache
//! - **Vault**: reqwest-based KV v2 / token client with OIDC (browser) and
//!   AppRole authentication
//! - **Token**: owner-only on-disk token sink, proactive renewal, and the
//!   background daemon supervising it
//! - **Exec**: child process spawning with merged environment, signal
//!   forwarding, and exit-code propagation

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod cli_handler;
pub mod config;
pub mod exec;
pub mod resolver;
pub mod token;
pub mod vault;
