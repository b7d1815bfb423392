#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::pedantic
)]
#![forbid(unsafe_code)]

//! [![Crates.io](https://img.shields.io/crates/v/forge-client-core)](https://crates.io/crates/forge-client-core)
//! [![License](https://img.shields.io/badge/License-Apache_2.0-blue.svg)](https://opensource.org/licenses/Apache-2.0)
//!
//! # Forge Client Core
//!
//! A resilient, authenticated HTTP client core for Forge's service APIs. Features include:
//!
//! * `OAuth2` Client Credential flow, with process-local token caching and serialized refreshes
//! * A composed timeout / retry-with-jitter / circuit-breaker resiliency policy around every send
//! * Reactive reauthentication: a single retried refresh when a managed request comes back `401`
//! * `reqwest` integration via a wrapped [`ForgeHttpClient`]
//! * Safe defaults — hides client secrets and bearer tokens in `Debug` output
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use forge_client_core::{AuthHandler, ForgeConfig, ForgeHttpClient, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ForgeConfig::builder("https://identity.example.com/oauth2/token".parse().unwrap())
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .build();
//!
//!     let client = ForgeHttpClient::new(AuthHandler::new(config));
//!
//!     let request = client
//!         .get("https://api.example.com/data")
//!         .build()
//!         .unwrap();
//!     let options = RequestOptions::builder()
//!         .scope("data:read")
//!         .timeout(Duration::from_secs(5))
//!         .build();
//!
//!     let _response = client.execute(request, options).await.unwrap();
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **default**: Includes `rustls-tls`.
//! - **rustls-tls**: Enables `reqwest/rustls-tls` and `reqwest/rustls-tls-native-roots`.

mod breaker;
mod cache;
mod client;
pub mod config;
pub mod error;
mod handler;
mod policy;
mod token_fetcher;
pub mod validator;

pub use client::ForgeHttpClient;
pub use config::{AgentCredentials, ForgeConfig, ForgeConfigBuilder};
pub use error::{Error, Result};
pub use handler::{AuthHandler, RequestOptions};
pub use validator::validate;
