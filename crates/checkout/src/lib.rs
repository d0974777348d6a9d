//! Verdon checkout engine.
//!
//! This crate turns a mutable server-owned cart, a customer's saved
//! addresses, destination-priced shipping options, and optionally-applied
//! promotion/gift-card codes into a single internally-consistent checkout
//! submission.
//!
//! # Architecture
//!
//! - The commerce API is the source of truth for all cart arithmetic - the
//!   engine never computes discounts locally, it re-fetches after every
//!   mutation
//! - Every async operation that can be superseded (shipping quotes) carries
//!   an explicit token and discards stale completions
//! - Components return plain `Result`s; only the embedding application
//!   raises user-visible notifications
//!
//! # Example
//!
//! ```rust,ignore
//! use verdon_checkout::{CheckoutEngine, CustomerContext};
//! use verdon_checkout::api::HttpCommerceClient;
//!
//! let client = HttpCommerceClient::new(&config)?;
//! let engine = CheckoutEngine::new(client, CustomerContext::new(profile));
//!
//! engine.start().await?;
//! engine.select_address("2").await?;
//! engine.apply_promotion("WELCOME10").await?;
//! let outcome = engine.submit().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod api;
pub mod billing;
pub mod config;
pub mod country;
pub mod engine;
pub mod error;
pub mod promotion;
pub mod session;
pub mod shipping;
pub mod submit;
pub mod validate;

pub use engine::{CheckoutEngine, CustomerContext};
pub use error::{CheckoutError, Result};
