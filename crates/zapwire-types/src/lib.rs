//! Shared domain types for Zapwire.
//!
//! This crate contains the core domain types used across the Zapwire
//! session engine: account/session records, the client event surface,
//! configuration, and the associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod session;
