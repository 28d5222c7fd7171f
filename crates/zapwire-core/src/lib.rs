//! Session lifecycle engine for Zapwire.
//!
//! This crate defines the "ports" (collaborator traits) that the
//! infrastructure layer implements -- the chat client, the session store,
//! the message listener -- plus the components that drive a session through
//! its states: registry, lifecycle manager, watchdog, state poller, monitor,
//! and the session service that ties them together.
//!
//! It depends only on `zapwire-types` -- never on `zapwire-infra` or any
//! database/IO crate.

pub mod client;
pub mod event;
pub mod listener;
pub mod session;
pub mod store;
