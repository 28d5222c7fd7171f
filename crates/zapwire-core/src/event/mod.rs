//! Session event broadcasting.

pub mod bus;

pub use bus::EventBus;
