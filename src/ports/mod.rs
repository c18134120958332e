//! Port traits the engine's callers depend on.

pub mod config_port;
pub mod price_port;
