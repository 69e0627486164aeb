//! Port traits implemented by the adapters.

pub mod blueprint_port;
pub mod config_port;
