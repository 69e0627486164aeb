//! Concrete adapter implementations for ports.

pub mod file_blueprint_adapter;
pub mod file_config_adapter;
