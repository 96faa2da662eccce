//! Utilities: logging setup and configuration discovery

pub mod config_paths;
pub mod logger;
