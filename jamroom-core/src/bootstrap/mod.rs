//! Startup helpers for the jamroom server

pub mod config;

pub use config::{load_config, resolve_config_path};
