//! Shared building blocks of the jamroom listening-room coordinator:
//! identifiers and room models, configuration, logging and the narrow
//! identity/quota interfaces the coordinator consumes.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};
