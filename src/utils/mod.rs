//! Shared utilities

pub mod config;
pub mod error;
pub mod platform;

pub use config::{AppSettings, Session};
pub use error::MediagrabError;
