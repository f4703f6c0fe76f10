//! Shared helpers: operational notices and JSON value utilities.
pub mod devlog;
pub mod json;
