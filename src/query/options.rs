use crate::errors::AdapterError;
use crate::utils::json::is_truthy;
use serde_json::{Map, Value};

/// Option keys the table store cannot serve. A request carrying any of them is
/// rejected whole rather than partially translated.
pub const UNSUPPORTED_OPTIONS: &[&str] = &["groupBy", "sum", "average", "min", "max", "sort"];

/// First unsupported key present with a truthy value, in table order.
#[must_use]
pub fn unsupported_option(options: &Map<String, Value>) -> Option<&'static str> {
    UNSUPPORTED_OPTIONS
        .iter()
        .copied()
        .find(|key| options.get(*key).is_some_and(is_truthy))
}

/// Pre-flight gate: false if the options ask for anything unsupported.
#[must_use]
pub fn check_options(options: &Map<String, Value>) -> bool {
    unsupported_option(options).is_none()
}

/// Gate used by every read path; names the calling operation in the error.
///
/// # Errors
/// Returns `AdapterError::Unsupported` for the first offending key.
pub fn ensure_supported(operation: &str, options: &Map<String, Value>) -> Result<(), AdapterError> {
    match unsupported_option(options) {
        Some(option) => {
            log::warn!("{operation}: rejected unsupported option '{option}'");
            Err(AdapterError::unsupported(operation, option))
        }
        None => Ok(()),
    }
}
