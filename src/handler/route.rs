//! Registration keys.

use std::fmt;

use crate::error::{DispatchError, Result};

/// Where a handler is registered.
///
/// Exact names are converted from strings; the catch-all slot is the
/// distinct [`Route::Fallback`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// Exact operation or notification name.
    Name(String),
    /// Handles every name without an exact registration.
    Fallback,
}

impl Route {
    /// Reject exact routes with an empty name.
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Route::Name(name) if name.is_empty() => Err(DispatchError::Configuration(
                "empty handler name; register Route::Fallback to catch all names".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether this is the fallback route.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Route::Fallback)
    }
}

impl From<&str> for Route {
    fn from(name: &str) -> Self {
        Route::Name(name.to_string())
    }
}

impl From<String> for Route {
    fn from(name: String) -> Self {
        Route::Name(name)
    }
}

impl From<&String> for Route {
    fn from(name: &String) -> Self {
        Route::Name(name.clone())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Name(name) => write!(f, "{:?}", name),
            Route::Fallback => f.write_str("<fallback>"),
        }
    }
}
