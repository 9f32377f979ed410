//! Error types for the SX1255 driver.

use thiserror::Error;

/// Driver error type
#[derive(Error, Debug)]
pub enum Error {
    /// A GPIO chip, GPIO line or SPI device could not be opened or claimed
    #[error("{resource} unavailable: {reason}")]
    ResourceUnavailable {
        /// The device path or line that could not be acquired
        resource: String,
        /// Reason reported by the platform
        reason: String,
    },

    /// The controller never finished opening, or has been closed
    #[error("controller not initialized")]
    NotInitialized,

    /// A GPIO controller or transport was used after it was closed
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Register address, frequency, burst length or buffer size out of range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The SPI bus or a GPIO line reported an I/O error
    #[error("transport failure during {operation}: {detail}")]
    TransportFailure {
        /// What the driver was doing when the error occurred
        operation: String,
        /// Error reported by the bus or line
        detail: String,
    },

    /// One or more errors while releasing resources
    ///
    /// Every release is attempted; the errors are collected in release order.
    #[error("{} error(s) while releasing resources: {}", .0.len(), join(.0))]
    CompositeClose(Vec<Error>),
}

impl Error {
    pub(crate) fn transport(operation: impl Into<String>, detail: impl core::fmt::Debug) -> Self {
        Self::TransportFailure {
            operation: operation.into(),
            detail: format!("{detail:?}"),
        }
    }

    #[cfg(any(feature = "linux", test))]
    pub(crate) fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::ResourceUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Builds a close result out of the errors collected while releasing.
    ///
    /// Nested composite errors are flattened so callers see one list.
    pub(crate) fn from_close_errors(errors: Vec<Error>) -> Result<()> {
        let mut flat = Vec::with_capacity(errors.len());
        for error in errors {
            match error {
                Error::CompositeClose(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        if flat.is_empty() {
            Ok(())
        } else {
            Err(Error::CompositeClose(flat))
        }
    }
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, Error>;
