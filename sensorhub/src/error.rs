//! Errors that end the hub loop.

use thiserror::Error;

/// Failures the hub cannot recover from.
///
/// Unit read and transport failures are handled inside the cycle and never
/// show up here.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("reading '{id}' cannot be encoded: {source}")]
    Encode {
        id: String,
        #[source]
        source: sensorhub_common::Error,
    },
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
