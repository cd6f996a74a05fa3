//! Error types for Appwall.

use std::io;

use thiserror::Error;

/// Result type alias for Appwall operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Appwall.
///
/// Only `start()` and `request_start()` surface failures to callers.
/// Mid-session rebuild failures and interface teardown failures are
/// absorbed internally and logged, never propagated.
#[derive(Error, Debug)]
pub enum Error {
    /// The platform refused or failed to create the virtual interface.
    ///
    /// Recoverable: the gateway remains `Stopped` when this happens during
    /// an initial start, or stays `Active` with an absent interface when a
    /// mid-session rebuild fails (the latter is never surfaced).
    #[error("interface establishment failed: {0}")]
    EstablishmentFailed(String),

    /// The hosting environment declined interception privileges.
    #[error("interception authorization denied")]
    AuthorizationDenied,

    /// The gateway worker is gone; commands can no longer be delivered.
    #[error("gateway worker unavailable")]
    WorkerGone,

    // Store errors
    #[error("block-list store error: {0}")]
    Store(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the caller may retry the failed operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EstablishmentFailed(_) | Self::AuthorizationDenied
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::EstablishmentFailed("no handle".into());
        assert_eq!(
            err.to_string(),
            "interface establishment failed: no handle"
        );
        assert_eq!(
            Error::AuthorizationDenied.to_string(),
            "interception authorization denied"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::EstablishmentFailed("x".into()).is_recoverable());
        assert!(Error::AuthorizationDenied.is_recoverable());
        assert!(!Error::Internal("x".into()).is_recoverable());
    }
}
