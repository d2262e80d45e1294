// Error handling module
// Defines the error taxonomy for construction and protocol failures

use thiserror::Error;

/// Errors surfaced by the auth client and its collaborators
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token storage could not be constructed; fatal, raised at construction time
    #[error("Storage configuration error: {0}")]
    Configuration(String),

    /// The bridge could not obtain or construct an auth client before wiring
    #[error("Bridge resolution error: {0}")]
    BridgeResolution(String),

    /// A token storage operation failed during a protocol call
    #[error("Token storage error: {0}")]
    Storage(anyhow::Error),

    /// A configured callback (login, refresh, user fetch) failed.
    /// Passed through to the caller untouched, no wrapping or retry.
    #[error(transparent)]
    Upstream(anyhow::Error),
}

/// Result type alias for auth operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AuthError::Configuration("bad database path".to_string());
        assert_eq!(
            err.to_string(),
            "Storage configuration error: bad database path"
        );

        let err = AuthError::BridgeResolution("factory returned no client".to_string());
        assert_eq!(
            err.to_string(),
            "Bridge resolution error: factory returned no client"
        );

        let err = AuthError::Storage(anyhow::anyhow!("disk full"));
        assert_eq!(err.to_string(), "Token storage error: disk full");
    }

    #[test]
    fn test_upstream_error_passes_through() {
        // Callback failures must reach the caller without any wrapping
        let err = AuthError::Upstream(anyhow::anyhow!("invalid credentials"));
        assert_eq!(err.to_string(), "invalid credentials");
    }
}
