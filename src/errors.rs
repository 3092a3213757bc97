//! Error types for the diagnostic widget

use std::fmt;

pub type Result<T> = std::result::Result<T, DrWebError>;

#[derive(Debug)]
pub enum DrWebError {
    /// Console or stdout I/O failed
    Io(std::io::Error),

    /// HTTP client could not be built; request failures are recorded in results instead
    Http(reqwest::Error),

    /// Report serialization failed
    Json(serde_json::Error),

    /// Configuration failed validation
    Config(String),

    /// Clipboard could not be opened or written
    Clipboard(String),
}

impl fmt::Display for DrWebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrWebError::Io(err) => write!(f, "Console I/O failed: {}", err),
            DrWebError::Http(err) => write!(f, "Failed to build HTTP client: {}", err),
            DrWebError::Json(err) => write!(f, "Failed to serialize report: {}", err),
            DrWebError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            DrWebError::Clipboard(msg) => write!(f, "Clipboard unavailable: {}", msg),
        }
    }
}

impl std::error::Error for DrWebError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DrWebError::Io(err) => Some(err),
            DrWebError::Http(err) => Some(err),
            DrWebError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DrWebError {
    fn from(err: std::io::Error) -> Self {
        DrWebError::Io(err)
    }
}

impl From<reqwest::Error> for DrWebError {
    fn from(err: reqwest::Error) -> Self {
        DrWebError::Http(err)
    }
}

impl From<serde_json::Error> for DrWebError {
    fn from(err: serde_json::Error) -> Self {
        DrWebError::Json(err)
    }
}

impl From<arboard::Error> for DrWebError {
    fn from(err: arboard::Error) -> Self {
        DrWebError::Clipboard(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_client_build_failure_message() {
        let err = reqwest::Client::builder()
            .user_agent("drweb\nbroken")
            .build()
            .unwrap_err();
        let err = DrWebError::from(err);

        assert!(err.to_string().starts_with("Failed to build HTTP client: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_message_prefixes() {
        let config = DrWebError::Config("duplicate check name: health".to_string());
        assert_eq!(config.to_string(), "Invalid configuration: duplicate check name: health");
        assert!(config.source().is_none());

        let io = DrWebError::from(std::io::Error::other("stdin closed"));
        assert_eq!(io.to_string(), "Console I/O failed: stdin closed");
    }
}
