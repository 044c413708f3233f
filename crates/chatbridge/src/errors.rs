use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Target window is not responding: {0}")]
    Unresponsive(String),

    #[error("Interaction failed: {0}")]
    Interaction(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for BridgeError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            BridgeError::Timeout(error.to_string())
        } else {
            BridgeError::Delivery(error.to_string())
        }
    }
}
