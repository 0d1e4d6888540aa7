use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("browser connection lost: {0}")]
    ConnectionLost(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("dom operation failed: {0}")]
    Dom(String),

    #[error("screenshot failed: {0}")]
    Screenshot(String),
}

impl DriverError {
    /// True when the automation backend itself is gone and this session
    /// cannot continue. Everything else is a recoverable per-operation
    /// failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::Launch(_) | DriverError::ConnectionLost(_)
        )
    }
}
