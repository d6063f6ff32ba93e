use std::fmt;
use std::path::PathBuf;

/// Failure reported by the remote assistant service.
///
/// `code` is the HTTP status when the service answered, `None` for transport
/// failures that never produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub code: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn code_display(&self) -> String {
        match self.code {
            Some(code) => code.to_string(),
            None => "none".into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "remote error (code {}): {}",
            self.code_display(),
            self.message
        )
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            code: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MiddlewareError {
    #[error("Failed to renew session, error code: {}, message: {}", .0.code_display(), .0.message)]
    SessionCreation(RemoteError),

    #[error("Failed to delete user data, response code: {}, message: {}", .0.code_display(), .0.message)]
    SessionDeletion(RemoteError),

    #[error("{0} is called before the first receive call")]
    StateNotInitialized(&'static str),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("storage I/O failed at {}: {source}", .path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid store at {}: {source}", .path.display())]
    StorageFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("hook failed: {0}")]
    Hook(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MiddlewareError>;
