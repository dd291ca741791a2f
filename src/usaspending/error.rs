use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("USAspending rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Award {0} not found")]
    NotFound(String),

    #[error("USAspending server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("USAspending returned an empty response body")]
    EmptyBody,

    #[error("Invalid JSON from USAspending: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("USAspending request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl ClientError {
    /// 4xx responses describe a malformed request or a missing resource and
    /// will fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Server { .. }
                | ClientError::Transport(_)
                | ClientError::EmptyBody
                | ClientError::Decode(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Rejected { status, .. } | ClientError::Server { status, .. } => {
                Some(*status)
            }
            ClientError::NotFound(_) => Some(404),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn from_status(status: u16, message: String) -> Self {
        if (400..500).contains(&status) {
            ClientError::Rejected { status, message }
        } else {
            ClientError::Server { status, message }
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ClientError::Rejected { .. } => "rejected",
            ClientError::NotFound(_) => "not_found",
            ClientError::Server { .. } => "server_error",
            ClientError::Transport(e) if e.is_timeout() => "timeout",
            ClientError::Transport(_) => "network_error",
            ClientError::EmptyBody => "empty_body",
            ClientError::Decode(_) => "decode_error",
            ClientError::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}
