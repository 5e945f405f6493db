use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("Unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Customer '{id}' not found")]
    NotFound { id: String },

    #[error("A '{slot}' request is already in flight")]
    Busy { slot: &'static str },

    #[error("File save failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used when turning failures into notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Rejected,
    Server,
    Local,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "backend unreachable",
            ErrorKind::Rejected => "request rejected",
            ErrorKind::Server => "backend error",
            ErrorKind::Local => "local error",
        }
    }
}

impl ConsoleError {
    pub fn from_status(status: u16, body: String) -> Self {
        let body: String = body.chars().take(200).collect();
        if status >= 500 {
            ConsoleError::Server { status, body }
        } else {
            ConsoleError::Rejected { status, body }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsoleError::Transport(_) => ErrorKind::Transport,
            ConsoleError::Rejected { .. } | ConsoleError::NotFound { .. } => ErrorKind::Rejected,
            ConsoleError::Server { .. } | ConsoleError::Decode(_) => ErrorKind::Server,
            ConsoleError::Busy { .. } | ConsoleError::Io(_) => ErrorKind::Local,
        }
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;
