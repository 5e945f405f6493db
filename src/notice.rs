use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::error::{ConsoleError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient, user-visible outcome of an action (the console's toast).
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub kind: Option<ErrorKind>,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        let message = message.into();
        info!("{message}");
        Self {
            level: NoticeLevel::Success,
            message,
            kind: None,
            raised_at: Utc::now(),
        }
    }

    pub fn failure(action: &str, err: &ConsoleError) -> Self {
        error!(action, error = %err, "request failed");
        Self {
            level: NoticeLevel::Error,
            message: format!("Failed to {action}"),
            kind: Some(err.kind()),
            raised_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.raised_at.format("%H:%M:%S"), self.message)?;
        if let Some(kind) = self.kind {
            write!(f, " ({})", kind.as_str())?;
        }
        Ok(())
    }
}
