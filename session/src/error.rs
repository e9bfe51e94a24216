use thiserror::Error;

/// Session-level failure recorded in [`crate::Session::last_error`].
///
/// These are surfaced passively through session state; only login hands its
/// error back to the caller as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthFailed,
    RefreshFailed,
    SessionExpired,
}

impl ErrorKind {
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::AuthFailed => "Authentication failed. Please check your credentials.",
            ErrorKind::RefreshFailed => "Failed to refresh token. Please login again.",
            ErrorKind::SessionExpired => "Your session has expired. Please login again.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.user_message())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("session expired")]
    SessionExpired,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(String),
}

impl SessionError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SessionError::AuthFailed(_) => Some(ErrorKind::AuthFailed),
            SessionError::RefreshFailed(_) => Some(ErrorKind::RefreshFailed),
            SessionError::SessionExpired => Some(ErrorKind::SessionExpired),
            SessionError::Config(_) | SessionError::Http(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
