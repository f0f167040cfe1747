//! FTP-specific error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised FTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FtpErrorKind {
    /// TCP / DNS resolution failure.
    ConnectionFailed,
    /// USER/PASS rejected.
    AuthFailed,
    /// Server returned an unexpected reply for a command.
    CommandRejected,
    /// PASV failed or the data socket could not be opened.
    DataChannelFailed,
    /// Transfer aborted or incomplete.
    TransferFailed,
    /// Server sent an un-parseable reply.
    ProtocolError,
    /// Local file I/O error.
    IoError,
    /// Operation timed out.
    Timeout,
    /// Unknown session id.
    SessionNotFound,
    /// Control connection is gone (or was never opened).
    Disconnected,
    /// Dataset or member not found on the host.
    NotFound,
    /// RACF or dataset protection refused the request.
    PermissionDenied,
    /// Cancelled through a `CancelToken`.
    Cancelled,
    /// Config / parameter validation error.
    InvalidConfig,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
            session_id: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_session(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectionFailed, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::AuthFailed, msg)
    }

    pub fn command_rejected(code: u16, msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::CommandRejected, msg).with_code(code)
    }

    pub fn data_channel(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::DataChannelFailed, msg)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ProtocolError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::IoError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn session_not_found(id: &str) -> Self {
        Self::new(
            FtpErrorKind::SessionNotFound,
            format!("MVS FTP session '{}' not found", id),
        )
        .with_session(id)
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Disconnected, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Cancelled, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    pub fn pool_exhausted(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    /// Classify an FTP reply code into the most appropriate error kind.
    ///
    /// The message is the raw reply text so callers can surface exactly what
    /// the host said (z/OS puts the useful detail in the `EZA` message).
    pub fn from_reply(code: u16, text: &str) -> Self {
        let kind = match code {
            421 => FtpErrorKind::Disconnected,
            425 | 426 => FtpErrorKind::DataChannelFailed,
            430 | 530 => FtpErrorKind::AuthFailed,
            450 | 550 => {
                let lower = text.to_lowercase();
                if lower.contains("not authorized") || lower.contains("denied") {
                    FtpErrorKind::PermissionDenied
                } else if lower.contains("not found") || lower.contains("no such") {
                    FtpErrorKind::NotFound
                } else {
                    FtpErrorKind::CommandRejected
                }
            }
            451 | 452 | 552 => FtpErrorKind::TransferFailed,
            // Includes positive replies where a different code was required.
            _ => FtpErrorKind::CommandRejected,
        };
        Self {
            kind,
            message: text.to_string(),
            code: Some(code),
            session_id: None,
        }
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)
        } else {
            write!(f, "[FTP {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::io_error(e.to_string())
        }
    }
}

impl From<FtpError> for String {
    fn from(e: FtpError) -> String {
        e.message
    }
}
