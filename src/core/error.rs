//! Error taxonomy of an acquisition session

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::core::bluetooth::types::CharacteristicRole;

/// Failure to decode a characteristic payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed payload: expected {expected} bytes, got {actual}")]
    MalformedPayload { expected: usize, actual: usize },
    #[error("malformed payload: invalid UTF-8 at byte {valid_up_to}")]
    InvalidUtf8 { valid_up_to: usize },
}

/// Error kinds reported to the observer sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Error)]
pub enum ErrorKind {
    #[error("no matching sensor found before the scan timed out")]
    ScanTimeout,
    #[error("connection to the sensor failed")]
    ConnectionFailure,
    #[error("sensor is missing a required service or characteristic")]
    IncompleteProfile,
    #[error("sensor sent a malformed payload")]
    MalformedPayload,
    #[error("characteristic read failed")]
    CharacteristicReadError,
    #[error("sensor disconnected unexpectedly")]
    UnexpectedDisconnect,
}

impl ErrorKind {
    /// Terminal kinds end the current session; the rest are recovered locally.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::MalformedPayload | Self::CharacteristicReadError)
    }
}

impl From<&CodecError> for ErrorKind {
    fn from(_: &CodecError) -> Self {
        Self::MalformedPayload
    }
}

/// Context accompanying every reported error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    /// Originating characteristic, if any
    pub role: Option<CharacteristicRole>,
    /// Originating service, if any
    pub service: Option<Uuid>,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            role: None,
            service: None,
            message: message.into(),
        }
    }

    pub fn with_role(mut self, role: CharacteristicRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_service(mut self, service: Uuid) -> Self {
        self.service = Some(service);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_payload_and_read_errors_are_recoverable() {
        assert!(!ErrorKind::MalformedPayload.is_terminal());
        assert!(!ErrorKind::CharacteristicReadError.is_terminal());
        assert!(ErrorKind::ScanTimeout.is_terminal());
        assert!(ErrorKind::ConnectionFailure.is_terminal());
        assert!(ErrorKind::IncompleteProfile.is_terminal());
        assert!(ErrorKind::UnexpectedDisconnect.is_terminal());
    }

    #[test]
    fn codec_errors_map_to_malformed_payload() {
        let err = CodecError::InvalidUtf8 { valid_up_to: 3 };
        assert_eq!(ErrorKind::from(&err), ErrorKind::MalformedPayload);
        assert_eq!(err.to_string(), "malformed payload: invalid UTF-8 at byte 3");
    }
}
