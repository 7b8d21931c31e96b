//! Connection lifecycle and device metadata of a session

use std::fmt;

use serde::Serialize;

use crate::core::error::ErrorKind;

/// Why a session ended in [`ConnectionState::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureReason {
    ScanTimeout,
    ConnectionFailure,
    IncompleteProfile,
}

impl From<FailureReason> for ErrorKind {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::ScanTimeout => ErrorKind::ScanTimeout,
            FailureReason::ConnectionFailure => ErrorKind::ConnectionFailure,
            FailureReason::IncompleteProfile => ErrorKind::IncompleteProfile,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ConnectionState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Connected,
    DiscoveringServices,
    DiscoveringCharacteristics,
    ReadingCharacteristics,
    Ready,
    Disconnected,
    Failed(FailureReason),
}

impl ConnectionState {
    /// True while a peripheral link is established and handles may be valid.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::Connected
                | Self::DiscoveringServices
                | Self::DiscoveringCharacteristics
                | Self::ReadingCharacteristics
                | Self::Ready
        )
    }

    /// True while a connection attempt is outstanding or established.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Connecting) || self.is_connected()
    }

    /// True for states from which a fresh scan may start.
    pub fn can_start_scan(&self) -> bool {
        matches!(self, Self::Idle | Self::Disconnected | Self::Failed(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "Failed({:?})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Device metadata surfaced to the display layer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeviceInfo {
    pub manufacturer_name: String,
    pub connection_state: ConnectionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_may_only_start_from_resting_states() {
        assert!(ConnectionState::Idle.can_start_scan());
        assert!(ConnectionState::Disconnected.can_start_scan());
        assert!(ConnectionState::Failed(FailureReason::ScanTimeout).can_start_scan());
        assert!(!ConnectionState::Scanning.can_start_scan());
        assert!(!ConnectionState::Connecting.can_start_scan());
        assert!(!ConnectionState::Ready.can_start_scan());
    }

    #[test]
    fn connecting_is_busy_but_not_connected() {
        assert!(ConnectionState::Connecting.is_busy());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::ReadingCharacteristics.is_connected());
        assert!(!ConnectionState::Disconnected.is_busy());
    }

    #[test]
    fn display_names_the_failure() {
        assert_eq!(
            ConnectionState::Failed(FailureReason::IncompleteProfile).to_string(),
            "Failed(IncompleteProfile)"
        );
        assert_eq!(ConnectionState::Ready.to_string(), "Ready");
    }
}
