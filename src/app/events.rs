//! Outbound link events.
//!
//! The [`StorageService`](super::service::StorageService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log to serial, surface a
//! status page, etc.

use crate::error::Error;

/// Structured events emitted by the service facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Too many consecutive failures; the bridge is now treated as absent.
    PresenceLost { consecutive_errors: u8 },

    /// A probe succeeded after the bridge had been marked absent.
    PresenceRestored,

    /// An operation was refused or failed; carries the operation name.
    OperationFailed { op: &'static str, error: Error },

    /// A directory enumeration finished.
    Listed { files: usize, directories: usize, truncated: bool },
}
