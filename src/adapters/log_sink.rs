//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing link events to the `log` facade
//! (UART / USB-CDC on the device, whatever logger the host installs
//! otherwise).

use log::{error, info, warn};

use crate::app::events::LinkEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`LinkEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &LinkEvent) {
        match event {
            LinkEvent::PresenceLost { consecutive_errors } => {
                error!("LINK | absent after {} consecutive errors", consecutive_errors);
            }
            LinkEvent::PresenceRestored => {
                info!("LINK | present");
            }
            LinkEvent::OperationFailed { op, error } => {
                warn!("OP   | {} failed: {}", op, error);
            }
            LinkEvent::Listed {
                files,
                directories,
                truncated,
            } => {
                info!(
                    "LIST | files={} dirs={}{}",
                    files,
                    directories,
                    if *truncated { " (truncated)" } else { "" }
                );
            }
        }
    }
}
