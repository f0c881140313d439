//! Link health monitor.
//!
//! Observes the outcome of every bridge operation and derives whether the
//! peripheral is currently reachable.  It also owns the busy flag that
//! serialises bus use.
//!
//! ## Presence lifecycle
//!
//! 1. Every transport failure or truncated response increments a
//!    consecutive-error counter.  Any successful operation resets it.
//! 2. When the counter exceeds the configured threshold, presence flips to
//!    absent.  The edge is logged once.
//! 3. An ordinary success does **not** restore presence.  Only a successful
//!    [`probe`](crate::protocol::client::SdClient::probe) does, so a flaky
//!    bridge has to answer an explicit presence check before callers trust
//!    it again.
//!
//! ## Busy flag
//!
//! At most one operation may touch the bus at a time.  Operations take a
//! [`BusyGuard`] for their whole duration; a second caller arriving while
//! the guard is alive is rejected with [`Error::Busy`].  Callers in the
//! cooperative loop must not wait on the flag: the holder cannot make
//! progress until they return.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use log::{error, info};

use crate::error::{Error, Result};

/// Presence edge reported by the `record_*` methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    Lost,
    Restored,
}

/// Process-wide link state, shared between the client and its callers.
#[derive(Debug)]
pub struct LinkHealth {
    present: AtomicBool,
    consecutive_errors: AtomicU8,
    busy: AtomicBool,
    /// Failures tolerated before presence flips.
    threshold: u8,
}

impl LinkHealth {
    /// The bridge is assumed present until the link proves otherwise.
    pub fn new(threshold: u8) -> Self {
        Self {
            present: AtomicBool::new(true),
            consecutive_errors: AtomicU8::new(0),
            busy: AtomicBool::new(false),
            threshold,
        }
    }

    pub fn is_present(&self) -> bool {
        self.present.load(Ordering::Acquire)
    }

    pub fn consecutive_errors(&self) -> u8 {
        self.consecutive_errors.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Record the outcome of one operation.
    ///
    /// Logical failures (not found, busy, protocol violation) leave the
    /// counter untouched.
    pub fn record<T>(&self, outcome: &Result<T>) -> Option<PresenceChange> {
        match outcome {
            Ok(_) => {
                self.record_success();
                None
            }
            Err(e) if e.is_link_failure() => self.record_failure(),
            Err(_) => None,
        }
    }

    /// Reset the failure streak.  Presence is left as it is.
    pub fn record_success(&self) {
        self.consecutive_errors.store(0, Ordering::Release);
    }

    /// Count one failure; returns `Some(Lost)` on the present→absent edge.
    pub fn record_failure(&self) -> Option<PresenceChange> {
        let prev = self
            .consecutive_errors
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(1))
            })
            .unwrap_or(u8::MAX);
        let count = prev.saturating_add(1);

        if count > self.threshold && self.present.swap(false, Ordering::AcqRel) {
            error!("LINK LOST: {count} consecutive bus failures");
            return Some(PresenceChange::Lost);
        }
        None
    }

    /// Record the result of an explicit presence probe.
    pub fn record_probe(&self, responded: bool) -> Option<PresenceChange> {
        if !responded {
            return self.record_failure();
        }
        self.record_success();
        if self.present.swap(true, Ordering::AcqRel) {
            None
        } else {
            info!("LINK RESTORED: bridge answered probe");
            Some(PresenceChange::Restored)
        }
    }

    /// Claim the bus for one operation.
    pub fn try_acquire(self: &Arc<Self>) -> Result<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(BusyGuard {
            health: Arc::clone(self),
        })
    }
}

/// Holds the busy flag; dropping it releases the flag on every exit path.
#[derive(Debug)]
pub struct BusyGuard {
    health: Arc<LinkHealth>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.health.busy.store(false, Ordering::Release);
    }
}
