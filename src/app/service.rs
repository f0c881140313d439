//! Storage service: the face the web layer talks to.
//!
//! [`StorageService`] wraps an [`SdClient`] with the policy the protocol
//! client leaves to its callers:
//!
//! - **Presence gating.**  While the bridge is marked absent every call
//!   first probes it; if the probe fails the call is refused with
//!   [`Error::DeviceAbsent`] and no bus traffic beyond the probe happens.
//! - **Boolean collapse.**  `exists`, `remove`, `mkdir` and `rmdir` keep
//!   the single true/false contract of the web handlers.  The typed
//!   results stay available through [`client_mut`](StorageService::client_mut).
//! - **Events.**  Failures and presence edges go out through the
//!   [`EventSink`] port.
//!
//! ```text
//!  StorageRequest ──▶ ┌──────────────────┐ ──▶ EventSink
//!                     │  StorageService  │
//!   BusTransport ◀────│  gate · collapse │
//!                     └──────────────────┘
//! ```

use std::borrow::Cow;

use embedded_hal::delay::DelayNs;
use log::info;

use crate::error::{Error, Result};
use crate::protocol::client::SdClient;
use crate::protocol::command::{CardType, ClockTime, VolumeInfo, WriteMode};
use crate::protocol::listing::{Listing, ListingLimits};

use super::commands::{StorageRequest, StorageResponse};
use super::events::LinkEvent;
use super::ports::{BusTransport, ChunkSink, EventSink};

/// File served for a request path that names a directory.
pub const INDEX_FILE: &str = "index.htm";

/// Map a request path to the file the web layer should read: a trailing
/// `/` means the directory's index page.
pub fn resolve_request_path(path: &str) -> Cow<'_, str> {
    if path.ends_with('/') {
        Cow::Owned(format!("{path}{INDEX_FILE}"))
    } else {
        Cow::Borrowed(path)
    }
}

// ───────────────────────────────────────────────────────────────
// StorageService
// ───────────────────────────────────────────────────────────────

pub struct StorageService<T, D> {
    client: SdClient<T, D>,
    limits: ListingLimits,
}

impl<T: BusTransport, D: DelayNs> StorageService<T, D> {
    /// Listings use the bounded limits from the client's configuration.
    pub fn new(client: SdClient<T, D>) -> Self {
        let limits = ListingLimits::bounded(client.config());
        Self { client, limits }
    }

    pub fn client(&self) -> &SdClient<T, D> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut SdClient<T, D> {
        &mut self.client
    }

    pub fn is_present(&self) -> bool {
        self.client.health().is_present()
    }

    // ── Presence ──────────────────────────────────────────────

    /// Probe the bridge unconditionally.
    pub fn probe(&mut self, sink: &mut impl EventSink) -> Result<()> {
        let was_present = self.is_present();
        let outcome = self.client.probe();
        self.report_presence(was_present, sink);
        outcome
    }

    // ── Boolean-collapsed queries ─────────────────────────────

    /// A bus failure and "does not exist" both read as `false`.
    pub fn exists(&mut self, path: &str, is_directory: bool, sink: &mut impl EventSink) -> bool {
        self.guarded("exists", sink, |c| c.exists(path, is_directory))
            .unwrap_or(false)
    }

    pub fn remove(&mut self, path: &str, sink: &mut impl EventSink) -> bool {
        self.guarded("remove", sink, |c| c.remove(path))
            .unwrap_or(false)
    }

    /// `true` whether the directory was created or already existed.  Only a
    /// failed exchange reports `false`.
    pub fn mkdir(&mut self, path: &str, sink: &mut impl EventSink) -> bool {
        self.guarded("mkdir", sink, |c| c.mkdir(path)).is_ok()
    }

    pub fn rmdir(&mut self, path: &str, sink: &mut impl EventSink) -> bool {
        self.guarded("rmdir", sink, |c| c.rmdir(path))
            .unwrap_or(false)
    }

    // ── Typed operations ──────────────────────────────────────

    pub fn size(&mut self, path: &str, sink: &mut impl EventSink) -> Result<u32> {
        self.guarded("size", sink, |c| c.size(path))
    }

    /// Bounded enumeration for the web listing page.
    pub fn list(&mut self, path: &str, sink: &mut impl EventSink) -> Result<Listing> {
        let limits = self.limits;
        let mut listing = Listing::new();
        self.guarded("list", sink, |c| c.list_into(path, limits, &mut listing))?;
        sink.emit(&LinkEvent::Listed {
            files: listing.files.len(),
            directories: listing.directories.len(),
            truncated: listing.truncated,
        });
        Ok(listing)
    }

    /// Stream a file into `body`; returns the total length.
    pub fn read_to(
        &mut self,
        path: &str,
        body: &mut impl ChunkSink,
        sink: &mut impl EventSink,
    ) -> Result<u32> {
        self.guarded("read", sink, |c| c.read_to(path, body))
    }

    pub fn read_all(&mut self, path: &str, sink: &mut impl EventSink) -> Result<Vec<u8>> {
        self.guarded("read", sink, |c| c.read_all(path))
    }

    pub fn write(
        &mut self,
        path: &str,
        mode: WriteMode,
        data: &[u8],
        sink: &mut impl EventSink,
    ) -> Result<()> {
        self.guarded("write", sink, |c| c.write(path, mode, data))
    }

    pub fn card_type(&mut self, sink: &mut impl EventSink) -> Result<CardType> {
        self.guarded("card_type", sink, SdClient::card_type)
    }

    pub fn volume_info(&mut self, sink: &mut impl EventSink) -> Result<VolumeInfo> {
        self.guarded("volume_info", sink, SdClient::volume_info)
    }

    pub fn set_clock(&mut self, time: &ClockTime, sink: &mut impl EventSink) -> Result<()> {
        self.guarded("set_clock", sink, |c| c.set_clock(time))
    }

    // ── Request dispatch ──────────────────────────────────────

    /// Answer one external request.
    pub fn handle(
        &mut self,
        request: StorageRequest,
        sink: &mut impl EventSink,
    ) -> Result<StorageResponse> {
        Ok(match request {
            StorageRequest::Exists { path, directory } => {
                StorageResponse::Flag(self.exists(&path, directory, sink))
            }
            StorageRequest::Size { path } => StorageResponse::Size(self.size(&path, sink)?),
            StorageRequest::Remove { path } => StorageResponse::Flag(self.remove(&path, sink)),
            StorageRequest::Mkdir { path } => StorageResponse::Flag(self.mkdir(&path, sink)),
            StorageRequest::Rmdir { path } => StorageResponse::Flag(self.rmdir(&path, sink)),
            StorageRequest::List { path } => StorageResponse::Listing(self.list(&path, sink)?),
            StorageRequest::Read { path } => {
                let path = resolve_request_path(&path).into_owned();
                StorageResponse::Body(self.read_all(&path, sink)?)
            }
            StorageRequest::Write { path, mode, data } => {
                self.write(&path, mode, &data, sink)?;
                StorageResponse::Done
            }
            StorageRequest::CardType => StorageResponse::CardType(self.card_type(sink)?),
            StorageRequest::VolumeInfo => StorageResponse::Volume(self.volume_info(sink)?),
            StorageRequest::SetClock(time) => {
                self.set_clock(&time, sink)?;
                StorageResponse::Done
            }
            StorageRequest::Probe => {
                self.probe(sink)?;
                StorageResponse::Done
            }
        })
    }

    // ── Internals ─────────────────────────────────────────────

    /// Run `f` if the bridge is present (probing first if it is not) and
    /// report failures and presence edges.
    fn guarded<R>(
        &mut self,
        op: &'static str,
        sink: &mut impl EventSink,
        f: impl FnOnce(&mut SdClient<T, D>) -> Result<R>,
    ) -> Result<R> {
        let was_present = self.is_present();
        let outcome = if was_present {
            f(&mut self.client)
        } else {
            match self.client.probe() {
                Ok(()) => {
                    info!("{op}: bridge answered probe, proceeding");
                    f(&mut self.client)
                }
                Err(Error::Busy) => Err(Error::Busy),
                Err(_) => Err(Error::DeviceAbsent),
            }
        };
        self.report_presence(was_present, sink);
        if let Err(error) = &outcome {
            sink.emit(&LinkEvent::OperationFailed { op, error: *error });
        }
        outcome
    }

    fn report_presence(&self, was_present: bool, sink: &mut impl EventSink) {
        let health = self.client.health();
        match (was_present, health.is_present()) {
            (true, false) => sink.emit(&LinkEvent::PresenceLost {
                consecutive_errors: health.consecutive_errors(),
            }),
            (false, true) => sink.emit(&LinkEvent::PresenceRestored),
            _ => {}
        }
    }
}
