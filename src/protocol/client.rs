//! Bridge protocol client.
//!
//! [`SdClient`] drives every stateful operation as the same three-phase
//! sequence:
//!
//! ```text
//!  path phase      begin ─ 'F' path ─ end(release)
//!  command phase   begin ─ cmd      ─ end(hold)
//!  data phase      request(n, …) × k ─ release
//! ```
//!
//! Every exit path, including errors, leaves the bus released.  Each
//! public operation claims the shared busy flag for its whole duration and
//! reports its outcome to [`LinkHealth`].

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::{BusTransport, ChunkSink};
use crate::config::BusConfig;
use crate::error::{BusError, Error, Result};
use crate::health::{LinkHealth, PresenceChange};

use super::chunked::{TransferState, chunk_payload};
use super::codec::{
    SIZE_REPLY_LEN, VOLUME_REPLY_LEN, decode_flag, decode_size, decode_volume_info, encode_clock,
};
use super::command::{CardType, ClockTime, Command, VolumeInfo, WriteMode};
use super::listing::{Decoded, ENTRY_SIZE_LEN, EntryDecoder, Listing, ListingLimits};

/// Client for the SD-card bridge.
pub struct SdClient<T, D> {
    bus: T,
    delay: D,
    config: BusConfig,
    health: Arc<LinkHealth>,
}

impl<T: BusTransport, D: DelayNs> SdClient<T, D> {
    /// Build a client with its own link monitor.
    pub fn new(bus: T, delay: D, config: BusConfig) -> Self {
        let health = Arc::new(LinkHealth::new(config.max_consecutive_errors));
        Self::with_health(bus, delay, config, health)
    }

    /// Build a client around a link monitor shared with other callers.
    pub fn with_health(bus: T, delay: D, config: BusConfig, health: Arc<LinkHealth>) -> Self {
        Self {
            bus,
            delay,
            config,
            health,
        }
    }

    pub fn health(&self) -> &Arc<LinkHealth> {
        &self.health
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn bus(&self) -> &T {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut T {
        &mut self.bus
    }

    // ── Presence ──────────────────────────────────────────────

    /// Send an empty addressed transaction and update presence from the
    /// acknowledgement.  This is the only call that can restore presence.
    pub fn probe(&mut self) -> Result<()> {
        let _busy = self.health.try_acquire()?;
        self.bus.begin(self.config.address);
        let outcome = self.bus.end(true).map_err(Error::from);
        if let Err(e) = &outcome {
            debug!("probe: {e}");
            self.bus.release();
        }
        self.health.record_probe(outcome.is_ok());
        outcome
    }

    // ── Query operations ──────────────────────────────────────

    /// Does `path` exist as a directory (`is_directory`) or as a file?
    pub fn exists(&mut self, path: &str, is_directory: bool) -> Result<bool> {
        let cmd = if is_directory {
            Command::DirExists
        } else {
            Command::FileExists
        };
        self.run("exists", |c| c.path_query_flag(path, cmd))
    }

    /// Remove a file.  `Ok(false)` means the bridge refused.
    pub fn remove(&mut self, path: &str) -> Result<bool> {
        self.run("remove", |c| c.path_query_flag(path, Command::RemoveFile))
    }

    /// Create a directory.  `Ok(false)` usually means it already exists;
    /// the bridge does not say which.
    pub fn mkdir(&mut self, path: &str) -> Result<bool> {
        self.run("mkdir", |c| c.path_query_flag(path, Command::MakeDir))
    }

    /// Remove a directory.  `Ok(false)` covers both "not empty" and
    /// "not found".
    pub fn rmdir(&mut self, path: &str) -> Result<bool> {
        self.run("rmdir", |c| c.path_query_flag(path, Command::RemoveDir))
    }

    /// File size in bytes.  `0` means empty or absent.
    pub fn size(&mut self, path: &str) -> Result<u32> {
        self.run("size", |c| {
            c.select_path(path)?;
            c.query_size()
        })
    }

    pub fn card_type(&mut self) -> Result<CardType> {
        self.run("card_type", |c| {
            let mut reply = [0u8; 1];
            c.command_phase(Command::CardType)?;
            c.request_exact(&mut reply)?;
            CardType::from_byte(reply[0])
        })
    }

    pub fn volume_info(&mut self) -> Result<VolumeInfo> {
        self.run("volume_info", |c| {
            let mut reply = [0u8; VOLUME_REPLY_LEN];
            c.command_phase(Command::VolumeInfo)?;
            c.request_exact(&mut reply)?;
            decode_volume_info(&reply)
        })
    }

    /// Push wall-clock time to the bridge (used for file timestamps).
    pub fn set_clock(&mut self, time: &ClockTime) -> Result<()> {
        self.run("set_clock", |c| {
            let payload = encode_clock(time);
            c.bus.begin(c.config.address);
            c.bus.write(&[Command::SetClock.byte()]);
            c.bus.write(&payload);
            c.bus.end(true).map_err(|e| c.abort_phase("clock", e))
        })
    }

    // ── Chunked transfer ──────────────────────────────────────

    /// Write or append `data` to `path`.
    ///
    /// An empty `data` sends nothing, so `WriteMode::Write` with an empty
    /// message leaves an existing file untouched.  A failure mid-transfer
    /// leaves the file holding every chunk sent before it.
    pub fn write(&mut self, path: &str, mode: WriteMode, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            warn!("write {path}: empty message, nothing sent");
            return Ok(());
        }
        self.run("write", |c| {
            c.select_path(path)?;
            let body = c
                .switch_clock(c.config.transfer_clock_hz)
                .and_then(|()| c.write_chunks(path, mode, data));
            c.bus.set_clock(c.config.bus_clock_hz);
            body
        })
    }

    /// Stream the body of `path` into `sink`.  Returns the body length.
    pub fn read_to(&mut self, path: &str, sink: &mut impl ChunkSink) -> Result<u32> {
        self.run("read", |c| {
            c.select_path(path)?;
            let size = c.query_size()?;
            if size == 0 {
                info!("read {path}: empty or not found");
                return Err(Error::NotFound);
            }
            let body = c
                .switch_clock(c.config.transfer_clock_hz)
                .and_then(|()| c.read_body(size, sink));
            c.bus.set_clock(c.config.bus_clock_hz);
            body.map(|()| size)
        })
    }

    /// Read the whole body of `path` into memory.
    pub fn read_all(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        self.read_to(path, &mut body)?;
        Ok(body)
    }

    // ── Directory enumeration ─────────────────────────────────

    /// Enumerate `path` with no limits.
    pub fn list(&mut self, path: &str) -> Result<Listing> {
        let mut listing = Listing::new();
        self.list_into(path, ListingLimits::unbounded(), &mut listing)?;
        Ok(listing)
    }

    /// Enumerate `path` into `out`.
    ///
    /// `out` is cleared first.  On error it keeps every entry decoded
    /// before the failure.
    pub fn list_into(&mut self, path: &str, limits: ListingLimits, out: &mut Listing) -> Result<()> {
        out.clear();
        self.run("list", |c| {
            c.select_path(path)?;
            c.command_phase(Command::List)?;
            let stream = c.read_listing(limits, out);
            c.bus.release();
            stream
        })
    }

    // ── Internal: operation wrapper ───────────────────────────

    fn run<R>(&mut self, op: &'static str, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let _busy = self.health.try_acquire().inspect_err(|_| {
            warn!("{op}: rejected, bus busy");
        })?;
        let outcome = f(self);
        if let Err(e) = &outcome {
            match e {
                Error::NotFound => debug!("{op}: {e}"),
                _ => warn!("{op}: {e}"),
            }
        }
        if self.health.record(&outcome) == Some(PresenceChange::Lost) {
            warn!("{op}: bridge marked absent");
        }
        outcome
    }

    // ── Internal: phases ──────────────────────────────────────

    /// Path phase: `'F'` + raw path bytes, bus released.
    fn select_path(&mut self, path: &str) -> Result<()> {
        self.bus.begin(self.config.address);
        self.bus.write(&[Command::SelectPath.byte()]);
        let sent = self.bus.write(path.as_bytes());
        if sent < path.len() {
            debug!("path '{path}' truncated to {sent} bytes by transmit buffer");
        }
        self.bus.end(true).map_err(|e| self.abort_phase("path", e))?;
        self.pause();
        Ok(())
    }

    /// Command phase: one command byte, bus held for the reply.
    fn command_phase(&mut self, cmd: Command) -> Result<()> {
        self.bus.begin(self.config.address);
        self.bus.write(&[cmd.byte()]);
        self.bus
            .end(false)
            .map_err(|e| self.abort_phase(command_name(cmd), e))
    }

    /// Request exactly `buf.len()` bytes and release the bus.
    fn request_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let received = self.bus.request(self.config.address, buf, true);
        if received < buf.len() {
            self.bus.release();
            return Err(self.short_read(buf.len(), received));
        }
        Ok(())
    }

    fn path_query_flag(&mut self, path: &str, cmd: Command) -> Result<bool> {
        let mut reply = [0u8; 1];
        self.select_path(path)?;
        self.command_phase(cmd)?;
        self.pause();
        self.request_exact(&mut reply)?;
        Ok(decode_flag(reply[0]))
    }

    /// `'S'` phase on an already selected path.
    fn query_size(&mut self) -> Result<u32> {
        let mut reply = [0u8; SIZE_REPLY_LEN];
        self.command_phase(Command::Size)?;
        self.pause();
        self.request_exact(&mut reply)?;
        Ok(decode_size(reply))
    }

    fn write_chunks(&mut self, path: &str, mode: WriteMode, data: &[u8]) -> Result<()> {
        for chunk in chunk_payload(mode, data, self.config.write_chunk_len()) {
            self.bus.begin(self.config.address);
            let mut sent = self.bus.write(&[chunk.command.byte()]);
            sent += self.bus.write(chunk.data);
            if sent < chunk.data.len() + 1 {
                warn!(
                    "write {path}: aborted at offset {}, chunk exceeds transmit buffer",
                    chunk.offset
                );
                self.bus.release();
                return Err(Error::Bus(BusError::DATA_TOO_LONG));
            }
            if let Err(e) = self.bus.end(true) {
                warn!("write {path}: aborted at offset {}: {e}", chunk.offset);
                self.bus.release();
                return Err(e.into());
            }
            self.pause();
        }
        Ok(())
    }

    /// `'R'` phase and chunked body, bus held between chunks.
    fn read_body(&mut self, size: u32, sink: &mut impl ChunkSink) -> Result<()> {
        self.command_phase(Command::Read)?;
        self.pause();
        sink.begin(size);

        let mut state = TransferState::new(size, self.config.read_chunk_len());
        let mut buf = vec![0u8; state.chunk_size];
        while !state.is_complete() {
            let want = state.next_request_len();
            let last = state.next_is_last();
            let received = self.bus.request(self.config.address, &mut buf[..want], last);
            if received < want {
                warn!(
                    "read: short chunk at offset {} (expected {want}, got {received})",
                    state.offset
                );
                self.bus.release();
                return Err(self.short_read(want, received));
            }
            sink.chunk(&buf[..want]);
            state.advance(want);
            if !last {
                self.gap();
            }
        }
        Ok(())
    }

    /// Pull the `'L'` stream until the end marker or the entry cap.
    ///
    /// The caller releases the bus afterwards on every path.
    fn read_listing(&mut self, limits: ListingLimits, out: &mut Listing) -> Result<()> {
        let mut decoder = EntryDecoder::new(limits);
        let mut buf = [0u8; ENTRY_SIZE_LEN];
        loop {
            let want = decoder.want();
            if want == 0 {
                break;
            }
            let received = self.bus.request(self.config.address, &mut buf[..want], false);
            if received < want {
                return Err(self.short_read(want, received));
            }
            for &b in &buf[..want] {
                match decoder.push(b)? {
                    Decoded::Entry(entry) => {
                        out.push(entry);
                        self.gap();
                    }
                    Decoded::End | Decoded::Pending => {}
                }
            }
        }
        out.truncated = decoder.is_capped();
        if out.truncated {
            warn!("list: stopped at {} entries", decoder.entries());
        }
        Ok(())
    }

    /// Raise the clock for a bulk transfer and check the bridge still
    /// acknowledges at the new rate.
    fn switch_clock(&mut self, hz: u32) -> Result<()> {
        self.bus.set_clock(hz);
        self.bus.begin(self.config.address);
        self.bus.end(true).map_err(|e| self.abort_phase("clock-sync", e))
    }

    /// A request came back short: report the bus status if the transport
    /// saw one, otherwise the byte counts.
    fn short_read(&mut self, expected: usize, received: usize) -> Error {
        match self.bus.take_error() {
            Some(e) => {
                warn!("read phase failed: {e}");
                Error::Bus(e)
            }
            None => Error::ShortRead { expected, received },
        }
    }

    /// Log a failed phase, make sure the bus is free, and convert.
    fn abort_phase(&mut self, phase: &str, e: BusError) -> Error {
        warn!("{phase} phase failed: {e}");
        self.bus.release();
        Error::Bus(e)
    }

    fn pause(&mut self) {
        if self.config.phase_delay_ms > 0 {
            self.delay.delay_ms(self.config.phase_delay_ms);
        }
    }

    fn gap(&mut self) {
        if self.config.chunk_gap_ms > 0 {
            self.delay.delay_ms(self.config.chunk_gap_ms);
        }
    }
}

fn command_name(cmd: Command) -> &'static str {
    match cmd {
        Command::SelectPath => "path",
        Command::Write => "write",
        Command::Append => "append",
        Command::Size => "size",
        Command::Read => "read",
        Command::FileExists => "file-exists",
        Command::DirExists => "dir-exists",
        Command::RemoveFile => "remove",
        Command::MakeDir => "mkdir",
        Command::RemoveDir => "rmdir",
        Command::CardType => "card-type",
        Command::VolumeInfo => "volume-info",
        Command::List => "list",
        Command::SetClock => "clock",
    }
}
