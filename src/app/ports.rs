//! Port traits: the hexagonal boundary between the protocol core and the outside world.
//!
//! ```text
//!   BusTransport ◀── SdClient (protocol) ──▶ ChunkSink
//!                           │
//!                    StorageService ──▶ EventSink
//! ```
//!
//! Driven adapters (I2C driver, simulated bridge, log output) implement
//! these traits.  The [`SdClient`](crate::protocol::client::SdClient)
//! consumes them via generics, so the protocol core never touches a
//! peripheral register directly.

use crate::error::BusError;

// ───────────────────────────────────────────────────────────────
// Bus transport (driven adapter: protocol → I2C peripheral)
// ───────────────────────────────────────────────────────────────

/// Primitive scoped bus transaction, modelled on a TWI master.
///
/// A multi-phase operation is always
/// `begin / write / end(true)` (path) → `begin / write / end(false)`
/// (command, bus held) → `request(.., true)` (response, bus released).
/// Implementations keep the bus held between an `end(false)` or
/// `request(.., false)` and the next call; the protocol client guarantees
/// a releasing call (or [`release`](Self::release)) on every exit path.
pub trait BusTransport {
    /// Open a write transaction addressed to `address`, discarding any
    /// bytes queued by an unfinished transaction.
    fn begin(&mut self, address: u8);

    /// Queue outbound bytes.  Returns how many were accepted; bytes past
    /// the transmit buffer are dropped silently.
    fn write(&mut self, data: &[u8]) -> usize;

    /// Flush the open transaction.  `release = false` keeps the bus held
    /// so a following [`request`](Self::request) is issued as a repeated
    /// start.
    fn end(&mut self, release: bool) -> Result<(), BusError>;

    /// Read up to `buf.len()` bytes from `address`.  Returns the number of
    /// bytes actually received, which is short on error.
    fn request(&mut self, address: u8, buf: &mut [u8], release: bool) -> usize;

    /// Release a held bus.  No-op if the bus is already free.
    fn release(&mut self);

    /// Switch the bus clock.  Transports without runtime clock control
    /// ignore the call.
    fn set_clock(&mut self, _hz: u32) {}

    /// Bus status behind the most recent short [`request`](Self::request),
    /// if the transport knows it.  Taking it clears it.
    fn take_error(&mut self) -> Option<BusError> {
        None
    }
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn begin(&mut self, address: u8) {
        (**self).begin(address);
    }

    fn write(&mut self, data: &[u8]) -> usize {
        (**self).write(data)
    }

    fn end(&mut self, release: bool) -> Result<(), BusError> {
        (**self).end(release)
    }

    fn request(&mut self, address: u8, buf: &mut [u8], release: bool) -> usize {
        (**self).request(address, buf, release)
    }

    fn release(&mut self) {
        (**self).release();
    }

    fn set_clock(&mut self, hz: u32) {
        (**self).set_clock(hz);
    }

    fn take_error(&mut self) -> Option<BusError> {
        (**self).take_error()
    }
}

// ───────────────────────────────────────────────────────────────
// Chunk sink (driven adapter: protocol → HTTP body / console)
// ───────────────────────────────────────────────────────────────

/// Receives a streamed file body.
///
/// `chunk` is the suspension point of a long read: the web layer flushes
/// to its socket and services background work there.  The bus stays
/// claimed for the whole stream, so nothing called from `chunk` may start
/// another bridge operation (it would be rejected as busy).
pub trait ChunkSink {
    /// Called once, before the first chunk, with the exact body length.
    fn begin(&mut self, total_len: u32);

    /// Called for every chunk in file order.
    fn chunk(&mut self, data: &[u8]);
}

impl ChunkSink for Vec<u8> {
    fn begin(&mut self, total_len: u32) {
        self.clear();
        self.reserve(total_len as usize);
    }

    fn chunk(&mut self, data: &[u8]) {
        self.extend_from_slice(data);
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: service → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The service emits structured [`LinkEvent`](super::events::LinkEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::LinkEvent);
}
