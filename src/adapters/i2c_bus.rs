//! I2C adapter: implements [`BusTransport`] over any `embedded-hal` 1.0 bus.
//!
//! On the target this wraps `esp_idf_hal::i2c::I2cDriver`; on the host any
//! [`I2c`] implementation works.
//!
//! `embedded-hal` has no "hold the bus" primitive outside a single
//! [`I2c::transaction`], so the held state is approximated:
//!
//! - `end(false)` defers the queued bytes.  The following `request` sends
//!   them together with the read as one `write_read` (repeated start), which
//!   is exactly what the bridge sees from a TWI master.
//! - Each further `request` on a held bus is its own read transaction.  The
//!   bridge answers every read from its current stream position, so the
//!   extra STOP/START between chunks is invisible to it.
//! - `release()` flushes deferred bytes that were never followed by a read.
//!
//! A failed `request` reports zero bytes and keeps the mapped status for
//! [`BusTransport::take_error`].  Clock changes go to a [`ClockControl`]
//! hook, since `embedded-hal` has no rate setter.

use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};
use heapless::Vec;
use log::{debug, warn};

use crate::app::ports::BusTransport;
use crate::error::BusError;

/// Transmit buffer size of the bridge's TWI peripheral.
pub const TX_BUFFER_LEN: usize = 32;

/// Applies a new SCL rate to the underlying controller.
pub trait ClockControl {
    fn apply(&mut self, hz: u32);
}

impl<F: FnMut(u32)> ClockControl for F {
    fn apply(&mut self, hz: u32) {
        self(hz);
    }
}

/// Controller whose rate is fixed at construction.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedClock;

impl ClockControl for FixedClock {
    fn apply(&mut self, _hz: u32) {}
}

/// Bridge transport over a real I2C controller.
pub struct I2cBus<I, C = FixedClock> {
    i2c: I,
    clock: C,
    address: u8,
    tx: Vec<u8, TX_BUFFER_LEN>,
    /// Bytes of an `end(false)` waiting for the read that follows.
    deferred: Option<Vec<u8, TX_BUFFER_LEN>>,
    last_error: Option<BusError>,
    clock_hz: u32,
}

impl<I: I2c> I2cBus<I> {
    /// Transport without runtime clock control.
    pub fn new(i2c: I, clock_hz: u32) -> Self {
        Self::with_clock_control(i2c, clock_hz, FixedClock)
    }
}

impl<I: I2c, C: ClockControl> I2cBus<I, C> {
    /// `clock_hz` is the rate the controller was configured with.
    pub fn with_clock_control(i2c: I, clock_hz: u32, clock: C) -> Self {
        Self {
            i2c,
            clock,
            address: 0,
            tx: Vec::new(),
            deferred: None,
            last_error: None,
            clock_hz,
        }
    }

    /// Clock most recently applied through [`BusTransport::set_clock`].
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    pub fn into_inner(self) -> I {
        self.i2c
    }
}

impl<I: I2c, C: ClockControl> BusTransport for I2cBus<I, C> {
    fn begin(&mut self, address: u8) {
        self.address = address;
        self.tx.clear();
        self.last_error = None;
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let room = TX_BUFFER_LEN - self.tx.len();
        let n = data.len().min(room);
        // Cannot fail: `n` is bounded by the remaining capacity.
        let _ = self.tx.extend_from_slice(&data[..n]);
        n
    }

    fn end(&mut self, release: bool) -> Result<(), BusError> {
        if !release {
            self.deferred = Some(core::mem::take(&mut self.tx));
            return Ok(());
        }
        self.deferred = None;
        self.i2c
            .write(self.address, &self.tx)
            .map_err(|e| map_error(e.kind()))
    }

    fn request(&mut self, address: u8, buf: &mut [u8], _release: bool) -> usize {
        let outcome = match self.deferred.take() {
            Some(cmd) => self.i2c.write_read(address, &cmd, buf),
            None => self.i2c.read(address, buf),
        };
        match outcome {
            Ok(()) => {
                self.last_error = None;
                buf.len()
            }
            Err(e) => {
                debug!("i2c read of {} bytes failed: {:?}", buf.len(), e.kind());
                self.last_error = Some(map_error(e.kind()));
                0
            }
        }
    }

    fn release(&mut self) {
        if let Some(cmd) = self.deferred.take() {
            if let Err(e) = self.i2c.write(self.address, &cmd) {
                warn!("i2c flush on release failed: {:?}", e.kind());
            }
        }
    }

    fn set_clock(&mut self, hz: u32) {
        if hz != self.clock_hz {
            debug!("i2c clock {} -> {} Hz", self.clock_hz, hz);
            self.clock.apply(hz);
            self.clock_hz = hz;
        }
    }

    fn take_error(&mut self) -> Option<BusError> {
        self.last_error.take()
    }
}

/// Map an `embedded-hal` error onto the Arduino-style status codes the rest
/// of the crate reports.
fn map_error(kind: ErrorKind) -> BusError {
    match kind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => BusError::ADDRESS_NACK,
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => BusError::DATA_NACK,
        _ => BusError::OTHER,
    }
}
