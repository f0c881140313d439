//! Unified error types for the SD-card bridge client.
//!
//! A single `Error` enum that every protocol phase converts into, keeping
//! the caller's error handling uniform. All variants are `Copy` so they can
//! be recorded by [`LinkHealth`](crate::health::LinkHealth) and passed back
//! through the service facade without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level client error
// ---------------------------------------------------------------------------

/// Every fallible bridge operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A transaction did not complete at the transport level.
    Bus(BusError),
    /// The peripheral returned fewer bytes than the phase requires.
    ShortRead { expected: usize, received: usize },
    /// A typed marker was expected but some other byte arrived.
    ProtocolViolation(u8),
    /// Size query reported 0: the file is empty or does not exist.
    NotFound,
    /// The peripheral answered with its explicit failure status (`0xFF`).
    PeerFailure,
    /// A status byte that is neither success nor the failure marker.
    UnexpectedStatus(u8),
    /// Card type byte outside the known range.
    InvalidCardType(u8),
    /// Another operation holds the bus.
    Busy,
    /// The peripheral has been marked absent by the link monitor.
    DeviceAbsent,
    /// A listing entry name did not terminate within the read limit.
    NameTooLong,
}

impl Error {
    /// Whether this failure counts against link health.
    ///
    /// Only transport failures and truncated responses say anything about
    /// the peripheral's reachability; logical results do not.
    pub const fn is_link_failure(self) -> bool {
        matches!(self, Self::Bus(_) | Self::ShortRead { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::ShortRead { expected, received } => {
                write!(f, "short read: expected {expected} bytes, got {received}")
            }
            Self::ProtocolViolation(b) => write!(f, "protocol violation: unexpected byte 0x{b:02X}"),
            Self::NotFound => write!(f, "file is empty or not found"),
            Self::PeerFailure => write!(f, "peripheral reported failure"),
            Self::UnexpectedStatus(b) => write!(f, "unexpected status byte 0x{b:02X}"),
            Self::InvalidCardType(b) => write!(f, "invalid card type {b}"),
            Self::Busy => write!(f, "bus busy with another transfer"),
            Self::DeviceAbsent => write!(f, "SD bridge not present"),
            Self::NameTooLong => write!(f, "entry name exceeded read limit"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

/// Transport-level failure carrying the raw bus status code.
///
/// Codes follow the Arduino `Wire.endTransmission()` numbering the bridge
/// firmware documents, so logs line up with the peripheral side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError {
    code: u8,
}

/// Classification of a [`BusError`] code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusErrorKind {
    /// Transmit buffer overflow.
    DataTooLong,
    /// The peripheral did not acknowledge its address.
    AddressNack,
    /// The peripheral did not acknowledge a data byte.
    DataNack,
    /// Arbitration loss, bus fault, or anything unclassified.
    Other,
    /// The transaction timed out.
    Timeout,
}

impl BusError {
    pub const DATA_TOO_LONG: Self = Self { code: 1 };
    pub const ADDRESS_NACK: Self = Self { code: 2 };
    pub const DATA_NACK: Self = Self { code: 3 };
    pub const OTHER: Self = Self { code: 4 };
    pub const TIMEOUT: Self = Self { code: 5 };

    /// Wrap a raw status code. `0` is success and is not an error; it is
    /// mapped to [`BusErrorKind::Other`] if it ever reaches here.
    pub const fn from_code(code: u8) -> Self {
        Self { code }
    }

    pub const fn code(self) -> u8 {
        self.code
    }

    pub const fn kind(self) -> BusErrorKind {
        match self.code {
            1 => BusErrorKind::DataTooLong,
            2 => BusErrorKind::AddressNack,
            3 => BusErrorKind::DataNack,
            5 => BusErrorKind::Timeout,
            _ => BusErrorKind::Other,
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind() {
            BusErrorKind::DataTooLong => "data too long",
            BusErrorKind::AddressNack => "NACK on address",
            BusErrorKind::DataNack => "NACK on data",
            BusErrorKind::Other => "other error",
            BusErrorKind::Timeout => "timeout",
        };
        write!(f, "I2C error {} ({what})", self.code)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
