//! Bus and protocol configuration
//!
//! All tunable parameters for talking to the SD-card bridge.
//! Defaults match the bridge firmware's wire buffer and timing budget.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a configuration was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The JSON document did not parse.
    Parse,
    /// A field is out of range.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => f.write_str("config parse error"),
            Self::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Bridge client configuration
///
/// Missing fields in a JSON override fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    // --- Addressing ---
    /// 7-bit I2C address of the bridge
    pub address: u8,

    // --- Clock ---
    /// Bus clock for metadata operations (Hz)
    pub bus_clock_hz: u32,
    /// Bus clock during bulk file transfer (Hz)
    pub transfer_clock_hz: u32,

    // --- Buffers ---
    /// Maximum bytes in one bus transaction, command byte included
    pub bus_buffer_len: usize,

    // --- Timing ---
    /// Pause after the path phase and after each command phase (ms)
    pub phase_delay_ms: u32,
    /// Pause between consecutive transfer chunks (ms)
    pub chunk_gap_ms: u32,

    // --- Link health ---
    /// Consecutive failures tolerated before the bridge is marked absent
    pub max_consecutive_errors: u8,

    // --- Bounded listing (web path) ---
    /// Entry cap for a single enumeration
    pub list_max_entries: usize,
    /// Characters kept from each entry name
    pub list_max_name_len: usize,
    /// Name bytes read before the peer is considered stuck
    pub list_name_read_limit: usize,
}

impl BusConfig {
    /// Data bytes per outbound chunk: one byte of every transaction is the
    /// command byte.
    pub fn write_chunk_len(&self) -> usize {
        self.bus_buffer_len.saturating_sub(1)
    }

    /// Bytes requested per inbound chunk.
    pub fn read_chunk_len(&self) -> usize {
        self.bus_buffer_len
    }

    /// Reject configurations the protocol cannot run with.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.address > 0x7F {
            return Err("address must be a 7-bit value");
        }
        if self.bus_buffer_len < 2 {
            return Err("bus_buffer_len must leave room for a command byte and data");
        }
        if self.bus_clock_hz == 0 || self.transfer_clock_hz == 0 {
            return Err("bus clocks must be non-zero");
        }
        if self.transfer_clock_hz < self.bus_clock_hz {
            return Err("transfer_clock_hz must not be below bus_clock_hz");
        }
        if self.list_max_entries == 0 {
            return Err("list_max_entries must be non-zero");
        }
        Ok(())
    }

    /// Parse a JSON override and validate the result.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Parse)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            // Addressing
            address: 0x6E,

            // Clock
            bus_clock_hz: 100_000,      // standard mode
            transfer_clock_hz: 400_000, // fast mode for file bodies

            // Buffers
            bus_buffer_len: 32,

            // Timing
            phase_delay_ms: 5,
            chunk_gap_ms: 1,

            // Link health
            max_consecutive_errors: 5,

            // Bounded listing
            list_max_entries: 128,
            list_max_name_len: 31,
            list_name_read_limit: 64,
        }
    }
}
