//! GPIO assignments for the bridge connection.
//!
//! Single source of truth for the ESP binary; nothing else hard-codes pin
//! numbers.

// ---------------------------------------------------------------------------
// I2C bus to the SD-card bridge
// ---------------------------------------------------------------------------

/// Serial data line (external 4.7 kΩ pull-up).
pub const I2C_SDA_GPIO: i32 = 8;
/// Serial clock line (external 4.7 kΩ pull-up).
pub const I2C_SCL_GPIO: i32 = 9;
