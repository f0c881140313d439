//! Fixed-length reply codecs.
//!
//! Byte order is not uniform across the bridge's replies and must be kept
//! exactly as the peripheral sends it:
//!
//! ```text
//! S reply      ┌────┬────┬────┬────┐   size, MSB first
//!              │ b3 │ b2 │ b1 │ b0 │
//!              └────┴────┴────┴────┘
//! V reply      ┌────────┬─────┬──────────────┬──────────────┐
//!              │ status │ fat │ blocks (LE4) │ clusters(LE4)│
//!              └────────┴─────┴──────────────┴──────────────┘
//! L entry size ┌────┬────┬────┬────┐   size, LSB first
//!              │ b0 │ b1 │ b2 │ b3 │
//!              └────┴────┴────┴────┘
//! ```

use crate::error::Error;

use super::command::{ClockTime, FatType, VolumeInfo};

/// Length of the `S` reply.
pub const SIZE_REPLY_LEN: usize = 4;

/// Length of the `V` reply.
pub const VOLUME_REPLY_LEN: usize = 10;

/// Length of the `C` payload.
pub const CLOCK_PAYLOAD_LEN: usize = 6;

/// `V` status: volume mounted.
pub const STATUS_OK: u8 = 0x01;

/// `V` status: the bridge failed to initialise the volume.
pub const STATUS_FAILED: u8 = 0xFF;

/// Decode an `S` reply (most significant byte first).
pub fn decode_size(reply: [u8; SIZE_REPLY_LEN]) -> u32 {
    reply.iter().fold(0u32, |size, &b| (size << 8) | u32::from(b))
}

/// Decode the size field of a listing entry (least significant byte first).
pub fn decode_entry_size(field: [u8; 4]) -> u32 {
    u32::from_le_bytes(field)
}

/// Decode a one-byte boolean reply.  Only `1` means yes.
pub fn decode_flag(b: u8) -> bool {
    b == 1
}

/// Decode a full `V` reply.
///
/// All ten bytes must already have been received; the caller treats a
/// shorter reply as a short read before getting here.
pub fn decode_volume_info(reply: &[u8; VOLUME_REPLY_LEN]) -> Result<VolumeInfo, Error> {
    match reply[0] {
        STATUS_OK => {}
        STATUS_FAILED => return Err(Error::PeerFailure),
        other => return Err(Error::UnexpectedStatus(other)),
    }

    let mut blocks = [0u8; 4];
    blocks.copy_from_slice(&reply[2..6]);
    let mut clusters = [0u8; 4];
    clusters.copy_from_slice(&reply[6..10]);

    Ok(VolumeInfo {
        fat_type: FatType::from_byte(reply[1]),
        blocks_per_cluster: u32::from_le_bytes(blocks),
        cluster_count: u32::from_le_bytes(clusters),
    })
}

/// Encode the `C` payload.  Only the last two digits of the year go out.
pub fn encode_clock(t: &ClockTime) -> [u8; CLOCK_PAYLOAD_LEN] {
    [
        (t.year % 100) as u8,
        t.month,
        t.day,
        t.hour,
        t.minute,
        t.second,
    ]
}
