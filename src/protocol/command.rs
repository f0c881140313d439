//! Command byte catalogue and the small typed values carried by replies.
//!
//! ```text
//! Byte  Phase            Out                    In
//! ────  ───────────────  ─────────────────────  ───────────────────────────
//!  F    path select      path bytes             -
//!  W    write (first)    ≤31 data bytes         -
//!  A    append / cont.   ≤31 data bytes         -
//!  S    size             -                      4 bytes, MSB first
//!  R    read             -                      data stream
//!  E    file exists      -                      1 byte
//!  K    dir exists       -                      1 byte
//!  X    remove file      -                      1 byte
//!  M    make dir         -                      1 byte
//!  D    remove dir       -                      1 byte
//!  Q    card type        -                      1 byte
//!  V    volume info      -                      10 bytes
//!  L    list dir         -                      entry stream, 0xFF end
//!  C    set clock        yy mo d h mi s         -
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Bytes per card block; not transmitted, assumed by the capacity math.
pub const BLOCK_SIZE: u64 = 512;

/// Single-letter command understood by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    SelectPath = b'F',
    Write = b'W',
    Append = b'A',
    Size = b'S',
    Read = b'R',
    FileExists = b'E',
    DirExists = b'K',
    RemoveFile = b'X',
    MakeDir = b'M',
    RemoveDir = b'D',
    CardType = b'Q',
    VolumeInfo = b'V',
    List = b'L',
    SetClock = b'C',
}

impl Command {
    pub const fn byte(self) -> u8 {
        self as u8
    }

    pub const fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            b'F' => Self::SelectPath,
            b'W' => Self::Write,
            b'A' => Self::Append,
            b'S' => Self::Size,
            b'R' => Self::Read,
            b'E' => Self::FileExists,
            b'K' => Self::DirExists,
            b'X' => Self::RemoveFile,
            b'M' => Self::MakeDir,
            b'D' => Self::RemoveDir,
            b'Q' => Self::CardType,
            b'V' => Self::VolumeInfo,
            b'L' => Self::List,
            b'C' => Self::SetClock,
            _ => return None,
        })
    }
}

/// How the first chunk of an outbound transfer treats the existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// Create or overwrite.
    Write,
    /// Append to the end, creating the file if needed.
    Append,
}

impl WriteMode {
    pub const fn command(self) -> Command {
        match self {
            Self::Write => Command::Write,
            Self::Append => Command::Append,
        }
    }
}

/// Card family reported by the `Q` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardType {
    Unknown,
    SdV1,
    SdV2,
    SdhcSdxc,
}

impl CardType {
    pub fn from_byte(b: u8) -> Result<Self, Error> {
        match b {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::SdV1),
            2 => Ok(Self::SdV2),
            3 => Ok(Self::SdhcSdxc),
            other => Err(Error::InvalidCardType(other)),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown/Error",
            Self::SdV1 => "SDv1",
            Self::SdV2 => "SDv2",
            Self::SdhcSdxc => "SDHC/SDXC",
        }
    }
}

/// FAT variant of the mounted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FatType {
    Fat12,
    Fat16,
    Fat32,
    /// exFAT or an unrecognised code; carries the raw byte.
    Other(u8),
}

impl FatType {
    pub const fn from_byte(b: u8) -> Self {
        match b {
            12 => Self::Fat12,
            16 => Self::Fat16,
            32 => Self::Fat32,
            other => Self::Other(other),
        }
    }
}

/// Decoded `V` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub fat_type: FatType,
    pub blocks_per_cluster: u32,
    pub cluster_count: u32,
}

impl VolumeInfo {
    /// Volume size in bytes, `clusters × blocks_per_cluster × 512`.
    pub fn capacity_bytes(&self) -> u64 {
        u64::from(self.cluster_count)
            .saturating_mul(u64::from(self.blocks_per_cluster))
            .saturating_mul(BLOCK_SIZE)
    }
}

/// Wall-clock time pushed to the bridge with the `C` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}
