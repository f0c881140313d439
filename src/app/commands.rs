//! Inbound requests to the storage service.
//!
//! These represent actions requested by the outside world (web handler,
//! serial console, demo driver) that the
//! [`StorageService`](super::service::StorageService) interprets and
//! answers.

use serde::{Deserialize, Serialize};

use crate::protocol::command::{CardType, ClockTime, VolumeInfo, WriteMode};
use crate::protocol::listing::Listing;

/// Requests that external adapters can send into the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageRequest {
    Exists { path: String, directory: bool },
    Size { path: String },
    Remove { path: String },
    Mkdir { path: String },
    Rmdir { path: String },
    /// Bounded enumeration, as served to the web layer.
    List { path: String },
    Read { path: String },
    Write {
        path: String,
        mode: WriteMode,
        data: Vec<u8>,
    },
    CardType,
    VolumeInfo,
    SetClock(ClockTime),
    /// Explicit presence check.
    Probe,
}

/// Successful answers to a [`StorageRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageResponse {
    /// Boolean-collapsed result (exists, remove, mkdir, rmdir).
    Flag(bool),
    Size(u32),
    Listing(Listing),
    Body(Vec<u8>),
    CardType(CardType),
    Volume(VolumeInfo),
    /// Fire-and-forget operation completed.
    Done,
}
