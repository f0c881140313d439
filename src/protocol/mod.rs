//! SD-card bridge protocol.
//!
//! Byte-oriented request/response protocol spoken to the bridge at a fixed
//! 7-bit bus address.  Each bus transaction carries at most
//! `bus_buffer_len` bytes, so everything longer is chunked.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Protocol Stack                         │
//! │                                                            │
//! │  ┌───────────┐   ┌───────────┐   ┌──────────────────────┐  │
//! │  │  client   │──▶│  chunked  │──▶│ BusTransport (port)  │  │
//! │  │ (phases)  │   │ (W/A, R)  │   │  I2C / simulated     │  │
//! │  └───────────┘   └───────────┘   └──────────────────────┘  │
//! │       │                                                    │
//! │       ├──▶ codec    fixed-length replies (S, V, C)         │
//! │       └──▶ listing  'L' entry stream decoder               │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod chunked;
pub mod client;
pub mod codec;
pub mod command;
pub mod listing;

pub use client::SdClient;
pub use command::{CardType, ClockTime, Command, FatType, VolumeInfo, WriteMode};
pub use listing::{DirectoryEntry, EntryKind, Listing, ListingLimits};
