//! Directory listing stream decoder.
//!
//! Wire format of the `L` reply, repeated until the end marker:
//! ```text
//! ┌──────────┬──────────────────────┬──────────────┐
//! │ type (1) │ name … NUL           │ size (LE u32)│
//! │ F | D    │                      │ always sent  │
//! └──────────┴──────────────────────┴──────────────┘
//! ┌──────┐
//! │ 0xFF │  end of listing
//! └──────┘
//! ```
//!
//! The stream has no length prefix.  [`EntryDecoder`] is a byte-driven
//! state machine: the client asks it how many bytes to request next
//! ([`EntryDecoder::want`]), pulls them off the bus, and pushes them in one
//! at a time.  Directory entries still carry a size field; it is consumed
//! and discarded so the stream stays aligned.

use serde::{Deserialize, Serialize};

use crate::config::BusConfig;
use crate::error::Error;

use super::codec::decode_entry_size;

/// Type byte of a file entry.
pub const ENTRY_FILE: u8 = b'F';
/// Type byte of a directory entry.
pub const ENTRY_DIR: u8 = b'D';
/// Type byte that terminates the stream.
pub const END_OF_LISTING: u8 = 0xFF;
/// Length of the trailing size field.
pub const ENTRY_SIZE_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// One listing record.  `size` is meaningful only for files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub kind: EntryKind,
    pub name: String,
    pub size: u32,
}

/// Result of one enumeration, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// `(name, size)` pairs.
    pub files: Vec<(String, u32)>,
    pub directories: Vec<String>,
    /// The entry cap was reached before the end marker.
    pub truncated: bool,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.directories.clear();
        self.truncated = false;
    }

    pub fn push(&mut self, entry: DirectoryEntry) {
        match entry.kind {
            EntryKind::File => self.files.push((entry.name, entry.size)),
            EntryKind::Directory => self.directories.push(entry.name),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounds for one enumeration.  None of these exist on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingLimits {
    /// Stop after this many entries.
    pub max_entries: Option<usize>,
    /// Keep at most this many name characters.
    pub max_name_len: Option<usize>,
    /// Abort if a name runs past this many bytes without a NUL.
    pub name_read_limit: Option<usize>,
}

impl ListingLimits {
    /// Raw protocol: read whatever the peer sends until the end marker.
    pub const fn unbounded() -> Self {
        Self {
            max_entries: None,
            max_name_len: None,
            name_read_limit: None,
        }
    }

    /// Web path: bounded against a stuck or runaway peer.
    pub fn bounded(config: &BusConfig) -> Self {
        Self {
            max_entries: Some(config.list_max_entries),
            max_name_len: Some(config.list_max_name_len),
            name_read_limit: Some(config.list_name_read_limit),
        }
    }
}

impl Default for ListingLimits {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// What a pushed byte completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// More bytes are needed.
    Pending,
    /// An entry is complete.
    Entry(DirectoryEntry),
    /// The end marker arrived.
    End,
}

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for a type byte or the end marker.
    ReadingType,
    /// Collecting name bytes until NUL.
    ReadingName,
    /// Collecting the 4-byte size field.
    ReadingSize { collected: usize },
    /// End marker seen, entry cap reached, or a violation occurred.
    Finished,
}

/// Streaming listing decoder.
#[derive(Debug)]
pub struct EntryDecoder {
    state: DecoderState,
    limits: ListingLimits,
    kind: EntryKind,
    name: Vec<u8>,
    name_reads: usize,
    size_buf: [u8; ENTRY_SIZE_LEN],
    entries: usize,
    capped: bool,
}

impl EntryDecoder {
    pub fn new(limits: ListingLimits) -> Self {
        Self {
            state: DecoderState::ReadingType,
            limits,
            kind: EntryKind::File,
            name: Vec::new(),
            name_reads: 0,
            size_buf: [0; ENTRY_SIZE_LEN],
            entries: 0,
            capped: false,
        }
    }

    /// Bytes to request from the peer next; `0` once decoding is finished.
    pub fn want(&self) -> usize {
        match self.state {
            DecoderState::ReadingType | DecoderState::ReadingName => 1,
            DecoderState::ReadingSize { collected } => ENTRY_SIZE_LEN - collected,
            DecoderState::Finished => 0,
        }
    }

    /// The entry cap stopped decoding before the end marker.
    pub fn is_capped(&self) -> bool {
        self.capped
    }

    /// Entries decoded so far.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Push one byte from the stream.
    ///
    /// Returns an error on an invalid type byte or a runaway name; the
    /// decoder is finished afterwards.
    pub fn push(&mut self, byte: u8) -> Result<Decoded, Error> {
        match self.state {
            DecoderState::ReadingType => match byte {
                END_OF_LISTING => {
                    self.state = DecoderState::Finished;
                    Ok(Decoded::End)
                }
                ENTRY_FILE | ENTRY_DIR => {
                    self.kind = if byte == ENTRY_FILE {
                        EntryKind::File
                    } else {
                        EntryKind::Directory
                    };
                    self.name.clear();
                    self.name_reads = 0;
                    self.state = DecoderState::ReadingName;
                    Ok(Decoded::Pending)
                }
                other => {
                    self.state = DecoderState::Finished;
                    Err(Error::ProtocolViolation(other))
                }
            },

            DecoderState::ReadingName => {
                if byte == 0 {
                    self.state = DecoderState::ReadingSize { collected: 0 };
                    return Ok(Decoded::Pending);
                }
                self.name_reads += 1;
                if self.limits.name_read_limit.is_some_and(|limit| self.name_reads > limit) {
                    self.state = DecoderState::Finished;
                    return Err(Error::NameTooLong);
                }
                if self.limits.max_name_len.is_none_or(|max| self.name.len() < max) {
                    self.name.push(byte);
                }
                Ok(Decoded::Pending)
            }

            DecoderState::ReadingSize { collected } => {
                self.size_buf[collected] = byte;
                let collected = collected + 1;
                if collected < ENTRY_SIZE_LEN {
                    self.state = DecoderState::ReadingSize { collected };
                    return Ok(Decoded::Pending);
                }
                Ok(Decoded::Entry(self.finish_entry()))
            }

            DecoderState::Finished => Ok(Decoded::Pending),
        }
    }

    fn finish_entry(&mut self) -> DirectoryEntry {
        let size = match self.kind {
            EntryKind::File => decode_entry_size(self.size_buf),
            // Sent by the peer, meaningless for directories.
            EntryKind::Directory => 0,
        };
        let entry = DirectoryEntry {
            kind: self.kind,
            name: String::from_utf8_lossy(&self.name).into_owned(),
            size,
        };
        self.entries += 1;
        self.state = if self.limits.max_entries.is_some_and(|max| self.entries >= max) {
            self.capped = true;
            DecoderState::Finished
        } else {
            DecoderState::ReadingType
        };
        entry
    }
}

/// Decode a fully buffered `L` reply into `out`.
///
/// `out` is cleared first and keeps every entry decoded before an error.
/// Returns `Ok(true)` if the end marker (or entry cap) was reached and
/// `Ok(false)` if the bytes ran out first.
pub fn decode_listing(bytes: &[u8], limits: ListingLimits, out: &mut Listing) -> Result<bool, Error> {
    out.clear();
    let mut decoder = EntryDecoder::new(limits);
    for &b in bytes {
        if decoder.want() == 0 {
            break;
        }
        match decoder.push(b)? {
            Decoded::Entry(entry) => out.push(entry),
            Decoded::End | Decoded::Pending => {}
        }
    }
    out.truncated = decoder.is_capped();
    Ok(decoder.want() == 0)
}
