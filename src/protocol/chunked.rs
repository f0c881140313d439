//! Chunked transfer planning for payloads larger than one bus transaction.
//!
//! Outbound, a payload is split into transactions of at most
//! `bus_buffer_len - 1` data bytes, each prefixed by a command byte.  Only
//! the first chunk carries the caller's command; every continuation is an
//! append, so a destructive write is applied once, at offset 0.
//!
//! ```text
//! Chunk 1: ['W' | 'A']  payload[0..31]
//! Chunk 2: ['A']        payload[31..62]
//! Chunk N: ['A']        payload[..]       (final, may be short)
//! ```
//!
//! Inbound, [`TransferState`] tracks a body of known length that is pulled
//! in bounded requests.

use super::command::{Command, WriteMode};

/// One outbound transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteChunk<'a> {
    pub command: Command,
    /// Offset of `data` within the whole payload.
    pub offset: usize,
    pub data: &'a [u8],
}

/// Iterator over the transactions of one outbound transfer.
#[derive(Debug, Clone)]
pub struct WriteChunks<'a> {
    first: Command,
    data: &'a [u8],
    chunk_len: usize,
    offset: usize,
}

/// Split `data` into chunk transactions.  An empty payload yields nothing.
pub fn chunk_payload(mode: WriteMode, data: &[u8], chunk_len: usize) -> WriteChunks<'_> {
    WriteChunks {
        first: mode.command(),
        data,
        chunk_len: chunk_len.max(1),
        offset: 0,
    }
}

impl<'a> Iterator for WriteChunks<'a> {
    type Item = WriteChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        let end = (self.offset + self.chunk_len).min(self.data.len());
        let command = if self.offset == 0 {
            self.first
        } else {
            Command::Append
        };
        let chunk = WriteChunk {
            command,
            offset: self.offset,
            data: &self.data[self.offset..end],
        };
        self.offset = end;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.data.len().saturating_sub(self.offset);
        let n = remaining.div_ceil(self.chunk_len);
        (n, Some(n))
    }
}

impl ExactSizeIterator for WriteChunks<'_> {}

/// Progress of one inbound transfer.  Lives only for the duration of the
/// read call that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    pub total_len: u32,
    pub offset: u32,
    pub chunk_size: usize,
}

impl TransferState {
    pub fn new(total_len: u32, chunk_size: usize) -> Self {
        Self {
            total_len,
            offset: 0,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.total_len - self.offset
    }

    pub fn is_complete(&self) -> bool {
        self.offset >= self.total_len
    }

    /// Bytes to ask for next: `min(remaining, chunk_size)`.
    pub fn next_request_len(&self) -> usize {
        (self.remaining() as usize).min(self.chunk_size)
    }

    /// Whether the next request drains the body.
    pub fn next_is_last(&self) -> bool {
        self.remaining() as usize <= self.chunk_size
    }

    /// Account for `n` received bytes.
    pub fn advance(&mut self, n: usize) {
        self.offset = self.offset.saturating_add(n as u32).min(self.total_len);
    }
}

// ── Tests ────────────────────────────────────────────────────
