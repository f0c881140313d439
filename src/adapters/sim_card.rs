//! Simulated SD-card bridge.
//!
//! In-memory stand-in for the bridge firmware, used by host tests and the
//! host build of the demo.  It implements [`BusTransport`] directly and
//! answers every command the way the peripheral does, including its
//! quirks: a 32-byte receive buffer that truncates long paths, `0xFF` on
//! reads past the end of a reply, and a directory listing that reports a
//! size field for directories too.
//!
//! Every transaction is appended to [`SimCard::log`] so tests can assert
//! on the exact chunk tagging and on bus release.  Faults are injected
//! per transaction with the `fail_*` / `short_*` methods.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::app::ports::BusTransport;
use crate::error::BusError;
use crate::protocol::codec::{STATUS_FAILED, STATUS_OK, VOLUME_REPLY_LEN};
use crate::protocol::command::Command;
use crate::protocol::listing::{END_OF_LISTING, ENTRY_DIR, ENTRY_FILE};

/// Default bridge address.
pub const SIM_ADDRESS: u8 = 0x6E;

/// One observed bus action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// A completed write transaction.  `bytes[0]` is the command byte.
    Write { bytes: Vec<u8>, release: bool },
    /// A read request and how many bytes the bridge delivered.
    Read {
        requested: usize,
        received: usize,
        release: bool,
    },
    /// Explicit release of a held bus.
    Release,
    /// Bus clock change.
    Clock(u32),
}

#[derive(Debug, Clone, Copy)]
struct Fault<T> {
    skip: usize,
    value: T,
}

/// The simulated peripheral.
#[derive(Debug)]
pub struct SimCard {
    address: u8,
    buffer_len: usize,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    selected: String,
    tx: Vec<u8>,
    tx_address: u8,
    reply: VecDeque<u8>,
    held: bool,
    clock_hz: u32,
    card_type: u8,
    volume: [u8; VOLUME_REPLY_LEN],
    rtc: Option<[u8; 6]>,
    absent: bool,
    end_fault: Option<Fault<BusError>>,
    short_fault: Option<Fault<usize>>,
    /// Every bus action, in order.
    pub log: Vec<Transaction>,
}

impl Default for SimCard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCard {
    /// Empty FAT32 card (64 blocks per cluster, 1M clusters) at the
    /// default address.
    pub fn new() -> Self {
        let mut volume = [0u8; VOLUME_REPLY_LEN];
        volume[0] = STATUS_OK;
        volume[1] = 32;
        volume[2..6].copy_from_slice(&64u32.to_le_bytes());
        volume[6..10].copy_from_slice(&1_000_000u32.to_le_bytes());
        Self {
            address: SIM_ADDRESS,
            buffer_len: 32,
            files: BTreeMap::new(),
            dirs: BTreeSet::from([String::from("/")]),
            selected: String::new(),
            tx: Vec::new(),
            tx_address: 0,
            reply: VecDeque::new(),
            held: false,
            clock_hz: 0,
            card_type: 3,
            volume,
            rtc: None,
            absent: false,
            end_fault: None,
            short_fault: None,
            log: Vec::new(),
        }
    }

    // ── Card contents ─────────────────────────────────────────

    /// Place a file directly on the card, creating parent directories.
    pub fn insert_file(&mut self, path: &str, contents: &[u8]) {
        let path = normalize(path);
        let mut parent = parent_of(&path);
        while let Some(p) = parent {
            parent = parent_of(&p);
            self.dirs.insert(p);
        }
        self.files.insert(path, contents.to_vec());
    }

    pub fn insert_dir(&mut self, path: &str) {
        let path = normalize(path);
        let mut cur = Some(path);
        while let Some(p) = cur {
            cur = parent_of(&p);
            self.dirs.insert(p);
        }
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(&normalize(path)).map(Vec::as_slice)
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.contains(&normalize(path))
    }

    /// Path selected by the most recent `'F'` phase, after truncation.
    pub fn selected(&self) -> &str {
        &self.selected
    }

    // ── Card metadata ─────────────────────────────────────────

    pub fn set_card_type(&mut self, raw: u8) {
        self.card_type = raw;
    }

    /// Replace the raw `'V'` reply.
    pub fn set_volume_reply(&mut self, reply: [u8; VOLUME_REPLY_LEN]) {
        self.volume = reply;
    }

    /// Make `'V'` report an initialisation failure.
    pub fn fail_volume(&mut self) {
        self.volume = [0; VOLUME_REPLY_LEN];
        self.volume[0] = STATUS_FAILED;
    }

    /// Last `'C'` payload received.
    pub fn rtc(&self) -> Option<[u8; 6]> {
        self.rtc
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    // ── Bus observation ───────────────────────────────────────

    /// Whether a transaction left the bus held.
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Command bytes of every write transaction, in order.
    pub fn commands(&self) -> Vec<u8> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transaction::Write { bytes, .. } => bytes.first().copied(),
                _ => None,
            })
            .collect()
    }

    /// Write transactions whose command byte is `cmd`.
    pub fn writes_of(&self, cmd: Command) -> Vec<&[u8]> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transaction::Write { bytes, .. } if bytes.first() == Some(&cmd.byte()) => {
                    Some(&bytes[1..])
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    // ── Fault injection ───────────────────────────────────────

    /// Stop acknowledging: every write fails, every read returns nothing.
    pub fn set_absent(&mut self, absent: bool) {
        self.absent = absent;
    }

    /// Fail the next write transaction with `err`.
    pub fn fail_next_end(&mut self, err: BusError) {
        self.fail_end_after(0, err);
    }

    /// Let `skip` write transactions succeed, then fail one with `err`.
    pub fn fail_end_after(&mut self, skip: usize, err: BusError) {
        self.end_fault = Some(Fault { skip, value: err });
    }

    /// Deliver only `received` bytes on the next read request.
    pub fn short_next_request(&mut self, received: usize) {
        self.short_request_after(0, received);
    }

    /// Let `skip` read requests succeed, then truncate one to `received`.
    pub fn short_request_after(&mut self, skip: usize, received: usize) {
        self.short_fault = Some(Fault {
            skip,
            value: received,
        });
    }

    // ── Command handling ──────────────────────────────────────

    fn execute(&mut self, bytes: &[u8]) {
        let Some((&cmd, payload)) = bytes.split_first() else {
            // Empty transaction: presence probe.
            return;
        };
        self.reply.clear();
        match Command::from_byte(cmd) {
            Some(Command::SelectPath) => {
                self.selected = normalize(&String::from_utf8_lossy(payload));
            }
            Some(Command::Write) => {
                if self.parent_exists(&self.selected) && !self.dirs.contains(&self.selected) {
                    self.files.insert(self.selected.clone(), payload.to_vec());
                }
            }
            Some(Command::Append) => {
                if self.parent_exists(&self.selected) && !self.dirs.contains(&self.selected) {
                    self.files
                        .entry(self.selected.clone())
                        .or_default()
                        .extend_from_slice(payload);
                }
            }
            Some(Command::Size) => {
                let size = self.files.get(&self.selected).map_or(0, |f| f.len() as u32);
                self.reply.extend(size.to_be_bytes());
            }
            Some(Command::Read) => {
                if let Some(body) = self.files.get(&self.selected) {
                    self.reply.extend(body.iter().copied());
                }
            }
            Some(Command::FileExists) => {
                let found = self.files.contains_key(&self.selected);
                self.reply_flag(found);
            }
            Some(Command::DirExists) => {
                let found = self.dirs.contains(&self.selected);
                self.reply_flag(found);
            }
            Some(Command::RemoveFile) => {
                let removed = self.files.remove(&self.selected).is_some();
                self.reply_flag(removed);
            }
            Some(Command::MakeDir) => {
                let created = !self.dirs.contains(&self.selected)
                    && !self.files.contains_key(&self.selected)
                    && self.parent_exists(&self.selected);
                if created {
                    self.dirs.insert(self.selected.clone());
                }
                self.reply_flag(created);
            }
            Some(Command::RemoveDir) => {
                let removable = self.selected != "/"
                    && self.dirs.contains(&self.selected)
                    && self.children(&self.selected).next().is_none();
                if removable {
                    self.dirs.remove(&self.selected);
                }
                self.reply_flag(removable);
            }
            Some(Command::CardType) => self.reply.push_back(self.card_type),
            Some(Command::VolumeInfo) => self.reply.extend(self.volume),
            Some(Command::List) => self.load_listing(),
            Some(Command::SetClock) => {
                if let Ok(t) = <[u8; 6]>::try_from(payload) {
                    self.rtc = Some(t);
                }
            }
            None => {}
        }
    }

    fn reply_flag(&mut self, flag: bool) {
        self.reply.push_back(u8::from(flag));
    }

    fn load_listing(&mut self) {
        if self.dirs.contains(&self.selected) {
            let entries: Vec<(u8, String, u32)> = self
                .children(&self.selected)
                .map(|(kind, path)| {
                    let size = self.files.get(path).map_or(0, |f| f.len() as u32);
                    (kind, leaf(path).to_owned(), size)
                })
                .collect();
            for (kind, name, size) in entries {
                self.reply.push_back(kind);
                self.reply.extend(name.bytes());
                self.reply.push_back(0);
                self.reply.extend(size.to_le_bytes());
            }
        }
        self.reply.push_back(END_OF_LISTING);
    }

    /// Direct children of `dir`: directories first, then files.
    fn children<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = (u8, &'a String)> + 'a {
        let dirs = self
            .dirs
            .iter()
            .filter(move |p| parent_of(p).as_deref() == Some(dir))
            .map(|p| (ENTRY_DIR, p));
        let files = self
            .files
            .keys()
            .filter(move |p| parent_of(p).as_deref() == Some(dir))
            .map(|p| (ENTRY_FILE, p));
        dirs.chain(files)
    }

    fn parent_exists(&self, path: &str) -> bool {
        parent_of(path).is_some_and(|p| self.dirs.contains(&p))
    }

    fn take_fault<T: Copy>(slot: &mut Option<Fault<T>>) -> Option<T> {
        let fault = slot.as_mut()?;
        if fault.skip > 0 {
            fault.skip -= 1;
            return None;
        }
        slot.take().map(|f| f.value)
    }
}

impl BusTransport for SimCard {
    fn begin(&mut self, address: u8) {
        self.tx_address = address;
        self.tx.clear();
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.buffer_len - self.tx.len());
        self.tx.extend_from_slice(&data[..n]);
        n
    }

    fn end(&mut self, release: bool) -> Result<(), BusError> {
        let bytes = core::mem::take(&mut self.tx);
        self.log.push(Transaction::Write {
            bytes: bytes.clone(),
            release,
        });
        if self.absent || self.tx_address != self.address {
            self.held = false;
            return Err(BusError::ADDRESS_NACK);
        }
        if let Some(err) = Self::take_fault(&mut self.end_fault) {
            self.held = false;
            return Err(err);
        }
        self.held = !release;
        self.execute(&bytes);
        Ok(())
    }

    fn request(&mut self, address: u8, buf: &mut [u8], release: bool) -> usize {
        let mut received = if self.absent || address != self.address {
            0
        } else {
            buf.len()
        };
        if let Some(n) = Self::take_fault(&mut self.short_fault) {
            received = received.min(n);
        }
        for b in buf.iter_mut().take(received) {
            *b = self.reply.pop_front().unwrap_or(0xFF);
        }
        self.log.push(Transaction::Read {
            requested: buf.len(),
            received,
            release,
        });
        self.held = !release;
        received
    }

    fn release(&mut self) {
        if self.held {
            self.held = false;
            self.log.push(Transaction::Release);
        }
    }

    fn set_clock(&mut self, hz: u32) {
        self.clock_hz = hz;
        self.log.push(Transaction::Clock(hz));
    }
}

// ── Path helpers ──────────────────────────────────────────────

/// Absolute path without a trailing slash (except the root).
fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return String::from("/");
    }
    if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn parent_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(String::from("/")),
        Some(i) => Some(path[..i].to_owned()),
        None => Some(String::from("/")),
    }
}

fn leaf(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
