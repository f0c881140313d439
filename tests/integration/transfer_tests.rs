//! Chunked write/read against the simulated bridge.

use std::sync::Arc;

use sdlink::adapters::sim_card::{SimCard, Transaction};
use sdlink::adapters::time::NoDelay;
use sdlink::app::ports::ChunkSink;
use sdlink::config::BusConfig;
use sdlink::health::LinkHealth;
use sdlink::protocol::{Command, SdClient, WriteMode};
use sdlink::{BusError, Error};

fn client(card: SimCard) -> SdClient<SimCard, NoDelay> {
    SdClient::new(card, NoDelay::default(), BusConfig::default())
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

/// Reads back an empty file as an empty body.
fn read_back(c: &mut SdClient<SimCard, NoDelay>, path: &str) -> Vec<u8> {
    match c.read_all(path) {
        Ok(body) => body,
        Err(Error::NotFound) => Vec::new(),
        Err(e) => panic!("read {path}: {e}"),
    }
}

// ── Round trips ───────────────────────────────────────────────

#[test]
fn write_then_read_round_trips_at_chunk_boundaries() {
    for len in [0usize, 1, 31, 32, 70] {
        let mut c = client(SimCard::new());
        let msg = payload(len);
        c.write("/RT.BIN", WriteMode::Write, &msg).unwrap();
        assert_eq!(read_back(&mut c, "/RT.BIN"), msg, "length {len}");
    }
}

#[test]
fn seventy_byte_write_is_tagged_w_a_a() {
    let mut c = client(SimCard::new());
    c.write("/T.TXT", WriteMode::Write, &payload(70)).unwrap();

    let card = c.bus();
    assert_eq!(card.commands(), vec![b'F', b'W', b'A', b'A']);
    let w: Vec<usize> = card.writes_of(Command::Write).iter().map(|d| d.len()).collect();
    let a: Vec<usize> = card.writes_of(Command::Append).iter().map(|d| d.len()).collect();
    assert_eq!(w, vec![31]);
    assert_eq!(a, vec![31, 8]);
}

#[test]
fn every_chunk_releases_the_bus() {
    let mut c = client(SimCard::new());
    c.write("/T.TXT", WriteMode::Write, &payload(100)).unwrap();
    for t in &c.bus().log {
        if let Transaction::Write { release, .. } = t {
            assert!(release, "write transactions must end with a stop: {t:?}");
        }
    }
}

#[test]
fn append_extends_existing_file() {
    let mut card = SimCard::new();
    card.insert_file("/LOG.TXT", b"first,");
    let mut c = client(card);
    let more = payload(45);
    c.write("/LOG.TXT", WriteMode::Append, &more).unwrap();

    let mut expected = b"first,".to_vec();
    expected.extend_from_slice(&more);
    assert_eq!(c.read_all("/LOG.TXT").unwrap(), expected);
    assert!(c.bus().writes_of(Command::Write).is_empty());
}

#[test]
fn write_mode_overwrites() {
    let mut card = SimCard::new();
    card.insert_file("/A.TXT", &payload(90));
    let mut c = client(card);
    c.write("/A.TXT", WriteMode::Write, b"short").unwrap();
    assert_eq!(c.read_all("/A.TXT").unwrap(), b"short");
}

// ── Empty message ─────────────────────────────────────────────

#[test]
fn empty_write_sends_nothing_and_keeps_file() {
    let mut card = SimCard::new();
    card.insert_file("/KEEP.TXT", b"data");
    let mut c = client(card);
    c.write("/KEEP.TXT", WriteMode::Write, b"").unwrap();
    assert!(c.bus().log.is_empty());
    assert_eq!(c.bus().file("/KEEP.TXT"), Some(&b"data"[..]));
}

// ── Failures ──────────────────────────────────────────────────

#[test]
fn mid_write_failure_leaves_partial_file_and_free_bus() {
    let mut card = SimCard::new();
    // Ends: path, clock sync, W, then the first A fails.
    card.fail_end_after(3, BusError::DATA_NACK);
    let mut c = client(card);
    let msg = payload(70);

    let err = c.write("/P.BIN", WriteMode::Write, &msg).unwrap_err();
    assert_eq!(err, Error::Bus(BusError::DATA_NACK));

    let card = c.bus();
    assert_eq!(card.file("/P.BIN"), Some(&msg[..31]));
    assert!(!card.is_held());
    assert_eq!(card.clock_hz(), 100_000, "clock restored after abort");
    assert!(!c.health().is_busy());
}

#[test]
fn path_failure_aborts_before_command() {
    let mut card = SimCard::new();
    card.fail_next_end(BusError::ADDRESS_NACK);
    let mut c = client(card);
    assert!(c.write("/X.TXT", WriteMode::Write, b"abc").is_err());
    assert_eq!(c.bus().commands(), vec![b'F']);
    assert!(c.bus().file("/X.TXT").is_none());
}

#[test]
fn short_chunk_aborts_read_and_releases() {
    let mut card = SimCard::new();
    card.insert_file("/BIG.BIN", &payload(100));
    // Requests: size, chunk 0, chunk 1 (short).
    card.short_request_after(2, 5);
    let mut c = client(card);

    let err = c.read_all("/BIG.BIN").unwrap_err();
    assert_eq!(err, Error::ShortRead { expected: 32, received: 5 });
    assert!(!c.bus().is_held());
    assert_eq!(c.bus().clock_hz(), 100_000);
}

#[test]
fn short_size_reply_aborts_before_read_command() {
    let mut card = SimCard::new();
    card.insert_file("/F.TXT", b"hello");
    card.short_next_request(2);
    let mut c = client(card);
    assert_eq!(
        c.read_all("/F.TXT").unwrap_err(),
        Error::ShortRead { expected: 4, received: 2 }
    );
    assert!(!c.bus().commands().contains(&b'R'));
    assert!(!c.bus().is_held());
}

#[test]
fn missing_file_reads_as_not_found() {
    let mut c = client(SimCard::new());
    assert_eq!(c.read_all("/NOPE.TXT"), Err(Error::NotFound));
    assert!(!c.bus().commands().contains(&b'R'));
    assert_eq!(c.health().consecutive_errors(), 0);
}

// ── Clock and streaming ───────────────────────────────────────

#[test]
fn read_runs_at_transfer_clock_and_restores() {
    let mut card = SimCard::new();
    card.insert_file("/F.TXT", b"hello");
    let mut c = client(card);
    c.read_all("/F.TXT").unwrap();

    let clocks: Vec<u32> = c
        .bus()
        .log
        .iter()
        .filter_map(|t| match t {
            Transaction::Clock(hz) => Some(*hz),
            _ => None,
        })
        .collect();
    assert_eq!(clocks, vec![400_000, 100_000]);
}

#[derive(Default)]
struct Recorder {
    total: Option<u32>,
    chunks: Vec<usize>,
    body: Vec<u8>,
}

impl ChunkSink for Recorder {
    fn begin(&mut self, total_len: u32) {
        self.total = Some(total_len);
    }

    fn chunk(&mut self, data: &[u8]) {
        self.chunks.push(data.len());
        self.body.extend_from_slice(data);
    }
}

#[test]
fn read_streams_bounded_chunks() {
    let mut card = SimCard::new();
    card.insert_file("/S.BIN", &payload(70));
    let mut c = client(card);
    let mut sink = Recorder::default();

    assert_eq!(c.read_to("/S.BIN", &mut sink).unwrap(), 70);
    assert_eq!(sink.total, Some(70));
    assert_eq!(sink.chunks, vec![32, 32, 6]);
    assert_eq!(sink.body, payload(70));

    // Only the last data request releases the bus.
    let releases: Vec<bool> = c
        .bus()
        .log
        .iter()
        .filter_map(|t| match t {
            Transaction::Read { release, requested, .. } if *requested != 4 => Some(*release),
            _ => None,
        })
        .collect();
    assert_eq!(releases, vec![false, false, true]);
}

/// Tries to start another operation from inside the stream.
struct Reentrant {
    health: Arc<LinkHealth>,
    rejected: usize,
}

impl ChunkSink for Reentrant {
    fn begin(&mut self, _total_len: u32) {}

    fn chunk(&mut self, _data: &[u8]) {
        if matches!(self.health.try_acquire(), Err(Error::Busy)) {
            self.rejected += 1;
        }
    }
}

#[test]
fn bus_stays_claimed_across_chunk_callbacks() {
    let mut card = SimCard::new();
    card.insert_file("/S.BIN", &payload(64));
    let mut c = client(card);
    let mut sink = Reentrant {
        health: Arc::clone(c.health()),
        rejected: 0,
    };
    c.read_to("/S.BIN", &mut sink).unwrap();
    assert_eq!(sink.rejected, 2);
    assert!(!c.health().is_busy());
}
