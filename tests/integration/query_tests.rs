//! Fixed-reply queries: wire sequence, decoding, and error containment.

use sdlink::adapters::sim_card::SimCard;
use sdlink::adapters::time::NoDelay;
use sdlink::config::BusConfig;
use sdlink::protocol::{CardType, ClockTime, FatType, SdClient};
use sdlink::{BusError, Error};

use crate::mock_bus::{Call, Instant, MockBus, client};

fn sim(card: SimCard) -> SdClient<SimCard, NoDelay> {
    SdClient::new(card, NoDelay::default(), BusConfig::default())
}

// ── Wire sequence ─────────────────────────────────────────────

#[test]
fn exists_uses_path_then_held_command_then_one_byte() {
    let mut c = client(MockBus::with_script(&[1]));
    assert_eq!(c.exists("/DIR", true), Ok(true));
    assert_eq!(
        c.bus().calls,
        vec![
            Call::Begin(0x6E),
            Call::Write(vec![b'F']),
            Call::Write(b"/DIR".to_vec()),
            Call::End(true),
            Call::Begin(0x6E),
            Call::Write(vec![b'K']),
            Call::End(false),
            Call::Request { len: 1, release: true },
        ]
    );
    assert!(!c.bus().is_held());
}

#[test]
fn file_exists_uses_e() {
    let mut c = client(MockBus::with_script(&[0]));
    assert_eq!(c.exists("/A.TXT", false), Ok(false));
    assert!(c.bus().calls.contains(&Call::Write(vec![b'E'])));
}

#[test]
fn only_one_means_yes() {
    let mut c = client(MockBus::with_script(&[2]));
    assert_eq!(c.remove("/A.TXT"), Ok(false));
}

#[test]
fn size_is_most_significant_byte_first() {
    let mut c = client(MockBus::with_script(&[0x00, 0x00, 0x01, 0x02]));
    assert_eq!(c.size("/A.TXT"), Ok(258));
}

// ── Error containment ─────────────────────────────────────────

#[test]
fn path_failure_skips_command_phase() {
    let mut c = client(MockBus::new().fail_end(0, BusError::ADDRESS_NACK));
    assert_eq!(c.rmdir("/D"), Err(Error::Bus(BusError::ADDRESS_NACK)));
    assert_eq!(c.bus().end_count(), 1);
    assert_eq!(c.bus().request_count(), 0);
    assert!(!c.bus().is_held());
}

#[test]
fn command_failure_releases_bus() {
    let mut c = client(MockBus::new().fail_end(1, BusError::DATA_NACK));
    assert_eq!(c.mkdir("/D"), Err(Error::Bus(BusError::DATA_NACK)));
    assert_eq!(c.bus().request_count(), 0);
    assert!(!c.bus().is_held());
}

type Mock = SdClient<MockBus, Instant>;

fn exists_op(c: &mut Mock) -> Result<(), Error> {
    c.exists("/X", false).map(drop)
}

fn size_op(c: &mut Mock) -> Result<(), Error> {
    c.size("/X").map(drop)
}

fn rmdir_op(c: &mut Mock) -> Result<(), Error> {
    c.rmdir("/X").map(drop)
}

fn card_type_op(c: &mut Mock) -> Result<(), Error> {
    c.card_type().map(drop)
}

fn volume_op(c: &mut Mock) -> Result<(), Error> {
    c.volume_info().map(drop)
}

#[test]
fn short_reply_in_every_query_is_typed_and_released() {
    let ops: [(&str, fn(&mut Mock) -> Result<(), Error>, usize); 5] = [
        ("exists", exists_op, 1),
        ("size", size_op, 4),
        ("rmdir", rmdir_op, 1),
        ("card_type", card_type_op, 1),
        ("volume_info", volume_op, 10),
    ];
    for (name, op, want) in ops {
        let mut c = client(MockBus::new().short_request(0, 0));
        assert_eq!(
            op(&mut c),
            Err(Error::ShortRead { expected: want, received: 0 }),
            "{name}"
        );
        assert!(!c.bus().is_held(), "{name} left the bus held");
        assert_eq!(c.bus().calls.last(), Some(&Call::Release), "{name}");
    }
}

// ── Boolean semantics against the emulator ────────────────────

#[test]
fn exists_is_idempotent() {
    let mut card = SimCard::new();
    card.insert_file("/A.TXT", b"1");
    let mut c = sim(card);
    for path in ["/A.TXT", "/MISSING.TXT"] {
        let first = c.exists(path, false);
        let second = c.exists(path, false);
        assert_eq!(first, second, "{path}");
    }
}

#[test]
fn mkdir_twice_never_errors() {
    let mut c = sim(SimCard::new());
    assert_eq!(c.mkdir("/NEW"), Ok(true));
    assert_eq!(c.mkdir("/NEW"), Ok(false));
    assert!(c.bus().has_dir("/NEW"));
}

#[test]
fn rmdir_reports_refusal() {
    let mut card = SimCard::new();
    card.insert_file("/FULL/F.TXT", b"x");
    let mut c = sim(card);
    assert_eq!(c.rmdir("/FULL"), Ok(false));
    assert_eq!(c.rmdir("/GONE"), Ok(false));
    assert_eq!(c.remove("/FULL/F.TXT"), Ok(true));
    assert_eq!(c.rmdir("/FULL"), Ok(true));
}

// ── Metadata ──────────────────────────────────────────────────

#[test]
fn card_type_mapping() {
    let mut card = SimCard::new();
    card.set_card_type(2);
    let mut c = sim(card);
    assert_eq!(c.card_type(), Ok(CardType::SdV2));

    c.bus_mut().set_card_type(9);
    assert_eq!(c.card_type(), Err(Error::InvalidCardType(9)));
    // A bad value is not a link failure.
    assert_eq!(c.health().consecutive_errors(), 0);
}

#[test]
fn volume_info_and_capacity() {
    let mut c = sim(SimCard::new());
    let v = c.volume_info().unwrap();
    assert_eq!(v.fat_type, FatType::Fat32);
    assert_eq!(v.capacity_bytes(), 1_000_000 * 64 * 512);

    c.bus_mut().fail_volume();
    assert_eq!(c.volume_info(), Err(Error::PeerFailure));

    c.bus_mut().set_volume_reply([0x42, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(c.volume_info(), Err(Error::UnexpectedStatus(0x42)));
}

#[test]
fn set_clock_sends_six_bytes() {
    let mut c = sim(SimCard::new());
    let t = ClockTime {
        year: 2031,
        month: 12,
        day: 31,
        hour: 23,
        minute: 59,
        second: 58,
    };
    c.set_clock(&t).unwrap();
    assert_eq!(c.bus().rtc(), Some([31, 12, 31, 23, 59, 58]));
}

#[test]
fn long_path_is_truncated_by_bridge_buffer() {
    let mut c = sim(SimCard::new());
    let long = format!("/{}", "D".repeat(60));
    let _ = c.exists(&long, true);
    assert_eq!(c.bus().selected().len(), 31);
}
