//! Directory enumeration over a scripted `'L'` stream.

use sdlink::Error;
use sdlink::config::BusConfig;
use sdlink::protocol::listing::{END_OF_LISTING, ENTRY_DIR, ENTRY_FILE};
use sdlink::protocol::{Listing, ListingLimits};

use crate::mock_bus::{Call, MockBus, client, entry};

fn stream(entries: &[Vec<u8>], tail: &[u8]) -> Vec<u8> {
    let mut v: Vec<u8> = entries.concat();
    v.extend_from_slice(tail);
    v
}

#[test]
fn two_files_one_dir_then_end_marker() {
    let script = stream(
        &[
            entry(ENTRY_FILE, "A.TXT", 10),
            entry(ENTRY_DIR, "LOGS", 0xDEAD_BEEF),
            entry(ENTRY_FILE, "B.BIN", 70_000),
        ],
        // Anything after the marker must never be requested.
        &[END_OF_LISTING, 0x11, 0x22, 0x33],
    );
    let mut c = client(MockBus::with_script(&script));
    let listing = c.list("/").unwrap();

    assert_eq!(
        listing.files,
        vec![("A.TXT".to_string(), 10), ("B.BIN".to_string(), 70_000)]
    );
    assert_eq!(listing.directories, vec!["LOGS".to_string()]);
    assert!(!listing.truncated);

    let bus = c.bus();
    assert_eq!(bus.unread(), 3);
    assert_eq!(bus.calls.last(), Some(&Call::Release));
    assert!(!bus.is_held());
    // Every request holds the bus; the final release is explicit.
    assert!(bus.calls.iter().all(|call| !matches!(call, Call::Request { release: true, .. })));
}

#[test]
fn command_phase_is_held_list() {
    let mut c = client(MockBus::with_script(&[END_OF_LISTING]));
    let listing = c.list("/EMPTY").unwrap();
    assert!(listing.is_empty());
    let calls = &c.bus().calls;
    let l = calls.iter().position(|call| *call == Call::Write(vec![b'L'])).unwrap();
    assert_eq!(calls[l + 1], Call::End(false));
}

#[test]
fn size_field_is_little_endian() {
    let script = stream(&[entry(ENTRY_FILE, "X", 0x0102_0304)], &[END_OF_LISTING]);
    let mut c = client(MockBus::with_script(&script));
    assert_eq!(c.list("/").unwrap().files[0].1, 0x0102_0304);
}

#[test]
fn unknown_type_byte_is_a_protocol_violation() {
    let script = stream(&[entry(ENTRY_FILE, "OK.TXT", 1)], &[b'Z']);
    let mut c = client(MockBus::with_script(&script));
    let mut out = Listing::new();
    let err = c.list_into("/", ListingLimits::unbounded(), &mut out).unwrap_err();
    assert_eq!(err, Error::ProtocolViolation(b'Z'));
    assert_eq!(out.files, vec![("OK.TXT".to_string(), 1)]);
    assert!(!c.bus().is_held());
    // Not a link failure.
    assert_eq!(c.health().consecutive_errors(), 0);
}

#[test]
fn short_read_keeps_entries_found_so_far() {
    let script = stream(
        &[entry(ENTRY_FILE, "A", 1), entry(ENTRY_FILE, "BB", 2)],
        &[END_OF_LISTING],
    );
    // Requests for entry one: type, 'A', NUL, size. Entry two: type, then 'B'.
    let bus = MockBus::with_script(&script).short_request(5, 0);
    let mut c = client(bus);
    let mut out = Listing::new();

    let err = c.list_into("/", ListingLimits::unbounded(), &mut out).unwrap_err();
    assert_eq!(err, Error::ShortRead { expected: 1, received: 0 });
    assert_eq!(out.files, vec![("A".to_string(), 1)]);
    assert!(!c.bus().is_held());
    assert_eq!(c.bus().calls.last(), Some(&Call::Release));
}

#[test]
fn listing_is_rebuilt_on_every_call() {
    let mut out = Listing::new();
    out.directories.push("STALE".into());
    out.truncated = true;

    let mut c = client(MockBus::with_script(&[END_OF_LISTING]));
    c.list_into("/", ListingLimits::unbounded(), &mut out).unwrap();
    assert!(out.is_empty());
    assert!(!out.truncated);
}

// ── Bounded variant ───────────────────────────────────────────

#[test]
fn bounded_truncates_long_names() {
    let long = "N".repeat(40);
    let script = stream(&[entry(ENTRY_FILE, &long, 5)], &[END_OF_LISTING]);
    let mut c = client(MockBus::with_script(&script));
    let mut out = Listing::new();
    c.list_into("/", ListingLimits::bounded(&BusConfig::default()), &mut out)
        .unwrap();
    assert_eq!(out.files, vec![("N".repeat(31), 5)]);
    // The size field still lines up after the dropped characters.
    assert_eq!(c.bus().unread(), 0);
}

#[test]
fn bounded_aborts_on_runaway_name() {
    // No NUL within the read limit.
    let mut script = vec![ENTRY_DIR];
    script.extend(std::iter::repeat_n(b'x', 100));
    let mut c = client(MockBus::with_script(&script));
    let mut out = Listing::new();
    let err = c
        .list_into("/", ListingLimits::bounded(&BusConfig::default()), &mut out)
        .unwrap_err();
    assert_eq!(err, Error::NameTooLong);
    assert!(!c.bus().is_held());
    // Type byte plus 65 name bytes.
    assert_eq!(c.bus().request_count(), 66);
}

#[test]
fn entry_cap_stops_and_releases() {
    let config = BusConfig {
        list_max_entries: 2,
        ..BusConfig::default()
    };
    let entries: Vec<Vec<u8>> = (0..5).map(|i| entry(ENTRY_FILE, &format!("F{i}"), i)).collect();
    let script = stream(&entries, &[END_OF_LISTING]);
    let mut c = client(MockBus::with_script(&script));
    let mut out = Listing::new();

    c.list_into("/", ListingLimits::bounded(&config), &mut out).unwrap();
    assert_eq!(out.len(), 2);
    assert!(out.truncated);
    assert!(c.bus().unread() > 0);
    assert_eq!(c.bus().calls.last(), Some(&Call::Release));
}
