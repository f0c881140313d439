//! Fuzz target: `EntryDecoder::push`
//!
//! Drives arbitrary `L` reply bytes through the streaming listing decoder,
//! with and without the web-listing bounds, and checks that it never
//! panics, never asks for more bytes after an error, and never reports
//! more entries than the input could encode.
//!
//! cargo fuzz run fuzz_listing_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use sdlink::config::BusConfig;
use sdlink::protocol::listing::{Decoded, EntryDecoder, ListingLimits, decode_listing};
use sdlink::protocol::Listing;

/// Type byte, NUL, four size bytes.
const MIN_ENTRY_LEN: usize = 6;

fn drive(data: &[u8], limits: ListingLimits) {
    let mut decoder = EntryDecoder::new(limits);
    let mut consumed = 0usize;
    let mut decoded = 0usize;
    for &b in data {
        let want = decoder.want();
        if want == 0 {
            break;
        }
        assert!(want <= 4, "decoder asked for {want} bytes");
        consumed += 1;
        match decoder.push(b) {
            Ok(Decoded::Entry(entry)) => {
                decoded += 1;
                if let Some(cap) = limits.max_name_len {
                    assert!(entry.name.chars().count() <= cap);
                }
            }
            Ok(Decoded::End | Decoded::Pending) => {}
            Err(_) => {
                assert_eq!(decoder.want(), 0, "decoder still hungry after an error");
                break;
            }
        }
    }
    assert_eq!(decoded, decoder.entries());
    assert!(decoded <= consumed / MIN_ENTRY_LEN + 1);
}

fuzz_target!(|data: &[u8]| {
    drive(data, ListingLimits::unbounded());
    drive(data, ListingLimits::bounded(&BusConfig::default()));

    // The buffered helper agrees with the streaming decoder.
    let mut out = Listing::new();
    if decode_listing(data, ListingLimits::unbounded(), &mut out).is_ok() {
        assert!(out.len() <= data.len() / MIN_ENTRY_LEN + 1);
    }
});
