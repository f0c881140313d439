//! Presence tracking and busy rejection through real operations.

use std::sync::Arc;

use sdlink::adapters::sim_card::SimCard;
use sdlink::adapters::time::NoDelay;
use sdlink::config::BusConfig;
use sdlink::protocol::SdClient;
use sdlink::{BusError, Error};

use crate::mock_bus::{MockBus, client};

fn sim(card: SimCard) -> SdClient<SimCard, NoDelay> {
    SdClient::new(card, NoDelay::default(), BusConfig::default())
}

#[test]
fn six_consecutive_failures_flip_presence() {
    let mut card = SimCard::new();
    card.set_absent(true);
    let mut c = sim(card);

    for i in 1..=5 {
        assert!(c.exists("/A", false).is_err());
        assert!(c.health().is_present(), "still present after {i} failures");
    }
    assert!(c.exists("/A", false).is_err());
    assert!(!c.health().is_present());
    assert_eq!(c.health().consecutive_errors(), 6);
}

#[test]
fn one_success_does_not_restore_presence() {
    let mut card = SimCard::new();
    card.set_absent(true);
    let mut c = sim(card);
    for _ in 0..6 {
        let _ = c.size("/A");
    }
    assert!(!c.health().is_present());

    c.bus_mut().set_absent(false);
    assert_eq!(c.exists("/", true), Ok(true));
    assert_eq!(c.health().consecutive_errors(), 0);
    assert!(!c.health().is_present());

    c.probe().unwrap();
    assert!(c.health().is_present());
}

#[test]
fn failed_probe_counts_as_failure() {
    let mut card = SimCard::new();
    card.set_absent(true);
    let mut c = sim(card);
    assert_eq!(c.probe(), Err(Error::Bus(BusError::ADDRESS_NACK)));
    assert_eq!(c.health().consecutive_errors(), 1);
}

#[test]
fn short_reads_count_against_the_link() {
    let mut c = client(MockBus::new().short_request(0, 0));
    let _ = c.size("/A");
    assert_eq!(c.health().consecutive_errors(), 1);
}

#[test]
fn interleaved_successes_keep_the_bridge_present() {
    let mut c = sim(SimCard::new());
    for _ in 0..10 {
        for _ in 0..5 {
            c.bus_mut().fail_next_end(BusError::OTHER);
            let _ = c.exists("/", true);
        }
        assert_eq!(c.exists("/", true), Ok(true));
    }
    assert!(c.health().is_present());
}

#[test]
fn operation_while_busy_is_rejected_without_traffic() {
    let mut c = client(MockBus::new());
    let health = Arc::clone(c.health());
    let guard = health.try_acquire().unwrap();

    assert_eq!(c.size("/A"), Err(Error::Busy));
    assert_eq!(c.probe(), Err(Error::Busy));
    assert!(c.bus().calls.is_empty());
    assert_eq!(c.health().consecutive_errors(), 0);

    drop(guard);
    assert!(c.mkdir("/D").is_ok());
}

#[test]
fn busy_flag_clears_on_error_paths() {
    let mut c = client(MockBus::new().fail_end(0, BusError::DATA_NACK));
    assert!(c.remove("/A").is_err());
    assert!(!c.health().is_busy());
}

#[test]
fn shared_monitor_sees_client_outcomes() {
    let health = Arc::new(sdlink::health::LinkHealth::new(0));
    let mut card = SimCard::new();
    card.set_absent(true);
    let mut c = SdClient::with_health(card, NoDelay::default(), BusConfig::default(), Arc::clone(&health));
    let _ = c.card_type();
    assert!(!health.is_present());
}
