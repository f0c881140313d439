//! Delay and wall-clock adapters.
//!
//! - On the device the client uses `esp_idf_hal::delay::FreeRtos`.
//! - [`NoDelay`] returns immediately and only counts the requested time,
//!   for host tests and the simulator.
//! - [`wall_clock`] reads the system clock for the bridge's `'C'` command.

use chrono::{DateTime, Datelike, Timelike, Utc};
use embedded_hal::delay::DelayNs;

use crate::protocol::command::ClockTime;

/// Years before this mean the RTC was never synced.
const FIRST_SYNCED_YEAR: i32 = 2020;

/// Delay that never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay {
    /// Total delay requested so far, in nanoseconds.
    pub requested_ns: u64,
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.requested_ns = self.requested_ns.saturating_add(u64::from(ns));
    }
}

/// Current UTC time, or `None` if the clock has not been synced yet.
pub fn wall_clock() -> Option<ClockTime> {
    clock_time(&Utc::now())
}

/// Calendar fields of `now`, or `None` before 2020-01-01.
pub fn clock_time(now: &DateTime<Utc>) -> Option<ClockTime> {
    if now.year() < FIRST_SYNCED_YEAR {
        return None;
    }
    Some(ClockTime {
        year: u16::try_from(now.year()).ok()?,
        month: now.month() as u8,
        day: now.day() as u8,
        hour: now.hour() as u8,
        minute: now.minute() as u8,
        second: now.second() as u8,
    })
}
