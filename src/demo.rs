//! Bridge exercise scenario.
//!
//! Walks the whole command set against a live (or simulated) bridge and
//! records what each step returned against what it should have returned:
//!
//! 1. Directory operations on `/TESTDIR`.
//! 2. File operations on `/TEST.TXT`: write, append, remove, and a
//!    multi-chunk rewrite.
//! 3. Clock set, then nested directories and a file inside them, cleaned
//!    up afterwards.
//!
//! The scenario leaves the card as it found it, so it can be rerun.

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use log::{info, warn};
use serde::Serialize;

use crate::app::ports::BusTransport;
use crate::error::Result;
use crate::protocol::client::SdClient;
use crate::protocol::command::{ClockTime, WriteMode};

pub const TEST_DIR: &str = "/TESTDIR";
pub const TEST_FILE: &str = "/TEST.TXT";
pub const NEST_DIR: &str = "/NEST";
pub const NEST_SUBDIR: &str = "/NEST/SUB";
pub const NEST_FILE: &str = "/NEST/SUB/NESTFILE.TXT";

const LINE_1: &[u8] = b"Line 1. Hello from the SD bridge client!";
const LINE_2: &[u8] = b"\nLine 2. Appended line";
const NEST_CONTENT: &[u8] = b"Data in a nested directory.";

/// Outcome of one scenario step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoStep {
    pub name: String,
    pub passed: bool,
    /// What the step actually returned.
    pub detail: String,
}

/// Everything the scenario observed, in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DemoReport {
    pub steps: Vec<DemoStep>,
}

impl DemoReport {
    pub fn all_passed(&self) -> bool {
        self.steps.iter().all(|s| s.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DemoStep> {
        self.steps.iter().filter(|s| !s.passed)
    }

    fn record(&mut self, name: String, passed: bool, detail: String) {
        if passed {
            info!("demo | {name}: ok ({detail})");
        } else {
            warn!("demo | {name}: FAILED ({detail})");
        }
        self.steps.push(DemoStep {
            name,
            passed,
            detail,
        });
    }

    /// Passes when `outcome` equals `Ok(expected)`.
    fn expect<V: PartialEq + Debug>(&mut self, name: String, outcome: Result<V>, expected: V) {
        let passed = outcome.as_ref().is_ok_and(|v| *v == expected);
        self.record(name, passed, format!("{outcome:?}"));
    }

    /// Passes on any `Ok`.
    fn expect_ok<V: Debug>(&mut self, name: String, outcome: Result<V>) {
        let passed = outcome.is_ok();
        self.record(name, passed, format!("{outcome:?}"));
    }
}

/// Run the full scenario.  `time` is pushed to the bridge clock.
pub fn run_demo<T: BusTransport, D: DelayNs>(
    client: &mut SdClient<T, D>,
    time: &ClockTime,
) -> DemoReport {
    let mut report = DemoReport::default();
    directory_steps(client, &mut report);
    file_steps(client, &mut report);
    nested_steps(client, &mut report, time);
    info!(
        "demo | finished: {}/{} steps passed",
        report.steps.len() - report.failures().count(),
        report.steps.len()
    );
    report
}

fn directory_steps<T: BusTransport, D: DelayNs>(c: &mut SdClient<T, D>, r: &mut DemoReport) {
    r.expect(format!("exists {TEST_DIR} (before)"), c.exists(TEST_DIR, true), false);
    // Created and already-there both count.
    r.expect_ok(format!("mkdir {TEST_DIR}"), c.mkdir(TEST_DIR));
    r.expect(format!("exists {TEST_DIR}"), c.exists(TEST_DIR, true), true);

    let name = &TEST_DIR[1..];
    let listed = c.list("/").map(|l| l.directories.iter().any(|d| d == name));
    r.expect(format!("list / shows {name}"), listed, true);

    r.expect(format!("rmdir {TEST_DIR}"), c.rmdir(TEST_DIR), true);
    r.expect(format!("exists {TEST_DIR} (after)"), c.exists(TEST_DIR, true), false);
}

fn file_steps<T: BusTransport, D: DelayNs>(c: &mut SdClient<T, D>, r: &mut DemoReport) {
    r.expect(format!("exists {TEST_FILE} (before)"), c.exists(TEST_FILE, false), false);
    r.expect_ok(format!("write {TEST_FILE}"), c.write(TEST_FILE, WriteMode::Write, LINE_1));
    r.expect(format!("exists {TEST_FILE}"), c.exists(TEST_FILE, false), true);
    r.expect(format!("read {TEST_FILE}"), c.read_all(TEST_FILE), LINE_1.to_vec());

    r.expect_ok(format!("append {TEST_FILE}"), c.write(TEST_FILE, WriteMode::Append, LINE_2));
    let joined = [LINE_1, LINE_2].concat();
    r.expect(format!("read {TEST_FILE} (appended)"), c.read_all(TEST_FILE), joined);

    r.expect(format!("remove {TEST_FILE}"), c.remove(TEST_FILE), true);
    r.expect(format!("exists {TEST_FILE} (removed)"), c.exists(TEST_FILE, false), false);

    // Several chunks in both directions.
    let long = long_content();
    r.expect_ok(format!("write {TEST_FILE} (long)"), c.write(TEST_FILE, WriteMode::Write, &long));
    r.expect(format!("size {TEST_FILE}"), c.size(TEST_FILE), long.len() as u32);
    r.expect(format!("read {TEST_FILE} (long)"), c.read_all(TEST_FILE), long);
    r.expect(format!("remove {TEST_FILE} (cleanup)"), c.remove(TEST_FILE), true);
}

fn nested_steps<T: BusTransport, D: DelayNs>(
    c: &mut SdClient<T, D>,
    r: &mut DemoReport,
    time: &ClockTime,
) {
    r.expect_ok(String::from("set clock"), c.set_clock(time));

    r.expect_ok(format!("mkdir {NEST_DIR}"), c.mkdir(NEST_DIR));
    r.expect_ok(format!("mkdir {NEST_SUBDIR}"), c.mkdir(NEST_SUBDIR));
    r.expect(format!("exists {NEST_SUBDIR}"), c.exists(NEST_SUBDIR, true), true);

    r.expect_ok(format!("write {NEST_FILE}"), c.write(NEST_FILE, WriteMode::Write, NEST_CONTENT));
    r.expect(format!("exists {NEST_FILE}"), c.exists(NEST_FILE, false), true);

    let leaf = NEST_FILE.rsplit('/').next().unwrap_or(NEST_FILE);
    let listed = c.list(NEST_SUBDIR).map(|l| l.files);
    r.expect(
        format!("list {NEST_SUBDIR}"),
        listed,
        vec![(leaf.to_owned(), NEST_CONTENT.len() as u32)],
    );
    r.expect(format!("read {NEST_FILE}"), c.read_all(NEST_FILE), NEST_CONTENT.to_vec());

    r.expect(format!("remove {NEST_FILE}"), c.remove(NEST_FILE), true);
    r.expect(format!("rmdir {NEST_SUBDIR}"), c.rmdir(NEST_SUBDIR), true);
    r.expect(format!("rmdir {NEST_DIR}"), c.rmdir(NEST_DIR), true);
    r.expect(format!("exists {NEST_DIR} (after)"), c.exists(NEST_DIR, true), false);
}

/// Two lines, the second a long run of digits.
fn long_content() -> Vec<u8> {
    let mut text = b"Line 1. Hello again!\nLine 2. ".to_vec();
    for i in 0..200u32 {
        text.push(b'0' + ((i + 1) % 10) as u8);
    }
    text
}
