//! Client for the I2C SD-card bridge.
//!
//! Exposes the protocol core, its port traits and adapters for the ESP
//! binary and for host-side testing. ESP-IDF-specific code lives only in
//! `main.rs`; everything here builds on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod demo;
pub mod health;
pub mod pins;
pub mod protocol;

mod error;

pub use error::{BusError, BusErrorKind, Error, Result};
