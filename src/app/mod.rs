//! Application layer: the web-facing side of the protocol client.
//!
//! The HTTP router and HTML rendering live outside this crate.  They call
//! into the [`StorageService`](service::StorageService) facade, which
//! gates on link presence and collapses typed results into the boolean
//! contract the pages expect.  All interaction with the bus happens through
//! **port traits** defined in [`ports`].

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
