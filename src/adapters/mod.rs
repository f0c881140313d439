//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements    | Connects to                       |
//! |-------------|---------------|-----------------------------------|
//! | `i2c_bus`   | BusTransport  | any `embedded-hal` I2C controller |
//! | `sim_card`  | BusTransport  | in-memory bridge emulator         |
//! | `log_sink`  | EventSink     | `log` output                      |
//! | `time`      | DelayNs       | no-op delay, wall clock           |

pub mod i2c_bus;
pub mod log_sink;
pub mod sim_card;
pub mod time;
