//! SD-card bridge client: ESP-IDF entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                    │
//! │                                                            │
//! │  I2cBus<I2cDriver>   FreeRtos delay   LogEventSink         │
//! │  (BusTransport)      (DelayNs)        (EventSink)          │
//! │                                                            │
//! │  ─────────────── Port Trait Boundary ────────────────      │
//! │                                                            │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  StorageService ─▶ SdClient ─▶ LinkHealth            │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::sys::{ESP_OK, i2c_port_t, i2c_set_period};
use log::{debug, info, warn};

use sdlink::adapters::i2c_bus::I2cBus;
use sdlink::adapters::log_sink::LogEventSink;
use sdlink::adapters::time::wall_clock;
use sdlink::app::service::StorageService;
use sdlink::config::BusConfig;
use sdlink::demo::run_demo;
use sdlink::pins;
use sdlink::protocol::{ClockTime, SdClient};

/// Pause between presence checks while idle (ms).
const PRESENCE_POLL_MS: u32 = 5_000;

/// Source clock of the I2C peripheral's SCL period counters.
const I2C_SOURCE_CLK_HZ: u32 = 80_000_000;

/// Used when the wall clock has not been synced.
const FALLBACK_TIME: ClockTime = ClockTime {
    year: 2024,
    month: 7,
    day: 26,
    hour: 10,
    minute: 30,
    second: 0,
};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  sdlink v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = BusConfig::default();
    config.validate().map_err(anyhow::Error::msg)?;

    // ── 2. I2C controller ─────────────────────────────────────
    let peripherals = Peripherals::take()?;
    // SAFETY: the pin numbers come from `pins` and are not claimed anywhere else.
    let (sda, scl) = unsafe {
        (
            AnyIOPin::new(pins::I2C_SDA_GPIO as _),
            AnyIOPin::new(pins::I2C_SCL_GPIO as _),
        )
    };
    let i2c_config = I2cConfig::new().baudrate(Hertz(config.bus_clock_hz));
    let driver = I2cDriver::new(peripherals.i2c0, sda, scl, &i2c_config)?;
    let port = driver.port();
    let bus = I2cBus::with_clock_control(driver, config.bus_clock_hz, move |hz: u32| {
        set_scl_rate(port, hz);
    });
    let mut client = SdClient::new(bus, FreeRtos, config);

    // ── 3. Presence and card metadata ─────────────────────────
    match client.probe() {
        Ok(()) => info!("Bridge answered at 0x{:02X}", client.config().address),
        Err(e) => warn!("Bridge probe failed: {}", e),
    }
    match client.card_type() {
        Ok(kind) => info!("Card type: {}", kind.label()),
        Err(e) => warn!("Card type query failed: {}", e),
    }
    match client.volume_info() {
        Ok(v) => info!(
            "Volume: {:?}, {} clusters x {} blocks, {} MB",
            v.fat_type,
            v.cluster_count,
            v.blocks_per_cluster,
            v.capacity_bytes() / (1024 * 1024)
        ),
        Err(e) => warn!("Volume info query failed: {}", e),
    }

    // ── 4. Demo scenario ──────────────────────────────────────
    let time = wall_clock().unwrap_or(FALLBACK_TIME);
    let report = run_demo(&mut client, &time);
    info!("Demo report: {}", serde_json::to_string(&report)?);

    // ── 5. Web-facing service ─────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut service = StorageService::new(client);
    match service.list("/", &mut sink) {
        Ok(listing) => {
            for dir in &listing.directories {
                info!("  [DIR]  {}", dir);
            }
            for (name, size) in &listing.files {
                info!("  {:>8}  {}", size, name);
            }
        }
        Err(e) => warn!("Root listing failed: {}", e),
    }

    // ── 6. Idle: keep presence current ────────────────────────
    loop {
        FreeRtos::delay_ms(PRESENCE_POLL_MS);
        if !service.is_present() {
            if let Err(e) = service.probe(&mut sink) {
                debug!("presence poll: {}", e);
            }
        }
    }
}

/// Retune SCL on the installed driver without reinstalling it.
fn set_scl_rate(port: i2c_port_t, hz: u32) {
    let half_period = (I2C_SOURCE_CLK_HZ / hz.max(1) / 2) as i32;
    // SAFETY: `port` is the controller owned by the live `I2cDriver`.
    let ret = unsafe { i2c_set_period(port, half_period, half_period) };
    if ret != ESP_OK {
        warn!("i2c_set_period({} Hz) returned {}", hz, ret);
    }
}
