//! OccuCount Firmware: Main Entry Point
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  FramStore        CloudLink       PowerMonitor   SystemClock   │
//! │  (RegisterStore)  (TransportPort) (PowerPort)    (Clock)       │
//! │  Board            SleepController LogEventSink                 │
//! │  (BoardPort)      (SleepPort)     (EventSink)                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Counter · Upload · Escalation · Console         │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::cell::RefCell;

use anyhow::Result;
use embedded_hal_bus::i2c::RefCellDevice;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{self, UartDriver};
use esp_idf_hal::units::Hertz;
use log::info;

use occucount::adapters::board::Board;
use occucount::adapters::cloud::CloudLink;
use occucount::adapters::device_id;
use occucount::adapters::fram::FramStore;
use occucount::adapters::fuel_gauge::PowerMonitor;
use occucount::adapters::log_sink::LogEventSink;
use occucount::adapters::system::SleepController;
use occucount::adapters::time::SystemClock;
use occucount::app::ports::Ports;
use occucount::app::service::AppService;
use occucount::drivers;
use occucount::drivers::modem::AtChannel;
use occucount::pins;

/// Control loop period.
const LOOP_PERIOD_MS: u32 = 20;

/// Broker reached over the modem's PPP link.
const BROKER_URL: &str = match option_env!("OCCUCOUNT_BROKER_URL") {
    Some(url) => url,
    None => "mqtt://localhost:1883",
};

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  OccuCount v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Initialise hardware peripherals ────────────────────
    if let Err(e) = drivers::hw_init::init_peripherals() {
        // Without GPIO the counter cannot sense; the external watchdog
        // resets the board once it stops being petted.
        log::error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    if let Err(e) = drivers::hw_init::init_isr_service() {
        log::error!("ISR service init failed: {}, continuing without ISRs", e);
    }

    // ── 3. Shared I2C bus: FRAM + gauge + charger ─────────────
    let peripherals = Peripherals::take()?;
    // SAFETY: the bus pins are not claimed by any other driver.
    let (sda, scl) = unsafe {
        (
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
        )
    };
    let i2c_config = I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ));
    let i2c = I2cDriver::new(peripherals.i2c0, sda, scl, &i2c_config)?;
    let bus = RefCell::new(i2c);

    // ── 4. Construct adapters ─────────────────────────────────
    let mut store = FramStore::new(RefCellDevice::new(&bus));
    let mut power = PowerMonitor::new(RefCellDevice::new(&bus));

    let mac = device_id::read_mac();
    let dev_id = device_id::device_id(&mac);
    info!("Device ID: {}", dev_id);
    // SAFETY: the modem UART pins are not claimed by any other driver.
    let (modem_tx, modem_rx) = unsafe {
        (
            AnyIOPin::new(pins::MODEM_TX_GPIO),
            AnyIOPin::new(pins::MODEM_RX_GPIO),
        )
    };
    let modem_uart = UartDriver::new(
        peripherals.uart1,
        modem_tx,
        modem_rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart::config::Config::new().baudrate(Hertz(pins::MODEM_BAUD)),
    )?;
    let mut link = CloudLink::new(
        BROKER_URL,
        device_id::topic_root(&dev_id),
        AtChannel::new(modem_uart),
    );

    let clock = SystemClock::new();
    let mut board = Board::new();
    let mut system = SleepController::new();
    let mut log_sink = LogEventSink::new();

    // ── 5. Construct app service ──────────────────────────────
    let mut app = AppService::new();
    {
        let mut ports = Ports {
            store: &mut store,
            link: &mut link,
            power: &mut power,
            clock: &clock,
            board: &mut board,
            system: &mut system,
        };
        app.start(&mut ports, &mut log_sink);
    }

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        let mut ports = Ports {
            store: &mut store,
            link: &mut link,
            power: &mut power,
            clock: &clock,
            board: &mut board,
            system: &mut system,
        };
        app.tick(&mut ports, &mut log_sink);
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
