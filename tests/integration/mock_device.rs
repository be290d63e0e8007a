//! Simulated device for integration tests.
//!
//! Wires every sim adapter to one [`AppService`] and records every event
//! the service emits, so tests can assert on the full history without
//! touching real GPIO, I2C or a modem.

use occucount::adapters::board::SimBoard;
use occucount::adapters::cloud::SimLink;
use occucount::adapters::fram::MemoryStore;
use occucount::adapters::fuel_gauge::SimPower;
use occucount::adapters::system::SimSleep;
use occucount::adapters::time::SimTime;
use occucount::app::events::AppEvent;
use occucount::app::ports::{EventSink, Ports};
use occucount::app::service::AppService;
use occucount::fsm::StateId;
use occucount::registers::Registers;

// ── Event recorder ────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockDevice ────────────────────────────────────────────────

pub struct MockDevice {
    pub store: MemoryStore,
    pub link: SimLink,
    pub power: SimPower,
    pub time: SimTime,
    pub board: SimBoard,
    pub system: SimSleep,
    pub sink: RecordingSink,
    pub app: AppService,
}

#[allow(dead_code)]
impl MockDevice {
    /// Device with a formatted register store, not yet started.
    pub fn new() -> Self {
        let time = SimTime::new();
        let mut store = MemoryStore::new_sim();
        Registers::reset_store(&mut store).expect("format sim store");
        Self {
            store,
            link: SimLink::new(),
            power: SimPower::new(),
            system: SimSleep::new(time.clone()),
            time,
            board: SimBoard::new(),
            sink: RecordingSink::default(),
            app: AppService::new(),
        }
    }

    /// Register mirror as stored right now.
    pub fn stored(&mut self) -> Registers {
        Registers::load(&mut self.store).expect("load sim store")
    }

    /// Start the service and run the boot tick.
    pub fn boot(&mut self) -> StateId {
        let mut ports = Ports {
            store: &mut self.store,
            link: &mut self.link,
            power: &mut self.power,
            clock: &self.time,
            board: &mut self.board,
            system: &mut self.system,
        };
        self.app.start(&mut ports, &mut self.sink);
        self.tick()
    }

    /// One service tick; returns the state after it.
    pub fn tick(&mut self) -> StateId {
        let mut ports = Ports {
            store: &mut self.store,
            link: &mut self.link,
            power: &mut self.power,
            clock: &self.time,
            board: &mut self.board,
            system: &mut self.system,
        };
        self.app.tick(&mut ports, &mut self.sink);
        self.app.state()
    }

    /// Tick until the state changes, at most `limit` times.
    pub fn tick_until_leaving(&mut self, limit: usize) -> StateId {
        let from = self.app.state();
        for _ in 0..limit {
            if self.tick() != from {
                break;
            }
        }
        self.app.state()
    }

    /// Call a console function directly.
    pub fn call(&mut self, name: &str, arg: &str) -> bool {
        let mut ports = Ports {
            store: &mut self.store,
            link: &mut self.link,
            power: &mut self.power,
            clock: &self.time,
            board: &mut self.board,
            system: &mut self.system,
        };
        self.app.call_function(name, arg, &mut ports)
    }

    /// One sensor edge followed by a tick.
    pub fn edge(&mut self) -> StateId {
        self.board.trigger_sensor();
        self.tick()
    }

    pub fn saw(&self, event: &AppEvent) -> bool {
        self.sink.events.contains(event)
    }
}
