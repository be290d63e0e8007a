//! Simulated device for unit tests: every port backed by its sim adapter,
//! all sharing one manual clock.

use crate::adapters::board::SimBoard;
use crate::adapters::cloud::SimLink;
use crate::adapters::fram::MemoryStore;
use crate::adapters::fuel_gauge::SimPower;
use crate::adapters::system::SimSleep;
use crate::adapters::time::SimTime;
use crate::app::ports::Ports;
use crate::registers::Registers;

pub struct SimRig {
    pub store: MemoryStore,
    pub link: SimLink,
    pub power: SimPower,
    pub time: SimTime,
    pub board: SimBoard,
    pub system: SimSleep,
}

impl SimRig {
    pub fn new() -> Self {
        let time = SimTime::new();
        Self {
            store: MemoryStore::new_sim(),
            link: SimLink::new(),
            power: SimPower::new(),
            system: SimSleep::new(time.clone()),
            time,
            board: SimBoard::new(),
        }
    }

    /// Format the store with defaults and return the loaded registers.
    pub fn formatted_registers(&mut self) -> Registers {
        Registers::reset_store(&mut self.store).unwrap();
        Registers::load(&mut self.store).unwrap()
    }

    pub fn ports(&mut self) -> Ports<'_> {
        Ports {
            store: &mut self.store,
            link: &mut self.link,
            power: &mut self.power,
            clock: &self.time,
            board: &mut self.board,
            system: &mut self.system,
        }
    }
}
