//! FRAM register-store adapter.
//!
//! Drives an I2C ferroelectric RAM (MB85RC-family) through the
//! `embedded-hal` 1.0 [`I2c`] trait and implements [`RegisterStore`] on
//! top of it.  Writes are durable as soon as the bus transaction ends.
//!
//! - **`target_os = "espidf"`**: the bus is an `esp-idf-hal` `I2cDriver`.
//! - **`not(target_os = "espidf")`**: [`SimFram`] emulates the chip in
//!   memory, so the driver code path runs unchanged under `cargo test`.

use embedded_hal::i2c::I2c;
use log::debug;

use crate::app::ports::RegisterStore;
use crate::error::StorageError;

/// Default 7-bit device address (A0..A2 low).
pub const FRAM_ADDR: u8 = 0x50;
/// Bytes per write transaction after the two address bytes.
const WRITE_CHUNK: usize = 32;

pub struct FramStore<I2C> {
    bus: I2C,
    address: u8,
}

impl<I2C: I2c> FramStore<I2C> {
    pub fn new(bus: I2C) -> Self {
        Self::with_address(bus, FRAM_ADDR)
    }

    pub fn with_address(bus: I2C, address: u8) -> Self {
        Self { bus, address }
    }

    pub fn bus_mut(&mut self) -> &mut I2C {
        &mut self.bus
    }
}

impl<I2C: I2c> RegisterStore for FramStore<I2C> {
    fn begin(&mut self) -> Result<(), StorageError> {
        // Setting the address pointer is the cheapest transaction that
        // needs an ACK from the chip.
        self.bus.write(self.address, &[0, 0]).map_err(|e| {
            debug!("FRAM probe failed: {:?}", embedded_hal::i2c::Error::kind(&e));
            StorageError::Absent
        })
    }

    fn read(&mut self, offset: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        self.bus
            .write_read(self.address, &offset.to_be_bytes(), buf)
            .map_err(|e| {
                debug!("FRAM read @0x{:04x} failed: {:?}", offset, embedded_hal::i2c::Error::kind(&e));
                StorageError::Bus
            })
    }

    fn write(&mut self, offset: u16, data: &[u8]) -> Result<(), StorageError> {
        let mut frame = [0u8; WRITE_CHUNK + 2];
        for (i, chunk) in data.chunks(WRITE_CHUNK).enumerate() {
            let at = offset.wrapping_add((i * WRITE_CHUNK) as u16);
            frame[..2].copy_from_slice(&at.to_be_bytes());
            frame[2..2 + chunk.len()].copy_from_slice(chunk);
            self.bus
                .write(self.address, &frame[..2 + chunk.len()])
                .map_err(|e| {
                    debug!("FRAM write @0x{:04x} failed: {:?}", at, embedded_hal::i2c::Error::kind(&e));
                    StorageError::Bus
                })?;
        }
        Ok(())
    }
}

// ── Simulation backend ───────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::{MemoryStore, SimBusError, SimFram};

#[cfg(not(target_os = "espidf"))]
mod sim {
    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

    use super::{FRAM_ADDR, FramStore};

    /// 32 KiB, the size of an MB85RC256V.
    const SIM_CAPACITY: usize = 32 * 1024;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SimBusError;

    impl embedded_hal::i2c::Error for SimBusError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        }
    }

    /// In-memory FRAM chip speaking the same I2C protocol as the real part:
    /// a write sets the 16-bit address pointer and stores any trailing
    /// bytes; a read streams from the pointer.
    pub struct SimFram {
        mem: Vec<u8>,
        pointer: usize,
        /// Models the WP pin: writes are acknowledged but not stored.
        pub write_protect: bool,
        /// Chip not populated: every transaction NACKs.
        pub absent: bool,
    }

    impl SimFram {
        pub fn new() -> Self {
            Self {
                mem: vec![0; SIM_CAPACITY],
                pointer: 0,
                write_protect: false,
                absent: false,
            }
        }
    }

    impl Default for SimFram {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ErrorType for SimFram {
        type Error = SimBusError;
    }

    impl I2c for SimFram {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.absent || address != FRAM_ADDR {
                return Err(SimBusError);
            }
            let len = self.mem.len();
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => {
                        if bytes.len() < 2 {
                            continue;
                        }
                        self.pointer = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
                        for &b in &bytes[2..] {
                            if !self.write_protect {
                                self.mem[self.pointer % len] = b;
                            }
                            self.pointer += 1;
                        }
                    }
                    Operation::Read(buf) => {
                        for b in buf.iter_mut() {
                            *b = self.mem[self.pointer % len];
                            self.pointer += 1;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    /// FRAM driver over the simulated chip.
    pub type MemoryStore = FramStore<SimFram>;

    impl FramStore<SimFram> {
        /// Blank simulated store.
        pub fn new_sim() -> Self {
            FramStore::new(SimFram::new())
        }

        pub fn set_write_protect(&mut self, on: bool) {
            self.bus_mut().write_protect = on;
        }

        pub fn set_absent(&mut self, absent: bool) {
            self.bus_mut().absent = absent;
        }
    }
}
