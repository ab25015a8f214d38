//! Test support utilities - only compiled in test builds.

use core::cell::RefCell;

use embedded_hal::blocking::{delay::DelayMs, i2c};

use crate::registers::NUM_REGISTERS;

/// Something that happened on the bus, or a wait.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    Write { address: u8, reg: u8, value: u8 },
    Read { address: u8, reg: u8 },
    Delay(u8),
}

/// Shared, ordered record of bus transactions and delays.
pub type Timeline = RefCell<heapless::Vec<Event, 512>>;

pub fn timeline() -> Timeline {
    RefCell::new(heapless::Vec::new())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BusError;

/// A scripted I²C bus standing in for a KS0127.
pub struct FakeBus<'a> {
    timeline: &'a Timeline,
    /// What each register reads back as
    pub read_values: [u8; NUM_REGISTERS],
    /// Bitmask of register addresses whose writes are NAKed
    pub failing_writes: u64,
    pub failing_reads: bool,
}

impl<'a> FakeBus<'a> {
    pub fn new(timeline: &'a Timeline) -> FakeBus<'a> {
        FakeBus {
            timeline,
            read_values: [0; NUM_REGISTERS],
            failing_writes: 0,
            failing_reads: false,
        }
    }

    fn record(&self, event: Event) {
        self.timeline
            .borrow_mut()
            .push(event)
            .expect("timeline full");
    }
}

impl i2c::Write for FakeBus<'_> {
    type Error = BusError;

    fn write(&mut self, address: i2c::SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        assert_eq!(bytes.len(), 2, "register writes are address + value");
        let reg = bytes[0];
        self.record(Event::Write {
            address,
            reg,
            value: bytes[1],
        });
        if reg < 64 && self.failing_writes & (1 << reg) != 0 {
            Err(BusError)
        } else {
            Ok(())
        }
    }
}

impl i2c::WriteRead for FakeBus<'_> {
    type Error = BusError;

    fn write_read(
        &mut self,
        address: i2c::SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        assert_eq!(bytes.len(), 1);
        assert_eq!(buffer.len(), 1);
        let reg = bytes[0];
        self.record(Event::Read { address, reg });
        if self.failing_reads {
            buffer[0] = 0xa5;
            return Err(BusError);
        }
        buffer[0] = self.read_values[reg as usize];
        Ok(())
    }
}

/// Records waits into the same timeline as the bus.
pub struct FakeDelay<'a> {
    timeline: &'a Timeline,
}

impl<'a> FakeDelay<'a> {
    pub fn new(timeline: &'a Timeline) -> FakeDelay<'a> {
        FakeDelay { timeline }
    }
}

impl DelayMs<u8> for FakeDelay<'_> {
    fn delay_ms(&mut self, ms: u8) {
        self.timeline
            .borrow_mut()
            .push(Event::Delay(ms))
            .expect("timeline full");
    }
}

/// Register writes in the timeline, as `(reg, value)` pairs.
pub fn writes(timeline: &Timeline) -> heapless::Vec<(u8, u8), 512> {
    timeline
        .borrow()
        .iter()
        .filter_map(|event| match *event {
            Event::Write { reg, value, .. } => Some((reg, value)),
            _ => None,
        })
        .collect()
}
