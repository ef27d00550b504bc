#![no_std]
#![deny(missing_docs)]
//! # ds1821
//! Driver for the DS1821 temperature sensor in thermostat mode.
//!
//! A thermostat-mode DS1821 has no ROM layer: it ignores Read/Match/Search
//! ROM and interprets the first byte after every reset as a function
//! command, so every exchange here is effectively a bus-wide broadcast.
//! With several such parts wired to one line, reads come back as the
//! bitwise AND of all their answers and writes land on all of them at
//! once; the driver cannot change that, only report it.
//!
//! [Ds1821] is the register-level command layer, [ops] the structured
//! high-level operations (scan, probe, temperature, thresholds), and
//! [oneshot] the orchestration that moves the part back into the
//! addressable 1-Wire mode (status rewrite plus power cycle).

#[cfg(test)]
extern crate std;

pub mod oneshot;
pub mod ops;
mod status;
mod temperature;

pub use status::Status;
pub use temperature::TemperatureSample;

use embedded_hal::delay::DelayNs;
use onewire_bitbang::{OneWireBus, OneWireError, OneWireResult, SKIP_ROM_CMD};

// DS1821 function commands.
const CMD_START_CONVERT: u8 = 0xee;
const CMD_STOP_CONVERT: u8 = 0x22;
const CMD_READ_TEMP: u8 = 0xaa;
const CMD_READ_COUNTER: u8 = 0xa0;
const CMD_READ_SLOPE: u8 = 0xa9;
const CMD_READ_TH: u8 = 0xa1;
const CMD_READ_TL: u8 = 0xa2;
const CMD_WRITE_TH: u8 = 0x01;
const CMD_WRITE_TL: u8 = 0x02;
const CMD_READ_STATUS: u8 = 0xac;
const CMD_WRITE_STATUS: u8 = 0x0c;

/// Released-line settle window after a write that commits to EEPROM.
/// The datasheet minimum is ~10 ms; the margin is deliberately generous.
const EEPROM_SETTLE_MS: u32 = 200;

/// How a function command is prefixed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Thermostat mode: the function command goes out right after the
    /// reset/presence handshake.
    Direct,
    /// Prefix every command with Skip-ROM, for devices that already
    /// rejoined the ROM protocol mid-transition.
    SkipRom,
}

/// Register-level DS1821 command layer.
///
/// Stateless apart from the addressing prefix; every operation performs
/// its own reset + presence check and fails fast without it.
#[derive(Debug, Clone, Copy)]
pub struct Ds1821 {
    addressing: Addressing,
}

impl Default for Ds1821 {
    fn default() -> Self {
        Self::new()
    }
}

impl Ds1821 {
    /// Family byte the part reports once switched to 1-Wire mode.
    pub const FAMILY: u8 = 0x22;

    /// Direct (thermostat mode) addressing.
    pub const fn new() -> Self {
        Self {
            addressing: Addressing::Direct,
        }
    }

    /// Skip-ROM prefixed addressing.
    pub const fn with_skip_rom() -> Self {
        Self {
            addressing: Addressing::SkipRom,
        }
    }

    /// The addressing prefix in use.
    pub const fn addressing(&self) -> Addressing {
        self.addressing
    }

    fn command<O: OneWireBus>(&self, bus: &mut O, cmd: u8) -> OneWireResult<(), O::BusError> {
        if !bus.reset()? {
            return Err(OneWireError::NoDevicePresent);
        }
        if self.addressing == Addressing::SkipRom {
            bus.write_byte(SKIP_ROM_CMD)?;
        }
        bus.write_byte(cmd)
    }

    fn read_register<O: OneWireBus>(&self, bus: &mut O, cmd: u8) -> OneWireResult<u8, O::BusError> {
        self.command(bus, cmd)?;
        bus.read_byte()
    }

    /// After an EEPROM-mutating write the line must stay released for the
    /// settle window, or the next transaction reads back garbage. The
    /// last slot already released the line, so this is pure waiting.
    fn settle<D: DelayNs>(delay: &mut D) {
        delay.delay_ms(EEPROM_SETTLE_MS);
    }

    /// Starts a temperature conversion. In one-shot mode a single
    /// conversion runs (up to ~1 s); in continuous mode conversions
    /// repeat until stopped.
    pub fn start_conversion<O: OneWireBus>(&self, bus: &mut O) -> OneWireResult<(), O::BusError> {
        self.command(bus, CMD_START_CONVERT)
    }

    /// Halts continuous conversion.
    pub fn stop_conversion<O: OneWireBus>(&self, bus: &mut O) -> OneWireResult<(), O::BusError> {
        self.command(bus, CMD_STOP_CONVERT)
    }

    /// Reads the status register.
    pub fn read_status<O: OneWireBus>(&self, bus: &mut O) -> OneWireResult<Status, O::BusError> {
        Ok(Status::from_bits(self.read_register(bus, CMD_READ_STATUS)?))
    }

    /// Writes the status register and waits out the EEPROM commit.
    pub fn write_status<O: OneWireBus, D: DelayNs>(
        &self,
        bus: &mut O,
        delay: &mut D,
        status: Status,
    ) -> OneWireResult<(), O::BusError> {
        self.command(bus, CMD_WRITE_STATUS)?;
        bus.write_byte(status.into_bits())?;
        Self::settle(delay);
        Ok(())
    }

    /// Reads the whole-degree temperature register.
    pub fn read_temperature_register<O: OneWireBus>(
        &self,
        bus: &mut O,
    ) -> OneWireResult<i8, O::BusError> {
        Ok(self.read_register(bus, CMD_READ_TEMP)? as i8)
    }

    /// Reads the COUNT_REMAIN register.
    pub fn read_counter<O: OneWireBus>(&self, bus: &mut O) -> OneWireResult<u8, O::BusError> {
        self.read_register(bus, CMD_READ_COUNTER)
    }

    /// Reads the COUNT_PER_C (slope) register.
    pub fn read_slope<O: OneWireBus>(&self, bus: &mut O) -> OneWireResult<u8, O::BusError> {
        self.read_register(bus, CMD_READ_SLOPE)
    }

    /// Reads temperature, counter and slope into one sample.
    pub fn read_sample<O: OneWireBus>(
        &self,
        bus: &mut O,
    ) -> OneWireResult<TemperatureSample, O::BusError> {
        Ok(TemperatureSample {
            raw: self.read_temperature_register(bus)?,
            count_remain: self.read_counter(bus)?,
            count_per_c: self.read_slope(bus)?,
        })
    }

    /// Reads the high-alarm threshold in °C.
    pub fn read_high_threshold<O: OneWireBus>(
        &self,
        bus: &mut O,
    ) -> OneWireResult<i8, O::BusError> {
        Ok(self.read_register(bus, CMD_READ_TH)? as i8)
    }

    /// Reads the low-alarm threshold in °C.
    pub fn read_low_threshold<O: OneWireBus>(&self, bus: &mut O) -> OneWireResult<i8, O::BusError> {
        Ok(self.read_register(bus, CMD_READ_TL)? as i8)
    }

    /// Writes the high-alarm threshold and waits out the EEPROM commit.
    pub fn write_high_threshold<O: OneWireBus, D: DelayNs>(
        &self,
        bus: &mut O,
        delay: &mut D,
        degrees: i8,
    ) -> OneWireResult<(), O::BusError> {
        self.command(bus, CMD_WRITE_TH)?;
        bus.write_byte(degrees as u8)?;
        Self::settle(delay);
        Ok(())
    }

    /// Writes the low-alarm threshold and waits out the EEPROM commit.
    pub fn write_low_threshold<O: OneWireBus, D: DelayNs>(
        &self,
        bus: &mut O,
        delay: &mut D,
        degrees: i8,
    ) -> OneWireResult<(), O::BusError> {
        self.command(bus, CMD_WRITE_TL)?;
        bus.write_byte(degrees as u8)?;
        Self::settle(delay);
        Ok(())
    }
}
