//! Structured high-level operations, one per tool action.
//!
//! Each operation composes register-level [Ds1821](crate::Ds1821) calls
//! (and, for `scan`, the ROM layer) into a report the dispatch layer can
//! render as text or `key=value` pairs. Phantom ROM codes are data with a
//! validity flag, never an error; only a missing presence pulse aborts.

use crate::{Ds1821, Status, TemperatureSample};
use embedded_hal::delay::DelayNs;
use onewire_bitbang::{OneWireBus, OneWireError, OneWireResult, RomCode, RomSearch, read_rom};

/// Worst-case conversion time to wait after Start-Convert.
const CONVERSION_WAIT_MS: u32 = 1_000;

/// Everything `scan` learned about the bus.
#[derive(Debug, Clone)]
pub struct ScanReport<const N: usize> {
    /// Result of the single-device Read-ROM attempt. A phantom code here
    /// usually means several devices answered at once.
    pub single: Option<RomCode>,
    roms: [RomCode; N],
    count: usize,
    /// Broadcast (AND-combined) status register, if readable.
    pub status: Option<Status>,
    /// Broadcast thresholds (TH, TL), if readable.
    pub thresholds: Option<(i8, i8)>,
}

impl<const N: usize> ScanReport<N> {
    /// Codes discovered by Search-ROM, in enumeration order.
    pub fn discovered(&self) -> &[RomCode] {
        &self.roms[..self.count]
    }

    /// Discovered codes that are genuine addressable devices.
    pub fn valid_count(&self) -> usize {
        self.discovered().iter().filter(|r| r.is_valid()).count()
    }

    /// Discovered codes that are collision phantoms.
    pub fn phantom_count(&self) -> usize {
        self.count - self.valid_count()
    }
}

/// Enumerates the bus: presence, Read-ROM, Search-ROM up to `N` codes,
/// then a broadcast status/threshold probe of any thermostat-mode parts.
pub fn scan<O: OneWireBus, const N: usize>(
    bus: &mut O,
) -> OneWireResult<ScanReport<N>, O::BusError> {
    if !bus.reset()? {
        return Err(OneWireError::NoDevicePresent);
    }

    let single = read_rom(bus).ok();

    let mut roms = [RomCode::default(); N];
    let mut count = 0;
    let mut search = RomSearch::new(bus);
    while count < N {
        match search.next()? {
            Some(code) => {
                roms[count] = code;
                count += 1;
            }
            None => break,
        }
    }

    let dev = Ds1821::new();
    let status = dev.read_status(bus).ok();
    let thresholds = read_thresholds(bus, &dev);

    Ok(ScanReport {
        single,
        roms,
        count,
        status,
        thresholds,
    })
}

/// Status register and thresholds, as seen in one broadcast exchange.
#[derive(Debug, Clone, Copy)]
pub struct ProbeReport {
    /// The (possibly AND-combined) status register.
    pub status: Status,
    /// Thresholds (TH, TL), if readable.
    pub thresholds: Option<(i8, i8)>,
    /// Thermostat output level on the shared DQ pin, when requested.
    pub output_level: Option<bool>,
}

/// Communication sanity check: reads status and thresholds.
pub fn probe<O: OneWireBus>(
    bus: &mut O,
    read_output: bool,
) -> OneWireResult<ProbeReport, O::BusError> {
    let dev = Ds1821::new();
    let status = dev.read_status(bus)?;
    let thresholds = read_thresholds(bus, &dev);
    let output_level = output_level(bus, read_output)?;
    Ok(ProbeReport {
        status,
        thresholds,
        output_level,
    })
}

/// One full conversion cycle.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureReport {
    /// The raw register triple; use
    /// [millidegrees](TemperatureSample::millidegrees) or
    /// [celsius](TemperatureSample::celsius) on it.
    pub sample: TemperatureSample,
    /// Status after the conversion wait. `done == false` means the
    /// conversion may not have finished in time.
    pub status: Status,
    /// Thermostat output level, when requested.
    pub output_level: Option<bool>,
}

/// Starts a conversion, waits it out, and reads the sample.
pub fn read_temperature<O: OneWireBus, D: DelayNs>(
    bus: &mut O,
    delay: &mut D,
    read_output: bool,
) -> OneWireResult<TemperatureReport, O::BusError> {
    let dev = Ds1821::new();
    dev.start_conversion(bus)?;
    delay.delay_ms(CONVERSION_WAIT_MS);

    let status = dev.read_status(bus)?;
    let sample = dev.read_sample(bus)?;
    let output_level = output_level(bus, read_output)?;
    Ok(TemperatureReport {
        sample,
        status,
        output_level,
    })
}

/// Flat per-sensor snapshot for periodic collection.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    /// High-resolution temperature in millidegrees Celsius.
    pub millidegrees: i32,
    /// THF alarm flag.
    pub high_alarm: bool,
    /// TLF alarm flag.
    pub low_alarm: bool,
    /// Thresholds (TH, TL), if readable.
    pub thresholds: Option<(i8, i8)>,
    /// Thermostat output level, when requested.
    pub output_level: Option<bool>,
}

/// Runs a conversion and gathers temperature, alarms and thresholds.
pub fn full_status<O: OneWireBus, D: DelayNs>(
    bus: &mut O,
    delay: &mut D,
    read_output: bool,
) -> OneWireResult<Snapshot, O::BusError> {
    let report = read_temperature(bus, delay, read_output)?;
    let thresholds = read_thresholds(bus, &Ds1821::new());
    Ok(Snapshot {
        millidegrees: report.sample.millidegrees(),
        high_alarm: report.status.high_alarm(),
        low_alarm: report.status.low_alarm(),
        thresholds,
        output_level: report.output_level,
    })
}

/// Which alarm threshold to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    /// TH, the high-alarm threshold.
    High,
    /// TL, the low-alarm threshold.
    Low,
}

/// Outcome of a threshold write.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdReport {
    /// (TH, TL) before the write.
    pub previous: (i8, i8),
    /// (TH, TL) read back after the write.
    pub current: (i8, i8),
    /// TL >= TH after the write: the thermostat cannot operate usefully.
    /// Reported, never rejected.
    pub inverted: bool,
}

/// Writes one threshold and verifies both by read-back.
pub fn set_threshold<O: OneWireBus, D: DelayNs>(
    bus: &mut O,
    delay: &mut D,
    kind: ThresholdKind,
    degrees: i8,
) -> OneWireResult<ThresholdReport, O::BusError> {
    let dev = Ds1821::new();
    let previous = (dev.read_high_threshold(bus)?, dev.read_low_threshold(bus)?);

    match kind {
        ThresholdKind::High => dev.write_high_threshold(bus, delay, degrees)?,
        ThresholdKind::Low => dev.write_low_threshold(bus, delay, degrees)?,
    }

    let current = (dev.read_high_threshold(bus)?, dev.read_low_threshold(bus)?);
    Ok(ThresholdReport {
        previous,
        current,
        inverted: current.1 >= current.0,
    })
}

fn read_thresholds<O: OneWireBus>(bus: &mut O, dev: &Ds1821) -> Option<(i8, i8)> {
    let th = dev.read_high_threshold(bus).ok()?;
    let tl = dev.read_low_threshold(bus).ok()?;
    Some((th, tl))
}

fn output_level<O: OneWireBus>(
    bus: &mut O,
    read_output: bool,
) -> OneWireResult<Option<bool>, O::BusError> {
    if read_output {
        bus.line_level().map(Some)
    } else {
        Ok(None)
    }
}
