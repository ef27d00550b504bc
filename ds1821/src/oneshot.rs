//! Mode-switch orchestration: rewrite the status register for one-shot /
//! 1-Wire mode, then power-cycle the part so the change takes effect.
//!
//! A broadcast status write reaches every thermostat-mode device on the
//! bus at once, but its verification read is AND-reduced across all of
//! them, so no individual device's success can be confirmed while several
//! share the line. The orchestrator therefore runs an ordered list of
//! write strategies and reports every read-back instead of claiming a
//! per-device guarantee; the power cycle proceeds on that optimistic
//! basis as long as the bus itself kept answering.

use crate::{Ds1821, Status, ops, ops::ProbeReport};
use core::fmt;
use embedded_hal::{delay::DelayNs, digital::OutputPin};
use onewire_bitbang::{OneWireBus, OneWireError, OneWireResult};

/// How long the supply is held off, then back on, during a power cycle.
const POWER_CYCLE_HOLD_MS: u32 = 500;

/// One way of pushing the status write onto the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Plain broadcast, no ROM step (thermostat mode proper).
    Direct,
    /// Skip-ROM prefixed, for devices mid-transition between modes.
    SkipRom,
}

impl WriteStrategy {
    fn device(self) -> Ds1821 {
        match self {
            Self::Direct => Ds1821::new(),
            Self::SkipRom => Ds1821::with_skip_rom(),
        }
    }
}

/// Devices in different states listen to different addressing, and a
/// repeat of the direct write costs little against an AND-ambiguous
/// verification.
const STRATEGIES: [WriteStrategy; 3] = [
    WriteStrategy::Direct,
    WriteStrategy::SkipRom,
    WriteStrategy::Direct,
];

/// One write attempt and what the matching read-back returned.
#[derive(Debug, Clone, Copy)]
pub struct AttemptOutcome {
    /// The strategy used for this attempt.
    pub strategy: WriteStrategy,
    /// Status read back through the same strategy, if the read worked.
    /// AND-combined when several devices share the bus.
    pub readback: Option<Status>,
}

/// Full record of a [set_one_shot_mode] run.
#[derive(Debug, Clone, Copy)]
pub struct OneShotReport {
    /// Status before any write.
    pub before: Status,
    /// The status byte that was written.
    pub target: Status,
    /// Outcome of each strategy in order.
    pub attempts: [AttemptOutcome; 3],
}

impl OneShotReport {
    /// Whether every successful read-back shows the one-shot bit.
    ///
    /// With multiple un-isolated devices this is still only an
    /// AND-combined answer, not a per-device confirmation.
    pub fn looks_programmed(&self) -> bool {
        self.attempts
            .iter()
            .filter_map(|a| a.readback)
            .all(|s| s.one_shot())
    }
}

/// Writes the one-shot status byte through every strategy in turn.
///
/// The target is 1SHOT set, POL and the alarm flags cleared. Each write
/// waits out the EEPROM commit before its verification read.
pub fn set_one_shot_mode<O: OneWireBus, D: DelayNs>(
    bus: &mut O,
    delay: &mut D,
) -> OneWireResult<OneShotReport, O::BusError> {
    let before = Ds1821::new().read_status(bus)?;
    let target = Status::new().with_one_shot(true);

    let mut attempts = [AttemptOutcome {
        strategy: WriteStrategy::Direct,
        readback: None,
    }; 3];
    for (slot, strategy) in attempts.iter_mut().zip(STRATEGIES) {
        let dev = strategy.device();
        dev.write_status(bus, delay, target)?;
        *slot = AttemptOutcome {
            strategy,
            readback: dev.read_status(bus).ok(),
        };
    }

    Ok(OneShotReport {
        before,
        target,
        attempts,
    })
}

/// Cuts the supply via the auxiliary power pin, then restores it.
///
/// The pin is left driven high; if the surrounding GPIO session resets
/// pin state on teardown, the caller must re-assert the level through an
/// independent mechanism afterwards so the device is not left unpowered.
pub fn power_cycle<P: OutputPin, D: DelayNs>(pin: &mut P, delay: &mut D) -> Result<(), P::Error> {
    pin.set_low()?;
    delay.delay_ms(POWER_CYCLE_HOLD_MS);
    pin.set_high()?;
    delay.delay_ms(POWER_CYCLE_HOLD_MS);
    Ok(())
}

/// Failure of the [fix] sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixError<E, PE> {
    /// A bus transaction failed; nothing after it was attempted.
    Bus(OneWireError<E>),
    /// Driving the power pin failed.
    PowerPin(PE),
}

impl<E, PE> From<OneWireError<E>> for FixError<E, PE> {
    fn from(e: OneWireError<E>) -> Self {
        Self::Bus(e)
    }
}

impl<E: fmt::Debug, PE: fmt::Debug> fmt::Display for FixError<E, PE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "{e}"),
            Self::PowerPin(e) => write!(f, "power pin error: {e:?}"),
        }
    }
}

impl<E: fmt::Debug, PE: fmt::Debug> core::error::Error for FixError<E, PE> {}

/// Record of a completed [fix] run.
#[derive(Debug, Clone, Copy)]
pub struct FixReport {
    /// The initial communication sanity check.
    pub probe: ProbeReport,
    /// The status rewrite attempts.
    pub one_shot: OneShotReport,
    /// Whether a power cycle was performed. `false` means no power pin
    /// was configured and the supply must be cycled by hand.
    pub power_cycled: bool,
}

/// The full recovery sequence: probe, set one-shot mode, power-cycle.
///
/// Strictly ordered; a probe or write failure aborts before the power
/// cycle is attempted. A missing power pin skips only that step and is
/// reported in the [FixReport] rather than treated as a bus fault.
pub fn fix<O, P, D>(
    bus: &mut O,
    power: Option<&mut P>,
    delay: &mut D,
) -> Result<FixReport, FixError<O::BusError, P::Error>>
where
    O: OneWireBus,
    P: OutputPin,
    D: DelayNs,
{
    let probe = ops::probe(bus, false)?;
    let one_shot = set_one_shot_mode(bus, delay)?;

    let power_cycled = match power {
        Some(pin) => {
            power_cycle(pin, delay).map_err(FixError::PowerPin)?;
            true
        }
        None => false,
    };

    Ok(FixReport {
        probe,
        one_shot,
        power_cycled,
    })
}
