use crate::{BusLine, OneWireBus, OneWireResult};
use embedded_hal::delay::DelayNs;

// Standard-speed slot timing per Maxim AN126 / DS1821 datasheet, in µs.
const RESET_LOW_US: u32 = 480; // master holds the line low
const RESET_SAMPLE_US: u32 = 70; // presence sample point after release
const RESET_TAIL_US: u32 = 410; // remainder of the reset window

const WRITE1_LOW_US: u32 = 6; // write-1: short low pulse
const WRITE1_RELEASE_US: u32 = 64; // write-1: release for rest of slot
const WRITE0_LOW_US: u32 = 60; // write-0: long low pulse
const WRITE0_RELEASE_US: u32 = 10; // write-0: release, recovery

const READ_INIT_US: u32 = 6; // read slot initiation pulse
const READ_SAMPLE_US: u32 = 9; // sample point after release
const READ_SLOT_US: u32 = 55; // total read slot time

const RECOVERY_US: u32 = 2; // inter-slot recovery

/// A bit-banged 1-Wire bus master.
///
/// Owns the data [BusLine] and a [DelayNs] timer and schedules the
/// microsecond drive/release/sample sequences of standard-speed 1-Wire
/// signaling. The timing contract is soft real-time: the delay primitive's
/// granularity and the host's scheduling jitter bound the achievable
/// accuracy, and gross jitter can corrupt bits on a real line.
pub struct BitBangMaster<P, D> {
    line: P,
    delay: D,
}

impl<P: BusLine, D: DelayNs> BitBangMaster<P, D> {
    /// Creates a master over `line`, releasing it into the idle state.
    pub fn new(mut line: P, delay: D) -> Result<Self, P::Error> {
        line.release()?;
        Ok(Self { line, delay })
    }

    /// Consumes the master and hands back the line and timer.
    pub fn free(self) -> (P, D) {
        (self.line, self.delay)
    }
}

impl<P: BusLine, D: DelayNs> OneWireBus for BitBangMaster<P, D> {
    type BusError = P::Error;

    fn reset(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.line.drive_low()?;
        self.delay.delay_us(RESET_LOW_US);

        self.line.release()?;
        self.delay.delay_us(RESET_SAMPLE_US);

        // A device holding the line low here is the presence pulse.
        let presence = self.line.is_low()?;

        self.delay.delay_us(RESET_TAIL_US);
        Ok(presence)
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        let (low, release) = if bit {
            (WRITE1_LOW_US, WRITE1_RELEASE_US)
        } else {
            (WRITE0_LOW_US, WRITE0_RELEASE_US)
        };
        self.line.drive_low()?;
        self.delay.delay_us(low);
        self.line.release()?;
        self.delay.delay_us(release);
        self.delay.delay_us(RECOVERY_US);
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.line.drive_low()?;
        self.delay.delay_us(READ_INIT_US);

        self.line.release()?;
        self.delay.delay_us(READ_SAMPLE_US);
        let bit = !self.line.is_low()?;

        self.delay.delay_us(READ_SLOT_US - READ_INIT_US - READ_SAMPLE_US);
        self.delay.delay_us(RECOVERY_US);
        Ok(bit)
    }

    fn line_level(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.line.release()?;
        Ok(!self.line.is_low()?)
    }
}
