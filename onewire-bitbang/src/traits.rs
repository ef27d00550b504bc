use crate::OneWireResult;

/// Trait for a 1-Wire bus master.
///
/// Defines the reset/presence handshake and the single-bit primitives,
/// plus LSB-first byte framing built on top of them. All operations are
/// synchronous and blocking; none may be interrupted mid-slot.
pub trait OneWireBus {
    /// The error type of the underlying line hardware.
    type BusError;

    /// Issues a reset pulse and samples for a presence pulse.
    ///
    /// Returns `true` if at least one device pulled the line low in the
    /// presence window. A reset must precede every command exchange;
    /// deciding whether a missing presence pulse is fatal is the
    /// caller's business, so no error is raised here.
    fn reset(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes a single bit time slot.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError>;

    /// Initiates a read time slot and returns the sampled bit.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Samples the released line outside of any time slot.
    ///
    /// Used to observe a device output level that shares the data pin
    /// (the DS1821 thermostat output, for instance). `true` means high.
    fn line_level(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes a byte, least-significant bit first.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        Ok(())
    }

    /// Reads a byte, least-significant bit first.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }
}
