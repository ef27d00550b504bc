use crate::{Crc8, OneWireBus, OneWireError, OneWireResult};
use core::fmt;

/// Command to read the ROM code of the single device on the bus.
pub const READ_ROM_CMD: u8 = 0x33;

/// Command to skip ROM addressing and select every device on the bus.
pub const SKIP_ROM_CMD: u8 = 0xcc;

/// Command to start a Search-ROM pass.
pub const SEARCH_ROM_CMD: u8 = 0xf0;

/// An 8-byte 1-Wire ROM code: family byte, 48-bit serial, CRC-8.
///
/// A code is only *valid* when the CRC over the first seven bytes equals
/// the eighth and the family byte is non-zero. Anything else is a phantom
/// produced by ROM-less devices colliding on a shared open-drain bus, and
/// is carried as data so callers can report it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RomCode([u8; 8]);

impl RomCode {
    /// Wraps raw bytes as read off the bus.
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// The raw code bytes.
    pub const fn bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// The device family byte.
    pub const fn family(&self) -> u8 {
        self.0[0]
    }

    /// The 48-bit serial number portion.
    pub fn serial(&self) -> &[u8] {
        &self.0[1..7]
    }

    /// Whether the trailing CRC byte matches the first seven bytes.
    pub fn crc_ok(&self) -> bool {
        Crc8::validate(&self.0)
    }

    /// A genuine address: CRC intact and a non-zero family byte.
    pub fn is_valid(&self) -> bool {
        self.crc_ok() && self.family() != 0x00
    }

    /// The code as a little-endian 64-bit integer.
    pub fn as_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    /// Human-readable name for well-known temperature sensor families.
    pub fn family_name(&self) -> Option<&'static str> {
        match self.family() {
            0x22 => Some("DS1822 / DS1821 in 1-Wire mode"),
            0x10 => Some("DS18S20"),
            0x28 => Some("DS18B20"),
            0x3b => Some("DS1825"),
            0x42 => Some("DS28EA00"),
            0x00 => Some("family 0, thermostat-mode collision"),
            _ => None,
        }
    }
}

impl fmt::Display for RomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Reads the ROM code of the device on the bus.
///
/// Only meaningful with exactly one addressable device present: with
/// several, their simultaneous replies AND together into a code that
/// fails [RomCode::is_valid], which is the caller's cue to fall back to
/// [RomSearch](crate::RomSearch).
pub fn read_rom<O: OneWireBus>(bus: &mut O) -> OneWireResult<RomCode, O::BusError> {
    if !bus.reset()? {
        return Err(OneWireError::NoDevicePresent);
    }
    bus.write_byte(READ_ROM_CMD)?;
    let mut rom = [0u8; 8];
    for b in rom.iter_mut() {
        *b = bus.read_byte()?;
    }
    Ok(RomCode::from_bytes(rom))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_crc(mut rom: [u8; 8]) -> RomCode {
        rom[7] = Crc8::compute(&rom[..7]);
        RomCode::from_bytes(rom)
    }

    #[test]
    fn validity_requires_crc_and_family() {
        let good = with_crc([0x22, 1, 2, 3, 4, 5, 6, 0]);
        assert!(good.crc_ok() && good.is_valid());

        let phantom_family = with_crc([0x00, 1, 2, 3, 4, 5, 6, 0]);
        assert!(phantom_family.crc_ok());
        assert!(!phantom_family.is_valid());

        let mut bad = *good.bytes();
        bad[3] ^= 0x10;
        assert!(!RomCode::from_bytes(bad).is_valid());
    }

    #[test]
    fn display_is_plain_hex() {
        let rom = RomCode::from_bytes([0x22, 0xab, 0, 0, 0, 0, 0, 0x5c]);
        assert_eq!(std::format!("{rom}"), "22AB00000000005C");
    }
}
