use crate::{OneWireBus, OneWireError, OneWireResult, RomCode, rom::SEARCH_ROM_CMD};

/// Binary-tree Search-ROM enumeration over a 1-Wire bus.
///
/// Each [next](RomSearch::next) call runs one pass of the discrepancy
/// algorithm: for every one of the 64 bit positions the master reads the
/// bit and its complement from all still-responding devices, picks a
/// branch, and writes the choice back, which electrically silences every
/// device that disagrees. Discrepancies are explored 0-branch first, so
/// repeated enumerations are deterministic and ordered.
///
/// Unlike an enumeration of well-behaved addressable devices, the codes
/// yielded here are *not* filtered: ROM-less thermostat-mode devices on
/// the same line answer every branch at once and synthesize phantom codes
/// that fail CRC or carry family `0x00`. Those are reported as-is; use
/// [RomCode::is_valid] to tell them apart from genuine discoveries.
pub struct RomSearch<'a, T> {
    bus: &'a mut T,
    last_discrepancy: u8,
    finished: bool,
    rom: [u8; 8],
}

impl<'a, T> RomSearch<'a, T> {
    /// Starts a fresh enumeration on `bus`.
    pub fn new(bus: &'a mut T) -> Self {
        Self {
            bus,
            last_discrepancy: 0,
            finished: false,
            rom: [0; 8],
        }
    }
}

impl<T: OneWireBus> RomSearch<'_, T> {
    /// Runs one search pass and returns the next discovered code.
    ///
    /// Returns `Ok(None)` once the tree is exhausted or when no device
    /// answers the search command at all. A missing presence pulse is a
    /// hard failure, like everywhere else.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> OneWireResult<Option<RomCode>, T::BusError> {
        if self.finished {
            return Ok(None);
        }
        if !self.bus.reset()? {
            return Err(OneWireError::NoDevicePresent);
        }
        self.bus.write_byte(SEARCH_ROM_CMD)?;

        let mut id_bit_num: u8 = 1;
        let mut last_zero: u8 = 0;
        let mut idx: usize = 0;
        let mut rom_mask: u8 = 1;

        loop {
            let id_bit = self.bus.read_bit()?;
            let complement_bit = self.bus.read_bit()?;

            if id_bit && complement_bit {
                // Nobody is responding on this branch.
                self.finished = true;
                return Ok(None);
            }

            let dir = if id_bit != complement_bit {
                // All remaining devices agree on this bit.
                id_bit
            } else if id_bit_num < self.last_discrepancy {
                // Replay the choice of the previous pass.
                self.rom[idx] & rom_mask != 0
            } else {
                // At the previous pass's deepest discrepancy take the 1
                // branch now; at a deeper, new discrepancy take 0 first.
                id_bit_num == self.last_discrepancy
            };

            if !id_bit && !complement_bit && !dir {
                last_zero = id_bit_num;
            }

            if dir {
                self.rom[idx] |= rom_mask;
            } else {
                self.rom[idx] &= !rom_mask;
            }
            self.bus.write_bit(dir)?;

            id_bit_num += 1;
            rom_mask <<= 1;
            if rom_mask == 0 {
                idx += 1;
                rom_mask = 1;
            }
            if id_bit_num > 64 {
                break;
            }
        }

        self.last_discrepancy = last_zero;
        if self.last_discrepancy == 0 {
            self.finished = true;
        }
        Ok(Some(RomCode::from_bytes(self.rom)))
    }
}
