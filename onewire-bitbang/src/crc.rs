/// Calculate the CRC-8 used in 1-Wire ROM codes.
///
/// Bitwise accumulation with the reflected polynomial `0x8c`
/// (x^8 + x^5 + x^4 + 1).
#[derive(Debug, Default)]
pub struct Crc8(u8);

impl Crc8 {
    /// Get the current CRC value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Update the CRC with the incoming byte.
    pub fn update(&mut self, byte: u8) {
        let mut crc = self.0 ^ byte;
        for _ in 0..8 {
            if crc & 0x1 == 0x1 {
                crc = (crc >> 1) ^ 0x8c;
            } else {
                crc >>= 1;
            }
        }
        self.0 = crc;
    }

    /// Compute the CRC of a byte slice in one go.
    pub fn compute(data: &[u8]) -> u8 {
        let mut crc = Crc8::default();
        for &byte in data {
            crc.update(byte);
        }
        crc.0
    }

    /// Validate a sequence whose last byte is the CRC of the preceding
    /// bytes. Feeding the check byte through the register leaves zero
    /// exactly when it matches.
    pub fn validate(sequence: &[u8]) -> bool {
        Crc8::compute(sequence) == 0x0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn deterministic() {
        let body = [0x22, 0xde, 0xad, 0xbe, 0xef, 0x01, 0x02];
        assert_eq!(Crc8::compute(&body), Crc8::compute(&body));
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(Crc8::compute(&[]), 0);
    }

    #[test]
    fn appended_check_byte_validates() {
        let mut rng = rand::rng();
        for _ in 0..32 {
            let mut rom = [0u8; 8];
            rng.fill(&mut rom[..7]);
            rom[7] = Crc8::compute(&rom[..7]);
            assert!(Crc8::validate(&rom));
        }
    }

    #[test]
    fn single_bit_flip_invalidates() {
        let mut rom = [0x22, 0x31, 0x41, 0x59, 0x26, 0x53, 0x58, 0x00];
        rom[7] = Crc8::compute(&rom[..7]);
        for byte in 0..7 {
            for bit in 0..8 {
                let mut bad = rom;
                bad[byte] ^= 1 << bit;
                assert!(!Crc8::validate(&bad), "flip {byte}/{bit} went unnoticed");
            }
        }
    }

    #[test]
    fn all_zero_rom_passes_crc() {
        // The AND-collapsed output of colliding ROM-less devices; the CRC
        // alone cannot reject it, which is why family 0x00 is checked too.
        assert!(Crc8::validate(&[0u8; 8]));
    }
}
