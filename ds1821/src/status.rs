use bitfield_struct::bitfield;

/// DS1821 status/configuration register.
///
/// On a bus shared by several thermostat-mode devices a broadcast read
/// returns the bitwise AND of all their registers; the value then belongs
/// to no single device.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Status {
    /// 1SHOT: one conversion per Start-Convert command instead of
    /// continuous conversion. In one-shot mode the part also joins the
    /// 1-Wire ROM protocol after a power cycle.
    pub one_shot: bool,
    /// POL: thermostat output active level.
    pub output_polarity: bool,
    #[bits(2)]
    reserved: u8,
    /// NVB: an EEPROM write is in progress.
    pub eeprom_busy: bool,
    /// TLF: temperature crossed the low threshold since the flag was
    /// last cleared.
    pub low_alarm: bool,
    /// THF: temperature crossed the high threshold since the flag was
    /// last cleared.
    pub high_alarm: bool,
    /// DONE: the current conversion has finished.
    pub done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_layout_matches_datasheet() {
        assert_eq!(Status::new().with_one_shot(true).into_bits(), 0x01);
        assert_eq!(Status::new().with_output_polarity(true).into_bits(), 0x02);
        assert_eq!(Status::new().with_eeprom_busy(true).into_bits(), 0x10);
        assert_eq!(Status::new().with_low_alarm(true).into_bits(), 0x20);
        assert_eq!(Status::new().with_high_alarm(true).into_bits(), 0x40);
        assert_eq!(Status::new().with_done(true).into_bits(), 0x80);
    }

    #[test]
    fn roundtrips_raw_bytes() {
        let s = Status::from_bits(0b1010_0001);
        assert!(s.done() && s.low_alarm() && s.one_shot());
        assert!(!s.high_alarm() && !s.output_polarity());
        assert_eq!(s.into_bits(), 0b1010_0001);
    }
}
