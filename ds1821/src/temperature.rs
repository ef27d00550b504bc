/// Raw register triple of one temperature conversion.
///
/// The DS1821 exposes a whole-degree reading plus the internal slope
/// accumulator counters that allow the datasheet's high-resolution
/// correction. Samples are produced fresh per read and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperatureSample {
    /// Temperature register, 1 LSB = 1 °C.
    pub raw: i8,
    /// COUNT_REMAIN register.
    pub count_remain: u8,
    /// COUNT_PER_C register. A reported 0 is treated as 1.
    pub count_per_c: u8,
}

impl TemperatureSample {
    fn slope(&self) -> i32 {
        // Guard the datasheet formula against a bogus zero readout.
        if self.count_per_c == 0 { 1 } else { self.count_per_c as i32 }
    }

    /// High-resolution value in millidegrees Celsius.
    ///
    /// `T*1000 - 250 + ((C - R)*1000)/C` with truncating integer
    /// division. Not defined to round-trip exactly against
    /// [celsius](Self::celsius); the two formulas are evaluated
    /// independently.
    pub fn millidegrees(&self) -> i32 {
        let c = self.slope();
        self.raw as i32 * 1000 - 250 + ((c - self.count_remain as i32) * 1000) / c
    }

    /// High-resolution value in degrees Celsius.
    ///
    /// `T - 0.25 + (C - R)/C`, the real-valued datasheet formula.
    pub fn celsius(&self) -> f32 {
        let c = self.slope() as f32;
        self.raw as f32 - 0.25 + (c - self.count_remain as f32) / c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datasheet_example() {
        let sample = TemperatureSample {
            raw: 20,
            count_remain: 10,
            count_per_c: 16,
        };
        assert_eq!(sample.celsius(), 20.125);
        assert_eq!(sample.millidegrees(), 20_125);
    }

    #[test]
    fn zero_slope_is_substituted() {
        let sample = TemperatureSample {
            raw: 20,
            count_remain: 0,
            count_per_c: 0,
        };
        // C treated as 1: T - 0.25 + 1/1
        assert_eq!(sample.celsius(), 20.75);
        assert_eq!(sample.millidegrees(), 20_750);
    }

    #[test]
    fn negative_temperatures() {
        let sample = TemperatureSample {
            raw: -25,
            count_remain: 12,
            count_per_c: 16,
        };
        assert_eq!(sample.millidegrees(), -25_000);
        assert_eq!(sample.celsius(), -25.0);
    }
}
