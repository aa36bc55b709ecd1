//! Pure unit conversions between DSP register counts and physical units.
//!
//! These are used by both the setters and the getters in the acquisition
//! layer and must stay bit-exact: the cache stores the value reconstructed
//! from the register, not the user's raw request.

use crate::constants::DB_PER_LSB;

/// Rounds to the nearest integer, halves away from zero. All register math
/// goes through this so conversions stay bit-exact across setters and
/// getters.
pub fn round(x: f64) -> f64 {
    if x < 0.0 {
        (x - 0.5).ceil()
    } else {
        (x + 0.5).floor()
    }
}

/// Linear gain to decibels.
pub fn linear_to_db(linear: f64) -> f64 {
    20.0 * linear.log10()
}

/// Decibels to linear gain.
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Encodes a linear gain into the 16-bit gain DAC register (40 dB span).
pub fn gain_to_register(linear: f64) -> u16 {
    let reg = round(linear_to_db(linear) / DB_PER_LSB);
    reg.clamp(0.0, 65535.0) as u16
}

/// Decodes the 16-bit gain DAC register back into linear gain.
pub fn register_to_gain(register: u16) -> f64 {
    db_to_linear(register as f64 * DB_PER_LSB)
}

/// Encodes a linear gain trim into the offset-binary gaintweak register.
/// Zero dB sits at mid scale (0x8000).
pub fn gain_trim_to_register(linear: f64) -> u16 {
    let reg = round(linear_to_db(linear) / DB_PER_LSB + 32768.0);
    reg.clamp(0.0, 65535.0) as u16
}

/// Decodes the gaintweak register back into a linear trim.
pub fn register_to_gain_trim(register: u16) -> f64 {
    db_to_linear((register as f64 - 32768.0) * DB_PER_LSB)
}

/// Digital sub-gain register pair: a binary exponent plus a mantissa in
/// `[1, 2)` scaled to 14 bits. The exponent is `floor(log2(x))`, so the
/// decomposition is exact to one mantissa LSB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalGain {
    pub exponent: i8,
    pub mantissa: u16,
}

/// Mantissa scale: 1.0 maps to 0x4000.
const MANTISSA_ONE: f64 = 16384.0;

impl DigitalGain {
    pub fn from_linear(x: f64) -> DigitalGain {
        debug_assert!(x > 0.0);
        let exponent = x.log2().floor() as i8;
        let mantissa = round(x / 2f64.powi(exponent as i32) * MANTISSA_ONE) as u16;
        DigitalGain { exponent, mantissa }
    }

    pub fn to_linear(self) -> f64 {
        self.mantissa as f64 / MANTISSA_ONE * 2f64.powi(self.exponent as i32)
    }
}

/// Energy filter clock tick in microseconds: `2^decimation / clock_mhz`.
/// The decimation is a live DSP parameter, so this conversion is
/// state-dependent at the call site.
pub fn filter_tick_us(decimation: u16, clock_mhz: f64) -> f64 {
    debug_assert!(clock_mhz > 0.0);
    2f64.powi(decimation as i32) / clock_mhz
}

/// Trigger filter tick: the fast filter runs off the undecimated clock.
pub fn base_tick_us(clock_mhz: f64) -> f64 {
    debug_assert!(clock_mhz > 0.0);
    1.0 / clock_mhz
}

/// Converts microseconds to filter clock ticks, rounded.
pub fn us_to_ticks(us: f64, tick_us: f64) -> f64 {
    round(us / tick_us)
}

/// Converts filter clock ticks back to microseconds.
pub fn ticks_to_us(ticks: f64, tick_us: f64) -> f64 {
    ticks * tick_us
}

/// Splits a 48-bit little-endian tick counter out of a statistics block.
pub fn u48_le(bytes: &[u8]) -> u64 {
    debug_assert!(bytes.len() >= 6);
    bytes[..6]
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, b)| acc | ((*b as u64) << (8 * i)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn round_matches_c_macro() {
        assert_eq!(round(1.5), 2.0);
        assert_eq!(round(2.4), 2.0);
        assert_eq!(round(-1.5), -2.0);
        assert_eq!(round(0.0), 0.0);
    }

    #[test]
    fn gain_register_round_trip_is_within_one_lsb() {
        for reg in [0u16, 1, 1000, 32767, 65535] {
            let linear = register_to_gain(reg);
            assert_eq!(gain_to_register(linear), reg);
        }
    }

    #[test]
    fn digital_gain_decomposition() {
        let dg = DigitalGain::from_linear(1.0);
        assert_eq!(dg.exponent, 0);
        assert_eq!(dg.mantissa, 0x4000);

        let dg = DigitalGain::from_linear(0.75);
        assert_eq!(dg.exponent, -1);
        assert_relative_eq!(dg.to_linear(), 0.75, max_relative = 1e-4);

        let dg = DigitalGain::from_linear(5.3);
        assert_eq!(dg.exponent, 2);
        assert_relative_eq!(dg.to_linear(), 5.3, max_relative = 1e-4);
    }

    #[test]
    fn filter_tick_depends_on_decimation() {
        assert_relative_eq!(filter_tick_us(0, 32.0), 0.03125);
        assert_relative_eq!(filter_tick_us(4, 32.0), 0.5);
        assert_relative_eq!(filter_tick_us(6, 16.0), 4.0);
    }

    #[test]
    fn u48_counter() {
        assert_eq!(u48_le(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00]), 1);
        assert_eq!(
            u48_le(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
            0xFFFF_FFFF_FFFF
        );
    }
}
