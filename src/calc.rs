use crate::{Measurement, Pressure, RawSample, Temperature};

/// Size of the coefficient block at `COEF` (0x10..=0x21).
pub(crate) const CALIBRATION_SIZE: usize = 18;

/// Factory calibration coefficients.
///
/// Every chip is trimmed individually; the values are read once after a
/// reset and feed the compensation polynomial (datasheet section 4.9).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub c0: i32,
    pub c1: i32,
    pub c00: i32,
    pub c10: i32,
    pub c01: i32,
    pub c11: i32,
    pub c20: i32,
    pub c21: i32,
    pub c30: i32,
}

impl Calibration {
    /// Unpacks the 18-byte coefficient block.
    ///
    /// `c0`/`c1` are 12-bit, `c00`/`c10` 20-bit and the rest big-endian
    /// 16-bit fields, all two's complement.
    pub fn from_bytes(bytes: &[u8; CALIBRATION_SIZE]) -> Self {
        let b = bytes.map(u32::from);
        let be16 = |i: usize| (b[i] << 8) | b[i + 1];

        Calibration {
            c0: twos_complement((b[0] << 4) | (b[1] >> 4), 12),
            c1: twos_complement(((b[1] & 0x0F) << 8) | b[2], 12),
            c00: twos_complement((b[3] << 12) | (b[4] << 4) | (b[5] >> 4), 20),
            c10: twos_complement(((b[5] & 0x0F) << 16) | (b[6] << 8) | b[7], 20),
            c01: twos_complement(be16(8), 16),
            c11: twos_complement(be16(10), 16),
            c20: twos_complement(be16(12), 16),
            c21: twos_complement(be16(14), 16),
            c30: twos_complement(be16(16), 16),
        }
    }

    /// Compensated temperature in °C from the scaled raw temperature.
    pub fn temperature(&self, scaled_temp: f32) -> f32 {
        scaled_temp * self.c1 as f32 + self.c0 as f32 / 2.0
    }

    /// Compensated pressure in Pa from the scaled raw pressure and temperature.
    pub fn pressure(&self, scaled_pressure: f32, scaled_temp: f32) -> f32 {
        let p = scaled_pressure;
        self.c00 as f32
            + p * (self.c10 as f32 + p * (self.c20 as f32 + p * self.c30 as f32))
            + scaled_temp * (self.c01 as f32 + p * (self.c11 as f32 + p * self.c21 as f32))
    }

    /// Turns a raw sample into physical values using the channel scale factors.
    pub fn compensate(&self, raw: RawSample, temp_scale: i32, pressure_scale: i32) -> Measurement {
        let scaled_temp = raw.temperature as f32 / temp_scale as f32;
        let temperature = self.temperature(scaled_temp);

        // Scaled raw pressure, then the compensated value built from it.
        let mut pressure = raw.pressure as f32 / pressure_scale as f32;
        pressure = self.pressure(pressure, scaled_temp);

        Measurement {
            scaled_raw_temperature: scaled_temp,
            temperature: Temperature(temperature),
            pressure: Pressure(pressure),
        }
    }
}

/// Interprets the low `bits` bits of `value` as a two's-complement number.
pub(crate) fn twos_complement(value: u32, bits: u8) -> i32 {
    let mut ret = value as i32;
    if value & (1 << (bits - 1)) != 0 {
        ret -= 1 << bits;
    }
    ret
}

/// Sign-extends a big-endian 24-bit register triple.
pub(crate) fn raw_24(bytes: [u8; 3]) -> i32 {
    let [msb, lsb, xlsb] = bytes.map(u32::from);
    twos_complement((msb << 16) | (lsb << 8) | xlsb, 24)
}

/// Altitude in metres for `pressure_hpa` relative to `sea_level_hpa`.
pub(crate) fn altitude(pressure_hpa: f32, sea_level_hpa: f32) -> f32 {
    44330.0 * (1.0 - libm::powf(pressure_hpa / sea_level_hpa, 0.1903))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COEFFICIENTS: [u8; CALIBRATION_SIZE] = [
        0x0C, 0xBE, 0xFC, 0x13, 0xD9, 0xAF, 0x2B, 0x34, 0xF3, 0xF7, 0x04, 0xFF, 0xDA, 0x5A, 0x00,
        0x0A, 0xFB, 0x1B,
    ];

    #[test]
    fn decodes_coefficient_block() {
        let calib = Calibration::from_bytes(&COEFFICIENTS);
        assert_eq!(
            calib,
            Calibration {
                c0: 203,
                c1: -260,
                c00: 81306,
                c10: -54476,
                c01: -3081,
                c11: 1279,
                c20: -9638,
                c21: 10,
                c30: -1253,
            }
        );
        assert_eq!(Calibration::from_bytes(&COEFFICIENTS), calib);
    }

    #[test]
    fn decodes_extreme_fields() {
        let calib = Calibration::from_bytes(&[
            0x80, 0x07, 0xFF, 0x80, 0x00, 0x07, 0xFF, 0xFF, 0x80, 0x00, 0x7F, 0xFF, 0x00, 0x00,
            0x00, 0x00, 0xFF, 0xFF,
        ]);
        assert_eq!(calib.c0, -2048);
        assert_eq!(calib.c1, 2047);
        assert_eq!(calib.c00, -524288);
        assert_eq!(calib.c10, 524287);
        assert_eq!(calib.c01, -32768);
        assert_eq!(calib.c11, 32767);
        assert_eq!(calib.c30, -1);
    }

    #[test]
    fn twos_complement_stays_in_range() {
        for bits in [12u8, 16, 20, 24] {
            let half = 1i32 << (bits - 1);
            for value in [0u32, 1, (half - 1) as u32, half as u32, (1u32 << bits) - 1] {
                let signed = twos_complement(value, bits);
                assert!(signed >= -half && signed < half, "{bits} bits: {value} -> {signed}");
            }
        }
        assert_eq!(twos_complement(0x800, 12), -2048);
        assert_eq!(twos_complement(0x7FF, 12), 2047);
    }

    #[test]
    fn raw_24_sign_extends() {
        assert_eq!(raw_24([0x00, 0x00, 0x01]), 1);
        assert_eq!(raw_24([0x7F, 0xFF, 0xFF]), 8_388_607);
        assert_eq!(raw_24([0xFF, 0xFF, 0xFF]), -1);
        assert_eq!(raw_24([0x80, 0x00, 0x00]), -8_388_608);
    }

    #[test]
    fn temperature_uses_c1_and_half_c0() {
        let calib = Calibration {
            c1: 1_000_000,
            ..Default::default()
        };
        let raw = RawSample {
            pressure: 0,
            temperature: 1_040_384,
        };
        let m = calib.compensate(raw, 1_040_384, 1_040_384);
        assert_eq!(m.scaled_raw_temperature, 1.0);
        assert_eq!(m.temperature.0, 1_000_000.0);
    }

    #[test]
    fn pressure_is_c00_without_pressure_terms() {
        let calib = Calibration {
            c0: 40,
            c1: -260,
            c00: 100_000,
            ..Default::default()
        };
        for temperature in [-500_000, 0, 1_040_384] {
            let raw = RawSample {
                pressure: 0,
                temperature,
            };
            let m = calib.compensate(raw, 1_040_384, 1_040_384);
            assert_eq!(m.pressure.0, 100_000.0);
        }
    }

    #[test]
    fn full_polynomial() {
        let calib = Calibration::from_bytes(&COEFFICIENTS);
        let raw = RawSample {
            pressure: 0,
            temperature: 1_040_384,
        };
        let m = calib.compensate(raw, 1_040_384, 1_040_384);
        assert_eq!(m.temperature.0, -158.5);
        assert_eq!(m.pressure.0, 78225.0);
        assert_eq!(m.pressure.as_hpa(), 782.25);
    }

    #[test]
    fn altitude_at_reference_is_zero() {
        assert!(altitude(1013.25, 1013.25).abs() < 1e-3);
        assert!(altitude(900.0, 1013.25) > 900.0);
    }
}
