use crate::Milliseconds;

/// Compensation scale factors indexed by oversampling setting (datasheet table 9).
static SCALE_FACTORS: [i32; 8] = [
    524288, 1572864, 3670016, 7864320, 253952, 516096, 1040384, 2088960,
];

/// Measurement rate of a channel in background mode.
///
/// Stored in bits 6:4 of `PRS_CFG` / `TMP_CFG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Rate {
    #[default]
    Hz1 = 0,
    Hz2 = 1,
    Hz4 = 2,
    Hz8 = 3,
    Hz16 = 4,
    Hz32 = 5,
    Hz64 = 6,
    Hz128 = 7,
}

/// Number of ADC samples averaged into one result.
///
/// Higher oversampling lowers the noise but lengthens each measurement. Above
/// `X8` the raw result no longer fits the 24-bit register unless the hardware
/// shift for the channel is enabled, which the driver does automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversampling {
    #[default]
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
    X32 = 5,
    X64 = 6,
    X128 = 7,
}

impl Oversampling {
    /// Divisor that turns a raw result into the scaled value used by the
    /// compensation polynomial.
    pub fn scale_factor(self) -> i32 {
        SCALE_FACTORS[self as usize]
    }

    /// `true` if the result needs the hardware bit shift (more than 8 samples).
    pub fn requires_shift(self) -> bool {
        self > Oversampling::X8
    }
}

/// Operating mode written to bits 2:0 of `MEAS_CFG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// No measurements.
    Idle = 0b000,
    /// Single pressure measurement, then back to idle.
    OneShotPressure = 0b001,
    /// Single temperature measurement, then back to idle.
    OneShotTemperature = 0b010,
    /// Background pressure measurements at the configured rate.
    ContinuousPressure = 0b101,
    /// Background temperature measurements at the configured rate.
    ContinuousTemperature = 0b110,
    /// Background pressure and temperature measurements.
    ContinuousBoth = 0b111,
}

/// The two measurement channels of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Pressure,
    Temperature,
}

/// Rate and oversampling of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub rate: Rate,
    pub oversampling: Oversampling,
}

impl ChannelConfig {
    /// 64 measurements per second, 64 samples each.
    pub const HIGH_PRECISION: Self = Self {
        rate: Rate::Hz64,
        oversampling: Oversampling::X64,
    };

    /// Pairs a measurement rate with an oversampling setting.
    pub fn new(rate: Rate, oversampling: Oversampling) -> Self {
        Self { rate, oversampling }
    }

    /// Scale factor of the configured oversampling.
    pub fn scale_factor(&self) -> i32 {
        self.oversampling.scale_factor()
    }

    /// `true` if the channel's result shift bit must be set.
    pub fn shift_enabled(&self) -> bool {
        self.oversampling.requires_shift()
    }

    /// Rate and oversampling fields packed as they appear in `PRS_CFG` / `TMP_CFG`.
    pub(crate) fn register_bits(&self) -> u8 {
        ((self.rate as u8) << 4) | (self.oversampling as u8)
    }
}

/// Driver configuration applied by [`Dps310::init`](crate::Dps310::init).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Pressure channel setup.
    pub pressure: ChannelConfig,
    /// Temperature channel setup.
    pub temperature: ChannelConfig,
    /// Upper bound for every status poll (reset, coefficients, first sample).
    pub timeout: Milliseconds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pressure: ChannelConfig::HIGH_PRECISION,
            temperature: ChannelConfig::HIGH_PRECISION,
            timeout: Milliseconds(5000),
        }
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from [`Config::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets rate and oversampling for the pressure channel.
    pub fn pressure(mut self, rate: Rate, oversampling: Oversampling) -> Self {
        self.config.pressure = ChannelConfig::new(rate, oversampling);
        self
    }

    /// Sets rate and oversampling for the temperature channel.
    pub fn temperature(mut self, rate: Rate, oversampling: Oversampling) -> Self {
        self.config.temperature = ChannelConfig::new(rate, oversampling);
        self
    }

    /// Sets the bound for status polling.
    pub fn timeout(mut self, timeout: Milliseconds) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_factor_table() {
        assert_eq!(Oversampling::X1.scale_factor(), 524288);
        assert_eq!(Oversampling::X8.scale_factor(), 7864320);
        assert_eq!(Oversampling::X16.scale_factor(), 253952);
        assert_eq!(Oversampling::X64.scale_factor(), 1040384);
        assert_eq!(Oversampling::X128.scale_factor(), 2088960);
    }

    #[test]
    fn shift_only_above_eight_samples() {
        let low = [Oversampling::X1, Oversampling::X2, Oversampling::X4, Oversampling::X8];
        let high = [
            Oversampling::X16,
            Oversampling::X32,
            Oversampling::X64,
            Oversampling::X128,
        ];
        assert!(low.iter().all(|os| !os.requires_shift()));
        assert!(high.iter().all(|os| os.requires_shift()));
    }

    #[test]
    fn register_bits_pack_rate_and_oversampling() {
        assert_eq!(ChannelConfig::HIGH_PRECISION.register_bits(), 0x66);
        assert_eq!(ChannelConfig::new(Rate::Hz128, Oversampling::X1).register_bits(), 0x70);
        assert_eq!(ChannelConfig::new(Rate::Hz1, Oversampling::X128).register_bits(), 0x07);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = ConfigBuilder::new()
            .pressure(Rate::Hz8, Oversampling::X8)
            .timeout(Milliseconds(100))
            .build();

        assert_eq!(config.pressure, ChannelConfig::new(Rate::Hz8, Oversampling::X8));
        assert_eq!(config.temperature, ChannelConfig::HIGH_PRECISION);
        assert_eq!(config.timeout, Milliseconds(100));
    }
}
