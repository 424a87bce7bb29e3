#![cfg_attr(not(test), no_std)]

//! # DPS310 Barometric Pressure Sensor Driver
//!
//! A `no_std` driver for the Infineon DPS310, built on `embedded-hal` 1.0.
//! The sensor is reachable over I2C or SPI; the bus is picked when the driver
//! is created.
//!
//! ## Features
//! - **Datasheet Compensation**: Factory coefficients are decoded from the
//!   sensor and applied with the polynomial from the datasheet.
//! - **Configurable Oversampling**: Rate and oversampling per channel, with the
//!   high-oversampling result shift handled automatically.
//! - **Bounded Waits**: Every status poll gives up after [`Config::timeout`].
//! - **Unified Sensor Views**: Per-channel views producing typed events.
//!
//! ## Units
//! - **Temperature**: °C
//! - **Pressure**: Pascal (Pa) -> 101325.0 = 1013.25 hPa
//! - **Altitude**: metres
//!
//! ## Example
//! ```rust, ignore
//! use dps310_driver::{Dps310, DEFAULT_ADDRESS, SEA_LEVEL_HPA};
//!
//! let mut dps = Dps310::new_i2c(i2c, DEFAULT_ADDRESS);
//! dps.init(&mut delay)?;
//!
//! let m = dps.read()?;
//! let altitude = dps.read_altitude(SEA_LEVEL_HPA)?;
//! ```

mod calc;
pub mod interface;
pub mod sensor;
mod settings;

use embedded_hal::{delay::DelayNs, i2c, spi};

pub use calc::Calibration;
pub use interface::{I2cInterface, Interface, SpiInterface, Transport};
pub use sensor::{
    Events, PressureSensor, SensorEvent, SensorInfo, SensorKind, TemperatureSensor,
    UnifiedSensor,
};
pub use settings::{Channel, ChannelConfig, Config, ConfigBuilder, Mode, Oversampling, Rate};

/// I2C address with SDO left floating or pulled high.
pub const DEFAULT_ADDRESS: u8 = 0x77;
/// I2C address with SDO pulled low.
pub const ALTERNATE_ADDRESS: u8 = 0x76;
/// Expected content of the product/revision ID register.
pub const PRODUCT_ID: u8 = 0x10;
/// Standard sea-level pressure in hPa.
pub const SEA_LEVEL_HPA: f32 = 1013.25;

/// Register addresses.
mod regs {
    pub const PRS_B2: u8 = 0x00;
    pub const PRS_CFG: u8 = 0x06;
    pub const TMP_CFG: u8 = 0x07;
    pub const MEAS_CFG: u8 = 0x08;
    pub const CFG_REG: u8 = 0x09;
    pub const RESET: u8 = 0x0C;
    pub const PRODUCT_ID: u8 = 0x0D;
    pub const COEF: u8 = 0x10;
    pub const TMP_COEF_SRCE: u8 = 0x28;

    /// Soft reset command for `RESET`.
    pub const SOFT_RESET: u8 = 0x89;
    /// Pressure result shift bit in `CFG_REG`.
    pub const P_SHIFT: u8 = 2;
    /// Temperature result shift bit in `CFG_REG`.
    pub const T_SHIFT: u8 = 3;
}

/// Status bits in `MEAS_CFG`.
mod status {
    pub const COEF_RDY: u8 = 1 << 7;
    pub const SENSOR_RDY: u8 = 1 << 6;
    pub const TMP_RDY: u8 = 1 << 5;
    pub const PRS_RDY: u8 = 1 << 4;
}

/// Poll intervals in milliseconds.
mod poll {
    /// Time the sensor needs to leave hardware reset.
    pub const RESET_SETTLE: u32 = 10;
    pub const STATUS: u32 = 1;
    pub const FIRST_SAMPLE: u32 = 10;
}

/// Error types for the DPS310 driver.
pub mod error {
    use core::fmt;

    /// Errors that can occur during communication or initialization.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Dps310Error<E> {
        /// The very first bus transaction of `init` failed.
        TransportOpenFailed(E),
        /// A later bus transaction failed.
        Bus(E),
        /// The product ID register did not read `0x10`. Carries the value read.
        DeviceNotFound(u8),
        /// A measurement was requested before `init` completed.
        NotInitialized,
        /// A status bit was not set within the configured timeout.
        Timeout,
    }

    impl<E: fmt::Debug> fmt::Display for Dps310Error<E> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Dps310Error::TransportOpenFailed(e) => write!(f, "bus could not be opened: {e:?}"),
                Dps310Error::Bus(e) => write!(f, "bus error: {e:?}"),
                Dps310Error::DeviceNotFound(id) => {
                    write!(f, "no DPS310 found (product id 0x{id:02X})")
                }
                Dps310Error::NotInitialized => f.write_str("sensor not initialized"),
                Dps310Error::Timeout => f.write_str("timed out waiting for sensor"),
            }
        }
    }

    /// Result type alias for DPS310 operations.
    pub type Result<T, E> = core::result::Result<T, Dps310Error<E>>;
}

use error::Dps310Error;

/// Progress of the initialization sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Nothing has been sent to the sensor yet.
    Uninitialized,
    /// The bus answered.
    BusOpened,
    /// Soft reset finished and the sensor reported ready.
    Reset,
    /// Calibration coefficients were read.
    CalibrationLoaded,
    /// Both channels were configured.
    Configured,
    /// Continuous measurements are running and the first sample is available.
    Running,
    /// The device on the bus is not a DPS310.
    InitFailed,
}

/// Duration wrapper for type-safety. Stored in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Milliseconds(pub u32);

/// Temperature in degrees Celsius.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature(pub f32);

/// Atmospheric pressure in Pascal (Pa).
///
/// # Example
/// A value of `101325.0` represents **1013.25 hPa**.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pressure(pub f32);

impl Pressure {
    /// Converts to hectopascal.
    ///
    /// ```rust
    /// use dps310_driver::Pressure;
    /// assert_eq!(Pressure(101325.0).as_hpa(), 1013.25);
    /// ```
    pub fn as_hpa(&self) -> f32 {
        self.0 / 100.0
    }
}

/// Uncompensated 24-bit results as read from the data registers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub pressure: i32,
    pub temperature: i32,
}

/// Compensated measurement result.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Raw temperature divided by the temperature scale factor.
    pub scaled_raw_temperature: f32,
    pub temperature: Temperature,
    pub pressure: Pressure,
}

/// The main DPS310 driver structure.
///
/// `B` is the register interface: [`I2cInterface`] or [`SpiInterface`].
/// Create it with [`Dps310::new_i2c`] or [`Dps310::new_spi`], then call
/// [`Dps310::init`] before reading measurements.
#[derive(Debug)]
pub struct Dps310<B> {
    bus: B,
    config: Config,
    state: State,
    product_id: Option<u8>,
    calib_data: Calibration,
    pressure_cfg: ChannelConfig,
    temperature_cfg: ChannelConfig,
    measurement: Option<Measurement>,
}

impl<I2C> Dps310<I2cInterface<I2C>>
where
    I2C: i2c::I2c,
{
    /// Creates a driver talking I2C to the sensor at `address`
    /// (usually [`DEFAULT_ADDRESS`]).
    ///
    /// This does not communicate with the sensor yet.
    pub fn new_i2c(i2c: I2C, address: u8) -> Self {
        Self::new(I2cInterface::new(i2c, address))
    }
}

impl<SPI> Dps310<SpiInterface<SPI>>
where
    SPI: spi::SpiDevice,
{
    /// Creates a driver talking SPI through `spi`, which owns chip select.
    ///
    /// This does not communicate with the sensor yet.
    pub fn new_spi(spi: SPI) -> Self {
        Self::new(SpiInterface::new(spi))
    }
}

impl<B, E> Dps310<B>
where
    B: Interface<Error = E>,
{
    /// Creates a driver on an already wrapped register interface.
    pub fn new(bus: B) -> Self {
        Dps310 {
            bus,
            config: Config::default(),
            state: State::Uninitialized,
            product_id: None,
            calib_data: Calibration::default(),
            pressure_cfg: ChannelConfig::default(),
            temperature_cfg: ChannelConfig::default(),
            measurement: None,
        }
    }

    /// Replaces the configuration used by the next [`Dps310::init`].
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Checks the product ID, resets the sensor, loads the calibration,
    /// configures both channels and starts continuous measurements.
    ///
    /// Returns once the first pressure and temperature results are available.
    ///
    /// # Errors
    /// - [`Dps310Error::TransportOpenFailed`] if the bus does not answer at all.
    /// - [`Dps310Error::DeviceNotFound`] if the product ID does not match. No
    ///   register is written in that case.
    /// - [`Dps310Error::Timeout`] if the sensor does not become ready.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> error::Result<(), E> {
        self.state = State::Uninitialized;
        self.measurement = None;

        let id = self
            .bus
            .read_register(regs::PRODUCT_ID)
            .map_err(Dps310Error::TransportOpenFailed)?;
        self.product_id = Some(id);
        self.state = State::BusOpened;

        if id != PRODUCT_ID {
            #[cfg(feature = "defmt")]
            defmt::warn!("DPS310 product id mismatch: {=u8:#x}", id);
            self.state = State::InitFailed;
            return Err(Dps310Error::DeviceNotFound(id));
        }

        self.reset(delay)?;
        self.read_calibration(delay)?;

        let config = self.config;
        self.configure_pressure(config.pressure.rate, config.pressure.oversampling)?;
        self.configure_temperature(config.temperature.rate, config.temperature.oversampling)?;
        self.state = State::Configured;

        self.set_mode(Mode::ContinuousBoth)?;
        self.wait_for_status(status::PRS_RDY | status::TMP_RDY, poll::FIRST_SAMPLE, delay)?;
        self.state = State::Running;

        #[cfg(feature = "defmt")]
        defmt::debug!("DPS310 running on {}", self.bus.transport());

        Ok(())
    }

    /// Performs a soft-reset and waits until the sensor reports ready.
    ///
    /// All registers return to their defaults, so a running driver drops back
    /// to [`State::Reset`] and measurements fail with
    /// [`Dps310Error::NotInitialized`] until [`Dps310::init`] runs again.
    ///
    /// The product ID must have been verified first. Before that the call
    /// fails with [`Dps310Error::NotInitialized`], and after a failed ID check
    /// with [`Dps310Error::DeviceNotFound`]. Nothing is sent in either case.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> error::Result<(), E> {
        match self.state {
            State::Uninitialized => return Err(Dps310Error::NotInitialized),
            State::InitFailed => {
                return Err(Dps310Error::DeviceNotFound(self.product_id.unwrap_or_default()))
            }
            _ => {}
        }

        self.write_reg(regs::RESET, regs::SOFT_RESET)?;
        self.state = State::BusOpened;
        self.measurement = None;

        delay.delay_ms(poll::RESET_SETTLE);
        self.wait_for_status(status::SENSOR_RDY, poll::STATUS, delay)?;
        self.state = State::Reset;

        #[cfg(feature = "defmt")]
        defmt::debug!("DPS310 reset complete");

        Ok(())
    }

    /// Writes the operating mode. Takes effect with the next measurement cycle.
    pub fn set_mode(&mut self, mode: Mode) -> error::Result<(), E> {
        self.write_bits(regs::MEAS_CFG, 0, 3, mode as u8)
    }

    /// Sets measurement rate and oversampling of the pressure channel.
    pub fn configure_pressure(&mut self, rate: Rate, oversampling: Oversampling) -> error::Result<(), E> {
        self.configure_channel(Channel::Pressure, ChannelConfig::new(rate, oversampling))
    }

    /// Sets measurement rate and oversampling of the temperature channel.
    pub fn configure_temperature(
        &mut self,
        rate: Rate,
        oversampling: Oversampling,
    ) -> error::Result<(), E> {
        self.configure_channel(Channel::Temperature, ChannelConfig::new(rate, oversampling))
    }

    /// Programs one channel and records its scale factor.
    ///
    /// The temperature channel also mirrors the coefficient source bit
    /// (`TMP_COEF_SRCE` bit 7) into `TMP_CFG` bit 7 so the selected internal
    /// sensor matches the one the coefficients were trimmed against.
    fn configure_channel(&mut self, channel: Channel, cfg: ChannelConfig) -> error::Result<(), E> {
        let shift = cfg.shift_enabled() as u8;

        match channel {
            Channel::Pressure => {
                // Bit 7 of PRS_CFG is reserved.
                self.write_bits(regs::PRS_CFG, 0, 7, cfg.register_bits())?;
                self.write_bits(regs::CFG_REG, regs::P_SHIFT, 1, shift)?;
                self.pressure_cfg = cfg;
            }
            Channel::Temperature => {
                let source = self.read_bits(regs::TMP_COEF_SRCE, 7, 1)?;
                self.write_reg(regs::TMP_CFG, (source << 7) | cfg.register_bits())?;
                self.write_bits(regs::CFG_REG, regs::T_SHIFT, 1, shift)?;
                self.temperature_cfg = cfg;
            }
        }

        Ok(())
    }

    /// `true` if a new pressure result is ready.
    pub fn pressure_available(&mut self) -> error::Result<bool, E> {
        Ok(self.read_bits(regs::MEAS_CFG, 4, 1)? == 1)
    }

    /// `true` if a new temperature result is ready.
    pub fn temperature_available(&mut self) -> error::Result<bool, E> {
        Ok(self.read_bits(regs::MEAS_CFG, 5, 1)? == 1)
    }

    /// Reads the latest raw results without compensation.
    pub fn read_raw(&mut self) -> error::Result<RawSample, E> {
        let mut buffer = [0u8; 6];
        self.read_into(regs::PRS_B2, &mut buffer)?;

        Ok(RawSample {
            pressure: calc::raw_24([buffer[0], buffer[1], buffer[2]]),
            temperature: calc::raw_24([buffer[3], buffer[4], buffer[5]]),
        })
    }

    /// Reads and compensates the latest pressure and temperature results.
    ///
    /// # Errors
    /// [`Dps310Error::NotInitialized`] unless [`Dps310::init`] has completed.
    pub fn read(&mut self) -> error::Result<Measurement, E> {
        if self.state != State::Running {
            return Err(Dps310Error::NotInitialized);
        }

        let raw = self.read_raw()?;
        let measurement = self.calib_data.compensate(
            raw,
            self.temperature_cfg.scale_factor(),
            self.pressure_cfg.scale_factor(),
        );
        self.measurement = Some(measurement);

        Ok(measurement)
    }

    /// Reads the pressure and converts it to an altitude in metres relative to
    /// `sea_level_hpa` (use [`SEA_LEVEL_HPA`] without a local reference).
    pub fn read_altitude(&mut self, sea_level_hpa: f32) -> error::Result<f32, E> {
        let measurement = self.read()?;
        Ok(calc::altitude(measurement.pressure.as_hpa(), sea_level_hpa))
    }

    /// Reads a sample and packages it as a temperature event (°C) and a
    /// pressure event (hPa), both stamped with `timestamp_ms`.
    pub fn read_events(&mut self, timestamp_ms: u32) -> error::Result<Events, E> {
        let measurement = self.read()?;

        Ok(Events {
            temperature: SensorEvent::new(
                &sensor::TEMPERATURE_INFO,
                timestamp_ms,
                measurement.temperature.0,
            ),
            pressure: SensorEvent::new(
                &sensor::PRESSURE_INFO,
                timestamp_ms,
                measurement.pressure.as_hpa(),
            ),
        })
    }

    /// Borrows the driver as a temperature-only sensor.
    pub fn temperature_sensor(&mut self) -> TemperatureSensor<'_, B> {
        TemperatureSensor { parent: self }
    }

    /// Borrows the driver as a pressure-only sensor.
    pub fn pressure_sensor(&mut self) -> PressureSensor<'_, B> {
        PressureSensor { parent: self }
    }

    /// Current step of the initialization sequence.
    pub fn state(&self) -> State {
        self.state
    }

    /// Product ID from the last [`Dps310::init`], if the bus answered.
    pub fn product_id(&self) -> Option<u8> {
        self.product_id
    }

    /// Calibration coefficients, once they have been read.
    pub fn calibration(&self) -> Option<&Calibration> {
        match self.state {
            State::CalibrationLoaded | State::Configured | State::Running => Some(&self.calib_data),
            _ => None,
        }
    }

    /// Result of the last successful [`Dps310::read`].
    pub fn measurement(&self) -> Option<&Measurement> {
        self.measurement.as_ref()
    }

    /// Pressure channel settings last written to the sensor.
    pub fn pressure_config(&self) -> ChannelConfig {
        self.pressure_cfg
    }

    /// Temperature channel settings last written to the sensor.
    pub fn temperature_config(&self) -> ChannelConfig {
        self.temperature_cfg
    }

    /// Bus the driver talks over.
    pub fn transport(&self) -> Transport {
        self.bus.transport()
    }

    /// Destroys the driver and gives back the register interface.
    pub fn release(self) -> B {
        self.bus
    }

    /// Waits for the coefficients-ready flag, then reads the 18-byte block.
    fn read_calibration(&mut self, delay: &mut impl DelayNs) -> error::Result<(), E> {
        self.wait_for_status(status::COEF_RDY, poll::STATUS, delay)?;

        let mut buffer = [0u8; calc::CALIBRATION_SIZE];
        self.read_into(regs::COEF, &mut buffer)?;
        self.calib_data = Calibration::from_bytes(&buffer);
        self.state = State::CalibrationLoaded;

        #[cfg(feature = "defmt")]
        defmt::debug!("DPS310 calibration: {}", self.calib_data);

        Ok(())
    }

    /// Polls `MEAS_CFG` every `interval_ms` until all bits in `mask` are set.
    fn wait_for_status(
        &mut self,
        mask: u8,
        interval_ms: u32,
        delay: &mut impl DelayNs,
    ) -> error::Result<(), E> {
        let timeout = self.config.timeout.0;
        let mut elapsed = 0u32;

        loop {
            if (self.read_reg(regs::MEAS_CFG)? & mask) == mask {
                return Ok(());
            }
            if elapsed >= timeout {
                #[cfg(feature = "defmt")]
                defmt::warn!("DPS310 status {=u8:#x} not set after {=u32} ms", mask, elapsed);
                return Err(Dps310Error::Timeout);
            }

            delay.delay_ms(interval_ms);
            elapsed = elapsed.saturating_add(interval_ms);
        }
    }

    fn read_into(&mut self, reg: u8, buffer: &mut [u8]) -> error::Result<(), E> {
        self.bus.read_registers(reg, buffer).map_err(Dps310Error::Bus)
    }

    fn read_reg(&mut self, reg: u8) -> error::Result<u8, E> {
        self.bus.read_register(reg).map_err(Dps310Error::Bus)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> error::Result<(), E> {
        self.bus.write_register(reg, value).map_err(Dps310Error::Bus)
    }

    fn read_bits(&mut self, reg: u8, shift: u8, width: u8) -> error::Result<u8, E> {
        self.bus.read_bits(reg, shift, width).map_err(Dps310Error::Bus)
    }

    fn write_bits(&mut self, reg: u8, shift: u8, width: u8, value: u8) -> error::Result<(), E> {
        self.bus
            .write_bits(reg, shift, width, value)
            .map_err(Dps310Error::Bus)
    }
}
