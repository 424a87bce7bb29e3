//! Unified sensor plumbing: typed events, static sensor metadata and
//! per-channel views that borrow the driver.

use crate::{error, interface::Interface, Dps310};

/// Name reported in [`SensorInfo`].
pub const SENSOR_NAME: &str = "DPS310";

/// Identifier of the temperature view.
pub const TEMPERATURE_SENSOR_ID: i32 = 310;
/// Identifier of the pressure view.
pub const PRESSURE_SENSOR_ID: i32 = 311;

/// Physical quantity carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorKind {
    /// Ambient temperature in °C.
    AmbientTemperature,
    /// Pressure in hPa.
    Pressure,
}

/// A single reading tagged with its source and time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorEvent {
    pub version: i32,
    pub sensor_id: i32,
    pub kind: SensorKind,
    /// Caller-supplied timestamp in milliseconds.
    pub timestamp_ms: u32,
    /// °C for temperature, hPa for pressure.
    pub value: f32,
}

impl SensorEvent {
    pub(crate) fn new(info: &SensorInfo, timestamp_ms: u32, value: f32) -> Self {
        Self {
            version: info.version,
            sensor_id: info.sensor_id,
            kind: info.kind,
            timestamp_ms,
            value,
        }
    }
}

/// Static description of one sensor channel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorInfo {
    pub name: &'static str,
    pub version: i32,
    pub sensor_id: i32,
    pub kind: SensorKind,
    /// Minimum delay between events in microseconds, 0 if unconstrained.
    pub min_delay_us: i32,
    pub min_value: f32,
    pub max_value: f32,
    pub resolution: f32,
}

/// Temperature channel: -40..=85 °C in 0.01 °C steps.
pub const TEMPERATURE_INFO: SensorInfo = SensorInfo {
    name: SENSOR_NAME,
    version: 1,
    sensor_id: TEMPERATURE_SENSOR_ID,
    kind: SensorKind::AmbientTemperature,
    min_delay_us: 0,
    min_value: -40.0,
    max_value: 85.0,
    resolution: 0.01,
};

/// Pressure channel: 300..=1200 hPa, 0.002 hPa relative resolution.
pub const PRESSURE_INFO: SensorInfo = SensorInfo {
    name: SENSOR_NAME,
    version: 1,
    sensor_id: PRESSURE_SENSOR_ID,
    kind: SensorKind::Pressure,
    min_delay_us: 0,
    min_value: 300.0,
    max_value: 1200.0,
    resolution: 0.002,
};

/// Temperature and pressure events taken from the same sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Events {
    pub temperature: SensorEvent,
    pub pressure: SensorEvent,
}

/// Common interface of the per-channel views.
pub trait UnifiedSensor {
    type Error;

    /// Takes a fresh sample and reports this channel's value.
    fn event(&mut self, timestamp_ms: u32) -> Result<SensorEvent, Self::Error>;

    /// Describes the channel.
    fn info(&self) -> SensorInfo;
}

/// Temperature view of a [`Dps310`]. Holds the driver borrowed for its lifetime.
pub struct TemperatureSensor<'a, B> {
    pub(crate) parent: &'a mut Dps310<B>,
}

/// Pressure view of a [`Dps310`]. Holds the driver borrowed for its lifetime.
pub struct PressureSensor<'a, B> {
    pub(crate) parent: &'a mut Dps310<B>,
}

impl<B: Interface> UnifiedSensor for TemperatureSensor<'_, B> {
    type Error = error::Dps310Error<B::Error>;

    fn event(&mut self, timestamp_ms: u32) -> Result<SensorEvent, Self::Error> {
        Ok(self.parent.read_events(timestamp_ms)?.temperature)
    }

    fn info(&self) -> SensorInfo {
        TEMPERATURE_INFO
    }
}

impl<B: Interface> UnifiedSensor for PressureSensor<'_, B> {
    type Error = error::Dps310Error<B::Error>;

    fn event(&mut self, timestamp_ms: u32) -> Result<SensorEvent, Self::Error> {
        Ok(self.parent.read_events(timestamp_ms)?.pressure)
    }

    fn info(&self) -> SensorInfo {
        PRESSURE_INFO
    }
}
