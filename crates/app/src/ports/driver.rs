//! Driver port: the I/O half of a device.
//!
//! The registry holds drivers of many concrete kinds side by side, so the
//! trait is object safe and every method is synchronous. Every operation
//! defaults to [`DriverError::NotImplemented`]; a driver only overrides what
//! its hardware can do. [`is_on`](DeviceDriver::is_on) defaults to `true`.

use commoniot_domain::color::Color;
use commoniot_domain::error::DriverError;

pub trait DeviceDriver: Send + Sync {
    fn is_on(&self) -> bool {
        true
    }

    fn turn_on(&self) -> Result<(), DriverError> {
        Err(DriverError::NotImplemented)
    }

    fn turn_off(&self) -> Result<(), DriverError> {
        Err(DriverError::NotImplemented)
    }

    /// Current brightness in percent.
    fn brightness(&self) -> Result<u8, DriverError> {
        Err(DriverError::NotImplemented)
    }

    /// Apply a brightness in percent, already clamped to `0..=100`.
    fn set_brightness(&self, _percent: u8) -> Result<(), DriverError> {
        Err(DriverError::NotImplemented)
    }

    fn color(&self) -> Result<Color, DriverError> {
        Err(DriverError::NotImplemented)
    }

    fn set_color(&self, _color: Color) -> Result<(), DriverError> {
        Err(DriverError::NotImplemented)
    }

    fn pause(&self) -> Result<(), DriverError> {
        Err(DriverError::NotImplemented)
    }

    fn resume(&self) -> Result<(), DriverError> {
        Err(DriverError::NotImplemented)
    }

    fn stop(&self) -> Result<(), DriverError> {
        Err(DriverError::NotImplemented)
    }

    fn next(&self) -> Result<(), DriverError> {
        Err(DriverError::NotImplemented)
    }

    fn prev(&self) -> Result<(), DriverError> {
        Err(DriverError::NotImplemented)
    }

    fn volume(&self) -> Result<u8, DriverError> {
        Err(DriverError::NotImplemented)
    }

    fn set_volume(&self, _percent: u8) -> Result<(), DriverError> {
        Err(DriverError::NotImplemented)
    }

    /// Capture a still image, encoded as the camera delivers it.
    fn picture(&self) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::NotImplemented)
    }
}

/// Driver for devices that are observed but cannot be controlled.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassiveDriver;

impl DeviceDriver for PassiveDriver {}
