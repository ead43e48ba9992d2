//! Virtual light: power, brightness and (for color bulbs) color.

use std::sync::{Mutex, MutexGuard, PoisonError};

use commoniot_app::ports::DeviceDriver;
use commoniot_domain::color::{Color, WHITE};
use commoniot_domain::error::DriverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    pub on: bool,
    pub brightness: u8,
    pub color: Color,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            on: false,
            brightness: 100,
            color: WHITE,
        }
    }
}

/// A simulated bulb. Color calls fail unless built with [`VirtualLight::rgb`].
#[derive(Debug, Default)]
pub struct VirtualLight {
    state: Mutex<LightState>,
    has_color: bool,
}

impl VirtualLight {
    #[must_use]
    pub fn rgb() -> Self {
        Self {
            state: Mutex::default(),
            has_color: true,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> LightState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, LightState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceDriver for VirtualLight {
    fn is_on(&self) -> bool {
        self.lock_state().on
    }

    fn turn_on(&self) -> Result<(), DriverError> {
        self.lock_state().on = true;
        Ok(())
    }

    fn turn_off(&self) -> Result<(), DriverError> {
        self.lock_state().on = false;
        Ok(())
    }

    fn brightness(&self) -> Result<u8, DriverError> {
        Ok(self.lock_state().brightness)
    }

    fn set_brightness(&self, percent: u8) -> Result<(), DriverError> {
        self.lock_state().brightness = percent;
        Ok(())
    }

    fn color(&self) -> Result<Color, DriverError> {
        if !self.has_color {
            return Err(DriverError::NotImplemented);
        }
        Ok(self.lock_state().color)
    }

    fn set_color(&self, color: Color) -> Result<(), DriverError> {
        if !self.has_color {
            return Err(DriverError::NotImplemented);
        }
        self.lock_state().color = color;
        Ok(())
    }
}
