//! Virtual switch: on/off only. Used for plugs, switches, heaters, fans…

use std::sync::atomic::{AtomicBool, Ordering};

use commoniot_app::ports::DeviceDriver;
use commoniot_domain::error::DriverError;

#[derive(Debug, Default)]
pub struct VirtualSwitch {
    on: AtomicBool,
}

impl VirtualSwitch {
    #[must_use]
    pub fn new(on: bool) -> Self {
        Self {
            on: AtomicBool::new(on),
        }
    }
}

impl DeviceDriver for VirtualSwitch {
    fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }

    fn turn_on(&self) -> Result<(), DriverError> {
        self.on.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn turn_off(&self) -> Result<(), DriverError> {
        self.on.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_start_in_requested_state() {
        assert!(VirtualSwitch::new(true).is_on());
        assert!(!VirtualSwitch::default().is_on());
    }

    #[test]
    fn should_switch_on_and_off() {
        let switch = VirtualSwitch::default();
        switch.turn_on().unwrap();
        assert!(switch.is_on());
        switch.turn_off().unwrap();
        assert!(!switch.is_on());
    }
}
