//! A live device: its record, the driver behind it, and its animator.
//!
//! Every operation is checked against the record's capability set before the
//! driver is touched. Errors from the driver are translated with
//! [`IotError::from_driver`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use commoniot_domain::color::{BLACK, Color, WHITE};
use commoniot_domain::device::{Capability, Device, clamp_level};
use commoniot_domain::display::DeviceView;
use commoniot_domain::error::{DriverError, InvalidArgument, IotError, UnsupportedOperation};
use commoniot_domain::id::DeviceId;

use crate::animation::{Animation, Animator, random_color};
use crate::ports::{DeviceDriver, PassiveDriver};

/// Brightness applied by [`IotDevice::set_low_brightness`].
pub const LOW_BRIGHTNESS: u8 = 25;
/// Brightness applied by [`IotDevice::set_high_brightness`] and [`IotDevice::reset`].
pub const HIGH_BRIGHTNESS: u8 = 100;

/// Shared handle to a device. Clones refer to the same driver and animator.
#[derive(Clone)]
pub struct IotDevice {
    record: Device,
    driver: Arc<dyn DeviceDriver>,
    animator: Arc<Animator>,
}

impl fmt::Debug for IotDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IotDevice")
            .field("record", &self.record)
            .field("mode", &self.animator.mode())
            .finish_non_exhaustive()
    }
}

impl IotDevice {
    pub fn new(record: Device, driver: Arc<dyn DeviceDriver>) -> Self {
        Self {
            record,
            driver,
            animator: Arc::new(Animator::new()),
        }
    }

    /// A device nobody can control, e.g. a plain presence sensor.
    #[must_use]
    pub fn passive(record: Device) -> Self {
        Self::new(record, Arc::new(PassiveDriver))
    }

    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.record.id
    }

    #[must_use]
    pub fn record(&self) -> &Device {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut Device {
        &mut self.record
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.record.supports(capability)
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.driver.is_on()
    }

    #[must_use]
    pub fn is_off(&self) -> bool {
        !self.is_on()
    }

    /// Name of the running animation, if any.
    #[must_use]
    pub fn mode(&self) -> Option<&'static str> {
        self.animator.mode()
    }

    fn require(&self, capability: Capability, operation: &str) -> Result<(), IotError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(UnsupportedOperation::new(self.id(), operation).into())
        }
    }

    fn drive<T>(
        &self,
        capability: Capability,
        operation: &str,
        call: impl FnOnce(&dyn DeviceDriver) -> Result<T, DriverError>,
    ) -> Result<T, IotError> {
        self.require(capability, operation)?;
        call(self.driver.as_ref()).map_err(|err| IotError::from_driver(self.id(), operation, err))
    }

    // --- power ---

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `TURN_ON`, [`IotError::OperationFailed`]
    /// when the driver fails.
    pub fn turn_on(&self) -> Result<(), IotError> {
        self.drive(Capability::TurnOn, "turn_on", |d| d.turn_on())
    }

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `TURN_OFF`, [`IotError::OperationFailed`]
    /// when the driver fails.
    pub fn turn_off(&self) -> Result<(), IotError> {
        self.drive(Capability::TurnOff, "turn_off", |d| d.turn_off())
    }

    /// Turn on when off, off otherwise.
    ///
    /// A driver that keeps the default `is_on` and lacks `turn_off` makes this
    /// fail with [`IotError::Unsupported`].
    ///
    /// # Errors
    ///
    /// Whatever [`turn_on`](Self::turn_on) or [`turn_off`](Self::turn_off) return.
    pub fn toggle(&self) -> Result<(), IotError> {
        if self.is_off() {
            self.turn_on()
        } else {
            self.turn_off()
        }
    }

    /// Stop any animation, then turn on at full brightness and white.
    ///
    /// Steps the device does not support are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first driver failure.
    pub fn reset(&self) -> Result<(), IotError> {
        self.animator.stop();
        if self.supports(Capability::TurnOn) {
            self.turn_on()?;
        }
        if self.supports(Capability::ChangeBrightness) {
            self.change_brightness(i64::from(HIGH_BRIGHTNESS))?;
        }
        if self.supports(Capability::ChangeColor) {
            self.change_color(WHITE)?;
        }
        Ok(())
    }

    // --- brightness ---

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `REPORT_BRIGHTNESS`.
    pub fn brightness(&self) -> Result<u8, IotError> {
        self.drive(Capability::ReportBrightness, "brightness", |d| d.brightness())
    }

    /// Set brightness, clamping `value` into `0..=100`. Returns the applied level.
    ///
    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `CHANGE_BRIGHTNESS`.
    pub fn change_brightness(&self, value: i64) -> Result<u8, IotError> {
        let level = clamp_level(value);
        self.drive(Capability::ChangeBrightness, "change_brightness", |d| {
            d.set_brightness(level)
        })?;
        Ok(level)
    }

    /// # Errors
    ///
    /// [`IotError::Unsupported`] unless the device can both report and change
    /// brightness.
    pub fn increase_brightness(&self, amount: i64) -> Result<u8, IotError> {
        let current = self.brightness()?;
        self.change_brightness(i64::from(current).saturating_add(amount))
    }

    /// # Errors
    ///
    /// Same as [`increase_brightness`](Self::increase_brightness).
    pub fn decrease_brightness(&self, amount: i64) -> Result<u8, IotError> {
        let current = self.brightness()?;
        self.change_brightness(i64::from(current).saturating_sub(amount))
    }

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `CHANGE_BRIGHTNESS`.
    pub fn set_low_brightness(&self) -> Result<u8, IotError> {
        self.change_brightness(i64::from(LOW_BRIGHTNESS))
    }

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `CHANGE_BRIGHTNESS`.
    pub fn set_high_brightness(&self) -> Result<u8, IotError> {
        self.change_brightness(i64::from(HIGH_BRIGHTNESS))
    }

    // --- color ---

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `REPORT_COLOR`.
    pub fn color(&self) -> Result<Color, IotError> {
        self.drive(Capability::ReportColor, "color", |d| d.color())
    }

    /// Apply `color`. Black turns the device off; any other color turns it on
    /// first if needed.
    ///
    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `CHANGE_COLOR`.
    pub fn change_color(&self, color: Color) -> Result<Color, IotError> {
        self.require(Capability::ChangeColor, "change_color")?;
        if color.is_black() {
            self.turn_off()?;
            return Ok(BLACK);
        }
        if self.is_off() {
            self.turn_on()?;
        }
        self.drive(Capability::ChangeColor, "change_color", |d| d.set_color(color))?;
        Ok(color)
    }

    /// # Errors
    ///
    /// [`IotError::InvalidArgument`] for malformed hex, otherwise as
    /// [`change_color`](Self::change_color).
    pub fn change_color_hex(&self, hex: &str) -> Result<Color, IotError> {
        let color = Color::from_hex(hex)
            .map_err(|err| InvalidArgument::new("change_color_hex", err.to_string()))?;
        self.change_color(color)
    }

    /// # Errors
    ///
    /// As [`change_color`](Self::change_color).
    pub fn change_color_rgb(&self, r: u8, g: u8, b: u8) -> Result<Color, IotError> {
        self.change_color(Color::from_rgb(r, g, b))
    }

    /// # Errors
    ///
    /// [`IotError::InvalidArgument`] when saturation or value leave `[0, 1]`.
    pub fn change_color_hsv(&self, h: f64, s: f64, v: f64) -> Result<Color, IotError> {
        let color = Color::from_hsv(h, s, v)
            .map_err(|err| InvalidArgument::new("change_color_hsv", err.to_string()))?;
        self.change_color(color)
    }

    /// # Errors
    ///
    /// As [`change_color`](Self::change_color).
    pub fn random_color(&self) -> Result<Color, IotError> {
        self.change_color(random_color())
    }

    /// Step from `from` to `to` in `steps` increments, ending on `to`.
    ///
    /// # Errors
    ///
    /// As [`change_color`](Self::change_color).
    pub fn cross_fade(&self, from: Color, to: Color, steps: u16) -> Result<Color, IotError> {
        self.require(Capability::ChangeColor, "cross_fade")?;
        let mut last = from;
        for step in from.fade_to(to, steps) {
            last = self.change_color(step)?;
        }
        Ok(last)
    }

    // --- playback ---

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `PAUSE_PLAYBACK`.
    pub fn pause(&self) -> Result<(), IotError> {
        self.drive(Capability::PausePlayback, "pause", |d| d.pause())
    }

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `RESUME_PLAYBACK`.
    pub fn resume(&self) -> Result<(), IotError> {
        self.drive(Capability::ResumePlayback, "resume", |d| d.resume())
    }

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `STOP_PLAYBACK`.
    pub fn stop(&self) -> Result<(), IotError> {
        self.drive(Capability::StopPlayback, "stop", |d| d.stop())
    }

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `NEXT_PLAYBACK`.
    pub fn play_next(&self) -> Result<(), IotError> {
        self.drive(Capability::NextPlayback, "play_next", |d| d.next())
    }

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `PREV_PLAYBACK`.
    pub fn play_prev(&self) -> Result<(), IotError> {
        self.drive(Capability::PrevPlayback, "play_prev", |d| d.prev())
    }

    // --- volume ---

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `REPORT_VOLUME`.
    pub fn volume(&self) -> Result<u8, IotError> {
        self.drive(Capability::ReportVolume, "volume", |d| d.volume())
    }

    /// Set volume, clamping into `0..=100`. Returns the applied level.
    ///
    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `CHANGE_VOLUME`.
    pub fn set_volume(&self, value: i64) -> Result<u8, IotError> {
        let level = clamp_level(value);
        self.drive(Capability::ChangeVolume, "set_volume", |d| d.set_volume(level))?;
        Ok(level)
    }

    /// # Errors
    ///
    /// [`IotError::Unsupported`] unless the device can report and change volume.
    pub fn increase_volume(&self, amount: i64) -> Result<u8, IotError> {
        let current = self.volume()?;
        self.set_volume(i64::from(current).saturating_add(amount))
    }

    /// # Errors
    ///
    /// Same as [`increase_volume`](Self::increase_volume).
    pub fn decrease_volume(&self, amount: i64) -> Result<u8, IotError> {
        let current = self.volume()?;
        self.set_volume(i64::from(current).saturating_sub(amount))
    }

    // --- camera ---

    /// # Errors
    ///
    /// [`IotError::Unsupported`] without `GET_PICTURE`.
    pub fn get_picture(&self) -> Result<Vec<u8>, IotError> {
        self.drive(Capability::GetPicture, "get_picture", |d| d.picture())
    }

    // --- animations ---

    /// Start `animation`, preempting the one already running.
    ///
    /// The device is turned on first when it is off.
    ///
    /// # Errors
    ///
    /// [`IotError::Unsupported`] without the animation's capability,
    /// [`IotError::InvalidArgument`] for a speed outside `[0, 1]`.
    pub fn animate(&self, animation: Animation) -> Result<(), IotError> {
        let mode = animation.mode();
        self.require(animation.required_capability(), mode)?;
        animation.validate()?;
        if self.is_off() && self.supports(Capability::TurnOn) {
            self.turn_on()?;
        }
        self.animator
            .start(self.id(), animation, Arc::clone(&self.driver))
            .map_err(|err| IotError::from_driver(self.id(), mode, err))?;
        Ok(())
    }

    /// # Errors
    ///
    /// See [`animate`](Self::animate).
    pub fn blink(&self, speed: f64) -> Result<(), IotError> {
        self.animate(Animation::Blink { speed })
    }

    /// # Errors
    ///
    /// See [`animate`](Self::animate).
    pub fn beacon(&self, speed: f64) -> Result<(), IotError> {
        self.animate(Animation::Beacon { speed })
    }

    /// # Errors
    ///
    /// See [`animate`](Self::animate).
    pub fn beacon_slow(&self, speed: f64) -> Result<(), IotError> {
        self.animate(Animation::BeaconSlow { speed })
    }

    /// # Errors
    ///
    /// See [`animate`](Self::animate).
    pub fn color_cycle(&self, color_time: Duration, cross_fade: bool) -> Result<(), IotError> {
        self.animate(Animation::ColorCycle {
            color_time,
            cross_fade,
        })
    }

    /// # Errors
    ///
    /// See [`animate`](Self::animate).
    pub fn random_color_cycle(&self, color_time: Duration) -> Result<(), IotError> {
        self.animate(Animation::RandomColorCycle { color_time })
    }

    /// Cancel the running animation. Returns whether one was running.
    pub fn stop_animation(&self) -> bool {
        self.animator.stop().is_some()
    }

    // --- view ---

    /// Snapshot of the record and the live state. Reads only; readings the
    /// driver cannot provide are left out.
    #[must_use]
    pub fn view(&self) -> DeviceView {
        let record = &self.record;
        DeviceView {
            device_id: record.id.clone(),
            host: record.host.clone(),
            name: record.name.clone(),
            area: record.area.clone(),
            device_type: record.device_type,
            capabilities: record.capabilities.iter().copied().collect(),
            is_on: self.is_on(),
            brightness: self.brightness().ok(),
            color: self.color().ok().map(Color::view),
            volume: self.volume().ok(),
            mode: self.mode().map(str::to_string),
            raw_data: record.raw_data.clone(),
        }
    }
}
