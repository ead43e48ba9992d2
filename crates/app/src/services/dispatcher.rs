//! Command dispatcher: `(device, operation, args?)` onto device operations.
//!
//! Operation names form a closed set ([`Operation`]). An unknown name, or a
//! name the resolved device has no capability for, is an
//! [`IotError::Unsupported`]. Arguments may be given positionally (a JSON
//! array), by name (a JSON object), or as a single scalar.
//!
//! A successful operation that changes device state publishes
//! `iot.device.updated` through the registry.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use serde::Deserialize as _;
use serde_json::Value;

use commoniot_domain::color::{Color, ColorSpec};
use commoniot_domain::error::{InvalidArgument, IotError, UnsupportedOperation};

use crate::animation::{
    DEFAULT_BEACON_SLOW_SPEED, DEFAULT_BEACON_SPEED, DEFAULT_BLINK_SPEED, DEFAULT_COLOR_TIME,
};
use crate::device::IotDevice;
use crate::ports::MessagePublisher;
use crate::services::registry::DeviceRegistry;
use crate::services::to_json;

/// Default step for relative brightness and volume changes.
pub const DEFAULT_STEP: i64 = 10;

const DEFAULT_FADE_STEPS: u16 = 100;

/// The name is not an operation any device exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownOperation;

macro_rules! operations {
    ($($variant:ident => $name:literal $(| $alias:literal)*),+ $(,)?) => {
        /// Every operation a device may expose.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Operation {
            $($variant),+
        }

        impl Operation {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl FromStr for Operation {
            type Err = UnknownOperation;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(UnknownOperation),
                }
            }
        }
    };
}

operations! {
    IsOn => "is_on",
    IsOff => "is_off",
    TurnOn => "turn_on",
    TurnOff => "turn_off",
    Toggle => "toggle",
    Reset => "reset",
    Brightness => "brightness" | "get_brightness",
    ChangeBrightness => "change_brightness" | "set_brightness",
    IncreaseBrightness => "increase_brightness",
    DecreaseBrightness => "decrease_brightness",
    SetLowBrightness => "set_low_brightness",
    SetHighBrightness => "set_high_brightness",
    Color => "color" | "get_color",
    ChangeColor => "change_color" | "set_color",
    ChangeColorHex => "change_color_hex",
    ChangeColorRgb => "change_color_rgb",
    ChangeColorHsv => "change_color_hsv",
    RandomColor => "random_color",
    CrossFade => "cross_fade",
    Pause => "pause",
    Resume => "resume",
    Stop => "stop",
    PlayNext => "play_next" | "next",
    PlayPrev => "play_prev" | "prev",
    Volume => "volume" | "get_volume",
    SetVolume => "set_volume" | "change_volume",
    IncreaseVolume => "increase_volume",
    DecreaseVolume => "decrease_volume",
    GetPicture => "get_picture",
    Blink => "blink",
    Beacon => "beacon",
    BeaconSlow => "beacon_slow",
    ColorCycle => "color_cycle",
    RandomColorCycle => "random_color_cycle",
    StopAnimation => "stop_animation",
    AsDict => "as_dict" | "display_model",
}

impl Operation {
    /// Whether a successful run alters the device, as opposed to reading it.
    #[must_use]
    pub fn changes_state(self) -> bool {
        !matches!(
            self,
            Self::IsOn
                | Self::IsOff
                | Self::Brightness
                | Self::Color
                | Self::Volume
                | Self::GetPicture
                | Self::AsDict
        )
    }
}

/// Arguments of one call, addressed by position or by name.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    operation: &'a str,
    value: Option<&'a Value>,
}

impl<'a> Args<'a> {
    #[must_use]
    pub fn new(operation: &'a str, value: Option<&'a Value>) -> Self {
        Self { operation, value }
    }

    /// The raw argument at `index` or under `key`.
    #[must_use]
    pub fn get(&self, index: usize, key: &str) -> Option<&'a Value> {
        let value = match self.value? {
            Value::Null => None,
            Value::Array(items) => items.get(index),
            Value::Object(map) => map.get(key),
            scalar if index == 0 => Some(scalar),
            _ => None,
        };
        value.filter(|value| !value.is_null())
    }

    fn invalid(&self, reason: impl Into<String>) -> IotError {
        InvalidArgument::new(self.operation, reason).into()
    }

    fn missing(&self, key: &str) -> IotError {
        self.invalid(format!("missing argument {key:?}"))
    }

    /// # Errors
    ///
    /// [`IotError::InvalidArgument`] when present but not an integer.
    pub fn int(&self, index: usize, key: &str) -> Result<Option<i64>, IotError> {
        self.get(index, key)
            .map(|value| {
                value
                    .as_i64()
                    .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(float_to_i64))
                    .ok_or_else(|| self.invalid(format!("{key} must be an integer")))
            })
            .transpose()
    }

    /// # Errors
    ///
    /// [`IotError::InvalidArgument`] when present but not a number.
    pub fn float(&self, index: usize, key: &str) -> Result<Option<f64>, IotError> {
        self.get(index, key)
            .map(|value| {
                value
                    .as_f64()
                    .ok_or_else(|| self.invalid(format!("{key} must be a number")))
            })
            .transpose()
    }

    /// # Errors
    ///
    /// [`IotError::InvalidArgument`] when present but not a boolean.
    pub fn flag(&self, index: usize, key: &str) -> Result<Option<bool>, IotError> {
        self.get(index, key)
            .map(|value| {
                value
                    .as_bool()
                    .ok_or_else(|| self.invalid(format!("{key} must be a boolean")))
            })
            .transpose()
    }

    /// # Errors
    ///
    /// [`IotError::InvalidArgument`] when present but not a string.
    pub fn text(&self, index: usize, key: &str) -> Result<Option<&'a str>, IotError> {
        self.get(index, key)
            .map(|value| {
                value
                    .as_str()
                    .ok_or_else(|| self.invalid(format!("{key} must be a string")))
            })
            .transpose()
    }

    /// # Errors
    ///
    /// [`IotError::InvalidArgument`] when present but not a color.
    pub fn color(&self, index: usize, key: &str) -> Result<Option<Color>, IotError> {
        self.get(index, key)
            .map(|value| {
                ColorSpec::deserialize(value)
                    .map_err(|err| self.invalid(err.to_string()))
                    .and_then(|spec| spec.resolve().map_err(|err| self.invalid(err.to_string())))
            })
            .transpose()
    }

    fn required_int(&self, index: usize, key: &str) -> Result<i64, IotError> {
        self.int(index, key)?.ok_or_else(|| self.missing(key))
    }

    fn required_float(&self, index: usize, key: &str) -> Result<f64, IotError> {
        self.float(index, key)?.ok_or_else(|| self.missing(key))
    }

    fn required_color(&self, index: usize, key: &str) -> Result<Color, IotError> {
        self.color(index, key)?.ok_or_else(|| self.missing(key))
    }

    fn channel(&self, index: usize, key: &str) -> Result<u8, IotError> {
        let value = self.required_int(index, key)?;
        u8::try_from(value).map_err(|_| self.invalid(format!("{key} must be within [0, 255]")))
    }

    fn seconds(&self, index: usize, key: &str, default: Duration) -> Result<Duration, IotError> {
        match self.float(index, key)? {
            None => Ok(default),
            Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| {
                self.invalid(format!("{key} must be a non-negative number of seconds"))
            }),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_i64(value: f64) -> i64 {
    value as i64
}

/// Runs operations against devices held by a [`DeviceRegistry`].
pub struct CommandDispatcher<P> {
    registry: Arc<DeviceRegistry<P>>,
}

impl<P> Clone for CommandDispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P: MessagePublisher> CommandDispatcher<P> {
    pub fn new(registry: Arc<DeviceRegistry<P>>) -> Self {
        Self { registry }
    }

    /// Resolve `device` (identifier or exact name) and run `operation` on it.
    ///
    /// The registry lock is held only during the lookup.
    ///
    /// # Errors
    ///
    /// - [`IotError::NotFound`] when `device` resolves to nothing
    /// - [`IotError::Unsupported`] for an unknown operation or a missing capability
    /// - [`IotError::InvalidArgument`] for malformed arguments
    /// - [`IotError::OperationFailed`] when the driver fails
    #[tracing::instrument(skip(self, args))]
    pub fn dispatch(
        &self,
        device: &str,
        operation: &str,
        args: Option<&Value>,
    ) -> Result<Value, IotError> {
        let target = self.registry.search_for_device(device)?;
        let Ok(op) = operation.parse::<Operation>() else {
            return Err(UnsupportedOperation::new(target.id(), operation).into());
        };
        let result = invoke(&target, op, Args::new(operation, args));
        match &result {
            Ok(_) if op.changes_state() => self.registry.on_device_changed(target.id()),
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(device_id = %target.id(), err = %err, "operation rejected");
            }
        }
        result
    }
}

fn invoke(device: &IotDevice, op: Operation, args: Args<'_>) -> Result<Value, IotError> {
    let unit = |result: Result<(), IotError>| result.map(|()| Value::Null);
    let level = |result: Result<u8, IotError>| result.map(Value::from);
    let color = |result: Result<Color, IotError>| result.map(|c| to_json(c.view()));

    match op {
        Operation::IsOn => Ok(Value::Bool(device.is_on())),
        Operation::IsOff => Ok(Value::Bool(device.is_off())),
        Operation::TurnOn => unit(device.turn_on()),
        Operation::TurnOff => unit(device.turn_off()),
        Operation::Toggle => unit(device.toggle()),
        Operation::Reset => unit(device.reset()),
        Operation::Brightness => level(device.brightness()),
        Operation::ChangeBrightness => {
            level(device.change_brightness(args.required_int(0, "brightness")?))
        }
        Operation::IncreaseBrightness => level(
            device.increase_brightness(args.int(0, "amount")?.unwrap_or(DEFAULT_STEP)),
        ),
        Operation::DecreaseBrightness => level(
            device.decrease_brightness(args.int(0, "amount")?.unwrap_or(DEFAULT_STEP)),
        ),
        Operation::SetLowBrightness => level(device.set_low_brightness()),
        Operation::SetHighBrightness => level(device.set_high_brightness()),
        Operation::Color => color(device.color()),
        Operation::ChangeColor => color(device.change_color(args.required_color(0, "color")?)),
        Operation::ChangeColorHex => {
            let hex = args.text(0, "hex")?.ok_or_else(|| args.missing("hex"))?;
            color(device.change_color_hex(hex))
        }
        Operation::ChangeColorRgb => color(device.change_color_rgb(
            args.channel(0, "r")?,
            args.channel(1, "g")?,
            args.channel(2, "b")?,
        )),
        Operation::ChangeColorHsv => color(device.change_color_hsv(
            args.required_float(0, "h")?,
            args.required_float(1, "s")?,
            args.required_float(2, "v")?,
        )),
        Operation::RandomColor => color(device.random_color()),
        Operation::CrossFade => {
            let from = args.required_color(0, "from")?;
            let to = args.required_color(1, "to")?;
            let steps = match args.int(2, "steps")? {
                None => DEFAULT_FADE_STEPS,
                Some(steps) => u16::try_from(steps)
                    .ok()
                    .filter(|steps| *steps > 0)
                    .ok_or_else(|| args.invalid("steps must be within [1, 65535]"))?,
            };
            color(device.cross_fade(from, to, steps))
        }
        Operation::Pause => unit(device.pause()),
        Operation::Resume => unit(device.resume()),
        Operation::Stop => unit(device.stop()),
        Operation::PlayNext => unit(device.play_next()),
        Operation::PlayPrev => unit(device.play_prev()),
        Operation::Volume => level(device.volume()),
        Operation::SetVolume => level(device.set_volume(args.required_int(0, "volume")?)),
        Operation::IncreaseVolume => {
            level(device.increase_volume(args.int(0, "amount")?.unwrap_or(DEFAULT_STEP)))
        }
        Operation::DecreaseVolume => {
            level(device.decrease_volume(args.int(0, "amount")?.unwrap_or(DEFAULT_STEP)))
        }
        Operation::GetPicture => device
            .get_picture()
            .map(|bytes| Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))),
        Operation::Blink => unit(device.blink(
            args.float(0, "speed")?.unwrap_or(DEFAULT_BLINK_SPEED),
        )),
        Operation::Beacon => unit(device.beacon(
            args.float(0, "speed")?.unwrap_or(DEFAULT_BEACON_SPEED),
        )),
        Operation::BeaconSlow => unit(device.beacon_slow(
            args.float(0, "speed")?.unwrap_or(DEFAULT_BEACON_SLOW_SPEED),
        )),
        Operation::ColorCycle => unit(device.color_cycle(
            args.seconds(0, "color_time", DEFAULT_COLOR_TIME)?,
            args.flag(1, "cross_fade")?.unwrap_or(false),
        )),
        Operation::RandomColorCycle => unit(
            device.random_color_cycle(args.seconds(0, "color_time", DEFAULT_COLOR_TIME)?),
        ),
        Operation::StopAnimation => Ok(Value::Bool(device.stop_animation())),
        Operation::AsDict => Ok(to_json(device.view())),
    }
}
