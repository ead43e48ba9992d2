//! Colors and their representations.
//!
//! A [`Color`] is stored as an 8-bit RGB triple and can be built from, or
//! rendered as, a hex string, an HSV triple, or a name. Names resolve through a
//! small table whose first twelve entries are the [`COLOR_WHEEL`] used by
//! color-cycling animations, so every wheel entry round-trips through every
//! representation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

/// Why a color representation could not be converted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ColorError {
    #[error("invalid hex color {0:?}")]
    InvalidHex(String),

    #[error("unknown color name {0:?}")]
    UnknownName(String),

    #[error("{component} must be within [0, 1], got {value}")]
    OutOfRange { component: &'static str, value: f64 },
}

pub const RED: Color = Color::from_rgb(255, 0, 0);
pub const ORANGE: Color = Color::from_rgb(255, 125, 0);
pub const YELLOW: Color = Color::from_rgb(255, 255, 0);
pub const SPRING_GREEN: Color = Color::from_rgb(125, 255, 0);
pub const GREEN: Color = Color::from_rgb(0, 255, 0);
pub const TURQUOISE: Color = Color::from_rgb(0, 255, 125);
pub const CYAN: Color = Color::from_rgb(0, 255, 255);
pub const OCEAN: Color = Color::from_rgb(0, 125, 255);
pub const BLUE: Color = Color::from_rgb(0, 0, 255);
pub const VIOLET: Color = Color::from_rgb(125, 0, 255);
pub const MAGENTA: Color = Color::from_rgb(255, 0, 255);
pub const RASPBERRY: Color = Color::from_rgb(255, 0, 125);
pub const WHITE: Color = Color::from_rgb(255, 255, 255);
pub const BLACK: Color = Color::from_rgb(0, 0, 0);

/// The twelve-step wheel walked by `color_cycle`.
pub const COLOR_WHEEL: [Color; 12] = [
    RED,
    ORANGE,
    YELLOW,
    SPRING_GREEN,
    GREEN,
    TURQUOISE,
    CYAN,
    OCEAN,
    BLUE,
    VIOLET,
    MAGENTA,
    RASPBERRY,
];

/// Reverse lookups return the first match, so wheel names win over aliases.
const NAMED: &[(&str, Color)] = &[
    ("red", RED),
    ("orange", ORANGE),
    ("yellow", YELLOW),
    ("spring green", SPRING_GREEN),
    ("green", GREEN),
    ("turquoise", TURQUOISE),
    ("cyan", CYAN),
    ("ocean", OCEAN),
    ("blue", BLUE),
    ("violet", VIOLET),
    ("magenta", MAGENTA),
    ("raspberry", RASPBERRY),
    ("white", WHITE),
    ("black", BLACK),
    ("gray", Color::from_rgb(128, 128, 128)),
    ("grey", Color::from_rgb(128, 128, 128)),
    ("silver", Color::from_rgb(192, 192, 192)),
    ("maroon", Color::from_rgb(128, 0, 0)),
    ("olive", Color::from_rgb(128, 128, 0)),
    ("lime", GREEN),
    ("aqua", CYAN),
    ("teal", Color::from_rgb(0, 128, 128)),
    ("navy", Color::from_rgb(0, 0, 128)),
    ("fuchsia", MAGENTA),
    ("purple", Color::from_rgb(128, 0, 128)),
    ("pink", Color::from_rgb(255, 192, 203)),
    ("brown", Color::from_rgb(165, 42, 42)),
    ("gold", Color::from_rgb(255, 215, 0)),
];

impl Color {
    #[must_use]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB`, `RRGGBB`, or the short `#RGB` form.
    ///
    /// # Errors
    ///
    /// Returns [`ColorError::InvalidHex`] for any other input.
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let invalid = || ColorError::InvalidHex(hex.to_string());
        let digits = hex.trim().trim_start_matches('#');
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match digits.len() {
            6 => Ok(Self::from_rgb(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                let short = |i: usize| channel(&digits[i..=i]).map(|v| v * 17);
                Ok(Self::from_rgb(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }

    /// Build from HSV. The hue wraps around; saturation and value must lie in
    /// `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`ColorError::OutOfRange`] when `s` or `v` is outside `[0, 1]`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_hsv(h: f64, s: f64, v: f64) -> Result<Self, ColorError> {
        check_unit("saturation", s)?;
        check_unit("value", v)?;
        if !h.is_finite() {
            return Err(ColorError::OutOfRange {
                component: "hue",
                value: h,
            });
        }

        let h = h.rem_euclid(360.0);
        let c = v * s;
        let sector = h / 60.0;
        let x = c * (1.0 - (sector % 2.0 - 1.0).abs());
        let (r, g, b) = match sector.floor() as u8 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = v - c;
        Ok(Self::from_rgb(
            to_channel(r + m),
            to_channel(g + m),
            to_channel(b + m),
        ))
    }

    /// Resolve a color name. Matching ignores case, spaces, `_` and `-`.
    ///
    /// # Errors
    ///
    /// Returns [`ColorError::UnknownName`] when the name is not in the table.
    pub fn from_name(name: &str) -> Result<Self, ColorError> {
        let wanted = normalize(name);
        NAMED
            .iter()
            .find(|(candidate, _)| normalize(candidate) == wanted)
            .map(|(_, color)| *color)
            .ok_or_else(|| ColorError::UnknownName(name.to_string()))
    }

    #[must_use]
    pub fn rgb(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    /// Lowercase `#rrggbb`.
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    #[must_use]
    pub fn hsv(self) -> Hsv {
        let r = f64::from(self.r) / 255.0;
        let g = f64::from(self.g) / 255.0;
        let b = f64::from(self.b) / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let h = if delta == 0.0 {
            0.0
        } else if (max - r).abs() < f64::EPSILON {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if (max - g).abs() < f64::EPSILON {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let s = if max == 0.0 { 0.0 } else { delta / max };

        Hsv { h, s, v: max }
    }

    /// The table name of this exact color, if any.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        NAMED
            .iter()
            .find(|(_, color)| *color == self)
            .map(|(name, _)| *name)
    }

    #[must_use]
    pub fn is_black(self) -> bool {
        self == BLACK
    }

    /// Intermediate colors from `self` to `target`, ending exactly on `target`.
    #[must_use]
    pub fn fade_to(self, target: Self, steps: u16) -> Vec<Self> {
        let steps = steps.max(1);
        (1..=steps)
            .map(|i| {
                let lerp = |from: u8, to: u8| {
                    let delta = f64::from(from) - f64::from(to);
                    let moved = (f64::from(i) * delta / f64::from(steps)).floor();
                    to_channel((f64::from(from) - moved) / 255.0)
                };
                Self::from_rgb(
                    lerp(self.r, target.r),
                    lerp(self.g, target.g),
                    lerp(self.b, target.b),
                )
            })
            .collect()
    }

    /// Serializable summary used in display models.
    #[must_use]
    pub fn view(self) -> ColorView {
        let (r, g, b) = self.rgb();
        ColorView {
            name: self.name().unwrap_or("unnamed color").to_string(),
            rgb: [r, g, b],
            hsv: self.hsv(),
            hex: self.hex(),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}:{}", self.hex()),
            None => f.write_str(&self.hex()),
        }
    }
}

/// Every representation of a color at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorView {
    pub name: String,
    pub rgb: [u8; 3],
    pub hsv: Hsv,
    pub hex: String,
}

/// A color as it may arrive on the bus.
///
/// Accepts a name or hex string, an `[r, g, b]` array, an `{r, g, b}` or
/// `{h, s, v}` object, or a previously emitted [`ColorView`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Text(String),
    Triple([u8; 3]),
    Rgb { r: u8, g: u8, b: u8 },
    Hsv { h: f64, s: f64, v: f64 },
    View { rgb: [u8; 3] },
}

impl ColorSpec {
    /// Convert into a concrete [`Color`].
    ///
    /// Text is tried as a name first, then as hex.
    ///
    /// # Errors
    ///
    /// Returns a [`ColorError`] when the text is neither a known name nor hex,
    /// or when HSV components are out of range.
    pub fn resolve(&self) -> Result<Color, ColorError> {
        match self {
            Self::Text(text) if text.trim_start().starts_with('#') => Color::from_hex(text),
            Self::Text(text) => {
                Color::from_name(text).or_else(|_| {
                    Color::from_hex(text).map_err(|_| ColorError::UnknownName(text.clone()))
                })
            }
            Self::Triple([r, g, b]) | Self::View { rgb: [r, g, b] } => {
                Ok(Color::from_rgb(*r, *g, *b))
            }
            Self::Rgb { r, g, b } => Ok(Color::from_rgb(*r, *g, *b)),
            Self::Hsv { h, s, v } => Color::from_hsv(*h, *s, *v),
        }
    }
}

fn check_unit(component: &'static str, value: f64) -> Result<(), ColorError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ColorError::OutOfRange { component, value })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(unit: f64) -> u8 {
    (unit * 255.0).round().clamp(0.0, 255.0) as u8
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_uppercase_hex() {
        let color = Color::from_hex("#FF0000").unwrap();
        assert_eq!(color.rgb(), (255, 0, 0));
    }

    #[test]
    fn should_parse_hex_without_hash_and_short_form() {
        assert_eq!(Color::from_hex("00ff80").unwrap().rgb(), (0, 255, 128));
        assert_eq!(Color::from_hex("#0f0").unwrap(), GREEN);
    }

    #[test]
    fn should_reject_malformed_hex() {
        assert!(matches!(
            Color::from_hex("#12345"),
            Err(ColorError::InvalidHex(_))
        ));
        assert!(Color::from_hex("#gg0000").is_err());
    }

    #[test]
    fn should_return_to_rgb_through_hsv() {
        let red = Color::from_hex("#FF0000").unwrap();
        let hsv = red.hsv();
        let back = Color::from_hsv(hsv.h, hsv.s, hsv.v).unwrap();
        assert_eq!(back, red);
    }

    #[test]
    fn should_roundtrip_every_wheel_color_through_all_representations() {
        for color in COLOR_WHEEL {
            let hsv = color.hsv();
            assert_eq!(Color::from_hsv(hsv.h, hsv.s, hsv.v).unwrap(), color);
            assert_eq!(Color::from_hex(&color.hex()).unwrap(), color);
            let name = color.name().unwrap();
            assert_eq!(Color::from_name(name).unwrap(), color);
        }
    }

    #[test]
    fn should_roundtrip_arbitrary_colors_through_hsv() {
        for (r, g, b) in [(12, 200, 99), (1, 2, 3), (250, 128, 7), (128, 128, 128)] {
            let color = Color::from_rgb(r, g, b);
            let hsv = color.hsv();
            assert_eq!(Color::from_hsv(hsv.h, hsv.s, hsv.v).unwrap(), color);
        }
    }

    #[test]
    fn should_resolve_names_loosely() {
        assert_eq!(Color::from_name("Spring_Green").unwrap(), SPRING_GREEN);
        assert_eq!(Color::from_name("springgreen").unwrap(), SPRING_GREEN);
        assert!(matches!(
            Color::from_name("octarine"),
            Err(ColorError::UnknownName(_))
        ));
    }

    #[test]
    fn should_prefer_wheel_name_for_aliased_rgb() {
        assert_eq!(Color::from_name("lime").unwrap().name(), Some("green"));
    }

    #[test]
    fn should_reject_out_of_range_saturation() {
        assert!(matches!(
            Color::from_hsv(10.0, 1.5, 1.0),
            Err(ColorError::OutOfRange {
                component: "saturation",
                ..
            })
        ));
    }

    #[test]
    fn should_wrap_hue() {
        assert_eq!(Color::from_hsv(360.0, 1.0, 1.0).unwrap(), RED);
        assert_eq!(Color::from_hsv(-120.0, 1.0, 1.0).unwrap(), BLUE);
    }

    #[test]
    fn should_fade_onto_target() {
        let steps = RED.fade_to(BLUE, 10);
        assert_eq!(steps.len(), 10);
        assert_eq!(steps.last().copied(), Some(BLUE));
        assert!(steps[0].r < 255 && steps[0].b > 0);
    }

    #[test]
    fn should_describe_unnamed_color() {
        let view = Color::from_rgb(1, 2, 3).view();
        assert_eq!(view.name, "unnamed color");
        assert_eq!(view.hex, "#010203");
        assert_eq!(view.rgb, [1, 2, 3]);
    }

    #[test]
    fn should_resolve_bus_color_specs() {
        let cases = [
            (serde_json::json!("red"), RED),
            (serde_json::json!("#0000ff"), BLUE),
            (serde_json::json!("00ffff"), CYAN),
            (serde_json::json!([255, 125, 0]), ORANGE),
            (serde_json::json!({"r": 0, "g": 255, "b": 125}), TURQUOISE),
            (serde_json::json!({"h": 300.0, "s": 1.0, "v": 1.0}), MAGENTA),
            (serde_json::to_value(VIOLET.view()).unwrap(), VIOLET),
        ];
        for (json, expected) in cases {
            let spec: ColorSpec = serde_json::from_value(json.clone()).unwrap();
            assert_eq!(spec.resolve().unwrap(), expected, "{json}");
        }
    }

    #[test]
    fn should_report_unknown_text_spec_as_unknown_name() {
        let spec = ColorSpec::Text("sparkly".to_string());
        assert!(matches!(spec.resolve(), Err(ColorError::UnknownName(_))));
    }
}
