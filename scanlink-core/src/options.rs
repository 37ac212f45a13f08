//! Scanner options
//!
//! Recognized keys are typed; anything else is kept in a passthrough bag
//! and handed to the device untouched.
//!
//! | Key         | Values                                   | Default      |
//! |-------------|------------------------------------------|--------------|
//! | `source`    | `ADF Front`, `ADF Back`, `ADF Duplex`    | `ADF Duplex` |
//! | `mode`      | `Lineart`, `Halftone`, `Gray`, `Color`   | `Color`      |
//! | `resolution`| 50..=600 dpi                             | 300          |
//! | `ald`       | 0/1 (auto length detection)              | 1            |
//! | `swskip`    | 0.0..=100.0 (blank page skip threshold)  | 15.0         |
//! | `swcrop`    | 0/1                                      | 1            |
//! | `swdeskew`  | 0/1                                      | 1            |
//! | `swdespeck` | 0..=9                                    | 1            |

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Paper source
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    AdfFront,
    AdfBack,
    AdfDuplex,
}

impl Source {
    pub fn name(self) -> &'static str {
        match self {
            Self::AdfFront => "ADF Front",
            Self::AdfBack => "ADF Back",
            Self::AdfDuplex => "ADF Duplex",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "ADF Front" => Some(Self::AdfFront),
            "ADF Back" => Some(Self::AdfBack),
            "ADF Duplex" => Some(Self::AdfDuplex),
            _ => None,
        }
    }
}

/// Color mode
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ColorMode {
    Lineart,
    Halftone,
    Gray,
    Color,
}

impl ColorMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Lineart => "Lineart",
            Self::Halftone => "Halftone",
            Self::Gray => "Gray",
            Self::Color => "Color",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            // The controller menu labels line art as B/W
            "Lineart" | "B/W" => Some(Self::Lineart),
            "Halftone" => Some(Self::Halftone),
            "Gray" => Some(Self::Gray),
            "Color" => Some(Self::Color),
            _ => None,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Complete option set applied to the device for one scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub source: Source,
    pub mode: ColorMode,
    /// Dots per inch
    pub resolution: u32,
    /// Automatic page length detection
    pub auto_length_detection: bool,
    /// Blank page skip threshold, percent
    pub blank_skip: f64,
    pub crop: bool,
    pub deskew: bool,
    /// Despeckle strength
    pub despeck: u8,
    /// Unrecognized keys, passed through to the device
    pub extra: BTreeMap<String, Value>,
}

impl ScanOptions {
    pub const MIN_RESOLUTION: u32 = 50;
    pub const MAX_RESOLUTION: u32 = 600;
    pub const MAX_DESPECK: u8 = 9;

    /// Return a copy with `overrides` layered on top
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if a recognized key has a value of
    /// the wrong type or outside its range.
    ///
    /// # Examples
    ///
    /// ```
    /// use scanlink_core::options::{ColorMode, ScanOptions};
    /// use serde_json::json;
    ///
    /// let overrides = json!({"mode": "Gray", "page_loaded": 1});
    /// let options = ScanOptions::default()
    ///     .merged(overrides.as_object().unwrap())
    ///     .unwrap();
    ///
    /// assert_eq!(options.mode, ColorMode::Gray);
    /// assert_eq!(options.resolution, 300);
    /// assert!(options.extra.contains_key("page_loaded"));
    /// ```
    pub fn merged(&self, overrides: &Map<String, Value>) -> Result<Self> {
        let mut options = self.clone();
        for (key, value) in overrides {
            options.set(key, value)?;
        }
        Ok(options)
    }

    /// Set a single option by its device key
    pub fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        match key {
            "source" => {
                self.source = as_str(key, value).and_then(|s| {
                    Source::parse(s).ok_or_else(|| invalid(key, format!("unknown source {:?}", s)))
                })?;
            }
            "mode" => {
                self.mode = as_str(key, value).and_then(|s| {
                    ColorMode::parse(s).ok_or_else(|| invalid(key, format!("unknown mode {:?}", s)))
                })?;
            }
            "resolution" => {
                let dpi = as_integer(key, value)?;
                if !(Self::MIN_RESOLUTION as u64..=Self::MAX_RESOLUTION as u64).contains(&dpi) {
                    return Err(invalid(
                        key,
                        format!("{} outside {}..={}", dpi, Self::MIN_RESOLUTION, Self::MAX_RESOLUTION),
                    ));
                }
                self.resolution = dpi as u32;
            }
            "ald" => self.auto_length_detection = as_flag(key, value)?,
            "swskip" => {
                let percent = value
                    .as_f64()
                    .ok_or_else(|| invalid(key, "expected a number".into()))?;
                if !(0.0..=100.0).contains(&percent) {
                    return Err(invalid(key, format!("{} outside 0..=100", percent)));
                }
                self.blank_skip = percent;
            }
            "swcrop" => self.crop = as_flag(key, value)?,
            "swdeskew" => self.deskew = as_flag(key, value)?,
            "swdespeck" => {
                let level = as_integer(key, value)?;
                if level > Self::MAX_DESPECK as u64 {
                    return Err(invalid(key, format!("{} outside 0..={}", level, Self::MAX_DESPECK)));
                }
                self.despeck = level as u8;
            }
            _ => {
                self.extra.insert(key.to_string(), value.clone());
            }
        }

        Ok(())
    }

    /// Flatten into the key/value map a device option setter consumes
    pub fn to_device_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("source".into(), Value::from(self.source.name()));
        map.insert("mode".into(), Value::from(self.mode.name()));
        map.insert("resolution".into(), Value::from(self.resolution));
        map.insert("ald".into(), Value::from(self.auto_length_detection as u8));
        map.insert("swskip".into(), Value::from(self.blank_skip));
        map.insert("swcrop".into(), Value::from(self.crop as u8));
        map.insert("swdeskew".into(), Value::from(self.deskew as u8));
        map.insert("swdespeck".into(), Value::from(self.despeck));

        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }

        map
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            source: Source::AdfDuplex,
            mode: ColorMode::Color,
            resolution: 300,
            auto_length_detection: true,
            blank_skip: 15.0,
            crop: true,
            deskew: true,
            despeck: 1,
            extra: BTreeMap::new(),
        }
    }
}

fn invalid(key: &str, reason: String) -> Error {
    Error::InvalidOption {
        key: key.to_string(),
        reason,
    }
}

fn as_str<'a>(key: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| invalid(key, "expected a string".into()))
}

fn as_integer(key: &str, value: &Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| invalid(key, "expected a non-negative integer".into()))
}

// Device flags arrive as 0/1 or as JSON booleans
fn as_flag(key: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(invalid(key, format!("expected 0 or 1, got {}", n))),
        },
        _ => Err(invalid(key, "expected 0/1 or a boolean".into())),
    }
}
