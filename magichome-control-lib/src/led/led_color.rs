use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RGB {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RGB {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        RGB { red, green, blue }
    }

    pub fn is_black(&self) -> bool {
        self.red == 0 && self.green == 0 && self.blue == 0
    }

    /// Scales the color down by `brightness` (0..=100).
    ///
    /// Black is treated as white, so `RGB::default().with_brightness(50)` is a
    /// half bright white made of the color channels (not the warm white one).
    pub fn with_brightness(&self, brightness: u8) -> Self {
        let brightness = f64::from(brightness.min(100));
        if self.is_black() {
            let value = (255.0 / 100.0 * brightness) as u8;
            return RGB::new(value, value, value);
        }
        let scale = |channel: u8| (f64::from(channel) / 100.0 * brightness).round() as u8;
        RGB::new(scale(self.red), scale(self.green), scale(self.blue))
    }
}

impl From<(u8, u8, u8)> for RGB {
    fn from(tuple: (u8, u8, u8)) -> Self {
        RGB {
            red: tuple.0,
            green: tuple.1,
            blue: tuple.2,
        }
    }
}

impl From<RGB> for (u8, u8, u8) {
    fn from(rgb: RGB) -> Self {
        (rgb.red, rgb.green, rgb.blue)
    }
}

impl fmt::Display for RGB {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.red, self.green, self.blue)
    }
}

/// Parses `"r,g,b"`.
impl FromStr for RGB {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(anyhow!("Invalid color '{}', expected r,g,b", s));
        }
        let channel = |part: &str| -> anyhow::Result<u8> {
            part.parse::<u8>()
                .with_context(|| format!("Invalid color channel '{}'", part))
        };
        Ok(RGB::new(
            channel(parts[0])?,
            channel(parts[1])?,
            channel(parts[2])?,
        ))
    }
}
