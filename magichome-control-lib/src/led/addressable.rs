//! Mode definitions for individually addressable strip controllers.

use std::collections::BTreeMap;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::led::led_color::RGB;

/// Effects of the multi color (color stop) mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressableEffect {
    #[default]
    Static,
    RunningWater,
    Strobe,
    Jump,
    Breathing,
}

impl AddressableEffect {
    pub fn code(&self) -> u8 {
        match self {
            AddressableEffect::Static => 1,
            AddressableEffect::RunningWater => 2,
            AddressableEffect::Strobe => 3,
            AddressableEffect::Jump => 4,
            AddressableEffect::Breathing => 5,
        }
    }
}

impl FromStr for AddressableEffect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "static" => Ok(AddressableEffect::Static),
            "running_water" => Ok(AddressableEffect::RunningWater),
            "strobe" => Ok(AddressableEffect::Strobe),
            "jump" => Ok(AddressableEffect::Jump),
            "breathing" => Ok(AddressableEffect::Breathing),
            _ => Err(Error::InvalidArgument(format!("'{}' is not a valid effect", s))),
        }
    }
}

/// A strip of `length` points colored by stops: every point takes the color
/// of the closest stop at or before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiColorMode {
    length: u8,
    effect: AddressableEffect,
    speed: u8,
    color_stops: BTreeMap<u8, RGB>,
}

impl MultiColorMode {
    pub fn new(length: u8) -> Result<Self> {
        if length == 0 {
            return Err(Error::InvalidArgument("length must be at least 1".to_string()));
        }
        Ok(MultiColorMode {
            length,
            effect: AddressableEffect::Static,
            speed: 100,
            color_stops: BTreeMap::new(),
        })
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    pub fn effect(&self) -> AddressableEffect {
        self.effect
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn set_effect(&mut self, effect: AddressableEffect) -> &mut Self {
        self.effect = effect;
        self
    }

    /// Clamped into `0..=100`.
    pub fn set_speed(&mut self, speed: u8) -> &mut Self {
        self.speed = speed.min(100);
        self
    }

    pub fn add_color_stop(&mut self, start: u8, color: RGB) -> Result<&mut Self> {
        if start >= self.length {
            return Err(Error::InvalidArgument(format!(
                "start value {} is out of range (length {})",
                start, self.length
            )));
        }
        self.color_stops.insert(start, color);
        Ok(self)
    }

    /// One color per point.
    pub fn colors(&self) -> Result<Vec<RGB>> {
        let mut current = *self
            .color_stops
            .get(&0)
            .ok_or_else(|| Error::InvalidArgument("no start color defined".to_string()))?;

        Ok((0..self.length)
            .map(|point| {
                if let Some(color) = self.color_stops.get(&point) {
                    current = *color;
                }
                current
            })
            .collect())
    }
}

/// Settings of the fixed (single effect) mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedModeOptions {
    /// Effect number, clamped into `1..=10`.
    pub effect: u8,
    /// Clamped into `0..=100`.
    pub speed: u8,
    pub foreground: RGB,
    pub background: RGB,
    /// Ignored by the effects 1, 7 and 8, which can't run backwards.
    pub reversed: bool,
}

impl Default for FixedModeOptions {
    fn default() -> Self {
        FixedModeOptions {
            effect: 1,
            speed: 50,
            foreground: RGB::default(),
            background: RGB::default(),
            reversed: false,
        }
    }
}

impl FixedModeOptions {
    pub fn direction_byte(&self) -> u8 {
        match self.effect.clamp(1, 10) {
            1 | 7 | 8 => 0xff,
            _ => self.reversed as u8,
        }
    }
}

/// One step of a custom animation on an addressable strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomModeStep {
    effect: u8,
    foreground: RGB,
    background: RGB,
    segmentation: bool,
    left_direction: bool,
    speed: u8,
}

impl Default for CustomModeStep {
    fn default() -> Self {
        CustomModeStep {
            effect: 1,
            foreground: RGB::default(),
            background: RGB::default(),
            segmentation: false,
            left_direction: false,
            speed: 50,
        }
    }
}

impl CustomModeStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effect number between 1 and 33.
    pub fn set_effect(&mut self, effect: u8) -> Result<&mut Self> {
        if !(1..=33).contains(&effect) {
            return Err(Error::InvalidArgument(format!(
                "effect number {} out of range",
                effect
            )));
        }
        self.effect = effect;
        Ok(self)
    }

    pub fn set_foreground_color(&mut self, color: RGB) -> &mut Self {
        self.foreground = color;
        self
    }

    pub fn set_background_color(&mut self, color: RGB) -> &mut Self {
        self.background = color;
        self
    }

    pub fn set_segmentation(&mut self, segmentation: bool) -> &mut Self {
        self.segmentation = segmentation;
        self
    }

    /// `false` runs right, `true` runs left.
    pub fn set_direction(&mut self, left: bool) -> &mut Self {
        self.left_direction = left;
        self
    }

    pub fn set_speed(&mut self, speed: u8) -> Result<&mut Self> {
        if speed > 100 {
            return Err(Error::InvalidArgument(format!("speed {} out of range", speed)));
        }
        self.speed = speed;
        Ok(self)
    }

    /// The step as sent inside a custom mode frame:
    /// effect, foreground, background, flags, speed.
    pub fn to_bytes(&self) -> [u8; 9] {
        let flags = (self.segmentation as u8) | (self.left_direction as u8) << 1;
        [
            self.effect,
            self.foreground.red,
            self.foreground.green,
            self.foreground.blue,
            self.background.red,
            self.background.green,
            self.background.blue,
            flags,
            self.speed,
        ]
    }
}
