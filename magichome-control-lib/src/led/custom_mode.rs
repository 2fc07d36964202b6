use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::led::led_color::RGB;

/// Number of color slots in a custom pattern frame.
pub const CUSTOM_MODE_SLOTS: usize = 16;

/// Filler for unused color slots.
pub const PLACEHOLDER_COLOR: RGB = RGB::new(1, 2, 3);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    #[default]
    Fade,
    Jump,
    Strobe,
}

impl TransitionType {
    pub fn opcode(&self) -> u8 {
        match self {
            TransitionType::Fade => 0x3a,
            TransitionType::Jump => 0x3b,
            TransitionType::Strobe => 0x3c,
        }
    }
}

impl FromStr for TransitionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fade" => Ok(TransitionType::Fade),
            "jump" => Ok(TransitionType::Jump),
            "strobe" => Ok(TransitionType::Strobe),
            _ => Err(Error::InvalidTransition(s.to_string())),
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionType::Fade => "fade",
            TransitionType::Jump => "jump",
            TransitionType::Strobe => "strobe",
        };
        write!(f, "{}", name)
    }
}

/// A user defined sequence of up to 16 colors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomMode {
    colors: Vec<RGB>,
    transition_type: TransitionType,
}

impl CustomMode {
    pub fn new(transition_type: TransitionType) -> Self {
        CustomMode {
            colors: Vec::new(),
            transition_type,
        }
    }

    /// Builds a mode from a color list and a transition name, e.g. `"jump"`.
    pub fn from_colors(colors: &[RGB], transition_type: &str) -> Result<Self> {
        let mut mode = CustomMode::new(transition_type.parse()?);
        mode.add_color_list(colors)?;
        Ok(mode)
    }

    pub fn colors(&self) -> &[RGB] {
        &self.colors
    }

    pub fn transition_type(&self) -> TransitionType {
        self.transition_type
    }

    pub fn add_color(&mut self, color: RGB) -> Result<&mut Self> {
        if self.colors.len() >= CUSTOM_MODE_SLOTS {
            return Err(Error::TooManyColors(self.colors.len() + 1));
        }
        self.colors.push(color);
        Ok(self)
    }

    /// Adds all colors or none of them.
    pub fn add_color_list(&mut self, colors: &[RGB]) -> Result<&mut Self> {
        let total = self.colors.len() + colors.len();
        if total > CUSTOM_MODE_SLOTS {
            return Err(Error::TooManyColors(total));
        }
        self.colors.extend_from_slice(colors);
        Ok(self)
    }

    pub fn set_transition_type(&mut self, transition_type: TransitionType) -> &mut Self {
        self.transition_type = transition_type;
        self
    }

    /// The 16 slots as sent on the wire, unused ones hold the placeholder.
    pub fn slots(&self) -> [RGB; CUSTOM_MODE_SLOTS] {
        let mut slots = [PLACEHOLDER_COLOR; CUSTOM_MODE_SLOTS];
        for (slot, color) in slots.iter_mut().zip(self.colors.iter()) {
            *slot = *color;
        }
        slots
    }
}
