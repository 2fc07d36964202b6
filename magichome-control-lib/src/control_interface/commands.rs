//! Builders for the command payloads, before the checksum is appended.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::led::addressable::{CustomModeStep, FixedModeOptions, MultiColorMode};
use crate::led::custom_mode::CustomMode;
use crate::led::led_color::RGB;
use crate::led::pattern::{IA_PATTERN_CODES, IA_PATTERN_OFFSET};

pub const QUERY_STATE: [u8; 3] = [0x81, 0x8a, 0x8b];

/// Mask byte of a color frame which updates every channel.
pub const MASK_ALL: u8 = 0x00;
/// Only the color channels are applied.
pub const MASK_COLOR: u8 = 0xf0;
/// Only the white channels are applied.
pub const MASK_WHITES: u8 = 0x0f;

const TERMINATOR: u8 = 0x0f;

/// Channel values of a color frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorValues {
    pub color: RGB,
    pub warm_white: u8,
    pub cold_white: u8,
}

impl ColorValues {
    pub fn new(color: RGB, warm_white: u8, cold_white: u8) -> Self {
        ColorValues {
            color,
            warm_white,
            cold_white,
        }
    }
}

pub fn power(on: bool) -> [u8; 3] {
    [0x71, if on { 0x23 } else { 0x24 }, TERMINATOR]
}

/// Color change frame. Permanent frames (`0x31`) are remembered by the
/// controller, the non-permanent ones (`0x41`) are meant for effects.
pub fn color(values: &ColorValues, mask: u8, cold_white_support: bool, permanent: bool) -> Vec<u8> {
    let opcode = if permanent { 0x31 } else { 0x41 };
    let RGB { red, green, blue } = values.color;

    let mut payload = vec![opcode, red, green, blue, values.warm_white];
    if cold_white_support {
        payload.push(values.cold_white);
    }
    payload.extend_from_slice(&[mask, TERMINATOR]);
    payload
}

pub fn pattern(code: u8, delay: u8) -> [u8; 4] {
    [0x61, code, delay, TERMINATOR]
}

/// Built-in pattern of addressable controllers. The speed byte is sent raw.
pub fn ia_pattern(code: u16, speed: u8) -> Result<[u8; 5]> {
    if !IA_PATTERN_CODES.contains(&code) {
        return Err(Error::InvalidPatternCode(code));
    }
    let [high, low] = (code + IA_PATTERN_OFFSET).to_be_bytes();
    Ok([0x61, high, low, speed.min(100), TERMINATOR])
}

pub fn custom_pattern(mode: &CustomMode, delay: u8) -> Vec<u8> {
    let mut payload = Vec::with_capacity(70);
    payload.push(0x51);
    for slot in mode.slots() {
        payload.extend_from_slice(&[slot.red, slot.green, slot.blue, 0]);
    }
    payload.extend_from_slice(&[delay, mode.transition_type().opcode(), 0xff, TERMINATOR]);
    payload
}

/// Body of the fixed mode command of addressable controllers.
pub fn fixed_mode(options: &FixedModeOptions) -> Vec<u8> {
    let FixedModeOptions {
        effect,
        speed,
        foreground,
        background,
        ..
    } = *options;

    vec![
        0x41,
        effect.clamp(1, 10),
        foreground.red,
        foreground.green,
        foreground.blue,
        background.red,
        background.green,
        background.blue,
        speed.min(100),
        options.direction_byte(),
        0x00,
        0x00,
        0x00,
    ]
}

pub fn rbm_mode(mode: u8, brightness: u8, speed: u8) -> Vec<u8> {
    vec![
        0x42,
        mode.clamp(1, 100),
        speed.min(100),
        brightness.clamp(1, 100),
        0x00,
    ]
}

/// Body of the color stop command: one color per point followed by
/// the strip length, the effect and the speed.
pub fn multi_color_mode(mode: &MultiColorMode) -> Result<Vec<u8>> {
    let colors = mode.colors()?;
    let length = (colors.len() * 3 + 9) as u16;

    let mut body = Vec::with_capacity(length as usize);
    body.push(0x59);
    body.extend_from_slice(&length.to_be_bytes());
    for color in colors {
        body.extend_from_slice(&[color.red, color.green, color.blue]);
    }
    body.extend_from_slice(&[
        0x00,
        mode.length(),
        mode.effect().code(),
        mode.speed(),
        0x00,
        0x00,
    ]);
    Ok(body)
}

/// Body of the custom animation command, between 1 and 16 steps.
pub fn custom_mode(steps: &[CustomModeStep]) -> Result<Vec<u8>> {
    if steps.is_empty() || steps.len() > 16 {
        return Err(Error::InvalidArgument(format!(
            "a custom mode needs between 1 and 16 steps, got {}",
            steps.len()
        )));
    }

    let mut body = Vec::with_capacity(3 + steps.len() * 9);
    body.push(0x51);
    body.push(steps.len() as u8);
    for step in steps {
        body.extend_from_slice(&step.to_bytes());
    }
    body.push(0x00);
    Ok(body)
}
