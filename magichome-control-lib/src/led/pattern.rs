use std::collections::HashMap;

use lazy_static::lazy_static;

/// Built-in patterns and their opcodes, in opcode order.
pub const PATTERNS: [(&str, u8); 20] = [
    ("seven_color_cross_fade", 0x25),
    ("red_gradual_change", 0x26),
    ("green_gradual_change", 0x27),
    ("blue_gradual_change", 0x28),
    ("yellow_gradual_change", 0x29),
    ("cyan_gradual_change", 0x2a),
    ("purple_gradual_change", 0x2b),
    ("white_gradual_change", 0x2c),
    ("red_green_cross_fade", 0x2d),
    ("red_blue_cross_fade", 0x2e),
    ("green_blue_cross_fade", 0x2f),
    ("seven_color_strobe_flash", 0x30),
    ("red_strobe_flash", 0x31),
    ("green_strobe_flash", 0x32),
    ("blue_stobe_flash", 0x33),
    ("yellow_strobe_flash", 0x34),
    ("cyan_strobe_flash", 0x35),
    ("purple_strobe_flash", 0x36),
    ("white_strobe_flash", 0x37),
    ("seven_color_jumping", 0x38),
];

/// Opcode range of the built-in patterns.
pub const PATTERN_CODES: std::ops::RangeInclusive<u8> = 0x25..=0x38;

/// Valid codes of the individually addressable built-in patterns.
pub const IA_PATTERN_CODES: std::ops::RangeInclusive<u16> = 1..=300;

/// Offset between an addressable pattern code and its value on the wire.
pub const IA_PATTERN_OFFSET: u16 = 99;

lazy_static! {
    static ref PATTERN_BY_NAME: HashMap<&'static str, u8> = PATTERNS.iter().copied().collect();
}

pub struct Pattern;

impl Pattern {
    pub fn names() -> impl Iterator<Item = &'static str> {
        PATTERNS.iter().map(|(name, _)| *name)
    }

    pub fn code(name: &str) -> Option<u8> {
        PATTERN_BY_NAME.get(name).copied()
    }

    pub fn name(code: u8) -> Option<&'static str> {
        PATTERNS
            .iter()
            .find(|(_, pattern_code)| *pattern_code == code)
            .map(|(name, _)| *name)
    }

    /// Maps the client-facing speed (0..=100, higher is faster) onto the
    /// controller's delay byte (31..=1).
    pub fn speed_to_delay(speed: u8) -> u8 {
        let speed = f64::from(speed.min(100));
        let delay = ((30.0 - (speed / 100.0) * 30.0) + 1.0).round();
        delay.clamp(1.0, 31.0) as u8
    }

    /// Inverse of [`Self::speed_to_delay`]. The result may be fractional.
    pub fn delay_to_speed(delay: u8) -> f64 {
        let delay = f64::from(delay.clamp(1, 31)) - 1.0;
        100.0 - (delay / 30.0 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_table() {
        assert_eq!(Pattern::names().count(), 20);
        assert_eq!(Pattern::code("seven_color_cross_fade"), Some(0x25));
        assert_eq!(Pattern::code("seven_color_jumping"), Some(0x38));
        assert_eq!(Pattern::code("rainbow"), None);
        assert_eq!(Pattern::name(0x31), Some("red_strobe_flash"));
        assert_eq!(Pattern::name(0x39), None);
        assert!(PATTERNS.iter().all(|(_, code)| PATTERN_CODES.contains(code)));
    }

    #[test]
    fn test_speed_delay_bounds() {
        assert_eq!(Pattern::speed_to_delay(0), 31);
        assert_eq!(Pattern::speed_to_delay(100), 1);
        assert_eq!(Pattern::speed_to_delay(255), 1);
        assert_eq!(Pattern::delay_to_speed(1), 100.0);
        assert_eq!(Pattern::delay_to_speed(31), 0.0);
        assert_eq!(Pattern::delay_to_speed(0), 100.0);
        assert_eq!(Pattern::delay_to_speed(200), 0.0);
    }

    #[test]
    fn test_speed_delay_rounding() {
        assert_eq!(Pattern::speed_to_delay(50), 16);
        // 8.5 rounds away from zero
        assert_eq!(Pattern::speed_to_delay(75), 9);
    }

    #[test]
    fn test_speed_round_trip_within_tolerance() {
        // one delay step spans 100/30 speed units
        let tolerance = 100.0 / 30.0 / 2.0 + 1e-9;
        for speed in [0u8, 1, 10, 25, 33, 50, 66, 75, 90, 99, 100] {
            let back = Pattern::delay_to_speed(Pattern::speed_to_delay(speed));
            assert!(
                (back - f64::from(speed)).abs() <= tolerance,
                "speed {} came back as {}",
                speed,
                back
            );
        }
    }
}
