pub mod addressable;
pub mod custom_mode;
pub mod led_color;
pub mod pattern;
