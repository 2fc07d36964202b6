//! # Magic Home Control Library
//!
//! `magichome-control-lib` is a Rust library for controlling Magic Home
//! (and compatible) Wi-Fi LED controllers over their binary TCP protocol.
//! Commands are serialized on a single connection per controller, which is
//! opened on demand and closed again once nothing is left to send.
//!
//! This library is designed to be used by command-line tools or other client applications
//! that require control over LED lighting systems.
//!
//! ## Features
//!
//! - Device discovery on local networks
//! - Power, color, white, built-in and custom patterns, state queries
//! - Fixed, color stop and custom animation modes of addressable strips
//! - Effects driven over a persistent connection
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use magichome_control_lib::control_interface::Control;
//! use magichome_control_lib::util::config::ControlOptions;
//! use magichome_control_lib::util::discovery::Discovery;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let devices = Discovery::find_devices(Duration::from_secs(2)).await?;
//!
//!     for device in devices {
//!         let control = Control::new(&device.ip_address.to_string(), ControlOptions::default());
//!         control.turn_on().await?;
//!         control.set_pattern("seven_color_cross_fade", 80).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Disclaimer
//!
//! This project is not affiliated with, authorized by, endorsed by, or in any way officially connected
//! with the manufacturers of Magic Home controllers.

// The `control_interface` module holds the device facades. `Control` covers the
// standard controllers, `ControlAddressable` the individually addressable strips.
//
// Example usage:
//
// ```
// use magichome_control_lib::control_interface::Control;
// use magichome_control_lib::led::led_color::RGB;
// use magichome_control_lib::util::config::ControlOptions;
//
// #[tokio::main]
// async fn main() {
//     let control = Control::new("192.168.1.100", ControlOptions::default());
//     control.set_color(RGB::new(0, 0, 255)).await.unwrap();
// }
// ```
pub mod control_interface;

// The `effect` module drives animations over a persistent connection.
pub mod effect;

pub mod error;

// The `led` module contains the color type and the pattern and mode definitions
// sent to the controllers.
//
// Example usage:
//
// ```
// use magichome_control_lib::led::custom_mode::CustomMode;
// use magichome_control_lib::led::led_color::RGB;
//
// let mode = CustomMode::from_colors(&[RGB::new(255, 0, 0), RGB::new(0, 0, 255)], "fade").unwrap();
// ```
pub mod led;

// The `session` module is the command/response core shared by the facades:
// frame encoding, the command queue and reply aggregation.
pub mod session;

// The `util` module provides configuration and device discovery.
pub mod util;

pub use error::{Error, Result};
