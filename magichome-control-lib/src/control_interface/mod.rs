//! High level control of a single Magic Home controller.
//!
//! [`Control`] translates the device operations into frames and submits them
//! to the controller's [`Session`]. It keeps the last confirmed color values,
//! so partial updates like [`Control::set_warm_white`] can resend the other
//! channels on controllers which don't understand the mask byte.
//!
//! ```no_run
//! use magichome_control_lib::control_interface::Control;
//! use magichome_control_lib::led::led_color::RGB;
//! use magichome_control_lib::util::config::ControlOptions;
//!
//! #[tokio::main]
//! async fn main() -> magichome_control_lib::Result<()> {
//!     let control = Control::new("192.168.1.50", ControlOptions::default());
//!     let state = control.query_state().await?;
//!     println!("{:?} {}", state.mode, state.color);
//!     control.set_color(RGB::new(255, 0, 0)).await?;
//!     Ok(())
//! }
//! ```

pub mod addressable;
pub mod commands;
pub mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::effect::EffectInterface;
use crate::error::{Error, Result};
use crate::led::custom_mode::CustomMode;
use crate::led::led_color::RGB;
use crate::led::pattern::Pattern;
use crate::session::{frame, ConnectionState, Session};
use crate::util::config::{ControlOptions, EffectOptions};
use commands::{ColorValues, MASK_ALL, MASK_COLOR, MASK_WHITES};
use state::QueryState;

/// Values learned from the controller, shared by all clones of a [`Control`].
#[derive(Debug, Default)]
struct DeviceState {
    apply_masks: bool,
    cold_white_support: bool,
    last: ColorValues,
}

#[derive(Debug, Clone)]
pub struct Control {
    session: Session,
    options: ControlOptions,
    device: Arc<Mutex<DeviceState>>,
}

impl Control {
    /// Creates the control for `address`. The connection is only opened once
    /// the first command is sent.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn new(address: &str, options: ControlOptions) -> Self {
        let device = DeviceState {
            apply_masks: options.apply_masks,
            cold_white_support: options.cold_white_support,
            last: ColorValues::default(),
        };
        Control {
            session: Session::new(address, options.session_options()),
            options,
            device: Arc::new(Mutex::new(device)),
        }
    }

    pub fn pattern_names() -> Vec<&'static str> {
        Pattern::names().collect()
    }

    pub fn address(&self) -> &str {
        self.session.address()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.connection_state()
    }

    /// The options as given on construction. Device reconfiguration through
    /// [`Self::query_state`] is reported by [`Self::apply_masks`] and
    /// [`Self::cold_white_support`].
    pub fn options(&self) -> &ControlOptions {
        &self.options
    }

    pub fn apply_masks(&self) -> bool {
        self.device().apply_masks
    }

    pub fn cold_white_support(&self) -> bool {
        self.device().cold_white_support
    }

    /// Last color values sent with success or received by a query.
    pub fn last_values(&self) -> ColorValues {
        self.device().last
    }

    fn device(&self) -> MutexGuard<'_, DeviceState> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends a payload. With `ack` the controller has to answer with at
    /// least one byte for the command to count as a success.
    async fn send(&self, payload: &[u8], ack: bool) -> Result<bool> {
        let reply = self.session.request(frame::encode(payload), ack).await?;
        Ok(!reply.is_empty() || !ack)
    }

    pub async fn set_power(&self, on: bool) -> Result<bool> {
        self.send(&commands::power(on), self.options.ack.power).await
    }

    pub async fn turn_on(&self) -> Result<bool> {
        self.set_power(true).await
    }

    pub async fn turn_off(&self) -> Result<bool> {
        self.set_power(false).await
    }

    /// Sends a color frame and remembers the channels covered by `mask` once
    /// the controller confirmed it.
    async fn send_color(&self, values: ColorValues, mask: u8) -> Result<bool> {
        let cold_white_support = self.cold_white_support();
        let payload = commands::color(&values, mask, cold_white_support, true);

        let applied = self.send(&payload, self.options.ack.color).await?;
        if applied {
            let mut device = self.device();
            match mask {
                MASK_COLOR => device.last.color = values.color,
                MASK_WHITES => {
                    device.last.warm_white = values.warm_white;
                    device.last.cold_white = values.cold_white;
                }
                _ => device.last = values,
            }
        }
        Ok(applied)
    }

    fn warn_unmasked(&self) {
        if self.apply_masks() {
            warn!("Masks are enabled, but a method which does not use them was called");
        }
    }

    /// Sets color and warm white, the cold white value is kept.
    pub async fn set_color_and_warm_white(&self, color: RGB, warm_white: u8) -> Result<bool> {
        self.warn_unmasked();
        let cold_white = self.last_values().cold_white;
        self.send_color(ColorValues::new(color, warm_white, cold_white), MASK_ALL)
            .await
    }

    pub async fn set_color_and_whites(
        &self,
        color: RGB,
        warm_white: u8,
        cold_white: u8,
    ) -> Result<bool> {
        self.warn_unmasked();
        self.send_color(ColorValues::new(color, warm_white, cold_white), MASK_ALL)
            .await
    }

    /// Sets the color channels. Without masks the last white values are
    /// sent along.
    pub async fn set_color(&self, color: RGB) -> Result<bool> {
        if self.apply_masks() {
            return self
                .send_color(ColorValues::new(color, 0, 0), MASK_COLOR)
                .await;
        }
        let last = self.last_values();
        self.send_color(
            ColorValues::new(color, last.warm_white, last.cold_white),
            MASK_ALL,
        )
        .await
    }

    pub async fn set_warm_white(&self, warm_white: u8) -> Result<bool> {
        let last = self.last_values();
        if self.apply_masks() {
            return self
                .send_color(
                    ColorValues::new(RGB::default(), warm_white, last.cold_white),
                    MASK_WHITES,
                )
                .await;
        }
        self.send_color(
            ColorValues::new(last.color, warm_white, last.cold_white),
            MASK_ALL,
        )
        .await
    }

    pub async fn set_whites(&self, warm_white: u8, cold_white: u8) -> Result<bool> {
        if cold_white != 0 && !self.cold_white_support() {
            warn!("Cold white support is not enabled, but the cold white value was set to a non-zero value");
        }

        let (color, mask) = if self.apply_masks() {
            (RGB::default(), MASK_WHITES)
        } else {
            (self.last_values().color, MASK_ALL)
        };
        self.send_color(ColorValues::new(color, warm_white, cold_white), mask)
            .await
    }

    /// Scales `color` by `brightness` (0..=100). Black becomes white of that
    /// brightness, made of the color channels.
    pub async fn set_color_with_brightness(&self, color: RGB, brightness: u8) -> Result<bool> {
        self.set_color(color.with_brightness(brightness)).await
    }

    /// Starts a built-in pattern, `speed` between 0 and 100.
    pub async fn set_pattern(&self, name: &str, speed: u8) -> Result<bool> {
        let code = Pattern::code(name).ok_or_else(|| Error::InvalidPattern(name.to_string()))?;
        let payload = commands::pattern(code, Pattern::speed_to_delay(speed));
        self.send(&payload, self.options.ack.pattern).await
    }

    /// Starts a built-in pattern of addressable controllers, `code` between 1
    /// and 300.
    pub async fn set_ia_pattern(&self, code: u16, speed: u8) -> Result<bool> {
        let payload = commands::ia_pattern(code, speed)?;
        self.send(&payload, self.options.ack.pattern).await
    }

    pub async fn set_custom_pattern(&self, mode: &CustomMode, speed: u8) -> Result<bool> {
        let payload = commands::custom_pattern(mode, Pattern::speed_to_delay(speed));
        self.send(&payload, self.options.ack.custom_pattern).await
    }

    /// Queries the current state.
    ///
    /// The color values are remembered for later partial updates, and
    /// controller types which need masks (or support cold white) switch
    /// those options on.
    pub async fn query_state(&self) -> Result<QueryState> {
        let reply = self
            .session
            .request(frame::encode(&commands::QUERY_STATE), true)
            .await?;
        let state = QueryState::decode(&reply, true)?;

        let mut device = self.device();
        device.last = ColorValues::new(state.color, state.warm_white, state.cold_white);
        match state.device_type {
            0x25 | 0x44 => device.apply_masks = true,
            0x35 => {
                device.apply_masks = true;
                device.cold_white_support = true;
            }
            _ => {}
        }
        debug!(
            "State of {}: type {:#04x}, masks {}, cold white {}",
            self.address(),
            state.device_type,
            device.apply_masks,
            device.cold_white_support
        );

        Ok(state)
    }

    /// An interface for effects driven over a dedicated, persistent
    /// connection. It is not connected yet.
    pub fn effect_mode(&self) -> EffectInterface {
        let device = self.device();
        let options = EffectOptions {
            apply_masks: device.apply_masks,
            cold_white_support: device.cold_white_support,
            ..EffectOptions::from(&self.options)
        };
        EffectInterface::new(self.address(), options)
    }
}
