//! Control of individually addressable strip controllers.
//!
//! Mode commands are wrapped in the sequenced frame of these controllers and
//! are not acknowledged. Power and state queries use the standard frames.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use log::debug;

use super::commands;
use super::state::QueryState;
use crate::error::Result;
use crate::led::addressable::{CustomModeStep, FixedModeOptions, MultiColorMode};
use crate::session::{frame, ConnectionState, Session};
use crate::util::config::AddressableOptions;

#[derive(Debug, Clone)]
pub struct ControlAddressable {
    session: Session,
    options: AddressableOptions,
    sequence: Arc<AtomicU8>,
}

impl ControlAddressable {
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn new(address: &str, options: AddressableOptions) -> Self {
        ControlAddressable {
            session: Session::new(address, options.session_options()),
            options,
            sequence: Arc::new(AtomicU8::new(0)),
        }
    }

    pub fn address(&self) -> &str {
        self.session.address()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.connection_state()
    }

    pub fn options(&self) -> &AddressableOptions {
        &self.options
    }

    /// Wraps `body` with the next sequence number, which wraps after 255.
    fn wrap(&self, body: &[u8]) -> Result<Bytes> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let payload = frame::wrap_addressable(sequence, body)?;
        Ok(frame::encode(&payload))
    }

    async fn send_mode(&self, body: &[u8]) -> Result<()> {
        let frame = self.wrap(body)?;
        debug!("Addressable command {:02x?} for {}", body.first(), self.address());
        self.session.request(frame, false).await?;
        Ok(())
    }

    /// Always waits for the controller to answer.
    pub async fn set_power(&self, on: bool) -> Result<bool> {
        let reply = self
            .session
            .request(frame::encode(&commands::power(on)), true)
            .await?;
        Ok(!reply.is_empty())
    }

    pub async fn turn_on(&self) -> Result<bool> {
        self.set_power(true).await
    }

    pub async fn turn_off(&self) -> Result<bool> {
        self.set_power(false).await
    }

    /// Queries the current state. The mode is not classified for these
    /// controllers and is always `None`.
    pub async fn query_state(&self) -> Result<QueryState> {
        let reply = self
            .session
            .request(frame::encode(&commands::QUERY_STATE), true)
            .await?;
        debug!("State reply of {}: {}", self.address(), hex::encode(&reply));
        QueryState::decode(&reply, false)
    }

    pub async fn set_fixed_mode(&self, options: &FixedModeOptions) -> Result<()> {
        self.send_mode(&commands::fixed_mode(options)).await
    }

    /// `mode` between 1 and 100.
    pub async fn set_rbm_mode(&self, mode: u8, brightness: u8, speed: u8) -> Result<()> {
        self.send_mode(&commands::rbm_mode(mode, brightness, speed))
            .await
    }

    pub async fn set_multi_color_mode(&self, mode: &MultiColorMode) -> Result<()> {
        let body = commands::multi_color_mode(mode)?;
        self.send_mode(&body).await
    }

    pub async fn set_custom_mode(&self, steps: &[CustomModeStep]) -> Result<()> {
        let body = commands::custom_mode(steps)?;
        self.send_mode(&body).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::Error;
    use crate::led::addressable::AddressableEffect;
    use crate::led::led_color::RGB;
    use crate::session::testing::{FakeController, Reply};

    fn options(port: u16) -> AddressableOptions {
        AddressableOptions {
            port,
            connect_timeout: Some(Duration::from_secs(2)),
            command_timeout: Some(Duration::from_millis(300)),
            reply_quiet_period: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fixed_mode_frame() {
        let controller = FakeController::start(|_| Reply::Silent).await;
        let control = ControlAddressable::new("127.0.0.1", options(controller.port()));

        control
            .set_fixed_mode(&FixedModeOptions {
                effect: 1,
                speed: 60,
                foreground: RGB::new(255, 0, 0),
                background: RGB::new(0, 0, 0),
                reversed: true,
            })
            .await
            .unwrap();

        let received = controller.wait_for_received(1).await;
        let expected = [
            0xb0, 0xb1, 0xb2, 0xb3, 0x00, 0x01, 0x01, 0x00, 0x00, 0x0d, 0x41, 0x01, 0xff, 0x00,
            0x00, 0x00, 0x00, 0x00, 60, 0xff, 0x00, 0x00, 0x00,
        ];
        assert_eq!(received, vec![frame::encode(&expected).to_vec()]);
    }

    #[tokio::test]
    async fn test_sequence_number_increments() {
        let controller = FakeController::start(|_| Reply::Silent).await;
        let control = ControlAddressable::new("127.0.0.1", options(controller.port()));

        control.set_rbm_mode(5, 50, 50).await.unwrap();
        controller.wait_for_received(1).await;
        control.set_rbm_mode(6, 50, 50).await.unwrap();

        // frames may arrive in one read, split them by their fixed size
        let bytes: Vec<u8> = controller
            .wait_for_received(2)
            .await
            .into_iter()
            .flatten()
            .collect();
        let frames: Vec<&[u8]> = bytes.chunks(16).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][7], 0);
        assert_eq!(frames[1][7], 1);
        assert_eq!(&frames[1][8..15], &[0x00, 0x05, 0x42, 6, 50, 50, 0x00]);
    }

    #[tokio::test]
    async fn test_multi_color_mode_without_start_is_rejected_locally() {
        let controller = FakeController::start(|_| Reply::Silent).await;
        let control = ControlAddressable::new("127.0.0.1", options(controller.port()));

        let mut mode = MultiColorMode::new(10).unwrap();
        mode.set_effect(AddressableEffect::Jump);
        mode.add_color_stop(5, RGB::new(0, 255, 0)).unwrap();
        assert!(matches!(
            control.set_multi_color_mode(&mode).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(control.set_custom_mode(&[]).await.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.connections(), 0);
    }

    #[tokio::test]
    async fn test_multi_color_mode_frame() {
        let controller = FakeController::start(|_| Reply::Silent).await;
        let control = ControlAddressable::new("127.0.0.1", options(controller.port()));

        let mut mode = MultiColorMode::new(2).unwrap();
        mode.add_color_stop(0, RGB::new(1, 2, 3)).unwrap();
        control.set_multi_color_mode(&mode).await.unwrap();

        let received = controller.wait_for_received(1).await;
        let frame = &received[0];
        assert_eq!(&frame[8..10], &[0x00, 15]);
        assert_eq!(
            &frame[10..25],
            &[0x59, 0x00, 15, 1, 2, 3, 1, 2, 3, 0x00, 2, 1, 100, 0x00, 0x00]
        );
        assert_eq!(frame.len(), 26);
    }

    #[tokio::test]
    async fn test_power_and_query_wait_for_reply() {
        let mut state = vec![
            0x81, 0xa3, 0x24, 0x00, 0x65, 0x20, 0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x00,
        ];
        state.push(frame::checksum(&state));
        let controller = FakeController::start(move |chunk| {
            if chunk[0] == 0x81 {
                Reply::once(&state)
            } else {
                Reply::once(&[0x30])
            }
        })
        .await;
        let control = ControlAddressable::new("127.0.0.1", options(controller.port()));

        assert!(control.turn_on().await.unwrap());
        let state = control.query_state().await.unwrap();
        assert!(!state.on);
        assert_eq!(state.mode, None);
        assert_eq!(state.color, RGB::new(1, 2, 3));
    }
}
