//! Effects driven over a persistent connection.
//!
//! An [`EffectInterface`] keeps one connection open and sends non-permanent
//! color frames, so the controller doesn't store every step of an animation.
//! Only one color command can be in flight at a time.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use magichome_control_lib::control_interface::Control;
//! use magichome_control_lib::led::led_color::RGB;
//! use magichome_control_lib::util::config::ControlOptions;
//!
//! #[tokio::main]
//! async fn main() -> magichome_control_lib::Result<()> {
//!     let control = Control::new("192.168.1.50", ControlOptions::default());
//!     let effect = control.effect_mode();
//!     effect.connect().await?;
//!
//!     let mut step = 0u8;
//!     effect
//!         .run(move |effect| {
//!             step = step.wrapping_add(8);
//!             async move {
//!                 effect.set_color(RGB::new(step, 0, 255 - step)).await?;
//!                 effect.delay(Duration::from_millis(50)).await
//!             }
//!         })
//!         .await?;
//!     effect.end().await;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep, sleep_until, timeout, Instant};

use crate::control_interface::commands::{self, ColorValues, MASK_ALL, MASK_COLOR, MASK_WHITES};
use crate::error::{Error, Result};
use crate::led::led_color::RGB;
use crate::session::connector::Connector;
use crate::session::frame;
use crate::util::config::EffectOptions;

/// Time granted to the controller for an unacknowledged frame.
pub const UNACKNOWLEDGED_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct EffectInterface {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    address: String,
    options: EffectOptions,
    connector: Connector,
    stream: Mutex<Option<TcpStream>>,
    connected: AtomicBool,
    running: AtomicBool,
    pending: AtomicBool,
    stopped: Notify,
}

impl EffectInterface {
    pub fn new(address: &str, options: EffectOptions) -> Self {
        Self::with_connector(address, options, Connector::tcp())
    }

    pub(crate) fn with_connector(
        address: &str,
        options: EffectOptions,
        connector: Connector,
    ) -> Self {
        EffectInterface {
            inner: Arc::new(Inner {
                address: address.to_string(),
                options,
                connector,
                stream: Mutex::new(None),
                connected: AtomicBool::new(false),
                running: AtomicBool::new(false),
                pending: AtomicBool::new(false),
                stopped: Notify::new(),
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Whether an effect loop is active.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    pub async fn connect(&self) -> Result<()> {
        let mut stream = self.inner.stream.lock().await;
        if stream.is_some() || self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let options = &self.inner.options;
        let connected = self
            .inner
            .connector
            .open(&self.inner.address, options.port, options.connect_timeout)
            .await?;

        *stream = Some(connected);
        self.inner.connected.store(true, Ordering::SeqCst);
        debug!("Effect connection to {} open", self.inner.address);
        Ok(())
    }

    /// Runs `effect` over and over until [`Self::stop`] is called.
    ///
    /// [`Error::EffectStopped`] raised by a stopped iteration ends the loop
    /// normally, any other error ends it and is returned.
    pub async fn run<F, Fut>(&self, mut effect: F) -> Result<()>
    where
        F: FnMut(EffectInterface) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidArgument("an effect is still running".to_string()));
        }

        while self.is_running() {
            match effect(self.clone()).await {
                Ok(()) | Err(Error::EffectStopped) => {}
                Err(err) => {
                    self.inner.running.store(false, Ordering::SeqCst);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Sleeps for `duration`, returns [`Error::EffectStopped`] early once the
    /// effect is stopped.
    pub async fn delay(&self, duration: Duration) -> Result<()> {
        let stopped = self.inner.stopped.notified();
        if !self.is_running() {
            return Err(Error::EffectStopped);
        }
        tokio::select! {
            _ = sleep(duration) => Ok(()),
            _ = stopped => Err(Error::EffectStopped),
        }
    }

    /// Ends the effect loop. The connection stays open.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.stopped.notify_waiters();
    }

    /// Stops the effect and closes the connection.
    pub async fn end(&self) {
        self.stop();
        if let Some(mut stream) = self.inner.stream.lock().await.take() {
            if let Err(err) = stream.shutdown().await {
                debug!("Error while closing effect connection: {}", err);
            }
        }
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    pub async fn set_color_and_warm_white(&self, color: RGB, warm_white: u8) -> Result<()> {
        self.send_color(ColorValues::new(color, warm_white, 0), MASK_ALL)
            .await
    }

    pub async fn set_color_and_whites(
        &self,
        color: RGB,
        warm_white: u8,
        cold_white: u8,
    ) -> Result<()> {
        self.send_color(ColorValues::new(color, warm_white, cold_white), MASK_ALL)
            .await
    }

    pub async fn set_color(&self, color: RGB) -> Result<()> {
        let mask = if self.inner.options.apply_masks {
            MASK_COLOR
        } else {
            MASK_ALL
        };
        self.send_color(ColorValues::new(color, 0, 0), mask).await
    }

    pub async fn set_warm_white(&self, warm_white: u8) -> Result<()> {
        self.set_whites(warm_white, 0).await
    }

    pub async fn set_whites(&self, warm_white: u8, cold_white: u8) -> Result<()> {
        let mask = if self.inner.options.apply_masks {
            MASK_WHITES
        } else {
            MASK_ALL
        };
        self.send_color(ColorValues::new(RGB::default(), warm_white, cold_white), mask)
            .await
    }

    async fn send_color(&self, values: ColorValues, mask: u8) -> Result<()> {
        if !self.is_running() {
            return Err(Error::EffectStopped);
        }
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let Some(pending) = PendingGuard::acquire(&self.inner.pending) else {
            return Err(Error::CommandPending);
        };

        let options = &self.inner.options;
        let payload = commands::color(&values, mask, options.cold_white_support, false);
        let result = self.transmit(&payload).await;
        drop(pending);

        if let Err(err) = &result {
            if err.is_connection_error() {
                warn!("Effect connection to {} failed: {}", self.inner.address, err);
                self.disconnect().await;
            }
        }
        result
    }

    async fn transmit(&self, payload: &[u8]) -> Result<()> {
        let mut guard = self.inner.stream.lock().await;
        let stream = guard.as_mut().ok_or(Error::NotConnected)?;
        let sent = Instant::now();
        stream.write_all(&frame::encode(payload)).await?;

        if !self.inner.options.color_ack {
            sleep_until(sent + UNACKNOWLEDGED_DELAY).await;
            return Ok(());
        }

        let mut buffer = [0u8; 64];
        let read = stream.read(&mut buffer);
        let received = match self.inner.options.command_timeout {
            Some(limit) => timeout(limit, read)
                .await
                .map_err(|_| Error::CommandTimeout(limit))??,
            None => read.await?,
        };
        if received == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.inner.stream.lock().await.take();
        self.inner.connected.store(false, Ordering::SeqCst);
    }
}

/// Holds the single pending slot, released on drop even if the send is
/// cancelled halfway.
struct PendingGuard<'a>(&'a AtomicBool);

impl<'a> PendingGuard<'a> {
    fn acquire(slot: &'a AtomicBool) -> Option<Self> {
        if slot.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(PendingGuard(slot))
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Keeps a steady rhythm in an effect loop even though every command takes
/// a varying amount of time.
#[derive(Debug, Default)]
pub struct EffectTimer {
    started: Option<Instant>,
}

impl EffectTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Waits for whatever is left of `period` since the last mark, then
    /// advances the mark by `period`.
    pub async fn delay_remaining(&mut self, effect: &EffectInterface, period: Duration) -> Result<()> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let next = started + period;
        let remaining = next.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            effect.delay(remaining).await?;
        }
        self.started = Some(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::session::connector::tests::hanging;
    use crate::session::testing::{closed_port, FakeController, Reply};

    fn options(port: u16, color_ack: bool) -> EffectOptions {
        EffectOptions {
            port,
            connect_timeout: Some(Duration::from_secs(2)),
            command_timeout: Some(Duration::from_millis(300)),
            color_ack,
            apply_masks: false,
            cold_white_support: false,
        }
    }

    #[tokio::test]
    async fn test_connect_twice_fails() {
        let controller = FakeController::start(|_| Reply::Silent).await;
        let effect = EffectInterface::new("127.0.0.1", options(controller.port(), false));

        effect.connect().await.unwrap();
        assert!(effect.is_connected());
        assert!(matches!(effect.connect().await, Err(Error::AlreadyConnected)));

        effect.end().await;
        assert!(!effect.is_connected());
    }

    #[tokio::test]
    async fn test_connect_error() {
        let effect = EffectInterface::new("127.0.0.1", options(closed_port().await, false));
        assert!(effect.connect().await.unwrap_err().is_connection_error());
        assert!(!effect.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let limit = Duration::from_millis(100);
        let mut opts = options(5577, false);
        opts.connect_timeout = Some(limit);
        let effect = EffectInterface::with_connector("192.168.1.50", opts, hanging());

        let err = effect.connect().await.unwrap_err();
        assert!(matches!(err, Error::ConnectTimeout(d) if d == limit), "unexpected error: {err}");
        assert!(!effect.is_connected());
    }

    #[tokio::test]
    async fn test_cancelled_send_frees_pending_slot() {
        // the first color is never answered
        let controller = FakeController::start(|chunk| {
            if chunk[1] == 1 {
                Reply::Silent
            } else {
                Reply::once(&[0x30])
            }
        })
        .await;
        let effect = EffectInterface::new("127.0.0.1", options(controller.port(), true));
        effect.connect().await.unwrap();

        effect
            .run(|effect| async move {
                let cancelled =
                    timeout(Duration::from_millis(20), effect.set_color(RGB::new(1, 0, 0))).await;
                assert!(cancelled.is_err());

                effect.set_color(RGB::new(2, 0, 0)).await?;
                effect.stop();
                Ok(())
            })
            .await
            .unwrap();

        let received = controller.wait_for_received(2).await;
        assert_eq!(received[1], frame::encode(&[0x41, 2, 0, 0, 0, 0x00, 0x0f]).to_vec());
    }

    #[tokio::test]
    async fn test_effect_loop_sends_non_permanent_frames() {
        let controller = FakeController::start(|_| Reply::once(&[0x30])).await;
        let effect = EffectInterface::new("127.0.0.1", options(controller.port(), true));
        effect.connect().await.unwrap();

        let iterations = Arc::new(AtomicUsize::new(0));
        let counter = iterations.clone();
        effect
            .run(move |effect| {
                let step = counter.fetch_add(1, Ordering::SeqCst) as u8;
                async move {
                    effect.set_color(RGB::new(step, 0, 0)).await?;
                    if step == 2 {
                        effect.stop();
                    }
                    effect.delay(Duration::from_millis(5)).await
                }
            })
            .await
            .unwrap();

        assert_eq!(iterations.load(Ordering::SeqCst), 3);
        assert!(!effect.is_running());
        // the connection survives the stop
        assert!(effect.is_connected());
        assert_eq!(controller.connections(), 1);

        let received = controller.received();
        assert_eq!(received.len(), 3);
        assert_eq!(
            received[2],
            frame::encode(&[0x41, 2, 0, 0, 0, 0x00, 0x0f]).to_vec()
        );

        assert!(matches!(
            effect.set_color(RGB::new(1, 1, 1)).await,
            Err(Error::EffectStopped)
        ));
        assert!(matches!(
            effect.delay(Duration::from_millis(1)).await,
            Err(Error::EffectStopped)
        ));
    }

    #[tokio::test]
    async fn test_unacknowledged_frames_wait_minimum_delay() {
        let controller = FakeController::start(|_| Reply::Silent).await;
        let effect = EffectInterface::new("127.0.0.1", options(controller.port(), false));
        effect.connect().await.unwrap();

        let started = Instant::now();
        effect
            .run(|effect| async move {
                effect.set_warm_white(0x80).await?;
                effect.stop();
                Ok(())
            })
            .await
            .unwrap();

        assert!(started.elapsed() >= UNACKNOWLEDGED_DELAY);
        let received = controller.wait_for_received(1).await;
        assert_eq!(received[0], frame::encode(&[0x41, 0, 0, 0, 0x80, 0x00, 0x0f]).to_vec());
    }

    #[tokio::test]
    async fn test_second_send_while_pending_is_rejected() {
        let controller = FakeController::start(|_| {
            Reply::Chunks(vec![(Duration::from_millis(100), vec![0x30])])
        })
        .await;
        let effect = EffectInterface::new("127.0.0.1", options(controller.port(), true));
        effect.connect().await.unwrap();

        effect
            .run(|effect| async move {
                let (first, second) = tokio::join!(
                    effect.set_color(RGB::new(1, 0, 0)),
                    async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        effect.set_color(RGB::new(2, 0, 0)).await
                    }
                );
                assert!(first.is_ok());
                assert!(matches!(second, Err(Error::CommandPending)));
                effect.stop();
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_disconnects() {
        let controller = FakeController::start(|_| Reply::Close).await;
        let effect = EffectInterface::new("127.0.0.1", options(controller.port(), true));
        effect.connect().await.unwrap();

        let result = effect
            .run(|effect| async move { effect.set_color(RGB::new(1, 2, 3)).await })
            .await;

        assert!(result.unwrap_err().is_connection_error());
        assert!(!effect.is_connected());
        assert!(!effect.is_running());
    }

    #[tokio::test]
    async fn test_masks_and_cold_white() {
        let controller = FakeController::start(|_| Reply::once(&[0x30])).await;
        let mut opts = options(controller.port(), true);
        opts.apply_masks = true;
        opts.cold_white_support = true;
        let effect = EffectInterface::new("127.0.0.1", opts);
        effect.connect().await.unwrap();

        effect
            .run(|effect| async move {
                effect.set_color(RGB::new(5, 6, 7)).await?;
                effect.set_whites(8, 9).await?;
                effect.stop();
                Ok(())
            })
            .await
            .unwrap();

        let received = controller.received();
        assert_eq!(received[0], frame::encode(&[0x41, 5, 6, 7, 0, 0, 0xf0, 0x0f]).to_vec());
        assert_eq!(received[1], frame::encode(&[0x41, 0, 0, 0, 8, 9, 0x0f, 0x0f]).to_vec());
    }

    #[tokio::test]
    async fn test_timer_keeps_rhythm() {
        let controller = FakeController::start(|_| Reply::Silent).await;
        let effect = EffectInterface::new("127.0.0.1", options(controller.port(), false));
        effect.connect().await.unwrap();

        let mut timer = EffectTimer::new();
        assert!(!timer.is_started());
        timer.start();
        let started = Instant::now();

        effect
            .run(move |effect| {
                let mut timer = std::mem::take(&mut timer);
                async move {
                    for _ in 0..3 {
                        timer.delay_remaining(&effect, Duration::from_millis(40)).await?;
                    }
                    effect.stop();
                    Ok(())
                }
            })
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(110), "{:?}", elapsed);
    }
}
