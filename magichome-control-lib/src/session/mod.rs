//! The command/response session shared by every controller facade.
//!
//! A [`Session`] owns at most one TCP connection to one controller. Commands
//! from any number of callers are queued and executed strictly one after the
//! other: the next frame is only written once the previous command has been
//! resolved. The connection is opened lazily when the first command arrives
//! and closed again as soon as the queue runs dry.
//!
//! ```no_run
//! use magichome_control_lib::session::{frame, Session, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> magichome_control_lib::Result<()> {
//!     let session = Session::new("192.168.1.50", SessionOptions::default());
//!     let reply = session.request(frame::encode(&[0x81, 0x8a, 0x8b]), true).await?;
//!     println!("{} bytes", reply.len());
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub(crate) mod connector;
pub mod frame;
mod queue;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

use crate::error::{Error, Result};
use aggregator::{ReplyAggregator, DEFAULT_QUIET_PERIOD};
use connector::Connector;
pub use queue::ReplyHandle;
use queue::{Command, CommandQueue};

/// TCP port the controllers listen on for commands.
pub const DEFAULT_PORT: u16 = 5577;

/// Default timeout for commands which expect a reply.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Lifecycle of the session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        };
        write!(f, "{}", state)
    }
}

/// Transport settings of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub port: u16,
    /// `None` waits for the operating system to give up.
    pub connect_timeout: Option<Duration>,
    /// `None` lets an acknowledged command wait for its reply forever.
    pub command_timeout: Option<Duration>,
    pub reply_quiet_period: Duration,
    /// Log every received chunk as hex.
    pub log_all_received: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            port: DEFAULT_PORT,
            connect_timeout: None,
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            reply_quiet_period: DEFAULT_QUIET_PERIOD,
            log_all_received: false,
        }
    }
}

/// Cloneable handle to the session worker of one controller.
///
/// All clones feed the same queue. The worker stops once every handle is
/// dropped.
#[derive(Debug, Clone)]
pub struct Session {
    address: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl Session {
    /// Creates the session and spawns its worker. No connection is made yet.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn new(address: &str, options: SessionOptions) -> Self {
        Self::with_connector(address, options, Connector::tcp())
    }

    pub(crate) fn with_connector(
        address: &str,
        options: SessionOptions,
        connector: Connector,
    ) -> Self {
        let (commands, queue) = CommandQueue::new();
        let (state_tx, state) = watch::channel(ConnectionState::Idle);
        let worker = SessionWorker {
            address: address.to_string(),
            aggregator: ReplyAggregator::new(options.reply_quiet_period),
            connector,
            options,
            queue,
            state: state_tx,
        };
        tokio::spawn(worker.run());

        Session {
            address: address.to_string(),
            commands,
            state,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Queues an encoded frame. The returned handle resolves once the command
    /// got its turn and finished.
    pub fn enqueue(&self, frame: Bytes, expects_reply: bool) -> Result<ReplyHandle> {
        let (command, handle) = Command::new(frame, expects_reply);
        self.commands
            .send(command)
            .map_err(|_| Error::SessionClosed)?;
        Ok(handle)
    }

    /// Queues an encoded frame and waits for its outcome.
    pub async fn request(&self, frame: Bytes, expects_reply: bool) -> Result<Bytes> {
        self.enqueue(frame, expects_reply)?.wait().await
    }
}

/// How the head command ended.
enum Dispatch {
    Resolved(Bytes),
    TimedOut(Duration),
    /// The peer closed the connection, with whatever was received until then.
    Closed(Bytes),
    Failed(Error),
}

struct SessionWorker {
    address: String,
    connector: Connector,
    options: SessionOptions,
    queue: CommandQueue,
    aggregator: ReplyAggregator,
    state: watch::Sender<ConnectionState>,
}

impl SessionWorker {
    async fn run(mut self) {
        while let Some(first) = self.queue.wait_next().await {
            self.serve(first).await;
        }
        debug!("Session worker for {} stopped", self.address);
    }

    fn set_state(&self, state: ConnectionState) {
        debug!("Connection to {}: {}", self.address, state);
        self.state.send_replace(state);
    }

    /// Runs one connection from the first queued command until the queue
    /// drains or the connection fails.
    async fn serve(&mut self, first: Command) {
        self.set_state(ConnectionState::Connecting);
        let mut stream = match self.connect().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Failed to connect to {}: {}", self.address, err);
                self.queue.reject_all(first, err);
                self.set_state(ConnectionState::Idle);
                return;
            }
        };
        self.set_state(ConnectionState::Open);

        let mut current = first;
        loop {
            match self.dispatch(&mut stream, &current).await {
                Dispatch::Resolved(reply) => current.finish(Ok(reply)),
                Dispatch::TimedOut(after) => {
                    debug!("Command to {} timed out after {:?}", self.address, after);
                    current.finish(Err(Error::CommandTimeout(after)));
                }
                Dispatch::Closed(partial) => {
                    self.set_state(ConnectionState::Closing);
                    if partial.is_empty() {
                        self.queue.reject_all(current, Error::ConnectionClosed);
                    } else {
                        current.finish(Ok(partial));
                        if let Some(next) = self.queue.try_next() {
                            self.queue.reject_all(next, Error::ConnectionClosed);
                        }
                    }
                    self.set_state(ConnectionState::Idle);
                    return;
                }
                Dispatch::Failed(err) => {
                    warn!("Connection to {} failed: {}", self.address, err);
                    self.set_state(ConnectionState::Closing);
                    self.queue.reject_all(current, err);
                    Self::shutdown(stream).await;
                    self.set_state(ConnectionState::Idle);
                    return;
                }
            }

            match self.queue.try_next() {
                Some(next) => current = next,
                None => break,
            }
        }

        self.set_state(ConnectionState::Closing);
        Self::shutdown(stream).await;
        self.set_state(ConnectionState::Idle);
    }

    async fn connect(&self) -> Result<TcpStream> {
        self.connector
            .open(&self.address, self.options.port, self.options.connect_timeout)
            .await
    }

    async fn shutdown(mut stream: TcpStream) {
        if let Err(err) = stream.shutdown().await {
            debug!("Error while closing connection: {}", err);
        }
    }

    async fn dispatch(&mut self, stream: &mut TcpStream, command: &Command) -> Dispatch {
        self.aggregator.reset();

        if let Err(err) = stream.write_all(&command.frame).await {
            return Dispatch::Failed(err.into());
        }
        debug!(
            "Sent {} to {} (reply expected: {})",
            hex::encode(&command.frame),
            self.address,
            command.expects_reply
        );

        if !command.expects_reply {
            return Dispatch::Resolved(Bytes::new());
        }

        self.await_reply(stream).await
    }

    async fn await_reply(&mut self, stream: &mut TcpStream) -> Dispatch {
        let command_timeout = self.options.command_timeout;
        let mut command_deadline = command_timeout.map(|limit| Instant::now() + limit);
        let mut chunk = [0u8; 1024];

        loop {
            // the quiet timer takes over as soon as anything was received
            let deadline = self.aggregator.deadline().or(command_deadline);
            let timer = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                read = stream.read(&mut chunk) => match read {
                    Ok(0) => return Dispatch::Closed(self.aggregator.take()),
                    Ok(n) => {
                        if self.options.log_all_received {
                            info!("Received: {}", hex::encode(&chunk[..n]));
                        }
                        command_deadline = None;
                        self.aggregator.push(&chunk[..n]);
                    }
                    Err(err) => return Dispatch::Failed(err.into()),
                },
                _ = timer => {
                    if self.aggregator.is_empty() {
                        let after = command_timeout.unwrap_or_default();
                        return Dispatch::TimedOut(after);
                    }
                    return Dispatch::Resolved(self.aggregator.take());
                }
            }
        }
    }
}
