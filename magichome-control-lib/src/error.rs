//! Error types shared by the session core and the control facades.
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::Connection`], [`Error::ConnectTimeout`], [`Error::ConnectionClosed`], [`Error::SessionClosed`] |
//! | Command | [`Error::CommandTimeout`] |
//! | Protocol | [`Error::ReplyTooShort`] |
//! | Validation | [`Error::InvalidPattern`], [`Error::InvalidPatternCode`], [`Error::TooManyColors`], [`Error::InvalidTransition`], [`Error::InvalidArgument`] |
//! | Effect mode | [`Error::EffectStopped`], [`Error::CommandPending`], [`Error::AlreadyConnected`], [`Error::NotConnected`] |

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the caller of a control operation.
///
/// Connection-level failures are delivered to every command that was queued
/// at the time, so the error has to be cloneable; I/O errors are shared behind
/// an [`Arc`].
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Socket-level failure while connecting, writing or reading.
    #[error("connection error: {0}")]
    Connection(#[source] Arc<io::Error>),

    /// The connection could not be established within the connect timeout.
    #[error("connection timeout reached after {0:?}")]
    ConnectTimeout(Duration),

    /// The controller closed the connection while commands were outstanding.
    #[error("connection closed by controller")]
    ConnectionClosed,

    /// The session worker is gone, no further commands can be submitted.
    #[error("session is closed")]
    SessionClosed,

    /// An acknowledged command got no data within the command timeout.
    #[error("command timed out after {0:?}")]
    CommandTimeout(Duration),

    /// The reply is shorter than the minimum valid length for the operation.
    #[error("only got short reply ({actual} bytes, expected at least {expected})")]
    ReplyTooShort { expected: usize, actual: usize },

    /// The name does not resolve to one of the built-in patterns.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// The addressable pattern code is outside `1..=300`.
    #[error("invalid pattern code: {0}")]
    InvalidPatternCode(u16),

    /// More colors than a custom pattern can hold.
    #[error("too many colors: {0} (max 16)")]
    TooManyColors(usize),

    /// Unknown custom pattern transition type.
    #[error("invalid transition type: {0}")]
    InvalidTransition(String),

    /// A parameter of an addressable mode is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The effect loop was stopped, further effect commands are refused.
    #[error("the effect was stopped")]
    EffectStopped,

    /// An effect command is still waiting for its acknowledgement.
    #[error("an effect command is still pending")]
    CommandPending,

    /// The effect interface already holds a connection.
    #[error("already connected")]
    AlreadyConnected,

    /// The effect interface has no connection.
    #[error("not connected")]
    NotConnected,
}

impl Error {
    /// Errors which tear down the connection and flush the whole queue.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Connection(_)
                | Error::ConnectTimeout(_)
                | Error::ConnectionClosed
                | Error::SessionClosed
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ConnectTimeout(_) | Error::CommandTimeout(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Connection(Arc::new(err))
    }
}
