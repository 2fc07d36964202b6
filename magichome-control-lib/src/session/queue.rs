use bytes::Bytes;
use log::debug;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

/// One unit of work: an encoded frame and the continuation of its caller.
#[derive(Debug)]
pub(crate) struct Command {
    pub frame: Bytes,
    pub expects_reply: bool,
    reply: oneshot::Sender<Result<Bytes>>,
}

impl Command {
    pub fn new(frame: Bytes, expects_reply: bool) -> (Self, ReplyHandle) {
        let (reply, receiver) = oneshot::channel();
        (
            Command {
                frame,
                expects_reply,
                reply,
            },
            ReplyHandle { receiver },
        )
    }

    /// Resolves or rejects the caller. Consumes the command, so it happens once.
    pub fn finish(self, result: Result<Bytes>) {
        // the caller may have dropped its handle, the result is then discarded
        let _ = self.reply.send(result);
    }
}

/// The caller's side of a queued command.
#[derive(Debug)]
pub struct ReplyHandle {
    receiver: oneshot::Receiver<Result<Bytes>>,
}

impl ReplyHandle {
    /// Waits until the command is resolved (with the received bytes, empty
    /// when no reply was expected) or rejected.
    pub async fn wait(self) -> Result<Bytes> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(Error::SessionClosed),
        }
    }
}

/// FIFO of commands waiting behind the one in flight.
///
/// The session worker is the only consumer, so commands are dispatched one at
/// a time in submission order.
#[derive(Debug)]
pub(crate) struct CommandQueue {
    receiver: mpsc::UnboundedReceiver<Command>,
}

impl CommandQueue {
    pub fn new() -> (mpsc::UnboundedSender<Command>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, CommandQueue { receiver })
    }

    /// Waits for the queue to become non-empty. `None` once every session
    /// handle is gone.
    pub async fn wait_next(&mut self) -> Option<Command> {
        self.receiver.recv().await
    }

    /// The next queued command, if any, without waiting.
    pub fn try_next(&mut self) -> Option<Command> {
        self.receiver.try_recv().ok()
    }

    /// Rejects `current` and everything still queued with `err`.
    pub fn reject_all(&mut self, current: Command, err: Error) {
        let mut rejected = 1;
        current.finish(Err(err.clone()));
        while let Some(command) = self.try_next() {
            command.finish(Err(err.clone()));
            rejected += 1;
        }
        debug!("Rejected {} queued command(s): {}", rejected, err);
    }
}
