use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;

/// Default idle time after the last received chunk, after which a reply is
/// regarded as complete.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Collects the chunks of one reply.
///
/// Controllers do not announce the reply length and some of them split a
/// reply into several TCP segments, so a reply is complete once no data
/// arrived for the quiet period.
#[derive(Debug)]
pub struct ReplyAggregator {
    buffer: BytesMut,
    quiet_period: Duration,
    deadline: Option<Instant>,
}

impl ReplyAggregator {
    pub fn new(quiet_period: Duration) -> Self {
        ReplyAggregator {
            buffer: BytesMut::new(),
            quiet_period,
            deadline: None,
        }
    }

    /// Appends a chunk and restarts the quiet timer.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        self.deadline = Some(Instant::now() + self.quiet_period);
    }

    /// When the quiet timer fires, `None` while nothing was received.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Hands out the collected reply and leaves the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.deadline = None;
        self.buffer.split().freeze()
    }

    pub fn reset(&mut self) {
        self.deadline = None;
        self.buffer.clear();
    }
}

impl Default for ReplyAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_restarts_quiet_timer() {
        let mut aggregator = ReplyAggregator::new(Duration::from_millis(50));
        assert!(aggregator.deadline().is_none());

        aggregator.push(&[0x81, 0x25]);
        let first = aggregator.deadline().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        aggregator.push(&[0x23]);
        let second = aggregator.deadline().unwrap();

        assert!(second > first);
        assert_eq!(aggregator.len(), 3);
    }

    #[test]
    fn test_take_concatenates_and_clears() {
        let mut aggregator = ReplyAggregator::default();
        aggregator.push(&[1, 2]);
        aggregator.push(&[3]);

        assert_eq!(aggregator.take().as_ref(), &[1, 2, 3]);
        assert!(aggregator.is_empty());
        assert!(aggregator.deadline().is_none());
        assert!(aggregator.take().is_empty());
    }

    #[test]
    fn test_reset_discards_partial_reply() {
        let mut aggregator = ReplyAggregator::default();
        aggregator.push(&[9, 9, 9]);
        aggregator.reset();
        assert!(aggregator.is_empty());
        assert!(aggregator.deadline().is_none());
    }
}
