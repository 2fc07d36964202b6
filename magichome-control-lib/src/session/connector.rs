//! Opening the TCP stream to a controller.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result};

pub(crate) type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

/// Produces the connection attempt for an address and port.
#[derive(Clone)]
pub(crate) struct Connector(Arc<dyn Fn(&str, u16) -> ConnectFuture + Send + Sync>);

impl Connector {
    pub(crate) fn from_fn<F>(connect: F) -> Self
    where
        F: Fn(&str, u16) -> ConnectFuture + Send + Sync + 'static,
    {
        Connector(Arc::new(connect))
    }

    pub(crate) fn tcp() -> Self {
        Self::from_fn(|address, port| {
            let address = address.to_string();
            Box::pin(async move { TcpStream::connect((address.as_str(), port)).await })
        })
    }

    /// Connects, giving up with [`Error::ConnectTimeout`] once `limit` is
    /// over.
    pub(crate) async fn open(
        &self,
        address: &str,
        port: u16,
        limit: Option<Duration>,
    ) -> Result<TcpStream> {
        let connect = (self.0)(address, port);
        let stream = match limit {
            Some(limit) => timeout(limit, connect)
                .await
                .map_err(|_| Error::ConnectTimeout(limit))??,
            None => connect.await?,
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::tcp()
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Connector")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::session::testing::closed_port;

    /// A connector whose attempts never finish.
    pub(crate) fn hanging() -> Connector {
        Connector::from_fn(|_, _| Box::pin(std::future::pending::<io::Result<TcpStream>>()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_attempt_times_out() {
        let limit = Duration::from_millis(250);
        let started = Instant::now();

        let err = hanging()
            .open("192.168.1.50", 5577, Some(limit))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ConnectTimeout(d) if d == limit), "unexpected error: {err}");
        assert!(started.elapsed() >= limit);
    }

    #[tokio::test]
    async fn test_refused_attempt_is_a_connection_error() {
        let port = closed_port().await;
        let err = Connector::tcp()
            .open("127.0.0.1", port, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)), "unexpected error: {err}");
    }
}
