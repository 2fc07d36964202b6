//! In-process stand-in for a controller, used by the session and facade tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

/// What the fake controller does after receiving a chunk.
pub(crate) enum Reply {
    /// Write each chunk after its delay.
    Chunks(Vec<(Duration, Vec<u8>)>),
    /// Send nothing back.
    Silent,
    /// Drop the connection.
    Close,
}

impl Reply {
    pub fn once(data: &[u8]) -> Self {
        Reply::Chunks(vec![(Duration::ZERO, data.to_vec())])
    }
}

type Responder = dyn Fn(&[u8]) -> Reply + Send + Sync;

pub(crate) struct FakeController {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Vec<u8>>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeController {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let responder: Arc<Responder> = Arc::new(responder);

        let task = {
            let received = received.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((mut stream, _)) = listener.accept().await else {
                        return;
                    };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let received = received.clone();
                    let responder = responder.clone();
                    tokio::spawn(async move {
                        let mut buffer = [0u8; 1024];
                        loop {
                            let n = match stream.read(&mut buffer).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => n,
                            };
                            let chunk = buffer[..n].to_vec();
                            received.lock().unwrap().push(chunk.clone());
                            match responder(&chunk) {
                                Reply::Chunks(chunks) => {
                                    for (delay, data) in chunks {
                                        sleep(delay).await;
                                        if stream.write_all(&data).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                                Reply::Silent => {}
                                Reply::Close => return,
                            }
                        }
                    });
                }
            })
        };

        FakeController {
            addr,
            received,
            connections,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every chunk read so far, in arrival order.
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().unwrap().clone()
    }

    /// Waits up to two seconds until `count` chunks arrived.
    pub async fn wait_for_received(&self, count: usize) -> Vec<Vec<u8>> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let received = self.received();
            if received.len() >= count || Instant::now() >= deadline {
                return received;
            }
            sleep(Duration::from_millis(5)).await;
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A port on which nothing is listening.
pub(crate) async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
