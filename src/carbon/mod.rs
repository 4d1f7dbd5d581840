//! Carbon delivery channel: a persistent TCP connection with a bounded
//! cache of packets that could not be delivered.
//!
//! Delivery is best effort, not at-least-once. The cache bounds memory
//! while the backend is down; a packet dequeued for flushing that then
//! fails to transmit is lost. Metric gaps are tolerable here, unbounded
//! buffering is not.

pub mod queue;

use std::io;
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::CarbonConfig;

use self::queue::PacketQueue;

/// Owns the outbound Carbon connection and the packet cache. Failures are
/// absorbed here: the caller only learns whether the packet reached the
/// wire or was cached (or dropped on cache overflow).
pub struct CarbonSink {
    cfg: CarbonConfig,
    conn: Option<TcpStream>,
    cache: PacketQueue,
}

impl CarbonSink {
    pub fn new(cfg: CarbonConfig) -> Self {
        let cache = PacketQueue::new(cfg.cache_max_length);
        Self {
            cfg,
            conn: None,
            cache,
        }
    }

    /// Number of packets currently cached.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Whether the Carbon connection is currently live.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Attempts to open the Carbon connection. Failure is logged, not
    /// returned; the next send retries.
    pub async fn connect(&mut self) {
        info!(host = %self.cfg.host, port = self.cfg.port, "connecting to Carbon");

        let attempt = TcpStream::connect((self.cfg.host.as_str(), self.cfg.port));
        match timeout(self.cfg.connect_timeout, attempt).await {
            Ok(Ok(stream)) => {
                self.conn = Some(stream);
            }
            Ok(Err(e)) => {
                error!(error = %e, "Carbon connection failed");
                self.conn = None;
            }
            Err(_) => {
                error!(timeout = ?self.cfg.connect_timeout, "Carbon connection timed out");
                self.conn = None;
            }
        }
    }

    /// Sends one packet, flushing cached packets first.
    ///
    /// Without a connection (and after a failed reconnect) the packet is
    /// cached and `false` is returned. With a live connection, up to
    /// `cache_commit_volume` cached packets are flushed in FIFO order
    /// before the new packet goes out; a failed send drops the connection,
    /// caches the packet, and returns `false`.
    pub async fn send(&mut self, packet: String) -> bool {
        if self.conn.is_none() {
            self.connect().await;
        }

        if self.conn.is_none() {
            warn!("Carbon connection is down, caching packet");
            self.cache_packet(packet);
            return false;
        }

        if !self.cache.is_empty() {
            self.flush_cache().await;
        }

        if let Err(e) = self.transmit(&packet).await {
            warn!(error = %e, "failed sending packet to Carbon, caching");
            self.conn = None;
            self.cache_packet(packet);
            return false;
        }

        debug!(bytes = packet.len(), "packet sent to Carbon");
        true
    }

    /// Flushes up to `cache_commit_volume` cached packets, stopping early
    /// on the first transmission failure. The packet in flight at that
    /// point is dropped; the rest stay cached for the next send.
    async fn flush_cache(&mut self) {
        info!(cached = self.cache.len(), "sending cached packets to Carbon");
        let started = Instant::now();

        let mut committed = 0usize;
        while committed < self.cfg.cache_commit_volume {
            let Some(packet) = self.cache.pop() else {
                debug!("sent all cached packets");
                break;
            };
            if let Err(e) = self.transmit(&packet).await {
                error!(error = %e, "cache flush failed, in-flight packet lost");
                break;
            }
            committed += 1;
        }

        info!(
            committed,
            remaining = self.cache.len(),
            elapsed = ?started.elapsed(),
            "cache flush done",
        );
    }

    async fn transmit(&mut self, packet: &str) -> io::Result<()> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no connection"));
        };

        match timeout(self.cfg.send_timeout, conn.write_all(packet.as_bytes())).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "send timed out")),
        }
    }

    fn cache_packet(&mut self, packet: String) {
        if self.cache.push(packet).is_some() {
            debug!("packet cache full, dropped oldest packet");
        }
        warn!(cached = self.cache.len(), "packets cached pending delivery");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    fn test_cfg(port: u16, cache_max_length: usize, cache_commit_volume: usize) -> CarbonConfig {
        CarbonConfig {
            host: "127.0.0.1".to_string(),
            port,
            cache_max_length,
            cache_commit_volume,
            connect_timeout: Duration::from_secs(1),
            send_timeout: Duration::from_secs(1),
        }
    }

    /// Binds a listener just to learn a locally free port, then drops it.
    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        listener.local_addr().expect("addr").port()
    }

    /// Reads from the socket until `want` bytes have arrived.
    async fn read_exactly(sock: &mut TcpStream, want: usize) -> String {
        let mut data = vec![0u8; want];
        sock.read_exact(&mut data).await.expect("read");
        String::from_utf8(data).expect("utf8")
    }

    #[tokio::test]
    async fn test_send_without_backend_caches_packet() {
        let port = free_port().await;
        let mut sink = CarbonSink::new(test_cfg(port, 10, 10));

        assert!(!sink.send("a 1 100\n\n".to_string()).await);
        assert!(!sink.is_connected());
        assert_eq!(sink.cached(), 1);
    }

    #[tokio::test]
    async fn test_cache_overflow_keeps_newest_two() {
        let port = free_port().await;
        let mut sink = CarbonSink::new(test_cfg(port, 2, 10));

        sink.send("p1\n\n".to_string()).await;
        sink.send("p2\n\n".to_string()).await;
        sink.send("p3\n\n".to_string()).await;

        assert_eq!(sink.cached(), 2);
    }

    #[tokio::test]
    async fn test_send_delivers_packet() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let mut sink = CarbonSink::new(test_cfg(port, 10, 10));

        let accept = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.expect("accept");
            read_exactly(&mut sock, 8).await
        });

        assert!(sink.send("a 1 100\n".to_string()).await);
        assert!(sink.is_connected());
        assert_eq!(sink.cached(), 0);
        assert_eq!(accept.await.expect("join"), "a 1 100\n");
    }

    #[tokio::test]
    async fn test_reconnect_flushes_cache_before_new_packet() {
        let port = free_port().await;
        let mut sink = CarbonSink::new(test_cfg(port, 10, 10));

        // Backend down: both packets land in the cache.
        sink.send("p1\n".to_string()).await;
        sink.send("p2\n".to_string()).await;
        assert_eq!(sink.cached(), 2);

        // Backend comes up on the same port.
        let listener = TcpListener::bind(("127.0.0.1", port)).await.expect("rebind");
        let accept = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.expect("accept");
            read_exactly(&mut sock, 9).await
        });

        assert!(sink.send("p3\n".to_string()).await);
        assert_eq!(sink.cached(), 0);
        // Cached packets drain in FIFO order ahead of the new one.
        assert_eq!(accept.await.expect("join"), "p1\np2\np3\n");
    }

    #[tokio::test]
    async fn test_flush_respects_commit_volume() {
        let port = free_port().await;
        let mut sink = CarbonSink::new(test_cfg(port, 10, 1));

        sink.send("p1\n".to_string()).await;
        sink.send("p2\n".to_string()).await;
        assert_eq!(sink.cached(), 2);

        let listener = TcpListener::bind(("127.0.0.1", port)).await.expect("rebind");
        let accept = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.expect("accept");
            read_exactly(&mut sock, 6).await
        });

        assert!(sink.send("p3\n".to_string()).await);
        // Only one cached packet was committed ahead of the send.
        assert_eq!(sink.cached(), 1);
        assert_eq!(accept.await.expect("join"), "p1\np3\n");
    }
}
