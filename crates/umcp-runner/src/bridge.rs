//! TCP link bridge.
//!
//! Runs one uMCP session in real time between two TCP endpoints:
//!
//! - the **host port**, where an application connects and exchanges its
//!   payload stream, and
//! - the **line port**, which either listens for or connects to the transport
//!   (a serial-over-TCP adapter in front of the modem, or another bridge).
//!
//! Socket I/O runs in tokio tasks that exchange `Vec<u8>` chunks with the
//! poll loop over mpsc channels; the session itself only ever sees
//! [`ByteChannel`]s. The poll loop sleeps until the session's next timer or
//! Nagle deadline, and socket tasks wake it early when bytes arrive.

use crate::config::BridgeConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::line::LineChannel;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};
use umcp_link::{ByteChannel, Link, LinkConfig, LinkTime, Session, SessionStats};

/// Chunks buffered between a socket task and the poll loop.
const PORT_QUEUE_DEPTH: usize = 256;

/// Delay between attempts to reach the line endpoint.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Shortest poll loop sleep.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Byte channel backed by a socket task.
///
/// Writes made while no client is connected queue up until the queue is
/// full, after which they are dropped.
#[derive(Debug)]
pub struct PortChannel {
    name: &'static str,
    incoming: mpsc::Receiver<Vec<u8>>,
    outgoing: mpsc::Sender<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl PortChannel {
    /// Create the poll-loop side of a port and the ends its socket task uses.
    /// The task signals `wake` whenever it hands over bytes.
    pub fn new(name: &'static str, wake: Arc<Notify>) -> (Self, PortTaskEnds) {
        let (to_loop, incoming) = mpsc::channel(PORT_QUEUE_DEPTH);
        let (outgoing, from_loop) = mpsc::channel(PORT_QUEUE_DEPTH);
        (
            PortChannel {
                name,
                incoming,
                outgoing,
                pending: VecDeque::new(),
            },
            PortTaskEnds { to_loop, from_loop, wake },
        )
    }

    fn pull(&mut self) {
        while let Ok(chunk) = self.incoming.try_recv() {
            self.pending.extend(chunk);
        }
    }
}

impl ByteChannel for PortChannel {
    fn bytes_available(&self) -> usize {
        self.pending.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.pending.is_empty() {
            self.pull();
        }
        self.pending.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) {
        match self.outgoing.try_send(bytes.to_vec()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("{} port: output queue full, dropping {} bytes", self.name, bytes.len())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("{} port: task gone, dropping {} bytes", self.name, bytes.len())
            }
        }
    }
}

/// The socket task's side of a [`PortChannel`].
#[derive(Debug)]
pub struct PortTaskEnds {
    to_loop: mpsc::Sender<Vec<u8>>,
    from_loop: mpsc::Receiver<Vec<u8>>,
    wake: Arc<Notify>,
}

enum LineEndpoint {
    Listen(TcpListener),
    Connect(String),
}

/// A bound, not yet running bridge.
pub struct Bridge {
    link: LinkConfig,
    config: BridgeConfig,
    host: TcpListener,
    line: LineEndpoint,
}

impl Bridge {
    /// Validate the configuration and bind the listening sockets.
    pub async fn bind(link: LinkConfig, config: BridgeConfig) -> RunnerResult<Self> {
        link.validate()?;
        config.validate()?;

        let host = TcpListener::bind(&config.host_listen).await?;
        let line = match (&config.line_listen, &config.line_connect) {
            (Some(addr), _) => LineEndpoint::Listen(TcpListener::bind(addr).await?),
            (None, Some(addr)) => LineEndpoint::Connect(addr.clone()),
            (None, None) => {
                return Err(RunnerError::InvalidConfig("no line endpoint".into()));
            }
        };
        Ok(Bridge { link, config, host, line })
    }

    /// Address of the host port.
    pub fn host_addr(&self) -> RunnerResult<SocketAddr> {
        Ok(self.host.local_addr()?)
    }

    /// Address of the line port when listening.
    pub fn line_addr(&self) -> Option<SocketAddr> {
        match &self.line {
            LineEndpoint::Listen(listener) => listener.local_addr().ok(),
            LineEndpoint::Connect(_) => None,
        }
    }

    /// Run until `shutdown` is set. Returns the session totals.
    pub async fn run(self, shutdown: Arc<AtomicBool>) -> RunnerResult<SessionStats> {
        let Bridge { link, config, host, line } = self;

        let wake = Arc::new(Notify::new());
        let (host_channel, host_ends) = PortChannel::new("host", wake.clone());
        let (line_channel, line_ends) = PortChannel::new("line", wake.clone());

        tokio::spawn(serve_port("host", host, host_ends));
        match line {
            LineEndpoint::Listen(listener) => {
                tokio::spawn(serve_port("line", listener, line_ends));
            }
            LineEndpoint::Connect(addr) => {
                tokio::spawn(connect_port(addr, line_ends));
            }
        }

        let session = Session::new(link)?;
        info!(
            "bridge up: node {} <-> peer {}, host {}, line format {:?}",
            session.config().self_id,
            session.config().peer_id,
            config.host_listen,
            config.line_format
        );
        let mut link = Link::new(
            session,
            host_channel,
            LineChannel::new(config.line_format, line_channel),
        );

        let start = Instant::now();
        let idle = Duration::from_millis(config.poll_interval_ms);
        let stats_every = config.stats_interval_secs.map(Duration::from_secs);
        let mut last_stats = Instant::now();

        while !shutdown.load(Ordering::Relaxed) {
            let now = LinkTime::from_micros(start.elapsed().as_micros() as u64);
            if let Err(e) = link.poll(now) {
                warn!("{}", e);
            }

            if let Some(every) = stats_every {
                if last_stats.elapsed() >= every {
                    last_stats = Instant::now();
                    log_stats(link.session());
                }
            }

            let wait = link
                .session()
                .next_wake(now)
                .map_or(idle, |at| at.saturating_since(now))
                .clamp(MIN_WAIT, idle.max(MIN_WAIT));
            tokio::select! {
                _ = wake.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("bridge shutting down");
        log_stats(link.session());
        Ok(link.session().stats())
    }
}

fn log_stats(session: &Session) {
    let stats = session.stats();
    info!(
        "{}: state {}, tx {} rx {} frames, {} retransmissions, {} delivered, {} acked, {} buffered",
        session.name(),
        session.state(),
        stats.frames_tx,
        stats.frames_rx,
        stats.retransmissions,
        stats.delivered_bytes,
        stats.acked_bytes,
        session.buffered_len()
    );
}

/// Accept clients one at a time and shuttle bytes for each.
async fn serve_port(name: &'static str, listener: TcpListener, mut ends: PortTaskEnds) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("{} port: accept failed: {}", name, e);
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };
        info!("{} port: {} connected", name, peer);
        match handle_connection(stream, &mut ends).await {
            Ok(()) => info!("{} port: {} disconnected", name, peer),
            Err(e) => warn!("{} port: connection error: {}", name, e),
        }
        if ends.to_loop.is_closed() {
            return;
        }
    }
}

/// Keep a connection to the line endpoint, reconnecting when it drops.
async fn connect_port(addr: String, mut ends: PortTaskEnds) {
    loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                info!("line port: connected to {}", addr);
                if let Err(e) = handle_connection(stream, &mut ends).await {
                    warn!("line port: connection error: {}", e);
                }
                info!("line port: {} closed", addr);
            }
            Err(e) => debug!("line port: connect to {} failed: {}", addr, e),
        }
        if ends.to_loop.is_closed() {
            return;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn handle_connection(mut stream: TcpStream, ends: &mut PortTaskEnds) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.split();
    let mut read_buf = [0u8; 1024];

    loop {
        tokio::select! {
            result = reader.read(&mut read_buf) => {
                match result? {
                    0 => return Ok(()),
                    n => {
                        if ends.to_loop.send(read_buf[..n].to_vec()).await.is_err() {
                            return Ok(());
                        }
                        ends.wake.notify_one();
                    }
                }
            }
            chunk = ends.from_loop.recv() => {
                match chunk {
                    Some(data) => {
                        writer.write_all(&data).await?;
                        writer.flush().await?;
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_port_channel_moves_chunks() {
        let (mut channel, mut ends) = PortChannel::new("test", Arc::new(Notify::new()));
        ends.to_loop.send(b"ab".to_vec()).await.unwrap();
        ends.to_loop.send(b"c".to_vec()).await.unwrap();

        assert_eq!(channel.read_byte(), Some(b'a'));
        assert_eq!(channel.bytes_available(), 2);
        assert_eq!(channel.read_byte(), Some(b'b'));
        assert_eq!(channel.read_byte(), Some(b'c'));
        assert_eq!(channel.read_byte(), None);

        channel.write(b"xyz");
        assert_eq!(ends.from_loop.recv().await, Some(b"xyz".to_vec()));
    }

    #[tokio::test]
    async fn test_bind_rejects_missing_line() {
        let config = BridgeConfig {
            host_listen: "127.0.0.1:0".into(),
            ..Default::default()
        };
        assert!(matches!(
            Bridge::bind(LinkConfig::new(1, 2), config).await,
            Err(RunnerError::InvalidConfig(_))
        ));
    }
}
