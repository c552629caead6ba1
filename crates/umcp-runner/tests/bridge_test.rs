//! TCP bridge integration tests.
//!
//! Two bridges are joined line to line on localhost; bytes written to one
//! host port must come out of the other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use umcp_link::LinkConfig;
use umcp_runner::{Bridge, BridgeConfig, LineFormat};

fn bridge_config(line_listen: Option<String>, line_connect: Option<String>, format: LineFormat) -> BridgeConfig {
    BridgeConfig {
        host_listen: "127.0.0.1:0".into(),
        line_listen,
        line_connect,
        poll_interval_ms: 2,
        stats_interval_secs: None,
        line_format: format,
    }
}

async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(Duration::from_secs(20), stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for bridged bytes")
        .expect("read failed");
    buf
}

async fn exchange(format: LineFormat) {
    umcp_runner::logging::init_for_tests();
    let shutdown = Arc::new(AtomicBool::new(false));

    let a = Bridge::bind(
        LinkConfig::new(1, 2),
        bridge_config(Some("127.0.0.1:0".into()), None, format),
    )
    .await
    .unwrap();
    let line_addr = a.line_addr().expect("listening bridge has a line address");
    let b = Bridge::bind(
        LinkConfig::new(2, 1),
        bridge_config(None, Some(line_addr.to_string()), format),
    )
    .await
    .unwrap();
    assert!(b.line_addr().is_none());

    let a_host = a.host_addr().unwrap();
    let b_host = b.host_addr().unwrap();
    let a_task = tokio::spawn(a.run(shutdown.clone()));
    let b_task = tokio::spawn(b.run(shutdown.clone()));

    let mut client_a = TcpStream::connect(a_host).await.unwrap();
    let mut client_b = TcpStream::connect(b_host).await.unwrap();

    client_a.write_all(b"HELLO").await.unwrap();
    assert_eq!(read_exactly(&mut client_b, 5).await, b"HELLO");

    let reply: Vec<u8> = (0..100u8).collect();
    client_b.write_all(&reply).await.unwrap();
    assert_eq!(read_exactly(&mut client_a, reply.len()).await, reply);

    shutdown.store(true, Ordering::Relaxed);
    let a_stats = a_task.await.unwrap().unwrap();
    let b_stats = b_task.await.unwrap().unwrap();
    assert_eq!(a_stats.delivered_bytes, 100);
    assert_eq!(b_stats.delivered_bytes, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_raw_bridges_exchange_bytes() {
    exchange(LineFormat::Raw).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sentence_bridges_exchange_bytes() {
    exchange(LineFormat::Sentence).await;
}
