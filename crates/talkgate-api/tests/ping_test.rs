#![allow(clippy::unwrap_used)]
// Integration tests for the UDP ping and dial failures, using
// local sockets in place of a voice server.

use std::time::Duration;

use tokio::net::{TcpListener, UdpSocket};

use talkgate_api::{Client, ConnectOptions, Error, TlsOptions, ping};

// ── Helpers ─────────────────────────────────────────────────────────

/// Spawn a UDP responder that answers one ping request with the given counts.
async fn fake_server(users: u32, max_users: u32) -> String {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0_u8; 64];
        let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, 12, "ping request must be 12 bytes");
        assert_eq!(&buf[..4], &[0, 0, 0, 0]);

        let mut reply = vec![0, 1, 5, 0];
        reply.extend_from_slice(&buf[4..12]);
        reply.extend_from_slice(&users.to_be_bytes());
        reply.extend_from_slice(&max_users.to_be_bytes());
        reply.extend_from_slice(&558_000_u32.to_be_bytes());
        socket.send_to(&reply, peer).await.unwrap();
    });

    addr.to_string()
}

fn options(address: String, timeout: Duration) -> ConnectOptions {
    ConnectOptions {
        address,
        username: "talkgate-test".into(),
        password: None,
        tokens: Vec::new(),
        tls: TlsOptions {
            insecure: true,
            certificate: None,
        },
        timeout,
    }
}

// ── Ping ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ping_reports_server_counts() {
    let address = fake_server(4, 25).await;

    let reply = ping(&address, Duration::from_secs(2)).await.unwrap();

    assert_eq!(reply.users, 4);
    assert_eq!(reply.max_users, 25);
    assert_eq!(reply.max_bandwidth, 558_000);
    assert_eq!(reply.version_string(), "1.5.0");
}

#[tokio::test]
async fn test_ping_times_out_on_silent_server() {
    // Bound but never answers.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let address = silent.local_addr().unwrap().to_string();

    let result = ping(&address, Duration::from_millis(100)).await;

    assert!(
        matches!(result, Err(Error::Timeout { .. })),
        "expected Timeout, got: {result:?}"
    );
}

#[tokio::test]
async fn test_ping_rejects_bad_address() {
    let result = ping("voice.example.org:notaport", Duration::from_millis(100)).await;
    assert!(matches!(result, Err(Error::InvalidAddress { .. })));
}

// ── Dial failures ───────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_refused_is_io_error() {
    // Grab a free port, then close it again.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let result = Client::connect(options(address, Duration::from_secs(2))).await;

    assert!(
        matches!(result, Err(Error::Io(_))),
        "expected Io error, got: {:?}",
        result.err()
    );
}

#[tokio::test]
async fn test_connect_times_out_when_server_never_speaks_tls() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    // Accept and hold the socket open without ever answering.
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let result = Client::connect(options(address, Duration::from_millis(200))).await;

    assert!(
        matches!(result, Err(Error::Timeout { .. })),
        "expected Timeout, got: {:?}",
        result.err()
    );
}

#[tokio::test]
async fn test_connect_handshake_failure_is_tls_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    // Accept and immediately hang up.
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
    });

    let result = Client::connect(options(address, Duration::from_secs(2))).await;

    assert!(
        matches!(result, Err(Error::Tls(_))),
        "expected Tls error, got: {:?}",
        result.err()
    );
}
