//! Helper functions for integration tests
//!
//! Tests run against a real in-process WebSocket server: a plain
//! `TcpListener` plus `tokio_tungstenite::accept_async`, so the full
//! connect/decode/close path is exercised.

use std::future::Future;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{WebSocketStream, accept_async};

/// Bind a listener on an ephemeral port. Returns the listener and the
/// http origin the client derives its ws URL from.
pub async fn bind_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("http://{addr}"))
}

/// Accept one WebSocket connection.
pub async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

pub fn sample_json(cpus: &[f32], sentences: &[&str]) -> String {
    serde_json::json!({ "cpus": cpus, "sentences": sentences }).to_string()
}

/// Await a future with a test deadline so a broken pipeline fails instead
/// of hanging.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("test timed out")
}
