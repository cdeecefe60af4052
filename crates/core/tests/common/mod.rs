// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;

pub type ServerSocket = WebSocketStream<TcpStream>;

pub struct TestServer {
    pub url: String,
    conns: mpsc::Receiver<ServerSocket>,
}

impl TestServer {
    /// Waits for the next client connection, already upgraded to WebSocket.
    pub async fn accept(&mut self) -> ServerSocket {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.conns.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("listener task ended")
    }

    /// Like [`Self::accept`], but without the timeout; pairs with a caller
    /// that wants to assert no connection arrives.
    pub async fn accept_opt(&mut self) -> Option<ServerSocket> {
        self.conns.recv().await
    }
}

/// Binds a local WebSocket server on an ephemeral port.
///
/// Returns `None` when the environment forbids binding local TCP sockets, so
/// callers can skip instead of fail.
pub async fn start_server() -> Option<TestServer> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(e) => panic!("failed to bind test listener: {e}"),
    };
    let addr = listener.local_addr().unwrap();

    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            if tx.send(socket).await.is_err() {
                break;
            }
        }
    });

    Some(TestServer { url: format!("ws://{addr}/ws/connect/test"), conns: rx })
}
