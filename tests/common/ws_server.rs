//! Minimal WebSocket backend for realtime tests
//!
//! Accepts connections on an ephemeral port and hands each one to the test
//! together with the request URI, so tests can inspect the `initData`
//! parameter, push frames and close the socket from the server side.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

pub struct Connection {
    pub uri: String,
    pub socket: WebSocketStream<TcpStream>,
}

impl Connection {
    /// Value of the `initData` query parameter, decoded.
    pub fn init_data(&self) -> Option<String> {
        let query = self.uri.split_once('?')?.1;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "initData")
            .map(|(_, value)| value.into_owned())
    }

    pub async fn push(&mut self, frame: serde_json::Value) {
        self.socket.send(Message::Text(frame.to_string())).await.unwrap();
    }

    /// Next text frame from the client, parsed as JSON.
    pub async fn next_json(&mut self) -> serde_json::Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.socket.next())
                .await
                .expect("no frame from client")
                .expect("client went away")
                .unwrap();
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    /// Waits until the client closes the connection.
    pub async fn expect_closed(&mut self) {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.socket.next())
                .await
                .expect("client kept the connection open");
            match frame {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    }

    /// Server-initiated close.
    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}

pub struct WsServer {
    pub url: String,
    connections: mpsc::UnboundedReceiver<Connection>,
}

impl WsServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut uri = String::new();
                let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    uri = request.uri().to_string();
                    Ok(response)
                };
                let accepted = accept_hdr_async(stream, callback).await;
                if let Ok(socket) = accepted {
                    if tx.send(Connection { uri, socket }).is_err() {
                        break;
                    }
                }
            }
        });

        Self { url, connections: rx }
    }

    /// Waits for the next client connection.
    pub async fn accept(&mut self) -> Connection {
        tokio::time::timeout(Duration::from_secs(5), self.connections.recv())
            .await
            .expect("client did not connect")
            .expect("server task ended")
    }

    /// Asserts no further connection arrives within `within`.
    pub async fn assert_no_connection(&mut self, within: Duration) {
        let next = tokio::time::timeout(within, self.connections.recv()).await;
        assert!(next.is_err(), "unexpected extra connection");
    }
}
