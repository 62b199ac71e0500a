// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wire abstraction protocol adapters drive. Real transports (WebSocket-over-TCP for
//! duplex-stream, a generic byte channel for radio-link) and a `MockTransport` for tests
//! share this contract, so adapters stay agnostic to what actually carries the bytes.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;

/// A duplex byte-oriented wire. `send` writes one frame; `recv` yields the next inbound
/// frame or `None` on clean close.
#[async_trait]
pub trait ByteTransport: Send + Sync {
    async fn send(&self, frame: Vec<u8>) -> anyhow::Result<()>;
    async fn recv(&self) -> anyhow::Result<Option<Vec<u8>>>;
    async fn close(&self) -> anyhow::Result<()>;
}

/// WebSocket-backed transport for the duplex-stream adapter.
pub struct WsTransport {
    write: Mutex<futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        Message,
    >>,
    read: Mutex<futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    >>,
}

impl WsTransport {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (stream, _) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = stream.split();
        Ok(Self { write: Mutex::new(write), read: Mutex::new(read) })
    }
}

#[async_trait]
impl ByteTransport for WsTransport {
    async fn send(&self, frame: Vec<u8>) -> anyhow::Result<()> {
        self.write.lock().await.send(Message::Binary(frame.into())).await?;
        Ok(())
    }

    async fn recv(&self) -> anyhow::Result<Option<Vec<u8>>> {
        loop {
            let msg = self.read.lock().await.next().await;
            match msg {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.to_vec())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        let _ = self.write.lock().await.close().await;
        Ok(())
    }
}

/// In-memory transport for unit tests: an `mpsc` pair looped back or wired to a peer.
pub struct MockTransport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: std::sync::atomic::AtomicBool,
}

impl MockTransport {
    /// Build a connected pair: frames sent on one side arrive as `recv()` on the other.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self { outbound: a_tx, inbound: Mutex::new(a_rx), closed: std::sync::atomic::AtomicBool::new(false) },
            Self { outbound: b_tx, inbound: Mutex::new(b_rx), closed: std::sync::atomic::AtomicBool::new(false) },
        )
    }
}

#[async_trait]
impl ByteTransport for MockTransport {
    async fn send(&self, frame: Vec<u8>) -> anyhow::Result<()> {
        if self.closed.load(std::sync::atomic::Ordering::Relaxed) {
            anyhow::bail!("transport closed");
        }
        self.outbound.send(frame).map_err(|_| anyhow::anyhow!("peer dropped"))
    }

    async fn recv(&self) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.store(true, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
