//! Minimal line client for a bridge port.

use super::{BridgeError, BridgeResult};
use crate::envelope::MessageEnvelope;
use chrono::Utc;
use std::mem;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Connects to a running bridge and exchanges envelopes with it.
///
/// Used by the `tools send` command and by tests.
pub struct BridgeClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    buffer: Vec<u8>,
}

impl BridgeClient {
    /// Connects to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Connect`] when the connection is refused.
    pub async fn connect(address: SocketAddr) -> BridgeResult<Self> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| BridgeError::Connect { address, source })?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            buffer: Vec::new(),
        })
    }

    /// Sends one envelope as a frame.
    ///
    /// # Errors
    ///
    /// Returns encoding or socket errors.
    pub async fn send(&mut self, envelope: &MessageEnvelope) -> BridgeResult<()> {
        let line = envelope.to_json_line()?;
        self.send_line(&line).await
    }

    /// Sends a raw line; a newline is appended.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] when the write fails.
    pub async fn send_line(&mut self, line: &str) -> BridgeResult<()> {
        let mut frame = String::with_capacity(line.len().saturating_add(1));
        frame.push_str(line);
        frame.push('\n');
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Waits up to `limit` for the next frame.
    ///
    /// Returns `Ok(None)` on timeout; a partially received frame is kept
    /// for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Disconnected`] when the bridge closed the
    /// connection, or a decode error for a malformed frame.
    pub async fn receive(&mut self, limit: Duration) -> BridgeResult<Option<MessageEnvelope>> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let read = tokio::time::timeout_at(
                deadline,
                self.reader.read_until(b'\n', &mut self.buffer),
            )
            .await;
            match read {
                Err(_) => return Ok(None),
                Ok(Err(err)) => return Err(BridgeError::Io(err)),
                Ok(Ok(0)) => return Err(BridgeError::Disconnected),
                Ok(Ok(_)) => {
                    let frame = mem::take(&mut self.buffer);
                    let text = String::from_utf8_lossy(&frame);
                    if text.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(MessageEnvelope::decode(&text, Utc::now())?));
                }
            }
        }
    }

    /// Closes the write side so the bridge sees end of input.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] when the shutdown fails.
    pub async fn finish(&mut self) -> BridgeResult<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
