//! Stream handler contract.
//!
//! A stream handler reads request chunks from [`InboundChunks`] and emits
//! response chunks through a [`StreamWriter`]:
//! - `write` - send a raw chunk
//! - `write_value` - send a JSON-encoded chunk
//! - `end` - send the end-of-stream marker (empty chunk)
//!
//! The empty chunk is reserved as the end-of-stream marker in both
//! directions.
//!
//! # Example
//!
//! ```ignore
//! registry.handle_stream_request("upper", |_conn, _op, mut inbound, writer| async move {
//!     while let Some(chunk) = inbound.next_chunk().await {
//!         writer.write(Bytes::from(chunk.to_ascii_uppercase())).await?;
//!     }
//!     writer.end().await
//! })?;
//! ```

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::codec::JsonCodec;
use crate::error::{DispatchError, Result};

/// Create a sender and the matching [`InboundChunks`] reader.
///
/// The transport feeds request chunks into the sender and sends an empty
/// chunk (or drops the sender) when the peer ends the stream.
pub fn channel(capacity: usize) -> (mpsc::Sender<Bytes>, InboundChunks) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, InboundChunks::new(rx))
}

/// Request chunks delivered to a stream handler.
#[derive(Debug)]
pub struct InboundChunks {
    rx: mpsc::Receiver<Bytes>,
    finished: bool,
}

impl InboundChunks {
    /// Wrap a receiver fed by the transport.
    pub fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    /// Receive the next chunk.
    ///
    /// Returns `None` once the end-of-stream marker arrives or the sender is
    /// dropped, and on every call after that.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(chunk) if !chunk.is_empty() => Some(chunk),
            _ => {
                self.finished = true;
                self.rx.close();
                None
            }
        }
    }

    /// Whether end-of-stream has been observed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Outbound writer handed to a stream handler.
///
/// `StreamWriter` is `Clone`; every clone feeds the same response stream.
#[derive(Clone, Debug)]
pub struct StreamWriter {
    tx: mpsc::Sender<Bytes>,
}

impl StreamWriter {
    /// Wrap a sender drained by the transport.
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }

    /// Create a writer and the receiver the transport drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Send a response chunk.
    ///
    /// # Errors
    ///
    /// Empty chunks are rejected since they mark end-of-stream; use
    /// [`StreamWriter::end`] instead. Returns
    /// [`DispatchError::ConnectionClosed`] if the transport stopped reading.
    pub async fn write(&self, chunk: Bytes) -> Result<()> {
        if chunk.is_empty() {
            return Err(DispatchError::Protocol(
                "empty chunk is reserved for end-of-stream".to_string(),
            ));
        }
        self.send(chunk).await
    }

    /// Send a JSON-encoded response chunk.
    pub async fn write_value<T: serde::Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let chunk = JsonCodec::encode(value)?;
        self.write(chunk).await
    }

    /// End the response stream.
    pub async fn end(&self) -> Result<()> {
        self.send(Bytes::new()).await
    }

    async fn send(&self, chunk: Bytes) -> Result<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| DispatchError::ConnectionClosed)
    }
}
