//! Connection capability handed to handlers.
//!
//! The transport owns the live socket and implements [`Connection`]. Handlers
//! that declare a [`ConnectionHandle`] parameter receive a cheap clone of it
//! and can talk back to the peer while serving a request or notification.
//!
//! # Example
//!
//! ```ignore
//! registry.handle_request("subscribe", |conn: ConnectionHandle, topic: String| async move {
//!     conn.notify("subscribed", &topic).await?;
//!     Ok::<_, DispatchError>(())
//! })?;
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::JsonCodec;
use crate::error::{DispatchError, Result};
use crate::handler::BoxFuture;

/// Outbound primitives of a live bidirectional session.
///
/// Implemented by the transport. Payloads are already encoded.
pub trait Connection: Send + Sync + 'static {
    /// Send a one-way notification to the peer.
    fn notify_raw(&self, name: &str, payload: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Send a request to the peer and wait for its result payload.
    fn request_raw(&self, op: &str, payload: Bytes) -> BoxFuture<'_, Result<Bytes>>;
}

/// Cloneable handle to a [`Connection`].
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<dyn Connection>,
}

impl ConnectionHandle {
    /// Wrap a transport connection.
    pub fn new<C: Connection>(conn: C) -> Self {
        Self {
            inner: Arc::new(conn),
        }
    }

    /// Wrap an already shared transport connection.
    pub fn from_arc(inner: Arc<dyn Connection>) -> Self {
        Self { inner }
    }

    /// A handle with no live peer.
    ///
    /// Notifications are accepted and dropped; requests fail with
    /// [`DispatchError::ConnectionClosed`] since no result can arrive.
    pub fn detached() -> Self {
        Self::new(Detached)
    }

    /// Send a notification with a JSON-encoded payload.
    pub async fn notify<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let payload = JsonCodec::encode(value)?;
        self.inner.notify_raw(name, payload).await
    }

    /// Send a notification with raw bytes.
    pub async fn notify_raw(&self, name: &str, payload: Bytes) -> Result<()> {
        self.inner.notify_raw(name, payload).await
    }

    /// Send a request with a JSON-encoded payload and decode the result.
    pub async fn request<T, R>(&self, op: &str, value: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = JsonCodec::encode(value)?;
        let result = self.inner.request_raw(op, payload).await?;
        JsonCodec::decode(&result)
    }

    /// Send a request with raw bytes.
    pub async fn request_raw(&self, op: &str, payload: Bytes) -> Result<Bytes> {
        self.inner.request_raw(op, payload).await
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle").finish_non_exhaustive()
    }
}

struct Detached;

impl Connection for Detached {
    fn notify_raw(&self, _name: &str, _payload: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn request_raw(&self, _op: &str, _payload: Bytes) -> BoxFuture<'_, Result<Bytes>> {
        Box::pin(async { Err(DispatchError::ConnectionClosed) })
    }
}
