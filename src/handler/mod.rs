//! Handler module - canonical handler forms, adaptation and the registry.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps operation/notification names to handlers
//! - [`IntoRequestHandler`] / [`IntoNotificationHandler`] - compile typed
//!   callables into canonical buffer handlers
//! - [`InboundChunks`] / [`StreamWriter`] - the stream handler contract
//!
//! # Example
//!
//! ```
//! use talkwire::handler::{HandlerRegistry, Route};
//! use talkwire::DispatchError;
//!
//! let registry = HandlerRegistry::new();
//!
//! registry
//!     .handle_request("add", |(a, b): (i64, i64)| async move {
//!         Ok::<_, DispatchError>(a + b)
//!     })
//!     .unwrap();
//!
//! registry
//!     .handle_buffer_request(Route::Fallback, |_conn, _op, payload| async move {
//!         Ok(payload)
//!     })
//!     .unwrap();
//!
//! assert!(registry.find_request_handler("add").is_some());
//! assert!(registry.find_request_handler("anything").is_some());
//! ```

mod adapter;
mod registry;
mod route;
mod signature;
pub mod stream;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::connection::ConnectionHandle;
use crate::error::Result;

pub use adapter::{
    ConnNamePayload, ConnOnly, ConnPayload, IntoNotificationHandler, IntoRequestHandler,
    NamePayload, NoArgs, PayloadOnly, RequestOutput,
};
pub use registry::{HandlerRegistry, NotificationErrorPolicy, RegistryBuilder, RegistryConfig};
pub use route::Route;
pub use signature::{Capability, HandlerKind, OutputArity, Signature};
pub use stream::{InboundChunks, StreamWriter};

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type BufferRequestFn =
    dyn Fn(ConnectionHandle, String, Bytes) -> BoxFuture<'static, Result<Bytes>> + Send + Sync;

type StreamRequestFn = dyn Fn(ConnectionHandle, String, InboundChunks, StreamWriter) -> BoxFuture<'static, Result<()>>
    + Send
    + Sync;

type BufferNotificationFn =
    dyn Fn(ConnectionHandle, String, Bytes) -> BoxFuture<'static, ()> + Send + Sync;

/// Request handler operating on raw payload bytes.
///
/// An empty result buffer means "no payload".
#[derive(Clone)]
pub struct BufferRequestHandler(Arc<BufferRequestFn>);

impl BufferRequestHandler {
    /// Create a handler from an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ConnectionHandle, String, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes>> + Send + 'static,
    {
        Self::from_boxed(move |conn, op, payload| Box::pin(f(conn, op, payload)))
    }

    pub(crate) fn from_boxed<F>(f: F) -> Self
    where
        F: Fn(ConnectionHandle, String, Bytes) -> BoxFuture<'static, Result<Bytes>>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the handler.
    pub fn call(
        &self,
        conn: ConnectionHandle,
        op: &str,
        payload: Bytes,
    ) -> BoxFuture<'static, Result<Bytes>> {
        (self.0)(conn, op.to_string(), payload)
    }
}

/// Request handler that reads and writes chunks directly.
#[derive(Clone)]
pub struct StreamRequestHandler(Arc<StreamRequestFn>);

impl StreamRequestHandler {
    /// Create a handler from an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ConnectionHandle, String, InboundChunks, StreamWriter) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self(Arc::new(move |conn, op, inbound, writer| {
            Box::pin(f(conn, op, inbound, writer))
        }))
    }

    /// Invoke the handler.
    pub fn call(
        &self,
        conn: ConnectionHandle,
        op: &str,
        inbound: InboundChunks,
        writer: StreamWriter,
    ) -> BoxFuture<'static, Result<()>> {
        (self.0)(conn, op.to_string(), inbound, writer)
    }
}

/// Notification handler operating on raw payload bytes.
#[derive(Clone)]
pub struct BufferNotificationHandler(Arc<BufferNotificationFn>);

impl BufferNotificationHandler {
    /// Create a handler from an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ConnectionHandle, String, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::from_boxed(move |conn, name, payload| Box::pin(f(conn, name, payload)))
    }

    pub(crate) fn from_boxed<F>(f: F) -> Self
    where
        F: Fn(ConnectionHandle, String, Bytes) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the handler.
    pub fn call(&self, conn: ConnectionHandle, name: &str, payload: Bytes) -> BoxFuture<'static, ()> {
        (self.0)(conn, name.to_string(), payload)
    }
}

/// Handler stored for a request route.
#[derive(Clone)]
pub enum RequestHandler {
    /// Whole payload in, whole payload out.
    Buffer(BufferRequestHandler),
    /// Chunked payload in, chunked payload out.
    Stream(StreamRequestHandler),
}

impl RequestHandler {
    /// The buffer handler, if this route is not streamed.
    pub fn as_buffer(&self) -> Option<&BufferRequestHandler> {
        match self {
            RequestHandler::Buffer(h) => Some(h),
            RequestHandler::Stream(_) => None,
        }
    }

    /// The stream handler, if this route is streamed.
    pub fn as_stream(&self) -> Option<&StreamRequestHandler> {
        match self {
            RequestHandler::Stream(h) => Some(h),
            RequestHandler::Buffer(_) => None,
        }
    }

    /// Whether this handler uses the stream convention.
    pub fn is_stream(&self) -> bool {
        matches!(self, RequestHandler::Stream(_))
    }
}

impl fmt::Debug for BufferRequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BufferRequestHandler")
    }
}

impl fmt::Debug for StreamRequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamRequestHandler")
    }
}

impl fmt::Debug for BufferNotificationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BufferNotificationHandler")
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestHandler::Buffer(h) => h.fmt(f),
            RequestHandler::Stream(h) => h.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffer_request_handler_call() {
        let handler = BufferRequestHandler::new(|_conn, op, payload: Bytes| async move {
            let mut out = op.into_bytes();
            out.extend_from_slice(&payload);
            Ok(Bytes::from(out))
        });

        let result = handler
            .call(ConnectionHandle::detached(), "op:", Bytes::from_static(b"data"))
            .await
            .unwrap();
        assert_eq!(&result[..], b"op:data");
    }

    #[tokio::test]
    async fn test_stream_request_handler_call() {
        let handler = StreamRequestHandler::new(|_conn, _op, mut inbound: InboundChunks, writer: StreamWriter| async move {
            while let Some(chunk) = inbound.next_chunk().await {
                writer.write(chunk).await?;
            }
            writer.end().await
        });

        let (tx, inbound) = stream::channel(4);
        let (writer, mut outbound) = StreamWriter::channel(4);
        tx.send(Bytes::from_static(b"a")).await.unwrap();
        tx.send(Bytes::new()).await.unwrap();

        handler
            .call(ConnectionHandle::detached(), "copy", inbound, writer)
            .await
            .unwrap();

        assert_eq!(&outbound.recv().await.unwrap()[..], b"a");
        assert!(outbound.recv().await.unwrap().is_empty());
    }

    #[test]
    fn test_request_handler_variants() {
        let buffer = RequestHandler::Buffer(BufferRequestHandler::new(|_c, _o, p| async move { Ok(p) }));
        assert!(!buffer.is_stream());
        assert!(buffer.as_buffer().is_some());
        assert!(buffer.as_stream().is_none());

        let stream = RequestHandler::Stream(StreamRequestHandler::new(|_c, _o, _i, _w| async { Ok(()) }));
        assert!(stream.is_stream());
        assert!(stream.as_buffer().is_none());
        assert_eq!(format!("{:?}", stream), "StreamRequestHandler");
    }
}
