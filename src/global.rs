//! Process-wide default registry.
//!
//! Programs with a single dispatch table register on the default registry
//! through the free functions below instead of threading a
//! [`HandlerRegistry`] around. Transports that are not given an explicit
//! registry look handlers up here.
//!
//! ```
//! use talkwire::DispatchError;
//!
//! talkwire::handle("facade-doc-upper", |s: String| async move {
//!     Ok::<_, DispatchError>(s.to_uppercase())
//! })
//! .unwrap();
//!
//! assert!(talkwire::find_request_handler("facade-doc-upper").is_some());
//! ```

use std::future::Future;

use bytes::Bytes;
use once_cell::sync::Lazy;

use crate::connection::ConnectionHandle;
use crate::error::Result;
use crate::handler::{
    BufferNotificationHandler, HandlerRegistry, InboundChunks, IntoNotificationHandler,
    IntoRequestHandler, RequestHandler, Route, StreamWriter,
};

static DEFAULT_REGISTRY: Lazy<HandlerRegistry> = Lazy::new(|| {
    tracing::debug!("initializing default handler registry");
    HandlerRegistry::new()
});

/// The process-wide default registry.
pub fn default_registry() -> &'static HandlerRegistry {
    &DEFAULT_REGISTRY
}

/// Register a typed request handler on the default registry.
///
/// See [`HandlerRegistry::handle_request`].
pub fn handle<F, M>(route: impl Into<Route>, f: F) -> Result<()>
where
    F: IntoRequestHandler<M>,
{
    default_registry().handle_request(route, f)
}

/// Register a raw request handler on the default registry.
///
/// See [`HandlerRegistry::handle_buffer_request`].
pub fn handle_buffer_request<F, Fut>(route: impl Into<Route>, f: F) -> Result<()>
where
    F: Fn(ConnectionHandle, String, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes>> + Send + 'static,
{
    default_registry().handle_buffer_request(route, f)
}

/// Register a stream request handler on the default registry.
///
/// See [`HandlerRegistry::handle_stream_request`].
pub fn handle_stream_request<F, Fut>(route: impl Into<Route>, f: F) -> Result<()>
where
    F: Fn(ConnectionHandle, String, InboundChunks, StreamWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    default_registry().handle_stream_request(route, f)
}

/// Register a typed notification handler on the default registry.
///
/// See [`HandlerRegistry::handle_notification`].
pub fn handle_notification<F, M>(route: impl Into<Route>, f: F) -> Result<()>
where
    F: IntoNotificationHandler<M>,
{
    default_registry().handle_notification(route, f)
}

/// Register a raw notification handler on the default registry.
///
/// See [`HandlerRegistry::handle_buffer_notification`].
pub fn handle_buffer_notification<F, Fut>(route: impl Into<Route>, f: F) -> Result<()>
where
    F: Fn(ConnectionHandle, String, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    default_registry().handle_buffer_notification(route, f)
}

/// Look up a request handler on the default registry.
pub fn find_request_handler(op: &str) -> Option<RequestHandler> {
    default_registry().find_request_handler(op)
}

/// Look up a notification handler on the default registry.
pub fn find_notification_handler(name: &str) -> Option<BufferNotificationHandler> {
    default_registry().find_notification_handler(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;

    // The default registry is shared by every test in the process, so each
    // test uses its own names and never registers a fallback.

    #[test]
    fn test_default_registry_is_shared() {
        assert!(std::ptr::eq(default_registry(), default_registry()));
    }

    #[tokio::test]
    async fn test_handle_and_find() {
        handle("global-test-add", |(a, b): (i64, i64)| async move {
            Ok::<_, DispatchError>(a + b)
        })
        .unwrap();

        let handler = find_request_handler("global-test-add").unwrap();
        let out = handler
            .as_buffer()
            .unwrap()
            .call(ConnectionHandle::detached(), "global-test-add", Bytes::from_static(b"[2,3]"))
            .await
            .unwrap();
        assert_eq!(&out[..], b"5");
        assert!(default_registry()
            .request_names()
            .contains(&"global-test-add".to_string()));
    }

    #[tokio::test]
    async fn test_buffer_and_stream_facade() {
        handle_buffer_request("global-test-echo", |_c, _op, payload| async move { Ok(payload) })
            .unwrap();
        handle_stream_request("global-test-stream", |_c, _op, _inbound, writer: StreamWriter| async move {
            writer.end().await
        })
        .unwrap();

        assert!(!find_request_handler("global-test-echo").unwrap().is_stream());
        assert!(find_request_handler("global-test-stream").unwrap().is_stream());
    }

    #[tokio::test]
    async fn test_notification_facade() {
        handle_notification("global-test-note", |_n: i64| async {}).unwrap();
        handle_buffer_notification("global-test-raw-note", |_c, _n, _p| async {}).unwrap();

        assert!(find_notification_handler("global-test-note").is_some());
        assert!(find_notification_handler("global-test-raw-note").is_some());
        default_registry()
            .dispatch_notification(ConnectionHandle::detached(), "global-test-note", Bytes::from_static(b"1"))
            .await
            .unwrap();
    }

    #[test]
    fn test_facade_rejects_empty_name() {
        let err = handle("", || async { Ok::<_, DispatchError>(()) }).unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));
    }
}
