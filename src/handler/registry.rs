//! Handler registry for dispatching requests and notifications by name.
//!
//! The registry keeps two independent route tables, one for requests and
//! one for notifications. Each table maps exact names to handlers and has
//! one fallback slot used when no exact name matches. Each table sits
//! behind its own reader/writer lock, so lookups run concurrently and
//! registrations are serialized.
//!
//! # Example
//!
//! ```
//! use talkwire::handler::{HandlerRegistry, NotificationErrorPolicy, Route};
//! use talkwire::DispatchError;
//!
//! let registry = HandlerRegistry::builder()
//!     .notification_errors(NotificationErrorPolicy::Log)
//!     .build();
//!
//! registry
//!     .handle_request("echo", |data: String| async move { Ok::<_, DispatchError>(data) })
//!     .unwrap();
//! registry
//!     .handle_notification(Route::Fallback, |name: String, _v: serde_json::Value| async move {
//!         println!("unhandled notification {}", name);
//!     })
//!     .unwrap();
//!
//! assert_eq!(registry.request_names(), vec!["echo".to_string()]);
//! assert!(registry.has_notification_fallback());
//! ```

use std::collections::HashMap;
use std::future::Future;

use bytes::Bytes;
use parking_lot::RwLock;

use super::adapter::{guard_notification, IntoNotificationHandler, IntoRequestHandler};
use super::route::Route;
use super::signature::HandlerKind;
use super::stream::{InboundChunks, StreamWriter};
use super::{BufferNotificationHandler, BufferRequestHandler, RequestHandler, StreamRequestHandler};
use crate::connection::ConnectionHandle;
use crate::error::{DispatchError, Result};

/// What happens to notifications whose payload does not decode or whose
/// handler panics.
///
/// Notifications have no response path, so such failures are never
/// returned to the transport. The policy only chooses whether they are
/// logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationErrorPolicy {
    /// Drop silently (trace-level diagnostics only).
    #[default]
    Discard,
    /// Drop and log a warning.
    Log,
}

impl NotificationErrorPolicy {
    pub(crate) fn report_decode(self, name: &str, err: &DispatchError) {
        match self {
            NotificationErrorPolicy::Discard => {
                tracing::trace!(notification = %name, error = %err, "dropped undecodable notification");
            }
            NotificationErrorPolicy::Log => {
                tracing::warn!(notification = %name, error = %err, "dropped undecodable notification");
            }
        }
    }

    pub(crate) fn report_panic(self, name: &str) {
        match self {
            NotificationErrorPolicy::Discard => {
                tracing::trace!(notification = %name, "notification handler panicked");
            }
            NotificationErrorPolicy::Log => {
                tracing::warn!(notification = %name, "notification handler panicked");
            }
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Handling of notification failures.
    pub notification_errors: NotificationErrorPolicy,
}

/// Builder for a [`HandlerRegistry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    config: RegistryConfig,
}

impl RegistryBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the notification failure policy.
    ///
    /// Default: [`NotificationErrorPolicy::Discard`]
    pub fn notification_errors(mut self, policy: NotificationErrorPolicy) -> Self {
        self.config.notification_errors = policy;
        self
    }

    /// Build the registry.
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry::with_config(self.config)
    }
}

/// Exact names plus one fallback slot.
struct RouteTable<H> {
    exact: HashMap<String, H>,
    fallback: Option<H>,
}

impl<H: Clone> RouteTable<H> {
    fn new() -> Self {
        Self {
            exact: HashMap::new(),
            fallback: None,
        }
    }

    /// Store a handler. Returns `true` if an existing entry was replaced.
    fn insert(&mut self, route: Route, handler: H) -> bool {
        match route {
            Route::Name(name) => self.exact.insert(name, handler).is_some(),
            Route::Fallback => self.fallback.replace(handler).is_some(),
        }
    }

    fn find(&self, name: &str) -> Option<(H, bool)> {
        if let Some(handler) = self.exact.get(name) {
            return Some((handler.clone(), false));
        }
        self.fallback.clone().map(|handler| (handler, true))
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.exact.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Registry mapping operation and notification names to handlers.
pub struct HandlerRegistry {
    /// Request handlers by name.
    requests: RwLock<RouteTable<RequestHandler>>,
    /// Notification handlers by name.
    notifications: RwLock<RouteTable<BufferNotificationHandler>>,
    config: RegistryConfig,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a builder for configuring a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Create a new empty registry with the given configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            requests: RwLock::new(RouteTable::new()),
            notifications: RwLock::new(RouteTable::new()),
            config,
        }
    }

    /// The registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a typed request handler.
    ///
    /// The callable is checked against the accepted request shapes and
    /// compiled into a buffer handler that decodes the JSON payload, invokes
    /// the callable and encodes its result.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] for an empty exact name or a
    /// rejected signature. Nothing is stored in that case.
    pub fn handle_request<F, M>(&self, route: impl Into<Route>, f: F) -> Result<()>
    where
        F: IntoRequestHandler<M>,
    {
        let route = route.into();
        route.validate()?;
        let signature = <F as IntoRequestHandler<M>>::signature();
        signature.validate_request()?;
        tracing::debug!(route = %route, signature = %signature, "registering request handler");

        let handler = RequestHandler::Buffer(f.into_request_handler());
        self.set_request_handler(route, handler);
        Ok(())
    }

    /// Register a request handler operating on raw payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] for an empty exact name.
    pub fn handle_buffer_request<F, Fut>(&self, route: impl Into<Route>, f: F) -> Result<()>
    where
        F: Fn(ConnectionHandle, String, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes>> + Send + 'static,
    {
        let route = route.into();
        route.validate()?;
        tracing::debug!(route = %route, "registering buffer request handler");

        self.set_request_handler(route, RequestHandler::Buffer(BufferRequestHandler::new(f)));
        Ok(())
    }

    /// Register a request handler that reads and writes chunks directly.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] for an empty exact name.
    pub fn handle_stream_request<F, Fut>(&self, route: impl Into<Route>, f: F) -> Result<()>
    where
        F: Fn(ConnectionHandle, String, InboundChunks, StreamWriter) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let route = route.into();
        route.validate()?;
        tracing::debug!(route = %route, "registering stream request handler");

        self.set_request_handler(route, RequestHandler::Stream(StreamRequestHandler::new(f)));
        Ok(())
    }

    /// Register a typed notification handler.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] for an empty exact name or a
    /// rejected signature. Nothing is stored in that case.
    pub fn handle_notification<F, M>(&self, route: impl Into<Route>, f: F) -> Result<()>
    where
        F: IntoNotificationHandler<M>,
    {
        let route = route.into();
        route.validate()?;
        let signature = <F as IntoNotificationHandler<M>>::signature();
        signature.validate_notification()?;
        tracing::debug!(route = %route, signature = %signature, "registering notification handler");

        let handler = f.into_notification_handler(self.config.notification_errors);
        self.set_notification_handler(route, handler);
        Ok(())
    }

    /// Register a notification handler operating on raw payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] for an empty exact name.
    pub fn handle_buffer_notification<F, Fut>(&self, route: impl Into<Route>, f: F) -> Result<()>
    where
        F: Fn(ConnectionHandle, String, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let route = route.into();
        route.validate()?;
        tracing::debug!(route = %route, "registering buffer notification handler");

        let handler = guard_notification(self.config.notification_errors, f);
        self.set_notification_handler(route, handler);
        Ok(())
    }

    fn set_request_handler(&self, route: Route, handler: RequestHandler) {
        let kind = HandlerKind::Request;
        let replaced = self.requests.write().insert(route.clone(), handler);
        if replaced {
            tracing::debug!(route = %route, %kind, "replaced existing handler");
        }
    }

    fn set_notification_handler(&self, route: Route, handler: BufferNotificationHandler) {
        let kind = HandlerKind::Notification;
        let replaced = self.notifications.write().insert(route.clone(), handler);
        if replaced {
            tracing::debug!(route = %route, %kind, "replaced existing handler");
        }
    }

    /// Look up the handler for operation `op`.
    ///
    /// Prefers an exact registration, then the fallback. Returns `None` when
    /// neither exists; reporting that to the peer is up to the caller.
    pub fn find_request_handler(&self, op: &str) -> Option<RequestHandler> {
        let found = self.requests.read().find(op);
        match found {
            Some((handler, fell_back)) => {
                if fell_back {
                    tracing::trace!(op, "request served by fallback handler");
                }
                Some(handler)
            }
            None => {
                tracing::trace!(op, "no request handler");
                None
            }
        }
    }

    /// Look up the handler for notification `name`.
    ///
    /// Prefers an exact registration, then the fallback.
    pub fn find_notification_handler(&self, name: &str) -> Option<BufferNotificationHandler> {
        let found = self.notifications.read().find(name);
        match found {
            Some((handler, fell_back)) => {
                if fell_back {
                    tracing::trace!(notification = name, "notification served by fallback handler");
                }
                Some(handler)
            }
            None => {
                tracing::trace!(notification = name, "no notification handler");
                None
            }
        }
    }

    /// Dispatch a request to its buffer handler.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::HandlerNotFound`] if no handler matches `op`
    /// - [`DispatchError::Protocol`] if `op` is served by a stream handler
    /// - whatever the handler returns
    pub async fn dispatch_request(
        &self,
        conn: ConnectionHandle,
        op: &str,
        payload: Bytes,
    ) -> Result<Bytes> {
        let handler = self
            .find_request_handler(op)
            .ok_or_else(|| DispatchError::HandlerNotFound(op.to_string()))?;

        match handler {
            RequestHandler::Buffer(handler) => handler.call(conn, op, payload).await,
            RequestHandler::Stream(_) => Err(DispatchError::Protocol(format!(
                "{:?} is a stream operation",
                op
            ))),
        }
    }

    /// Dispatch a request to its stream handler.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::HandlerNotFound`] if no handler matches `op`
    /// - [`DispatchError::Protocol`] if `op` is served by a buffer handler
    /// - whatever the handler returns
    pub async fn dispatch_stream(
        &self,
        conn: ConnectionHandle,
        op: &str,
        inbound: InboundChunks,
        writer: StreamWriter,
    ) -> Result<()> {
        let handler = self
            .find_request_handler(op)
            .ok_or_else(|| DispatchError::HandlerNotFound(op.to_string()))?;

        match handler {
            RequestHandler::Stream(handler) => handler.call(conn, op, inbound, writer).await,
            RequestHandler::Buffer(_) => Err(DispatchError::Protocol(format!(
                "{:?} is not a stream operation",
                op
            ))),
        }
    }

    /// Dispatch a notification.
    ///
    /// Handler failures are never reported; see [`NotificationErrorPolicy`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::HandlerNotFound`] if no handler matches
    /// `name`.
    pub async fn dispatch_notification(
        &self,
        conn: ConnectionHandle,
        name: &str,
        payload: Bytes,
    ) -> Result<()> {
        let handler = self
            .find_notification_handler(name)
            .ok_or_else(|| DispatchError::HandlerNotFound(name.to_string()))?;

        handler.call(conn, name, payload).await;
        Ok(())
    }

    /// Exact request names, sorted.
    pub fn request_names(&self) -> Vec<String> {
        self.requests.read().names()
    }

    /// Exact notification names, sorted.
    pub fn notification_names(&self) -> Vec<String> {
        self.notifications.read().names()
    }

    /// Whether a request fallback is registered.
    pub fn has_request_fallback(&self) -> bool {
        self.requests.read().fallback.is_some()
    }

    /// Whether a notification fallback is registered.
    pub fn has_notification_fallback(&self) -> bool {
        self.notifications.read().fallback.is_some()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::stream;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Deserialize)]
    struct GreetIn {
        name: String,
    }

    #[derive(Serialize)]
    struct GreetOut {
        greeting: String,
    }

    fn conn() -> ConnectionHandle {
        ConnectionHandle::detached()
    }

    #[test]
    fn test_register_request() {
        let registry = HandlerRegistry::new();

        registry
            .handle_request("echo", |data: String| async move { Ok::<_, DispatchError>(data) })
            .unwrap();

        assert!(registry.find_request_handler("echo").is_some());
        assert_eq!(registry.request_names(), vec!["echo".to_string()]);
        assert!(!registry.has_request_fallback());
    }

    #[test]
    fn test_handler_not_found() {
        let registry = HandlerRegistry::new();

        assert!(registry.find_request_handler("x").is_none());
        assert!(registry.find_notification_handler("x").is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = HandlerRegistry::new();

        let err = registry
            .handle_request("", || async { Ok::<_, DispatchError>(()) })
            .unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));

        let err = registry
            .handle_buffer_notification("", |_c, _n, _p| async {})
            .unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));

        assert!(registry.request_names().is_empty());
        assert!(registry.notification_names().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_routing() {
        let registry = HandlerRegistry::new();

        registry
            .handle_request(Route::Fallback, |_c: ConnectionHandle, op: String, _v: serde_json::Value| async move {
                Ok::<_, DispatchError>(format!("fallback:{}", op))
            })
            .unwrap();

        let out = registry
            .dispatch_request(conn(), "anything", Bytes::from_static(b"null"))
            .await
            .unwrap();
        assert_eq!(&out[..], br#""fallback:anything""#);

        registry
            .handle_request("greet", |input: GreetIn| async move {
                Ok::<_, DispatchError>(GreetOut {
                    greeting: format!("Hello {}", input.name),
                })
            })
            .unwrap();

        let out = registry
            .dispatch_request(conn(), "greet", Bytes::from_static(br#"{"name":"Rasmus"}"#))
            .await
            .unwrap();
        assert_eq!(&out[..], br#"{"greeting":"Hello Rasmus"}"#);

        let out = registry
            .dispatch_request(conn(), "other", Bytes::from_static(b"1"))
            .await
            .unwrap();
        assert_eq!(&out[..], br#""fallback:other""#);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let registry = HandlerRegistry::new();

        registry
            .handle_request("version", || async { Ok::<_, DispatchError>(1) })
            .unwrap();
        registry
            .handle_request("version", || async { Ok::<_, DispatchError>(2) })
            .unwrap();

        let out = registry
            .dispatch_request(conn(), "version", Bytes::new())
            .await
            .unwrap();
        assert_eq!(&out[..], b"2");
        assert_eq!(registry.request_names().len(), 1);
    }

    #[tokio::test]
    async fn test_buffer_and_stream_share_request_table() {
        let registry = HandlerRegistry::new();

        registry
            .handle_buffer_request("op", |_c, _op, payload| async move { Ok(payload) })
            .unwrap();
        registry
            .handle_stream_request("op", |_c, _op, _inbound, writer: StreamWriter| async move {
                writer.end().await
            })
            .unwrap();

        let handler = registry.find_request_handler("op").unwrap();
        assert!(handler.is_stream());

        let err = registry
            .dispatch_request(conn(), "op", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_dispatch_stream() {
        let registry = HandlerRegistry::new();

        registry
            .handle_stream_request("count", |_c, _op, mut inbound: InboundChunks, writer: StreamWriter| async move {
                let mut total = 0;
                while let Some(chunk) = inbound.next_chunk().await {
                    total += chunk.len();
                }
                writer.write_value(&total).await?;
                writer.end().await
            })
            .unwrap();
        registry
            .handle_buffer_request("plain", |_c, _op, payload| async move { Ok(payload) })
            .unwrap();

        let (tx, inbound) = stream::channel(4);
        let (writer, mut outbound) = StreamWriter::channel(4);
        tx.send(Bytes::from_static(b"abc")).await.unwrap();
        tx.send(Bytes::from_static(b"de")).await.unwrap();
        tx.send(Bytes::new()).await.unwrap();

        registry
            .dispatch_stream(conn(), "count", inbound, writer)
            .await
            .unwrap();
        assert_eq!(&outbound.recv().await.unwrap()[..], b"5");
        assert!(outbound.recv().await.unwrap().is_empty());

        let (_tx, inbound) = stream::channel(1);
        let (writer, _outbound) = StreamWriter::channel(1);
        let err = registry
            .dispatch_stream(conn(), "plain", inbound, writer)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_dispatch_miss() {
        let registry = HandlerRegistry::new();

        let err = registry
            .dispatch_request(conn(), "missing", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::HandlerNotFound(ref op) if op == "missing"));

        let err = registry
            .dispatch_notification(conn(), "missing", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::HandlerNotFound(_)));
    }

    #[tokio::test]
    async fn test_notification_tables_are_independent() {
        let registry = HandlerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        registry
            .handle_buffer_notification("ping", move |_c, _n, _p| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            })
            .unwrap();

        assert!(registry.find_request_handler("ping").is_none());
        registry
            .dispatch_notification(conn(), "ping", Bytes::new())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.notification_names(), vec!["ping".to_string()]);
    }

    #[tokio::test]
    async fn test_notification_fallback() {
        let registry = HandlerRegistry::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let sink = seen.clone();
        registry
            .handle_notification(Route::Fallback, move |name: String, value: i64| {
                let sink = sink.clone();
                async move { sink.lock().push((name, value)) }
            })
            .unwrap();

        registry
            .dispatch_notification(conn(), "a", Bytes::from_static(b"1"))
            .await
            .unwrap();
        registry
            .dispatch_notification(conn(), "b", Bytes::from_static(b"oops"))
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![("a".to_string(), 1)]);
        assert!(registry.has_notification_fallback());
    }

    #[tokio::test]
    async fn test_buffer_notification_panic_is_contained() {
        let registry = HandlerRegistry::builder()
            .notification_errors(NotificationErrorPolicy::Log)
            .build();
        assert_eq!(registry.config().notification_errors, NotificationErrorPolicy::Log);

        registry
            .handle_buffer_notification("crash", |_c, _n, _p| async {
                panic!("bad notification handler");
            })
            .unwrap();

        let result = registry
            .dispatch_notification(conn(), "crash", Bytes::new())
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_builder_default() {
        let registry = HandlerRegistry::default();
        assert_eq!(registry.config().notification_errors, NotificationErrorPolicy::Discard);
        let registry = RegistryBuilder::new().build();
        assert_eq!(registry.config().notification_errors, NotificationErrorPolicy::Discard);
    }
}
