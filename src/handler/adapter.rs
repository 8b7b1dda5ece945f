//! Compiles typed callables into canonical buffer handlers.
//!
//! The accepted shapes form a closed set. Each shape is one implementation
//! of [`IntoRequestHandler`] or [`IntoNotificationHandler`], selected at
//! compile time by the callable's parameter types through a marker type
//! (`ConnNamePayload<P>`, `ConnPayload<P>`, ...). The marker is inferred and
//! never named by callers.
//!
//! Request callables are async and resolve to `Result<R, E>` where
//! `R: Serialize` and `E: Into<BoxError>`. `Result<(), E>` is the
//! error-only form: success carries no payload.
//!
//! Notification callables are async and resolve to `()`.
//!
//! ```
//! use talkwire::{ConnectionHandle, DispatchError, HandlerRegistry};
//!
//! let registry = HandlerRegistry::new();
//! registry.handle_request("now", || async { Ok::<_, DispatchError>(1_700_000_000u64) }).unwrap();
//! registry.handle_request("ping", |_conn: ConnectionHandle| async { Ok::<_, DispatchError>(()) }).unwrap();
//! registry.handle_request("double", |n: i64| async move { Ok::<_, DispatchError>(n * 2) }).unwrap();
//! registry.handle_notification("log", |name: String, line: String| async move {
//!     println!("{}: {}", name, line);
//! }).unwrap();
//! ```
//!
//! A payload where the connection belongs does not compile:
//!
//! ```compile_fail
//! use talkwire::{DispatchError, HandlerRegistry};
//!
//! let registry = HandlerRegistry::new();
//! registry.handle_request("bad", |a: i64, b: i64| async move {
//!     Ok::<_, DispatchError>(a + b)
//! });
//! ```
//!
//! Neither does a notification that returns something:
//!
//! ```compile_fail
//! use talkwire::HandlerRegistry;
//!
//! let registry = HandlerRegistry::new();
//! registry.handle_notification("bad", |n: i64| async move { n });
//! ```
//!
//! Nor a request with more than three inputs:
//!
//! ```compile_fail
//! use talkwire::{ConnectionHandle, DispatchError, HandlerRegistry};
//!
//! let registry = HandlerRegistry::new();
//! registry.handle_request(
//!     "bad",
//!     |_c: ConnectionHandle, _op: String, _a: i64, _b: i64| async move {
//!         Ok::<_, DispatchError>(())
//!     },
//! );
//! ```

use std::any::TypeId;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

use bytes::Bytes;
use futures::future::{self, Either};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::registry::NotificationErrorPolicy;
use super::signature::{Capability, OutputArity, Signature};
use super::{BoxFuture, BufferNotificationHandler, BufferRequestHandler};
use crate::codec::JsonCodec;
use crate::connection::ConnectionHandle;
use crate::error::{BoxError, DispatchError, Result};

use Capability::{Connection, Name, Payload};

/// Marker: `(ConnectionHandle, String, P)`.
pub struct ConnNamePayload<P>(PhantomData<fn() -> P>);

/// Marker: `(ConnectionHandle, P)`.
pub struct ConnPayload<P>(PhantomData<fn() -> P>);

/// Marker: `(ConnectionHandle)`.
pub struct ConnOnly;

/// Marker: `(String, P)`.
pub struct NamePayload<P>(PhantomData<fn() -> P>);

/// Marker: `(P)`.
pub struct PayloadOnly<P>(PhantomData<fn() -> P>);

/// Marker: `()`.
pub struct NoArgs;

/// Result of a typed request callable.
pub trait RequestOutput: Send + 'static {
    /// Whether the result carries a value or only an error.
    fn arity() -> OutputArity;

    /// Translate into the canonical result.
    ///
    /// A success value is encoded only when there is no error; an error
    /// discards the value.
    fn into_payload(self) -> Result<Bytes>;
}

impl<R, E> RequestOutput for std::result::Result<R, E>
where
    R: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn arity() -> OutputArity {
        if TypeId::of::<R>() == TypeId::of::<()>() {
            OutputArity::ErrorOnly
        } else {
            OutputArity::ValueAndError
        }
    }

    fn into_payload(self) -> Result<Bytes> {
        match self {
            Ok(value) => JsonCodec::encode_result(&value).map_err(|err| {
                tracing::error!(error = %err, "handler returned a value that cannot be encoded");
                err
            }),
            Err(err) => Err(DispatchError::Handler(err.into())),
        }
    }
}

/// A callable that can serve requests.
pub trait IntoRequestHandler<M>: Send + Sync + Sized + 'static {
    /// Shape of the callable.
    fn signature() -> Signature;

    /// Compile into a buffer request handler.
    fn into_request_handler(self) -> BufferRequestHandler;
}

/// A callable that can receive notifications.
pub trait IntoNotificationHandler<M>: Send + Sync + Sized + 'static {
    /// Shape of the callable.
    fn signature() -> Signature;

    /// Compile into a buffer notification handler.
    fn into_notification_handler(self, policy: NotificationErrorPolicy) -> BufferNotificationHandler;
}

/// Decode the payload, then invoke. A decode failure is the request's
/// result and the callable is never invoked.
fn compile_request<P, G, Fut, O>(invoke: G) -> BufferRequestHandler
where
    P: DeserializeOwned + 'static,
    G: Fn(ConnectionHandle, String, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: RequestOutput,
{
    BufferRequestHandler::from_boxed(move |conn, op, payload| -> BoxFuture<'static, Result<Bytes>> {
        let params: P = match JsonCodec::decode(&payload) {
            Ok(params) => params,
            Err(err) => return Box::pin(async move { Err(err) }),
        };
        let fut = invoke(conn, op, params);
        Box::pin(async move { fut.await.into_payload() })
    })
}

/// Invoke without reading the payload.
fn compile_request_without_payload<G, Fut, O>(invoke: G) -> BufferRequestHandler
where
    G: Fn(ConnectionHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: RequestOutput,
{
    BufferRequestHandler::from_boxed(move |conn, _op, _payload| -> BoxFuture<'static, Result<Bytes>> {
        let fut = invoke(conn);
        Box::pin(async move { fut.await.into_payload() })
    })
}

/// Decode the payload, then invoke. A decode failure drops the
/// notification without invoking the callable.
fn compile_notification<P, G, Fut>(policy: NotificationErrorPolicy, invoke: G) -> BufferNotificationHandler
where
    P: DeserializeOwned + 'static,
    G: Fn(ConnectionHandle, String, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    guard_notification(policy, move |conn, name: String, payload: Bytes| {
        match JsonCodec::decode::<P>(&payload) {
            Ok(params) => Either::Left(invoke(conn, name, params)),
            Err(err) => {
                policy.report_decode(&name, &err);
                Either::Right(future::ready(()))
            }
        }
    })
}

/// Wrap a notification callable so that panics, whether raised while
/// building its future or while polling it, end at this boundary.
pub(crate) fn guard_notification<G, Fut>(
    policy: NotificationErrorPolicy,
    invoke: G,
) -> BufferNotificationHandler
where
    G: Fn(ConnectionHandle, String, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    BufferNotificationHandler::from_boxed(move |conn, name, payload| -> BoxFuture<'static, ()> {
        match catch_unwind(AssertUnwindSafe(|| invoke(conn, name.clone(), payload))) {
            Ok(fut) => Box::pin(async move {
                if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
                    policy.report_panic(&name);
                }
            }),
            Err(_) => {
                policy.report_panic(&name);
                Box::pin(future::ready(()))
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Request shapes
// ---------------------------------------------------------------------------

impl<F, Fut, P, O> IntoRequestHandler<ConnNamePayload<P>> for F
where
    F: Fn(ConnectionHandle, String, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    P: DeserializeOwned + 'static,
    O: RequestOutput,
{
    fn signature() -> Signature {
        Signature::new(&[Connection, Name, Payload], O::arity())
    }

    fn into_request_handler(self) -> BufferRequestHandler {
        compile_request(self)
    }
}

impl<F, Fut, P, O> IntoRequestHandler<ConnPayload<P>> for F
where
    F: Fn(ConnectionHandle, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    P: DeserializeOwned + 'static,
    O: RequestOutput,
{
    fn signature() -> Signature {
        Signature::new(&[Connection, Payload], O::arity())
    }

    fn into_request_handler(self) -> BufferRequestHandler {
        compile_request(move |conn, _op, params: P| self(conn, params))
    }
}

impl<F, Fut, O> IntoRequestHandler<ConnOnly> for F
where
    F: Fn(ConnectionHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: RequestOutput,
{
    fn signature() -> Signature {
        Signature::new(&[Connection], O::arity())
    }

    fn into_request_handler(self) -> BufferRequestHandler {
        compile_request_without_payload(self)
    }
}

impl<F, Fut, P, O> IntoRequestHandler<PayloadOnly<P>> for F
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    P: DeserializeOwned + 'static,
    O: RequestOutput,
{
    fn signature() -> Signature {
        Signature::new(&[Payload], O::arity())
    }

    fn into_request_handler(self) -> BufferRequestHandler {
        compile_request(move |_conn, _op, params: P| self(params))
    }
}

impl<F, Fut, O> IntoRequestHandler<NoArgs> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: RequestOutput,
{
    fn signature() -> Signature {
        Signature::new(&[], O::arity())
    }

    fn into_request_handler(self) -> BufferRequestHandler {
        compile_request_without_payload(move |_conn| self())
    }
}

// ---------------------------------------------------------------------------
// Notification shapes
// ---------------------------------------------------------------------------

impl<F, Fut, P> IntoNotificationHandler<ConnNamePayload<P>> for F
where
    F: Fn(ConnectionHandle, String, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
    P: DeserializeOwned + 'static,
{
    fn signature() -> Signature {
        Signature::new(&[Connection, Name, Payload], OutputArity::None)
    }

    fn into_notification_handler(self, policy: NotificationErrorPolicy) -> BufferNotificationHandler {
        compile_notification(policy, self)
    }
}

impl<F, Fut, P> IntoNotificationHandler<NamePayload<P>> for F
where
    F: Fn(String, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
    P: DeserializeOwned + 'static,
{
    fn signature() -> Signature {
        Signature::new(&[Name, Payload], OutputArity::None)
    }

    fn into_notification_handler(self, policy: NotificationErrorPolicy) -> BufferNotificationHandler {
        compile_notification(policy, move |_conn, name, params: P| self(name, params))
    }
}

impl<F, Fut, P> IntoNotificationHandler<PayloadOnly<P>> for F
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
    P: DeserializeOwned + 'static,
{
    fn signature() -> Signature {
        Signature::new(&[Payload], OutputArity::None)
    }

    fn into_notification_handler(self, policy: NotificationErrorPolicy) -> BufferNotificationHandler {
        compile_notification(policy, move |_conn, _name, params: P| self(params))
    }
}
