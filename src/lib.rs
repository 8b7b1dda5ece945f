//! # talkwire
//!
//! Adaptive handler dispatch for bidirectional request/notification
//! sockets.
//!
//! Applications register handlers by name. A transport looks them up when a
//! request or notification arrives and invokes them with the connection,
//! the name and the raw payload.
//!
//! ## Architecture
//!
//! - **Registry** ([`HandlerRegistry`]): two route tables, one for requests
//!   and one for notifications, each with a fallback slot
//! - **Adapter** ([`handler::IntoRequestHandler`],
//!   [`handler::IntoNotificationHandler`]): turns typed async callables into
//!   canonical byte-level handlers, with JSON payloads
//! - **Stream contract** ([`handler::InboundChunks`], [`handler::StreamWriter`]):
//!   chunked requests and responses
//! - **Default registry**: free functions such as [`handle`] operating on a
//!   process-wide registry
//!
//! ## Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use talkwire::{ConnectionHandle, DispatchError, HandlerRegistry, Route};
//!
//! #[derive(Deserialize)]
//! struct GreetIn {
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct GreetOut {
//!     greeting: String,
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> talkwire::Result<()> {
//!     let registry = HandlerRegistry::new();
//!
//!     registry.handle_request("greet", |input: GreetIn| async move {
//!         Ok::<_, DispatchError>(GreetOut {
//!             greeting: format!("Hello {}", input.name),
//!         })
//!     })?;
//!     registry.handle_buffer_request(Route::Fallback, |_conn, _op, payload| async move {
//!         Ok(payload)
//!     })?;
//!
//!     let reply = registry
//!         .dispatch_request(
//!             ConnectionHandle::detached(),
//!             "greet",
//!             r#"{"name":"Rasmus"}"#.into(),
//!         )
//!         .await?;
//!     assert_eq!(&reply[..], br#"{"greeting":"Hello Rasmus"}"#);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod handler;

mod global;

pub use connection::{Connection, ConnectionHandle};
pub use error::{BoxError, DispatchError, Result};
pub use global::{
    default_registry, find_notification_handler, find_request_handler, handle,
    handle_buffer_notification, handle_buffer_request, handle_notification,
    handle_stream_request,
};
pub use handler::{
    BufferNotificationHandler, BufferRequestHandler, HandlerRegistry, NotificationErrorPolicy,
    RequestHandler, Route, StreamRequestHandler,
};
