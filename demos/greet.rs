//! Greet - the default registry driven by an in-process loopback.
//!
//! This example demonstrates:
//! - Registering typed, buffer, notification and stream handlers on the
//!   default registry
//! - A fallback handler for unknown operations
//! - A handler notifying the peer through its connection
//!
//! ```text
//! cargo run --example greet
//! ```

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use talkwire::handler::{stream, BoxFuture, InboundChunks, StreamWriter};
use talkwire::{Connection, ConnectionHandle, DispatchError, HandlerRegistry, Route};

/// Input structure for the greet operation.
#[derive(Deserialize, Debug)]
struct GreetInput {
    name: String,
}

/// Output structure for the greet operation.
#[derive(Serialize, Debug)]
struct GreetOutput {
    greeting: String,
}

/// Delivers everything sent through it to a peer registry.
struct Loopback {
    peer: Arc<HandlerRegistry>,
}

impl Connection for Loopback {
    fn notify_raw(&self, name: &str, payload: Bytes) -> BoxFuture<'_, talkwire::Result<()>> {
        let name = name.to_string();
        Box::pin(async move {
            self.peer
                .dispatch_notification(ConnectionHandle::detached(), &name, payload)
                .await
        })
    }

    fn request_raw(&self, op: &str, payload: Bytes) -> BoxFuture<'_, talkwire::Result<Bytes>> {
        let op = op.to_string();
        Box::pin(async move {
            self.peer
                .dispatch_request(ConnectionHandle::detached(), &op, payload)
                .await
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    talkwire::handle("greet", |conn: ConnectionHandle, input: GreetInput| async move {
        conn.notify("greeted", &input.name).await?;
        Ok::<_, DispatchError>(GreetOutput {
            greeting: format!("Hello {}", input.name),
        })
    })?;

    talkwire::handle_buffer_request("echo", |_conn, _op, payload| async move { Ok(payload) })?;

    talkwire::handle(
        Route::Fallback,
        |_conn: ConnectionHandle, op: String, _payload: serde_json::Value| async move {
            Err::<(), _>(format!("unknown operation {:?}", op))
        },
    )?;

    talkwire::handle_notification("log", |name: String, line: String| async move {
        println!("[{}] {}", name, line);
    })?;

    talkwire::handle_stream_request(
        "count",
        |_conn, _op, mut inbound: InboundChunks, writer: StreamWriter| async move {
            let mut index = 0usize;
            while let Some(chunk) = inbound.next_chunk().await {
                writer.write_value(&(index, chunk.len())).await?;
                index += 1;
            }
            writer.end().await
        },
    )?;

    // The peer prints what it is told.
    let peer = Arc::new(HandlerRegistry::new());
    peer.handle_notification("greeted", |name: String| async move {
        println!("peer: someone greeted {}", name);
    })?;

    let registry = talkwire::default_registry();
    let conn = ConnectionHandle::new(Loopback { peer });

    let reply = registry
        .dispatch_request(conn.clone(), "greet", Bytes::from_static(br#"{"name":"Rasmus"}"#))
        .await?;
    println!("greet -> {}", String::from_utf8_lossy(&reply));

    let reply = registry
        .dispatch_request(conn.clone(), "echo", Bytes::from_static(b"raw bytes"))
        .await?;
    println!("echo -> {}", String::from_utf8_lossy(&reply));

    match registry
        .dispatch_request(conn.clone(), "shutdown", Bytes::from_static(b"null"))
        .await
    {
        Ok(_) => println!("shutdown -> ok"),
        Err(err) => println!("shutdown -> error: {}", err),
    }

    registry
        .dispatch_notification(conn.clone(), "log", Bytes::from_static(br#""demo started""#))
        .await?;
    // Dropped: the payload is not a string.
    registry
        .dispatch_notification(conn.clone(), "log", Bytes::from_static(b"42"))
        .await?;

    let (tx, inbound) = stream::channel(4);
    let (writer, mut outbound) = StreamWriter::channel(4);
    let feeder = tokio::spawn(async move {
        for chunk in ["a", "bb", "ccc"] {
            if tx.send(Bytes::from(chunk)).await.is_err() {
                break;
            }
        }
        let _ = tx.send(Bytes::new()).await;
    });
    let printer = tokio::spawn(async move {
        while let Some(chunk) = outbound.recv().await {
            if chunk.is_empty() {
                break;
            }
            println!("count -> {}", String::from_utf8_lossy(&chunk));
        }
    });

    registry.dispatch_stream(conn, "count", inbound, writer).await?;
    feeder.await?;
    printer.await?;

    Ok(())
}
