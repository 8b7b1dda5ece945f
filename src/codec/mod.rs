//! Codec module - serialization/deserialization for typed payloads.
//!
//! - [`JsonCodec`] - JSON using `serde_json`
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects.
//! The payload type of a handler is fixed at compile time by its signature,
//! so nothing needs to be selected at runtime.
//!
//! # Example
//!
//! ```
//! use talkwire::codec::JsonCodec;
//!
//! let encoded = JsonCodec::encode(&"hello").unwrap();
//! let decoded: String = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod json;

pub use json::JsonCodec;
