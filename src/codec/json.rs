//! JSON codec using `serde_json`.
//!
//! Every typed handler payload travels as JSON. Buffer and stream handlers
//! never touch this codec; their payloads are opaque bytes.
//!
//! # Example
//!
//! ```
//! use talkwire::codec::JsonCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     id: u32,
//!     content: String,
//! }
//!
//! let msg = Message { id: 42, content: "hello".to_string() };
//! let encoded = JsonCodec::encode(&msg).unwrap();
//! let decoded: Message = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use std::any::TypeId;

use bytes::Bytes;

use crate::error::{DispatchError, Result};

/// JSON codec for typed payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Encode`] if the value cannot be serialized,
    /// e.g. a map whose keys are not strings.
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(DispatchError::Encode)
    }

    /// Decode JSON bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Decode`] if the bytes do not encode a `T`.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(DispatchError::Decode)
    }

    /// Encode a handler result.
    ///
    /// The unit value carries no information and produces an empty payload.
    pub fn encode_result<T: serde::Serialize + 'static>(value: &T) -> Result<Bytes> {
        if TypeId::of::<T>() == TypeId::of::<()>() {
            return Ok(Bytes::new());
        }
        Self::encode(value)
    }
}
