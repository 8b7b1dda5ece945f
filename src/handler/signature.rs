//! Signature descriptors for typed handlers.
//!
//! Every callable accepted by the adapter describes itself as an ordered
//! list of [`Capability`] inputs plus an [`OutputArity`]. The registry checks
//! the descriptor against the table of accepted shapes before storing the
//! compiled handler.
//!
//! Request shapes (payload always last):
//!
//! | inputs | outputs |
//! |---|---|
//! | (Connection, Name, Payload) | value+error or error |
//! | (Connection, Payload) | value+error or error |
//! | (Connection) | value+error or error |
//! | (Payload) | value+error or error |
//! | () | value+error or error |
//!
//! Notification shapes (no outputs):
//!
//! | inputs |
//! |---|
//! | (Connection, Name, Payload) |
//! | (Name, Payload) |
//! | (Payload) |

use std::fmt;

use crate::error::{DispatchError, Result};

use Capability::{Connection, Name, Payload};

/// A positional input a handler may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The live connection handle.
    Connection,
    /// The operation or notification name.
    Name,
    /// The decoded payload.
    Payload,
}

/// What a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputArity {
    /// A value on success, an error on failure.
    ValueAndError,
    /// Only an error; success carries no payload.
    ErrorOnly,
    /// Nothing.
    None,
}

/// Which table a handler is registered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Expects exactly one response.
    Request,
    /// One-way message.
    Notification,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Request => f.write_str("request"),
            HandlerKind::Notification => f.write_str("notification"),
        }
    }
}

const REQUEST_INPUTS: &[&[Capability]] = &[
    &[Connection, Name, Payload],
    &[Connection, Payload],
    &[Connection],
    &[Payload],
    &[],
];

const NOTIFICATION_INPUTS: &[&[Capability]] =
    &[&[Connection, Name, Payload], &[Name, Payload], &[Payload]];

/// Shape of a candidate handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Inputs in declaration order.
    pub inputs: &'static [Capability],
    /// Result arity.
    pub output: OutputArity,
}

impl Signature {
    /// Create a descriptor.
    pub const fn new(inputs: &'static [Capability], output: OutputArity) -> Self {
        Self { inputs, output }
    }

    /// Whether the descriptor declares a payload input.
    pub fn takes_payload(&self) -> bool {
        self.inputs.contains(&Payload)
    }

    /// Check the descriptor against the accepted shapes for `kind`.
    pub fn validate(&self, kind: HandlerKind) -> Result<()> {
        match kind {
            HandlerKind::Request => self.validate_request(),
            HandlerKind::Notification => self.validate_notification(),
        }
    }

    /// Check the descriptor against the accepted request shapes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] for more than three inputs,
    /// a capability in the wrong position, or a handler without an error
    /// output.
    pub fn validate_request(&self) -> Result<()> {
        self.check_inputs(HandlerKind::Request, REQUEST_INPUTS)?;
        if self.output == OutputArity::None {
            return Err(self.reject(
                HandlerKind::Request,
                "request handlers must return a value and an error, or an error",
            ));
        }
        Ok(())
    }

    /// Check the descriptor against the accepted notification shapes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] for more than three inputs,
    /// a capability in the wrong position, or any output at all.
    pub fn validate_notification(&self) -> Result<()> {
        self.check_inputs(HandlerKind::Notification, NOTIFICATION_INPUTS)?;
        if self.output != OutputArity::None {
            return Err(self.reject(
                HandlerKind::Notification,
                "notification handlers must not return anything",
            ));
        }
        Ok(())
    }

    fn check_inputs(&self, kind: HandlerKind, accepted: &[&[Capability]]) -> Result<()> {
        if self.inputs.len() > 3 {
            return Err(self.reject(kind, "at most three inputs are accepted"));
        }
        if !accepted.contains(&self.inputs) {
            return Err(self.reject(kind, "inputs are not in an accepted order"));
        }
        Ok(())
    }

    fn reject(&self, kind: HandlerKind, reason: &str) -> DispatchError {
        DispatchError::Configuration(format!("invalid {} handler {}: {}", kind, self, reason))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fn(")?;
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:?}", input)?;
        }
        f.write_str(")")?;
        match self.output {
            OutputArity::ValueAndError => f.write_str(" -> (Value, Error)"),
            OutputArity::ErrorOnly => f.write_str(" -> Error"),
            OutputArity::None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_request_shapes() {
        for inputs in REQUEST_INPUTS {
            for output in [OutputArity::ValueAndError, OutputArity::ErrorOnly] {
                let sig = Signature::new(*inputs, output);
                assert!(sig.validate_request().is_ok(), "{} rejected", sig);
            }
        }
    }

    #[test]
    fn test_accepted_notification_shapes() {
        for inputs in NOTIFICATION_INPUTS {
            let sig = Signature::new(*inputs, OutputArity::None);
            assert!(sig.validate_notification().is_ok(), "{} rejected", sig);
        }
    }

    #[test]
    fn test_payload_in_connection_slot_rejected() {
        let sig = Signature::new(&[Payload, Payload], OutputArity::ValueAndError);
        let err = sig.validate_request().unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));
    }

    #[test]
    fn test_name_out_of_position_rejected() {
        let sig = Signature::new(&[Name, Connection, Payload], OutputArity::ErrorOnly);
        assert!(sig.validate(HandlerKind::Request).is_err());

        // (Name, Payload) is a notification shape only.
        let sig = Signature::new(&[Name, Payload], OutputArity::ErrorOnly);
        assert!(sig.validate(HandlerKind::Request).is_err());
    }

    #[test]
    fn test_too_many_inputs_rejected() {
        let sig = Signature::new(&[Connection, Name, Payload, Payload], OutputArity::ErrorOnly);
        let err = sig.validate_request().unwrap_err();
        assert!(err.to_string().contains("at most three"));
    }

    #[test]
    fn test_request_without_error_output_rejected() {
        let sig = Signature::new(&[Payload], OutputArity::None);
        assert!(sig.validate_request().is_err());
    }

    #[test]
    fn test_notification_with_output_rejected() {
        let sig = Signature::new(&[Payload], OutputArity::ErrorOnly);
        let err = sig.validate_notification().unwrap_err();
        assert!(err.to_string().contains("must not return"));
    }

    #[test]
    fn test_notification_connection_only_rejected() {
        let sig = Signature::new(&[Connection], OutputArity::None);
        assert!(sig.validate(HandlerKind::Notification).is_err());
        let sig = Signature::new(&[], OutputArity::None);
        assert!(sig.validate(HandlerKind::Notification).is_err());
    }

    #[test]
    fn test_display() {
        let sig = Signature::new(&[Connection, Payload], OutputArity::ValueAndError);
        assert_eq!(sig.to_string(), "fn(Connection, Payload) -> (Value, Error)");
        assert!(sig.takes_payload());
        let sig = Signature::new(&[Connection], OutputArity::ErrorOnly);
        assert_eq!(sig.to_string(), "fn(Connection) -> Error");
        assert!(!sig.takes_payload());
    }
}
