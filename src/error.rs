//! Error types used by the message bus and its transports.
//!
//! This module defines two error enums:
//!
//! - [`TransportError`]: failures reported by a [`Transport`](crate::Transport) implementation.
//! - [`BusError`]: failures surfaced by [`MessageBus`](crate::MessageBus) operations.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logs.
//!
//! Stale results (a superseded iteration or reply) and unbound responses are **not** errors:
//! they are discarded silently and only reported as diagnostic [`Event`](crate::Event)s.

use thiserror::Error;

/// # Errors produced by a transport.
///
/// Delivery guarantees belong to the transport; the bus never retries.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer side is gone; nothing can be delivered anymore.
    #[error("transport closed")]
    Closed,

    /// The message could not be encoded for the wire.
    #[error("encode failed: {error}")]
    Encode {
        /// The underlying error message.
        error: String,
    },
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use coopvisor::TransportError;
    ///
    /// assert_eq!(TransportError::Closed.as_label(), "transport_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Closed => "transport_closed",
            TransportError::Encode { .. } => "transport_encode",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TransportError::Closed => "peer closed".to_string(),
            TransportError::Encode { error } => format!("encode: {error}"),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Encode {
            error: err.to_string(),
        }
    }
}

/// # Errors produced by the message bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The underlying transport refused the outbound message.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Topic labels must be non-empty.
    #[error("empty topic label")]
    EmptyLabel,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use coopvisor::{BusError, TransportError};
    ///
    /// let err = BusError::from(TransportError::Closed);
    /// assert_eq!(err.as_label(), "bus_transport");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Transport(_) => "bus_transport",
            BusError::EmptyLabel => "bus_empty_label",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::Transport(inner) => format!("transport: {}", inner.as_message()),
            BusError::EmptyLabel => "topic label is empty".to_string(),
        }
    }

    /// Indicates whether retrying the same send could succeed.
    ///
    /// A closed transport stays closed, and an invalid label stays invalid;
    /// only encode failures depend on the payload and may succeed with different data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BusError::Transport(TransportError::Encode { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(TransportError::Closed.as_label(), "transport_closed");
        assert_eq!(
            TransportError::Encode { error: "x".into() }.as_label(),
            "transport_encode"
        );
        assert_eq!(BusError::EmptyLabel.as_label(), "bus_empty_label");
    }

    #[test]
    fn transport_error_converts_into_bus_error() {
        let err: BusError = TransportError::Closed.into();
        assert_eq!(err, BusError::Transport(TransportError::Closed));
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "transport failure: transport closed");
    }

    #[test]
    fn encode_failure_is_retryable() {
        let err = BusError::from(TransportError::Encode {
            error: "bad".into(),
        });
        assert!(err.is_retryable());
        assert_eq!(err.as_message(), "transport: encode: bad");
    }
}
