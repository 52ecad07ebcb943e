//! Error types for kdb+ client operations

use std::fmt;

use thiserror::Error;

/// Result type for kdb+ operations
pub type KdbResult<T> = Result<T, KdbError>;

/// Marker the store puts in its error text when a request is rejected as too large
pub const OVERSIZED_MARKER: &str = "too big";

/// Errors that can occur when talking to a kdb+ store
#[derive(Debug, Error)]
pub enum KdbError {
    /// Connection closed before a complete frame arrived
    #[error("connection closed while reading frame {stage}: received {received} of {expected} bytes")]
    TransportClosed {
        stage: FrameStage,
        received: u64,
        expected: u64,
    },

    /// Error text reported by the store
    #[error("store error: {0}")]
    Store(String),

    /// I/O failed part way through a request/response exchange
    #[error("network I/O error during frame {stage}: {source}")]
    TransportBroken {
        stage: FrameStage,
        #[source]
        source: std::io::Error,
    },

    /// An abandoned call left its response unread on the connection
    #[error("connection out of sync: a previous request is still awaiting its response")]
    Desynchronized,

    /// Request rejected as oversized by a store that reports it structurally
    #[error("request too big: {0}")]
    Oversized(String),

    /// Command text cannot be sent on the wire
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Frame payload is not a well-formed result stream
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid store URI format
    #[error("invalid kdb URI: {0}")]
    InvalidUri(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Connection attempt did not finish in time
    #[error("connection timed out after {0} ms")]
    Timeout(u64),

    /// Results of two split branches cannot be combined
    #[error("cannot merge results with different schemas: [{left}] and [{right}]")]
    SchemaMismatch { left: String, right: String },

    /// Network I/O error
    #[error("network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Part of a request/response exchange in progress when the connection failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Request,
    Header,
    Payload,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameStage::Request => write!(f, "request"),
            FrameStage::Header => write!(f, "header"),
            FrameStage::Payload => write!(f, "payload"),
        }
    }
}

/// How the adaptive executor treats an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Broken connection; propagated immediately
    TransportFatal,
    /// Request cannot be built; propagated immediately
    InvalidRequest,
    /// Request too large; the call may be split
    OversizedRejection,
    /// Anything else; the call may be retried
    TransientFailure,
}

impl KdbError {
    /// Classify this error for split/retry decisions
    pub fn kind(&self) -> ErrorKind {
        match self {
            KdbError::TransportClosed { .. }
            | KdbError::TransportBroken { .. }
            | KdbError::Desynchronized => ErrorKind::TransportFatal,
            KdbError::InvalidCommand(_)
            | KdbError::InvalidConfig(_)
            | KdbError::InvalidUri(_)
            | KdbError::UrlParse(_) => ErrorKind::InvalidRequest,
            KdbError::Oversized(_) => ErrorKind::OversizedRejection,
            _ if self.is_oversized() => ErrorKind::OversizedRejection,
            _ => ErrorKind::TransientFailure,
        }
    }

    /// Whether the store rejected the request as too large.
    ///
    /// The store offers no error code for this, so the rendered message is
    /// searched for [`OVERSIZED_MARKER`] ignoring case.
    pub fn is_oversized(&self) -> bool {
        matches!(self, KdbError::Oversized(_))
            || self.to_string().to_lowercase().contains(OVERSIZED_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_marker_is_oversized() {
        let err = KdbError::Store("Query TOO BIG for limit".to_string());
        assert!(err.is_oversized());
        assert_eq!(err.kind(), ErrorKind::OversizedRejection);
    }

    #[test]
    fn test_structured_oversized() {
        let err = KdbError::Oversized("wsfull".to_string());
        assert_eq!(err.kind(), ErrorKind::OversizedRejection);
    }

    #[test]
    fn test_other_errors_are_transient() {
        let err = KdbError::Store("type".to_string());
        assert!(!err.is_oversized());
        assert_eq!(err.kind(), ErrorKind::TransientFailure);

        let err = KdbError::Decode("bad stream".to_string());
        assert_eq!(err.kind(), ErrorKind::TransientFailure);
    }

    #[test]
    fn test_transport_closed_is_fatal() {
        let err = KdbError::TransportClosed {
            stage: FrameStage::Header,
            received: 3,
            expected: 8,
        };
        assert_eq!(err.kind(), ErrorKind::TransportFatal);
        assert_eq!(
            err.to_string(),
            "connection closed while reading frame header: received 3 of 8 bytes"
        );
    }

    #[test]
    fn test_broken_exchange_is_fatal() {
        let err = KdbError::TransportBroken {
            stage: FrameStage::Payload,
            source: std::io::Error::from(std::io::ErrorKind::ConnectionReset),
        };
        assert_eq!(err.kind(), ErrorKind::TransportFatal);
        assert_eq!(KdbError::Desynchronized.kind(), ErrorKind::TransportFatal);
    }

    #[test]
    fn test_local_errors_are_not_retried() {
        let err = KdbError::InvalidCommand("character '€' cannot be encoded as Latin-1".to_string());
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        // classified by variant even when the text mentions the marker
        let err = KdbError::InvalidConfig("read_chunk_size too big".to_string());
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
