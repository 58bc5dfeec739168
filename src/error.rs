use crate::header::HeaderKind;
use std::io;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while negotiating or applying a content-coding.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The header value violates the coding grammar for its kind.
    #[error("malformed {kind} header: {reason}")]
    MalformedHeader {
        /// Header the value was read from.
        kind: HeaderKind,
        /// What was wrong with it.
        reason: String,
    },

    /// An applied coding names an algorithm that no registered factory provides.
    #[error("unsupported {kind} coding `{name}`")]
    UnsupportedAlgorithm {
        /// Header the coding was read from.
        kind: HeaderKind,
        /// Coding as written in the header.
        name: String,
    },

    /// Compressed input was corrupt or truncated.
    #[error("{algorithm} decode failure: {source}")]
    Decode {
        /// Algorithm of the failing decoder.
        algorithm: String,
        /// Underlying codec error.
        #[source]
        source: io::Error,
    },

    /// The encoder rejected its input or output buffers.
    #[error("{algorithm} encode failure: {source}")]
    Encode {
        /// Algorithm of the failing encoder.
        algorithm: String,
        /// Underlying codec error.
        #[source]
        source: io::Error,
    },

    /// A provider panicked inside an asynchronous codec call.
    #[error("{algorithm} provider panicked: {message}")]
    ProviderPanic {
        /// Algorithm of the panicking provider.
        algorithm: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// A ranked header value was requested for an applied-coding header.
    #[error("{0} does not carry a ranked coding list")]
    UnrankedHeaderKind(HeaderKind),
}

impl Error {
    pub(crate) fn malformed(kind: HeaderKind, reason: impl Into<String>) -> Self {
        Error::MalformedHeader {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(algorithm: &str, source: io::Error) -> Self {
        Error::Decode {
            algorithm: algorithm.to_owned(),
            source,
        }
    }

    pub(crate) fn encode(algorithm: &str, source: io::Error) -> Self {
        Error::Encode {
            algorithm: algorithm.to_owned(),
            source,
        }
    }

    /// Whether this error was caused by the peer's message rather than local state.
    pub fn is_peer_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedHeader { .. }
                | Error::UnsupportedAlgorithm { .. }
                | Error::Decode { .. }
        )
    }

    /// Maps the error to the HTTP status a server would answer with.
    ///
    /// - `MalformedHeader`, `Decode` → 400
    /// - `UnsupportedAlgorithm` → 415
    /// - everything else → 500
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Error::MalformedHeader { .. } | Error::Decode { .. } => http::StatusCode::BAD_REQUEST,
            Error::UnsupportedAlgorithm { .. } => http::StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::Encode { .. } | Error::ProviderPanic { .. } | Error::UnrankedHeaderKind(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Decode { source, .. } if source.kind() == io::ErrorKind::UnexpectedEof => {
                io::ErrorKind::UnexpectedEof
            }
            Error::Decode { .. } => io::ErrorKind::InvalidData,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
