use crate::client::transport::TransportErrorCode;
use std::io;
use thiserror::Error;

/// Errors produced by message construction, stream access and transport execution.
///
/// Every variant is raised before any state is changed: a failed `with_*` call
/// leaves the receiver exactly as it was, so the caller may retry with
/// corrected input.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed constructor or mutator argument (bad scheme, port, method,
    /// protocol version, empty header name or value, whitespace in a
    /// request-target, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O attempted on a detached, closed, non-seekable, non-readable or
    /// non-writable stream, or a failing file operation.
    #[error("stream failure: {0}")]
    Stream(String),

    /// The transport reported a non-OK code, returned no status code, or the
    /// target URL was unusable.
    #[error("transport failure ({code}): {message}")]
    Transport {
        code: TransportErrorCode,
        message: String,
    },

    /// A registered body parser could not decode the body.
    #[error("cannot parse `{media_type}` body: {message}")]
    BodyParse { media_type: String, message: String },

    /// Internal contract violation, e.g. a media-type parser returning a scalar.
    #[error("runtime failure: {0}")]
    Runtime(String),
}

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    #[inline]
    pub(crate) fn invalid<M: Into<String>>(message: M) -> Self {
        Error::InvalidInput(message.into())
    }

    #[inline]
    pub(crate) fn stream<M: Into<String>>(message: M) -> Self {
        Error::Stream(message.into())
    }

    #[inline]
    pub(crate) fn transport<M: Into<String>>(code: TransportErrorCode, message: M) -> Self {
        Error::Transport {
            code,
            message: message.into(),
        }
    }

    /// Returns `true` for [`Error::InvalidInput`].
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }

    /// Returns `true` for [`Error::Transport`].
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Stream(err.to_string())
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::InvalidInput(a), Error::InvalidInput(b)) => a == b,
            (Error::Stream(a), Error::Stream(b)) => a == b,
            (
                Error::Transport { code: a, message: m },
                Error::Transport { code: b, message: n },
            ) => a == b && m == n,
            (
                Error::BodyParse { media_type: a, message: m },
                Error::BodyParse { media_type: b, message: n },
            ) => a == b && m == n,
            (Error::Runtime(a), Error::Runtime(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        #[rustfmt::skip]
        let cases = [
            (Error::invalid("bad port"), "invalid input: bad port"),
            (Error::stream("detached"), "stream failure: detached"),
            (
                Error::transport(TransportErrorCode::CouldntConnect, "refused"),
                "transport failure (7 COULDNT_CONNECT): refused",
            ),
            (Error::Runtime("scalar".into()), "runtime failure: scalar"),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn io_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert_eq!(err, Error::Stream("boom".into()));
        assert!(!err.is_invalid_input());
    }
}
