//! Response rebuilt from a transport result

use crate::{
    client::transport::{TransportError, TransportErrorCode, TransportResult},
    errors::{Error, Result},
    http::{
        headers::HeaderCollection,
        message::{HttpMessage, Message},
        response::Response,
        stream::MemoryStream,
        types::Version,
    },
};
use indexmap::IndexMap;

/// A [`Response`] together with the diagnostics of the execution that
/// produced it.
///
/// The transport error and info travel with the response itself, so two
/// responses never share diagnostics.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    response: Response,
    transport_error: TransportError,
    transport_info: IndexMap<String, String>,
}

impl ClientResponse {
    /// Rebuilds the response from raw transport output.
    ///
    /// Fails with [`Error::Transport`] when the transport reported an error or
    /// no status code. The first `header_size` bytes of the buffer are parsed
    /// as the header block, the rest is the body.
    pub fn from_transport(result: TransportResult) -> Result<Self> {
        if !result.error.code.is_ok() {
            return Err(Error::transport(result.error.code, result.error.message));
        }

        let Some(status) = result.status_code else {
            return Err(Error::transport(
                TransportErrorCode::RecvError,
                "transport returned no status code",
            ));
        };

        let split = result.header_size.min(result.response.len());
        let (head, body) = result.response.split_at(split);
        let headers = HeaderCollection::parse_block_bytes(head);
        let (version, reason) = parse_status_line(head);

        let mut response = Response::from_parts(status, reason.as_deref(), headers, MemoryStream::from_bytes(body))
            .map_err(|err| Error::transport(TransportErrorCode::RecvError, err.to_string()))?;
        if let Some(version) = version {
            response.message_mut().protocol = version;
        }

        tracing::debug!(status, header_size = split, body_size = body.len(), "response received");

        Ok(Self {
            response,
            transport_error: result.error,
            transport_info: result.info,
        })
    }
}

// Public API
impl ClientResponse {
    #[inline]
    pub fn status(&self) -> u16 {
        self.response.status()
    }

    #[inline]
    pub fn reason_phrase(&self) -> &str {
        self.response.reason_phrase()
    }

    #[inline]
    pub fn response(&self) -> &Response {
        &self.response
    }

    #[inline]
    pub fn into_response(self) -> Response {
        self.response
    }

    /// Always `OK` for a successfully built response.
    #[inline]
    pub fn transport_error(&self) -> &TransportError {
        &self.transport_error
    }

    /// Diagnostics reported by the transport, such as `total_time`.
    #[inline]
    pub fn transport_info(&self) -> &IndexMap<String, String> {
        &self.transport_info
    }
}

impl HttpMessage for ClientResponse {
    #[inline]
    fn message(&self) -> &Message {
        self.response.message()
    }

    #[inline]
    fn message_mut(&mut self) -> &mut Message {
        self.response.message_mut()
    }
}

/// Protocol version and reason phrase of the status line, when present.
fn parse_status_line(head: &[u8]) -> (Option<Version>, Option<String>) {
    let end = memchr::memchr(b'\n', head).unwrap_or(head.len());
    let line = String::from_utf8_lossy(&head[..end]);
    let line = line.trim_end();

    if !line.starts_with("HTTP/") {
        return (None, None);
    }

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().and_then(|version| Version::parse(version).ok());
    let reason = parts
        .nth(1)
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .map(str::to_owned);

    (version, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(raw: &[u8], header_size: usize, status: Option<u16>) -> TransportResult {
        TransportResult {
            status_code: status,
            header_size,
            response: raw.to_vec(),
            ..TransportResult::default()
        }
    }

    #[test]
    fn rebuilds_response() {
        let raw = b"HTTP/1.0 201 Made It\r\nLocation: /items/7\r\nX-Id: 7\r\n\r\n{\"id\":7}";
        let mut transport = result(raw, raw.len() - 8, Some(201));
        transport.info.insert("total_time".into(), "0.010000".into());

        let response = ClientResponse::from_transport(transport).unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(response.reason_phrase(), "Made It");
        assert_eq!(response.protocol_version(), Version::Http10);
        assert_eq!(response.header_line("location"), "/items/7");
        assert_eq!(response.body().to_bytes().unwrap(), b"{\"id\":7}");
        assert!(response.transport_error().code.is_ok());
        assert_eq!(response.transport_info()["total_time"], "0.010000");
    }

    #[test]
    fn default_reason_and_clamped_split() {
        let raw = b"HTTP/1.1 404\r\n\r\n";
        let response = ClientResponse::from_transport(result(raw, 999, Some(404))).unwrap();

        assert_eq!(response.reason_phrase(), "Not Found");
        assert!(response.body().to_bytes().unwrap().is_empty());
    }

    #[test]
    fn failures() {
        let mut failed = result(b"", 0, None);
        failed.error = TransportError::new(TransportErrorCode::CouldntConnect, "refused");

        #[rustfmt::skip]
        let cases = [
            (failed,                            TransportErrorCode::CouldntConnect),
            (result(b"", 0, None),              TransportErrorCode::RecvError),
            (result(b"HTTP/1.1 999 X\r\n\r\n", 17, Some(999)), TransportErrorCode::RecvError),
        ];

        for (transport, expected) in cases {
            match ClientResponse::from_transport(transport) {
                Err(Error::Transport { code, .. }) => assert_eq!(code, expected),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
