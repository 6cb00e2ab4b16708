//! Immutable HTTP response value

use crate::{
    errors::{Error, Result},
    http::{
        headers::HeaderCollection,
        message::{HttpMessage, Message},
        stream::{MemoryStream, Stream},
        types::StatusCode,
    },
};

/// An immutable HTTP response: status code and reason phrase over a
/// [`Message`].
///
/// The code is kept numerically, so unregistered codes in `100..=599` are
/// representable; their default reason phrase is empty.
///
/// # Examples
/// ```
/// use maker_http::{HttpMessage, Response};
///
/// let response = Response::new()
///     .with_status(404, None)
///     .unwrap()
///     .with_header("Content-Type", "text/plain")
///     .unwrap();
///
/// assert_eq!(response.status(), 404);
/// assert_eq!(response.reason_phrase(), "Not Found");
/// assert_eq!(response.status_line(), "HTTP/1.1 404 Not Found");
/// assert!(Response::new().with_status(600, None).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    message: Message,
    status: u16,
    reason: String,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// An empty `200 OK` response.
    #[inline]
    pub fn new() -> Self {
        Self::with_parts(StatusCode::Ok, HeaderCollection::new(), MemoryStream::new())
    }

    pub fn with_parts<B: Stream + 'static>(
        status: StatusCode,
        headers: HeaderCollection,
        body: B,
    ) -> Self {
        Self {
            message: Message::new(headers, body),
            status: status.as_u16(),
            reason: status.reason_phrase().to_owned(),
        }
    }

    /// Builds a response from a numeric code, validating it.
    pub fn from_parts<B: Stream + 'static>(
        status: u16,
        reason: Option<&str>,
        headers: HeaderCollection,
        body: B,
    ) -> Result<Self> {
        let (status, reason) = validate_status(status, reason)?;
        Ok(Self {
            message: Message::new(headers, body),
            status,
            reason,
        })
    }
}

// Public API
impl Response {
    #[inline]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// The registered status code, if the numeric code has one.
    #[inline]
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status)
    }

    #[inline]
    pub fn reason_phrase(&self) -> &str {
        &self.reason
    }

    /// Replaces the status. Without an explicit `reason`, the registered
    /// phrase of `code` is used (empty for unregistered codes).
    pub fn with_status(&self, code: u16, reason: Option<&str>) -> Result<Self> {
        let (status, reason) = validate_status(code, reason)?;
        Ok(Self {
            status,
            reason,
            ..self.clone()
        })
    }

    /// `HTTP/<version> <code> <reason>`, without the trailing CRLF.
    pub fn status_line(&self) -> String {
        let mut line = format!("HTTP/{} {}", self.protocol_version(), self.status);
        if !self.reason.is_empty() {
            line.push(' ');
            line.push_str(&self.reason);
        }
        line
    }
}

impl HttpMessage for Response {
    #[inline]
    fn message(&self) -> &Message {
        &self.message
    }

    #[inline]
    fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

fn validate_status(code: u16, reason: Option<&str>) -> Result<(u16, String)> {
    if !(100..=599).contains(&code) {
        return Err(Error::invalid(format!(
            "status code {code} is out of range; must be between 100 and 599"
        )));
    }

    let reason = match reason {
        Some(reason) if reason.contains(['\r', '\n']) => {
            return Err(Error::invalid("reason phrase contains a line break"))
        }
        Some(reason) if !reason.is_empty() => reason.to_owned(),
        _ => StatusCode::reason_for(code).to_owned(),
    };

    Ok((code, reason))
}
