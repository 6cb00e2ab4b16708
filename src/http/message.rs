//! Shared message state and the copy-on-write mutation protocol

use crate::{
    errors::{Error, Result},
    http::{
        headers::{HeaderCollection, IntoHeaderValues},
        stream::{MemoryStream, Stream},
        types::Version,
    },
};

/// Protocol version, headers and body shared by every HTTP message.
///
/// `Message` is embedded by [`Request`](crate::Request),
/// [`Response`](crate::Response) and, through `Request`,
/// [`ServerRequest`](crate::ServerRequest). The headers and the body are owned
/// exclusively; cloning a message deep-copies both.
#[derive(Debug, Clone)]
pub struct Message {
    pub(crate) protocol: Version,
    pub(crate) headers: HeaderCollection,
    pub(crate) body: Box<dyn Stream>,
}

impl Default for Message {
    fn default() -> Self {
        Self::new(HeaderCollection::new(), MemoryStream::new())
    }
}

impl Message {
    #[inline]
    pub fn new<B: Stream + 'static>(headers: HeaderCollection, body: B) -> Self {
        Self {
            protocol: Version::default(),
            headers,
            body: Box::new(body),
        }
    }
}

/// Read accessors and `with_*` mutators common to all messages.
///
/// Every `with_*` method validates its input first, then clones the receiver,
/// applies the change to the clone and returns it. A failed call returns the
/// error and leaves nothing half-built; the receiver is never modified.
///
/// Implementors only provide access to their embedded [`Message`].
///
/// # Examples
/// ```
/// use maker_http::{HttpMessage, Request, Uri};
///
/// let request = Request::get(Uri::parse("http://example.org/").unwrap());
/// let json = request.with_header("Accept", "application/json").unwrap();
///
/// assert!(!request.has_header("accept"));
/// assert_eq!(json.header_line("accept"), "application/json");
/// assert!(request.with_header("Accept", "").is_err());
/// ```
pub trait HttpMessage: Clone {
    fn message(&self) -> &Message;
    fn message_mut(&mut self) -> &mut Message;

    #[inline]
    fn protocol_version(&self) -> Version {
        self.message().protocol
    }

    #[inline]
    fn headers(&self) -> &HeaderCollection {
        &self.message().headers
    }

    #[inline]
    fn has_header(&self, name: &str) -> bool {
        self.headers().has(name)
    }

    /// Values of a header; empty when absent.
    #[inline]
    fn header(&self, name: &str) -> &[String] {
        self.headers().get(name).unwrap_or_default()
    }

    /// Values of a header joined with `,`; empty when absent.
    #[inline]
    fn header_line(&self, name: &str) -> String {
        self.headers().header_line(name)
    }

    #[inline]
    fn body(&self) -> &dyn Stream {
        self.message().body.as_ref()
    }

    /// Mutable access to this message's own body, for reading and seeking.
    #[inline]
    fn body_mut(&mut self) -> &mut dyn Stream {
        self.message_mut().body.as_mut()
    }

    /// Accepts `1.0`, `1.1`, `2.0` and `2`.
    fn with_protocol_version(&self, version: &str) -> Result<Self> {
        let version = Version::parse(version)?;

        let mut clone = self.clone();
        clone.message_mut().protocol = version;
        Ok(clone)
    }

    /// Replaces all values of `name`.
    fn with_header<V: IntoHeaderValues>(&self, name: &str, value: V) -> Result<Self> {
        let values = validate_header(name, value)?;

        let mut clone = self.clone();
        clone.message_mut().headers.set(name, values);
        Ok(clone)
    }

    /// Appends to the values of `name`, creating the header if absent.
    fn with_added_header<V: IntoHeaderValues>(&self, name: &str, value: V) -> Result<Self> {
        let values = validate_header(name, value)?;

        let mut clone = self.clone();
        clone.message_mut().headers.add(name, values);
        Ok(clone)
    }

    fn without_header(&self, name: &str) -> Self {
        let mut clone = self.clone();
        clone.message_mut().headers.remove(name);
        clone
    }

    fn with_body<B: Stream + 'static>(&self, body: B) -> Self {
        let mut clone = self.clone();
        clone.message_mut().body = Box::new(body);
        clone
    }
}

impl HttpMessage for Message {
    #[inline]
    fn message(&self) -> &Message {
        self
    }

    #[inline]
    fn message_mut(&mut self) -> &mut Message {
        self
    }
}

/// Checks a header before it is stored: the name must be a non-empty token
/// without whitespace or `:`, the value a non-empty scalar or non-empty list,
/// and no value may contain a line break.
pub(crate) fn validate_header<V: IntoHeaderValues>(name: &str, value: V) -> Result<Vec<String>> {
    if name.is_empty() {
        return Err(Error::invalid("header name must not be empty"));
    }
    if name.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control() || b == b':') {
        return Err(Error::invalid(format!("header name `{name}` is not a valid token")));
    }

    let values = value.into_header_values();
    match values.as_slice() {
        [] => return Err(Error::invalid(format!("header `{name}` needs at least one value"))),
        [single] if single.is_empty() => {
            return Err(Error::invalid(format!("header `{name}` value must not be empty")))
        }
        _ => {}
    }

    if values.iter().any(|value| value.contains(['\r', '\n'])) {
        return Err(Error::invalid(format!("header `{name}` value contains a line break")));
    }

    Ok(values)
}
