use crate::{
    errors::{Error, Result},
    http::{
        headers::HeaderCollection,
        message::{HttpMessage, Message},
        stream::{MemoryStream, Stream},
        uri::Uri,
    },
    Method,
};
use std::sync::OnceLock;

/// An immutable outgoing or incoming HTTP request.
///
/// A request couples a [`Method`] and a [`Uri`] with the shared
/// [`Message`] state. The `Host` header is kept in step with the URI:
///
/// - on construction, `Host` is injected from the URI when absent and the URI
///   has a host (with `:port` for a non-default port)
/// - [`with_uri`](Request::with_uri) rewrites `Host` from the new URI, unless
///   asked to preserve it, in which case it is only filled when it was missing
///   or empty
///
/// The request-target is derived from the URI on first use and cached, unless
/// one was set explicitly with
/// [`with_request_target`](Request::with_request_target).
///
/// # Examples
/// ```
/// use maker_http::{HttpMessage, Method, Request, Uri};
///
/// let uri = Uri::parse("http://example.org:8080/users?page=2").unwrap();
/// let request = Request::new(Method::Get, uri);
///
/// assert_eq!(request.header_line("Host"), "example.org:8080");
/// assert_eq!(request.request_target(), "/users?page=2");
///
/// let post = request.with_method("post").unwrap();
/// assert_eq!(post.method(), Method::Post);
/// assert_eq!(request.method(), Method::Get);
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) message: Message,
    method: Method,
    uri: Uri,
    request_target: Option<String>,
    target_cache: OnceLock<String>,
}

impl Request {
    /// A body-less request.
    #[inline]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self::with_parts(method, uri, HeaderCollection::new(), MemoryStream::new())
    }

    #[inline]
    pub fn get(uri: Uri) -> Self {
        Self::new(Method::Get, uri)
    }

    /// Builds a request from a method name, validating it.
    pub fn from_parts<B: Stream + 'static>(
        method: &str,
        uri: Uri,
        headers: HeaderCollection,
        body: B,
    ) -> Result<Self> {
        let method = Method::parse(method)?;
        Ok(Self::with_parts(method, uri, headers, body))
    }

    pub fn with_parts<B: Stream + 'static>(
        method: Method,
        uri: Uri,
        headers: HeaderCollection,
        body: B,
    ) -> Self {
        let mut request = Self {
            message: Message::new(headers, body),
            method,
            uri,
            request_target: None,
            target_cache: OnceLock::new(),
        };

        if !request.has_header("Host") {
            request.sync_host();
        }
        request
    }

    /// `host[:port]` of the current URI; empty when it has no host.
    fn host_header(&self) -> String {
        match self.uri.port() {
            Some(port) => format!("{}:{port}", self.uri.host()),
            None => self.uri.host().to_owned(),
        }
    }

    fn sync_host(&mut self) {
        if !self.uri.host().is_empty() {
            let host = self.host_header();
            self.message.headers.set("Host", host);
        }
    }
}

// Public API
impl Request {
    #[inline]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[inline]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Accepts any case; the method is normalized to upper-case.
    pub fn with_method(&self, method: &str) -> Result<Self> {
        let method = Method::parse(method)?;
        Ok(Self {
            method,
            ..self.clone()
        })
    }

    /// Replaces the URI and updates `Host` from it.
    ///
    /// With `preserve_host`, an existing non-empty `Host` header is kept.
    pub fn with_uri(&self, uri: Uri, preserve_host: bool) -> Self {
        let had_host = !self.header_line("Host").is_empty();

        let mut clone = Self {
            uri,
            target_cache: OnceLock::new(),
            ..self.clone()
        };

        if !preserve_host || !had_host {
            clone.sync_host();
        }
        clone
    }

    /// The request-target sent on the request line.
    ///
    /// Unless overridden, this is `base path + "/" + path + "?" + query`, with
    /// the query part omitted when empty.
    pub fn request_target(&self) -> &str {
        if let Some(target) = &self.request_target {
            return target;
        }

        self.target_cache.get_or_init(|| {
            let mut target = format!(
                "{}/{}",
                self.uri.base_path(),
                self.uri.path().trim_start_matches('/')
            );
            if !self.uri.query().is_empty() {
                target.push('?');
                target.push_str(self.uri.query());
            }
            target
        })
    }

    /// Overrides the request-target, e.g. `*` or an absolute form.
    /// Whitespace is rejected.
    pub fn with_request_target(&self, target: &str) -> Result<Self> {
        if target.contains(char::is_whitespace) {
            return Err(Error::invalid(format!(
                "request target `{target}` must not contain whitespace"
            )));
        }

        Ok(Self {
            request_target: Some(target.to_owned()),
            ..self.clone()
        })
    }
}

impl HttpMessage for Request {
    #[inline]
    fn message(&self) -> &Message {
        &self.message
    }

    #[inline]
    fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}
