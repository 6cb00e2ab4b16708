//! Outgoing request bound to a transport

use crate::{
    client::{
        response::ClientResponse,
        tcp::TcpTransport,
        transport::{Transport, TransportErrorCode, TransportOptions, TransportRequest},
    },
    errors::{Error, Result},
    http::{
        message::{HttpMessage, Message},
        request::Request,
        uri::Uri,
    },
    Method, Scheme,
};
use std::{path::PathBuf, time::Duration};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

macro_rules! verb_factories {
    ($( $fn_name:ident => $method:ident; )+) => {
        $(
            #[doc = concat!("A `", stringify!($method), "` request to `url`.")]
            #[inline]
            pub fn $fn_name(url: &str) -> Result<Self> {
                Self::for_method(Method::$method, url)
            }
        )+
    };
}

/// A [`Request`] plus the transport settings used to send it.
///
/// Building a client request never touches the network; [`send`](Self::send)
/// executes it on the default [`TcpTransport`] and
/// [`send_with`](Self::send_with) on any [`Transport`].
///
/// # Examples
/// ```no_run
/// use maker_http::{ClientRequest, HttpMessage, MemoryStream};
/// use std::time::Duration;
///
/// let response = ClientRequest::post("http://127.0.0.1:8080/login")
///     .unwrap()
///     .with_body(MemoryStream::from_bytes("user=ann&pass=secret"))
///     .with_follow_redirects(true)
///     .with_timeout(Duration::from_secs(5))
///     .send()
///     .unwrap();
///
/// println!("{} {}", response.status(), response.reason_phrase());
/// ```
#[derive(Debug, Clone)]
pub struct ClientRequest {
    request: Request,
    options: TransportOptions,
}

impl ClientRequest {
    #[inline]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            options: TransportOptions::default(),
        }
    }

    /// A body-less request; fails when `url` is not a valid URI.
    pub fn for_method(method: Method, url: &str) -> Result<Self> {
        Ok(Self::new(Request::new(method, Uri::parse(url)?)))
    }

    verb_factories! {
        get => Get;
        post => Post;
        put => Put;
        delete => Delete;
        head => Head;
        options => Options;
        patch => Patch;
        trace => Trace;
        connect => Connect;
    }
}

// Public API
impl ClientRequest {
    #[inline]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.request.method()
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    #[inline]
    pub fn transport_options(&self) -> &TransportOptions {
        &self.options
    }

    pub fn with_method(&self, method: &str) -> Result<Self> {
        Ok(Self {
            request: self.request.with_method(method)?,
            options: self.options.clone(),
        })
    }

    pub fn with_uri(&self, uri: Uri, preserve_host: bool) -> Self {
        Self {
            request: self.request.with_uri(uri, preserve_host),
            options: self.options.clone(),
        }
    }

    fn with_options(&self, apply: impl FnOnce(&mut TransportOptions)) -> Self {
        let mut clone = self.clone();
        apply(&mut clone.options);
        clone
    }

    pub fn with_user_agent(&self, user_agent: &str) -> Self {
        self.with_options(|options| options.user_agent = Some(user_agent.to_owned()))
    }

    pub fn with_referer(&self, referer: &str) -> Self {
        self.with_options(|options| options.referer = Some(referer.to_owned()))
    }

    /// Netscape-format cookie file read before and written after sending.
    pub fn with_cookie_file<P: Into<PathBuf>>(&self, path: P) -> Self {
        let path = path.into();
        self.with_options(|options| options.cookie_file = Some(path))
    }

    pub fn with_follow_redirects(&self, follow: bool) -> Self {
        self.with_options(|options| options.follow_redirects = follow)
    }

    pub fn with_max_redirects(&self, max: u32) -> Self {
        self.with_options(|options| options.max_redirects = Some(max))
    }

    /// Bounds the whole execution, connection and redirects included.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_options(|options| options.timeout = Some(timeout))
    }

    /// Maps this request onto what a [`Transport`] executes.
    ///
    /// - `HEAD` asks the transport not to read a body
    /// - `GET` is always sent without a body or `Content-Length`
    /// - `POST` defaults `Content-Type` to `application/x-www-form-urlencoded`
    /// - a non-empty body gets a `Content-Length` unless one is set
    ///
    /// Fails with a transport error (`URL_MALFORMAT`) when the URI has no
    /// scheme or no host.
    pub fn to_transport_request(&self) -> Result<TransportRequest> {
        let uri = self.request.uri();
        if uri.scheme_kind() == Scheme::None || uri.host().is_empty() {
            return Err(Error::transport(
                TransportErrorCode::UrlMalformat,
                format!("cannot send a request to `{uri}`"),
            ));
        }

        let method = self.request.method();
        let mut headers = self.request.headers().clone();
        let mut options = self.options.clone();

        let body = match method {
            Method::Get => Vec::new(),
            _ => self.request.body().to_bytes()?,
        };

        match method {
            Method::Get => {
                headers.remove("Content-Length");
            }
            Method::Head => options.no_body = true,
            Method::Post if !headers.has("Content-Type") => {
                headers.set("Content-Type", FORM_CONTENT_TYPE)
            }
            _ => {}
        }

        if !body.is_empty() && !headers.has("Content-Length") {
            headers.set("Content-Length", body.len().to_string());
        }

        Ok(TransportRequest {
            method,
            url: uri.to_string(),
            header_lines: headers.to_header_lines(),
            body,
            options,
        })
    }

    /// Sends on a [`TcpTransport`] with default limits.
    #[inline]
    pub fn send(&self) -> Result<ClientResponse> {
        self.send_with(&TcpTransport::default())
    }

    pub fn send_with<T: Transport + ?Sized>(&self, transport: &T) -> Result<ClientResponse> {
        let request = self.to_transport_request()?;
        ClientResponse::from_transport(transport.execute(request))
    }
}

impl HttpMessage for ClientRequest {
    #[inline]
    fn message(&self) -> &Message {
        &self.request.message
    }

    #[inline]
    fn message_mut(&mut self) -> &mut Message {
        &mut self.request.message
    }
}

impl From<Request> for ClientRequest {
    #[inline]
    fn from(request: Request) -> Self {
        Self::new(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::transport::TransportResult,
        http::stream::MemoryStream,
    };
    use std::sync::Mutex;

    /// Records the request and answers with a canned result.
    struct Recorder {
        seen: Mutex<Option<TransportRequest>>,
        reply: TransportResult,
    }

    impl Recorder {
        fn new(reply: &[u8], header_size: usize) -> Self {
            Self {
                seen: Mutex::new(None),
                reply: TransportResult {
                    status_code: Some(200),
                    header_size,
                    response: reply.to_vec(),
                    ..TransportResult::default()
                },
            }
        }
    }

    impl Transport for Recorder {
        fn execute(&self, request: TransportRequest) -> TransportResult {
            *self.seen.lock().unwrap() = Some(request);
            self.reply.clone()
        }
    }

    #[test]
    fn get_with_headers() {
        let request = ClientRequest::get("http://example.org")
            .unwrap()
            .with_header("Content-Type", "application/json")
            .unwrap()
            .with_header("Accept", "application/json")
            .unwrap()
            .with_header("Content-Length", "7")
            .unwrap()
            .with_body(MemoryStream::from_bytes("ignored"));

        assert_eq!(request.request().request_target(), "/");

        let mapped = request.to_transport_request().unwrap();
        assert_eq!(mapped.method, Method::Get);
        assert_eq!(mapped.url, "http://example.org/");
        assert!(mapped.body.is_empty());
        assert!(!mapped.options.no_body);

        for line in ["Content-Type: application/json", "Accept: application/json", "Host: example.org"] {
            assert!(mapped.header_lines.iter().any(|l| l == line), "{line}");
        }
        assert!(!mapped.header_lines.iter().any(|l| l.to_ascii_lowercase().starts_with("content-length")));
    }

    #[test]
    fn post_and_head_mapping() {
        let post = ClientRequest::post("http://example.org/form")
            .unwrap()
            .with_body(MemoryStream::from_bytes("a=1&b=2"))
            .with_user_agent("agent/1")
            .with_max_redirects(3)
            .to_transport_request()
            .unwrap();

        assert_eq!(post.body, b"a=1&b=2");
        assert!(post.header_lines.contains(&"Content-Type: application/x-www-form-urlencoded".to_owned()));
        assert!(post.header_lines.contains(&"Content-Length: 7".to_owned()));
        assert_eq!(post.options.user_agent.as_deref(), Some("agent/1"));
        assert_eq!(post.options.max_redirects, Some(3));
        assert!(!post.options.follow_redirects);

        let json = ClientRequest::post("http://example.org/api")
            .unwrap()
            .with_header("content-type", "application/json")
            .unwrap()
            .with_header("Content-Length", "2")
            .unwrap()
            .with_body(MemoryStream::from_bytes("{}"))
            .to_transport_request()
            .unwrap();
        assert!(json.header_lines.contains(&"content-type: application/json".to_owned()));
        assert!(json.header_lines.contains(&"Content-Length: 2".to_owned()));
        assert_eq!(json.header_lines.len(), 3);

        let head = ClientRequest::head("http://example.org/").unwrap().to_transport_request().unwrap();
        assert!(head.options.no_body);
        assert_eq!(head.method, Method::Head);
    }

    #[test]
    fn options_are_per_request() {
        let base = ClientRequest::get("http://example.org/").unwrap();
        let tuned = base
            .with_referer("http://example.org/start")
            .with_cookie_file("/tmp/jar.txt")
            .with_follow_redirects(true)
            .with_timeout(Duration::from_secs(3));

        assert_eq!(base.transport_options(), &TransportOptions::default());
        assert_eq!(tuned.transport_options().referer.as_deref(), Some("http://example.org/start"));
        assert_eq!(tuned.transport_options().cookie_file, Some(PathBuf::from("/tmp/jar.txt")));
        assert_eq!(tuned.transport_options().timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn verb_factories() {
        #[rustfmt::skip]
        let cases: [(fn(&str) -> Result<ClientRequest>, Method); 9] = [
            (ClientRequest::get,     Method::Get),
            (ClientRequest::post,    Method::Post),
            (ClientRequest::put,     Method::Put),
            (ClientRequest::delete,  Method::Delete),
            (ClientRequest::head,    Method::Head),
            (ClientRequest::options, Method::Options),
            (ClientRequest::patch,   Method::Patch),
            (ClientRequest::trace,   Method::Trace),
            (ClientRequest::connect, Method::Connect),
        ];

        for (factory, method) in cases {
            assert_eq!(factory("http://example.org/").unwrap().method(), method);
        }

        assert!(ClientRequest::get("http://example.org:0/").is_err());
    }

    #[test]
    fn unusable_url() {
        let recorder = Recorder::new(b"", 0);

        for request in [
            ClientRequest::new(Request::new(Method::Get, Uri::default())),
            ClientRequest::get("/relative").unwrap(),
        ] {
            match request.send_with(&recorder) {
                Err(Error::Transport { code, .. }) => assert_eq!(code, TransportErrorCode::UrlMalformat),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(recorder.seen.lock().unwrap().is_none());
    }

    #[test]
    fn send_with_transport() {
        let reply = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nhi";
        let recorder = Recorder::new(reply, reply.len() - 2);

        let response = ClientRequest::put("http://example.org/item/1")
            .unwrap()
            .with_body(MemoryStream::from_bytes("data"))
            .send_with(&recorder)
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.header_line("content-type"), "text/plain");
        assert_eq!(response.body().to_bytes().unwrap(), b"hi");

        let seen = recorder.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.method, Method::Put);
        assert_eq!(seen.body, b"data");
    }
}
