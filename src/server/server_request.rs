use crate::{
    errors::{Error, Result},
    http::{
        headers::HeaderCollection,
        message::{HttpMessage, Message},
        query::{Query, DEFAULT_DEPTH},
        request::Request,
        stream::{MemoryStream, Stream},
        types::Version,
        uri::Uri,
    },
    limits::InputLimits,
    server::{
        body_parsers::BodyParsers,
        environment::Environment,
        uploaded_file::{parse_uploaded_files, UploadedFiles},
    },
    Method,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::{
    any::Any,
    sync::{Arc, OnceLock},
};

/// Named request attributes, typically set by middleware.
pub type Attributes = IndexMap<String, Arc<dyn Any + Send + Sync>>;

/// Media types whose parsed body is taken from the server's decoded POST
/// fields when available.
const FORM_MEDIA_TYPES: [&str; 2] = ["application/x-www-form-urlencoded", "multipart/form-data"];

/// A request as seen by the server: a [`Request`] plus the data the
/// execution environment provides.
///
/// On top of the request it carries server parameters, cookies, query
/// params, uploaded files, free-form attributes and the parsed body. Query
/// params and the parsed body are derived lazily, on first access, and cached
/// for the lifetime of the value; both can be overridden explicitly.
///
/// Like every message, a `ServerRequest` is immutable: all `with_*` methods
/// return a modified copy.
///
/// # Examples
/// ```
/// use maker_http::{Environment, HttpMessage, ServerRequest};
/// use serde_json::json;
///
/// let env = Environment::mock([
///     ("REQUEST_METHOD", "POST"),
///     ("REQUEST_URI", "/users?page=2"),
///     ("CONTENT_TYPE", "application/json; charset=utf-8"),
///     ("HTTP_COOKIE", "session=abc%20def; theme=dark"),
/// ])
/// .with_input(r#"{"name":"Ann"}"#);
///
/// let request = ServerRequest::from_environment(&env).unwrap();
///
/// assert_eq!(request.uri().path(), "/users");
/// assert_eq!(request.query_params()["page"], "2");
/// assert_eq!(request.cookie_params()["session"], "abc def");
/// assert_eq!(request.media_type().as_deref(), Some("application/json"));
/// assert_eq!(request.content_charset().as_deref(), Some("utf-8"));
/// assert_eq!(request.parsed_body().unwrap(), Some(&json!({"name": "Ann"})));
/// ```
#[derive(Debug, Clone)]
pub struct ServerRequest {
    request: Request,
    server_params: Arc<IndexMap<String, String>>,
    cookies: IndexMap<String, String>,
    query_params: OnceLock<Map<String, Value>>,
    explicit_query: bool,
    uploaded_files: UploadedFiles,
    attributes: Attributes,
    parsed_body: OnceLock<Option<Value>>,
    explicit_body: bool,
    body_parsers: BodyParsers,
    nesting_depth: usize,
}

impl ServerRequest {
    /// Wraps a request with empty server-side data.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            server_params: Arc::default(),
            cookies: IndexMap::new(),
            query_params: OnceLock::new(),
            explicit_query: false,
            uploaded_files: UploadedFiles::new(),
            attributes: Attributes::new(),
            parsed_body: OnceLock::new(),
            explicit_body: false,
            body_parsers: BodyParsers::default(),
            nesting_depth: DEFAULT_DEPTH,
        }
    }

    /// Reconstructs the current request from `env` with default limits.
    #[inline]
    pub fn from_environment(env: &Environment) -> Result<Self> {
        Self::from_environment_with(env, &InputLimits::default())
    }

    /// Reconstructs the current request from `env`.
    ///
    /// The method, URI and headers follow [`Environment::method`],
    /// [`Environment::uri`] and [`HeaderCollection::from_environment`]; every
    /// variable becomes a server param. Cookies come from the `Cookie` header,
    /// the body from the buffered input and uploaded files from the upload
    /// metadata. For a form `POST` whose fields the server already decoded,
    /// those fields become the parsed body.
    pub fn from_environment_with(env: &Environment, limits: &InputLimits) -> Result<Self> {
        if env.input().len() > limits.body_size {
            return Err(Error::stream(format!(
                "request body exceeds the limit of {} bytes",
                limits.body_size
            )));
        }

        let method = Method::parse(&env.method())?;
        let uri = env.uri()?;
        let headers = HeaderCollection::from_environment(env.vars());

        let protocol = match env.get("SERVER_PROTOCOL") {
            Some(protocol) => Version::parse(protocol).unwrap_or_else(|err| {
                tracing::warn!(%err, "ignoring server protocol");
                Version::default()
            }),
            None => Version::default(),
        };

        let cookies = headers
            .first("Cookie")
            .map(parse_cookie_header)
            .unwrap_or_default();

        let body = MemoryStream::from_bytes(env.input());
        let mut request = Request::with_parts(method, uri, headers, body);
        request.message.protocol = protocol;

        let mut server_request = Self {
            server_params: Arc::new(env.vars().clone()),
            cookies,
            uploaded_files: env.files().map(parse_uploaded_files).unwrap_or_default(),
            body_parsers: BodyParsers::new(limits.nesting_depth),
            nesting_depth: limits.nesting_depth,
            ..Self::new(request)
        };

        if method == Method::Post {
            let is_form = server_request
                .media_type()
                .is_some_and(|media_type| FORM_MEDIA_TYPES.contains(&media_type.as_str()));

            if let (true, Some(post)) = (is_form, env.post()) {
                server_request = server_request.with_parsed_body(Some(post.clone()))?;
            }
        }

        tracing::debug!(
            method = %server_request.method(),
            uri = %server_request.uri(),
            "reconstructed request from environment"
        );

        Ok(server_request)
    }
}

// Request delegation
impl ServerRequest {
    #[inline]
    pub const fn request(&self) -> &Request {
        &self.request
    }

    #[inline]
    pub const fn method(&self) -> Method {
        self.request.method()
    }

    #[inline]
    pub const fn uri(&self) -> &Uri {
        self.request.uri()
    }

    #[inline]
    pub fn request_target(&self) -> &str {
        self.request.request_target()
    }

    pub fn with_method(&self, method: &str) -> Result<Self> {
        let request = self.request.with_method(method)?;
        Ok(Self {
            request,
            ..self.clone()
        })
    }

    /// Replaces the URI. Query params derived from the old URI are dropped,
    /// explicitly set ones are kept.
    pub fn with_uri(&self, uri: Uri, preserve_host: bool) -> Self {
        let mut clone = Self {
            request: self.request.with_uri(uri, preserve_host),
            ..self.clone()
        };
        if !clone.explicit_query {
            clone.query_params = OnceLock::new();
        }
        clone
    }

    pub fn with_request_target(&self, target: &str) -> Result<Self> {
        let request = self.request.with_request_target(target)?;
        Ok(Self {
            request,
            ..self.clone()
        })
    }
}

// Server data
impl ServerRequest {
    #[inline]
    pub fn server_params(&self) -> &IndexMap<String, String> {
        &self.server_params
    }

    #[inline]
    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.server_params.get(name).map(String::as_str)
    }

    #[inline]
    pub fn cookie_params(&self) -> &IndexMap<String, String> {
        &self.cookies
    }

    pub fn with_cookie_params(&self, cookies: IndexMap<String, String>) -> Self {
        Self {
            cookies,
            ..self.clone()
        }
    }

    /// Query params decoded from the URI query on first access.
    pub fn query_params(&self) -> &Map<String, Value> {
        if let Some(params) = self.query_params.get() {
            tracing::trace!("query params cache hit");
            return params;
        }

        self.query_params
            .get_or_init(|| Query::parse_with_depth(self.uri().query(), self.nesting_depth))
    }

    /// Overrides the query params without touching the URI.
    pub fn with_query_params(&self, params: Map<String, Value>) -> Self {
        Self {
            query_params: OnceLock::from(params),
            explicit_query: true,
            ..self.clone()
        }
    }

    #[inline]
    pub fn uploaded_files(&self) -> &UploadedFiles {
        &self.uploaded_files
    }

    pub fn with_uploaded_files(&self, uploaded_files: UploadedFiles) -> Self {
        Self {
            uploaded_files,
            ..self.clone()
        }
    }
}

// Attributes
impl ServerRequest {
    /// Every attribute, in insertion order.
    #[inline]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// The attribute `name`, if present and of type `T`.
    pub fn attribute<T: Any>(&self, name: &str) -> Option<&T> {
        self.attributes.get(name)?.downcast_ref::<T>()
    }

    /// The attribute `name`, or `default` when absent or of another type.
    pub fn attribute_or<'a, T: Any>(&'a self, name: &str, default: &'a T) -> &'a T {
        self.attribute(name).unwrap_or(default)
    }

    pub fn with_attribute<T: Any + Send + Sync>(&self, name: &str, value: T) -> Self {
        let mut clone = self.clone();
        clone.attributes.insert(name.to_owned(), Arc::new(value));
        clone
    }

    pub fn without_attribute(&self, name: &str) -> Self {
        let mut clone = self.clone();
        clone.attributes.shift_remove(name);
        clone
    }
}

// Content negotiation
impl ServerRequest {
    /// Lower-cased media type of `Content-Type`, without parameters.
    pub fn media_type(&self) -> Option<String> {
        let content_type = self.headers().first("Content-Type")?;
        let media_type = content_type
            .split([';', ','])
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        (!media_type.is_empty()).then_some(media_type)
    }

    /// Parameters of `Content-Type` (`charset`, `boundary`, ...) with
    /// lower-cased names.
    pub fn media_type_params(&self) -> IndexMap<String, String> {
        let Some(content_type) = self.headers().first("Content-Type") else {
            return IndexMap::new();
        };

        content_type
            .split(';')
            .skip(1)
            .filter_map(|param| {
                let (name, value) = param.split_once('=')?;
                let value = value.trim().trim_matches('"');
                Some((name.trim().to_ascii_lowercase(), value.to_owned()))
            })
            .collect()
    }

    #[inline]
    pub fn content_charset(&self) -> Option<String> {
        self.media_type_params().shift_remove("charset")
    }

    #[inline]
    pub fn content_length(&self) -> Option<u64> {
        self.headers().first("Content-Length")?.trim().parse().ok()
    }

    /// `true` for requests sent with `X-Requested-With: XMLHttpRequest`.
    #[inline]
    pub fn is_xhr(&self) -> bool {
        self.headers().first("X-Requested-With") == Some("XMLHttpRequest")
    }
}

// Body parsing
impl ServerRequest {
    /// The body decoded according to its media type.
    ///
    /// Returns `None` for an empty body or a media type with no registered
    /// parser. The first successful result is cached, so each parser runs at
    /// most once per value. A parser producing anything but an object, an
    /// array or `null` fails with [`Error::Runtime`]; a parser that cannot
    /// decode the body fails with [`Error::BodyParse`] and nothing is cached.
    pub fn parsed_body(&self) -> Result<Option<&Value>> {
        if let Some(parsed) = self.parsed_body.get() {
            tracing::trace!("parsed body cache hit");
            return Ok(parsed.as_ref());
        }

        let parsed = self.parse_body()?;
        Ok(self.parsed_body.get_or_init(|| parsed).as_ref())
    }

    fn parse_body(&self) -> Result<Option<Value>> {
        let body = self.body().to_bytes()?;
        if body.is_empty() {
            return Ok(None);
        }

        let Some(media_type) = self.media_type() else {
            return Ok(None);
        };
        let Some(parser) = self.body_parsers.get(&media_type) else {
            return Ok(None);
        };

        let text = String::from_utf8_lossy(&body);
        match parser(text.as_ref())? {
            Value::Null => Ok(None),
            value @ (Value::Object(_) | Value::Array(_)) => Ok(Some(value)),
            other => Err(Error::Runtime(format!(
                "`{media_type}` body parser must return an object, an array or null, got `{other}`"
            ))),
        }
    }

    /// Sets the parsed body explicitly. Only objects, arrays and `None` (or
    /// `null`) are accepted.
    pub fn with_parsed_body(&self, parsed: Option<Value>) -> Result<Self> {
        let parsed = match parsed {
            None | Some(Value::Null) => None,
            Some(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
            Some(other) => {
                return Err(Error::invalid(format!(
                    "parsed body must be an object, an array or null, got `{other}`"
                )))
            }
        };

        Ok(Self {
            parsed_body: OnceLock::from(parsed),
            explicit_body: true,
            ..self.clone()
        })
    }

    /// Registers a body parser for `media_type` on this request.
    ///
    /// A cached body derived with the previous registry is dropped; an
    /// explicitly set parsed body is kept.
    pub fn register_media_type_parser<F>(&mut self, media_type: &str, parser: F)
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.body_parsers.register(media_type, parser);
        if !self.explicit_body {
            self.parsed_body = OnceLock::new();
        }
    }

    /// A request param: the parsed-body entry `name` when the body is an
    /// object containing it, else the query param `name`.
    pub fn param(&self, name: &str) -> Result<Option<Value>> {
        if let Some(Value::Object(body)) = self.parsed_body()? {
            if let Some(value) = body.get(name) {
                return Ok(Some(value.clone()));
            }
        }

        Ok(self.query_params().get(name).cloned())
    }
}

impl HttpMessage for ServerRequest {
    #[inline]
    fn message(&self) -> &Message {
        self.request.message()
    }

    #[inline]
    fn message_mut(&mut self) -> &mut Message {
        self.request.message_mut()
    }

    /// Replaces the body; a parsed body derived from the old one is dropped.
    fn with_body<B: Stream + 'static>(&self, body: B) -> Self {
        let mut clone = self.clone();
        clone.message_mut().body = Box::new(body);
        if !clone.explicit_body {
            clone.parsed_body = OnceLock::new();
        }
        clone
    }
}

/// Parses a `Cookie` header: `;`-separated `name=value` pairs, both halves
/// form-decoded. The first occurrence of a name wins; pieces without `=` are
/// ignored.
///
/// # Examples
/// ```
/// use maker_http::parse_cookie_header;
///
/// let cookies = parse_cookie_header("a=1; b=hello%20world;a=2; junk");
/// assert_eq!(cookies["a"], "1");
/// assert_eq!(cookies["b"], "hello world");
/// assert_eq!(cookies.len(), 2);
/// ```
pub fn parse_cookie_header(header: &str) -> IndexMap<String, String> {
    let mut cookies = IndexMap::new();

    for piece in header.trim_end_matches(['\r', '\n']).split(';') {
        let Some((name, value)) = piece.trim_start().split_once('=') else {
            continue;
        };

        cookies
            .entry(Query::decode(name))
            .or_insert_with(|| Query::decode(value));
    }

    cookies
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn json_request(body: &str) -> ServerRequest {
        let env = Environment::mock([
            ("REQUEST_METHOD", "POST"),
            ("CONTENT_TYPE", "application/json"),
        ])
        .with_input(body);

        ServerRequest::from_environment(&env).unwrap()
    }

    #[test]
    fn from_environment() {
        let env = Environment::mock([
            ("REQUEST_METHOD", "put"),
            ("SERVER_PROTOCOL", "HTTP/1.0"),
            ("HTTP_HOST", "api.test:8080"),
            ("REQUEST_URI", "/items/5?full=1"),
            ("HTTP_COOKIE", "a=1; a=2; b=x+y"),
            ("REQUEST_TIME_FLOAT", "1700000000.1234"),
        ])
        .with_input("payload");

        let request = ServerRequest::from_environment(&env).unwrap();

        assert_eq!(request.method(), Method::Put);
        assert_eq!(request.protocol_version(), Version::Http10);
        assert_eq!(request.uri().to_string(), "http://api.test:8080/items/5?full=1");
        assert_eq!(request.header_line("Host"), "api.test:8080");
        assert_eq!(request.request_target(), "/items/5?full=1");
        assert_eq!(request.cookie_params()["a"], "1");
        assert_eq!(request.cookie_params()["b"], "x y");
        assert_eq!(request.server_param("REQUEST_TIME_FLOAT"), Some("1700000000.1234"));
        assert_eq!(request.body().to_bytes().unwrap(), b"payload");
        assert_eq!(request.body().tell().unwrap(), 0);
    }

    #[test]
    fn from_environment_rejects() {
        let env = Environment::mock([("REQUEST_METHOD", "BREW")]);
        assert!(ServerRequest::from_environment(&env).unwrap_err().is_invalid_input());

        let limits = InputLimits {
            body_size: 2,
            ..InputLimits::default()
        };
        let env = Environment::mock([("REQUEST_METHOD", "POST")]).with_input("too long");
        assert!(matches!(
            ServerRequest::from_environment_with(&env, &limits),
            Err(Error::Stream(_))
        ));

        let env = Environment::mock([("SERVER_PROTOCOL", "HTTP/9")]);
        let request = ServerRequest::from_environment(&env).unwrap();
        assert_eq!(request.protocol_version(), Version::Http11);
    }

    #[test]
    fn form_post_uses_server_fields() {
        let env = Environment::mock([
            ("REQUEST_METHOD", "POST"),
            ("CONTENT_TYPE", "multipart/form-data; boundary=xyz"),
        ])
        .with_input("--xyz...")
        .with_post(json!({"title": "hello"}));

        let request = ServerRequest::from_environment(&env).unwrap();
        assert_eq!(request.parsed_body().unwrap(), Some(&json!({"title": "hello"})));
        assert_eq!(request.media_type_params()["boundary"], "xyz");

        let get = Environment::mock([("CONTENT_TYPE", "application/x-www-form-urlencoded")])
            .with_input("a=1")
            .with_post(json!({"ignored": true}));
        let request = ServerRequest::from_environment(&get).unwrap();
        assert_eq!(request.parsed_body().unwrap(), Some(&json!({"a": "1"})));
    }

    #[test]
    fn parsed_body_json() {
        let request = json_request(r#"{"foo":"bar"}"#);
        assert_eq!(request.parsed_body().unwrap(), Some(&json!({"foo": "bar"})));

        assert_eq!(json_request("").parsed_body().unwrap(), None);
        assert_eq!(json_request("null").parsed_body().unwrap(), None);
        assert!(matches!(json_request("\"text\"").parsed_body(), Err(Error::Runtime(_))));
        assert!(matches!(json_request("{").parsed_body(), Err(Error::BodyParse { .. })));

        let unknown = json_request("plain")
            .with_header("Content-Type", "text/plain")
            .unwrap();
        assert_eq!(unknown.parsed_body().unwrap(), None);
    }

    #[test]
    fn parser_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut request = json_request("a,b").with_header("Content-Type", "text/csv").unwrap();
        request.register_media_type_parser("text/csv", move |body: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Array(body.split(',').map(|cell| json!(cell)).collect()))
        });

        assert_eq!(request.parsed_body().unwrap(), Some(&json!(["a", "b"])));
        assert_eq!(request.parsed_body().unwrap(), Some(&json!(["a", "b"])));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let replaced = request.with_body(MemoryStream::from_bytes("c"));
        assert_eq!(replaced.parsed_body().unwrap(), Some(&json!(["c"])));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn explicit_parsed_body() {
        let request = json_request(r#"{"from":"body"}"#);

        let explicit = request.with_parsed_body(Some(json!({"from": "override"}))).unwrap();
        assert_eq!(explicit.parsed_body().unwrap(), Some(&json!({"from": "override"})));
        assert_eq!(request.parsed_body().unwrap(), Some(&json!({"from": "body"})));

        let kept = explicit.with_body(MemoryStream::from_bytes(r#"{"from":"new"}"#));
        assert_eq!(kept.parsed_body().unwrap(), Some(&json!({"from": "override"})));

        let cleared = request.with_parsed_body(None).unwrap();
        assert_eq!(cleared.parsed_body().unwrap(), None);

        #[rustfmt::skip]
        let scalars = [json!("text"), json!(1), json!(true)];
        for scalar in scalars {
            assert!(request.with_parsed_body(Some(scalar)).unwrap_err().is_invalid_input());
        }
    }

    #[test]
    fn query_params() {
        let uri = Uri::parse("http://example.org/?a=1&list[]=x&list[]=y").unwrap();
        let request = ServerRequest::new(Request::get(uri));

        assert_eq!(request.query_params()["a"], "1");
        assert_eq!(request.query_params()["list"], json!(["x", "y"]));

        let mut params = Map::new();
        params.insert("b".into(), json!("2"));
        let overridden = request.with_query_params(params);
        assert_eq!(overridden.query_params().get("a"), None);
        assert_eq!(overridden.query_params()["b"], "2");
        assert_eq!(overridden.uri().query(), "a=1&list%5B%5D=x&list%5B%5D=y");

        let moved = request.with_uri(Uri::parse("http://example.org/?c=3").unwrap(), false);
        assert_eq!(moved.query_params()["c"], "3");
        assert_eq!(request.query_params().get("c"), None);

        let moved_explicit = overridden.with_uri(Uri::parse("http://example.org/?c=3").unwrap(), false);
        assert_eq!(moved_explicit.query_params()["b"], "2");
    }

    #[test]
    fn params_prefer_body() {
        let env = Environment::mock([
            ("REQUEST_METHOD", "POST"),
            ("REQUEST_URI", "/?id=query&page=1"),
            ("CONTENT_TYPE", "application/x-www-form-urlencoded"),
        ])
        .with_input("id=body");

        let request = ServerRequest::from_environment(&env).unwrap();
        assert_eq!(request.param("id").unwrap(), Some(json!("body")));
        assert_eq!(request.param("page").unwrap(), Some(json!("1")));
        assert_eq!(request.param("missing").unwrap(), None);
    }

    #[test]
    fn attributes() {
        let request = ServerRequest::new(Request::get(Uri::default()));

        let with = request
            .with_attribute("user_id", 42_u32)
            .with_attribute("role", String::from("admin"));

        assert_eq!(with.attribute::<u32>("user_id"), Some(&42));
        assert_eq!(with.attribute::<String>("role").map(String::as_str), Some("admin"));
        assert_eq!(with.attribute::<i64>("user_id"), None);
        assert_eq!(*with.attribute_or("missing", &7_u32), 7);
        assert_eq!(with.attributes().keys().collect::<Vec<_>>(), ["user_id", "role"]);

        let without = with.without_attribute("user_id");
        assert_eq!(without.attribute::<u32>("user_id"), None);
        assert_eq!(with.attribute::<u32>("user_id"), Some(&42));
        assert!(request.attributes().is_empty());
    }

    #[test]
    fn content_negotiation() {
        #[rustfmt::skip]
        let cases = [
            ("application/JSON; Charset=UTF-8", Some("application/json"), Some("UTF-8")),
            ("text/html, application/xml",      Some("text/html"),        None),
            ("text/plain; charset=\"latin1\"",  Some("text/plain"),       Some("latin1")),
            ("; charset=utf-8",                 None,                     Some("utf-8")),
        ];

        let base = ServerRequest::new(Request::get(Uri::default()));
        for (content_type, media_type, charset) in cases {
            let request = base.with_header("Content-Type", content_type).unwrap();
            assert_eq!(request.media_type().as_deref(), media_type, "{content_type}");
            assert_eq!(request.content_charset().as_deref(), charset, "{content_type}");
        }

        assert_eq!(base.media_type(), None);
        assert_eq!(base.content_length(), None);

        let request = base
            .with_header("Content-Length", "12")
            .unwrap()
            .with_header("X-Requested-With", "XMLHttpRequest")
            .unwrap();
        assert_eq!(request.content_length(), Some(12));
        assert!(request.is_xhr());
        assert!(!base.is_xhr());
    }

    #[test]
    fn uploaded_files_from_environment() {
        let env = Environment::mock([("REQUEST_METHOD", "POST")]).with_files(json!({
            "avatar": {"tmp_name": "/tmp/up1", "name": "me.png", "size": 10, "error": 0}
        }));

        let request = ServerRequest::from_environment(&env).unwrap();
        let avatar = request.uploaded_files()["avatar"].as_file().unwrap();
        assert_eq!(avatar.client_filename(), Some("me.png"));

        let cleared = request.with_uploaded_files(UploadedFiles::new());
        assert!(cleared.uploaded_files().is_empty());
        assert_eq!(request.uploaded_files().len(), 1);
    }

    #[test]
    fn cookie_header() {
        #[rustfmt::skip]
        let cases = [
            ("a=1",                        vec![("a", "1")]),
            ("a=1;b=2",                    vec![("a", "1"), ("b", "2")]),
            ("a=1;   b=2\r\n",             vec![("a", "1"), ("b", "2")]),
            ("token=x=y",                  vec![("token", "x=y")]),
            ("first=1; first=2",           vec![("first", "1")]),
            ("n%20ame=v%3Bal",             vec![("n ame", "v;al")]),
            ("flag; =empty-name",          vec![("", "empty-name")]),
            ("",                           vec![]),
        ];

        for (header, expected) in cases {
            let cookies = parse_cookie_header(header);
            let pairs: Vec<_> = cookies.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            assert_eq!(pairs, expected, "{header:?}");
        }
    }

    #[test]
    fn with_cookie_params() {
        let request = ServerRequest::new(Request::get(Uri::default()));
        let cookies: IndexMap<String, String> = [("k".to_owned(), "v".to_owned())].into_iter().collect();

        let with = request.with_cookie_params(cookies);
        assert_eq!(with.cookie_params()["k"], "v");
        assert!(request.cookie_params().is_empty());
    }
}
