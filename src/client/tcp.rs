//! Blocking HTTP/1.1 transport over plain TCP

use crate::{
    client::{
        cookie_jar::CookieJar,
        transport::{
            Transport, TransportError, TransportErrorCode as Code, TransportRequest,
            TransportResult,
        },
    },
    http::{headers::HeaderCollection, uri::Uri},
    limits::TransportLimits,
    Method, Scheme,
};
use memchr::memmem;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::{Duration, Instant},
};

type Attempt<T> = std::result::Result<T, TransportError>;

/// Redirects followed when a request does not set its own limit.
pub const DEFAULT_MAX_REDIRECTS: u32 = 20;

const HEAD_END: &[u8] = b"\r\n\r\n";

/// The default [`Transport`]: one connection per request, `http` only.
///
/// Each execution works on a copy of the transport's [`TransportLimits`];
/// a request-level timeout caps the copy's timeouts and bounds the whole
/// execution, redirects included.
///
/// # Examples
/// ```no_run
/// use maker_http::{ClientRequest, TcpTransport};
///
/// let transport = TcpTransport::default();
/// let response = ClientRequest::get("http://127.0.0.1:8080/health")
///     .unwrap()
///     .send_with(&transport)
///     .unwrap();
///
/// assert_eq!(response.status(), 200);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    limits: TransportLimits,
}

impl TcpTransport {
    #[inline]
    pub fn new(limits: TransportLimits) -> Self {
        Self { limits }
    }

    #[inline]
    pub fn limits(&self) -> &TransportLimits {
        &self.limits
    }
}

impl Transport for TcpTransport {
    fn execute(&self, request: TransportRequest) -> TransportResult {
        let started = Instant::now();
        let options = &request.options;

        let mut limits = self.limits.clone();
        if let Some(timeout) = options.timeout {
            limits.connect_timeout = limits.connect_timeout.min(timeout);
            limits.io_timeout = limits.io_timeout.min(timeout);
        }
        let deadline = options.timeout.map(|timeout| started + timeout);

        let mut jar = options.cookie_file.as_deref().map(CookieJar::load);
        let max_redirects = options.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS);

        let mut exchange = Exchange {
            method: request.method,
            url: request.url.clone(),
            header_lines: request.header_lines.clone(),
            body: request.body.clone(),
        };
        let mut redirects = 0;

        tracing::debug!(method = %exchange.method, url = %exchange.url, "executing request");

        let outcome = loop {
            let attempt = Target::parse(&exchange.url).and_then(|target| {
                let response = round_trip(&target, &exchange, &request, jar.as_ref(), &limits, deadline)?;
                Ok((target, response))
            });

            let (target, response) = match attempt {
                Ok(done) => done,
                Err(err) => break Err(err),
            };

            if let Some(jar) = jar.as_mut() {
                for value in response.headers.get_or("set-cookie", &[]) {
                    jar.store(value, &target.host, target.path());
                }
            }

            let location = response.headers.first("location").filter(|_| {
                options.follow_redirects && matches!(response.status, 301 | 302 | 303 | 307 | 308)
            });
            let Some(location) = location else {
                break Ok(response);
            };

            if redirects >= max_redirects {
                break Err(TransportError::new(
                    Code::TooManyRedirects,
                    format!("maximum ({max_redirects}) redirects followed"),
                ));
            }
            redirects += 1;

            let next = target.resolve(location);
            tracing::debug!(status = response.status, from = %exchange.url, to = %next, "following redirect");

            if response.status == 303
                || (matches!(response.status, 301 | 302) && exchange.method == Method::Post)
            {
                exchange.switch_to_get();
            }
            let same_origin = Target::parse(&next)
                .is_ok_and(|to| to.host == target.host && to.port == target.port);
            if !same_origin {
                exchange.leave_origin();
            }
            exchange.url = next;
        };

        if let (Some(jar), Some(path)) = (jar.as_ref(), options.cookie_file.as_deref()) {
            if let Err(err) = jar.save(path) {
                tracing::warn!(path = %path.display(), %err, "cannot write cookie file");
            }
        }

        let mut result = match outcome {
            Ok(response) => {
                let mut result = TransportResult {
                    status_code: Some(response.status),
                    header_size: response.head.len(),
                    ..TransportResult::default()
                };
                result.info.insert("http_code".into(), response.status.to_string());
                result.info.insert("size_download".into(), response.body.len().to_string());
                if let Some(content_type) = response.headers.first("content-type") {
                    result.info.insert("content_type".into(), content_type.to_owned());
                }

                result.response = response.head;
                result.response.extend_from_slice(&response.body);
                result
            }
            Err(err) => {
                tracing::debug!(url = %exchange.url, code = %err.code, message = %err.message, "request failed");
                TransportResult {
                    error: err,
                    ..TransportResult::default()
                }
            }
        };

        let info = &mut result.info;
        info.insert("url".into(), exchange.url);
        info.insert("header_size".into(), result.header_size.to_string());
        info.insert("redirect_count".into(), redirects.to_string());
        info.insert(
            "total_time".into(),
            format!("{:.6}", started.elapsed().as_secs_f64()),
        );

        result
    }
}

/// Mutable part of a request that redirects may rewrite.
struct Exchange {
    method: Method,
    url: String,
    header_lines: Vec<String>,
    body: Vec<u8>,
}

impl Exchange {
    fn switch_to_get(&mut self) {
        self.method = Method::Get;
        self.body.clear();
        self.drop_headers(&["content-length", "content-type"]);
    }

    /// Drops the headers bound to the previous origin before a cross-origin
    /// redirect; `Host` is then derived from the new target.
    fn leave_origin(&mut self) {
        self.drop_headers(&["host", "authorization", "cookie"]);
    }

    fn drop_headers(&mut self, names: &[&str]) {
        self.header_lines.retain(|line| {
            let name = line.split(':').next().unwrap_or("").trim();
            !names.iter().any(|drop| name.eq_ignore_ascii_case(drop))
        });
    }
}

/// Where to connect and what to ask for.
#[derive(Debug)]
struct Target {
    uri: Uri,
    host: String,
    port: u16,
}

impl Target {
    fn parse(url: &str) -> Attempt<Self> {
        let uri = Uri::parse(url)
            .map_err(|err| TransportError::new(Code::UrlMalformat, err.to_string()))?;

        match uri.scheme_kind() {
            Scheme::Http => {}
            Scheme::Https => {
                return Err(TransportError::new(
                    Code::UnsupportedProtocol,
                    "https is not supported by the TCP transport",
                ))
            }
            Scheme::None => {
                return Err(TransportError::new(
                    Code::UrlMalformat,
                    format!("URL `{url}` has no scheme"),
                ))
            }
        }

        let host = uri
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_owned();
        if host.is_empty() {
            return Err(TransportError::new(
                Code::UrlMalformat,
                format!("URL `{url}` has no host"),
            ));
        }

        let port = uri.effective_port().unwrap_or(80);
        Ok(Self { uri, host, port })
    }

    #[inline]
    fn path(&self) -> &str {
        match self.uri.path() {
            "" => "/",
            path => path,
        }
    }

    /// Origin-form request-target.
    fn origin_form(&self) -> String {
        match self.uri.query() {
            "" => self.path().to_owned(),
            query => format!("{}?{query}", self.path()),
        }
    }

    fn host_header(&self) -> String {
        match self.uri.port() {
            Some(port) => format!("{}:{port}", self.uri.host()),
            None => self.uri.host().to_owned(),
        }
    }

    /// Resolves a `Location` value against this target.
    fn resolve(&self, location: &str) -> String {
        if Uri::parse(location).is_ok_and(|uri| uri.scheme_kind() != Scheme::None) {
            return location.to_owned();
        }

        let origin = format!("http://{}", self.host_header());
        if let Some(rest) = location.strip_prefix("//") {
            return format!("http://{rest}");
        }
        if location.starts_with('/') {
            return format!("{origin}{location}");
        }

        let path = self.path();
        let dir = &path[..path.rfind('/').map_or(0, |slash| slash + 1)];
        format!("{origin}{dir}{location}")
    }
}

/// A parsed final response.
struct RawResponse {
    status: u16,
    head: Vec<u8>,
    headers: HeaderCollection,
    body: Vec<u8>,
}

fn round_trip(
    target: &Target,
    exchange: &Exchange,
    request: &TransportRequest,
    jar: Option<&CookieJar>,
    limits: &TransportLimits,
    deadline: Option<Instant>,
) -> Attempt<RawResponse> {
    let stream = connect(target, limits, deadline)?;
    let mut conn = Connection {
        stream,
        buffer: Vec::with_capacity(limits.read_chunk),
        pos: 0,
        limits,
        deadline,
    };

    let cookies = jar.and_then(|jar| jar.header_for(&target.host, target.path(), false));
    let head = request_head(target, exchange, request, cookies.as_deref());
    conn.send(&head)?;
    conn.send(&exchange.body)?;

    loop {
        let head = conn.read_head()?;
        let status = parse_status(&head)?;
        let headers = HeaderCollection::parse_block_bytes(&head);

        if (100..200).contains(&status) && status != 101 {
            tracing::trace!(status, "skipping interim response");
            continue;
        }

        let no_body = request.options.no_body
            || exchange.method == Method::Head
            || matches!(status, 101 | 204 | 304);

        let body = if no_body {
            Vec::new()
        } else if headers
            .header_line("transfer-encoding")
            .to_ascii_lowercase()
            .contains("chunked")
        {
            conn.read_chunked()?
        } else if let Some(length) = headers.first("content-length") {
            let length = length.trim().parse::<usize>().map_err(|_| {
                TransportError::new(Code::RecvError, format!("invalid Content-Length `{length}`"))
            })?;
            conn.read_sized(length)?
        } else {
            conn.read_to_close()?
        };

        return Ok(RawResponse {
            status,
            head,
            headers,
            body,
        });
    }
}

fn connect(target: &Target, limits: &TransportLimits, deadline: Option<Instant>) -> Attempt<TcpStream> {
    let addrs: Vec<SocketAddr> = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|err| {
            TransportError::new(
                Code::CouldntResolveHost,
                format!("cannot resolve `{}`: {err}", target.host),
            )
        })?
        .collect();

    if addrs.is_empty() {
        return Err(TransportError::new(
            Code::CouldntResolveHost,
            format!("no address for `{}`", target.host),
        ));
    }

    let mut last_err = None;
    for addr in addrs {
        let timeout = remaining(deadline)?.map_or(limits.connect_timeout, |left| {
            left.min(limits.connect_timeout)
        });

        let attempt = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .and_then(|socket| {
                socket.connect_timeout(&SockAddr::from(addr), timeout)?;
                Ok(socket)
            });

        match attempt {
            Ok(socket) => {
                let stream = TcpStream::from(socket);
                stream
                    .set_nodelay(true)
                    .map_err(|err| TransportError::new(Code::CouldntConnect, err.to_string()))?;
                return Ok(stream);
            }
            Err(err) => {
                tracing::trace!(%addr, %err, "connect attempt failed");
                last_err = Some((addr, err));
            }
        }
    }

    Err(match last_err {
        Some((addr, err)) if is_timeout(&err) => {
            TransportError::new(Code::OperationTimedout, format!("connecting to {addr} timed out"))
        }
        Some((addr, err)) => {
            TransportError::new(Code::CouldntConnect, format!("cannot connect to {addr}: {err}"))
        }
        None => TransportError::new(Code::CouldntConnect, "no address to connect to"),
    })
}

fn request_head(
    target: &Target,
    exchange: &Exchange,
    request: &TransportRequest,
    cookies: Option<&str>,
) -> Vec<u8> {
    let has = |name: &str| {
        exchange.header_lines.iter().any(|line| {
            line.split(':')
                .next()
                .is_some_and(|key| key.trim().eq_ignore_ascii_case(name))
        })
    };

    let mut head = format!(
        "{} {} HTTP/1.1\r\n",
        exchange.method,
        target.origin_form()
    );

    if !has("host") {
        head.push_str(&format!("Host: {}\r\n", target.host_header()));
    }
    if let Some(agent) = request.options.user_agent.as_deref().filter(|_| !has("user-agent")) {
        head.push_str(&format!("User-Agent: {agent}\r\n"));
    }
    if let Some(referer) = request.options.referer.as_deref().filter(|_| !has("referer")) {
        head.push_str(&format!("Referer: {referer}\r\n"));
    }
    if let Some(cookies) = cookies.filter(|_| !has("cookie")) {
        head.push_str(&format!("Cookie: {cookies}\r\n"));
    }

    for line in &exchange.header_lines {
        head.push_str(line);
        head.push_str("\r\n");
    }

    let sends_body = !exchange.body.is_empty()
        || matches!(exchange.method, Method::Post | Method::Put | Method::Patch);
    if sends_body && !has("content-length") {
        head.push_str(&format!("Content-Length: {}\r\n", exchange.body.len()));
    }
    if !has("connection") {
        head.push_str("Connection: close\r\n");
    }

    head.push_str("\r\n");
    head.into_bytes()
}

fn parse_status(head: &[u8]) -> Attempt<u16> {
    let line_end = memchr::memchr(b'\n', head).unwrap_or(head.len());
    let line = String::from_utf8_lossy(&head[..line_end]);
    let mut parts = line.split_whitespace();

    match (parts.next(), parts.next().and_then(|code| code.parse::<u16>().ok())) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => Ok(code),
        _ => Err(TransportError::new(
            Code::RecvError,
            format!("malformed status line `{}`", line.trim()),
        )),
    }
}

/// A connection with a read-ahead buffer.
struct Connection<'a> {
    stream: TcpStream,
    buffer: Vec<u8>,
    pos: usize,
    limits: &'a TransportLimits,
    deadline: Option<Instant>,
}

impl Connection<'_> {
    fn io_timeout(&self) -> Attempt<Duration> {
        Ok(remaining(self.deadline)?.map_or(self.limits.io_timeout, |left| {
            left.min(self.limits.io_timeout)
        }))
    }

    fn send(&mut self, bytes: &[u8]) -> Attempt<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let timeout = self.io_timeout()?;
        self.stream
            .set_write_timeout(Some(timeout))
            .and_then(|_| self.stream.write_all(bytes))
            .and_then(|_| self.stream.flush())
            .map_err(|err| io_failure(err, Code::SendError, "sending request"))
    }

    /// Reads one more chunk; `0` means the peer closed the connection.
    fn fill(&mut self) -> Attempt<usize> {
        if self.pos > 0 && self.pos == self.buffer.len() {
            self.buffer.clear();
            self.pos = 0;
        }

        let timeout = self.io_timeout()?;
        let start = self.buffer.len();
        self.buffer.resize(start + self.limits.read_chunk.max(1), 0);

        let read = self
            .stream
            .set_read_timeout(Some(timeout))
            .and_then(|_| self.stream.read(&mut self.buffer[start..]));
        match read {
            Ok(n) => {
                self.buffer.truncate(start + n);
                Ok(n)
            }
            Err(err) => {
                self.buffer.truncate(start);
                Err(io_failure(err, Code::RecvError, "receiving response"))
            }
        }
    }

    #[inline]
    fn pending(&self) -> &[u8] {
        &self.buffer[self.pos..]
    }

    fn take(&mut self, len: usize) -> Vec<u8> {
        let bytes = self.buffer[self.pos..self.pos + len].to_vec();
        self.pos += len;
        bytes
    }

    fn read_head(&mut self) -> Attempt<Vec<u8>> {
        let max = self.limits.max_header_size;
        let finder = memmem::Finder::new(HEAD_END);

        loop {
            if let Some(end) = finder.find(self.pending()) {
                let len = end + HEAD_END.len();
                if len > max {
                    break;
                }
                return Ok(self.take(len));
            }
            if self.pending().len() > max {
                break;
            }
            if self.fill()? == 0 {
                return Err(TransportError::new(
                    Code::RecvError,
                    "connection closed before the response head was complete",
                ));
            }
        }

        Err(TransportError::new(
            Code::RecvError,
            format!("response head exceeds {max} bytes"),
        ))
    }

    fn read_line(&mut self) -> Attempt<String> {
        loop {
            if let Some(end) = memchr::memchr(b'\n', self.pending()) {
                let line = self.take(end + 1);
                return Ok(String::from_utf8_lossy(&line).trim().to_owned());
            }
            if self.pending().len() > self.limits.max_header_size {
                return Err(TransportError::new(Code::RecvError, "chunk line too long"));
            }
            if self.fill()? == 0 {
                return Err(TransportError::new(
                    Code::RecvError,
                    "connection closed inside a chunked body",
                ));
            }
        }
    }

    fn check_size(&self, len: usize) -> Attempt<()> {
        match len > self.limits.max_body_size {
            true => Err(TransportError::new(
                Code::FilesizeExceeded,
                format!("response body exceeds {} bytes", self.limits.max_body_size),
            )),
            false => Ok(()),
        }
    }

    fn read_sized(&mut self, len: usize) -> Attempt<Vec<u8>> {
        self.check_size(len)?;

        while self.pending().len() < len {
            if self.fill()? == 0 {
                return Err(TransportError::new(
                    Code::RecvError,
                    format!(
                        "connection closed after {} of {len} body bytes",
                        self.pending().len()
                    ),
                ));
            }
        }

        Ok(self.take(len))
    }

    fn read_chunked(&mut self) -> Attempt<Vec<u8>> {
        let mut body = Vec::new();

        loop {
            let line = self.read_line()?;
            let size = line.split(';').next().unwrap_or("").trim();
            let size = usize::from_str_radix(size, 16).map_err(|_| {
                TransportError::new(Code::RecvError, format!("invalid chunk size `{line}`"))
            })?;

            if size == 0 {
                // Trailers are read and dropped.
                while !self.read_line()?.is_empty() {}
                return Ok(body);
            }

            self.check_size(body.len().saturating_add(size))?;
            let chunk = self.read_sized(size)?;
            body.extend_from_slice(&chunk);

            if !self.read_line()?.is_empty() {
                return Err(TransportError::new(Code::RecvError, "chunk not followed by CRLF"));
            }
        }
    }

    fn read_to_close(&mut self) -> Attempt<Vec<u8>> {
        while self.fill()? != 0 {
            self.check_size(self.pending().len())?;
        }

        let len = self.pending().len();
        Ok(self.take(len))
    }
}

/// Time left before `deadline`; an expired deadline is a timeout.
fn remaining(deadline: Option<Instant>) -> Attempt<Option<Duration>> {
    let Some(deadline) = deadline else {
        return Ok(None);
    };

    match deadline.checked_duration_since(Instant::now()) {
        Some(left) if !left.is_zero() => Ok(Some(left)),
        _ => Err(TransportError::new(Code::OperationTimedout, "request timed out")),
    }
}

#[inline]
fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn io_failure(err: io::Error, code: Code, doing: &str) -> TransportError {
    match is_timeout(&err) {
        true => TransportError::new(Code::OperationTimedout, format!("{doing} timed out")),
        false => TransportError::new(code, format!("{doing}: {err}")),
    }
}
