//! Case-insensitive, order-preserving, multi-valued header collection

use indexmap::IndexMap;
use memchr::memchr;
use std::borrow::Cow;

/// CGI variables that carry request headers without the `HTTP_` prefix.
const SPECIAL: [&str; 6] = [
    "CONTENT_TYPE",
    "CONTENT_LENGTH",
    "PHP_AUTH_USER",
    "PHP_AUTH_PW",
    "PHP_AUTH_DIGEST",
    "AUTH_TYPE",
];

/// Values stored for one header, together with the name casing it was set with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub original_key: String,
    pub values: Vec<String>,
}

/// Header collection keyed by the *normalized* header name.
///
/// Normalization lower-cases the name, maps `_` to `-` and strips a leading
/// `http-`, so `Content-Type`, `content_type` and `HTTP_CONTENT_TYPE` all
/// address the same entry. The casing passed to the most recent
/// [`set`](HeaderCollection::set) / [`add`](HeaderCollection::add) is kept
/// for output. Distinct names enumerate in insertion order.
///
/// # Examples
/// ```
/// use maker_http::HeaderCollection;
///
/// let mut headers = HeaderCollection::new();
/// headers.set("Accept", "text/html");
/// headers.add("ACCEPT", "application/json");
///
/// assert!(headers.has("accept"));
/// assert_eq!(headers.get("Accept").unwrap(), ["text/html", "application/json"]);
/// assert_eq!(headers.original_key("accept"), Some("ACCEPT"));
/// assert_eq!(headers.to_header_lines(), ["ACCEPT: text/html; application/json"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderCollection {
    entries: IndexMap<String, HeaderRecord>,
}

impl HeaderCollection {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized lookup key of a header name.
    pub fn normalize_key(name: &str) -> String {
        let key: String = name
            .chars()
            .map(|c| match c {
                '_' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match key.strip_prefix("http-") {
            Some(stripped) => stripped.to_owned(),
            None => key,
        }
    }

    /// Stores `value` (one value or a list), replacing previous values.
    pub fn set<V: IntoHeaderValues>(&mut self, name: &str, value: V) {
        self.entries.insert(
            Self::normalize_key(name),
            HeaderRecord {
                original_key: name.to_owned(),
                values: value.into_header_values(),
            },
        );
    }

    /// Appends `value` to the current values, creating the header if absent.
    ///
    /// Duplicate values are kept, and the casing of `name` becomes the
    /// recorded original key.
    pub fn add<V: IntoHeaderValues>(&mut self, name: &str, value: V) {
        let mut values = self.get(name).map(<[String]>::to_vec).unwrap_or_default();
        values.extend(value.into_header_values());
        self.set(name, values);
    }

    /// Returns the stored values.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .get(&Self::normalize_key(name))
            .map(|record| record.values.as_slice())
    }

    /// Returns the stored values, or `default` when the header is absent.
    #[inline]
    pub fn get_or<'a>(&'a self, name: &str, default: &'a [String]) -> &'a [String] {
        self.get(name).unwrap_or(default)
    }

    /// Returns the first value.
    #[inline]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)?.first().map(String::as_str)
    }

    /// All values joined with `,`; empty when the header is absent.
    pub fn header_line(&self, name: &str) -> String {
        self.get(name).map(|values| values.join(",")).unwrap_or_default()
    }

    /// The name casing recorded by the last `set`/`add`.
    #[inline]
    pub fn original_key(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&Self::normalize_key(name))
            .map(|record| record.original_key.as_str())
    }

    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(&Self::normalize_key(name))
    }

    /// Removes a header, keeping the order of the remaining ones.
    #[inline]
    pub fn remove(&mut self, name: &str) -> Option<HeaderRecord> {
        self.entries.shift_remove(&Self::normalize_key(name))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(original key, values)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .values()
            .map(|record| (record.original_key.as_str(), record.values.as_slice()))
    }

    /// Original key → values, in insertion order.
    pub fn all(&self) -> IndexMap<String, Vec<String>> {
        self.entries
            .values()
            .map(|record| (record.original_key.clone(), record.values.clone()))
            .collect()
    }

    /// Renders `OriginalKey: v1; v2` lines in insertion order.
    pub fn to_header_lines(&self) -> Vec<String> {
        self.iter()
            .map(|(name, values)| format!("{name}: {}", values.join("; ")))
            .collect()
    }
}

// Parsing
impl HeaderCollection {
    /// Parses a raw header block such as the head of an HTTP response.
    ///
    /// Lines without a colon (the status line, blank lines) are skipped. A line
    /// starting with a space or tab continues the previous header and is folded
    /// into its last value with a single space. A repeated name accumulates
    /// values.
    ///
    /// # Examples
    /// ```
    /// use maker_http::HeaderCollection;
    ///
    /// let headers = HeaderCollection::parse_block(
    ///     "HTTP/1.1 200 OK\r\n\
    ///      Set-Cookie: a=1\r\n\
    ///      X-Long: first\r\n\
    ///      \t second\r\n\
    ///      set-cookie: b=2\r\n\r\n",
    /// );
    ///
    /// assert_eq!(headers.get("Set-Cookie").unwrap(), ["a=1", "b=2"]);
    /// assert_eq!(headers.first("x-long"), Some("first second"));
    /// ```
    pub fn parse_block(block: &str) -> Self {
        let mut headers = Self::new();
        let mut last: Option<String> = None;

        for line in block.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with([' ', '\t']) {
                match last.as_ref().and_then(|key| headers.entries.get_mut(key)) {
                    Some(record) => {
                        if let Some(value) = record.values.last_mut() {
                            value.push(' ');
                            value.push_str(line.trim());
                        }
                    }
                    None => tracing::warn!(line, "continuation line without a header"),
                }
                continue;
            }

            let Some(colon) = memchr(b':', line.as_bytes()) else {
                if !line.starts_with("HTTP/") {
                    tracing::warn!(line, "skipping header line without a colon");
                }
                continue;
            };

            let name = line[..colon].trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                tracing::warn!(line, "skipping header line with an invalid name");
                continue;
            }

            headers.add(name, line[colon + 1..].trim());
            last = Some(Self::normalize_key(name));
        }

        headers
    }

    /// Like [`parse_block`](Self::parse_block) for raw bytes. Invalid UTF-8 is
    /// replaced rather than rejected, since header values are often Latin-1.
    pub fn parse_block_bytes(block: &[u8]) -> Self {
        let text = match simdutf8::basic::from_utf8(block) {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => {
                tracing::debug!(len = block.len(), "header block is not UTF-8, decoding lossily");
                String::from_utf8_lossy(block)
            }
        };

        Self::parse_block(&text)
    }

    /// Collects the request headers present in CGI-style server variables.
    ///
    /// Keeps the `HTTP_*` variables (except `HTTP_CONTENT_LENGTH`, which
    /// duplicates `CONTENT_LENGTH`) and the special variables `CONTENT_TYPE`,
    /// `CONTENT_LENGTH`, `PHP_AUTH_USER`, `PHP_AUTH_PW`, `PHP_AUTH_DIGEST` and
    /// `AUTH_TYPE`. When `HTTP_AUTHORIZATION` is missing but a rewrite rule left
    /// `REDIRECT_HTTP_AUTHORIZATION`, the latter becomes `Authorization`.
    pub fn from_environment<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = Self::new();
        let mut redirect_authorization = None;

        for (key, value) in vars {
            let key = key.as_ref().to_ascii_uppercase();

            if key == "REDIRECT_HTTP_AUTHORIZATION" {
                redirect_authorization = Some(value.as_ref().to_owned());
            } else if key == "HTTP_CONTENT_LENGTH" {
                continue;
            } else if key.starts_with("HTTP_") || SPECIAL.contains(&key.as_str()) {
                headers.set(&key, value.as_ref());
            }
        }

        if let Some(authorization) = redirect_authorization {
            if !headers.has("Authorization") {
                headers.set("Authorization", authorization);
            }
        }

        headers
    }
}

impl<'a> IntoIterator for &'a HeaderCollection {
    type Item = (&'a str, &'a [String]);
    type IntoIter = Box<dyn Iterator<Item = Self::Item> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Values accepted by header setters: a single string or a list of strings.
pub trait IntoHeaderValues {
    fn into_header_values(self) -> Vec<String>;
}

impl IntoHeaderValues for &str {
    #[inline]
    fn into_header_values(self) -> Vec<String> {
        vec![self.to_owned()]
    }
}

impl IntoHeaderValues for String {
    #[inline]
    fn into_header_values(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoHeaderValues for &String {
    #[inline]
    fn into_header_values(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoHeaderValues for Vec<String> {
    #[inline]
    fn into_header_values(self) -> Vec<String> {
        self
    }
}

impl IntoHeaderValues for Vec<&str> {
    #[inline]
    fn into_header_values(self) -> Vec<String> {
        self.into_iter().map(str::to_owned).collect()
    }
}

impl IntoHeaderValues for &[String] {
    #[inline]
    fn into_header_values(self) -> Vec<String> {
        self.to_vec()
    }
}

impl IntoHeaderValues for &[&str] {
    #[inline]
    fn into_header_values(self) -> Vec<String> {
        self.iter().map(|value| (*value).to_owned()).collect()
    }
}

impl<const N: usize> IntoHeaderValues for [&str; N] {
    #[inline]
    fn into_header_values(self) -> Vec<String> {
        self.iter().map(|value| (*value).to_owned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_key() {
        #[rustfmt::skip]
        let cases = [
            ("Content-Type",      "content-type"),
            ("CONTENT_TYPE",      "content-type"),
            ("HTTP_ACCEPT",       "accept"),
            ("Http-X-Forwarded",  "x-forwarded"),
            ("X_HTTP_Thing",      "x-http-thing"),
            ("http",              "http"),
            ("",                  ""),
        ];

        for (name, expected) in cases {
            assert_eq!(HeaderCollection::normalize_key(name), expected);
        }
    }

    #[test]
    fn case_and_separator_insensitive() {
        let variants = ["X-Request-Id", "x-request-id", "X_REQUEST_ID", "HTTP_X_REQUEST_ID"];

        for set_as in variants {
            for lookup in variants {
                let mut headers = HeaderCollection::new();
                headers.set(set_as, "abc");

                assert!(headers.has(lookup));
                assert_eq!(headers.get(lookup).unwrap(), ["abc"]);
                assert_eq!(headers.original_key(lookup), Some(set_as));

                assert!(headers.remove(lookup).is_some());
                assert!(!headers.has(set_as));
            }
        }
    }

    #[test]
    fn set_add_get() {
        let mut headers = HeaderCollection::new();
        headers.set("Accept", "v1");
        headers.add("accept", "v2");
        headers.add("ACCEPT", ["v2", "v3"]);

        assert_eq!(headers.get("Accept").unwrap(), ["v1", "v2", "v2", "v3"]);
        assert_eq!(headers.original_key("accept"), Some("ACCEPT"));
        assert_eq!(headers.header_line("accept"), "v1,v2,v2,v3");

        headers.set("accept", vec!["only"]);
        assert_eq!(headers.get("Accept").unwrap(), ["only"]);

        headers.add("X-New", String::from("created"));
        assert_eq!(headers.first("x-new"), Some("created"));

        let default = vec!["fallback".to_owned()];
        assert_eq!(headers.get_or("Missing", &default), ["fallback"]);
        assert_eq!(headers.get("Missing"), None);
        assert_eq!(headers.header_line("Missing"), "");
    }

    #[test]
    fn insertion_order() {
        let mut headers = HeaderCollection::new();
        headers.set("Zeta", "1");
        headers.set("Alpha", "2");
        headers.set("Mid", "3");
        headers.set("zeta", "4"); // replaces in place
        headers.remove("alpha");
        headers.add("Beta", "5");

        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["zeta", "Mid", "Beta"]);

        let all = headers.all();
        assert_eq!(all.keys().collect::<Vec<_>>(), ["zeta", "Mid", "Beta"]);
        assert_eq!(all["zeta"], ["4"]);
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn header_lines() {
        let mut headers = HeaderCollection::new();
        headers.set("Content-Type", "application/json");
        headers.set("Accept", ["text/html", "application/json"]);

        assert_eq!(
            headers.to_header_lines(),
            [
                "Content-Type: application/json",
                "Accept: text/html; application/json",
            ]
        );
        assert!(HeaderCollection::new().to_header_lines().is_empty());
    }

    #[test]
    fn parse_block() {
        #[rustfmt::skip]
        let cases = [
            (
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\n",
                vec![("content-type", vec!["text/plain"]), ("content-length", vec!["5"])],
            ),
            (
                "X-Folded: part one\r\n   part two\r\n\tpart three\r\n",
                vec![("x-folded", vec!["part one part two part three"])],
            ),
            (
                "Set-Cookie: a=1\nSet-Cookie: b=2\n",
                vec![("set-cookie", vec!["a=1", "b=2"])],
            ),
            (
                "Location:   /next  \r\nEmpty:\r\n",
                vec![("location", vec!["/next"]), ("empty", vec![""])],
            ),
            (
                "Time: 12:30:00\r\n",
                vec![("time", vec!["12:30:00"])],
            ),
            (
                "garbage line\r\nBad Name: x\r\n: no-name\r\nOk: yes\r\n",
                vec![("ok", vec!["yes"])],
            ),
            (
                "  orphan continuation\r\n",
                vec![],
            ),
        ];

        for (block, expected) in cases {
            let headers = HeaderCollection::parse_block(block);
            assert_eq!(headers.len(), expected.len(), "{block:?}");

            for (name, values) in expected {
                assert_eq!(headers.get(name).unwrap(), values.as_slice(), "{block:?}");
            }
        }
    }

    #[test]
    fn parse_block_bytes() {
        let headers = HeaderCollection::parse_block_bytes(b"X-Name: caf\xe9\r\nX-Ok: yes\r\n");

        assert_eq!(headers.first("x-name"), Some("caf\u{FFFD}"));
        assert_eq!(headers.first("x-ok"), Some("yes"));
    }

    #[test]
    fn from_environment() {
        let vars = [
            ("HTTP_HOST", "example.org"),
            ("HTTP_ACCEPT", "text/html"),
            ("HTTP_CONTENT_LENGTH", "999"),
            ("CONTENT_LENGTH", "12"),
            ("CONTENT_TYPE", "application/json"),
            ("PHP_AUTH_USER", "alice"),
            ("REQUEST_METHOD", "GET"),
            ("SERVER_NAME", "localhost"),
            ("http_x_lower", "kept"),
        ];

        let headers = HeaderCollection::from_environment(vars);

        assert_eq!(headers.first("Host"), Some("example.org"));
        assert_eq!(headers.first("accept"), Some("text/html"));
        assert_eq!(headers.first("Content-Length"), Some("12"));
        assert_eq!(headers.first("content-type"), Some("application/json"));
        assert_eq!(headers.first("php-auth-user"), Some("alice"));
        assert_eq!(headers.first("x-lower"), Some("kept"));
        assert_eq!(headers.original_key("accept"), Some("HTTP_ACCEPT"));
        assert!(!headers.has("request-method"));
        assert!(!headers.has("server-name"));
        assert_eq!(headers.len(), 6);
    }

    #[test]
    fn from_environment_authorization() {
        let headers = HeaderCollection::from_environment([
            ("REDIRECT_HTTP_AUTHORIZATION", "Bearer abc"),
        ]);
        assert_eq!(headers.first("Authorization"), Some("Bearer abc"));

        let headers = HeaderCollection::from_environment([
            ("REDIRECT_HTTP_AUTHORIZATION", "Bearer old"),
            ("HTTP_AUTHORIZATION", "Bearer new"),
        ]);
        assert_eq!(headers.get("Authorization").unwrap(), ["Bearer new"]);
    }
}
