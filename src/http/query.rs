//! Query string and `application/x-www-form-urlencoded` decoding.
//!
//! Keys follow the bracket convention used by HTML forms: `a[b][c]=1` builds
//! nested objects and `a[]=1&a[]=2` builds a list. Decoded data is returned as
//! a [`serde_json::Map`] so query params and parsed bodies share one
//! representation.

use memchr::memchr;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

/// Default maximum bracket depth, see [`InputLimits`](crate::limits::InputLimits).
pub const DEFAULT_DEPTH: usize = 32;

/// Query string / form body decoder.
///
/// # Examples
/// ```rust
/// use maker_http::query::Query;
/// use serde_json::json;
///
/// let params = Query::parse("name=John+Doe&tags[]=a&tags[]=b&user[address][city]=Paris");
///
/// assert_eq!(params["name"], "John Doe");
/// assert_eq!(params["tags"], json!(["a", "b"]));
/// assert_eq!(params["user"], json!({"address": {"city": "Paris"}}));
/// ```
/// All possible pair formats:
/// ```rust
/// use maker_http::query::Query;
///
/// let pairs = Query::pairs("?debug&name=&=Qwe&key=sda&&");
///
/// assert_eq!(pairs.len(), 3); // empty names are dropped
/// assert_eq!(pairs[0], ("debug".to_owned(), "".to_owned()));
/// assert_eq!(pairs[1], ("name".to_owned(), "".to_owned()));
/// assert_eq!(pairs[2], ("key".to_owned(), "sda".to_owned()));
/// ```
pub struct Query;

impl Query {
    /// Decodes `query` into nested params with the default depth limit.
    #[inline]
    pub fn parse(query: &str) -> Map<String, Value> {
        Self::parse_with_depth(query, DEFAULT_DEPTH)
    }

    /// Decodes `query` into nested params.
    ///
    /// Bracket segments beyond `depth` are not nested further; their text is
    /// kept as part of the deepest key. A repeated plain key keeps the last
    /// value.
    pub fn parse_with_depth(query: &str, depth: usize) -> Map<String, Value> {
        let mut params = Map::new();

        for (key, value) in Self::pairs(query) {
            let (name, segments) = split_key(&key, depth);
            let slot = params.entry(name).or_insert(Value::Null);
            assign(slot, &segments, value);
        }

        params
    }

    /// Splits `query` on `&` and `=` and decodes both halves, in order.
    ///
    /// A leading `?` is ignored. A pair without `=` gets an empty value; pairs
    /// whose name is empty are dropped.
    pub fn pairs(query: &str) -> Vec<(String, String)> {
        let data = query.strip_prefix('?').unwrap_or(query);
        let bytes = data.as_bytes();
        let mut result = Vec::new();

        let mut start = 0;
        while start < bytes.len() {
            let end = memchr(b'&', &bytes[start..])
                .map(|pos| start + pos)
                .unwrap_or(bytes.len());

            let pair = &data[start..end];
            let (key, value) = match memchr(b'=', pair.as_bytes()) {
                Some(eq) => (&pair[..eq], &pair[eq + 1..]),
                None => (pair, ""),
            };

            if !key.is_empty() {
                result.push((Self::decode(key), Self::decode(value)));
            }
            start = end + 1;
        }

        result
    }

    /// Form-decodes one component: `+` becomes a space, then `%XX` escapes are
    /// resolved. Invalid UTF-8 is replaced.
    pub fn decode(component: &str) -> String {
        let spaced = component.replace('+', " ");
        percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// `[]`
    Push,
    /// `[name]`
    Key(String),
}

/// Splits `a[b][]` into `a` and its bracket segments.
///
/// A key whose brackets do not close is taken literally. Text after the last
/// closing bracket that does not open another segment is ignored.
fn split_key(key: &str, depth: usize) -> (String, Vec<Segment>) {
    let bytes = key.as_bytes();
    let Some(open) = memchr(b'[', bytes).filter(|&open| open > 0) else {
        return (key.to_owned(), Vec::new());
    };

    let mut segments = Vec::new();
    let mut raw = Vec::new();
    let mut pos = open;

    while bytes.get(pos) == Some(&b'[') {
        let Some(close) = memchr(b']', &bytes[pos..]).map(|close| pos + close) else {
            return (key.to_owned(), Vec::new());
        };

        raw.push(&key[pos..=close]);
        segments.push(match &key[pos + 1..close] {
            "" => Segment::Push,
            name => Segment::Key(name.to_owned()),
        });
        pos = close + 1;
    }

    if segments.len() > depth {
        let keep = depth.saturating_sub(1);
        let flat = match depth {
            0 => format!("{}{}", &key[..open], raw.concat()),
            _ => {
                let deepest = match &segments[keep] {
                    Segment::Push => String::new(),
                    Segment::Key(name) => name.clone(),
                };
                format!("{deepest}{}", raw[keep + 1..].concat())
            }
        };

        if depth == 0 {
            return (flat, Vec::new());
        }
        segments.truncate(keep);
        segments.push(Segment::Key(flat));
    }

    (key[..open].to_owned(), segments)
}

/// Stores `value` at `path` below `slot`, creating containers on the way.
fn assign(slot: &mut Value, path: &[Segment], value: String) {
    let Some((segment, rest)) = path.split_first() else {
        *slot = Value::String(value);
        return;
    };

    match (segment, &mut *slot) {
        (Segment::Push, Value::Array(list)) => {
            list.push(Value::Null);
            if let Some(last) = list.last_mut() {
                assign(last, rest, value);
            }
        }
        (Segment::Push, Value::Object(map)) => {
            let index = next_index(map);
            let entry = map.entry(index.to_string()).or_insert(Value::Null);
            assign(entry, rest, value);
        }
        (Segment::Key(name), Value::Object(map)) => {
            let entry = map.entry(name.clone()).or_insert(Value::Null);
            assign(entry, rest, value);
        }
        (Segment::Key(_), Value::Array(list)) => {
            let map = std::mem::take(list)
                .into_iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect();
            *slot = Value::Object(map);
            assign(slot, path, value);
        }
        (Segment::Push, _) => {
            *slot = Value::Array(Vec::new());
            assign(slot, path, value);
        }
        (Segment::Key(_), _) => {
            *slot = Value::Object(Map::new());
            assign(slot, path, value);
        }
    }
}

/// Next free integer key of an object that started life as a list.
fn next_index(map: &Map<String, Value>) -> usize {
    map.keys()
        .filter_map(|key| key.parse::<usize>().ok())
        .max()
        .map_or(0, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn basic() {
        let cases = ["a=1&b=2", "?a=1&b=2"];

        for line in cases {
            let params = Query::parse(line);

            assert_eq!(params.len(), 2);
            assert_eq!(params["a"], "1");
            assert_eq!(params["b"], "2");
        }
    }

    #[test]
    fn pairs() {
        let pairs = Query::pairs("flag&empty=&=val&&key=value&eq=a=b");

        #[rustfmt::skip]
        let expected = [
            ("flag",  ""),
            ("empty", ""),
            ("key",   "value"),
            ("eq",    "a=b"),
        ];

        assert_eq!(pairs.len(), expected.len());
        for ((key, value), (ekey, evalue)) in pairs.iter().zip(expected) {
            assert_eq!((key.as_str(), value.as_str()), (ekey, evalue));
        }

        assert!(Query::pairs("").is_empty());
        assert!(Query::pairs("?").is_empty());
    }

    #[test]
    fn decode() {
        #[rustfmt::skip]
        let cases = [
            ("plain",             "plain"),
            ("a+b",               "a b"),
            ("user%40example.com", "user@example.com"),
            ("%2B",               "+"),
            ("caf%C3%A9",         "café"),
            ("100%",              "100%"),
            ("%zz",               "%zz"),
            ("%FF",               "\u{FFFD}"),
        ];

        for (raw, expected) in cases {
            assert_eq!(Query::decode(raw), expected, "{raw}");
        }
    }

    #[test]
    fn nested() {
        #[rustfmt::skip]
        let cases = [
            ("a[]=1&a[]=2",                 json!({"a": ["1", "2"]})),
            ("a[x]=1&a[y]=2",               json!({"a": {"x": "1", "y": "2"}})),
            ("a[x][y][z]=deep",             json!({"a": {"x": {"y": {"z": "deep"}}}})),
            ("a[]=1&a[k]=2&a[]=3",          json!({"a": {"0": "1", "k": "2", "1": "3"}})),
            ("list[][id]=1&list[][id]=2",   json!({"list": [{"id": "1"}, {"id": "2"}]})),
            ("a=1&a[x]=2",                  json!({"a": {"x": "2"}})),
            ("a[x]=1&a=2",                  json!({"a": "2"})),
            ("a=1&a=2",                     json!({"a": "2"})),
            ("a[b=1",                       json!({"a[b": "1"})),
            ("[x]=1&b=2",                   json!({"[x]": "1", "b": "2"})),
            ("a[x]tail=1",                  json!({"a": {"x": "1"}})),
            ("a%5Bx%5D=1",                  json!({"a": {"x": "1"}})),
        ];

        for (query, expected) in cases {
            assert_eq!(Value::Object(Query::parse(query)), expected, "{query}");
        }
    }

    #[test]
    fn depth_limit() {
        #[rustfmt::skip]
        let cases = [
            (0, "a[b][c]=1", json!({"a[b][c]": "1"})),
            (1, "a[b][c]=1", json!({"a": {"b[c]": "1"}})),
            (2, "a[b][c]=1", json!({"a": {"b": {"c": "1"}}})),
            (2, "a[b][c][d]=1", json!({"a": {"b": {"c[d]": "1"}}})),
        ];

        for (depth, query, expected) in cases {
            assert_eq!(
                Value::Object(Query::parse_with_depth(query, depth)),
                expected,
                "{depth} {query}"
            );
        }
    }
}
