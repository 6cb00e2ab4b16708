//! Media-type → body parser registry

use crate::{
    errors::{Error, Result},
    http::query::{Query, DEFAULT_DEPTH},
};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::{fmt, sync::Arc};

/// Decodes a raw body into structured data.
///
/// A parser should produce an object, an array or `null`; a scalar result is
/// rejected by [`ServerRequest::parsed_body`](crate::ServerRequest::parsed_body).
pub type BodyParser = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// Registry of body parsers keyed by lower-case media type.
///
/// The default registry understands `application/json`,
/// `application/x-www-form-urlencoded`, `application/xml` and `text/xml`.
/// A media type with a structured suffix such as `application/vnd.api+json`
/// falls back to the parser of `application/json` when it has none of its own.
#[derive(Clone)]
pub struct BodyParsers {
    parsers: IndexMap<String, BodyParser>,
}

impl Default for BodyParsers {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

impl fmt::Debug for BodyParsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.parsers.keys()).finish()
    }
}

impl BodyParsers {
    /// The built-in parsers; form keys nest at most `nesting_depth` levels.
    pub fn new(nesting_depth: usize) -> Self {
        let mut parsers = Self {
            parsers: IndexMap::new(),
        };

        parsers.register("application/json", parse_json);
        parsers.register("application/x-www-form-urlencoded", move |body: &str| {
            Ok(Value::Object(Query::parse_with_depth(body, nesting_depth)))
        });
        parsers.register("application/xml", |body: &str| parse_xml("application/xml", body));
        parsers.register("text/xml", |body: &str| parse_xml("text/xml", body));

        parsers
    }

    /// Registers (or replaces) the parser for `media_type`.
    pub fn register<F>(&mut self, media_type: &str, parser: F)
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.parsers
            .insert(media_type.trim().to_ascii_lowercase(), Arc::new(parser));
    }

    /// The parser for `media_type`, trying `+json` / `+xml` suffix fallbacks.
    pub fn get(&self, media_type: &str) -> Option<&BodyParser> {
        if let Some(parser) = self.parsers.get(media_type) {
            return Some(parser);
        }

        let (kind, subtype) = media_type.split_once('/')?;
        let (_, suffix) = subtype.rsplit_once('+')?;
        self.parsers.get(&format!("{kind}/{suffix}"))
    }

    #[inline]
    pub fn contains(&self, media_type: &str) -> bool {
        self.get(media_type).is_some()
    }
}

fn parse_json(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|err| Error::BodyParse {
        media_type: "application/json".to_owned(),
        message: err.to_string(),
    })
}

/// Parses an XML document into nested objects.
///
/// Elements with neither attributes nor child elements become strings;
/// others become objects holding `@attributes`, their children by tag name
/// (repeated tags form a list) and any direct text under `#text`. Documents
/// with a DTD are refused, so external entities are never resolved.
fn parse_xml(media_type: &str, body: &str) -> Result<Value> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: false,
        ..roxmltree::ParsingOptions::default()
    };

    let document = roxmltree::Document::parse_with_options(body, options).map_err(|err| {
        Error::BodyParse {
            media_type: media_type.to_owned(),
            message: err.to_string(),
        }
    })?;

    Ok(match element_to_value(document.root_element()) {
        Value::String(text) if text.is_empty() => Value::Object(Map::new()),
        Value::String(text) => {
            let mut root = Map::new();
            root.insert("#text".to_owned(), Value::String(text));
            Value::Object(root)
        }
        value => value,
    })
}

fn element_to_value(node: roxmltree::Node<'_, '_>) -> Value {
    let text: String = node
        .children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect::<String>()
        .trim()
        .to_owned();

    let has_children = node.children().any(|child| child.is_element());
    let has_attributes = node.attributes().next().is_some();
    if !has_children && !has_attributes {
        return Value::String(text);
    }

    let mut object = Map::new();

    if has_attributes {
        let attributes = node
            .attributes()
            .map(|attr| (attr.name().to_owned(), Value::String(attr.value().to_owned())))
            .collect();
        object.insert("@attributes".to_owned(), Value::Object(attributes));
    }

    for child in node.children().filter(|child| child.is_element()) {
        let name = child.tag_name().name().to_owned();
        let value = element_to_value(child);

        match object.get_mut(&name) {
            Some(Value::Array(list)) => list.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(name, value);
            }
        }
    }

    if !text.is_empty() {
        object.insert("#text".to_owned(), Value::String(text));
    }

    Value::Object(object)
}
