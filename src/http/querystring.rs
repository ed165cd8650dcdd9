//! Query-string and form rendering with configurable separators.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Separator and assignment characters for a rendered query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryStringOptions {
    /// Parameter separator.
    pub sep: String,
    /// Key/value assignment operator.
    pub eq: String,
    /// Upper bound on parsed keys. Carried for the parse side only.
    pub max_keys: usize,
}

impl Default for QueryStringOptions {
    fn default() -> Self {
        Self {
            sep: "&".to_string(),
            eq: "=".to_string(),
            max_keys: 1000,
        }
    }
}

/// Everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped; a space is `%20`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn escape(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Scalar rendering for form values. Objects and null render empty.
fn primitive(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

impl QueryStringOptions {
    /// Render ordered pairs as `k{eq}v{sep}k{eq}v`, escaping keys and values.
    pub fn stringify_pairs<'a, I>(&self, pairs: I) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| format!("{}{}{}", escape(k), self.eq, escape(v)))
            .collect::<Vec<_>>()
            .join(&self.sep)
    }

    /// Render an object as a form body. Array values repeat their key.
    pub fn stringify_object(&self, object: &Map<String, Value>) -> String {
        let mut parts = Vec::with_capacity(object.len());
        for (key, value) in object {
            let key = escape(key);
            match value {
                Value::Array(items) => {
                    for item in items {
                        parts.push(format!("{}{}{}", key, self.eq, escape(&primitive(item))));
                    }
                }
                other => parts.push(format!("{}{}{}", key, self.eq, escape(&primitive(other)))),
            }
        }
        parts.join(&self.sep)
    }
}

/// Stringify a `qs` value for appending to search parameters:
/// objects and arrays become JSON, scalars their plain text.
pub fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => value.to_string(),
        other => other.to_string(),
    }
}
