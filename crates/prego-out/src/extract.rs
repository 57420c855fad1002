//! Path selectors for the extraction formatter.
//!
//! A selector is a dotted path into the result document:
//!
//! - `res.items.0.name` walks object keys and array indices
//! - `res.items.#` yields the length of an array (last segment only)
//! - `res.a\.b` escapes a literal dot inside a key
//!
//! A path that does not resolve selects `null`.

use crate::FormatError;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Length,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    segments: Vec<Segment>,
}

impl Selector {
    pub fn select(&self, document: &Value) -> Value {
        let mut current = document;
        for segment in &self.segments {
            let next = match (segment, current) {
                (Segment::Length, Value::Array(items)) => return Value::from(items.len()),
                (Segment::Length, _) => None,
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Key(key), Value::Array(items)) => {
                    key.parse::<usize>().ok().and_then(|i| items.get(i))
                }
                (Segment::Key(_), _) => None,
            };
            match next {
                Some(value) => current = value,
                None => return Value::Null,
            }
        }
        current.clone()
    }
}

impl FromStr for Selector {
    type Err = FormatError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| FormatError::Selector {
            selector: raw.to_string(),
            reason: reason.to_string(),
        };
        if raw.is_empty() {
            return Err(invalid("selector is empty"));
        }

        let mut parts = Vec::new();
        let mut current = String::new();
        let mut escaped = false;
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(next) => {
                        current.push(next);
                        escaped = true;
                    }
                    None => return Err(invalid("dangling escape")),
                },
                '.' => {
                    parts.push((std::mem::take(&mut current), escaped));
                    escaped = false;
                }
                c => current.push(c),
            }
        }
        parts.push((current, escaped));

        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());
        for (i, (part, escaped)) in parts.into_iter().enumerate() {
            if part.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if part == "#" && !escaped {
                if i != last {
                    return Err(invalid("`#` is only allowed as the last segment"));
                }
                segments.push(Segment::Length);
            } else {
                segments.push(Segment::Key(part));
            }
        }

        Ok(Self { segments })
    }
}
