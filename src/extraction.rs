//! Source path resolution.
//!
//! Attributes name where their raw value lives in a source record with a
//! dotted path such as `profile.age` or `items.0.name`. This module parses those
//! paths and walks them through nested records, entities and lists.

use std::fmt;

use crate::value::FieldValue;

/// Represents a path to a field in a source record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// The raw path string
    pub raw: String,
    /// Parsed path segments
    pub segments: Vec<PathSegment>,
}

/// A segment in a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A named key (e.g., "user", "name", or "0" which also indexes lists)
    Key(String),
    /// A bracketed list index (e.g., [0], [5])
    Index(usize),
}

impl FieldPath {
    /// Parse a field path with a given delimiter
    ///
    /// # Example
    ///
    /// ```
    /// use modelmap::FieldPath;
    ///
    /// let path = FieldPath::parse("user.address.city", ".");
    /// assert_eq!(path.segments.len(), 3);
    /// ```
    pub fn parse(path: &str, delimiter: &str) -> Self {
        let segments = path
            .split(delimiter)
            .map(|s| {
                if s.starts_with('[') && s.ends_with(']') && s.len() > 2 {
                    if let Ok(index) = s[1..s.len() - 1].parse::<usize>() {
                        return PathSegment::Index(index);
                    }
                }
                PathSegment::Key(s.to_string())
            })
            .collect();

        Self {
            raw: path.to_string(),
            segments,
        }
    }

    /// Create a field path from a dotted string (common format)
    pub fn from_dotted(path: &str) -> Self {
        Self::parse(path, ".")
    }

    /// Walk this path through `source`.
    ///
    /// Returns `None` ("undefined") as soon as a step is missing or a falsy
    /// intermediate value is reached.
    pub fn resolve<'a>(&self, source: &'a FieldValue) -> Option<&'a FieldValue> {
        let mut current = source;
        for segment in &self.segments {
            if !current.is_truthy() {
                return None;
            }
            current = step(current, segment)?;
        }
        Some(current)
    }
}

fn step<'a>(value: &'a FieldValue, segment: &PathSegment) -> Option<&'a FieldValue> {
    match (value, segment) {
        (FieldValue::List(items), PathSegment::Index(index)) => items.get(*index),
        (FieldValue::List(items), PathSegment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        (_, PathSegment::Key(key)) => value.own_fields()?.get(key),
        (_, PathSegment::Index(index)) => value.own_fields()?.get(&index.to_string()),
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Trait for values that can be queried by field path
pub trait Extractor {
    /// Extract a value at the given field path
    ///
    /// Returns `Some(value)` if the path exists, `None` otherwise
    fn extract(&self, path: &FieldPath) -> Option<&FieldValue>;

    /// Try candidate paths in order and return the first defined value.
    fn extract_first<'p, I>(&self, candidates: I) -> Option<&FieldValue>
    where
        I: IntoIterator<Item = &'p FieldPath>,
    {
        candidates.into_iter().find_map(|path| self.extract(path))
    }
}

impl Extractor for FieldValue {
    fn extract(&self, path: &FieldPath) -> Option<&FieldValue> {
        path.resolve(self)
    }
}
