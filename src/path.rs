use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
    Key(String),
    /// A collection entry with no usable identity, by list position.
    Unkeyed(usize),
}

/// Location of a node inside a configuration tree.
///
/// Renders as `field.subfield`, `field[3]`, `field[key]` or, for an
/// unidentified collection entry, `field[#3]`; the root path renders as the
/// empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn field(&self, name: impl Into<String>) -> Self {
        self.child(Segment::Field(name.into()))
    }

    pub fn index(&self, i: usize) -> Self {
        self.child(Segment::Index(i))
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        self.child(Segment::Key(key.into()))
    }

    /// Parses the rendered form back into segments.
    ///
    /// Bracketed numbers become indices, `#` followed by a number an
    /// unidentified entry, and anything else in brackets a key. Keys
    /// containing `]` cannot be expressed.
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = input;

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let end = after.find(']').unwrap_or(after.len());
                let inner = &after[..end];
                let unkeyed = inner.strip_prefix('#').and_then(|n| n.parse::<usize>().ok());
                segments.push(match (inner.parse::<usize>(), unkeyed) {
                    (Ok(i), _) => Segment::Index(i),
                    (Err(_), Some(i)) => Segment::Unkeyed(i),
                    (Err(_), None) => Segment::Key(inner.to_string()),
                });
                rest = after.get(end + 1..).unwrap_or("");
            } else {
                let rest_trimmed = rest.strip_prefix('.').unwrap_or(rest);
                let end = rest_trimmed
                    .find(['.', '['])
                    .unwrap_or(rest_trimmed.len());
                let name = &rest_trimmed[..end];
                if !name.is_empty() {
                    segments.push(Segment::Field(name.to_string()));
                }
                rest = &rest_trimmed[end..];
            }
        }

        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => write!(f, "{name}")?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(idx) => write!(f, "[{idx}]")?,
                Segment::Key(key) => write!(f, "[{key}]")?,
                Segment::Unkeyed(idx) => write!(f, "[#{idx}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An ignore pattern: either a bare field name matched at any depth, or a
/// full path where `*` matches any single segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    AnyField(String),
    Exact(Vec<Option<Segment>>),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        if !pattern.contains(['.', '[']) {
            return PathPattern::AnyField(pattern.to_string());
        }

        let segments = Path::parse(pattern)
            .segments
            .into_iter()
            .map(|s| match s {
                Segment::Field(name) | Segment::Key(name) if name == "*" => None,
                other => Some(other),
            })
            .collect();
        PathPattern::Exact(segments)
    }

    pub fn matches(&self, path: &Path) -> bool {
        match self {
            PathPattern::AnyField(name) => {
                matches!(path.segments.last(), Some(Segment::Field(f)) if f == name)
            }
            PathPattern::Exact(pattern) => {
                pattern.len() == path.segments.len()
                    && pattern
                        .iter()
                        .zip(&path.segments)
                        .all(|(p, s)| p.as_ref().is_none_or(|p| segment_matches(p, s)))
            }
        }
    }
}

// Brackets in a pattern cannot tell a numeric key from an index.
fn segment_matches(pattern: &Segment, actual: &Segment) -> bool {
    match (pattern, actual) {
        (Segment::Index(p), Segment::Key(k)) => p.to_string() == *k,
        _ => pattern == actual,
    }
}
