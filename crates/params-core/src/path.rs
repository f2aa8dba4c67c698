//! # Field Paths
//!
//! A [`FieldPath`] names the location of a value inside a nested payload.
//! Paths are built bottom-up: a nested walk reports errors relative to the
//! node it validated, and every enclosing level prefixes its own segment as
//! the recursion unwinds.
//!
//! ## Notation
//!
//! ```text
//! Field("a"), Field("b"), Index(0), Field("c")   →  a.b[0].c
//! Field("labels"), Key("en")                     →  labels[en]
//! (no segments)                                  →  ""  (displayed as "(root)" in reports)
//! ```

use serde::{Serialize, Serializer};

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// A named field of a map-of-fields.
    Field(String),
    /// An element of an array or joined string.
    Index(usize),
    /// An entry of a map-of-values, echoed back by its raw key.
    Key(String),
}

/// Location of a value inside a nested payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The empty path, naming the payload root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// A single-segment path naming a field.
    pub fn field(name: impl Into<String>) -> Self {
        Self(vec![PathSegment::Field(name.into())])
    }

    /// Whether this path names the payload root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The segments of this path, outermost first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// The outermost segment, if any.
    pub fn first(&self) -> Option<&PathSegment> {
        self.0.first()
    }

    /// Append a segment at the innermost end.
    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    /// Return a copy with `segment` appended at the innermost end.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    /// Prefix `segment` at the outermost end, in place.
    pub fn prefix(&mut self, segment: PathSegment) {
        self.0.insert(0, segment);
    }

    /// Remove and return the outermost segment.
    pub fn pop_first(&mut self) -> Option<PathSegment> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.remove(0))
        }
    }

    /// Prefix every segment of `parent` at the outermost end, in place.
    pub fn prefix_path(&mut self, parent: &FieldPath) {
        let mut segments = parent.0.clone();
        segments.append(&mut self.0);
        self.0 = segments;
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Key(key) => write!(f, "[{key}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_notation() {
        let mut path = FieldPath::field("c");
        path.prefix(PathSegment::Index(0));
        path.prefix(PathSegment::Field("b".into()));
        path.prefix(PathSegment::Field("a".into()));
        assert_eq!(path.to_string(), "a.b[0].c");
    }

    #[test]
    fn test_map_values_key_notation() {
        let path = FieldPath::field("labels").child(PathSegment::Key("en".into()));
        assert_eq!(path.to_string(), "labels[en]");
    }

    #[test]
    fn test_root_renders_empty() {
        assert_eq!(FieldPath::root().to_string(), "");
        assert!(FieldPath::root().is_root());
    }

    #[test]
    fn test_leading_index() {
        let path = FieldPath::root()
            .child(PathSegment::Index(3))
            .child(PathSegment::Field("name".into()));
        assert_eq!(path.to_string(), "[3].name");
    }

    #[test]
    fn test_pop_first() {
        let mut path = FieldPath::field("email").child(PathSegment::Field("domain".into()));
        assert_eq!(path.pop_first(), Some(PathSegment::Field("email".into())));
        assert_eq!(path.to_string(), "domain");
        assert_eq!(FieldPath::root().pop_first(), None);
    }

    #[test]
    fn test_prefix_path() {
        let mut path = FieldPath::field("zip");
        path.prefix_path(&FieldPath::field("user").child(PathSegment::Field("address".into())));
        assert_eq!(path.to_string(), "user.address.zip");
    }

    #[test]
    fn test_serializes_as_string() {
        let path = FieldPath::field("tags").child(PathSegment::Index(2));
        assert_eq!(serde_json::to_value(&path).unwrap(), serde_json::json!("tags[2]"));
    }
}
