use crate::ident::Name;
use crate::qname::{QualifiedName, TermRef};
use crate::NameError;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One segment of a [`Path`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A plain property (or navigation property) name.
    Identifier(Name),
    /// A type cast, written as a qualified type name.
    Cast(QualifiedName),
    /// An annotation term reference.
    Term(TermRef),
}

impl PathSegment {
    pub fn as_identifier(&self) -> Option<&Name> {
        match self {
            PathSegment::Identifier(n) => Some(n),
            _ => None,
        }
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Identifier(n) => n.fmt(f),
            PathSegment::Cast(q) => q.fmt(f),
            PathSegment::Term(t) => t.fmt(f),
        }
    }
}

impl FromStr for PathSegment {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('@') {
            Ok(PathSegment::Term(s.parse()?))
        } else if s.contains('.') {
            Ok(PathSegment::Cast(s.parse()?))
        } else {
            Ok(PathSegment::Identifier(s.parse()?))
        }
    }
}

/// A `/`-separated path through the properties of a structured type.
///
/// Paths appear in key declarations, navigation partner attributes,
/// referential constraints and navigation-property bindings. A path always
/// has at least one segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn new(segments: Vec<PathSegment>) -> Result<Self, NameError> {
        if segments.is_empty() {
            return Err(NameError::BadPath(String::new()));
        }
        Ok(Path(segments))
    }

    /// A single-identifier path.
    pub fn single(name: Name) -> Self {
        Path(vec![PathSegment::Identifier(name)])
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if every segment is a plain identifier (no casts, no terms).
    pub fn is_simple(&self) -> bool {
        self.0
            .iter()
            .all(|s| matches!(s, PathSegment::Identifier(_)))
    }

    /// The segments as plain names, if the path [`is_simple`](Self::is_simple).
    pub fn identifiers(&self) -> Option<Vec<&Name>> {
        self.0.iter().map(PathSegment::as_identifier).collect()
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.0 {
            if !first {
                f.write_str("/")?;
            }
            seg.fmt(f)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NameError::BadPath(s.to_string()));
        }
        let segments = s
            .split('/')
            .map(|seg| seg.parse())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| NameError::BadPath(s.to_string()))?;
        Ok(Path(segments))
    }
}
