use crate::ident::{is_simple_identifier, Name};
use crate::NameError;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Returns true if `s` is a *Namespace*: one or more simple identifiers
/// joined by dots.
pub fn is_namespace(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_simple_identifier)
}

/// A validated namespace, e.g. `Org.OData.Core.V1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(s: impl Into<String>) -> Result<Self, NameError> {
        let s = s.into();
        if is_namespace(&s) {
            Ok(Namespace(s))
        } else {
            Err(NameError::BadNamespace(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The dot-separated parts of the namespace, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Namespace {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::new(s)
    }
}

/// A namespace-qualified name.
///
/// The string form splits on the *last* dot: `My.Schema.Product` has
/// namespace `My.Schema` and name `Product`. A string without a dot is not
/// a qualified name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub namespace: Namespace,
    pub name: Name,
}

impl QualifiedName {
    pub fn new(namespace: Namespace, name: Name) -> Self {
        QualifiedName { namespace, name }
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl FromStr for QualifiedName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((namespace, name)) = s.rsplit_once('.') else {
            return Err(NameError::BadQualifiedName(s.to_string()));
        };
        let bad = || NameError::BadQualifiedName(s.to_string());
        Ok(QualifiedName {
            namespace: Namespace::new(namespace).map_err(|_| bad())?,
            name: Name::new(name).map_err(|_| bad())?,
        })
    }
}

/// A type reference as it appears in attribute values: either a qualified
/// name or `Collection(QualifiedName)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeName {
    pub qname: QualifiedName,
    pub collection: bool,
}

impl TypeName {
    pub fn single(qname: QualifiedName) -> Self {
        TypeName {
            qname,
            collection: false,
        }
    }

    pub fn collection(qname: QualifiedName) -> Self {
        TypeName {
            qname,
            collection: true,
        }
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.collection {
            write!(f, "Collection({})", self.qname)
        } else {
            self.qname.fmt(f)
        }
    }
}

impl FromStr for TypeName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (inner, collection) = match s.strip_prefix("Collection(") {
            Some(rest) => match rest.strip_suffix(')') {
                Some(inner) => (inner, true),
                None => return Err(NameError::BadTypeName(s.to_string())),
            },
            None => (s, false),
        };
        let qname: QualifiedName = inner
            .parse()
            .map_err(|_| NameError::BadTypeName(s.to_string()))?;
        Ok(TypeName { qname, collection })
    }
}

/// An annotation term reference: `@Namespace.Term` or
/// `@Namespace.Term#qualifier`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TermRef {
    pub term: QualifiedName,
    pub qualifier: Option<Name>,
}

impl TermRef {
    pub fn new(term: QualifiedName, qualifier: Option<Name>) -> Self {
        TermRef { term, qualifier }
    }
}

impl Display for TermRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.term)?;
        if let Some(q) = &self.qualifier {
            write!(f, "#{q}")?;
        }
        Ok(())
    }
}

impl FromStr for TermRef {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix('@') else {
            return Err(NameError::BadTermRef(s.to_string()));
        };
        let (term, qualifier) = match rest.split_once('#') {
            Some((term, q)) => {
                let q = Name::new(q).map_err(|_| NameError::BadTermRef(s.to_string()))?;
                (term, Some(q))
            }
            None => (rest, None),
        };
        let term: QualifiedName = term
            .parse()
            .map_err(|_| NameError::BadTermRef(s.to_string()))?;
        Ok(TermRef { term, qualifier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces() {
        assert!(is_namespace("Edm"));
        assert!(is_namespace("Org.OData.Core.V1"));
        assert!(!is_namespace(""));
        assert!(!is_namespace(".Edm"));
        assert!(!is_namespace("Edm."));
        assert!(!is_namespace("Org..Core"));
    }

    #[test]
    fn qualified_name_splits_on_last_dot() {
        let q: QualifiedName = "My.Schema.Product".parse().unwrap();
        assert_eq!(q.namespace.as_str(), "My.Schema");
        assert_eq!(q.name.as_str(), "Product");
        assert_eq!(q.to_string(), "My.Schema.Product");
        assert!("Product".parse::<QualifiedName>().is_err());
        assert!("My..Product".parse::<QualifiedName>().is_err());
    }

    #[test]
    fn type_names() {
        let t: TypeName = "Edm.String".parse().unwrap();
        assert!(!t.collection);
        assert_eq!(t.to_string(), "Edm.String");

        let t: TypeName = "Collection(My.Schema.Product)".parse().unwrap();
        assert!(t.collection);
        assert_eq!(t.qname.to_string(), "My.Schema.Product");
        assert_eq!(t.to_string(), "Collection(My.Schema.Product)");

        assert!("Collection(Edm.String".parse::<TypeName>().is_err());
        assert!("Collection()".parse::<TypeName>().is_err());
    }

    #[test]
    fn term_refs() {
        let t: TermRef = "@Core.Description".parse().unwrap();
        assert_eq!(t.term.to_string(), "Core.Description");
        assert!(t.qualifier.is_none());

        let t: TermRef = "@Core.Description#en".parse().unwrap();
        assert_eq!(t.qualifier.as_ref().unwrap().as_str(), "en");
        assert_eq!(t.to_string(), "@Core.Description#en");

        assert!("Core.Description".parse::<TermRef>().is_err());
        assert!("@Description".parse::<TermRef>().is_err());
        assert!("@Core.Description#".parse::<TermRef>().is_err());
    }
}
