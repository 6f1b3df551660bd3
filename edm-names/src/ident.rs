use crate::NameError;
use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;
use std::str::FromStr;

/// Longest identifier accepted by [`is_simple_identifier`], in characters.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Returns true if `s` is a *SimpleIdentifier*.
///
/// A simple identifier starts with a Unicode identifier-start character or
/// an underscore and continues with identifier-continue characters, up to
/// [`MAX_IDENTIFIER_LENGTH`] characters in total.
pub fn is_simple_identifier(s: &str) -> bool {
    let mut count = 0;
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || unicode_ident::is_xid_start(c) => count += 1,
        _ => return false,
    }
    for c in chars {
        if !unicode_ident::is_xid_continue(c) {
            return false;
        }
        count += 1;
    }
    count <= MAX_IDENTIFIER_LENGTH
}

/// A validated *SimpleIdentifier*.
///
/// `Name` dereferences to `str` and borrows as `&str`, so it can key string
/// maps directly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(String);

impl Name {
    /// Validates `s` and wraps it.
    pub fn new(s: impl Into<String>) -> Result<Self, NameError> {
        let s = s.into();
        if is_simple_identifier(&s) {
            Ok(Name(s))
        } else {
            Err(NameError::BadSimpleIdentifier(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_identifiers() {
        assert!(is_simple_identifier("Name"));
        assert!(is_simple_identifier("_Name"));
        assert!(is_simple_identifier("N1"));
        assert!(is_simple_identifier("_"));
        assert!(!is_simple_identifier(""));
        assert!(!is_simple_identifier("1Name"));
        assert!(!is_simple_identifier("Na me"));
        assert!(!is_simple_identifier("Na.me"));
        assert!(!is_simple_identifier("Na-me"));
    }

    #[test]
    fn unicode_identifiers() {
        assert!(is_simple_identifier("Grüße"));
        assert!(is_simple_identifier("名前"));
        assert!(!is_simple_identifier("№"));
    }

    #[test]
    fn length_cap() {
        let ok: String = std::iter::repeat('a').take(128).collect();
        let long: String = std::iter::repeat('a').take(129).collect();
        assert!(is_simple_identifier(&ok));
        assert!(!is_simple_identifier(&long));
        assert!(Name::new(long).is_err());
    }

    #[test]
    fn name_round_trip() {
        let n: Name = "Product".parse().unwrap();
        assert_eq!(n.as_str(), "Product");
        assert_eq!(n.to_string(), "Product");
        assert_eq!(
            "9bad".parse::<Name>(),
            Err(NameError::BadSimpleIdentifier("9bad".to_string()))
        );
    }
}
