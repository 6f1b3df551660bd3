//! Name syntax for OData entity data models.
//!
//! Everything declared in an entity data model is named, and the names obey
//! a small family of grammars taken from the CSDL specification:
//!
//! * [`Name`]: a *SimpleIdentifier*, the name of a type, property, member,
//!   container or term within its enclosing scope.
//! * [`Namespace`]: one or more simple identifiers joined by dots, naming a
//!   schema.
//! * [`QualifiedName`]: `Namespace.Name`, splitting on the *last* dot.
//! * [`TypeName`]: a qualified name optionally wrapped in `Collection(...)`.
//! * [`TermRef`]: an annotation term reference, `@Namespace.Term` with an
//!   optional `#qualifier` suffix.
//! * [`Path`]: a `/`-separated property path whose segments are simple
//!   identifiers, qualified names (type casts) or term references.
//!
//! All of these parse with [`FromStr`](std::str::FromStr) and print with
//! [`Display`](std::fmt::Display); parsing never allocates more than the
//! resulting value itself. Failures are reported as [`NameError`] carrying
//! the offending input.

use thiserror::Error;

mod ident;
mod path;
mod qname;

pub use ident::{is_simple_identifier, Name, MAX_IDENTIFIER_LENGTH};
pub use path::{Path, PathSegment};
pub use qname::{is_namespace, Namespace, QualifiedName, TermRef, TypeName};

/// The error raised when a string fails one of the name grammars.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("{0} is not a valid SimpleIdentifier")]
    BadSimpleIdentifier(String),
    #[error("{0} is not a valid Namespace")]
    BadNamespace(String),
    #[error("{0} is not a valid QualifiedName")]
    BadQualifiedName(String),
    #[error("{0} is not a valid type name")]
    BadTypeName(String),
    #[error("{0} is not a valid term reference")]
    BadTermRef(String),
    #[error("{0} is not a valid path")]
    BadPath(String),
}
