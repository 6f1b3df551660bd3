//! Errors raised while building and closing an entity model.
//!
//! [`DeclareError`] covers failures of the name tables themselves: a name
//! that does not fit the scope's grammar, a duplicate, a declaration into a
//! closed scope. [`ModelError`] wraps those and adds the structural failures
//! detected while references resolve and scopes close.
//!
//! Callbacks registered with the model run without a way to return a
//! `Result`, so failures inside them are recorded on the model and reported
//! by whichever public call triggered the callback. The first recorded
//! failure also sticks: once any callback has failed, closing the model
//! reports that failure rather than a complete model.

use edm_names::NameError;
use thiserror::Error;

/// A declaration was rejected by a name table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclareError {
    /// The empty string can never be declared.
    #[error("declaration requires a name")]
    Unnamed,

    /// The name does not match the grammar the scope requires.
    #[error(transparent)]
    BadName(#[from] NameError),

    /// The element is of a kind the scope does not accept.
    #[error("{kind} can't be declared in {scope}")]
    BadValue {
        /// Description of the rejecting scope.
        scope: String,
        /// Kind of the rejected element.
        kind: &'static str,
    },

    /// The name is already in use in the scope.
    #[error("{0} is already declared")]
    Duplicate(String),

    /// The scope has been closed and accepts no further declarations.
    #[error("{0} is closed")]
    Closed(String),

    /// An element that already contains declarations can't be declared
    /// itself; qualified names of its children would have been fixed too
    /// early.
    #[error("{0} is not empty")]
    NotEmpty(String),

    /// The alias is reserved for built-in namespaces.
    #[error("{0} is a reserved alias")]
    ReservedAlias(String),

    /// A property can't share the name of its declaring entity type.
    #[error("a property of {0} can't use the type's own name")]
    ShadowsTypeName(String),
}

/// A structural failure detected while building or closing a model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A name table rejected a declaration.
    #[error(transparent)]
    Declare(#[from] DeclareError),

    /// A deferred reference never resolved: the scope it was waiting on
    /// closed without the name being declared.
    #[error("{0} is not declared")]
    UnresolvedReference(String),

    /// An operation required a declared element.
    #[error("{0} has not been declared")]
    NotDeclared(String),

    /// An entity type reaches itself through its base type chain.
    #[error("inheritance cycle detected in entity type {0}")]
    EntityCycle(String),

    /// A complex type reaches itself through its base type chain.
    #[error("inheritance cycle detected in complex type {0}")]
    ComplexCycle(String),

    /// The model was closed while one of its schemas was still open.
    #[error("schema {0} is still open")]
    SchemaStillOpen(String),

    /// A model may expose at most one entity container.
    #[error("model defines more than one entity container: {0} and {1}")]
    MultipleContainers(String, String),

    /// The named element can't serve as a base type here.
    #[error("{derived} can't extend {base}: {reason}")]
    BadBase {
        /// Qualified name of the derived type.
        derived: String,
        /// Qualified name of the offered base.
        base: String,
        /// What rule the pairing breaks.
        reason: &'static str,
    },

    /// The element resolved to something of the wrong kind.
    #[error("{name} is not {expected}")]
    WrongKind {
        /// Qualified name of the element.
        name: String,
        /// What was required, e.g. "an entity type".
        expected: &'static str,
    },

    /// A type was used before it finished closing.
    #[error("{0} is incomplete")]
    IncompleteType(String),

    /// An element was left without a required type.
    #[error("{0} is undefined")]
    UndefinedType(String),

    /// The key of an entity type is missing or malformed.
    #[error("invalid key for {entity_type}: {detail}")]
    InvalidKey {
        /// Qualified name of the entity type.
        entity_type: String,
        /// What is wrong with the key.
        detail: String,
    },

    /// A navigation property, partner or binding is inconsistent.
    #[error("navigation error in {name}: {detail}")]
    InvalidNavigation {
        /// Qualified name of the navigation property or entity set.
        name: String,
        /// What is wrong with it.
        detail: String,
    },

    /// A facet was applied to a type that does not carry it.
    #[error("{facet} is not applicable to {name}")]
    BadFacet {
        /// Qualified name of the element carrying the facet.
        name: String,
        /// The offending facet.
        facet: &'static str,
    },

    /// A value was required and no default could be supplied.
    #[error("{0} requires an explicit value")]
    ValueRequired(String),

    /// The element is complete and no longer accepts changes.
    #[error("{0} is complete and can't be modified")]
    Frozen(String),
}
