//! Elements of an entity data model.
//!
//! Every named thing in a model, from a schema down to a single enumeration
//! member, is an element held in the owning [`EntityModel`] and addressed
//! through a small [`Element`] handle. The handle is what flows through the
//! public API; the per-kind payload stays inside the model.
//!
//! [`EntityModel`]: crate::EntityModel

use std::cell::{Cell, RefCell};

use indexmap::IndexMap;

use crate::annotations::{AnnotationRecord, ConstExpr, LabeledData, TermData};
use crate::container::{CallableData, ContainerData, EntitySetData, ImportData};
use crate::model::ModelData;
use crate::navigation::NavigationData;
use crate::schema::SchemaData;
use crate::scope::NameTable;
use crate::structured::{ComplexTypeData, EntityTypeData, PropertyData};
use crate::types::{
    CollectionData, EnumData, MemberData, PrimitiveData, TypeDefData, TypeHead,
};

/// Handle to an element of an [`EntityModel`](crate::EntityModel).
///
/// Handles are plain indexes into the model that issued them, cheap to copy
/// and compare. Using a handle with a different model is a logic error and
/// will address an unrelated element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Element(pub(crate) usize);

/// The kind of an [`Element`], as reported by
/// [`EntityModel::kind_of`](crate::EntityModel::kind_of).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// The model root, a scope holding schemas.
    Model,
    /// A schema, a scope holding types, terms and containers.
    Schema,
    /// An entity type.
    EntityType,
    /// A complex type.
    ComplexType,
    /// An enumeration type.
    EnumType,
    /// A member of an enumeration type.
    Member,
    /// A type definition over a primitive underlying type.
    TypeDefinition,
    /// A built-in primitive type.
    PrimitiveType,
    /// A collection over some item type.
    CollectionType,
    /// A structural property.
    Property,
    /// A navigation property.
    NavigationProperty,
    /// An annotation term.
    Term,
    /// An entity container.
    EntityContainer,
    /// An entity set within a container.
    EntitySet,
    /// A singleton within a container.
    Singleton,
    /// An action import within a container.
    ActionImport,
    /// A function import within a container.
    FunctionImport,
    /// An action, possibly with several overloads.
    Action,
    /// A function, possibly with several overloads.
    Function,
    /// A labeled expression declared in a schema.
    LabeledExpression,
}

impl ElementKind {
    /// Lowercase description of the kind for error messages.
    pub fn describe(self) -> &'static str {
        match self {
            ElementKind::Model => "entity model",
            ElementKind::Schema => "schema",
            ElementKind::EntityType => "entity type",
            ElementKind::ComplexType => "complex type",
            ElementKind::EnumType => "enumeration type",
            ElementKind::Member => "enumeration member",
            ElementKind::TypeDefinition => "type definition",
            ElementKind::PrimitiveType => "primitive type",
            ElementKind::CollectionType => "collection type",
            ElementKind::Property => "property",
            ElementKind::NavigationProperty => "navigation property",
            ElementKind::Term => "term",
            ElementKind::EntityContainer => "entity container",
            ElementKind::EntitySet => "entity set",
            ElementKind::Singleton => "singleton",
            ElementKind::ActionImport => "action import",
            ElementKind::FunctionImport => "function import",
            ElementKind::Action => "action",
            ElementKind::Function => "function",
            ElementKind::LabeledExpression => "labeled expression",
        }
    }
}

/// A new element to declare into a scope with
/// [`EntityModel::declare`](crate::EntityModel::declare).
///
/// The variant picks the kind; fields carry the attributes that belong to
/// the declaration itself. Everything else, type references above all, is
/// supplied afterwards through the model's setter operations.
#[derive(Clone, Debug)]
pub enum Declaration {
    /// A schema, declared into the model root under its namespace.
    Schema,
    /// An entity type.
    EntityType {
        /// Whether instances of the type itself can exist.
        is_abstract: bool,
        /// Whether the type accepts dynamic properties. `None` inherits
        /// from the base type at closure.
        open_type: Option<bool>,
    },
    /// A complex type.
    ComplexType {
        /// Whether instances of the type itself can exist.
        is_abstract: bool,
        /// Whether the type accepts dynamic properties. `None` inherits
        /// from the base type at closure.
        open_type: Option<bool>,
    },
    /// An enumeration type.
    EnumType {
        /// Whether members act as combinable flags. Flag members must
        /// carry explicit values.
        is_flags: bool,
    },
    /// An enumeration member. Without a value one is assigned in
    /// declaration order, starting at zero.
    Member {
        /// The member's value, required for flag enumerations.
        value: Option<i64>,
    },
    /// A type definition; supply the underlying type afterwards.
    TypeDefinition,
    /// An annotation term; supply its type afterwards.
    Term,
    /// A structural property of an entity or complex type.
    Property {
        /// Whether null is assignable. `None` falls back to the CSDL
        /// default of nullable.
        nullable: Option<bool>,
    },
    /// A navigation property of an entity or complex type.
    NavigationProperty {
        /// Whether the target may be absent. Must stay `None` for
        /// collection-valued navigation.
        nullable: Option<bool>,
        /// Whether the target entities are contained by the source.
        contains_target: bool,
    },
    /// An entity container.
    EntityContainer,
    /// An entity set.
    EntitySet {
        /// Whether the set is advertised in the service document.
        in_service: bool,
    },
    /// A singleton.
    Singleton,
    /// An action import.
    ActionImport,
    /// A function import.
    FunctionImport,
    /// An action; add overloads afterwards.
    Action,
    /// A function; add overloads afterwards.
    Function,
    /// A labeled constant expression.
    LabeledExpression {
        /// The labeled value.
        value: ConstExpr,
    },
}

impl Declaration {
    /// Builds the payload for a fresh element along with its starting
    /// dependency count. Elements that finish through
    /// [`end_declaration`](crate::EntityModel::end_declaration) start at
    /// one; elements whose completion is their owner's concern start at
    /// zero.
    pub(crate) fn into_payload(self) -> (Payload, u32) {
        match self {
            Declaration::Schema => (Payload::Schema(SchemaData::new()), 0),
            Declaration::EntityType {
                is_abstract,
                open_type,
            } => (
                Payload::EntityType(EntityTypeData::new(is_abstract, open_type)),
                1,
            ),
            Declaration::ComplexType {
                is_abstract,
                open_type,
            } => (
                Payload::ComplexType(ComplexTypeData::new(is_abstract, open_type)),
                1,
            ),
            Declaration::EnumType { is_flags } => (Payload::Enum(EnumData::new(is_flags)), 1),
            Declaration::Member { value } => (Payload::Member(MemberData::new(value)), 0),
            Declaration::TypeDefinition => (Payload::TypeDef(TypeDefData::new()), 1),
            Declaration::Term => (Payload::Term(TermData::new()), 1),
            Declaration::Property { nullable } => {
                (Payload::Property(PropertyData::new(nullable)), 0)
            }
            Declaration::NavigationProperty {
                nullable,
                contains_target,
            } => (
                Payload::Navigation(NavigationData::new(nullable, contains_target)),
                0,
            ),
            Declaration::EntityContainer => (Payload::Container(ContainerData::new()), 1),
            Declaration::EntitySet { in_service } => {
                (Payload::EntitySet(EntitySetData::new(in_service)), 0)
            }
            Declaration::Singleton => (Payload::Singleton(EntitySetData::new(true)), 0),
            Declaration::ActionImport => (Payload::ActionImport(ImportData::new()), 0),
            Declaration::FunctionImport => (Payload::FunctionImport(ImportData::new()), 0),
            Declaration::Action => (Payload::Callable(CallableData::new(false)), 1),
            Declaration::Function => (Payload::Callable(CallableData::new(true)), 1),
            Declaration::LabeledExpression { value } => {
                (Payload::Labeled(LabeledData::new(value)), 0)
            }
        }
    }
}

/// Per-element state shared by every kind.
pub(crate) struct ElementData {
    /// The defining name, set by the first declaration and never changed.
    pub(crate) name: RefCell<Option<String>>,
    /// The name qualified by the owning scope, set alongside `name`.
    pub(crate) qname: RefCell<Option<String>>,
    /// The scope of the first declaration.
    pub(crate) owner: Cell<Option<Element>>,
    /// Outstanding reasons the element can't complete. See
    /// [`EntityModel::end_declaration`](crate::EntityModel::end_declaration).
    pub(crate) dependencies: Cell<u32>,
    /// Applied annotations keyed by term reference.
    pub(crate) annotations: RefCell<IndexMap<String, AnnotationRecord>>,
    pub(crate) payload: Payload,
}

impl ElementData {
    pub(crate) fn new(payload: Payload, dependencies: u32) -> Self {
        ElementData {
            name: RefCell::new(None),
            qname: RefCell::new(None),
            owner: Cell::new(None),
            dependencies: Cell::new(dependencies),
            annotations: RefCell::new(IndexMap::new()),
            payload,
        }
    }
}

/// Kind-specific element state.
pub(crate) enum Payload {
    Model(ModelData),
    Schema(SchemaData),
    EntityType(EntityTypeData),
    ComplexType(ComplexTypeData),
    Enum(EnumData),
    Member(MemberData),
    TypeDef(TypeDefData),
    Primitive(PrimitiveData),
    Collection(CollectionData),
    Property(PropertyData),
    Navigation(NavigationData),
    Term(TermData),
    Container(ContainerData),
    EntitySet(EntitySetData),
    Singleton(EntitySetData),
    ActionImport(ImportData),
    FunctionImport(ImportData),
    Callable(CallableData),
    Labeled(LabeledData),
}

impl Payload {
    pub(crate) fn kind(&self) -> ElementKind {
        match self {
            Payload::Model(_) => ElementKind::Model,
            Payload::Schema(_) => ElementKind::Schema,
            Payload::EntityType(_) => ElementKind::EntityType,
            Payload::ComplexType(_) => ElementKind::ComplexType,
            Payload::Enum(_) => ElementKind::EnumType,
            Payload::Member(_) => ElementKind::Member,
            Payload::TypeDef(_) => ElementKind::TypeDefinition,
            Payload::Primitive(_) => ElementKind::PrimitiveType,
            Payload::Collection(_) => ElementKind::CollectionType,
            Payload::Property(_) => ElementKind::Property,
            Payload::Navigation(_) => ElementKind::NavigationProperty,
            Payload::Term(_) => ElementKind::Term,
            Payload::Container(_) => ElementKind::EntityContainer,
            Payload::EntitySet(_) => ElementKind::EntitySet,
            Payload::Singleton(_) => ElementKind::Singleton,
            Payload::ActionImport(_) => ElementKind::ActionImport,
            Payload::FunctionImport(_) => ElementKind::FunctionImport,
            Payload::Callable(c) => {
                if c.is_function {
                    ElementKind::Function
                } else {
                    ElementKind::Action
                }
            }
            Payload::Labeled(_) => ElementKind::LabeledExpression,
        }
    }

    /// The element's name table, for the kinds that are scopes.
    pub(crate) fn table(&self) -> Option<&NameTable> {
        match self {
            Payload::Model(m) => Some(&m.table),
            Payload::Schema(s) => Some(&s.table),
            Payload::EntityType(t) => Some(&t.table),
            Payload::ComplexType(t) => Some(&t.table),
            Payload::Enum(t) => Some(&t.table),
            Payload::Container(c) => Some(&c.table),
            _ => None,
        }
    }

    /// Shared state of the kinds that are nominal types.
    pub(crate) fn head(&self) -> Option<&TypeHead> {
        match self {
            Payload::EntityType(t) => Some(&t.head),
            Payload::ComplexType(t) => Some(&t.head),
            Payload::Enum(t) => Some(&t.head),
            Payload::TypeDef(t) => Some(&t.head),
            Payload::Primitive(t) => Some(&t.head),
            _ => None,
        }
    }

    /// Whether the element can serve as the type of a property or term.
    pub(crate) fn is_type(&self) -> bool {
        matches!(
            self,
            Payload::EntityType(_)
                | Payload::ComplexType(_)
                | Payload::Enum(_)
                | Payload::TypeDef(_)
                | Payload::Primitive(_)
                | Payload::Collection(_)
        )
    }
}
