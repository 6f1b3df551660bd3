//! Structured types: entity and complex types, their structural
//! properties, and keys.
//!
//! A structured type stays open while any of its properties waits for a
//! type reference. When the last wait resolves the type closes itself:
//! the base's properties are folded in as aliases, every property must
//! have a complete type, and entity types resolve and check their key.

use std::cell::{Cell, RefCell};

use edm_names::{is_simple_identifier, TypeName};
use indexmap::IndexMap;

use crate::annotations::ConstExpr;
use crate::element::{Element, ElementKind, Payload};
use crate::errors::{DeclareError, ModelError};
use crate::model::EntityModel;
use crate::scope::NameTable;
use crate::types::{FacetData, TypeHead};

pub(crate) struct EntityTypeData {
    pub(crate) head: TypeHead,
    pub(crate) table: NameTable,
    /// Key parts as declared: optional alias plus property path.
    pub(crate) key: RefCell<Vec<(Option<String>, Vec<String>)>>,
    /// Resolved key filled at closure: alias to path and property.
    pub(crate) key_dict: RefCell<IndexMap<String, (Vec<String>, Element)>>,
    /// `Some(true)` once a containment navigation targets the type,
    /// `Some(false)` for its base types, which then can't be targeted
    /// themselves.
    pub(crate) contained: Cell<Option<bool>>,
}

impl EntityTypeData {
    pub(crate) fn new(is_abstract: bool, open_type: Option<bool>) -> Self {
        EntityTypeData {
            head: TypeHead::new(is_abstract, open_type),
            table: NameTable::new(),
            key: RefCell::new(Vec::new()),
            key_dict: RefCell::new(IndexMap::new()),
            contained: Cell::new(None),
        }
    }
}

pub(crate) struct ComplexTypeData {
    pub(crate) head: TypeHead,
    pub(crate) table: NameTable,
}

impl ComplexTypeData {
    pub(crate) fn new(is_abstract: bool, open_type: Option<bool>) -> Self {
        ComplexTypeData {
            head: TypeHead::new(is_abstract, open_type),
            table: NameTable::new(),
        }
    }
}

pub(crate) struct PropertyData {
    /// The resolved type; a collection element for collection-valued
    /// properties.
    pub(crate) type_ref: Cell<Option<Element>>,
    pub(crate) nullable: Cell<Option<bool>>,
    pub(crate) default_value: RefCell<Option<ConstExpr>>,
    pub(crate) facets: FacetData,
}

impl PropertyData {
    pub(crate) fn new(nullable: Option<bool>) -> Self {
        PropertyData {
            type_ref: Cell::new(None),
            nullable: Cell::new(nullable),
            default_value: RefCell::new(None),
            facets: FacetData::default(),
        }
    }
}

impl EntityModel {
    /// Sets the type of a structural property by name.
    ///
    /// The property must already be declared in its structured type; the
    /// type waits for the reference before it can close. Structured and
    /// enumeration types must in turn close before the wait ends, so a
    /// type is never complete while a property's type is still being
    /// built. Entity types are not valid property types.
    pub fn set_property_type_name(
        &self,
        p: Element,
        type_name: &TypeName,
    ) -> Result<(), ModelError> {
        if self.kind_of(p) != ElementKind::Property {
            return Err(ModelError::WrongKind {
                name: self.describe(p),
                expected: "a structural property",
            });
        }
        let Some(owner) = self.owner_of(p) else {
            return Err(ModelError::NotDeclared(self.describe(p)));
        };
        self.add_dependency(owner);
        let collection = type_name.collection;
        let qname = type_name.qname.clone();
        self.qualified_tell(&type_name.qname, move |m, resolved| match resolved {
            None => {
                m.record(ModelError::UnresolvedReference(qname.to_string()));
                m.resolve_dependency(owner);
            }
            Some(ty) => match m.assign_property_type(p, ty, collection) {
                Err(err) => {
                    m.record(err);
                    m.resolve_dependency(owner);
                }
                Ok(Some(wait_on)) => {
                    let queued = m.tell_close(wait_on, move |m| m.resolve_dependency(owner));
                    if let Err(err) = queued {
                        m.record(err);
                        m.resolve_dependency(owner);
                    }
                }
                Ok(None) => m.resolve_dependency(owner),
            },
        })?;
        self.surface()
    }

    /// Stores a resolved property type. Returns the scope to wait on
    /// before the reference counts as finished, if any.
    fn assign_property_type(
        &self,
        p: Element,
        ty: Element,
        collection: bool,
    ) -> Result<Option<Element>, ModelError> {
        match self.kind_of(ty) {
            ElementKind::ComplexType
            | ElementKind::EnumType
            | ElementKind::TypeDefinition
            | ElementKind::PrimitiveType => {}
            _ => {
                return Err(ModelError::WrongKind {
                    name: self.describe(ty),
                    expected: "a property type",
                })
            }
        }
        let stored = if collection { self.collection_of(ty)? } else { ty };
        let d = self.data(p);
        let Payload::Property(prop) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(p),
                expected: "a structural property",
            });
        };
        prop.type_ref.set(Some(stored));
        match self.kind_of(ty) {
            ElementKind::ComplexType | ElementKind::EnumType if !self.is_closed(ty) => {
                Ok(Some(ty))
            }
            _ => Ok(None),
        }
    }

    /// Sets or clears explicit nullability on a property, navigation
    /// property or term.
    pub fn set_nullable(&self, e: Element, nullable: bool) -> Result<(), ModelError> {
        self.check_mutable(e)?;
        let d = self.data(e);
        match &d.payload {
            Payload::Property(p) => {
                p.nullable.set(Some(nullable));
                Ok(())
            }
            Payload::Navigation(n) => {
                if n.collection.get() {
                    return Err(ModelError::InvalidNavigation {
                        name: self.describe(e),
                        detail: "collection-valued navigation can't specify nullable".to_string(),
                    });
                }
                n.nullable.set(Some(nullable));
                Ok(())
            }
            Payload::Term(t) => {
                t.nullable.set(Some(nullable));
                Ok(())
            }
            _ => Err(ModelError::WrongKind {
                name: self.describe(e),
                expected: "a property, navigation property or term",
            }),
        }
    }

    /// Explicit nullability of a property, navigation property or term.
    /// `None` means the CSDL default applies.
    pub fn nullable_of(&self, e: Element) -> Option<bool> {
        match &self.data(e).payload {
            Payload::Property(p) => p.nullable.get(),
            Payload::Navigation(n) => n.nullable.get(),
            Payload::Term(t) => t.nullable.get(),
            _ => None,
        }
    }

    /// Sets the default value of a property or term.
    pub fn set_default_value(&self, e: Element, value: ConstExpr) -> Result<(), ModelError> {
        self.check_mutable(e)?;
        let d = self.data(e);
        match &d.payload {
            Payload::Property(p) => {
                *p.default_value.borrow_mut() = Some(value);
                Ok(())
            }
            Payload::Term(t) => {
                *t.default_value.borrow_mut() = Some(value);
                Ok(())
            }
            _ => Err(ModelError::WrongKind {
                name: self.describe(e),
                expected: "a property or term",
            }),
        }
    }

    /// The default value of a property or term, if set.
    pub fn default_value_of(&self, e: Element) -> Option<ConstExpr> {
        match &self.data(e).payload {
            Payload::Property(p) => p.default_value.borrow().clone(),
            Payload::Term(t) => t.default_value.borrow().clone(),
            _ => None,
        }
    }

    /// The resolved type of a property, navigation property, term or
    /// entity set. For collection-valued properties this is the
    /// collection element.
    pub fn type_of(&self, e: Element) -> Option<Element> {
        match &self.data(e).payload {
            Payload::Property(p) => p.type_ref.get(),
            Payload::Navigation(n) => n.target.get(),
            Payload::Term(t) => t.type_ref.get(),
            Payload::EntitySet(s) | Payload::Singleton(s) => s.entity_type.get(),
            _ => None,
        }
    }

    /// Adds one part to the key of an entity type.
    ///
    /// A single-segment path stands for itself and takes no alias; a
    /// multi-segment path descends through complex properties and must
    /// carry one. Resolution and the remaining rules run when the type
    /// closes.
    pub fn add_key(
        &self,
        t: Element,
        path: &[&str],
        alias: Option<&str>,
    ) -> Result<(), ModelError> {
        let d = self.data(t);
        let Payload::EntityType(et) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(t),
                expected: "an entity type",
            });
        };
        if et.table.is_closed() {
            return Err(ModelError::Frozen(self.describe(t)));
        }
        let invalid = |detail: &str| ModelError::InvalidKey {
            entity_type: self.describe(t),
            detail: detail.to_string(),
        };
        if path.is_empty() {
            return Err(invalid("empty key path"));
        }
        for segment in path {
            if !is_simple_identifier(segment) {
                return Err(DeclareError::BadName(
                    edm_names::NameError::BadSimpleIdentifier(segment.to_string()),
                )
                .into());
            }
        }
        match (alias, path.len()) {
            (Some(_), 1) => return Err(invalid("alias not allowed on a single-part key")),
            (None, n) if n > 1 => return Err(invalid("multi-part key path requires an alias")),
            _ => {}
        }
        if let Some(alias) = alias {
            if !is_simple_identifier(alias) {
                return Err(DeclareError::BadName(
                    edm_names::NameError::BadSimpleIdentifier(alias.to_string()),
                )
                .into());
            }
        }
        et.key.borrow_mut().push((
            alias.map(str::to_string),
            path.iter().map(|s| s.to_string()).collect(),
        ));
        Ok(())
    }

    /// Whether an entity type is the target of a containment navigation
    /// property. Settled when the model closes.
    pub fn is_contained(&self, t: Element) -> bool {
        match &self.data(t).payload {
            Payload::EntityType(et) => et.contained.get() == Some(true),
            _ => false,
        }
    }

    /// Whether an entity type declares a key, on itself or on a base.
    pub fn key_defined(&self, t: Element) -> bool {
        let mut visited = Vec::new();
        let mut current = Some(t);
        while let Some(c) = current {
            if visited.contains(&c) {
                return false;
            }
            if let Payload::EntityType(et) = &self.data(c).payload {
                if !et.key.borrow().is_empty() {
                    return true;
                }
            }
            visited.push(c);
            current = self.base_type_of(c);
        }
        false
    }

    /// The resolved key of a closed entity type: alias, path and property
    /// for each part, in declaration order. Searches base types for
    /// inherited keys.
    pub fn key_of(&self, t: Element) -> Vec<(String, Vec<String>, Element)> {
        let mut current = Some(t);
        while let Some(c) = current {
            if let Payload::EntityType(et) = &self.data(c).payload {
                let dict = et.key_dict.borrow();
                if !dict.is_empty() {
                    return dict
                        .iter()
                        .map(|(a, (path, p))| (a.clone(), path.clone(), *p))
                        .collect();
                }
            }
            current = self.base_type_of(c);
        }
        Vec::new()
    }

    /// Closes an entity or complex type.
    pub(crate) fn close_structured(&self, t: Element) -> Result<(), ModelError> {
        let d = self.data(t);
        let Some(table) = d.payload.table() else {
            return Err(ModelError::WrongKind {
                name: self.describe(t),
                expected: "a structured type",
            });
        };
        let Some(head) = d.payload.head() else {
            return Err(ModelError::WrongKind {
                name: self.describe(t),
                expected: "a structured type",
            });
        };
        if table.is_closed() {
            return Ok(());
        }
        let entity = matches!(d.payload, Payload::EntityType(_));
        let base = head.base.get();

        if entity {
            if !head.is_abstract.get() && !self.key_defined(t) {
                return Err(ModelError::InvalidKey {
                    entity_type: self.describe(t),
                    detail: "no key defined".to_string(),
                });
            }
            if let Some(base) = base {
                if head.is_abstract.get() && !self.is_abstract(base) {
                    return Err(ModelError::BadBase {
                        derived: self.describe(t),
                        base: self.describe(base),
                        reason: "abstract type requires an abstract base",
                    });
                }
                let own_key = match &d.payload {
                    Payload::EntityType(et) => !et.key.borrow().is_empty(),
                    _ => false,
                };
                if own_key && self.key_defined(base) {
                    return Err(ModelError::BadBase {
                        derived: self.describe(t),
                        base: self.describe(base),
                        reason: "base already defines a key",
                    });
                }
            }
        }

        match base {
            Some(base) => {
                if !self.is_closed(base) {
                    return Err(ModelError::IncompleteType(self.describe(base)));
                }
                let base_open = self.is_open_type(base);
                match head.open_type.get() {
                    Some(false) if base_open == Some(true) => {
                        return Err(ModelError::BadBase {
                            derived: self.describe(t),
                            base: self.describe(base),
                            reason: "open base requires an open derived type",
                        });
                    }
                    None => head.open_type.set(Some(base_open.unwrap_or(false))),
                    _ => {}
                }
                // base properties join the table as aliases
                for (name, p) in self.entries(base) {
                    self.insert_quiet(t, &name, p)?;
                }
            }
            None => {
                if head.open_type.get().is_none() {
                    head.open_type.set(Some(false));
                }
            }
        }

        for (_, p) in self.entries(t) {
            let pd = self.data(p);
            if let Payload::Property(prop) = &pd.payload {
                let Some(ty) = prop.type_ref.get() else {
                    return Err(ModelError::UndefinedType(self.describe(p)));
                };
                let item = self.item_type_of(ty);
                match self.kind_of(item) {
                    ElementKind::ComplexType | ElementKind::EntityType
                        if !self.is_closed(item) =>
                    {
                        return Err(ModelError::IncompleteType(self.describe(p)));
                    }
                    _ => {}
                }
                if let Some(kind) = self.primitive_kind_of(item) {
                    self.validate_facets(self.describe(p), &prop.facets, kind)?;
                }
            }
        }

        self.close_table(t)?;
        if entity {
            self.resolve_key(t)?;
        }
        Ok(())
    }

    /// Resolves the declared key parts of a just-closed entity type.
    fn resolve_key(&self, t: Element) -> Result<(), ModelError> {
        let d = self.data(t);
        let Payload::EntityType(et) = &d.payload else {
            return Ok(());
        };
        let declared = et.key.borrow().clone();
        for (alias, path) in declared {
            let invalid = |detail: String| ModelError::InvalidKey {
                entity_type: self.describe(t),
                detail,
            };
            let property = self
                .resolve_structural_path(t, &path)
                .map_err(&invalid)?;
            let pd = self.data(property);
            let Payload::Property(prop) = &pd.payload else {
                return Err(invalid(format!(
                    "{} is not a structural property",
                    path.join("/")
                )));
            };
            let Some(ty) = prop.type_ref.get() else {
                return Err(invalid(format!("{} is undefined", self.describe(property))));
            };
            if self.item_type_of(ty) != ty {
                return Err(invalid(format!(
                    "key property {} can't be collection-valued",
                    self.describe(property)
                )));
            }
            let eligible = self
                .primitive_kind_of(ty)
                .map(|k| k.key_eligible())
                .unwrap_or(false);
            if !eligible {
                return Err(invalid(format!(
                    "{} is not a valid key property type",
                    self.describe(ty)
                )));
            }
            if prop.nullable.get().unwrap_or(true) {
                return Err(invalid(format!(
                    "key property {} must not be nullable",
                    self.describe(property)
                )));
            }
            let alias_key = match alias {
                Some(a) => a,
                None => path[0].clone(),
            };
            if path.len() > 1 && et.table.contains(&alias_key) {
                return Err(invalid(format!(
                    "key alias {alias_key} collides with a property name"
                )));
            }
            if et.key_dict.borrow().contains_key(&alias_key) {
                return Err(invalid(format!("duplicate key part {alias_key}")));
            }
            et.key_dict
                .borrow_mut()
                .insert(alias_key, (path, property));
        }
        Ok(())
    }

    /// Follows a path of structural properties down from `t`, descending
    /// through single-valued complex properties. Returns the terminal
    /// property or a description of what went wrong.
    pub(crate) fn resolve_structural_path(
        &self,
        t: Element,
        path: &[String],
    ) -> Result<Element, String> {
        if path.is_empty() {
            return Err("empty property path".to_string());
        }
        let mut current_type = t;
        let last = path.len() - 1;
        for (i, segment) in path.iter().enumerate() {
            let Some(p) = self.get(current_type, segment) else {
                return Err(format!(
                    "{} has no property {segment}",
                    self.describe(current_type)
                ));
            };
            let pd = self.data(p);
            let Payload::Property(prop) = &pd.payload else {
                return Err(format!("{} is not a structural property", self.describe(p)));
            };
            if i == last {
                return Ok(p);
            }
            let Some(ty) = prop.type_ref.get() else {
                return Err(format!("{} is undefined", self.describe(p)));
            };
            if self.item_type_of(ty) != ty {
                return Err(format!("{} is collection-valued", self.describe(p)));
            }
            if self.kind_of(ty) != ElementKind::ComplexType {
                return Err(format!("{} is not a complex property", self.describe(p)));
            }
            current_type = ty;
        }
        Err("empty property path".to_string())
    }

    /// Marks an entity type as the target of a containment navigation.
    /// Only one type in a base chain can be contained.
    pub(crate) fn set_contained(&self, t: Element) -> Result<(), ModelError> {
        let d = self.data(t);
        let Payload::EntityType(et) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(t),
                expected: "an entity type",
            });
        };
        if !et.table.is_closed() {
            return Err(ModelError::IncompleteType(self.describe(t)));
        }
        match et.contained.get() {
            Some(true) => return Ok(()),
            Some(false) => {
                return Err(ModelError::InvalidNavigation {
                    name: self.describe(t),
                    detail: "a type derived from a contained type can't be contained".to_string(),
                })
            }
            None => {}
        }
        let mut current = self.base_type_of(t);
        while let Some(b) = current {
            if let Payload::EntityType(bet) = &self.data(b).payload {
                if bet.contained.get() == Some(true) {
                    return Err(ModelError::InvalidNavigation {
                        name: self.describe(t),
                        detail: format!("{} is already contained", self.describe(b)),
                    });
                }
                bet.contained.set(Some(false));
            }
            current = self.base_type_of(b);
        }
        et.contained.set(Some(true));
        Ok(())
    }
}
