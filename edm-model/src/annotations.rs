//! Annotation terms, applied annotations and labeled expressions.
//!
//! A term is a schema-declared, typed name; an annotation applies a term,
//! with an optional qualifier, to some element of the model. Values are
//! constants only. Term references defer like type references, so a model
//! can be annotated with terms that are declared later, or never, in which
//! case the miss is reported when the term's schema closes.

use std::cell::{Cell, RefCell};

use edm_names::{Path, TermRef, TypeName};

use crate::element::{Element, ElementKind, Payload};
use crate::errors::{DeclareError, ModelError};
use crate::model::EntityModel;

/// A constant annotation value.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstExpr {
    /// An explicit null.
    Null,
    /// A boolean constant.
    Bool(bool),
    /// An integer constant.
    Int(i64),
    /// A floating point constant.
    Float(f64),
    /// A string constant.
    Str(String),
    /// An enumeration member, written `Namespace.Type/Member`.
    EnumMember(String),
    /// A path through the annotated element's properties.
    PathValue(Path),
}

/// One applied annotation: the resolved term, the qualifier it was applied
/// under, and the constant value.
#[derive(Clone)]
pub(crate) struct AnnotationRecord {
    pub(crate) term: Element,
    pub(crate) qualifier: Option<String>,
    pub(crate) value: ConstExpr,
}

pub(crate) struct TermData {
    /// The item type; collections keep the flag separate.
    pub(crate) type_ref: Cell<Option<Element>>,
    pub(crate) collection: Cell<bool>,
    pub(crate) nullable: Cell<Option<bool>>,
    pub(crate) default_value: RefCell<Option<ConstExpr>>,
}

impl TermData {
    pub(crate) fn new() -> Self {
        TermData {
            type_ref: Cell::new(None),
            collection: Cell::new(false),
            nullable: Cell::new(None),
            default_value: RefCell::new(None),
        }
    }
}

pub(crate) struct LabeledData {
    pub(crate) value: ConstExpr,
}

impl LabeledData {
    pub(crate) fn new(value: ConstExpr) -> Self {
        LabeledData { value }
    }
}

impl EntityModel {
    /// Sets the type of a term by name.
    ///
    /// The reference resolves as soon as the name declares, without
    /// waiting for the type to close, and releases one of the term's
    /// outstanding dependencies when it does.
    pub fn set_term_type_name(
        &self,
        term: Element,
        type_name: &TypeName,
    ) -> Result<(), ModelError> {
        if self.kind_of(term) != ElementKind::Term {
            return Err(ModelError::WrongKind {
                name: self.describe(term),
                expected: "a term",
            });
        }
        if self.data(term).dependencies.get() == 0 {
            return Err(ModelError::Frozen(self.describe(term)));
        }
        self.add_dependency(term);
        let collection = type_name.collection;
        let qname = type_name.qname.clone();
        self.qualified_tell(&type_name.qname, move |m, resolved| {
            let assigned = match resolved {
                None => Err(ModelError::UnresolvedReference(qname.to_string())),
                Some(ty) => m.assign_term_type(term, ty, collection),
            };
            if let Err(err) = assigned {
                m.record(err);
            }
            m.resolve_dependency(term);
        })?;
        self.surface()
    }

    fn assign_term_type(
        &self,
        term: Element,
        ty: Element,
        collection: bool,
    ) -> Result<(), ModelError> {
        if !self.data(ty).payload.is_type() || self.kind_of(ty) == ElementKind::CollectionType {
            return Err(ModelError::WrongKind {
                name: self.describe(ty),
                expected: "a type",
            });
        }
        let d = self.data(term);
        let Payload::Term(t) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(term),
                expected: "a term",
            });
        };
        t.type_ref.set(Some(ty));
        t.collection.set(collection);
        Ok(())
    }

    /// Applies a constant annotation to `target`.
    ///
    /// The term reference may point forward; the annotation is recorded
    /// once the term declares. A miss is an unresolved reference, reported
    /// when the term's namespace or schema closes without it. Applying the
    /// same term with the same qualifier twice to one element is a
    /// duplicate.
    pub fn annotate(
        &self,
        target: Element,
        term: &TermRef,
        value: ConstExpr,
    ) -> Result<(), ModelError> {
        let reference = term.clone();
        self.qualified_tell(&term.term, move |m, resolved| {
            let applied = match resolved {
                None => Err(ModelError::UnresolvedReference(reference.to_string())),
                Some(declared) => m.apply_annotation(target, declared, &reference, value),
            };
            if let Err(err) = applied {
                m.record(err);
            }
        })?;
        self.surface()
    }

    fn apply_annotation(
        &self,
        target: Element,
        declared: Element,
        reference: &TermRef,
        value: ConstExpr,
    ) -> Result<(), ModelError> {
        if self.kind_of(declared) != ElementKind::Term {
            return Err(ModelError::WrongKind {
                name: self.describe(declared),
                expected: "a term",
            });
        }
        // Key on the term's declared name, so an alias reference and a
        // canonical reference to the same term collide.
        let qname = self
            .qname_of(declared)
            .ok_or_else(|| ModelError::NotDeclared(self.describe(declared)))?;
        let qualifier = reference.qualifier.as_ref().map(|q| q.as_str().to_string());
        let key = match &qualifier {
            Some(q) => format!("@{qname}#{q}"),
            None => format!("@{qname}"),
        };
        let d = self.data(target);
        let mut annotations = d.annotations.borrow_mut();
        if annotations.contains_key(&key) {
            return Err(DeclareError::Duplicate(key).into());
        }
        log::debug!("annotating {} with {key}", self.describe(target));
        annotations.insert(
            key,
            AnnotationRecord {
                term: declared,
                qualifier,
                value,
            },
        );
        Ok(())
    }

    /// The annotations applied to an element, in application order, as
    /// term, qualifier and value.
    pub fn annotations_of(&self, e: Element) -> Vec<(Element, Option<String>, ConstExpr)> {
        self.data(e)
            .annotations
            .borrow()
            .values()
            .map(|r| (r.term, r.qualifier.clone(), r.value.clone()))
            .collect()
    }

    /// The constant value of a labeled expression.
    pub fn labeled_value_of(&self, e: Element) -> Option<ConstExpr> {
        match &self.data(e).payload {
            Payload::Labeled(l) => Some(l.value.clone()),
            _ => None,
        }
    }

    /// Copies annotations from type definitions onto the properties they
    /// type. Runs over each structured type when the model closes, after
    /// every schema has settled.
    pub(crate) fn apply_type_annotations(&self, t: Element) -> Result<(), ModelError> {
        for (name, member) in self.entries(t) {
            if self.kind_of(member) != ElementKind::Property
                || self.owner_of(member) != Some(t)
                || self.name_of(member).as_deref() != Some(name.as_str())
            {
                continue;
            }
            let Some(ty) = self.type_of(member) else {
                continue;
            };
            let ty = self.item_type_of(ty);
            if self.kind_of(ty) != ElementKind::TypeDefinition {
                continue;
            }
            let records: Vec<(String, AnnotationRecord)> = self
                .data(ty)
                .annotations
                .borrow()
                .iter()
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect();
            for (key, record) in records {
                let d = self.data(member);
                let mut annotations = d.annotations.borrow_mut();
                if annotations.contains_key(&key) {
                    return Err(DeclareError::Duplicate(key).into());
                }
                annotations.insert(key, record);
            }
        }
        Ok(())
    }
}
