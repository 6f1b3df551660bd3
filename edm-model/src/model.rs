//! The model root: element storage, declaration, and closure of the whole
//! model.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use edm_names::{is_simple_identifier, Namespace, QualifiedName};

use crate::builtins;
use crate::element::{Declaration, Element, ElementData, ElementKind, Payload};
use crate::errors::{DeclareError, ModelError};
use crate::scope::NameTable;

/// Namespace aliases that always refer to the built-in vocabularies.
const RESERVED_ALIASES: [&str; 4] = ["Edm", "odata", "System", "Transient"];

pub(crate) const ROOT: Element = Element(0);

/// Payload of the model root, a scope over schemas.
pub(crate) struct ModelData {
    pub(crate) table: NameTable,
}

/// An entity data model under construction.
///
/// The model owns every element and hands out [`Element`] handles. A fresh
/// model already contains the closed `Edm` and `odata` schemas; everything
/// else is added with [`declare`](Self::declare), wired together with the
/// reference operations of the other modules, and finished with
/// [`close`](Self::close).
///
/// All operations take `&self`; construction is single threaded and
/// callbacks run synchronously on the stack of the call that triggers
/// them. A callback has no way to return an error, so failures inside one
/// are recorded and reported by the public call that fired it, and any
/// recorded failure also makes the final [`close`](Self::close) fail: the
/// model never claims to be complete after a reference went wrong.
pub struct EntityModel {
    elements: RefCell<Vec<Rc<ElementData>>>,
    /// Registration order of name callbacks across all scopes.
    seq: Cell<u64>,
    /// Failures recorded by callbacks, drained by the triggering call.
    errors: RefCell<Vec<ModelError>>,
    /// First recorded failure, kept for [`close`](Self::close).
    poison: RefCell<Option<ModelError>>,
    /// Set once the whole-model checks have passed.
    validated: Cell<bool>,
    edm: Cell<Element>,
    odata: Cell<Element>,
}

impl EntityModel {
    /// Creates a model holding the built-in `Edm` and `odata` schemas,
    /// both already closed.
    pub fn new() -> Self {
        let model = EntityModel {
            elements: RefCell::new(vec![Rc::new(ElementData::new(
                Payload::Model(ModelData {
                    table: NameTable::new(),
                }),
                0,
            ))]),
            seq: Cell::new(0),
            errors: RefCell::new(Vec::new()),
            poison: RefCell::new(None),
            validated: Cell::new(false),
            edm: Cell::new(ROOT),
            odata: Cell::new(ROOT),
        };
        let (edm, odata) = builtins::install(&model);
        model.edm.set(edm);
        model.odata.set(odata);
        model
    }

    /// The root scope holding schemas by namespace.
    pub fn root(&self) -> Element {
        ROOT
    }

    /// The built-in `Edm` schema.
    pub fn edm(&self) -> Element {
        self.edm.get()
    }

    /// The built-in `odata` schema.
    pub fn odata(&self) -> Element {
        self.odata.get()
    }

    /// The kind of an element.
    pub fn kind_of(&self, e: Element) -> ElementKind {
        self.data(e).payload.kind()
    }

    /// The defining name of an element, if it has been declared.
    pub fn name_of(&self, e: Element) -> Option<String> {
        self.data(e).name.borrow().clone()
    }

    /// The qualified name of an element, if it has been declared.
    pub fn qname_of(&self, e: Element) -> Option<String> {
        self.data(e).qname.borrow().clone()
    }

    /// The scope of an element's first declaration.
    pub fn owner_of(&self, e: Element) -> Option<Element> {
        self.data(e).owner.get()
    }

    /// Creates a new element from `declaration` and declares it in `scope`
    /// under `name`.
    ///
    /// The first declaration fixes the element's name, qualified name and
    /// owner for good; use [`alias`](Self::alias) for additional names. If
    /// the declaration is rejected the element keeps no identity and the
    /// attempt leaves no trace in the scope.
    pub fn declare(
        &self,
        scope: Element,
        name: &str,
        declaration: Declaration,
    ) -> Result<Element, ModelError> {
        let is_member = matches!(declaration, Declaration::Member { .. });
        let (payload, dependencies) = declaration.into_payload();
        let e = self.alloc(payload, dependencies);
        if is_member {
            self.prepare_member(scope, name, e)?;
        }
        self.first_declare(scope, name, e)?;
        if is_member {
            self.register_member(scope, e);
        }
        self.surface()?;
        Ok(e)
    }

    fn first_declare(&self, scope: Element, name: &str, e: Element) -> Result<(), ModelError> {
        let d = self.data(e);
        debug_assert!(d.owner.get().is_none());
        if let Some(table) = d.payload.table() {
            if !table.is_empty() {
                return Err(DeclareError::NotEmpty(self.describe(e)).into());
            }
        }
        let qname = self.qualify_name(scope, name);
        *d.name.borrow_mut() = Some(name.to_string());
        *d.qname.borrow_mut() = Some(qname);
        d.owner.set(Some(scope));
        if let Err(err) = self.insert_quiet(scope, name, e) {
            *d.name.borrow_mut() = None;
            *d.qname.borrow_mut() = None;
            d.owner.set(None);
            return Err(err);
        }
        Ok(())
    }

    /// Marks the end of an element's own declaration content.
    ///
    /// Every element whose completion is deferred starts with one
    /// outstanding dependency standing for its unfinished declaration;
    /// this releases it. Once the count reaches zero the element completes
    /// and, if it is a type or container, closes. An element whose count
    /// is already zero is complete and can't be reopened.
    pub fn end_declaration(&self, e: Element) -> Result<(), ModelError> {
        if self.data(e).dependencies.get() == 0 {
            return Err(ModelError::Frozen(self.describe(e)));
        }
        self.resolve_dependency(e);
        self.surface()
    }

    /// Adds one outstanding reason `e` can't complete yet.
    pub(crate) fn add_dependency(&self, e: Element) {
        let d = self.data(e);
        d.dependencies.set(d.dependencies.get() + 1);
    }

    /// Releases one outstanding dependency of `e`, completing it when the
    /// count reaches zero. Failures of the completion step are recorded.
    pub(crate) fn resolve_dependency(&self, e: Element) {
        let d = self.data(e);
        debug_assert!(d.dependencies.get() > 0);
        let remaining = d.dependencies.get().saturating_sub(1);
        d.dependencies.set(remaining);
        if remaining == 0 {
            if let Err(err) = self.complete_element(e) {
                self.record(err);
            }
        }
    }

    fn complete_element(&self, e: Element) -> Result<(), ModelError> {
        match self.kind_of(e) {
            ElementKind::EntityType | ElementKind::ComplexType => self.close_structured(e),
            ElementKind::EnumType => self.close_enum(e),
            ElementKind::EntityContainer => self.close_container(e),
            _ => Ok(()),
        }
    }

    /// Looks up a qualified name: namespace against the root, then the
    /// name within the schema.
    pub fn qualified_get(&self, qname: &QualifiedName) -> Option<Element> {
        self.get(ROOT, qname.namespace.as_str())
            .and_then(|schema| self.get(schema, qname.name.as_str()))
    }

    /// [`tell`](Self::tell) against a qualified name.
    ///
    /// Waits on the namespace against the root, then on the name within
    /// the schema. The callback receives `None` as soon as either half is
    /// known to be missing: when the root closes without the namespace, or
    /// the schema closes without the name.
    pub fn qualified_tell(
        &self,
        qname: &QualifiedName,
        callback: impl FnOnce(&EntityModel, Option<Element>) + 'static,
    ) -> Result<(), ModelError> {
        let name = qname.name.to_string();
        self.tell(ROOT, qname.namespace.as_str(), move |m, schema| {
            match schema {
                None => callback(m, None),
                Some(schema) => {
                    if let Err(err) = m.tell(schema, &name, callback) {
                        m.record(err);
                    }
                }
            }
        })
    }

    /// Rewrites a possibly aliased qualified name onto the schema's
    /// defining namespace. Fails if the namespace is not declared at all.
    pub fn canonicalize_qname(&self, qname: &QualifiedName) -> Result<QualifiedName, ModelError> {
        let Some(schema) = self.get(ROOT, qname.namespace.as_str()) else {
            return Err(ModelError::UnresolvedReference(qname.to_string()));
        };
        let canonical = self
            .name_of(schema)
            .ok_or_else(|| ModelError::NotDeclared(self.describe(schema)))?;
        let namespace =
            Namespace::new(canonical).map_err(|err| ModelError::Declare(err.into()))?;
        Ok(QualifiedName::new(namespace, qname.name.clone()))
    }

    /// Declares `schema` under an alias.
    ///
    /// The alias must be a simple identifier and not one of the reserved
    /// aliases `Edm`, `odata`, `System` and `Transient`.
    pub fn alias_schema(&self, alias: &str, schema: Element) -> Result<(), ModelError> {
        if RESERVED_ALIASES.contains(&alias) {
            return Err(DeclareError::ReservedAlias(alias.to_string()).into());
        }
        if !is_simple_identifier(alias) {
            return Err(DeclareError::BadName(edm_names::NameError::BadSimpleIdentifier(
                alias.to_string(),
            ))
            .into());
        }
        if self.kind_of(schema) != ElementKind::Schema {
            return Err(ModelError::WrongKind {
                name: self.describe(schema),
                expected: "a schema",
            });
        }
        self.alias(ROOT, alias, schema)
    }

    /// Closes the model.
    ///
    /// Closing the root fires the callbacks still waiting on undeclared
    /// namespaces and then the root's close callbacks, which is where
    /// entity containers resolve their navigation bindings. After that
    /// every schema must already be closed; types left open inside them
    /// are diagnosed as inheritance cycles or reported through the errors
    /// their forced closure raises. Cross-type checks run last, when every
    /// type has settled.
    ///
    /// Closing an already closed model is a no-op. If any deferred
    /// reference failed along the way, closing reports that first failure
    /// instead of completing.
    pub fn close(&self) -> Result<(), ModelError> {
        self.close_root()?;
        self.surface()
    }

    pub(crate) fn close_root(&self) -> Result<(), ModelError> {
        if self.validated.get() {
            return Ok(());
        }
        if let Some(poisoned) = self.poison.borrow().clone() {
            return Err(poisoned);
        }
        self.close_table(ROOT)?;
        self.surface()?;
        if let Some(poisoned) = self.poison.borrow().clone() {
            return Err(poisoned);
        }
        for (name, schema) in self.entries(ROOT) {
            if self.name_of(schema).as_deref() != Some(name.as_str()) {
                continue;
            }
            if !self.is_closed(schema) {
                return Err(ModelError::SchemaStillOpen(name));
            }
        }
        for (name, schema) in self.entries(ROOT) {
            if self.name_of(schema).as_deref() != Some(name.as_str()) {
                continue;
            }
            self.detect_circular_refs(schema)?;
        }
        for (name, schema) in self.entries(ROOT) {
            if self.name_of(schema).as_deref() != Some(name.as_str()) {
                continue;
            }
            if schema == self.edm() || schema == self.odata() {
                continue;
            }
            for (item_name, item) in self.entries(schema) {
                if self.owner_of(item) != Some(schema)
                    || self.name_of(item).as_deref() != Some(item_name.as_str())
                {
                    continue;
                }
                match self.kind_of(item) {
                    ElementKind::EntityType | ElementKind::ComplexType => {
                        self.apply_type_annotations(item)?;
                        self.check_navigation(item)?;
                    }
                    _ => {}
                }
            }
        }
        self.surface()?;
        self.validated.set(true);
        Ok(())
    }

    /// The entity container the model exposes, if any.
    ///
    /// A model may expose at most one; a second container anywhere in the
    /// model's schemas is an error.
    pub fn get_container(&self) -> Result<Option<Element>, ModelError> {
        let mut found: Option<Element> = None;
        for (schema_name, schema) in self.entries(ROOT) {
            if self.name_of(schema).as_deref() != Some(schema_name.as_str()) {
                continue;
            }
            for (item_name, item) in self.entries(schema) {
                if self.kind_of(item) != ElementKind::EntityContainer {
                    continue;
                }
                if self.name_of(item).as_deref() != Some(item_name.as_str()) {
                    continue;
                }
                match found {
                    None => found = Some(item),
                    Some(prev) if prev == item => {}
                    Some(prev) => {
                        return Err(ModelError::MultipleContainers(
                            self.describe(prev),
                            self.describe(item),
                        ));
                    }
                }
            }
        }
        Ok(found)
    }

    pub(crate) fn data(&self, e: Element) -> Rc<ElementData> {
        Rc::clone(&self.elements.borrow()[e.0])
    }

    pub(crate) fn alloc(&self, payload: Payload, dependencies: u32) -> Element {
        let mut elements = self.elements.borrow_mut();
        let e = Element(elements.len());
        elements.push(Rc::new(ElementData::new(payload, dependencies)));
        e
    }

    pub(crate) fn next_seq(&self) -> u64 {
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        seq
    }

    /// Records a failure raised inside a callback.
    pub(crate) fn record(&self, err: ModelError) {
        log::debug!("deferred failure: {err}");
        if self.poison.borrow().is_none() {
            *self.poison.borrow_mut() = Some(err.clone());
        }
        self.errors.borrow_mut().push(err);
    }

    /// Reports the first failure recorded since the last drain, logging
    /// any others.
    pub(crate) fn surface(&self) -> Result<(), ModelError> {
        let mut errors = self.errors.borrow_mut();
        if errors.is_empty() {
            return Ok(());
        }
        let first = errors.remove(0);
        for err in errors.drain(..) {
            log::warn!("failure shadowed by earlier one: {err}");
        }
        Err(first)
    }

    /// The element's qualified name, or its plain name, or a kind
    /// placeholder for undeclared elements. For error messages.
    pub(crate) fn describe(&self, e: Element) -> String {
        let d = self.data(e);
        let qname = d.qname.borrow();
        if let Some(q) = qname.as_ref() {
            return q.clone();
        }
        let name = d.name.borrow();
        match name.as_ref() {
            Some(n) => n.clone(),
            None => format!("<{}>", d.payload.kind().describe()),
        }
    }

    /// The qualified name `name` will take when declared in `scope`:
    /// unchanged at the root, `Type/name` inside a structured type,
    /// `owner.name` elsewhere. A scope that is itself undeclared leaves
    /// the name unqualified.
    pub(crate) fn qualify_name(&self, scope: Element, name: &str) -> String {
        let d = self.data(scope);
        if matches!(d.payload, Payload::Model(_)) {
            return name.to_string();
        }
        let owner_name = d.name.borrow();
        match (owner_name.as_ref(), &d.payload) {
            (Some(n), Payload::EntityType(_) | Payload::ComplexType(_)) => format!("{n}/{name}"),
            (Some(n), _) => format!("{n}.{name}"),
            (None, _) => name.to_string(),
        }
    }
}

impl Default for EntityModel {
    fn default() -> Self {
        EntityModel::new()
    }
}
