//! Entity containers, their sets, singletons and imports, and the
//! schema-level actions and functions the imports point at.
//!
//! A container is a scope over entity sets, singletons and imports. Like a
//! structured type it stays open while references made by its members are
//! outstanding: an entity set holds its container open until the set's
//! entity type has closed, imports until their callable resolves. The one
//! thing a container can't settle on its own is navigation bindings, which
//! need every involved type and container finished; those wait for the
//! model root to close.

use std::cell::{Cell, RefCell};

use edm_names::{is_simple_identifier, NameError, Path, QualifiedName, TypeName};
use indexmap::IndexMap;

use crate::element::{Element, ElementKind, Payload};
use crate::errors::{DeclareError, ModelError};
use crate::model::EntityModel;
use crate::scope::NameTable;

pub(crate) struct ContainerData {
    pub(crate) table: NameTable,
    /// The extended container, filled by resolution.
    pub(crate) extends: Cell<Option<Element>>,
}

impl ContainerData {
    pub(crate) fn new() -> Self {
        ContainerData {
            table: NameTable::new(),
            extends: Cell::new(None),
        }
    }
}

/// A navigation binding as recorded, path segments plus the target text.
pub(crate) struct NavigationBinding {
    pub(crate) path: Vec<String>,
    pub(crate) target: String,
}

/// Shared payload of entity sets and singletons.
pub(crate) struct EntitySetData {
    pub(crate) entity_type: Cell<Option<Element>>,
    /// Whether the set is advertised in the service document.
    pub(crate) in_service: bool,
    pub(crate) bindings: RefCell<Vec<NavigationBinding>>,
    /// Bindings resolved at model closure, keyed by path.
    pub(crate) resolved: RefCell<IndexMap<String, Element>>,
}

impl EntitySetData {
    pub(crate) fn new(in_service: bool) -> Self {
        EntitySetData {
            entity_type: Cell::new(None),
            in_service,
            bindings: RefCell::new(Vec::new()),
            resolved: RefCell::new(IndexMap::new()),
        }
    }
}

pub(crate) struct ImportData {
    pub(crate) target: Cell<Option<Element>>,
    pub(crate) entity_set: RefCell<Option<String>>,
    pub(crate) resolved_set: Cell<Option<Element>>,
}

impl ImportData {
    pub(crate) fn new() -> Self {
        ImportData {
            target: Cell::new(None),
            entity_set: RefCell::new(None),
            resolved_set: Cell::new(None),
        }
    }
}

pub(crate) struct Parameter {
    pub(crate) name: String,
    pub(crate) type_ref: Cell<Option<Element>>,
    pub(crate) collection: bool,
    pub(crate) nullable: Option<bool>,
}

pub(crate) struct Overload {
    pub(crate) is_bound: bool,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) return_type: Cell<Option<Element>>,
    pub(crate) return_collection: bool,
    pub(crate) entity_set_path: Option<String>,
}

pub(crate) struct CallableData {
    pub(crate) is_function: bool,
    pub(crate) overloads: RefCell<Vec<Overload>>,
}

impl CallableData {
    pub(crate) fn new(is_function: bool) -> Self {
        CallableData {
            is_function,
            overloads: RefCell::new(Vec::new()),
        }
    }
}

/// One parameter of an [`OverloadDecl`].
#[derive(Clone, Debug)]
pub struct ParameterDecl {
    /// The parameter name, unique within its overload.
    pub name: String,
    /// The parameter type; the reference may point forward.
    pub type_name: TypeName,
    /// Explicit nullability for single-valued parameters.
    pub nullable: Option<bool>,
}

/// One overload of an action or function, as handed to
/// [`EntityModel::add_overload`].
#[derive(Clone, Debug)]
pub struct OverloadDecl {
    /// Whether the first parameter is a binding parameter.
    pub is_bound: bool,
    /// The ordered parameters.
    pub parameters: Vec<ParameterDecl>,
    /// The return type. Functions must return; actions may.
    pub return_type: Option<TypeName>,
    /// Path advertising which entity set the result belongs to.
    pub entity_set_path: Option<String>,
}

impl EntityModel {
    /// Points a container at the container it extends, by qualified name.
    ///
    /// The reference resolves as soon as the name declares and holds the
    /// container open until it does. When the container closes, the
    /// extended container's entries known at that moment are copied in,
    /// skipping names already present, so mutual extension settles rather
    /// than looping.
    pub fn set_container_extends_name(
        &self,
        c: Element,
        qname: &QualifiedName,
    ) -> Result<(), ModelError> {
        if self.kind_of(c) != ElementKind::EntityContainer {
            return Err(ModelError::WrongKind {
                name: self.describe(c),
                expected: "an entity container",
            });
        }
        if self.data(c).dependencies.get() == 0 {
            return Err(ModelError::Frozen(self.describe(c)));
        }
        self.add_dependency(c);
        let wanted = qname.clone();
        self.qualified_tell(qname, move |m, resolved| {
            let stored = match resolved {
                None => Err(ModelError::UnresolvedReference(wanted.to_string())),
                Some(found) => m.assign_extends(c, found),
            };
            if let Err(err) = stored {
                m.record(err);
            }
            m.resolve_dependency(c);
        })?;
        self.surface()
    }

    fn assign_extends(&self, c: Element, found: Element) -> Result<(), ModelError> {
        if self.kind_of(found) != ElementKind::EntityContainer {
            return Err(ModelError::WrongKind {
                name: self.describe(found),
                expected: "an entity container",
            });
        }
        let d = self.data(c);
        let Payload::Container(container) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(c),
                expected: "an entity container",
            });
        };
        container.extends.set(Some(found));
        Ok(())
    }

    /// Completes a container: folds in the extended container's entries,
    /// closes the scope, and leaves binding resolution for the root's
    /// closure.
    pub(crate) fn close_container(&self, c: Element) -> Result<(), ModelError> {
        let d = self.data(c);
        let Payload::Container(container) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(c),
                expected: "an entity container",
            });
        };
        if container.table.is_closed() {
            return Ok(());
        }
        if let Some(extended) = container.extends.get() {
            for (name, item) in self.entries(extended) {
                if container.table.contains(&name) {
                    continue;
                }
                self.insert_quiet(c, &name, item)?;
            }
        }
        self.close_table(c)?;
        self.tell_close(self.root(), move |m| {
            if let Err(err) = m.resolve_container_bindings(c) {
                m.record(err);
            }
        })?;
        Ok(())
    }

    /// Sets the entity type of an entity set or singleton by name.
    ///
    /// The reference waits for the type itself to close, not just for the
    /// name, and holds the owning container open until then; an entity set
    /// needs the type's key settled and must find one defined. Singletons
    /// skip the key requirement.
    pub fn set_entity_type_name(
        &self,
        s: Element,
        type_name: &TypeName,
    ) -> Result<(), ModelError> {
        let needs_key = match self.kind_of(s) {
            ElementKind::EntitySet => true,
            ElementKind::Singleton => false,
            _ => {
                return Err(ModelError::WrongKind {
                    name: self.describe(s),
                    expected: "an entity set or singleton",
                })
            }
        };
        if type_name.collection {
            return Err(ModelError::WrongKind {
                name: type_name.to_string(),
                expected: "an entity type",
            });
        }
        let Some(container) = self.owner_of(s) else {
            return Err(ModelError::NotDeclared(self.describe(s)));
        };
        if self.is_closed(container) {
            return Err(ModelError::Frozen(self.describe(s)));
        }
        self.add_dependency(container);
        let qname = type_name.qname.clone();
        self.qualified_tell(&type_name.qname, move |m, resolved| match resolved {
            None => {
                m.record(ModelError::UnresolvedReference(qname.to_string()));
                m.resolve_dependency(container);
            }
            Some(ty) => match m.assign_set_type(s, ty) {
                Err(err) => {
                    m.record(err);
                    m.resolve_dependency(container);
                }
                Ok(()) => {
                    let queued = m.tell_close(ty, move |m| {
                        if needs_key && !m.key_defined(ty) {
                            m.record(ModelError::InvalidKey {
                                entity_type: m.describe(ty),
                                detail: "an entity set requires a key".to_string(),
                            });
                        }
                        m.resolve_dependency(container);
                    });
                    if let Err(err) = queued {
                        m.record(err);
                        m.resolve_dependency(container);
                    }
                }
            },
        })?;
        self.surface()
    }

    fn assign_set_type(&self, s: Element, ty: Element) -> Result<(), ModelError> {
        if self.kind_of(ty) != ElementKind::EntityType {
            return Err(ModelError::WrongKind {
                name: self.describe(ty),
                expected: "an entity type",
            });
        }
        let d = self.data(s);
        match &d.payload {
            Payload::EntitySet(set) | Payload::Singleton(set) => {
                set.entity_type.set(Some(ty));
                Ok(())
            }
            _ => Err(ModelError::WrongKind {
                name: self.describe(s),
                expected: "an entity set or singleton",
            }),
        }
    }

    /// Records a navigation binding on an entity set or singleton.
    ///
    /// The path walks the set's entity type through single-valued complex
    /// properties to a navigation property; type-cast segments are not
    /// supported. The target names a sibling set or singleton, or one in
    /// another container written `Qualified.Container/Name`. Nothing
    /// resolves until the model closes.
    pub fn add_navigation_binding(
        &self,
        s: Element,
        path: &Path,
        target: &str,
    ) -> Result<(), ModelError> {
        let Some(container) = self.owner_of(s) else {
            return Err(ModelError::NotDeclared(self.describe(s)));
        };
        if self.is_closed(container) {
            return Err(ModelError::Frozen(self.describe(s)));
        }
        if target.is_empty() {
            return Err(DeclareError::Unnamed.into());
        }
        let Some(names) = path.identifiers() else {
            return Err(ModelError::InvalidNavigation {
                name: self.describe(s),
                detail: format!("binding path {path} can't use type casts"),
            });
        };
        let d = self.data(s);
        let (Payload::EntitySet(set) | Payload::Singleton(set)) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(s),
                expected: "an entity set or singleton",
            });
        };
        set.bindings.borrow_mut().push(NavigationBinding {
            path: names.iter().map(|n| n.as_str().to_string()).collect(),
            target: target.to_string(),
        });
        Ok(())
    }

    /// Resolves the recorded bindings of every set and singleton owned by
    /// `c`. Runs from the root's close callbacks, when all the involved
    /// types and containers have settled.
    pub(crate) fn resolve_container_bindings(&self, c: Element) -> Result<(), ModelError> {
        for (name, item) in self.entries(c) {
            if self.owner_of(item) != Some(c)
                || self.name_of(item).as_deref() != Some(name.as_str())
            {
                // entries folded in from an extended container resolve there
                continue;
            }
            let item_data = self.data(item);
            let (Payload::EntitySet(set) | Payload::Singleton(set)) = &item_data.payload else {
                continue;
            };
            let bindings: Vec<(Vec<String>, String)> = set
                .bindings
                .borrow()
                .iter()
                .map(|b| (b.path.clone(), b.target.clone()))
                .collect();
            for (path, target_name) in bindings {
                let resolved = self.resolve_binding(c, item, &path, &target_name)?;
                let key = path.join("/");
                let mut resolved_map = set.resolved.borrow_mut();
                if resolved_map.contains_key(&key) {
                    return Err(ModelError::InvalidNavigation {
                        name: self.describe(item),
                        detail: format!("duplicate binding for {key}"),
                    });
                }
                log::debug!("bound {key} of {} to {target_name}", self.describe(item));
                resolved_map.insert(key, resolved);
            }
        }
        Ok(())
    }

    fn resolve_binding(
        &self,
        c: Element,
        s: Element,
        path: &[String],
        target_name: &str,
    ) -> Result<Element, ModelError> {
        let fail = |detail: String| ModelError::InvalidNavigation {
            name: self.describe(s),
            detail,
        };
        let entity_type = match &self.data(s).payload {
            Payload::EntitySet(set) | Payload::Singleton(set) => set.entity_type.get(),
            _ => None,
        };
        let Some(entity_type) = entity_type else {
            return Err(ModelError::UndefinedType(self.describe(s)));
        };
        let np = self.resolve_partner_path(entity_type, path).map_err(&fail)?;

        let target = match target_name.split_once('/') {
            None => self.get(c, target_name),
            Some((container_name, set_name)) => {
                let qname: QualifiedName = container_name
                    .parse()
                    .map_err(|_| fail(format!("bad binding target {target_name}")))?;
                self.qualified_get(&qname)
                    .and_then(|other| self.get(other, set_name))
            }
        };
        let Some(target) = target else {
            return Err(ModelError::UnresolvedReference(target_name.to_string()));
        };
        match self.kind_of(target) {
            ElementKind::EntitySet | ElementKind::Singleton => {}
            _ => {
                return Err(ModelError::WrongKind {
                    name: self.describe(target),
                    expected: "an entity set or singleton",
                })
            }
        }
        let nav_target = self
            .type_of(np)
            .ok_or_else(|| ModelError::UndefinedType(self.describe(np)))?;
        let bound_type = self
            .type_of(target)
            .ok_or_else(|| ModelError::UndefinedType(self.describe(target)))?;
        if !self.is_derived_from(bound_type, nav_target, false)
            && !self.is_derived_from(nav_target, bound_type, false)
        {
            return Err(fail(format!(
                "{} can't hold {}",
                self.describe(target),
                self.describe(nav_target)
            )));
        }
        Ok(target)
    }

    /// Sets the target of an action or function import by qualified name.
    /// An action import must name an action, a function import a function.
    pub fn set_import_target_name(
        &self,
        i: Element,
        qname: &QualifiedName,
    ) -> Result<(), ModelError> {
        let wants_function = match self.kind_of(i) {
            ElementKind::ActionImport => false,
            ElementKind::FunctionImport => true,
            _ => {
                return Err(ModelError::WrongKind {
                    name: self.describe(i),
                    expected: "an action or function import",
                })
            }
        };
        let Some(container) = self.owner_of(i) else {
            return Err(ModelError::NotDeclared(self.describe(i)));
        };
        if self.is_closed(container) {
            return Err(ModelError::Frozen(self.describe(i)));
        }
        self.add_dependency(container);
        let wanted = qname.clone();
        self.qualified_tell(qname, move |m, resolved| {
            let stored = match resolved {
                None => Err(ModelError::UnresolvedReference(wanted.to_string())),
                Some(target) => m.assign_import_target(i, target, wants_function),
            };
            if let Err(err) = stored {
                m.record(err);
            }
            m.resolve_dependency(container);
        })?;
        self.surface()
    }

    fn assign_import_target(
        &self,
        i: Element,
        target: Element,
        wants_function: bool,
    ) -> Result<(), ModelError> {
        let matches_kind = match self.kind_of(target) {
            ElementKind::Function => wants_function,
            ElementKind::Action => !wants_function,
            _ => false,
        };
        if !matches_kind {
            return Err(ModelError::WrongKind {
                name: self.describe(target),
                expected: if wants_function {
                    "a function"
                } else {
                    "an action"
                },
            });
        }
        let d = self.data(i);
        match &d.payload {
            Payload::ActionImport(imp) | Payload::FunctionImport(imp) => {
                imp.target.set(Some(target));
                Ok(())
            }
            _ => Err(ModelError::WrongKind {
                name: self.describe(i),
                expected: "an action or function import",
            }),
        }
    }

    /// Advertises the entity set an import's results belong to, by name
    /// within the import's own container. Resolves when the name declares
    /// or, as a miss, when the container closes.
    pub fn set_import_entity_set(&self, i: Element, name: &str) -> Result<(), ModelError> {
        match self.kind_of(i) {
            ElementKind::ActionImport | ElementKind::FunctionImport => {}
            _ => {
                return Err(ModelError::WrongKind {
                    name: self.describe(i),
                    expected: "an action or function import",
                })
            }
        }
        let Some(container) = self.owner_of(i) else {
            return Err(ModelError::NotDeclared(self.describe(i)));
        };
        if self.is_closed(container) {
            return Err(ModelError::Frozen(self.describe(i)));
        }
        {
            let d = self.data(i);
            if let Payload::ActionImport(imp) | Payload::FunctionImport(imp) = &d.payload {
                *imp.entity_set.borrow_mut() = Some(name.to_string());
            }
        }
        let wanted = name.to_string();
        self.tell(container, name, move |m, resolved| {
            let stored = match resolved {
                None => Err(ModelError::UnresolvedReference(wanted)),
                Some(target) => match m.kind_of(target) {
                    ElementKind::EntitySet | ElementKind::Singleton => {
                        let d = m.data(i);
                        if let Payload::ActionImport(imp) | Payload::FunctionImport(imp) =
                            &d.payload
                        {
                            imp.resolved_set.set(Some(target));
                        }
                        Ok(())
                    }
                    _ => Err(ModelError::WrongKind {
                        name: m.describe(target),
                        expected: "an entity set or singleton",
                    }),
                },
            };
            if let Err(err) = stored {
                m.record(err);
            }
        })?;
        self.surface()
    }

    /// Adds one overload to an action or function.
    ///
    /// Functions must declare a return type. Parameter names must be
    /// unique within the overload, and an unbound overload must differ
    /// from every existing unbound one in its parameter-name signature.
    /// Parameter and return types may refer forward; each reference holds
    /// the callable open until it resolves.
    pub fn add_overload(&self, callable: Element, decl: OverloadDecl) -> Result<(), ModelError> {
        let is_function = match self.kind_of(callable) {
            ElementKind::Action => false,
            ElementKind::Function => true,
            _ => {
                return Err(ModelError::WrongKind {
                    name: self.describe(callable),
                    expected: "an action or function",
                })
            }
        };
        if self.data(callable).dependencies.get() == 0 {
            return Err(ModelError::Frozen(self.describe(callable)));
        }
        if is_function && decl.return_type.is_none() {
            return Err(ModelError::UndefinedType(self.describe(callable)));
        }
        let mut seen: Vec<&str> = Vec::new();
        for p in &decl.parameters {
            if !is_simple_identifier(&p.name) {
                return Err(DeclareError::BadName(NameError::BadSimpleIdentifier(
                    p.name.clone(),
                ))
                .into());
            }
            if seen.contains(&p.name.as_str()) {
                return Err(DeclareError::Duplicate(format!(
                    "{}({})",
                    self.describe(callable),
                    p.name
                ))
                .into());
            }
            seen.push(p.name.as_str());
        }
        if !decl.is_bound {
            let signature: Vec<&str> = decl.parameters.iter().map(|p| p.name.as_str()).collect();
            let d = self.data(callable);
            if let Payload::Callable(data) = &d.payload {
                for existing in data.overloads.borrow().iter() {
                    if existing.is_bound {
                        continue;
                    }
                    let existing_names: Vec<&str> =
                        existing.parameters.iter().map(|p| p.name.as_str()).collect();
                    if existing_names == signature {
                        return Err(DeclareError::Duplicate(format!(
                            "{}({})",
                            self.describe(callable),
                            signature.join(", ")
                        ))
                        .into());
                    }
                }
            }
        }
        let index = {
            let d = self.data(callable);
            let Payload::Callable(data) = &d.payload else {
                return Err(ModelError::WrongKind {
                    name: self.describe(callable),
                    expected: "an action or function",
                });
            };
            let mut overloads = data.overloads.borrow_mut();
            overloads.push(Overload {
                is_bound: decl.is_bound,
                parameters: decl
                    .parameters
                    .iter()
                    .map(|p| Parameter {
                        name: p.name.clone(),
                        type_ref: Cell::new(None),
                        collection: p.type_name.collection,
                        nullable: p.nullable,
                    })
                    .collect(),
                return_type: Cell::new(None),
                return_collection: decl
                    .return_type
                    .as_ref()
                    .map(|t| t.collection)
                    .unwrap_or(false),
                entity_set_path: decl.entity_set_path.clone(),
            });
            overloads.len() - 1
        };
        for (pi, p) in decl.parameters.iter().enumerate() {
            self.add_dependency(callable);
            let qname = p.type_name.qname.clone();
            self.qualified_tell(&p.type_name.qname, move |m, resolved| {
                let stored = match resolved {
                    None => Err(ModelError::UnresolvedReference(qname.to_string())),
                    Some(ty) => m.assign_overload_type(callable, index, Some(pi), ty),
                };
                if let Err(err) = stored {
                    m.record(err);
                }
                m.resolve_dependency(callable);
            })?;
        }
        if let Some(ret) = &decl.return_type {
            self.add_dependency(callable);
            let qname = ret.qname.clone();
            self.qualified_tell(&ret.qname, move |m, resolved| {
                let stored = match resolved {
                    None => Err(ModelError::UnresolvedReference(qname.to_string())),
                    Some(ty) => m.assign_overload_type(callable, index, None, ty),
                };
                if let Err(err) = stored {
                    m.record(err);
                }
                m.resolve_dependency(callable);
            })?;
        }
        self.surface()
    }

    fn assign_overload_type(
        &self,
        callable: Element,
        overload: usize,
        param: Option<usize>,
        ty: Element,
    ) -> Result<(), ModelError> {
        if !self.data(ty).payload.is_type() || self.kind_of(ty) == ElementKind::CollectionType {
            return Err(ModelError::WrongKind {
                name: self.describe(ty),
                expected: "a type",
            });
        }
        let d = self.data(callable);
        let Payload::Callable(data) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(callable),
                expected: "an action or function",
            });
        };
        let overloads = data.overloads.borrow();
        let Some(entry) = overloads.get(overload) else {
            return Ok(());
        };
        match param {
            Some(pi) => {
                if let Some(parameter) = entry.parameters.get(pi) {
                    parameter.type_ref.set(Some(ty));
                }
            }
            None => entry.return_type.set(Some(ty)),
        }
        Ok(())
    }

    /// The container a container extends, once the reference resolves.
    pub fn extends_of(&self, c: Element) -> Option<Element> {
        match &self.data(c).payload {
            Payload::Container(container) => container.extends.get(),
            _ => None,
        }
    }

    /// Whether an entity set is advertised in the service document.
    /// Singletons always are.
    pub fn in_service(&self, s: Element) -> bool {
        match &self.data(s).payload {
            Payload::EntitySet(set) | Payload::Singleton(set) => set.in_service,
            _ => false,
        }
    }

    /// The set or singleton a navigation binding points at, by binding
    /// path. Populated when the model closes.
    pub fn binding_target_of(&self, s: Element, path: &str) -> Option<Element> {
        match &self.data(s).payload {
            Payload::EntitySet(set) | Payload::Singleton(set) => {
                set.resolved.borrow().get(path).copied()
            }
            _ => None,
        }
    }

    /// The action or function behind an import, once resolved.
    pub fn import_target_of(&self, i: Element) -> Option<Element> {
        match &self.data(i).payload {
            Payload::ActionImport(imp) | Payload::FunctionImport(imp) => imp.target.get(),
            _ => None,
        }
    }

    /// The entity set advertised by an import, once resolved.
    pub fn import_entity_set_of(&self, i: Element) -> Option<Element> {
        match &self.data(i).payload {
            Payload::ActionImport(imp) | Payload::FunctionImport(imp) => imp.resolved_set.get(),
            _ => None,
        }
    }

    /// The entity set name an import advertises, as given.
    pub fn import_entity_set_name(&self, i: Element) -> Option<String> {
        match &self.data(i).payload {
            Payload::ActionImport(imp) | Payload::FunctionImport(imp) => {
                imp.entity_set.borrow().clone()
            }
            _ => None,
        }
    }

    /// The number of overloads added to an action or function.
    pub fn overload_count(&self, callable: Element) -> usize {
        match &self.data(callable).payload {
            Payload::Callable(data) => data.overloads.borrow().len(),
            _ => 0,
        }
    }

    /// The resolved type of a named parameter of an overload.
    pub fn parameter_type_of(
        &self,
        callable: Element,
        overload: usize,
        name: &str,
    ) -> Option<Element> {
        match &self.data(callable).payload {
            Payload::Callable(data) => data.overloads.borrow().get(overload).and_then(|o| {
                o.parameters
                    .iter()
                    .find(|p| p.name == name)
                    .and_then(|p| p.type_ref.get())
            }),
            _ => None,
        }
    }

    /// The resolved return type of an overload.
    pub fn return_type_of(&self, callable: Element, overload: usize) -> Option<Element> {
        match &self.data(callable).payload {
            Payload::Callable(data) => data
                .overloads
                .borrow()
                .get(overload)
                .and_then(|o| o.return_type.get()),
            _ => None,
        }
    }

    /// Declared facts about one overload: bound flag, whether the return
    /// is collection-valued, and the advertised entity set path.
    pub fn overload_info(
        &self,
        callable: Element,
        overload: usize,
    ) -> Option<(bool, bool, Option<String>)> {
        match &self.data(callable).payload {
            Payload::Callable(data) => data
                .overloads
                .borrow()
                .get(overload)
                .map(|o| (o.is_bound, o.return_collection, o.entity_set_path.clone())),
            _ => None,
        }
    }

    /// Collection flag and explicit nullability of a named parameter.
    pub fn parameter_info(
        &self,
        callable: Element,
        overload: usize,
        name: &str,
    ) -> Option<(bool, Option<bool>)> {
        match &self.data(callable).payload {
            Payload::Callable(data) => data.overloads.borrow().get(overload).and_then(|o| {
                o.parameters
                    .iter()
                    .find(|p| p.name == name)
                    .map(|p| (p.collection, p.nullable))
            }),
            _ => None,
        }
    }
}
