//! Name tables and the deferred declaration protocol.
//!
//! Every scope in a model owns a [`NameTable`]: an append-only mapping from
//! names to elements with an open/closed life cycle. While a table is open,
//! interested parties leave callbacks against names that may not have been
//! declared yet ([`EntityModel::tell`]) or against the moment the scope
//! finishes ([`EntityModel::tell_close`]). Declaring a name fires its
//! waiting callbacks on the spot; closing the table tells every remaining
//! watcher that its name is never coming, then runs the close watchers.
//!
//! Callbacks run synchronously on the caller's stack and may re-enter the
//! model, including the table currently firing. The table takes ownership
//! of the callbacks it is about to run before running them, so reentrant
//! registrations land in fresh storage and fire by the usual rules.

use std::cell::{Cell, RefCell};

use edm_names::{is_namespace, is_simple_identifier, NameError};
use indexmap::IndexMap;

use crate::element::{Element, ElementKind, Payload};
use crate::errors::{DeclareError, ModelError};
use crate::model::EntityModel;

/// Callback for [`EntityModel::tell`]: receives the declared element, or
/// `None` once the scope has closed without the name.
pub(crate) type TellCallback = Box<dyn FnOnce(&EntityModel, Option<Element>)>;

/// Callback for [`EntityModel::tell_close`].
pub(crate) type CloseCallback = Box<dyn FnOnce(&EntityModel)>;

/// The name-to-element mapping behind every scope.
pub(crate) struct NameTable {
    entries: RefCell<IndexMap<String, Element>>,
    closed: Cell<bool>,
    /// Waiting name callbacks. The sequence number records registration
    /// order across the whole model so that close time can fire misses for
    /// different names in the order they were registered.
    pending: RefCell<IndexMap<String, Vec<(u64, TellCallback)>>>,
    close_callbacks: RefCell<Vec<CloseCallback>>,
}

impl NameTable {
    pub(crate) fn new() -> Self {
        NameTable {
            entries: RefCell::new(IndexMap::new()),
            closed: Cell::new(false),
            pending: RefCell::new(IndexMap::new()),
            close_callbacks: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Marks the table closed without firing anything. Only for scopes
    /// built in their final form.
    pub(crate) fn mark_closed(&self) {
        self.closed.set(true);
    }

    /// Adds an entry without any checking. Only for scopes built in their
    /// final form.
    pub(crate) fn install(&self, name: &str, value: Element) {
        self.entries.borrow_mut().insert(name.to_string(), value);
    }

    pub(crate) fn get(&self, name: &str) -> Option<Element> {
        self.entries.borrow().get(name).copied()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// The entries in declaration order, copied out so callers can walk
    /// them while the table changes underneath.
    pub(crate) fn snapshot(&self) -> Vec<(String, Element)> {
        self.entries
            .borrow()
            .iter()
            .map(|(n, e)| (n.clone(), *e))
            .collect()
    }
}

impl Default for NameTable {
    fn default() -> Self {
        NameTable::new()
    }
}

impl EntityModel {
    /// Declares `value` in `scope` under `name`.
    ///
    /// The name must fit the scope's grammar, the element's kind must be
    /// one the scope accepts, the name must be free and the scope still
    /// open. On success any callbacks waiting on the name fire before this
    /// returns; a failure inside one of them is reported as this call's
    /// error.
    pub fn insert(
        &self,
        scope: Element,
        name: &str,
        value: Element,
    ) -> Result<(), ModelError> {
        self.insert_quiet(scope, name, value)?;
        self.surface()
    }

    /// [`insert`](Self::insert) minus the error drain, for callers that
    /// drain once on behalf of several operations.
    pub(crate) fn insert_quiet(
        &self,
        scope: Element,
        name: &str,
        value: Element,
    ) -> Result<(), ModelError> {
        let d = self.data(scope);
        let Some(table) = d.payload.table() else {
            return Err(ModelError::WrongKind {
                name: self.describe(scope),
                expected: "a scope",
            });
        };
        if table.is_closed() {
            return Err(DeclareError::Closed(self.describe(scope)).into());
        }
        self.check_name(scope, name)?;
        self.check_value(scope, value)?;
        {
            let mut entries = table.entries.borrow_mut();
            if entries.contains_key(name) {
                return Err(DeclareError::Duplicate(self.qualify_name(scope, name)).into());
            }
            entries.insert(name.to_string(), value);
        }
        log::debug!("declared {name} in {}", self.describe(scope));
        let waiting = table.pending.borrow_mut().shift_remove(name);
        if let Some(waiting) = waiting {
            for (_, callback) in waiting {
                callback(self, Some(value));
            }
        }
        Ok(())
    }

    /// Declares an already-declared element under an additional name.
    ///
    /// The element keeps the name and qualified name of its first
    /// declaration; the new name is an alias looking up the same element.
    pub fn alias(
        &self,
        scope: Element,
        name: &str,
        value: Element,
    ) -> Result<(), ModelError> {
        if self.owner_of(value).is_none() {
            return Err(ModelError::NotDeclared(self.describe(value)));
        }
        self.insert(scope, name, value)
    }

    /// Calls `callback` with the element declared under `name` in `scope`.
    ///
    /// If the name is already declared the callback runs before this
    /// returns. Otherwise it is parked: it fires with the element when the
    /// name is declared, or with `None` when the scope closes without it.
    /// Either way it fires exactly once.
    pub fn tell(
        &self,
        scope: Element,
        name: &str,
        callback: impl FnOnce(&EntityModel, Option<Element>) + 'static,
    ) -> Result<(), ModelError> {
        let d = self.data(scope);
        let Some(table) = d.payload.table() else {
            return Err(ModelError::WrongKind {
                name: self.describe(scope),
                expected: "a scope",
            });
        };
        let hit = table.get(name);
        if let Some(value) = hit {
            callback(self, Some(value));
            return self.surface();
        }
        if table.is_closed() {
            callback(self, None);
            return self.surface();
        }
        let seq = self.next_seq();
        table
            .pending
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push((seq, Box::new(callback)));
        Ok(())
    }

    /// Calls `callback` once `scope` has closed, immediately if it already
    /// has.
    pub fn tell_close(
        &self,
        scope: Element,
        callback: impl FnOnce(&EntityModel) + 'static,
    ) -> Result<(), ModelError> {
        let d = self.data(scope);
        let Some(table) = d.payload.table() else {
            return Err(ModelError::WrongKind {
                name: self.describe(scope),
                expected: "a scope",
            });
        };
        if table.is_closed() {
            callback(self);
            return self.surface();
        }
        table.close_callbacks.borrow_mut().push(Box::new(callback));
        Ok(())
    }

    /// Calls `callback` once every scope in `scopes` has closed.
    ///
    /// Scopes are waited on one after another, so the callback may run
    /// during the close of the last open one.
    pub fn tell_all_closed(
        &self,
        scopes: &[Element],
        callback: impl FnOnce(&EntityModel) + 'static,
    ) -> Result<(), ModelError> {
        fn advance(
            model: &EntityModel,
            mut remaining: std::vec::IntoIter<Element>,
            callback: CloseCallback,
        ) {
            match remaining.next() {
                None => callback(model),
                Some(scope) => {
                    let queued = model
                        .tell_close(scope, move |m| advance(m, remaining, callback));
                    if let Err(err) = queued {
                        model.record(err);
                    }
                }
            }
        }
        advance(self, scopes.to_vec().into_iter(), Box::new(callback));
        self.surface()
    }

    /// Closes a scope, firing its remaining callbacks.
    ///
    /// Entity and complex types, enumerations and containers run their
    /// kind's own completion rules first; see
    /// [`EntityModel::close`](Self::close) for the model root.
    pub fn close_scope(&self, scope: Element) -> Result<(), ModelError> {
        self.close_dispatch(scope)?;
        self.surface()
    }

    pub(crate) fn close_dispatch(&self, scope: Element) -> Result<(), ModelError> {
        match self.kind_of(scope) {
            ElementKind::Model => self.close_root(),
            ElementKind::Schema => self.close_table(scope),
            ElementKind::EntityType | ElementKind::ComplexType => self.close_structured(scope),
            ElementKind::EnumType => self.close_enum(scope),
            ElementKind::EntityContainer => self.close_container(scope),
            _ => Err(ModelError::WrongKind {
                name: self.describe(scope),
                expected: "a scope",
            }),
        }
    }

    /// The close protocol every scope shares: set the closed flag, fire
    /// all waiting name callbacks with `None` in registration order, then
    /// the close callbacks in registration order. Closing twice is a
    /// no-op.
    pub(crate) fn close_table(&self, scope: Element) -> Result<(), ModelError> {
        let d = self.data(scope);
        let Some(table) = d.payload.table() else {
            return Err(ModelError::WrongKind {
                name: self.describe(scope),
                expected: "a scope",
            });
        };
        if table.is_closed() {
            return Ok(());
        }
        table.closed.set(true);
        log::debug!("closed {}", self.describe(scope));

        let mut missed: Vec<(u64, TellCallback)> = {
            let mut pending = table.pending.borrow_mut();
            pending.drain(..).flat_map(|(_, waiting)| waiting).collect()
        };
        missed.sort_by_key(|(seq, _)| *seq);
        for (_, callback) in missed {
            callback(self, None);
        }

        let closers: Vec<CloseCallback> =
            table.close_callbacks.borrow_mut().drain(..).collect();
        for callback in closers {
            callback(self);
        }
        Ok(())
    }

    fn check_name(&self, scope: Element, name: &str) -> Result<(), DeclareError> {
        if name.is_empty() {
            return Err(DeclareError::Unnamed);
        }
        let d = self.data(scope);
        match &d.payload {
            Payload::Model(_) => {
                if !is_namespace(name) {
                    return Err(NameError::BadNamespace(name.to_string()).into());
                }
            }
            Payload::EntityType(_) => {
                if !is_simple_identifier(name) {
                    return Err(NameError::BadSimpleIdentifier(name.to_string()).into());
                }
                if d.name.borrow().as_deref() == Some(name) {
                    return Err(DeclareError::ShadowsTypeName(self.describe(scope)));
                }
            }
            _ => {
                if !is_simple_identifier(name) {
                    return Err(NameError::BadSimpleIdentifier(name.to_string()).into());
                }
            }
        }
        Ok(())
    }

    fn check_value(&self, scope: Element, value: Element) -> Result<(), DeclareError> {
        let scope_data = self.data(scope);
        let value_data = self.data(value);
        let accepted = match &scope_data.payload {
            Payload::Model(_) => matches!(value_data.payload, Payload::Schema(_)),
            Payload::Schema(_) => {
                value_data.payload.is_type()
                    || matches!(
                        value_data.payload,
                        Payload::Term(_)
                            | Payload::Container(_)
                            | Payload::Callable(_)
                            | Payload::Labeled(_)
                    )
            }
            Payload::EntityType(_) | Payload::ComplexType(_) => matches!(
                value_data.payload,
                Payload::Property(_) | Payload::Navigation(_)
            ),
            Payload::Enum(_) => matches!(value_data.payload, Payload::Member(_)),
            Payload::Container(_) => matches!(
                value_data.payload,
                Payload::EntitySet(_)
                    | Payload::Singleton(_)
                    | Payload::ActionImport(_)
                    | Payload::FunctionImport(_)
            ),
            _ => false,
        };
        if accepted {
            Ok(())
        } else {
            Err(DeclareError::BadValue {
                scope: self.describe(scope),
                kind: value_data.payload.kind().describe(),
            })
        }
    }

    /// Whether a scope has closed. Elements that are not scopes count as
    /// closed once their outstanding dependencies have resolved.
    pub fn is_closed(&self, e: Element) -> bool {
        let d = self.data(e);
        match d.payload.table() {
            Some(table) => table.is_closed(),
            None => d.dependencies.get() == 0,
        }
    }

    /// Looks up `name` in `scope`. Returns `None` for unknown names and
    /// for elements that are not scopes.
    pub fn get(&self, scope: Element, name: &str) -> Option<Element> {
        self.data(scope).payload.table().and_then(|t| t.get(name))
    }

    /// The entries of `scope` in declaration order.
    pub fn entries(&self, scope: Element) -> Vec<(String, Element)> {
        self.data(scope)
            .payload
            .table()
            .map(|t| t.snapshot())
            .unwrap_or_default()
    }
}
