//! Navigation properties: targets, partners, referential constraints and
//! containment.
//!
//! A navigation target resolves by name only; mutually navigating entity
//! types are the norm, so nobody waits for the target type to close.
//! Everything that needs the full property picture, partner paths,
//! referential constraints and containment marking, runs when the model
//! itself closes and every type has settled.

use std::cell::{Cell, RefCell};

use edm_names::{is_simple_identifier, TypeName};

use crate::element::{Element, ElementKind, Payload};
use crate::errors::{DeclareError, ModelError};
use crate::model::EntityModel;

pub(crate) struct NavigationData {
    /// The target entity type, set by resolution.
    pub(crate) target: Cell<Option<Element>>,
    pub(crate) collection: Cell<bool>,
    /// Explicit nullability. Stays `None` for collection-valued
    /// navigation; single-valued navigation defaults to nullable when the
    /// type is set.
    pub(crate) nullable: Cell<Option<bool>>,
    pub(crate) contains_target: Cell<bool>,
    /// Partner path on the target type, resolved at model closure.
    pub(crate) partner_path: RefCell<Option<Vec<String>>>,
    pub(crate) partner: Cell<Option<Element>>,
    /// Navigation properties that resolved their partner to this one.
    /// A bidirectional relationship has exactly one, the partner itself.
    pub(crate) reverse_partners: RefCell<Vec<Element>>,
    /// Referential constraints as declared: dependent path on the
    /// declaring type, principal path on the target type.
    pub(crate) constraints: RefCell<Vec<(Vec<String>, Vec<String>)>>,
}

impl NavigationData {
    pub(crate) fn new(nullable: Option<bool>, contains_target: bool) -> Self {
        NavigationData {
            target: Cell::new(None),
            collection: Cell::new(false),
            nullable: Cell::new(nullable),
            contains_target: Cell::new(contains_target),
            partner_path: RefCell::new(None),
            partner: Cell::new(None),
            reverse_partners: RefCell::new(Vec::new()),
            constraints: RefCell::new(Vec::new()),
        }
    }
}

impl EntityModel {
    /// Sets the target of a navigation property.
    ///
    /// Collection-valued navigation must not specify nullability;
    /// single-valued navigation defaults to nullable.
    pub fn set_navigation_type(
        &self,
        np: Element,
        target: Element,
        collection: bool,
    ) -> Result<(), ModelError> {
        let d = self.data(np);
        let Payload::Navigation(nav) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(np),
                expected: "a navigation property",
            });
        };
        if self.kind_of(target) != ElementKind::EntityType {
            return Err(ModelError::WrongKind {
                name: self.describe(target),
                expected: "an entity type",
            });
        }
        if collection {
            if nav.nullable.get().is_some() {
                return Err(ModelError::InvalidNavigation {
                    name: self.describe(np),
                    detail: "collection-valued navigation can't specify nullable".to_string(),
                });
            }
        } else if nav.nullable.get().is_none() {
            nav.nullable.set(Some(true));
        }
        nav.target.set(Some(target));
        nav.collection.set(collection);
        Ok(())
    }

    /// Sets the target of a navigation property by name.
    ///
    /// The reference counts against the declaring type but waits for the
    /// name only, never for the target to close; mutually navigating
    /// entity types would otherwise deadlock.
    pub fn set_navigation_type_name(
        &self,
        np: Element,
        type_name: &TypeName,
    ) -> Result<(), ModelError> {
        if self.kind_of(np) != ElementKind::NavigationProperty {
            return Err(ModelError::WrongKind {
                name: self.describe(np),
                expected: "a navigation property",
            });
        }
        let Some(owner) = self.owner_of(np) else {
            return Err(ModelError::NotDeclared(self.describe(np)));
        };
        self.add_dependency(owner);
        let collection = type_name.collection;
        let qname = type_name.qname.clone();
        self.qualified_tell(&type_name.qname, move |m, resolved| {
            match resolved {
                None => m.record(ModelError::UnresolvedReference(qname.to_string())),
                Some(target) => {
                    if let Err(err) = m.set_navigation_type(np, target, collection) {
                        m.record(err);
                    }
                }
            }
            m.resolve_dependency(owner);
        })?;
        self.surface()
    }

    /// Sets the partner path of a navigation property: a path on the
    /// target entity type leading to the navigation property pointing
    /// back. Resolved when the model closes.
    pub fn set_partner_path(&self, np: Element, path: &[&str]) -> Result<(), ModelError> {
        let d = self.data(np);
        let Payload::Navigation(nav) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(np),
                expected: "a navigation property",
            });
        };
        if path.is_empty() {
            return Err(ModelError::InvalidNavigation {
                name: self.describe(np),
                detail: "empty partner path".to_string(),
            });
        }
        for segment in path {
            if !is_simple_identifier(segment) {
                return Err(DeclareError::BadName(
                    edm_names::NameError::BadSimpleIdentifier(segment.to_string()),
                )
                .into());
            }
        }
        *nav.partner_path.borrow_mut() =
            Some(path.iter().map(|s| s.to_string()).collect());
        Ok(())
    }

    /// Adds a referential constraint: the dependent path resolves on the
    /// declaring type, the principal path on the target type. Checked
    /// when the model closes.
    pub fn add_constraint(
        &self,
        np: Element,
        dependent: &[&str],
        principal: &[&str],
    ) -> Result<(), ModelError> {
        let d = self.data(np);
        let Payload::Navigation(nav) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(np),
                expected: "a navigation property",
            });
        };
        if dependent.is_empty() || principal.is_empty() {
            return Err(ModelError::InvalidNavigation {
                name: self.describe(np),
                detail: "empty constraint path".to_string(),
            });
        }
        for segment in dependent.iter().chain(principal) {
            if !is_simple_identifier(segment) {
                return Err(DeclareError::BadName(
                    edm_names::NameError::BadSimpleIdentifier(segment.to_string()),
                )
                .into());
            }
        }
        nav.constraints.borrow_mut().push((
            dependent.iter().map(|s| s.to_string()).collect(),
            principal.iter().map(|s| s.to_string()).collect(),
        ));
        Ok(())
    }

    /// The resolved partner of a navigation property.
    pub fn partner_of(&self, np: Element) -> Option<Element> {
        match &self.data(np).payload {
            Payload::Navigation(nav) => nav.partner.get(),
            _ => None,
        }
    }

    /// Whether a navigation property contains its target entities.
    pub fn contains_target(&self, np: Element) -> bool {
        match &self.data(np).payload {
            Payload::Navigation(nav) => nav.contains_target.get(),
            _ => false,
        }
    }

    /// Whether a property, navigation property or term is
    /// collection-valued.
    pub fn is_collection(&self, e: Element) -> bool {
        match &self.data(e).payload {
            Payload::Property(p) => p
                .type_ref
                .get()
                .map(|t| self.item_type_of(t) != t)
                .unwrap_or(false),
            Payload::Navigation(n) => n.collection.get(),
            Payload::Term(t) => t.collection.get(),
            _ => false,
        }
    }

    /// Whole-model navigation checks for one structured type, run when
    /// the model closes: every owned navigation property has a target,
    /// partner paths resolve and pair up, referential constraints hold,
    /// containment targets are marked, and no collection of complex
    /// values smuggles in containment navigation.
    pub(crate) fn check_navigation(&self, t: Element) -> Result<(), ModelError> {
        for (_, item) in self.entries(t) {
            let item_data = self.data(item);
            match &item_data.payload {
                Payload::Property(prop) => {
                    if let Some(ty) = prop.type_ref.get() {
                        let inner = self.item_type_of(ty);
                        if inner != ty && self.kind_of(inner) == ElementKind::ComplexType {
                            let mut visited = Vec::new();
                            if self.complex_has_containment(inner, &mut visited) {
                                return Err(ModelError::InvalidNavigation {
                                    name: self.describe(item),
                                    detail: "a collection of complex values can't hold \
                                             containment navigation"
                                        .to_string(),
                                });
                            }
                        }
                    }
                }
                Payload::Navigation(_) => {
                    if self.owner_of(item) == Some(t) {
                        self.finish_navigation(t, item)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn finish_navigation(&self, t: Element, np: Element) -> Result<(), ModelError> {
        let d = self.data(np);
        let Payload::Navigation(nav) = &d.payload else {
            return Ok(());
        };
        let Some(target) = nav.target.get() else {
            return Err(ModelError::UndefinedType(self.describe(np)));
        };

        let partner_path = nav.partner_path.borrow().clone();
        if let Some(path) = partner_path {
            let partner = self
                .resolve_partner_path(target, &path)
                .map_err(|detail| ModelError::InvalidNavigation {
                    name: self.describe(np),
                    detail,
                })?;
            let partner_data = self.data(partner);
            if let Payload::Navigation(pnav) = &partner_data.payload {
                if let Some(back) = pnav.target.get() {
                    if !self.is_derived_from(t, back, false)
                        && !self.is_derived_from(back, t, false)
                    {
                        return Err(ModelError::InvalidNavigation {
                            name: self.describe(np),
                            detail: format!(
                                "partner {} does not point back to {}",
                                self.describe(partner),
                                self.describe(t)
                            ),
                        });
                    }
                }
                {
                    let reverse = nav.reverse_partners.borrow();
                    if reverse.len() > 1 {
                        return Err(ModelError::InvalidNavigation {
                            name: self.describe(np),
                            detail: "has multiple partners".to_string(),
                        });
                    }
                    if let Some(first) = reverse.first() {
                        if *first != partner {
                            return Err(ModelError::InvalidNavigation {
                                name: self.describe(np),
                                detail: "is already partnered".to_string(),
                            });
                        }
                    }
                }
                nav.partner.set(Some(partner));
                pnav.reverse_partners.borrow_mut().push(np);
            }
        }

        let constraints = nav.constraints.borrow().clone();
        for (dependent_path, principal_path) in constraints {
            self.check_constraint(
                t,
                np,
                target,
                &dependent_path,
                &principal_path,
                nav.nullable.get(),
            )?;
        }

        if nav.contains_target.get() {
            self.set_contained(target)?;
        }
        Ok(())
    }

    fn check_constraint(
        &self,
        t: Element,
        np: Element,
        target: Element,
        dependent_path: &[String],
        principal_path: &[String],
        np_nullable: Option<bool>,
    ) -> Result<(), ModelError> {
        let fail = |detail: String| ModelError::InvalidNavigation {
            name: self.describe(np),
            detail,
        };
        let dependent = self
            .resolve_structural_path(t, dependent_path)
            .map_err(|e| fail(format!("dependent property: {e}")))?;
        let principal = self
            .resolve_structural_path(target, principal_path)
            .map_err(|e| fail(format!("principal property: {e}")))?;
        let dd = self.data(dependent);
        let Payload::Property(dep) = &dd.payload else {
            return Err(fail(format!(
                "{} is not a structural property",
                self.describe(dependent)
            )));
        };
        let pd = self.data(principal);
        let Payload::Property(pri) = &pd.payload else {
            return Err(fail(format!(
                "{} is not a structural property",
                self.describe(principal)
            )));
        };
        let Some(dep_ty) = dep.type_ref.get() else {
            return Err(fail(format!("{} is undefined", self.describe(dependent))));
        };
        let Some(pri_ty) = pri.type_ref.get() else {
            return Err(fail(format!("{} is undefined", self.describe(principal))));
        };
        let Some(dep_kind) = self.primitive_kind_of(dep_ty) else {
            return Err(fail(format!(
                "{} is not a primitive property",
                self.describe(dependent)
            )));
        };
        let Some(pri_kind) = self.primitive_kind_of(pri_ty) else {
            return Err(fail(format!(
                "{} is not a primitive property",
                self.describe(principal)
            )));
        };
        if dep_kind != pri_kind {
            return Err(fail(format!(
                "{} and {} are of different types",
                self.describe(dependent),
                self.describe(principal)
            )));
        }
        let pri_nullable = pri.nullable.get().unwrap_or(true);
        let dep_explicit = dep.nullable.get();
        if (np_nullable == Some(true) || pri_nullable) && dep_explicit == Some(false) {
            return Err(fail(
                "a nullable relationship requires a nullable dependent property".to_string(),
            ));
        }
        if np_nullable == Some(false) && !pri_nullable && dep_explicit != Some(false) {
            return Err(fail(
                "a non-nullable relationship requires a non-nullable dependent property"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Follows a path of structural complex segments down a type,
    /// terminating in a navigation property. Shared by partner paths and
    /// entity set binding paths.
    pub(crate) fn resolve_partner_path(
        &self,
        target: Element,
        path: &[String],
    ) -> Result<Element, String> {
        if path.is_empty() {
            return Err("empty partner path".to_string());
        }
        let mut current_type = target;
        let last = path.len() - 1;
        for (i, segment) in path.iter().enumerate() {
            let Some(p) = self.get(current_type, segment) else {
                return Err(format!(
                    "{} has no property {segment}",
                    self.describe(current_type)
                ));
            };
            if i == last {
                return match &self.data(p).payload {
                    Payload::Navigation(_) => Ok(p),
                    _ => Err(format!(
                        "{} is not a navigation property",
                        self.describe(p)
                    )),
                };
            }
            let pd = self.data(p);
            let Payload::Property(prop) = &pd.payload else {
                return Err(format!(
                    "{} is not a structural property",
                    self.describe(p)
                ));
            };
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
        Err("empty partner path".to_string())
    }

    /// Whether a complex type, expanded through its single-valued complex
    /// properties, carries any containment navigation.
    fn complex_has_containment(&self, complex: Element, visited: &mut Vec<Element>) -> bool {
        if visited.contains(&complex) {
            return false;
        }
        visited.push(complex);
        for (_, item) in self.entries(complex) {
            match &self.data(item).payload {
                Payload::Navigation(nav) => {
                    if nav.contains_target.get() {
                        return true;
                    }
                }
                Payload::Property(prop) => {
                    if let Some(ty) = prop.type_ref.get() {
                        let inner = self.item_type_of(ty);
                        if self.kind_of(inner) == ElementKind::ComplexType
                            && self.complex_has_containment(inner, visited)
                        {
                            return true;
                        }
                    }
                }
                _ => {}
            }
        }
        false
    }
}
