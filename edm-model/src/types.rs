//! The nominal type graph: base type edges, primitive kinds, collections,
//! enumerations, type definitions and facets.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use edm_names::QualifiedName;

use crate::element::{Element, ElementKind, Payload};
use crate::errors::ModelError;
use crate::model::EntityModel;
use crate::scope::NameTable;

/// State shared by every nominal type.
pub(crate) struct TypeHead {
    /// The base type edge, set by resolution.
    pub(crate) base: Cell<Option<Element>>,
    pub(crate) is_abstract: Cell<bool>,
    /// Whether dynamic properties are accepted. `None` until closure,
    /// which inherits the base's value or defaults to false.
    pub(crate) open_type: Cell<Option<bool>>,
    /// Lazily created collection over this type.
    pub(crate) collection: Cell<Option<Element>>,
}

impl TypeHead {
    pub(crate) fn new(is_abstract: bool, open_type: Option<bool>) -> Self {
        TypeHead {
            base: Cell::new(None),
            is_abstract: Cell::new(is_abstract),
            open_type: Cell::new(open_type),
            collection: Cell::new(None),
        }
    }
}

/// The built-in primitive types, including the abstract bases of the
/// primitive, geography and geometry branches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PrimitiveKind {
    Primitive,
    Binary,
    Boolean,
    Byte,
    Date,
    DateTimeOffset,
    Decimal,
    Double,
    Duration,
    Guid,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    Stream,
    String,
    TimeOfDay,
    Geography,
    GeographyPoint,
    GeographyLineString,
    GeographyPolygon,
    GeographyMultiPoint,
    GeographyMultiLineString,
    GeographyMultiPolygon,
    GeographyCollection,
    Geometry,
    GeometryPoint,
    GeometryLineString,
    GeometryPolygon,
    GeometryMultiPoint,
    GeometryMultiLineString,
    GeometryMultiPolygon,
    GeometryCollection,
}

impl PrimitiveKind {
    /// The unqualified name of the type within the `Edm` namespace.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Primitive => "PrimitiveType",
            PrimitiveKind::Binary => "Binary",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Date => "Date",
            PrimitiveKind::DateTimeOffset => "DateTimeOffset",
            PrimitiveKind::Decimal => "Decimal",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::Duration => "Duration",
            PrimitiveKind::Guid => "Guid",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::SByte => "SByte",
            PrimitiveKind::Single => "Single",
            PrimitiveKind::Stream => "Stream",
            PrimitiveKind::String => "String",
            PrimitiveKind::TimeOfDay => "TimeOfDay",
            PrimitiveKind::Geography => "Geography",
            PrimitiveKind::GeographyPoint => "GeographyPoint",
            PrimitiveKind::GeographyLineString => "GeographyLineString",
            PrimitiveKind::GeographyPolygon => "GeographyPolygon",
            PrimitiveKind::GeographyMultiPoint => "GeographyMultiPoint",
            PrimitiveKind::GeographyMultiLineString => "GeographyMultiLineString",
            PrimitiveKind::GeographyMultiPolygon => "GeographyMultiPolygon",
            PrimitiveKind::GeographyCollection => "GeographyCollection",
            PrimitiveKind::Geometry => "Geometry",
            PrimitiveKind::GeometryPoint => "GeometryPoint",
            PrimitiveKind::GeometryLineString => "GeometryLineString",
            PrimitiveKind::GeometryPolygon => "GeometryPolygon",
            PrimitiveKind::GeometryMultiPoint => "GeometryMultiPoint",
            PrimitiveKind::GeometryMultiLineString => "GeometryMultiLineString",
            PrimitiveKind::GeometryMultiPolygon => "GeometryMultiPolygon",
            PrimitiveKind::GeometryCollection => "GeometryCollection",
        }
    }

    /// Whether a property of this type can be part of an entity key.
    pub fn key_eligible(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Boolean
                | PrimitiveKind::Byte
                | PrimitiveKind::Date
                | PrimitiveKind::DateTimeOffset
                | PrimitiveKind::Decimal
                | PrimitiveKind::Duration
                | PrimitiveKind::Guid
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
                | PrimitiveKind::SByte
                | PrimitiveKind::String
                | PrimitiveKind::TimeOfDay
        )
    }

    /// Whether the type can underlie an enumeration.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::SByte
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
        )
    }

    pub(crate) fn allows_max_length(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Binary | PrimitiveKind::Stream | PrimitiveKind::String
        )
    }

    pub(crate) fn allows_precision(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Decimal
                | PrimitiveKind::DateTimeOffset
                | PrimitiveKind::Duration
                | PrimitiveKind::TimeOfDay
        )
    }

    pub(crate) fn allows_srid(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Geography
                | PrimitiveKind::GeographyPoint
                | PrimitiveKind::GeographyLineString
                | PrimitiveKind::GeographyPolygon
                | PrimitiveKind::GeographyMultiPoint
                | PrimitiveKind::GeographyMultiLineString
                | PrimitiveKind::GeographyMultiPolygon
                | PrimitiveKind::GeographyCollection
                | PrimitiveKind::Geometry
                | PrimitiveKind::GeometryPoint
                | PrimitiveKind::GeometryLineString
                | PrimitiveKind::GeometryPolygon
                | PrimitiveKind::GeometryMultiPoint
                | PrimitiveKind::GeometryMultiLineString
                | PrimitiveKind::GeometryMultiPolygon
                | PrimitiveKind::GeometryCollection
        )
    }
}

impl Display for PrimitiveKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) struct PrimitiveData {
    pub(crate) head: TypeHead,
    pub(crate) kind: PrimitiveKind,
}

pub(crate) struct CollectionData {
    pub(crate) item: Element,
}

/// Facet values as written, validated against the primitive kind they end
/// up applying to.
#[derive(Default)]
pub(crate) struct FacetData {
    pub(crate) max_length: Cell<Option<u32>>,
    pub(crate) precision: Cell<Option<i32>>,
    pub(crate) scale: Cell<Option<i32>>,
    pub(crate) unicode: Cell<Option<bool>>,
    pub(crate) srid: Cell<Option<i64>>,
}

pub(crate) struct EnumData {
    pub(crate) head: TypeHead,
    pub(crate) table: NameTable,
    pub(crate) underlying: Cell<Option<Element>>,
    pub(crate) is_flags: bool,
    /// Next auto-assigned member value.
    pub(crate) next_value: Cell<i64>,
    /// First member declared for each value.
    pub(crate) values: RefCell<HashMap<i64, Element>>,
}

impl EnumData {
    pub(crate) fn new(is_flags: bool) -> Self {
        EnumData {
            head: TypeHead::new(false, Some(false)),
            table: NameTable::new(),
            underlying: Cell::new(None),
            is_flags,
            next_value: Cell::new(0),
            values: RefCell::new(HashMap::new()),
        }
    }
}

pub(crate) struct MemberData {
    pub(crate) value: Cell<Option<i64>>,
}

impl MemberData {
    pub(crate) fn new(value: Option<i64>) -> Self {
        MemberData {
            value: Cell::new(value),
        }
    }
}

pub(crate) struct TypeDefData {
    pub(crate) head: TypeHead,
    pub(crate) underlying: Cell<Option<Element>>,
    pub(crate) facets: FacetData,
}

impl TypeDefData {
    pub(crate) fn new() -> Self {
        TypeDefData {
            head: TypeHead::new(false, Some(false)),
            underlying: Cell::new(None),
            facets: FacetData::default(),
        }
    }
}

impl EntityModel {
    /// The base type of `t`, if one has been set.
    pub fn base_type_of(&self, t: Element) -> Option<Element> {
        self.data(t).payload.head().and_then(|h| h.base.get())
    }

    /// Whether `t` is `other` or derives from it through base type edges.
    /// With `strict` the type does not count as derived from itself.
    pub fn is_derived_from(&self, t: Element, other: Element, strict: bool) -> bool {
        if !strict && t == other {
            return true;
        }
        let mut visited = vec![t];
        let mut current = t;
        while let Some(base) = self.base_type_of(current) {
            if base == other {
                return true;
            }
            if visited.contains(&base) {
                return false;
            }
            visited.push(base);
            current = base;
        }
        false
    }

    /// Whether `t` can reach itself through base type edges.
    pub(crate) fn base_cycle(&self, t: Element) -> bool {
        let mut visited = vec![t];
        let mut current = t;
        while let Some(base) = self.base_type_of(current) {
            if visited.contains(&base) {
                return true;
            }
            visited.push(base);
            current = base;
        }
        false
    }

    /// Sets the base type of an entity or complex type.
    ///
    /// The base must be of the same kind and must not already derive from
    /// `t`. The base does not have to be closed yet; a type waits for its
    /// base to close before closing itself.
    pub fn set_base(&self, t: Element, base: Element) -> Result<(), ModelError> {
        let kind = self.kind_of(t);
        match kind {
            ElementKind::EntityType | ElementKind::ComplexType => {}
            _ => {
                return Err(ModelError::WrongKind {
                    name: self.describe(t),
                    expected: "an entity or complex type",
                })
            }
        }
        if self.is_closed(t) {
            return Err(ModelError::Frozen(self.describe(t)));
        }
        if self.kind_of(base) != kind {
            return Err(ModelError::BadBase {
                derived: self.describe(t),
                base: self.describe(base),
                reason: "kind mismatch",
            });
        }
        if self.is_derived_from(base, t, false) {
            return Err(match kind {
                ElementKind::EntityType => ModelError::EntityCycle(self.describe(t)),
                _ => ModelError::ComplexCycle(self.describe(t)),
            });
        }
        let d = self.data(t);
        let Some(head) = d.payload.head() else {
            return Err(ModelError::WrongKind {
                name: self.describe(t),
                expected: "an entity or complex type",
            });
        };
        let base_data = self.data(base);
        if let Some(base_head) = base_data.payload.head() {
            if base_head.open_type.get() == Some(true) && head.open_type.get() == Some(false) {
                return Err(ModelError::BadBase {
                    derived: self.describe(t),
                    base: self.describe(base),
                    reason: "open base requires an open derived type",
                });
            }
        }
        head.base.set(Some(base));
        log::debug!("{} extends {}", self.describe(t), self.describe(base));
        Ok(())
    }

    /// Sets the base type of `t` by qualified name.
    ///
    /// Resolution is deferred until the name is declared; `t` then waits
    /// for the base to close before completing. A name that never arrives
    /// is recorded as an unresolved reference and `t` completes without a
    /// base.
    pub fn set_base_name(&self, t: Element, base: &QualifiedName) -> Result<(), ModelError> {
        match self.kind_of(t) {
            ElementKind::EntityType | ElementKind::ComplexType => {}
            _ => {
                return Err(ModelError::WrongKind {
                    name: self.describe(t),
                    expected: "an entity or complex type",
                })
            }
        }
        self.add_dependency(t);
        let qname = base.clone();
        self.qualified_tell(base, move |m, resolved| match resolved {
            None => {
                m.record(ModelError::UnresolvedReference(qname.to_string()));
                m.resolve_dependency(t);
            }
            Some(base) => match m.set_base(t, base) {
                Err(err) => {
                    m.record(err);
                    m.resolve_dependency(t);
                }
                Ok(()) => {
                    let queued = m.tell_close(base, move |m| m.resolve_dependency(t));
                    if let Err(err) = queued {
                        m.record(err);
                        m.resolve_dependency(t);
                    }
                }
            },
        })?;
        self.surface()
    }

    /// Marks a type abstract or concrete.
    pub fn set_abstract(&self, t: Element, value: bool) -> Result<(), ModelError> {
        if self.is_closed(t) {
            return Err(ModelError::Frozen(self.describe(t)));
        }
        let d = self.data(t);
        let Some(head) = d.payload.head() else {
            return Err(ModelError::WrongKind {
                name: self.describe(t),
                expected: "a nominal type",
            });
        };
        head.is_abstract.set(value);
        Ok(())
    }

    /// Whether a type is abstract.
    pub fn is_abstract(&self, t: Element) -> bool {
        self.data(t)
            .payload
            .head()
            .map(|h| h.is_abstract.get())
            .unwrap_or(false)
    }

    /// Marks a structured type open or closed to dynamic properties.
    pub fn set_open_type(&self, t: Element, value: bool) -> Result<(), ModelError> {
        if self.is_closed(t) {
            return Err(ModelError::Frozen(self.describe(t)));
        }
        let d = self.data(t);
        let Some(head) = d.payload.head() else {
            return Err(ModelError::WrongKind {
                name: self.describe(t),
                expected: "a nominal type",
            });
        };
        head.open_type.set(Some(value));
        Ok(())
    }

    /// Whether a type accepts dynamic properties. `None` until closure
    /// settles inheritance.
    pub fn is_open_type(&self, t: Element) -> Option<bool> {
        self.data(t).payload.head().and_then(|h| h.open_type.get())
    }

    /// The collection type over `item`, created on first use. At most one
    /// collection exists per item type; collections do not nest.
    pub fn collection_of(&self, item: Element) -> Result<Element, ModelError> {
        let d = self.data(item);
        let Some(head) = d.payload.head() else {
            return Err(ModelError::WrongKind {
                name: self.describe(item),
                expected: "a single type",
            });
        };
        if let Some(collection) = head.collection.get() {
            return Ok(collection);
        }
        let collection = self.alloc(Payload::Collection(CollectionData { item }), 0);
        *self.data(collection).qname.borrow_mut() =
            Some(format!("Collection({})", self.describe(item)));
        head.collection.set(Some(collection));
        Ok(collection)
    }

    /// The item type of a collection, or `t` itself for single types.
    pub fn item_type_of(&self, t: Element) -> Element {
        match &self.data(t).payload {
            Payload::Collection(c) => c.item,
            _ => t,
        }
    }

    /// The primitive kind a type boils down to: the kind itself for
    /// primitives, through the underlying type for type definitions and
    /// enumerations, `None` for structured types and collections.
    pub fn primitive_kind_of(&self, t: Element) -> Option<PrimitiveKind> {
        let d = self.data(t);
        match &d.payload {
            Payload::Primitive(p) => Some(p.kind),
            Payload::TypeDef(td) => td
                .underlying
                .get()
                .and_then(|u| self.primitive_kind_of(u)),
            Payload::Enum(en) => en
                .underlying
                .get()
                .and_then(|u| self.primitive_kind_of(u))
                .or(Some(PrimitiveKind::Int32)),
            _ => None,
        }
    }

    /// The value of an enumeration member, once assigned.
    pub fn member_value(&self, member: Element) -> Option<i64> {
        match &self.data(member).payload {
            Payload::Member(m) => m.value.get(),
            _ => None,
        }
    }

    /// The first member of an enumeration declared with `value`.
    pub fn member_with_value(&self, e: Element, value: i64) -> Option<Element> {
        match &self.data(e).payload {
            Payload::Enum(en) => en.values.borrow().get(&value).copied(),
            _ => None,
        }
    }

    /// Assigns an auto value to a member about to be declared and checks
    /// the flag rule. Scopes other than enumerations are left for the
    /// declaration itself to reject.
    pub(crate) fn prepare_member(
        &self,
        scope: Element,
        name: &str,
        member: Element,
    ) -> Result<(), ModelError> {
        let scope_data = self.data(scope);
        let Payload::Enum(en) = &scope_data.payload else {
            return Ok(());
        };
        let member_data = self.data(member);
        let Payload::Member(md) = &member_data.payload else {
            return Ok(());
        };
        if md.value.get().is_none() {
            if en.is_flags {
                return Err(ModelError::ValueRequired(self.qualify_name(scope, name)));
            }
            md.value.set(Some(en.next_value.get()));
        }
        Ok(())
    }

    /// Bookkeeping after a member was declared: advance the auto counter
    /// and index the value. Repeated values keep the first member; later
    /// ones are aliases of the value.
    pub(crate) fn register_member(&self, scope: Element, member: Element) {
        let scope_data = self.data(scope);
        let Payload::Enum(en) = &scope_data.payload else {
            return;
        };
        let member_data = self.data(member);
        let Payload::Member(md) = &member_data.payload else {
            return;
        };
        let Some(value) = md.value.get() else {
            return;
        };
        if value >= en.next_value.get() {
            en.next_value.set(value + 1);
        }
        en.values.borrow_mut().entry(value).or_insert(member);
    }

    /// Sets the underlying type of an enumeration by qualified name. The
    /// name must resolve to one of the integer primitives.
    pub fn set_enum_underlying_name(
        &self,
        e: Element,
        underlying: &QualifiedName,
    ) -> Result<(), ModelError> {
        if self.kind_of(e) != ElementKind::EnumType {
            return Err(ModelError::WrongKind {
                name: self.describe(e),
                expected: "an enumeration type",
            });
        }
        if self.is_closed(e) {
            return Err(ModelError::Frozen(self.describe(e)));
        }
        self.add_dependency(e);
        let qname = underlying.clone();
        self.qualified_tell(underlying, move |m, resolved| {
            match resolved {
                None => m.record(ModelError::UnresolvedReference(qname.to_string())),
                Some(u) => {
                    let integer = matches!(&m.data(u).payload, Payload::Primitive(p) if p.kind.is_integer());
                    if integer {
                        if let Payload::Enum(en) = &m.data(e).payload {
                            en.underlying.set(Some(u));
                        }
                    } else {
                        m.record(ModelError::WrongKind {
                            name: m.describe(u),
                            expected: "an integer primitive type",
                        });
                    }
                }
            }
            m.resolve_dependency(e);
        })?;
        self.surface()
    }

    /// Closes an enumeration. The underlying type defaults to `Edm.Int32`
    /// when none was given.
    pub(crate) fn close_enum(&self, e: Element) -> Result<(), ModelError> {
        let d = self.data(e);
        let Payload::Enum(en) = &d.payload else {
            return Err(ModelError::WrongKind {
                name: self.describe(e),
                expected: "an enumeration type",
            });
        };
        if en.table.is_closed() {
            return Ok(());
        }
        if en.underlying.get().is_none() {
            let int32 = self
                .get(self.edm(), "Int32")
                .ok_or_else(|| ModelError::NotDeclared("Edm.Int32".to_string()))?;
            en.underlying.set(Some(int32));
        }
        self.close_table(e)
    }

    /// Sets the underlying type of a type definition by qualified name.
    /// The name must resolve to a primitive type; facets already set are
    /// checked against it.
    pub fn set_underlying_type_name(
        &self,
        td: Element,
        underlying: &QualifiedName,
    ) -> Result<(), ModelError> {
        if self.kind_of(td) != ElementKind::TypeDefinition {
            return Err(ModelError::WrongKind {
                name: self.describe(td),
                expected: "a type definition",
            });
        }
        if self.is_closed(td) {
            return Err(ModelError::Frozen(self.describe(td)));
        }
        self.add_dependency(td);
        let qname = underlying.clone();
        self.qualified_tell(underlying, move |m, resolved| {
            match resolved {
                None => m.record(ModelError::UnresolvedReference(qname.to_string())),
                Some(u) => match &m.data(u).payload {
                    Payload::Primitive(p) => {
                        if let Payload::TypeDef(data) = &m.data(td).payload {
                            data.underlying.set(Some(u));
                            if let Err(err) =
                                m.validate_facets(m.describe(td), &data.facets, p.kind)
                            {
                                m.record(err);
                            }
                        }
                    }
                    _ => m.record(ModelError::WrongKind {
                        name: m.describe(u),
                        expected: "a primitive type",
                    }),
                },
            }
            m.resolve_dependency(td);
        })?;
        self.surface()
    }

    /// The primitive type underlying a type definition or enumeration.
    pub fn underlying_type_of(&self, t: Element) -> Option<Element> {
        match &self.data(t).payload {
            Payload::TypeDef(td) => td.underlying.get(),
            Payload::Enum(en) => en.underlying.get(),
            _ => None,
        }
    }

    /// Sets the MaxLength facet on a property or type definition.
    pub fn set_max_length(&self, e: Element, max_length: u32) -> Result<(), ModelError> {
        self.check_mutable(e)?;
        self.with_facets(e, |f| f.max_length.set(Some(max_length)))
    }

    /// Sets the Precision facet, and for decimals the Scale facet, on a
    /// property or type definition.
    pub fn set_precision(
        &self,
        e: Element,
        precision: Option<i32>,
        scale: Option<i32>,
    ) -> Result<(), ModelError> {
        self.check_mutable(e)?;
        self.with_facets(e, |f| {
            f.precision.set(precision);
            f.scale.set(scale);
        })
    }

    /// Sets the Unicode facet on a string property or type definition.
    pub fn set_unicode(&self, e: Element, unicode: bool) -> Result<(), ModelError> {
        self.check_mutable(e)?;
        self.with_facets(e, |f| f.unicode.set(Some(unicode)))
    }

    /// Sets the SRID facet on a geo property or type definition.
    pub fn set_srid(&self, e: Element, srid: i64) -> Result<(), ModelError> {
        self.check_mutable(e)?;
        self.with_facets(e, |f| f.srid.set(Some(srid)))
    }

    fn with_facets(
        &self,
        e: Element,
        apply: impl FnOnce(&FacetData),
    ) -> Result<(), ModelError> {
        let d = self.data(e);
        let facets = match &d.payload {
            Payload::Property(p) => &p.facets,
            Payload::TypeDef(td) => &td.facets,
            _ => {
                return Err(ModelError::WrongKind {
                    name: self.describe(e),
                    expected: "a property or type definition",
                })
            }
        };
        apply(facets);
        Ok(())
    }

    /// Rejects changes to properties of closed types and to completed
    /// elements generally.
    pub(crate) fn check_mutable(&self, e: Element) -> Result<(), ModelError> {
        let frozen = match &self.data(e).payload {
            Payload::Property(_) | Payload::Navigation(_) => match self.owner_of(e) {
                Some(owner) => self.is_closed(owner),
                None => false,
            },
            _ => self.is_closed(e),
        };
        if frozen {
            Err(ModelError::Frozen(self.describe(e)))
        } else {
            Ok(())
        }
    }

    /// Checks facet values against the primitive kind they apply to.
    pub(crate) fn validate_facets(
        &self,
        name: String,
        facets: &FacetData,
        kind: PrimitiveKind,
    ) -> Result<(), ModelError> {
        if facets.max_length.get().is_some() && !kind.allows_max_length() {
            return Err(ModelError::BadFacet {
                name,
                facet: "MaxLength",
            });
        }
        if facets.precision.get().is_some() && !kind.allows_precision() {
            return Err(ModelError::BadFacet {
                name,
                facet: "Precision",
            });
        }
        if facets.scale.get().is_some() && kind != PrimitiveKind::Decimal {
            return Err(ModelError::BadFacet { name, facet: "Scale" });
        }
        if facets.unicode.get().is_some() && kind != PrimitiveKind::String {
            return Err(ModelError::BadFacet {
                name,
                facet: "Unicode",
            });
        }
        if facets.srid.get().is_some() && !kind.allows_srid() {
            return Err(ModelError::BadFacet { name, facet: "SRID" });
        }
        Ok(())
    }
}
