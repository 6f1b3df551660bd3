//! The built-in `Edm` and `odata` schemas installed into every model.
//!
//! Both are constructed directly in their final, closed form: a fresh
//! model can resolve `Edm.String` immediately and nothing can declare
//! into either namespace.

use crate::annotations::TermData;
use crate::element::{Element, Payload};
use crate::model::EntityModel;
use crate::schema::SchemaData;
use crate::structured::{ComplexTypeData, EntityTypeData};
use crate::types::{PrimitiveData, PrimitiveKind, TypeHead};

const EDM_PRIMITIVES: [PrimitiveKind; 17] = [
    PrimitiveKind::Binary,
    PrimitiveKind::Boolean,
    PrimitiveKind::Byte,
    PrimitiveKind::Date,
    PrimitiveKind::DateTimeOffset,
    PrimitiveKind::Decimal,
    PrimitiveKind::Double,
    PrimitiveKind::Duration,
    PrimitiveKind::Guid,
    PrimitiveKind::Int16,
    PrimitiveKind::Int32,
    PrimitiveKind::Int64,
    PrimitiveKind::SByte,
    PrimitiveKind::Single,
    PrimitiveKind::Stream,
    PrimitiveKind::String,
    PrimitiveKind::TimeOfDay,
];

const GEOGRAPHY_TYPES: [PrimitiveKind; 7] = [
    PrimitiveKind::GeographyPoint,
    PrimitiveKind::GeographyLineString,
    PrimitiveKind::GeographyPolygon,
    PrimitiveKind::GeographyMultiPoint,
    PrimitiveKind::GeographyMultiLineString,
    PrimitiveKind::GeographyMultiPolygon,
    PrimitiveKind::GeographyCollection,
];

const GEOMETRY_TYPES: [PrimitiveKind; 7] = [
    PrimitiveKind::GeometryPoint,
    PrimitiveKind::GeometryLineString,
    PrimitiveKind::GeometryPolygon,
    PrimitiveKind::GeometryMultiPoint,
    PrimitiveKind::GeometryMultiLineString,
    PrimitiveKind::GeometryMultiPolygon,
    PrimitiveKind::GeometryCollection,
];

/// The control information terms of the `odata` namespace; the flag marks
/// the one `Edm.Int64` term among the `Edm.String` ones.
const ODATA_TERMS: [(&str, bool); 16] = [
    ("associationLink", false),
    ("bind", false),
    ("context", false),
    ("count", true),
    ("deltaLink", false),
    ("editLink", false),
    ("etag", false),
    ("id", false),
    ("mediaContentType", false),
    ("mediaEditLink", false),
    ("mediaEtag", false),
    ("mediaReadLink", false),
    ("metadataEtag", false),
    ("navigationLink", false),
    ("nextLink", false),
    ("type", false),
];

struct EdmSchema {
    schema: Element,
    string: Element,
    int64: Element,
}

/// Builds both built-in schemas into `model` and returns them.
pub(crate) fn install(model: &EntityModel) -> (Element, Element) {
    let edm = install_edm(model);
    let odata = install_odata(model, &edm);
    (edm.schema, odata)
}

fn install_edm(model: &EntityModel) -> EdmSchema {
    let schema = model.alloc(Payload::Schema(SchemaData::new()), 0);
    declare_direct(model, model.root(), "Edm", schema);

    let primitive = primitive_type(model, schema, PrimitiveKind::Primitive, None, true);
    let mut string = primitive;
    let mut int64 = primitive;
    for kind in EDM_PRIMITIVES {
        let e = primitive_type(model, schema, kind, Some(primitive), false);
        match kind {
            PrimitiveKind::String => string = e,
            PrimitiveKind::Int64 => int64 = e,
            _ => {}
        }
    }

    let geography = primitive_type(model, schema, PrimitiveKind::Geography, Some(primitive), true);
    for kind in GEOGRAPHY_TYPES {
        primitive_type(model, schema, kind, Some(geography), false);
    }
    let geometry = primitive_type(model, schema, PrimitiveKind::Geometry, Some(primitive), true);
    for kind in GEOMETRY_TYPES {
        primitive_type(model, schema, kind, Some(geometry), false);
    }

    let complex = model.alloc(
        Payload::ComplexType(ComplexTypeData::new(true, Some(false))),
        0,
    );
    declare_direct(model, schema, "ComplexType", complex);
    close_direct(model, complex);

    let entity = model.alloc(
        Payload::EntityType(EntityTypeData::new(true, Some(false))),
        0,
    );
    declare_direct(model, schema, "EntityType", entity);
    close_direct(model, entity);

    close_direct(model, schema);
    EdmSchema {
        schema,
        string,
        int64,
    }
}

fn install_odata(model: &EntityModel, edm: &EdmSchema) -> Element {
    let schema = model.alloc(Payload::Schema(SchemaData::new()), 0);
    declare_direct(model, model.root(), "odata", schema);
    for (name, int_valued) in ODATA_TERMS {
        let data = TermData::new();
        let ty = if int_valued { edm.int64 } else { edm.string };
        data.type_ref.set(Some(ty));
        let term = model.alloc(Payload::Term(data), 0);
        declare_direct(model, schema, name, term);
    }
    close_direct(model, schema);
    schema
}

fn primitive_type(
    model: &EntityModel,
    schema: Element,
    kind: PrimitiveKind,
    base: Option<Element>,
    is_abstract: bool,
) -> Element {
    let head = TypeHead::new(is_abstract, Some(false));
    head.base.set(base);
    let e = model.alloc(Payload::Primitive(PrimitiveData { head, kind }), 0);
    declare_direct(model, schema, kind.name(), e);
    e
}

/// Declares `e` in `scope` bypassing the open-table checks; the built-in
/// scopes are complete before any user code can watch them.
fn declare_direct(model: &EntityModel, scope: Element, name: &str, e: Element) {
    let d = model.data(e);
    *d.name.borrow_mut() = Some(name.to_string());
    *d.qname.borrow_mut() = Some(model.qualify_name(scope, name));
    d.owner.set(Some(scope));
    if let Some(table) = model.data(scope).payload.table() {
        table.install(name, e);
    }
}

fn close_direct(model: &EntityModel, e: Element) {
    if let Some(table) = model.data(e).payload.table() {
        table.mark_closed();
    }
}
