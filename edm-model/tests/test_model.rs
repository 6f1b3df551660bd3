use std::cell::{Cell, RefCell};
use std::rc::Rc;

use edm_model::names::{Path, QualifiedName, TermRef, TypeName};
use edm_model::{
    ConstExpr, Declaration, DeclareError, Element, ElementKind, EntityModel, ModelError,
    OverloadDecl, ParameterDecl, PrimitiveKind,
};

#[ctor::ctor]
fn init() {
    env_logger::init();
}

fn qn(s: &str) -> QualifiedName {
    s.parse().expect("qualified name")
}

fn tn(s: &str) -> TypeName {
    s.parse().expect("type name")
}

fn term(s: &str) -> TermRef {
    s.parse().expect("term reference")
}

fn nav_path(s: &str) -> Path {
    s.parse().expect("path")
}

fn schema_in(model: &EntityModel, namespace: &str) -> Element {
    model
        .declare(model.root(), namespace, Declaration::Schema)
        .expect("schema")
}

fn entity(model: &EntityModel, schema: Element, name: &str) -> Element {
    model
        .declare(
            schema,
            name,
            Declaration::EntityType {
                is_abstract: false,
                open_type: None,
            },
        )
        .expect("entity type")
}

fn complex(model: &EntityModel, schema: Element, name: &str) -> Element {
    model
        .declare(
            schema,
            name,
            Declaration::ComplexType {
                is_abstract: false,
                open_type: None,
            },
        )
        .expect("complex type")
}

fn property(
    model: &EntityModel,
    owner: Element,
    name: &str,
    ty: &str,
    nullable: Option<bool>,
) -> Element {
    let p = model
        .declare(owner, name, Declaration::Property { nullable })
        .expect("property");
    model
        .set_property_type_name(p, &tn(ty))
        .expect("property type");
    p
}

fn keyed_entity(model: &EntityModel, schema: Element, name: &str) -> Element {
    let t = entity(model, schema, name);
    property(model, t, "ID", "Edm.Int32", Some(false));
    model.add_key(t, &["ID"], None).expect("key");
    t
}

#[test]
fn builtin_namespaces_are_closed() {
    let model = EntityModel::new();
    let edm = model.edm();
    assert_eq!(model.kind_of(edm), ElementKind::Schema);
    assert!(model.is_closed(edm));
    assert!(model.is_closed(model.odata()));
    assert_eq!(model.get(model.root(), "Edm"), Some(edm));

    let string = model.qualified_get(&qn("Edm.String")).expect("Edm.String");
    assert_eq!(model.kind_of(string), ElementKind::PrimitiveType);
    assert_eq!(model.primitive_kind_of(string), Some(PrimitiveKind::String));
    assert_eq!(model.qname_of(string).as_deref(), Some("Edm.String"));

    let primitive = model
        .qualified_get(&qn("Edm.PrimitiveType"))
        .expect("Edm.PrimitiveType");
    assert!(model.is_abstract(primitive));
    assert!(model.is_derived_from(string, primitive, true));

    let geography = model
        .qualified_get(&qn("Edm.Geography"))
        .expect("Edm.Geography");
    let point = model
        .qualified_get(&qn("Edm.GeographyPoint"))
        .expect("Edm.GeographyPoint");
    assert!(model.is_abstract(geography));
    assert!(model.is_derived_from(point, geography, true));
    assert!(model.is_derived_from(point, primitive, true));

    let complex_base = model
        .qualified_get(&qn("Edm.ComplexType"))
        .expect("Edm.ComplexType");
    let entity_base = model
        .qualified_get(&qn("Edm.EntityType"))
        .expect("Edm.EntityType");
    assert!(model.is_abstract(complex_base));
    assert!(model.is_abstract(entity_base));
    assert!(model.is_closed(entity_base));
}

#[test]
fn builtin_namespaces_reject_declarations() {
    let model = EntityModel::new();
    let err = model
        .declare(model.edm(), "Extra", Declaration::Term)
        .expect_err("closed namespace");
    assert!(matches!(err, ModelError::Declare(DeclareError::Closed(_))));

    let err = model
        .declare(model.root(), "Edm", Declaration::Schema)
        .expect_err("taken namespace");
    assert_eq!(
        err,
        ModelError::Declare(DeclareError::Duplicate("Edm".to_string()))
    );
}

#[test]
fn control_vocabulary_terms() {
    let model = EntityModel::new();
    let ty = model.qualified_get(&qn("odata.type")).expect("odata.type");
    assert_eq!(model.kind_of(ty), ElementKind::Term);
    let string = model.qualified_get(&qn("Edm.String")).expect("string");
    assert_eq!(model.type_of(ty), Some(string));

    let count = model
        .qualified_get(&qn("odata.count"))
        .expect("odata.count");
    let int64 = model.qualified_get(&qn("Edm.Int64")).expect("int64");
    assert_eq!(model.type_of(count), Some(int64));

    let names: Vec<String> = model
        .entries(model.odata())
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert_eq!(names.len(), 16);
}

#[test]
fn qualified_names_follow_ownership() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    let id = model.get(product, "ID").expect("ID");

    assert_eq!(model.kind_of(model.root()), ElementKind::Model);
    assert_eq!(model.name_of(product).as_deref(), Some("Product"));
    assert_eq!(model.qname_of(product).as_deref(), Some("Shop.Product"));
    assert_eq!(model.qname_of(id).as_deref(), Some("Product/ID"));
    assert_eq!(model.owner_of(product), Some(shop));
    assert_eq!(model.owner_of(shop), Some(model.root()));

    let collection = model.collection_of(product).expect("collection");
    assert_eq!(model.kind_of(collection), ElementKind::CollectionType);
    assert_eq!(
        model.qname_of(collection).as_deref(),
        Some("Collection(Shop.Product)")
    );
    assert_eq!(model.item_type_of(collection), product);
}

#[test]
fn names_declare_once() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    entity(&model, shop, "Product");
    let err = model
        .declare(
            shop,
            "Product",
            Declaration::ComplexType {
                is_abstract: false,
                open_type: None,
            },
        )
        .expect_err("duplicate");
    assert_eq!(
        err,
        ModelError::Declare(DeclareError::Duplicate("Shop.Product".to_string()))
    );
}

#[test]
fn aliases_keep_first_identity() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    model.alias(shop, "Item", product).expect("alias");

    assert_eq!(model.get(shop, "Item"), Some(product));
    assert_eq!(model.name_of(product).as_deref(), Some("Product"));
    assert_eq!(model.qname_of(product).as_deref(), Some("Shop.Product"));

    let loose = model.collection_of(product).expect("collection");
    let err = model.alias(shop, "Loose", loose).expect_err("undeclared");
    assert!(matches!(err, ModelError::NotDeclared(_)));
}

#[test]
fn scopes_accept_only_their_kinds() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let err = model
        .declare(shop, "Loose", Declaration::Property { nullable: None })
        .expect_err("property in schema");
    assert_eq!(
        err,
        ModelError::Declare(DeclareError::BadValue {
            scope: "Shop".to_string(),
            kind: "property",
        })
    );

    let err = model
        .declare(shop, "Inner", Declaration::Schema)
        .expect_err("schema in schema");
    assert!(matches!(
        err,
        ModelError::Declare(DeclareError::BadValue { .. })
    ));

    let err = model
        .declare(model.root(), "Top", Declaration::EntityContainer)
        .expect_err("container at root");
    assert!(matches!(
        err,
        ModelError::Declare(DeclareError::BadValue { .. })
    ));

    let product = entity(&model, shop, "Product");
    let err = model
        .declare(product, "Sets", Declaration::EntitySet { in_service: true })
        .expect_err("entity set in a type");
    assert!(matches!(
        err,
        ModelError::Declare(DeclareError::BadValue { .. })
    ));

    // entity types are not valid property types
    let p = model
        .declare(product, "Twin", Declaration::Property { nullable: None })
        .expect("property");
    let err = model
        .set_property_type_name(p, &tn("Shop.Product"))
        .expect_err("entity-typed property");
    assert_eq!(
        err,
        ModelError::WrongKind {
            name: "Shop.Product".to_string(),
            expected: "a property type",
        }
    );
}

#[test]
fn properties_can_not_shadow_their_type() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = entity(&model, shop, "Product");
    let err = model
        .declare(product, "Product", Declaration::Property { nullable: None })
        .expect_err("shadowing");
    assert_eq!(
        err,
        ModelError::Declare(DeclareError::ShadowsTypeName("Shop.Product".to_string()))
    );
}

#[test]
fn tell_fires_exactly_once() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let hits = Rc::new(Cell::new(0u32));

    let count = hits.clone();
    model
        .tell(shop, "Later", move |_, found| {
            assert!(found.is_some());
            count.set(count.get() + 1);
        })
        .expect("tell");
    assert_eq!(hits.get(), 0);

    let later = entity(&model, shop, "Later");
    assert_eq!(hits.get(), 1);

    let count = hits.clone();
    model
        .tell(shop, "Later", move |_, found| {
            assert_eq!(found, Some(later));
            count.set(count.get() + 10);
        })
        .expect("tell on a declared name");
    assert_eq!(hits.get(), 11);
}

#[test]
fn tell_misses_fire_at_close() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let seen: Rc<Cell<Option<bool>>> = Rc::new(Cell::new(None));

    let witness = seen.clone();
    model
        .tell(shop, "Never", move |_, found| {
            witness.set(Some(found.is_some()))
        })
        .expect("tell");
    assert_eq!(seen.get(), None);

    model.close_scope(shop).expect("close schema");
    assert_eq!(seen.get(), Some(false));

    // on a closed scope the answer is immediate
    seen.set(None);
    let witness = seen.clone();
    model
        .tell(shop, "Another", move |_, found| {
            witness.set(Some(found.is_some()))
        })
        .expect("tell after close");
    assert_eq!(seen.get(), Some(false));
}

#[test]
fn pending_callbacks_fire_in_registration_order() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    for name in ["B", "A", "C"] {
        let log = order.clone();
        model
            .tell(shop, name, move |_, _| log.borrow_mut().push(name))
            .expect("tell");
    }
    let log = order.clone();
    model
        .tell_close(shop, move |_| log.borrow_mut().push("closed"))
        .expect("tell_close");

    model.close_scope(shop).expect("close schema");
    assert_eq!(*order.borrow(), ["B", "A", "C", "closed"]);
}

#[test]
fn tell_all_closed_waits_for_every_scope() {
    let model = EntityModel::new();
    let north = schema_in(&model, "North");
    let south = schema_in(&model, "South");
    let done = Rc::new(Cell::new(false));

    let flag = done.clone();
    model
        .tell_all_closed(&[north, south], move |_| flag.set(true))
        .expect("tell_all_closed");
    assert!(!done.get());

    model.close_scope(north).expect("close north");
    assert!(!done.get());
    model.close_scope(south).expect("close south");
    assert!(done.get());
}

#[test]
fn forward_references_hold_types_open() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    property(&model, product, "ShipTo", "Shop.Address", None);
    model.end_declaration(product).expect("end product");
    assert!(!model.is_closed(product));

    let address = complex(&model, shop, "Address");
    property(&model, address, "City", "Edm.String", None);
    assert!(!model.is_closed(product));

    model.end_declaration(address).expect("end address");
    assert!(model.is_closed(address));
    assert!(model.is_closed(product));

    let ship_to = model.get(product, "ShipTo").expect("ShipTo");
    assert_eq!(model.type_of(ship_to), Some(address));

    model.close_scope(shop).expect("close schema");
    model.close().expect("close model");
}

#[test]
fn base_types_resolve_forward_and_flatten() {
    let model = EntityModel::new();
    let people = schema_in(&model, "People");
    let worker = entity(&model, people, "Worker");
    model
        .set_base_name(worker, &qn("People.Person"))
        .expect("forward base");
    property(&model, worker, "Badge", "Edm.String", None);
    model.end_declaration(worker).expect("end worker");
    assert!(!model.is_closed(worker));

    let person = entity(&model, people, "Person");
    let name = property(&model, person, "Name", "Edm.String", Some(false));
    model.add_key(person, &["Name"], None).expect("key");
    model.end_declaration(person).expect("end person");

    assert!(model.is_closed(worker));
    assert_eq!(model.base_type_of(worker), Some(person));
    assert!(model.is_derived_from(worker, person, true));
    assert!(model.key_defined(worker));
    assert_eq!(model.get(worker, "Name"), Some(name));
    // inherited entries keep their defining identity
    assert_eq!(model.qname_of(name).as_deref(), Some("Person/Name"));
    let names: Vec<String> = model.entries(worker).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["Badge", "Name"]);

    model.close_scope(people).expect("close schema");
    model.close().expect("close model");
}

#[test]
fn inheritance_cycles_fail_on_the_spot() {
    let model = EntityModel::new();
    let cyclic = schema_in(&model, "Cyclic");
    let a = entity(&model, cyclic, "A");
    model
        .set_base_name(a, &qn("Cyclic.B"))
        .expect("forward base");
    let b = entity(&model, cyclic, "B");
    let err = model.set_base_name(b, &qn("Cyclic.A")).expect_err("cycle");
    assert_eq!(err, ModelError::EntityCycle("Cyclic.B".to_string()));

    // the failure sticks: the model can never close successfully
    let err = model.close().expect_err("poisoned close");
    assert_eq!(err, ModelError::EntityCycle("Cyclic.B".to_string()));
    let err = model.close().expect_err("still poisoned");
    assert_eq!(err, ModelError::EntityCycle("Cyclic.B".to_string()));
}

#[test]
fn complex_cycles_are_reported_by_kind() {
    let model = EntityModel::new();
    let cyclic = schema_in(&model, "Cyclic");
    let a = complex(&model, cyclic, "A");
    model
        .set_base_name(a, &qn("Cyclic.B"))
        .expect("forward base");
    let b = complex(&model, cyclic, "B");
    let err = model.set_base_name(b, &qn("Cyclic.A")).expect_err("cycle");
    assert_eq!(err, ModelError::ComplexCycle("Cyclic.B".to_string()));
}

#[test]
fn references_cross_schemas_not_yet_declared() {
    let model = EntityModel::new();
    let store = schema_in(&model, "Store");
    let product = keyed_entity(&model, store, "Product");
    property(&model, product, "Origin", "Geo.Country", None);
    model.end_declaration(product).expect("end product");
    assert!(!model.is_closed(product));

    let geo = schema_in(&model, "Geo");
    assert!(!model.is_closed(product));
    let country = complex(&model, geo, "Country");
    property(&model, country, "Code", "Edm.String", None);
    model.end_declaration(country).expect("end country");
    assert!(model.is_closed(product));

    model.close_scope(geo).expect("close Geo");
    model.close_scope(store).expect("close Store");
    model.close().expect("close model");
}

#[test]
fn unresolved_references_poison_the_model() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    property(&model, product, "ShipTo", "Shop.Address", None);
    model.end_declaration(product).expect("end product");

    let err = model.close_scope(shop).expect_err("missing Address");
    assert_eq!(
        err,
        ModelError::UnresolvedReference("Shop.Address".to_string())
    );

    let err = model.close().expect_err("poisoned");
    assert_eq!(
        err,
        ModelError::UnresolvedReference("Shop.Address".to_string())
    );
}

#[test]
fn unresolved_namespaces_surface_at_model_close() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    property(&model, product, "Origin", "Nowhere.Country", None);
    model.end_declaration(product).expect("end product");
    model.close_scope(shop).expect("close schema");

    let err = model.close().expect_err("missing namespace");
    assert_eq!(
        err,
        ModelError::UnresolvedReference("Nowhere.Country".to_string())
    );
}

#[test]
fn the_first_failure_wins() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let a = keyed_entity(&model, shop, "A");
    property(&model, a, "First", "Shop.MissingOne", None);
    model.end_declaration(a).expect("end A");
    let b = keyed_entity(&model, shop, "B");
    property(&model, b, "Second", "Shop.MissingTwo", None);
    model.end_declaration(b).expect("end B");

    let err = model.close_scope(shop).expect_err("two misses");
    assert_eq!(
        err,
        ModelError::UnresolvedReference("Shop.MissingOne".to_string())
    );
    let err = model.close().expect_err("first failure reported");
    assert_eq!(
        err,
        ModelError::UnresolvedReference("Shop.MissingOne".to_string())
    );
}

#[test]
fn open_schemas_block_the_close() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let err = model.close().expect_err("schema open");
    assert_eq!(err, ModelError::SchemaStillOpen("Shop".to_string()));

    // not a recorded failure: closing the schema clears the path
    model.close_scope(shop).expect("close schema");
    model.close().expect("close model");
}

#[test]
fn closing_twice_is_a_no_op() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    model.close_scope(shop).expect("close schema");
    model.close().expect("close");
    model.close().expect("close again");

    let err = model
        .declare(model.root(), "Late", Declaration::Schema)
        .expect_err("root closed");
    assert!(matches!(err, ModelError::Declare(DeclareError::Closed(_))));
}

#[test]
fn concrete_entity_types_need_a_key() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = entity(&model, shop, "Product");
    property(&model, product, "Name", "Edm.String", None);
    let err = model.end_declaration(product).expect_err("no key");
    assert_eq!(
        err,
        ModelError::InvalidKey {
            entity_type: "Shop.Product".to_string(),
            detail: "no key defined".to_string(),
        }
    );
}

#[test]
fn abstract_entity_types_close_without_a_key() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let resource = model
        .declare(
            shop,
            "Resource",
            Declaration::EntityType {
                is_abstract: true,
                open_type: None,
            },
        )
        .expect("abstract type");
    property(&model, resource, "Tag", "Edm.String", None);
    model.end_declaration(resource).expect("end type");
    assert!(model.is_closed(resource));
    assert!(!model.key_defined(resource));
}

#[test]
fn key_properties_must_be_non_nullable() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = entity(&model, shop, "Product");
    property(&model, product, "ID", "Edm.Int32", None);
    model.add_key(product, &["ID"], None).expect("key");
    let err = model.end_declaration(product).expect_err("nullable key");
    match err {
        ModelError::InvalidKey {
            entity_type,
            detail,
        } => {
            assert_eq!(entity_type, "Shop.Product");
            assert!(detail.contains("must not be nullable"), "{detail}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn key_properties_must_be_of_eligible_types() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = entity(&model, shop, "Product");
    property(&model, product, "Weight", "Edm.Double", Some(false));
    model.add_key(product, &["Weight"], None).expect("key");
    let err = model.end_declaration(product).expect_err("double key");
    match err {
        ModelError::InvalidKey { detail, .. } => {
            assert!(detail.contains("Edm.Double"), "{detail}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn keys_descend_through_complex_properties() {
    let model = EntityModel::new();
    let geo = schema_in(&model, "Geo");
    let address = complex(&model, geo, "Address");
    let city = property(&model, address, "City", "Edm.String", Some(false));
    model.end_declaration(address).expect("end address");

    let place = entity(&model, geo, "Place");
    property(&model, place, "Site", "Geo.Address", None);
    model
        .add_key(place, &["Site", "City"], Some("SiteCity"))
        .expect("key");
    model.end_declaration(place).expect("end place");
    assert!(model.is_closed(place));
    let key = model.key_of(place);
    assert_eq!(key.len(), 1);
    assert_eq!(key[0].0, "SiteCity");
    assert_eq!(key[0].1, ["Site", "City"]);
    assert_eq!(key[0].2, city);

    // shape rules apply as the parts are added
    let other = entity(&model, geo, "Other");
    property(&model, other, "ID", "Edm.Int32", Some(false));
    let err = model
        .add_key(other, &["ID"], Some("Alias"))
        .expect_err("alias on a single part");
    assert!(matches!(err, ModelError::InvalidKey { .. }));
    let err = model
        .add_key(other, &["Site", "City"], None)
        .expect_err("missing alias");
    assert!(matches!(err, ModelError::InvalidKey { .. }));
}

#[test]
fn derived_types_can_not_redefine_the_key() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let base = keyed_entity(&model, shop, "Base");
    model.end_declaration(base).expect("end base");

    let derived = entity(&model, shop, "Derived");
    model.set_base(derived, base).expect("base edge");
    property(&model, derived, "Code", "Edm.String", Some(false));
    model.add_key(derived, &["Code"], None).expect("recorded");
    let err = model.end_declaration(derived).expect_err("key conflict");
    assert_eq!(
        err,
        ModelError::BadBase {
            derived: "Shop.Derived".to_string(),
            base: "Shop.Base".to_string(),
            reason: "base already defines a key",
        }
    );
}

#[test]
fn base_properties_can_not_be_shadowed() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let base = keyed_entity(&model, shop, "Base");
    property(&model, base, "Name", "Edm.String", None);
    model.end_declaration(base).expect("end base");

    let derived = entity(&model, shop, "Derived");
    model.set_base(derived, base).expect("base edge");
    property(&model, derived, "Name", "Edm.String", None);
    let err = model
        .end_declaration(derived)
        .expect_err("shadowed property");
    assert_eq!(
        err,
        ModelError::Declare(DeclareError::Duplicate("Derived/Name".to_string()))
    );
}

#[test]
fn abstract_types_need_abstract_bases() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let base = keyed_entity(&model, shop, "Base");
    model.end_declaration(base).expect("end base");

    let ghost = model
        .declare(
            shop,
            "Ghost",
            Declaration::EntityType {
                is_abstract: true,
                open_type: None,
            },
        )
        .expect("abstract type");
    model.set_base(ghost, base).expect("base edge");
    let err = model.end_declaration(ghost).expect_err("concrete base");
    assert_eq!(
        err,
        ModelError::BadBase {
            derived: "Shop.Ghost".to_string(),
            base: "Shop.Base".to_string(),
            reason: "abstract type requires an abstract base",
        }
    );
}

#[test]
fn open_types_propagate_to_derived_types() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let base = model
        .declare(
            shop,
            "Base",
            Declaration::EntityType {
                is_abstract: false,
                open_type: Some(true),
            },
        )
        .expect("open base");
    property(&model, base, "ID", "Edm.Int32", Some(false));
    model.add_key(base, &["ID"], None).expect("key");
    model.end_declaration(base).expect("end base");
    assert_eq!(model.is_open_type(base), Some(true));

    let derived = entity(&model, shop, "Derived");
    model.set_base(derived, base).expect("base edge");
    model.end_declaration(derived).expect("end derived");
    assert_eq!(model.is_open_type(derived), Some(true));
}

#[test]
fn closed_types_can_not_extend_open_bases() {
    // known up front, rejected up front
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let base = model
        .declare(
            shop,
            "Base",
            Declaration::EntityType {
                is_abstract: false,
                open_type: Some(true),
            },
        )
        .expect("open base");
    property(&model, base, "ID", "Edm.Int32", Some(false));
    model.add_key(base, &["ID"], None).expect("key");
    model.end_declaration(base).expect("end base");
    let derived = model
        .declare(
            shop,
            "Derived",
            Declaration::EntityType {
                is_abstract: false,
                open_type: Some(false),
            },
        )
        .expect("closed derived");
    let err = model.set_base(derived, base).expect_err("open base");
    assert_eq!(
        err,
        ModelError::BadBase {
            derived: "Shop.Derived".to_string(),
            base: "Shop.Base".to_string(),
            reason: "open base requires an open derived type",
        }
    );

    // decided later, caught when the derived type completes
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let derived = entity(&model, shop, "Derived");
    model
        .set_base_name(derived, &qn("Shop.Base"))
        .expect("forward base");
    model.end_declaration(derived).expect("end derived");
    let base = model
        .declare(
            shop,
            "Base",
            Declaration::EntityType {
                is_abstract: false,
                open_type: Some(true),
            },
        )
        .expect("open base");
    property(&model, base, "ID", "Edm.Int32", Some(false));
    model.add_key(base, &["ID"], None).expect("key");
    model.set_open_type(derived, false).expect("explicit closed");
    let err = model.end_declaration(base).expect_err("open base");
    assert_eq!(
        err,
        ModelError::BadBase {
            derived: "Shop.Derived".to_string(),
            base: "Shop.Base".to_string(),
            reason: "open base requires an open derived type",
        }
    );
}

#[test]
fn collection_navigation_rejects_nullable() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    let nav = model
        .declare(
            product,
            "Parts",
            Declaration::NavigationProperty {
                nullable: Some(true),
                contains_target: false,
            },
        )
        .expect("navigation");
    let err = model
        .set_navigation_type(nav, product, true)
        .expect_err("nullable collection");
    assert!(matches!(err, ModelError::InvalidNavigation { .. }));
}

#[test]
fn containers_bind_sets_to_navigation() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");

    let product = keyed_entity(&model, shop, "Product");
    let orders_nav = model
        .declare(
            product,
            "Orders",
            Declaration::NavigationProperty {
                nullable: None,
                contains_target: false,
            },
        )
        .expect("navigation");
    model
        .set_navigation_type_name(orders_nav, &tn("Collection(Shop.Order)"))
        .expect("navigation type");
    model
        .set_partner_path(orders_nav, &["Customer"])
        .expect("partner");
    model.end_declaration(product).expect("end product");
    assert!(!model.is_closed(product));

    let order = keyed_entity(&model, shop, "Order");
    assert!(model.is_closed(product));
    property(&model, order, "CustomerID", "Edm.Int32", None);
    let customer_nav = model
        .declare(
            order,
            "Customer",
            Declaration::NavigationProperty {
                nullable: None,
                contains_target: false,
            },
        )
        .expect("navigation");
    model
        .set_navigation_type_name(customer_nav, &tn("Shop.Product"))
        .expect("navigation type");
    model
        .set_partner_path(customer_nav, &["Orders"])
        .expect("partner");
    model
        .add_constraint(customer_nav, &["CustomerID"], &["ID"])
        .expect("constraint");
    model.end_declaration(order).expect("end order");

    let svc = model
        .declare(shop, "Service", Declaration::EntityContainer)
        .expect("container");
    let products = model
        .declare(svc, "Products", Declaration::EntitySet { in_service: true })
        .expect("set");
    model
        .set_entity_type_name(products, &tn("Shop.Product"))
        .expect("set type");
    let orders = model
        .declare(svc, "Orders", Declaration::EntitySet { in_service: false })
        .expect("set");
    model
        .set_entity_type_name(orders, &tn("Shop.Order"))
        .expect("set type");
    model
        .add_navigation_binding(products, &nav_path("Orders"), "Orders")
        .expect("binding");
    model
        .add_navigation_binding(orders, &nav_path("Customer"), "Products")
        .expect("binding");

    let refresh = model
        .declare(shop, "Refresh", Declaration::Action)
        .expect("action");
    model
        .add_overload(
            refresh,
            OverloadDecl {
                is_bound: false,
                parameters: vec![],
                return_type: None,
                entity_set_path: None,
            },
        )
        .expect("overload");
    model.end_declaration(refresh).expect("end action");
    let import = model
        .declare(svc, "Refresh", Declaration::ActionImport)
        .expect("import");
    model
        .set_import_target_name(import, &qn("Shop.Refresh"))
        .expect("target");
    model
        .set_import_entity_set(import, "Products")
        .expect("advertised set");

    model.end_declaration(svc).expect("end container");
    model.close_scope(shop).expect("close schema");
    assert_eq!(model.binding_target_of(products, "Orders"), None);
    model.close().expect("close model");

    assert_eq!(model.get_container().expect("container"), Some(svc));
    assert_eq!(model.type_of(products), Some(product));
    assert!(model.in_service(products));
    assert!(!model.in_service(orders));
    assert_eq!(model.binding_target_of(products, "Orders"), Some(orders));
    assert_eq!(model.binding_target_of(orders, "Customer"), Some(products));
    assert_eq!(model.partner_of(orders_nav), Some(customer_nav));
    assert_eq!(model.partner_of(customer_nav), Some(orders_nav));
    assert!(model.is_collection(orders_nav));
    assert!(!model.is_collection(customer_nav));
    assert_eq!(model.nullable_of(customer_nav), Some(true));
    assert_eq!(model.import_target_of(import), Some(refresh));
    assert_eq!(model.import_entity_set_of(import), Some(products));
}

#[test]
fn entity_sets_hold_the_container_for_their_types() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let svc = model
        .declare(shop, "Service", Declaration::EntityContainer)
        .expect("container");
    let items = model
        .declare(svc, "Items", Declaration::EntitySet { in_service: true })
        .expect("set");
    model
        .set_entity_type_name(items, &tn("Shop.Item"))
        .expect("forward type");
    model.end_declaration(svc).expect("end container");
    assert!(!model.is_closed(svc));

    let item = keyed_entity(&model, shop, "Item");
    assert!(!model.is_closed(svc));
    model.end_declaration(item).expect("end item");
    assert!(model.is_closed(svc));
    assert_eq!(model.type_of(items), Some(item));
}

#[test]
fn entity_sets_demand_keyed_types() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let resource = model
        .declare(
            shop,
            "Resource",
            Declaration::EntityType {
                is_abstract: true,
                open_type: None,
            },
        )
        .expect("abstract type");
    model.end_declaration(resource).expect("end type");

    let svc = model
        .declare(shop, "Service", Declaration::EntityContainer)
        .expect("container");
    let bad = model
        .declare(svc, "Resources", Declaration::EntitySet { in_service: true })
        .expect("set");
    let err = model
        .set_entity_type_name(bad, &tn("Shop.Resource"))
        .expect_err("keyless type");
    match err {
        ModelError::InvalidKey {
            entity_type,
            detail,
        } => {
            assert_eq!(entity_type, "Shop.Resource");
            assert!(detail.contains("requires a key"), "{detail}");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = model
        .set_entity_type_name(bad, &tn("Collection(Shop.Resource)"))
        .expect_err("collection type");
    assert!(matches!(err, ModelError::WrongKind { .. }));

    // a singleton can expose the same keyless type
    let one = model
        .declare(svc, "Default", Declaration::Singleton)
        .expect("singleton");
    model
        .set_entity_type_name(one, &tn("Shop.Resource"))
        .expect("singleton type");
    assert_eq!(model.type_of(one), Some(resource));
    assert!(model.in_service(one));
}

#[test]
fn container_extension_folds_inherited_sets() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    let related = model
        .declare(
            product,
            "Related",
            Declaration::NavigationProperty {
                nullable: None,
                contains_target: false,
            },
        )
        .expect("navigation");
    model
        .set_navigation_type_name(related, &tn("Collection(Shop.Product)"))
        .expect("navigation type");
    model.end_declaration(product).expect("end product");

    let core = model
        .declare(shop, "Core", Declaration::EntityContainer)
        .expect("core");
    let archive = model
        .declare(core, "Archive", Declaration::EntitySet { in_service: false })
        .expect("set");
    model
        .set_entity_type_name(archive, &tn("Shop.Product"))
        .expect("set type");
    model.end_declaration(core).expect("end core");
    assert!(model.is_closed(core));

    let svc = model
        .declare(shop, "Service", Declaration::EntityContainer)
        .expect("service");
    model
        .set_container_extends_name(svc, &qn("Shop.Core"))
        .expect("extends");
    let products = model
        .declare(svc, "Products", Declaration::EntitySet { in_service: true })
        .expect("set");
    model
        .set_entity_type_name(products, &tn("Shop.Product"))
        .expect("set type");
    model
        .add_navigation_binding(products, &nav_path("Related"), "Shop.Core/Archive")
        .expect("binding");
    model.end_declaration(svc).expect("end service");

    assert_eq!(model.extends_of(svc), Some(core));
    assert_eq!(model.get(svc, "Archive"), Some(archive));
    assert_eq!(model.owner_of(archive), Some(core));

    model.close_scope(shop).expect("close schema");
    model.close().expect("close model");
    assert_eq!(model.binding_target_of(products, "Related"), Some(archive));
}

#[test]
fn mutual_extension_settles() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    model.end_declaration(product).expect("end product");

    let first = model
        .declare(shop, "First", Declaration::EntityContainer)
        .expect("first");
    model
        .set_container_extends_name(first, &qn("Shop.Second"))
        .expect("forward extends");
    let a = model
        .declare(first, "A", Declaration::EntitySet { in_service: true })
        .expect("set");
    model
        .set_entity_type_name(a, &tn("Shop.Product"))
        .expect("set type");

    let second = model
        .declare(shop, "Second", Declaration::EntityContainer)
        .expect("second");
    model
        .set_container_extends_name(second, &qn("Shop.First"))
        .expect("extends back");
    let b = model
        .declare(second, "B", Declaration::EntitySet { in_service: true })
        .expect("set");
    model
        .set_entity_type_name(b, &tn("Shop.Product"))
        .expect("set type");

    model.end_declaration(first).expect("end first");
    assert_eq!(model.get(first, "B"), Some(b));
    model.end_declaration(second).expect("end second");
    assert_eq!(model.get(second, "A"), Some(a));

    model.close_scope(shop).expect("close schema");
    model.close().expect("close model");
}

#[test]
fn imports_check_their_target_kind() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let cleanup = model
        .declare(shop, "Cleanup", Declaration::Action)
        .expect("action");
    model
        .add_overload(
            cleanup,
            OverloadDecl {
                is_bound: false,
                parameters: vec![],
                return_type: None,
                entity_set_path: None,
            },
        )
        .expect("overload");
    model.end_declaration(cleanup).expect("end action");

    let svc = model
        .declare(shop, "Service", Declaration::EntityContainer)
        .expect("container");
    let wrong = model
        .declare(svc, "Bad", Declaration::FunctionImport)
        .expect("import");
    let err = model
        .set_import_target_name(wrong, &qn("Shop.Cleanup"))
        .expect_err("kind mismatch");
    assert_eq!(
        err,
        ModelError::WrongKind {
            name: "Shop.Cleanup".to_string(),
            expected: "a function",
        }
    );
}

#[test]
fn imports_resolve_sets_declared_later() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    model.end_declaration(product).expect("end product");

    let list = model
        .declare(shop, "List", Declaration::Function)
        .expect("function");
    model
        .add_overload(
            list,
            OverloadDecl {
                is_bound: false,
                parameters: vec![],
                return_type: Some(tn("Collection(Shop.Product)")),
                entity_set_path: None,
            },
        )
        .expect("overload");
    model.end_declaration(list).expect("end function");

    let svc = model
        .declare(shop, "Service", Declaration::EntityContainer)
        .expect("container");
    let import = model
        .declare(svc, "List", Declaration::FunctionImport)
        .expect("import");
    model
        .set_import_target_name(import, &qn("Shop.List"))
        .expect("target");
    model
        .set_import_entity_set(import, "Products")
        .expect("set name");
    assert_eq!(model.import_entity_set_of(import), None);
    assert_eq!(
        model.import_entity_set_name(import).as_deref(),
        Some("Products")
    );

    let products = model
        .declare(svc, "Products", Declaration::EntitySet { in_service: true })
        .expect("set");
    model
        .set_entity_type_name(products, &tn("Shop.Product"))
        .expect("set type");
    assert_eq!(model.import_entity_set_of(import), Some(products));

    model.end_declaration(svc).expect("end container");
    model.close_scope(shop).expect("close schema");
    model.close().expect("close model");
}

#[test]
fn function_overloads_differ_by_parameter_names() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    model.end_declaration(product).expect("end product");

    let find = model
        .declare(shop, "Find", Declaration::Function)
        .expect("function");
    model
        .add_overload(
            find,
            OverloadDecl {
                is_bound: false,
                parameters: vec![ParameterDecl {
                    name: "name".to_string(),
                    type_name: tn("Edm.String"),
                    nullable: None,
                }],
                return_type: Some(tn("Shop.Product")),
                entity_set_path: None,
            },
        )
        .expect("first overload");
    model
        .add_overload(
            find,
            OverloadDecl {
                is_bound: false,
                parameters: vec![
                    ParameterDecl {
                        name: "name".to_string(),
                        type_name: tn("Edm.String"),
                        nullable: None,
                    },
                    ParameterDecl {
                        name: "limit".to_string(),
                        type_name: tn("Edm.Int32"),
                        nullable: Some(true),
                    },
                ],
                return_type: Some(tn("Collection(Shop.Product)")),
                entity_set_path: None,
            },
        )
        .expect("second overload");

    let err = model
        .add_overload(
            find,
            OverloadDecl {
                is_bound: false,
                parameters: vec![ParameterDecl {
                    name: "name".to_string(),
                    type_name: tn("Edm.Int32"),
                    nullable: None,
                }],
                return_type: Some(tn("Shop.Product")),
                entity_set_path: None,
            },
        )
        .expect_err("same parameter names");
    assert!(matches!(
        err,
        ModelError::Declare(DeclareError::Duplicate(_))
    ));

    // bound overloads are told apart by their binding parameter
    model
        .add_overload(
            find,
            OverloadDecl {
                is_bound: true,
                parameters: vec![ParameterDecl {
                    name: "name".to_string(),
                    type_name: tn("Shop.Product"),
                    nullable: None,
                }],
                return_type: Some(tn("Shop.Product")),
                entity_set_path: None,
            },
        )
        .expect("bound overload");

    model.end_declaration(find).expect("end function");
    assert_eq!(model.overload_count(find), 3);
    let string = model.qualified_get(&qn("Edm.String")).expect("string");
    assert_eq!(model.parameter_type_of(find, 0, "name"), Some(string));
    assert_eq!(model.parameter_info(find, 1, "limit"), Some((false, Some(true))));
    assert_eq!(model.return_type_of(find, 0), Some(product));
    assert_eq!(model.return_type_of(find, 1), Some(product));
    assert_eq!(model.overload_info(find, 1), Some((false, true, None)));

    let broken = model
        .declare(shop, "Broken", Declaration::Function)
        .expect("function");
    let err = model
        .add_overload(
            broken,
            OverloadDecl {
                is_bound: false,
                parameters: vec![],
                return_type: None,
                entity_set_path: None,
            },
        )
        .expect_err("function without a return");
    assert!(matches!(err, ModelError::UndefinedType(_)));
}

#[test]
fn enum_members_number_themselves() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let color = model
        .declare(shop, "Color", Declaration::EnumType { is_flags: false })
        .expect("enum");
    let red = model
        .declare(color, "Red", Declaration::Member { value: None })
        .expect("member");
    let green = model
        .declare(color, "Green", Declaration::Member { value: None })
        .expect("member");
    let blue = model
        .declare(color, "Blue", Declaration::Member { value: Some(10) })
        .expect("member");
    let alpha = model
        .declare(color, "Alpha", Declaration::Member { value: None })
        .expect("member");
    let teal = model
        .declare(color, "Teal", Declaration::Member { value: Some(10) })
        .expect("member");

    assert_eq!(model.member_value(red), Some(0));
    assert_eq!(model.member_value(green), Some(1));
    assert_eq!(model.member_value(blue), Some(10));
    assert_eq!(model.member_value(alpha), Some(11));
    assert_eq!(model.member_value(teal), Some(10));
    // the first member declared with a value represents it
    assert_eq!(model.member_with_value(color, 10), Some(blue));

    model.end_declaration(color).expect("end enum");
    assert!(model.is_closed(color));
    let int32 = model.qualified_get(&qn("Edm.Int32")).expect("int32");
    assert_eq!(model.underlying_type_of(color), Some(int32));
    assert_eq!(model.primitive_kind_of(color), Some(PrimitiveKind::Int32));
    assert_eq!(model.qname_of(red).as_deref(), Some("Color.Red"));
}

#[test]
fn flag_enums_require_explicit_values() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let perm = model
        .declare(shop, "Permission", Declaration::EnumType { is_flags: true })
        .expect("enum");
    let read = model
        .declare(perm, "Read", Declaration::Member { value: Some(1) })
        .expect("member");
    let err = model
        .declare(perm, "Write", Declaration::Member { value: None })
        .expect_err("auto value");
    assert_eq!(
        err,
        ModelError::ValueRequired("Permission.Write".to_string())
    );
    assert_eq!(model.member_value(read), Some(1));
    assert_eq!(model.get(perm, "Write"), None);
}

#[test]
fn enum_underlying_types_must_be_integers() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let size = model
        .declare(shop, "Size", Declaration::EnumType { is_flags: false })
        .expect("enum");
    model
        .set_enum_underlying_name(size, &qn("Edm.Byte"))
        .expect("byte underlying");
    model
        .declare(size, "Small", Declaration::Member { value: None })
        .expect("member");
    model.end_declaration(size).expect("end enum");
    assert_eq!(model.primitive_kind_of(size), Some(PrimitiveKind::Byte));

    let bad = model
        .declare(shop, "Bad", Declaration::EnumType { is_flags: false })
        .expect("enum");
    let err = model
        .set_enum_underlying_name(bad, &qn("Edm.String"))
        .expect_err("not an integer");
    assert_eq!(
        err,
        ModelError::WrongKind {
            name: "Edm.String".to_string(),
            expected: "an integer primitive type",
        }
    );
}

#[test]
fn enums_can_serve_as_keys() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let size = model
        .declare(shop, "Size", Declaration::EnumType { is_flags: false })
        .expect("enum");
    model
        .declare(size, "Small", Declaration::Member { value: None })
        .expect("member");
    model.end_declaration(size).expect("end enum");

    let shirt = entity(&model, shop, "Shirt");
    property(&model, shirt, "Fit", "Shop.Size", Some(false));
    model.add_key(shirt, &["Fit"], None).expect("key");
    model.end_declaration(shirt).expect("end entity");
    assert!(model.is_closed(shirt));
}

#[test]
fn type_definitions_carry_facets() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let code = model
        .declare(shop, "Code", Declaration::TypeDefinition)
        .expect("type definition");
    model.set_max_length(code, 8).expect("max length");
    model
        .set_underlying_type_name(code, &qn("Edm.String"))
        .expect("underlying");
    model.end_declaration(code).expect("end type definition");
    let string = model.qualified_get(&qn("Edm.String")).expect("string");
    assert_eq!(model.underlying_type_of(code), Some(string));
    assert_eq!(model.primitive_kind_of(code), Some(PrimitiveKind::String));

    // facets are checked the moment the underlying type resolves
    let blob = model
        .declare(shop, "Blob", Declaration::TypeDefinition)
        .expect("type definition");
    model.set_precision(blob, Some(3), None).expect("recorded");
    let err = model
        .set_underlying_type_name(blob, &qn("Edm.Binary"))
        .expect_err("precision on binary");
    assert_eq!(
        err,
        ModelError::BadFacet {
            name: "Shop.Blob".to_string(),
            facet: "Precision",
        }
    );

    let wrapper = model
        .declare(shop, "Wrapper", Declaration::TypeDefinition)
        .expect("type definition");
    let err = model
        .set_underlying_type_name(wrapper, &qn("Shop.Code"))
        .expect_err("underlying must be primitive");
    assert_eq!(
        err,
        ModelError::WrongKind {
            name: "Shop.Code".to_string(),
            expected: "a primitive type",
        }
    );
}

#[test]
fn typedef_annotations_reach_their_properties() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let doc = model.declare(shop, "Doc", Declaration::Term).expect("term");
    model
        .set_term_type_name(doc, &tn("Edm.String"))
        .expect("term type");
    model.end_declaration(doc).expect("end term");

    let score = model
        .declare(shop, "Score", Declaration::TypeDefinition)
        .expect("type definition");
    model
        .set_underlying_type_name(score, &qn("Edm.Int32"))
        .expect("underlying");
    model.end_declaration(score).expect("end type definition");
    model
        .annotate(score, &term("@Shop.Doc"), ConstExpr::Str("points".to_string()))
        .expect("annotate");

    let player = keyed_entity(&model, shop, "Player");
    let points = property(&model, player, "Points", "Shop.Score", None);
    model.end_declaration(player).expect("end entity");
    model.close_scope(shop).expect("close schema");
    assert!(model.annotations_of(points).is_empty());
    model.close().expect("close model");

    let applied = model.annotations_of(points);
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].0, doc);
    assert_eq!(applied[0].1, None);
    assert_eq!(applied[0].2, ConstExpr::Str("points".to_string()));
}

#[test]
fn conflicting_annotations_fail_the_close() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let doc = model.declare(shop, "Doc", Declaration::Term).expect("term");
    model
        .set_term_type_name(doc, &tn("Edm.String"))
        .expect("term type");
    model.end_declaration(doc).expect("end term");

    let score = model
        .declare(shop, "Score", Declaration::TypeDefinition)
        .expect("type definition");
    model
        .set_underlying_type_name(score, &qn("Edm.Int32"))
        .expect("underlying");
    model.end_declaration(score).expect("end type definition");
    model
        .annotate(score, &term("@Shop.Doc"), ConstExpr::Str("a".to_string()))
        .expect("annotate type definition");

    let player = keyed_entity(&model, shop, "Player");
    let points = property(&model, player, "Points", "Shop.Score", None);
    model
        .annotate(points, &term("@Shop.Doc"), ConstExpr::Str("b".to_string()))
        .expect("annotate property");
    model.end_declaration(player).expect("end entity");
    model.close_scope(shop).expect("close schema");

    let err = model.close().expect_err("conflicting annotations");
    assert_eq!(
        err,
        ModelError::Declare(DeclareError::Duplicate("@Shop.Doc".to_string()))
    );
}

#[test]
fn annotations_key_on_canonical_terms() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let vocab = schema_in(&model, "Vocabulary");
    model.alias_schema("V", vocab).expect("alias");
    let doc = model
        .declare(vocab, "Doc", Declaration::Term)
        .expect("term");
    model
        .set_term_type_name(doc, &tn("Edm.String"))
        .expect("term type");
    model.end_declaration(doc).expect("end term");

    let product = keyed_entity(&model, shop, "Product");
    model
        .annotate(product, &term("@V.Doc"), ConstExpr::Str("first".to_string()))
        .expect("aliased reference");
    let err = model
        .annotate(
            product,
            &term("@Vocabulary.Doc"),
            ConstExpr::Str("second".to_string()),
        )
        .expect_err("same term");
    assert_eq!(
        err,
        ModelError::Declare(DeclareError::Duplicate("@Vocabulary.Doc".to_string()))
    );

    // distinct qualifiers coexist
    model
        .annotate(product, &term("@V.Doc#short"), ConstExpr::Str("s".to_string()))
        .expect("qualified");
    assert_eq!(model.annotations_of(product).len(), 2);
}

#[test]
fn annotations_wait_for_their_terms() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    model.end_declaration(product).expect("end product");
    model
        .annotate(product, &term("@Shop.Rating"), ConstExpr::Int(5))
        .expect("forward term");
    assert!(model.annotations_of(product).is_empty());

    let rating = model
        .declare(shop, "Rating", Declaration::Term)
        .expect("term");
    let applied = model.annotations_of(product);
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].0, rating);
    assert_eq!(applied[0].2, ConstExpr::Int(5));

    model
        .set_term_type_name(rating, &tn("Edm.Int32"))
        .expect("term type");
    model.end_declaration(rating).expect("end term");
    model.close_scope(shop).expect("close schema");
    model.close().expect("close model");
}

#[test]
fn missing_terms_fail_the_close() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    model.end_declaration(product).expect("end product");
    model
        .annotate(product, &term("@Shop.Nope"), ConstExpr::Bool(true))
        .expect("forward term");

    let err = model.close_scope(shop).expect_err("missing term");
    assert_eq!(err, ModelError::UnresolvedReference("@Shop.Nope".to_string()));
}

#[test]
fn terms_take_types_until_completed() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let tags = model
        .declare(shop, "Tags", Declaration::Term)
        .expect("term");
    model
        .set_term_type_name(tags, &tn("Collection(Edm.String)"))
        .expect("collection type");
    model.end_declaration(tags).expect("end term");
    let string = model.qualified_get(&qn("Edm.String")).expect("string");
    assert_eq!(model.type_of(tags), Some(string));
    assert!(model.is_collection(tags));

    let err = model
        .set_term_type_name(tags, &tn("Edm.Int32"))
        .expect_err("completed term");
    assert_eq!(err, ModelError::Frozen("Shop.Tags".to_string()));
}

#[test]
fn labeled_expressions_hold_values() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let limit = model
        .declare(
            shop,
            "DefaultLimit",
            Declaration::LabeledExpression {
                value: ConstExpr::Int(50),
            },
        )
        .expect("labeled expression");
    assert_eq!(model.kind_of(limit), ElementKind::LabeledExpression);
    assert_eq!(model.labeled_value_of(limit), Some(ConstExpr::Int(50)));
    assert_eq!(model.labeled_value_of(shop), None);
}

#[test]
fn facets_check_against_property_types() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    let name = property(&model, product, "Name", "Edm.String", None);
    model.set_max_length(name, 40).expect("max length");
    model.set_unicode(name, false).expect("unicode");
    let price = property(&model, product, "Price", "Edm.Decimal", None);
    model.set_precision(price, Some(10), Some(2)).expect("precision");
    let site = property(&model, product, "Site", "Edm.GeographyPoint", None);
    model.set_srid(site, 4326).expect("srid");
    model.end_declaration(product).expect("end product");
    assert!(model.is_closed(product));

    let order = keyed_entity(&model, shop, "Order");
    let count = property(&model, order, "Count", "Edm.Int32", None);
    model.set_max_length(count, 5).expect("recorded unchecked");
    let err = model
        .end_declaration(order)
        .expect_err("max length on an integer");
    assert_eq!(
        err,
        ModelError::BadFacet {
            name: "Order/Count".to_string(),
            facet: "MaxLength",
        }
    );

    let err = model.set_max_length(name, 60).expect_err("owner closed");
    assert!(matches!(err, ModelError::Frozen(_)));
}

#[test]
fn containment_marks_the_target_type() {
    let model = EntityModel::new();
    let lib = schema_in(&model, "Library");
    let book = keyed_entity(&model, lib, "Book");
    model.end_declaration(book).expect("end book");

    let shelf = keyed_entity(&model, lib, "Shelf");
    let books = model
        .declare(
            shelf,
            "Books",
            Declaration::NavigationProperty {
                nullable: None,
                contains_target: true,
            },
        )
        .expect("containment navigation");
    model
        .set_navigation_type_name(books, &tn("Collection(Library.Book)"))
        .expect("navigation type");
    model.end_declaration(shelf).expect("end shelf");
    model.close_scope(lib).expect("close schema");
    assert!(!model.is_contained(book));
    model.close().expect("close model");

    assert!(model.contains_target(books));
    assert!(model.is_contained(book));
}

#[test]
fn containment_can_not_sit_inside_repeating_complex_values() {
    let model = EntityModel::new();
    let lib = schema_in(&model, "Library");
    let book = keyed_entity(&model, lib, "Book");
    model.end_declaration(book).expect("end book");

    let slot = complex(&model, lib, "Slot");
    let items = model
        .declare(
            slot,
            "Items",
            Declaration::NavigationProperty {
                nullable: None,
                contains_target: true,
            },
        )
        .expect("containment navigation");
    model
        .set_navigation_type_name(items, &tn("Collection(Library.Book)"))
        .expect("navigation type");
    model.end_declaration(slot).expect("end slot");

    let shelf = keyed_entity(&model, lib, "Shelf");
    property(&model, shelf, "Slots", "Collection(Library.Slot)", None);
    model.end_declaration(shelf).expect("end shelf");
    model.close_scope(lib).expect("close schema");

    let err = model.close().expect_err("containment in a repeating value");
    assert!(matches!(err, ModelError::InvalidNavigation { .. }));
}

#[test]
fn constraint_properties_must_agree() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    model.end_declaration(product).expect("end product");

    let order = keyed_entity(&model, shop, "Order");
    property(&model, order, "CustomerID", "Edm.String", None);
    let nav = model
        .declare(
            order,
            "Customer",
            Declaration::NavigationProperty {
                nullable: None,
                contains_target: false,
            },
        )
        .expect("navigation");
    model
        .set_navigation_type_name(nav, &tn("Shop.Product"))
        .expect("navigation type");
    model
        .add_constraint(nav, &["CustomerID"], &["ID"])
        .expect("constraint recorded");
    model.end_declaration(order).expect("end order");
    model.close_scope(shop).expect("close schema");

    let err = model.close().expect_err("type mismatch");
    match err {
        ModelError::InvalidNavigation { name, detail } => {
            assert_eq!(name, "Order/Customer");
            assert!(detail.contains("different types"), "{detail}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn nullable_relationships_need_nullable_dependents() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    model.end_declaration(product).expect("end product");

    let order = keyed_entity(&model, shop, "Order");
    property(&model, order, "CustomerID", "Edm.Int32", Some(false));
    let nav = model
        .declare(
            order,
            "Customer",
            Declaration::NavigationProperty {
                nullable: None,
                contains_target: false,
            },
        )
        .expect("navigation");
    model
        .set_navigation_type_name(nav, &tn("Shop.Product"))
        .expect("navigation type");
    model
        .add_constraint(nav, &["CustomerID"], &["ID"])
        .expect("constraint recorded");
    model.end_declaration(order).expect("end order");
    model.close_scope(shop).expect("close schema");

    let err = model.close().expect_err("nullability mismatch");
    match err {
        ModelError::InvalidNavigation { detail, .. } => {
            assert!(detail.contains("nullable dependent"), "{detail}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn collections_are_created_once_per_item() {
    let model = EntityModel::new();
    let string = model.qualified_get(&qn("Edm.String")).expect("string");
    let c1 = model.collection_of(string).expect("collection");
    let c2 = model.collection_of(string).expect("same collection");
    assert_eq!(c1, c2);
    assert_eq!(model.item_type_of(c1), string);
    let err = model.collection_of(c1).expect_err("nested collection");
    assert!(matches!(err, ModelError::WrongKind { .. }));
}

#[test]
fn at_most_one_container() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    model
        .declare(shop, "First", Declaration::EntityContainer)
        .expect("first");
    let other = schema_in(&model, "Other");
    model
        .declare(other, "Second", Declaration::EntityContainer)
        .expect("second");
    let err = model.get_container().expect_err("two containers");
    assert_eq!(
        err,
        ModelError::MultipleContainers("Shop.First".to_string(), "Other.Second".to_string())
    );
}

#[test]
fn completed_elements_are_frozen() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    model.end_declaration(product).expect("end product");

    let err = model.end_declaration(product).expect_err("already complete");
    assert_eq!(err, ModelError::Frozen("Shop.Product".to_string()));
    let err = model.add_key(product, &["ID"], None).expect_err("closed type");
    assert!(matches!(err, ModelError::Frozen(_)));
    let base = keyed_entity(&model, shop, "Base");
    model.end_declaration(base).expect("end base");
    let err = model.set_base(product, base).expect_err("closed type");
    assert!(matches!(err, ModelError::Frozen(_)));
    let err = model
        .declare(product, "Late", Declaration::Property { nullable: None })
        .expect_err("closed scope");
    assert!(matches!(err, ModelError::Declare(DeclareError::Closed(_))));
}

#[test]
fn schema_aliases_resolve_everywhere() {
    let model = EntityModel::new();
    let shop = schema_in(&model, "Shop");
    let product = keyed_entity(&model, shop, "Product");
    property(&model, product, "Twin", "Partner.Sibling", None);
    model.end_declaration(product).expect("end product");
    assert!(!model.is_closed(product));

    let partner = schema_in(&model, "PartnerData");
    model.alias_schema("Partner", partner).expect("alias");
    assert!(!model.is_closed(product));
    let sibling = complex(&model, partner, "Sibling");
    model.end_declaration(sibling).expect("end sibling");
    assert!(model.is_closed(product));

    assert_eq!(model.qualified_get(&qn("Partner.Sibling")), Some(sibling));
    assert_eq!(
        model
            .canonicalize_qname(&qn("Partner.Sibling"))
            .expect("canonical")
            .to_string(),
        "PartnerData.Sibling"
    );
    let err = model
        .canonicalize_qname(&qn("Stranger.Thing"))
        .expect_err("unknown namespace");
    assert!(matches!(err, ModelError::UnresolvedReference(_)));

    let err = model.alias_schema("Edm", partner).expect_err("reserved");
    assert_eq!(
        err,
        ModelError::Declare(DeclareError::ReservedAlias("Edm".to_string()))
    );
    let err = model.alias_schema("P2", product).expect_err("not a schema");
    assert!(matches!(err, ModelError::WrongKind { .. }));
}
