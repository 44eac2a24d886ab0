//! Tests for the binary schema loader.
//!
//! A binary schema bundle is itself a sproto message (`group{type, protocol}`
//! per the format documented in `sproto::schema`), so these tests build
//! bundles with the generic encoder against a hand-built meta-schema, then
//! feed the resulting bytes to `schema::load_binary` — the same path a real
//! schema compiler's output would take.

use sproto::codec;
use sproto::schema;
use sproto::types::{Field, FieldType, Sproto, SprotoType};
use sproto::value::SprotoValue;

struct MetaSchema {
    sproto: Sproto,
    group_idx: usize,
    type_idx: usize,
    field_idx: usize,
    protocol_idx: usize,
}

fn meta_field(name: &str, tag: u16, field_type: FieldType, is_array: bool) -> Field {
    Field {
        name: name.to_string(),
        tag,
        field_type,
        is_array,
        key_tag: -1,
        is_map: false,
        decimal_precision: 0,
    }
}

/// Build the self-describing meta-schema that a binary bundle is encoded against.
fn meta_schema() -> MetaSchema {
    let mut sproto = Sproto::new();

    let field_idx = 0;
    sproto.types_by_name.insert("field".into(), field_idx);
    sproto.types_list.push(SprotoType {
        name: "field".into(),
        fields: vec![
            meta_field("name", 0, FieldType::String, false),
            meta_field("buildin", 1, FieldType::Integer, false),
            meta_field("type", 2, FieldType::Integer, false),
            meta_field("tag", 3, FieldType::Integer, false),
            meta_field("array", 4, FieldType::Boolean, false),
            meta_field("key", 5, FieldType::Integer, false),
            meta_field("map", 6, FieldType::Boolean, false),
        ],
        base_tag: 0,
        maxn: 7,
    });

    let type_idx = 1;
    sproto.types_by_name.insert("type".into(), type_idx);
    sproto.types_list.push(SprotoType {
        name: "type".into(),
        fields: vec![
            meta_field("name", 0, FieldType::String, false),
            meta_field("fields", 1, FieldType::Struct(field_idx), true),
        ],
        base_tag: 0,
        maxn: 2,
    });

    let protocol_idx = 2;
    sproto.types_by_name.insert("protocol".into(), protocol_idx);
    sproto.types_list.push(SprotoType {
        name: "protocol".into(),
        fields: vec![
            meta_field("name", 0, FieldType::String, false),
            meta_field("tag", 1, FieldType::Integer, false),
            meta_field("request", 2, FieldType::Integer, false),
            meta_field("response", 3, FieldType::Integer, false),
            meta_field("confirm", 4, FieldType::Boolean, false),
        ],
        base_tag: 0,
        maxn: 5,
    });

    let group_idx = 3;
    sproto.types_by_name.insert("group".into(), group_idx);
    sproto.types_list.push(SprotoType {
        name: "group".into(),
        fields: vec![
            meta_field("type", 0, FieldType::Struct(type_idx), true),
            meta_field("protocol", 1, FieldType::Struct(protocol_idx), true),
        ],
        base_tag: 0,
        maxn: 2,
    });

    MetaSchema {
        sproto,
        group_idx,
        type_idx,
        field_idx,
        protocol_idx,
    }
}

/// A `field` entry for a plain builtin-typed field (no struct reference).
fn builtin_field(name: &str, tag: i64, buildin: i64, type_precision: Option<i64>, is_array: bool, key: Option<i64>) -> SprotoValue {
    let mut fields = vec![
        ("name", SprotoValue::from(name)),
        ("buildin", SprotoValue::Integer(buildin)),
        ("tag", SprotoValue::Integer(tag)),
        ("array", SprotoValue::Boolean(is_array)),
    ];
    if let Some(p) = type_precision {
        fields.push(("type", SprotoValue::Integer(p)));
    }
    if let Some(k) = key {
        fields.push(("key", SprotoValue::Integer(k)));
    }
    SprotoValue::from_fields(fields)
}

/// A `field` entry referencing another declared type by index.
fn struct_field(name: &str, tag: i64, type_index: i64, is_array: bool) -> SprotoValue {
    SprotoValue::from_fields(vec![
        ("name", SprotoValue::from(name)),
        ("type", SprotoValue::Integer(type_index)),
        ("tag", SprotoValue::Integer(tag)),
        ("array", SprotoValue::Boolean(is_array)),
    ])
}

fn type_entry(name: &str, fields: Vec<SprotoValue>) -> SprotoValue {
    SprotoValue::from_fields(vec![
        ("name", SprotoValue::from(name)),
        ("fields", SprotoValue::Array(fields)),
    ])
}

fn encode_bundle(meta: &MetaSchema, types: Vec<SprotoValue>, protocols: Vec<SprotoValue>) -> Vec<u8> {
    let group_type = &meta.sproto.types_list[meta.group_idx];
    let mut fields = vec![("type", SprotoValue::Array(types))];
    if !protocols.is_empty() {
        fields.push(("protocol", SprotoValue::Array(protocols)));
    }
    let group = SprotoValue::from_fields(fields);
    codec::encode(&meta.sproto, group_type, &group).unwrap()
}

#[test]
fn test_load_simple_person_schema() {
    let meta = meta_schema();

    let person = type_entry(
        "Person",
        vec![
            builtin_field("name", 0, 2, None, false, None),
            builtin_field("age", 1, 0, None, false, None),
            builtin_field("marital", 2, 1, None, false, None),
        ],
    );

    let bundle = encode_bundle(&meta, vec![person], vec![]);
    let sproto = schema::load_binary(&bundle).unwrap();

    let person_type = sproto.get_type("Person").expect("Person type missing");
    assert_eq!(person_type.fields.len(), 3);
    assert_eq!(person_type.fields[0].name, "name");
    assert_eq!(person_type.fields[0].field_type, FieldType::String);
    assert_eq!(person_type.fields[1].name, "age");
    assert_eq!(person_type.fields[1].field_type, FieldType::Integer);
    assert_eq!(person_type.fields[2].name, "marital");
    assert_eq!(person_type.fields[2].field_type, FieldType::Boolean);
}

#[test]
fn test_load_schema_with_nested_struct_and_decimal() {
    let meta = meta_schema();

    let child = type_entry(
        "Child",
        vec![builtin_field("name", 0, 2, None, false, None)],
    );
    let parent = type_entry(
        "Parent",
        vec![
            struct_field("children", 0, 0, true), // references Child (index 0)
            builtin_field("fpn", 1, 0, Some(2), false, None), // integer(2): precision exponent 2
        ],
    );

    let bundle = encode_bundle(&meta, vec![child, parent], vec![]);
    let sproto = schema::load_binary(&bundle).unwrap();

    let parent_type = sproto.get_type("Parent").unwrap();
    assert!(matches!(parent_type.fields[0].field_type, FieldType::Struct(0)));
    assert!(parent_type.fields[0].is_array);
    assert_eq!(parent_type.fields[1].decimal_precision, 100);
}

#[test]
fn test_load_schema_with_protocols() {
    let meta = meta_schema();

    let request = type_entry("foo_request", vec![builtin_field("x", 0, 0, None, false, None)]);
    let response = type_entry("foo_response", vec![builtin_field("y", 0, 0, None, false, None)]);

    let foo_protocol = SprotoValue::from_fields(vec![
        ("name", SprotoValue::from("foo")),
        ("tag", SprotoValue::Integer(1)),
        ("request", SprotoValue::Integer(0)),
        ("response", SprotoValue::Integer(1)),
    ]);
    let blackhole_protocol = SprotoValue::from_fields(vec![
        ("name", SprotoValue::from("blackhole")),
        ("tag", SprotoValue::Integer(2)),
        ("confirm", SprotoValue::Boolean(true)),
    ]);

    let bundle = encode_bundle(&meta, vec![request, response], vec![foo_protocol, blackhole_protocol]);
    let sproto = schema::load_binary(&bundle).unwrap();

    let foo = sproto.get_protocol("foo").expect("foo protocol missing");
    assert_eq!(foo.tag, 1);
    assert_eq!(foo.request, Some(0));
    assert_eq!(foo.response, Some(1));
    assert!(!foo.confirm);

    let blackhole = sproto.get_protocol_by_tag(2).expect("blackhole missing");
    assert_eq!(blackhole.name, "blackhole");
    assert!(blackhole.confirm);
    assert!(blackhole.request.is_none());
}

#[test]
fn test_non_monotonic_tag_is_rejected() {
    let meta = meta_schema();

    // age (tag 1) declared before name (tag 0): violates the bundle's own
    // tag-ordering invariant.
    let person = type_entry(
        "Person",
        vec![
            builtin_field("age", 1, 0, None, false, None),
            builtin_field("name", 0, 2, None, false, None),
        ],
    );

    let bundle = encode_bundle(&meta, vec![person], vec![]);
    let err = schema::load_binary(&bundle).unwrap_err();
    assert!(matches!(err, sproto::error::SchemaError::NonMonotonicTag { .. }));
}

#[test]
fn test_subtype_out_of_range_is_rejected() {
    let meta = meta_schema();

    // Only one type is declared (index 0), but the field claims index 5.
    let bogus = type_entry("Bogus", vec![struct_field("ref", 0, 5, false)]);

    let bundle = encode_bundle(&meta, vec![bogus], vec![]);
    let err = schema::load_binary(&bundle).unwrap_err();
    assert!(matches!(err, sproto::error::SchemaError::SubtypeOutOfRange { .. }));
}

#[test]
fn test_truncated_bundle_is_rejected() {
    let meta = meta_schema();
    let person = type_entry("Person", vec![builtin_field("name", 0, 2, None, false, None)]);
    let bundle = encode_bundle(&meta, vec![person], vec![]);

    let truncated = &bundle[..bundle.len() / 2];
    let err = schema::load_binary(truncated).unwrap_err();
    assert!(matches!(err, sproto::error::SchemaError::Truncated { .. }));
}

#[test]
fn test_loaded_schema_round_trips_through_generic_codec() {
    // Confirms a schema loaded from a bundle is immediately usable by the
    // generic encoder/decoder, the same way a real application would use it.
    let meta = meta_schema();
    let person = type_entry(
        "Person",
        vec![
            builtin_field("name", 0, 2, None, false, None),
            builtin_field("age", 1, 0, None, false, None),
        ],
    );
    let bundle = encode_bundle(&meta, vec![person], vec![]);
    let sproto = schema::load_binary(&bundle).unwrap();

    let person_type = sproto.get_type("Person").unwrap();
    let value = SprotoValue::from_fields(vec![("name", "Alice".into()), ("age", 30i64.into())]);
    let encoded = codec::encode(&sproto, person_type, &value).unwrap();
    let decoded = codec::decode(&sproto, person_type, &encoded).unwrap();
    assert_eq!(value, decoded);
}
