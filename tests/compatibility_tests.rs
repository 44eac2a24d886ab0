//! Tests for forward/backward compatibility when a struct gains fields over time.
//!
//! - Decoding with a newer schema against data written by an older schema leaves
//!   the new fields absent from the resulting struct.
//! - Decoding with an older schema against data written by a newer schema silently
//!   skips the unknown trailing tags (the "unknown tags are skipped" invariant).

use sproto::codec;
use sproto::types::{Field, FieldType, Sproto, SprotoType};
use sproto::value::SprotoValue;
use std::collections::HashMap;

fn schema(fields: Vec<Field>) -> Sproto {
    let maxn = fields.len();
    let person_type = SprotoType {
        name: "Person".to_string(),
        fields,
        base_tag: 0,
        maxn,
    };
    let mut types_by_name = HashMap::new();
    types_by_name.insert("Person".to_string(), 0);
    Sproto {
        types_list: vec![person_type],
        types_by_name,
        protocols: vec![],
        protocols_by_name: HashMap::new(),
        protocols_by_tag: HashMap::new(),
    }
}

fn field(name: &str, tag: u16, field_type: FieldType) -> Field {
    Field {
        name: name.to_string(),
        tag,
        field_type,
        is_array: false,
        key_tag: -1,
        is_map: false,
        decimal_precision: 0,
    }
}

fn schema_v1() -> Sproto {
    schema(vec![
        field("name", 0, FieldType::String),
        field("age", 1, FieldType::Integer),
    ])
}

fn schema_v2() -> Sproto {
    schema(vec![
        field("name", 0, FieldType::String),
        field("age", 1, FieldType::Integer),
        field("email", 2, FieldType::String),
        field("score", 3, FieldType::Double),
    ])
}

#[test]
fn test_decode_missing_fields_with_newer_schema() {
    let schema_v1 = schema_v1();
    let person_type_v1 = schema_v1.get_type("Person").unwrap();

    let value = SprotoValue::from_fields(vec![
        ("name", "Alice".into()),
        ("age", 30i64.into()),
    ]);
    let bytes = codec::encode(&schema_v1, person_type_v1, &value).unwrap();

    let schema_v2 = schema_v2();
    let person_type_v2 = schema_v2.get_type("Person").unwrap();
    let decoded = codec::decode(&schema_v2, person_type_v2, &bytes).unwrap();

    let map = decoded.as_struct().unwrap();
    assert_eq!(map.get("name"), Some(&SprotoValue::Str("Alice".into())));
    assert_eq!(map.get("age"), Some(&SprotoValue::Integer(30)));
    assert!(map.get("email").is_none(), "email should be absent, not defaulted");
    assert!(map.get("score").is_none(), "score should be absent, not defaulted");
}

#[test]
fn test_decode_extra_fields_ignored_with_older_schema() {
    let schema_v2 = schema_v2();
    let person_type_v2 = schema_v2.get_type("Person").unwrap();

    let value = SprotoValue::from_fields(vec![
        ("name", "Bob".into()),
        ("age", 25i64.into()),
        ("email", "bob@example.com".into()),
        ("score", 95.5f64.into()),
    ]);
    let bytes = codec::encode(&schema_v2, person_type_v2, &value).unwrap();

    let schema_v1 = schema_v1();
    let person_type_v1 = schema_v1.get_type("Person").unwrap();
    let decoded = codec::decode(&schema_v1, person_type_v1, &bytes).unwrap();

    let map = decoded.as_struct().unwrap();
    assert_eq!(map.get("name"), Some(&SprotoValue::Str("Bob".into())));
    assert_eq!(map.get("age"), Some(&SprotoValue::Integer(25)));
    assert_eq!(map.len(), 2, "unknown trailing tags must be skipped, not errored");
}

#[test]
fn test_decode_interior_gap_field_ignored() {
    // v2 inserts a field between name/age; v1 should skip it via the tag-skip
    // mechanism rather than misaligning subsequent fields.
    let schema_v2_middle = schema(vec![
        field("name", 0, FieldType::String),
        field("nickname", 1, FieldType::String),
        field("age", 2, FieldType::Integer),
    ]);
    let t = schema_v2_middle.get_type("Person").unwrap();
    let value = SprotoValue::from_fields(vec![
        ("name", "Carol".into()),
        ("nickname", "Caz".into()),
        ("age", 7i64.into()),
    ]);
    let bytes = codec::encode(&schema_v2_middle, t, &value).unwrap();

    let schema_v1 = schema(vec![
        field("name", 0, FieldType::String),
        field("age", 2, FieldType::Integer),
    ]);
    let t1 = schema_v1.get_type("Person").unwrap();
    let decoded = codec::decode(&schema_v1, t1, &bytes).unwrap();
    let map = decoded.as_struct().unwrap();
    assert_eq!(map.get("name"), Some(&SprotoValue::Str("Carol".into())));
    assert_eq!(map.get("age"), Some(&SprotoValue::Integer(7)));
    assert!(map.get("nickname").is_none());
}
