//! Behavioral properties of dotted key parsing and path resolution.
//!
//! Everything here runs on plain in-memory documents; no store involved.

use dotted_state::{
    finite_number, get_data, is_value, parse_key, set_data, sort, unset_data, DottedKey, Record,
    SortOptions, StateError,
};
use serde_json::{json, Value};

// ===========================================================================
// parse_key
// ===========================================================================

#[test]
fn parse_key_without_separator_has_no_subpath() {
    for key in ["a", "user_1", "", "with space", "ümlaut"] {
        assert_eq!(
            parse_key(Some(key)),
            DottedKey {
                id: Some(key.to_string()),
                subpath: None,
            }
        );
    }
}

#[test]
fn parse_key_splits_on_first_separator() {
    assert_eq!(
        parse_key(Some("a.b.c")),
        DottedKey {
            id: Some("a".to_string()),
            subpath: Some("b.c".to_string()),
        }
    );
    assert_eq!(parse_key(Some(".b")).id.as_deref(), Some(""));
    assert_eq!(parse_key(Some(".b")).subpath.as_deref(), Some("b"));
}

#[test]
fn parse_key_of_nothing_is_empty() {
    assert_eq!(parse_key(None), DottedKey { id: None, subpath: None });
}

#[test]
fn parse_key_is_case_sensitive() {
    let parsed = parse_key(Some("User.Profile"));
    assert_eq!(parsed.id.as_deref(), Some("User"));
    assert_eq!(parsed.subpath.as_deref(), Some("Profile"));
}

// ===========================================================================
// get / set / unset
// ===========================================================================

fn sample_documents() -> Vec<Value> {
    vec![
        json!({}),
        json!({"a": 1}),
        json!({"profile": {"age": 30, "tags": ["x"]}}),
        json!({"profile": "scalar gets replaced"}),
    ]
}

fn sample_values() -> Vec<Value> {
    vec![
        json!(0),
        Value::Null,
        json!("text"),
        json!([1, 2, 3]),
        json!({"nested": {"deep": true}}),
        finite_number(2.5).unwrap(),
    ]
}

#[test]
fn set_then_get_round_trips() {
    let keys = ["u.a", "u.profile.age", "u.profile.tags.3", "u.x.y.z", "u.profile.tags.0.name"];

    for doc in sample_documents() {
        for key in keys {
            for value in sample_values() {
                assert!(is_value(Some(&value)));
                let mut data = doc.clone();
                set_data(key, &mut data, value.clone()).unwrap();
                assert_eq!(
                    get_data(key, &data),
                    Some(&value),
                    "key {} on {}",
                    key,
                    doc
                );
            }
        }
    }
}

#[test]
fn set_at_array_length_appends() {
    let mut data = json!({"tags": ["a", "b"]});
    set_data("u.tags.2", &mut data, json!("c")).unwrap();
    assert_eq!(data, json!({"tags": ["a", "b", "c"]}));
    assert_eq!(get_data("u.tags.2", &data), Some(&json!("c")));
    assert_eq!(get_data("u.tags.3", &data), None);
}

#[test]
fn set_far_past_array_length_pads_with_null() {
    let mut data = json!({"tags": ["a"]});
    set_data("u.tags.100", &mut data, json!("z")).unwrap();

    let tags = data["tags"].as_array().unwrap();
    assert_eq!(tags.len(), 101);
    assert!(tags[1..100].iter().all(Value::is_null));
    assert_eq!(get_data("u.tags.100", &data), Some(&json!("z")));
}

#[test]
fn oversized_array_index_is_target_error() {
    for key in [
        format!("u.tags.{}", usize::MAX),
        format!("u.tags.{}", u64::MAX / 16),
        format!("u.new.{}", 1u64 << 40),
    ] {
        let mut data = json!({"tags": ["a"]});
        let err = set_data(&key, &mut data, json!(1)).unwrap_err();
        assert!(matches!(err, StateError::Target { .. }), "{}", key);
        assert_eq!(data, json!({"tags": ["a"]}));
        assert_eq!(get_data(&key, &data), None);
    }
}

#[test]
fn index_beyond_usize_is_an_object_key() {
    let key = "u.tags.99999999999999999999999";
    let data = json!({"tags": ["a"]});
    assert_eq!(get_data(key, &data), None);

    let mut data = json!({});
    set_data(key, &mut data, json!(1)).unwrap();
    assert_eq!(get_data(key, &data), Some(&json!(1)));
    assert!(data["tags"].is_object());
}

#[test]
fn set_keeps_unrelated_siblings() {
    let mut data = json!({"profile": {"age": 30, "name": "n"}, "other": 1});
    set_data("u.profile.age", &mut data, json!(31)).unwrap();
    assert_eq!(data, json!({"profile": {"age": 31, "name": "n"}, "other": 1}));
}

#[test]
fn unset_then_get_is_missing() {
    let mut data = json!({"profile": {"age": 30, "name": "n"}, "flag": false});
    for key in ["u.profile.age", "u.flag"] {
        assert!(get_data(key, &data).is_some());
        unset_data(key, &mut data).unwrap();
        assert_eq!(get_data(key, &data), None);
    }
    assert_eq!(data, json!({"profile": {"name": "n"}}));
}

#[test]
fn set_into_empty_document_vivifies_map() {
    let mut data = json!({});
    set_data("a.b", &mut data, json!(5)).unwrap();
    assert_eq!(data, json!({"b": 5}));
    assert_eq!(get_data("a.b", &data), Some(&json!(5)));
}

#[test]
fn set_into_scalar_root_is_target_error() {
    for root in [json!(5), json!("s"), json!(true), Value::Null] {
        let mut data = root.clone();
        let err = set_data("a.b", &mut data, json!(1)).unwrap_err();
        assert_eq!(
            err,
            StateError::Target {
                key: "a.b".to_string()
            }
        );
        assert_eq!(data, root, "failed write must not mutate");
    }
}

#[test]
fn unset_on_scalar_root_is_target_error() {
    let mut data = json!(5);
    assert!(matches!(
        unset_data("a.b", &mut data),
        Err(StateError::Target { .. })
    ));
}

#[test]
fn whole_document_keys_leave_data_alone() {
    let mut data = json!({"x": 1});
    assert_eq!(get_data("a", &data), Some(&json!({"x": 1})));
    set_data("a", &mut data, json!("ignored")).unwrap();
    assert_eq!(unset_data("a", &mut data).unwrap(), None);
    assert_eq!(data, json!({"x": 1}));
}

// ===========================================================================
// is_value
// ===========================================================================

#[test]
fn is_value_rejects_undefined_and_infinities() {
    assert!(!is_value(finite_number(f64::INFINITY).as_ref()));
    assert!(!is_value(finite_number(f64::NEG_INFINITY).as_ref()));
    assert!(!is_value(None));
    assert!(is_value(Some(&json!(0))));
    assert!(is_value(Some(&Value::Null)));
}

// ===========================================================================
// sort
// ===========================================================================

fn sample_records() -> Vec<Record> {
    vec![
        Record::new("usr_a", json!({"age": 30, "name": "a"})),
        Record::new("usr_b", json!({"age": 25, "name": "b"})),
        Record::new("admin", json!({"age": 99})),
        Record::new("usr_c", json!({"age": 30, "name": "c"})),
        Record::new("usr_d", json!({"name": "d"})),
        Record::new("USR_e", json!({"age": 1})),
    ]
}

fn ids(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

#[test]
fn sort_without_path_filters_and_keeps_order() {
    let result = sort("usr", &sample_records(), &SortOptions::default());
    assert_eq!(ids(&result), vec!["usr_a", "usr_b", "usr_c", "usr_d"]);
}

#[test]
fn sort_by_path_is_descending_with_reversed_ties() {
    let result = sort("usr", &sample_records(), &SortOptions::by(".age"));
    // ascending: usr_d (missing), usr_b 25, usr_a 30, usr_c 30; then reversed
    assert_eq!(ids(&result), vec!["usr_c", "usr_a", "usr_b", "usr_d"]);
}

#[test]
fn sort_path_without_leading_separator() {
    let result = sort("usr", &sample_records(), &SortOptions::by("name"));
    assert_eq!(ids(&result), vec!["usr_d", "usr_c", "usr_b", "usr_a"]);
}

#[test]
fn sort_by_nested_path() {
    let records = vec![
        Record::new("p1", json!({"stats": {"score": 3}})),
        Record::new("p2", json!({"stats": {"score": 10}})),
        Record::new("p3", json!({"stats": {}})),
    ];
    let result = sort("p", &records, &SortOptions::by(".stats.score"));
    assert_eq!(ids(&result), vec!["p2", "p1", "p3"]);
}

#[test]
fn sort_with_empty_prefix_is_empty() {
    assert!(sort("", &sample_records(), &SortOptions::by("age")).is_empty());
    assert!(sort("usr", &[], &SortOptions::default()).is_empty());
}

#[test]
fn sort_prefix_is_literal_and_case_sensitive() {
    let result = sort("USR", &sample_records(), &SortOptions::default());
    assert_eq!(ids(&result), vec!["USR_e"]);

    let records = vec![
        Record::new("a.b", json!(1)),
        Record::new("ab", json!(2)),
        Record::new("a", json!(3)),
    ];
    assert_eq!(ids(&sort("a", &records, &SortOptions::default())), vec!["a.b", "ab", "a"]);
}
