//! Integration tests for entity declaration and the four conversions

use modelmap::decorators::{enumeration, from, nullable, to, to_key, ty, validator};
use modelmap::{
    converty, Entity, EntityKey, FieldValue, Meta, Model, ModelError, ParseOptions,
    ReverseOptions, Storage, ValueType,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

struct User;

impl Entity for User {
    const NAME: &'static str = "User";

    fn declare(meta: &mut Meta) {
        meta.declare("name", [ty(ValueType::String)])
            .declare("age", [from("profile.age"), ty(ValueType::Number)])
            .declare("id", [to_key("id"), ty(ValueType::Number)]);
    }
}

struct Base;
struct Child;
struct Orphan;

impl Entity for Base {
    const NAME: &'static str = "Base";

    fn declare(meta: &mut Meta) {
        meta.declare("id", [ty(ValueType::Number), to()]);
    }
}

impl Entity for Child {
    const NAME: &'static str = "Child";

    fn parent() -> Option<EntityKey> {
        Some(Base::key())
    }

    fn declare(meta: &mut Meta) {
        meta.declare("name", [ty(ValueType::String), to()]);
    }
}

impl Entity for Orphan {
    const NAME: &'static str = "Orphan";

    fn parent() -> Option<EntityKey> {
        Some(Base::key())
    }

    fn declare(meta: &mut Meta) {
        meta.declare("name", [ty(ValueType::String), to()]);
    }
}

fn source(value: serde_json::Value) -> FieldValue {
    FieldValue::from(value)
}

fn shared(register: impl FnOnce(&mut Storage)) -> Arc<Storage> {
    let mut storage = Storage::new();
    register(&mut storage);
    storage.into_shared()
}

#[test]
fn test_user_scenario() {
    let storage = shared(|s| {
        s.register::<User>();
    });

    // name is missing and not nullable: the default logger fails the parse
    let err = Model::of::<User>(&storage, Some(&source(json!({"id": 1, "profile": {"age": 30}}))))
        .unwrap_err();
    assert_eq!(err.name(), "ModelError");
    assert_eq!(err.message(), "User.name defined as String, got: ");

    let mut user = Model::empty(&storage, &User::key());
    user.parse_with(
        &source(json!({"id": 1, "profile": {"age": 30}})),
        &ParseOptions::new().nullable(true),
    )
    .unwrap();
    assert_eq!(user.get("name"), None);
    assert_eq!(user.get("age"), Some(&FieldValue::Int(30)));
    assert_eq!(user.get("id"), Some(&FieldValue::Int(1)));

    assert_eq!(modelmap::record_to_json(&user.reverse()), json!({"id": 1}));
}

#[test]
fn test_inheritance_with_composition() {
    let storage = shared(|s| {
        s.register::<Base>();
        s.register::<Child>();
        modelmap::compose_entity(s, &Child::key());
    });

    let child = Model::of::<Child>(&storage, Some(&source(json!({"id": 1, "name": "x"})))).unwrap();
    assert_eq!(child.get("id"), Some(&FieldValue::Int(1)));
    assert_eq!(child.get("name"), Some(&FieldValue::from("x")));
    assert_eq!(
        modelmap::record_to_json(&child.reverse()),
        json!({"name": "x", "id": 1})
    );
}

#[test]
fn test_inheritance_without_composition_drops_parent_rules() {
    let storage = shared(|s| {
        s.register::<Base>();
        s.register::<Orphan>();
    });

    let input = source(json!({"id": 1, "name": "x"}));
    let orphan = Model::of::<Orphan>(&storage, Some(&input)).unwrap();
    assert_eq!(orphan.get("id"), None);
    assert_eq!(modelmap::record_to_json(&orphan.reverse()), json!({"name": "x"}));
}

#[test]
fn test_reverse_lightly_and_full() {
    let key = EntityKey::dynamic("Profile");
    let storage = shared(|s| {
        s.entity(&key)
            .declare("nick", [to(), nullable()])
            .declare("bio", [to(), nullable()])
            .declare("hidden", [nullable()]);
    });

    let input = source(json!({"nick": "", "hidden": 1}));
    let profile = Model::new(&storage, &key, Some(&input)).unwrap();
    assert!(profile.reverse().is_empty());

    let full = profile.reverse_with(&ReverseOptions::new().lightly(false));
    assert_eq!(modelmap::record_to_json(&full), json!({"nick": "", "bio": null}));
}

#[test]
fn test_round_trip() {
    let key = EntityKey::dynamic("Point");
    let storage = shared(|s| {
        s.entity(&key)
            .declare("x", [ty(ValueType::Number), to()])
            .declare("label", [ty(ValueType::String), to()]);
    });

    let input = source(json!({"x": 2.5, "label": "a"}));
    let original = Model::new(&storage, &key, Some(&input)).unwrap();
    let output = FieldValue::Record(original.reverse());
    let copy = Model::new(&storage, &key, Some(&output)).unwrap();
    assert_eq!(copy, original);
}

#[test]
fn test_enumeration() {
    let key = EntityKey::dynamic("Order");
    let storage = shared(|s| {
        s.entity(&key).declare("status", [enumeration(["A", "B"])]);
    });

    assert!(Model::new(&storage, &key, Some(&source(json!({"status": "A"})))).is_ok());
    let err = Model::new(&storage, &key, Some(&source(json!({"status": "C"})))).unwrap_err();
    assert_eq!(err.message(), "Order.status defined as A, B, got: C");
}

#[test]
fn test_swallowing_logger_continues_processing() {
    let key = EntityKey::dynamic("User");
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);

    let storage = shared(|s| {
        s.set_message_format("{entity}.{attr}: {type} <- {value}");
        s.set_logger(move |msg: &str| -> Result<(), ModelError> {
            sink.lock().unwrap().push(msg.to_string());
            Ok(())
        });
        s.entity(&key)
            .declare("name", [ty(ValueType::String)])
            .declare("age", [ty(ValueType::Number)]);
    });

    let input = source(json!({"name": true, "age": "x"}));
    let user = Model::new(&storage, &key, Some(&input)).unwrap();
    assert_eq!(user.get("name"), Some(&FieldValue::Bool(true)));
    assert_eq!(user.get("age"), Some(&FieldValue::from("x")));
    assert_eq!(
        *messages.lock().unwrap(),
        vec!["User.name: String <- true".to_string(), "User.age: Number <- x".to_string()]
    );
}

#[test]
fn test_validator_error_propagates_after_assignment() {
    let key = EntityKey::dynamic("Account");
    let storage = shared(|s| {
        s.entity(&key).declare(
            "balance",
            [
                ty(ValueType::Number),
                validator(|value, entity| match value.and_then(FieldValue::as_f64) {
                    Some(n) if n < 0.0 => Err(ModelError::custom(
                        "BalanceError",
                        format!("{} cannot go below zero", entity.name()),
                    )),
                    _ => Ok(()),
                }),
            ],
        );
    });

    let mut account = Model::empty(&storage, &key);
    let err = account.parse(&source(json!({"balance": -5}))).unwrap_err();
    assert_eq!(err.name(), "BalanceError");
    assert_eq!(err.to_string(), "BalanceError: Account cannot go below zero");
    assert_eq!(account.get("balance"), Some(&FieldValue::Int(-5)));
}

#[test]
fn test_recover_from_query_string() {
    let key = EntityKey::dynamic("Search");
    let storage = shared(|s| {
        s.entity(&key)
            .declare("page", [ty(ValueType::Number)])
            .declare("tags", [ty(ValueType::Array)])
            .declare("archived", [ty(ValueType::Boolean)])
            .field("page", 1)
            .field("tags", FieldValue::List(vec![]))
            .field("archived", false)
            .field("keyword", "");
    });

    let query = modelmap::parse_query("page=3&tags=a,b&archived=false&keyword=rust&unknown=1");
    let mut search = Model::empty(&storage, &key);
    search.recover(&FieldValue::Record(query)).unwrap();

    assert_eq!(
        search.to_json(),
        json!({"page": 3, "tags": ["a", "b"], "archived": false, "keyword": "rust"})
    );
}

#[test]
fn test_converty_properties() {
    let s = |text: &str| FieldValue::from(text);
    assert_eq!(converty(&s("false"), &ValueType::Boolean), FieldValue::Bool(false));
    assert_eq!(converty(&s("true"), &ValueType::Boolean), FieldValue::Bool(true));
    assert_eq!(converty(&s(""), &ValueType::Boolean), FieldValue::Bool(false));
    assert_eq!(converty(&s("a,b,c"), &ValueType::Array), source(json!(["a", "b", "c"])));
    assert_eq!(converty(&source(json!([1])), &ValueType::Array), source(json!([1])));
    assert_eq!(converty(&FieldValue::Int(1), &ValueType::Array), FieldValue::List(vec![]));
}
