//! Property-based tests using proptest
//!
//! These tests check the casting laws of shapes and the query-string encoding of resource
//! clients against randomized inputs.

use kopula::client::query_string;
use kopula::shape::truthy;
use kopula::{CastRule, CastType, Params, Shape};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Scalar JSON values, weighted towards the falsy ones.
fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!(0)),
        Just(json!("")),
        Just(json!(false)),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z0-9 .-]{0,12}".prop_map(Value::from),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => arb_scalar(),
        1 => prop::collection::vec(arb_scalar(), 0..3).prop_map(Value::from),
    ]
}

fn arb_type() -> impl Strategy<Value = CastType> {
    prop_oneof![
        Just(CastType::Number),
        Just(CastType::String),
        Just(CastType::Boolean),
        Just(CastType::Any),
    ]
}

fn arb_object() -> impl Strategy<Value = Params> {
    prop::collection::btree_map("[a-e]", arb_value(), 0..5)
        .prop_map(|fields| fields.into_iter().collect())
}

proptest! {
    /// Typed rules convert the raw value when it is truthy and the default otherwise
    #[test]
    fn typed_rule_substitutes_default_for_falsy(
        ty in arb_type(),
        default in arb_scalar(),
        raw in arb_value()
    ) {
        let rule = CastRule::typed(ty, default.clone());
        let expected = if truthy(&raw) { ty.convert(&raw) } else { ty.convert(&default) };
        prop_assert_eq!(rule.apply(&raw).unwrap(), expected);
    }

    /// Transform rules see exactly the raw value
    #[test]
    fn transform_rule_is_applied_verbatim(raw in arb_value()) {
        let rule = CastRule::transform(|v| Ok(json!({ "seen": v })));
        prop_assert_eq!(rule.apply(&raw).unwrap(), json!({ "seen": raw }));
    }

    /// Casting yields exactly the declared fields
    #[test]
    fn cast_yields_declared_fields(raw in arb_object()) {
        let shape = Shape::builder()
            .field("a", CastRule::number(1))
            .field("z", CastRule::any("fallback"))
            .build();
        let values = shape.cast(&Value::Object(raw)).unwrap();
        let keys: Vec<&str> = values.keys().map(String::as_str).collect();
        prop_assert_eq!(keys, vec!["a", "z"]);
        prop_assert_eq!(&values["z"], &json!("fallback"));
    }

    /// Casting an already-cast object through string and boolean rules changes nothing
    #[test]
    fn cast_is_stable(raw in arb_object()) {
        let shape = Shape::builder()
            .field("b", CastRule::string("b"))
            .field("c", CastRule::boolean(true))
            .build();
        let once = shape.cast(&Value::Object(raw)).unwrap();
        let twice = shape.cast(&Value::Object(once.clone())).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Query strings never carry raw separators or spaces
    #[test]
    fn query_string_is_escaped(raw in arb_object(), text in "[a-z &=?#%]{0,16}") {
        let mut params = raw;
        params.insert("text".to_string(), Value::from(text));
        let query = query_string(&params);
        prop_assert!(!query.contains(' '));
        prop_assert!(!query.contains('?'));
        prop_assert!(!query.contains('#'));
        prop_assert_eq!(query.matches('&').count(), params.len() - 1);
        prop_assert_eq!(query.matches('=').count(), params.len());
    }
}
