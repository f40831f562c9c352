// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Kopula library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Declarative shapes for untyped JSON payloads.
//!
//! A [Shape] maps field names to [CastRule]s. Casting a raw JSON object through a shape yields an
//! object containing exactly the declared fields, each one converted by its rule. The same shape
//! is used to normalize outgoing request bodies and incoming response bodies, so both directions
//! agree on types and defaults.

use serde_json::{Map, Number, Value};
use snafu::Snafu;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::iter::FromIterator;
use std::sync::Arc;

#[derive(Debug, Snafu)]
pub enum CastError {
    /// A transform rule refused its input.
    #[snafu(display("{}", message))]
    Rejected { message: String },

    #[snafu(display("unable to cast field `{}`: {}", field, source))]
    Field {
        field: String,
        source: Box<CastError>,
    },
}

impl CastError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    fn in_field(self, field: &str) -> Self {
        Self::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

/// Signature of a transform rule.
pub type CastFn = dyn Fn(&Value) -> Result<Value, CastError> + Send + Sync;

/// Whether a JSON value counts as present.
///
/// `null`, `false`, `0` and `""` are falsy. Everything else, including empty arrays and objects,
/// is truthy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Target type of a typed cast rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastType {
    Number,
    String,
    Boolean,
    /// Leaves the value untouched.
    Any,
}

impl CastType {
    /// Convert `raw` to this type. Never fails: values with no sensible numeric reading become
    /// `null`.
    pub fn convert(self, raw: &Value) -> Value {
        match self {
            CastType::Any => raw.clone(),
            CastType::Boolean => Value::Bool(truthy(raw)),
            CastType::String => Value::String(match raw {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(_) | Value::Object(_) => raw.to_string(),
            }),
            CastType::Number => match raw {
                Value::Null => Value::from(0),
                Value::Bool(b) => Value::from(*b as u8),
                Value::Number(_) => raw.clone(),
                Value::String(s) => parse_number(s.trim()),
                Value::Array(_) | Value::Object(_) => Value::Null,
            },
        }
    }
}

fn parse_number(s: &str) -> Value {
    if s.is_empty() {
        return Value::from(0);
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = s.parse::<u64>() {
        return Value::from(u);
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// How a single field is turned from wire data into its typed value.
#[derive(Clone)]
pub enum CastRule {
    /// A function that owns parsing and validation of the raw field. It receives `null` for an
    /// absent field and no default is ever substituted.
    Transform(Arc<CastFn>),
    /// Convert to `ty`, using `default` whenever the raw value is falsy.
    ///
    /// A legitimate `0`, `""` or `false` is indistinguishable from an absent field and is
    /// replaced by the default.
    Typed { ty: CastType, default: Value },
}

impl CastRule {
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, CastError> + Send + Sync + 'static,
    {
        CastRule::Transform(Arc::new(f))
    }

    pub fn typed(ty: CastType, default: impl Into<Value>) -> Self {
        CastRule::Typed {
            ty,
            default: default.into(),
        }
    }

    pub fn number(default: impl Into<Value>) -> Self {
        Self::typed(CastType::Number, default)
    }

    pub fn string(default: impl Into<Value>) -> Self {
        Self::typed(CastType::String, default)
    }

    pub fn boolean(default: bool) -> Self {
        Self::typed(CastType::Boolean, default)
    }

    pub fn any(default: impl Into<Value>) -> Self {
        Self::typed(CastType::Any, default)
    }

    pub fn apply(&self, raw: &Value) -> Result<Value, CastError> {
        match self {
            CastRule::Transform(f) => (f.as_ref())(raw),
            CastRule::Typed { ty, default } => {
                let effective = if truthy(raw) { raw } else { default };
                Ok(ty.convert(effective))
            }
        }
    }
}

impl Debug for CastRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CastRule::Transform(_) => f.write_str("Transform(..)"),
            CastRule::Typed { ty, default } => f
                .debug_struct("Typed")
                .field("ty", ty)
                .field("default", default)
                .finish(),
        }
    }
}

/// An immutable field-to-rule mapping.
///
/// Cloning a shape is cheap and every clone refers to the same rules, so one shape can be shared
/// by every client of a resource.
#[derive(Clone, Debug, Default)]
pub struct Shape {
    fields: Arc<BTreeMap<String, CastRule>>,
}

impl Shape {
    pub fn builder() -> ShapeBuilder {
        ShapeBuilder::default()
    }

    pub fn get(&self, field: &str) -> Option<&CastRule> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &CastRule)> {
        self.fields.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Cast `raw` into this shape.
    ///
    /// Only declared fields appear in the result. Fields missing from `raw` (or a `raw` that is
    /// not an object at all) are cast from `null`, which picks up the default of typed rules.
    pub fn cast(&self, raw: &Value) -> Result<Map<String, Value>, CastError> {
        let mut values = Map::new();
        for (field, rule) in self.fields.iter() {
            let value = rule
                .apply(raw.get(field).unwrap_or(&Value::Null))
                .map_err(|err| err.in_field(field))?;
            values.insert(field.clone(), value);
        }
        Ok(values)
    }

    /// Cast the declared fields of `body` in place, leaving undeclared fields as they are.
    pub fn normalize(&self, body: &mut Map<String, Value>) -> Result<(), CastError> {
        for (field, rule) in self.fields.iter() {
            let value = rule
                .apply(body.get(field).unwrap_or(&Value::Null))
                .map_err(|err| err.in_field(field))?;
            body.insert(field.clone(), value);
        }
        Ok(())
    }
}

impl<K: Into<String>> FromIterator<(K, CastRule)> for Shape {
    fn from_iter<I: IntoIterator<Item = (K, CastRule)>>(iter: I) -> Self {
        Self {
            fields: Arc::new(iter.into_iter().map(|(k, r)| (k.into(), r)).collect()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ShapeBuilder {
    fields: BTreeMap<String, CastRule>,
}

impl ShapeBuilder {
    /// Declare `name`, replacing any earlier rule for the same field.
    pub fn field(mut self, name: impl Into<String>, rule: CastRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    pub fn build(self) -> Shape {
        Shape {
            fields: Arc::new(self.fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_shape() -> Shape {
        Shape::builder()
            .field("id", CastRule::string(""))
            .field("name", CastRule::string("Anonymous"))
            .field("coins", CastRule::number(10))
            .build()
    }

    #[test]
    fn falsy_values_are_replaced_by_default() {
        let rule = CastRule::number(10);
        assert_eq!(rule.apply(&json!(0)).unwrap(), json!(10));
        assert_eq!(rule.apply(&Value::Null).unwrap(), json!(10));
        assert_eq!(rule.apply(&json!("")).unwrap(), json!(10));
        assert_eq!(rule.apply(&json!(3)).unwrap(), json!(3));

        let flag = CastRule::boolean(true);
        assert_eq!(flag.apply(&json!(false)).unwrap(), json!(true));
    }

    #[test]
    fn transform_sees_raw_value_without_default() {
        let rule = CastRule::transform(|raw| Ok(json!(raw.is_null())));
        assert_eq!(rule.apply(&Value::Null).unwrap(), json!(true));
        assert_eq!(rule.apply(&json!(0)).unwrap(), json!(false));
    }

    #[test]
    fn number_conversion() {
        assert_eq!(CastType::Number.convert(&json!(" 42 ")), json!(42));
        assert_eq!(CastType::Number.convert(&json!("1.5")), json!(1.5));
        assert_eq!(CastType::Number.convert(&json!(true)), json!(1));
        assert_eq!(CastType::Number.convert(&json!("ten")), Value::Null);
        assert_eq!(CastType::Number.convert(&json!([1])), Value::Null);
    }

    #[test]
    fn string_conversion() {
        assert_eq!(CastType::String.convert(&json!(7)), json!("7"));
        assert_eq!(CastType::String.convert(&json!(false)), json!("false"));
        assert_eq!(CastType::String.convert(&Value::Null), json!(""));
        assert_eq!(CastType::String.convert(&json!({"a": 1})), json!("{\"a\":1}"));
    }

    #[test]
    fn cast_keeps_declared_fields_only() {
        let values = user_shape()
            .cast(&json!({"id": "a", "name": "X", "admin": true}))
            .unwrap();
        assert_eq!(
            Value::Object(values),
            json!({"id": "a", "name": "X", "coins": 10})
        );
    }

    #[test]
    fn cast_of_non_object_uses_defaults() {
        let values = user_shape().cast(&json!([1, 2])).unwrap();
        assert_eq!(
            Value::Object(values),
            json!({"id": "", "name": "Anonymous", "coins": 10})
        );
    }

    #[test]
    fn normalize_keeps_undeclared_fields() {
        let mut body = json!({"id": "a", "coins": "5", "note": "hi"})
            .as_object()
            .cloned()
            .unwrap();
        user_shape().normalize(&mut body).unwrap();
        assert_eq!(
            Value::Object(body),
            json!({"id": "a", "name": "Anonymous", "coins": 5, "note": "hi"})
        );
    }

    #[test]
    fn transform_errors_name_the_field() {
        let shape = Shape::builder()
            .field(
                "age",
                CastRule::transform(|raw| {
                    raw.as_u64()
                        .map(Value::from)
                        .ok_or_else(|| CastError::rejected("expected an age"))
                }),
            )
            .build();
        let err = shape.cast(&json!({"age": "old"})).unwrap_err();
        assert_eq!(err.to_string(), "unable to cast field `age`: expected an age");
    }

    #[test]
    fn clones_share_rules() {
        let shape = user_shape();
        let other = shape.clone();
        assert!(Arc::ptr_eq(&shape.fields, &other.fields));
        assert_eq!(other.len(), 3);
    }
}
