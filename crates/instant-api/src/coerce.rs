//! Type coercion
//!
//! Inbound, a [`Validator`] walks a raw JSON value against its
//! [`TypeDescriptor`], normalising what it can (numeric strings, integral
//! floats, boolean spellings) and recording a `(path, reason)` pair for
//! everything it cannot. It never stops at the first bad field, so one
//! response can report every malformed field at once.
//!
//! Outbound, [`coerce_out`] checks a serialized return value against the
//! declared return type. A mismatch there is a server bug, not bad input.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::schema::{RecordDescriptor, TypeDescriptor};

/// Key used for errors that belong to a value as a whole rather than to one
/// of its fields.
pub const SCHEMA_KEY: &str = "_schema";

const INVALID_INPUT_TYPE: &str = "Invalid input type.";
const MISSING_FIELD: &str = "Missing data for required field.";
const UNKNOWN_FIELD: &str = "Unknown field.";
const NOT_NULLABLE: &str = "Field may not be null.";
const NOT_AN_INTEGER: &str = "Not a valid integer.";
const NOT_A_NUMBER: &str = "Not a valid number.";
const NOT_FINITE: &str = "Special numeric values (nan or infinity) are not permitted.";
const NOT_A_STRING: &str = "Not a valid string.";
const NOT_A_BOOLEAN: &str = "Not a valid boolean.";
const NOT_A_LIST: &str = "Not a valid list.";
const NOT_NULL: &str = "Value must be null.";

const TRUTHY: &[&str] = &["true", "t", "yes", "y", "on", "1"];
const FALSY: &[&str] = &["false", "f", "no", "n", "off", "0"];

/// Every validation failure found in one pass, as `(path, reason)` pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    entries: Vec<(Vec<String>, String)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: Vec<String>, reason: impl Into<String>) {
        self.entries.push((path, reason.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(Vec<String>, String)] {
        &self.entries
    }

    /// Nested error document keyed by field path, e.g.
    /// `{"p": {"_schema": ["Invalid input type."]}}`.
    ///
    /// Errors on the root value itself land under `_schema`.
    pub fn to_data(&self) -> Value {
        let mut root = Map::new();
        for (path, reason) in &self.entries {
            match path.split_last() {
                Some((leaf, parents)) => insert_reason(&mut root, parents, leaf, reason),
                None => insert_reason(&mut root, &[], SCHEMA_KEY, reason),
            }
        }
        Value::Object(root)
    }

    /// Compact one-line rendering used in error messages
    pub fn summary(&self) -> String {
        self.to_data().to_string()
    }
}

fn insert_reason(node: &mut Map<String, Value>, parents: &[String], leaf: &str, reason: &str) {
    match parents.split_first() {
        Some((segment, rest)) => {
            let child = node
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            // A field can fail as a whole and in its members
            if let Value::Array(whole) = child {
                let whole = std::mem::take(whole);
                let mut members = Map::new();
                members.insert(SCHEMA_KEY.to_string(), Value::Array(whole));
                *child = Value::Object(members);
            }
            if let Value::Object(map) = child {
                insert_reason(map, rest, leaf, reason);
            }
        }
        None => match node
            .entry(leaf.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(list) => list.push(Value::String(reason.to_string())),
            Value::Object(members) => insert_reason(members, &[], SCHEMA_KEY, reason),
            _ => {}
        },
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

impl std::error::Error for ValidationErrors {}

/// Visitor that validates values field by field and accumulates failures
#[derive(Debug, Default)]
pub struct Validator {
    path: Vec<String>,
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `value` as the named field and return its normalised form.
    ///
    /// On failure the returned value is a placeholder; only
    /// [`Validator::finish`] says whether the pass succeeded.
    pub fn field(&mut self, name: &str, value: &Value, ty: &TypeDescriptor) -> Value {
        self.path.push(name.to_string());
        let coerced = self.visit(value, ty);
        self.path.pop();
        coerced
    }

    /// Validate `value` at the current path
    pub fn visit(&mut self, value: &Value, ty: &TypeDescriptor) -> Value {
        if value.is_null() && !ty.accepts_null() {
            self.fail(NOT_NULLABLE);
            return Value::Null;
        }

        match ty {
            TypeDescriptor::Any => value.clone(),
            TypeDescriptor::Null => {
                if !value.is_null() {
                    self.fail(NOT_NULL);
                }
                Value::Null
            }
            TypeDescriptor::Optional(inner) => {
                if value.is_null() {
                    Value::Null
                } else {
                    self.visit(value, inner)
                }
            }
            TypeDescriptor::Bool => self.visit_bool(value),
            TypeDescriptor::Int { min, max } => self.visit_int(value, *min, *max),
            TypeDescriptor::Float => self.visit_float(value),
            TypeDescriptor::Str => match value {
                Value::String(_) => value.clone(),
                _ => self.fail(NOT_A_STRING),
            },
            TypeDescriptor::Sequence(items) => self.visit_sequence(value, items),
            TypeDescriptor::Record(record) => self.visit_record(value, record),
        }
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn fail(&mut self, reason: &str) -> Value {
        self.errors.push(self.path.clone(), reason);
        Value::Null
    }

    fn fail_at(&mut self, segment: &str, reason: &str) {
        let mut path = self.path.clone();
        path.push(segment.to_string());
        self.errors.push(path, reason);
    }

    fn visit_bool(&mut self, value: &Value) -> Value {
        match value {
            Value::Bool(_) => value.clone(),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Value::Bool(true),
                Some(0) => Value::Bool(false),
                _ => self.fail(NOT_A_BOOLEAN),
            },
            Value::String(s) => {
                let lowered = s.to_ascii_lowercase();
                if TRUTHY.contains(&lowered.as_str()) {
                    Value::Bool(true)
                } else if FALSY.contains(&lowered.as_str()) {
                    Value::Bool(false)
                } else {
                    self.fail(NOT_A_BOOLEAN)
                }
            }
            _ => self.fail(NOT_A_BOOLEAN),
        }
    }

    fn visit_int(&mut self, value: &Value, min: i128, max: i128) -> Value {
        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from))
                .or_else(|| integral(n.as_f64()?)),
            Value::String(s) => s.trim().parse::<i128>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) if (min..=max).contains(&n) => {
                if let Ok(signed) = i64::try_from(n) {
                    Value::from(signed)
                } else if let Ok(unsigned) = u64::try_from(n) {
                    Value::from(unsigned)
                } else {
                    self.fail(NOT_AN_INTEGER)
                }
            }
            _ => self.fail(NOT_AN_INTEGER),
        }
    }

    fn visit_float(&mut self, value: &Value) -> Value {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(f) => match Number::from_f64(f) {
                Some(n) => Value::Number(n),
                None => self.fail(NOT_FINITE),
            },
            None => self.fail(NOT_A_NUMBER),
        }
    }

    fn visit_sequence(&mut self, value: &Value, items: &TypeDescriptor) -> Value {
        let Value::Array(elements) = value else {
            return self.fail(NOT_A_LIST);
        };
        let coerced = elements
            .iter()
            .enumerate()
            .map(|(index, element)| self.field(&index.to_string(), element, items))
            .collect();
        Value::Array(coerced)
    }

    fn visit_record(&mut self, value: &Value, record: &RecordDescriptor) -> Value {
        let Value::Object(obj) = value else {
            self.fail_at(SCHEMA_KEY, INVALID_INPUT_TYPE);
            return Value::Null;
        };

        let mut coerced = Map::new();
        for field in &record.fields {
            match obj.get(&field.name) {
                Some(raw) => {
                    let value = self.field(&field.name, raw, &field.ty);
                    coerced.insert(field.name.clone(), value);
                }
                None if field.has_default => {}
                None => self.fail_at(&field.name, MISSING_FIELD),
            }
        }
        for key in obj.keys() {
            if record.get_field(key).is_none() {
                self.fail_at(key, UNKNOWN_FIELD);
            }
        }
        Value::Object(coerced)
    }
}

/// Whole-valued float as an integer. The `i64` window keeps the cast exact
/// enough to range-check.
fn integral(f: f64) -> Option<i128> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i128)
}

/// Validate and normalise one raw value against its declared type
pub fn coerce_in(value: &Value, ty: &TypeDescriptor) -> Result<Value, ValidationErrors> {
    let mut validator = Validator::new();
    let coerced = validator.visit(value, ty);
    validator.finish().map(|_| coerced)
}

/// A return value that does not match its declared type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("return value at '{path}' is not a valid {expected}: found {found}")]
pub struct OutboundError {
    pub path: String,
    pub expected: String,
    pub found: String,
}

/// Check a serialized return value against the declared return type,
/// dropping record members the type does not declare.
pub fn coerce_out(value: Value, ty: &TypeDescriptor) -> Result<Value, OutboundError> {
    walk_out(value, ty, "$")
}

fn walk_out(value: Value, ty: &TypeDescriptor, path: &str) -> Result<Value, OutboundError> {
    let mismatch = |value: &Value| OutboundError {
        path: path.to_string(),
        expected: ty.to_string(),
        found: json_type_name(value).to_string(),
    };

    match (ty, value) {
        (TypeDescriptor::Any, value) => Ok(value),
        (TypeDescriptor::Null, Value::Null) => Ok(Value::Null),
        (TypeDescriptor::Optional(_), Value::Null) => Ok(Value::Null),
        (TypeDescriptor::Optional(inner), value) => walk_out(value, inner, path),
        (TypeDescriptor::Bool, value @ Value::Bool(_)) => Ok(value),
        (TypeDescriptor::Int { .. }, Value::Number(n)) if n.is_i64() || n.is_u64() => {
            Ok(Value::Number(n))
        }
        (TypeDescriptor::Float, value @ Value::Number(_)) => Ok(value),
        (TypeDescriptor::Str, value @ Value::String(_)) => Ok(value),
        (TypeDescriptor::Sequence(items), Value::Array(elements)) => elements
            .into_iter()
            .enumerate()
            .map(|(index, element)| walk_out(element, items, &format!("{}[{}]", path, index)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (TypeDescriptor::Record(record), Value::Object(mut obj)) => {
            let mut out = Map::new();
            for field in &record.fields {
                let field_path = format!("{}.{}", path, field.name);
                match obj.remove(&field.name) {
                    Some(raw) => {
                        out.insert(field.name.clone(), walk_out(raw, &field.ty, &field_path)?);
                    }
                    None if field.has_default || field.ty.accepts_null() => {}
                    None => {
                        return Err(OutboundError {
                            path: field_path,
                            expected: field.ty.to_string(),
                            found: "nothing".to_string(),
                        });
                    }
                }
            }
            Ok(Value::Object(out))
        }
        (_, value) => Err(mismatch(&value)),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Describe;
    use serde_json::json;

    fn point() -> TypeDescriptor {
        TypeDescriptor::Record(
            RecordDescriptor::new("Point")
                .field("x", TypeDescriptor::int())
                .field("y", TypeDescriptor::int()),
        )
    }

    #[test]
    fn test_scalar_for_record_reports_schema_error() {
        let mut validator = Validator::new();
        validator.field("p", &json!("asd"), &point());
        let errors = validator.finish().unwrap_err();
        assert_eq!(
            errors.to_data(),
            json!({"p": {"_schema": ["Invalid input type."]}})
        );
        assert_eq!(
            errors.summary(),
            r#"{"p":{"_schema":["Invalid input type."]}}"#
        );
    }

    #[test]
    fn test_record_aggregates_every_field_error() {
        let errors = coerce_in(&json!({"x": "one", "z": 3}), &point()).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.to_data(),
            json!({
                "x": ["Not a valid integer."],
                "y": ["Missing data for required field."],
                "z": ["Unknown field."]
            })
        );
    }

    #[test]
    fn test_errors_across_fields_are_merged() {
        let mut validator = Validator::new();
        validator.field("p", &json!({"x": 1.5, "y": null}), &point());
        validator.field("dx", &json!("three"), &TypeDescriptor::int());
        let errors = validator.finish().unwrap_err();
        assert_eq!(
            errors.to_data(),
            json!({
                "p": {"x": ["Not a valid integer."], "y": ["Field may not be null."]},
                "dx": ["Not a valid integer."]
            })
        );
    }

    #[test]
    fn test_sequence_errors_keyed_by_index() {
        let ty = TypeDescriptor::sequence(TypeDescriptor::int());
        let errors = coerce_in(&json!([1, "x", 3, true]), &ty).unwrap_err();
        assert_eq!(
            errors.to_data(),
            json!({"1": ["Not a valid integer."], "3": ["Not a valid integer."]})
        );
        assert_eq!(
            coerce_in(&json!({"a": 1}), &ty).unwrap_err().to_data(),
            json!({"_schema": ["Not a valid list."]})
        );
    }

    #[test]
    fn test_lenient_scalar_coercion() {
        assert_eq!(coerce_in(&json!("42"), &TypeDescriptor::int()).unwrap(), json!(42));
        assert_eq!(coerce_in(&json!(4.0), &TypeDescriptor::int()).unwrap(), json!(4));
        assert_eq!(coerce_in(&json!("2.5"), &TypeDescriptor::Float).unwrap(), json!(2.5));
        assert_eq!(coerce_in(&json!(3), &TypeDescriptor::Float).unwrap(), json!(3.0));
        assert_eq!(coerce_in(&json!("Yes"), &TypeDescriptor::Bool).unwrap(), json!(true));
        assert_eq!(coerce_in(&json!(0), &TypeDescriptor::Bool).unwrap(), json!(false));
        assert!(coerce_in(&json!(1), &TypeDescriptor::Str).is_err());
        assert!(coerce_in(&json!(true), &TypeDescriptor::int()).is_err());
        assert!(coerce_in(&json!("nan"), &TypeDescriptor::Float).is_err());
    }

    #[test]
    fn test_integers_respect_declared_range() {
        let byte = u8::describe();
        assert_eq!(coerce_in(&json!(255), &byte).unwrap(), json!(255));
        assert_eq!(coerce_in(&json!("7"), &byte).unwrap(), json!(7));

        let mut validator = Validator::new();
        validator.field("n", &json!(300), &byte);
        validator.field("m", &json!(-1), &byte);
        validator.field("d", &json!(u64::MAX), &i64::describe());
        validator.field("s", &json!("-129"), &i8::describe());
        let errors = validator.finish().unwrap_err();
        assert_eq!(
            errors.to_data(),
            json!({
                "n": ["Not a valid integer."],
                "m": ["Not a valid integer."],
                "d": ["Not a valid integer."],
                "s": ["Not a valid integer."]
            })
        );

        assert_eq!(
            coerce_in(&json!(u64::MAX), &u64::describe()).unwrap(),
            json!(u64::MAX)
        );
        assert_eq!(
            coerce_in(&json!(i64::MIN), &i64::describe()).unwrap(),
            json!(i64::MIN)
        );
        assert!(coerce_in(&json!(-1), &u64::describe()).is_err());
        assert!(coerce_in(&json!(3e9), &i32::describe()).is_err());
    }

    #[test]
    fn test_whole_and_member_reasons_are_both_kept() {
        let mut errors = ValidationErrors::new();
        errors.push(vec!["p".to_string()], "Whole value rejected.");
        errors.push(vec!["p".to_string(), "x".to_string()], "Not a valid integer.");
        errors.push(vec!["p".to_string()], "Rejected again.");
        assert_eq!(
            errors.to_data(),
            json!({
                "p": {
                    "_schema": ["Whole value rejected.", "Rejected again."],
                    "x": ["Not a valid integer."]
                }
            })
        );
    }

    #[test]
    fn test_optional_and_defaulted_fields() {
        let ty = TypeDescriptor::Record(
            RecordDescriptor::new("Query")
                .field("term", TypeDescriptor::Str)
                .defaulted_field("limit", TypeDescriptor::optional(TypeDescriptor::int())),
        );
        assert_eq!(
            coerce_in(&json!({"term": "a"}), &ty).unwrap(),
            json!({"term": "a"})
        );
        assert_eq!(
            coerce_in(&json!({"term": "a", "limit": null}), &ty).unwrap(),
            json!({"term": "a", "limit": null})
        );
        assert_eq!(
            coerce_in(&json!({"term": "a", "limit": "5"}), &ty).unwrap(),
            json!({"term": "a", "limit": 5})
        );
    }

    #[test]
    fn test_any_passes_through() {
        let raw = json!({"anything": [1, "two", null]});
        assert_eq!(coerce_in(&raw, &TypeDescriptor::Any).unwrap(), raw);
    }

    #[test]
    fn test_coerce_out_drops_undeclared_members() {
        let out = coerce_out(json!({"x": 4, "y": 6, "extra": true}), &point()).unwrap();
        assert_eq!(out, json!({"x": 4, "y": 6}));
    }

    #[test]
    fn test_coerce_out_reports_mismatch_path() {
        let ty = TypeDescriptor::sequence(point());
        let error = coerce_out(json!([{"x": 1, "y": 2}, {"x": "1", "y": 2}]), &ty).unwrap_err();
        assert_eq!(error.path, "$[1].x");
        assert_eq!(error.expected, "int");
        assert_eq!(error.found, "str");

        let missing = coerce_out(json!({"x": 1}), &point()).unwrap_err();
        assert_eq!(missing.path, "$.y");
    }
}
