//! Type descriptors
//!
//! A [`TypeDescriptor`] is the declared shape of a parameter, a return value,
//! or a record field. The coercion layer walks it to validate incoming values
//! and the documentation exporter renders it as JSON Schema.

use serde_json::{Map, Value, json};
use std::fmt;

/// Declared type of a value crossing the wire
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// Untyped; any JSON value is accepted unchanged
    Any,
    Null,
    Bool,
    /// Integer within the inclusive range of the declared Rust type
    Int { min: i128, max: i128 },
    Float,
    Str,
    /// Composite record with named fields
    Record(RecordDescriptor),
    /// Homogeneous sequence
    Sequence(Box<TypeDescriptor>),
    /// Value or `null`
    Optional(Box<TypeDescriptor>),
}

/// A named composite type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldSpec>,
}

/// One field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeDescriptor,
    /// The field may be omitted on input
    pub has_default: bool,
}

impl TypeDescriptor {
    /// Integer spanning the `i64` range
    pub fn int() -> Self {
        Self::int_range(i64::MIN.into(), i64::MAX.into())
    }

    pub fn int_range(min: i128, max: i128) -> Self {
        Self::Int { min, max }
    }

    pub fn sequence(items: TypeDescriptor) -> Self {
        Self::Sequence(Box::new(items))
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Whether `null` is an acceptable value for this type
    pub fn accepts_null(&self) -> bool {
        matches!(
            self,
            TypeDescriptor::Any | TypeDescriptor::Null | TypeDescriptor::Optional(_)
        )
    }

    /// Render as a JSON Schema fragment, registering every record reached
    /// under `definitions` and referencing it by `$ref`.
    pub fn to_json_schema(&self, definitions: &mut Map<String, Value>) -> Value {
        match self {
            TypeDescriptor::Any => json!({}),
            TypeDescriptor::Null => json!({"type": "null"}),
            TypeDescriptor::Bool => json!({"type": "boolean"}),
            TypeDescriptor::Int { min, max } => {
                let mut schema = Map::new();
                schema.insert("type".to_string(), json!("integer"));
                // Bounds at or beyond the i64 range are left implicit
                if *min > i128::from(i64::MIN) {
                    schema.insert("minimum".to_string(), json!(*min as i64));
                }
                if *max < i128::from(i64::MAX) {
                    schema.insert("maximum".to_string(), json!(*max as i64));
                }
                Value::Object(schema)
            }
            TypeDescriptor::Float => json!({"type": "number"}),
            TypeDescriptor::Str => json!({"type": "string"}),
            TypeDescriptor::Sequence(items) => {
                json!({"type": "array", "items": items.to_json_schema(definitions)})
            }
            TypeDescriptor::Optional(inner) => {
                let mut schema = inner.to_json_schema(definitions);
                if let Value::Object(obj) = &mut schema {
                    obj.insert("x-nullable".to_string(), Value::Bool(true));
                }
                schema
            }
            TypeDescriptor::Record(record) => {
                if !definitions.contains_key(&record.name) {
                    let schema = record.to_json_schema(definitions);
                    definitions.insert(record.name.clone(), schema);
                }
                json!({"$ref": format!("#/definitions/{}", record.name)})
            }
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Any => write!(f, "any"),
            TypeDescriptor::Null => write!(f, "null"),
            TypeDescriptor::Bool => write!(f, "bool"),
            TypeDescriptor::Int { .. } => write!(f, "int"),
            TypeDescriptor::Float => write!(f, "float"),
            TypeDescriptor::Str => write!(f, "str"),
            TypeDescriptor::Record(record) => write!(f, "{}", record.name),
            TypeDescriptor::Sequence(items) => write!(f, "list[{}]", items),
            TypeDescriptor::Optional(inner) => write!(f, "optional[{}]", inner),
        }
    }
}

impl RecordDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a field that must be present on input
    pub fn field(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            ty,
            has_default: false,
        });
        self
    }

    /// Add a field that may be omitted on input
    pub fn defaulted_field(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            ty,
            has_default: true,
        });
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    fn to_json_schema(&self, definitions: &mut Map<String, Value>) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.clone(), field.ty.to_json_schema(definitions));
            if !field.has_default {
                required.push(Value::String(field.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        if let Some(description) = &self.description {
            schema.insert("description".to_string(), json!(description));
        }
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }
}

impl From<RecordDescriptor> for TypeDescriptor {
    fn from(record: RecordDescriptor) -> Self {
        TypeDescriptor::Record(record)
    }
}

/// Types that can state their own wire shape.
///
/// Implemented here for primitives and standard containers; records get it
/// from `#[derive(Record)]`. Descriptors are built eagerly, so a record may
/// not contain itself, directly or through another record.
pub trait Describe {
    fn describe() -> TypeDescriptor;
}

macro_rules! describe_as {
    ($descriptor:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl Describe for $ty {
                fn describe() -> TypeDescriptor {
                    $descriptor
                }
            }
        )+
    };
}

describe_as!(TypeDescriptor::Bool => bool);
macro_rules! describe_int {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Describe for $ty {
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::int_range(
                        i128::try_from(<$ty>::MIN).unwrap_or(i128::MIN),
                        i128::try_from(<$ty>::MAX).unwrap_or(i128::MAX),
                    )
                }
            }
        )+
    };
}

describe_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
describe_as!(TypeDescriptor::Float => f32, f64);
describe_as!(TypeDescriptor::Str => String);
describe_as!(TypeDescriptor::Null => ());
describe_as!(TypeDescriptor::Any => Value);

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::sequence(T::describe())
    }
}

impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::optional(T::describe())
    }
}

impl<T: Describe> Describe for Box<T> {
    fn describe() -> TypeDescriptor {
        T::describe()
    }
}
