//! Typed input schemas for tools.
//!
//! A schema is a flat list of fields that renders to a JSON Schema object.
//! That same JSON Schema is compiled once and used to validate model-supplied
//! arguments, after a light coercion pass, before a capability ever runs.

use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, Serializer};
use serde_json::{json, Map, Number, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Primitive type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// String holding an absolute http(s) URL.
    Url,
    /// Array of `{role, content}`-style objects.
    Array,
    Object,
}

impl FieldType {
    fn json_type(self) -> &'static str {
        match self {
            FieldType::String | FieldType::Url => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

/// One field of a tool's input.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub min_length: Option<usize>,
}

impl FieldSpec {
    pub fn new(name: &str, field_type: FieldType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            description: description.to_string(),
            required: false,
            default: None,
            minimum: None,
            maximum: None,
            min_length: None,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::String, description)
    }

    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Integer, description)
    }

    pub fn url(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Url, description)
    }

    pub fn array(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Array, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Inclusive integer range.
    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.minimum = Some(min);
        self.maximum = Some(max);
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Loosen what models commonly send: numeric strings, whole floats,
    /// "true"/"false" strings, padded strings. Anything else is left for the
    /// validator to reject.
    fn coerce(&self, value: Value) -> Value {
        match (self.field_type, value) {
            (FieldType::String | FieldType::Url, Value::String(s)) => {
                Value::String(s.trim().to_string())
            }
            (FieldType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Number(Number::from(i)),
                Err(_) => Value::String(s),
            },
            (FieldType::Integer, Value::Number(n)) if !n.is_i64() && !n.is_u64() => {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Value::Number(Number::from(f as i64))
                    }
                    _ => Value::Number(n),
                }
            }
            (FieldType::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::String(s)),
            (FieldType::Boolean, Value::String(s)) if s.eq_ignore_ascii_case("true") => {
                Value::Bool(true)
            }
            (FieldType::Boolean, Value::String(s)) if s.eq_ignore_ascii_case("false") => {
                Value::Bool(false)
            }
            (_, other) => other,
        }
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.field_type.json_type()));
        prop.insert("description".into(), json!(self.description));
        if self.field_type == FieldType::Url {
            prop.insert("format".into(), json!("uri"));
            prop.insert("pattern".into(), json!("^https?://\\S+$"));
        }
        if self.field_type == FieldType::Array {
            prop.insert("items".into(), json!({"type": "object"}));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        if let Some(min) = self.minimum {
            prop.insert("minimum".into(), json!(min));
        }
        if let Some(max) = self.maximum {
            prop.insert("maximum".into(), json!(max));
        }
        if let Some(len) = self.min_length {
            prop.insert("minLength".into(), json!(len));
        }
        Value::Object(prop)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Ordered list of input fields. Serializes as a JSON Schema object.
#[derive(Clone, Default)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
    compiled: OnceLock<Arc<JSONSchema>>,
}

impl fmt::Debug for InputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSchema")
            .field("fields", &self.fields)
            .finish()
    }
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self.compiled = OnceLock::new();
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn validator(&self) -> std::result::Result<&JSONSchema, SchemaError> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled.as_ref());
        }
        let schema = self.to_json_schema();
        let compiled = JSONSchema::options()
            .compile(&schema)
            .map_err(|e| SchemaError::single(format!("invalid tool schema: {}", e)))?;
        Ok(self.compiled.get_or_init(|| Arc::new(compiled)).as_ref())
    }

    /// Validate raw arguments against the advertised JSON Schema.
    ///
    /// Unknown fields are dropped, nulls count as absent and defaults are
    /// filled in before validation.
    pub fn validate(&self, arguments: &Value) -> std::result::Result<ValidatedArgs, SchemaError> {
        let empty = Map::new();
        let input = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            Value::String(raw) => {
                return Err(SchemaError::single(format!(
                    "arguments are not a JSON object: {}",
                    truncate(raw, 80)
                )))
            }
            other => {
                return Err(SchemaError::single(format!(
                    "arguments must be an object, got {}",
                    kind(other)
                )))
            }
        };

        let mut out = Map::new();
        for field in &self.fields {
            match input.get(&field.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    out.insert(field.name.clone(), field.coerce(value.clone()));
                }
                None => {
                    if let Some(default) = &field.default {
                        out.insert(field.name.clone(), default.clone());
                    }
                }
            }
        }

        let instance = Value::Object(out);
        let validator = self.validator()?;
        if let Err(errors) = validator.validate(&instance) {
            let problems: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(SchemaError { problems });
        }

        match instance {
            Value::Object(map) => Ok(ValidatedArgs(map)),
            _ => Ok(ValidatedArgs(Map::new())),
        }
    }

    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json_schema().serialize(serializer)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

/// Validation failures, one entry per violated keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    pub problems: Vec<String>,
}

impl SchemaError {
    fn single(problem: String) -> Self {
        Self {
            problems: vec![problem],
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.problems.join("; "))
    }
}

impl std::error::Error for SchemaError {}

/// Arguments that passed schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    /// Deserialize into a typed argument struct.
    pub fn parse<T: DeserializeOwned>(self) -> crate::error::Result<T> {
        Ok(serde_json::from_value(Value::Object(self.0))?)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
