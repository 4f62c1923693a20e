use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::errors::CoreError;
use crate::plan::{check_descriptors, FieldDescriptor, FieldType};

/// Accepts a symbol or currency prefix, then exactly one numeric token.
/// "about 30 results" stays ambiguous and is rejected.
static NUMERIC_BODY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^0-9+\-]*([+-]?\d[\d,]*(?:\.\d+)?)\s*$").expect("numeric body pattern")
});

/// Run-time validator built from a plan's field descriptors.
///
/// Each descriptor maps onto one [`FieldType`] variant, so no types are
/// generated at run time; the schema checks and coerces `serde_json::Value`
/// payloads against the declared shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    /// Build a schema from descriptors. Fails with a schema definition error
    /// when the set is empty or field names collide.
    pub fn synthesize(descriptors: &[FieldDescriptor]) -> Result<Self, CoreError> {
        check_descriptors(descriptors)?;
        Ok(Self {
            fields: descriptors.to_vec(),
        })
    }

    /// Declared descriptors in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Look up a declared descriptor by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.field_name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Whether a candidate mapping conforms to the schema as-is: no
    /// undeclared keys and every present value already matches its declared
    /// type. Absent fields are allowed (partial records are legal).
    pub fn conforms(&self, candidate: &Map<String, Value>) -> bool {
        candidate.iter().all(|(key, value)| {
            self.field(key)
                .map(|field| matches_declared_type(field.field_type, value))
                .unwrap_or(false)
        })
    }

    /// Coerce `value` toward `field_type` where one unambiguous reading
    /// exists; `None` means the value does not fit the declared type.
    pub fn coerce_value(field_type: FieldType, value: &Value) -> Option<Value> {
        match field_type {
            FieldType::String => coerce_string(value),
            FieldType::Number => coerce_number(value),
            FieldType::Boolean => coerce_boolean(value),
            FieldType::Url => coerce_url(value),
            FieldType::List => coerce_list(value),
        }
    }
}

/// Type check without coercion.
pub fn matches_declared_type(field_type: FieldType, value: &Value) -> bool {
    match field_type {
        FieldType::String => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Url => value
            .as_str()
            .map(|raw| parse_http_url(raw).is_some())
            .unwrap_or(false),
        FieldType::List => value.is_array(),
    }
}

fn coerce_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(Value::String(trimmed.to_string()))
            }
        }
        Value::Number(number) => Some(Value::String(number.to_string())),
        Value::Bool(flag) => Some(Value::String(flag.to_string())),
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(text) => {
            let captures = NUMERIC_BODY_RE.captures(text.trim())?;
            let body = captures.get(1)?.as_str().replace(',', "");
            let parsed: f64 = body.parse().ok()?;
            serde_json::Number::from_f64(parsed).map(Value::Number)
        }
        _ => None,
    }
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_url(value: &Value) -> Option<Value> {
    let raw = value.as_str()?;
    parse_http_url(raw).map(|_| Value::String(raw.trim().to_string()))
}

fn coerce_list(value: &Value) -> Option<Value> {
    match value {
        Value::Array(_) => Some(value.clone()),
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            Some(Value::Array(vec![value.clone()]))
        }
        _ => None,
    }
}

fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    if matches!(url.scheme(), "http" | "https") {
        Some(url)
    } else {
        None
    }
}
