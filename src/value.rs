//! Dynamic argument values and value transforms.
//!
//! Bound handler arguments are dynamically shaped — a path parameter is a
//! string, a parsed body is JSON, a header map is a keyed object. [`Value`]
//! is the common currency the parameter binder produces and handlers consume.
//!
//! Transforms are idempotent: coercing an already-coerced value through the
//! same transform yields an equal value (`int` applied to `"42"` and to `42`
//! both yield `42`).

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Error;

const TRUTHY: [&str; 4] = ["true", "1", "yes", "y"];

/// A bound handler argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Bytes),
    /// Multi-value sources (`headers`, `queries`, `urls`) produce a keyed map.
    Map(BTreeMap<String, Value>),
    /// A parsed request body.
    Json(serde_json::Value),
    /// Slot marker: this argument position carries the raw request object.
    Request,
    /// Slot marker: this argument position carries the raw response object.
    Response,
}

impl Value {
    /// Stringification used by the coercing transforms.
    pub fn to_text(&self) -> String {
        match self {
            Self::None | Self::Request | Self::Response => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s.clone(),
            Self::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Self::Json(serde_json::Value::String(s)) => s.clone(),
            Self::Json(other) => other.to_string(),
            Self::Map(_) => self.to_json().to_string(),
        }
    }

    /// JSON view, used by the pass-through serializer for structured values.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::None | Self::Request | Self::Response => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
            Self::Json(v) => v.clone(),
            Self::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// `true` for `true`/`1`/`yes`/`y`, after lowercase-trim.
pub fn is_truthy(text: &str) -> bool {
    TRUTHY.contains(&text.to_lowercase().trim())
}

/// A custom transform function.
pub type TransformFn = Arc<dyn Fn(Value) -> Result<Value, Error> + Send + Sync>;

/// A value transform attached to a binding spec.
#[derive(Clone)]
pub enum Transform {
    Bool,
    Buffer,
    Int,
    Float,
    Str,
    Custom(TransformFn),
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Bool => "Bool",
            Self::Buffer => "Buffer",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Str => "Str",
            Self::Custom(_) => "Custom",
        };
        f.write_str(tag)
    }
}

impl Transform {
    /// Builds a custom transform from a plain function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Applies the transform. A failed coercion is a reportable per-request
    /// error carrying the parameter name.
    pub fn apply(&self, name: &str, value: Value) -> Result<Value, Error> {
        match self {
            Self::Bool => Ok(Value::Bool(match value {
                Value::Bool(b) => b,
                other => is_truthy(&other.to_text()),
            })),
            Self::Buffer => Ok(Value::Bytes(match value {
                Value::Bytes(b) => b,
                Value::None => Bytes::new(),
                other => Bytes::from(other.to_text().into_bytes()),
            })),
            Self::Int => match value {
                Value::Int(i) => Ok(Value::Int(i)),
                Value::Float(f) => Ok(Value::Int(f as i64)),
                Value::Json(ref n) if n.is_i64() => Ok(Value::Int(n.as_i64().unwrap_or_default())),
                other => {
                    let text = other.to_text();
                    text.trim().parse::<i64>().map(Value::Int).map_err(|_| Error::Transform {
                        name: name.to_owned(),
                        reason: format!("`{text}` is not an integer"),
                    })
                }
            },
            Self::Float => match value {
                Value::Float(f) => Ok(Value::Float(f)),
                Value::Int(i) => Ok(Value::Float(i as f64)),
                Value::Json(ref n) if n.is_number() => {
                    Ok(Value::Float(n.as_f64().unwrap_or_default()))
                }
                other => {
                    let text = other.to_text();
                    text.trim().parse::<f64>().map(Value::Float).map_err(|_| Error::Transform {
                        name: name.to_owned(),
                        reason: format!("`{text}` is not a number"),
                    })
                }
            },
            Self::Str => Ok(Value::Str(value.to_text())),
            Self::Custom(f) => f(value),
        }
    }
}

/// Parses a transform tag (`bool`, `buffer`, `int`, `float`, `string`).
/// Unrecognized tags fail fast at bind-spec construction.
impl FromStr for Transform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim() {
            "bool" => Ok(Self::Bool),
            "buffer" => Ok(Self::Buffer),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "string" => Ok(Self::Str),
            other => Err(Error::UnsupportedTransform(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_transform_is_idempotent() {
        let once = Transform::Int.apply("id", Value::from("42")).unwrap();
        let twice = Transform::Int.apply("id", once.clone()).unwrap();
        assert_eq!(once, Value::Int(42));
        assert_eq!(once, twice);
    }

    #[test]
    fn float_transform_is_idempotent() {
        let once = Transform::Float.apply("f", Value::from(" 2.5 ")).unwrap();
        let twice = Transform::Float.apply("f", once.clone()).unwrap();
        assert_eq!(once, Value::Float(2.5));
        assert_eq!(once, twice);
    }

    #[test]
    fn bool_transform_uses_truthy_set() {
        for yes in ["true", "1", "yes", "Y"] {
            assert_eq!(Transform::Bool.apply("b", Value::from(yes)).unwrap(), Value::Bool(true));
        }
        assert_eq!(Transform::Bool.apply("b", Value::from("false")).unwrap(), Value::Bool(false));
        assert_eq!(Transform::Bool.apply("b", Value::from("")).unwrap(), Value::Bool(false));
        // idempotent on an already-coerced value
        assert_eq!(Transform::Bool.apply("b", Value::Bool(true)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn buffer_and_string_transforms() {
        assert_eq!(
            Transform::Buffer.apply("b", Value::from("hi")).unwrap(),
            Value::Bytes(Bytes::from_static(b"hi"))
        );
        assert_eq!(Transform::Buffer.apply("b", Value::None).unwrap(), Value::Bytes(Bytes::new()));
        assert_eq!(Transform::Str.apply("s", Value::Int(7)).unwrap(), Value::from("7"));
        assert_eq!(Transform::Str.apply("s", Value::None).unwrap(), Value::from(""));
    }

    #[test]
    fn failed_coercion_is_reported() {
        let err = Transform::Int.apply("page", Value::from("seven")).unwrap_err();
        assert!(matches!(err, Error::Transform { ref name, .. } if name == "page"));
    }

    #[test]
    fn unknown_tag_fails_fast() {
        assert!(matches!("int".parse::<Transform>(), Ok(Transform::Int)));
        assert!(matches!("uuid".parse::<Transform>(), Err(Error::UnsupportedTransform(_))));
    }
}
