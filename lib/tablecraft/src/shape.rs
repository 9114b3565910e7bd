//! Value-shape schemas embedded in JSON columns.

use serde_json::Value as Json;

/// The expected structure of a JSON column's documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Any,
    Null,
    Bool,
    Number,
    Integer,
    String,
    Array(Box<Shape>),
    /// Listed fields must be present; unlisted fields are allowed.
    Object(Vec<(String, Shape)>),
    /// May be absent when used as an object field.
    Optional(Box<Shape>),
    Nullable(Box<Shape>),
}

/// Top-level JSON type that engines without schema support can still check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopLevel {
    Array,
    Object,
}

impl TopLevel {
    /// Name used by `json_type()` / `jsonb_typeof()`.
    pub fn json_type_name(self) -> &'static str {
        match self {
            TopLevel::Array => "array",
            TopLevel::Object => "object",
        }
    }
}

impl Shape {
    pub fn array(inner: Shape) -> Self {
        Shape::Array(Box::new(inner))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Shape)>) -> Self {
        Shape::Object(fields.into_iter().map(|(k, s)| (k.into(), s)).collect())
    }

    pub fn optional(inner: Shape) -> Self {
        Shape::Optional(Box::new(inner))
    }

    pub fn nullable(inner: Shape) -> Self {
        Shape::Nullable(Box::new(inner))
    }

    pub fn top_level(&self) -> Option<TopLevel> {
        match self {
            Shape::Array(_) => Some(TopLevel::Array),
            Shape::Object(_) => Some(TopLevel::Object),
            _ => None,
        }
    }

    /// Check a document against this shape, naming the first offending path.
    pub fn validate(&self, value: &Json) -> Result<(), String> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Json, path: &str) -> Result<(), String> {
        let ok = match (self, value) {
            (Shape::Any, _) => true,
            (Shape::Null, Json::Null) => true,
            (Shape::Bool, Json::Bool(_)) => true,
            (Shape::Number, Json::Number(_)) => true,
            (Shape::Integer, Json::Number(n)) => n.is_i64() || n.is_u64(),
            (Shape::String, Json::String(_)) => true,
            (Shape::Optional(inner), v) => return inner.validate_at(v, path),
            (Shape::Nullable(_), Json::Null) => true,
            (Shape::Nullable(inner), v) => return inner.validate_at(v, path),
            (Shape::Array(inner), Json::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate_at(item, &format!("{path}[{i}]"))?;
                }
                true
            }
            (Shape::Object(fields), Json::Object(map)) => {
                for (key, shape) in fields {
                    let field_path = format!("{path}.{key}");
                    match (map.get(key), shape) {
                        (Some(v), shape) => shape.validate_at(v, &field_path)?,
                        (None, Shape::Optional(_)) => {}
                        (None, _) => return Err(format!("{field_path}: missing")),
                    }
                }
                true
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{path}: expected {}", self.describe()))
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Shape::Any => "any",
            Shape::Null => "null",
            Shape::Bool => "bool",
            Shape::Number => "number",
            Shape::Integer => "integer",
            Shape::String => "string",
            Shape::Array(_) => "array",
            Shape::Object(_) => "object",
            Shape::Optional(inner) | Shape::Nullable(inner) => inner.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Shape {
        Shape::object([
            ("somestring", Shape::String),
            ("someint", Shape::Integer),
            ("somearray", Shape::array(Shape::String)),
            ("note", Shape::optional(Shape::String)),
            ("someobject", Shape::object([("foo", Shape::String)])),
        ])
    }

    #[test]
    fn test_valid_document() {
        let doc = json!({
            "somestring": "a",
            "someint": 1,
            "somearray": ["x", "y"],
            "someobject": {"foo": "bar", "extra": true},
        });
        assert_eq!(sample().validate(&doc), Ok(()));
    }

    #[test]
    fn test_reports_nested_path() {
        let doc = json!({
            "somestring": "a",
            "someint": 1,
            "somearray": ["x", 2],
            "someobject": {"foo": "bar"},
        });
        assert_eq!(
            sample().validate(&doc),
            Err("$.somearray[1]: expected string".to_string())
        );
    }

    #[test]
    fn test_missing_required_field() {
        let doc = json!({"somestring": "a"});
        assert_eq!(
            sample().validate(&doc),
            Err("$.someint: missing".to_string())
        );
    }

    #[test]
    fn test_integer_rejects_fraction() {
        assert!(Shape::Integer.validate(&json!(1.5)).is_err());
        assert!(Shape::Number.validate(&json!(1.5)).is_ok());
    }

    #[test]
    fn test_top_level() {
        assert_eq!(sample().top_level(), Some(TopLevel::Object));
        assert_eq!(Shape::array(Shape::Any).top_level(), Some(TopLevel::Array));
        assert_eq!(Shape::Any.top_level(), None);
    }
}
