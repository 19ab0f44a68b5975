//! Declarative response shapes.
//!
//! A [`Shape`] is sent alongside a prompt so the model emits output in a fixed,
//! machine-parseable structure. The same shape is then used to check the
//! payload that comes back before it is turned into a typed record.

use crate::error::{Result, TutorError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Primitive kinds understood by the model service's response schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShapeType {
    Object,
    Array,
    String,
}

/// A response shape contract.
///
/// Serializes directly into the `responseSchema` field of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shape {
    #[serde(rename = "type")]
    pub kind: ShapeType,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Shape>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Shape>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Shape {
    pub fn string() -> Self {
        Self::of(ShapeType::String)
    }

    pub fn array(items: Shape) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of(ShapeType::Array)
        }
    }

    pub fn object() -> Self {
        Self::of(ShapeType::Object)
    }

    /// Adds a mandatory property to an object shape.
    pub fn field(mut self, name: &str, shape: Shape) -> Self {
        self.properties.insert(name.to_string(), shape);
        self.required.push(name.to_string());
        self
    }

    fn of(kind: ShapeType) -> Self {
        Self {
            kind,
            properties: BTreeMap::new(),
            items: None,
            required: Vec::new(),
        }
    }

    /// Checks that `value` conforms to this shape.
    ///
    /// Extra properties the shape does not mention are tolerated; missing
    /// required properties, `null`s, and type mismatches are not.
    pub fn validate(&self, value: &Value) -> Result<()> {
        self.check(value, "$")
    }

    fn check(&self, value: &Value, path: &str) -> Result<()> {
        match self.kind {
            ShapeType::String => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(mismatch(path, "a string", value))
                }
            }
            ShapeType::Array => {
                let elements = value
                    .as_array()
                    .ok_or_else(|| mismatch(path, "an array", value))?;
                if let Some(items) = &self.items {
                    for (index, element) in elements.iter().enumerate() {
                        items.check(element, &format!("{path}[{index}]"))?;
                    }
                }
                Ok(())
            }
            ShapeType::Object => {
                let object = value
                    .as_object()
                    .ok_or_else(|| mismatch(path, "an object", value))?;
                for name in &self.required {
                    if !object.contains_key(name) {
                        return Err(TutorError::SchemaViolation(format!(
                            "{path}.{name} is missing"
                        )));
                    }
                }
                for (name, shape) in &self.properties {
                    if let Some(property) = object.get(name) {
                        shape.check(property, &format!("{path}.{name}"))?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn mismatch(path: &str, expected: &str, found: &Value) -> TutorError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    TutorError::SchemaViolation(format!("{path} should be {expected}, found {found}"))
}

/// Shape of a word lookup: `{word, definition, examples[], synonyms[]}`.
pub fn vocabulary_shape() -> Shape {
    Shape::object()
        .field("word", Shape::string())
        .field("definition", Shape::string())
        .field("examples", Shape::array(Shape::string()))
        .field("synonyms", Shape::array(Shape::string()))
}

/// Shape of a grammar check: `{originalText, correctedText, errors[{error, explanation}]}`.
pub fn grammar_shape() -> Shape {
    let error = Shape::object()
        .field("error", Shape::string())
        .field("explanation", Shape::string());
    Shape::object()
        .field("originalText", Shape::string())
        .field("correctedText", Shape::string())
        .field("errors", Shape::array(error))
}
