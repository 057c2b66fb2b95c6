//! JSON Schema validation for definition and `json-schema` checks.
//!
//! The entity, function and agent definitions are static schema documents
//! under `schemas/`, compiled once. Schemas supplied by `json-schema` checks
//! are first reduced to the subset fixtures rely on (`type`, `items`,
//! `properties`, `required`), so unknown keywords never change a verdict
//! and objects always tolerate extra keys.

use std::fmt;
use std::sync::LazyLock;

use jsonschema::Validator;
use serde_json::{Map, Value};

static ENTITY: LazyLock<Validator> = LazyLock::new(|| {
    compile_static(include_str!("../../schemas/entity_v1.jsonschema"))
        .expect("static entity schema")
});

static FUNCTION: LazyLock<Validator> = LazyLock::new(|| {
    compile_static(include_str!("../../schemas/function_v1.jsonschema"))
        .expect("static function schema")
});

static AGENT: LazyLock<Validator> = LazyLock::new(|| {
    compile_static(include_str!("../../schemas/agent_v1.jsonschema"))
        .expect("static agent schema")
});

fn compile_static(raw: &str) -> Result<Validator, String> {
    let schema: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    compile(&schema)
}

fn compile(schema: &Value) -> Result<Validator, String> {
    jsonschema::draft202012::options()
        .build(schema)
        .map_err(|e| e.to_string())
}

/// Entity definition (`base44/entities/*.jsonc`).
pub fn entity() -> &'static Validator {
    &ENTITY
}

/// Backend function definition (`function.jsonc`).
pub fn function() -> &'static Validator {
    &FUNCTION
}

/// AI agent configuration (`base44/agents/*.jsonc`).
pub fn agent() -> &'static Validator {
    &AGENT
}

/// One validation failure, located by its key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: Vec<String>,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path.join("."), self.message)
        }
    }
}

/// Join issues into one detail string.
pub fn describe(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split a JSON pointer (`/rls/update`) into unescaped segments.
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Validate `value`, collecting every issue found.
pub fn validate(validator: &Validator, value: &Value) -> Result<(), Vec<Issue>> {
    let issues: Vec<Issue> = validator
        .iter_errors(value)
        .map(|error| Issue {
            path: pointer_segments(&error.instance_path.to_string()),
            message: error.to_string(),
        })
        .collect();
    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Reduce a user schema to the supported subset.
///
/// `integer` becomes `number`. A type outside the subset, or a schema that
/// is not an object, accepts any value. Required names without a matching
/// property are dropped.
pub fn reduce(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return Value::Object(Map::new());
    };
    let ty = match obj.get("type").and_then(Value::as_str) {
        Some("integer") => "number",
        Some(t @ ("string" | "number" | "boolean" | "array" | "object")) => t,
        _ => return Value::Object(Map::new()),
    };

    let mut out = Map::new();
    out.insert("type".to_string(), Value::from(ty));
    match ty {
        "array" => {
            if let Some(items) = obj.get("items") {
                out.insert("items".to_string(), reduce(items));
            }
        }
        "object" => {
            if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
                let required: Vec<Value> = obj
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter(|n| n.as_str().is_some_and(|n| properties.contains_key(n)))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                let reduced: Map<String, Value> = properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), reduce(prop)))
                    .collect();
                out.insert("properties".to_string(), Value::Object(reduced));
                if !required.is_empty() {
                    out.insert("required".to_string(), Value::Array(required));
                }
            }
        }
        _ => {}
    }
    Value::Object(out)
}

/// Compile the supported subset of a user schema.
pub fn subset_validator(schema: &Value) -> Result<Validator, String> {
    compile(&reduce(schema))
}
