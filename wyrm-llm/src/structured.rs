//! Schema-coerced structured output helpers.
//!
//! Tool-capable providers receive a synthetic `extract_<name>` tool whose
//! parameters are the requested schema and are required to call it; providers
//! without tool use take the schema via a system-message mandate plus a
//! JSON-mode flag. Either way the parsed value is deserialized into the
//! caller's type, which is where validation happens.

use schemars::JsonSchema;
use serde_json::Value;

use crate::error::LlmError;
use crate::types::ToolDefinition;

/// A named JSON Schema for structured output.
#[derive(Debug, Clone)]
pub struct SchemaSpec {
    /// Schema name (the target type's name).
    pub name: String,
    /// The JSON Schema object.
    pub schema: Value,
}

impl SchemaSpec {
    /// Build a spec from any [`JsonSchema`] type.
    ///
    /// Strips `$schema`/`title` and inlines `$defs` references so the result
    /// is suitable for tool/function parameter objects across providers.
    pub fn of<T: JsonSchema>() -> Self {
        let name = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or("Value")
            .to_string();
        let root = schemars::schema_for!(T);
        let schema = serde_json::to_value(&root).unwrap_or_else(|_| Value::Object(Default::default()));
        Self {
            name,
            schema: clean_schema(schema),
        }
    }

    /// Build a spec from a raw schema object.
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema: clean_schema(schema),
        }
    }
}

/// Strip metadata keys and inline `$defs` references.
fn clean_schema(mut schema: Value) -> Value {
    let defs = match &mut schema {
        Value::Object(map) => {
            map.remove("$schema");
            map.remove("title");
            map.remove("$defs")
        }
        _ => None,
    };
    match defs {
        Some(Value::Object(defs)) => inline_refs(schema, &defs),
        _ => schema,
    }
}

/// Recursively replace `$ref` pointers with their definitions.
fn inline_refs(node: Value, defs: &serde_json::Map<String, Value>) -> Value {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(path)) = map.get("$ref") {
                let name = path.rsplit('/').next().unwrap_or_default();
                if let Some(resolved) = defs.get(name) {
                    let mut resolved = resolved.clone();
                    if let Value::Object(obj) = &mut resolved {
                        obj.remove("title");
                    }
                    return inline_refs(resolved, defs);
                }
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, inline_refs(v, defs)))
                    .collect(),
            )
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| inline_refs(v, defs)).collect())
        }
        other => other,
    }
}

/// The synthetic tool a model must call to emit a structured value.
pub fn extraction_tool(spec: &SchemaSpec) -> ToolDefinition {
    ToolDefinition {
        name: format!("extract_{}", spec.name.to_lowercase()),
        description: format!(
            "Extract structured data matching the {} schema. \
             You MUST call this tool with the extracted information.",
            spec.name
        ),
        parameters: spec.schema.clone(),
    }
}

/// Parse response text as the structured value for `spec`.
pub fn parse_structured(content: &str, spec: &SchemaSpec) -> Result<Value, LlmError> {
    serde_json::from_str(content).map_err(|e| LlmError::StructuredParse {
        schema: spec.name.clone(),
        message: format!("response is not valid JSON: {e}"),
    })
}
