//! Tool catalog exposed to the model.
//!
//! The catalog declares each callable capability with a name, description and
//! JSON schema, and turns the model's raw tool calls back into typed
//! `ToolInvocation`s. Arguments are validated against the declared schema
//! before they are decoded; anything that does not fit becomes a
//! `MalformedToolRequest` error that the orchestrator reports back to the
//! model.

use jsonschema::{JSONSchema, ValidationError};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core_types::ToolCall;
use crate::errors::AgentError;
use crate::llm::ToolMetadata;

pub const EXECUTE_PYTHON_CODE: &str = "execute_python_code";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecuteCodeArgs {
    pub code: String,
}

/// A tool call whose arguments matched the declared schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    ExecutePythonCode(ExecuteCodeArgs),
}

impl ToolInvocation {
    pub fn tool_name(&self) -> &'static str {
        match self {
            ToolInvocation::ExecutePythonCode(_) => EXECUTE_PYTHON_CODE,
        }
    }
}

#[derive(Debug)]
struct ToolDefinition {
    metadata: ToolMetadata,
    validator: JSONSchema,
}

#[derive(Debug)]
pub struct ToolCatalog {
    definitions: Vec<ToolDefinition>,
}

impl ToolCatalog {
    pub fn new(tools: Vec<ToolMetadata>) -> Result<Self, AgentError> {
        let mut definitions = Vec::with_capacity(tools.len());
        for metadata in tools {
            let validator = JSONSchema::compile(&metadata.input_schema).map_err(|e| {
                AgentError::ConfigError(format!(
                    "Invalid input schema for tool '{}': {}",
                    metadata.name, e
                ))
            })?;
            definitions.push(ToolDefinition {
                metadata,
                validator,
            });
        }
        Ok(Self { definitions })
    }

    /// The single "run Python in the sandbox" capability.
    pub fn code_interpreter() -> Result<Self, AgentError> {
        Self::new(vec![execute_python_code_metadata()])
    }

    pub fn metadata(&self) -> Vec<ToolMetadata> {
        self.definitions.iter().map(|d| d.metadata.clone()).collect()
    }

    pub fn parse(&self, call: &ToolCall) -> Result<ToolInvocation, AgentError> {
        let malformed = |message: String| AgentError::MalformedToolRequest {
            tool_name: call.name.clone(),
            message,
        };

        let definition = self
            .definitions
            .iter()
            .find(|d| d.metadata.name == call.name)
            .ok_or_else(|| malformed(format!("unknown tool '{}'", call.name)))?;

        let raw = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };
        let arguments: Value = serde_json::from_str(raw)
            .map_err(|e| malformed(format!("arguments are not valid JSON: {}", e)))?;

        if let Err(errors) = definition.validator.validate(&arguments) {
            let messages = format_validation_errors(errors);
            return Err(malformed(format!(
                "arguments do not match the schema: {}",
                messages.join("; ")
            )));
        }

        match definition.metadata.name.as_str() {
            EXECUTE_PYTHON_CODE => serde_json::from_value(arguments)
                .map(ToolInvocation::ExecutePythonCode)
                .map_err(|e| malformed(format!("could not decode arguments: {}", e))),
            other => Err(malformed(format!("no invocation type for tool '{}'", other))),
        }
    }
}

fn format_validation_errors<'a>(errors: impl Iterator<Item = ValidationError<'a>>) -> Vec<String> {
    errors
        .map(|error| {
            let path = if error.instance_path.to_string().is_empty() {
                "root".to_string()
            } else {
                error.instance_path.to_string()
            };
            format!("At '{}': {}", path, error)
        })
        .collect()
}

pub fn execute_python_code_metadata() -> ToolMetadata {
    ToolMetadata {
        name: EXECUTE_PYTHON_CODE.to_string(),
        description: "Runs Python code in a secure cloud sandbox. Use it for calculations, \
                      data analysis and charting. Major libraries such as pandas, numpy, \
                      matplotlib and scipy are available."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The Python code to execute"
                }
            },
            "required": ["code"]
        }),
    }
}
