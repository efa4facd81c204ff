//! Tool metadata, the companion tool trait, and the registry.
//!
//! Tools are named callable units the model can invoke.  Each either returns
//! user-facing text or queues a task on the companion's engine and returns a
//! result prefixed with [`ASYNC_TASK`](crate::blockmind::continuation::ASYNC_TASK)
//! so the agent loop stops chaining.  Tool `invoke` runs synchronously on the
//! server tick thread — the dispatcher's workers reach it through the server
//! bridge, never directly.
//!
//! Argument problems are never errors in the Rust sense: they come back as
//! `"Error: ..."` result strings the model can read and adapt to, with the
//! agent loop's dedup breaker guarding against retry storms.

use lazy_static::lazy_static;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::blockmind::companion::{Companion, OwnerId};
use crate::blockmind::config::Configuration;
use crate::blockmind::provider::ToolDefinition;
use crate::blockmind::recipes::RecipeIndex;
use crate::blockmind::task_engine::TaskEngine;
use crate::blockmind::world::WorldAdapter;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolParameterType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ToolParameterType {
    fn json_name(self) -> &'static str {
        match self {
            ToolParameterType::String => "string",
            ToolParameterType::Integer => "integer",
            ToolParameterType::Number => "number",
            ToolParameterType::Boolean => "boolean",
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ToolParameterType,
    pub description: Option<String>,
    pub required: bool,
    /// Closed set of accepted values, for enum-like string parameters.
    pub enum_values: Vec<String>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: ToolParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
            enum_values: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = values.iter().map(|v| v.to_string()).collect();
        self
    }
}

/// Tool identity, description, and parameter spec disclosed to the model.
#[derive(Debug, Clone)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Render as the provider-facing [`ToolDefinition`] (JSON Schema object).
    pub fn to_tool_definition(&self) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), json!(param.param_type.json_name()));
            if let Some(desc) = &param.description {
                prop.insert("description".into(), json!(desc));
            }
            if !param.enum_values.is_empty() {
                prop.insert("enum".into(), json!(param.enum_values));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(param.name.clone());
            }
        }
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

/// Everything a tool may touch during one invocation, all owned by the tick
/// thread.
pub struct ToolInvocation<'a> {
    pub owner: OwnerId,
    pub world: &'a mut dyn WorldAdapter,
    pub companion: &'a mut Companion,
    pub engine: &'a mut TaskEngine,
    pub recipes: &'a RecipeIndex,
    pub config: &'a Configuration,
    pub now_tick: u64,
    /// True when the deterministic continuation executor is the caller; the
    /// crafting reentrancy guard steps aside for it.
    pub via_continuation: bool,
}

/// A named callable unit the model can invoke.
pub trait CompanionTool: Send + Sync {
    fn metadata(&self) -> ToolMetadata;

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String;
}

lazy_static! {
    /// Administrative game commands no tool may ever run, regardless of
    /// configuration.
    static ref PERMANENTLY_BLOCKED_COMMANDS: HashSet<&'static str> = [
        "stop",
        "op",
        "deop",
        "ban",
        "ban-ip",
        "pardon",
        "pardon-ip",
        "whitelist",
        "kick",
        "save-off",
        "reload",
        "debug",
    ]
    .into_iter()
    .collect();
}

/// Whether a game command is blocked for tools, either permanently or by the
/// operator's `[security]` section.
pub fn is_command_blocked(command: &str, config: &Configuration) -> bool {
    let normalized = command.trim().trim_start_matches('/').to_ascii_lowercase();
    let head = normalized.split_whitespace().next().unwrap_or("");
    PERMANENTLY_BLOCKED_COMMANDS.contains(head)
        || config.blocked_commands().iter().any(|c| c.as_str() == head)
}

/// Name -> tool map with provider schema export.
///
/// The registry is read-mostly: built once at startup and shared as an
/// immutable snapshot (`Arc`) between the tick thread and the dispatcher.
/// Hot reload replaces the whole snapshot.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn CompanionTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn CompanionTool>) {
        let name = tool.metadata().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            log::warn!("tool '{}' registered twice; keeping the newer one", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Provider-facing definitions for every enabled tool.
    pub fn definitions(&self, config: &Configuration) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| t.metadata())
            .filter(|m| config.tool_enabled(&m.name))
            .map(|m| m.to_tool_definition())
            .collect()
    }

    /// Execute a tool by name.  Unknown or disabled tools come back as
    /// `"Error: ..."` result strings, never as panics or typed errors.
    pub fn invoke(&self, name: &str, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        if !inv.config.tool_enabled(name) {
            return format!("Error: tool '{}' is disabled by configuration.", name);
        }
        let Some(tool) = self.tools.get(name) else {
            return format!("Error: unknown tool '{}'.", name);
        };
        log::debug!("invoking tool '{}' with args {}", name, args);
        tool.invoke(args, inv)
    }
}

// ---- argument helpers shared by tool implementations ----

/// Fetch a required string argument.
pub fn arg_str<'v>(args: &'v Value, key: &str) -> Result<&'v str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing required string argument '{}'", key))
}

/// Fetch an optional string argument.
pub fn opt_arg_str<'v>(args: &'v Value, key: &str) -> Option<&'v str> {
    args.get(key).and_then(Value::as_str)
}

/// Fetch an optional positive integer argument with a default.
pub fn arg_count(args: &Value, key: &str, default: u32) -> Result<u32, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| n.min(u32::MAX as u64) as u32)
            .ok_or_else(|| format!("argument '{}' must be a positive integer", key)),
    }
}

/// Fetch an optional integer argument (any sign) with a default.
pub fn arg_i32(args: &Value, key: &str, default: i32) -> Result<i32, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_i64()
            .map(|n| n.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
            .ok_or_else(|| format!("argument '{}' must be an integer", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_export_includes_required_and_enums() {
        let meta = ToolMetadata::new("transfer_items", "Move items around.")
            .with_parameter(
                ToolParameter::new("direction", ToolParameterType::String)
                    .with_enum(&["deposit", "withdraw"])
                    .required(),
            )
            .with_parameter(ToolParameter::new("count", ToolParameterType::Integer));
        let def = meta.to_tool_definition();
        assert_eq!(def.name, "transfer_items");
        assert_eq!(def.parameters_schema["required"][0], "direction");
        assert_eq!(
            def.parameters_schema["properties"]["direction"]["enum"][1],
            "withdraw"
        );
        assert_eq!(
            def.parameters_schema["properties"]["count"]["type"],
            "integer"
        );
    }

    #[test]
    fn blocked_commands_cover_permanent_and_configured() {
        let config = Configuration::default();
        assert!(is_command_blocked("stop", &config));
        assert!(is_command_blocked("/op Steve", &config));
        assert!(is_command_blocked("BAN-IP 1.2.3.4", &config));
        assert!(!is_command_blocked("say hi", &config));

        let mut config = Configuration::default();
        config.security.blocked_commands = "gamemode".to_string();
        assert!(is_command_blocked("gamemode creative", &config));
    }

    #[test]
    fn arg_helpers_report_problems_as_strings() {
        let args = json!({"item": "stick", "count": 3});
        assert_eq!(arg_str(&args, "item").unwrap(), "stick");
        assert!(arg_str(&args, "missing").is_err());
        assert_eq!(arg_count(&args, "count", 1).unwrap(), 3);
        assert_eq!(arg_count(&args, "absent", 7).unwrap(), 7);
        assert!(arg_count(&json!({"count": -2}), "count", 1).is_err());
    }
}
