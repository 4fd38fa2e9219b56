//! Tool definitions.
//!
//! The registry is fixed at compile time and only answers discovery
//! (`tools/list`). Execution lives in [`crate::rpc`], keyed by [`Tool`].

use indexmap::IndexMap;
use serde::Serialize;

use crate::bridge::Command;

/// The tools a caller can invoke through `call_tool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    TurnOn,
    TurnOff,
    GetStatus,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::TurnOn, Tool::TurnOff, Tool::GetStatus];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::GetStatus => "get_status",
        }
    }

    /// The command a mutating tool publishes; `None` for read-only tools.
    pub fn command(self) -> Option<Command> {
        match self {
            Self::TurnOn => Some(Command::On),
            Self::TurnOff => Some(Command::Off),
            Self::GetStatus => None,
        }
    }
}

/// One entry of the `tools/list` result.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

/// Restricted JSON-schema object: flat properties plus required names.
#[derive(Debug, Clone, Serialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: &'static str,
    pub properties: IndexMap<&'static str, PropertySchema>,
    pub required: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub property_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

/// Immutable list of tool descriptors, in declaration order.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// The built-in device tools.
    pub fn builtin() -> Self {
        let tools = Tool::ALL
            .into_iter()
            .map(|tool| {
                let (description, device_id_hint) = match tool {
                    Tool::TurnOn => ("Turn on a device", Some("device identifier (e.g. fan202)")),
                    Tool::TurnOff => ("Turn off a device", Some("device identifier")),
                    Tool::GetStatus => ("Get the last known status of a device", None),
                };
                ToolDescriptor {
                    name: tool.name(),
                    description,
                    input_schema: device_schema(device_id_hint),
                }
            })
            .collect();
        Self { tools }
    }

    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn device_schema(description: Option<&'static str>) -> InputSchema {
    let mut properties = IndexMap::new();
    properties.insert(
        "device_id",
        PropertySchema {
            property_type: "string",
            description,
        },
    );
    InputSchema {
        schema_type: "object",
        properties,
        required: vec!["device_id"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lists_three_tools_in_order() {
        let registry = ToolRegistry::builtin();
        let names: Vec<_> = registry.list().iter().map(|t| t.name).collect();
        assert_eq!(names, ["turn_on", "turn_off", "get_status"]);
    }

    #[test]
    fn every_tool_requires_device_id() {
        for tool in ToolRegistry::builtin().list() {
            assert_eq!(tool.input_schema.required, ["device_id"]);
            assert!(tool.input_schema.properties.contains_key("device_id"));
        }
    }

    #[test]
    fn descriptor_serializes_as_mcp_tool() {
        let registry = ToolRegistry::builtin();
        let value = serde_json::to_value(&registry.list()[2]).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "get_status",
                "description": "Get the last known status of a device",
                "inputSchema": {
                    "type": "object",
                    "properties": { "device_id": { "type": "string" } },
                    "required": ["device_id"]
                }
            })
        );
    }

    #[test]
    fn tool_names_resolve() {
        assert_eq!(Tool::from_name("turn_off"), Some(Tool::TurnOff));
        assert_eq!(Tool::from_name("frobnicate"), None);
        assert_eq!(Tool::TurnOn.command(), Some(Command::On));
        assert_eq!(Tool::GetStatus.command(), None);
    }
}
