//! Type-specific node configuration, decoded once per node.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{id_string, NodeKind};

/// Visible-key sentinel meaning "no filtering".
pub const ALL_INPUTS: &str = "all";

/// Output schema sentinel meaning "pass the value through unchanged".
pub const TEXT_SCHEMA: &str = "text";

/// Decoded `config` of a node, keyed by node type.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeConfig {
    Input,
    Agent(AgentConfig),
    Condition(ConditionConfig),
    Output(OutputConfig),
    /// Unrecognized node type; the walk logs it and moves on.
    Passthrough { kind: String },
}

impl NodeConfig {
    /// Decodes a raw `config` map for the given node type. A missing or `null` config is
    /// treated as an empty map so defaults apply.
    pub fn decode(kind: &NodeKind, raw: &Value) -> Result<Self, serde_json::Error> {
        let raw = if raw.is_null() {
            Value::Object(Default::default())
        } else {
            raw.clone()
        };
        Ok(match kind {
            NodeKind::Input => NodeConfig::Input,
            NodeKind::Agent => NodeConfig::Agent(serde_json::from_value(raw)?),
            NodeKind::Condition => NodeConfig::Condition(serde_json::from_value(raw)?),
            NodeKind::Output => NodeConfig::Output(serde_json::from_value(raw)?),
            NodeKind::Other(kind) => NodeConfig::Passthrough { kind: kind.clone() },
        })
    }
}

/// Config of an `agent` node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(deserialize_with = "id_string")]
    pub agent_id: String,
    /// Ask for approval before each tool call.
    #[serde(default)]
    pub tool_verifier: bool,
    /// Ask for approval of the plan before executing it.
    #[serde(default)]
    pub plan_verifier: bool,
    #[serde(default)]
    pub accessible_inputs: AccessibleInputs,
}

/// Keys of the run's input values an agent node may see.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessibleInputs {
    #[serde(default = "all_inputs")]
    pub input_keys: Vec<String>,
}

fn all_inputs() -> Vec<String> {
    vec![ALL_INPUTS.to_string()]
}

impl Default for AccessibleInputs {
    fn default() -> Self {
        Self {
            input_keys: all_inputs(),
        }
    }
}

impl AccessibleInputs {
    pub fn only(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            input_keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true when `key` is visible under this configuration.
    pub fn allows(&self, key: &str) -> bool {
        self.input_keys
            .iter()
            .any(|k| k == ALL_INPUTS || k == key)
    }
}

/// Config of a `condition` node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default)]
    pub condition: String,
}

/// Config of an `output` node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// `"text"` or a free-text / JSON schema description.
    #[serde(default = "text_schema", deserialize_with = "schema_text")]
    pub output_schema: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_schema: text_schema(),
        }
    }
}

impl OutputConfig {
    pub fn is_text(&self) -> bool {
        self.output_schema.trim() == TEXT_SCHEMA
    }
}

fn text_schema() -> String {
    TEXT_SCHEMA.to_string()
}

/// Schemas are usually strings; a JSON object is kept as its compact text.
fn schema_text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => s,
        Value::Null => text_schema(),
        other => other.to_string(),
    })
}
