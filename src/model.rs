use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized integration description produced by the upstream analysis step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrationDoc {
    #[serde(alias = "api_name", alias = "name")]
    pub process_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Raw component objects; typed only after repair.
    #[serde(default)]
    pub components: Vec<Value>,
    #[serde(default)]
    pub sequence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handling: Option<ErrorHandling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branching: Option<Branching>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,
    /// Script sources for the endpoint's transformation steps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<Transformation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transformation {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

impl Transformation {
    /// File name under `script/` for a Groovy transformation; other languages yield `None`.
    pub fn script_file(&self) -> Option<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        let groovy = match self.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("groovy" | "groovy_script" | "script") => true,
            Some(_) => name.ends_with(".groovy"),
        };
        if !groovy {
            return None;
        }
        Some(if name.ends_with(".groovy") {
            name.to_string()
        } else {
            format!("{name}.groovy")
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorHandling {
    #[serde(default, alias = "handlers")]
    pub exception_subprocess: Vec<ErrorHandler>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorHandler {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Free-text description of what raises this handler.
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default, alias = "steps")]
    pub components: Vec<String>,
    #[serde(default)]
    pub end: HandlerEnd,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandlerEnd {
    #[default]
    Message,
    Error,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BranchingType {
    #[default]
    Exclusive,
    Parallel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Branching {
    #[serde(rename = "type", default)]
    pub branching_type: BranchingType,
    /// Optional component rendered as the gateway instead of a synthesized one.
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub target: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default, alias = "expression")]
    pub condition: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default: bool,
}

impl Branch {
    /// Target followed by its trailing steps.
    pub fn chain(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.target.as_str()).chain(self.steps.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    pub source: String,
    pub target: String,
}

/// Externalized parameter written to `parameters.prop`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: Option<String>,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Typed view of a repaired component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Component {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_adapter: Option<ReceiverAdapter>,
}

impl Component {
    pub fn config_str(&self, key: &str) -> Option<&str> {
        config_str(&self.config, key)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReceiverAdapter {
    #[serde(rename = "type", default)]
    pub adapter_type: String,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Non-empty string lookup, tolerating numbers and booleans written by upstream tools.
pub fn config_str<'a>(config: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    match config.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
        _ => None,
    }
}

/// Like [`config_str`] but renders scalars of any type.
pub fn config_scalar(config: &Map<String, Value>, key: &str) -> Option<String> {
    match config.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformation(name: &str, kind: Option<&str>) -> Transformation {
        Transformation {
            name: name.to_string(),
            kind: kind.map(str::to_string),
            script: Some("return message".to_string()),
        }
    }

    #[test]
    fn only_groovy_transformations_name_a_script() {
        assert_eq!(transformation("map", Some("groovy")).script_file().as_deref(), Some("map.groovy"));
        assert_eq!(transformation("map.groovy", None).script_file().as_deref(), Some("map.groovy"));
        assert_eq!(transformation("to_idoc", Some("xslt")).script_file(), None);
        assert_eq!(transformation("  ", None).script_file(), None);
    }
}
