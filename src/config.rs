use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::layout::LayoutSettings;

/// What the assembler does with a request-reply component the repairer could not classify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Fail the whole document with `MALFORMED_COMPONENT_SHAPE`.
    #[default]
    Abort,
    /// Render a generic HTTP receiver and report an `HTTP_FALLBACK` diagnostic.
    HttpFallback,
}

/// Collaboration-level `IFlowConfiguration` properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborationSettings {
    pub namespace_mapping: String,
    pub allowed_header_list: String,
    pub http_session_handling: String,
    pub server_trace: bool,
    pub return_exception_to_sender: bool,
    pub log_level: String,
}

impl Default for CollaborationSettings {
    fn default() -> Self {
        CollaborationSettings {
            namespace_mapping: String::new(),
            allowed_header_list: "*".to_string(),
            http_session_handling: "None".to_string(),
            server_trace: false,
            return_exception_to_sender: false,
            log_level: "All events".to_string(),
        }
    }
}

/// Defaults for the inbound HTTPS channel when no sender component overrides them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderSettings {
    pub user_role: String,
    pub auth_type: String,
    pub maximum_body_size: u32,
}

impl Default for SenderSettings {
    fn default() -> Self {
        SenderSettings {
            user_role: "ESBMessaging.send".to_string(),
            auth_type: "RoleBased".to_string(),
            maximum_body_size: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionSettings {
    pub timeout: u32,
    pub handling: String,
}

impl Default for TransactionSettings {
    fn default() -> Self {
        TransactionSettings {
            timeout: 30,
            handling: "Not Required".to_string(),
        }
    }
}

/// Generator-wide settings. Every field has a default, so `{}` is a valid config file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub malformed_policy: MalformedPolicy,
    pub collaboration: CollaborationSettings,
    pub sender: SenderSettings,
    pub transaction: TransactionSettings,
    pub layout: LayoutSettings,
    pub bundle_version: BundleVersion,
}

/// `Bundle-Version` written to the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleVersion(pub String);

impl Default for BundleVersion {
    fn default() -> Self {
        BundleVersion("1.0.0".to_string())
    }
}

impl GeneratorConfig {
    /// Load a config from disk, accepting JSON by default and TOML when the `toml` feature is enabled.
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let txt = fs::read_to_string(path_ref).with_context(|| {
            format!("unable to read generator config at {}", path_ref.display())
        })?;
        Self::from_text(&txt).with_context(|| format!("invalid config {}", path_ref.display()))
    }

    pub fn from_text(txt: &str) -> anyhow::Result<Self> {
        let json_err = match serde_json::from_str::<Self>(txt) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        #[cfg(feature = "toml")]
        {
            if let Ok(value) = toml::from_str::<Self>(txt) {
                return Ok(value);
            }
            anyhow::bail!("unsupported config format: expected JSON or TOML ({json_err})");
        }

        #[cfg(not(feature = "toml"))]
        {
            anyhow::bail!(
                "unsupported config format: expected JSON (enable `toml` feature for TOML support): {json_err}"
            );
        }
    }
}
