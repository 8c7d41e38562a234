use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::CvJointError;
use crate::repository::expand_home;

const BASE_SETTINGS: &str = include_str!("../config/settings.yaml");
const SETTINGS_FILE: &str = "settings.yaml";
const LOCAL_SETTINGS_FILE: &str = "settings.local.yaml";

/// Overrides the location of the per-user settings file.
pub const CONFIG_ENV: &str = "CVJOINT_CONFIG";

// --- Typed settings ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f32,
}

impl AgentSettings {
    fn validate(&self, name: &str) -> Result<(), CvJointError> {
        if self.model.trim().is_empty() {
            return Err(CvJointError::Validation(format!(
                "{}: model must not be empty",
                name
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(CvJointError::Validation(format!(
                "{}: temperature must be between 0.0 and 2.0, got {}",
                name, self.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewSettings {
    #[serde(default)]
    pub agents: BTreeMap<String, AgentSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemRepositorySettings {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    pub filesystem: FilesystemRepositorySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownWriterSettings {
    pub root_dir: String,
}

/// A retrieval server entry. Parsed so `--show-config` and validation see
/// it; nothing in this crate connects to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerSettings {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub chat: AgentSettings,
    pub repositories: RepositorySettings,
    pub markdown_writer: MarkdownWriterSettings,
    #[serde(default)]
    pub crews: BTreeMap<String, CrewSettings>,
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServerSettings>,
}

impl Settings {
    pub fn from_value(value: Value) -> Result<Self> {
        let settings: Settings =
            serde_yaml::from_value(value).context("Invalid settings structure")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CvJointError> {
        self.chat.validate("chat")?;
        for (crew_name, crew) in &self.crews {
            for (agent_name, agent) in &crew.agents {
                agent.validate(&format!("crews.{}.agents.{}", crew_name, agent_name))?;
            }
        }
        if self.repositories.filesystem.data_dir.trim().is_empty() {
            return Err(CvJointError::Validation(
                "repositories.filesystem.data_dir must not be empty".to_string(),
            ));
        }
        if self.markdown_writer.root_dir.trim().is_empty() {
            return Err(CvJointError::Validation(
                "markdown_writer.root_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn agent(&self, crew: &str, agent: &str) -> Result<&AgentSettings> {
        self.crews
            .get(crew)
            .and_then(|c| c.agents.get(agent))
            .ok_or_else(|| anyhow!("Agent '{}' not found in crews.{} settings", agent, crew))
    }
}

// --- Layered loading ---

/// Merges base -> user -> local YAML layers. Later layers win; mappings
/// merge key by key, anything else is replaced wholesale.
pub struct ConfigLoader {
    base: String,
    user_file: Option<PathBuf>,
    local_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Embedded base settings, the per-user file, and `./settings.local.yaml`.
    pub fn new() -> Self {
        let user_file = std::env::var_os(CONFIG_ENV).map(PathBuf::from).or_else(|| {
            directories::ProjectDirs::from("", "", "cvjoint")
                .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
        });
        Self {
            base: BASE_SETTINGS.to_string(),
            user_file,
            local_file: Some(PathBuf::from(LOCAL_SETTINGS_FILE)),
        }
    }

    #[cfg(test)]
    pub fn with_layers(
        base: impl Into<String>,
        user_file: Option<PathBuf>,
        local_file: Option<PathBuf>,
    ) -> Self {
        Self {
            base: base.into(),
            user_file,
            local_file,
        }
    }

    /// The merged tree with `~/` paths expanded.
    pub fn load(&self) -> Result<Value> {
        let mut config: Value =
            serde_yaml::from_str(&self.base).context("Failed to parse base settings")?;
        if config.is_null() {
            config = Value::Mapping(Default::default());
        }
        if !config.is_mapping() {
            return Err(anyhow!("Base settings must be a YAML mapping"));
        }

        for path in [&self.user_file, &self.local_file].into_iter().flatten() {
            if let Some(layer) = read_layer(path)? {
                debug!(path = %path.display(), "merging settings layer");
                deep_merge(&mut config, layer);
            }
        }

        Ok(expand_tildes(config))
    }

    pub fn load_settings(&self) -> Result<Settings> {
        Settings::from_value(self.load()?)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_layer(path: &Path) -> Result<Option<Value>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(value))
}

pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    if existing.is_mapping() && value.is_mapping() {
                        deep_merge(existing, value);
                        continue;
                    }
                }
                base_map.insert(key, value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Expands `~/...` string values anywhere in the tree. A bare `~` is left alone.
pub fn expand_tildes(value: Value) -> Value {
    match value {
        Value::String(s) if s.starts_with("~/") => {
            Value::String(expand_home(&s).to_string_lossy().into_owned())
        }
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(key, value)| (key, expand_tildes(value)))
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(expand_tildes).collect()),
        other => other,
    }
}

pub fn to_yaml(value: &Value) -> Result<String> {
    serde_yaml::to_string(value).context("Failed to serialize settings")
}
