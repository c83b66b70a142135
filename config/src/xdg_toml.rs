//! Load `$XDG_CONFIG_HOME/<app>/config.toml`: the `[env]` table and the `[engine]` table.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::LoadError;

fn config_home() -> Result<PathBuf, LoadError> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir().ok_or_else(|| LoadError::XdgPath("no config directory for this platform".into()))
}

/// Engine settings that may live in the config file instead of the environment.
#[derive(Debug, Default, Deserialize)]
pub struct EngineSection {
    pub model: Option<String>,
    pub max_steps: Option<u64>,
    pub event_buffer: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub engine: EngineSection,
}

impl ConfigFile {
    /// `[engine]` keys as the `TRELLIS_*` variables the engine reads.
    pub fn engine_env(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(ref model) = self.engine.model {
            out.push(("TRELLIS_MODEL".to_string(), model.clone()));
        }
        if let Some(steps) = self.engine.max_steps {
            out.push(("TRELLIS_MAX_STEPS".to_string(), steps.to_string()));
        }
        if let Some(buffer) = self.engine.event_buffer {
            out.push(("TRELLIS_EVENT_BUFFER".to_string(), buffer.to_string()));
        }
        out
    }
}

/// Missing file yields an empty config.
pub fn load(app_name: &str) -> Result<ConfigFile, LoadError> {
    let path = config_home()?.join(app_name).join("config.toml");
    if !path.is_file() {
        return Ok(ConfigFile::default());
    }
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    Ok(toml::from_str(&content)?)
}
