use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SettingsError;

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";

/// Model provider and service endpoints.
///
/// Resolution order: built-in defaults, then `~/.audit-scanner/settings.json`,
/// then environment variables (a `.env` file is loaded by the binaries).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub provider: String,
    pub api_key: String,
    /// Model for stage 1 (scenario to graph)
    pub graph_model: String,
    /// Model for stage 3 (expert opinion)
    pub analysis_model: String,
    /// Remote backend the CLI tries before running locally
    pub backend_url: String,
    pub bind_address: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            api_key: String::new(),
            graph_model: DEFAULT_MODEL.to_string(),
            analysis_model: DEFAULT_MODEL.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

impl Settings {
    /// Effective settings for this process. A broken settings file is logged and skipped.
    pub fn load() -> Self {
        let path = settings_path();
        let base = if path.exists() {
            read_settings(&path).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring settings file");
                Self::default()
            })
        } else {
            Self::default()
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SCANNER_PROVIDER") {
            self.provider = v;
        }
        if let Some(v) = env_api_key(&lookup) {
            self.api_key = v;
        }
        if let Some(v) = get("OPENAI_MODEL_GRAPH") {
            self.graph_model = v;
        }
        if let Some(v) = get("OPENAI_MODEL_ANALYSIS") {
            self.analysis_model = v;
        }
        if let Some(v) = get("BACKEND_URL") {
            self.backend_url = v;
        }
        if let Some(v) = get("SCANNER_BIND") {
            self.bind_address = v;
        }
        self
    }

    /// Copy to persist to the settings file. An API key that came from the
    /// environment stays out of the file; the key already stored there is kept.
    pub fn for_file(&self, stored: &Settings, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = if env_api_key(&lookup).is_some() {
            stored.api_key.clone()
        } else {
            self.api_key.clone()
        };
        Self {
            api_key,
            ..self.clone()
        }
    }

    /// Whether a model call can be attempted. Ollama runs without a key.
    pub fn ai_configured(&self) -> bool {
        !self.provider.is_empty()
            && !self.graph_model.is_empty()
            && !self.analysis_model.is_empty()
            && (self.provider == "ollama" || !self.api_key.is_empty())
    }

    /// Copy safe to print: the API key is reduced to its last four characters.
    pub fn redacted(&self) -> Self {
        let tail: String = {
            let chars: Vec<char> = self.api_key.chars().collect();
            chars[chars.len().saturating_sub(4)..].iter().collect()
        };
        Self {
            api_key: if self.api_key.is_empty() {
                String::new()
            } else {
                format!("****{tail}")
            },
            ..self.clone()
        }
    }
}

fn env_api_key(lookup: &impl Fn(&str) -> Option<String>) -> Option<String> {
    ["SCANNER_API_KEY", "OPENAI_API_KEY"]
        .into_iter()
        .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
}

/// Resolve the config directory (~/.audit-scanner/).
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".audit-scanner")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SettingsError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let io_err = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(|source| SettingsError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(io_err)
}
