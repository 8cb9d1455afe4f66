//! User preferences persisted next to the documents.
//!
//! Each field lives under its own key so a corrupt value only resets that
//! field. The model identifier is opaque; only emptiness is checked.

use crate::repo::kv_repo::{KeyValueStore, RepoResult};
use log::warn;

pub const API_KEY_KEY: &str = "polza-api-key";
pub const MODEL_KEY: &str = "polza-model";
pub const DARK_MODE_KEY: &str = "polza-dark-mode";

pub const DEFAULT_MODEL: &str = "qwen/qwen3-30b-a3b-thinking-2507";

/// A model offered in pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
}

/// Known models. Informational: any non-empty identifier is accepted.
pub const MODEL_CATALOG: &[ModelInfo] = &[
    ModelInfo {
        id: DEFAULT_MODEL,
        name: "Qwen3 30B (Main)",
    },
    ModelInfo {
        id: "meta-llama/llama-4-scout",
        name: "Llama 4 Scout",
    },
    ModelInfo {
        id: "amazon/nova-lite-v1",
        name: "Nova Lite v1",
    },
    ModelInfo {
        id: "google/gemini-2.0-flash-lite-001",
        name: "Gemini 2.0 Flash Lite",
    },
    ModelInfo {
        id: "mistralai/devstral-2512",
        name: "Mistral Devstral",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub dark_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            dark_mode: false,
        }
    }
}

/// Which setting a `set` call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    ApiKey,
    Model,
    DarkMode,
}

impl SettingKey {
    /// Parses the user-facing names `api-key`, `model` and `dark-mode`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "api-key" | "api_key" => Some(Self::ApiKey),
            "model" => Some(Self::Model),
            "dark-mode" | "dark_mode" => Some(Self::DarkMode),
            _ => None,
        }
    }
}

impl Settings {
    /// Reads every field, falling back to defaults for missing or unreadable
    /// values.
    pub fn load<S: KeyValueStore>(storage: &S) -> Self {
        let defaults = Self::default();
        Self {
            api_key: read(storage, API_KEY_KEY).unwrap_or(defaults.api_key),
            model: read(storage, MODEL_KEY)
                .filter(|model| !model.trim().is_empty())
                .unwrap_or(defaults.model),
            dark_mode: read(storage, DARK_MODE_KEY).is_some_and(|flag| flag == "true"),
        }
    }

    /// Writes every field under its key.
    pub fn save<S: KeyValueStore>(&self, storage: &S) -> RepoResult<()> {
        storage.set(API_KEY_KEY, &self.api_key)?;
        storage.set(MODEL_KEY, &self.model)?;
        storage.set(DARK_MODE_KEY, if self.dark_mode { "true" } else { "false" })?;
        Ok(())
    }

    /// Applies a textual value to one field.
    ///
    /// Returns an error message for an empty model or a non-boolean
    /// dark-mode value.
    pub fn apply(&mut self, key: SettingKey, value: &str) -> Result<(), String> {
        match key {
            SettingKey::ApiKey => self.api_key = value.trim().to_string(),
            SettingKey::Model => {
                let model = value.trim();
                if model.is_empty() {
                    return Err("model identifier cannot be empty".to_string());
                }
                self.model = model.to_string();
            }
            SettingKey::DarkMode => {
                self.dark_mode = match value.trim() {
                    "true" | "on" | "1" => true,
                    "false" | "off" | "0" => false,
                    other => return Err(format!("expected true|false, got `{other}`")),
                };
            }
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

fn read<S: KeyValueStore>(storage: &S, key: &str) -> Option<String> {
    storage.get(key).unwrap_or_else(|err| {
        warn!("event=settings_read module=settings status=error key={key} error={err}");
        None
    })
}
