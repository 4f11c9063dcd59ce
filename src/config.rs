//! Settings management
//!
//! Settings are read from `settings.toml` in the platform config directory.
//! Every field has a default, so a missing file or a partial one is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::api::auth::DEFAULT_TOKEN_KEYS;
use crate::models::criteria::Sort;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend root, e.g. `http://localhost:8080`. API paths are appended to it.
    pub api_base_url: String,

    /// Production builds never fall back to a pre-provisioned token.
    pub production: bool,

    /// Development token used when no stored token is found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Storage keys checked for a token, in order.
    pub token_keys: Vec<String>,

    /// Page size for list screens.
    pub page_size: u32,

    /// Quiet period before a search is sent.
    pub search_debounce_ms: u64,

    pub request_timeout_secs: u64,

    /// Initial sort for the category list, e.g. `name,asc`.
    pub category_sort: String,

    /// Initial sort for the expense list.
    pub expense_sort: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            production: !cfg!(debug_assertions),
            auth_token: None,
            token_keys: DEFAULT_TOKEN_KEYS.iter().map(|k| k.to_string()).collect(),
            page_size: 100,
            search_debounce_ms: 300,
            request_timeout_secs: 30,
            category_sort: "name,asc".to_string(),
            expense_sort: "date,desc".to_string(),
        }
    }
}

impl Settings {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "expense-tui")
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::project_dirs().map(|d| d.config_dir().join("settings.toml"))
    }

    /// Where the local token store and the log file live.
    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|d| d.data_dir().to_path_buf())
    }

    /// Load from `path`, or the default location. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::settings_path) {
            Some(path) => path,
            None => return Ok(Self::default()),
        };
        if !path.exists() {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.category_sort()?;
        self.expense_sort()?;
        if self.page_size == 0 {
            anyhow::bail!("page_size must be greater than zero");
        }
        Ok(())
    }

    pub fn category_sort(&self) -> Result<Sort> {
        self.category_sort.parse().map_err(anyhow::Error::msg)
    }

    pub fn expense_sort(&self) -> Result<Sort> {
        self.expense_sort.parse().map_err(anyhow::Error::msg)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
