use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Result, ShelfError};
use crate::feed::ViewMode;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token_env: Option<String>,
    pub token_command: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pixelshelf.dev".to_string(),
            token_env: Some("PIXELSHELF_TOKEN".to_string()),
            token_command: None,
            timeout_secs: 15,
        }
    }
}

/// Feed behavior and its initial filters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub infinite_scroll: bool,
    pub items_per_row: usize,
    pub show_sidecards: bool,
    pub default_view_mode: ViewMode,
    pub active_tab: String,
    pub search_query: Option<String>,
    pub selected_tags: Vec<String>,
    pub selected_type: Option<String>,
    pub page_size: u32,
    /// Rows below the viewport at which the next page is requested
    pub prefetch_rows: usize,
    pub asset_types: Vec<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            infinite_scroll: true,
            items_per_row: 4,
            show_sidecards: false,
            default_view_mode: ViewMode::Grid,
            active_tab: "trending".to_string(),
            search_query: None,
            selected_tags: Vec::new(),
            selected_type: None,
            page_size: 20,
            prefetch_rows: 5,
            asset_types: ["2d", "3d", "audio", "code", "shader", "tileset"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub notification_secs: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            notification_secs: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

pub fn config_dir() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("pixelshelf"))
}

fn config_path() -> Option<PathBuf> {
    Some(config_dir()?.join("config.toml"))
}

impl Config {
    pub fn load() -> Self {
        let Some(path) = config_path().filter(|p| p.exists()) else {
            return Config::default();
        };

        match Self::read_file(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), "ignoring config: {}", e);
                Config::default()
            }
        }
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| ShelfError::Config(e.message().to_string()))?;
        if config.feed.page_size == 0 {
            return Err(ShelfError::Config("feed.page_size must be at least 1".to_string()));
        }
        Ok(config)
    }
}
