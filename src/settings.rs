use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "khamsat.toml";
const ENV_PREFIX: &str = "KHAMSAT";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";

/// Immutable run configuration. Built once in `main` and passed by
/// reference to every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub site_root: String,
    pub user_agent: String,
    pub discover: DiscoverSettings,
    pub listings: StageSettings,
    pub details: StageSettings,
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverSettings {
    /// Candidate category files, first existing one wins.
    pub category_files: Vec<String>,
    pub pause_ms: u64,
}

/// Timing knobs for one browser-driven stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSettings {
    pub pause_ms: u64,
    pub settle_ms: u64,
    pub wait_ms: u64,
    pub max_load_more: usize,
    pub load_more_pause_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub request_timeout_ms: u64,
    /// Connect to an already running Chrome instead of launching one.
    pub remote_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_dir: PathBuf::from("categories"),
            site_root: "https://khamsat.com".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            discover: DiscoverSettings::default(),
            listings: StageSettings {
                pause_ms: 3000,
                settle_ms: 2000,
                wait_ms: 10_000,
                max_load_more: 50,
                load_more_pause_ms: 2000,
            },
            details: StageSettings {
                pause_ms: 2000,
                settle_ms: 2000,
                wait_ms: 15_000,
                max_load_more: 0,
                load_more_pause_ms: 0,
            },
            browser: BrowserSettings::default(),
        }
    }
}

impl Default for DiscoverSettings {
    fn default() -> Self {
        DiscoverSettings {
            category_files: vec![
                "categories_khamsat_xpath.csv".to_string(),
                "categories_khamsat.csv".to_string(),
            ],
            pause_ms: 2000,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        BrowserSettings {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            request_timeout_ms: 30_000,
            remote_url: None,
        }
    }
}

impl StageSettings {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn load_more_pause(&self) -> Duration {
        Duration::from_millis(self.load_more_pause_ms)
    }
}

impl Settings {
    /// Defaults, then the optional TOML file, then `KHAMSAT_*` env vars
    /// (nested keys separated by `__`, e.g. `KHAMSAT_LISTINGS__PAUSE_MS`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name(&file).required(path.is_some()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", file))?;

        settings
            .try_deserialize()
            .context("Invalid configuration values")
    }

    pub fn subcategories_dir(&self) -> PathBuf {
        self.base_dir.join("subcategories")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.base_dir.join("results")
    }

    pub fn progress_dir(&self) -> PathBuf {
        self.base_dir.join("progress")
    }

    pub fn details_dir(&self) -> PathBuf {
        self.base_dir.join("details")
    }

    pub fn progress_details_dir(&self) -> PathBuf {
        self.base_dir.join("progress_details")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// First configured category file that exists.
    pub fn category_file(&self) -> Option<PathBuf> {
        self.discover
            .category_files
            .iter()
            .map(|name| self.base_dir.join(name))
            .find(|p| p.exists())
    }
}
