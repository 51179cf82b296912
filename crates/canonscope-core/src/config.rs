use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CanonError, Result};
use crate::years::YearWindow;

/// Catalog search URL with `{title}`, `{author}`, `{lang}` and `{start}` placeholders.
pub const DEFAULT_SEARCH_URL: &str = "https://www.worldcat.org/search?q=ti%3A{title}+au%3A{author}&fq=+%28x0%3Abook-+OR+%28x0%3Abook+x4%3Aprintbook%29+-%28%28x0%3Abook+x4%3Adigital%29%29+-%28%28x0%3Abook+x4%3Amic%29%29+-%28%28x0%3Abook+x4%3Abraille%29%29+-%28%28x0%3Abook+x4%3Alargeprint%29%29%29+%3E+ln%3A{lang}+%3E+ln%3A{lang}&dblist=638&start={start}&qt=page_number_link";

/// Collection language → (catalog language code, catalog hit language label).
const LOCALES: &[(&str, &str, &str)] = &[
    ("fra", "fre", "French"),
    ("eng", "eng", "English"),
    ("ita", "ita", "Italian"),
    ("deu", "ger", "German"),
    ("por", "por", "Portuguese"),
    ("spa", "spa", "Spanish"),
    ("srp", "srp", "Serbian"),
    ("gre", "gre", "Greek, Modern[1453-]"),
    ("hun", "hun", "Hungarian"),
    ("slv", "slv", "Slovenian"),
    ("rom", "rum", "Romanian"),
    ("nor", "nor", "Norwegian"),
    ("cze", "cze", "Czech"),
];

/// Root configuration, loaded from `~/.config/canonscope/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Collection language code, e.g. `fra`.
    pub lang: String,
    pub paths: PathsConfig,
    pub catalog: CatalogConfig,
    pub canon: CanonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Metadata table; `{lang}` is substituted, relative paths resolve against `output_dir`.
    pub metadata_table: String,
    /// Root of the page store; pages of one language live in `page_dir/{lang}`.
    pub page_dir: String,
    pub output_dir: String,
    /// Directory of TEI source documents for the metadata stage.
    pub tei_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub search_url: String,
    pub user_agent: String,
    pub min_interval_ms: u64,
    pub max_retries: u32,
    pub timeout_secs: u64,
    /// Hits per result page; continuation pages start at `1 + k * page_stride`.
    pub page_stride: u32,
    /// Works harvested at the same time.
    pub concurrency: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonConfig {
    pub first_year: i32,
    pub last_year: i32,
    /// A work is `high` when its target-era count is strictly above this.
    pub threshold: u32,
}

/// Catalog codes resolved for one collection language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub lang: String,
    /// Language code used inside catalog queries.
    pub catalog_lang: String,
    /// Language label the catalog prints on each hit.
    pub hit_label: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            lang: "fra".to_string(),
            paths: PathsConfig::default(),
            catalog: CatalogConfig::default(),
            canon: CanonConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            metadata_table: "{lang}_metadata.csv".to_string(),
            page_dir: "html".to_string(),
            output_dir: ".".to_string(),
            tei_dir: "ELTeC-{lang}/level1".to_string(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            user_agent: concat!("canonscope/", env!("CARGO_PKG_VERSION")).to_string(),
            min_interval_ms: 1000,
            max_retries: 3,
            timeout_secs: 30,
            page_stride: 10,
            concurrency: 1,
            catalog_lang: None,
            hit_label: None,
        }
    }
}

impl Default for CanonConfig {
    fn default() -> Self {
        let window = YearWindow::default();
        Self {
            first_year: window.first,
            last_year: window.last,
            threshold: 1,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/canonscope/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CANONSCOPE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("canonscope")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Resolve catalog codes for `lang`, honouring explicit overrides.
    pub fn locale(&self) -> Result<Locale> {
        let builtin = LOCALES.iter().find(|(code, _, _)| *code == self.lang);
        let catalog_lang = self
            .catalog
            .catalog_lang
            .clone()
            .or_else(|| builtin.map(|(_, c, _)| (*c).to_string()));
        let hit_label = self
            .catalog
            .hit_label
            .clone()
            .or_else(|| builtin.map(|(_, _, h)| (*h).to_string()));

        match (catalog_lang, hit_label) {
            (Some(catalog_lang), Some(hit_label)) => Ok(Locale {
                lang: self.lang.clone(),
                catalog_lang,
                hit_label,
            }),
            _ => Err(CanonError::UnknownLanguage(self.lang.clone())),
        }
    }

    /// Target era as a validated window.
    pub fn target_window(&self) -> Result<YearWindow> {
        YearWindow::new(self.canon.first_year, self.canon.last_year)
    }

    /// Check everything a pipeline run depends on.
    pub fn validate(&self) -> Result<()> {
        self.locale()?;
        self.target_window()?;
        if self.catalog.page_stride == 0 {
            return Err(CanonError::ConfigError(
                "catalog.page_stride must be positive".to_string(),
            ));
        }
        if self.catalog.concurrency == 0 {
            return Err(CanonError::ConfigError(
                "catalog.concurrency must be positive".to_string(),
            ));
        }
        if !self.catalog.search_url.contains("{start}") {
            return Err(CanonError::ConfigError(
                "catalog.search_url needs a {start} placeholder".to_string(),
            ));
        }
        Ok(())
    }

    // ─── Derived paths ─────────────────────────────────────

    fn expand(&self, template: &str) -> String {
        template.replace("{lang}", &self.lang)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(self.expand(&self.paths.output_dir))
    }

    fn in_output_dir(&self, template: &str) -> PathBuf {
        let path = PathBuf::from(self.expand(template));
        if path.is_absolute() {
            path
        } else {
            self.output_dir().join(path)
        }
    }

    /// Metadata table (tab-separated).
    pub fn metadata_path(&self) -> PathBuf {
        self.in_output_dir(&self.paths.metadata_table)
    }

    /// Directory holding the stored result pages of this language.
    pub fn pages_dir(&self) -> PathBuf {
        PathBuf::from(self.expand(&self.paths.page_dir)).join(&self.lang)
    }

    pub fn tei_dir(&self) -> PathBuf {
        PathBuf::from(self.expand(&self.paths.tei_dir))
    }

    /// Reprint-count matrix (comma-separated).
    pub fn counts_path(&self) -> PathBuf {
        self.output_dir()
            .join(format!("{}_reprint_counts.csv", self.lang))
    }

    /// Canonicity summary (tab-separated).
    pub fn summary_path(&self) -> PathBuf {
        self.output_dir().join(format!("{}_summary.csv", self.lang))
    }

    /// Diagnostics log.
    pub fn log_path(&self) -> PathBuf {
        self.output_dir().join(format!("{}_canonscope.log", self.lang))
    }
}
