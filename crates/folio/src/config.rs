use crate::prelude::*;
use folio_core::PaginationOptions;
use std::path::{Path, PathBuf};

/// How command results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Move a heading block to the next page with the text block after it.
    pub heading_keep_with_next: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    pub chars_per_em: Option<f64>,
    pub line_height: Option<f64>,
}

/// Contents of `folio.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_template: Option<PathBuf>,
    pub output: OutputFormat,
    pub pagination: PaginationConfig,
    pub estimation: EstimationConfig,
}

/// `<config dir>/folio/folio.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join("folio").join("folio.toml"))
}

impl Config {
    /// Load `explicit` if given, else the default location.
    ///
    /// A missing default file yields the built-in defaults. An explicit path
    /// that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("no folio.toml found, using defaults");
                    return Ok(Config::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| f!("Failed to read config file {}", path.display()))?;
        let config = Config::from_toml(&text).map_err(|reason| Error::Config {
            path: path.display().to_string(),
            reason,
        })?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, String> {
        let config: Config = toml::from_str(text).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        for (key, value) in [
            ("estimation.chars_per_em", self.estimation.chars_per_em),
            ("estimation.line_height", self.estimation.line_height),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(f!("{} must be positive, got {}", key, value));
                }
            }
        }
        Ok(())
    }

    /// Pagination options with file values layered over the defaults.
    pub fn pagination_options(&self) -> PaginationOptions {
        let defaults = PaginationOptions::default();
        PaginationOptions {
            heading_keep_with_next: self
                .pagination
                .heading_keep_with_next
                .unwrap_or(defaults.heading_keep_with_next),
            chars_per_em: self.estimation.chars_per_em.unwrap_or(defaults.chars_per_em),
            line_height: self.estimation.line_height.unwrap_or(defaults.line_height),
        }
    }

    /// True when `--json` was passed or the file asks for JSON output.
    pub fn wants_json(&self, flag: bool) -> bool {
        flag || self.output == OutputFormat::Json
    }
}
