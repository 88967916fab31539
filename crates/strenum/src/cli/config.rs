//! Configuration for the strenum CLI
//!
//! Settings come from `strenum.toml` (via `--config`, `STRENUM_CONFIG`, or the
//! working directory). Command-line flags and environment variables win over
//! the file.

use crate::cli::error::HelpfulError;
use crate::cli::output::{print_json, print_table};
use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "strenum.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrenumConfig {
    pub database: DatabaseConfig,
    pub migrate: MigrateConfig,
    pub locales: LocaleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrateConfig {
    /// Schema for unqualified names when a script does not set one
    pub default_schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocaleConfig {
    pub locale: String,
    /// Locale files, resolved relative to the config file
    pub paths: Vec<PathBuf>,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub filter: Option<String>,
}

/// Configuration plus the file it came from.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: StrenumConfig,
    pub source: Option<PathBuf>,
}

impl LoadedConfig {
    /// Database URL from the flag/env value, else the file.
    pub fn database_url(&self, flag: Option<&str>) -> Result<String> {
        flag.filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.config.database.url.clone())
            .ok_or_else(|| HelpfulError::no_database_url().into())
    }

    pub fn default_schema(&self) -> Option<&str> {
        self.config.migrate.default_schema.as_deref()
    }

    /// Locale paths from the file, relative to its directory.
    pub fn locale_paths(&self) -> Vec<PathBuf> {
        let base = self
            .source
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.config
            .locales
            .paths
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
            .collect()
    }
}

/// Parse a config document.
pub fn parse_config(text: &str) -> Result<StrenumConfig, toml::de::Error> {
    toml::from_str(text)
}

/// Load the explicit config file, or `./strenum.toml` when present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) if !path.exists() => return Err(HelpfulError::file_not_found(path).into()),
        Some(path) => path.to_path_buf(),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if !local.exists() {
                return Ok(LoadedConfig::default());
            }
            local
        }
    };

    let text = std::fs::read_to_string(&path)
        .map_err(|e| HelpfulError::cannot_read_file(&path, e.to_string()))?;
    let config = parse_config(&text).map_err(|e| {
        HelpfulError::cannot_read_file(&path, e.to_string())
            .with_suggestion("TRY: Valid sections are [database], [migrate], [locales], [logging]")
    })?;

    Ok(LoadedConfig {
        config,
        source: Some(path),
    })
}

/// Hide the password part of a connection URL.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some(at) = rest.rfind('@') else {
        return url.to_string();
    };
    let (userinfo, host) = rest.split_at(at);
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{}://{}:***{}", scheme, user, host),
        None => url.to_string(),
    }
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ConfigView {
    config_file: Option<String>,
    home: String,
    logs_dir: String,
    database_url: Option<String>,
    default_schema: Option<String>,
    locale: String,
    locale_paths: Vec<String>,
    log_filter: String,
}

/// `strenum config`: show the effective configuration.
pub fn run(args: ConfigArgs, loaded: &LoadedConfig, database_url: Option<&str>) -> Result<()> {
    let view = ConfigView {
        config_file: loaded.source.as_ref().map(|p| p.display().to_string()),
        home: strenum_logging::strenum_home().display().to_string(),
        logs_dir: strenum_logging::logs_dir().display().to_string(),
        database_url: loaded.database_url(database_url).ok().map(|u| redact_url(&u)),
        default_schema: loaded.default_schema().map(str::to_string),
        locale: loaded.config.locales.locale.clone(),
        locale_paths: loaded
            .locale_paths()
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        log_filter: strenum_logging::resolve_filter(
            std::env::var("RUST_LOG").ok().as_deref(),
            loaded.config.logging.filter.as_deref(),
        ),
    };

    if args.json {
        return print_json(&view);
    }

    let rows = vec![
        vec!["Config file".to_string(), view.config_file.unwrap_or_else(|| "(none)".into())],
        vec!["Home".to_string(), view.home],
        vec!["Logs".to_string(), view.logs_dir],
        vec!["Database".to_string(), view.database_url.unwrap_or_else(|| "(not set)".into())],
        vec![
            "Default schema".to_string(),
            view.default_schema.unwrap_or_else(|| "public".into()),
        ],
        vec!["Locale".to_string(), view.locale],
        vec!["Locale files".to_string(), view.locale_paths.join(", ")],
        vec!["Log filter".to_string(), view.log_filter],
    ];
    print_table(&["Setting", "Value"], rows);
    Ok(())
}
