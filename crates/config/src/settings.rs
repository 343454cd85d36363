// Loader settings
// Loaded from --config <path> or ~/.config/cdmload/cdmload.toml

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Read { path: PathBuf, message: String },
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, message } => write!(f, "cannot read {}: {message}", path.display()),
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Warehouse database written by the loader.
    pub warehouse: PathBuf,
    /// Reference database holding the FAS tables, footnotes and field lookup.
    pub reference: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            warehouse: PathBuf::from("cdm.db"),
            reference: PathBuf::from("reference.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    pub dir: PathBuf,
    pub theme: String,
    pub unit: String,
    pub table_info: String,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("config"),
            theme: "theme.csv".into(),
            unit: "unit.csv".into(),
            table_info: "table_info.csv".into(),
        }
    }
}

impl LookupSettings {
    pub fn theme_path(&self) -> PathBuf {
        self.dir.join(&self.theme)
    }

    pub fn unit_path(&self) -> PathBuf {
        self.dir.join(&self.unit)
    }

    pub fn table_info_path(&self) -> PathBuf {
        self.dir.join(&self.table_info)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// JSON export directory; no export when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub lookup: LookupSettings,
    pub output: OutputSettings,
}

impl Settings {
    /// Default settings file location.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cdmload")
            .join("cdmload.toml")
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load an explicit file, or the default location when `path` is `None`.
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let empty = |p: &Path| p.as_os_str().is_empty();
        if empty(&self.database.warehouse) {
            return Err(ConfigError::Invalid("database.warehouse must not be empty".into()));
        }
        if empty(&self.database.reference) {
            return Err(ConfigError::Invalid("database.reference must not be empty".into()));
        }
        if self.database.warehouse == self.database.reference {
            return Err(ConfigError::Invalid(
                "database.warehouse and database.reference must be different files".into(),
            ));
        }
        for (key, name) in [
            ("lookup.theme", &self.lookup.theme),
            ("lookup.unit", &self.lookup.unit),
            ("lookup.table_info", &self.lookup.table_info),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }
        if self.output.dir.as_deref().is_some_and(empty) {
            return Err(ConfigError::Invalid("output.dir must not be empty when set".into()));
        }
        Ok(())
    }
}
