//! Engine configuration and process-wide defaults
//!
//! Templates pick up the installed defaults when they are parsed and can be
//! reconfigured individually afterwards.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::RwLock;

#[cfg(feature = "config")]
use std::{fs, path::Path};

/// How diagnosable problems in markup are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ErrorMode {
    /// Recover silently, rendering errors inline
    #[default]
    Lax,
    /// Try the strict grammar, record a warning and recover on failure
    Warn,
    /// Raise on the first problem
    Strict,
}

impl ErrorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorMode::Lax => "lax",
            ErrorMode::Warn => "warn",
            ErrorMode::Strict => "strict",
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, ErrorMode::Strict)
    }
}

impl FromStr for ErrorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lax" => Ok(ErrorMode::Lax),
            "warn" => Ok(ErrorMode::Warn),
            "strict" => Ok(ErrorMode::Strict),
            other => Err(Error::config(format!(
                "Unknown error mode '{}', expected lax, warn or strict",
                other
            ))),
        }
    }
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when a tainted value is written without escaping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum TaintMode {
    #[default]
    Off,
    Warn,
    Error,
}

impl TaintMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaintMode::Off => "off",
            TaintMode::Warn => "warn",
            TaintMode::Error => "error",
        }
    }
}

impl FromStr for TaintMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "off" | "lax" => Ok(TaintMode::Off),
            "warn" => Ok(TaintMode::Warn),
            "error" => Ok(TaintMode::Error),
            other => Err(Error::config(format!(
                "Unknown taint mode '{}', expected off, warn or error",
                other
            ))),
        }
    }
}

impl fmt::Display for TaintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ceilings for the per-render resource counters; `None` means unbounded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default)]
    pub render_length: Option<usize>,

    #[serde(default)]
    pub render_score: Option<usize>,

    #[serde(default)]
    pub assign_score: Option<usize>,

    /// Maximum scope and include nesting
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            render_length: None,
            render_score: None,
            assign_score: None,
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    100
}

/// Where the local file system looks for partials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,

    #[serde(default = "default_pattern")]
    pub pattern: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            root: None,
            pattern: default_pattern(),
        }
    }
}

fn default_pattern() -> String {
    "_%s.twig".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub error_mode: ErrorMode,

    #[serde(default)]
    pub taint_mode: TaintMode,

    #[serde(default)]
    pub line_numbers: bool,

    #[serde(default)]
    pub limits: ResourceLimits,

    #[serde(default)]
    pub templates: TemplatesConfig,
}

static DEFAULTS: Lazy<RwLock<EngineConfig>> = Lazy::new(|| RwLock::new(EngineConfig::default()));

impl EngineConfig {
    /// Load configuration from a TOML file
    #[cfg(feature = "config")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let content = fs::read_to_string(path_ref).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path_ref.display(),
                e
            ))
        })?;

        let mut config = Self::from_toml_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse config file '{}': {}",
                path_ref.display(),
                e.message()
            ))
        })?;

        // Relative template roots are resolved against the config file
        if let (Some(root), Some(parent)) = (&config.templates.root, path_ref.parent()) {
            if root.is_relative() {
                config.templates.root = Some(parent.join(root));
            }
        }

        log::debug!("Loaded engine configuration from: {}", path_ref.display());
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Make this configuration the process-wide default
    pub fn install(&self) {
        log::debug!(
            "Installing engine defaults: error_mode={}, taint_mode={}",
            self.error_mode,
            self.taint_mode
        );
        let mut defaults = DEFAULTS.write().unwrap_or_else(|e| e.into_inner());
        *defaults = self.clone();
    }

    /// Snapshot of the process-wide defaults
    pub fn current() -> Self {
        DEFAULTS
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

pub fn default_error_mode() -> ErrorMode {
    DEFAULTS.read().unwrap_or_else(|e| e.into_inner()).error_mode
}

pub fn set_default_error_mode(mode: ErrorMode) {
    DEFAULTS.write().unwrap_or_else(|e| e.into_inner()).error_mode = mode;
}

pub fn default_taint_mode() -> TaintMode {
    DEFAULTS.read().unwrap_or_else(|e| e.into_inner()).taint_mode
}

pub fn set_default_taint_mode(mode: TaintMode) {
    DEFAULTS.write().unwrap_or_else(|e| e.into_inner()).taint_mode = mode;
}
