//! Template lookup for `include`
//!
//! The default [`BlankFileSystem`] refuses every read. [`LocalFileSystem`]
//! maps a template name such as `dir/product` to `<root>/dir/_product.twig`
//! and rejects any name that could leave the root directory.

use crate::config::TemplatesConfig;
use crate::error::{Error, Result};
use crate::i18n::Locale;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

static TEMPLATE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A[^./][a-zA-Z0-9_/]+\z").expect("Invalid template name regex"));

pub const DEFAULT_PATTERN: &str = "_%s.twig";

pub trait FileSystem: Send + Sync {
    /// Source of the template called `name`
    fn read_template_file(&self, name: &str) -> Result<String>;
}

fn t(key: &str, vars: &[(&str, &str)]) -> String {
    Locale::shared().translate(key, vars)
}

/// Refuses all includes
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankFileSystem;

impl FileSystem for BlankFileSystem {
    fn read_template_file(&self, _name: &str) -> Result<String> {
        Err(Error::file_system(t("errors.file_system.blank", &[])))
    }
}

/// Reads partials from a directory
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    pattern: String,
}

impl LocalFileSystem {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            pattern: DEFAULT_PATTERN.to_string(),
        }
    }

    /// File name pattern; `%s` is replaced by the template's base name
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Build from the `[templates]` configuration section
    pub fn from_config(config: &TemplatesConfig) -> Option<Self> {
        config
            .root
            .as_ref()
            .map(|root| Self::new(root).with_pattern(config.pattern.clone()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a template name to its path, refusing names outside the root
    pub fn full_path(&self, name: &str) -> Result<PathBuf> {
        if !TEMPLATE_NAME.is_match(name) {
            return Err(Error::file_system(t(
                "errors.file_system.illegal_name",
                &[("name", name)],
            )));
        }

        let (dir, base) = match name.rfind('/') {
            Some(index) => (&name[..index], &name[index + 1..]),
            None => ("", name),
        };
        let file_name = self.pattern.replace("%s", base);
        let full_path = if dir.is_empty() {
            self.root.join(file_name)
        } else {
            self.root.join(dir).join(file_name)
        };

        let resolved = normalize(&full_path);
        if !resolved.starts_with(normalize(&self.root)) {
            return Err(Error::file_system(t(
                "errors.file_system.illegal_path",
                &[("path", &resolved.display().to_string())],
            )));
        }
        Ok(full_path)
    }
}

impl FileSystem for LocalFileSystem {
    fn read_template_file(&self, name: &str) -> Result<String> {
        let path = self.full_path(name)?;
        log::debug!("Reading template {}", path.display());
        std::fs::read_to_string(&path).map_err(|e| {
            log::debug!("Failed to read template {}: {}", path.display(), e);
            Error::file_system(t("errors.file_system.missing", &[("name", name)]))
        })
    }
}

/// Lexically resolve `.` and `..` without touching the disk
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Templates held in memory, keyed by name
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    templates: RwLock<HashMap<String, String>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), source.into());
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_template_file(&self, name: &str) -> Result<String> {
        self.templates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| Error::file_system(t("errors.file_system.missing", &[("name", name)])))
    }
}
