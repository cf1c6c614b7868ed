//! Configuration management for the compiler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (ocsf.toml)
//! - Environment variables (OCSF__*)
//!
//! ## Example config file (ocsf.toml):
//! ```toml
//! [repository]
//! path = "./ocsf-schema"
//!
//! [compile]
//! enabled_extensions = ["linux", "win"]
//! ignored_profiles = ["cloud"]
//! profile_order = ["host", "cloud"]
//! set_observable = true
//! prefix_extensions = true
//! set_object_types = true
//!
//! [output]
//! format = "pretty"
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Options threaded through every planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationOptions {
    /// Extensions to apply, by directory or declared name; `None` enables all
    #[serde(default)]
    pub enabled_extensions: Option<BTreeSet<String>>,

    /// Extensions removed from the enabled set
    #[serde(default)]
    pub ignored_extensions: BTreeSet<String>,

    /// Active profiles; `None` activates all
    #[serde(default)]
    pub enabled_profiles: Option<BTreeSet<String>>,

    /// Profiles removed from the active set
    #[serde(default)]
    pub ignored_profiles: BTreeSet<String>,

    /// Tie-break for profiles touching the same attribute; later entries win
    #[serde(default)]
    pub profile_order: Vec<String>,

    /// Tag attributes with observable type ids
    #[serde(default)]
    pub set_observable: bool,

    /// Namespace extension-origin names as `<extension>/<name>`
    #[serde(default = "default_true")]
    pub prefix_extensions: bool,

    /// Rewrite object-typed attributes to `object_t`
    #[serde(default = "default_true")]
    pub set_object_types: bool,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self {
            enabled_extensions: None,
            ignored_extensions: BTreeSet::new(),
            enabled_profiles: None,
            ignored_profiles: BTreeSet::new(),
            profile_order: Vec::new(),
            set_observable: false,
            prefix_extensions: true,
            set_object_types: true,
        }
    }
}

impl CompilationOptions {
    /// Whether an extension is applied, matched by directory or declared name
    pub fn is_extension_enabled(&self, directory: &str, declared: Option<&str>) -> bool {
        let names = [Some(directory), declared];
        let mut names = names.iter().flatten();
        if names.clone().any(|n| self.ignored_extensions.contains(*n)) {
            return false;
        }
        match &self.enabled_extensions {
            Some(enabled) => names.any(|n| enabled.contains(*n)),
            None => true,
        }
    }

    /// Whether a profile is in the active set
    pub fn is_profile_enabled(&self, profile: &str) -> bool {
        if self.ignored_profiles.contains(profile) {
            return false;
        }
        match &self.enabled_profiles {
            Some(enabled) => enabled.contains(profile),
            None => true,
        }
    }

    /// Position in `profile_order`, 1-based; 0 when unranked
    pub fn profile_rank(&self, profile: &str) -> usize {
        self.profile_order
            .iter()
            .position(|p| p == profile)
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

/// Main configuration for the compiler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub compile: CompilationOptions,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Source repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Path to the OCSF source tree
    #[serde(default = "default_repository_path")]
    pub path: PathBuf,
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

// Default value functions
fn default_repository_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: default_repository_path(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["ocsf.toml", ".ocsf.toml", "config/ocsf.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("org", "ocsf", "ocsf-compiler") {
            let xdg_config = dirs.config_dir().join("ocsf.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("OCSF")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Repository path, resolved against the working directory
    pub fn repository_path(&self) -> PathBuf {
        if self.repository.path.is_absolute() {
            self.repository.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.repository.path)
        }
    }
}
