//! Configuration file support for natpack.
//!
//! This module provides support for `natpack.toml` configuration files that
//! persist project settings so the same flags need not be passed on every
//! build.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. The path given with `--config`
//! 2. Current working directory (`./natpack.toml`)
//! 3. Parent directories (up to the repository root or filesystem root)
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! library_name = "Managed"
//! output_dir = "out"
//!
//! [build]
//! platform = "ios"
//! target = "framework"
//! debug = false
//! parallel = true
//!
//! [toolchain]
//! xcode_app = "/Applications/Xcode.app"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "natpack.toml";

/// Root configuration structure for `natpack.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NatpackConfig {
    /// Naming and output location.
    pub project: ProjectConfig,

    /// Build defaults.
    pub build: BuildSection,

    /// Xcode location.
    pub toolchain: ToolchainConfig,
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Name every output is derived from.
    ///
    /// Defaults to the file stem of the first managed assembly.
    pub library_name: Option<String>,

    /// Directory holding the generated sources and receiving the outputs.
    ///
    /// Relative paths are resolved against the directory containing the
    /// config file.
    pub output_dir: Option<PathBuf>,
}

/// Build defaults, each overridable from the command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    /// `macos`, `ios`, `tvos` or `watchos`.
    pub platform: Option<String>,

    /// `shared`, `static` or `framework`.
    pub target: Option<String>,

    /// Build with debug info and extract dSYMs.
    pub debug: bool,

    /// Compile and link the architectures of an SDK concurrently.
    pub parallel: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Path to `Xcode.app`. Takes precedence over `xcode-select`.
    pub xcode_app: Option<PathBuf>,
}

impl NatpackConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: NatpackConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration starting from the current directory.
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&cwd)
    }

    /// Attempts to find and load configuration starting from `start_dir`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Generates a starter configuration file with every option commented.
    pub fn generate_starter_toml(library_name: &str) -> String {
        format!(
            r#"# natpack configuration file
# CLI flags override these settings when provided.

[project]
# Name of the produced library and framework
# (default: file stem of the first managed assembly)
library_name = "{library_name}"

# Directory holding the generated glue sources; outputs are written here too
output_dir = "out"

[build]
# Target platform: macos, ios, tvos, watchos
platform = "ios"

# What to produce: shared, static, framework
target = "framework"

# Build with -g -O0 and extract .dSYM bundles for shared libraries
debug = false

# Compile and link the architectures of one SDK concurrently
parallel = false

[toolchain]
# Xcode installation to use (default: NATPACK_XCODE_APP, then xcode-select -p)
# xcode_app = "/Applications/Xcode.app"
"#,
            library_name = library_name,
        )
    }
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<NatpackConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Loads `explicit` if given, otherwise discovers `natpack.toml`.
    pub fn new(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let config = NatpackConfig::load_from_file(path)?;
            return Ok(Self {
                config: Some(config),
                config_path: Some(path.to_path_buf()),
            });
        }
        match NatpackConfig::discover()? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Returns the library name from config.
    pub fn library_name(&self) -> Option<&str> {
        self.config
            .as_ref()
            .and_then(|c| c.project.library_name.as_deref())
    }

    /// Returns the output directory from config, relative to the config file.
    pub fn output_dir(&self) -> Option<PathBuf> {
        let dir = self.config.as_ref()?.project.output_dir.as_ref()?;
        let base = self.config_path.as_deref().and_then(Path::parent);
        Some(match base {
            Some(base) if dir.is_relative() => base.join(dir),
            _ => dir.clone(),
        })
    }

    /// Returns the Xcode application path from config.
    pub fn xcode_app(&self) -> Option<&Path> {
        self.config
            .as_ref()
            .and_then(|c| c.toolchain.xcode_app.as_deref())
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Returns
    ///
    /// The resolved value, preferring CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&NatpackConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }

    /// Resolves a boolean flag: set on the command line, or `true` in config.
    pub fn flag<F>(&self, cli_flag: bool, config_getter: F) -> bool
    where
        F: FnOnce(&NatpackConfig) -> bool,
    {
        cli_flag || self.config.as_ref().is_some_and(config_getter)
    }
}
