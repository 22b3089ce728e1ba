//! Core types for natpack-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`PackError`] - Error types for every pipeline stage
//! - [`Platform`] - Target operating system
//! - [`CompilationTarget`] - Shared library, static library, or framework
//! - [`BuildConfig`] / [`BuildProfile`] - Immutable build configuration
//! - [`LibraryName`] - Name every output file and bundle is derived from
//! - [`BuildArtifact`] / [`BuildResult`] - Output from build operations

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Process exit code for I/O, spawn, and signal failures.
pub const EXIT_FAILURE: i32 = 1;
/// Process exit code for configuration errors.
pub const EXIT_CONFIG: i32 = 2;
/// Process exit code for internal errors (defects).
pub const EXIT_INTERNAL: i32 = 99;
/// Process exit code for recognized but unimplemented feature combinations.
pub const EXIT_UNSUPPORTED: i32 = 100;

/// Error types for natpack-sdk operations.
///
/// Each variant maps to a distinct process exit code through
/// [`PackError::exit_code`], so callers can tell a failing external tool
/// apart from an unsupported feature or an internal defect.
///
/// # Example
///
/// ```
/// use natpack_sdk::{BuildConfig, CompilationTarget, PackError, Platform};
///
/// let config = BuildConfig::new(Platform::MacOs, CompilationTarget::Framework, "out", "Sample");
/// match config.validate() {
///     Err(PackError::Unsupported(feature)) => assert_eq!(feature, "frameworks for macOS"),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// Invalid or incomplete configuration, detected before any tool runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// A recognized option combination that the tool does not implement yet.
    #[error("The feature `{0}` is not currently supported by the tool")]
    Unsupported(String),

    /// An external tool exited with a non-zero status.
    ///
    /// The exit code is surfaced unchanged as the process exit code.
    #[error("{tool} failed with exit code {code}{}", format_output(.stdout, .stderr))]
    ToolFailed {
        tool: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// An external tool was terminated by a signal.
    #[error("{tool} was terminated by a signal")]
    ToolTerminated { tool: String },

    /// An external tool could not be started.
    #[error("failed to start {tool}: {source}. Ensure the tool is installed and available on PATH")]
    ToolSpawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// A filesystem operation failed.
    #[error("failed to {action}: {source}")]
    Io {
        action: String,
        #[source]
        source: io::Error,
    },

    /// The build report could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An unreachable state was reached.
    #[error(
        "Internal error: {0}. Please file a bug report with a test case at https://github.com/natpack/natpack/issues"
    )]
    Internal(String),
}

fn format_output(stdout: &str, stderr: &str) -> String {
    let mut rendered = String::new();
    for (label, text) in [("Stdout", stdout.trim()), ("Stderr", stderr.trim())] {
        if !text.is_empty() {
            rendered.push_str(&format!("\n\n{}:\n{}", label, text));
        }
    }
    rendered
}

impl PackError {
    /// Returns the process exit code for this error.
    ///
    /// Tool failures return the tool's own exit code verbatim.
    pub fn exit_code(&self) -> i32 {
        match self {
            PackError::ToolFailed { code, .. } => *code,
            PackError::Config(_) => EXIT_CONFIG,
            PackError::Unsupported(_) => EXIT_UNSUPPORTED,
            PackError::Internal(_) => EXIT_INTERNAL,
            PackError::ToolTerminated { .. }
            | PackError::ToolSpawn { .. }
            | PackError::Io { .. }
            | PackError::Serialization(_) => EXIT_FAILURE,
        }
    }

    /// Builds a closure that wraps an [`io::Error`] with a description of
    /// the failed action, for use with `map_err`.
    pub(crate) fn io(action: impl Into<String>) -> impl FnOnce(io::Error) -> PackError {
        let action = action.into();
        move |source| PackError::Io { action, source }
    }
}

/// Target operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    MacOs,
    Ios,
    TvOs,
    WatchOs,
}

impl Platform {
    /// All supported platforms, in display order.
    pub const ALL: [Platform; 4] = [
        Platform::MacOs,
        Platform::Ios,
        Platform::TvOs,
        Platform::WatchOs,
    ];

    /// Returns the canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MacOs => "macos",
            Platform::Ios => "ios",
            Platform::TvOs => "tvos",
            Platform::WatchOs => "watchos",
        }
    }

    /// Returns `true` for iOS, tvOS and watchOS.
    pub fn is_mobile(&self) -> bool {
        !matches!(self, Platform::MacOs)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::MacOs => "macOS",
            Platform::Ios => "iOS",
            Platform::TvOs => "tvOS",
            Platform::WatchOs => "watchOS",
        })
    }
}

impl FromStr for Platform {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "osx" | "macosx" | "macos" | "mac" => Ok(Platform::MacOs),
            "ios" => Ok(Platform::Ios),
            "tvos" => Ok(Platform::TvOs),
            "watchos" => Ok(Platform::WatchOs),
            _ => Err(PackError::Config(format!(
                "The platform `{}` is not valid. Expected one of: {}",
                s,
                Platform::ALL.map(|p| p.as_str()).join(", ")
            ))),
        }
    }
}

/// What kind of artifact the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilationTarget {
    /// A dynamic library (`lib<Name>.dylib`).
    #[serde(rename = "shared")]
    SharedLibrary,
    /// A static archive (`<Name>.a`).
    #[serde(rename = "static")]
    StaticLibrary,
    /// A framework bundle (`<Name>.framework`) wrapping a static archive.
    Framework,
}

impl CompilationTarget {
    /// Returns the canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilationTarget::SharedLibrary => "shared",
            CompilationTarget::StaticLibrary => "static",
            CompilationTarget::Framework => "framework",
        }
    }
}

impl fmt::Display for CompilationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompilationTarget {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "library" | "sharedlibrary" | "dylib" | "shared" => Ok(CompilationTarget::SharedLibrary),
            "static" | "staticlibrary" => Ok(CompilationTarget::StaticLibrary),
            "framework" => Ok(CompilationTarget::Framework),
            _ => Err(PackError::Config(format!(
                "The compilation target `{}` is not valid. Expected one of: shared, static, framework",
                s
            ))),
        }
    }
}

/// Build profile controlling optimization and debug info.
///
/// # Example
///
/// ```
/// use natpack_sdk::BuildProfile;
///
/// assert_eq!(BuildProfile::Debug.as_str(), "debug");
/// assert!(BuildProfile::Debug.is_debug());
/// assert!(!BuildProfile::Release.is_debug());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildProfile {
    /// `-g -O0`, debug symbols extracted for shared libraries.
    Debug,
    /// `-O2` with token lookup enabled.
    #[default]
    Release,
}

impl BuildProfile {
    /// Returns the string representation of the profile.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildProfile::Debug => "debug",
            BuildProfile::Release => "release",
        }
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, BuildProfile::Debug)
    }
}

/// Name every output file and bundle is derived from.
///
/// # Example
///
/// ```
/// use natpack_sdk::{CompilationTarget, LibraryName};
///
/// let name = LibraryName::from_assembly("managed/Sample.Core.dll").unwrap();
/// assert_eq!(name.as_str(), "Sample.Core");
/// assert_eq!(name.artifact_file(CompilationTarget::SharedLibrary), "libSample.Core.dylib");
/// assert_eq!(name.artifact_file(CompilationTarget::Framework), "Sample.Core.a");
/// assert_eq!(name.framework_dir(), "Sample.Core.framework");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LibraryName(String);

impl LibraryName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives the library name from the file stem of a managed input.
    pub fn from_assembly(path: impl AsRef<Path>) -> Result<Self, PackError> {
        let path = path.as_ref();
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(Self::new)
            .ok_or_else(|| {
                PackError::Config(format!(
                    "Cannot derive a library name from {}. Pass --library-name explicitly.",
                    path.display()
                ))
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the per-architecture and fat binaries for `target`.
    pub fn artifact_file(&self, target: CompilationTarget) -> String {
        match target {
            CompilationTarget::SharedLibrary => format!("lib{}.dylib", self.0),
            CompilationTarget::StaticLibrary | CompilationTarget::Framework => {
                format!("{}.a", self.0)
            }
        }
    }

    /// Directory name of the framework bundle.
    pub fn framework_dir(&self) -> String {
        format!("{}.framework", self.0)
    }

    /// File name of the umbrella header inside the framework.
    pub fn umbrella_header(&self) -> String {
        format!("{}.h", self.0)
    }
}

impl fmt::Display for LibraryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable configuration for one pipeline run.
///
/// Constructed once and passed by reference to every stage.
///
/// # Example
///
/// ```
/// use natpack_sdk::{BuildConfig, BuildProfile, CompilationTarget, Platform};
///
/// let config = BuildConfig::new(Platform::Ios, CompilationTarget::StaticLibrary, "out", "Sample")
///     .profile(BuildProfile::Debug)
///     .parallel(true);
/// assert!(config.profile.is_debug());
/// assert!(config.parallel);
/// ```
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Target operating system.
    pub platform: Platform,
    /// Kind of artifact to produce.
    pub target: CompilationTarget,
    /// Debug or release.
    pub profile: BuildProfile,
    /// Directory holding the generated sources; all outputs land below it.
    pub output_dir: PathBuf,
    /// Name used for every output file and bundle.
    pub library_name: LibraryName,
    /// Managed inputs, forwarded to the app packager for frameworks.
    pub assemblies: Vec<PathBuf>,
    /// Compile and link the architectures of one SDK concurrently.
    pub parallel: bool,
}

impl BuildConfig {
    pub fn new(
        platform: Platform,
        target: CompilationTarget,
        output_dir: impl Into<PathBuf>,
        library_name: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            target,
            profile: BuildProfile::default(),
            output_dir: output_dir.into(),
            library_name: LibraryName::new(library_name),
            assemblies: Vec::new(),
            parallel: false,
        }
    }

    pub fn profile(mut self, profile: BuildProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn assemblies(mut self, assemblies: Vec<PathBuf>) -> Self {
        self.assemblies = assemblies;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// File name of the per-architecture and fat binaries.
    pub fn artifact_file(&self) -> String {
        self.library_name.artifact_file(self.target)
    }

    /// Checks option combinations before any tool runs.
    ///
    /// # Returns
    ///
    /// * `Err(PackError::Unsupported)` for frameworks on macOS
    /// * `Err(PackError::Config)` for an empty library name or a framework
    ///   build without managed inputs
    pub fn validate(&self) -> Result<(), PackError> {
        if self.library_name.as_str().is_empty() {
            return Err(PackError::Config("The library name is empty".to_string()));
        }
        if self.target == CompilationTarget::Framework {
            if !self.platform.is_mobile() {
                return Err(PackError::Unsupported("frameworks for macOS".to_string()));
            }
            if self.assemblies.is_empty() {
                return Err(PackError::Config(
                    "Building a framework requires at least one managed assembly".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A file or bundle produced by a pipeline stage, with the architectures it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub architectures: Vec<String>,
}

impl BuildArtifact {
    pub fn new(path: impl Into<PathBuf>, architectures: Vec<String>) -> Self {
        Self {
            path: path.into(),
            architectures,
        }
    }

    /// Artifact holding a single architecture.
    pub fn single(path: impl Into<PathBuf>, arch: &str) -> Self {
        Self::new(path, vec![arch.to_string()])
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    /// One fat binary per SDK variant, at `<out>/<Sdk>/<artifact>`.
    pub sdk_artifacts: Vec<BuildArtifact>,
    /// Fat binary covering every SDK, at `<out>/<artifact>`.
    pub universal: BuildArtifact,
    /// Per-SDK framework bundles, at `<out>/<Sdk>/<Name>.framework`.
    pub frameworks: Vec<BuildArtifact>,
    /// Device + simulator framework, at `<out>/<Name>.framework`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_framework: Option<BuildArtifact>,
    /// `.dSYM` bundles produced in debug mode.
    pub debug_symbols: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_aliases() {
        for alias in ["osx", "MacOSX", "macos", "Mac"] {
            assert_eq!(alias.parse::<Platform>().unwrap(), Platform::MacOs);
        }
        assert_eq!("iOS".parse::<Platform>().unwrap(), Platform::Ios);
        assert_eq!("tvos".parse::<Platform>().unwrap(), Platform::TvOs);
        assert_eq!("WatchOS".parse::<Platform>().unwrap(), Platform::WatchOs);
    }

    #[test]
    fn test_invalid_platform_is_config_error() {
        let err = "android".parse::<Platform>().unwrap_err();
        assert!(matches!(err, PackError::Config(_)));
        assert_eq!(err.exit_code(), EXIT_CONFIG);
        assert!(err.to_string().contains("`android`"));
        assert!(err.to_string().ends_with("Expected one of: macos, ios, tvos, watchos"));
    }

    #[test]
    fn test_serialized_names_match_cli_spelling() {
        for target in [
            CompilationTarget::SharedLibrary,
            CompilationTarget::StaticLibrary,
            CompilationTarget::Framework,
        ] {
            let json = serde_json::to_value(target).unwrap();
            assert_eq!(json, target.as_str());
            assert_eq!(json.as_str().unwrap().parse::<CompilationTarget>().unwrap(), target);
        }
        for platform in Platform::ALL {
            assert_eq!(serde_json::to_value(platform).unwrap(), platform.as_str());
        }
    }

    #[test]
    fn test_compilation_target_aliases() {
        for alias in ["library", "SharedLibrary", "dylib", "shared"] {
            assert_eq!(
                alias.parse::<CompilationTarget>().unwrap(),
                CompilationTarget::SharedLibrary
            );
        }
        for alias in ["static", "staticlibrary"] {
            assert_eq!(
                alias.parse::<CompilationTarget>().unwrap(),
                CompilationTarget::StaticLibrary
            );
        }
        assert_eq!(
            "Framework".parse::<CompilationTarget>().unwrap(),
            CompilationTarget::Framework
        );
        assert!("bundle".parse::<CompilationTarget>().is_err());
    }

    #[test]
    fn test_artifact_name_is_function_of_name_and_target() {
        let name = LibraryName::new("Managed");
        assert_eq!(
            name.artifact_file(CompilationTarget::SharedLibrary),
            "libManaged.dylib"
        );
        assert_eq!(
            name.artifact_file(CompilationTarget::StaticLibrary),
            "Managed.a"
        );
        assert_eq!(name.artifact_file(CompilationTarget::Framework), "Managed.a");
        assert_eq!(name.framework_dir(), "Managed.framework");
        assert_eq!(name.umbrella_header(), "Managed.h");
    }

    #[test]
    fn test_library_name_from_assembly() {
        let name = LibraryName::from_assembly("/tmp/input/managed.dll").unwrap();
        assert_eq!(name.as_str(), "managed");
        assert!(LibraryName::from_assembly("/").is_err());
    }

    #[test]
    fn test_macos_framework_is_unsupported_not_internal() {
        let config = BuildConfig::new(
            Platform::MacOs,
            CompilationTarget::Framework,
            "/tmp/out",
            "managed",
        )
        .assemblies(vec![PathBuf::from("managed.dll")]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PackError::Unsupported(_)));
        assert_eq!(err.exit_code(), EXIT_UNSUPPORTED);
        assert_ne!(err.exit_code(), EXIT_INTERNAL);
    }

    #[test]
    fn test_framework_requires_assemblies() {
        let config = BuildConfig::new(Platform::Ios, CompilationTarget::Framework, "out", "x");
        assert!(matches!(config.validate(), Err(PackError::Config(_))));
        let config = config.assemblies(vec![PathBuf::from("x.dll")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tool_failure_exit_code_is_verbatim() {
        let err = PackError::ToolFailed {
            tool: "clang".to_string(),
            code: 42,
            stdout: String::new(),
            stderr: "error: boom".to_string(),
        };
        assert_eq!(err.exit_code(), 42);
        let msg = err.to_string();
        assert!(msg.contains("clang failed with exit code 42"));
        assert!(msg.contains("Stderr:\nerror: boom"));
        assert!(!msg.contains("Stdout:"));
    }

    #[test]
    fn test_tool_failure_renders_stdout_diagnostics() {
        let err = PackError::ToolFailed {
            tool: "mtouch".to_string(),
            code: 1,
            stdout: "error MT0091: This version of Xamarin.iOS requires the iOS 17.2 SDK\n".to_string(),
            stderr: "  \n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "mtouch failed with exit code 1\n\nStdout:\nerror MT0091: This version of Xamarin.iOS requires the iOS 17.2 SDK"
        );
    }

    #[test]
    fn test_internal_error_asks_for_report() {
        let err = PackError::Internal("invalid state".to_string());
        assert_eq!(err.exit_code(), EXIT_INTERNAL);
        assert!(err.to_string().contains("file a bug report"));
    }
}
