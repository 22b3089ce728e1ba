//! Machine-readable summary of a finished build.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::types::{BuildConfig, BuildResult, CompilationTarget, LibraryName, PackError, Platform};

/// File name of the report inside the output directory.
pub const REPORT_FILE: &str = "build-report.json";

/// Current time as an RFC 3339 timestamp.
pub fn timestamp() -> Result<String, PackError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| PackError::Internal(format!("formatting the current time: {}", e)))
}

/// Written to `<out>/build-report.json` after a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub natpack_version: String,
    pub platform: Platform,
    pub target: CompilationTarget,
    pub profile: String,
    pub library_name: LibraryName,
    pub started_at: String,
    pub finished_at: String,
    pub host_os: String,
    pub artifacts: BuildResult,
}

impl BuildReport {
    /// Captures `result` for `config`; `finished_at` is the current time.
    pub fn new(
        config: &BuildConfig,
        result: BuildResult,
        started_at: String,
    ) -> Result<Self, PackError> {
        Ok(Self {
            natpack_version: crate::VERSION.to_string(),
            platform: config.platform,
            target: config.target,
            profile: config.profile.as_str().to_string(),
            library_name: config.library_name.clone(),
            started_at,
            finished_at: timestamp()?,
            host_os: env::consts::OS.to_string(),
            artifacts: result,
        })
    }
}

/// Writes `report` as pretty-printed JSON into `output_dir` and returns the file path.
pub fn write_report(output_dir: &Path, report: &BuildReport) -> Result<PathBuf, PackError> {
    let json = serde_json::to_string_pretty(report)?;
    let path = output_dir.join(REPORT_FILE);
    fs::write(&path, json).map_err(PackError::io(format!("write {}", path.display())))?;
    Ok(path)
}
