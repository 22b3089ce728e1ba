//! Debug symbol extraction.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::process::{ProcessRunner, ToolInvocation, run_checked};
use crate::types::{BuildConfig, CompilationTarget, PackError};

/// `<input>.dSYM`
pub fn dsym_path(input: &Path) -> PathBuf {
    let mut path = OsString::from(input.as_os_str());
    path.push(".dSYM");
    PathBuf::from(path)
}

/// Whether `config` produces debug symbol bundles at all.
pub fn wants_debug_symbols(config: &BuildConfig) -> bool {
    config.profile.is_debug() && config.target == CompilationTarget::SharedLibrary
}

/// Runs `dsymutil` on `input` when debugging a shared library.
///
/// Returns the `.dSYM` bundle path, or `None` when nothing was extracted.
pub fn extract_debug_symbols(
    runner: &dyn ProcessRunner,
    config: &BuildConfig,
    input: &Path,
) -> Result<Option<PathBuf>, PackError> {
    if !wants_debug_symbols(config) {
        return Ok(None);
    }
    let output = dsym_path(input);
    run_checked(
        runner,
        &ToolInvocation::xcrun("dsymutil").arg(input).flag("-o", &output),
    )?;
    Ok(Some(output))
}
