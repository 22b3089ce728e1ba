//! Linking or archiving the object files of one architecture.

use std::path::{Path, PathBuf};

use super::common::remove_file_if_exists;
use super::compile::ArchTarget;
use crate::process::{ProcessRunner, ToolInvocation, run_checked};
use crate::types::{BuildArtifact, CompilationTarget, PackError};

/// `<out>/<arch>/<artifact>`
pub fn arch_artifact_path(target: &ArchTarget<'_>) -> PathBuf {
    target.arch_dir().join(target.config.artifact_file())
}

/// Dynamic library link: common flags, system frameworks, `@rpath` install
/// name, the objects, then the runtime libraries.
pub fn link_invocation(
    target: &ArchTarget<'_>,
    objects: &[BuildArtifact],
    output: &Path,
) -> ToolInvocation {
    let install_name = format!("@rpath/{}", target.config.artifact_file());
    ToolInvocation::xcrun("clang")
        .args(target.common_flags())
        .arg("-dynamiclib")
        .args(target.variant.linker_flags)
        .arg("-lobjc")
        .flag("-framework", "CoreFoundation")
        .flag("-framework", "Foundation")
        .flag("-install_name", install_name)
        .args(objects.iter().map(|o| o.path.as_os_str()))
        .flag("-o", output)
        .args(target.variant.runtime_link_flags())
}

/// `xcrun ar cru <archive> <objects...>`
pub fn archive_invocation(objects: &[BuildArtifact], output: &Path) -> ToolInvocation {
    ToolInvocation::xcrun("ar")
        .arg("cru")
        .arg(output)
        .args(objects.iter().map(|o| o.path.as_os_str()))
}

/// Produces the per-architecture binary for the configured target.
///
/// Static archives are deleted before `ar` runs so a rebuild replaces the
/// members instead of appending to a stale archive.
pub fn link_arch(
    runner: &dyn ProcessRunner,
    target: &ArchTarget<'_>,
    objects: &[BuildArtifact],
) -> Result<BuildArtifact, PackError> {
    let output = arch_artifact_path(target);
    let invocation = match target.config.target {
        CompilationTarget::SharedLibrary => link_invocation(target, objects, &output),
        CompilationTarget::StaticLibrary | CompilationTarget::Framework => {
            remove_file_if_exists(&output)?;
            archive_invocation(objects, &output)
        }
    };
    log::debug!("Linking {} ({})", output.display(), target.arch);
    run_checked(runner, &invocation)?;
    Ok(BuildArtifact::single(output, target.arch))
}
