//! Framework bundle assembly through the app packager.
//!
//! The packager embeds the managed assemblies and force-loads the per-SDK
//! static archive into `<appdir>/Frameworks/<Name>.framework`. This stage
//! then adds the generated headers, moves the bundle to `<out>/<Sdk>/` and
//! discards the scratch app directory.

use std::path::{Path, PathBuf};

use super::common::{
    absolute, copy_file, ensure_dir, files_with_extension, move_dir, remove_dir_if_exists,
};
use crate::platform::{SdkVariant, app_packager, platform_assembly, target_framework};
use crate::process::{ProcessRunner, ToolInvocation, run_checked};
use crate::toolchain::Toolchain;
use crate::types::{BuildArtifact, BuildConfig, EXIT_FAILURE, PackError};

/// Header emitted by the binding generator; renamed to the umbrella header inside the bundle.
const BINDINGS_HEADER: &str = "bindings.h";

/// Absolute paths and probed values a packager run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagerInputs {
    /// Scratch app directory, `<out>/<Sdk>/appdir`.
    pub appdir: PathBuf,
    /// Packager cache, `<out>/<Sdk>/mtouch-cache`.
    pub cache_dir: PathBuf,
    pub assemblies: Vec<PathBuf>,
    /// Per-SDK fat static archive to force-load.
    pub static_library: PathBuf,
    /// Installed SDK version, as reported by `xcrun --show-sdk-version`.
    pub sdk_version: String,
}

impl PackagerInputs {
    /// Resolves every path to its absolute form.
    pub fn resolve(
        config: &BuildConfig,
        variant: &SdkVariant,
        static_library: &Path,
        sdk_version: impl Into<String>,
    ) -> Result<Self, PackError> {
        let sdk_dir = config.output_dir.join(variant.sdk);
        Ok(Self {
            appdir: absolute(&sdk_dir.join("appdir"))?,
            cache_dir: absolute(&sdk_dir.join("mtouch-cache"))?,
            assemblies: config
                .assemblies
                .iter()
                .map(|a| absolute(a))
                .collect::<Result<_, _>>()?,
            static_library: absolute(static_library)?,
            sdk_version: sdk_version.into(),
        })
    }
}

/// Builds the packager command line for one SDK variant.
pub fn packager_invocation(
    config: &BuildConfig,
    variant: &SdkVariant,
    xcode_app: &Path,
    inputs: &PackagerInputs,
) -> Result<ToolInvocation, PackError> {
    let mut inv = ToolInvocation::new(app_packager(config.platform)?)
        .arg(if variant.is_simulator() { "--sim" } else { "--dev" })
        .arg(&inputs.appdir)
        .arg(format!("--abi={}", variant.architectures.join(",")))
        .flag("--sdkroot", xcode_app)
        .flag("--targetver", variant.min_version)
        .arg("--dsym:false")
        .arg("--embeddinator")
        .args(&inputs.assemblies)
        .joined("-r:", &platform_assembly(config.platform)?)
        .flag("--sdk", &inputs.sdk_version)
        .args(["--nostrip", "--nolink", "--registrar:static"])
        .flag("--cache", &inputs.cache_dir);
    if config.profile.is_debug() {
        inv = inv.arg("--debug");
    }
    Ok(inv
        .arg(format!(
            "--assembly-build-target=@all=framework={}",
            config.library_name.framework_dir()
        ))
        .flag("--target-framework", target_framework(config.platform)?)
        .joined("--gcc_flags=-force_load ", &inputs.static_library))
}

/// Copies every `*.h` in `source_dir` into `headers_dir`, renaming the
/// bindings header to `umbrella`.
pub fn install_headers(
    source_dir: &Path,
    headers_dir: &Path,
    umbrella: &str,
) -> Result<Vec<PathBuf>, PackError> {
    ensure_dir(headers_dir)?;
    let mut installed = Vec::new();
    for header in files_with_extension(source_dir, "h")? {
        let Some(name) = header.file_name() else {
            continue;
        };
        let dest = if name == BINDINGS_HEADER {
            headers_dir.join(umbrella)
        } else {
            headers_dir.join(name)
        };
        copy_file(&header, &dest)?;
        installed.push(dest);
    }
    Ok(installed)
}

/// `<out>/<Sdk>/<Name>.framework`
pub fn sdk_framework_path(config: &BuildConfig, variant: &SdkVariant) -> PathBuf {
    config
        .output_dir
        .join(variant.sdk)
        .join(config.library_name.framework_dir())
}

/// Packages the per-SDK static archive into a framework bundle.
pub fn assemble_framework(
    runner: &dyn ProcessRunner,
    toolchain: &Toolchain,
    config: &BuildConfig,
    variant: &SdkVariant,
    static_library: &BuildArtifact,
) -> Result<BuildArtifact, PackError> {
    if !config.platform.is_mobile() {
        return Err(PackError::Unsupported("frameworks for macOS".to_string()));
    }
    let sdk_version = toolchain.sdk_version(runner, variant)?;
    let inputs = PackagerInputs::resolve(config, variant, &static_library.path, sdk_version)?;
    let invocation = packager_invocation(config, variant, toolchain.xcode_app(), &inputs)?;
    run_checked(runner, &invocation)?;

    let bundle = inputs
        .appdir
        .join("Frameworks")
        .join(config.library_name.framework_dir());
    if !bundle.is_dir() {
        return Err(PackError::ToolFailed {
            tool: invocation.tool_name(),
            code: EXIT_FAILURE,
            stdout: String::new(),
            stderr: format!(
                "the packager reported success but {} was not created",
                bundle.display()
            ),
        });
    }

    install_headers(
        &config.output_dir,
        &bundle.join("Headers"),
        &config.library_name.umbrella_header(),
    )?;

    let dest = sdk_framework_path(config, variant);
    move_dir(&bundle, &dest)?;
    remove_dir_if_exists(&inputs.appdir)?;
    log::info!("Assembled {}", dest.display());

    Ok(BuildArtifact::new(
        dest,
        variant.architectures.iter().map(|a| a.to_string()).collect(),
    ))
}
