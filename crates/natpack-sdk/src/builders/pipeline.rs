//! End-to-end build orchestration.
//!
//! [`NativeBuilder`] walks the SDK variants of the configured platform and,
//! for each one, compiles and links every architecture, combines the
//! results into a per-SDK fat binary, and optionally packages a framework.
//! After the last variant it produces the universal binary and, for mobile
//! frameworks, the merged device + simulator bundle.
//!
//! Stages hand their outputs to each other through the filesystem only;
//! the first failing step aborts the run and nothing is cleaned up.

use std::fmt;
use std::path::PathBuf;
use std::thread;

use super::compile::{ArchTarget, compile_arch, required_sources};
use super::dsym::extract_debug_symbols;
use super::framework::assemble_framework;
use super::link::link_arch;
use super::lipo::create_fat_binary;
use super::merge::merge_frameworks;
use crate::platform::sdk_variants;
use crate::process::ProcessRunner;
use crate::toolchain::{Toolchain, XCODE_APP_ENV};
use crate::types::{BuildArtifact, BuildConfig, BuildResult, CompilationTarget, PackError};

/// Named checkpoints of a pipeline run, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Configured,
    PerArchCompiled,
    PerArchLinked,
    PerSdkFatAssembled,
    FrameworkAssembled,
    DebugExtracted,
    FrameworksMerged,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn stage(stage: PipelineStage, detail: impl fmt::Display) {
    log::info!("[{}] {}", stage, detail);
}

/// Drives the full native build for one [`BuildConfig`].
///
/// # Example
///
/// ```no_run
/// use natpack_sdk::builders::NativeBuilder;
/// use natpack_sdk::process::SystemRunner;
/// use natpack_sdk::{BuildConfig, CompilationTarget, Platform};
///
/// let config = BuildConfig::new(Platform::Ios, CompilationTarget::StaticLibrary, "out", "Managed");
/// let result = NativeBuilder::new(&SystemRunner).build(&config)?;
/// println!("universal archive: {}", result.universal.path.display());
/// # Ok::<(), natpack_sdk::PackError>(())
/// ```
pub struct NativeBuilder<'r> {
    runner: &'r dyn ProcessRunner,
    toolchain: Option<Toolchain>,
    xcode_env: Option<String>,
}

impl<'r> NativeBuilder<'r> {
    /// Creates a builder that discovers Xcode from [`XCODE_APP_ENV`] or `xcode-select -p`.
    pub fn new(runner: &'r dyn ProcessRunner) -> Self {
        Self {
            runner,
            toolchain: None,
            xcode_env: std::env::var(XCODE_APP_ENV).ok(),
        }
    }

    /// Uses `toolchain` instead of discovering one.
    pub fn toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = Some(toolchain);
        self
    }

    /// Overrides the [`XCODE_APP_ENV`] value read at construction.
    pub fn xcode_env(mut self, value: Option<String>) -> Self {
        self.xcode_env = value;
        self
    }

    /// Runs the pipeline.
    ///
    /// # Returns
    ///
    /// * `Ok(BuildResult)` with every produced artifact
    /// * `Err(PackError)` from the first failing step; a failing tool's exit
    ///   code is preserved in [`PackError::ToolFailed`]
    pub fn build(&self, config: &BuildConfig) -> Result<BuildResult, PackError> {
        config.validate()?;
        let sources = required_sources(&config.output_dir)?;
        let toolchain =
            Toolchain::select(self.runner, self.toolchain.as_ref(), self.xcode_env.clone())?;
        stage(
            PipelineStage::Configured,
            format_args!(
                "{} {} ({}) for {} using {}",
                config.library_name,
                config.target,
                config.profile.as_str(),
                config.platform,
                toolchain.xcode_app().display()
            ),
        );

        let variants = sdk_variants(config.platform);
        let artifact_file = config.artifact_file();
        let mut arch_binaries = Vec::new();
        let mut sdk_artifacts = Vec::new();
        let mut frameworks = Vec::new();
        let mut debug_symbols = Vec::new();

        for variant in variants {
            let sdk_root = toolchain.sdk_root(variant);
            let targets: Vec<ArchTarget<'_>> = variant
                .architectures
                .iter()
                .map(|arch| ArchTarget::new(config, variant, arch, &sdk_root))
                .collect();

            let objects = fan_out(config.parallel, &targets, |_, target| {
                compile_arch(self.runner, target, &sources)
            })?;
            stage(
                PipelineStage::PerArchCompiled,
                format_args!("{} [{}]", variant.sdk, variant.architectures.join(", ")),
            );

            let linked = fan_out(config.parallel, &targets, |i, target| {
                link_arch(self.runner, target, &objects[i])
            })?;
            stage(PipelineStage::PerArchLinked, variant.sdk);

            let sdk_output = config.output_dir.join(variant.sdk).join(&artifact_file);
            let sdk_fat = create_fat_binary(self.runner, &linked, &sdk_output)?;
            stage(PipelineStage::PerSdkFatAssembled, sdk_fat.path.display());
            arch_binaries.extend(linked);

            if config.target == CompilationTarget::Framework {
                let framework =
                    assemble_framework(self.runner, &toolchain, config, variant, &sdk_fat)?;
                stage(PipelineStage::FrameworkAssembled, framework.path.display());
                frameworks.push(framework);
            }

            if let Some(dsym) = extract_debug_symbols(self.runner, config, &sdk_fat.path)? {
                stage(PipelineStage::DebugExtracted, dsym.display());
                debug_symbols.push(dsym);
            }
            sdk_artifacts.push(sdk_fat);
        }

        let universal = create_fat_binary(
            self.runner,
            &arch_binaries,
            &config.output_dir.join(&artifact_file),
        )?;
        stage(PipelineStage::PerSdkFatAssembled, universal.path.display());
        if let Some(dsym) = extract_debug_symbols(self.runner, config, &universal.path)? {
            stage(PipelineStage::DebugExtracted, dsym.display());
            debug_symbols.push(dsym);
        }

        let merged_framework =
            if variants.len() == 2 && config.target == CompilationTarget::Framework {
                let merged = self.merge(config, &frameworks)?;
                stage(PipelineStage::FrameworksMerged, merged.path.display());
                Some(merged)
            } else {
                None
            };

        stage(PipelineStage::Done, &config.library_name);
        Ok(BuildResult {
            sdk_artifacts,
            universal,
            frameworks,
            merged_framework,
            debug_symbols,
        })
    }

    fn merge(
        &self,
        config: &BuildConfig,
        frameworks: &[BuildArtifact],
    ) -> Result<BuildArtifact, PackError> {
        let [device, simulator] = frameworks else {
            return Err(PackError::Internal(format!(
                "expected a device and a simulator framework to merge, found {}",
                frameworks.len()
            )));
        };
        let output: PathBuf = config
            .output_dir
            .join(config.library_name.framework_dir());
        merge_frameworks(
            self.runner,
            &config.library_name,
            device,
            simulator,
            &output,
        )
    }
}

/// Applies `f` to every architecture of one SDK variant.
///
/// Sequential mode stops at the first error. Parallel mode runs one scoped
/// thread per architecture, joins them all, then reports the first error in
/// architecture order.
fn fan_out<'a, T, F>(parallel: bool, targets: &[ArchTarget<'a>], f: F) -> Result<Vec<T>, PackError>
where
    T: Send,
    F: Fn(usize, &ArchTarget<'a>) -> Result<T, PackError> + Sync,
{
    if !parallel || targets.len() < 2 {
        return targets
            .iter()
            .enumerate()
            .map(|(i, target)| f(i, target))
            .collect();
    }

    let f = &f;
    let results: Vec<Result<T, PackError>> = thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .enumerate()
            .map(|(i, target)| scope.spawn(move || f(i, target)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(PackError::Internal(
                        "a per-architecture worker thread panicked".to_string(),
                    ))
                })
            })
            .collect()
    });
    results.into_iter().collect()
}
