//! Per-architecture compilation of the generated glue sources.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::common::ensure_dir;
use crate::platform::{SdkVariant, runtime_defines};
use crate::process::{ProcessRunner, ToolInvocation, run_checked};
use crate::types::{BuildArtifact, BuildConfig, BuildProfile, PackError};

/// Sources the binding generator writes into the output directory, in compile order.
pub const REQUIRED_SOURCES: [&str; 4] = [
    "glib.c",
    "mono_embeddinator.c",
    "objc-support.m",
    "bindings.m",
];

/// One (SDK variant, architecture) cell of the build matrix.
#[derive(Debug, Clone, Copy)]
pub struct ArchTarget<'a> {
    pub config: &'a BuildConfig,
    pub variant: &'a SdkVariant,
    pub arch: &'a str,
    /// Sysroot of `variant` inside the Xcode installation.
    pub sdk_root: &'a Path,
}

impl<'a> ArchTarget<'a> {
    pub fn new(
        config: &'a BuildConfig,
        variant: &'a SdkVariant,
        arch: &'a str,
        sdk_root: &'a Path,
    ) -> Self {
        Self {
            config,
            variant,
            arch,
            sdk_root,
        }
    }

    /// `<out>/<arch>`, holding the objects and the per-architecture binary.
    pub fn arch_dir(&self) -> PathBuf {
        self.config.output_dir.join(self.arch)
    }

    /// Path of the object file built from `source`.
    pub fn object_path(&self, source: &Path) -> PathBuf {
        let stem = source.file_stem().unwrap_or(source.as_os_str());
        let mut name = stem.to_os_string();
        name.push(".o");
        self.arch_dir().join(name)
    }

    /// Flags shared by the compile and link steps of this cell.
    pub fn common_flags(&self) -> Vec<OsString> {
        let mut flags: Vec<OsString> = match self.config.profile {
            BuildProfile::Debug => vec!["-g".into(), "-O0".into()],
            BuildProfile::Release => vec!["-O2".into(), "-DTOKENLOOKUP".into()],
        };
        flags.extend(["-fobjc-arc", "-ObjC", "-Wall", "-arch"].map(OsString::from));
        flags.push(self.arch.into());
        flags.push("-isysroot".into());
        flags.push(self.sdk_root.as_os_str().to_os_string());
        flags.push(self.variant.version_min_flag().into());

        let mut include = OsString::from("-I");
        include.push(self.variant.runtime_include_dir());
        flags.push(include);
        flags.extend(
            runtime_defines(self.config.platform)
                .iter()
                .map(OsString::from),
        );
        flags
    }
}

/// Returns the required sources inside `output_dir`, or a configuration
/// error naming the first one that is missing.
pub fn required_sources(output_dir: &Path) -> Result<Vec<PathBuf>, PackError> {
    REQUIRED_SOURCES
        .iter()
        .map(|name| {
            let path = output_dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(PackError::Config(format!(
                    "Generated source {} not found. Run the binding generator into {} first.",
                    path.display(),
                    output_dir.display()
                )))
            }
        })
        .collect()
}

/// `xcrun clang <common> -DMONO_EMBEDDINATOR_DLL_EXPORT <variant flags> -c <src> -o <obj>`
pub fn compile_invocation(target: &ArchTarget<'_>, source: &Path, object: &Path) -> ToolInvocation {
    ToolInvocation::xcrun("clang")
        .args(target.common_flags())
        .arg("-DMONO_EMBEDDINATOR_DLL_EXPORT")
        .args(target.variant.compiler_flags)
        .flag("-c", source)
        .flag("-o", object)
}

/// Compiles every source for one architecture.
///
/// Stops at the first failing source; its exit code is carried in the
/// returned [`PackError::ToolFailed`].
pub fn compile_arch(
    runner: &dyn ProcessRunner,
    target: &ArchTarget<'_>,
    sources: &[PathBuf],
) -> Result<Vec<BuildArtifact>, PackError> {
    ensure_dir(&target.arch_dir())?;
    let mut objects = Vec::with_capacity(sources.len());
    for source in sources {
        let object = target.object_path(source);
        log::debug!("Compiling {} ({})", source.display(), target.arch);
        run_checked(runner, &compile_invocation(target, source, &object))?;
        objects.push(BuildArtifact::single(object, target.arch));
    }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sdk_variants;
    use crate::process::ProcessOutput;
    use crate::process::fake::RecordingRunner;
    use crate::types::{CompilationTarget, Platform};
    use std::fs;
    use tempfile::TempDir;

    fn write_sources(dir: &Path) -> Vec<PathBuf> {
        for name in REQUIRED_SOURCES {
            fs::write(dir.join(name), "// generated").unwrap();
        }
        required_sources(dir).unwrap()
    }

    #[test]
    fn test_common_flags_release_ios_device() {
        let config = BuildConfig::new(Platform::Ios, CompilationTarget::StaticLibrary, "out", "M");
        let variant = &sdk_variants(Platform::Ios)[0];
        let root = PathBuf::from("/X.app/SDKs/iPhoneOS.sdk");
        let target = ArchTarget::new(&config, variant, "arm64", &root);
        let flags: Vec<String> = target
            .common_flags()
            .iter()
            .map(|f| f.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            &flags[..9],
            &[
                "-O2",
                "-DTOKENLOOKUP",
                "-fobjc-arc",
                "-ObjC",
                "-Wall",
                "-arch",
                "arm64",
                "-isysroot",
                "/X.app/SDKs/iPhoneOS.sdk"
            ]
        );
        assert_eq!(flags[9], "-miphoneos-version-min=8.0");
        assert!(flags[10].starts_with("-I") && flags[10].ends_with("MonoTouch.iphoneos.sdk/usr/include"));
        assert_eq!(flags[11], "-DXAMARIN_IOS");
        assert_eq!(flags.len(), 12);
    }

    #[test]
    fn test_common_flags_debug_macos() {
        let config = BuildConfig::new(Platform::MacOs, CompilationTarget::SharedLibrary, "out", "M")
            .profile(BuildProfile::Debug);
        let variant = &sdk_variants(Platform::MacOs)[0];
        let root = PathBuf::from("/sdk");
        let target = ArchTarget::new(&config, variant, "x86_64", &root);
        let flags = target.common_flags();
        assert_eq!(flags[0], "-g");
        assert_eq!(flags[1], "-O0");
        assert!(!flags.iter().any(|f| f == "-DXAMARIN_IOS"));
        assert!(flags.last().unwrap().to_string_lossy().ends_with("include/mono-2.0"));
    }

    #[test]
    fn test_compile_invocation_tail() {
        let config = BuildConfig::new(Platform::TvOs, CompilationTarget::StaticLibrary, "/o", "M");
        let variant = &sdk_variants(Platform::TvOs)[0];
        let root = PathBuf::from("/sdk");
        let target = ArchTarget::new(&config, variant, "arm64", &root);
        let inv = compile_invocation(&target, Path::new("/o/glib.c"), Path::new("/o/arm64/glib.o"));
        let args = inv.args_lossy();

        assert_eq!(args[0], "clang");
        let tail = &args[args.len() - 6..];
        assert_eq!(
            tail,
            &[
                "-DMONO_EMBEDDINATOR_DLL_EXPORT",
                "-fembed-bitcode",
                "-c",
                "/o/glib.c",
                "-o",
                "/o/arm64/glib.o"
            ]
        );
    }

    #[test]
    fn test_object_paths_are_deterministic() {
        let temp = TempDir::new().unwrap();
        let sources = write_sources(temp.path());
        let config = BuildConfig::new(
            Platform::Ios,
            CompilationTarget::StaticLibrary,
            temp.path(),
            "M",
        );
        let variant = &sdk_variants(Platform::Ios)[1];
        let root = PathBuf::from("/sdk");
        let target = ArchTarget::new(&config, variant, "x86_64", &root);
        let runner = RecordingRunner::simulating();

        let first = compile_arch(&runner, &target, &sources).unwrap();
        let second = compile_arch(&runner, &target, &sources).unwrap();
        assert_eq!(first, second);

        let names: Vec<_> = first
            .iter()
            .map(|a| a.path.strip_prefix(temp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("x86_64/glib.o"),
                PathBuf::from("x86_64/mono_embeddinator.o"),
                PathBuf::from("x86_64/objc-support.o"),
                PathBuf::from("x86_64/bindings.o"),
            ]
        );
        assert!(first.iter().all(|a| a.path.is_file()));
        assert!(first.iter().all(|a| a.architectures == vec!["x86_64"]));
    }

    #[test]
    fn test_compile_stops_at_first_failure() {
        let temp = TempDir::new().unwrap();
        let sources = write_sources(temp.path());
        let config = BuildConfig::new(Platform::Ios, CompilationTarget::StaticLibrary, temp.path(), "M");
        let variant = &sdk_variants(Platform::Ios)[0];
        let root = PathBuf::from("/sdk");
        let target = ArchTarget::new(&config, variant, "armv7", &root);
        let runner = RecordingRunner::with_handler(|inv| {
            if inv.args_lossy().iter().any(|a| a.ends_with("mono_embeddinator.c")) {
                ProcessOutput::failed(7, "error: unknown type name")
            } else {
                ProcessOutput::ok("")
            }
        });

        let err = compile_arch(&runner, &target, &sources).unwrap_err();
        assert_eq!(err.exit_code(), 7);
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_missing_source_is_config_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("glib.c"), "").unwrap();
        let err = required_sources(temp.path()).unwrap_err();
        assert!(matches!(err, PackError::Config(_)));
        assert!(err.to_string().contains("mono_embeddinator.c"));
    }
}
