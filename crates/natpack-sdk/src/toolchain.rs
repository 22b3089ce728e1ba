//! Xcode toolchain discovery.

use crate::platform::SdkVariant;
use crate::process::{ProcessRunner, ToolInvocation};
use crate::types::PackError;
use std::path::{Path, PathBuf};

/// Environment variable overriding the Xcode application path.
pub const XCODE_APP_ENV: &str = "NATPACK_XCODE_APP";

/// Location of the Xcode installation the native tools come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    xcode_app: PathBuf,
}

impl Toolchain {
    /// Uses the Xcode application at `xcode_app` (e.g. `/Applications/Xcode.app`).
    pub fn new(xcode_app: impl Into<PathBuf>) -> Self {
        Self {
            xcode_app: xcode_app.into(),
        }
    }

    /// Uses `env_value`, the value of [`XCODE_APP_ENV`], when it is set and
    /// non-blank; otherwise falls back to `xcode-select -p`.
    pub fn discover_with(
        runner: &dyn ProcessRunner,
        env_value: Option<String>,
    ) -> Result<Self, PackError> {
        if let Some(path) = env_value
            && !path.trim().is_empty()
        {
            log::debug!("Using Xcode from {}: {}", XCODE_APP_ENV, path);
            return Ok(Self::new(path.trim()));
        }
        Self::from_xcode_select(runner)
    }

    /// Picks the toolchain to build with.
    ///
    /// An explicitly configured toolchain wins, then `env_value` (the value
    /// of [`XCODE_APP_ENV`]), then `xcode-select -p`.
    pub fn select(
        runner: &dyn ProcessRunner,
        configured: Option<&Toolchain>,
        env_value: Option<String>,
    ) -> Result<Self, PackError> {
        match configured {
            Some(toolchain) => Ok(toolchain.clone()),
            None => Self::discover_with(runner, env_value),
        }
    }

    /// Asks `xcode-select -p` for the active developer directory.
    ///
    /// The developer directory is `<Xcode.app>/Contents/Developer`, so the
    /// application is two levels up.
    pub fn from_xcode_select(runner: &dyn ProcessRunner) -> Result<Self, PackError> {
        let not_found = || {
            PackError::Config(
                "Could not find the Xcode location. Install Xcode and run `xcode-select -s`, \
                 or set NATPACK_XCODE_APP"
                    .to_string(),
            )
        };
        let output = runner
            .run(&ToolInvocation::new("xcode-select").arg("-p"))
            .map_err(|_| not_found())?;
        if !output.success() {
            return Err(not_found());
        }
        let developer_dir = PathBuf::from(output.stdout.trim());
        let xcode_app = developer_dir
            .parent()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(not_found)?;
        Ok(Self::new(xcode_app))
    }

    pub fn xcode_app(&self) -> &Path {
        &self.xcode_app
    }

    /// Sysroot of `variant`, passed to `-isysroot`.
    pub fn sdk_root(&self, variant: &SdkVariant) -> PathBuf {
        self.xcode_app
            .join("Contents/Developer/Platforms")
            .join(format!("{}.platform", variant.sdk))
            .join("Developer/SDKs")
            .join(format!("{}.sdk", variant.sdk))
    }

    /// Version of the installed SDK for `variant`, e.g. `17.2`.
    pub fn sdk_version(
        &self,
        runner: &dyn ProcessRunner,
        variant: &SdkVariant,
    ) -> Result<String, PackError> {
        let sdk = variant.sdk.to_lowercase();
        let failed = || PackError::Config(format!("Could not get the sdk version for '{}'", sdk));
        let output = runner
            .run(
                &ToolInvocation::new("xcrun")
                    .arg("--show-sdk-version")
                    .flag("--sdk", &sdk),
            )
            .map_err(|_| failed())?;
        let version = output.stdout.trim();
        if !output.success() || version.is_empty() {
            return Err(failed());
        }
        Ok(version.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sdk_variants;
    use crate::process::ProcessOutput;
    use crate::process::fake::RecordingRunner;
    use crate::types::Platform;

    #[test]
    fn test_xcode_app_is_two_levels_above_developer_dir() {
        let runner = RecordingRunner::with_handler(|_| {
            ProcessOutput::ok("/Applications/Xcode-15.app/Contents/Developer\n")
        });
        let toolchain = Toolchain::from_xcode_select(&runner).unwrap();
        assert_eq!(toolchain.xcode_app(), Path::new("/Applications/Xcode-15.app"));
        assert_eq!(runner.calls()[0].to_string(), "xcode-select -p");
    }

    #[test]
    fn test_xcode_select_failure_is_config_error() {
        let runner = RecordingRunner::with_handler(|_| ProcessOutput::failed(2, ""));
        let err = Toolchain::from_xcode_select(&runner).unwrap_err();
        assert!(matches!(err, PackError::Config(_)));
        assert!(err.to_string().contains("Could not find the Xcode location"));
    }

    fn xcode_select_runner() -> RecordingRunner {
        RecordingRunner::with_handler(|_| {
            ProcessOutput::ok("/Applications/Xcode-select.app/Contents/Developer\n")
        })
    }

    #[test]
    fn test_configured_toolchain_beats_env_and_xcode_select() {
        let runner = xcode_select_runner();
        let configured = Toolchain::new("/Applications/Xcode-config.app");
        let toolchain = Toolchain::select(
            &runner,
            Some(&configured),
            Some("/Applications/Xcode-env.app".to_string()),
        )
        .unwrap();
        assert_eq!(toolchain, configured);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_env_beats_xcode_select() {
        let runner = xcode_select_runner();
        let toolchain =
            Toolchain::select(&runner, None, Some(" /Applications/Xcode-env.app\n".to_string()))
                .unwrap();
        assert_eq!(toolchain.xcode_app(), Path::new("/Applications/Xcode-env.app"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_xcode_select_is_last_resort() {
        let runner = xcode_select_runner();
        let toolchain = Toolchain::select(&runner, None, None).unwrap();
        assert_eq!(toolchain.xcode_app(), Path::new("/Applications/Xcode-select.app"));

        let toolchain = Toolchain::discover_with(&runner, Some("   ".to_string())).unwrap();
        assert_eq!(toolchain.xcode_app(), Path::new("/Applications/Xcode-select.app"));
        assert_eq!(runner.tools(), vec!["xcode-select", "xcode-select"]);
    }

    #[test]
    fn test_sdk_root() {
        let toolchain = Toolchain::new("/Applications/Xcode.app");
        let sim = &sdk_variants(Platform::Ios)[1];
        assert_eq!(
            toolchain.sdk_root(sim),
            Path::new(
                "/Applications/Xcode.app/Contents/Developer/Platforms/iPhoneSimulator.platform/Developer/SDKs/iPhoneSimulator.sdk"
            )
        );
    }

    #[test]
    fn test_sdk_version_queries_lowercase_sdk() {
        let runner = RecordingRunner::with_handler(|_| ProcessOutput::ok("9.2\n"));
        let toolchain = Toolchain::new("/Applications/Xcode.app");
        let tv = &sdk_variants(Platform::TvOs)[0];
        assert_eq!(toolchain.sdk_version(&runner, tv).unwrap(), "9.2");
        assert_eq!(
            runner.calls()[0].args_lossy(),
            vec!["--show-sdk-version", "--sdk", "appletvos"]
        );
    }

    #[test]
    fn test_sdk_version_failure() {
        let runner = RecordingRunner::with_handler(|_| ProcessOutput::failed(1, "bad sdk"));
        let toolchain = Toolchain::new("/Applications/Xcode.app");
        let err = toolchain
            .sdk_version(&runner, &sdk_variants(Platform::WatchOs)[1])
            .unwrap_err();
        assert!(err.to_string().contains("'watchsimulator'"));
    }
}
