//! Platform matrix.
//!
//! For each [`Platform`], the SDK variants to build (device and, on mobile
//! platforms, simulator) together with their architectures, minimum OS
//! version and SDK-specific flags. Every other platform-specific path or
//! flag used by the builders (runtime include and library directories,
//! platform assembly, target framework, app packager) is also defined here.

use crate::types::{PackError, Platform};
use serde::Serialize;
use std::path::PathBuf;

/// Installation root of the mobile runtime SDKs and the app packager.
const MOBILE_RUNTIME_ROOT: &str = "/Library/Frameworks/Xamarin.iOS.framework/Versions/Current";
/// Installation root of the desktop runtime.
const DESKTOP_RUNTIME_ROOT: &str = "/Library/Frameworks/Mono.framework/Versions/Current";

/// One SDK to build for: a sysroot, its architectures, and its flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdkVariant {
    /// SDK identifier, e.g. `iPhoneOS`. Names the `<Sdk>.platform` and `<Sdk>.sdk` directories.
    pub sdk: &'static str,
    /// Instruction-set architectures built for this SDK.
    pub architectures: &'static [&'static str],
    /// Token used in `-m<sdk_name>-version-min`.
    pub sdk_name: &'static str,
    /// Minimum OS version.
    pub min_version: &'static str,
    /// Runtime SDK directory for mobile platforms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_sdk: Option<&'static str>,
    /// Extra flags passed when compiling each source.
    pub compiler_flags: &'static [&'static str],
    /// Extra flags passed when linking a shared library.
    pub linker_flags: &'static [&'static str],
}

impl SdkVariant {
    pub fn is_simulator(&self) -> bool {
        self.sdk.contains("Simulator")
    }

    /// Minimum-version flag, e.g. `-miphoneos-version-min=8.0`.
    pub fn version_min_flag(&self) -> String {
        format!("-m{}-version-min={}", self.sdk_name, self.min_version)
    }

    /// Runtime include directory for this variant.
    pub fn runtime_include_dir(&self) -> PathBuf {
        match self.runtime_sdk {
            Some(sdk) => PathBuf::from(MOBILE_RUNTIME_ROOT)
                .join("SDKs")
                .join(sdk)
                .join("usr/include"),
            None => PathBuf::from(DESKTOP_RUNTIME_ROOT).join("include/mono-2.0"),
        }
    }

    /// Linker flags pulling in the managed runtime.
    pub fn runtime_link_flags(&self) -> Vec<String> {
        let mut flags = match self.runtime_sdk {
            Some(sdk) => vec![
                format!("-L{}/SDKs/{}/usr/lib", MOBILE_RUNTIME_ROOT, sdk),
                "-lxamarin".to_string(),
            ],
            None => vec![format!("-L{}/lib/", DESKTOP_RUNTIME_ROOT)],
        };
        flags.push("-lmonosgen-2.0".to_string());
        flags
    }
}

const MACOS: &[SdkVariant] = &[SdkVariant {
    sdk: "MacOSX",
    architectures: &["i386", "x86_64"],
    sdk_name: "macosx",
    min_version: "10.7",
    runtime_sdk: None,
    compiler_flags: &[],
    linker_flags: &[],
}];

const IOS: &[SdkVariant] = &[
    SdkVariant {
        sdk: "iPhoneOS",
        architectures: &["armv7", "armv7s", "arm64"],
        sdk_name: "iphoneos",
        min_version: "8.0",
        runtime_sdk: Some("MonoTouch.iphoneos.sdk"),
        compiler_flags: &[],
        linker_flags: &[],
    },
    SdkVariant {
        sdk: "iPhoneSimulator",
        architectures: &["i386", "x86_64"],
        sdk_name: "ios-simulator",
        min_version: "8.0",
        runtime_sdk: Some("MonoTouch.iphonesimulator.sdk"),
        compiler_flags: &[],
        linker_flags: &[],
    },
];

const TVOS: &[SdkVariant] = &[
    SdkVariant {
        sdk: "AppleTVOS",
        architectures: &["arm64"],
        sdk_name: "tvos",
        min_version: "9.0",
        runtime_sdk: Some("Xamarin.AppleTVOS.sdk"),
        compiler_flags: &["-fembed-bitcode"],
        linker_flags: &["-fembed-bitcode"],
    },
    SdkVariant {
        sdk: "AppleTVSimulator",
        architectures: &["x86_64"],
        sdk_name: "tvos-simulator",
        min_version: "9.0",
        runtime_sdk: Some("Xamarin.AppleTVSimulator.sdk"),
        compiler_flags: &[],
        linker_flags: &[],
    },
];

const WATCHOS: &[SdkVariant] = &[
    SdkVariant {
        sdk: "WatchOS",
        architectures: &["armv7k"],
        sdk_name: "watchos",
        min_version: "2.0",
        runtime_sdk: Some("Xamarin.WatchOS.sdk"),
        compiler_flags: &["-fembed-bitcode"],
        linker_flags: &["-fembed-bitcode"],
    },
    SdkVariant {
        sdk: "WatchSimulator",
        architectures: &["i386"],
        sdk_name: "watchos-simulator",
        min_version: "2.0",
        runtime_sdk: Some("Xamarin.WatchSimulator.sdk"),
        compiler_flags: &[],
        linker_flags: &[],
    },
];

/// Returns the SDK variants to build for `platform`, device first.
///
/// # Example
///
/// ```
/// use natpack_sdk::Platform;
/// use natpack_sdk::platform::sdk_variants;
///
/// let variants = sdk_variants(Platform::Ios);
/// assert_eq!(variants.len(), 2);
/// assert!(!variants[0].is_simulator());
/// assert!(variants[1].is_simulator());
/// ```
pub fn sdk_variants(platform: Platform) -> &'static [SdkVariant] {
    match platform {
        Platform::MacOs => MACOS,
        Platform::Ios => IOS,
        Platform::TvOs => TVOS,
        Platform::WatchOs => WATCHOS,
    }
}

/// Preprocessor defines the glue sources expect for `platform`.
pub fn runtime_defines(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::MacOs => &[],
        Platform::Ios | Platform::TvOs | Platform::WatchOs => &["-DXAMARIN_IOS"],
    }
}

/// Platform assembly the app packager references.
pub fn platform_assembly(platform: Platform) -> Result<PathBuf, PackError> {
    let flavor = match platform {
        Platform::MacOs => {
            return Err(PackError::Unsupported(
                "platform assembly for macOS".to_string(),
            ));
        }
        Platform::Ios => "Xamarin.iOS",
        Platform::TvOs => "Xamarin.TVOS",
        Platform::WatchOs => "Xamarin.WatchOS",
    };
    Ok(PathBuf::from(MOBILE_RUNTIME_ROOT)
        .join("lib/mono")
        .join(flavor)
        .join(format!("{}.dll", flavor)))
}

/// Target-framework token passed to the app packager.
pub fn target_framework(platform: Platform) -> Result<&'static str, PackError> {
    match platform {
        Platform::MacOs => Err(PackError::Unsupported(
            "target framework for macOS".to_string(),
        )),
        Platform::Ios => Ok("Xamarin.iOS,v1.0"),
        Platform::TvOs => Ok("Xamarin.TVOS,v1.0"),
        Platform::WatchOs => Ok("Xamarin.WatchOS,v1.0"),
    }
}

/// Path of the app packager that embeds managed code into a framework.
pub fn app_packager(platform: Platform) -> Result<PathBuf, PackError> {
    if !platform.is_mobile() {
        return Err(PackError::Unsupported("frameworks for macOS".to_string()));
    }
    Ok(PathBuf::from(MOBILE_RUNTIME_ROOT).join("bin/mtouch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_macos_has_single_device_variant() {
        let variants = sdk_variants(Platform::MacOs);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].architectures.len(), 2);
        assert!(!variants[0].is_simulator());
        assert!(variants[0].runtime_sdk.is_none());
    }

    #[test]
    fn test_mobile_platforms_have_device_then_simulator() {
        for platform in [Platform::Ios, Platform::TvOs, Platform::WatchOs] {
            let variants = sdk_variants(platform);
            assert_eq!(variants.len(), 2, "{}", platform);
            assert!(!variants[0].is_simulator(), "{}", platform);
            assert!(variants[1].is_simulator(), "{}", platform);
            assert!(variants.iter().all(|v| v.runtime_sdk.is_some()));
        }
    }

    #[test]
    fn test_architectures_are_unique_per_platform() {
        // Per-arch output directories are shared by all variants of a platform.
        for platform in Platform::ALL {
            let mut seen = HashSet::new();
            for variant in sdk_variants(platform) {
                for arch in variant.architectures {
                    assert!(seen.insert(*arch), "{} repeats {}", platform, arch);
                }
            }
        }
    }

    #[test]
    fn test_version_min_flag() {
        let sim = &sdk_variants(Platform::TvOs)[1];
        assert_eq!(sim.version_min_flag(), "-mtvos-simulator-version-min=9.0");
    }

    #[test]
    fn test_bitcode_only_on_tv_and_watch_devices() {
        assert_eq!(sdk_variants(Platform::TvOs)[0].compiler_flags, &["-fembed-bitcode"]);
        assert_eq!(sdk_variants(Platform::WatchOs)[0].linker_flags, &["-fembed-bitcode"]);
        assert!(sdk_variants(Platform::Ios)[0].compiler_flags.is_empty());
        assert!(sdk_variants(Platform::TvOs)[1].compiler_flags.is_empty());
    }

    #[test]
    fn test_runtime_paths() {
        let mac = &sdk_variants(Platform::MacOs)[0];
        assert!(mac.runtime_include_dir().ends_with("include/mono-2.0"));
        assert_eq!(mac.runtime_link_flags().last().unwrap(), "-lmonosgen-2.0");

        let device = &sdk_variants(Platform::Ios)[0];
        assert!(
            device
                .runtime_include_dir()
                .ends_with("SDKs/MonoTouch.iphoneos.sdk/usr/include")
        );
        let flags = device.runtime_link_flags();
        assert!(flags[0].ends_with("SDKs/MonoTouch.iphoneos.sdk/usr/lib"));
        assert_eq!(flags[1], "-lxamarin");
    }

    #[test]
    fn test_macos_packaging_lookups_are_unsupported() {
        assert!(matches!(
            platform_assembly(Platform::MacOs),
            Err(PackError::Unsupported(_))
        ));
        assert!(matches!(
            target_framework(Platform::MacOs),
            Err(PackError::Unsupported(_))
        ));
        assert!(matches!(
            app_packager(Platform::MacOs),
            Err(PackError::Unsupported(_))
        ));
    }

    #[test]
    fn test_mobile_packaging_lookups() {
        assert_eq!(target_framework(Platform::WatchOs).unwrap(), "Xamarin.WatchOS,v1.0");
        assert!(
            platform_assembly(Platform::TvOs)
                .unwrap()
                .ends_with("Xamarin.TVOS/Xamarin.TVOS.dll")
        );
        assert!(app_packager(Platform::Ios).unwrap().ends_with("bin/mtouch"));
    }
}
