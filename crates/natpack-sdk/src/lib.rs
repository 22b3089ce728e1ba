//! Native artifact build and merge pipeline
//!
//! `natpack-sdk` turns the C and Objective-C glue sources written by a
//! binding generator into distributable Apple binaries: dynamic libraries,
//! static archives, or framework bundles embedding managed assemblies. It
//! builds every architecture of every SDK of a platform, combines them into
//! per-SDK and universal fat binaries, and merges device and simulator
//! frameworks into one bundle.
//!
//! # Quick Start
//!
//! ```no_run
//! use natpack_sdk::builders::NativeBuilder;
//! use natpack_sdk::process::SystemRunner;
//! use natpack_sdk::{BuildConfig, CompilationTarget, Platform};
//!
//! fn main() -> Result<(), natpack_sdk::PackError> {
//!     // `out/` already holds glib.c, mono_embeddinator.c, objc-support.m and bindings.m
//!     let config = BuildConfig::new(Platform::Ios, CompilationTarget::StaticLibrary, "out", "Managed");
//!     let result = NativeBuilder::new(&SystemRunner).build(&config)?;
//!
//!     println!("{} ({})", result.universal.path.display(), result.universal.architectures.join(", "));
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Platform**: Static table of SDK variants, architectures and flags
//! - **Process**: Structured tool invocations behind a swappable runner
//! - **Toolchain**: Xcode discovery and SDK queries
//! - **Builders**: Compile, link, lipo, framework, dSYM and merge stages
//! - **Report**: JSON summary of a finished build

// Public modules
pub mod builders;
pub mod platform;
pub mod process;
pub mod report;
pub mod toolchain;
pub mod types;

// Re-export key types for convenience
pub use builders::{NativeBuilder, PipelineStage};
pub use platform::SdkVariant;
pub use process::{ProcessRunner, SystemRunner};
pub use toolchain::Toolchain;
pub use types::{
    BuildArtifact, BuildConfig, BuildProfile, BuildResult, CompilationTarget, LibraryName,
    PackError, Platform,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
