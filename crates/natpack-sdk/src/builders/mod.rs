//! Build stages of the native pipeline.
//!
//! Each stage is a free function over a [`ProcessRunner`](crate::process::ProcessRunner)
//! and the immutable [`BuildConfig`](crate::BuildConfig); [`NativeBuilder`]
//! sequences them.
//!
//! | Stage | Module | Tool |
//! |-------|--------|------|
//! | Compile each source per architecture | [`compile`] | `xcrun clang -c` |
//! | Link or archive per architecture | [`link`] | `xcrun clang -dynamiclib` / `xcrun ar` |
//! | Combine architectures | [`lipo`] | `xcrun lipo` |
//! | Package a framework per SDK | [`framework`] | `mtouch` |
//! | Extract debug symbols | [`dsym`] | `xcrun dsymutil` |
//! | Merge device and simulator frameworks | [`merge`] | `xcrun lipo` |
//!
//! ## Output layout
//!
//! ```text
//! <out>/<arch>/*.o
//! <out>/<arch>/<artifact>
//! <out>/<Sdk>/<artifact>
//! <out>/<Sdk>/<Name>.framework
//! <out>/<artifact>
//! <out>/<Name>.framework
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use natpack_sdk::builders::NativeBuilder;
//! use natpack_sdk::process::SystemRunner;
//! use natpack_sdk::{BuildConfig, BuildProfile, CompilationTarget, Platform};
//!
//! let config = BuildConfig::new(Platform::TvOs, CompilationTarget::Framework, "out", "Managed")
//!     .assemblies(vec!["Managed.dll".into()])
//!     .profile(BuildProfile::Debug);
//!
//! let result = NativeBuilder::new(&SystemRunner).build(&config)?;
//! if let Some(framework) = result.merged_framework {
//!     println!("{}", framework.path.display());
//! }
//! # Ok::<(), natpack_sdk::PackError>(())
//! ```

pub mod common;
pub mod compile;
pub mod dsym;
pub mod framework;
pub mod link;
pub mod lipo;
pub mod merge;
pub mod pipeline;

pub use compile::{ArchTarget, REQUIRED_SOURCES};
pub use lipo::create_fat_binary;
pub use merge::merge_frameworks;
pub use pipeline::{NativeBuilder, PipelineStage};
