//! # natpack
//!
//! Command-line tool that compiles generated native glue sources into
//! universal Apple libraries and frameworks.
//!
//! ## Overview
//!
//! `natpack` is the command-line front end of [`natpack_sdk`]. It handles:
//!
//! - **Building** - Compiles, links and lipos every architecture of a platform
//! - **Packaging** - Wraps managed assemblies into per-SDK and merged frameworks
//! - **Reporting** - Writes `build-report.json` describing every artifact
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter natpack.toml
//! natpack init
//!
//! # Universal dylib for macOS (the default platform and target)
//! natpack build -o out Managed.dll
//!
//! # Merged device + simulator framework for iOS, with debug info
//! natpack build -p ios --target framework -d -o out Managed.dll
//!
//! # Show the SDKs and architectures built per platform
//! natpack platforms
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `build` | Run the native build pipeline |
//! | `platforms` | Print the SDK/architecture matrix |
//! | `init` | Write a starter `natpack.toml` |
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | I/O failure, or a tool could not be started or was killed |
//! | 2 | Configuration error |
//! | 99 | Internal error |
//! | 100 | Feature not supported |
//! | other | Exit code of the failing native tool |
//!
//! ## Environment
//!
//! `.env.local` in the current directory is loaded at startup. Set
//! `NATPACK_XCODE_APP` there to pin an Xcode installation per checkout.
//! `RUST_LOG` controls log output unless `-v` is given.
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `natpack.toml`

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Builder as LogBuilder;
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};

use natpack_sdk::builders::NativeBuilder;
use natpack_sdk::platform::sdk_variants;
use natpack_sdk::report::{self, BuildReport};
use natpack_sdk::types::EXIT_FAILURE;
use natpack_sdk::{
    BuildConfig, BuildProfile, BuildResult, CompilationTarget, LibraryName, PackError, Platform,
    SystemRunner, Toolchain,
};

pub mod config;

use config::{ConfigResolver, NatpackConfig};

/// Builds universal native libraries and frameworks from generated glue sources.
#[derive(Parser, Debug)]
#[command(name = "natpack", version, about = "Native artifact build and merge pipeline", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Path to a natpack.toml (default: discovered from the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile, link and package the generated sources.
    Build(BuildArgs),
    /// Print the SDK variants and architectures built for each platform.
    Platforms {
        #[arg(long, short = 'p', value_parser = parse_platform)]
        platform: Option<Platform>,
    },
    /// Scaffold a starter natpack.toml.
    Init {
        #[arg(long, default_value = config::CONFIG_FILE_NAME)]
        output: PathBuf,
        #[arg(long, default_value = "Managed", help = "Library name written to the file")]
        library_name: String,
    },
}

#[derive(Args, Debug)]
struct BuildArgs {
    #[arg(long, short = 'p', value_parser = parse_platform, help = "Target platform: macos, ios, tvos, watchos [default: macos]")]
    platform: Option<Platform>,
    #[arg(long, value_parser = parse_target, help = "Artifact kind: shared, static, framework [default: shared]")]
    target: Option<CompilationTarget>,
    #[arg(long, short = 'd', help = "Build with debug information")]
    debug: bool,
    #[arg(long, short = 'o', help = "Directory holding the generated sources [default: .]")]
    out: Option<PathBuf>,
    #[arg(long, help = "Name of the produced library (default: stem of the first assembly)")]
    library_name: Option<String>,
    #[arg(long, help = "Compile and link the architectures of each SDK concurrently")]
    parallel: bool,
    #[arg(long, help = "Do not write build-report.json")]
    no_report: bool,
    /// Managed assemblies the sources were generated from
    #[arg(required = true, num_args = 1..)]
    assemblies: Vec<PathBuf>,
}

fn parse_platform(value: &str) -> std::result::Result<Platform, String> {
    value.parse().map_err(|e: PackError| e.to_string())
}

fn parse_target(value: &str) -> std::result::Result<CompilationTarget, String> {
    value.parse().map_err(|e: PackError| e.to_string())
}

/// Runs the CLI and returns the process exit code.
pub fn run() -> i32 {
    load_dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {:#}", err);
            exit_code(&err)
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build(args) => {
            let resolver = ConfigResolver::new(cli.config.as_deref())
                .map_err(|e| PackError::Config(format!("{:#}", e)))?;
            cmd_build(args, &resolver)
        }
        Command::Platforms { platform } => {
            cmd_platforms(platform);
            Ok(())
        }
        Command::Init {
            output,
            library_name,
        } => cmd_init(&output, &library_name),
    }
}

/// Maps an error to the process exit code of the [`PackError`] it carries.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PackError>())
        .map(PackError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}

fn init_logging(verbose: u8) {
    let mut builder = LogBuilder::from_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    let _ = builder.format_timestamp_secs().try_init();
}

fn load_dotenv() {
    if let Ok(cwd) = std::env::current_dir() {
        let _ = dotenvy::from_path(cwd.join(".env.local"));
    }
}

/// Combines CLI flags, the config file and defaults into one [`BuildConfig`].
fn resolve_build_config(args: &BuildArgs, resolver: &ConfigResolver) -> Result<BuildConfig> {
    let platform = match args.platform {
        Some(platform) => platform,
        None => config_value(resolver, |c| c.build.platform.as_deref())?
            .unwrap_or(Platform::MacOs),
    };
    let target = match args.target {
        Some(target) => target,
        None => config_value(resolver, |c| c.build.target.as_deref())?
            .unwrap_or(CompilationTarget::SharedLibrary),
    };
    let profile = if resolver.flag(args.debug, |c| c.build.debug) {
        BuildProfile::Debug
    } else {
        BuildProfile::Release
    };
    let output_dir = resolver.resolve(
        args.out.clone(),
        |_| resolver.output_dir(),
        PathBuf::from("."),
    );
    let library_name = match args
        .library_name
        .as_deref()
        .or_else(|| resolver.library_name())
    {
        Some(name) => LibraryName::new(name),
        None => {
            let first = args
                .assemblies
                .first()
                .ok_or_else(|| PackError::Config("No managed assemblies given".to_string()))?;
            LibraryName::from_assembly(first)?
        }
    };

    Ok(
        BuildConfig::new(platform, target, output_dir, library_name.as_str())
            .profile(profile)
            .assemblies(args.assemblies.clone())
            .parallel(resolver.flag(args.parallel, |c| c.build.parallel)),
    )
}

/// Toolchain pinned by `[toolchain] xcode_app`, which takes precedence over
/// `NATPACK_XCODE_APP` and `xcode-select`.
fn configured_toolchain(resolver: &ConfigResolver) -> Option<Toolchain> {
    resolver.xcode_app().map(Toolchain::new)
}

fn config_value<T, F>(resolver: &ConfigResolver, getter: F) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = PackError>,
    F: FnOnce(&NatpackConfig) -> Option<&str>,
{
    match resolver.config.as_ref().and_then(getter) {
        Some(value) => Ok(Some(value.parse()?)),
        None => Ok(None),
    }
}

fn cmd_build(args: BuildArgs, resolver: &ConfigResolver) -> Result<()> {
    if let Some(config_path) = &resolver.config_path {
        println!("Using config file: {:?}", config_path);
    }
    let build_config = resolve_build_config(&args, resolver)?;

    println!("Building native artifacts...");
    println!("  Library: {}", build_config.library_name);
    println!("  Platform: {}", build_config.platform);
    println!("  Target: {}", build_config.target);
    println!("  Profile: {}", build_config.profile.as_str());
    println!("  Output: {:?}", build_config.output_dir);

    fs::create_dir_all(&build_config.output_dir).map_err(|source| PackError::Io {
        action: format!("create output directory {:?}", build_config.output_dir),
        source,
    })?;

    let started_at = report::timestamp()?;
    let runner = SystemRunner;
    let mut builder = NativeBuilder::new(&runner);
    if let Some(toolchain) = configured_toolchain(resolver) {
        builder = builder.toolchain(toolchain);
    }
    let result = builder.build(&build_config)?;

    println!("\n✓ Build completed!");
    print_artifacts(&result);

    if !args.no_report {
        let report = BuildReport::new(&build_config, result, started_at)?;
        let path = report::write_report(&build_config.output_dir, &report)?;
        println!("  Report: {:?}", path);
    }
    Ok(())
}

fn print_artifacts(result: &BuildResult) {
    for artifact in &result.sdk_artifacts {
        println!(
            "  SDK binary: {:?} [{}]",
            artifact.path,
            artifact.architectures.join(", ")
        );
    }
    println!(
        "  Universal: {:?} [{}]",
        result.universal.path,
        result.universal.architectures.join(", ")
    );
    for framework in &result.frameworks {
        println!("  Framework: {:?}", framework.path);
    }
    if let Some(merged) = &result.merged_framework {
        println!(
            "  Merged framework: {:?} [{}]",
            merged.path,
            merged.architectures.join(", ")
        );
    }
    for dsym in &result.debug_symbols {
        println!("  Debug symbols: {:?}", dsym);
    }
}

fn format_platforms(filter: Option<Platform>) -> String {
    let mut out = String::new();
    for platform in Platform::ALL {
        if filter.is_some_and(|f| f != platform) {
            continue;
        }
        out.push_str(&format!("{}\n", platform));
        for variant in sdk_variants(platform) {
            out.push_str(&format!(
                "  {:<18} {:<10} min {:<5} {}\n",
                variant.sdk,
                if variant.is_simulator() {
                    "simulator"
                } else {
                    "device"
                },
                variant.min_version,
                variant.architectures.join(", ")
            ));
        }
    }
    out
}

fn cmd_platforms(filter: Option<Platform>) {
    print!("{}", format_platforms(filter));
}

fn ensure_can_write(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {:?}", path);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory {:?}", parent))?;
    }
    Ok(())
}

fn cmd_init(output: &Path, library_name: &str) -> Result<()> {
    ensure_can_write(output)?;
    fs::write(output, NatpackConfig::generate_starter_toml(library_name))
        .with_context(|| format!("writing file {:?}", output))?;
    println!("✓ Wrote {:?}", output);
    println!("\nNext steps:");
    println!("  1. Generate the binding sources into the configured output_dir");
    println!("  2. Edit {:?} to pick the platform and target", output);
    println!("  3. Run 'natpack build <assemblies>'");
    Ok(())
}
