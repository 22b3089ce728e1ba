//! External tool execution.
//!
//! Builders never spawn processes directly. They describe each invocation as
//! a [`ToolInvocation`] and hand it to a [`ProcessRunner`], which makes the
//! argument lists testable without a toolchain installed.

use crate::types::PackError;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::process::Command;

/// A program plus its argument list.
///
/// # Example
///
/// ```
/// use natpack_sdk::process::ToolInvocation;
///
/// let inv = ToolInvocation::xcrun("lipo")
///     .arg("a.dylib")
///     .arg("b.dylib")
///     .args(["-create", "-output", "fat.dylib"]);
/// assert_eq!(inv.tool_name(), "lipo");
/// assert_eq!(inv.to_string(), "xcrun lipo a.dylib b.dylib -create -output fat.dylib");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    program: OsString,
    args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    /// Invocation of a developer tool through `xcrun`.
    pub fn xcrun(tool: &str) -> Self {
        Self::new("xcrun").arg(tool)
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Appends `flag` followed by `value` as two separate arguments.
    pub fn flag(self, flag: &str, value: impl AsRef<OsStr>) -> Self {
        self.arg(flag).arg(value)
    }

    /// Appends `prefix` and `path` joined into a single argument, e.g. `--gcc_flags=-force_load /x.a`.
    pub fn joined(self, prefix: &str, path: &Path) -> Self {
        let mut joined = OsString::from(prefix);
        joined.push(path.as_os_str());
        self.arg(joined)
    }

    /// Arguments as UTF-8 strings (lossy), for assertions and logging.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Human-readable tool name: the wrapped tool for `xcrun`, otherwise the program's file name.
    pub fn tool_name(&self) -> String {
        let program = Path::new(&self.program);
        let base = program
            .file_name()
            .unwrap_or(program.as_os_str())
            .to_string_lossy()
            .into_owned();
        if base == "xcrun"
            && let Some(first) = self.args.first()
            && !first.to_string_lossy().starts_with('-')
        {
            return first.to_string_lossy().into_owned();
        }
        base
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains([' ', '\'', '"', ',', '$']) {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", quote(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external tools synchronously.
///
/// Implementations must be shareable across the per-architecture worker
/// threads the pipeline spawns in parallel mode.
pub trait ProcessRunner: Send + Sync {
    /// Runs `invocation` to completion.
    ///
    /// Returns `Err` only if the tool could not be started; a non-zero exit
    /// is reported through [`ProcessOutput::code`].
    fn run(&self, invocation: &ToolInvocation) -> Result<ProcessOutput, PackError>;
}

/// Runs tools as child processes of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ProcessOutput, PackError> {
        log::debug!("  {}", invocation);
        let output = invocation
            .to_command()
            .output()
            .map_err(|source| PackError::ToolSpawn {
                tool: invocation.tool_name(),
                source,
            })?;
        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs `invocation` and converts a non-zero exit into [`PackError::ToolFailed`].
pub fn run_checked(
    runner: &dyn ProcessRunner,
    invocation: &ToolInvocation,
) -> Result<ProcessOutput, PackError> {
    let output = runner.run(invocation)?;
    match output.code {
        Some(0) => {
            for text in [&output.stdout, &output.stderr] {
                if !text.trim().is_empty() {
                    log::debug!("{}: {}", invocation.tool_name(), text.trim());
                }
            }
            Ok(output)
        }
        Some(code) => Err(PackError::ToolFailed {
            tool: invocation.tool_name(),
            code,
            stdout: output.stdout,
            stderr: output.stderr,
        }),
        None => Err(PackError::ToolTerminated {
            tool: invocation.tool_name(),
        }),
    }
}
