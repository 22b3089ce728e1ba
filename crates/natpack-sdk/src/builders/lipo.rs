//! Fat binary assembly.

use std::collections::HashSet;
use std::path::Path;

use super::common::{copy_file, ensure_dir};
use crate::process::{ProcessRunner, ToolInvocation, run_checked};
use crate::types::{BuildArtifact, PackError};

/// `xcrun lipo <inputs...> -create -output <output>`
pub fn lipo_invocation(inputs: &[BuildArtifact], output: &Path) -> ToolInvocation {
    ToolInvocation::xcrun("lipo")
        .args(inputs.iter().map(|i| i.path.as_os_str()))
        .arg("-create")
        .flag("-output", output)
}

/// Architectures of the combined binary, in input order.
///
/// Two inputs sharing an architecture cannot be combined; that means the
/// build matrix itself is inconsistent, so it is reported as an internal error.
pub fn union_architectures(inputs: &[BuildArtifact]) -> Result<Vec<String>, PackError> {
    let mut seen = HashSet::new();
    let mut architectures = Vec::new();
    for input in inputs {
        for arch in &input.architectures {
            if !seen.insert(arch.as_str()) {
                return Err(PackError::Internal(format!(
                    "architecture {} appears more than once in the inputs to {}",
                    arch,
                    input.path.display()
                )));
            }
            architectures.push(arch.clone());
        }
    }
    Ok(architectures)
}

/// Combines `inputs` into one binary at `output`.
///
/// A single input is copied byte for byte; `lipo` only runs for two or more.
pub fn create_fat_binary(
    runner: &dyn ProcessRunner,
    inputs: &[BuildArtifact],
    output: &Path,
) -> Result<BuildArtifact, PackError> {
    if inputs.is_empty() {
        return Err(PackError::Internal(format!(
            "no inputs to combine into {}",
            output.display()
        )));
    }
    let architectures = union_architectures(inputs)?;
    if let Some(parent) = output.parent() {
        ensure_dir(parent)?;
    }

    if let [single] = inputs {
        copy_file(&single.path, output)?;
    } else {
        run_checked(runner, &lipo_invocation(inputs, output))?;
    }
    Ok(BuildArtifact::new(output, architectures))
}
