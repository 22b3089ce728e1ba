//! Device + simulator framework merge.
//!
//! Every file present in either bundle ends up in the merged bundle. The
//! top-level executable is combined with lipo; for any other relative path
//! found in both bundles the device copy wins.

use std::path::Path;

use super::common::{collect_files, copy_file, ensure_dir, remove_dir_if_exists};
use super::lipo::create_fat_binary;
use crate::process::ProcessRunner;
use crate::types::{BuildArtifact, LibraryName, PackError};

/// Merges `device` and `simulator` bundles into `output`.
///
/// An existing bundle at `output` is removed first.
pub fn merge_frameworks(
    runner: &dyn ProcessRunner,
    name: &LibraryName,
    device: &BuildArtifact,
    simulator: &BuildArtifact,
    output: &Path,
) -> Result<BuildArtifact, PackError> {
    for bundle in [device, simulator] {
        if !bundle.path.is_dir() {
            return Err(PackError::Internal(format!(
                "framework {} to merge does not exist",
                bundle.path.display()
            )));
        }
    }
    remove_dir_if_exists(output)?;
    ensure_dir(output)?;

    let executable = Path::new(name.as_str());
    let fat = create_fat_binary(
        runner,
        &[
            BuildArtifact::new(device.path.join(executable), device.architectures.clone()),
            BuildArtifact::new(
                simulator.path.join(executable),
                simulator.architectures.clone(),
            ),
        ],
        &output.join(executable),
    )?;

    for relative in collect_files(&device.path)? {
        if relative == executable {
            continue;
        }
        copy_file(&device.path.join(&relative), &output.join(&relative))?;
    }

    for relative in collect_files(&simulator.path)? {
        let dest = output.join(&relative);
        if relative == executable || dest.exists() {
            continue;
        }
        copy_file(&simulator.path.join(&relative), &dest)?;
    }

    log::info!("Merged {} and {} into {}", device.path.display(), simulator.path.display(), output.display());
    Ok(BuildArtifact::new(output, fat.architectures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::RecordingRunner;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn bundle(root: &Path, files: &[(&str, &str)], archs: &[&str]) -> BuildArtifact {
        for (rel, contents) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        BuildArtifact::new(root, archs.iter().map(|a| a.to_string()).collect())
    }

    #[test]
    fn test_device_wins_and_simulator_fills_gaps() {
        let temp = TempDir::new().unwrap();
        let device = bundle(
            &temp.path().join("iPhoneOS/M.framework"),
            &[("M", "dev-exe"), ("A", "dev-a"), ("B", "dev-b"), ("Headers/C.h", "dev-c")],
            &["arm64"],
        );
        let simulator = bundle(
            &temp.path().join("iPhoneSimulator/M.framework"),
            &[("M", "sim-exe"), ("B", "sim-b"), ("D", "sim-d")],
            &["x86_64"],
        );
        let output = temp.path().join("M.framework");
        let runner = RecordingRunner::simulating();

        let merged = merge_frameworks(&runner, &LibraryName::new("M"), &device, &simulator, &output).unwrap();

        assert_eq!(
            collect_files(&output).unwrap(),
            vec![
                PathBuf::from("A"),
                PathBuf::from("B"),
                PathBuf::from("D"),
                PathBuf::from("Headers/C.h"),
                PathBuf::from("M"),
            ]
        );
        assert_eq!(fs::read_to_string(output.join("B")).unwrap(), "dev-b");
        assert_eq!(fs::read_to_string(output.join("D")).unwrap(), "sim-d");
        assert_eq!(fs::read_to_string(output.join("M")).unwrap(), "dev-exesim-exe");
        assert_eq!(merged.architectures, vec!["arm64", "x86_64"]);
        assert_eq!(runner.tools(), vec!["lipo"]);
    }

    #[test]
    fn test_nested_file_named_like_executable_is_copied() {
        let temp = TempDir::new().unwrap();
        let device = bundle(
            &temp.path().join("dev/M.framework"),
            &[("M", "d"), ("Resources/M", "nested-dev")],
            &["arm64"],
        );
        let simulator = bundle(&temp.path().join("sim/M.framework"), &[("M", "s")], &["i386"]);
        let output = temp.path().join("M.framework");

        merge_frameworks(
            &RecordingRunner::simulating(),
            &LibraryName::new("M"),
            &device,
            &simulator,
            &output,
        )
        .unwrap();
        assert_eq!(fs::read_to_string(output.join("Resources/M")).unwrap(), "nested-dev");
    }

    #[test]
    fn test_stale_output_is_removed() {
        let temp = TempDir::new().unwrap();
        let device = bundle(&temp.path().join("dev/M.framework"), &[("M", "d")], &["arm64"]);
        let simulator = bundle(&temp.path().join("sim/M.framework"), &[("M", "s")], &["x86_64"]);
        let output = temp.path().join("M.framework");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("Old.h"), "").unwrap();

        merge_frameworks(
            &RecordingRunner::simulating(),
            &LibraryName::new("M"),
            &device,
            &simulator,
            &output,
        )
        .unwrap();
        assert!(!output.join("Old.h").exists());
    }

    #[test]
    fn test_missing_bundle_is_internal_error() {
        let temp = TempDir::new().unwrap();
        let device = bundle(&temp.path().join("dev/M.framework"), &[("M", "d")], &["arm64"]);
        let simulator = BuildArtifact::single(temp.path().join("missing"), "x86_64");
        let err = merge_frameworks(
            &RecordingRunner::succeeding(),
            &LibraryName::new("M"),
            &device,
            &simulator,
            &temp.path().join("out"),
        )
        .unwrap_err();
        assert!(matches!(err, PackError::Internal(_)));
    }
}
