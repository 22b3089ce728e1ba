//! Filesystem helpers shared by the pipeline stages.
//!
//! Every function wraps its I/O failure in [`PackError::Io`] naming the
//! path involved, so a failed stage reports what it was trying to touch.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::PackError;

/// Creates `dir` and all of its parents.
pub fn ensure_dir(dir: &Path) -> Result<(), PackError> {
    fs::create_dir_all(dir).map_err(PackError::io(format!(
        "create directory {}",
        dir.display()
    )))
}

/// Copies `src` to `dest`, creating the destination's parent and
/// overwriting any existing file.
pub fn copy_file(src: &Path, dest: &Path) -> Result<(), PackError> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(src, dest).map_err(PackError::io(format!(
        "copy {} to {}",
        src.display(),
        dest.display()
    )))?;
    Ok(())
}

/// Removes the directory tree at `dir` if it exists.
pub fn remove_dir_if_exists(dir: &Path) -> Result<(), PackError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(PackError::io(format!("remove {}", dir.display())))?;
    }
    Ok(())
}

/// Removes the file at `path` if it exists.
pub fn remove_file_if_exists(path: &Path) -> Result<(), PackError> {
    if path.exists() {
        fs::remove_file(path).map_err(PackError::io(format!("remove {}", path.display())))?;
    }
    Ok(())
}

/// Recursively copies a directory.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), PackError> {
    ensure_dir(dest)?;
    for entry in read_dir_sorted(src)? {
        let dest_path = dest.join(entry.file_name().unwrap_or_default());
        if entry.is_dir() {
            copy_dir_recursive(&entry, &dest_path)?;
        } else {
            copy_file(&entry, &dest_path)?;
        }
    }
    Ok(())
}

/// Moves the directory `src` to `dest`, replacing anything already at `dest`.
///
/// Falls back to copy-and-delete when a rename is not possible (e.g. across
/// filesystems).
pub fn move_dir(src: &Path, dest: &Path) -> Result<(), PackError> {
    remove_dir_if_exists(dest)?;
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    if let Err(err) = fs::rename(src, dest) {
        log::warn!(
            "rename {} -> {} failed ({}), copying instead",
            src.display(),
            dest.display(),
            err
        );
        copy_dir_recursive(src, dest)?;
        remove_dir_if_exists(src)?;
    }
    Ok(())
}

/// Lists every regular file below `root`, as paths relative to `root`, in sorted order.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>, PackError> {
    let mut files = Vec::new();
    collect_into(root, Path::new(""), &mut files)?;
    Ok(files)
}

fn collect_into(dir: &Path, relative: &Path, files: &mut Vec<PathBuf>) -> Result<(), PackError> {
    for entry in read_dir_sorted(dir)? {
        let Some(name) = entry.file_name() else {
            continue;
        };
        let rel = relative.join(name);
        if entry.is_dir() {
            collect_into(&entry, &rel, files)?;
        } else {
            files.push(rel);
        }
    }
    Ok(())
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, PackError> {
    let action = || format!("read directory {}", dir.display());
    let mut entries = fs::read_dir(dir)
        .map_err(PackError::io(action()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(PackError::io(action()))?;
    entries.sort();
    Ok(entries)
}

/// Lists the files directly in `dir` whose extension is `ext`, sorted by name.
pub fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, PackError> {
    Ok(read_dir_sorted(dir)?
        .into_iter()
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == ext))
        .collect())
}

/// Makes `path` absolute against the current directory without touching the filesystem.
pub fn absolute(path: &Path) -> Result<PathBuf, PackError> {
    std::path::absolute(path).map_err(PackError::io(format!(
        "resolve absolute path of {}",
        path.display()
    )))
}
