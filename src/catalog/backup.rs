//! Backup restore and engine file deployment for scanned directories.
//!
//! Both steps run once per directory, before its files are scanned. They work on the
//! filesystem directly; the codec is not involved.

use std::{
    fs,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::Result;

/// Name of the backup directory looked for inside a scanned directory.
pub const BACKUP_DIR: &str = "orig";

/// Copy every file under `<root>/orig` over the matching path under `root`.
///
/// Subdirectory structure is preserved and missing directories are created. Returns the
/// number of files restored; a missing backup directory restores nothing.
///
/// # Errors
/// Returns [`crate::Error::FileError`] if a file cannot be copied.
pub fn restore_backup(root: &Path) -> Result<usize> {
    let orig_root = root.join(BACKUP_DIR);
    if !orig_root.is_dir() {
        return Ok(0);
    }

    log::info!(
        "[RestoreBackup] Restoring from {} to {}",
        orig_root.display(),
        root.display()
    );

    let mut restored = 0;
    for entry in WalkDir::new(&orig_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Ok(relative) = entry.path().strip_prefix(&orig_root) else {
            continue;
        };

        let destination = root.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &destination)?;
        restored += 1;
    }

    Ok(restored)
}

/// Whether `dir` is the directory the engine module lives in.
#[must_use]
pub fn is_engine_directory(dir: &Path, engine_module: &Path) -> bool {
    let Some(engine_dir) = engine_module.parent() else {
        return false;
    };

    match (fs::canonicalize(dir), fs::canonicalize(engine_dir)) {
        (Ok(lhs), Ok(rhs)) => lhs == rhs,
        _ => dir == engine_dir,
    }
}

/// Copy the engine module, its debug symbols and the replacement runtime binary into `dir`.
///
/// Debug symbols are taken from `.pdb`, or from `.mdb` when both exist. The runtime
/// binary is taken from the engine's directory, falling back to `<runtime_binary>.tmp`,
/// and always lands under its canonical name. Sources that do not exist are logged and
/// skipped. Returns the files written.
///
/// # Errors
/// Returns [`crate::Error::FileError`] if an existing source cannot be copied.
pub fn deploy_engine_files(
    dir: &Path,
    engine_module: &Path,
    runtime_binary: &str,
) -> Result<Vec<PathBuf>> {
    let mut deployed = Vec::new();

    let (Some(engine_dir), Some(engine_file)) = (engine_module.parent(), engine_module.file_name())
    else {
        return Ok(deployed);
    };

    if !engine_module.is_file() {
        log::warn!(
            "[ScanPath] Engine module {} not found on disk, not deploying",
            engine_module.display()
        );
        return Ok(deployed);
    }

    log::info!(
        "[ScanPath] Found separate game directory - copying {} and {}",
        engine_file.to_string_lossy(),
        runtime_binary
    );

    let engine_copy = dir.join(engine_file);
    fs::copy(engine_module, &engine_copy)?;
    deployed.push(engine_copy.clone());

    let symbols = ["mdb", "pdb"]
        .into_iter()
        .map(|ext| engine_module.with_extension(ext))
        .find(|candidate| candidate.is_file());
    if let Some(symbols) = symbols {
        if let Some(ext) = symbols.extension() {
            let destination = engine_copy.with_extension(ext);
            fs::copy(&symbols, &destination)?;
            deployed.push(destination);
        }
    }

    let runtime = engine_dir.join(runtime_binary);
    let runtime_tmp = engine_dir.join(format!("{}.tmp", runtime_binary));
    let source = if runtime.is_file() {
        Some(runtime)
    } else if runtime_tmp.is_file() {
        Some(runtime_tmp)
    } else {
        None
    };

    match source {
        Some(source) => {
            let destination = dir.join(runtime_binary);
            fs::copy(&source, &destination)?;
            deployed.push(destination);
        }
        None => log::warn!(
            "[ScanPath] {} not found next to the engine module, not deploying it",
            runtime_binary
        ),
    }

    Ok(deployed)
}
