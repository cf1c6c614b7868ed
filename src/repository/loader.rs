//! Repository Loading
//!
//! Walks an OCSF source tree, parses every JSON definition and fingerprints
//! the file contents.

use std::fs;
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use super::{Repository, CATEGORIES_FILE, DICTIONARY_FILE, VERSION_FILE};
use crate::checksum::Fingerprint;
use crate::error::{CompileError, Result};

/// Top-level directories that hold definitions
const DEFINITION_DIRS: &[&str] = &["objects", "events", "profiles", "includes", "extensions"];

/// Top-level files that hold definitions
const DEFINITION_FILES: &[&str] = &[DICTIONARY_FILE, CATEGORIES_FILE, VERSION_FILE];

/// Load a repository from a filesystem directory
pub fn load_from_directory(root: &Path) -> Result<Repository> {
    if !root.is_dir() {
        return Err(CompileError::invalid(root, "repository root is not a directory"));
    }

    let mut repo = Repository::new();
    let mut fingerprint = Fingerprint::new();
    let mut files = 0usize;

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() != 1 || !e.file_type().is_dir() || is_definition_dir(e.path()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            CompileError::invalid(path, e.to_string())
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .map_err(|e| CompileError::invalid(path, e.to_string()))?;
        if entry.depth() == 1 && !is_definition_file(relative) {
            debug!("Skipping {}", relative.display());
            continue;
        }

        let content = fs::read(path)?;
        let value: serde_json::Value = serde_json::from_slice(&content).map_err(|e| {
            CompileError::invalid(relative, format!("failed to parse JSON: {}", e))
        })?;

        fingerprint.update(&super::location::posix(relative), &content);
        repo.insert_file(relative, value)?;
        files += 1;
    }

    let fingerprint = fingerprint.finish();
    info!(
        "Loaded {} definitions from {} files in {} ({})",
        repo.len(),
        files,
        root.display(),
        &fingerprint.as_str()[..12]
    );
    repo.set_fingerprint(fingerprint);
    Ok(repo)
}

fn is_definition_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| DEFINITION_DIRS.contains(&n))
        .unwrap_or(false)
}

fn is_definition_file(relative: &Path) -> bool {
    relative
        .to_str()
        .map(|p| DEFINITION_FILES.contains(&p))
        .unwrap_or(false)
}
