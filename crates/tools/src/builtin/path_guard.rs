//! Path containment for filesystem tools, so a `read_file`/`write_file`
//! call can never escape `ctx.base_dir` via `..` or an absolute path.

use std::path::{Component, Path, PathBuf};

pub fn validate_path(base_dir: &Path, requested: &str) -> std::result::Result<PathBuf, String> {
    let requested_path = Path::new(requested);
    if requested_path.is_absolute() {
        return Err(format!(
            "absolute paths are not allowed; use a path relative to the task's base directory (got '{requested}')"
        ));
    }
    for component in requested_path.components() {
        if matches!(component, Component::ParentDir) {
            return Err("path must not contain '..' components".to_owned());
        }
    }

    std::fs::create_dir_all(base_dir).map_err(|e| e.to_string())?;
    let canonical_root = base_dir
        .canonicalize()
        .map_err(|e| format!("cannot resolve base dir '{}': {e}", base_dir.display()))?;
    let candidate = canonical_root.join(requested_path);

    let resolved = if candidate.exists() {
        candidate
            .canonicalize()
            .map_err(|e| format!("cannot resolve path '{}': {e}", candidate.display()))?
    } else {
        let mut existing = candidate.as_path();
        let mut tail_parts: Vec<&std::ffi::OsStr> = Vec::new();
        loop {
            if existing.exists() {
                break;
            }
            match existing.parent() {
                Some(parent) => {
                    if let Some(file_name) = existing.file_name() {
                        tail_parts.push(file_name);
                    }
                    existing = parent;
                }
                None => break,
            }
        }
        let mut resolved = existing
            .canonicalize()
            .map_err(|e| format!("cannot resolve ancestor of '{}': {e}", candidate.display()))?;
        for part in tail_parts.into_iter().rev() {
            resolved.push(part);
        }
        resolved
    };

    if !resolved.starts_with(&canonical_root) {
        return Err(format!(
            "path '{}' resolves outside the task's base directory",
            requested
        ));
    }
    Ok(resolved)
}
