//! Command handlers for the pagecite CLI.

pub mod ask;
pub mod serve;

pub use ask::AskCommand;
pub use serve::ServeCommand;

use pagecite_core::{AppError, AppResult};
use pagecite_knowledge::parser::ContentType;
use pagecite_knowledge::Assistant;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supported files under `path` paired with their document names, sorted by
/// name. Files found by walking a directory are named by their path relative
/// to it; a file named directly keeps its file name. Hidden directories are
/// skipped.
fn collect_documents(path: &Path) -> AppResult<Vec<(PathBuf, String)>> {
    if path.is_file() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::Knowledge(format!("Not a file path: {:?}", path)))?;
        return Ok(vec![(path.to_path_buf(), name)]);
    }
    if !path.exists() {
        return Err(AppError::Knowledge(format!("Path does not exist: {:?}", path)));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(path)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry
            .map_err(|e| AppError::Knowledge(format!("Failed to walk {:?}: {}", path, e)))?;
        if entry.file_type().is_file() && ContentType::from_path(entry.path()).is_supported() {
            let name = relative_name(path, entry.path());
            files.push((entry.into_path(), name));
        }
    }

    Ok(files)
}

/// `file` relative to `root`, joined with `/` on every platform.
fn relative_name(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Ingest every supported document under `paths`; returns the total chunk
/// count. Two files resolving to the same document name are rejected rather
/// than silently replacing one another.
pub async fn ingest_paths(assistant: &Assistant, paths: &[PathBuf]) -> AppResult<usize> {
    let mut total = 0;
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    for path in paths {
        let files = collect_documents(path)?;
        if files.is_empty() {
            tracing::warn!("No .txt or .md files found under {:?}", path);
        }
        for (file, name) in files {
            if let Some(previous) = seen.get(&name) {
                return Err(AppError::Knowledge(format!(
                    "Duplicate document name {:?}: {:?} and {:?}",
                    name, previous, file
                )));
            }
            let chunks = assistant.ingest_file_as(&file, &name).await?;
            tracing::info!(file = %file.display(), document = %name, chunks, "Ingested");
            total += chunks;
            seen.insert(name, file);
        }
    }

    Ok(total)
}

#[cfg(test)]
pub(crate) mod test_support;
