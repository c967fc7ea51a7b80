//! Idempotent patching of the host project's package manifest.
//!
//! The manifest is a JSON file with a `"dependencies"` object. Patching is
//! textual: the new entry is spliced in right after the object's opening
//! brace and the file is rewritten whole. Every byte outside the inserted
//! entry is preserved.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from manifest inspection and patching.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No manifest file at the given path.
    #[error("manifest not found at {path}")]
    NotFound {
        /// Where the manifest was expected.
        path: PathBuf,
    },

    /// The manifest has no `"dependencies"` object to patch.
    #[error("manifest at {path} has no dependencies object")]
    MissingDependencies {
        /// The manifest that was inspected.
        path: PathBuf,
    },

    /// Reading or writing the manifest failed.
    #[error("manifest I/O failed at {path}: {source}")]
    Io {
        /// The manifest that was accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result of an [`ensure_dependency`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The entry was inserted and the file rewritten.
    Added,
    /// The identifier was already present; the file was not touched.
    AlreadyPresent,
}

fn read_manifest(path: &Path) -> Result<String, ManifestError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ManifestError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ManifestError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Check whether `id` already appears in the manifest.
///
/// Uses the same quoted-substring rule as [`ensure_dependency`], so a
/// positive answer means a patch would be a no-op.
pub fn contains_dependency(path: &Path, id: &str) -> Result<bool, ManifestError> {
    let content = read_manifest(path)?;
    Ok(content.contains(&format!("\"{}\"", id)))
}

/// Ensure the manifest lists `id` with the given source.
///
/// Inserts a comma-terminated `"id": "source"` member directly after the
/// `"dependencies"` opening brace and rewrites the file. If the quoted
/// identifier already appears anywhere in the manifest the call is a no-op
/// and the file is left byte-identical, so patching twice converges.
///
/// # Example
///
/// ```rust,no_run
/// use relaykit_bootstrap::{ensure_dependency, PatchOutcome};
/// use std::path::Path;
///
/// let manifest = Path::new("Packages/manifest.json");
/// let outcome = ensure_dependency(
///     manifest,
///     "com.relaykit.core",
///     "https://github.com/relaykit/relaykit-core.git",
/// )?;
/// assert!(matches!(outcome, PatchOutcome::Added | PatchOutcome::AlreadyPresent));
/// # Ok::<(), relaykit_bootstrap::ManifestError>(())
/// ```
pub fn ensure_dependency(path: &Path, id: &str, source: &str) -> Result<PatchOutcome, ManifestError> {
    let content = read_manifest(path)?;

    if content.contains(&format!("\"{}\"", id)) {
        debug!(id, "dependency already present, leaving manifest untouched");
        return Ok(PatchOutcome::AlreadyPresent);
    }

    let key_pos = content
        .find("\"dependencies\"")
        .ok_or_else(|| ManifestError::MissingDependencies {
            path: path.to_path_buf(),
        })?;
    let brace_pos = content[key_pos..]
        .find('{')
        .map(|offset| key_pos + offset)
        .ok_or_else(|| ManifestError::MissingDependencies {
            path: path.to_path_buf(),
        })?;

    let after_brace = &content[brace_pos + 1..];
    let object_is_empty = after_brace
        .chars()
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| c == '}');

    // A trailing comma is only valid when another member follows.
    let mut patched = String::with_capacity(content.len() + id.len() + source.len() + 16);
    patched.push_str(&content[..brace_pos + 1]);
    if object_is_empty {
        let close_pos = brace_pos
            + 1
            + after_brace.find('}').expect("checked above that a brace follows");
        patched.push_str(&format!("\n    \"{}\": \"{}\"\n  ", id, source));
        patched.push_str(&content[close_pos..]);
    } else {
        patched.push_str(&format!("\n    \"{}\": \"{}\",", id, source));
        patched.push_str(&content[brace_pos + 1..]);
    }

    std::fs::write(path, &patched).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(id, manifest = %path.display(), "dependency added");
    Ok(PatchOutcome::Added)
}
