//! Path confinement
//!
//! Every path handed to the filesystem is resolved here first. Resolution
//! follows `..` segments and symlinks component by component (without
//! requiring the final components to exist), and the resolved form must
//! land inside the canonical root. Paths naming an item to mutate keep
//! their final component unresolved.

use log::warn;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::PathError;
use crate::trash::is_trash_path;

/// Upper bound on symlink hops while resolving one path.
const MAX_SYMLINK_HOPS: usize = 40;

/// A path proven to be inside the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    absolute: PathBuf,
    logical: String,
}

impl ConfinedPath {
    /// Absolute filesystem location.
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// Slash-separated path relative to the root; empty for the root itself.
    pub fn logical(&self) -> &str {
        &self.logical
    }

    pub fn is_root(&self) -> bool {
        self.logical.is_empty()
    }

    /// Logical path of the containing folder.
    pub fn parent_logical(&self) -> &str {
        parent_logical(&self.logical)
    }
}

/// Guards access to the managed root directory.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Creates a guard for an existing root directory.
    pub fn new(root: &Path) -> Result<Self, PathError> {
        let root = fs::canonicalize(root).map_err(PathError::RootUnavailable)?;
        Ok(Self { root })
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `candidate` and returns its logical path if it stays inside the root.
    ///
    /// Relative candidates are taken relative to the root.
    pub fn confine(&self, candidate: &Path) -> Result<String, PathError> {
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let resolved = resolve(&candidate, 0)?;
        match resolved.strip_prefix(&self.root) {
            Ok(relative) => Ok(to_logical(relative)),
            Err(_) => {
                warn!(
                    "Rejected path outside root: {} (resolved: {})",
                    candidate.display(),
                    resolved.display()
                );
                Err(PathError::Escapes(candidate.display().to_string()))
            }
        }
    }

    /// Confines a client-supplied logical path. The root itself is accepted.
    pub fn join(&self, logical: &str) -> Result<ConfinedPath, PathError> {
        self.join_path(Path::new(logical.trim()))
    }

    fn join_path(&self, path: &Path) -> Result<ConfinedPath, PathError> {
        let logical = self.confine(path)?;
        Ok(ConfinedPath {
            absolute: self.absolute(&logical),
            logical,
        })
    }

    /// Confines a path naming an item the caller may modify: neither the
    /// root itself nor anything inside the trash.
    ///
    /// Only the parent folder is resolved. The final component is kept as
    /// named, so a symlink addresses the link and not its target.
    pub fn join_item(&self, logical: &str) -> Result<ConfinedPath, PathError> {
        let path = Path::new(logical.trim());
        let name = match path.components().next_back() {
            Some(Component::Normal(name)) => name.to_string_lossy(),
            _ => return Err(PathError::Reserved(logical.to_string())),
        };

        let parent = self.join_path(path.parent().unwrap_or(Path::new("")))?;
        let confined = ConfinedPath {
            absolute: parent.absolute.join(name.as_ref()),
            logical: join_logical(&parent.logical, &name),
        };
        if is_trash_path(confined.logical()) {
            return Err(PathError::Reserved(logical.to_string()));
        }
        Ok(confined)
    }

    fn absolute(&self, logical: &str) -> PathBuf {
        if logical.is_empty() {
            self.root.clone()
        } else {
            self.root.join(logical)
        }
    }
}

/// Resolves `path` against the filesystem without requiring it to exist.
fn resolve(path: &Path, hops: usize) -> Result<PathBuf, PathError> {
    let mut resolved = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);

                let is_symlink = fs::symlink_metadata(&resolved)
                    .map(|meta| meta.file_type().is_symlink())
                    .unwrap_or(false);
                if !is_symlink {
                    continue;
                }

                if hops >= MAX_SYMLINK_HOPS {
                    return Err(PathError::SymlinkLoop(path.display().to_string()));
                }
                let target = fs::read_link(&resolved)
                    .map_err(|_| PathError::Escapes(path.display().to_string()))?;
                resolved.pop();
                // An absolute target replaces everything resolved so far.
                let followed = resolved.join(target);
                resolved = resolve(&followed, hops + 1)?;
            }
        }
    }

    Ok(resolved)
}

fn to_logical(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins a logical folder and an entry name.
pub fn join_logical(parent: &str, name: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Logical path of the folder containing `logical`.
pub fn parent_logical(logical: &str) -> &str {
    match logical.rfind('/') {
        Some(idx) => &logical[..idx],
        None => "",
    }
}
