//! Advisory path locks
//!
//! Mutating operations hold a lock on every logical path they touch for
//! their whole duration. Two locks conflict when one path equals or
//! contains the other; the empty path is the root and conflicts with
//! everything.

use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct PathLocks {
    held: Mutex<Vec<String>>,
    released: Condvar,
}

/// Releases its paths when dropped.
#[derive(Debug)]
pub struct PathLockGuard<'a> {
    locks: &'a PathLocks,
    paths: Vec<String>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until none of `paths` overlaps a held path, then takes them all.
    pub fn acquire<I, S>(&self, paths: I) -> PathLockGuard<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let wanted: Vec<String> = paths
            .into_iter()
            .map(|p| p.into().trim_matches('/').to_string())
            .collect();

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while wanted
            .iter()
            .any(|w| held.iter().any(|h| overlaps(w, h)))
        {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.extend(wanted.iter().cloned());

        PathLockGuard {
            locks: self,
            paths: wanted,
        }
    }

    /// Number of paths currently held.
    pub fn held_count(&self) -> usize {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for PathLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for path in &self.paths {
            if let Some(idx) = held.iter().position(|h| h == path) {
                held.swap_remove(idx);
            }
        }
        self.locks.released.notify_all();
    }
}

fn overlaps(a: &str, b: &str) -> bool {
    a.is_empty() || b.is_empty() || a == b || is_inside(a, b) || is_inside(b, a)
}

fn is_inside(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}
