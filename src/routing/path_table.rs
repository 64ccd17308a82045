//! Path table: exact and prefix bindings with lock-free lookup.
//!
//! # Responsibilities
//! - Bind a value under a (path, match policy) pair
//! - Resolve a request path to its binding
//! - Remove bindings
//!
//! # Design Decisions
//! - Readers load an immutable snapshot through `ArcSwap`; they never block
//! - Writers are serialized by a mutex, copy the snapshot, and publish it
//! - Each binding is one `Arc`, so a reader sees the old pair or the new
//!   pair, never a mix
//! - Exact beats prefix for the same literal path; longest prefix wins

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use super::matcher::{normalize, prefix_matches, MatchPolicy};

/// A value bound to a path.
#[derive(Debug)]
pub struct Bound<V> {
    /// Normalized bound path.
    pub path: String,
    pub policy: MatchPolicy,
    pub value: V,
}

#[derive(Debug)]
struct Snapshot<V> {
    exact: HashMap<String, Arc<Bound<V>>>,
    /// Sorted by path length, longest first.
    prefix: Vec<Arc<Bound<V>>>,
}

impl<V> Clone for Snapshot<V> {
    fn clone(&self) -> Self {
        Self {
            exact: self.exact.clone(),
            prefix: self.prefix.clone(),
        }
    }
}

impl<V> Default for Snapshot<V> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            prefix: Vec::new(),
        }
    }
}

/// Concurrent path → value table.
#[derive(Debug)]
pub struct PathTable<V> {
    current: ArcSwap<Snapshot<V>>,
    writer: Mutex<()>,
}

impl<V> PathTable<V> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
            writer: Mutex::new(()),
        }
    }

    /// Bind `value` under `path`. Replaces any binding for the same
    /// (path, policy) and returns it.
    pub fn bind(&self, path: &str, policy: MatchPolicy, value: V) -> Option<Arc<Bound<V>>> {
        let path = normalize(path);
        let bound = Arc::new(Bound {
            path: path.clone(),
            policy,
            value,
        });

        self.update(|snapshot| match policy {
            MatchPolicy::Exact => snapshot.exact.insert(path, bound),
            MatchPolicy::Prefix => {
                let previous = snapshot
                    .prefix
                    .iter()
                    .position(|b| b.path == path)
                    .map(|idx| snapshot.prefix.remove(idx));
                let at = snapshot
                    .prefix
                    .iter()
                    .position(|b| b.path.len() < path.len())
                    .unwrap_or(snapshot.prefix.len());
                snapshot.prefix.insert(at, bound);
                previous
            }
        })
    }

    /// Remove the binding for (path, policy). No-op if absent.
    pub fn unbind(&self, path: &str, policy: MatchPolicy) -> Option<Arc<Bound<V>>> {
        let path = normalize(path);
        if self.get(&path, policy).is_none() {
            return None;
        }
        self.update(|snapshot| match policy {
            MatchPolicy::Exact => snapshot.exact.remove(&path),
            MatchPolicy::Prefix => snapshot
                .prefix
                .iter()
                .position(|b| b.path == path)
                .map(|idx| snapshot.prefix.remove(idx)),
        })
    }

    /// Resolve a request path. The path is normalized the same way bound
    /// paths are, so `/a/` and `/a` resolve alike.
    pub fn lookup(&self, path: &str) -> Option<Arc<Bound<V>>> {
        let path = normalize(path);
        let path = path.as_str();
        let snapshot = self.current.load();
        if let Some(bound) = snapshot.exact.get(path) {
            return Some(bound.clone());
        }
        snapshot
            .prefix
            .iter()
            .find(|b| prefix_matches(&b.path, path))
            .cloned()
    }

    /// The binding registered for exactly (path, policy), if any.
    pub fn get(&self, path: &str, policy: MatchPolicy) -> Option<Arc<Bound<V>>> {
        let path = normalize(path);
        let snapshot = self.current.load();
        match policy {
            MatchPolicy::Exact => snapshot.exact.get(&path).cloned(),
            MatchPolicy::Prefix => snapshot.prefix.iter().find(|b| b.path == path).cloned(),
        }
    }

    /// All bindings, exact first then prefix (longest first).
    pub fn bindings(&self) -> Vec<Arc<Bound<V>>> {
        let snapshot = self.current.load();
        let mut exact: Vec<_> = snapshot.exact.values().cloned().collect();
        exact.sort_by(|a, b| a.path.cmp(&b.path));
        exact.extend(snapshot.prefix.iter().cloned());
        exact
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        let snapshot = self.current.load();
        snapshot.exact.len() + snapshot.prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update<R>(&self, f: impl FnOnce(&mut Snapshot<V>) -> R) -> R {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = Snapshot::clone(&self.current.load_full());
        let result = f(&mut next);
        self.current.store(Arc::new(next));
        result
    }
}

impl<V> Default for PathTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
