//! Profile registry: every loaded profile, grouped by project root.
//!
//! Roots are kept in load order. When two roots define the same name, the
//! most recently loaded root's definition is the live one for name-based
//! lookups; both stay reachable through [`ProfileRegistry::get_in`].

use std::path::{Path, PathBuf};

use crate::dsl::{Profile, ProfileSet};

/// Profiles of one root.
#[derive(Debug, Clone)]
struct RootEntry {
    root: PathBuf,
    profiles: ProfileSet,
}

/// Registry of profiles across project roots.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    roots: Vec<RootEntry>,
}

impl ProfileRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `root`'s profiles wholesale. The root becomes the most
    /// recently loaded one.
    pub fn insert_root(&mut self, root: impl Into<PathBuf>, profiles: ProfileSet) {
        let root = root.into();
        self.remove_root(&root);
        self.roots.push(RootEntry { root, profiles });
    }

    /// Drop every profile declared under `root`.
    pub fn remove_root(&mut self, root: &Path) -> Option<ProfileSet> {
        let idx = self.roots.iter().position(|e| e.root == root)?;
        Some(self.roots.remove(idx).profiles)
    }

    /// Whether `root` currently has profiles loaded.
    pub fn contains_root(&self, root: &Path) -> bool {
        self.roots.iter().any(|e| e.root == root)
    }

    /// The live profile for `name`: the last-loaded root defining it wins.
    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.roots.iter().rev().find_map(|e| e.profiles.get(name))
    }

    /// The profile `name` as declared under `root`.
    pub fn get_in(&self, root: &Path, name: &str) -> Option<&Profile> {
        self.roots
            .iter()
            .find(|e| e.root == root)
            .and_then(|e| e.profiles.get(name))
    }

    /// Whether `name` is defined under any root.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sorted, deduplicated names of all profiles.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .roots
            .iter()
            .flat_map(|e| e.profiles.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Roots with loaded profiles, in load order.
    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.roots.iter().map(|e| e.root.as_path())
    }

    /// Total number of profiles across all roots.
    pub fn len(&self) -> usize {
        self.roots.iter().map(|e| e.profiles.len()).sum()
    }

    /// Whether no profiles are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
