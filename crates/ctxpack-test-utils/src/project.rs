//! Temporary project trees.
//!
//! [`TempProject`] owns a temp directory that acts as a project root. Files,
//! directories, `.gitignore` rules and the profile file are written through
//! a fluent builder.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Profile file name used by the default configuration.
pub const PROFILE_FILE: &str = ".ctxprofiles";

/// A test-scoped project root.
///
/// The directory is deleted when this value is dropped, guaranteeing
/// cleanup even on panic.
pub struct TempProject {
    dir: TempDir,
}

impl TempProject {
    /// Create an empty project root.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Absolute path of the project root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `relative` under the root (need not exist).
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write a file, creating parent directories.
    pub fn with_file(self, relative: &str, content: &str) -> Self {
        self.write_file(relative, content);
        self
    }

    /// Create an (empty) directory.
    pub fn with_dir(self, relative: &str) -> Self {
        std::fs::create_dir_all(self.path(relative)).expect("failed to create test dir");
        self
    }

    /// Write the profile file.
    pub fn with_profiles(self, text: &str) -> Self {
        self.write_profiles(text);
        self
    }

    /// Write the root `.gitignore`.
    pub fn with_gitignore(self, rules: &str) -> Self {
        self.write_file(".gitignore", rules);
        self
    }

    /// Overwrite a file in place (for reload testing).
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("failed to write test file");
    }

    /// Overwrite the profile file (for reload testing).
    pub fn write_profiles(&self, text: &str) {
        self.write_file(PROFILE_FILE, text);
    }
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}
