//! Host-facing engine API.
//!
//! [`Engine`] owns the profile registry and the set of known project roots.
//! A host loads roots, calls [`Engine::invalidate_root`] when its file
//! watcher sees a profile file change, and resolves selections on demand.
//! All calls are synchronous; a host that wants them off its main thread
//! runs them on a worker. Access must be serialized by the host.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ctxpack_config::AppConfig;
use tracing::{debug, info, warn};

use crate::dsl::{self, Profile};
use crate::error::EngineError;
use crate::matcher::PatternMatcher;
use crate::registry::ProfileRegistry;
use crate::render::{RenderResult, Renderer};
use crate::resolver::{Resolution, Resolver};
use crate::selection::Selection;

/// A project root known to the engine.
#[derive(Debug, Clone)]
struct RootState {
    path: PathBuf,
    /// The profile file has been read since the last invalidation.
    loaded: bool,
    /// The last read found a profile file.
    has_profiles: bool,
}

/// Profile registry plus the roots it was loaded from.
#[derive(Debug)]
pub struct Engine {
    config: AppConfig,
    registry: ProfileRegistry,
    roots: Vec<RootState>,
}

impl Engine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: ProfileRegistry::new(),
            roots: Vec::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Known roots, in the order they were first loaded.
    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.roots.iter().map(|r| r.path.as_path())
    }

    /// Location of `root`'s profile file.
    pub fn profile_path(&self, root: &Path) -> PathBuf {
        root.join(&self.config.engine.profile_file)
    }

    /// Parse `root`'s profile file, if present, into the registry.
    ///
    /// Returns whether a profile file was found. Repeated calls are no-ops
    /// until the root is invalidated. On failure the root stays known (for
    /// all-files selections) and the registry is left untouched.
    pub fn load_root(&mut self, root: impl Into<PathBuf>) -> Result<bool, EngineError> {
        let root = root.into();
        if let Some(state) = self.roots.iter().find(|r| r.path == root)
            && state.loaded
        {
            return Ok(state.has_profiles);
        }

        let path = self.profile_path(&root);
        let outcome = dsl::load_profile_file(&path, &root);
        let state = self.state_mut(&root);

        match outcome {
            Ok(Some(profiles)) => {
                info!(
                    root = %root.display(),
                    profiles = profiles.len(),
                    "Loaded profiles"
                );
                state.loaded = true;
                state.has_profiles = true;
                self.registry.insert_root(root, profiles);
                Ok(true)
            }
            Ok(None) => {
                debug!(root = %root.display(), "No profile file found");
                state.loaded = true;
                state.has_profiles = false;
                self.registry.remove_root(&root);
                Ok(false)
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Failed to load profiles");
                Err(e)
            }
        }
    }

    /// Drop `root`'s profiles so the next [`Engine::load_root`] rereads
    /// the profile file.
    pub fn invalidate_root(&mut self, root: &Path) {
        if self.registry.remove_root(root).is_some() {
            debug!(root = %root.display(), "Invalidated profiles");
        }
        if let Some(state) = self.roots.iter_mut().find(|r| r.path == root) {
            state.loaded = false;
            state.has_profiles = false;
        }
    }

    /// Invalidate and immediately reload `root`.
    pub fn reload_root(&mut self, root: &Path) -> Result<bool, EngineError> {
        self.invalidate_root(root);
        self.load_root(root)
    }

    /// Forget `root` entirely, including for all-files selections.
    /// Returns whether the root was known.
    pub fn unload_root(&mut self, root: &Path) -> bool {
        self.registry.remove_root(root);
        let before = self.roots.len();
        self.roots.retain(|r| r.path != root);
        before != self.roots.len()
    }

    /// Sorted names of every loaded profile.
    pub fn list_profile_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// The live profile called `name`.
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.registry.get(name)
    }

    /// Resolve a selection into a file set.
    ///
    /// Named profiles are resolved against their own roots and unioned.
    /// [`Selection::AllFiles`] walks every known root, applying the
    /// configured exclude globs and ignore rules.
    pub fn resolve_selection(&self, selection: &Selection) -> Result<Resolution, EngineError> {
        let include_ignored = self.config.engine.include_git_ignored;

        let resolution = match selection {
            Selection::AllFiles => {
                let mut files = BTreeSet::new();
                for root in self.roots() {
                    let matcher = PatternMatcher::new(root, include_ignored)
                        .with_excludes(&self.config.engine.exclude_patterns);
                    files.extend(matcher.all_files());
                }
                Resolution {
                    files,
                    diagnostics: Vec::new(),
                }
            }
            Selection::Profiles(names) => {
                let mut resolver = Resolver::new(&self.registry, include_ignored);
                let mut files = BTreeSet::new();
                for name in names {
                    files.extend(resolver.resolve_name(name)?);
                }
                Resolution {
                    files,
                    diagnostics: resolver.into_diagnostics(),
                }
            }
        };

        info!(
            files = resolution.files.len(),
            diagnostics = resolution.diagnostics.len(),
            "Resolved selection"
        );
        Ok(resolution)
    }

    /// A renderer configured from `[render]`, shortening paths against the
    /// known roots.
    pub fn renderer(&self) -> Renderer {
        Renderer::new(self.config.render.clone()).with_roots(self.roots())
    }

    /// Render `files` in the given order.
    pub fn render(&self, files: &[PathBuf]) -> RenderResult {
        self.renderer().render(files)
    }

    fn state_mut(&mut self, root: &Path) -> &mut RootState {
        let idx = match self.roots.iter().position(|r| r.path == root) {
            Some(idx) => idx,
            None => {
                self.roots.push(RootState {
                    path: root.to_path_buf(),
                    loaded: false,
                    has_profiles: false,
                });
                self.roots.len() - 1
            }
        };
        &mut self.roots[idx]
    }
}
