//! Profile resolution: turns a profile and its ancestors into files.
//!
//! Resolution is depth-first over declared parents:
//!
//! 1. each parent (looked up in the profile's own root) is resolved and
//!    unioned into the result, unknown parents contribute nothing;
//! 2. the profile's own includes are expanded, minus its own excludes.
//!
//! A child's excludes only filter the child's own includes. Files a parent
//! contributed are never removed by a child.
//!
//! Inheritance cycles are detected with the active resolution stack and
//! reported as [`EngineError::CyclicInheritance`]. A shared ancestor reached
//! through two parents is not a cycle, and is expanded only once per
//! [`Resolver`].

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::dsl::Profile;
use crate::error::{Diagnostic, EngineError};
use crate::matcher::PatternMatcher;
use crate::registry::ProfileRegistry;

/// Files produced by a resolution request, with any diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub files: BTreeSet<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolves profiles against a registry for the duration of one request.
///
/// Pattern matchers (and the ignore rules they load) are built once per root
/// and reused for every profile resolved through this value. Each profile's
/// file set is likewise computed once and reused.
pub struct Resolver<'a> {
    registry: &'a ProfileRegistry,
    include_ignored: bool,
    matchers: HashMap<PathBuf, PatternMatcher>,
    resolved: HashMap<(PathBuf, String), BTreeSet<PathBuf>>,
    stack: Vec<(PathBuf, String)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a ProfileRegistry, include_ignored: bool) -> Self {
        Self {
            registry,
            include_ignored,
            matchers: HashMap::new(),
            resolved: HashMap::new(),
            stack: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Resolve `profile` and its ancestors into a file set.
    pub fn resolve(&mut self, profile: &Profile) -> Result<BTreeSet<PathBuf>, EngineError> {
        let key = (profile.root.clone(), profile.name.clone());
        if let Some(files) = self.resolved.get(&key) {
            trace!(profile = %profile.name, "Reusing resolved profile");
            return Ok(files.clone());
        }

        if let Some(pos) = self
            .stack
            .iter()
            .position(|(root, name)| *root == profile.root && *name == profile.name)
        {
            let mut chain: Vec<String> = self.stack[pos..]
                .iter()
                .map(|(_, name)| name.clone())
                .collect();
            chain.push(profile.name.clone());
            return Err(EngineError::CyclicInheritance { chain });
        }

        self.stack.push(key.clone());
        let result = self.resolve_unguarded(profile);
        self.stack.pop();

        let files = result?;
        self.resolved.insert(key, files.clone());
        Ok(files)
    }

    /// Resolve the live profile called `name`. An unknown name resolves to
    /// nothing and records a diagnostic.
    pub fn resolve_name(&mut self, name: &str) -> Result<BTreeSet<PathBuf>, EngineError> {
        let registry = self.registry;
        match registry.get(name) {
            Some(profile) => self.resolve(profile),
            None => {
                warn!(profile = %name, "Requested profile is not defined");
                self.report(Diagnostic::UnknownProfile {
                    name: name.to_string(),
                    referenced_by: None,
                });
                Ok(BTreeSet::new())
            }
        }
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consume the resolver, returning its diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn resolve_unguarded(&mut self, profile: &Profile) -> Result<BTreeSet<PathBuf>, EngineError> {
        let registry = self.registry;
        let mut files = BTreeSet::new();

        for parent_name in &profile.parents {
            match registry.get_in(&profile.root, parent_name) {
                Some(parent) => files.extend(self.resolve(parent)?),
                None => {
                    warn!(
                        profile = %profile.name,
                        parent = %parent_name,
                        "Skipping unknown parent profile"
                    );
                    self.report(Diagnostic::UnknownProfile {
                        name: parent_name.clone(),
                        referenced_by: Some(profile.name.clone()),
                    });
                }
            }
        }
        let inherited = files.len();

        let matcher = self.matcher(&profile.root);
        let excluded = matcher.expand(&profile.exclude_patterns);
        let included = matcher.expand(&profile.include_patterns);
        files.extend(included.into_iter().filter(|path| !excluded.contains(path)));

        debug!(
            profile = %profile.name,
            inherited,
            total = files.len(),
            excluded = excluded.len(),
            "Resolved profile"
        );
        Ok(files)
    }

    fn matcher(&mut self, root: &Path) -> &PatternMatcher {
        let include_ignored = self.include_ignored;
        self.matchers
            .entry(root.to_path_buf())
            .or_insert_with(|| PatternMatcher::new(root, include_ignored))
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }
}

/// Resolve a single profile against `registry`.
pub fn resolve(
    profile: &Profile,
    registry: &ProfileRegistry,
    include_ignored: bool,
) -> Result<Resolution, EngineError> {
    let mut resolver = Resolver::new(registry, include_ignored);
    let files = resolver.resolve(profile)?;
    Ok(Resolution {
        files,
        diagnostics: resolver.into_diagnostics(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse_profiles;
    use ctxpack_test_utils::project::TempProject;
    use pretty_assertions::assert_eq;

    fn registry_for(project: &TempProject, text: &str) -> ProfileRegistry {
        let mut registry = ProfileRegistry::new();
        registry.insert_root(project.root(), parse_profiles(text, project.root()));
        registry
    }

    fn names(project: &TempProject, files: &BTreeSet<PathBuf>) -> Vec<String> {
        files
            .iter()
            .map(|p| p.strip_prefix(project.root()).unwrap().display().to_string())
            .collect()
    }

    fn project() -> TempProject {
        TempProject::new()
            .with_file("a.js", "a")
            .with_file("b.js", "b")
            .with_file("c.js", "c")
            .with_file("lib/util.js", "u")
            .with_file("lib/util.test.js", "t")
    }

    #[test]
    fn test_child_exclusion_does_not_touch_parent_files() {
        let project = project();
        let registry = registry_for(&project, "parent{a.js b.js}\nchild: parent{ !a.js c.js }");
        let child = registry.get("child").unwrap();

        let resolution = resolve(child, &registry, false).unwrap();
        assert_eq!(names(&project, &resolution.files), vec!["a.js", "b.js", "c.js"]);
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn test_exclusion_filters_own_includes() {
        let project = project();
        let registry = registry_for(&project, "p {\nlib/\n!lib/*.test.js\n}");
        let resolution = resolve(registry.get("p").unwrap(), &registry, false).unwrap();
        assert_eq!(names(&project, &resolution.files), vec!["lib/util.js"]);
    }

    #[test]
    fn test_parent_order_does_not_change_membership() {
        let project = project();
        let registry = registry_for(
            &project,
            "p1{a.js}\np2{b.js lib/}\ncombined: p1, p2 {\n}\ncombined2: p2, p1 {\n}\n",
        );
        let one = resolve(registry.get("combined").unwrap(), &registry, false).unwrap();
        let two = resolve(registry.get("combined2").unwrap(), &registry, false).unwrap();
        assert_eq!(one.files, two.files);
        assert_eq!(one.files.len(), 4);
    }

    #[test]
    fn test_unknown_parent_is_tolerated() {
        let project = TempProject::new().with_file("f.js", "f");
        let registry = registry_for(&project, "child: nonexistent { f.js }");
        let resolution = resolve(registry.get("child").unwrap(), &registry, false).unwrap();

        assert_eq!(names(&project, &resolution.files), vec!["f.js"]);
        assert_eq!(
            resolution.diagnostics,
            vec![Diagnostic::UnknownProfile {
                name: "nonexistent".to_string(),
                referenced_by: Some("child".to_string()),
            }]
        );
    }

    #[test]
    fn test_cycle_is_an_error() {
        let project = project();
        let registry = registry_for(&project, "a: c {a.js}\nb: a {b.js}\nc: b {c.js}\n");
        let err = resolve(registry.get("a").unwrap(), &registry, false).unwrap_err();
        match err {
            EngineError::CyclicInheritance { chain } => {
                assert_eq!(chain, vec!["a", "c", "b", "a"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let project = project();
        let registry = registry_for(
            &project,
            "base{a.js}\nleft: base{b.js}\nright: base{c.js}\ntop: left, right{}\n",
        );
        let resolution = resolve(registry.get("top").unwrap(), &registry, false).unwrap();
        assert_eq!(names(&project, &resolution.files), vec!["a.js", "b.js", "c.js"]);
    }

    #[test]
    fn test_layered_diamonds_resolve_each_profile_once() {
        let project = project();
        let layers = 40;
        let mut text = String::from("l0{a.js}\n");
        for i in 1..=layers {
            let prev = i - 1;
            text.push_str(&format!("x{i}: l{prev}{{}}\ny{i}: l{prev}{{b.js}}\n"));
            text.push_str(&format!("l{i}: x{i}, y{i}{{}}\n"));
        }
        let registry = registry_for(&project, &text);

        let mut resolver = Resolver::new(&registry, false);
        let files = resolver.resolve_name(&format!("l{layers}")).unwrap();
        assert_eq!(names(&project, &files), vec!["a.js", "b.js"]);
        assert_eq!(resolver.resolved.len(), 3 * layers + 1);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let project = project();
        let registry = registry_for(&project, "p: q {lib/ !lib/util.js}\nq{*.js}");
        let profile = registry.get("p").unwrap();
        let first = resolve(profile, &registry, false).unwrap();
        let second = resolve(profile, &registry, false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parents_resolve_within_their_own_root() {
        let first = TempProject::new().with_file("one.txt", "1");
        let second = TempProject::new().with_file("two.txt", "2");

        let mut registry = ProfileRegistry::new();
        registry.insert_root(first.root(), parse_profiles("base{one.txt}", first.root()));
        registry.insert_root(
            second.root(),
            parse_profiles("child: base{two.txt}", second.root()),
        );

        let resolution = resolve(registry.get("child").unwrap(), &registry, false).unwrap();
        assert_eq!(names(&second, &resolution.files), vec!["two.txt"]);
        assert_eq!(resolution.diagnostics.len(), 1);
    }

    #[test]
    fn test_resolve_name_unknown() {
        let project = project();
        let registry = registry_for(&project, "p{a.js}");
        let mut resolver = Resolver::new(&registry, false);
        assert!(resolver.resolve_name("ghost").unwrap().is_empty());
        assert_eq!(resolver.resolve_name("p").unwrap().len(), 1);
        assert_eq!(resolver.diagnostics().len(), 1);
    }
}
