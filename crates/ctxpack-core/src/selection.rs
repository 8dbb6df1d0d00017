//! Host-visible selection of active profiles.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::registry::ProfileRegistry;

/// What a resolution request covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "profiles", rename_all = "snake_case")]
pub enum Selection {
    /// The union of the named profiles.
    Profiles(BTreeSet<String>),
    /// Every file under every loaded root, ignoring profiles.
    AllFiles,
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Profiles(BTreeSet::new())
    }
}

impl Selection {
    /// Select the given profile names. Blank names are dropped.
    pub fn profiles<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Selection::Profiles(
            names
                .into_iter()
                .map(|n| n.as_ref().trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
        )
    }

    /// Build a selection from host text such as `"web, api docs"`.
    ///
    /// Names are separated by commas or whitespace.
    pub fn parse_names(input: &str) -> Self {
        Self::profiles(input.split(|c: char| c == ',' || c.is_whitespace()))
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Profiles(names) if names.is_empty())
    }

    /// Drop names no longer defined in `registry` (for example after a
    /// reload) and return them.
    pub fn retain_known(&mut self, registry: &ProfileRegistry) -> Vec<String> {
        let Selection::Profiles(names) = self else {
            return Vec::new();
        };
        let missing: Vec<String> = names
            .iter()
            .filter(|name| !registry.contains(name))
            .cloned()
            .collect();
        for name in &missing {
            names.remove(name);
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse_profiles;
    use std::path::Path;

    #[test]
    fn test_profiles_trims_and_dedups() {
        let selection = Selection::profiles([" web ", "web", "", "api"]);
        assert_eq!(
            selection,
            Selection::Profiles(["api".to_string(), "web".to_string()].into())
        );
        assert!(!selection.is_empty());
        assert!(Selection::default().is_empty());
        assert!(!Selection::AllFiles.is_empty());
    }

    #[test]
    fn test_parse_names_splits_on_commas_and_spaces() {
        assert_eq!(
            Selection::parse_names("web, api  docs,,"),
            Selection::profiles(["api", "docs", "web"])
        );
        assert!(Selection::parse_names(" , ").is_empty());
    }

    #[test]
    fn test_retain_known_drops_vanished_profiles() {
        let mut registry = ProfileRegistry::new();
        registry.insert_root("/p", parse_profiles("web{src/}", Path::new("/p")));

        let mut selection = Selection::profiles(["web", "gone"]);
        let removed = selection.retain_known(&registry);
        assert_eq!(removed, vec!["gone"]);
        assert_eq!(selection, Selection::profiles(["web"]));
    }

    #[test]
    fn test_retain_known_keeps_all_files() {
        let registry = ProfileRegistry::new();
        let mut selection = Selection::AllFiles;
        assert!(selection.retain_known(&registry).is_empty());
        assert_eq!(selection, Selection::AllFiles);
    }
}
