//! Profile DSL parser.
//!
//! A profile file is line-oriented:
//!
//! ```text
//! # comment
//! base {
//!     src/
//!     README.md
//! }
//! web: base, assets {
//!     web/**/*.ts
//!     !web/**/*.test.ts
//! }
//! tiny{Cargo.toml}
//! ```
//!
//! The parser is a two-state line scanner (outside a block, inside a block).
//! It never rejects input: lines it cannot classify are either patterns
//! (inside a block) or ignored (outside).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::EngineError;

/// A named, inheritable list of include and exclude patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: String,
    /// Parent profile names, in declared order.
    pub parents: Vec<String>,
    pub include_patterns: Vec<String>,
    /// Exclude patterns, stored without the leading `!`.
    pub exclude_patterns: Vec<String>,
    /// Project root the profile was declared under.
    pub root: PathBuf,
}

impl Profile {
    /// Create an empty profile under `root`.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            root: root.into(),
        }
    }

    /// Add a parent name (builder style).
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Add an include pattern (builder style).
    pub fn with_include(mut self, pattern: impl Into<String>) -> Self {
        self.include_patterns.push(pattern.into());
        self
    }

    /// Add an exclude pattern, without the `!` marker (builder style).
    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Record a pattern line: `!` routes it to the exclude list.
    fn push_pattern(&mut self, text: &str) {
        if let Some(rest) = text.strip_prefix('!') {
            let rest = rest.trim();
            if !rest.is_empty() {
                self.exclude_patterns.push(rest.to_string());
            }
        } else {
            self.include_patterns.push(text.to_string());
        }
    }
}

/// Profiles parsed from one root, keyed by name.
pub type ProfileSet = BTreeMap<String, Profile>;

/// Block header: `name{`, `name: a, b{`, or a single-line `name{ x y }`.
struct Header<'a> {
    name: &'a str,
    parents: Vec<&'a str>,
    inline: Option<&'a str>,
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn parse_header(line: &str) -> Option<Header<'_>> {
    let brace = line.find('{')?;
    let head = &line[..brace];
    let rest = line[brace + 1..].trim();

    let inline = if rest.is_empty() {
        None
    } else {
        Some(rest.strip_suffix('}')?)
    };

    let (name, parent_list) = match head.split_once(':') {
        Some((name, parents)) => (name.trim(), parents),
        None => (head.trim(), ""),
    };
    if !is_valid_name(name) {
        return None;
    }

    let mut parents = Vec::new();
    for parent in parent_list.split(',').map(str::trim) {
        if parent.is_empty() {
            continue;
        }
        if !is_valid_name(parent) {
            return None;
        }
        parents.push(parent);
    }

    Some(Header {
        name,
        parents,
        inline,
    })
}

enum State {
    Outside,
    Inside(Profile),
}

fn commit(profiles: &mut ProfileSet, profile: Profile) {
    trace!(
        profile = %profile.name,
        includes = profile.include_patterns.len(),
        excludes = profile.exclude_patterns.len(),
        "Parsed profile"
    );
    if let Some(previous) = profiles.insert(profile.name.clone(), profile) {
        debug!(profile = %previous.name, "Profile redefined, keeping the last definition");
    }
}

fn open(header: &Header<'_>, root: &Path) -> Profile {
    let mut profile = Profile::new(header.name, root);
    for parent in &header.parents {
        if *parent == header.name {
            warn!(profile = %header.name, "Ignoring self-referencing parent");
            continue;
        }
        if !profile.parents.iter().any(|p| p == parent) {
            profile.parents.push(parent.to_string());
        }
    }
    profile
}

/// Parse profile DSL text declared under `root`.
///
/// Never fails; malformed lines are read permissively. A name declared twice
/// keeps its last definition.
pub fn parse_profiles(text: &str, root: &Path) -> ProfileSet {
    let mut profiles = ProfileSet::new();
    let mut state = State::Outside;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(header) = parse_header(line) {
            if let State::Inside(previous) = std::mem::replace(&mut state, State::Outside) {
                commit(&mut profiles, previous);
            }
            let mut profile = open(&header, root);
            match header.inline {
                Some(body) => {
                    for token in body.split_whitespace() {
                        profile.push_pattern(token);
                    }
                    commit(&mut profiles, profile);
                }
                None => state = State::Inside(profile),
            }
            continue;
        }

        if line == "}" {
            if let State::Inside(profile) = std::mem::replace(&mut state, State::Outside) {
                commit(&mut profiles, profile);
            }
            continue;
        }

        match &mut state {
            State::Inside(profile) => profile.push_pattern(line),
            State::Outside => {
                trace!(line = line_no + 1, "Skipping line outside of a profile block");
            }
        }
    }

    if let State::Inside(profile) = state {
        debug!(profile = %profile.name, "Committing unclosed profile block");
        commit(&mut profiles, profile);
    }

    profiles
}

/// Read and parse the profile file at `path` for `root`.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_profile_file(path: &Path, root: &Path) -> Result<Option<ProfileSet>, EngineError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(parse_profiles(&text, root))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(EngineError::ConfigParseFailure {
            root: root.to_path_buf(),
            path: path.to_path_buf(),
            source,
        }),
    }
}
