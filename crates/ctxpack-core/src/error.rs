//! Error taxonomy for the engine.
//!
//! Only two conditions surface as [`EngineError`]: an I/O failure while
//! reading a root's profile file, and an inheritance cycle. Everything else
//! degrades to fewer files plus a [`Diagnostic`].

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Errors returned by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to read profile file {}: {source}", path.display())]
    ConfigParseFailure {
        /// Root whose profile file could not be read.
        root: PathBuf,
        /// Full path of the profile file.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cyclic profile inheritance: {}", chain.join(" -> "))]
    CyclicInheritance {
        /// Profile names from the first occurrence of the repeated profile
        /// back to itself.
        chain: Vec<String>,
    },
}

/// A non-fatal problem found while resolving or rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A requested or inherited profile name is not defined.
    UnknownProfile {
        name: String,
        /// The profile that named it as a parent, if any.
        referenced_by: Option<String>,
    },
    /// A file could not be read or measured during rendering.
    FileRead { path: PathBuf, message: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownProfile {
                name,
                referenced_by: Some(child),
            } => write!(f, "profile '{child}' inherits unknown profile '{name}'"),
            Diagnostic::UnknownProfile {
                name,
                referenced_by: None,
            } => write!(f, "unknown profile '{name}'"),
            Diagnostic::FileRead { path, message } => {
                write!(f, "could not read {}: {message}", path.display())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_display() {
        let err = EngineError::CyclicInheritance {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic profile inheritance: a -> b -> a");
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::UnknownProfile {
            name: "ghost".into(),
            referenced_by: Some("child".into()),
        };
        assert_eq!(d.to_string(), "profile 'child' inherits unknown profile 'ghost'");

        let d = Diagnostic::UnknownProfile {
            name: "ghost".into(),
            referenced_by: None,
        };
        assert_eq!(d.to_string(), "unknown profile 'ghost'");
    }
}
