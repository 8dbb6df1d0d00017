#![deny(unsafe_code)]

//! ctxpack profile resolution engine.
//!
//! Resolves named, inheritable profiles (lists of include/exclude file
//! patterns) into concrete file sets and renders those files into a single
//! annotated text blob.
//!
//! ```text
//! profile file ──► dsl ──► registry ──► resolver ──► render
//!                                          │
//!                                       matcher (globs, dirs, .gitignore)
//! ```
//!
//! The engine is synchronous and owns no global state. Hosts hold an
//! [`Engine`] and serialize access to it.

/// Profile DSL parser.
pub mod dsl;
/// Host-facing engine API.
pub mod engine;
/// Error and diagnostic types.
pub mod error;
/// Pattern expansion against the filesystem.
pub mod matcher;
/// Profiles grouped by project root.
pub mod registry;
/// Annotated concatenation with a size budget.
pub mod render;
/// Inheritance resolution.
pub mod resolver;
/// Active-profile selection.
pub mod selection;

pub use dsl::{Profile, ProfileSet, load_profile_file, parse_profiles};
pub use engine::Engine;
pub use error::{Diagnostic, EngineError};
pub use matcher::PatternMatcher;
pub use registry::ProfileRegistry;
pub use render::{FileSize, RenderOptions, RenderResult, Renderer};
pub use resolver::{Resolution, Resolver, resolve};
pub use selection::Selection;
