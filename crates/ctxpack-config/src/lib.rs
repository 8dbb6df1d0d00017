#![deny(unsafe_code)]

//! Configuration loading and validation for ctxpack.
//!
//! Loads TOML configuration files and validates them against expected schemas.
//! Provides the [`AppConfig`] type as the central configuration structure.
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration.

use std::collections::BTreeMap;
use std::path::Path;

use globset::Glob;
use serde::{Deserialize, Serialize};

/// Comment-map key used when a file extension has no entry of its own.
pub const DEFAULT_COMMENT_KEY: &str = "default";

/// Comment token used when the map has no [`DEFAULT_COMMENT_KEY`] entry.
pub const FALLBACK_COMMENT: &str = "//";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Profile discovery and pattern expansion.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Output rendering.
    #[serde(default)]
    pub render: RenderConfig,

    /// Options consumed by host integrations only.
    #[serde(default)]
    pub host: HostConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Profile discovery and pattern expansion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Keep files matched by the root's `.gitignore`.
    #[serde(default)]
    pub include_git_ignored: bool,

    /// Name of the per-root profile file.
    #[serde(default = "default_profile_file")]
    pub profile_file: String,

    /// Globs (root-relative) excluded when every file under every root
    /// is selected.
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_git_ignored: false,
            profile_file: default_profile_file(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

fn default_profile_file() -> String {
    ".ctxprofiles".to_string()
}

fn default_exclude_patterns() -> Vec<String> {
    [
        "**/.git/**",
        "**/.svn/**",
        "**/.hg/**",
        "**/node_modules/**",
        "**/bower_components/**",
        "**/target/**",
        "**/dist/**",
        "**/build/**",
        "**/out/**",
        "**/.next/**",
        "**/__pycache__/**",
        "**/.venv/**",
        "**/venv/**",
        "**/*.lock",
        "**/package-lock.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Output rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Text emitted before each file header.
    #[serde(default = "default_header_affix")]
    pub header_prefix: String,

    /// Text emitted after each file header.
    #[serde(default = "default_header_affix")]
    pub header_suffix: String,

    /// Size budget for rendered content; above it a manifest is produced.
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: u64,

    /// Line-comment token per file extension (without the dot), with a
    /// `"default"` fallback entry.
    #[serde(default = "default_language_comment_map")]
    pub language_comment_map: BTreeMap<String, String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            header_prefix: default_header_affix(),
            header_suffix: default_header_affix(),
            max_content_bytes: default_max_content_bytes(),
            language_comment_map: default_language_comment_map(),
        }
    }
}

impl RenderConfig {
    /// Comment token for an extension, falling back to the `"default"`
    /// entry and then to [`FALLBACK_COMMENT`].
    pub fn comment_for(&self, extension: &str) -> &str {
        self.language_comment_map
            .get(extension)
            .or_else(|| self.language_comment_map.get(DEFAULT_COMMENT_KEY))
            .map(String::as_str)
            .unwrap_or(FALLBACK_COMMENT)
    }
}

fn default_header_affix() -> String {
    "\n".to_string()
}

fn default_max_content_bytes() -> u64 {
    1024 * 1024 // 1 MiB
}

fn default_language_comment_map() -> BTreeMap<String, String> {
    let slash = [
        "js", "mjs", "cjs", "ts", "java", "c", "h", "cpp", "hpp", "cc", "cs", "go", "rs", "swift",
        "kt", "kts", "scala", "dart", "php", "groovy",
    ];
    let hash = [
        "py", "rb", "sh", "bash", "zsh", "yaml", "yml", "toml", "pl", "r", "ps1", "dockerfile",
        "mk", "cmake", "ini", "conf",
    ];
    let dash = ["sql", "lua", "hs", "elm"];

    let mut map = BTreeMap::new();
    for ext in slash {
        map.insert(ext.to_string(), "//".to_string());
    }
    for ext in hash {
        map.insert(ext.to_string(), "#".to_string());
    }
    for ext in dash {
        map.insert(ext.to_string(), "--".to_string());
    }
    map.insert(DEFAULT_COMMENT_KEY.to_string(), FALLBACK_COMMENT.to_string());
    map
}

/// Options that only a host integration acts on. The engine carries them
/// so that one config file serves every host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Copy rendered output to the clipboard after rendering.
    #[serde(default = "default_auto_copy")]
    pub auto_copy_to_clipboard: bool,

    /// Symbol a host shows next to files in the active selection.
    #[serde(default = "default_file_decoration_symbol")]
    pub file_decoration_symbol: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            auto_copy_to_clipboard: default_auto_copy(),
            file_decoration_symbol: default_file_decoration_symbol(),
        }
    }
}

fn default_auto_copy() -> bool {
    true
}

fn default_file_decoration_symbol() -> String {
    "◆".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.max_content_bytes == 0 {
            return Err(ConfigError::Validation(
                "render.max_content_bytes must be non-zero".to_string(),
            ));
        }

        let profile_file = &self.engine.profile_file;
        if profile_file.trim().is_empty() {
            return Err(ConfigError::Validation(
                "engine.profile_file must not be empty".to_string(),
            ));
        }
        if profile_file.contains('/') || profile_file.contains('\\') {
            return Err(ConfigError::Validation(format!(
                "engine.profile_file must be a bare file name, got {profile_file:?}"
            )));
        }

        for (i, pattern) in self.engine.exclude_patterns.iter().enumerate() {
            if let Err(e) = Glob::new(pattern) {
                return Err(ConfigError::Validation(format!(
                    "engine.exclude_patterns[{i}] is not a valid glob ({pattern:?}): {e}"
                )));
            }
        }

        for (ext, token) in &self.render.language_comment_map {
            if token.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "render.language_comment_map.{ext} must not be empty"
                )));
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace", "off"];
        if !valid_levels.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}
