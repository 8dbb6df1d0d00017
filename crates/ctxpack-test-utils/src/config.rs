//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use ctxpack_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .include_git_ignored(true)
///     .max_content_bytes(100)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn include_git_ignored(mut self, include: bool) -> Self {
        self.config.engine.include_git_ignored = include;
        self
    }

    pub fn profile_file(mut self, name: &str) -> Self {
        self.config.engine.profile_file = name.to_string();
        self
    }

    pub fn exclude_patterns(mut self, patterns: &[&str]) -> Self {
        self.config.engine.exclude_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn max_content_bytes(mut self, bytes: u64) -> Self {
        self.config.render.max_content_bytes = bytes;
        self
    }

    pub fn header_affixes(mut self, prefix: &str, suffix: &str) -> Self {
        self.config.render.header_prefix = prefix.to_string();
        self.config.render.header_suffix = suffix.to_string();
        self
    }

    pub fn comment(mut self, extension: &str, token: &str) -> Self {
        self.config
            .render
            .language_comment_map
            .insert(extension.to_string(), token.to_string());
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
