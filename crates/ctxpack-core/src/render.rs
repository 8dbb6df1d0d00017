//! Renderer: concatenates files into one annotated text blob.
//!
//! Each file is emitted as `prefix + header comment + suffix + content + "\n"`.
//! The header comment uses the file type's comment syntax. When the next
//! entry would push the output past the configured byte budget, rendering
//! switches to a manifest that lists every requested file with its size.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Diagnostic;

/// Rendering options; the `[render]` section of the application config.
pub type RenderOptions = ctxpack_config::RenderConfig;

/// Extensions whose headers use `<!-- -->`.
const MARKUP_EXTENSIONS: &[&str] = &["html", "xml", "svg", "jsx", "tsx"];

/// Extensions whose headers use `/* */`.
const STYLESHEET_EXTENSIONS: &[&str] = &["css", "scss", "less"];

/// A file and its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSize {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Output of [`Renderer::render`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderResult {
    /// Concatenated content; empty when `truncated`.
    pub content: String,
    /// The size budget was exceeded and a manifest was produced instead.
    pub truncated: bool,
    /// File listing produced in manifest mode.
    pub manifest: Option<String>,
    /// Largest file seen, in either mode.
    pub largest: Option<FileSize>,
    /// Bytes of content emitted, or in manifest mode the summed file sizes.
    pub total_bytes: u64,
    /// Files rendered, or in manifest mode the files listed.
    pub file_count: usize,
    /// Files that could not be read or measured.
    pub diagnostics: Vec<Diagnostic>,
}

/// Renders resolved files with per-file headers.
#[derive(Debug, Clone)]
pub struct Renderer {
    options: RenderOptions,
    roots: Vec<PathBuf>,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            roots: Vec::new(),
        }
    }

    /// Roots used to shorten header paths.
    pub fn with_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.roots = roots.into_iter().map(Into::into).collect();
        self
    }

    /// Path shown for `path`: relative to the longest enclosing root, with
    /// `/` separators; unchanged when no root encloses it.
    pub fn display_path(&self, path: &Path) -> String {
        let relative = self
            .roots
            .iter()
            .filter_map(|root| path.strip_prefix(root).ok())
            .min_by_key(|rel| rel.components().count());
        match relative {
            Some(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            None => path.display().to_string(),
        }
    }

    /// Header emitted before `path`'s content, including prefix and suffix.
    pub fn header(&self, path: &Path) -> String {
        let label = format!("File: {}", self.display_path(path));
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let comment = if MARKUP_EXTENSIONS.contains(&ext.as_str()) {
            format!("<!-- {label} -->")
        } else if STYLESHEET_EXTENSIONS.contains(&ext.as_str()) {
            format!("/* {label} */")
        } else {
            format!("{} {label}", self.options.comment_for(&ext))
        };

        format!(
            "{}{comment}{}",
            self.options.header_prefix, self.options.header_suffix
        )
    }

    /// Render `files` in the given order.
    ///
    /// Unreadable files are skipped and reported in `diagnostics`.
    pub fn render(&self, files: &[PathBuf]) -> RenderResult {
        let budget = self.options.max_content_bytes;
        let mut result = RenderResult::default();

        for path in files {
            let size = match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => meta.len(),
                Ok(_) => {
                    report(&mut result.diagnostics, path, "not a regular file".to_string());
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    report(&mut result.diagnostics, path, e.to_string());
                    continue;
                }
            };

            // Size is known up front, so oversized files are never read.
            let mut entry = self.header(path);
            if result.total_bytes + entry.len() as u64 + size + 1 > budget {
                return self.exceeded(files, result);
            }

            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    report(&mut result.diagnostics, path, e.to_string());
                    continue;
                }
            };
            track_largest(&mut result.largest, path, bytes.len() as u64);

            entry.push_str(&String::from_utf8_lossy(&bytes));
            entry.push('\n');

            // Lossy decoding or a concurrent write can still grow the entry.
            let entry_len = entry.len() as u64;
            if result.total_bytes + entry_len > budget {
                return self.exceeded(files, result);
            }

            result.total_bytes += entry_len;
            result.file_count += 1;
            result.content.push_str(&entry);
        }

        debug!(
            files = result.file_count,
            bytes = result.total_bytes,
            "Rendered content"
        );
        result
    }

    fn exceeded(&self, files: &[PathBuf], partial: RenderResult) -> RenderResult {
        info!(
            limit = self.options.max_content_bytes,
            rendered = partial.file_count,
            requested = files.len(),
            "Size limit exceeded, producing manifest"
        );
        self.manifest(files, partial)
    }

    /// Switch `partial` to manifest mode, listing every requested file.
    fn manifest(&self, files: &[PathBuf], partial: RenderResult) -> RenderResult {
        let mut result = RenderResult {
            truncated: true,
            largest: partial.largest,
            diagnostics: partial.diagnostics,
            ..RenderResult::default()
        };

        let mut listing = format!(
            "Content exceeds the size limit of {} bytes. File manifest:\n\n",
            self.options.max_content_bytes
        );

        for path in files {
            let bytes = match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => meta.len(),
                Ok(_) => {
                    report(&mut result.diagnostics, path, "not a regular file".to_string());
                    continue;
                }
                Err(e) => {
                    report(&mut result.diagnostics, path, e.to_string());
                    continue;
                }
            };
            track_largest(&mut result.largest, path, bytes);
            result.total_bytes += bytes;
            result.file_count += 1;
            let _ = writeln!(
                listing,
                "{} ({} bytes, running total {} bytes)",
                self.display_path(path),
                bytes,
                result.total_bytes
            );
        }

        let _ = write!(
            listing,
            "\nTotal: {} bytes in {} files\n",
            result.total_bytes, result.file_count
        );
        result.manifest = Some(listing);
        result
    }
}

/// Record a read failure once per path.
fn report(diagnostics: &mut Vec<Diagnostic>, path: &Path, message: String) {
    let seen = diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::FileRead { path: p, .. } if p == path));
    if !seen {
        diagnostics.push(Diagnostic::FileRead {
            path: path.to_path_buf(),
            message,
        });
    }
}

fn track_largest(largest: &mut Option<FileSize>, path: &Path, bytes: u64) {
    if largest.as_ref().is_none_or(|l| bytes > l.bytes) {
        *largest = Some(FileSize {
            path: path.to_path_buf(),
            bytes,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxpack_test_utils::project::TempProject;
    use pretty_assertions::assert_eq;

    fn renderer(project: &TempProject) -> Renderer {
        Renderer::new(RenderOptions::default()).with_roots([project.root()])
    }

    #[test]
    fn test_render_concatenates_with_headers() {
        let project = TempProject::new()
            .with_file("src/main.rs", "fn main() {}")
            .with_file("app.py", "print('hi')");
        let files = vec![project.path("src/main.rs"), project.path("app.py")];

        let result = renderer(&project).render(&files);
        assert!(!result.truncated);
        assert!(result.manifest.is_none());
        assert_eq!(
            result.content,
            "\n// File: src/main.rs\nfn main() {}\n\n# File: app.py\nprint('hi')\n"
        );
        assert_eq!(result.file_count, 2);
        assert_eq!(result.total_bytes, result.content.len() as u64);
    }

    #[test]
    fn test_structural_comment_wrappers() {
        let project = TempProject::new();
        let r = renderer(&project);
        assert_eq!(
            r.header(&project.path("web/index.html")),
            "\n<!-- File: web/index.html -->\n"
        );
        assert_eq!(
            r.header(&project.path("ui/App.TSX")),
            "\n<!-- File: ui/App.TSX -->\n"
        );
        assert_eq!(
            r.header(&project.path("style/site.scss")),
            "\n/* File: style/site.scss */\n"
        );
        assert_eq!(r.header(&project.path("Makefile")), "\n// File: Makefile\n");
        assert_eq!(r.header(&project.path("q.sql")), "\n-- File: q.sql\n");
    }

    #[test]
    fn test_custom_prefix_suffix_and_comment_map() {
        let project = TempProject::new().with_file("a.txt", "x");
        let mut options = RenderOptions::default();
        options.header_prefix = "==".to_string();
        options.header_suffix = "==\n".to_string();
        options
            .language_comment_map
            .insert("txt".to_string(), ";".to_string());

        let result = Renderer::new(options)
            .with_roots([project.root()])
            .render(&[project.path("a.txt")]);
        assert_eq!(result.content, "==; File: a.txt==\nx\n");
    }

    #[test]
    fn test_size_limit_produces_manifest() {
        let project = TempProject::new()
            .with_file("one.txt", &"a".repeat(40))
            .with_file("two.txt", &"b".repeat(70));
        let mut options = RenderOptions::default();
        options.max_content_bytes = 100;
        let files = vec![project.path("one.txt"), project.path("two.txt")];

        let result = Renderer::new(options)
            .with_roots([project.root()])
            .render(&files);

        assert!(result.truncated);
        assert!(result.content.is_empty());
        let manifest = result.manifest.unwrap();
        assert!(manifest.contains("one.txt (40 bytes, running total 40 bytes)"));
        assert!(manifest.contains("two.txt (70 bytes, running total 110 bytes)"));
        assert!(manifest.contains("Total: 110 bytes in 2 files"));
        assert_eq!(result.total_bytes, 110);
        assert_eq!(result.file_count, 2);
        assert_eq!(result.largest.unwrap().bytes, 70);
    }

    #[test]
    fn test_oversized_file_switches_to_manifest_without_reading() {
        let project = TempProject::new().with_file("small.txt", "s");
        let huge = project.path("huge.bin");
        // Sparse file: reading it would allocate the full length.
        std::fs::File::create(&huge)
            .unwrap()
            .set_len(4 << 30)
            .unwrap();
        let mut options = RenderOptions::default();
        options.max_content_bytes = 1024;

        let result = Renderer::new(options)
            .with_roots([project.root()])
            .render(&[project.path("small.txt"), huge.clone()]);

        assert!(result.truncated);
        assert!(result.manifest.unwrap().contains("huge.bin (4294967296 bytes"));
        let largest = result.largest.unwrap();
        assert_eq!(largest.path, huge);
        assert_eq!(largest.bytes, 4 << 30);
    }

    #[test]
    fn test_unreadable_file_is_a_diagnostic() {
        let project = TempProject::new()
            .with_file("ok.txt", "fine")
            .with_dir("folder");
        let files = vec![project.path("folder"), project.path("missing.txt"), project.path("ok.txt")];

        let result = renderer(&project).render(&files);
        assert!(!result.truncated);
        assert_eq!(result.file_count, 1);
        assert_eq!(result.diagnostics.len(), 2);
        assert!(result.content.contains("File: ok.txt"));
    }

    #[test]
    fn test_largest_file_is_tracked() {
        let project = TempProject::new()
            .with_file("small.txt", "s")
            .with_file("big.txt", "bigger content");
        let files = vec![project.path("small.txt"), project.path("big.txt")];

        let result = renderer(&project).render(&files);
        let largest = result.largest.unwrap();
        assert_eq!(largest.path, project.path("big.txt"));
        assert_eq!(largest.bytes, 14);
    }

    #[test]
    fn test_display_path_prefers_innermost_root() {
        let project = TempProject::new();
        let inner = project.path("packages/app");
        let r = Renderer::new(RenderOptions::default()).with_roots([project.root().to_path_buf(), inner.clone()]);
        assert_eq!(r.display_path(&inner.join("src/x.rs")), "src/x.rs");
        assert_eq!(r.display_path(&project.path("top.rs")), "top.rs");
        assert_eq!(
            r.display_path(Path::new("/elsewhere/file.rs")),
            "/elsewhere/file.rs"
        );
    }

    #[test]
    fn test_empty_input() {
        let project = TempProject::new();
        let result = renderer(&project).render(&[]);
        assert!(result.content.is_empty());
        assert!(!result.truncated);
        assert!(result.largest.is_none());
    }
}
