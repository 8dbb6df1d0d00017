#![deny(unsafe_code)]

//! ctxpack CLI: resolve profiles and render project files from the shell.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use ctxpack_config::AppConfig;
use ctxpack_core::{Diagnostic, Engine, Resolution, Selection};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// ctxpack: bundle project files selected by named profiles.
#[derive(Parser)]
#[command(name = "ctxpack", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "ctxpack.toml", global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Project root to load (repeatable). Defaults to the current directory.
    #[arg(short = 'r', long = "root", global = true)]
    roots: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List profiles defined under the loaded roots.
    List {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the files a selection resolves to.
    Resolve {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Render the selected files into one annotated document.
    Render {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Write output to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Profile to include (repeatable, or comma-separated).
    #[arg(short, long = "profile")]
    profiles: Vec<String>,

    /// Ignore profiles and take every file under every root.
    #[arg(long, conflicts_with = "profiles")]
    all: bool,
}

impl SelectionArgs {
    fn selection(&self) -> Result<Selection> {
        if self.all {
            return Ok(Selection::AllFiles);
        }
        let selection = Selection::parse_names(&self.profiles.join(","));
        if selection.is_empty() {
            bail!("select at least one profile with --profile, or use --all");
        }
        Ok(selection)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, found) = load_config(&cli.config).await?;
    init_tracing(cli.verbose, &config.logging.level);
    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    let roots = resolve_roots(&cli.roots)?;

    match cli.command {
        Commands::List { json } => cmd_list(config, roots, json).await?,
        Commands::Resolve { selection, json } => {
            cmd_resolve(config, roots, selection.selection()?, json).await?
        }
        Commands::Render { selection, output } => {
            cmd_render(config, roots, selection.selection()?, output.as_deref()).await?
        }
        Commands::Config { show } => cmd_config(&cli.config, &config, show, found)?,
    }

    Ok(())
}

fn init_tracing(verbose: u8, configured: &str) {
    let filter = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}

async fn cmd_list(config: AppConfig, roots: Vec<PathBuf>, json: bool) -> Result<()> {
    let names = with_engine(config, roots, |engine| Ok(engine.list_profile_names())).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else if names.is_empty() {
        eprintln!("No profiles found.");
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

async fn cmd_resolve(
    config: AppConfig,
    roots: Vec<PathBuf>,
    selection: Selection,
    json: bool,
) -> Result<()> {
    let (files, diagnostics) = with_engine(config, roots, move |engine| {
        let Resolution { files, diagnostics } = engine.resolve_selection(&selection)?;
        let renderer = engine.renderer();
        let shown: Vec<String> = files.iter().map(|p| renderer.display_path(p)).collect();
        Ok((shown, diagnostics))
    })
    .await?;

    if json {
        let value = serde_json::json!({
            "files": files,
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        report_diagnostics(&diagnostics);
        for file in files {
            println!("{file}");
        }
    }
    Ok(())
}

async fn cmd_render(
    config: AppConfig,
    roots: Vec<PathBuf>,
    selection: Selection,
    output: Option<&Path>,
) -> Result<()> {
    let (resolution, result) = with_engine(config, roots, move |engine| {
        let resolution = engine.resolve_selection(&selection)?;
        let files: Vec<PathBuf> = resolution.files.iter().cloned().collect();
        let result = engine.render(&files);
        Ok((resolution, result))
    })
    .await?;

    report_diagnostics(&resolution.diagnostics);
    report_diagnostics(&result.diagnostics);

    let text = match &result.manifest {
        Some(manifest) => {
            eprintln!(
                "Size limit exceeded: {} files ({} bytes) listed as a manifest.",
                result.file_count, result.total_bytes
            );
            manifest.as_str()
        }
        None => {
            eprintln!(
                "Rendered {} files ({} bytes).",
                result.file_count, result.total_bytes
            );
            result.content.as_str()
        }
    };
    if let Some(largest) = &result.largest {
        eprintln!(
            "Largest file: {} ({} bytes).",
            largest.path.display(),
            largest.bytes
        );
    }

    write_output(output, text).await
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool, found: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else if found {
        println!("Configuration at '{}' is valid.", config_path.display());
    } else {
        println!(
            "No configuration at '{}'; defaults are in effect.",
            config_path.display()
        );
    }
    Ok(())
}

/// Build an engine, load every root, and run `f` on a blocking worker.
///
/// A root whose profile file cannot be read is reported and skipped.
async fn with_engine<T, F>(config: AppConfig, roots: Vec<PathBuf>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Engine) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut engine = Engine::new(config);
        for root in &roots {
            if let Err(e) = engine.load_root(root) {
                warn!(root = %root.display(), error = %e, "Skipping root");
                eprintln!("warning: {e}");
            }
        }
        f(&mut engine)
    })
    .await
    .context("engine worker panicked")?
}

fn report_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("warning: {diagnostic}");
    }
}

async fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = text.len(), "Wrote output");
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn resolve_roots(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if roots.is_empty() {
        return Ok(vec![std::env::current_dir()?]);
    }
    roots
        .iter()
        .map(|root| {
            std::path::absolute(root)
                .with_context(|| format!("invalid root path {}", root.display()))
        })
        .collect()
}

async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if path.exists() {
        let config = AppConfig::load(path).await.map_err(|e| anyhow::anyhow!(e))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use ctxpack_test_utils::project::TempProject;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve_with_profiles_and_roots() {
        let cli = Cli::try_parse_from([
            "ctxpack", "resolve", "-p", "web", "--profile", "api,docs", "-r", "/a", "--root", "/b",
        ])
        .unwrap();
        assert_eq!(cli.roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        let Commands::Resolve { selection, json } = cli.command else {
            panic!("expected resolve");
        };
        assert!(!json);
        assert_eq!(
            selection.selection().unwrap(),
            Selection::profiles(["api", "docs", "web"])
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ctxpack", "render", "--all", "--config", "alt.toml", "-vv", "--root", "/p",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.roots, vec![PathBuf::from("/p")]);

        let cli = Cli::try_parse_from(["ctxpack", "list"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("ctxpack.toml"));
    }

    #[test]
    fn test_all_conflicts_with_profiles() {
        assert!(Cli::try_parse_from(["ctxpack", "render", "--all", "-p", "web"]).is_err());

        let cli = Cli::try_parse_from(["ctxpack", "render", "--all"]).unwrap();
        let Commands::Render { selection, output } = cli.command else {
            panic!("expected render");
        };
        assert!(output.is_none());
        assert_eq!(selection.selection().unwrap(), Selection::AllFiles);
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let cli = Cli::try_parse_from(["ctxpack", "resolve"]).unwrap();
        let Commands::Resolve { selection, .. } = cli.command else {
            panic!("expected resolve");
        };
        assert!(selection.selection().is_err());
    }

    #[test]
    fn test_relative_roots_become_absolute() {
        let roots = resolve_roots(&[PathBuf::from("some/dir")]).unwrap();
        assert!(roots[0].is_absolute());
        assert!(roots[0].ends_with("some/dir"));
    }

    #[tokio::test]
    async fn test_missing_config_uses_defaults() {
        let (config, found) = load_config(Path::new("/nonexistent/ctxpack.toml"))
            .await
            .unwrap();
        assert!(!found);
        assert_eq!(config.render.max_content_bytes, 1_048_576);
    }

    #[tokio::test]
    async fn test_with_engine_resolves_on_worker() {
        let project = TempProject::new()
            .with_file("src/a.rs", "a")
            .with_profiles("code{src/}");
        let names = with_engine(
            AppConfig::default(),
            vec![project.root().to_path_buf()],
            |engine| Ok(engine.list_profile_names()),
        )
        .await
        .unwrap();
        assert_eq!(names, vec!["code"]);
    }

    #[tokio::test]
    async fn test_write_output_to_file() {
        let project = TempProject::new();
        let out = project.path("bundle.txt");
        write_output(Some(&out), "rendered").await.unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "rendered");
    }
}
