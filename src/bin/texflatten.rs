//! CLI binary for texflatten.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `FlattenConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use texflatten::{
    collect_assets, flatten, flatten_to_dir, Asset, FlattenConfig, FlattenProgressCallback,
    FlattenStats, ProgressCallback,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the file currently being read and a running asset count.
struct CliProgressCallback {
    bar: ProgressBar,
    files: AtomicUsize,
    assets: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Flattening");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self::from_bar(bar))
    }

    fn from_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            files: AtomicUsize::new(0),
            assets: AtomicUsize::new(0),
        }
    }

    fn clear(&self) {
        self.bar.finish_and_clear();
    }

    fn refresh(&self, current: &str) {
        self.bar.set_message(format!(
            "{current}  {}",
            dim(&format!(
                "{} files, {} assets",
                self.files.load(Ordering::SeqCst),
                self.assets.load(Ordering::SeqCst)
            ))
        ));
    }
}

impl FlattenProgressCallback for CliProgressCallback {
    fn on_file_open(&self, path: &Path, _depth: usize) {
        self.files.fetch_add(1, Ordering::SeqCst);
        self.refresh(&path.display().to_string());
    }

    fn on_asset(&self, asset: &Asset) {
        self.assets.fetch_add(1, Ordering::SeqCst);
        self.refresh(&asset.reference.display().to_string());
    }

    fn on_flatten_complete(&self, _stats: &FlattenStats) {
        self.clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Flatten main.tex into ./flattened/document.tex plus figures
  texflatten main

  # Choose the output directory
  texflatten paper.tex -o submission

  # Print the flattened document instead of writing files
  texflatten --stdout main > flat.tex

  # List the files the document depends on
  texflatten --list-assets main

  # Machine-readable summary
  texflatten --json main -o out

RECOGNISED DIRECTIVES:
  \input{file}                      spliced in place (.tex implied)
  \newif\ifNAME  \NAMEtrue  \NAMEfalse
  \ifNAME ... \else ... \fi         evaluated; inactive branches removed
  \newcommand{\NAME}[n]{body}       captured and expanded for NAME in:
                                    fxnote BigO Sort Scan rfig rtab rsec rapp picheight
  \includegraphics{path}            copied; path rewritten to its basename
  \documentclass{cls}               local .cls copied and scanned
  \bibliography{a,b}                local .bib files copied

ENVIRONMENT VARIABLES:
  TEXFLATTEN_OUTPUT_DIR   Default output directory
  RUST_LOG                Override log filter (e.g. texflatten=debug)
"#;

/// Flatten a multi-file LaTeX document into a single file plus its assets.
#[derive(Parser, Debug)]
#[command(
    name = "texflatten",
    version,
    about = "Flatten a multi-file LaTeX document into a single file plus its assets",
    long_about = "Resolve \\input includes, \\newif conditionals, a fixed set of \\newcommand \
shorthands and asset references, producing one self-contained document.tex and a flat \
directory of the figures, class and bibliography files it needs.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Start file (`.tex` implied).
    input: PathBuf,

    /// Directory to write document.tex and the assets into (created if absent).
    #[arg(short, long, env = "TEXFLATTEN_OUTPUT_DIR", default_value = "flattened")]
    output_dir: PathBuf,

    /// Directory that a relative FILE, \input and asset paths are resolved against.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Extension tried for \includegraphics paths without one.
    #[arg(long, default_value = "pdf")]
    graphic_ext: String,

    /// Maximum \input nesting depth.
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Write document.tex only; do not copy assets.
    #[arg(long)]
    no_copy: bool,

    /// Print the de-duplicated asset list and exit without writing anything.
    #[arg(long, conflicts_with = "stdout")]
    list_assets: bool,

    /// Print the flattened document to stdout instead of writing files.
    #[arg(long)]
    stdout: bool,

    /// Output a JSON summary (stats and assets) instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !cli.stdout && !cli.list_assets;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and run ─────────────────────────────────────────────
    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb = spinner.clone().map(|s| s as ProgressCallback);

    let result = build_config(&cli, progress_cb).and_then(|config| run(&cli, &config));
    clear_on_error(result, spinner.as_deref())
}

/// The completion hook never fires on failure, so the spinner must be
/// stopped here before the error is printed.
fn clear_on_error<T>(result: Result<T>, spinner: Option<&CliProgressCallback>) -> Result<T> {
    if result.is_err() {
        if let Some(spinner) = spinner {
            spinner.clear();
        }
    }
    result
}

/// Dispatch on the output mode.
fn run(cli: &Cli, config: &FlattenConfig) -> Result<()> {
    // ── Asset listing ────────────────────────────────────────────────────
    if cli.list_assets {
        let assets = collect_assets(&cli.input, config).context("Flattening failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&assets).context("Failed to serialise assets")?
            );
        } else {
            for asset in &assets {
                println!("{}", asset.resolved.display());
            }
        }
        return Ok(());
    }

    // ── Document to stdout ───────────────────────────────────────────────
    if cli.stdout {
        let output = flatten(&cli.input, config).context("Flattening failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            );
        } else {
            io::stdout()
                .lock()
                .write_all(output.document.as_bytes())
                .context("Failed to write to stdout")?;
        }
        return Ok(());
    }

    // ── Flatten into the output directory ────────────────────────────────
    let stats = flatten_to_dir(&cli.input, &cli.output_dir, config)
        .with_context(|| format!("Flattening {} failed", cli.input.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet {
        let doc_path = cli.output_dir.join(&config.output_name);
        eprintln!(
            "{}  {} files  {} → {} lines  {}ms  →  {}",
            green("✔"),
            stats.files_read,
            stats.lines_in,
            stats.lines_out,
            stats.total_duration_ms,
            bold(&doc_path.display().to_string()),
        );
        eprintln!(
            "   {} macros  {} flags  {}",
            dim(&stats.macros_defined.to_string()),
            dim(&stats.flags_declared.to_string()),
            if config.copy_assets {
                cyan(&format!("{} assets copied", stats.unique_assets))
            } else {
                dim(&format!("{} assets (not copied)", stats.unique_assets))
            },
        );
    }

    Ok(())
}

/// Map CLI args to `FlattenConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<FlattenConfig> {
    let mut builder = FlattenConfig::builder()
        .base_dir(&cli.base_dir)
        .default_graphic_extension(&cli.graphic_ext)
        .max_include_depth(cli.max_depth)
        .copy_assets(!cli.no_copy);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_is_cleared_when_the_run_fails() {
        let spinner = CliProgressCallback::from_bar(ProgressBar::hidden());
        let result: Result<()> = Err(anyhow::anyhow!("Flattening failed"));
        assert!(clear_on_error(result, Some(&spinner)).is_err());
        assert!(spinner.bar.is_finished());
    }

    #[test]
    fn spinner_keeps_running_on_success() {
        let spinner = CliProgressCallback::from_bar(ProgressBar::hidden());
        assert_eq!(clear_on_error(Ok(3), Some(&spinner)).unwrap(), 3);
        assert!(!spinner.bar.is_finished());
    }

    #[test]
    fn missing_start_file_clears_spinner() {
        let dir = tempfile::TempDir::new().unwrap();
        let cli = Cli::parse_from([
            "texflatten",
            "--stdout",
            "--base-dir",
            dir.path().to_str().unwrap(),
            "absent",
        ]);
        let spinner = Arc::new(CliProgressCallback::from_bar(ProgressBar::hidden()));
        let config = build_config(&cli, Some(spinner.clone() as ProgressCallback)).unwrap();

        let result = clear_on_error(run(&cli, &config), Some(spinner.as_ref()));
        assert!(result.is_err());
        assert!(spinner.bar.is_finished());
    }
}
