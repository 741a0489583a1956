//! Command-line interface.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::pipeline::{self, CancelToken, ProgressCallback};
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USAGE: i32 = 1;
pub const EXIT_IO: i32 = 2;
pub const EXIT_INTERNAL: i32 = 3;

/// Map the hidden network of connections in a codebase.
///
/// Analyses a source repository in a single pass and writes one JSON
/// artifact describing its structural topology: files, symbols, imports, a
/// confidence-scored call graph, symbol communities, and traced execution
/// flows.
#[derive(Parser)]
#[command(name = "mycelium")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the repository to analyse
    pub path: PathBuf,

    /// Destination artifact (default: <repo_name>.mycelium.json)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Restrict parsing to these language tags (comma-separated, e.g. cs,ts)
    #[arg(short, long, value_delimiter = ',')]
    pub languages: Option<Vec<String>>,

    /// Initial Louvain resolution
    #[arg(long, default_value_t = 1.0)]
    pub resolution: f64,

    /// Maximum execution flows to emit
    #[arg(long, default_value_t = 75)]
    pub max_processes: usize,

    /// Maximum BFS trace depth
    #[arg(long, default_value_t = 10)]
    pub max_depth: usize,

    /// Extra ignore globs (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Show per-phase progress and timing detail
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long)]
    pub quiet: bool,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else if verbose {
        "mycelium=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Run the analysis described by the parsed arguments.
pub fn run(cli: &Cli) -> i32 {
    init_tracing(cli.verbose, cli.quiet);

    let repo_path = cli.path.canonicalize().unwrap_or_else(|_| cli.path.clone());
    let repo_name = repo_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "repo".to_string());
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| format!("{repo_name}.mycelium.json"));

    let config = AnalysisConfig {
        repo_path: repo_path.to_string_lossy().to_string(),
        languages: cli
            .languages
            .clone()
            .map(|tags| tags.into_iter().map(|t| t.trim().to_lowercase()).collect()),
        resolution: cli.resolution,
        max_processes: cli.max_processes,
        max_depth: cli.max_depth,
        exclude_patterns: cli.exclude.clone(),
        ..Default::default()
    };

    let cancel = CancelToken::new();
    let start = Instant::now();

    let (artifact, spinner) = if cli.quiet {
        match pipeline::run(&config, &cancel, None) {
            Ok(artifact) => (artifact, None),
            Err(e) => return report_error(e),
        }
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.blue} {msg}")
                .expect("static template is valid"),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        let progress: ProgressCallback = {
            let spinner = spinner.clone();
            Box::new(move |_name, label| spinner.set_message(label.to_string()))
        };
        match pipeline::run(&config, &cancel, Some(progress)) {
            Ok(artifact) => (artifact, Some(spinner)),
            Err(e) => {
                spinner.finish_and_clear();
                return report_error(e);
            }
        }
    };
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if let Err(e) = report::write(&artifact, &output_path) {
        eprintln!("Error writing {output_path}: {e}");
        return EXIT_IO;
    }

    if !cli.quiet {
        print_summary(&artifact, &repo_name, start.elapsed(), cli.verbose);
        println!("\n  {} {}", "Output written to:".green(), output_path);
    }

    EXIT_SUCCESS
}

fn report_error(error: AnalysisError) -> i32 {
    eprintln!("{} {error}", "Error:".red().bold());
    match error {
        AnalysisError::InvalidRoot(_) | AnalysisError::RootIo { .. } => EXIT_IO,
        AnalysisError::Cancelled | AnalysisError::InvariantViolation(_) => EXIT_INTERNAL,
    }
}

fn print_summary(
    artifact: &report::Artifact,
    repo_name: &str,
    elapsed: std::time::Duration,
    verbose: bool,
) {
    let stat = |key: &str| {
        artifact
            .stats
            .get(key)
            .cloned()
            .unwrap_or(serde_json::json!(0))
    };
    println!(
        "\n{}  Analysis: {}",
        "✓".green().bold(),
        repo_name.bold()
    );
    println!("  {:<14} {}", "Files:", stat("files"));
    println!("  {:<14} {}", "Symbols:", stat("symbols"));
    println!("  {:<14} {}", "Calls:", stat("calls"));
    println!("  {:<14} {}", "Communities:", stat("communities"));
    println!("  {:<14} {}", "Processes:", stat("processes"));
    println!("  {:<14} {:.1}ms", "Duration:", elapsed.as_secs_f64() * 1000.0);

    if verbose {
        if let Some(serde_json::Value::Object(timings)) = artifact.metadata.get("phase_timings") {
            println!("\n  Phase timings:");
            for (phase, seconds) in timings {
                if let Some(value) = seconds.as_f64() {
                    println!("    {:<14} {:.1}ms", phase, value * 1000.0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_interface_contract() {
        let cli = Cli::try_parse_from(["mycelium", "."]).unwrap();
        assert_eq!(cli.resolution, 1.0);
        assert_eq!(cli.max_processes, 75);
        assert_eq!(cli.max_depth, 10);
        assert!(cli.exclude.is_empty());
        assert!(!cli.verbose && !cli.quiet);
    }

    #[test]
    fn comma_lists_split() {
        let cli =
            Cli::try_parse_from(["mycelium", ".", "-l", "cs,ts", "--exclude", "gen/*,*.min.js"])
                .unwrap();
        assert_eq!(cli.languages.unwrap(), vec!["cs", "ts"]);
        assert_eq!(cli.exclude, vec!["gen/*", "*.min.js"]);
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["mycelium", ".", "--verbose", "--quiet"]).is_err());
    }

    #[test]
    fn missing_path_is_a_usage_error() {
        assert!(Cli::try_parse_from(["mycelium"]).is_err());
    }
}
