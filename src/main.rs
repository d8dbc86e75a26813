use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use docstring_patcher::config::{self, ProcessingConfig};
use docstring_patcher::discover;
use docstring_patcher::exports::{self, ExportStatus};
use docstring_patcher::generate::{Backend, CliBackend, GenerationClient};
use docstring_patcher::orchestrator::{Orchestrator, RunOptions};
use docstring_patcher::report::unified_diff;
use docstring_patcher::{telemetry, AtomicWriter, ContentExtractor, TextFormatter};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Above this many concurrent invocations the run warns but proceeds.
const PARALLEL_WARNING_THRESHOLD: u32 = 50;

#[derive(Parser)]
#[command(name = "docstring-patcher")]
#[command(about = "Docstring and __all__ maintenance for Python packages", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./docstring-patcher.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Improve docstrings with an external assistant and write them back
    Docstrings(DocstringArgs),

    /// Rebuild __all__ sections from the relative imports that precede them
    Exports(ExportArgs),
}

#[derive(Args)]
struct DocstringArgs {
    /// Files or directories to process (defaults to the current directory)
    paths: Vec<PathBuf>,

    /// Assistant used for generation
    #[arg(long, value_enum, default_value_t = Backend::Claude)]
    tool: Backend,

    /// Maximum concurrent assistant invocations
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    parallel: u32,

    /// Only process files matching this glob (e.g. "**/*.py")
    #[arg(long)]
    file_pattern: Option<String>,

    /// Only process objects whose name matches this glob (e.g. "sd_to_*")
    #[arg(long)]
    object_pattern: Option<String>,

    /// Report what would change without writing any file
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show a unified diff of each improvement
    #[arg(short, long)]
    diff: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExportArgs {
    /// Files or directories to process (defaults to the current directory)
    paths: Vec<PathBuf>,

    /// Files to reconcile (defaults to exports.file_pattern, "**/__init__.py")
    #[arg(long)]
    file_pattern: Option<String>,

    /// Report which files would change without writing them
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show a unified diff of each rebuilt section
    #[arg(short, long)]
    diff: bool,
}

enum Status {
    Completed,
    Interrupted,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = telemetry::init(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("{} {e}", "error:".red());
        return ExitCode::from(1);
    }

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Docstrings(args) => cmd_docstrings(config, args).await,
            Commands::Exports(args) => cmd_exports(&config, args),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(Status::Completed) => ExitCode::SUCCESS,
        Ok(Status::Interrupted) => {
            info!("processing interrupted by user");
            ExitCode::from(130)
        }
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red());
            ExitCode::from(1)
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<ProcessingConfig> {
    let cwd = env::current_dir().context("failed to determine the working directory")?;
    Ok(config::resolve(explicit, &cwd)?)
}

fn default_paths(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    if !paths.is_empty() {
        return Ok(paths);
    }
    Ok(vec![
        env::current_dir().context("failed to determine the working directory")?
    ])
}

async fn cmd_docstrings(config: ProcessingConfig, args: DocstringArgs) -> Result<Status> {
    if args.parallel > PARALLEL_WARNING_THRESHOLD {
        warn!(
            parallel = args.parallel,
            "parallel count seems very high, consider reducing it"
        );
    }

    let paths = default_paths(args.paths)?;
    let files = discover::python_files(&paths, args.file_pattern.as_deref())?;
    let object_pattern = args
        .object_pattern
        .as_deref()
        .map(discover::compile_name_glob)
        .transpose()?;

    let backend = CliBackend::new(args.tool, &config.generation);
    let version = backend
        .probe()
        .await
        .with_context(|| format!("{} CLI is not available or not working", args.tool))?;
    info!(
        tool = %args.tool,
        version = %version,
        dry_run = args.dry_run,
        object_pattern = args.object_pattern.as_deref().unwrap_or("*"),
        "configuration"
    );

    if files.is_empty() {
        warn!("no Python files found to process");
        return Ok(Status::Completed);
    }

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let orchestrator = Orchestrator::new(
        GenerationClient::new(backend, config.generation.clone(), &config.formatting),
        ContentExtractor::new(config.context.clone()),
        AtomicWriter::default(),
        TextFormatter::new(config.formatting.single_line_threshold),
        RunOptions {
            dry_run: args.dry_run,
            parallel: args.parallel as usize,
            object_pattern,
        },
        cancel,
    );
    let report = orchestrator.run(&files).await;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render(args.diff));
    }

    Ok(if report.cancelled {
        Status::Interrupted
    } else {
        Status::Completed
    })
}

/// Cancel `token` on Ctrl-C (and SIGTERM on Unix).
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut terminate) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = terminate.recv() => {}
                    }
                }
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        warn!("interrupt received, letting in-flight writes finish");
        token.cancel();
    });
}

fn cmd_exports(config: &ProcessingConfig, args: ExportArgs) -> Result<Status> {
    let paths = default_paths(args.paths)?;
    let pattern = args
        .file_pattern
        .unwrap_or_else(|| config.exports.file_pattern.clone());
    let files = discover::python_files(&paths, Some(&pattern))?;
    let threshold = config.exports.group_gap_threshold;
    let writer = AtomicWriter::default();

    if args.dry_run {
        println!("{}", "[DRY RUN - no files will be modified]".cyan());
    }

    let mut total_updated = 0;
    let mut total_current = 0;
    let mut total_skipped = 0;
    let mut total_failed = 0;

    for file in &files {
        let result = if args.dry_run {
            exports::check(file, threshold)
        } else {
            exports::fix(&writer, file, threshold)
        };

        match result {
            Ok(report) => match &report.status {
                ExportStatus::NeedsUpdate {
                    current,
                    replacement,
                    ..
                } => {
                    let verb = if args.dry_run { "Would rebuild" } else { "Rebuilt" };
                    println!("{} {}: {verb} __all__", "✓".green(), file.display());
                    if args.diff {
                        println!("{}", format!("--- {} (original)", file.display()).dimmed());
                        println!("{}", format!("+++ {} (rebuilt)", file.display()).dimmed());
                        print!("{}", unified_diff(current, replacement));
                    }
                    total_updated += 1;
                }
                ExportStatus::UpToDate => {
                    println!("{} {}: Up to date", "⊙".yellow(), file.display());
                    total_current += 1;
                }
                ExportStatus::NoSections | ExportStatus::NoImports => {
                    total_skipped += 1;
                }
            },
            Err(e) => {
                eprintln!("{} {}: {e}", "✗".red(), file.display());
                total_failed += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    let updated_label = if args.dry_run { "to rebuild" } else { "rebuilt" };
    println!("  {} {updated_label}", total_updated.to_string().green());
    println!("  {} up to date", total_current.to_string().yellow());
    println!("  {} without sections or imports", total_skipped.to_string().cyan());
    println!("  {} failed", total_failed.to_string().red());

    Ok(Status::Completed)
}
