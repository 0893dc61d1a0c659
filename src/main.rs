use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use repo_collector::input::{InputProvider, PromptInput, read_query_or_cancel};
use repo_collector::types::DEFAULT_COUNT;
use repo_collector::{Collector, Config, Error, Event, Result, RunReport};

#[derive(Parser)]
#[command(name = "repo-collector")]
#[command(author, version, long_about = None)]
#[command(about = "Search GitHub, clone the top repositories, zip them")]
struct Cli {
    /// Search text; prompts interactively when absent
    #[arg(short, long)]
    query: Option<String>,

    /// Number of repositories to collect
    #[arg(short = 'n', long)]
    count: Option<String>,

    /// API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Directory receiving the workspace and the archive
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Parallel clone workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep the cloned repositories on disk
    #[arg(long)]
    keep_workspace: bool,

    /// Skip creating the zip archive
    #[arg(long)]
    no_archive: bool,

    #[arg(short, long)]
    verbose: bool,
}

/// Flag values first, terminal prompts for the rest
struct CliInput<R, W> {
    token: Option<String>,
    query: Option<String>,
    count: Option<String>,
    prompt: PromptInput<R, W>,
}

impl<R: std::io::BufRead, W: Write> InputProvider for CliInput<R, W> {
    fn token(&mut self) -> Result<String> {
        match (&self.token, &self.query) {
            (Some(token), _) => Ok(token.clone()),
            // Non-interactive runs without a token are anonymous.
            (None, Some(_)) => Ok(String::new()),
            (None, None) => self.prompt.token(),
        }
    }

    fn query(&mut self) -> Result<String> {
        match &self.query {
            Some(query) => Ok(query.clone()),
            None => self.prompt.query(),
        }
    }

    fn count(&mut self) -> Result<String> {
        match (&self.count, &self.query) {
            (Some(count), _) => Ok(count.clone()),
            (None, Some(_)) => Ok(DEFAULT_COUNT.to_string()),
            (None, None) => self.prompt.count(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    print_banner();

    match run(cli).await {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(Error::NotSupported(message)) => {
            eprintln!("\nError: {message}");
            eprintln!("Install git from https://git-scm.com/downloads");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("\nUnexpected error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "repo_collector=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.workspace.output_dir = dir.clone();
    }
    if let Some(workers) = cli.workers {
        config.pool.workers = workers;
    }
    if cli.keep_workspace {
        config.workspace.keep_workspace = true;
    }
    if cli.no_archive {
        config.workspace.archive = false;
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<RunReport> {
    let cancel = CancellationToken::new();
    repo_collector::cancel_on_signal(cancel.clone());
    let stopped = || RunReport {
        cancelled: true,
        ..Default::default()
    };

    let config = load_config(&cli)?;
    let collector = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(stopped()),
        collector = Collector::new(config) => collector?,
    };

    if cli.query.is_none() {
        println!("Please answer the following questions:\n");
    }
    let Cli {
        token, query, count, ..
    } = cli;
    let make_input = move || CliInput {
        token,
        query,
        count,
        prompt: PromptInput::stdio(),
    };
    let Some(query) = read_query_or_cancel(make_input, &cancel).await? else {
        return Ok(stopped());
    };
    println!(
        "\nSearching the top {} repositories for '{}'...",
        query.count(),
        query.text()
    );

    let bar = ProgressBar::hidden();
    let progress = tokio::spawn(drive_progress(collector.subscribe(), bar.clone()));

    let result = collector.run(&query, &cancel).await;

    progress.abort();
    bar.finish_and_clear();
    result
}

/// Mirror pipeline events onto the progress bar
async fn drive_progress(mut events: broadcast::Receiver<Event>, bar: ProgressBar) {
    loop {
        match events.recv().await {
            Ok(Event::SearchComplete { found }) if found > 0 => {
                println!("{found} repositories identified. Starting download...");
                bar.set_length(found as u64);
                bar.set_style(
                    ProgressStyle::with_template(concat!(
                        "Downloading {bar:40} {pos:>3}/{len:3} repos ",
                        "[{elapsed_precise} < {eta_precise}]"
                    ))
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar.set_draw_target(ProgressDrawTarget::stderr());
            }
            Ok(Event::SearchInterrupted { reason }) => {
                bar.suspend(|| eprintln!("Search stopped early: {reason}"));
            }
            Ok(Event::FetchFinished { progress, .. }) => {
                bar.set_position(progress.completed as u64);
            }
            Ok(Event::Cancelled { .. }) => {
                bar.abandon();
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_banner() {
    println!("\n{}", "=".repeat(60));
    println!("      GITHUB REPOSITORY COLLECTOR");
    println!("      Search -> Clone -> Zip");
    println!("{}\n", "=".repeat(60));
}

fn print_report(report: &RunReport) {
    if let Some(reason) = &report.search_interruption {
        println!("Search was cut short: {reason}");
    }

    if report.cancelled {
        println!("\nStopped by user.");
        if let Some(summary) = &report.summary {
            println!(
                "{} of {} repositories were downloaded before stopping.",
                summary.succeeded,
                summary.entries.len()
            );
        }
        return;
    }

    let Some(summary) = &report.summary else {
        println!("\nNo repositories found. Nothing to do.");
        return;
    };

    println!("\n{}", "=".repeat(60));
    println!(
        "Done: {} downloaded, {} skipped, {} failed (requested {}).",
        summary.succeeded, summary.skipped, summary.failed, summary.requested
    );
    if let Some(path) = &report.archive_path {
        println!("Your archive is ready:");
        println!("   {}", path.display());
    }
    if let Some(path) = &report.workspace_dir {
        println!("Repositories kept in {}", path.display());
    }
    println!("{}\n", "=".repeat(60));
}
