mod collect;
mod config;
mod github;
mod pr;

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// PR Harvester — collects merged GitHub Pull Requests, their linked issues
/// and line-level diffs into a newline-delimited JSON file. Re-running resumes
/// from the records already in that file.
#[derive(Parser, Debug)]
#[command(name = "pr-harvester", version, about)]
struct Cli {
    /// Repository to collect from: OWNER/REPO or https://github.com/OWNER/REPO
    ///
    /// Overrides github.repository from the config file.
    repository: Option<String>,

    /// Config file (defaults to .pr-harvester.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSONL file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop once the output file holds this many pull requests
    #[arg(long)]
    max_prs: Option<usize>,

    /// Number of pull requests enriched concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// GitHub REST API base URL
    #[arg(long)]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run aborted");
            eprintln!("{} {}", "An error occurred:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    info!("loading configuration");
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(repository) = cli.repository {
        config.github.repository = Some(repository);
    }
    if let Some(output) = cli.output {
        config.collect.output = output;
    }
    if let Some(max_prs) = cli.max_prs {
        config.collect.max_prs = max_prs;
    }
    if let Some(workers) = cli.workers {
        config.collect.workers = workers;
    }
    if let Some(api_url) = cli.api_url {
        config.github.api_url = api_url;
    }
    config.validate()?;

    let repo = pr::parse_repo(config.repository()?)?;
    let token = config.github_token()?;
    debug!(owner = %repo.owner, repo = %repo.repo, api_url = %config.github.api_url, "resolved repository");

    let output = &config.collect.output;
    let processed = collect::load_processed_ids(output)?;
    let sink = collect::JsonlSink::open(output)?;
    info!(path = %sink.path().display(), processed = processed.len(), "loaded resume state");

    let options = config.collect_options();
    if processed.len() >= options.max_prs {
        println!(
            "{}",
            format!("Already processed {} PRs. Exiting.", processed.len()).green()
        );
        return Ok(());
    }

    let client = github::GitHubClient::new(&config.github.api_url, token, config.retry_policy());
    let collector = collect::Collector::new(client, repo, sink, options);
    let summary = collector.run(&processed).await?;

    println!(
        "{}",
        format!("Processed {} new PRs.", summary.appended).green().bold()
    );
    if summary.failed > 0 {
        println!(
            "{}",
            format!("{} PRs failed and will be retried on the next run.", summary.failed).yellow()
        );
    }
    info!(
        appended = summary.appended,
        failed = summary.failed,
        total = summary.previously_processed + summary.appended,
        "done"
    );

    Ok(())
}
