use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use review_context::config::Config;
use review_context::issues::jira::JiraClient;
use review_context::pipeline::{ContextPipeline, WorkingContext};
use review_context::pr::azure::AzureDevOpsClient;

/// review-context: collects an Azure DevOps pull request, its linked Jira
/// issues and per-file diffs into one Markdown document for review.
#[derive(Parser, Debug)]
#[command(name = "review-context", version, about)]
struct Cli {
    /// Pull request id
    #[arg(long = "pr")]
    pull_request_id: u64,

    /// Config file (defaults to .review-context.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override review.output_directory from the config
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the document to stdout instead of writing it
    #[arg(long)]
    no_write: bool,
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
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    info!("loading configuration");
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.review.output_directory = dir;
    }
    config.validate()?;

    let azure = &config.azure_devops;
    let source = AzureDevOpsClient::new(
        &azure.base_url,
        &azure.organization,
        &azure.project,
        &azure.repository_id,
        azure.personal_access_token.as_deref().unwrap_or_default(),
    )?;
    let jira = &config.jira;
    let tracker = JiraClient::new(
        &jira.base_url,
        jira.user.as_deref().unwrap_or_default(),
        jira.token.as_deref().unwrap_or_default(),
    )?;
    debug!(organization = %azure.organization, project = %azure.project, "clients ready");

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let mut pipeline = ContextPipeline::new(&source, &tracker, &config.review, token);
    if cli.no_write {
        let document = pipeline.assemble(cli.pull_request_id).await?;
        print!("{document}");
        print_summary(pipeline.context(), None);
    } else {
        let written = pipeline.run(cli.pull_request_id).await?;
        print_summary(pipeline.context(), written.as_deref());
    }
    info!(stage = %pipeline.stage(), "done");
    Ok(())
}

/// Short run summary on stderr so stdout stays usable for the document.
fn print_summary(ctx: &WorkingContext, written: Option<&std::path::Path>) {
    if let Some(details) = &ctx.details {
        eprintln!();
        eprintln!("PR #{}: \"{}\"", details.id, details.title);
    }
    let additions: usize = ctx.diffs.iter().map(|d| d.additions()).sum();
    let deletions: usize = ctx.diffs.iter().map(|d| d.deletions()).sum();
    eprintln!(
        "Files: {} | +{} -{} | Issues: {}",
        ctx.diffs.len(),
        additions,
        deletions,
        ctx.issues.len()
    );

    if !ctx.skipped.is_empty() {
        eprintln!("{}", format!("Skipped {} item(s):", ctx.skipped.len()).yellow());
        for item in &ctx.skipped {
            eprintln!("  • {} {}: {}", item.scope, item.item, item.reason);
        }
    }
    match written {
        Some(path) => eprintln!("{} {}", "Written:".green().bold(), path.display()),
        None => eprintln!("{}", "Document not written".yellow()),
    }
}
