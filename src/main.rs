use anyhow::{Context, Result};
use clap::Parser;
use roam_depot_publisher::cli::commands::{print_summary, SubmitCommand, UpdateCommand};
use roam_depot_publisher::cli::{Cli, Commands};
use roam_depot_publisher::{
    init_telemetry, CommandExecutor, GitClient, GitHubClient, ProcessCommandExecutor, PublisherConfig, StageContext,
    StageError, StandardFileSystem, TerminalFactProvider,
};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ {e:#}");
            if let Some(stage_error) = e.downcast_ref::<StageError>() {
                eprintln!("💡 {}", stage_error.hint());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let workspace = std::env::current_dir().context("Failed to read the current directory")?;

    PublisherConfig::load_env_file(&workspace)?;
    let config = PublisherConfig::load(&workspace)?;
    init_telemetry(&config.observability)?;

    let executor: Arc<dyn CommandExecutor> = Arc::new(ProcessCommandExecutor);
    let ctx = StageContext::new(
        Arc::new(GitClient::new(executor.clone())),
        Arc::new(GitHubClient::new(executor)),
        Arc::new(StandardFileSystem),
        Arc::new(config),
        workspace,
    );

    let mut provider = TerminalFactProvider::stdio();
    let run = match cli.command {
        Commands::Submit(args) => SubmitCommand::new(args).execute(&ctx, &mut provider).await?,
        Commands::Update(args) => UpdateCommand::new(args).execute(&ctx, &mut provider).await?,
    };

    print_summary(&run);
    Ok(run.outcome.is_success())
}
