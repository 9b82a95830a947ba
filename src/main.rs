// ABOUTME: Entry point for the strato CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use strato::config;
use strato::error::Result;
use strato::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    let json = cli.json;
    let code = match run(cli.command, &mut output, json).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&e.to_string());
            1
        }
    };

    std::process::exit(code);
}

async fn run(command: Commands, output: &mut Output, json: bool) -> Result<i32> {
    match command {
        Commands::Init { stack, force } => {
            let cwd = std::env::current_dir()?;
            let path = config::init_config(&cwd, stack.as_deref(), force)?;
            output.success(&format!("wrote {}", path.display()));
            Ok(0)
        }
        Commands::Deploy {
            environment,
            dry_run,
            force,
            wait_time,
        } => commands::deploy(&environment, dry_run, force, wait_time, output, json).await,
        Commands::Teardown {
            environment,
            keep_data,
            restore_test,
            cleanup_all,
            force,
            wait_time,
        } => {
            commands::teardown(
                &environment,
                keep_data,
                restore_test,
                cleanup_all,
                force,
                wait_time,
                output,
                json,
            )
            .await
        }
        Commands::Audit {
            environment,
            category,
        } => commands::audit(&environment, category.as_deref(), output, json).await,
        Commands::Status { environment } => commands::status(&environment, output).await,
    }
}
