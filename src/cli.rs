// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "strato")]
#[command(about = "Deployment lifecycle orchestrator for cloud infrastructure stacks")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON events instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new strato.yml configuration file
    Init {
        /// Stack name to seed the template with
        #[arg(short, long)]
        stack: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Validate, deploy, and verify a stack
    Deploy {
        /// Target environment (dev, staging, prod)
        environment: String,

        /// Run pre-deploy checks only; issue no mutating calls
        #[arg(long)]
        dry_run: bool,

        /// Skip interactive approval where the tier policy allows it
        #[arg(long, visible_alias = "auto-approve")]
        force: bool,

        /// Override the poll timeout, in seconds
        #[arg(long)]
        wait_time: Option<u64>,
    },

    /// Destroy a stack, honoring the data-preservation policy
    Teardown {
        /// Target environment (dev, staging, prod)
        environment: String,

        /// Take a final snapshot of the data store before destroying
        #[arg(long)]
        keep_data: bool,

        /// Restore-test the final snapshot before destroying
        #[arg(long, requires = "keep_data")]
        restore_test: bool,

        /// Also remove expired restore-test resources
        #[arg(long)]
        cleanup_all: bool,

        /// Skip interactive approval where the tier policy allows it
        #[arg(long, visible_alias = "auto-approve")]
        force: bool,

        /// Override the poll timeout, in seconds
        #[arg(long)]
        wait_time: Option<u64>,
    },

    /// Run the full check set against a stack without mutating it
    Audit {
        /// Target environment (dev, staging, prod)
        environment: String,

        /// Restrict to one category (connectivity, security, encryption,
        /// cost, monitoring)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show the stack's current status
    Status {
        /// Target environment (dev, staging, prod)
        environment: String,
    },
}
