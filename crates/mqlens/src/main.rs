// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! mqlens - browse and manage message queues across brokers.
//!
//! This is the binary entry point. Every invocation loads the config, opens
//! the local database, runs one command through the connection manager and
//! disconnects on the way out.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod context;
mod error;
mod output;
mod profiles;
mod queues;
mod topics;
mod vault;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::context::AppContext;
use crate::error::CliResult;
use crate::output::Output;
use crate::profiles::ProfilesCommand;
use crate::queues::{BrowseArgs, PayloadArgs};
use crate::topics::ChannelCommand;
use crate::vault::VaultCommand;

/// mqlens - browse and manage message queues across brokers.
#[derive(Parser, Debug)]
#[command(name = "mqlens", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the standard lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colors.
    #[arg(long, global = true)]
    plain: bool,
    /// Override logging.level for this run.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage connection profiles.
    Profiles {
        #[command(subcommand)]
        action: ProfilesCommand,
    },
    /// List broker adapters and their status.
    Adapters,
    /// List queues, optionally filtered by a name pattern (`*` wildcards).
    Queues {
        #[arg(long, short)]
        profile: String,
        filter: Option<String>,
    },
    /// Show a queue's properties.
    Queue {
        #[arg(long, short)]
        profile: String,
        queue: String,
    },
    /// Show messages without removing them.
    Browse {
        #[arg(long, short)]
        profile: String,
        #[command(flatten)]
        args: BrowseArgs,
    },
    /// Put a message on a queue.
    Put {
        #[arg(long, short)]
        profile: String,
        queue: String,
        #[command(flatten)]
        payload: PayloadArgs,
    },
    /// Delete messages by id.
    Delete {
        #[arg(long, short)]
        profile: String,
        queue: String,
        #[arg(required = true)]
        message_ids: Vec<String>,
    },
    /// Remove every message from a queue.
    Clear {
        #[arg(long, short)]
        profile: String,
        queue: String,
        /// Confirm the clear.
        #[arg(long)]
        yes: bool,
    },
    /// List topics.
    Topics {
        #[arg(long, short)]
        profile: String,
        filter: Option<String>,
    },
    /// Publish a message to a topic.
    Publish {
        #[arg(long, short)]
        profile: String,
        topic: String,
        #[command(flatten)]
        payload: PayloadArgs,
    },
    /// List channels.
    Channels {
        #[arg(long, short)]
        profile: String,
        filter: Option<String>,
    },
    /// Inspect, start or stop a channel.
    Channel {
        #[command(subcommand)]
        action: ChannelCommand,
    },
    /// Manage the encrypted secret vault.
    Vault {
        #[command(subcommand)]
        action: VaultCommand,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.plain {
        colored::control::set_override(false);
    }

    let loaded = match &cli.config {
        Some(path) => mqlens_config::load_and_validate_path(path),
        None => mqlens_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            mqlens_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(cli.log_level.as_deref().unwrap_or(&config.logging.level));

    let ctx = match AppContext::open(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let result = dispatch(&ctx, Output::new(cli.json), cli.command).await;
    ctx.shutdown().await;

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn dispatch(ctx: &AppContext, out: Output, command: Commands) -> CliResult {
    match command {
        Commands::Profiles { action } => profiles::run(ctx, out, action).await,
        Commands::Adapters => profiles::adapters(ctx, out),
        Commands::Queues { profile, filter } => {
            queues::list(ctx, out, &profile, filter.as_deref()).await
        }
        Commands::Queue { profile, queue } => queues::show(ctx, out, &profile, &queue).await,
        Commands::Browse { profile, args } => queues::browse(ctx, out, &profile, &args).await,
        Commands::Put {
            profile,
            queue,
            payload,
        } => queues::put(ctx, out, &profile, &queue, &payload).await,
        Commands::Delete {
            profile,
            queue,
            message_ids,
        } => queues::delete(ctx, out, &profile, &queue, &message_ids).await,
        Commands::Clear {
            profile,
            queue,
            yes,
        } => queues::clear(ctx, out, &profile, &queue, yes).await,
        Commands::Topics { profile, filter } => {
            topics::list_topics(ctx, out, &profile, filter.as_deref()).await
        }
        Commands::Publish {
            profile,
            topic,
            payload,
        } => topics::publish(ctx, out, &profile, &topic, &payload).await,
        Commands::Channels { profile, filter } => {
            topics::list_channels(ctx, out, &profile, filter.as_deref()).await
        }
        Commands::Channel { action } => topics::channel(ctx, out, action).await,
        Commands::Vault { action } => vault::run(ctx, out, action).await,
    }
}

/// Logs go to stderr so `--json` output on stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mqlens={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
