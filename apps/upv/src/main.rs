// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::{Parser, Subcommand};
use tracing::error;
use upview_api::status::PipeAction;

#[derive(Parser, Debug)]
#[command(author, version, about = "UPipe pipeline viewer", long_about = None)]
struct Cli {
    /// Node controller to talk to, as host:port or an http(s) URL
    #[arg(short, long, env = "UPV_SERVER", default_value = "localhost:852", global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered nodes (GET /view/nodes)
    Nodes,
    /// List registered pipes (GET /view/pipes)
    Pipes,
    /// List registered queues (GET /view/queues)
    Queues,
    /// Print a pipe's processor tree with entry processors marked
    Tree {
        /// Pipe id or name
        pipe: String,
    },
    /// Stream a pipe's status and queue events until Ctrl-C
    Watch {
        /// Pipe id or name
        pipe: String,
    },
    /// Stream a node's utilization snapshots until Ctrl-C
    Stats {
        /// Node id or name
        node: String,
    },
    /// Start a pipe and report the next status
    Start {
        /// Pipe id or name
        pipe: String,
    },
    /// Pause a pipe and report the next status
    Pause {
        /// Pipe id or name
        pipe: String,
    },
    /// Restart a pipe and report the next status
    Restart {
        /// Pipe id or name
        pipe: String,
    },
    /// Terminate a pipe and report the next status
    Terminate {
        /// Pipe id or name
        pipe: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("upv=info,upview_core=info")),
        )
        .init();

    let cli = Cli::parse();
    let server = cli.server;

    let result = match cli.command {
        Commands::Nodes => upview_client::list_nodes(&server).await,
        Commands::Pipes => upview_client::list_pipes(&server).await,
        Commands::Queues => upview_client::list_queues(&server).await,
        Commands::Tree { pipe } => upview_client::show_tree(&pipe, &server).await,
        Commands::Watch { pipe } => upview_client::watch_pipe(&pipe, &server).await,
        Commands::Stats { node } => upview_client::watch_node(&node, &server).await,
        Commands::Start { pipe } => {
            upview_client::control_pipe(&pipe, PipeAction::Start, &server).await
        },
        Commands::Pause { pipe } => {
            upview_client::control_pipe(&pipe, PipeAction::Pause, &server).await
        },
        Commands::Restart { pipe } => {
            upview_client::control_pipe(&pipe, PipeAction::Restart, &server).await
        },
        Commands::Terminate { pipe } => {
            upview_client::control_pipe(&pipe, PipeAction::Terminate, &server).await
        },
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}
