use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "objdb", about = "Object-store-backed resource/queue/graph/inventory runtime", version)]
pub struct Cli {
    /// Path to the cluster's YAML configuration document.
    #[arg(long, short = 'c', env = "OBJDB_CONFIG")]
    pub config: PathBuf,

    /// Blob store root: a local directory path, or "memory" for an
    /// in-process, non-durable store (local development / tests only).
    #[arg(long, env = "OBJDB_STORE", default_value = "memory")]
    pub store: String,

    /// Stable identity for this process, used as the lease/lock holder id
    /// across queue, coordinator, and inventory sync acquisitions.
    #[arg(long, env = "OBJDB_WORKER_ID")]
    pub worker_id: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Wire the configured resources, queues, graphs, replication fabric
    /// and inventory engine together and serve the Prometheus/health
    /// surface until interrupted.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,

        #[arg(long, default_value_t = 9090)]
        port: u16,

        /// Require `Authorization: Bearer <token>` on `/metrics`.
        #[arg(long, env = "OBJDB_AUTH_TOKEN")]
        auth_token: Option<String>,
    },

    /// Load the configuration and print a summary of what it declares —
    /// resources, queues, graphs, replicators, inventory clusters — without
    /// starting any server or background task.
    Inspect {
        /// Print as JSON instead of a human-readable summary.
        #[arg(long)]
        json: bool,
    },
}
