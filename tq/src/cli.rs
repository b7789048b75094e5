//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Async task queue with durable results and live event streaming
#[derive(Debug, Parser)]
#[command(name = "tq", version, about)]
pub struct Cli {
    /// Path to a config file (default: .taskqueue.yml, then user config)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Socket path override for client commands
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the queue daemon in the foreground
    Serve,

    /// Submit a task and print its tracking id
    Queue {
        /// Registered task type (e.g. "dummy", "generate")
        task_type: String,

        /// Opaque input handed to the task's backend
        payload: String,

        /// Custom task id; generated when absent
        #[arg(long)]
        task_id: Option<String>,
    },

    /// Print the current status of a task
    Status {
        /// Task id to resolve
        task_id: String,
    },

    /// Follow a task's live event stream until it terminates
    Watch {
        /// Task id to follow
        task_id: String,
    },

    /// Check whether the daemon is alive
    Ping,

    /// Ask the daemon to stop gracefully
    Shutdown,
}
