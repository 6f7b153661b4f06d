//! CLI argument parsing for tasklist.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tasklist::config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_REDIS_URL, DEFAULT_STATIC_DIR};
use tasklist::storage::DEFAULT_MAX_RETRIES;

#[derive(Parser)]
#[command(
    name = "tasklist",
    about = "Task list HTTP API backed by Redis",
    version = env!("GIT_DESCRIBE"),
    after_help = "Settings are also read from the environment and from a .env file."
)]
pub struct Cli {
    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = DEFAULT_REDIS_URL, global = true)]
    pub redis_url: String,

    /// Connection retries before giving up on Redis
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES, global = true)]
    pub connect_retries: u32,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Interface to listen on
        #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Directory with the built client application
        #[arg(long, env = "STATIC_DIR", default_value = DEFAULT_STATIC_DIR)]
        static_dir: PathBuf,

        /// Keep data in memory instead of Redis (lost on exit)
        #[arg(long)]
        memory: bool,
    },

    /// List tasks
    List,

    /// Create a new task
    Add {
        /// Task title
        title: String,

        /// Category name
        #[arg(short, long)]
        category: Option<String>,

        /// Tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },

    /// Mark a task as completed
    Done {
        /// Task ID
        id: String,
    },

    /// Delete a task
    Remove {
        /// Task ID
        id: String,
    },

    /// List categories
    Categories,

    /// Check that Redis is reachable
    Ping,
}
