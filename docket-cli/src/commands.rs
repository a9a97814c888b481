//! CLI Commands
//!
//! Command definitions for the Docket CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Docket document API
#[derive(Parser, Debug)]
#[command(name = "docket")]
#[command(version)]
#[command(about = "Multi-tenant document API with realtime change notification")]
#[command(long_about = "Runs the Docket REST and realtime tiers as worker pools.\n\n\
    One instance per deployment is the primary: it bootstraps the store and \
    relays activity events to realtime workers.")]
pub struct Cli {
    /// Instance role: primary or secondary (env: DOCKET_ROLE)
    #[arg(long, env = "DOCKET_ROLE", default_value = "primary")]
    pub role: String,

    /// Workers per tier, defaults to the core count (env: DOCKET_WORKERS)
    #[arg(short, long, env = "DOCKET_WORKERS")]
    pub workers: Option<usize>,

    /// REST listener address (env: DOCKET_REST_ADDR)
    #[arg(long, env = "DOCKET_REST_ADDR", default_value = "0.0.0.0:3000")]
    pub rest_addr: String,

    /// Realtime gateway address (env: DOCKET_REALTIME_ADDR)
    #[arg(long, env = "DOCKET_REALTIME_ADDR", default_value = "0.0.0.0:3001")]
    pub realtime_addr: String,

    /// Host realtime workers bind their own ports on (env: DOCKET_WORKER_HOST)
    #[arg(long, env = "DOCKET_WORKER_HOST", default_value = "127.0.0.1")]
    pub worker_host: String,

    /// Document store: mem or sled:<path> (env: DOCKET_STORE)
    #[arg(long, env = "DOCKET_STORE", default_value = "mem")]
    pub store: String,

    /// Broker: mem or tcp://host:port (env: DOCKET_BROKER)
    #[arg(long, env = "DOCKET_BROKER", default_value = "mem")]
    pub broker: String,

    /// Where the primary writes the root credential (env: DOCKET_CREDENTIAL_PATH)
    #[arg(long, env = "DOCKET_CREDENTIAL_PATH", default_value = "docket-root.json")]
    pub credential_path: PathBuf,

    /// Disable permissive CORS on the REST tier
    #[arg(long)]
    pub no_cors: bool,

    /// Log level (env: DOCKET_LOG_LEVEL)
    #[arg(long, env = "DOCKET_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format: pretty, json or compact (env: DOCKET_LOG_FORMAT)
    #[arg(long, env = "DOCKET_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the REST and realtime tiers
    Serve,

    /// Run the REST tier only
    Rest,

    /// Run the realtime tier only
    Realtime,

    /// Run a TCP broker server
    Broker {
        /// Address to listen on (env: DOCKET_BROKER_LISTEN)
        #[arg(short, long, env = "DOCKET_BROKER_LISTEN", default_value = "0.0.0.0:7400")]
        listen: String,
    },

    /// Schema tooling
    #[command(subcommand)]
    Schema(SchemaCommands),
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommands {
    /// Print each collection's property tree as dot paths
    Flatten {
        /// Schema file (JSON array of collections); the built-in schema if omitted
        file: Option<PathBuf>,

        /// Only this collection
        #[arg(short, long)]
        collection: Option<String>,
    },
}
