//! Docket CLI - Command Line Interface
//!
//! Runs the Docket service tiers and offers schema tooling.
//!
//! # Usage
//!
//! ```text
//! docket [OPTIONS] <COMMAND>
//!
//! Commands:
//!   serve     Run the REST and realtime tiers
//!   rest      Run the REST tier only
//!   realtime  Run the realtime tier only
//!   broker    Run a TCP broker server
//!   schema    Schema tooling
//!
//! Options:
//!       --role <ROLE>        primary or secondary [default: primary]
//!   -w, --workers <N>        Workers per tier [default: core count]
//!       --store <STORE>      mem or sled:<path> [default: mem]
//!       --broker <BROKER>    mem or tcp://host:port [default: mem]
//! ```
//!
//! # Examples
//!
//! ## Single instance, persistent store
//! ```text
//! docket --store sled:./data serve
//! ```
//!
//! ## Two instances sharing a broker
//! ```text
//! docket broker --listen 0.0.0.0:7400
//! docket --broker tcp://10.0.0.5:7400 --store sled:/srv/docket serve
//! docket --role secondary --broker tcp://10.0.0.5:7400 --store sled:/srv/docket rest
//! ```

pub mod commands;
pub mod error;
pub mod handler;

pub use commands::{Cli, Commands, SchemaCommands};
pub use error::{CliError, CliResult};

/// Docket CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
