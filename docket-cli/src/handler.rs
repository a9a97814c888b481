//! Command Handlers

use docket_broker::{BrokerConfig, BrokerServer, TransportConfig};
use docket_cluster::{ClusterConfig, ClusterSupervisor, InstanceRole};
use docket_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use docket_core::{builtin_schema, flatten, Schema};
use docket_db::{Datastore, StorageConfig};
use serde_json::{Map, Value};
use std::path::Path;

use crate::commands::{Cli, Commands, SchemaCommands};
use crate::error::{CliError, CliResult};

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> CliResult<()> {
    match &cli.command {
        Commands::Schema(SchemaCommands::Flatten { file, collection }) => {
            let flattened = flatten_file(file.as_deref(), collection.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&flattened)?);
            Ok(())
        }
        Commands::Broker { listen } => {
            init_cli_logging(&cli)?;
            handle_broker(listen).await
        }
        Commands::Serve => {
            init_cli_logging(&cli)?;
            let supervisor = build_supervisor(&cli).await?;
            supervisor.run(shutdown_signal()).await?;
            Ok(())
        }
        Commands::Rest => {
            init_cli_logging(&cli)?;
            warn_local_broker(&cli);
            let supervisor = build_supervisor(&cli).await?;
            let rest = supervisor.start_rest().await?;
            println!("REST tier listening on {} ({} workers)", rest.addr, rest.workers());
            shutdown_signal().await;
            rest.shutdown().await?;
            Ok(())
        }
        Commands::Realtime => {
            init_cli_logging(&cli)?;
            warn_local_broker(&cli);
            let supervisor = build_supervisor(&cli).await?;
            let realtime = supervisor.start_realtime().await?;
            println!("Realtime gateway listening on {}", realtime.addr);
            shutdown_signal().await;
            realtime.shutdown().await?;
            Ok(())
        }
    }
}

fn init_cli_logging(cli: &Cli) -> CliResult<()> {
    let config = LogConfig {
        level: cli.log_level.parse::<LogLevel>().map_err(CliError::config)?,
        format: cli.log_format.parse::<LogFormat>().map_err(CliError::config)?,
        ..LogConfig::default()
    };
    init_logging(&config).map_err(|e| CliError::config(e.to_string()))
}

/// Cluster configuration from CLI options
pub fn cluster_config(cli: &Cli) -> CliResult<ClusterConfig> {
    let role: InstanceRole = cli.role.parse()?;
    let defaults = ClusterConfig::default();
    Ok(ClusterConfig {
        role,
        workers: cli.workers.unwrap_or(defaults.workers),
        rest_addr: cli.rest_addr.clone(),
        realtime_addr: cli.realtime_addr.clone(),
        worker_host: cli.worker_host.clone(),
        credential_path: cli.credential_path.clone(),
        enable_cors: !cli.no_cors,
    })
}

async fn build_supervisor(cli: &Cli) -> CliResult<ClusterSupervisor> {
    let config = cluster_config(cli)?;
    let datastore = Datastore::open(&StorageConfig::parse(&cli.store)?)?;
    let broker = BrokerConfig::parse(&cli.broker)?.connect().await?;
    tracing::info!(
        role = %config.role,
        workers = config.worker_count(),
        store = datastore.kind(),
        broker = %cli.broker,
        "Configuration loaded"
    );
    Ok(ClusterSupervisor::new(config, datastore, broker))
}

fn warn_local_broker(cli: &Cli) {
    if matches!(BrokerConfig::parse(&cli.broker), Ok(BrokerConfig::Memory)) {
        tracing::warn!("In-process broker: no other instance will see this tier's events");
    }
}

async fn handle_broker(listen: &str) -> CliResult<()> {
    let server = BrokerServer::bind(listen, TransportConfig::default()).await?;
    println!("Broker listening on {}", server.local_addr()?);
    tokio::select! {
        result = server.run() => result?,
        _ = shutdown_signal() => {}
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Flatten every collection of a schema file, or of the built-in schema
pub fn flatten_file(file: Option<&Path>, collection: Option<&str>) -> CliResult<Value> {
    let schema: Schema = match file {
        Some(path) => serde_json::from_slice(&std::fs::read(path)?)?,
        None => builtin_schema()?,
    };
    flatten_schema(&schema, collection)
}

/// `{collection: {dot.path: fieldConfig}}`
pub fn flatten_schema(schema: &Schema, collection: Option<&str>) -> CliResult<Value> {
    let mut out = Map::new();
    for entry in schema {
        if collection.is_some_and(|name| name != entry.name) {
            continue;
        }
        out.insert(entry.name.clone(), serde_json::to_value(flatten(&entry.properties))?);
    }
    if let Some(name) = collection {
        if out.is_empty() {
            return Err(CliError::invalid_arg(format!("no collection named {}", name)));
        }
    }
    Ok(Value::Object(out))
}
