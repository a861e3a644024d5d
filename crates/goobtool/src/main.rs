// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! goobtool - Goobergine server CLI
//!
//! # Usage
//!
//! ```bash
//! # Create the datastore in the working directory
//! goobtool db create
//!
//! # Serve on the default ports (public 8080, admin 127.0.0.1:8383)
//! goobtool serve
//!
//! # Serve for 30 seconds, then shut down
//! goobtool --shutdown-timeout 5s serve --port 9000 --exit-after 30s
//!
//! # Inspect the datastore
//! goobtool db verify
//! ```
//!
//! Exit status: 0 on success or clean shutdown, 1 on failure, 2 for
//! commands that are not implemented yet.

use anyhow::Result;
use clap::{Parser, Subcommand};
use goobtool::server::shutdown::spawn_signal_listener;
use goobtool::store::{self, create_store, verify_store};
use goobtool::{
    parse_duration, Bootstrap, BuildInfo, Logger, SchemaState, ServeConfig, Shutdown,
    ShutdownReason, StartupError, TracingLogger, EXPECTED_SCHEMA_VERSION,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "goobtool")]
#[command(about = "Goobergine server and datastore tool", long_about = None)]
#[command(version)]
struct Args {
    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Grace window for in-flight requests at shutdown
    #[arg(long, default_value = "15s", value_parser = parse_duration, global = true)]
    shutdown_timeout: Duration,

    /// Directory served under /public
    #[arg(long = "public", default_value = "public", global = true)]
    public_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the public and admin servers
    Serve {
        /// Public HTTP port
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Admin HTTP port
        #[arg(long, default_value_t = 8383)]
        admin_port: u16,

        /// Admin bind address (loopback only)
        #[arg(long, default_value = "127.0.0.1")]
        admin_host: String,

        /// Shut down on our own after this long
        #[arg(long, value_parser = parse_duration)]
        exit_after: Option<Duration>,
    },
    /// Datastore management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Create and initialize the datastore
    Create,
    /// Migrate the datastore to the current schema
    Upgrade,
    /// Print the datastore schema state as JSON
    Verify,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    let store_dir = store::default_store_dir();

    match args.command {
        Commands::Serve {
            port,
            admin_port,
            admin_host,
            exit_after,
        } => {
            let config = ServeConfig {
                store_dir,
                public_port: port,
                admin_port,
                admin_host,
                public_dir: args.public_dir,
                shutdown_timeout: args.shutdown_timeout,
                exit_after,
                ..Default::default()
            };
            serve(config, logger).await
        }
        Commands::Db { command } => db(command, &store_dir, logger),
    }
}

async fn serve(config: ServeConfig, logger: Arc<dyn Logger>) -> Result<ExitCode> {
    let build = BuildInfo::current();
    tracing::info!("goobtool {} starting", build.version);
    tracing::info!("  Datastore: {}", store::db_path(&config.store_dir).display());
    tracing::info!("  Public dir: {}", config.public_dir.display());
    tracing::info!("  Shutdown timeout: {:?}", config.shutdown_timeout);

    let shutdown = Shutdown::new();
    let signals = spawn_signal_listener(shutdown.clone(), Arc::clone(&logger));

    let prepared = match Bootstrap::prepare_until(config, build, logger, &shutdown).await {
        Ok(prepared) => prepared,
        Err(StartupError::Interrupted(_)) => {
            signals.abort();
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Err(e.into()),
    };
    let outcome = prepared.run(shutdown).await?;
    signals.abort();

    if outcome.reason == ShutdownReason::Restart {
        tracing::info!("restart requested; exiting");
    }
    Ok(ExitCode::SUCCESS)
}

fn db(command: DbCommands, dir: &std::path::Path, logger: Arc<dyn Logger>) -> Result<ExitCode> {
    match command {
        DbCommands::Create => {
            let path = create_store(dir, EXPECTED_SCHEMA_VERSION, logger)?;
            println!(
                "created datastore {} at schema {}",
                path.display(),
                EXPECTED_SCHEMA_VERSION
            );
            Ok(ExitCode::SUCCESS)
        }
        DbCommands::Upgrade => {
            eprintln!("db upgrade: not implemented");
            Ok(ExitCode::from(2))
        }
        DbCommands::Verify => {
            let report = verify_store(dir, EXPECTED_SCHEMA_VERSION, logger)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.state == SchemaState::Ready {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
