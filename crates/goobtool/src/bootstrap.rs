// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Startup sequence for `serve`.
//!
//! ```text
//! validate config -> probe -> open -> check state -> select mode
//!                      |                                  |
//!                   Missing                        bind admin, public
//!                      v                                  v
//!               StoreMissing (nothing opened)          Prepared::run
//! ```
//!
//! Every failure after the datastore is opened closes it before returning.
//! A successful run closes it only after both listeners have stopped.
//! [`Bootstrap::prepare_until`] lets a shutdown signal abandon startup.

use crate::config::{BuildInfo, ConfigError, ServeConfig};
use crate::logging::Logger;
use crate::mode::ServingMode;
use crate::server::{AppState, Listeners, ServeError, ServeOutcome, Shutdown, ShutdownReason};
use crate::store::{self, SchemaState, Store, StoreError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Fatal startup and run errors.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("datastore not found at {}; run \"goobtool db create\" to create it", .path.display())]
    StoreMissing { path: PathBuf },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serve(#[from] ServeError),

    #[error("startup interrupted ({0:?})")]
    Interrupted(ShutdownReason),
}

/// Entry point of the startup sequence.
pub struct Bootstrap;

impl Bootstrap {
    /// Run every startup step up to and including binding both listeners.
    ///
    /// No request is served until [`Prepared::run`].
    pub async fn prepare(
        config: ServeConfig,
        build: BuildInfo,
        logger: Arc<dyn Logger>,
    ) -> Result<Prepared, StartupError> {
        config.validate()?;

        let path = store::db_path(&config.store_dir);
        if !store::probe(&config.store_dir)? {
            logger.error(format_args!("datastore not found at {}", path.display()));
            return Err(StartupError::StoreMissing { path });
        }

        let store = Store::open(&path, Arc::clone(&logger))?;

        let prepared = Self::select_and_bind(&store, &config, &build, logger.as_ref()).await;
        match prepared {
            Ok((mode, listeners)) => Ok(Prepared {
                mode,
                listeners,
                store: Arc::new(store),
                config,
                build,
                logger,
            }),
            Err(e) => {
                close_store(&store, logger.as_ref());
                Err(e)
            }
        }
    }

    /// [`prepare`](Self::prepare), abandoned as soon as `shutdown` fires.
    ///
    /// An abandoned startup drops whatever it had opened or bound, which
    /// closes the datastore and releases both ports.
    pub async fn prepare_until(
        config: ServeConfig,
        build: BuildInfo,
        logger: Arc<dyn Logger>,
        shutdown: &Shutdown,
    ) -> Result<Prepared, StartupError> {
        tokio::select! {
            biased;
            reason = shutdown.triggered() => {
                logger.info(format_args!("startup interrupted ({:?})", reason));
                Err(StartupError::Interrupted(reason))
            }
            prepared = Self::prepare(config, build, Arc::clone(&logger)) => prepared,
        }
    }

    async fn select_and_bind(
        store: &Store,
        config: &ServeConfig,
        build: &BuildInfo,
        logger: &dyn Logger,
    ) -> Result<(ServingMode, Listeners), StartupError> {
        let state = store.check_state(&build.schema_version)?;
        let Some(mode) = ServingMode::for_state(state) else {
            return Err(StartupError::StoreMissing {
                path: store.path().to_path_buf(),
            });
        };

        match state {
            SchemaState::Ready => logger.info(format_args!(
                "datastore ready at schema {}",
                build.schema_version
            )),
            other => logger.warn(format_args!(
                "datastore {} (expected schema {}); starting in {} mode",
                other, build.schema_version, mode
            )),
        }

        let listeners = Listeners::bind(config, logger).await?;
        Ok((mode, listeners))
    }
}

/// Startup completed: datastore open, mode selected, listeners bound.
pub struct Prepared {
    mode: ServingMode,
    listeners: Listeners,
    store: Arc<Store>,
    config: ServeConfig,
    build: BuildInfo,
    logger: Arc<dyn Logger>,
}

impl Prepared {
    pub fn mode(&self) -> ServingMode {
        self.mode
    }

    pub fn public_addr(&self) -> SocketAddr {
        self.listeners.public_addr()
    }

    pub fn admin_addr(&self) -> SocketAddr {
        self.listeners.admin_addr()
    }

    /// Serve until `shutdown` fires (or a listener fails), then close the
    /// datastore.
    pub async fn run(self, shutdown: Shutdown) -> Result<ServeOutcome, StartupError> {
        let state = Arc::new(AppState {
            mode: self.mode,
            build: self.build,
            store: Arc::clone(&self.store),
            public_dir: self.config.public_dir.clone(),
            shutdown,
            flush_delay: self.config.shutdown_flush_delay,
            logger: Arc::clone(&self.logger),
        });

        let result = self.listeners.serve(state, &self.config).await;
        close_store(&self.store, self.logger.as_ref());

        let outcome = result?;
        if outcome.forced {
            self.logger
                .warn(format_args!("shutdown completed after forced close"));
        } else {
            self.logger.info(format_args!("shutdown complete"));
        }
        Ok(outcome)
    }
}

fn close_store(store: &Store, logger: &dyn Logger) {
    if let Err(e) = store.close() {
        logger.error(format_args!("failed to close datastore: {}", e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EXPECTED_SCHEMA_VERSION;
    use crate::logging::MemoryLogger;
    use crate::store::create_store;
    use std::time::Duration;
    use tracing::Level;

    fn config(dir: &std::path::Path) -> ServeConfig {
        ServeConfig {
            store_dir: dir.to_path_buf(),
            public_port: 0,
            admin_port: 0,
            shutdown_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_store_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());

        let err = Bootstrap::prepare(config(dir.path()), BuildInfo::current(), logger.clone())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, StartupError::StoreMissing { .. }));
        assert!(err.to_string().contains("run \"goobtool db create\" to create it"));
        assert!(!store::db_path(dir.path()).exists());
    }

    #[tokio::test]
    async fn test_non_loopback_admin_host_rejected_before_open() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        let config = ServeConfig {
            admin_host: "0.0.0.0".into(),
            ..config(dir.path())
        };

        let err = Bootstrap::prepare(config, BuildInfo::current(), logger.clone())
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            StartupError::Config(ConfigError::AdminHostNotLoopback(_))
        ));
        assert!(!logger.contains(Level::DEBUG, "opened datastore"));
    }

    #[tokio::test]
    async fn test_ready_store_selects_normal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        create_store(dir.path(), EXPECTED_SCHEMA_VERSION, logger.clone()).unwrap();

        let prepared = Bootstrap::prepare(config(dir.path()), BuildInfo::current(), logger.clone())
            .await
            .unwrap();

        assert_eq!(prepared.mode(), ServingMode::Normal);
        assert!(prepared.admin_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_version_mismatch_selects_installation_mode() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        create_store(dir.path(), "0.0-old", logger.clone()).unwrap();

        let prepared = Bootstrap::prepare(config(dir.path()), BuildInfo::current(), logger.clone())
            .await
            .unwrap();

        assert_eq!(prepared.mode(), ServingMode::Installation);
        assert!(logger.contains(Level::WARN, "starting in installation mode"));
    }

    #[tokio::test]
    async fn test_bind_failure_closes_store() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        create_store(dir.path(), EXPECTED_SCHEMA_VERSION, logger.clone()).unwrap();

        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServeConfig {
            admin_port: taken.local_addr().unwrap().port(),
            ..config(dir.path())
        };

        let err = Bootstrap::prepare(config, BuildInfo::current(), logger.clone())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, StartupError::Serve(ServeError::Bind { .. })));
        let count = |prefix: &str| {
            logger
                .records()
                .iter()
                .filter(|r| r.message.starts_with(prefix))
                .count()
        };
        assert_eq!(count("opened datastore"), 2);
        assert_eq!(count("closed datastore"), 2);
    }

    #[tokio::test]
    async fn test_run_closes_store_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        create_store(dir.path(), EXPECTED_SCHEMA_VERSION, logger.clone()).unwrap();

        let prepared = Bootstrap::prepare(config(dir.path()), BuildInfo::current(), logger.clone())
            .await
            .unwrap();
        let shutdown = Shutdown::new();
        shutdown.trigger_after(Duration::from_millis(50), ShutdownReason::Signal);

        let outcome = prepared.run(shutdown).await.unwrap();
        assert_eq!(outcome.reason, ShutdownReason::Signal);

        let messages: Vec<String> = logger.records().into_iter().map(|r| r.message).collect();
        let stopped = messages.iter().rposition(|m| m == "listeners stopped").unwrap();
        let closed = messages
            .iter()
            .rposition(|m| m.starts_with("closed datastore"))
            .unwrap();
        assert!(stopped < closed);
    }

    #[tokio::test]
    async fn test_signal_before_prepare_interrupts_startup() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        create_store(dir.path(), EXPECTED_SCHEMA_VERSION, logger.clone()).unwrap();
        let opened_before = logger
            .records()
            .iter()
            .filter(|r| r.message.starts_with("opened datastore"))
            .count();

        let shutdown = Shutdown::new();
        shutdown.trigger(ShutdownReason::Signal);
        let err = Bootstrap::prepare_until(
            config(dir.path()),
            BuildInfo::current(),
            logger.clone(),
            &shutdown,
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(err, StartupError::Interrupted(ShutdownReason::Signal)));
        let opened_after = logger
            .records()
            .iter()
            .filter(|r| r.message.starts_with("opened datastore"))
            .count();
        assert_eq!(opened_before, opened_after);
    }

    #[tokio::test]
    async fn test_prepare_until_completes_without_signal() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        create_store(dir.path(), EXPECTED_SCHEMA_VERSION, logger.clone()).unwrap();

        let shutdown = Shutdown::new();
        let prepared = Bootstrap::prepare_until(
            config(dir.path()),
            BuildInfo::current(),
            logger.clone(),
            &shutdown,
        )
        .await
        .unwrap();
        assert_eq!(prepared.mode(), ServingMode::Normal);

        // a signal that lands right after startup still ends the run
        shutdown.trigger(ShutdownReason::Signal);
        let outcome = tokio::time::timeout(Duration::from_secs(5), prepared.run(shutdown))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.reason, ShutdownReason::Signal);
    }
}
