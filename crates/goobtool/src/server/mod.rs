// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dual-listener orchestration.
//!
//! ```text
//! Listeners::bind          admin (loopback, verified twice) + public (0.0.0.0)
//!       |
//! Listeners::serve         two accept loops, one Shutdown, one error channel
//!       |
//! first of: signal | exit-after timer | admin route | listener error
//!       |
//! graceful drain, bounded by shutdown_timeout, then abort every connection
//! ```

pub mod admin;
pub mod bind;
pub mod error;
pub mod guard;
pub mod public;
pub mod shutdown;

pub use error::{ApiError, ServeError};
pub use shutdown::{Shutdown, ShutdownReason};

use crate::config::{BuildInfo, ServeConfig};
use crate::logging::Logger;
use crate::mode::ServingMode;
use crate::store::{Store, StoreError};
use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// State shared by every handler on both channels.
pub struct AppState {
    pub mode: ServingMode,
    pub build: BuildInfo,
    pub store: Arc<Store>,
    pub public_dir: PathBuf,
    pub shutdown: Shutdown,
    pub flush_delay: Duration,
    pub logger: Arc<dyn Logger>,
}

impl AppState {
    /// Recorded schema version, read off the async workers.
    pub async fn recorded_schema_version(&self) -> Result<Option<String>, StoreError> {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.schema_version()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Closed),
        }
    }
}

/// How a completed run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOutcome {
    pub reason: ShutdownReason,
    /// Grace window elapsed and open connections were aborted
    pub forced: bool,
}

/// Both bound listeners, ready to serve.
pub struct Listeners {
    public: TcpListener,
    public_addr: SocketAddr,
    admin: TcpListener,
    admin_addr: SocketAddr,
}

impl Listeners {
    /// Bind the admin channel, then the public one.
    ///
    /// If the public bind fails the already-bound admin listener is dropped
    /// before the error is returned.
    pub async fn bind(config: &ServeConfig, logger: &dyn Logger) -> Result<Self, ServeError> {
        let (admin, admin_addr) =
            bind::bind_admin(&config.admin_host, config.admin_port, logger).await?;
        let (public, public_addr) = bind::bind_public(config.public_port).await?;

        Ok(Self {
            public,
            public_addr,
            admin,
            admin_addr,
        })
    }

    pub fn public_addr(&self) -> SocketAddr {
        self.public_addr
    }

    pub fn admin_addr(&self) -> SocketAddr {
        self.admin_addr
    }

    /// Run both channels until shutdown, then drain them within the grace
    /// window.
    ///
    /// A listener that fails on its own triggers shutdown of the other and
    /// is reported as the error once both have stopped.
    pub async fn serve(
        self,
        state: Arc<AppState>,
        config: &ServeConfig,
    ) -> Result<ServeOutcome, ServeError> {
        let shutdown = state.shutdown.clone();
        let logger = Arc::clone(&state.logger);
        let (err_tx, mut err_rx) = mpsc::channel::<ServeError>(2);

        let public_app = public::routes(Arc::clone(&state));
        let admin_app = admin::routes(Arc::clone(&state));

        logger.info(format_args!(
            "public server listening on {} ({} mode)",
            self.public_addr, state.mode
        ));
        logger.info(format_args!(
            "admin server listening on {} (JSON-only)",
            self.admin_addr
        ));

        let grace = config.shutdown_timeout;
        let public_task = spawn_listener(
            "public",
            self.public,
            public_app,
            shutdown.clone(),
            grace,
            err_tx.clone(),
            Arc::clone(&logger),
        );
        let admin_task = spawn_listener(
            "admin",
            self.admin,
            admin_app,
            shutdown.clone(),
            grace,
            err_tx,
            Arc::clone(&logger),
        );

        let timer = config.exit_after.map(|after| {
            logger.info(format_args!("exit-after timer set: {:?}", after));
            shutdown.trigger_after(after, ShutdownReason::Timer)
        });

        let mut failure = None;
        tokio::select! {
            reason = shutdown.triggered() => {
                logger.info(format_args!("shutting down: {}", reason));
            }
            Some(err) = err_rx.recv() => {
                logger.error(format_args!("server error: {}", err));
                shutdown.trigger(ShutdownReason::ListenerFailed(err.to_string()));
                failure = Some(err);
            }
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        // Each listener bounds its own drain by the grace window.
        let (public_forced, admin_forced) = tokio::join!(public_task, admin_task);
        let mut forced = false;
        for (channel, joined) in [("public", public_forced), ("admin", admin_forced)] {
            match joined {
                Ok(f) => forced |= f,
                Err(e) => {
                    logger.error(format_args!("{} listener task failed: {}", channel, e));
                    forced = true;
                }
            }
        }

        while let Ok(err) = err_rx.try_recv() {
            logger.error(format_args!("server error during shutdown: {}", err));
            failure.get_or_insert(err);
        }

        logger.info(format_args!("listeners stopped"));

        match failure {
            Some(err) => Err(err),
            None => Ok(ServeOutcome {
                reason: shutdown.reason().unwrap_or(ShutdownReason::Signal),
                forced,
            }),
        }
    }
}

fn spawn_listener(
    channel: &'static str,
    listener: TcpListener,
    app: Router,
    shutdown: Shutdown,
    grace: Duration,
    errors: mpsc::Sender<ServeError>,
    logger: Arc<dyn Logger>,
) -> JoinHandle<bool> {
    tokio::spawn(run_listener(
        channel, listener, app, shutdown, grace, errors, logger,
    ))
}

/// Accept loop for one channel.
///
/// Connections live in a `JoinSet` owned by this task. On shutdown the
/// listener is closed, connections are asked to finish, and whatever is
/// still running when `grace` elapses is aborted and awaited. Returns `true`
/// if that abort was needed.
async fn run_listener(
    channel: &'static str,
    listener: TcpListener,
    app: Router,
    shutdown: Shutdown,
    grace: Duration,
    errors: mpsc::Sender<ServeError>,
    logger: Arc<dyn Logger>,
) -> bool {
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.triggered() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let service = TowerToHyperService::new(app.clone());
                    let conn = http1::Builder::new()
                        .timer(TokioTimer::new())
                        .serve_connection(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn);
                    let logger = Arc::clone(&logger);
                    connections.spawn(async move {
                        if let Err(e) = conn.await {
                            logger.debug(format_args!(
                                "{} connection from {} ended: {}",
                                channel, peer, e
                            ));
                        }
                    });
                }
                Err(e) if is_connection_error(&e) => {}
                Err(source) => {
                    let _ = errors.send(ServeError::Listener { channel, source }).await;
                    break;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);

    let drained = tokio::time::timeout(grace, async {
        graceful.shutdown().await;
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_ok() {
        return false;
    }

    logger.warn(format_args!(
        "{} grace window of {:?} elapsed; aborting {} connection(s)",
        channel,
        grace,
        connections.len()
    ));
    connections.abort_all();
    while connections.join_next().await.is_some() {}
    true
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;
    use crate::store::{create_store, db_path};

    fn state(dir: &std::path::Path, logger: Arc<MemoryLogger>) -> Arc<AppState> {
        create_store(dir, "0.1", logger.clone()).unwrap();
        let store = Store::open(db_path(dir), logger.clone()).unwrap();
        Arc::new(AppState {
            mode: ServingMode::Normal,
            build: BuildInfo::current(),
            store: Arc::new(store),
            public_dir: dir.join("public"),
            shutdown: Shutdown::new(),
            flush_delay: Duration::from_millis(10),
            logger,
        })
    }

    fn test_config() -> ServeConfig {
        ServeConfig {
            public_port: 0,
            admin_port: 0,
            shutdown_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bind_reports_both_addresses() {
        let logger = MemoryLogger::new();
        let listeners = Listeners::bind(&test_config(), &logger).await.unwrap();

        assert!(listeners.admin_addr().ip().is_loopback());
        assert!(listeners.public_addr().ip().is_unspecified());
        assert_ne!(listeners.admin_addr().port(), listeners.public_addr().port());
    }

    #[tokio::test]
    async fn test_public_bind_failure_releases_admin() {
        let logger = MemoryLogger::new();
        let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let config = ServeConfig {
            public_port: taken.local_addr().unwrap().port(),
            ..test_config()
        };

        let err = Listeners::bind(&config, &logger).await.err().unwrap();
        assert!(matches!(err, ServeError::Bind { channel: "public", .. }));
    }

    #[tokio::test]
    async fn test_external_trigger_stops_both_listeners() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        let state = state(dir.path(), logger.clone());
        let config = test_config();

        let listeners = Listeners::bind(&config, logger.as_ref()).await.unwrap();
        let admin_addr = listeners.admin_addr();
        state.shutdown.trigger_after(Duration::from_millis(50), ShutdownReason::Signal);

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            listeners.serve(Arc::clone(&state), &config),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(outcome.reason, ShutdownReason::Signal);
        assert!(!outcome.forced);
        assert!(logger.contains(tracing::Level::INFO, "listeners stopped"));
        assert!(tokio::net::TcpStream::connect(admin_addr).await.is_err());
    }

    async fn serve_in_background(
        config: ServeConfig,
        logger: Arc<MemoryLogger>,
        state: Arc<AppState>,
    ) -> (SocketAddr, JoinHandle<Result<ServeOutcome, ServeError>>) {
        let listeners = Listeners::bind(&config, logger.as_ref()).await.unwrap();
        let public = SocketAddr::from(([127, 0, 0, 1], listeners.public_addr().port()));
        let task = tokio::spawn(async move { listeners.serve(state, &config).await });
        (public, task)
    }

    #[tokio::test]
    async fn test_grace_window_aborts_stalled_connection() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        let state = state(dir.path(), logger.clone());
        let config = ServeConfig {
            shutdown_timeout: Duration::from_millis(300),
            ..test_config()
        };
        let (public, task) = serve_in_background(config, logger.clone(), Arc::clone(&state)).await;

        // request head left unfinished
        let mut client = tokio::net::TcpStream::connect(public).await.unwrap();
        client
            .write_all(b"GET /version HTTP/1.1\r\nHost: x\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        state.shutdown.trigger(ShutdownReason::Signal);

        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome.reason, ShutdownReason::Signal);
        assert!(outcome.forced);
        assert!(logger.contains(tracing::Level::WARN, "public grace window"));

        // the connection is gone once serve has returned
        let _ = client.write_all(b"\r\n").await;
        let mut buf = [0u8; 64];
        let read = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .unwrap();
        assert!(matches!(read, Ok(0) | Err(_)), "{:?}", read);
    }

    #[tokio::test]
    async fn test_idle_keep_alive_connection_drains_without_force() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        let state = state(dir.path(), logger.clone());
        let (public, task) =
            serve_in_background(test_config(), logger.clone(), Arc::clone(&state)).await;

        let mut client = tokio::net::TcpStream::connect(public).await.unwrap();
        client
            .write_all(b"GET /live HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 512];
        let n = client.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 200"));

        state.shutdown.trigger(ShutdownReason::Signal);
        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!outcome.forced);
    }

    #[tokio::test]
    async fn test_exit_after_timer() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        let state = state(dir.path(), logger.clone());
        let config = ServeConfig {
            exit_after: Some(Duration::from_millis(50)),
            ..test_config()
        };

        let listeners = Listeners::bind(&config, logger.as_ref()).await.unwrap();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            listeners.serve(Arc::clone(&state), &config),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(outcome.reason, ShutdownReason::Timer);
        assert!(logger.contains(tracing::Level::INFO, "exit-after timer set"));
    }
}
