// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared shutdown signal.
//!
//! One [`Shutdown`] per run. Every trigger source (OS signal, exit-after
//! timer, admin route, failing listener) feeds the same watch channel, and
//! the first reason recorded wins.

use crate::logging::Logger;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Why the run is ending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / SIGTERM
    Signal,
    /// `--exit-after` elapsed
    Timer,
    /// `/admin/shutdown`
    AdminRequest,
    /// `/admin/restart`
    Restart,
    /// A listener stopped on its own
    ListenerFailed(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("signal received"),
            Self::Timer => f.write_str("exit-after timer elapsed"),
            Self::AdminRequest => f.write_str("admin shutdown requested"),
            Self::Restart => f.write_str("admin restart requested"),
            Self::ListenerFailed(e) => write!(f, "listener failed: {}", e),
        }
    }
}

/// Cloneable shutdown handle.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record `reason` and wake every waiter.
    ///
    /// Returns `false` if shutdown was already triggered; the original
    /// reason is kept.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.tx.borrow().clone()
    }

    /// Resolve once shutdown has been triggered.
    pub async fn triggered(&self) -> ShutdownReason {
        let mut rx = self.tx.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(reason) = current {
                return reason;
            }
            if rx.changed().await.is_err() {
                // Sender lives in self; unreachable while we are borrowed.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Trigger `reason` after `delay`, from a background task.
    pub fn trigger_after(&self, delay: Duration, reason: ShutdownReason) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shutdown.trigger(reason);
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for SIGINT, or SIGTERM on unix.
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = term.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Spawn a task that turns OS signals into [`ShutdownReason::Signal`].
pub fn spawn_signal_listener(shutdown: Shutdown, logger: Arc<dyn Logger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                logger.info(format_args!("Shutdown signal received"));
                shutdown.trigger(ShutdownReason::Signal);
            }
            Err(e) => logger.error(format_args!("failed to install signal handler: {}", e)),
        }
    })
}
