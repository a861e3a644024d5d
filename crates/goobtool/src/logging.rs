// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging contract
//!
//! Every component receives an `Arc<dyn Logger>` at construction and never
//! reaches for a process-wide logger. The binary installs [`TracingLogger`];
//! tests substitute [`MemoryLogger`] and assert on the recorded events.

use std::fmt;
use std::sync::Mutex;
use tracing::Level;

/// Leveled logging capability.
///
/// Messages are passed as pre-bound format arguments, so call sites read
/// `logger.info(format_args!("listening on {}", addr))`.
pub trait Logger: Send + Sync {
    /// Informational event
    fn info(&self, args: fmt::Arguments<'_>);

    /// Recoverable anomaly
    fn warn(&self, args: fmt::Arguments<'_>);

    /// Failure
    fn error(&self, args: fmt::Arguments<'_>);

    /// Diagnostic detail
    fn debug(&self, args: fmt::Arguments<'_>);
}

/// Forwards every call to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!("{}", args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!("{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!("{}", args);
    }

    fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!("{}", args);
    }
}

/// A single captured log event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
}

/// In-memory logger for tests
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: Level, args: fmt::Arguments<'_>) {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(LogRecord {
            level,
            message: args.to_string(),
        });
    }

    /// Snapshot of everything logged so far
    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// True if any record at `level` contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        self.push(Level::INFO, args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        self.push(Level::WARN, args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.push(Level::ERROR, args);
    }

    fn debug(&self, args: fmt::Arguments<'_>) {
        self.push(Level::DEBUG, args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_records_levels() {
        let logger = MemoryLogger::new();
        logger.info(format_args!("listening on {}", 8080));
        logger.warn(format_args!("slow"));
        logger.error(format_args!("bind failed: {}", "in use"));
        logger.debug(format_args!("detail"));

        let records = logger.records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].message, "listening on 8080");
        assert!(logger.contains(Level::ERROR, "in use"));
        assert!(!logger.contains(Level::INFO, "in use"));
    }

    #[test]
    fn test_logger_is_object_safe() {
        let logger: std::sync::Arc<dyn Logger> = std::sync::Arc::new(TracingLogger);
        logger.debug(format_args!("no subscriber installed"));
    }
}
