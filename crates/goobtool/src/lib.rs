// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Goobergine server
//!
//! Two HTTP channels over one embedded SQLite datastore.
//!
//! # Features
//!
//! - **Public channel** -- HTML entry page, `/live`, `/ready`, `/version` and
//!   static assets, bound on all interfaces
//! - **Admin channel** -- JSON-only status, echo, shutdown and restart routes,
//!   bound on loopback only and verified after bind
//! - **Serving modes** -- `Normal` when the schema is current, `Installation`
//!   when it is absent or stale
//! - **Bounded shutdown** -- one trigger stops both channels; in-flight
//!   requests get a grace window before the listeners are aborted
//!
//! # Architecture
//!
//! ```text
//! Bootstrap::prepare
//! +-- store      (probe, open + pragmas, schema state)
//! +-- mode       (SchemaState -> ServingMode)
//! +-- Listeners  (admin loopback, public 0.0.0.0)
//!
//! Prepared::run
//! +-- public routes
//! +-- admin routes (behind the JSON guard)
//! +-- Shutdown   (signal | exit-after | admin route | listener failure)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use goobtool::{Bootstrap, BuildInfo, ServeConfig, Shutdown, TracingLogger};
//! use std::sync::Arc;
//!
//! let prepared = Bootstrap::prepare(
//!     ServeConfig::default(),
//!     BuildInfo::current(),
//!     Arc::new(TracingLogger),
//! )
//! .await?;
//! let outcome = prepared.run(Shutdown::new()).await?;
//! ```

pub mod bootstrap;
pub mod config;
pub mod logging;
pub mod mode;
pub mod server;
pub mod store;

pub use bootstrap::{Bootstrap, Prepared, StartupError};
pub use config::{parse_duration, BuildInfo, ConfigError, ServeConfig, EXPECTED_SCHEMA_VERSION};
pub use logging::{Logger, MemoryLogger, TracingLogger};
pub use mode::ServingMode;
pub use server::{ServeError, ServeOutcome, Shutdown, ShutdownReason};
pub use store::{SchemaState, Store, StoreError, StoreReport};
