// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema state classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Initialization/version status of the datastore.
///
/// Ordered by severity of the intervention needed: `Missing` is the worst,
/// `Ready` needs none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaState {
    /// No datastore file
    Missing,
    /// File present, no version-tracking table (or an empty one)
    Uninitialized,
    /// Recorded version differs from the one this binary understands
    VersionMismatch,
    /// Recorded version matches
    Ready,
}

impl SchemaState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Uninitialized => "uninitialized",
            Self::VersionMismatch => "version_mismatch",
            Self::Ready => "ready",
        }
    }

    /// Classify a recorded version against the expected one.
    pub fn classify(recorded: Option<&str>, expected: &str) -> Self {
        match recorded {
            None => Self::Uninitialized,
            Some(v) if v == expected => Self::Ready,
            Some(_) => Self::VersionMismatch,
        }
    }
}

impl fmt::Display for SchemaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
