// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serving-mode selection

use crate::store::SchemaState;
use serde::Serialize;
use std::fmt;

/// Process-wide serving mode, computed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServingMode {
    /// Datastore ready; full application
    Normal,
    /// Datastore uninitialized or at the wrong version
    Installation,
}

impl ServingMode {
    /// Map a schema state to a serving mode.
    ///
    /// `Missing` yields `None`: the process must not serve at all.
    pub fn for_state(state: SchemaState) -> Option<Self> {
        match state {
            SchemaState::Missing => None,
            SchemaState::Uninitialized | SchemaState::VersionMismatch => Some(Self::Installation),
            SchemaState::Ready => Some(Self::Normal),
        }
    }

    pub fn is_ready(self) -> bool {
        self == Self::Normal
    }

    /// `mode` field of `/admin/status`
    pub fn status_label(self) -> &'static str {
        match self {
            Self::Normal => "running",
            Self::Installation => "installation",
        }
    }
}

impl fmt::Display for ServingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Installation => f.write_str("installation"),
        }
    }
}
