// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared plumbing for the hepio command-line tools.
//!
//! - `hepio-ls` lists the events of a container stream.
//! - `hepio-convert` turns a legacy JSON dump into a container stream.

#![forbid(unsafe_code)]

pub mod config;
pub mod inspect;
pub mod logging;

use tracing::warn;

use crate::config::{load_prefs, ToolPrefs};

/// Loads preferences and installs logging. Unreadable preferences fall back
/// to defaults with a warning.
pub fn init_tool() -> ToolPrefs {
    match load_prefs() {
        Ok(prefs) => {
            logging::init(&prefs.log_filter);
            prefs
        }
        Err(err) => {
            let prefs = ToolPrefs::default();
            logging::init(&prefs.log_filter);
            warn!(%err, "ignoring unreadable preferences");
            prefs
        }
    }
}
