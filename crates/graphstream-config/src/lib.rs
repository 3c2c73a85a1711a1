// SPDX-License-Identifier: Apache-2.0
//! Storage-agnostic configuration layer for the graph streaming engine.
//!
//! [`config::ConfigStore`]/[`config::ConfigService`] are a thin, framework-
//! agnostic port over raw JSON blobs; [`settings::EngineSettings`] is the
//! concrete value loaded through it at startup — physics parameters
//! (`spec.md` §4.4), session limits, and simulation/listener settings
//! (`spec.md` §6.4). A `settings_update` control message (`spec.md` §6.3)
//! hot-reloads one field through [`settings::EngineSettings::apply_update`].

pub mod config;
pub mod settings;
