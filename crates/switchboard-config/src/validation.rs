// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checks that serde cannot express: timings the tails and clients loop on
//! must be non-zero, the plugin filter must name plugins, the log level
//! must be one `tracing` knows.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::SwitchboardConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Collects every problem rather than stopping at the first.
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |key: &str, message: String| {
        errors.push(ConfigError::Validation {
            key: key.to_string(),
            message,
        })
    };

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path", "must not be empty".into());
    }

    let bus = &config.bus;
    for (key, value) in [
        ("bus.tail_idle_timeout_ms", bus.tail_idle_timeout_ms),
        ("bus.tail_backoff_ms", bus.tail_backoff_ms),
        ("bus.send_timeout_ms", bus.send_timeout_ms),
    ] {
        if value == 0 {
            invalid(key, "must be greater than 0".into());
        }
    }
    if bus.shutdown_concurrency == 0 {
        invalid("bus.shutdown_concurrency", "must be at least 1".into());
    }

    if let Some(plugins) = &bus.plugins {
        let mut seen = HashSet::new();
        for (i, name) in plugins.iter().enumerate() {
            if name.trim().is_empty() {
                invalid(&format!("bus.plugins[{i}]"), "must not be empty".into());
            } else if name.starts_with('/') || name.ends_with('/') {
                invalid(
                    &format!("bus.plugins[{i}]"),
                    format!("`{name}` is not a plugin or `plugin/label` name"),
                );
            } else if !seen.insert(name) {
                invalid("bus.plugins", format!("`{name}` is listed twice"));
            }
        }
    }

    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        invalid(
            "logging.level",
            format!(
                "`{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
