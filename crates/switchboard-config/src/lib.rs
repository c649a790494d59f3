// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Switchboard bridge.
//!
//! Three sections: `[bus]` tunes the tails and the plugin and account
//! managers, `[storage]` locates the SQLite database, `[logging]` sets the
//! level. Files merge from `/etc`, the user config dir and the working
//! directory, then `SWITCHBOARD_<SECTION>_<KEY>` variables override them.
//!
//! ```no_run
//! let config = switchboard_config::load_and_validate().unwrap_or_else(|errors| {
//!     switchboard_config::render_errors(&errors);
//!     std::process::exit(1);
//! });
//! println!("database at {}", config.storage.database_path);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, Source, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::SwitchboardConfig;

/// Loads the layered configuration and validates it.
pub fn load_and_validate() -> Result<SwitchboardConfig, Vec<ConfigError>> {
    checked(loader::load_config(), || {
        Source::read_all(&loader::search_paths())
    })
}

/// Loads `path` plus environment overrides and validates the result.
pub fn load_and_validate_path(path: &Path) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        Source::read_all(&[path.to_path_buf()])
    })
}

/// Parses `toml` over the defaults, without files or environment.
pub fn load_and_validate_str(toml: &str) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml), || vec![Source::inline(toml)])
}

/// Sources are only read back when there is an error to point into.
fn checked(
    loaded: Result<SwitchboardConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<Source>,
) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::from_figment(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}
