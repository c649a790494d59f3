// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugins compiled into every build.

pub mod echo;
pub mod log;

use switchboard_core::SwitchboardError;

use crate::registry::PluginRegistry;

/// Registers the built-in plugins.
pub fn register_builtins(registry: &mut PluginRegistry) -> Result<(), SwitchboardError> {
    registry.register(echo::spec())?;
    registry.register(log::spec())?;
    Ok(())
}
