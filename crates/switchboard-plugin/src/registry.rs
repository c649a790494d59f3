// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of compiled-in plugin implementations.
//!
//! The `PluginRegistry` stores [`PluginSpec`] records keyed by plugin name.
//! Each spec carries the help text, the command schemas, and the factory that
//! starts an instance for a row of the `plugins` table.

use std::collections::HashMap;
use std::fmt;

use switchboard_core::SwitchboardError;

use crate::plugger::Plugger;
use crate::plugin::Plugin;
use crate::schema::Commands;

/// Factory trait for starting plugin instances.
pub trait PluginFactory: Send + Sync {
    /// Starts an instance bound to `plugger`.
    ///
    /// An error skips the instance; the manager tries again on the next
    /// refresh.
    fn start(&self, plugger: Plugger) -> Result<Box<dyn Plugin>, SwitchboardError>;
}

impl<F> PluginFactory for F
where
    F: Fn(Plugger) -> Result<Box<dyn Plugin>, SwitchboardError> + Send + Sync,
{
    fn start(&self, plugger: Plugger) -> Result<Box<dyn Plugin>, SwitchboardError> {
        self(plugger)
    }
}

/// A registered plugin implementation.
pub struct PluginSpec {
    pub name: String,
    pub help: String,
    pub commands: Commands,
    pub factory: Box<dyn PluginFactory>,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>, factory: impl PluginFactory + 'static) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            commands: Commands::default(),
            factory: Box::new(factory),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_commands(mut self, commands: Commands) -> Self {
        self.commands = commands;
        self
    }
}

impl fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSpec")
            .field("name", &self.name)
            .field("help", &self.help)
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

/// Registry of plugin implementations, keyed by name.
///
/// Passed explicitly to the bridge; there is no global registry.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    entries: HashMap<String, PluginSpec>,
}

impl PluginRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `spec`. Names must be non-empty, free of `/`, and unique.
    pub fn register(&mut self, spec: PluginSpec) -> Result<(), SwitchboardError> {
        if spec.name.is_empty() || spec.name.contains('/') {
            return Err(SwitchboardError::Config(format!(
                "invalid plugin name {:?}",
                spec.name
            )));
        }
        if self.entries.contains_key(&spec.name) {
            return Err(SwitchboardError::Config(format!(
                "plugin already registered: {}",
                spec.name
            )));
        }
        self.entries.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Get a plugin spec by name.
    pub fn get(&self, name: &str) -> Option<&PluginSpec> {
        self.entries.get(name)
    }

    /// Looks up the spec for an instance name (`plugin` or `plugin/label`).
    pub fn lookup(&self, instance: &str) -> Result<&PluginSpec, SwitchboardError> {
        let name = switchboard_core::descriptor::spec_name(instance);
        self.entries
            .get(name)
            .ok_or_else(|| SwitchboardError::NotRegistered {
                name: name.to_string(),
            })
    }

    /// List all specs, sorted by name.
    pub fn list_all(&self) -> Vec<&PluginSpec> {
        let mut entries: Vec<&PluginSpec> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Returns the number of registered plugins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
