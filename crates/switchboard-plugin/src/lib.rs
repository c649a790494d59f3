// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin registry, plugin handle, command schemas, and built-in plugins.
//!
//! Plugins are compiled in and registered in a [`PluginRegistry`] by name.
//! The plugin manager starts one instance per row of the `plugins` table,
//! handing each a [`Plugger`] bound to that row's configuration and targets.

pub mod builtin;
pub mod plugger;
pub mod plugin;
pub mod registry;
pub mod schema;

pub use plugger::{Plugger, PluggerHost};
pub use plugin::{CommandCall, CommandHandler, MessageHandler, OutgoingHandler, Plugin};
pub use registry::{PluginFactory, PluginRegistry, PluginSpec};
pub use schema::{Args, Commands, SchemaError, command_name};
