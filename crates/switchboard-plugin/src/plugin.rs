// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The plugin trait and its optional handler capabilities.

use async_trait::async_trait;
use switchboard_core::{Record, SwitchboardError};

use crate::schema::{self, Args};

/// A running plugin instance.
///
/// Instances are created by a [`PluginFactory`](crate::PluginFactory) and
/// receive records through whichever handler capabilities they expose.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn as_message_handler(&self) -> Option<&dyn MessageHandler> {
        None
    }

    fn as_command_handler(&self) -> Option<&dyn CommandHandler> {
        None
    }

    fn as_outgoing_handler(&self) -> Option<&dyn OutgoingHandler> {
        None
    }

    /// Stops background work. After this returns the plugin must not use
    /// its plugger again.
    async fn stop(&self) -> Result<(), SwitchboardError>;
}

/// Observes every inbound record routed to the plugin.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, record: &Record);
}

/// Handles inbound records that parse as one of the plugin's commands.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle_command(&self, cmd: &CommandCall);
}

/// Observes the bot's own outbound records.
#[async_trait]
pub trait OutgoingHandler: Send + Sync {
    async fn handle_outgoing(&self, record: &Record);
}

/// A record that parsed successfully as a declared command.
#[derive(Debug, Clone)]
pub struct CommandCall {
    pub record: Record,
    pub schema: schema::Command,
    pub args: Args,
}

impl CommandCall {
    pub fn name(&self) -> &str {
        &self.schema.name
    }
}
