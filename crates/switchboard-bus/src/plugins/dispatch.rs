// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing of incoming records to running plugin instances.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use switchboard_core::types::CMD_PONG;
use switchboard_core::{Record, StateStore};
use switchboard_plugin::{CommandCall, command_name};
use tracing::{error, trace, warn};

use super::manager::RunningPlugin;

/// Hands `record` to every instance that has not seen it yet and has a
/// matching target, in instance name order.
///
/// Each instance's in-memory position is advanced before its handlers run,
/// so a record that makes a plugin panic is not offered to it again while
/// the manager runs. The position is persisted once the handlers return; a
/// process crash in between redelivers the record after restart.
pub(crate) async fn dispatch(
    running: &mut BTreeMap<String, RunningPlugin>,
    state: &dyn StateStore,
    record: &Record,
) {
    // Confirmations and wake records.
    if record.command == CMD_PONG {
        return;
    }
    let cmd = command_name(&record.bot_text);
    for (name, inst) in running.iter_mut() {
        if inst.info.last_id >= record.id || inst.plugger.target(record).is_none() {
            continue;
        }
        inst.info.last_id = record.id;
        trace!(plugin = %name, id = %record.id, "dispatching record");

        let handled = AssertUnwindSafe(inst.handle(record, cmd))
            .catch_unwind()
            .await;
        if handled.is_err() {
            error!(plugin = %name, id = %record.id, "plugin panicked while handling record");
        }

        if let Err(e) = state.set_plugin_last_id(name, record.id).await {
            warn!(plugin = %name, error = %e, "cannot update last record id");
        }
    }
}

impl RunningPlugin {
    async fn handle(&self, record: &Record, cmd: &str) {
        if record.is_outgoing_echo() {
            if let Some(handler) = self.plugin.as_outgoing_handler() {
                handler.handle_outgoing(record).await;
            }
            return;
        }
        self.handle_command(record, cmd).await;
        if let Some(handler) = self.plugin.as_message_handler() {
            handler.handle_message(record).await;
        }
    }

    async fn handle_command(&self, record: &Record, cmd: &str) {
        if cmd.is_empty() {
            return;
        }
        let Some(handler) = self.plugin.as_command_handler() else {
            return;
        };
        let Some(schema) = self.commands.command(cmd) else {
            return;
        };
        match schema.parse(&record.bot_text) {
            Ok(args) => {
                let call = CommandCall {
                    record: record.clone(),
                    schema: schema.clone(),
                    args,
                };
                handler.handle_command(&call).await;
            }
            Err(e) => {
                if let Err(e) = self.plugger.reply(record, format!("Oops: {e}")).await {
                    warn!(plugin = %self.info.name, error = %e, "cannot send command error");
                }
            }
        }
    }
}
