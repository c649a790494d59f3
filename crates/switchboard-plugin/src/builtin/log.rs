// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `log`: archives every observed message.

use async_trait::async_trait;
use switchboard_core::{Record, SwitchboardError};

use crate::plugger::Plugger;
use crate::plugin::{MessageHandler, Plugin};
use crate::registry::PluginSpec;

pub fn spec() -> PluginSpec {
    PluginSpec::new("log", start).with_help(
        "Stores observed messages persistently in the message archive, \
         keyed by the plugin instance name.",
    )
}

struct LogPlugin {
    plugger: Plugger,
}

fn start(plugger: Plugger) -> Result<Box<dyn Plugin>, SwitchboardError> {
    Ok(Box::new(LogPlugin { plugger }))
}

#[async_trait]
impl Plugin for LogPlugin {
    fn as_message_handler(&self) -> Option<&dyn MessageHandler> {
        Some(self)
    }

    async fn stop(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for LogPlugin {
    async fn handle_message(&self, record: &Record) {
        if let Err(e) = self.plugger.archive(record).await {
            self.plugger
                .logf(format_args!("error writing to message archive: {e}"));
        }
    }
}
