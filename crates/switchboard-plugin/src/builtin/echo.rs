// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `echo`: replies with the text it is given.

use async_trait::async_trait;
use serde::Deserialize;
use switchboard_core::SwitchboardError;

use crate::plugger::Plugger;
use crate::plugin::{CommandCall, CommandHandler, Plugin};
use crate::registry::PluginSpec;
use crate::schema::{Arg, Command, Commands};

pub fn spec() -> PluginSpec {
    PluginSpec::new("echo", start)
        .with_help("Replies with the provided text.")
        .with_commands(Commands(vec![
            Command::new("echo")
                .help("Replies back with the provided text.")
                .arg(Arg::new("text").required().trailing().hint("<text ...>")),
        ]))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EchoConfig {
    /// Prepended to every reply.
    #[serde(default)]
    prefix: String,
}

struct EchoPlugin {
    plugger: Plugger,
    config: EchoConfig,
}

fn start(plugger: Plugger) -> Result<Box<dyn Plugin>, SwitchboardError> {
    let config = plugger.config()?;
    Ok(Box::new(EchoPlugin { plugger, config }))
}

#[async_trait]
impl Plugin for EchoPlugin {
    fn as_command_handler(&self) -> Option<&dyn CommandHandler> {
        Some(self)
    }

    async fn stop(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for EchoPlugin {
    async fn handle_command(&self, cmd: &CommandCall) {
        let text = format!("{}{}", self.config.prefix, cmd.args.str("text"));
        if let Err(e) = self.plugger.reply(&cmd.record, text).await {
            self.plugger.logf(format_args!("cannot send echo reply: {e}"));
        }
    }
}
