// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command schemas and argument parsing.
//!
//! A plugin declares the commands it answers as a list of [`Command`]
//! schemas. Text addressed to the bot is matched by its first word
//! ([`command_name`]) and parsed against the schema's arguments:
//!
//! - `-flag` / `-flag=value` set flag arguments in any position,
//! - remaining words fill positional arguments in order,
//! - a `trailing` argument takes the rest of the text verbatim.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_core::SwitchboardError;
use thiserror::Error;

/// Why command text does not satisfy its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing input for argument: {0}")]
    MissingArg(String),

    #[error("unexpected input: {0}")]
    UnexpectedInput(String),

    #[error("unknown flag: -{0}")]
    UnknownFlag(String),

    #[error("flag -{0} requires a value")]
    MissingFlagValue(String),

    #[error("invalid value for {name}: {value:?} is not {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: &'static str,
    },
}

impl From<SchemaError> for SwitchboardError {
    fn from(e: SchemaError) -> Self {
        SwitchboardError::Schema(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    #[default]
    String,
    Int,
    Bool,
}

impl ArgType {
    fn describe(self) -> &'static str {
        match self {
            ArgType::String => "a string",
            ArgType::Int => "an integer",
            ArgType::Bool => "a boolean",
        }
    }

    fn convert(self, name: &str, raw: &str) -> Result<Value, SchemaError> {
        let invalid = || SchemaError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
            expected: self.describe(),
        };
        match self {
            ArgType::String => Ok(Value::String(raw.to_string())),
            ArgType::Int => raw.parse::<i64>().map(Value::from).map_err(|_| invalid()),
            ArgType::Bool => match raw {
                "true" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
        }
    }
}

/// One argument of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Arg {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hint: String,
    #[serde(default, rename = "type")]
    pub kind: ArgType,
    /// Given as `-name` or `-name=value` rather than by position.
    #[serde(default)]
    pub flag: bool,
    #[serde(default)]
    pub required: bool,
    /// Consumes the rest of the text. Only meaningful on the last positional.
    #[serde(default)]
    pub trailing: bool,
}

impl Arg {
    pub fn new(name: impl Into<String>) -> Self {
        Arg {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn trailing(mut self) -> Self {
        self.trailing = true;
        self
    }

    pub fn flag(mut self) -> Self {
        self.flag = true;
        self
    }

    pub fn kind(mut self, kind: ArgType) -> Self {
        self.kind = kind;
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }
}

/// The schema of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Command {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Arg>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    /// Parses command text (starting with the command name) into arguments.
    pub fn parse(&self, text: &str) -> Result<Args, SchemaError> {
        let mut rest = skip_word(text.trim_start());
        let mut values = BTreeMap::new();
        let mut positional = self.args.iter().filter(|a| !a.flag).peekable();

        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            if let Some(body) = rest.strip_prefix('-').filter(|b| starts_flag(b)) {
                let word = first_word(body);
                rest = skip_word(body);
                let (name, value) = match word.split_once('=') {
                    Some((n, v)) => (n, Some(v)),
                    None => (word, None),
                };
                let arg = self
                    .args
                    .iter()
                    .find(|a| a.flag && a.name == name)
                    .ok_or_else(|| SchemaError::UnknownFlag(name.to_string()))?;
                let value = match (value, arg.kind) {
                    (Some(v), kind) => kind.convert(name, v)?,
                    (None, ArgType::Bool) => Value::Bool(true),
                    (None, _) => return Err(SchemaError::MissingFlagValue(name.to_string())),
                };
                values.insert(arg.name.clone(), value);
                continue;
            }

            let Some(arg) = positional.next() else {
                return Err(SchemaError::UnexpectedInput(rest.trim_end().to_string()));
            };
            if arg.trailing {
                let raw = rest.trim_end();
                values.insert(arg.name.clone(), arg.kind.convert(&arg.name, raw)?);
                rest = "";
            } else {
                let word = first_word(rest);
                values.insert(arg.name.clone(), arg.kind.convert(&arg.name, word)?);
                rest = skip_word(rest);
            }
        }

        if let Some(missing) = self
            .args
            .iter()
            .find(|a| a.required && !values.contains_key(&a.name))
        {
            return Err(SchemaError::MissingArg(missing.name.clone()));
        }
        Ok(Args(values))
    }
}

fn starts_flag(body: &str) -> bool {
    body.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or("")
}

fn skip_word(text: &str) -> &str {
    match text.find(char::is_whitespace) {
        Some(i) => &text[i..],
        None => "",
    }
}

/// The command list of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Commands(pub Vec<Command>);

impl Commands {
    /// The schema for `name`, if the plugin declares it.
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.0.iter().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON form stored in the plugin tables.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "[]".to_string())
    }
}

impl FromIterator<Command> for Commands {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Commands(iter.into_iter().collect())
    }
}

/// The command name `text` would invoke, or `""` when its first word
/// cannot be a command.
pub fn command_name(text: &str) -> &str {
    let word = first_word(text);
    let mut chars = word.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid { word } else { "" }
}

/// Parsed argument values keyed by argument name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(BTreeMap<String, Value>);

impl Args {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The string value of `name`, or `""`.
    pub fn str(&self, name: &str) -> &str {
        self.0.get(name).and_then(Value::as_str).unwrap_or("")
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn bool(&self, name: &str) -> bool {
        self.0.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Decodes the arguments into `T` by field name.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, SwitchboardError> {
        let object: serde_json::Map<String, Value> =
            self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        serde_json::from_value(Value::Object(object))
            .map_err(|e| SwitchboardError::Schema(format!("cannot decode arguments: {e}")))
    }
}
