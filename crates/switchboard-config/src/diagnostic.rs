// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment says what went wrong. This module adds where, as a span in the
//! TOML file that set the value, and what was probably meant: the closest
//! key of the same section, or the section a misplaced key belongs to.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::path::{Path, PathBuf};

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Keys accepted in each section of `switchboard.toml`.
pub const SECTIONS: &[(&str, &[&str])] = &[
    (
        "bus",
        &[
            "refresh_secs",
            "tail_idle_timeout_ms",
            "tail_backoff_ms",
            "rollback_limit_secs",
            "shutdown_concurrency",
            "reconnect_backoff_ms",
            "send_timeout_ms",
            "plugins",
        ],
    ),
    ("storage", &["database_path", "wal_mode", "log_capacity"]),
    ("logging", &["level"]),
];

/// Jaro-Winkler score below which no correction is offered.
const MIN_SIMILARITY: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in [{section}]")]
    #[diagnostic(
        code(switchboard::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), moved_to.as_deref(), key, valid_keys))
    )]
    UnknownKey {
        key: String,
        section: String,
        suggestion: Option<String>,
        /// Another section that does accept `key`.
        moved_to: Option<String>,
        valid_keys: String,
        #[label("not a [{section}] key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("unknown section [{name}]")]
    #[diagnostic(
        code(switchboard::config::unknown_section),
        help("{}", unknown_section_help(suggestion.as_deref()))
    )]
    UnknownSection {
        name: String,
        suggestion: Option<String>,
        #[label("not a configuration section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(switchboard::config::invalid_type), help("`{key}` takes {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(code(switchboard::config::missing_key))]
    MissingKey { key: String },

    /// A value that parsed but makes no sense for the bridge.
    #[error("invalid `{key}`: {message}")]
    #[diagnostic(code(switchboard::config::invalid_value))]
    Validation { key: String, message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(switchboard::config::other))]
    Other(String),
}

fn unknown_key_help(
    suggestion: Option<&str>,
    moved_to: Option<&str>,
    key: &str,
    valid_keys: &str,
) -> String {
    match (suggestion, moved_to) {
        (_, Some(section)) => format!("`{key}` belongs in [{section}]"),
        (Some(s), None) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        (None, None) => format!("valid keys: {valid_keys}"),
    }
}

fn unknown_section_help(suggestion: Option<&str>) -> String {
    let sections: Vec<&str> = SECTIONS.iter().map(|(name, _)| *name).collect();
    match suggestion {
        Some(s) => format!("did you mean [{s}]?"),
        None => format!("sections are: {}", sections.join(", ")),
    }
}

/// A TOML text the configuration was read from.
#[derive(Debug, Clone)]
pub struct Source {
    /// `None` for text passed in directly.
    pub file: Option<PathBuf>,
    pub text: String,
}

impl Source {
    pub fn inline(text: &str) -> Self {
        Self {
            file: None,
            text: text.to_string(),
        }
    }

    /// Reads each existing file of `paths`, skipping the rest.
    pub fn read_all(paths: &[PathBuf]) -> Vec<Source> {
        paths
            .iter()
            .filter_map(|path| {
                let text = std::fs::read_to_string(path).ok()?;
                Some(Source {
                    file: Some(path.clone()),
                    text,
                })
            })
            .collect()
    }

    fn name(&self) -> String {
        self.file
            .as_deref()
            .map(Path::display)
            .map(|d| d.to_string())
            .unwrap_or_else(|| "<inline>".to_string())
    }

    fn named(&self) -> NamedSource<String> {
        NamedSource::new(self.name(), self.text.clone())
    }
}

/// Turns every error figment collected into a diagnostic.
pub fn from_figment(err: figment::Error, sources: &[Source]) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let source = origin(&error, sources);
            let path = &error.path;
            match &error.kind {
                Kind::UnknownField(field, _) if path.len() <= 1 && is_top_level(path, field) => {
                    unknown_section(field, source)
                }
                Kind::UnknownField(field, expected) => {
                    let section = path.first().cloned().unwrap_or_default();
                    unknown_key(&section, field, expected, source)
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: dotted(path, field),
                },
                Kind::InvalidType(actual, expected) => {
                    let (section, key) = split_key(path);
                    let span = source.and_then(|s| locate_key(&s.text, section, key));
                    ConfigError::InvalidType {
                        key: path.join("."),
                        detail: format!("found {actual}"),
                        expected: expected.clone(),
                        src: span.and(source.map(Source::named)),
                        span,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Whether an unknown field sits at the top level, where only sections live.
fn is_top_level(path: &[String], field: &str) -> bool {
    // Figment reports a top-level unknown field with the field itself as the
    // path, or with an empty path.
    path.is_empty() || path.first().is_some_and(|p| p == field)
}

fn unknown_section(name: &str, source: Option<&Source>) -> ConfigError {
    let sections: Vec<&str> = SECTIONS.iter().map(|(name, _)| *name).collect();
    let span = source.and_then(|s| locate_section(&s.text, name));
    ConfigError::UnknownSection {
        name: name.to_string(),
        suggestion: suggest_key(name, &sections),
        src: span.and(source.map(Source::named)),
        span,
    }
}

fn unknown_key(
    section: &str,
    key: &str,
    expected: &[&str],
    source: Option<&Source>,
) -> ConfigError {
    let moved_to = SECTIONS
        .iter()
        .find(|(name, keys)| *name != section && keys.contains(&key))
        .map(|(name, _)| name.to_string());
    let span = source.and_then(|s| locate_key(&s.text, Some(section), key));
    ConfigError::UnknownKey {
        key: key.to_string(),
        section: section.to_string(),
        suggestion: suggest_key(key, expected),
        moved_to,
        valid_keys: expected.join(", "),
        src: span.and(source.map(Source::named)),
        span,
    }
}

/// The source whose value produced `error`.
fn origin<'a>(error: &figment::Error, sources: &'a [Source]) -> Option<&'a Source> {
    match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => sources
            .iter()
            .find(|s| s.file.as_deref().is_some_and(|f| same_file(f, path))),
        figment::Source::Code(_) => sources.iter().find(|s| s.file.is_none()),
        _ => None,
    }
}

/// Figment records where it found a file, which may differ in spelling from
/// the path it was asked to read.
fn same_file(a: &Path, b: &Path) -> bool {
    a == b
        || matches!(
            (std::fs::canonicalize(a), std::fs::canonicalize(b)),
            (Ok(a), Ok(b)) if a == b
        )
}

fn dotted(path: &[String], key: &str) -> String {
    path.iter()
        .map(String::as_str)
        .chain(std::iter::once(key))
        .collect::<Vec<_>>()
        .join(".")
}

/// `bus.refresh_secs` → (`Some("bus")`, `"refresh_secs"`).
fn split_key(path: &[String]) -> (Option<&str>, &str) {
    match path {
        [] => (None, ""),
        [key] => (None, key.as_str()),
        [section, .., key] => (Some(section.as_str()), key.as_str()),
    }
}

/// Scans `content` line by line and returns the span of `key` inside
/// `[section]`, or among the top-level keys when `section` is `None`.
pub fn locate_key(content: &str, section: Option<&str>, key: &str) -> Option<SourceSpan> {
    let mut current: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if let Some(header) = section_header(trimmed) {
            current = Some(header);
        } else if current == section {
            if let Some(rest) = trimmed.strip_prefix(key) {
                if rest.trim_start().starts_with('=') {
                    return Some(SourceSpan::new((offset + indent).into(), key.len()));
                }
            }
        }
        offset += line.len();
    }
    None
}

/// The span of the `[name]` header.
pub fn locate_section(content: &str, name: &str) -> Option<SourceSpan> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if section_header(trimmed) == Some(name) {
            let indent = line.len() - trimmed.len();
            return Some(SourceSpan::new((offset + indent).into(), name.len() + 2));
        }
        offset += line.len();
    }
    None
}

fn section_header(line: &str) -> Option<&str> {
    let line = line.trim_end();
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

/// The candidate most similar to `unknown`, if any is close enough.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(unknown, c), *c))
        .filter(|(score, _)| *score > MIN_SIMILARITY)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Prints each error to stderr, with source snippets where known.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
    if errors.len() > 1 {
        eprintln!("{} configuration errors", errors.len());
    }
}
