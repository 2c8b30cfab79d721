//! `show running-config` interface blocks

use super::ParseError;
use crate::records::RunningConfigBlock;
use regex::Regex;
use std::sync::LazyLock;

static INTERFACE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^interface\s+(\S+)$").expect("Invalid interface line regex"));

/// Global lines that never belong to an interface block
const GLOBAL_KEYWORDS: &[&str] = &["version", "hostname"];

fn is_ignored(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('!')
        || GLOBAL_KEYWORDS.iter().any(|kw| line.starts_with(kw))
}

/// Split a running configuration into one block per `interface` stanza.
///
/// Each block keeps its `interface <name>` line first, followed by its trimmed
/// sub-commands in order. Lines before the first block are ignored.
///
/// # Errors
///
/// Returns [`ParseError::NoInterfaces`] when the text has no interface stanza.
pub fn parse_interface_config(raw: &str) -> Result<Vec<RunningConfigBlock>, ParseError> {
    let mut blocks = Vec::new();
    let mut current: Option<RunningConfigBlock> = None;

    for line in raw.lines() {
        let line = line.trim();
        if is_ignored(line) {
            continue;
        }

        if let Some(caps) = INTERFACE_LINE.captures(line) {
            if let Some(done) = current.take() {
                blocks.push(done);
            }
            current = Some(RunningConfigBlock {
                interface: caps[1].to_string(),
                config_lines: vec![line.to_string()],
            });
        } else if let Some(block) = current.as_mut() {
            block.config_lines.push(line.to_string());
        }
    }

    if let Some(done) = current {
        blocks.push(done);
    }

    if blocks.is_empty() {
        return Err(ParseError::NoInterfaces);
    }
    Ok(blocks)
}
