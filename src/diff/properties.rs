use std::collections::BTreeMap;

use super::compute_changes;
use super::ChangeSet;
use super::ConfigDiffer;
use crate::constants::CONTENT_TYPE_PROPERTIES;
use crate::Result;

/// Differ for `.properties` documents
#[derive(Debug, Default, Clone)]
pub struct PropertiesDiffer;

impl ConfigDiffer for PropertiesDiffer {
    fn is_responsible_for(
        &self,
        content_type: &str,
    ) -> bool {
        content_type.eq_ignore_ascii_case(CONTENT_TYPE_PROPERTIES)
    }

    fn parse(
        &self,
        old_content: Option<&str>,
        new_content: Option<&str>,
        _content_type: &str,
    ) -> Result<ChangeSet> {
        let old = parse_properties(old_content.unwrap_or_default());
        let new = parse_properties(new_content.unwrap_or_default());
        Ok(compute_changes(&old, &new))
    }
}

/// Parses `.properties` text into key/value pairs. Later duplicates win.
///
/// Supports `=`, `:` and whitespace separators, `#`/`!` comment lines,
/// backslash line continuations and the usual escapes (`\t`, `\n`, `\uXXXX`).
/// Never fails: unparsable fragments are taken literally.
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();

    for line in logical_lines(text) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        let (key, value) = split_key_value(trimmed);
        props.insert(unescape(key), unescape(value));
    }

    props
}

/// Joins physical lines ending with an odd number of backslashes
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut continuing = false;

    for raw in text.lines() {
        let piece = if continuing { raw.trim_start() } else { raw };
        let trailing = piece.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            current.push_str(&piece[..piece.len() - 1]);
            continuing = true;
        } else {
            current.push_str(piece);
            lines.push(std::mem::take(&mut current));
            continuing = false;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = idx;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches([' ', '\t', '\u{c}']);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches([' ', '\t', '\u{c}']);
    }
    (key, rest)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => {
                        out.push(decoded);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    _ => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}
