//! Template invocations: `{{Name|positional|key=value}}`.
//!
//! Argument splitting balances nested `{{ }}` and `[[ ]]` so pipes inside
//! links or inner templates stay part of their argument.

use std::fmt;
use std::ops::Range;

use serde::Serialize;

use crate::error::FormatError;
use crate::regions::{is_protected, protected_regions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    pub name: Option<String>,
    pub value: String,
}

impl Argument {
    pub fn positional(value: impl Into<String>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }

    fn parse(raw: &str) -> Self {
        if let Some((name, value)) = raw.split_once('=')
            && is_argument_name(name)
        {
            return Self::named(name.trim(), value.trim());
        }
        Self::positional(raw.trim())
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}={}", self.value),
            None => f.write_str(&self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: String,
    pub args: Vec<Argument>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Strict parse: after trimming, `text` must be exactly one invocation.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let trimmed = text.trim();
        let (template, span) = Self::parse_at(trimmed, 0).map_err(|error| match error {
            FormatError::NotWrapped { .. } => FormatError::NotWrapped {
                text: text.to_string(),
            },
            FormatError::Unterminated { .. } => FormatError::Unterminated {
                text: text.to_string(),
            },
        })?;
        if span.end != trimmed.len() {
            return Err(FormatError::NotWrapped {
                text: text.to_string(),
            });
        }
        Ok(template)
    }

    /// Parse the invocation starting at `offset`, stopping at its top-level
    /// `}}`. Returns the template and its span in `text`.
    pub fn parse_at(text: &str, offset: usize) -> Result<(Self, Range<usize>), FormatError> {
        let rest = text.get(offset..).unwrap_or_default();
        if !rest.starts_with("{{") {
            return Err(FormatError::NotWrapped {
                text: rest.to_string(),
            });
        }

        let bytes = text.as_bytes();
        let mut pieces = Vec::new();
        let mut level = 0usize;
        let mut piece_start = offset + 2;
        let mut cursor = piece_start;
        while cursor < bytes.len() {
            let pair = bytes.get(cursor + 1).copied();
            match (bytes[cursor], pair) {
                (b'{', Some(b'{')) | (b'[', Some(b'[')) => {
                    level += 1;
                    cursor += 2;
                }
                (b'}', Some(b'}')) if level == 0 => {
                    pieces.push(&text[piece_start..cursor]);
                    return Ok((Self::from_pieces(&pieces), offset..cursor + 2));
                }
                (b'}', Some(b'}')) | (b']', Some(b']')) => {
                    level = level.saturating_sub(1);
                    cursor += 2;
                }
                (b'|', _) if level == 0 => {
                    pieces.push(&text[piece_start..cursor]);
                    cursor += 1;
                    piece_start = cursor;
                }
                _ => cursor += 1,
            }
        }

        Err(FormatError::Unterminated {
            text: rest.to_string(),
        })
    }

    fn from_pieces(pieces: &[&str]) -> Self {
        let Some((name, args)) = pieces.split_first() else {
            return Self::new("");
        };
        Self {
            name: name.trim().to_string(),
            args: args.iter().map(|raw| Argument::parse(raw)).collect(),
        }
    }

    /// Title comparison: `_` equals space, runs of spaces collapse and the
    /// first letter is case-insensitive.
    pub fn is_named(&self, name: &str) -> bool {
        canonical_name(&self.name) == canonical_name(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.args
            .iter()
            .find(|arg| arg.name.as_deref() == Some(name))
            .map(|arg| arg.value.as_str())
    }

    /// 0-based index among positional arguments only.
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.args
            .iter()
            .filter(|arg| arg.name.is_none())
            .nth(index)
            .map(|arg| arg.value.as_str())
    }

    /// Replace the first argument called `name`, or append a new one.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = name.trim();
        let value = value.into();
        match self
            .args
            .iter_mut()
            .find(|arg| arg.name.as_deref() == Some(name))
        {
            Some(arg) => arg.value = value,
            None => self.args.push(Argument::named(name, value)),
        }
    }

    /// Returns `true` when at least one argument was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let name = name.trim();
        let before = self.args.len();
        self.args.retain(|arg| arg.name.as_deref() != Some(name));
        self.args.len() != before
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{{}", self.name)?;
        for arg in &self.args {
            write!(f, "|{arg}")?;
        }
        f.write_str("}}")
    }
}

/// Every outermost invocation in `text` (optionally only those called
/// `name`), skipping comments and nowiki spans. Malformed candidates are
/// skipped; a non-matching invocation is searched for matching inner ones.
pub fn find_templates(text: &str, name: Option<&str>) -> Vec<(Range<usize>, Template)> {
    let protected = protected_regions(text);
    let mut out = Vec::new();
    let mut cursor = 0usize;
    while let Some(found) = text[cursor..].find("{{") {
        let start = cursor + found;
        if is_protected(&protected, start) {
            cursor = start + 2;
            continue;
        }
        match Template::parse_at(text, start) {
            Ok((template, span)) => {
                if name.is_none_or(|name| template.is_named(name)) {
                    cursor = span.end;
                    out.push((span, template));
                } else {
                    cursor = start + 2;
                }
            }
            Err(error) => {
                tracing::debug!(offset = start, %error, "skipping malformed template");
                cursor = start + 2;
            }
        }
    }
    out
}

fn is_argument_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_' || ch.is_whitespace())
}

fn canonical_name(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
