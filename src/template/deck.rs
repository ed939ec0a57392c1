//! Keyword deck - LS-DYNA style input as a keyed document
//!
//! Recognized structure:
//! - `$` comment lines and `*KEYWORD` lines are kept verbatim
//! - inside `*PARAMETER`, a real parameter line `R name value` (or
//!   `Rname value`) is a placeholder named `name`; integer (`I`) and
//!   character (`C`) parameters are kept verbatim
//! - the first data line of `*INCLUDE_PATH` can be rewritten
//!
//! One parameter per line; everything else is opaque text.

use std::collections::HashMap;
use std::path::Path;

use super::KeyedDocument;
use crate::{Error, Result};

const PARAMETER_KEYWORD: &str = "*PARAMETER";
const INCLUDE_PATH_KEYWORD: &str = "*INCLUDE_PATH";

#[derive(Debug, Clone, PartialEq)]
enum DeckLine {
    Text(String),
    Parameter {
        raw: String,
        name: String,
        bound: Option<f64>,
    },
}

/// Parsed keyword deck with a name-keyed placeholder index.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordDeck {
    lines: Vec<DeckLine>,
    placeholders: HashMap<String, usize>,
    include_path_line: Option<usize>,
    trailing_newline: bool,
}

impl KeywordDeck {
    /// Load a deck from disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a deck.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateParse`] for a real parameter line without a
    /// name or value, or a parameter name declared twice.
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = Vec::new();
        let mut placeholders = HashMap::new();
        let mut include_path_line = None;
        let mut keyword = String::new();

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim_start();

            if trimmed.starts_with('*') {
                keyword = trimmed
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_ascii_uppercase();
                lines.push(DeckLine::Text(line.to_string()));
                continue;
            }
            if trimmed.starts_with('$') || trimmed.is_empty() {
                lines.push(DeckLine::Text(line.to_string()));
                continue;
            }

            if keyword == INCLUDE_PATH_KEYWORD && include_path_line.is_none() {
                include_path_line = Some(lines.len());
            }

            if keyword == PARAMETER_KEYWORD {
                if let Some(name) = real_parameter_name(trimmed, index + 1)? {
                    if placeholders.insert(name.clone(), lines.len()).is_some() {
                        return Err(Error::TemplateParse {
                            line: index + 1,
                            reason: format!("parameter '{name}' declared twice"),
                        });
                    }
                    lines.push(DeckLine::Parameter {
                        raw: line.to_string(),
                        name,
                        bound: None,
                    });
                    continue;
                }
            }

            lines.push(DeckLine::Text(line.to_string()));
        }

        Ok(Self {
            lines,
            placeholders,
            include_path_line,
            trailing_newline: content.ends_with('\n'),
        })
    }

    /// Point the deck's `*INCLUDE_PATH` at `path`.
    ///
    /// Returns `false` if the deck has no `*INCLUDE_PATH` data line.
    pub fn set_include_path(&mut self, path: &Path) -> bool {
        let Some(index) = self.include_path_line else {
            return false;
        };
        let path = path.to_string_lossy().replace('\\', "/");
        self.lines[index] = DeckLine::Text(path);
        true
    }

    /// Current value of a parameter line: the bound value, or the value
    /// written in the template.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<f64> {
        match &self.lines[*self.placeholders.get(name)?] {
            DeckLine::Parameter {
                bound: Some(value), ..
            } => Some(*value),
            DeckLine::Parameter { raw, .. } => raw.split_whitespace().last()?.parse().ok(),
            DeckLine::Text(_) => None,
        }
    }
}

impl KeyedDocument for KeywordDeck {
    fn placeholders(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                DeckLine::Parameter { name, .. } => Some(name.as_str()),
                DeckLine::Text(_) => None,
            })
            .collect()
    }

    fn set(&mut self, name: &str, value: f64) -> bool {
        let Some(&index) = self.placeholders.get(name) else {
            return false;
        };
        if let DeckLine::Parameter { bound, .. } = &mut self.lines[index] {
            *bound = Some(value);
        }
        true
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            match line {
                DeckLine::Text(text) => out.push_str(text),
                DeckLine::Parameter {
                    name,
                    bound: Some(value),
                    ..
                } => out.push_str(&format!("R {name} {value}")),
                DeckLine::Parameter { raw, .. } => out.push_str(raw),
            }
        }
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }
}

/// Name of a real-valued parameter line, `None` for other parameter types.
fn real_parameter_name(line: &str, line_number: usize) -> Result<Option<String>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = tokens.first() else {
        return Ok(None);
    };
    if !first.starts_with(['R', 'r']) {
        return Ok(None);
    }

    // "R name value" or "Rname value"
    let (name, value_count) = if first.len() == 1 {
        (tokens.get(1).copied(), tokens.len().saturating_sub(2))
    } else {
        (Some(&first[1..]), tokens.len() - 1)
    };

    match name {
        Some(name) if value_count > 0 => Ok(Some(name.to_string())),
        _ => Err(Error::TemplateParse {
            line: line_number,
            reason: format!("real parameter line needs a name and a value: '{line}'"),
        }),
    }
}
