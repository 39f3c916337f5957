//! Drop table text files.
//!
//! One entry per line:
//!
//! ```text
//! ; comment
//! 1/10 Gold 500
//! 1/5 (MP)DrugLarge
//! 1/40 (Weapon) BronzeSword
//! ```

use std::path::Path;
use std::str::FromStr;

use log::{debug, warn};

use crate::error::{WorldError, WorldResult};

/// What a drop entry produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropPayload {
    Gold(u64),
    Item(String),
}

/// One probabilistic loot entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropInfo {
    /// The entry fires with probability 1/chance
    pub chance: u32,
    /// Optional category tag, e.g. `MP` in `(MP)DrugLarge`
    pub tag: Option<String>,
    pub payload: DropPayload,
}

fn malformed(line: &str, reason: &'static str) -> WorldError {
    WorldError::DropParse {
        line: line.to_string(),
        reason,
    }
}

/// Split a leading `(tag)` off `text`
fn split_tag(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('(')?;
    let end = rest.find(')')?;
    Some((&rest[..end], rest[end + 1..].trim_start()))
}

impl FromStr for DropInfo {
    type Err = WorldError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (ratio, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| malformed(line, "missing payload"))?;

        let (numerator, denominator) = ratio
            .split_once('/')
            .ok_or_else(|| malformed(line, "chance must be written as a/b"))?;
        let numerator: u32 = numerator
            .parse()
            .map_err(|_| malformed(line, "invalid numerator"))?;
        let denominator: u32 = denominator
            .parse()
            .map_err(|_| malformed(line, "invalid denominator"))?;
        if numerator == 0 || denominator == 0 {
            return Err(malformed(line, "chance values must be positive"));
        }
        let chance = (denominator / numerator).max(1);

        let rest = rest.trim();
        let (tag, payload) = match split_tag(rest) {
            Some((tag, payload)) => (Some(tag.to_string()), payload),
            None => (None, rest),
        };

        let mut words = payload.split_whitespace();
        let payload = match (words.next(), words.next()) {
            (Some(word), Some(amount)) if word.eq_ignore_ascii_case("gold") => {
                let amount = amount
                    .parse()
                    .map_err(|_| malformed(line, "invalid gold amount"))?;
                DropPayload::Gold(amount)
            }
            (Some(name), None) => DropPayload::Item(name.to_string()),
            (None, _) => return Err(malformed(line, "missing payload")),
            _ => return Err(malformed(line, "unexpected trailing text")),
        };

        Ok(DropInfo { chance, tag, payload })
    }
}

/// Parse a drop file. Malformed lines are logged and skipped.
pub fn parse_drop_table(source: &str, content: &str) -> Vec<DropInfo> {
    let mut drops = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        match line.parse::<DropInfo>() {
            Ok(drop) => drops.push(drop),
            Err(e) => warn!("{}:{}: skipping drop line: {}", source, number + 1, e),
        }
    }
    drops
}

/// Load `<dir>/<TemplateName>.txt` for every file in `dir`
pub fn load_drop_dir(dir: &Path) -> WorldResult<Vec<(String, Vec<DropInfo>)>> {
    let mut tables = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let content = std::fs::read_to_string(&path)?;
        let drops = parse_drop_table(name, &content);
        debug!("Loaded {} drops for {}", drops.len(), name);
        tables.push((name.to_string(), drops));
    }
    Ok(tables)
}
