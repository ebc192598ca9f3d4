//! Tick files for replay
//!
//! One JSON object per line. A line is either a full bar
//! (`bid`, `ask`, `high`, `low`, `close`, `timestamp`) or a quote
//! (`bid`, `ask`, `timestamp`). Blank lines and `#` comments are skipped.

use basket_core::{Price, Tick, Timestamp};
use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum TickLine {
    Bar(Tick),
    Quote {
        bid: Price,
        ask: Price,
        timestamp: Timestamp,
    },
}

impl From<TickLine> for Tick {
    fn from(line: TickLine) -> Self {
        match line {
            TickLine::Bar(tick) => tick,
            TickLine::Quote {
                bid,
                ask,
                timestamp,
            } => Tick::from_quote(bid, ask, timestamp),
        }
    }
}

pub fn parse_ticks(input: &str) -> Result<Vec<Tick>> {
    let mut ticks = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed: TickLine = serde_json::from_str(line).map_err(|source| Error::TickParse {
            line: index + 1,
            source,
        })?;
        ticks.push(parsed.into());
    }
    Ok(ticks)
}

pub fn load_ticks(path: impl AsRef<Path>) -> Result<Vec<Tick>> {
    let content = std::fs::read_to_string(path)?;
    parse_ticks(&content)
}
