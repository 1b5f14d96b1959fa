//! Plain-text observation scripts for replaying recorded rounds.
//!
//! One observation per line, whitespace-separated `key=value` fields:
//!
//! ```text
//! # opening deal
//! signal=deal indicator=Y6
//! hand=R1,R2,R3,K5,K6,K7,B9,B10,B11,Y1,Y2,Y3,K12,?
//! signal=player hand=R1,...,Y9@0.55 discard=K4
//! signal=end
//! ```
//!
//! `?` is an unrecognized tile, `T@c` a tile read with confidence `c`,
//! `discard=-` an empty discard pile, `joker=` the okey itself.

use crate::error::OkeyError;
use crate::state::{ObservedTile, Observation, PhaseSignal};
use crate::tile::Tile;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("line {line}: {source}")]
    Tile {
        line: usize,
        #[source]
        source: OkeyError,
    },
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>[a-z_]+)=(?P<value>\S*)$").expect("field pattern is a valid regex")
});

static CONFIDENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<tile>[^@]+)@(?P<confidence>[0-9]*\.?[0-9]+)$")
        .expect("confidence pattern is a valid regex")
});

fn syntax(line: usize, message: impl Into<String>) -> ScriptError {
    ScriptError::Syntax {
        line,
        message: message.into(),
    }
}

fn tile_at(line: usize, text: &str) -> Result<Tile, ScriptError> {
    Tile::from_string(text).map_err(|source| ScriptError::Tile { line, source })
}

fn parse_signal(line: usize, value: &str) -> Result<PhaseSignal, ScriptError> {
    match value {
        "deal" => Ok(PhaseSignal::DealDetected),
        "player" => Ok(PhaseSignal::PlayerTurn),
        "opponent" => Ok(PhaseSignal::OpponentTurn),
        "end" => Ok(PhaseSignal::RoundEnd),
        "none" => Ok(PhaseSignal::None),
        other => Err(syntax(line, format!("unknown signal '{other}'"))),
    }
}

fn parse_observed(line: usize, token: &str) -> Result<ObservedTile, ScriptError> {
    if token == "?" {
        return Ok(ObservedTile::Unknown);
    }
    match CONFIDENCE.captures(token) {
        Some(caps) => {
            let confidence: f32 = caps["confidence"]
                .parse()
                .map_err(|_| syntax(line, format!("bad confidence in '{token}'")))?;
            Ok(ObservedTile::Known {
                tile: tile_at(line, &caps["tile"])?,
                confidence,
            })
        }
        None => Ok(ObservedTile::certain(tile_at(line, token)?)),
    }
}

/// Parses one script line. Blank lines and comments give `None`.
pub fn parse_line(line: usize, text: &str) -> Result<Option<Observation>, ScriptError> {
    let text = match text.find('#') {
        Some(idx) => &text[..idx],
        None => text,
    }
    .trim();
    if text.is_empty() {
        return Ok(None);
    }

    let mut obs = Observation::default();
    for field in text.split_whitespace() {
        let caps = FIELD
            .captures(field)
            .ok_or_else(|| syntax(line, format!("expected key=value, found '{field}'")))?;
        let value = &caps["value"];
        match &caps["key"] {
            "signal" => obs.signal = parse_signal(line, value)?,
            "hand" => {
                let tiles = value
                    .split(',')
                    .filter(|t| !t.is_empty())
                    .map(|t| parse_observed(line, t))
                    .collect::<Result<Vec<_>, _>>()?;
                obs.hand = Some(tiles);
            }
            "discard" => {
                obs.discard_top = match value {
                    "-" | "" => None,
                    tile => Some(tile_at(line, tile)?),
                }
            }
            "joker" => obs.okey = Some(tile_at(line, value)?),
            "indicator" => obs.joker_indicator = Some(tile_at(line, value)?),
            other => return Err(syntax(line, format!("unknown field '{other}'"))),
        }
    }
    Ok(Some(obs))
}

/// Parses a whole script, keeping the 1-based line number of each
/// observation.
pub fn parse_script(text: &str) -> Result<Vec<(usize, Observation)>, ScriptError> {
    let mut observations = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        if let Some(obs) = parse_line(idx + 1, raw)? {
            observations.push((idx + 1, obs));
        }
    }
    Ok(observations)
}
