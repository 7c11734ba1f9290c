// Static identity records: biographical fields, draft information, and
// NFL Combine measurements that do not vary week to week.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ratings::PlayerId;

use super::SourceError;

/// One static identity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticPlayer {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    /// Height in inches.
    #[serde(default)]
    pub height: Option<f64>,
    /// Weight in pounds.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub college_name: Option<String>,
    #[serde(default)]
    pub rookie_season: Option<u16>,
    #[serde(default)]
    pub draft_year: Option<u16>,
    /// 0 when undrafted.
    #[serde(default)]
    pub draft_round: Option<u16>,
    #[serde(default)]
    pub draft_pick: Option<u16>,
    #[serde(default)]
    pub draft_team: Option<String>,
    /// 40-yard-dash time in seconds.
    #[serde(default)]
    pub forty: Option<f64>,
    /// Bench press reps at 225 lb.
    #[serde(default)]
    pub bench: Option<f64>,
    /// Vertical jump height in inches.
    #[serde(default)]
    pub vertical: Option<f64>,
    /// Broad jump distance in inches.
    #[serde(default)]
    pub broad_jump: Option<f64>,
    /// 3-cone-drill time in seconds.
    #[serde(default)]
    pub cone: Option<f64>,
    /// 20-yard shuttle time in seconds.
    #[serde(default)]
    pub shuttle: Option<f64>,
}

fn load_from_reader<R: Read>(rdr: R) -> Result<BTreeMap<PlayerId, StaticPlayer>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut players = BTreeMap::new();
    for result in reader.deserialize::<StaticPlayer>() {
        match result {
            Ok(mut raw) => {
                raw.player_id = raw.player_id.trim().to_string();
                raw.name = raw.name.trim().to_string();
                if raw.player_id.is_empty() {
                    warn!("skipping player row with empty player_id");
                    continue;
                }
                if players.contains_key(&raw.player_id) {
                    warn!("duplicate static record for '{}', using latest", raw.player_id);
                }
                players.insert(raw.player_id.clone(), raw);
            }
            Err(e) => {
                warn!("skipping malformed player row: {}", e);
            }
        }
    }
    Ok(players)
}

/// Load static identity records from a CSV file, keyed by player id.
pub fn load_players(path: &Path) -> Result<BTreeMap<PlayerId, StaticPlayer>, SourceError> {
    let file = std::fs::File::open(path).map_err(|e| SourceError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let players = load_from_reader(file).map_err(|e| SourceError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if players.is_empty() {
        return Err(SourceError::Validation(
            "players CSV produced zero valid rows".into(),
        ));
    }
    Ok(players)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
