// Player-week state records: who was on a roster where, at which position,
// and whether they started.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ratings::attribute::PositionGroup;
use crate::ratings::PlayerId;

use super::SourceError;

/// One player-week state row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerWeekRow {
    pub player_id: PlayerId,
    pub season: u16,
    pub week: u8,
    #[serde(default)]
    pub team: String,
    /// Long group name, e.g. "quarterback".
    #[serde(default)]
    pub position_group: String,
    /// Roster code, e.g. "QB".
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub starter: bool,
    /// Availability status, e.g. "ACT", "INJURED".
    #[serde(default)]
    pub status: String,
}

impl PlayerWeekRow {
    /// Parsed position group; rows with unrecognized groups carry no rating
    /// contract and are skipped by the orchestrator.
    pub fn group(&self) -> Option<PositionGroup> {
        PositionGroup::parse(&self.position_group).or_else(|| PositionGroup::parse(&self.position))
    }
}

fn load_from_reader<R: Read>(rdr: R) -> Result<Vec<PlayerWeekRow>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<PlayerWeekRow>() {
        match result {
            Ok(mut row) => {
                row.player_id = row.player_id.trim().to_string();
                if row.player_id.is_empty() {
                    warn!("skipping state row with empty player_id");
                    continue;
                }
                if row.week == 0 {
                    warn!(
                        "skipping state row for '{}' with week 0 (weeks are 1-based)",
                        row.player_id
                    );
                    continue;
                }
                rows.push(row);
            }
            Err(e) => {
                warn!("skipping malformed player-week row: {}", e);
            }
        }
    }
    Ok(rows)
}

/// Load player-week state rows from a CSV file.
pub fn load_player_weeks(path: &Path) -> Result<Vec<PlayerWeekRow>, SourceError> {
    let file = std::fs::File::open(path).map_err(|e| SourceError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let rows = load_from_reader(file).map_err(|e| SourceError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if rows.is_empty() {
        return Err(SourceError::Validation(
            "player-week CSV produced zero valid rows".into(),
        ));
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
