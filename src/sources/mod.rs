// External tabular contracts: CSV-backed input tables, consumed read-only.
// All loading happens before rating computation begins; the core never
// performs I/O.

pub mod baselines;
pub mod players;
pub mod states;
pub mod stats;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::ratings::attribute::PositionGroup;
use crate::ratings::PlayerId;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

/// All input tables loaded and ready for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct RatingDataset {
    pub players: BTreeMap<PlayerId, players::StaticPlayer>,
    pub player_weeks: Vec<states::PlayerWeekRow>,
    pub weekly_stats: Vec<stats::WeeklyStatRow>,
    pub baselines: Vec<baselines::PreseasonBaseline>,
}

impl RatingDataset {
    /// Player-week state rows for one (season, week, position group).
    pub fn week_states(
        &self,
        season: u16,
        week: u8,
        group: PositionGroup,
    ) -> Vec<&states::PlayerWeekRow> {
        self.player_weeks
            .iter()
            .filter(|r| r.season == season && r.week == week && r.group() == Some(group))
            .collect()
    }

    /// The stats row for one (player, season, week), if any.
    pub fn stats_row(&self, player: &str, season: u16, week: u8) -> Option<&stats::WeeklyStatRow> {
        self.weekly_stats
            .iter()
            .find(|r| r.player_id == player && r.season == season && r.week == week)
    }

    /// The most recent preseason baseline for a player at or before
    /// `season`, within the given lookback window.
    pub fn latest_baseline(
        &self,
        player: &str,
        season: u16,
        earliest: u16,
    ) -> Option<&baselines::PreseasonBaseline> {
        self.baselines
            .iter()
            .filter(|b| b.player_id == player && b.season <= season && b.season >= earliest)
            .max_by_key(|b| b.season)
    }
}
