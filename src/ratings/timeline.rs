// Career timelines: the append-only per-player history of weekly ratings,
// and the explicit player -> timeline registry the orchestrator owns.

use std::collections::BTreeMap;

use crate::ratings::state::RatingState;
use crate::ratings::weekly::WeeklyPlayerRating;
use crate::ratings::PlayerId;
use crate::sources::players::StaticPlayer;

/// A player's rating evolution across their tracked career.
///
/// Entries are append-only; ordering of (season, week) keys is the
/// orchestrator's responsibility, not enforced here.
#[derive(Debug, Clone)]
pub struct CareerTimeline {
    pub player: StaticPlayer,
    pub init_rating: Option<RatingState>,
    pub init_season: Option<u16>,
    pub init_week: Option<u8>,
    pub last_updated_season: Option<u16>,
    pub last_updated_week: Option<u8>,
    entries: Vec<WeeklyPlayerRating>,
}

impl CareerTimeline {
    pub fn new(player: StaticPlayer) -> Self {
        Self {
            player,
            init_rating: None,
            init_season: None,
            init_week: None,
            last_updated_season: None,
            last_updated_week: None,
            entries: Vec::new(),
        }
    }

    /// The most recently appended weekly rating, or `None` for an empty
    /// timeline.
    pub fn current_rating(&self) -> Option<&WeeklyPlayerRating> {
        self.entries.last()
    }

    /// Whether the player still needs a seeded initial state. Equivalently:
    /// the timeline is empty and no init rating has been produced.
    pub fn needs_initialization(&self) -> bool {
        self.init_rating.is_none()
    }

    /// Record the seeded initial state and its provenance. Called exactly
    /// once per player.
    pub fn set_initial(&mut self, state: RatingState, season: u16, week: u8) {
        self.init_rating = Some(state);
        self.init_season = Some(season);
        self.init_week = Some(week);
    }

    /// Append one processed player-week and advance the update provenance.
    pub fn push(&mut self, entry: WeeklyPlayerRating) {
        self.last_updated_season = Some(entry.season);
        self.last_updated_week = Some(entry.week);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[WeeklyPlayerRating] {
        &self.entries
    }

    /// The entry for one (season, week), if it was processed.
    pub fn entry_at(&self, season: u16, week: u8) -> Option<&WeeklyPlayerRating> {
        self.entries
            .iter()
            .find(|e| e.season == season && e.week == week)
    }
}

/// Explicit registry of career timelines, keyed by player id. Created empty
/// at run start, owned and mutated only by the orchestrator, entries added
/// lazily on first appearance and never removed during a run.
#[derive(Debug, Clone, Default)]
pub struct TimelineStore {
    timelines: BTreeMap<PlayerId, CareerTimeline>,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or lazily create the timeline for a player.
    pub fn ensure(&mut self, player: &StaticPlayer) -> &mut CareerTimeline {
        self.timelines
            .entry(player.player_id.clone())
            .or_insert_with(|| CareerTimeline::new(player.clone()))
    }

    pub fn get(&self, player_id: &str) -> Option<&CareerTimeline> {
        self.timelines.get(player_id)
    }

    pub fn get_mut(&mut self, player_id: &str) -> Option<&mut CareerTimeline> {
        self.timelines.get_mut(player_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &CareerTimeline)> {
        self.timelines.iter()
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::attribute::PositionGroup;
    use std::collections::BTreeMap;

    fn static_player(id: &str) -> StaticPlayer {
        StaticPlayer {
            player_id: id.to_string(),
            name: format!("Player {id}"),
            birth_date: None,
            height: None,
            weight: None,
            college_name: None,
            rookie_season: None,
            draft_year: None,
            draft_round: None,
            draft_pick: None,
            draft_team: None,
            forty: None,
            bench: None,
            vertical: None,
            broad_jump: None,
            cone: None,
            shuttle: None,
        }
    }

    fn entry(id: &str, season: u16, week: u8) -> WeeklyPlayerRating {
        WeeklyPlayerRating {
            player_id: id.to_string(),
            season,
            week,
            team: "KC".into(),
            position_group: Some(PositionGroup::Quarterback),
            starter: true,
            status: "ACT".into(),
            pre_rating: RatingState::baseline(id.to_string(), PositionGroup::Quarterback, season, week),
            performance_metrics: BTreeMap::new(),
            post_rating: Some(RatingState::baseline(
                id.to_string(),
                PositionGroup::Quarterback,
                season,
                week,
            )),
        }
    }

    #[test]
    fn current_rating_none_iff_empty() {
        let mut timeline = CareerTimeline::new(static_player("p1"));
        assert!(timeline.current_rating().is_none());
        assert!(timeline.needs_initialization());

        timeline.set_initial(
            RatingState::baseline("p1".into(), PositionGroup::Quarterback, 2023, 1),
            2023,
            1,
        );
        assert!(!timeline.needs_initialization());

        timeline.push(entry("p1", 2023, 1));
        timeline.push(entry("p1", 2023, 2));
        let current = timeline.current_rating().unwrap();
        assert_eq!((current.season, current.week), (2023, 2));
        assert_eq!(timeline.last_updated_week, Some(2));
    }

    #[test]
    fn entry_lookup_by_season_week() {
        let mut timeline = CareerTimeline::new(static_player("p1"));
        timeline.push(entry("p1", 2023, 1));
        timeline.push(entry("p1", 2023, 2));
        assert!(timeline.entry_at(2023, 2).is_some());
        assert!(timeline.entry_at(2023, 9).is_none());
    }

    #[test]
    fn store_creates_lazily_and_never_duplicates() {
        let mut store = TimelineStore::new();
        assert!(store.is_empty());

        store.ensure(&static_player("p1"));
        store.ensure(&static_player("p2"));
        store.ensure(&static_player("p1"));
        assert_eq!(store.len(), 2);
        assert!(store.get("p1").is_some());
        assert!(store.get("p3").is_none());
    }
}
