// Weekly rating-movement report: the biggest risers and fallers for one
// (season, week), ranked by post-minus-pre overall movement. A boundary
// consumer of the rating output; pure function over the timeline store.

use crate::ratings::timeline::TimelineStore;
use crate::ratings::PlayerId;

/// One player's movement in one week.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementEntry {
    pub player_id: PlayerId,
    pub name: String,
    pub position_group: String,
    pub pre_overall: f64,
    pub post_overall: f64,
    pub delta: f64,
}

/// Top-N risers and fallers for one week.
#[derive(Debug, Clone)]
pub struct MovementReport {
    pub season: u16,
    pub week: u8,
    pub risers: Vec<MovementEntry>,
    pub fallers: Vec<MovementEntry>,
}

/// Build the movement report for (season, week). Players without a
/// processed entry that week are absent. Ties break on player id so the
/// report is deterministic.
pub fn weekly_movement(
    store: &TimelineStore,
    season: u16,
    week: u8,
    top_n: usize,
) -> MovementReport {
    let mut entries: Vec<MovementEntry> = Vec::new();
    for (player_id, timeline) in store.iter() {
        let Some(entry) = timeline.entry_at(season, week) else {
            continue;
        };
        let Some(post) = entry.post_rating.as_ref() else {
            continue;
        };
        let pre_overall = entry.pre_rating.overall();
        let post_overall = post.overall();
        entries.push(MovementEntry {
            player_id: player_id.clone(),
            name: timeline.player.name.clone(),
            position_group: entry
                .position_group
                .map(|g| g.name().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            pre_overall,
            post_overall,
            delta: post_overall - pre_overall,
        });
    }

    let mut risers = entries.clone();
    risers.sort_by(|a, b| {
        b.delta
            .partial_cmp(&a.delta)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    risers.truncate(top_n);

    let mut fallers = entries;
    fallers.sort_by(|a, b| {
        a.delta
            .partial_cmp(&b.delta)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    fallers.truncate(top_n);

    MovementReport {
        season,
        week,
        risers,
        fallers,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::attribute::{Attribute, PositionGroup};
    use crate::ratings::state::RatingState;
    use crate::ratings::weekly::WeeklyPlayerRating;
    use crate::sources::players::StaticPlayer;
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

    fn push_week(store: &mut TimelineStore, id: &str, pre: f64, post: f64) {
        let player = static_player(id);
        let timeline = store.ensure(&player);
        let mut pre_state =
            RatingState::baseline(id.to_string(), PositionGroup::Quarterback, 2023, 4);
        pre_state.set(Attribute::OverallRating, pre);
        let mut post_state = pre_state.clone();
        post_state.set(Attribute::OverallRating, post);
        timeline.push(WeeklyPlayerRating {
            player_id: id.to_string(),
            season: 2023,
            week: 4,
            team: "KC".into(),
            position_group: Some(PositionGroup::Quarterback),
            starter: true,
            status: "ACT".into(),
            pre_rating: pre_state,
            performance_metrics: BTreeMap::new(),
            post_rating: Some(post_state),
        });
    }

    #[test]
    fn risers_and_fallers_ranked_by_delta() {
        let mut store = TimelineStore::new();
        push_week(&mut store, "up2", 70.0, 72.0);
        push_week(&mut store, "up1", 70.0, 71.0);
        push_week(&mut store, "down3", 80.0, 77.0);
        push_week(&mut store, "flat", 75.0, 75.0);

        let report = weekly_movement(&store, 2023, 4, 2);
        assert_eq!(report.risers.len(), 2);
        assert_eq!(report.risers[0].player_id, "up2");
        assert_eq!(report.risers[0].delta, 2.0);
        assert_eq!(report.risers[1].player_id, "up1");

        assert_eq!(report.fallers[0].player_id, "down3");
        assert_eq!(report.fallers[0].delta, -3.0);
        assert_eq!(report.fallers[1].player_id, "flat");
    }

    #[test]
    fn other_weeks_do_not_leak_in() {
        let mut store = TimelineStore::new();
        push_week(&mut store, "p1", 70.0, 73.0);
        let report = weekly_movement(&store, 2023, 9, 5);
        assert!(report.risers.is_empty());
        assert!(report.fallers.is_empty());
    }

    #[test]
    fn ties_break_deterministically_on_player_id() {
        let mut store = TimelineStore::new();
        push_week(&mut store, "b", 70.0, 71.0);
        push_week(&mut store, "a", 70.0, 71.0);
        let report = weekly_movement(&store, 2023, 4, 2);
        assert_eq!(report.risers[0].player_id, "a");
        assert_eq!(report.risers[1].player_id, "b");
    }
}
