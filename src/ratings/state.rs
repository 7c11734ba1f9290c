// RatingState: the per-player attribute vector, one snapshot per update.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ratings::attribute::{clamp_attribute, Attribute, PositionGroup};
use crate::ratings::PlayerId;

/// A player's skill-attribute vector at a point in time.
///
/// Every stored attribute is kept inside [0, 99]; writes clamp. Reads of
/// attributes that were never set fall back to the schema default for the
/// player's position group. `season`/`week` record the provenance of the
/// last update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingState {
    pub player_id: PlayerId,
    pub position_group: PositionGroup,
    pub season: u16,
    pub week: u8,
    pub years_exp: u16,
    pub is_rookie: bool,
    /// Previous-season approximate value, when known. Drives the week-1
    /// regression-to-mean adjustment.
    pub last_season_av: Option<f64>,
    /// Preseason baseline overall the player was seeded from.
    pub base_overall: f64,
    values: BTreeMap<Attribute, f64>,
}

impl RatingState {
    /// A fully defaulted state: every schema attribute at its position-group
    /// default.
    pub fn baseline(player_id: PlayerId, group: PositionGroup, season: u16, week: u8) -> Self {
        let values = Attribute::ALL
            .iter()
            .map(|&a| (a, a.default_for(group)))
            .collect();
        Self {
            player_id,
            position_group: group,
            season,
            week,
            years_exp: 0,
            is_rookie: false,
            last_season_av: None,
            base_overall: 70.0,
            values,
        }
    }

    /// Current value of an attribute, falling back to the schema default.
    pub fn get(&self, attr: Attribute) -> f64 {
        self.values
            .get(&attr)
            .copied()
            .unwrap_or_else(|| attr.default_for(self.position_group))
    }

    /// Store an attribute value, clamped into [0, 99].
    pub fn set(&mut self, attr: Attribute, value: f64) {
        self.values.insert(attr, clamp_attribute(value));
    }

    /// Derived overall rating.
    pub fn overall(&self) -> f64 {
        self.get(Attribute::OverallRating)
    }

    /// Deterministic iteration over all stored attribute values.
    pub fn attributes(&self) -> impl Iterator<Item = (Attribute, f64)> + '_ {
        self.values.iter().map(|(&a, &v)| (a, v))
    }

    /// Attribute vector keyed by stable names, for persistence.
    pub fn named_values(&self) -> BTreeMap<&'static str, f64> {
        self.values.iter().map(|(&a, &v)| (a.name(), v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_uses_position_defaults() {
        let state = RatingState::baseline("qb1".into(), PositionGroup::Quarterback, 2023, 1);
        assert_eq!(state.get(Attribute::ThrowPower), 70.0);
        assert_eq!(state.get(Attribute::Catching), 0.0);
        assert_eq!(state.overall(), 70.0);
    }

    #[test]
    fn set_clamps_into_valid_range() {
        let mut state = RatingState::baseline("qb1".into(), PositionGroup::Quarterback, 2023, 1);
        state.set(Attribute::Speed, 150.0);
        assert_eq!(state.get(Attribute::Speed), 99.0);
        state.set(Attribute::Speed, -10.0);
        assert_eq!(state.get(Attribute::Speed), 0.0);
    }

    #[test]
    fn unset_attribute_reads_schema_default() {
        let mut state = RatingState::baseline("rb1".into(), PositionGroup::RunningBack, 2022, 3);
        state.values.clear();
        assert_eq!(state.get(Attribute::Trucking), 70.0);
        assert_eq!(state.get(Attribute::ThrowPower), 0.0);
    }

    #[test]
    fn named_values_use_stable_names() {
        let state = RatingState::baseline("qb1".into(), PositionGroup::Quarterback, 2023, 1);
        let named = state.named_values();
        assert_eq!(named.get("throwpower"), Some(&70.0));
        assert_eq!(named.len(), Attribute::ALL.len());
    }
}
