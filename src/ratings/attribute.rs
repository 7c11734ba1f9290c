// Attribute schema registry: the single source of truth for attribute names,
// decay buckets, per-position defaults, overall weight tables, and the
// metric -> attribute maps. Both the initializer and the weekly update
// engine consult this module instead of scattering default literals.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Position groups
// ---------------------------------------------------------------------------

/// Offensive position groups with a full rating contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PositionGroup {
    Quarterback,
    RunningBack,
    WideReceiver,
    TightEnd,
}

impl PositionGroup {
    /// Parse either the long group name ("quarterback") or the roster code
    /// ("QB"). Returns `None` for anything else; unknown groups carry no
    /// weight table and are skipped by the orchestrator.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quarterback" | "qb" => Some(Self::Quarterback),
            "running_back" | "runningback" | "rb" => Some(Self::RunningBack),
            "wide_receiver" | "widereceiver" | "wr" => Some(Self::WideReceiver),
            "tight_end" | "tightend" | "te" => Some(Self::TightEnd),
            _ => None,
        }
    }

    /// Long group name, as used in the player-week state contract.
    pub fn name(self) -> &'static str {
        match self {
            Self::Quarterback => "quarterback",
            Self::RunningBack => "running_back",
            Self::WideReceiver => "wide_receiver",
            Self::TightEnd => "tight_end",
        }
    }

    /// Short roster code (QB, RB, WR, TE).
    pub fn code(self) -> &'static str {
        match self {
            Self::Quarterback => "QB",
            Self::RunningBack => "RB",
            Self::WideReceiver => "WR",
            Self::TightEnd => "TE",
        }
    }
}

impl std::fmt::Display for PositionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Decay buckets
// ---------------------------------------------------------------------------

/// Grouping of attributes sharing one decay constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    Physical,
    Technical,
    Mental,
}

impl Bucket {
    /// Decay constant: the share of a raw weekly delta that is discarded.
    pub fn decay(self) -> f64 {
        match self {
            Bucket::Physical => 0.95,
            Bucket::Technical => 0.85,
            Bucket::Mental => 0.90,
        }
    }

    /// Retained share of a raw weekly delta (`1 - decay`), stored as its own
    /// literal so `raw * retention` is exact for the documented factors.
    pub fn retention(self) -> f64 {
        match self {
            Bucket::Physical => 0.05,
            Bucket::Technical => 0.15,
            Bucket::Mental => 0.10,
        }
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// The 31 tracked skill dimensions. Names are stable snake_case identifiers
/// used in the baseline CSV contract and the snapshot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    OverallRating,
    Agility,
    Acceleration,
    Speed,
    Stamina,
    Strength,
    Toughness,
    Injury,
    Awareness,
    Jumping,
    Trucking,
    Carrying,
    BallCarrierVision,
    StiffArm,
    SpinMove,
    JukeMove,
    ThrowPower,
    ThrowAccuracyShort,
    ThrowAccuracyMid,
    ThrowAccuracyDeep,
    PlayAction,
    ThrowOnRun,
    Catching,
    ShortRouteRunning,
    MidRouteRunning,
    DeepRouteRunning,
    SpectacularCatch,
    CatchInTraffic,
    Release,
    RunBlocking,
    PassBlocking,
}

/// Valid range for every stored attribute value (closed interval).
pub const ATTRIBUTE_MIN: f64 = 0.0;
pub const ATTRIBUTE_MAX: f64 = 99.0;

impl Attribute {
    pub const ALL: [Attribute; 31] = [
        Attribute::OverallRating,
        Attribute::Agility,
        Attribute::Acceleration,
        Attribute::Speed,
        Attribute::Stamina,
        Attribute::Strength,
        Attribute::Toughness,
        Attribute::Injury,
        Attribute::Awareness,
        Attribute::Jumping,
        Attribute::Trucking,
        Attribute::Carrying,
        Attribute::BallCarrierVision,
        Attribute::StiffArm,
        Attribute::SpinMove,
        Attribute::JukeMove,
        Attribute::ThrowPower,
        Attribute::ThrowAccuracyShort,
        Attribute::ThrowAccuracyMid,
        Attribute::ThrowAccuracyDeep,
        Attribute::PlayAction,
        Attribute::ThrowOnRun,
        Attribute::Catching,
        Attribute::ShortRouteRunning,
        Attribute::MidRouteRunning,
        Attribute::DeepRouteRunning,
        Attribute::SpectacularCatch,
        Attribute::CatchInTraffic,
        Attribute::Release,
        Attribute::RunBlocking,
        Attribute::PassBlocking,
    ];

    /// Stable column/key name.
    pub fn name(self) -> &'static str {
        match self {
            Attribute::OverallRating => "overallrating",
            Attribute::Agility => "agility",
            Attribute::Acceleration => "acceleration",
            Attribute::Speed => "speed",
            Attribute::Stamina => "stamina",
            Attribute::Strength => "strength",
            Attribute::Toughness => "toughness",
            Attribute::Injury => "injury",
            Attribute::Awareness => "awareness",
            Attribute::Jumping => "jumping",
            Attribute::Trucking => "trucking",
            Attribute::Carrying => "carrying",
            Attribute::BallCarrierVision => "ballcarriervision",
            Attribute::StiffArm => "stiffarm",
            Attribute::SpinMove => "spinmove",
            Attribute::JukeMove => "jukemove",
            Attribute::ThrowPower => "throwpower",
            Attribute::ThrowAccuracyShort => "throwaccuracyshort",
            Attribute::ThrowAccuracyMid => "throwaccuracymid",
            Attribute::ThrowAccuracyDeep => "throwaccuracydeep",
            Attribute::PlayAction => "playaction",
            Attribute::ThrowOnRun => "throwonrun",
            Attribute::Catching => "catching",
            Attribute::ShortRouteRunning => "shortrouterunning",
            Attribute::MidRouteRunning => "midrouterunning",
            Attribute::DeepRouteRunning => "deeprouterunning",
            Attribute::SpectacularCatch => "spectacularcatch",
            Attribute::CatchInTraffic => "catchintraffic",
            Attribute::Release => "release",
            Attribute::RunBlocking => "runblocking",
            Attribute::PassBlocking => "passblocking",
        }
    }

    /// Reverse lookup by stable name.
    pub fn from_name(name: &str) -> Option<Attribute> {
        Attribute::ALL.iter().copied().find(|a| a.name() == name)
    }

    /// Decay bucket. Attributes outside the physical and mental sets default
    /// to technical.
    pub fn bucket(self) -> Bucket {
        match self {
            Attribute::Speed
            | Attribute::Acceleration
            | Attribute::Agility
            | Attribute::Strength
            | Attribute::Jumping
            | Attribute::Stamina => Bucket::Physical,
            Attribute::Awareness | Attribute::Toughness | Attribute::Injury => Bucket::Mental,
            _ => Bucket::Technical,
        }
    }

    /// Baseline value the initializer falls back to when a player enters
    /// tracking without an observed value: 70 for attributes applicable to
    /// the position group, 0 otherwise.
    pub fn default_for(self, group: PositionGroup) -> f64 {
        if self.applies_to(group) {
            70.0
        } else {
            0.0
        }
    }

    /// Whether the attribute is part of a position group's applicable set.
    pub fn applies_to(self, group: PositionGroup) -> bool {
        use Attribute::*;
        // Core shared by every offensive group.
        if matches!(
            self,
            OverallRating
                | Agility
                | Acceleration
                | Speed
                | Stamina
                | Strength
                | Toughness
                | Injury
                | Awareness
                | Jumping
        ) {
            return true;
        }
        match group {
            PositionGroup::Quarterback => matches!(
                self,
                ThrowPower
                    | ThrowAccuracyShort
                    | ThrowAccuracyMid
                    | ThrowAccuracyDeep
                    | PlayAction
                    | ThrowOnRun
            ),
            PositionGroup::RunningBack => matches!(
                self,
                Trucking | Carrying | BallCarrierVision | StiffArm | SpinMove | JukeMove
            ),
            PositionGroup::WideReceiver | PositionGroup::TightEnd => matches!(
                self,
                Catching
                    | ShortRouteRunning
                    | MidRouteRunning
                    | DeepRouteRunning
                    | SpectacularCatch
                    | CatchInTraffic
                    | Release
            ),
        }
    }
}

/// Clamp a value into the valid attribute range.
pub fn clamp_attribute(value: f64) -> f64 {
    value.clamp(ATTRIBUTE_MIN, ATTRIBUTE_MAX)
}

// ---------------------------------------------------------------------------
// Overall weight tables
// ---------------------------------------------------------------------------

const QB_OVERALL_WEIGHTS: &[(Attribute, f64)] = &[
    (Attribute::ThrowPower, 0.15),
    (Attribute::ThrowAccuracyShort, 0.15),
    (Attribute::ThrowAccuracyMid, 0.15),
    (Attribute::ThrowAccuracyDeep, 0.15),
    (Attribute::Awareness, 0.15),
    (Attribute::PlayAction, 0.10),
    (Attribute::ThrowOnRun, 0.10),
    (Attribute::Stamina, 0.05),
];

const RECEIVER_OVERALL_WEIGHTS: &[(Attribute, f64)] = &[
    (Attribute::Catching, 0.20),
    (Attribute::ShortRouteRunning, 0.15),
    (Attribute::MidRouteRunning, 0.15),
    (Attribute::DeepRouteRunning, 0.15),
    (Attribute::SpectacularCatch, 0.10),
    (Attribute::CatchInTraffic, 0.10),
    (Attribute::Release, 0.10),
    (Attribute::Speed, 0.05),
];

const RB_OVERALL_WEIGHTS: &[(Attribute, f64)] = &[
    (Attribute::BallCarrierVision, 0.20),
    (Attribute::Speed, 0.15),
    (Attribute::Acceleration, 0.15),
    (Attribute::Agility, 0.15),
    (Attribute::Trucking, 0.10),
    (Attribute::Carrying, 0.10),
    (Attribute::StiffArm, 0.05),
    (Attribute::JukeMove, 0.05),
    (Attribute::SpinMove, 0.05),
];

/// Fixed attribute weights for the overall recomputation. Weights per table
/// sum to 1.0; an unlisted group would get an empty table and leave overall
/// untouched.
pub fn overall_weights(group: PositionGroup) -> &'static [(Attribute, f64)] {
    match group {
        PositionGroup::Quarterback => QB_OVERALL_WEIGHTS,
        PositionGroup::WideReceiver | PositionGroup::TightEnd => RECEIVER_OVERALL_WEIGHTS,
        PositionGroup::RunningBack => RB_OVERALL_WEIGHTS,
    }
}

// ---------------------------------------------------------------------------
// Metric -> attribute maps
// ---------------------------------------------------------------------------

const UNIVERSAL_METRIC_MAP: &[(&str, &[Attribute])] = &[
    ("epa", &[Attribute::Awareness]),
    ("total_plays", &[Attribute::Stamina]),
    ("total_turnovers", &[Attribute::Carrying, Attribute::Awareness]),
];

const QB_METRIC_MAP: &[(&str, &[Attribute])] = &[
    (
        "completion_percentage",
        &[
            Attribute::ThrowAccuracyShort,
            Attribute::ThrowAccuracyMid,
            Attribute::ThrowAccuracyDeep,
        ],
    ),
    ("yards_per_pass_attempt", &[Attribute::ThrowPower]),
    ("interceptions", &[Attribute::Awareness]),
    ("sack_rate", &[Attribute::Awareness]),
    ("passing_epa", &[Attribute::OverallRating]),
];

const RECEIVER_METRIC_MAP: &[(&str, &[Attribute])] = &[
    (
        "yards_per_route",
        &[
            Attribute::ShortRouteRunning,
            Attribute::MidRouteRunning,
            Attribute::DeepRouteRunning,
        ],
    ),
    (
        "catch_percentage",
        &[Attribute::Catching, Attribute::CatchInTraffic],
    ),
    ("target_share", &[Attribute::Release]),
    (
        "receiving_yards_after_catch",
        &[Attribute::JukeMove, Attribute::SpectacularCatch],
    ),
];

const RB_METRIC_MAP: &[(&str, &[Attribute])] = &[
    (
        "yards_per_rush_attempt",
        &[
            Attribute::BallCarrierVision,
            Attribute::Speed,
            Attribute::Acceleration,
        ],
    ),
    (
        "broken_tackles",
        &[
            Attribute::Trucking,
            Attribute::StiffArm,
            Attribute::JukeMove,
            Attribute::SpinMove,
        ],
    ),
    ("rushing_fumbles_lost", &[Attribute::Carrying]),
    ("rushing_epa", &[Attribute::OverallRating]),
];

/// Attributes a raw metric feeds for every position group, or `None` when
/// the metric carries no universal mapping.
pub fn universal_metric_targets(metric: &str) -> Option<&'static [Attribute]> {
    UNIVERSAL_METRIC_MAP
        .iter()
        .find(|(m, _)| *m == metric)
        .map(|(_, attrs)| *attrs)
}

/// Position-specific attribute targets for a raw metric.
pub fn position_metric_targets(group: PositionGroup, metric: &str) -> Option<&'static [Attribute]> {
    let map = match group {
        PositionGroup::Quarterback => QB_METRIC_MAP,
        PositionGroup::WideReceiver | PositionGroup::TightEnd => RECEIVER_METRIC_MAP,
        PositionGroup::RunningBack => RB_METRIC_MAP,
    };
    map.iter().find(|(m, _)| *m == metric).map(|(_, attrs)| *attrs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_roundtrip_for_all_attributes() {
        for attr in Attribute::ALL {
            assert_eq!(Attribute::from_name(attr.name()), Some(attr));
        }
    }

    #[test]
    fn bucket_assignment_matches_schema() {
        assert_eq!(Attribute::Speed.bucket(), Bucket::Physical);
        assert_eq!(Attribute::Stamina.bucket(), Bucket::Physical);
        assert_eq!(Attribute::Awareness.bucket(), Bucket::Mental);
        assert_eq!(Attribute::Injury.bucket(), Bucket::Mental);
        assert_eq!(Attribute::ThrowPower.bucket(), Bucket::Technical);
        // Unlisted attributes fall through to technical.
        assert_eq!(Attribute::OverallRating.bucket(), Bucket::Technical);
        assert_eq!(Attribute::RunBlocking.bucket(), Bucket::Technical);
    }

    #[test]
    fn retention_complements_decay() {
        for bucket in [Bucket::Physical, Bucket::Technical, Bucket::Mental] {
            assert!((bucket.decay() + bucket.retention() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn overall_weight_tables_sum_to_one() {
        for group in [
            PositionGroup::Quarterback,
            PositionGroup::RunningBack,
            PositionGroup::WideReceiver,
            PositionGroup::TightEnd,
        ] {
            let total: f64 = overall_weights(group).iter().map(|(_, w)| w).sum();
            assert!(
                (total - 1.0).abs() < 1e-12,
                "{group} weights sum to {total}"
            );
        }
    }

    #[test]
    fn qb_defaults_cover_throwing_but_not_receiving() {
        let qb = PositionGroup::Quarterback;
        assert_eq!(Attribute::ThrowPower.default_for(qb), 70.0);
        assert_eq!(Attribute::Awareness.default_for(qb), 70.0);
        assert_eq!(Attribute::Catching.default_for(qb), 0.0);
        assert_eq!(Attribute::Trucking.default_for(qb), 0.0);
    }

    #[test]
    fn position_group_parses_both_forms() {
        assert_eq!(PositionGroup::parse("quarterback"), Some(PositionGroup::Quarterback));
        assert_eq!(PositionGroup::parse("QB"), Some(PositionGroup::Quarterback));
        assert_eq!(PositionGroup::parse("wr"), Some(PositionGroup::WideReceiver));
        assert_eq!(PositionGroup::parse("kicker"), None);
    }

    #[test]
    fn metric_maps_resolve() {
        assert_eq!(
            universal_metric_targets("total_plays"),
            Some(&[Attribute::Stamina][..])
        );
        assert_eq!(universal_metric_targets("passing_yards"), None);

        let targets = position_metric_targets(PositionGroup::Quarterback, "completion_percentage")
            .expect("QB map entry");
        assert_eq!(targets.len(), 3);
        assert!(targets.contains(&Attribute::ThrowAccuracyDeep));

        assert!(position_metric_targets(PositionGroup::RunningBack, "completion_percentage").is_none());
    }

    #[test]
    fn clamp_keeps_values_in_range() {
        assert_eq!(clamp_attribute(-4.0), 0.0);
        assert_eq!(clamp_attribute(120.0), 99.0);
        assert_eq!(clamp_attribute(55.5), 55.5);
    }
}
