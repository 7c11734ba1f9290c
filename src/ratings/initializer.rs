// Initialization of players newly entering tracking: assemble a lookback
// feature batch, impute the unobserved baseline attributes, and seed the
// first RatingState. Also owns the week-1 regression-to-mean path for
// returning players.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::ratings::attribute::{Attribute, PositionGroup};
use crate::ratings::cohort::SEASON_PREFIX;
use crate::ratings::imputation::{impute, ImputeError, PartialMatrix};
use crate::ratings::state::RatingState;
use crate::ratings::timeline::TimelineStore;
use crate::ratings::PlayerId;
use crate::sources::players::StaticPlayer;
use crate::sources::RatingDataset;

/// How many seasons back the initializer may reach for supporting data.
const LOOKBACK_SEASONS: u16 = 5;
/// Hard floor on the lookback window.
const EARLIEST_SEASON: u16 = 1999;

/// Regression adjustment for returning players lacking a last-season
/// approximate value.
const NO_AV_ADJUSTMENT: f64 = -0.5;
/// Bounds on the standardized feature scale and the final adjustment.
const ADJUSTMENT_BOUND: f64 = 3.0;

const GENERAL_FEATURES: &[&str] = &[
    "forty",
    "bench",
    "vertical",
    "broad_jump",
    "cone",
    "shuttle",
    "last_season_av",
];

const HELPER_FEATURES: &[&str] = &[
    "height",
    "weight",
    "years_exp",
    "draft_year",
    "draft_pick",
    "is_rookie",
];

/// Position-group KPI columns joined into the imputation batch as
/// season-average features.
const QB_INIT_KPIS: &[&str] = &[
    "completion_percentage",
    "yards_per_pass_attempt",
    "passer_rating",
    "VALUE_ELO",
    "dakota",
    "passing_epa",
    "passing_yards",
    "passing_tds",
    "passing_first_downs",
    "touchdown_per_play",
    "interceptions",
    "sack_rate",
];

fn init_kpis(group: PositionGroup) -> &'static [&'static str] {
    match group {
        PositionGroup::Quarterback => QB_INIT_KPIS,
        _ => &[],
    }
}

/// Approximate value assigned to rookies from their draft slot.
fn rookie_last_season_av(draft_round: Option<u16>, draft_pick: Option<u16>) -> Option<f64> {
    match draft_pick {
        Some(1) => Some(12.0),
        Some(2) => Some(11.0),
        Some(3) => Some(10.5),
        Some(4) => Some(9.0),
        Some(5) => Some(8.5),
        _ => draft_round.map(|round| (9.0 - round as f64) * 0.5),
    }
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Impute(#[from] ImputeError),

    #[error("no initialization candidates for {group} at {season} week {week}")]
    NoCandidates {
        group: PositionGroup,
        season: u16,
        week: u8,
    },
}

/// One assembled feature row of the imputation batch.
struct FeatureRow {
    player_id: PlayerId,
    is_init: bool,
    cells: BTreeMap<String, Option<f64>>,
}

/// Seeds new players and computes week-1 regression adjustments.
pub struct Initializer<'a> {
    data: &'a RatingDataset,
    seed: u64,
}

impl<'a> Initializer<'a> {
    pub fn new(data: &'a RatingDataset, seed: u64) -> Self {
        Self { data, seed }
    }

    fn earliest_season(season: u16) -> u16 {
        season.saturating_sub(LOOKBACK_SEASONS).max(EARLIEST_SEASON)
    }

    // -----------------------------------------------------------------
    // New-player initialization
    // -----------------------------------------------------------------

    /// Seed first RatingStates for `ids` at (season, week), using an
    /// imputation batch of the init rows plus supporting week-1 rows from
    /// the lookback window. Returns the number of players initialized.
    pub fn initialize_players(
        &self,
        ids: &[PlayerId],
        group: PositionGroup,
        season: u16,
        week: u8,
        store: &mut TimelineStore,
    ) -> Result<usize, InitError> {
        let earliest = Self::earliest_season(season);
        let kpis = init_kpis(group);

        let mut rows: Vec<FeatureRow> = Vec::new();
        for id in ids {
            let Some(player) = self.data.players.get(id) else {
                warn!("no static identity record for '{id}'; initialization deferred");
                continue;
            };
            rows.push(self.feature_row(player, season, week, true, earliest, kpis));
        }
        if rows.is_empty() {
            return Err(InitError::NoCandidates { group, season, week });
        }

        // Supporting rows: week-1 appearances of the same group inside the
        // lookback window that carry a known preseason baseline. They give
        // the imputer a population to regress against.
        for state_row in &self.data.player_weeks {
            if state_row.week != 1
                || state_row.group() != Some(group)
                || state_row.season < earliest
                || state_row.season > season
            {
                continue;
            }
            if state_row.season == season && state_row.week == week && ids.contains(&state_row.player_id)
            {
                continue; // the init rows themselves
            }
            let Some(player) = self.data.players.get(&state_row.player_id) else {
                continue;
            };
            let baseline = self
                .data
                .latest_baseline(&state_row.player_id, state_row.season, earliest);
            if baseline.and_then(|b| b.overall()).is_none() {
                continue; // no baseline, no anchor for the batch
            }
            rows.push(self.feature_row(player, state_row.season, 1, false, earliest, kpis));
        }

        // Assemble the matrix over the imputable columns plus the helper
        // regressors, drop columns observed nowhere (a data-integrity
        // requirement of the imputer), and impute.
        let mut columns: Vec<String> = Vec::new();
        columns.extend(GENERAL_FEATURES.iter().map(|c| c.to_string()));
        columns.extend(Attribute::ALL.iter().map(|a| a.name().to_string()));
        columns.extend(kpis.iter().map(|k| format!("{SEASON_PREFIX}{k}")));
        columns.extend(HELPER_FEATURES.iter().map(|c| c.to_string()));

        let mut matrix = PartialMatrix::new(columns.clone());
        for row in &rows {
            let cells: Vec<Option<f64>> = columns
                .iter()
                .map(|c| row.cells.get(c).copied().flatten())
                .collect();
            matrix.push_row(cells);
        }
        let ghosts = matrix.all_missing_columns();
        if !ghosts.is_empty() {
            let names: Vec<&str> = ghosts.iter().map(|&i| matrix.columns[i].as_str()).collect();
            debug!("excluding all-null columns from imputation: {names:?}");
            matrix.drop_columns(&ghosts);
        }
        let dense = impute(&matrix, self.seed)?;

        // Seed a RatingState for each init row from the imputed batch.
        let mut initialized = 0;
        for (row_idx, row) in rows.iter().enumerate() {
            if !row.is_init {
                continue;
            }
            let Some(player) = self.data.players.get(&row.player_id) else {
                continue;
            };
            let imputed = |name: &str| -> Option<f64> {
                matrix
                    .column_index(name)
                    .map(|c| dense[row_idx][c])
            };

            let mut state = RatingState::baseline(row.player_id.clone(), group, season, week);
            for attr in Attribute::ALL {
                if let Some(v) = imputed(attr.name()) {
                    state.set(attr, v);
                }
            }
            state.years_exp = row
                .cells
                .get("years_exp")
                .copied()
                .flatten()
                .map(|v| v.max(0.0) as u16)
                .unwrap_or(0);
            state.is_rookie = row
                .cells
                .get("is_rookie")
                .copied()
                .flatten()
                .map(|v| v != 0.0)
                .unwrap_or(false);
            state.last_season_av = imputed("last_season_av")
                .or_else(|| row.cells.get("last_season_av").copied().flatten());
            state.base_overall = state.overall();

            let timeline = store.ensure(player);
            timeline.set_initial(state, season, week);
            initialized += 1;
        }
        Ok(initialized)
    }

    /// One feature row: static identity + latest baseline + season-average
    /// KPIs at the row's (season, week).
    fn feature_row(
        &self,
        player: &StaticPlayer,
        season: u16,
        week: u8,
        is_init: bool,
        earliest: u16,
        kpis: &[&str],
    ) -> FeatureRow {
        let baseline = self.data.latest_baseline(&player.player_id, season, earliest);
        let stats = self.data.stats_row(&player.player_id, season, week);

        let is_rookie = baseline.map(|b| b.is_rookie).unwrap_or_else(|| {
            player.rookie_season == Some(season)
        });
        let years_exp = baseline.map(|b| b.years_exp).unwrap_or(0);
        let last_season_av = baseline
            .and_then(|b| b.last_season_av)
            .or_else(|| {
                if is_rookie {
                    rookie_last_season_av(player.draft_round, player.draft_pick)
                } else {
                    None
                }
            });

        let mut cells: BTreeMap<String, Option<f64>> = BTreeMap::new();
        cells.insert("forty".into(), player.forty);
        cells.insert("bench".into(), player.bench);
        cells.insert("vertical".into(), player.vertical);
        cells.insert("broad_jump".into(), player.broad_jump);
        cells.insert("cone".into(), player.cone);
        cells.insert("shuttle".into(), player.shuttle);
        cells.insert("last_season_av".into(), last_season_av);

        for attr in Attribute::ALL {
            cells.insert(
                attr.name().to_string(),
                baseline.and_then(|b| b.attribute(attr)),
            );
        }
        for kpi in kpis {
            let col = format!("{SEASON_PREFIX}{kpi}");
            cells.insert(col.clone(), stats.and_then(|s| s.metric(&col)));
        }

        cells.insert("height".into(), player.height);
        cells.insert("weight".into(), player.weight);
        cells.insert("years_exp".into(), Some(years_exp as f64));
        cells.insert("draft_year".into(), player.draft_year.map(f64::from));
        cells.insert("draft_pick".into(), player.draft_pick.map(f64::from));
        cells.insert(
            "is_rookie".into(),
            Some(if is_rookie { 1.0 } else { 0.0 }),
        );

        FeatureRow {
            player_id: player.player_id.clone(),
            is_init,
            cells,
        }
    }

    // -----------------------------------------------------------------
    // Week-1 regression to mean
    // -----------------------------------------------------------------

    /// Week-1 regression-to-mean adjustments for returning players.
    ///
    /// The eligible feature (last-season approximate value) and the current
    /// overall are min-max rescaled onto [-3, 3] across the adjustment-fit
    /// cohort; the bounded difference is added to every schema attribute.
    /// Rookies get 0; players without the feature get a fixed -0.5. The
    /// returned states are the players' week-1 pre-ratings.
    pub fn week_one_adjustments(
        &self,
        ids: &[PlayerId],
        season: u16,
        store: &TimelineStore,
    ) -> BTreeMap<PlayerId, RatingState> {
        let earliest = Self::earliest_season(season);

        // Gather each player's base state (last post rating) and refreshed
        // experience fields from the current baseline table.
        struct Candidate {
            base: RatingState,
            av: Option<f64>,
            rookie: bool,
        }
        let mut candidates: BTreeMap<PlayerId, Candidate> = BTreeMap::new();
        for id in ids {
            let Some(timeline) = store.get(id) else {
                continue;
            };
            let base = timeline
                .current_rating()
                .and_then(|w| w.post_rating.clone())
                .or_else(|| timeline.init_rating.clone());
            let Some(mut base) = base else { continue };

            let baseline = self.data.latest_baseline(id, season, earliest);
            if let Some(b) = baseline {
                base.is_rookie = b.is_rookie;
                base.years_exp = b.years_exp;
                if b.last_season_av.is_some() {
                    base.last_season_av = b.last_season_av;
                }
            }
            base.season = season;
            base.week = 1;
            candidates.insert(
                id.clone(),
                Candidate {
                    av: base.last_season_av,
                    rookie: base.is_rookie,
                    base,
                },
            );
        }

        // Min-max bounds over the fit cohort (non-rookies with the feature).
        let fit: Vec<(&PlayerId, f64, f64)> = candidates
            .iter()
            .filter(|(_, c)| !c.rookie && c.av.is_some())
            .map(|(id, c)| (id, c.av.unwrap_or(0.0), c.base.overall()))
            .collect();
        let bounds = |values: &[f64]| -> Option<(f64, f64)> {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (min.is_finite() && max.is_finite()).then_some((min, max))
        };
        let av_values: Vec<f64> = fit.iter().map(|(_, av, _)| *av).collect();
        let overall_values: Vec<f64> = fit.iter().map(|(_, _, ov)| *ov).collect();
        let av_bounds = bounds(&av_values);
        let overall_bounds = bounds(&overall_values);

        let rescale = |value: f64, bounds: Option<(f64, f64)>| -> f64 {
            match bounds {
                Some((min, max)) if max > min => {
                    2.0 * ADJUSTMENT_BOUND * (value - min) / (max - min) - ADJUSTMENT_BOUND
                }
                _ => 0.0, // degenerate cohort: everyone sits at the midpoint
            }
        };

        let mut adjusted = BTreeMap::new();
        for (id, candidate) in candidates {
            let adjustment = if candidate.rookie {
                0.0
            } else if let Some(av) = candidate.av {
                let standardized_feature = rescale(av, av_bounds);
                let standardized_overall = rescale(candidate.base.overall(), overall_bounds);
                (standardized_feature - standardized_overall)
                    .clamp(-ADJUSTMENT_BOUND, ADJUSTMENT_BOUND)
            } else {
                NO_AV_ADJUSTMENT
            };

            let mut state = candidate.base;
            if adjustment != 0.0 {
                for attr in Attribute::ALL {
                    state.set(attr, state.get(attr) + adjustment);
                }
            }
            adjusted.insert(id, state);
        }
        adjusted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
