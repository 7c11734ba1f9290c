// Cohort normalization: direction-corrected population z-scores over a
// position group's season and form metric views, and the per-attribute
// delta matrix that measures how far a player's mapped stats sit from the
// player's current attribute value.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::ratings::attribute::{Attribute, PositionGroup};
use crate::ratings::state::RatingState;
use crate::ratings::PlayerId;

/// Column prefix for cumulative season-to-date metrics.
pub const SEASON_PREFIX: &str = "season_avg_";
/// Column prefix for short rolling-window (form) metrics.
pub const FORM_PREFIX: &str = "form_";

/// Threshold below which a standard deviation is treated as zero.
const STDEV_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CohortError {
    #[error("attribute deltas requested before normalize() ran on both views")]
    NotNormalized,
}

/// Per-player attribute delta map (ephemeral, never persisted standalone).
pub type AttributeDeltas = BTreeMap<Attribute, f64>;

// ---------------------------------------------------------------------------
// Column statistics
// ---------------------------------------------------------------------------

/// Mean and population standard deviation of one metric column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnStats {
    pub mean: f64,
    pub stdev: f64,
}

/// Compute mean and population standard deviation (divisor N, not N-1) for
/// a slice of values. Empty input yields `{0.0, 0.0}`.
pub fn column_stats(values: &[f64]) -> ColumnStats {
    if values.is_empty() {
        return ColumnStats { mean: 0.0, stdev: 0.0 };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    ColumnStats {
        mean,
        stdev: variance.sqrt(),
    }
}

/// Z-score a value against column stats; 0.0 when the deviation is
/// (approximately) zero or undefined.
pub fn zscore(value: f64, stats: &ColumnStats) -> f64 {
    if stats.stdev < STDEV_EPSILON || !stats.stdev.is_finite() {
        return 0.0;
    }
    (value - stats.mean) / stats.stdev
}

/// Whether a higher raw value means better (positive) or worse (negative)
/// performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

// ---------------------------------------------------------------------------
// Metric views
// ---------------------------------------------------------------------------

/// One metric view (season or form): per-player rows of prefixed column ->
/// value, plus the raw column statistics captured before normalization.
#[derive(Debug, Clone, Default)]
pub struct MetricView {
    prefix: &'static str,
    rows: BTreeMap<PlayerId, BTreeMap<String, f64>>,
    /// Raw (pre-normalization) stats keyed by the unprefixed metric name.
    raw_stats: BTreeMap<String, ColumnStats>,
}

impl MetricView {
    fn new(prefix: &'static str, rows: BTreeMap<PlayerId, BTreeMap<String, f64>>) -> Self {
        Self {
            prefix,
            rows,
            raw_stats: BTreeMap::new(),
        }
    }

    fn column_name(&self, metric: &str) -> String {
        format!("{}{metric}", self.prefix)
    }

    /// Drop rows whose value for `metric` is below `min`. Rows missing the
    /// column are kept (absence is not evidence of a thin sample).
    fn drop_below(&mut self, metric: &str, min: f64) {
        let col = self.column_name(metric);
        self.rows
            .retain(|_, cols| cols.get(&col).map_or(true, |v| *v >= min));
    }

    /// Capture raw column stats for every column carrying this view's
    /// prefix. Must run before any column is overwritten with z-scores.
    fn capture_raw_stats(&mut self) {
        let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for cols in self.rows.values() {
            for (name, value) in cols {
                if let Some(metric) = name.strip_prefix(self.prefix) {
                    columns.entry(metric.to_string()).or_default().push(*value);
                }
            }
        }
        self.raw_stats = columns
            .into_iter()
            .map(|(metric, values)| (metric, column_stats(&values)))
            .collect();
    }

    /// Replace a metric column with its direction-corrected z-scores.
    fn normalize_column(&mut self, metric: &str, direction: Direction) {
        let col = self.column_name(metric);
        let Some(stats) = self.raw_stats.get(metric).copied() else {
            return;
        };
        for cols in self.rows.values_mut() {
            if let Some(value) = cols.get_mut(&col) {
                let mut z = zscore(*value, &stats);
                if direction == Direction::Negative {
                    z = -z;
                }
                *value = z;
            }
        }
    }

    fn value(&self, player: &str, metric: &str) -> Option<f64> {
        self.rows.get(player)?.get(&self.column_name(metric)).copied()
    }

    fn has_column(&self, metric: &str) -> bool {
        let col = self.column_name(metric);
        self.rows.values().any(|cols| cols.contains_key(&col))
    }

    fn raw_stats(&self, metric: &str) -> Option<ColumnStats> {
        self.raw_stats.get(metric).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_player(&self, player: &str) -> bool {
        self.rows.contains_key(player)
    }

    fn player_ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.rows.keys()
    }
}

// ---------------------------------------------------------------------------
// Position-group cohort
// ---------------------------------------------------------------------------

const QB_VALIDATION: &[(&str, f64)] = &[("pass_attempts", 5.0)];

const QB_DIRECTIONS: &[(&str, Direction)] = &[
    // Efficiency
    ("completion_percentage", Direction::Positive),
    ("yards_per_pass_attempt", Direction::Positive),
    ("passer_rating", Direction::Positive),
    ("VALUE_ELO", Direction::Positive),
    ("dakota", Direction::Positive),
    // Production
    ("passing_epa", Direction::Positive),
    ("passing_yards", Direction::Positive),
    ("passing_tds", Direction::Positive),
    ("passing_first_downs", Direction::Positive),
    // Decision-making
    ("touchdown_per_play", Direction::Positive),
    ("interceptions", Direction::Negative),
    ("sack_rate", Direction::Negative),
];

const QB_ATTR_STAT_MAP: &[(Attribute, &[&str])] = &[
    (
        Attribute::ThrowPower,
        &["passing_epa", "yards_per_pass_attempt", "touchdown_per_play"],
    ),
    (Attribute::ThrowAccuracyShort, &["completion_percentage"]),
    (Attribute::ThrowAccuracyMid, &["completion_percentage"]),
    (Attribute::ThrowAccuracyDeep, &["yards_per_pass_attempt"]),
    (Attribute::Awareness, &["interceptions", "sack_rate"]),
    (Attribute::Stamina, &["total_plays"]),
];

/// The players of one position group in one evaluation window, with the
/// season and form metric views in parallel.
///
/// Usage order is `validate()` -> `normalize()` ->
/// `compute_attribute_deltas()`; requesting deltas from an un-normalized
/// cohort is a configuration error.
#[derive(Debug, Clone)]
pub struct PositionGroupCohort {
    group: PositionGroup,
    validation: &'static [(&'static str, f64)],
    directions: &'static [(&'static str, Direction)],
    attr_stat_map: &'static [(Attribute, &'static [&'static str])],
    season: MetricView,
    form: MetricView,
    normalized: bool,
}

impl PositionGroupCohort {
    /// Quarterback cohort: completion/efficiency/production metrics with a
    /// minimum of 5 pass attempts per view row.
    pub fn quarterback(
        season_rows: BTreeMap<PlayerId, BTreeMap<String, f64>>,
        form_rows: BTreeMap<PlayerId, BTreeMap<String, f64>>,
    ) -> Self {
        Self::with_tables(
            PositionGroup::Quarterback,
            QB_VALIDATION,
            QB_DIRECTIONS,
            QB_ATTR_STAT_MAP,
            season_rows,
            form_rows,
        )
    }

    /// Generic constructor for position groups sharing the same contract.
    pub fn with_tables(
        group: PositionGroup,
        validation: &'static [(&'static str, f64)],
        directions: &'static [(&'static str, Direction)],
        attr_stat_map: &'static [(Attribute, &'static [&'static str])],
        season_rows: BTreeMap<PlayerId, BTreeMap<String, f64>>,
        form_rows: BTreeMap<PlayerId, BTreeMap<String, f64>>,
    ) -> Self {
        Self {
            group,
            validation,
            directions,
            attr_stat_map,
            season: MetricView::new(SEASON_PREFIX, season_rows),
            form: MetricView::new(FORM_PREFIX, form_rows),
            normalized: false,
        }
    }

    pub fn group(&self) -> PositionGroup {
        self.group
    }

    pub fn season_view(&self) -> &MetricView {
        &self.season
    }

    pub fn form_view(&self) -> &MetricView {
        &self.form
    }

    /// Direction for a metric; metrics outside the table read as positive.
    pub fn direction(&self, metric: &str) -> Direction {
        self.directions
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, d)| *d)
            .unwrap_or(Direction::Positive)
    }

    /// Enforce minimum-sample thresholds: drop rows whose raw value for a
    /// validated metric is below the minimum, independently per view.
    /// Idempotent: re-running with the same thresholds drops nothing more.
    pub fn validate(&mut self) {
        for (metric, min) in self.validation {
            self.season.drop_below(metric, *min);
            self.form.drop_below(metric, *min);
        }
    }

    /// Convert every direction-table metric into direction-corrected
    /// population z-scores, in both views. Raw column stats are captured
    /// first so single raw values can still be normalized afterwards.
    pub fn normalize(&mut self) {
        self.season.capture_raw_stats();
        self.form.capture_raw_stats();
        for (metric, direction) in self.directions {
            self.season.normalize_column(metric, *direction);
            self.form.normalize_column(metric, *direction);
        }
        self.normalized = true;
    }

    /// The blended per-attribute delta matrix: for every mapped attribute,
    /// the average normalized z of its mapped stats minus the z-score of
    /// the player's current attribute value across the cohort, blended
    /// `season_weight * season + (1 - season_weight) * form`.
    ///
    /// Metrics whose column is absent from a view contribute nothing.
    pub fn compute_attribute_deltas(
        &self,
        pre_ratings: &[RatingState],
        season_weight: f64,
    ) -> Result<BTreeMap<PlayerId, AttributeDeltas>, CohortError> {
        if !self.normalized {
            return Err(CohortError::NotNormalized);
        }

        // z-score the current attribute values across the cohort. A zero
        // deviation falls back to divisor 1 (all deltas then measure raw
        // distance from the mean, which is zero here anyway).
        let mut attr_z: BTreeMap<Attribute, BTreeMap<&str, f64>> = BTreeMap::new();
        for (attr, _) in self.attr_stat_map {
            let values: Vec<f64> = pre_ratings.iter().map(|r| r.get(*attr)).collect();
            let stats = column_stats(&values);
            let divisor = if stats.stdev < STDEV_EPSILON { 1.0 } else { stats.stdev };
            let zs = pre_ratings
                .iter()
                .map(|r| (r.player_id.as_str(), (r.get(*attr) - stats.mean) / divisor))
                .collect();
            attr_z.insert(*attr, zs);
        }

        let season_deltas = self.view_deltas(&self.season, &attr_z);
        let form_deltas = self.view_deltas(&self.form, &attr_z);

        let w_season = season_weight;
        let w_form = 1.0 - season_weight;

        let mut combined: BTreeMap<PlayerId, AttributeDeltas> = BTreeMap::new();
        let players: std::collections::BTreeSet<&PlayerId> =
            season_deltas.keys().chain(form_deltas.keys()).collect();
        for player in players {
            let mut merged = AttributeDeltas::new();
            let season_row = season_deltas.get(player);
            let form_row = form_deltas.get(player);
            for (attr, _) in self.attr_stat_map {
                let s = season_row.and_then(|r| r.get(attr)).copied().unwrap_or(0.0);
                let f = form_row.and_then(|r| r.get(attr)).copied().unwrap_or(0.0);
                if s != 0.0 || f != 0.0 {
                    merged.insert(*attr, w_season * s + w_form * f);
                }
            }
            if !merged.is_empty() {
                combined.insert(player.clone(), merged);
            }
        }
        Ok(combined)
    }

    fn view_deltas(
        &self,
        view: &MetricView,
        attr_z: &BTreeMap<Attribute, BTreeMap<&str, f64>>,
    ) -> BTreeMap<PlayerId, AttributeDeltas> {
        let mut deltas: BTreeMap<PlayerId, AttributeDeltas> = BTreeMap::new();
        for (attr, stats) in self.attr_stat_map {
            // Only normalized columns are comparable; skip mapped stats the
            // direction table does not cover or the view does not carry.
            let usable: Vec<&str> = stats
                .iter()
                .copied()
                .filter(|m| self.directions.iter().any(|(dm, _)| dm == m))
                .filter(|m| view.has_column(m))
                .collect();
            if usable.is_empty() {
                continue;
            }
            for player in view.player_ids() {
                let zs: Vec<f64> = usable
                    .iter()
                    .filter_map(|m| view.value(player, m))
                    .collect();
                if zs.is_empty() {
                    continue;
                }
                let stat_z = zs.iter().sum::<f64>() / zs.len() as f64;
                let Some(az) = attr_z.get(attr).and_then(|m| m.get(player.as_str())) else {
                    continue;
                };
                deltas
                    .entry(player.clone())
                    .or_default()
                    .insert(*attr, stat_z - az);
            }
        }
        deltas
    }

    /// Scalar performance signal for one player: the season-weight blend of
    /// the mean direction-corrected z across the adjustment metrics present
    /// in each view. Meaningful only after `normalize()`; 0.0 otherwise.
    pub fn cohort_score(&self, player: &str, season_weight: f64) -> f64 {
        if !self.normalized {
            return 0.0;
        }
        let view_mean = |view: &MetricView| -> f64 {
            let zs: Vec<f64> = self
                .directions
                .iter()
                .filter_map(|(metric, _)| view.value(player, metric))
                .collect();
            if zs.is_empty() {
                0.0
            } else {
                zs.iter().sum::<f64>() / zs.len() as f64
            }
        };
        season_weight * view_mean(&self.season) + (1.0 - season_weight) * view_mean(&self.form)
    }

    /// Direction-corrected z of a single raw weekly value against the
    /// season view's raw column statistics. No captured stats -> 0.0
    /// (missing data contributes nothing).
    pub fn metric_factor(&self, metric: &str, value: f64) -> f64 {
        let Some(stats) = self.season.raw_stats(metric) else {
            return 0.0;
        };
        let z = zscore(value, &stats);
        match self.direction(metric) {
            Direction::Positive => z,
            Direction::Negative => -z,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
