// Weekly update engine: turns the cohort signal, the raw performance
// metrics, and the cohort-drift attribute deltas into a bounded, decayed,
// clipped attribute update plus a recomputed overall rating.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::ratings::attribute::{
    clamp_attribute, overall_weights, position_metric_targets, universal_metric_targets,
    Attribute, PositionGroup,
};
use crate::ratings::cohort::{AttributeDeltas, PositionGroupCohort};
use crate::ratings::state::RatingState;
use crate::ratings::PlayerId;

/// Hard clamp on the per-week base adjustment, independent of cohort size.
pub const MAX_WEEKLY_ADJ: f64 = 3.0;

#[derive(Debug, Error)]
pub enum WeeklyError {
    #[error("non-finite value for metric `{metric}`")]
    MalformedMetric { metric: String },
}

/// Base adjustment from the scalar cohort signal:
/// `sign(score) * min(MAX_WEEKLY_ADJ, |score * 10|)`.
pub fn base_adjustment(cohort_score: f64) -> f64 {
    let magnitude = MAX_WEEKLY_ADJ.min((cohort_score * 10.0).abs());
    if cohort_score < 0.0 {
        -magnitude
    } else {
        magnitude
    }
}

/// One player-week in the rating state machine: `pre_rating` (Active) is
/// turned into `post_rating` (Active) by `apply`. The post rating of one
/// week becomes the pre rating of the next.
#[derive(Debug, Clone)]
pub struct WeeklyPlayerRating {
    pub player_id: PlayerId,
    pub season: u16,
    pub week: u8,
    pub team: String,
    pub position_group: Option<PositionGroup>,
    pub starter: bool,
    pub status: String,
    pub pre_rating: RatingState,
    /// Raw stat name -> value for this player-week, as supplied by the
    /// performance-metric contract. Empty when the player has no stat row.
    pub performance_metrics: BTreeMap<String, f64>,
    pub post_rating: Option<RatingState>,
}

impl WeeklyPlayerRating {
    /// Run the update: accumulate metric-driven contributions and the
    /// cohort-drift deltas into an adjustment vector, then decay, clip, and
    /// round each touched attribute and recompute the overall rating.
    ///
    /// An absent cohort or empty metrics means every factor is zero: the
    /// post rating is the pre rating with updated provenance.
    pub fn apply(
        &mut self,
        cohort: Option<&PositionGroupCohort>,
        drift: Option<&AttributeDeltas>,
        season_weight: f64,
    ) -> Result<(), WeeklyError> {
        let mut adjustments = self.calculate_adjustments(cohort, season_weight)?;
        if let Some(drift) = drift {
            for (&attr, &delta) in drift {
                *adjustments.entry(attr).or_insert(0.0) += delta;
            }
        }
        self.post_rating = Some(self.apply_adjustments(&adjustments));
        Ok(())
    }

    /// The ephemeral adjustment vector: for every raw metric that maps to
    /// attributes (universal map first, then the position map), add
    /// `base_adjustment * metric_factor` into each target attribute. An
    /// attribute may accumulate contributions from several metrics.
    fn calculate_adjustments(
        &self,
        cohort: Option<&PositionGroupCohort>,
        season_weight: f64,
    ) -> Result<AttributeDeltas, WeeklyError> {
        let mut adjustments = AttributeDeltas::new();
        let Some(cohort) = cohort else {
            return Ok(adjustments);
        };
        let base = base_adjustment(cohort.cohort_score(&self.player_id, season_weight));

        for (metric, &value) in &self.performance_metrics {
            if !value.is_finite() {
                return Err(WeeklyError::MalformedMetric {
                    metric: metric.clone(),
                });
            }
            let factor = cohort.metric_factor(metric, value);
            if let Some(targets) = universal_metric_targets(metric) {
                for &attr in targets {
                    *adjustments.entry(attr).or_insert(0.0) += base * factor;
                }
            }
            if let Some(group) = self.position_group {
                if let Some(targets) = position_metric_targets(group, metric) {
                    for &attr in targets {
                        *adjustments.entry(attr).or_insert(0.0) += base * factor;
                    }
                }
            }
        }
        Ok(adjustments)
    }

    /// Decay, clip, and round each adjusted attribute, then recompute the
    /// overall rating from the position weight table. An empty adjustment
    /// vector leaves the state unchanged apart from provenance.
    fn apply_adjustments(&self, adjustments: &AttributeDeltas) -> RatingState {
        let mut next = self.pre_rating.clone();
        next.season = self.season;
        next.week = self.week;
        if adjustments.is_empty() {
            return next;
        }

        for (&attr, &raw_delta) in adjustments {
            let applied = raw_delta * attr.bucket().retention();
            let value = clamp_attribute(self.pre_rating.get(attr) + applied).round();
            next.set(attr, value);
        }

        if let Some(group) = self.position_group {
            let weights = overall_weights(group);
            if !weights.is_empty() {
                let total: f64 = weights.iter().map(|(_, w)| w).sum();
                let overall: f64 = weights
                    .iter()
                    .map(|&(attr, w)| next.get(attr) * w)
                    .sum::<f64>()
                    / total;
                next.set(Attribute::OverallRating, overall.round());
            }
        }
        next
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
