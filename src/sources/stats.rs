// Weekly performance-metric records. The metric set varies by position
// group, so columns beyond the (player_id, season, week) key are read
// dynamically from the header: raw weekly stats plus `season_avg_*`
// (cumulative-to-date) and `form_*` (rolling window) feature columns.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::ratings::cohort::{FORM_PREFIX, SEASON_PREFIX};
use crate::ratings::PlayerId;

use super::SourceError;

/// One (player, season, week) metric row. `metrics` holds every numeric
/// column from the source, keyed by the exact header name.
#[derive(Debug, Clone)]
pub struct WeeklyStatRow {
    pub player_id: PlayerId,
    pub season: u16,
    pub week: u8,
    pub metrics: BTreeMap<String, f64>,
}

impl WeeklyStatRow {
    /// Raw weekly metrics: every column without a view prefix.
    pub fn raw_metrics(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .filter(|(k, _)| !k.starts_with(SEASON_PREFIX) && !k.starts_with(FORM_PREFIX))
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Season-to-date feature columns (`season_avg_*`), full names kept.
    pub fn season_features(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .filter(|(k, _)| k.starts_with(SEASON_PREFIX))
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Rolling-window feature columns (`form_*`), full names kept.
    pub fn form_features(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .filter(|(k, _)| k.starts_with(FORM_PREFIX))
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Value of a single named column.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

fn load_from_reader<R: Read>(rdr: R) -> Result<Vec<WeeklyStatRow>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let id_idx = headers.iter().position(|h| h == "player_id");
    let season_idx = headers.iter().position(|h| h == "season");
    let week_idx = headers.iter().position(|h| h == "week");
    let (Some(id_idx), Some(season_idx), Some(week_idx)) = (id_idx, season_idx, week_idx) else {
        // Missing key columns means no row can be keyed; return no rows and
        // let the caller surface the empty-table validation error.
        warn!("weekly stats header missing player_id/season/week; no rows loaded");
        return Ok(Vec::new());
    };

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping malformed stats record: {}", e);
                continue;
            }
        };
        let player_id = record.get(id_idx).unwrap_or("").trim().to_string();
        let season = record.get(season_idx).and_then(|v| v.trim().parse::<u16>().ok());
        let week = record.get(week_idx).and_then(|v| v.trim().parse::<u8>().ok());
        let (Some(season), Some(week)) = (season, week) else {
            warn!("skipping stats row {} with unparseable season/week", line + 2);
            continue;
        };
        if player_id.is_empty() {
            warn!("skipping stats row {} with empty player_id", line + 2);
            continue;
        }

        let mut metrics = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if idx == id_idx || idx == season_idx || idx == week_idx {
                continue;
            }
            let Some(cell) = record.get(idx) else { continue };
            let cell = cell.trim();
            if cell.is_empty() {
                continue; // absent value: no signal, no contribution
            }
            match cell.parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    metrics.insert(header.clone(), v);
                }
                Ok(_) => {
                    warn!(
                        "dropping non-finite value for '{}' in stats row {}",
                        header,
                        line + 2
                    );
                }
                Err(_) => {
                    warn!(
                        "dropping non-numeric value '{}' for '{}' in stats row {}",
                        cell,
                        header,
                        line + 2
                    );
                }
            }
        }
        rows.push(WeeklyStatRow {
            player_id,
            season,
            week,
            metrics,
        });
    }
    Ok(rows)
}

/// Load weekly performance-metric rows from a CSV file.
pub fn load_weekly_stats(path: &Path) -> Result<Vec<WeeklyStatRow>, SourceError> {
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
            "weekly stats CSV produced zero valid rows".into(),
        ));
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_columns_read_from_header() {
        let csv_data = "\
player_id,season,week,passing_yards,interceptions,season_avg_completion_percentage,form_completion_percentage
p1,2023,4,320,1,66.2,70.1
p2,2023,4,180,2,61.0,58.4";

        let rows = load_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].metric("passing_yards"), Some(320.0));
        assert_eq!(rows[0].metric("interceptions"), Some(1.0));

        let raw = rows[0].raw_metrics();
        assert_eq!(raw.len(), 2);
        assert!(raw.contains_key("passing_yards"));

        let season = rows[0].season_features();
        assert_eq!(season.len(), 1);
        assert!(season.contains_key("season_avg_completion_percentage"));

        let form = rows[0].form_features();
        assert_eq!(form.len(), 1);
        assert!(form.contains_key("form_completion_percentage"));
    }

    #[test]
    fn empty_cells_are_absent_not_zero() {
        let csv_data = "\
player_id,season,week,passing_yards,dakota
p1,2023,1,250,
p2,2023,1,,0.12";

        let rows = load_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows[0].metric("dakota"), None);
        assert_eq!(rows[1].metric("passing_yards"), None);
        assert_eq!(rows[1].metric("dakota"), Some(0.12));
    }

    #[test]
    fn non_finite_and_non_numeric_cells_dropped() {
        let csv_data = "\
player_id,season,week,passing_yards,note
p1,2023,1,NaN,dnp
p2,2023,1,inf,";

        let rows = load_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].metric("passing_yards"), None);
        assert_eq!(rows[0].metric("note"), None);
        assert_eq!(rows[1].metric("passing_yards"), None);
    }

    #[test]
    fn rows_with_bad_keys_skipped() {
        let csv_data = "\
player_id,season,week,passing_yards
p1,not_a_season,1,250
,2023,1,250
p3,2023,2,199";

        let rows = load_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].player_id, "p3");
    }
}
