// Preseason baseline records: the attribute vector a player carries into a
// season, plus the experience fields that drive initialization and the
// week-1 regression adjustment. Attribute columns are matched against the
// schema registry by their stable names.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::ratings::attribute::{Attribute, PositionGroup};
use crate::ratings::PlayerId;

use super::SourceError;

/// One (player, season) preseason baseline row.
#[derive(Debug, Clone)]
pub struct PreseasonBaseline {
    pub player_id: PlayerId,
    pub season: u16,
    pub position_group: Option<PositionGroup>,
    pub years_exp: u16,
    pub is_rookie: bool,
    pub last_season_av: Option<f64>,
    pub attributes: BTreeMap<Attribute, f64>,
}

impl PreseasonBaseline {
    pub fn attribute(&self, attr: Attribute) -> Option<f64> {
        self.attributes.get(&attr).copied()
    }

    /// Baseline overall, when present.
    pub fn overall(&self) -> Option<f64> {
        self.attribute(Attribute::OverallRating)
    }
}

fn parse_bool(cell: &str) -> bool {
    matches!(cell.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn load_from_reader<R: Read>(rdr: R) -> Result<Vec<PreseasonBaseline>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let find = |name: &str| headers.iter().position(|h| h == name);
    let (Some(id_idx), Some(season_idx)) = (find("player_id"), find("season")) else {
        warn!("baseline header missing player_id/season; no rows loaded");
        return Ok(Vec::new());
    };
    let group_idx = find("position_group");
    let years_idx = find("years_exp");
    let rookie_idx = find("is_rookie");
    let av_idx = find("last_season_av");

    // Attribute columns resolved once against the schema registry.
    let attr_columns: Vec<(usize, Attribute)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, h)| Attribute::from_name(h).map(|a| (idx, a)))
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping malformed baseline record: {}", e);
                continue;
            }
        };
        let player_id = record.get(id_idx).unwrap_or("").trim().to_string();
        let season = record
            .get(season_idx)
            .and_then(|v| v.trim().parse::<u16>().ok());
        let Some(season) = season else {
            warn!("skipping baseline row {} with bad season", line + 2);
            continue;
        };
        if player_id.is_empty() {
            warn!("skipping baseline row {} with empty player_id", line + 2);
            continue;
        }

        let cell = |idx: Option<usize>| -> Option<&str> {
            idx.and_then(|i| record.get(i)).map(str::trim).filter(|c| !c.is_empty())
        };

        let mut attributes = BTreeMap::new();
        for &(idx, attr) in &attr_columns {
            let Some(raw) = record.get(idx).map(str::trim).filter(|c| !c.is_empty()) else {
                continue;
            };
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    attributes.insert(attr, v);
                }
                _ => warn!(
                    "dropping bad baseline value '{}' for '{}' in row {}",
                    raw,
                    attr.name(),
                    line + 2
                ),
            }
        }

        rows.push(PreseasonBaseline {
            player_id,
            season,
            position_group: cell(group_idx).and_then(PositionGroup::parse),
            years_exp: cell(years_idx)
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(0),
            is_rookie: cell(rookie_idx).map(parse_bool).unwrap_or(false),
            last_season_av: cell(av_idx).and_then(|v| v.parse::<f64>().ok()),
            attributes,
        });
    }
    Ok(rows)
}

/// Load preseason baseline rows from a CSV file.
pub fn load_baselines(path: &Path) -> Result<Vec<PreseasonBaseline>, SourceError> {
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
            "baseline CSV produced zero valid rows".into(),
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
    fn baseline_csv_roundtrip() {
        let csv_data = "\
player_id,season,position_group,years_exp,is_rookie,last_season_av,overallrating,throwpower,awareness
p1,2023,quarterback,6,false,14,92,95,90
p2,2023,quarterback,0,true,,68,82,55";

        let rows = load_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].overall(), Some(92.0));
        assert_eq!(rows[0].attribute(Attribute::ThrowPower), Some(95.0));
        assert_eq!(rows[0].last_season_av, Some(14.0));
        assert!(!rows[0].is_rookie);
        assert_eq!(rows[0].position_group, Some(PositionGroup::Quarterback));

        assert!(rows[1].is_rookie);
        assert_eq!(rows[1].last_season_av, None);
        assert_eq!(rows[1].years_exp, 0);
    }

    #[test]
    fn unknown_columns_ignored_known_attributes_collected() {
        let csv_data = "\
player_id,season,madden_id,throwaccuracyshort,nonsense_column
p1,2022,M123,88,zzz";

        let rows = load_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows[0].attribute(Attribute::ThrowAccuracyShort), Some(88.0));
        assert_eq!(rows[0].attributes.len(), 1);
    }

    #[test]
    fn bad_attribute_values_dropped_row_kept() {
        let csv_data = "\
player_id,season,throwpower,awareness
p1,2022,not_a_number,77";

        let rows = load_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attribute(Attribute::ThrowPower), None);
        assert_eq!(rows[0].attribute(Attribute::Awareness), Some(77.0));
    }
}
