// SQLite persistence for computed rating snapshots.

use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};

use crate::ratings::timeline::TimelineStore;

/// SQLite-backed store for players and time-indexed rating snapshots.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database
    /// (useful for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                player_id TEXT PRIMARY KEY,
                name      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS rating_snapshots (
                player_id      TEXT NOT NULL REFERENCES players(player_id),
                season         INTEGER NOT NULL,
                week           INTEGER NOT NULL,
                position_group TEXT NOT NULL,
                overall        REAL NOT NULL,
                attributes     TEXT NOT NULL,
                written_at     TEXT NOT NULL,
                PRIMARY KEY (player_id, season, week)
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_season_week
                ON rating_snapshots(season, week);
            ",
        )
        .context("failed to create tables")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persist every post rating in the store. Existing snapshots for the
    /// same (player, season, week) are replaced. Returns the number of
    /// snapshot rows written.
    pub fn persist_store(&self, store: &TimelineStore) -> Result<usize> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        let now = Utc::now().to_rfc3339();

        let mut written = 0;
        for (player_id, timeline) in store.iter() {
            tx.execute(
                "INSERT OR REPLACE INTO players (player_id, name) VALUES (?1, ?2)",
                params![player_id, timeline.player.name],
            )
            .context("failed to upsert player")?;

            for entry in timeline.entries() {
                let Some(post) = entry.post_rating.as_ref() else {
                    continue;
                };
                let attributes = serde_json::to_string(&post.named_values())
                    .context("failed to serialize attribute vector")?;
                let group = entry
                    .position_group
                    .map(|g| g.name())
                    .unwrap_or("unknown");
                tx.execute(
                    "INSERT OR REPLACE INTO rating_snapshots
                     (player_id, season, week, position_group, overall, attributes, written_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        player_id,
                        entry.season,
                        entry.week,
                        group,
                        post.overall(),
                        attributes,
                        now
                    ],
                )
                .context("failed to insert rating snapshot")?;
                written += 1;
            }
        }
        tx.commit().context("failed to commit snapshots")?;
        Ok(written)
    }

    /// Overall-rating history for one player, ordered by (season, week).
    pub fn player_history(&self, player_id: &str) -> Result<Vec<(u16, u8, f64)>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))?;
        let mut stmt = conn
            .prepare(
                "SELECT season, week, overall FROM rating_snapshots
                 WHERE player_id = ?1 ORDER BY season, week",
            )
            .context("failed to prepare history query")?;
        let rows = stmt
            .query_map(params![player_id], |row| {
                Ok((row.get::<_, u16>(0)?, row.get::<_, u8>(1)?, row.get::<_, f64>(2)?))
            })
            .context("failed to query history")?;
        let mut history = Vec::new();
        for row in rows {
            history.push(row.context("failed to read history row")?);
        }
        Ok(history)
    }

    /// Total number of persisted snapshots.
    pub fn snapshot_count(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM rating_snapshots", [], |row| row.get(0))
            .context("failed to count snapshots")?;
        Ok(count as usize)
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

    fn store_with_entries() -> TimelineStore {
        let mut store = TimelineStore::new();
        let player = static_player("p1");
        let timeline = store.ensure(&player);
        for week in 1..=3u8 {
            let mut post =
                RatingState::baseline("p1".to_string(), PositionGroup::Quarterback, 2023, week);
            post.set(Attribute::OverallRating, 70.0 + week as f64);
            timeline.push(WeeklyPlayerRating {
                player_id: "p1".to_string(),
                season: 2023,
                week,
                team: "KC".into(),
                position_group: Some(PositionGroup::Quarterback),
                starter: true,
                status: "ACT".into(),
                pre_rating: RatingState::baseline(
                    "p1".to_string(),
                    PositionGroup::Quarterback,
                    2023,
                    week,
                ),
                performance_metrics: BTreeMap::new(),
                post_rating: Some(post),
            });
        }
        store
    }

    #[test]
    fn snapshots_round_trip() {
        let db = Database::open(":memory:").unwrap();
        let store = store_with_entries();

        let written = db.persist_store(&store).unwrap();
        assert_eq!(written, 3);
        assert_eq!(db.snapshot_count().unwrap(), 3);

        let history = db.player_history("p1").unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], (2023, 1, 71.0));
        assert_eq!(history[2], (2023, 3, 73.0));
    }

    #[test]
    fn persisting_twice_replaces_not_duplicates() {
        let db = Database::open(":memory:").unwrap();
        let store = store_with_entries();

        db.persist_store(&store).unwrap();
        db.persist_store(&store).unwrap();
        assert_eq!(db.snapshot_count().unwrap(), 3);
    }

    #[test]
    fn unknown_player_history_is_empty() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.player_history("ghost").unwrap().is_empty());
    }
}
