// Rating pipeline entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config (copying defaults/ -> config/ on first run)
// 3. Load the four input tables
// 4. Run the orchestrator across the configured seasons
// 5. Persist snapshots to SQLite
// 6. Print the latest week's movement report

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gridiron_ratings::config;
use gridiron_ratings::db::Database;
use gridiron_ratings::ratings::orchestrator::{weeks_in_season, Orchestrator};
use gridiron_ratings::report;
use gridiron_ratings::sources::{self, RatingDataset};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    info!("gridiron ratings starting up");

    // Optional first argument: the base directory holding config/ and data.
    let base_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let config = config::load_config(&base_dir).context("failed to load configuration")?;
    info!(
        "config loaded: seasons {}-{}, groups {:?}",
        config.run.first_season, config.run.last_season, config.run.position_groups
    );

    let data = load_dataset(&base_dir, &config)?;
    info!(
        "loaded {} players, {} player-weeks, {} stat rows, {} baselines",
        data.players.len(),
        data.player_weeks.len(),
        data.weekly_stats.len(),
        data.baselines.len()
    );

    let mut orchestrator = Orchestrator::new(&config, &data);
    orchestrator.run()?;
    let store = orchestrator.into_store();

    let db_path = base_dir.join(&config.database.path);
    let db = Database::open(&db_path.display().to_string()).context("failed to open database")?;
    let written = db.persist_store(&store).context("failed to persist snapshots")?;
    info!("persisted {written} rating snapshots to {}", db_path.display());

    // Movement report for the last processed week.
    let season = config.run.last_season;
    let week = weeks_in_season(season);
    let movement = report::weekly_movement(&store, season, week, config.report.top_n);
    print_report(&movement);

    Ok(())
}

fn load_dataset(base_dir: &Path, config: &config::RatingsConfig) -> anyhow::Result<RatingDataset> {
    let resolve = |rel: &str| base_dir.join(rel);
    Ok(RatingDataset {
        players: sources::players::load_players(&resolve(&config.data_paths.players))
            .context("failed to load players")?,
        player_weeks: sources::states::load_player_weeks(&resolve(&config.data_paths.player_weeks))
            .context("failed to load player weeks")?,
        weekly_stats: sources::stats::load_weekly_stats(&resolve(&config.data_paths.weekly_stats))
            .context("failed to load weekly stats")?,
        baselines: sources::baselines::load_baselines(&resolve(&config.data_paths.baselines))
            .context("failed to load baselines")?,
    })
}

fn print_report(movement: &report::MovementReport) {
    println!(
        "Rating movement, season {} week {}:",
        movement.season, movement.week
    );
    if movement.risers.is_empty() {
        println!("  (no processed entries for this week)");
        return;
    }
    println!("  Risers:");
    for entry in &movement.risers {
        println!(
            "    {:<24} {:>5.1} -> {:>5.1} ({:+.1})",
            entry.name, entry.pre_overall, entry.post_overall, entry.delta
        );
    }
    println!("  Fallers:");
    for entry in &movement.fallers {
        println!(
            "    {:<24} {:>5.1} -> {:>5.1} ({:+.1})",
            entry.name, entry.pre_overall, entry.post_overall, entry.delta
        );
    }
}
