// Player rating engine: cohort normalization, weekly incremental updates,
// career timelines, and initialization/imputation for new players.

pub mod attribute;
pub mod cohort;
pub mod imputation;
pub mod initializer;
pub mod orchestrator;
pub mod state;
pub mod timeline;
pub mod weekly;

/// Unique identifier for players (GSIS-style id string).
pub type PlayerId = String;
