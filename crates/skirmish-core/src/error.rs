//! Error types for the simulation core.
//!
//! Every fallible engine entry point returns [`EngineError`]. The variants
//! mirror the failure classes callers can act on: malformed commands, unknown
//! entities, spawn placement exhaustion, and scenario load failures. No
//! variant is retried internally; callers decide whether to resubmit.

use thiserror::Error;

use crate::entity::EntityId;

/// Errors surfaced by [`SimulationEngine`](crate::engine::SimulationEngine)
/// operations.
///
/// A returned error guarantees no partial state mutation, with one documented
/// exception: a scenario load that fails after the world reset leaves the
/// engine in its freshly reset state (see
/// [`SimulationEngine::load_scenario`](crate::engine::SimulationEngine::load_scenario)).
#[derive(Debug, Error)]
pub enum EngineError {
    /// A command was malformed or not applicable to the addressed entity,
    /// e.g. a tank-only mode sent to a drone.
    #[error("invalid command: {0}")]
    Validation(String),

    /// The addressed entity does not exist in the world.
    #[error("entity {0} not found")]
    NotFound(EntityId),

    /// No valid spawn position could be found near the requested point,
    /// including the expanding ring search and the fixed fallback points.
    #[error("no valid spawn position found near ({x:.1}, {y:.1})")]
    SpawnRejected {
        /// Requested x coordinate.
        x: f32,
        /// Requested y coordinate.
        y: f32,
    },

    /// A scenario could not be located, parsed, or applied.
    #[error("scenario load failed: {0}")]
    ScenarioLoad(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
