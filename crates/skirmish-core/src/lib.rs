//! # Skirmish Core
//!
//! Authoritative, fixed-timestep simulation of autonomous drones and tanks
//! on a 2D terrain grid.
//!
//! The core owns the world: entity kinematics and tactical behavior state
//! machines, terrain-aware movement and sensing, collision resolution, spawn
//! validation, scenario loading, and bounded event/chat logs. Everything else
//! - transport, schema validation, command generation - is an external
//! collaborator that feeds structured commands in and reads
//! [`SimulationSnapshot`](protocol::SimulationSnapshot)s out.
//!
//! ## Usage
//!
//! ```
//! use skirmish_core::engine::SimulationEngine;
//! use skirmish_core::entity::EntityKind;
//! use skirmish_core::protocol::{Point, SpawnCommand};
//!
//! let mut engine = SimulationEngine::new(42);
//! engine.spawn(SpawnCommand {
//!     kind: EntityKind::Drone,
//!     position: Point { x: 100.0, y: 100.0 },
//!     heading: 0.0,
//!     mode: None,
//! })?;
//!
//! engine.start();
//! let snapshot = engine.tick().expect("running engine ticks");
//! assert_eq!(snapshot.entities.len(), 1);
//! # Ok::<(), skirmish_core::error::EngineError>(())
//! ```
//!
//! ## Concurrency
//!
//! The engine is deliberately single-threaded: a tick is a short, bounded
//! computation, and all entry points expect to be serialized by one
//! coordinating task or a mutex owned by the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod engine;
pub mod entity;
pub mod error;
pub mod events;
pub mod protocol;
pub mod scenario;
pub mod terrain;
pub mod world_view;

pub use engine::{RunState, SimulationEngine};
pub use entity::{Entity, EntityId, EntityKind};
pub use error::{EngineError, Result};
pub use terrain::TerrainGrid;

#[cfg(test)]
mod tests;
