//! Factory functions shared by the in-tree test suites.

use glam::Vec2;

use crate::engine::SimulationEngine;
use crate::entity::{EntityId, EntityKind};
use crate::protocol::{ModeCommand, Point, SpawnCommand};

/// A stopped engine with the default arena and a fixed seed.
pub fn engine() -> SimulationEngine {
    SimulationEngine::new(42)
}

/// Spawns a drone at the given position, panicking on rejection.
pub fn spawn_drone(engine: &mut SimulationEngine, x: f32, y: f32) -> EntityId {
    spawn(engine, EntityKind::Drone, x, y, None)
}

/// Spawns a drone with an initial mode.
pub fn spawn_drone_with_mode(
    engine: &mut SimulationEngine,
    x: f32,
    y: f32,
    mode: ModeCommand,
) -> EntityId {
    spawn(engine, EntityKind::Drone, x, y, Some(mode))
}

/// Spawns a tank at the given position, panicking on rejection.
pub fn spawn_tank(engine: &mut SimulationEngine, x: f32, y: f32) -> EntityId {
    spawn(engine, EntityKind::Tank, x, y, None)
}

/// Spawns a tank with an initial mode.
pub fn spawn_tank_with_mode(
    engine: &mut SimulationEngine,
    x: f32,
    y: f32,
    mode: ModeCommand,
) -> EntityId {
    spawn(engine, EntityKind::Tank, x, y, Some(mode))
}

fn spawn(
    engine: &mut SimulationEngine,
    kind: EntityKind,
    x: f32,
    y: f32,
    mode: Option<ModeCommand>,
) -> EntityId {
    engine
        .spawn(SpawnCommand {
            kind,
            position: Point { x, y },
            heading: 0.0,
            mode,
        })
        .expect("spawn should succeed")
}

/// Starts the engine and runs `n` ticks.
pub fn run_ticks(engine: &mut SimulationEngine, n: usize) {
    engine.start();
    for _ in 0..n {
        engine.tick();
    }
}

/// Position of an entity, panicking when it does not exist.
pub fn position_of(engine: &SimulationEngine, id: EntityId) -> Vec2 {
    engine.entity(id).expect("entity exists").body().position
}
