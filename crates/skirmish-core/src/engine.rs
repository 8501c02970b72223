//! The simulation engine: entity ownership, tick orchestration, commands.
//!
//! [`SimulationEngine`] is the single owner of the entity map, terrain, and
//! logs; every mutation flows through it. External callers drive it with the
//! inbound commands of [`protocol`](crate::protocol) and read back
//! [`SimulationSnapshot`]s. An outside scheduler invokes [`tick`] at roughly
//! a fixed cadence (the engine tolerates drift; the speed multiplier scales
//! physics, not the scheduler).
//!
//! # Tick structure
//!
//! 1. Each entity updates in ascending id order: the engine takes it out of
//!    the map, hands its behavior a read view of the remaining siblings,
//!    reinserts it, and applies any returned effects so later entities in the
//!    same tick observe them.
//! 2. A global interaction pass recomputes tank detection (terrain-scaled
//!    radius plus line of sight) and resolves close-range kamikaze strikes.
//! 3. The clock advances and a tick-rate sample is taken.
//!
//! Entry points and ticks must be serialized by the caller (one coordinating
//! task or a mutex around the engine); the engine itself is single-threaded
//! and never blocks on I/O inside the tick path. Scenario loading is the one
//! file-reading operation and must not overlap a tick.
//!
//! [`tick`]: SimulationEngine::tick

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::entity::{
    Activity, Effect, Entity, EntityFlags, EntityId, EntityKind, UpdateContext,
};
use crate::error::{EngineError, Result};
use crate::events::{
    BoundedLog, ChatMessage, SimEvent, CHAT_LOG_CAPACITY, EVENT_LOG_CAPACITY,
};
use crate::protocol::{
    ArenaBounds, CommandContext, ContextSummary, ControlAction, ControlCommand, EntityCommand,
    EntitySnapshot, Metrics, ModeCommand, NearbyEntity, Point, SimulationInfo, SimulationSnapshot,
    SpawnCommand,
};
use crate::scenario::{self, ScenarioFile, ScenarioInfo, ScenarioSummary};
use crate::terrain::TerrainGrid;
use crate::world_view::WorldView;

/// Default fixed timestep (60 Hz).
pub const DEFAULT_DT: f32 = 1.0 / 60.0;

/// Lower clamp for the speed multiplier.
pub const SPEED_MULTIPLIER_MIN: f32 = 0.1;

/// Upper clamp for the speed multiplier.
pub const SPEED_MULTIPLIER_MAX: f32 = 20.0;

/// Minimum clearance from live entities for a ground spawn.
const SPAWN_CLEARANCE: f32 = 15.0;

/// Ground terrain above this movement cost rejects a spawn.
const SPAWN_MAX_MOVE_COST: f32 = 5.0;

/// Radial step of the relocation ring search.
const SPAWN_RING_STEP: f32 = 10.0;

/// Outer limit of the relocation ring search.
const SPAWN_RING_MAX: f32 = 100.0;

/// Range of the engine-level kamikaze resolution.
const ENGINE_KAMIKAZE_RANGE: f32 = 5.0;

/// Radius of the command-generation context query.
const CONTEXT_RADIUS: f32 = 100.0;

/// Events included in a snapshot.
const SNAPSHOT_EVENTS: usize = 50;

/// Chat messages included in a snapshot.
const SNAPSHOT_CHAT: usize = 100;

/// Simulation lifecycle state.
///
/// Transitions: Stopped -> (start) -> Running -> (pause) -> Paused ->
/// (start) -> Running; reset returns to Stopped from anywhere with a full
/// world clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Not ticking; the world may be empty or staged.
    Stopped,
    /// Ticks advance the world.
    Running,
    /// Ticks are ignored; the world is frozen.
    Paused,
}

/// Authoritative owner of the simulated world.
///
/// All randomness draws from a seeded RNG, so two engines driven with the
/// same seed and the same command sequence produce identical worlds.
#[derive(Debug)]
pub struct SimulationEngine {
    dt: f32,
    speed_multiplier: f32,
    state: RunState,
    arena_bounds: Vec2,
    terrain: TerrainGrid,
    entities: BTreeMap<EntityId, Entity>,
    next_id: u64,
    selected: Vec<EntityId>,
    events: BoundedLog<SimEvent>,
    chat: BoundedLog<ChatMessage>,
    simulation_time: f32,
    total_spawned: u64,
    total_destroyed: u64,
    scenario_dir: PathBuf,
    current_scenario: Option<String>,
    rng: ChaCha8Rng,
    tick_count_in_window: u32,
    window_started: Instant,
    ticks_per_second: f32,
}

impl SimulationEngine {
    /// Creates an engine with the default 60 Hz timestep and an 800x600 arena.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_dt(DEFAULT_DT, seed)
    }

    /// Creates an engine with a custom fixed timestep.
    #[must_use]
    pub fn with_dt(dt: f32, seed: u64) -> Self {
        Self {
            dt,
            speed_multiplier: 1.0,
            state: RunState::Stopped,
            arena_bounds: Vec2::new(800.0, 600.0),
            terrain: TerrainGrid::default(),
            entities: BTreeMap::new(),
            next_id: 0,
            selected: Vec::new(),
            events: BoundedLog::new(EVENT_LOG_CAPACITY),
            chat: BoundedLog::new(CHAT_LOG_CAPACITY),
            simulation_time: 0.0,
            total_spawned: 0,
            total_destroyed: 0,
            scenario_dir: PathBuf::from("scenarios"),
            current_scenario: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick_count_in_window: 0,
            window_started: Instant::now(),
            ticks_per_second: 0.0,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts or resumes ticking.
    pub fn start(&mut self) {
        self.state = RunState::Running;
        info!("simulation started");
    }

    /// Pauses ticking, keeping the world intact.
    pub fn pause(&mut self) {
        self.state = RunState::Paused;
        info!("simulation paused");
    }

    /// Stops and clears the world: entities, selection, logs, clock, and
    /// counters. Terrain persists; scenario loading owns terrain replacement.
    pub fn reset(&mut self) {
        self.state = RunState::Stopped;
        self.entities.clear();
        self.selected.clear();
        self.events.clear();
        self.chat.clear();
        self.simulation_time = 0.0;
        self.total_spawned = 0;
        self.total_destroyed = 0;
        self.current_scenario = None;
        self.tick_count_in_window = 0;
        self.ticks_per_second = 0.0;
        info!("simulation reset");
    }

    /// Sets the speed multiplier, clamped to the
    /// [`SPEED_MULTIPLIER_MIN`]..[`SPEED_MULTIPLIER_MAX`] range.
    ///
    /// The multiplier scales the delta passed into physics; the scheduler's
    /// tick period is unaffected.
    pub fn set_speed(&mut self, multiplier: f32) {
        self.speed_multiplier = multiplier.clamp(SPEED_MULTIPLIER_MIN, SPEED_MULTIPLIER_MAX);
        info!(multiplier = self.speed_multiplier, "simulation speed set");
    }

    /// Dispatches an inbound lifecycle request.
    pub fn handle_control(&mut self, command: ControlCommand) {
        match command.action {
            ControlAction::Start => self.start(),
            ControlAction::Pause => self.pause(),
            ControlAction::Reset => self.reset(),
            ControlAction::SetSpeed => {
                if let Some(multiplier) = command.speed_multiplier {
                    self.set_speed(multiplier);
                }
            }
        }
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advances the world by one speed-scaled timestep.
    ///
    /// Returns `None` without touching anything unless the engine is
    /// [`RunState::Running`]; otherwise returns the post-tick snapshot.
    pub fn tick(&mut self) -> Option<SimulationSnapshot> {
        if self.state != RunState::Running {
            return None;
        }

        let scaled_dt = self.dt * self.speed_multiplier;

        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            let Some(mut entity) = self.entities.remove(&id) else {
                continue;
            };
            let effects = {
                let mut ctx = UpdateContext {
                    dt: scaled_dt,
                    bounds: self.arena_bounds,
                    terrain: &self.terrain,
                    view: WorldView::new(&self.entities),
                    rng: &mut self.rng,
                };
                entity.update(&mut ctx)
            };
            self.entities.insert(id, entity);
            for effect in effects {
                self.apply_effect(effect);
            }
        }

        self.check_interactions();

        self.simulation_time += scaled_dt;
        self.sample_tick_rate();

        Some(self.snapshot())
    }

    /// Applies a sibling mutation requested by a behavior step.
    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::TankSpotted { tank } => {
                if let Some(entity) = self.entities.get_mut(&tank) {
                    entity.body_mut().flags.insert(EntityFlags::DETECTED);
                }
            }
            Effect::KamikazeImpact {
                drone,
                tank,
                impact,
            } => {
                // The drone destroyed itself during its behavior step; the
                // tank may already be gone if another strike landed first.
                self.total_destroyed += 1;
                if let Some(entity) = self.entities.get_mut(&tank) {
                    if !entity.is_destroyed() {
                        let body = entity.body_mut();
                        body.flags.insert(EntityFlags::DESTROYED);
                        body.stop();
                        if let Some(brain) = entity.as_tank_mut() {
                            brain.kamikaze_impact_position = Some(impact);
                            brain.activity = Activity::Destroyed;
                        }
                        self.total_destroyed += 1;
                    }
                }
                self.events.push(SimEvent::Kamikaze {
                    timestamp: self.simulation_time,
                    drone_id: drone,
                    tank_id: tank,
                    position: impact,
                });
                info!(%drone, %tank, "kamikaze engagement");
            }
        }
    }

    /// Recomputes tank detection and resolves close-range strikes.
    ///
    /// Unlike the drones' own detection loops, this pass scales the radius by
    /// the average terrain multiplier at both endpoints and requires clear
    /// line of sight. The two paths are intentionally distinct; unifying them
    /// would change combat balance.
    fn check_interactions(&mut self) {
        let drones: Vec<(EntityId, Vec2, f32, bool)> = self
            .entities
            .values()
            .filter(|e| e.kind() == EntityKind::Drone && !e.is_destroyed())
            .map(|e| {
                (
                    e.id(),
                    e.body().position,
                    e.body().physics.detection_radius,
                    e.activity() == Activity::Engaging,
                )
            })
            .collect();
        let tanks: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.kind() == EntityKind::Tank && !e.is_destroyed())
            .map(Entity::id)
            .collect();

        for &tank_id in &tanks {
            if let Some(tank) = self.entities.get_mut(&tank_id) {
                tank.body_mut().flags.remove(EntityFlags::DETECTED);
            }
        }

        for &(drone_id, drone_pos, radius, engaging) in &drones {
            for &tank_id in &tanks {
                let Some(tank) = self.entities.get(&tank_id) else {
                    continue;
                };
                let tank_pos = tank.body().position;
                let distance = drone_pos.distance(tank_pos);

                let average_multiplier = (self.terrain.detection_multiplier(drone_pos)
                    + self.terrain.detection_multiplier(tank_pos))
                    / 2.0;
                let effective_radius = radius * average_multiplier;

                if distance <= effective_radius
                    && self.terrain.line_of_sight(drone_pos, tank_pos)
                {
                    if let Some(tank) = self.entities.get_mut(&tank_id) {
                        let flags = &mut tank.body_mut().flags;
                        if !flags.contains(EntityFlags::DETECTED) {
                            flags.insert(EntityFlags::DETECTED);
                            self.events.push(SimEvent::Detection {
                                timestamp: self.simulation_time,
                                detector_id: drone_id,
                                target_id: tank_id,
                                distance,
                            });
                        }
                    }
                }

                if distance <= ENGINE_KAMIKAZE_RANGE && engaging {
                    self.resolve_kamikaze(drone_id, tank_id);
                }
            }
        }
    }

    /// Engine-level kamikaze resolution, idempotent under destroyed checks.
    ///
    /// This is the second of the two supported strike paths and carries the
    /// same semantics as the drone's own timer-based strike: the shared
    /// impact position is the tank's pre-impact position, the drone relocates
    /// onto it, the tank stays put.
    fn resolve_kamikaze(&mut self, drone_id: EntityId, tank_id: EntityId) {
        let alive = |entities: &BTreeMap<EntityId, Entity>, id: EntityId| {
            entities.get(&id).is_some_and(|e| !e.is_destroyed())
        };
        if !alive(&self.entities, drone_id) || !alive(&self.entities, tank_id) {
            return;
        }

        let Some(impact) = self.entities.get(&tank_id).map(|t| t.body().position) else {
            return;
        };
        if let Some(tank) = self.entities.get_mut(&tank_id) {
            let body = tank.body_mut();
            body.flags.insert(EntityFlags::DESTROYED);
            body.stop();
            if let Some(brain) = tank.as_tank_mut() {
                brain.kamikaze_impact_position = Some(impact);
                brain.activity = Activity::Destroyed;
            }
        }
        if let Some(drone) = self.entities.get_mut(&drone_id) {
            let body = drone.body_mut();
            body.flags.insert(EntityFlags::DESTROYED);
            body.stop();
            body.position = impact;
            if let Some(brain) = drone.as_drone_mut() {
                brain.kamikaze_impact_position = Some(impact);
            }
        }

        self.total_destroyed += 2;
        self.events.push(SimEvent::Kamikaze {
            timestamp: self.simulation_time,
            drone_id,
            tank_id,
            position: impact,
        });
        info!(drone = %drone_id, tank = %tank_id, "kamikaze engagement");
    }

    fn sample_tick_rate(&mut self) {
        self.tick_count_in_window += 1;
        let elapsed = self.window_started.elapsed();
        if elapsed.as_secs_f32() >= 1.0 {
            self.ticks_per_second = self.tick_count_in_window as f32 / elapsed.as_secs_f32();
            self.tick_count_in_window = 0;
            self.window_started = Instant::now();
        }
    }

    // =========================================================================
    // Spawning
    // =========================================================================

    /// Spawns an entity, relocating to the nearest valid point if needed.
    ///
    /// # Errors
    ///
    /// [`EngineError::SpawnRejected`] when neither the expanding ring search
    /// nor the fixed fallback points yield a valid position.
    pub fn spawn(&mut self, command: SpawnCommand) -> Result<EntityId> {
        let requested = Vec2::from(command.position);
        let position = if self.is_valid_spawn_position(requested, command.kind) {
            requested
        } else {
            warn!(kind = %command.kind, x = requested.x, y = requested.y,
                  "invalid spawn position, searching for alternative");
            self.find_spawn_position(requested, command.kind)
                .ok_or(EngineError::SpawnRejected {
                    x: requested.x,
                    y: requested.y,
                })?
        };

        let id = EntityId::new(self.next_id);
        self.next_id += 1;

        let mut entity = match command.kind {
            EntityKind::Drone => Entity::drone(id, position, command.heading),
            EntityKind::Tank => Entity::tank(id, position, command.heading),
        };
        if let Some(mode) = command.mode {
            entity.apply_command(&EntityCommand::mode_only(mode))?;
        }

        self.entities.insert(id, entity);
        self.total_spawned += 1;
        info!(kind = %command.kind, %id, x = position.x, y = position.y, "spawned entity");
        Ok(id)
    }

    /// Whether `position` is a legal spawn point for `kind`.
    ///
    /// Flying units only need to be in bounds. Ground units additionally
    /// reject blocked or expensive terrain and any point within
    /// [`SPAWN_CLEARANCE`] of a live entity.
    fn is_valid_spawn_position(&self, position: Vec2, kind: EntityKind) -> bool {
        if position.x < 0.0
            || position.y < 0.0
            || position.x >= self.arena_bounds.x
            || position.y >= self.arena_bounds.y
        {
            return false;
        }

        if kind == EntityKind::Drone {
            return true;
        }

        let mover = kind.mover_class();
        if self.terrain.is_blocked(position, mover)
            || self.terrain.movement_cost(position, mover) > SPAWN_MAX_MOVE_COST
        {
            return false;
        }

        self.entities
            .values()
            .filter(|e| !e.is_destroyed())
            .all(|e| e.body().position.distance(position) >= SPAWN_CLEARANCE)
    }

    /// Searches outward in expanding rings, then fixed fallback points.
    fn find_spawn_position(&self, around: Vec2, kind: EntityKind) -> Option<Vec2> {
        let mut radius = SPAWN_RING_STEP;
        while radius <= SPAWN_RING_MAX {
            for bearing in (0..360).step_by(45) {
                let angle = (bearing as f32).to_radians();
                let candidate = around + Vec2::from_angle(angle) * radius;
                if self.is_valid_spawn_position(candidate, kind) {
                    return Some(candidate);
                }
            }
            radius += SPAWN_RING_STEP;
        }

        let (w, h) = (self.arena_bounds.x, self.arena_bounds.y);
        let fallbacks = [
            Vec2::new(50.0, 50.0),
            Vec2::new(w - 50.0, 50.0),
            Vec2::new(50.0, h - 50.0),
            Vec2::new(w - 50.0, h - 50.0),
            Vec2::new(w / 2.0, 50.0),
            Vec2::new(w / 2.0, h - 50.0),
        ];
        fallbacks
            .into_iter()
            .find(|&candidate| self.is_valid_spawn_position(candidate, kind))
    }

    // =========================================================================
    // Entity commands
    // =========================================================================

    /// Applies a behavior command to an entity.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown id,
    /// [`EngineError::Validation`] for a kind/mode mismatch. Neither mutates
    /// any state.
    pub fn command(&mut self, entity_id: EntityId, command: &EntityCommand) -> Result<()> {
        let entity = self
            .entities
            .get_mut(&entity_id)
            .ok_or(EngineError::NotFound(entity_id))?;
        entity.apply_command(command)?;
        info!(kind = %entity.kind(), id = %entity_id, mode = %command.mode, "commanded entity");
        Ok(())
    }

    /// Removes an entity from the world and the selection list, recording an
    /// `entity_destroyed` event.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown id.
    pub fn remove(&mut self, entity_id: EntityId) -> Result<()> {
        let entity = self
            .entities
            .remove(&entity_id)
            .ok_or(EngineError::NotFound(entity_id))?;
        self.selected.retain(|&id| id != entity_id);
        self.events.push(SimEvent::EntityDestroyed {
            timestamp: self.simulation_time,
            destroyed_id: entity_id,
            cause: "removed".to_string(),
        });
        info!(kind = %entity.kind(), id = %entity_id, "removed entity");
        Ok(())
    }

    /// Sets or clears an entity's selection.
    ///
    /// Without `multi_select` every other selection is cleared first. Returns
    /// the number of selected entities.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown id.
    pub fn select(&mut self, entity_id: EntityId, selected: bool, multi_select: bool) -> Result<usize> {
        if !self.entities.contains_key(&entity_id) {
            return Err(EngineError::NotFound(entity_id));
        }

        if !multi_select {
            for id in self.selected.drain(..) {
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.body_mut().flags.remove(EntityFlags::SELECTED);
                }
            }
        }

        if let Some(entity) = self.entities.get_mut(&entity_id) {
            if selected {
                if !self.selected.contains(&entity_id) {
                    self.selected.push(entity_id);
                }
                entity.body_mut().flags.insert(EntityFlags::SELECTED);
            } else {
                self.selected.retain(|&id| id != entity_id);
                entity.body_mut().flags.remove(EntityFlags::SELECTED);
            }
        }

        Ok(self.selected.len())
    }

    /// Logs a chat message, stamping it with the current simulation time.
    pub fn add_chat_message(&mut self, mut message: ChatMessage) {
        message.timestamp = self.simulation_time;
        self.chat.push(message);
    }

    // =========================================================================
    // Scenarios
    // =========================================================================

    /// Directory scanned for scenario files.
    #[must_use]
    pub fn scenario_dir(&self) -> &Path {
        &self.scenario_dir
    }

    /// Overrides the scenario directory.
    pub fn set_scenario_dir(&mut self, dir: impl Into<PathBuf>) {
        self.scenario_dir = dir.into();
    }

    /// Enumerates scenarios in the scenario directory.
    #[must_use]
    pub fn list_scenarios(&self) -> Vec<ScenarioInfo> {
        scenario::list_scenarios(&self.scenario_dir)
    }

    /// Loads `<scenario_dir>/<name>.json` and applies it.
    ///
    /// # Errors
    ///
    /// [`EngineError::ScenarioLoad`] when the file is missing or malformed,
    /// or when an entity cannot be placed. The world is reset before entities
    /// spawn; on failure it stays reset rather than half-applied.
    pub fn load_scenario(&mut self, name: &str) -> Result<ScenarioSummary> {
        let path = self.scenario_dir.join(format!("{name}.json"));
        let file = ScenarioFile::load(&path).inspect_err(|e| error!(%name, error = %e, "scenario load failed"))?;
        self.apply_scenario(name, &file)
    }

    /// Resets the world and applies an already parsed scenario.
    ///
    /// Terrain-specific parse failures fall back to default terrain and the
    /// load continues; a command failure on one entity is logged and skipped.
    ///
    /// # Errors
    ///
    /// [`EngineError::ScenarioLoad`] when an entity cannot be placed.
    pub fn apply_scenario(&mut self, name: &str, file: &ScenarioFile) -> Result<ScenarioSummary> {
        self.reset();

        if let Some(arena) = file.arena {
            self.arena_bounds = Vec2::new(arena.width, arena.height);
        }

        match &file.terrain {
            Some(value) => match TerrainGrid::from_value(value) {
                Ok(terrain) => self.terrain = terrain,
                Err(e) => {
                    error!(%name, error = %e, "falling back to default terrain");
                    self.terrain.reset_to_default();
                }
            },
            None => self.terrain.reset_to_default(),
        }

        let mut entities_loaded = 0;
        for entry in &file.entities {
            let id = self
                .spawn(SpawnCommand {
                    kind: entry.kind,
                    position: Point {
                        x: entry.x,
                        y: entry.y,
                    },
                    heading: entry.heading,
                    mode: None,
                })
                .map_err(|e| EngineError::ScenarioLoad(format!("{name}: {e}")))?;
            entities_loaded += 1;

            if let Some(command) = entry.initial_command() {
                if let Err(e) = self.command(id, &command) {
                    warn!(%name, %id, error = %e, "skipping initial command");
                }
            }
        }

        self.current_scenario = Some(name.to_string());
        info!(%name, entities_loaded, "loaded scenario");
        Ok(ScenarioSummary {
            name: name.to_string(),
            title: file.title.clone(),
            entities_loaded,
        })
    }

    // =========================================================================
    // State queries
    // =========================================================================

    /// The full state-transfer snapshot: run-state, clock, entities,
    /// selection, metrics, terrain, and recent logs.
    #[must_use]
    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            simulation: SimulationInfo {
                state: self.state,
                time: self.simulation_time,
                dt: self.dt,
                speed_multiplier: self.speed_multiplier,
                ticks_per_second: self.ticks_per_second,
                arena_bounds: ArenaBounds {
                    width: self.arena_bounds.x,
                    height: self.arena_bounds.y,
                },
            },
            entities: self.entities.values().map(EntitySnapshot::of).collect(),
            selected_entities: self.selected.clone(),
            metrics: self.metrics(),
            terrain: self.terrain.clone(),
            events: self.events.last_n(SNAPSHOT_EVENTS).cloned().collect(),
            chat_messages: self.chat.last_n(SNAPSHOT_CHAT).cloned().collect(),
        }
    }

    /// Aggregate entity counters.
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        Metrics {
            total_entities: self.entities.len(),
            total_spawned: self.total_spawned,
            total_destroyed: self.total_destroyed,
            drones: self
                .entities
                .values()
                .filter(|e| e.kind() == EntityKind::Drone)
                .count(),
            tanks: self
                .entities
                .values()
                .filter(|e| e.kind() == EntityKind::Tank)
                .count(),
            destroyed: self.entities.values().filter(|e| e.is_destroyed()).count(),
        }
    }

    /// Builds the read-only context for the external command generator.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown id,
    /// [`EngineError::Validation`] when the entity is not a drone.
    pub fn command_context(&self, drone_id: EntityId) -> Result<CommandContext> {
        let drone = self
            .entities
            .get(&drone_id)
            .ok_or(EngineError::NotFound(drone_id))?;
        if drone.kind() != EntityKind::Drone {
            return Err(EngineError::Validation(format!(
                "entity {drone_id} is not a drone"
            )));
        }

        let origin = drone.body().position;
        let nearby_entities = self
            .entities
            .values()
            .filter(|e| e.id() != drone_id)
            .filter_map(|e| {
                let distance = e.body().position.distance(origin);
                (distance <= CONTEXT_RADIUS).then(|| NearbyEntity {
                    id: e.id(),
                    kind: e.kind(),
                    distance,
                    position: e.body().position.into(),
                    status: e.activity(),
                    destroyed: e.is_destroyed(),
                })
            })
            .collect();

        let metrics = self.metrics();
        Ok(CommandContext {
            drone: EntitySnapshot::of(drone),
            simulation: ContextSummary {
                time: self.simulation_time,
                arena_bounds: ArenaBounds {
                    width: self.arena_bounds.x,
                    height: self.arena_bounds.y,
                },
                total_entities: metrics.total_entities,
                drones: metrics.drones,
                tanks: metrics.tanks,
            },
            nearby_entities,
            available_modes: vec![
                ModeCommand::GoTo,
                ModeCommand::FollowTank,
                ModeCommand::FollowTeammate,
                ModeCommand::RandomSearch,
                ModeCommand::WaypointMode,
                ModeCommand::HoldPosition,
            ],
        })
    }

    /// Current run-state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Current speed multiplier.
    #[must_use]
    pub fn speed_multiplier(&self) -> f32 {
        self.speed_multiplier
    }

    /// Accumulated simulation time in seconds.
    #[must_use]
    pub fn simulation_time(&self) -> f32 {
        self.simulation_time
    }

    /// Arena size as (width, height).
    #[must_use]
    pub fn arena_bounds(&self) -> Vec2 {
        self.arena_bounds
    }

    /// The current terrain.
    #[must_use]
    pub fn terrain(&self) -> &TerrainGrid {
        &self.terrain
    }

    /// Mutable terrain access for editing tools.
    pub fn terrain_mut(&mut self) -> &mut TerrainGrid {
        &mut self.terrain
    }

    /// Looks up an entity by id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Mutable entity access for setup and tooling.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Iterates entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of entities in the world, destroyed included.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Ordered selection list.
    #[must_use]
    pub fn selected(&self) -> &[EntityId] {
        &self.selected
    }

    /// Iterates the retained events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    /// Iterates the retained chat messages, oldest first.
    pub fn chat_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.chat.iter()
    }

    /// Name of the currently loaded scenario, if any.
    #[must_use]
    pub fn current_scenario(&self) -> Option<&str> {
        self.current_scenario.as_deref()
    }
}
