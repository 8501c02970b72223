//! Boundary contract types: inbound commands and outbound state.
//!
//! Everything external collaborators exchange with the core goes through the
//! structures in this module. Inbound requests arrive pre-parsed (transport
//! and schema validation live outside the core); outbound state is the full
//! [`SimulationSnapshot`] plus the read-only [`CommandContext`] consumed by
//! the natural-language command generator.
//!
//! Wire points are `{x, y}` objects ([`Point`]), not bare arrays, so the
//! serialized shape is self-describing for non-Rust clients.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::RunState;
use crate::entity::{
    Activity, Brain, DroneMode, Entity, EntityId, EntityKind, TankMode,
};
use crate::events::{ChatMessage, SimEvent};
use crate::terrain::TerrainGrid;

// =============================================================================
// Wire primitives
// =============================================================================

/// A 2D point as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate in world units.
    pub x: f32,
    /// Y coordinate in world units.
    pub y: f32,
}

impl From<Vec2> for Point {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Point> for Vec2 {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

/// Arena dimensions as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArenaBounds {
    /// Arena width in world units.
    pub width: f32,
    /// Arena height in world units.
    pub height: f32,
}

// =============================================================================
// Inbound commands
// =============================================================================

/// Simulation lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    /// Begin or resume ticking.
    Start,
    /// Suspend ticking, keeping the world.
    Pause,
    /// Stop and clear the world.
    Reset,
    /// Change the speed multiplier.
    SetSpeed,
}

/// Inbound lifecycle request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    /// The requested action.
    pub action: ControlAction,
    /// New speed multiplier; only read by [`ControlAction::SetSpeed`].
    #[serde(default)]
    pub speed_multiplier: Option<f32>,
}

/// Inbound request to create an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnCommand {
    /// Kind of unit to create.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Requested position; may be relocated by spawn validation.
    pub position: Point,
    /// Initial heading in radians.
    #[serde(default)]
    pub heading: f32,
    /// Optional initial mode.
    #[serde(default)]
    pub mode: Option<ModeCommand>,
}

/// Requested behavior mode, covering both entity kinds.
///
/// Kind compatibility is validated when the command is applied; a mismatch
/// is a validation error and mutates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeCommand {
    /// Move to an explicit destination (both kinds).
    GoTo,
    /// Shadow a tank (drone).
    FollowTank,
    /// Station-keep on a teammate (drone).
    FollowTeammate,
    /// Sweep for targets (drone).
    RandomSearch,
    /// Cycle a patrol route (both kinds).
    WaypointMode,
    /// Stay put (both kinds).
    HoldPosition,
    /// Hunt and strike the nearest tank (drone).
    Kamikaze,
    /// Hide, fleeing while spotted (tank).
    FleeToCover,
    /// Ambush, fleeing while spotted (tank).
    HideAndAmbush,
}

impl ModeCommand {
    /// The drone mode this request maps to, if any.
    #[must_use]
    pub const fn drone_mode(self) -> Option<DroneMode> {
        match self {
            Self::GoTo => Some(DroneMode::GoTo),
            Self::FollowTank => Some(DroneMode::FollowTank),
            Self::FollowTeammate => Some(DroneMode::FollowTeammate),
            Self::RandomSearch => Some(DroneMode::RandomSearch),
            Self::WaypointMode => Some(DroneMode::WaypointMode),
            Self::HoldPosition => Some(DroneMode::HoldPosition),
            Self::Kamikaze => Some(DroneMode::Kamikaze),
            Self::FleeToCover | Self::HideAndAmbush => None,
        }
    }

    /// The tank mode this request maps to, if any.
    #[must_use]
    pub const fn tank_mode(self) -> Option<TankMode> {
        match self {
            Self::GoTo => Some(TankMode::GoTo),
            Self::WaypointMode => Some(TankMode::WaypointMode),
            Self::HoldPosition => Some(TankMode::HoldPosition),
            Self::FleeToCover => Some(TankMode::FleeToCover),
            Self::HideAndAmbush => Some(TankMode::HideAndAmbush),
            Self::FollowTank
            | Self::FollowTeammate
            | Self::RandomSearch
            | Self::Kamikaze => None,
        }
    }

    /// Wire label for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GoTo => "go_to",
            Self::FollowTank => "follow_tank",
            Self::FollowTeammate => "follow_teammate",
            Self::RandomSearch => "random_search",
            Self::WaypointMode => "waypoint_mode",
            Self::HoldPosition => "hold_position",
            Self::Kamikaze => "kamikaze",
            Self::FleeToCover => "flee_to_cover",
            Self::HideAndAmbush => "hide_and_ambush",
        }
    }
}

impl fmt::Display for ModeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DroneMode> for ModeCommand {
    fn from(mode: DroneMode) -> Self {
        match mode {
            DroneMode::GoTo => Self::GoTo,
            DroneMode::FollowTank => Self::FollowTank,
            DroneMode::FollowTeammate => Self::FollowTeammate,
            DroneMode::RandomSearch => Self::RandomSearch,
            DroneMode::WaypointMode => Self::WaypointMode,
            DroneMode::HoldPosition => Self::HoldPosition,
            DroneMode::Kamikaze => Self::Kamikaze,
        }
    }
}

impl From<TankMode> for ModeCommand {
    fn from(mode: TankMode) -> Self {
        match mode {
            TankMode::GoTo => Self::GoTo,
            TankMode::WaypointMode => Self::WaypointMode,
            TankMode::HoldPosition => Self::HoldPosition,
            TankMode::FleeToCover => Self::FleeToCover,
            TankMode::HideAndAmbush => Self::HideAndAmbush,
        }
    }
}

/// Inbound behavior command for a specific entity.
///
/// Fields irrelevant to the requested mode are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCommand {
    /// Requested mode.
    pub mode: ModeCommand,
    /// Destination for `go_to`.
    #[serde(default)]
    pub target_position: Option<Point>,
    /// Referenced unit for the follow modes.
    #[serde(default)]
    pub target_entity_id: Option<EntityId>,
    /// Route for `waypoint_mode`.
    #[serde(default)]
    pub patrol_route: Option<Vec<Point>>,
}

impl EntityCommand {
    /// A command carrying only a mode switch.
    #[must_use]
    pub fn mode_only(mode: ModeCommand) -> Self {
        Self {
            mode,
            target_position: None,
            target_entity_id: None,
            patrol_route: None,
        }
    }
}

// =============================================================================
// Outbound state
// =============================================================================

/// Run-state, clock, and pacing portion of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationInfo {
    /// Current run-state.
    pub state: RunState,
    /// Accumulated simulation time in seconds.
    pub time: f32,
    /// Base fixed timestep.
    pub dt: f32,
    /// Current speed multiplier.
    pub speed_multiplier: f32,
    /// Approximate achieved tick rate over the last wall-clock second.
    pub ticks_per_second: f32,
    /// Arena dimensions.
    pub arena_bounds: ArenaBounds,
}

/// Aggregate entity counters in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Entities currently in the map, destroyed included.
    pub total_entities: usize,
    /// Entities ever spawned.
    pub total_spawned: u64,
    /// Entities ever destroyed.
    pub total_destroyed: u64,
    /// Drones currently in the map.
    pub drones: usize,
    /// Tanks currently in the map.
    pub tanks: usize,
    /// Entities currently flagged destroyed.
    pub destroyed: usize,
}

/// Full per-entity record as serialized to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Unique id.
    pub id: EntityId,
    /// Entity kind.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// World position.
    pub position: Point,
    /// Heading in radians.
    pub heading: f32,
    /// Velocity in world units per second.
    pub velocity: Point,
    /// Current behavior mode.
    pub mode: ModeCommand,
    /// Current sub-activity label.
    pub status: Activity,
    /// Remaining health fraction.
    pub health: f32,
    /// Detected by the opposing side.
    pub detected: bool,
    /// Selected in the operator UI.
    pub selected: bool,
    /// Destroyed but retained for rendering.
    pub destroyed: bool,
    /// Display color (hex).
    pub color: String,
    /// Display scale.
    pub scale: f32,
    /// Destination for `go_to`, if set.
    pub target_position: Option<Point>,
    /// Referenced unit for the follow modes, if set.
    pub target_entity_id: Option<EntityId>,
    /// Current patrol route.
    pub patrol_route: Vec<Point>,
    /// Index of the waypoint currently steered for.
    pub current_waypoint: usize,
    /// Whether tracking may escalate to a strike (drones only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kamikaze_enabled: Option<bool>,
    /// Target chosen in kamikaze mode (drones only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kamikaze_target: Option<EntityId>,
    /// Where a kamikaze strike landed, for either side of one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kamikaze_impact_position: Option<Point>,
}

impl EntitySnapshot {
    /// Captures the current state of an entity.
    #[must_use]
    pub fn of(entity: &Entity) -> Self {
        let body = entity.body();
        let (mode, kamikaze_enabled, kamikaze_target, kamikaze_impact_position) =
            match entity.brain() {
                Brain::Drone(brain) => (
                    ModeCommand::from(brain.mode),
                    Some(brain.kamikaze_enabled),
                    brain.kamikaze_target,
                    brain.kamikaze_impact_position.map(Point::from),
                ),
                Brain::Tank(brain) => (
                    ModeCommand::from(brain.mode),
                    None,
                    None,
                    brain.kamikaze_impact_position.map(Point::from),
                ),
            };

        Self {
            id: entity.id(),
            kind: entity.kind(),
            position: body.position.into(),
            heading: body.heading,
            velocity: body.velocity.into(),
            mode,
            status: entity.activity(),
            health: body.health,
            detected: body.flags.contains(crate::entity::EntityFlags::DETECTED),
            selected: body.flags.contains(crate::entity::EntityFlags::SELECTED),
            destroyed: body.flags.contains(crate::entity::EntityFlags::DESTROYED),
            color: body.color.to_string(),
            scale: body.scale,
            target_position: body.target_position.map(Point::from),
            target_entity_id: body.target_entity,
            patrol_route: body.patrol_route.iter().map(|p| Point::from(*p)).collect(),
            current_waypoint: body.current_waypoint,
            kamikaze_enabled,
            kamikaze_target,
            kamikaze_impact_position,
        }
    }
}

/// The complete state-transfer structure returned by
/// [`SimulationEngine::snapshot`](crate::engine::SimulationEngine::snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Run-state, clock, and pacing.
    pub simulation: SimulationInfo,
    /// Every entity in the world, destroyed included.
    pub entities: Vec<EntitySnapshot>,
    /// Ordered selection list.
    pub selected_entities: Vec<EntityId>,
    /// Aggregate counters.
    pub metrics: Metrics,
    /// Current terrain.
    pub terrain: TerrainGrid,
    /// Up to the 50 newest events, oldest first.
    pub events: Vec<SimEvent>,
    /// Up to the 100 newest chat messages, oldest first.
    pub chat_messages: Vec<ChatMessage>,
}

// =============================================================================
// Command-generation context
// =============================================================================

/// Simulation summary included in a [`CommandContext`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    /// Accumulated simulation time.
    pub time: f32,
    /// Arena dimensions.
    pub arena_bounds: ArenaBounds,
    /// Entities currently in the map.
    pub total_entities: usize,
    /// Drones currently in the map.
    pub drones: usize,
    /// Tanks currently in the map.
    pub tanks: usize,
}

/// A sibling entity as seen from the context drone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyEntity {
    /// Unique id.
    pub id: EntityId,
    /// Entity kind.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Distance from the context drone.
    pub distance: f32,
    /// World position.
    pub position: Point,
    /// Current sub-activity label.
    pub status: Activity,
    /// Whether the entity is destroyed.
    pub destroyed: bool,
}

/// Read-only context handed to the external command generator.
///
/// The generator turns this plus an operator prompt into zero or more
/// [`EntityCommand`]s that re-enter through the normal command interface; the
/// core has no dependency on how that text is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandContext {
    /// Full state of the drone being commanded.
    pub drone: EntitySnapshot,
    /// Simulation summary.
    pub simulation: ContextSummary,
    /// Entities within the context radius of the drone.
    pub nearby_entities: Vec<NearbyEntity>,
    /// Modes the generator may request.
    pub available_modes: Vec<ModeCommand>,
}
