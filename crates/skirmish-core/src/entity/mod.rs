//! Entities: drones and tanks with unicycle kinematics and tactical brains.
//!
//! An [`Entity`] couples a shared [`Body`] (kinematic and control state common
//! to every unit) with a [`Brain`] tagged union holding the kind-specific mode
//! machine. The two-level split keeps mode transitions exhaustive per kind
//! without an inheritance chain: behavior code matches on the brain variant,
//! physics integration is identical for both kinds.
//!
//! # Update order
//!
//! Each tick the engine calls [`Entity::update`] with an [`UpdateContext`]:
//!
//! 1. Behavior step - the brain picks a desired velocity (magnitude bounded
//!    by [`Physics::max_speed`]) and may emit [`Effect`]s targeting siblings.
//! 2. Physics step - terrain-scaled integration, pairwise collision
//!    avoidance, static overlap resolution, arena bounds clamp. Skipped
//!    entirely for destroyed entities.
//! 3. Visual step - display color derived from the current flags and
//!    activity, no other side effects.
//!
//! Destroyed entities keep their place in the map for client rendering; they
//! never move again except the one-time kamikaze impact relocation.

pub mod drone;
pub mod tank;

use std::f32::consts::TAU;
use std::fmt;

use bitflags::bitflags;
use glam::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::protocol::EntityCommand;
use crate::terrain::{MoverClass, TerrainGrid};
use crate::world_view::WorldView;

pub use drone::{DroneBrain, DroneMode};
pub use tank::{TankBrain, TankMode};

/// Inset from the arena edge used for search targets, flee destinations, and
/// fallback spawn points.
pub(crate) const ARENA_MARGIN: f32 = 50.0;

/// Repulsion scale applied during dynamic collision avoidance.
const COLLISION_PUSH: f32 = 2.0;

/// Weight of the pre-move position when damping a collision-affected move.
const COLLISION_BLEND_ORIGINAL: f32 = 0.3;

/// Below this separation a pair counts as coincident and is split by a random
/// bearing instead of along the connecting line.
const COINCIDENT_EPSILON: f32 = 0.1;

// =============================================================================
// Identity
// =============================================================================

/// Unique identifier for an entity.
///
/// Assigned monotonically by the engine; ordering by id gives the
/// deterministic iteration order used everywhere.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates an `EntityId` from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// Entity kind: airborne drone or ground tank.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Flying hunter-killer.
    Drone,
    /// Ground unit that patrols and evades.
    Tank,
}

impl EntityKind {
    /// How terrain treats this kind.
    #[must_use]
    pub const fn mover_class(self) -> MoverClass {
        match self {
            Self::Drone => MoverClass::Air,
            Self::Tank => MoverClass::Ground,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drone => write!(f, "drone"),
            Self::Tank => write!(f, "tank"),
        }
    }
}

// =============================================================================
// Components
// =============================================================================

/// Per-entity physical constants, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Physics {
    /// Speed ceiling for any commanded velocity.
    pub max_speed: f32,
    /// Turn rate ceiling in radians per second.
    pub max_angular_velocity: f32,
    /// Raw sensing radius before terrain scaling.
    pub detection_radius: f32,
    /// Radius used for collision and overlap resolution.
    pub collision_radius: f32,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            max_speed: 5.0,
            max_angular_velocity: std::f32::consts::PI,
            detection_radius: 50.0,
            collision_radius: 3.0,
        }
    }
}

impl Physics {
    /// Drone tuning: fast, wide sensor.
    #[must_use]
    pub fn drone() -> Self {
        Self {
            max_speed: 8.0,
            detection_radius: 40.0,
            ..Self::default()
        }
    }

    /// Tank tuning: slow, short sensor.
    #[must_use]
    pub fn tank() -> Self {
        Self {
            max_speed: 3.0,
            detection_radius: 30.0,
            ..Self::default()
        }
    }
}

bitflags! {
    /// Boolean state flags shared by every entity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct EntityFlags: u8 {
        /// Currently detected by the opposing side.
        const DETECTED = 1 << 0;
        /// Selected in the operator UI.
        const SELECTED = 1 << 1;
        /// Destroyed; frozen in place but kept for rendering.
        const DESTROYED = 1 << 2;
    }
}

impl Default for EntityFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Sub-activity label describing what a unit is doing inside its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Nothing to do.
    Idle,
    /// Moving to an explicit destination.
    Moving,
    /// Sweeping for targets.
    Searching,
    /// Holding contact on a target.
    Tracking,
    /// Committed to a kamikaze run.
    Engaging,
    /// Kamikaze mode with no target yet.
    Hunting,
    /// Shadowing another unit.
    Following,
    /// Station-keeping on a teammate.
    Formation,
    /// Walking a patrol route.
    Patrolling,
    /// Holding position on command.
    Holding,
    /// Hiding in cover.
    Hiding,
    /// Lying in wait.
    Ambush,
    /// Running from a threat.
    Fleeing,
    /// No longer operational.
    Destroyed,
}

impl Activity {
    /// Stable label used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving => "moving",
            Self::Searching => "searching",
            Self::Tracking => "tracking",
            Self::Engaging => "engaging",
            Self::Hunting => "hunting",
            Self::Following => "following",
            Self::Formation => "formation",
            Self::Patrolling => "patrolling",
            Self::Holding => "holding",
            Self::Hiding => "hiding",
            Self::Ambush => "ambush",
            Self::Fleeing => "fleeing",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinematic and control state shared by both entity kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    /// World position, always inside arena bounds after a physics step.
    pub position: Vec2,
    /// Facing in radians, derived from velocity while moving.
    pub heading: f32,
    /// Current velocity in world units per second.
    pub velocity: Vec2,
    /// Physical constants for this unit.
    pub physics: Physics,
    /// Remaining health fraction.
    pub health: f32,
    /// Detected/selected/destroyed flags.
    pub flags: EntityFlags,
    /// Destination for `GoTo`.
    pub target_position: Option<Vec2>,
    /// Referenced unit for follow modes.
    pub target_entity: Option<EntityId>,
    /// Ordered waypoints for patrol modes.
    pub patrol_route: Vec<Vec2>,
    /// Index of the waypoint currently steered for.
    pub current_waypoint: usize,
    /// Display color (hex).
    pub color: &'static str,
    /// Display scale.
    pub scale: f32,
}

impl Body {
    fn new(position: Vec2, heading: f32, physics: Physics) -> Self {
        Self {
            position,
            heading,
            velocity: Vec2::ZERO,
            physics,
            health: 1.0,
            flags: EntityFlags::empty(),
            target_position: None,
            target_entity: None,
            patrol_route: Vec::new(),
            current_waypoint: 0,
            color: "#FFFFFF",
            scale: 1.0,
        }
    }

    /// Distance from this unit to a point.
    #[must_use]
    pub fn distance_to(&self, point: Vec2) -> f32 {
        self.position.distance(point)
    }

    /// Bearing from this unit to a point, in radians.
    #[must_use]
    pub fn angle_to(&self, point: Vec2) -> f32 {
        let delta = point - self.position;
        delta.y.atan2(delta.x)
    }

    /// Points the velocity at `target` with the given speed, or stops when
    /// already there.
    pub fn move_towards(&mut self, target: Vec2, speed: f32) {
        let distance = self.distance_to(target);
        if distance > 0.0 {
            self.velocity = (target - self.position) / distance * speed;
        } else {
            self.velocity = Vec2::ZERO;
        }
    }

    /// Zeroes the velocity.
    pub fn stop(&mut self) {
        self.velocity = Vec2::ZERO;
    }

    /// Whether the destroyed flag is set.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.flags.contains(EntityFlags::DESTROYED)
    }
}

// =============================================================================
// Brains and effects
// =============================================================================

/// Kind-specific behavior state, one variant per entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Brain {
    /// Drone mode machine.
    Drone(DroneBrain),
    /// Tank mode machine.
    Tank(TankBrain),
}

impl Brain {
    /// The entity kind implied by this brain.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Drone(_) => EntityKind::Drone,
            Self::Tank(_) => EntityKind::Tank,
        }
    }

    /// Current sub-activity label.
    #[must_use]
    pub const fn activity(&self) -> Activity {
        match self {
            Self::Drone(brain) => brain.activity,
            Self::Tank(brain) => brain.activity,
        }
    }
}

/// Sibling mutation requested by a behavior step.
///
/// Behavior code only sees siblings through a read view; anything it wants to
/// do to them is returned as an effect for the engine to apply after the
/// entity's update, preserving single ownership of the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// A drone sighted a tank inside its raw detection radius.
    TankSpotted {
        /// The sighted tank.
        tank: EntityId,
    },
    /// A drone committed a kamikaze strike on a tank.
    KamikazeImpact {
        /// The attacking drone (already destroyed and relocated).
        drone: EntityId,
        /// The struck tank.
        tank: EntityId,
        /// The tank's position at impact.
        impact: Vec2,
    },
}

/// Everything an entity may consult during one update call.
pub struct UpdateContext<'a> {
    /// Speed-scaled timestep for this tick.
    pub dt: f32,
    /// Arena size as (width, height).
    pub bounds: Vec2,
    /// Terrain queried for movement cost, blocking, and sight.
    pub terrain: &'a TerrainGrid,
    /// Read-only view over the sibling entities.
    pub view: WorldView<'a>,
    /// Engine-owned RNG; all stochastic behavior draws from it.
    pub rng: &'a mut ChaCha8Rng,
}

// =============================================================================
// Entity
// =============================================================================

/// A drone or tank in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    body: Body,
    brain: Brain,
}

impl Entity {
    /// Creates a drone at `position` in its default mode (random search).
    #[must_use]
    pub fn drone(id: EntityId, position: Vec2, heading: f32) -> Self {
        Self {
            id,
            body: Body::new(position, heading, Physics::drone()),
            brain: Brain::Drone(DroneBrain::default()),
        }
    }

    /// Creates a tank at `position` in its default mode (waypoint patrol),
    /// with the default square patrol route around the spawn point.
    #[must_use]
    pub fn tank(id: EntityId, position: Vec2, heading: f32) -> Self {
        let mut body = Body::new(position, heading, Physics::tank());
        body.patrol_route = TankBrain::default_patrol_route(position);
        Self {
            id,
            body,
            brain: Brain::Tank(TankBrain::default()),
        }
    }

    /// This entity's unique id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// This entity's kind, derived from its brain.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.brain.kind()
    }

    /// Shared kinematic/control state.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Mutable shared state.
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Kind-specific brain.
    #[must_use]
    pub const fn brain(&self) -> &Brain {
        &self.brain
    }

    /// The drone brain, if this is a drone.
    #[must_use]
    pub const fn as_drone(&self) -> Option<&DroneBrain> {
        match &self.brain {
            Brain::Drone(brain) => Some(brain),
            Brain::Tank(_) => None,
        }
    }

    /// Mutable drone brain, if this is a drone.
    pub fn as_drone_mut(&mut self) -> Option<&mut DroneBrain> {
        match &mut self.brain {
            Brain::Drone(brain) => Some(brain),
            Brain::Tank(_) => None,
        }
    }

    /// The tank brain, if this is a tank.
    #[must_use]
    pub const fn as_tank(&self) -> Option<&TankBrain> {
        match &self.brain {
            Brain::Tank(brain) => Some(brain),
            Brain::Drone(_) => None,
        }
    }

    /// Mutable tank brain, if this is a tank.
    pub fn as_tank_mut(&mut self) -> Option<&mut TankBrain> {
        match &mut self.brain {
            Brain::Tank(brain) => Some(brain),
            Brain::Drone(_) => None,
        }
    }

    /// Whether this entity has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.body.is_destroyed()
    }

    /// Current sub-activity label.
    #[must_use]
    pub const fn activity(&self) -> Activity {
        self.brain.activity()
    }

    /// Applies a mode command, setting the fields relevant to the requested
    /// mode and ignoring the rest.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] when the mode does not exist for this
    /// entity's kind.
    pub fn apply_command(&mut self, command: &EntityCommand) -> Result<()> {
        match &mut self.brain {
            Brain::Drone(brain) => {
                let mode = command.mode.drone_mode().ok_or_else(|| {
                    EngineError::Validation(format!(
                        "mode {} is not a drone mode",
                        command.mode
                    ))
                })?;
                brain.mode = mode;
                match mode {
                    DroneMode::GoTo => {
                        self.body.target_position = command.target_position.map(Vec2::from);
                    }
                    DroneMode::FollowTank | DroneMode::FollowTeammate => {
                        self.body.target_entity = command.target_entity_id;
                    }
                    DroneMode::WaypointMode => {
                        if let Some(route) = &command.patrol_route {
                            self.body.patrol_route =
                                route.iter().map(|p| Vec2::from(*p)).collect();
                        }
                        self.body.current_waypoint = 0;
                    }
                    DroneMode::RandomSearch | DroneMode::HoldPosition | DroneMode::Kamikaze => {}
                }
            }
            Brain::Tank(brain) => {
                let mode = command.mode.tank_mode().ok_or_else(|| {
                    EngineError::Validation(format!("mode {} is not a tank mode", command.mode))
                })?;
                brain.mode = mode;
                match mode {
                    TankMode::GoTo => {
                        self.body.target_position = command.target_position.map(Vec2::from);
                    }
                    TankMode::WaypointMode => {
                        if let Some(route) = &command.patrol_route {
                            self.body.patrol_route =
                                route.iter().map(|p| Vec2::from(*p)).collect();
                        }
                        self.body.current_waypoint = 0;
                    }
                    TankMode::HoldPosition | TankMode::FleeToCover | TankMode::HideAndAmbush => {}
                }
            }
        }
        Ok(())
    }

    /// Runs one full update: behavior, physics, visual derivation.
    ///
    /// Returns the sibling effects requested by the behavior step.
    pub(crate) fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Vec<Effect> {
        let mut effects = Vec::new();
        let mover = self.brain.kind().mover_class();
        let Self { id, body, brain } = self;

        match brain {
            Brain::Drone(drone_brain) => {
                drone::update_behavior(*id, drone_brain, body, ctx, &mut effects);
            }
            Brain::Tank(tank_brain) => {
                tank::update_behavior(tank_brain, body, ctx);
            }
        }

        integrate_physics(body, mover, ctx);

        match brain {
            Brain::Drone(drone_brain) => drone::update_visual(drone_brain, body),
            Brain::Tank(tank_brain) => tank::update_visual(tank_brain, body),
        }

        effects
    }
}

// =============================================================================
// Physics integration
// =============================================================================

/// Integrates one physics step for a live body.
///
/// Terrain divides the effective timestep (a blocked cell zeroes it), dynamic
/// avoidance repels the proposed position from every live sibling and damps
/// the move when anything was hit, static overlap resolution separates pairs
/// that still intersect (running every tick, even at rest, so persistent
/// overlaps dissolve over a few ticks), and the final position is clamped to
/// the arena minus the collision radius.
fn integrate_physics(body: &mut Body, mover: MoverClass, ctx: &mut UpdateContext<'_>) {
    if body.is_destroyed() {
        return;
    }

    let speed = body.velocity.length();
    if speed > 0.0 {
        let move_cost = ctx.terrain.movement_cost(body.position, mover);
        let mut effective_dt = ctx.dt / move_cost;
        if ctx.terrain.is_blocked(body.position, mover) {
            effective_dt = 0.0;
        }

        if effective_dt > 0.0 {
            let mut proposed = body.position + body.velocity * effective_dt;

            let mut collided = false;
            for other in ctx.view.live() {
                let other_body = other.body();
                let min_distance =
                    body.physics.collision_radius + other_body.physics.collision_radius;
                let delta = proposed - other_body.position;
                let distance = delta.length();
                if distance < min_distance {
                    collided = true;
                    if distance > 0.0 {
                        let push = (min_distance - distance) / min_distance;
                        proposed += delta / distance * push * COLLISION_PUSH;
                    } else {
                        let angle = ctx.rng.gen_range(0.0..TAU);
                        proposed += Vec2::from_angle(angle) * min_distance;
                    }
                }
            }

            if collided {
                proposed = body.position * COLLISION_BLEND_ORIGINAL
                    + proposed * (1.0 - COLLISION_BLEND_ORIGINAL);
            }

            body.position = proposed;
            body.heading = body.velocity.y.atan2(body.velocity.x);
        }
    }

    // Static overlap resolution runs even for stationary bodies.
    for other in ctx.view.live() {
        let other_body = other.body();
        let min_distance = body.physics.collision_radius + other_body.physics.collision_radius;
        let delta = body.position - other_body.position;
        let distance = delta.length();
        if distance < min_distance {
            if distance > COINCIDENT_EPSILON {
                let push = (min_distance - distance) * 0.5;
                body.position += delta / distance * push;
            } else {
                let angle = ctx.rng.gen_range(0.0..TAU);
                body.position += Vec2::from_angle(angle) * min_distance;
            }
        }
    }

    let radius = body.physics.collision_radius;
    body.position.x = body.position.x.clamp(radius, ctx.bounds.x - radius);
    body.position.y = body.position.y.clamp(radius, ctx.bounds.y - radius);
}
