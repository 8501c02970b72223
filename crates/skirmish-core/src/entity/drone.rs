//! Drone behaviors: search, follow, patrol, and kamikaze engagement.
//!
//! Drones hunt tanks. In the search and patrol modes every tick runs the same
//! detection check first: the lowest-id live tank inside the drone's raw
//! detection radius (no terrain scaling on this path) is marked detected and
//! tracked. After [`ENGAGE_TRACK_SECS`] of continuous contact a kamikaze
//! strike triggers, destroying both units. The dedicated kamikaze mode skips
//! the radius gate and runs at the globally nearest tank instead.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{
    Activity, Body, Effect, EntityFlags, EntityId, EntityKind, UpdateContext, ARENA_MARGIN,
};

/// Arrival threshold for an explicit `GoTo` destination.
pub const GOTO_ARRIVE: f32 = 2.0;

/// Distance a drone keeps from a followed tank.
pub const FOLLOW_TANK_GAP: f32 = 15.0;

/// Distance a drone keeps from a followed teammate.
pub const FOLLOW_TEAMMATE_GAP: f32 = 20.0;

/// Continuous tracking time required before a strike triggers.
pub const ENGAGE_TRACK_SECS: f32 = 1.5;

/// Speed factor while closing on a tracked tank.
const TRACK_SPEED_FACTOR: f32 = 0.7;

/// Seconds between random search retargets.
const SEARCH_RETARGET_SECS: f32 = 3.0;

/// Arrival threshold for a random search target.
const SEARCH_ARRIVE: f32 = 5.0;

/// Arrival threshold for patrol waypoints.
const WAYPOINT_ARRIVE: f32 = 5.0;

/// Strike range in dedicated kamikaze mode.
pub const KAMIKAZE_TRIGGER_RANGE: f32 = 8.0;

/// Wander retarget range in dedicated kamikaze mode with no tank alive.
const KAMIKAZE_RETARGET_RANGE: f32 = 10.0;

/// Drone behavior mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroneMode {
    /// Fly to an explicit destination, then idle.
    GoTo,
    /// Shadow a specific tank.
    FollowTank,
    /// Station-keep on another drone.
    FollowTeammate,
    /// Sweep random points, engaging tanks on contact.
    RandomSearch,
    /// Cycle a patrol route, engaging tanks on contact.
    WaypointMode,
    /// Stay put.
    HoldPosition,
    /// Actively hunt the nearest tank and strike it.
    Kamikaze,
}

/// Behavior state specific to drones.
#[derive(Debug, Clone, PartialEq)]
pub struct DroneBrain {
    /// Current mode (the state of the behavior machine).
    pub mode: DroneMode,
    /// Sub-activity label within the mode.
    pub activity: Activity,
    /// Wander destination for search and kamikaze hunting.
    pub search_target: Option<Vec2>,
    /// Seconds since the last search retarget.
    pub search_timer: f32,
    /// Accumulated continuous tracking time on a tank.
    pub engage_timer: f32,
    /// Whether tracking is allowed to escalate to a strike.
    pub kamikaze_enabled: bool,
    /// Tank chosen in dedicated kamikaze mode.
    pub kamikaze_target: Option<EntityId>,
    /// Set once, at the moment of impact.
    pub kamikaze_impact_position: Option<Vec2>,
}

impl Default for DroneBrain {
    fn default() -> Self {
        Self {
            mode: DroneMode::RandomSearch,
            activity: Activity::Idle,
            search_target: None,
            search_timer: 0.0,
            engage_timer: 0.0,
            kamikaze_enabled: true,
            kamikaze_target: None,
            kamikaze_impact_position: None,
        }
    }
}

/// Runs one behavior step for a drone.
pub(crate) fn update_behavior(
    id: EntityId,
    brain: &mut DroneBrain,
    body: &mut Body,
    ctx: &mut UpdateContext<'_>,
    effects: &mut Vec<Effect>,
) {
    if body.is_destroyed() {
        body.stop();
        brain.activity = Activity::Destroyed;
        return;
    }

    match brain.mode {
        DroneMode::GoTo => behavior_go_to(brain, body),
        DroneMode::FollowTank => behavior_follow(
            brain,
            body,
            ctx,
            EntityKind::Tank,
            FOLLOW_TANK_GAP,
            Activity::Tracking,
        ),
        DroneMode::FollowTeammate => behavior_follow(
            brain,
            body,
            ctx,
            EntityKind::Drone,
            FOLLOW_TEAMMATE_GAP,
            Activity::Formation,
        ),
        DroneMode::RandomSearch => behavior_random_search(id, brain, body, ctx, effects),
        DroneMode::WaypointMode => behavior_waypoint(id, brain, body, ctx, effects),
        DroneMode::HoldPosition => {
            body.stop();
            brain.activity = Activity::Holding;
        }
        DroneMode::Kamikaze => behavior_kamikaze(id, brain, body, ctx, effects),
    }
}

fn behavior_go_to(brain: &mut DroneBrain, body: &mut Body) {
    match body.target_position {
        Some(target) if body.distance_to(target) > GOTO_ARRIVE => {
            body.move_towards(target, body.physics.max_speed);
            brain.activity = Activity::Moving;
        }
        _ => {
            body.stop();
            brain.activity = Activity::Idle;
        }
    }
}

fn behavior_follow(
    brain: &mut DroneBrain,
    body: &mut Body,
    ctx: &UpdateContext<'_>,
    kind: EntityKind,
    gap: f32,
    hold_activity: Activity,
) {
    let target = body
        .target_entity
        .and_then(|tid| ctx.view.get(tid))
        .filter(|t| t.kind() == kind && !t.is_destroyed());

    let Some(target) = target else {
        // Reference gone or dead: fall back to searching.
        brain.mode = DroneMode::RandomSearch;
        brain.activity = Activity::Searching;
        return;
    };

    if body.distance_to(target.body().position) > gap {
        body.move_towards(target.body().position, body.physics.max_speed);
        brain.activity = Activity::Following;
    } else {
        body.stop();
        brain.activity = hold_activity;
    }
}

/// Shared detection/engagement gate for search and patrol modes.
///
/// Uses the raw detection radius; terrain scaling applies only in the engine
/// detection pass. Returns true when a tank dictated this tick's action.
fn detect_and_engage(
    id: EntityId,
    brain: &mut DroneBrain,
    body: &mut Body,
    ctx: &UpdateContext<'_>,
    effects: &mut Vec<Effect>,
) -> bool {
    let radius = body.physics.detection_radius;
    let Some(tank) = ctx.view.first_within(EntityKind::Tank, body.position, radius) else {
        return false;
    };

    effects.push(Effect::TankSpotted { tank: tank.id() });
    brain.activity = Activity::Tracking;
    brain.engage_timer += ctx.dt;

    if brain.engage_timer >= ENGAGE_TRACK_SECS && brain.kamikaze_enabled {
        strike(id, brain, body, tank.id(), tank.body().position, effects);
    } else {
        body.move_towards(
            tank.body().position,
            body.physics.max_speed * TRACK_SPEED_FACTOR,
        );
    }
    true
}

fn behavior_random_search(
    id: EntityId,
    brain: &mut DroneBrain,
    body: &mut Body,
    ctx: &mut UpdateContext<'_>,
    effects: &mut Vec<Effect>,
) {
    if detect_and_engage(id, brain, body, ctx, effects) {
        return;
    }

    brain.engage_timer = 0.0;
    brain.activity = Activity::Searching;

    brain.search_timer += ctx.dt;
    if brain.search_timer >= SEARCH_RETARGET_SECS || brain.search_target.is_none() {
        brain.search_timer = 0.0;
        brain.search_target = Some(random_arena_point(ctx));
    }

    if let Some(target) = brain.search_target {
        if body.distance_to(target) > SEARCH_ARRIVE {
            body.move_towards(target, body.physics.max_speed);
        } else {
            brain.search_target = None;
        }
    }
}

fn behavior_waypoint(
    id: EntityId,
    brain: &mut DroneBrain,
    body: &mut Body,
    ctx: &mut UpdateContext<'_>,
    effects: &mut Vec<Effect>,
) {
    // Tank contact takes priority over route-keeping.
    if detect_and_engage(id, brain, body, ctx, effects) {
        return;
    }
    brain.engage_timer = 0.0;

    if body.patrol_route.is_empty() {
        body.stop();
        brain.activity = Activity::Idle;
        return;
    }

    let mut index = body.current_waypoint % body.patrol_route.len();
    if body.distance_to(body.patrol_route[index]) <= WAYPOINT_ARRIVE {
        index = (index + 1) % body.patrol_route.len();
    }
    body.current_waypoint = index;
    body.move_towards(body.patrol_route[index], body.physics.max_speed);
    brain.activity = Activity::Patrolling;
}

fn behavior_kamikaze(
    id: EntityId,
    brain: &mut DroneBrain,
    body: &mut Body,
    ctx: &mut UpdateContext<'_>,
    effects: &mut Vec<Effect>,
) {
    if let Some((tank, distance)) = ctx.view.nearest_of_kind(EntityKind::Tank, body.position) {
        brain.kamikaze_target = Some(tank.id());
        brain.activity = Activity::Engaging;
        body.move_towards(tank.body().position, body.physics.max_speed);

        if distance <= KAMIKAZE_TRIGGER_RANGE {
            strike(id, brain, body, tank.id(), tank.body().position, effects);
        }
    } else {
        brain.activity = Activity::Hunting;
        let retarget = brain
            .search_target
            .map_or(true, |t| body.distance_to(t) < KAMIKAZE_RETARGET_RANGE);
        if retarget {
            brain.search_target = Some(random_arena_point(ctx));
        }
        if let Some(target) = brain.search_target {
            body.move_towards(target, body.physics.max_speed);
        }
    }
}

/// Commits the strike on the drone side and requests the tank side.
///
/// The shared impact position is the tank's position before the hit; the
/// drone relocates onto it, the tank stays put.
fn strike(
    id: EntityId,
    brain: &mut DroneBrain,
    body: &mut Body,
    tank: EntityId,
    impact: Vec2,
    effects: &mut Vec<Effect>,
) {
    brain.activity = Activity::Engaging;
    body.velocity = Vec2::ZERO;
    brain.kamikaze_impact_position = Some(impact);
    body.position = impact;
    body.flags.insert(EntityFlags::DESTROYED);
    effects.push(Effect::KamikazeImpact {
        drone: id,
        tank,
        impact,
    });
}

/// Picks a uniform random point inside the arena margin.
fn random_arena_point(ctx: &mut UpdateContext<'_>) -> Vec2 {
    let x = if ctx.bounds.x > 2.0 * ARENA_MARGIN {
        ctx.rng.gen_range(ARENA_MARGIN..ctx.bounds.x - ARENA_MARGIN)
    } else {
        ctx.bounds.x * 0.5
    };
    let y = if ctx.bounds.y > 2.0 * ARENA_MARGIN {
        ctx.rng.gen_range(ARENA_MARGIN..ctx.bounds.y - ARENA_MARGIN)
    } else {
        ctx.bounds.y * 0.5
    };
    Vec2::new(x, y)
}

/// Derives the drone's display color from its state.
pub(crate) fn update_visual(brain: &DroneBrain, body: &mut Body) {
    body.color = if body.is_destroyed() {
        "#666666"
    } else if brain.activity == Activity::Engaging {
        "#FF0000"
    } else if brain.activity == Activity::Hunting {
        "#FF6600"
    } else if brain.activity == Activity::Tracking {
        "#FFFF00"
    } else if brain.mode == DroneMode::Kamikaze && brain.kamikaze_enabled {
        "#FF3300"
    } else if !brain.kamikaze_enabled {
        "#00CCFF"
    } else {
        "#00FF00"
    };
}
