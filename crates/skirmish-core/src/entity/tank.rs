//! Tank behaviors: patrol, hide, and evasion.
//!
//! Tanks are prey. Every live tick a tank first works out whether any live
//! drone holds it inside that drone's detection radius; the patrol and cover
//! modes then either continue their routine or break into a flee run directly
//! away from the nearest drone.

use std::f32::consts::PI;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{Activity, Body, EntityKind, UpdateContext, ARENA_MARGIN};

/// Arrival threshold for an explicit `GoTo` destination.
pub const GOTO_ARRIVE: f32 = 2.0;

/// Arrival threshold for patrol waypoints.
const WAYPOINT_ARRIVE: f32 = 3.0;

/// Speed factor while patrolling.
const PATROL_SPEED_FACTOR: f32 = 0.6;

/// How far out the flee escape point is projected.
const FLEE_DISTANCE: f32 = 100.0;

/// Half edge of the default patrol square around the spawn point.
const DEFAULT_PATROL_HALF_EDGE: f32 = 20.0;

/// Tank behavior mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TankMode {
    /// Drive to an explicit destination, then idle.
    GoTo,
    /// Walk the patrol route, fleeing while spotted.
    WaypointMode,
    /// Stay put regardless of threats.
    HoldPosition,
    /// Hide in place, fleeing while spotted.
    FleeToCover,
    /// Lie in ambush, fleeing while spotted.
    HideAndAmbush,
}

/// Behavior state specific to tanks.
#[derive(Debug, Clone, PartialEq)]
pub struct TankBrain {
    /// Current mode (the state of the behavior machine).
    pub mode: TankMode,
    /// Sub-activity label within the mode.
    pub activity: Activity,
    /// Transient per-tick flag: some drone currently holds this tank in its
    /// raw detection radius.
    pub detected_by_drone: bool,
    /// Set once if a kamikaze strike lands on this tank.
    pub kamikaze_impact_position: Option<Vec2>,
}

impl Default for TankBrain {
    fn default() -> Self {
        Self {
            mode: TankMode::WaypointMode,
            activity: Activity::Idle,
            detected_by_drone: false,
            kamikaze_impact_position: None,
        }
    }
}

impl TankBrain {
    /// The default patrol route: a small square around the spawn point.
    #[must_use]
    pub fn default_patrol_route(center: Vec2) -> Vec<Vec2> {
        let d = DEFAULT_PATROL_HALF_EDGE;
        vec![
            center + Vec2::new(-d, -d),
            center + Vec2::new(d, -d),
            center + Vec2::new(d, d),
            center + Vec2::new(-d, d),
        ]
    }
}

/// Runs one behavior step for a tank.
pub(crate) fn update_behavior(brain: &mut TankBrain, body: &mut Body, ctx: &mut UpdateContext<'_>) {
    if body.is_destroyed() {
        body.stop();
        brain.activity = Activity::Destroyed;
        return;
    }

    brain.detected_by_drone = ctx
        .view
        .live_of_kind(EntityKind::Drone)
        .any(|d| body.distance_to(d.body().position) <= d.body().physics.detection_radius);

    match brain.mode {
        TankMode::GoTo => behavior_go_to(brain, body),
        TankMode::WaypointMode => {
            if brain.detected_by_drone {
                flee_from_drones(brain, body, ctx);
            } else {
                behavior_waypoint(brain, body);
            }
        }
        TankMode::HoldPosition => {
            body.stop();
            brain.activity = Activity::Holding;
        }
        TankMode::FleeToCover => {
            if brain.detected_by_drone {
                flee_from_drones(brain, body, ctx);
            } else {
                body.stop();
                brain.activity = Activity::Hiding;
            }
        }
        TankMode::HideAndAmbush => {
            if brain.detected_by_drone {
                flee_from_drones(brain, body, ctx);
            } else {
                body.stop();
                brain.activity = Activity::Ambush;
            }
        }
    }
}

fn behavior_go_to(brain: &mut TankBrain, body: &mut Body) {
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

fn behavior_waypoint(brain: &mut TankBrain, body: &mut Body) {
    if body.patrol_route.is_empty() {
        body.stop();
        return;
    }

    let mut index = body.current_waypoint % body.patrol_route.len();
    if body.distance_to(body.patrol_route[index]) <= WAYPOINT_ARRIVE {
        index = (index + 1) % body.patrol_route.len();
    }
    body.current_waypoint = index;
    body.move_towards(
        body.patrol_route[index],
        body.physics.max_speed * PATROL_SPEED_FACTOR,
    );
    brain.activity = Activity::Patrolling;
}

/// Projects an escape point directly away from the nearest live drone and
/// runs for it at full speed.
fn flee_from_drones(brain: &mut TankBrain, body: &mut Body, ctx: &UpdateContext<'_>) {
    let Some((drone, _)) = ctx.view.nearest_of_kind(EntityKind::Drone, body.position) else {
        return;
    };

    let escape_angle = body.angle_to(drone.body().position) + PI;
    let escape = body.position + Vec2::from_angle(escape_angle) * FLEE_DISTANCE;
    let escape = Vec2::new(
        clamp_to_margin(escape.x, ctx.bounds.x),
        clamp_to_margin(escape.y, ctx.bounds.y),
    );

    body.move_towards(escape, body.physics.max_speed);
    brain.activity = Activity::Fleeing;
}

fn clamp_to_margin(value: f32, extent: f32) -> f32 {
    if extent > 2.0 * ARENA_MARGIN {
        value.clamp(ARENA_MARGIN, extent - ARENA_MARGIN)
    } else {
        extent * 0.5
    }
}

/// Derives the tank's display color from its detection state.
pub(crate) fn update_visual(brain: &TankBrain, body: &mut Body) {
    use super::EntityFlags;

    body.color = if body.is_destroyed() {
        "#666666"
    } else if brain.detected_by_drone || body.flags.contains(EntityFlags::DETECTED) {
        "#0066FF"
    } else {
        "#FF0000"
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityFlags, EntityId};
    use crate::terrain::TerrainGrid;
    use crate::world_view::WorldView;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    struct Fixture {
        entities: BTreeMap<EntityId, Entity>,
        terrain: TerrainGrid,
        rng: ChaCha8Rng,
    }

    impl Fixture {
        fn new(siblings: Vec<Entity>) -> Self {
            Self {
                entities: siblings.into_iter().map(|e| (e.id(), e)).collect(),
                terrain: TerrainGrid::default(),
                rng: ChaCha8Rng::seed_from_u64(42),
            }
        }

        fn step(&mut self, brain: &mut TankBrain, body: &mut Body) {
            let mut ctx = UpdateContext {
                dt: 1.0 / 60.0,
                bounds: Vec2::new(800.0, 600.0),
                terrain: &self.terrain,
                view: WorldView::new(&self.entities),
                rng: &mut self.rng,
            };
            update_behavior(brain, body, &mut ctx);
        }
    }

    fn tank_parts(position: Vec2) -> (TankBrain, Body) {
        let entity = Entity::tank(EntityId::new(50), position, 0.0);
        (entity.as_tank().unwrap().clone(), entity.body().clone())
    }

    #[test]
    fn patrols_default_square_at_reduced_speed() {
        let mut fixture = Fixture::new(vec![]);
        let (mut brain, mut body) = tank_parts(Vec2::new(400.0, 300.0));

        fixture.step(&mut brain, &mut body);
        assert_eq!(brain.activity, Activity::Patrolling);
        let expected = body.physics.max_speed * 0.6;
        assert!((body.velocity.length() - expected).abs() < 1e-3);
    }

    #[test]
    fn patrol_breaks_into_flee_when_spotted() {
        // Drone detection radius is 40; place it 30 away.
        let drone = Entity::drone(EntityId::new(1), Vec2::new(430.0, 300.0), 0.0);
        let mut fixture = Fixture::new(vec![drone]);
        let (mut brain, mut body) = tank_parts(Vec2::new(400.0, 300.0));

        fixture.step(&mut brain, &mut body);
        assert!(brain.detected_by_drone);
        assert_eq!(brain.activity, Activity::Fleeing);
        // Fleeing away from the drone: negative x velocity, full speed.
        assert!(body.velocity.x < 0.0);
        assert!((body.velocity.length() - body.physics.max_speed).abs() < 1e-3);
    }

    #[test]
    fn drone_outside_its_radius_is_ignored() {
        let drone = Entity::drone(EntityId::new(1), Vec2::new(450.0, 300.0), 0.0);
        let mut fixture = Fixture::new(vec![drone]);
        let (mut brain, mut body) = tank_parts(Vec2::new(400.0, 300.0));

        fixture.step(&mut brain, &mut body);
        assert!(!brain.detected_by_drone);
        assert_eq!(brain.activity, Activity::Patrolling);
    }

    #[test]
    fn flee_target_clamps_to_arena_margin() {
        // Tank near the left edge with a drone on its right: the raw escape
        // point would leave the arena.
        let drone = Entity::drone(EntityId::new(1), Vec2::new(90.0, 300.0), 0.0);
        let mut fixture = Fixture::new(vec![drone]);
        let (mut brain, mut body) = tank_parts(Vec2::new(60.0, 300.0));
        brain.mode = TankMode::FleeToCover;

        fixture.step(&mut brain, &mut body);
        assert_eq!(brain.activity, Activity::Fleeing);
        // Escape point clamps to x = 50, just left of the tank.
        assert!(body.velocity.x < 0.0);
    }

    #[test]
    fn cover_modes_hold_when_unseen() {
        let mut fixture = Fixture::new(vec![]);

        let (mut brain, mut body) = tank_parts(Vec2::new(400.0, 300.0));
        brain.mode = TankMode::FleeToCover;
        fixture.step(&mut brain, &mut body);
        assert_eq!(brain.activity, Activity::Hiding);
        assert_eq!(body.velocity, Vec2::ZERO);

        let (mut brain, mut body) = tank_parts(Vec2::new(400.0, 300.0));
        brain.mode = TankMode::HideAndAmbush;
        fixture.step(&mut brain, &mut body);
        assert_eq!(brain.activity, Activity::Ambush);
    }

    #[test]
    fn hold_position_never_flees() {
        let drone = Entity::drone(EntityId::new(1), Vec2::new(410.0, 300.0), 0.0);
        let mut fixture = Fixture::new(vec![drone]);
        let (mut brain, mut body) = tank_parts(Vec2::new(400.0, 300.0));
        brain.mode = TankMode::HoldPosition;

        fixture.step(&mut brain, &mut body);
        assert_eq!(brain.activity, Activity::Holding);
        assert_eq!(body.velocity, Vec2::ZERO);
    }

    #[test]
    fn destroyed_tank_reports_destroyed() {
        let mut fixture = Fixture::new(vec![]);
        let (mut brain, mut body) = tank_parts(Vec2::new(400.0, 300.0));
        body.flags.insert(EntityFlags::DESTROYED);
        body.velocity = Vec2::new(1.0, 0.0);

        fixture.step(&mut brain, &mut body);
        assert_eq!(brain.activity, Activity::Destroyed);
        assert_eq!(body.velocity, Vec2::ZERO);
    }

    #[test]
    fn default_route_is_square_around_center() {
        let route = TankBrain::default_patrol_route(Vec2::new(100.0, 100.0));
        assert_eq!(route.len(), 4);
        assert_eq!(route[0], Vec2::new(80.0, 80.0));
        assert_eq!(route[2], Vec2::new(120.0, 120.0));
    }

    #[test]
    fn visual_reflects_detection() {
        let (mut brain, mut body) = tank_parts(Vec2::ZERO);
        update_visual(&brain, &mut body);
        assert_eq!(body.color, "#FF0000");

        brain.detected_by_drone = true;
        update_visual(&brain, &mut body);
        assert_eq!(body.color, "#0066FF");

        brain.detected_by_drone = false;
        body.flags.insert(EntityFlags::DETECTED);
        update_visual(&brain, &mut body);
        assert_eq!(body.color, "#0066FF");

        body.flags.insert(EntityFlags::DESTROYED);
        update_visual(&brain, &mut body);
        assert_eq!(body.color, "#666666");
    }
}
