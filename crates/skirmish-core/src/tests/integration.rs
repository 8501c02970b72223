//! End-to-end engine behavior: lifecycle, spawning, combat, scenarios.

use glam::Vec2;
use proptest::prelude::*;

use super::helpers::*;
use crate::engine::{RunState, SimulationEngine};
use crate::entity::{EntityId, EntityKind};
use crate::error::EngineError;
use crate::events::{ChatMessage, MessageKind, SimEvent};
use crate::protocol::{
    ControlAction, ControlCommand, EntityCommand, ModeCommand, Point, SpawnCommand,
};
use crate::scenario::ScenarioFile;
use crate::terrain::ids;

mod lifecycle_tests {
    use super::*;

    #[test]
    fn tick_is_a_noop_unless_running() {
        let mut engine = engine();
        spawn_drone(&mut engine, 100.0, 100.0);

        assert!(engine.tick().is_none());
        assert_eq!(engine.simulation_time(), 0.0);

        engine.start();
        assert!(engine.tick().is_some());
        assert!(engine.simulation_time() > 0.0);

        engine.pause();
        let frozen = engine.simulation_time();
        assert!(engine.tick().is_none());
        assert_eq!(engine.simulation_time(), frozen);
    }

    #[test]
    fn speed_multiplier_clamps_both_ways() {
        let mut engine = engine();
        engine.set_speed(25.0);
        assert_eq!(engine.speed_multiplier(), 20.0);
        engine.set_speed(0.01);
        assert_eq!(engine.speed_multiplier(), 0.1);
    }

    #[test]
    fn speed_multiplier_scales_simulation_time() {
        let mut engine = engine();
        engine.set_speed(2.0);
        run_ticks(&mut engine, 60);
        assert!((engine.simulation_time() - 2.0).abs() < 1e-3);
    }

    #[test]
    fn reset_clears_the_world() {
        let mut engine = engine();
        let drone = spawn_drone(&mut engine, 100.0, 100.0);
        spawn_tank(&mut engine, 400.0, 300.0);
        engine.select(drone, true, false).unwrap();
        engine.add_chat_message(ChatMessage {
            sender: "op".to_string(),
            content: "hello".to_string(),
            timestamp: 0.0,
            message_type: MessageKind::Human,
        });
        run_ticks(&mut engine, 10);

        engine.reset();

        assert_eq!(engine.state(), RunState::Stopped);
        assert_eq!(engine.entity_count(), 0);
        assert!(engine.selected().is_empty());
        assert_eq!(engine.events().count(), 0);
        assert_eq!(engine.chat_messages().count(), 0);
        assert_eq!(engine.simulation_time(), 0.0);
        let metrics = engine.metrics();
        assert_eq!(metrics.total_spawned, 0);
        assert_eq!(metrics.total_destroyed, 0);
    }

    #[test]
    fn control_commands_dispatch() {
        let mut engine = engine();
        engine.handle_control(ControlCommand {
            action: ControlAction::Start,
            speed_multiplier: None,
        });
        assert_eq!(engine.state(), RunState::Running);

        engine.handle_control(ControlCommand {
            action: ControlAction::SetSpeed,
            speed_multiplier: Some(4.0),
        });
        assert_eq!(engine.speed_multiplier(), 4.0);

        engine.handle_control(ControlCommand {
            action: ControlAction::Reset,
            speed_multiplier: None,
        });
        assert_eq!(engine.state(), RunState::Stopped);
    }
}

mod spawn_tests {
    use super::*;

    #[test]
    fn drone_spawns_anywhere_in_bounds() {
        let mut engine = engine();
        let a = spawn_drone(&mut engine, 100.0, 100.0);
        // Even directly on top of another entity.
        let b = spawn_drone(&mut engine, 100.0, 100.0);
        assert_eq!(position_of(&engine, a), position_of(&engine, b));
    }

    #[test]
    fn tank_never_lands_on_blocked_terrain() {
        let mut engine = engine();
        engine.terrain_mut().set_rect(
            Vec2::new(380.0, 280.0),
            Vec2::new(420.0, 320.0),
            ids::WATER,
        );

        let result = engine.spawn(SpawnCommand {
            kind: EntityKind::Tank,
            position: Point { x: 400.0, y: 300.0 },
            heading: 0.0,
            mode: None,
        });

        let id = result.expect("relocation should find open ground nearby");
        let position = position_of(&engine, id);
        assert!(!engine
            .terrain()
            .is_blocked(position, EntityKind::Tank.mover_class()));
    }

    #[test]
    fn tank_keeps_clearance_from_live_entities() {
        let mut engine = engine();
        let first = spawn_tank(&mut engine, 400.0, 300.0);
        let second = spawn_tank(&mut engine, 405.0, 300.0);

        let gap = position_of(&engine, first).distance(position_of(&engine, second));
        assert!(gap >= 15.0, "clearance {gap} below spawn minimum");
    }

    #[test]
    fn spawn_fails_when_nothing_fits() {
        let mut engine = engine();
        // Flood the whole arena; no ring or fallback point is valid.
        engine
            .terrain_mut()
            .set_rect(Vec2::new(0.0, 0.0), Vec2::new(799.0, 599.0), ids::WATER);

        let result = engine.spawn(SpawnCommand {
            kind: EntityKind::Tank,
            position: Point { x: 400.0, y: 300.0 },
            heading: 0.0,
            mode: None,
        });
        assert!(matches!(result, Err(EngineError::SpawnRejected { .. })));
        assert_eq!(engine.entity_count(), 0);
    }

    #[test]
    fn out_of_bounds_spawn_relocates_inward() {
        let mut engine = engine();
        let id = engine
            .spawn(SpawnCommand {
                kind: EntityKind::Drone,
                position: Point { x: -40.0, y: -40.0 },
                heading: 0.0,
                mode: None,
            })
            .expect("ring search reaches back in bounds");
        let position = position_of(&engine, id);
        assert!(position.x >= 0.0 && position.y >= 0.0);
    }

    #[test]
    fn spawn_applies_initial_mode() {
        let mut engine = engine();
        let id = spawn_drone_with_mode(&mut engine, 100.0, 100.0, ModeCommand::HoldPosition);
        let drone = engine.entity(id).unwrap().as_drone().unwrap();
        assert_eq!(drone.mode, crate::entity::DroneMode::HoldPosition);
    }
}

mod command_tests {
    use super::*;

    #[test]
    fn unknown_entity_is_not_found() {
        let mut engine = engine();
        let result = engine.command(
            EntityId::new(999),
            &EntityCommand::mode_only(ModeCommand::HoldPosition),
        );
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn mode_mismatch_is_validation_error_without_mutation() {
        let mut engine = engine();
        let id = spawn_tank(&mut engine, 400.0, 300.0);

        let result = engine.command(id, &EntityCommand::mode_only(ModeCommand::RandomSearch));
        assert!(matches!(result, Err(EngineError::Validation(_))));

        let tank = engine.entity(id).unwrap().as_tank().unwrap();
        assert_eq!(tank.mode, crate::entity::TankMode::WaypointMode);
    }

    #[test]
    fn goto_command_drives_entity_to_target() {
        let mut engine = engine();
        let id = spawn_drone(&mut engine, 100.0, 100.0);
        engine
            .command(
                id,
                &EntityCommand {
                    mode: ModeCommand::GoTo,
                    target_position: Some(Point { x: 150.0, y: 100.0 }),
                    target_entity_id: None,
                    patrol_route: None,
                },
            )
            .unwrap();

        // 50 units at 8 u/s needs just over 6 seconds.
        run_ticks(&mut engine, 60 * 8);
        let position = position_of(&engine, id);
        assert!(position.distance(Vec2::new(150.0, 100.0)) <= 3.0);
    }

    #[test]
    fn remove_deletes_entity_and_selection() {
        let mut engine = engine();
        let id = spawn_drone(&mut engine, 100.0, 100.0);
        engine.select(id, true, false).unwrap();

        engine.remove(id).unwrap();
        assert!(engine.entity(id).is_none());
        assert!(engine.selected().is_empty());
        assert!(engine
            .events()
            .any(|e| matches!(e, SimEvent::EntityDestroyed { cause, .. } if cause == "removed")));

        assert!(matches!(
            engine.remove(id),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn single_select_clears_previous_selection() {
        let mut engine = engine();
        let a = spawn_drone(&mut engine, 100.0, 100.0);
        let b = spawn_drone(&mut engine, 200.0, 100.0);

        engine.select(a, true, false).unwrap();
        let count = engine.select(b, true, false).unwrap();
        assert_eq!(count, 1);
        assert_eq!(engine.selected(), &[b]);
        assert!(!engine
            .entity(a)
            .unwrap()
            .body()
            .flags
            .contains(crate::entity::EntityFlags::SELECTED));
    }

    #[test]
    fn multi_select_accumulates_and_toggles() {
        let mut engine = engine();
        let a = spawn_drone(&mut engine, 100.0, 100.0);
        let b = spawn_drone(&mut engine, 200.0, 100.0);

        engine.select(a, true, true).unwrap();
        let count = engine.select(b, true, true).unwrap();
        assert_eq!(count, 2);

        let count = engine.select(a, false, true).unwrap();
        assert_eq!(count, 1);
        assert_eq!(engine.selected(), &[b]);
    }

    #[test]
    fn chat_messages_get_simulation_timestamps() {
        let mut engine = engine();
        run_ticks(&mut engine, 30);
        let now = engine.simulation_time();

        engine.add_chat_message(ChatMessage {
            sender: "op".to_string(),
            content: "contact".to_string(),
            timestamp: 12345.0,
            message_type: MessageKind::Human,
        });

        let logged = engine.chat_messages().next().unwrap();
        assert!((logged.timestamp - now).abs() < f32::EPSILON);
    }
}

mod combat_tests {
    use super::*;

    /// Runs the engine until the predicate holds or the tick budget runs out.
    fn run_until(
        engine: &mut SimulationEngine,
        max_ticks: usize,
        predicate: impl Fn(&SimulationEngine) -> bool,
    ) -> bool {
        engine.start();
        for _ in 0..max_ticks {
            engine.tick();
            if predicate(engine) {
                return true;
            }
        }
        false
    }

    #[test]
    fn tracked_tank_is_engaged_after_the_timer() {
        let mut engine = engine();
        let drone = spawn_drone(&mut engine, 100.0, 100.0);
        let tank = spawn_tank(&mut engine, 130.0, 100.0);

        let destroyed = run_until(&mut engine, 60 * 5, |e| {
            e.entity(drone).unwrap().is_destroyed()
        });
        assert!(destroyed, "drone never engaged within five seconds");

        let tank_entity = engine.entity(tank).unwrap();
        assert!(tank_entity.is_destroyed());

        // The shared impact point is the tank's resting place, and the drone
        // relocated onto it.
        let impact = engine
            .entity(drone)
            .unwrap()
            .as_drone()
            .unwrap()
            .kamikaze_impact_position
            .expect("drone records the impact");
        assert_eq!(position_of(&engine, drone), impact);
        assert_eq!(position_of(&engine, tank), impact);
        assert_eq!(
            tank_entity.as_tank().unwrap().kamikaze_impact_position,
            Some(impact)
        );

        assert!(engine
            .events()
            .any(|e| matches!(e, SimEvent::Kamikaze { .. })));
        assert_eq!(engine.metrics().total_destroyed, 2);
    }

    #[test]
    fn kamikaze_disabled_drone_tracks_forever() {
        let mut engine = engine();
        let drone = spawn_drone(&mut engine, 100.0, 100.0);
        let tank = spawn_tank(&mut engine, 130.0, 100.0);
        engine
            .entity_mut(drone)
            .unwrap()
            .as_drone_mut()
            .unwrap()
            .kamikaze_enabled = false;

        run_ticks(&mut engine, 60 * 3);

        assert!(!engine.entity(drone).unwrap().is_destroyed());
        assert!(!engine.entity(tank).unwrap().is_destroyed());
    }

    #[test]
    fn destroyed_entities_stay_frozen() {
        let mut engine = engine();
        let drone = spawn_drone_with_mode(&mut engine, 100.0, 100.0, ModeCommand::Kamikaze);
        let tank = spawn_tank(&mut engine, 200.0, 100.0);

        let destroyed = run_until(&mut engine, 60 * 30, |e| {
            e.entity(drone).unwrap().is_destroyed() && e.entity(tank).unwrap().is_destroyed()
        });
        assert!(destroyed, "kamikaze run never connected");

        let drone_rest = position_of(&engine, drone);
        let tank_rest = position_of(&engine, tank);

        run_ticks(&mut engine, 60);

        assert_eq!(position_of(&engine, drone), drone_rest);
        assert_eq!(position_of(&engine, tank), tank_rest);
        assert_eq!(engine.entity_count(), 2, "destroyed entities persist");
    }

    #[test]
    fn detection_event_reports_detector_and_target() {
        let mut engine = engine();
        let drone = spawn_drone(&mut engine, 100.0, 100.0);
        let tank = spawn_tank(&mut engine, 130.0, 100.0);

        run_ticks(&mut engine, 1);

        let detection = engine
            .events()
            .find_map(|e| match e {
                SimEvent::Detection {
                    detector_id,
                    target_id,
                    distance,
                    ..
                } => Some((*detector_id, *target_id, *distance)),
                _ => None,
            })
            .expect("detection event recorded");
        assert_eq!(detection.0, drone);
        assert_eq!(detection.1, tank);
        assert!(detection.2 <= 40.0);

        assert!(engine
            .entity(tank)
            .unwrap()
            .body()
            .flags
            .contains(crate::entity::EntityFlags::DETECTED));
    }

    #[test]
    fn forest_breaks_engine_level_detection() {
        let mut engine = engine();
        // A forest wall between the two: line of sight fails even though the
        // distance is well inside the radius.
        engine.terrain_mut().set_rect(
            Vec2::new(120.0, 0.0),
            Vec2::new(139.0, 599.0),
            ids::FOREST,
        );
        spawn_drone_with_mode(&mut engine, 100.0, 300.0, ModeCommand::HoldPosition);
        let tank = spawn_tank_with_mode(&mut engine, 130.0, 300.0, ModeCommand::HoldPosition);

        run_ticks(&mut engine, 1);

        assert!(!engine
            .entity(tank)
            .unwrap()
            .body()
            .flags
            .contains(crate::entity::EntityFlags::DETECTED));
        assert!(engine.events().all(|e| !matches!(e, SimEvent::Detection { .. })));
    }

    #[test]
    fn coincident_entities_separate_within_one_tick() {
        let mut engine = engine();
        let a = spawn_drone_with_mode(&mut engine, 400.0, 300.0, ModeCommand::HoldPosition);
        let b = spawn_drone_with_mode(&mut engine, 400.0, 300.0, ModeCommand::HoldPosition);

        run_ticks(&mut engine, 1);

        let separation = position_of(&engine, a).distance(position_of(&engine, b));
        let combined = 6.0; // two drone collision radii
        assert!(
            separation >= combined - 1e-3,
            "separation {separation} below combined radius {combined}"
        );
    }

    #[test]
    fn patrolling_tank_flees_from_a_watching_drone() {
        let mut engine = engine();
        spawn_drone_with_mode(&mut engine, 100.0, 300.0, ModeCommand::HoldPosition);
        let tank = spawn_tank(&mut engine, 120.0, 300.0);

        run_ticks(&mut engine, 60);

        // The tank should have opened the gap, moving away from the drone.
        let position = position_of(&engine, tank);
        assert!(position.x > 120.0);
        assert!(engine
            .entity(tank)
            .unwrap()
            .as_tank()
            .unwrap()
            .detected_by_drone);
    }
}

mod scenario_tests {
    use super::*;

    fn three_entity_scenario() -> ScenarioFile {
        serde_json::from_value(serde_json::json!({
            "title": "Patrol Clash",
            "description": "Two drones sweep while a tank patrols.",
            "arena": { "width": 800.0, "height": 600.0 },
            "entities": [
                { "type": "drone", "x": 100.0, "y": 100.0, "mode": "random_search" },
                { "type": "drone", "x": 700.0, "y": 100.0, "mode": "hold_position" },
                { "type": "tank", "x": 400.0, "y": 500.0, "mode": "waypoint_mode",
                  "patrol_route": [
                      { "x": 380.0, "y": 480.0 },
                      { "x": 420.0, "y": 480.0 },
                      { "x": 420.0, "y": 520.0 },
                      { "x": 380.0, "y": 520.0 }
                  ] },
            ],
        }))
        .unwrap()
    }

    #[test]
    fn apply_scenario_reports_entities_loaded() {
        let mut engine = engine();
        let summary = engine
            .apply_scenario("patrol_clash", &three_entity_scenario())
            .unwrap();

        assert_eq!(summary.entities_loaded, 3);
        assert_eq!(summary.title.as_deref(), Some("Patrol Clash"));
        assert_eq!(engine.entity_count(), 3);
        assert_eq!(engine.current_scenario(), Some("patrol_clash"));
        assert_eq!(engine.metrics().drones, 2);
        assert_eq!(engine.metrics().tanks, 1);
    }

    #[test]
    fn scenario_overrides_arena_bounds() {
        let mut engine = engine();
        let scenario: ScenarioFile = serde_json::from_value(serde_json::json!({
            "arena": { "width": 1000.0, "height": 400.0 },
            "entities": [],
        }))
        .unwrap();
        engine.apply_scenario("wide", &scenario).unwrap();
        assert_eq!(engine.arena_bounds(), Vec2::new(1000.0, 400.0));
    }

    #[test]
    fn malformed_terrain_falls_back_to_default() {
        let mut engine = engine();
        engine
            .terrain_mut()
            .set_rect(Vec2::new(0.0, 0.0), Vec2::new(200.0, 200.0), ids::WATER);

        let scenario: ScenarioFile = serde_json::from_value(serde_json::json!({
            "terrain": { "width": 800 },
            "entities": [ { "type": "drone", "x": 100.0, "y": 100.0 } ],
        }))
        .unwrap();

        let summary = engine.apply_scenario("broken_terrain", &scenario).unwrap();
        assert_eq!(summary.entities_loaded, 1);
        // Default terrain replaced the flooded grid.
        assert_eq!(
            engine.terrain().coverage_stats()[ids::WATER],
            0,
            "terrain fell back to all-open"
        );
    }

    #[test]
    fn scenario_terrain_is_installed() {
        let mut engine = engine();
        let mut terrain = crate::terrain::TerrainGrid::new(800, 600, 20);
        terrain.set_rect(Vec2::new(0.0, 0.0), Vec2::new(99.0, 99.0), ids::RUINS);

        let scenario: ScenarioFile = serde_json::from_value(serde_json::json!({
            "terrain": serde_json::to_value(&terrain).unwrap(),
            "entities": [],
        }))
        .unwrap();

        engine.apply_scenario("ruined", &scenario).unwrap();
        assert_eq!(engine.terrain().terrain_at(Vec2::new(50.0, 50.0)).id, ids::RUINS);
    }

    #[test]
    fn missing_scenario_file_errors() {
        let mut engine = engine();
        engine.set_scenario_dir(std::env::temp_dir().join("skirmish-no-such-dir"));
        let result = engine.load_scenario("ghost");
        assert!(matches!(result, Err(EngineError::ScenarioLoad(_))));
    }

    #[test]
    fn load_scenario_reads_from_disk() {
        let dir = std::env::temp_dir().join("skirmish-scenario-test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("duel.json");
        std::fs::write(
            &file,
            serde_json::to_string(&three_entity_scenario()).unwrap(),
        )
        .unwrap();

        let mut engine = engine();
        engine.set_scenario_dir(&dir);

        let summary = engine.load_scenario("duel").unwrap();
        assert_eq!(summary.entities_loaded, 3);

        let listed = engine.list_scenarios();
        assert!(listed.iter().any(|s| s.name == "duel" && s.entities == 3));

        std::fs::remove_file(file).ok();
    }
}

mod snapshot_tests {
    use super::*;

    #[test]
    fn snapshot_carries_the_full_contract() {
        let mut engine = engine();
        let drone = spawn_drone(&mut engine, 100.0, 100.0);
        spawn_tank(&mut engine, 130.0, 100.0);
        engine.select(drone, true, false).unwrap();
        run_ticks(&mut engine, 5);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.simulation.state, RunState::Running);
        assert!(snapshot.simulation.time > 0.0);
        assert_eq!(snapshot.entities.len(), 2);
        assert_eq!(snapshot.selected_entities, vec![drone]);
        assert_eq!(snapshot.metrics.total_spawned, 2);
        assert!(!snapshot.events.is_empty());

        // The whole structure serializes for the transport layer.
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["entities"].as_array().unwrap().len(), 2);
        assert!(json["terrain"]["grid"].is_array());
    }

    #[test]
    fn snapshot_truncates_event_history() {
        let mut engine = engine();
        spawn_drone(&mut engine, 100.0, 100.0);
        let tank = spawn_tank(&mut engine, 130.0, 100.0);
        engine
            .entity_mut(tank)
            .unwrap()
            .as_tank_mut()
            .unwrap()
            .mode = crate::entity::TankMode::HoldPosition;

        // Detection re-fires every tick; the log grows past the snapshot cut.
        run_ticks(&mut engine, 80);

        let snapshot = engine.snapshot();
        assert!(engine.events().count() > 50);
        assert_eq!(snapshot.events.len(), 50);
    }

    #[test]
    fn command_context_sees_nearby_entities_only() {
        let mut engine = engine();
        let drone = spawn_drone(&mut engine, 100.0, 100.0);
        let close = spawn_tank(&mut engine, 150.0, 100.0);
        let far = spawn_tank(&mut engine, 700.0, 500.0);

        let context = engine.command_context(drone).unwrap();
        assert_eq!(context.drone.id, drone);
        assert!(context.nearby_entities.iter().any(|e| e.id == close));
        assert!(context.nearby_entities.iter().all(|e| e.id != far));
        assert_eq!(context.simulation.tanks, 2);
        assert!(context.available_modes.contains(&ModeCommand::GoTo));
    }

    #[test]
    fn command_context_rejects_tanks() {
        let mut engine = engine();
        let tank = spawn_tank(&mut engine, 400.0, 300.0);
        assert!(matches!(
            engine.command_context(tank),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            engine.command_context(EntityId::new(404)),
            Err(EngineError::NotFound(_))
        ));
    }
}

mod bounds_property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Wherever entities spawn and whatever they do, every position stays
        /// inside the arena after every tick.
        #[test]
        fn positions_stay_in_bounds(
            seed in 0u64..1000,
            spawns in proptest::collection::vec(
                (0f32..800.0, 0f32..600.0, prop::bool::ANY),
                1..8,
            ),
        ) {
            let mut engine = SimulationEngine::new(seed);
            for (x, y, is_drone) in spawns {
                let kind = if is_drone { EntityKind::Drone } else { EntityKind::Tank };
                // Ground spawns may be rejected outright; that is fine here.
                let _ = engine.spawn(SpawnCommand {
                    kind,
                    position: Point { x, y },
                    heading: 0.0,
                    mode: None,
                });
            }

            engine.start();
            for _ in 0..30 {
                engine.tick();
                for entity in engine.entities() {
                    let p = entity.body().position;
                    prop_assert!(p.x >= 0.0 && p.x <= 800.0, "x out of bounds: {}", p.x);
                    prop_assert!(p.y >= 0.0 && p.y <= 600.0, "y out of bounds: {}", p.y);
                }
            }
        }
    }
}
