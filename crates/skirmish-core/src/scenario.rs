//! Scenario files: declarative world setups loaded from JSON.
//!
//! A scenario optionally overrides the arena bounds and terrain, then lists
//! the entities to spawn with their initial commands. Terrain travels as a
//! raw JSON value so a malformed terrain block degrades to default terrain
//! instead of failing the whole load; everything else is strict.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::error::{EngineError, Result};
use crate::protocol::{ArenaBounds, EntityCommand, ModeCommand, Point};

/// A parsed scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFile {
    /// Display title; defaults to the file stem when listed.
    #[serde(default)]
    pub title: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Arena bounds override.
    #[serde(default)]
    pub arena: Option<ArenaBounds>,
    /// Terrain block, kept raw so parse failures can degrade gracefully.
    #[serde(default)]
    pub terrain: Option<serde_json::Value>,
    /// Entities to spawn, in order.
    #[serde(default)]
    pub entities: Vec<ScenarioEntity>,
}

impl ScenarioFile {
    /// Reads and parses a scenario file.
    ///
    /// # Errors
    ///
    /// [`EngineError::ScenarioLoad`] when the file is missing, unreadable, or
    /// not valid scenario JSON.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EngineError::ScenarioLoad(format!(
                "scenario file not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::ScenarioLoad(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::ScenarioLoad(format!("{}: {e}", path.display())))
    }
}

/// One entity entry in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEntity {
    /// Kind of unit to spawn.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Spawn x coordinate.
    pub x: f32,
    /// Spawn y coordinate.
    pub y: f32,
    /// Initial heading in radians.
    #[serde(default)]
    pub heading: f32,
    /// Initial mode; without one the unit keeps its kind default.
    #[serde(default)]
    pub mode: Option<ModeCommand>,
    /// `go_to` destination x, paired with `target_y`.
    #[serde(default)]
    pub target_x: Option<f32>,
    /// `go_to` destination y, paired with `target_x`.
    #[serde(default)]
    pub target_y: Option<f32>,
    /// Patrol route for `waypoint_mode`.
    #[serde(default)]
    pub patrol_route: Vec<Point>,
}

impl ScenarioEntity {
    /// The command to apply right after spawning, when a mode is given.
    #[must_use]
    pub fn initial_command(&self) -> Option<EntityCommand> {
        let mode = self.mode?;
        let target_position = match (self.target_x, self.target_y) {
            (Some(x), Some(y)) => Some(Point { x, y }),
            _ => None,
        };
        let patrol_route = if self.patrol_route.is_empty() {
            None
        } else {
            Some(self.patrol_route.clone())
        };
        Some(EntityCommand {
            mode,
            target_position,
            target_entity_id: None,
            patrol_route,
        })
    }
}

/// Catalog entry describing one scenario on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInfo {
    /// File stem used to load the scenario.
    pub name: String,
    /// Display title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Number of entities the scenario spawns.
    pub entities: usize,
}

/// Result of a successful scenario load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    /// Loaded scenario name.
    pub name: String,
    /// Scenario title, when one was given.
    pub title: Option<String>,
    /// Number of entities spawned.
    pub entities_loaded: usize,
}

/// Enumerates the scenarios in a directory.
///
/// Files that fail to parse are logged and skipped; a missing directory
/// yields an empty list.
#[must_use]
pub fn list_scenarios(dir: &Path) -> Vec<ScenarioInfo> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut scenarios = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        match ScenarioFile::load(&path) {
            Ok(scenario) => scenarios.push(ScenarioInfo {
                title: scenario.title.clone().unwrap_or_else(|| name.clone()),
                description: scenario.description.clone().unwrap_or_default(),
                entities: scenario.entities.len(),
                name,
            }),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "skipping unreadable scenario");
            }
        }
    }
    scenarios.sort_by(|a, b| a.name.cmp(&b.name));
    scenarios
}
