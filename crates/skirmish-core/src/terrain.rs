//! Grid-based terrain with movement, detection, and line-of-sight effects.
//!
//! The arena is discretized into square cells, each holding the id of a
//! [`TerrainDefinition`]. Definitions are data, not code: scenarios may ship
//! their own definition tables and grids, and every query falls back to the
//! `open` definition when a stored id does not resolve.
//!
//! Terrain affects the simulation in four ways:
//!
//! - **Movement cost** divides the effective timestep of ground units.
//! - **Blocking** pins ground units in place entirely.
//! - **Detection multiplier** scales sensing radii in the engine's
//!   drone-versus-tank detection pass.
//! - **Line of sight** is sampled along the segment between two points and
//!   fails on the first cell whose terrain blocks it.
//!
//! Air units are nearly exempt: they are never blocked, and only forest
//! (tree height) slows them slightly.

use std::collections::BTreeMap;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Terrain id constants for the stock definition table.
pub mod ids {
    /// Open ground, the universal fallback.
    pub const OPEN: &str = "open";
    /// Dense forest.
    pub const FOREST: &str = "forest";
    /// Urban ruins.
    pub const RUINS: &str = "ruins";
    /// Water, impassable to ground units.
    pub const WATER: &str = "water";
    /// Road.
    pub const ROAD: &str = "road";
    /// Bridge over water.
    pub const BRIDGE: &str = "bridge";
}

/// Movement cost above which ground terrain is treated as impassable even
/// without the hard `blocked` flag.
pub const IMPASSABLE_COST: f32 = 10.0;

/// Flight cost through forest cells (tree height slows drones slightly).
const AIR_FOREST_COST: f32 = 1.2;

/// Movement classification used by terrain queries.
///
/// Terrain does not care about entity types, only whether a mover travels on
/// the ground or flies over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoverClass {
    /// Travels on the ground; fully subject to terrain.
    Ground,
    /// Flies; ignores terrain except forest drag.
    Air,
}

// =============================================================================
// Terrain definitions
// =============================================================================

/// A terrain type: display data plus its effects on movement and sensing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainDefinition {
    /// Stable id referenced by grid cells.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Display color (hex), not interpreted by the core.
    pub color: String,
    /// Movement time divisor for ground units (1.0 = normal, 2.0 = half
    /// speed). Values above [`IMPASSABLE_COST`] are treated as impassable.
    #[serde(default = "defaults::move_cost")]
    pub move_cost: f32,
    /// Hard movement block for ground units.
    #[serde(default)]
    pub blocked: bool,
    /// Detection radius multiplier applied in the engine detection pass.
    #[serde(default = "defaults::detect_mult")]
    pub detect_mult: f32,
    /// Whether this terrain blocks line of sight.
    #[serde(default)]
    pub los_blocks: bool,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

mod defaults {
    pub fn move_cost() -> f32 {
        1.0
    }
    pub fn detect_mult() -> f32 {
        1.0
    }
}

impl TerrainDefinition {
    /// The `open` definition used as the universal fallback.
    #[must_use]
    pub fn open() -> Self {
        Self {
            id: ids::OPEN.to_string(),
            name: "Open Ground".to_string(),
            color: "#2c3e50".to_string(),
            move_cost: 1.0,
            blocked: false,
            detect_mult: 1.0,
            los_blocks: false,
            description: "Open terrain with normal movement and detection".to_string(),
        }
    }
}

fn open_fallback() -> &'static TerrainDefinition {
    static OPEN: std::sync::OnceLock<TerrainDefinition> = std::sync::OnceLock::new();
    OPEN.get_or_init(TerrainDefinition::open)
}

fn stock_definitions() -> BTreeMap<String, TerrainDefinition> {
    let defs = [
        TerrainDefinition::open(),
        TerrainDefinition {
            id: ids::FOREST.to_string(),
            name: "Forest".to_string(),
            color: "#27ae60".to_string(),
            move_cost: 1.5,
            blocked: false,
            detect_mult: 0.7,
            los_blocks: true,
            description: "Dense forest - slower movement, reduced detection".to_string(),
        },
        TerrainDefinition {
            id: ids::RUINS.to_string(),
            name: "Ruins/Urban".to_string(),
            color: "#95a5a6".to_string(),
            move_cost: 1.3,
            blocked: false,
            detect_mult: 0.8,
            los_blocks: true,
            description: "Urban ruins - corridors and LoS blocking".to_string(),
        },
        TerrainDefinition {
            id: ids::WATER.to_string(),
            name: "Water".to_string(),
            color: "#3498db".to_string(),
            move_cost: 999.0,
            blocked: true,
            detect_mult: 1.0,
            los_blocks: false,
            description: "Water - blocks ground movement, drones fly over".to_string(),
        },
        TerrainDefinition {
            id: ids::ROAD.to_string(),
            name: "Road".to_string(),
            color: "#34495e".to_string(),
            move_cost: 0.7,
            blocked: false,
            detect_mult: 1.1,
            los_blocks: false,
            description: "Road - faster movement, slightly better detection".to_string(),
        },
        TerrainDefinition {
            id: ids::BRIDGE.to_string(),
            name: "Bridge".to_string(),
            color: "#A9A9A9".to_string(),
            move_cost: 0.9,
            blocked: false,
            detect_mult: 1.0,
            los_blocks: false,
            description: "Bridge - allows passage over water".to_string(),
        },
    ];
    defs.into_iter().map(|d| (d.id.clone(), d)).collect()
}

// =============================================================================
// Terrain grid
// =============================================================================

/// Discretized cost/visibility map over the arena.
///
/// World coordinates convert to grid cells by integer division by
/// `cell_size`, clamped to the grid bounds, so queries just outside the arena
/// resolve to the nearest edge cell.
///
/// The grid serializes to a self-describing structure (definition table plus
/// raw id grid) so scenarios can ship custom terrain. Deserialization rejects
/// structures missing required fields; callers fall back to default terrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainGrid {
    width: u32,
    height: u32,
    cell_size: u32,
    grid_width: usize,
    grid_height: usize,
    terrain_definitions: BTreeMap<String, TerrainDefinition>,
    grid: Vec<Vec<String>>,
}

impl TerrainGrid {
    /// Creates an all-open grid covering `width` x `height` world units.
    ///
    /// `cell_size` must be nonzero; partial trailing cells are dropped, as in
    /// integer division.
    #[must_use]
    pub fn new(width: u32, height: u32, cell_size: u32) -> Self {
        debug_assert!(cell_size > 0, "cell_size must be nonzero");
        let grid_width = (width / cell_size) as usize;
        let grid_height = (height / cell_size) as usize;
        Self {
            width,
            height,
            cell_size,
            grid_width,
            grid_height,
            terrain_definitions: stock_definitions(),
            grid: vec![vec![ids::OPEN.to_string(); grid_width]; grid_height],
        }
    }

    /// Restores the stock definition table and an all-open grid, keeping the
    /// current dimensions.
    pub fn reset_to_default(&mut self) {
        self.terrain_definitions = stock_definitions();
        self.grid = vec![vec![ids::OPEN.to_string(); self.grid_width]; self.grid_height];
    }

    /// Arena width in world units.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Arena height in world units.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Cell edge length in world units.
    #[must_use]
    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Grid dimensions as (columns, rows).
    #[must_use]
    pub fn grid_size(&self) -> (usize, usize) {
        (self.grid_width, self.grid_height)
    }

    /// The definition table keyed by terrain id.
    #[must_use]
    pub fn definitions(&self) -> &BTreeMap<String, TerrainDefinition> {
        &self.terrain_definitions
    }

    /// Converts world coordinates to a grid cell, clamped to grid bounds.
    #[must_use]
    pub fn world_to_grid(&self, point: Vec2) -> (usize, usize) {
        let gx = (point.x / self.cell_size as f32).floor() as i64;
        let gy = (point.y / self.cell_size as f32).floor() as i64;
        let gx = gx.clamp(0, self.grid_width as i64 - 1) as usize;
        let gy = gy.clamp(0, self.grid_height as i64 - 1) as usize;
        (gx, gy)
    }

    /// Converts a grid cell to its center in world coordinates.
    #[must_use]
    pub fn grid_to_world(&self, gx: usize, gy: usize) -> Vec2 {
        Vec2::new(
            (gx as f32 + 0.5) * self.cell_size as f32,
            (gy as f32 + 0.5) * self.cell_size as f32,
        )
    }

    /// Returns the terrain definition at a world position.
    ///
    /// Unresolvable ids fall back to the `open` definition.
    #[must_use]
    pub fn terrain_at(&self, point: Vec2) -> &TerrainDefinition {
        let (gx, gy) = self.world_to_grid(point);
        let id = &self.grid[gy][gx];
        self.terrain_definitions
            .get(id)
            .or_else(|| self.terrain_definitions.get(ids::OPEN))
            .unwrap_or_else(|| open_fallback())
    }

    /// Movement time divisor at a world position for the given mover class.
    ///
    /// Air movers cost 1.0 everywhere except forest; the trees still slow
    /// flight slightly. Ground movers pay the terrain's full `move_cost`.
    #[must_use]
    pub fn movement_cost(&self, point: Vec2, mover: MoverClass) -> f32 {
        let terrain = self.terrain_at(point);
        match mover {
            MoverClass::Air => {
                if terrain.id == ids::FOREST {
                    AIR_FOREST_COST
                } else {
                    1.0
                }
            }
            MoverClass::Ground => terrain.move_cost,
        }
    }

    /// Whether the given mover class cannot move at this position.
    ///
    /// Air movers are never blocked. Ground movers are blocked by the hard
    /// flag or by a movement cost above [`IMPASSABLE_COST`].
    #[must_use]
    pub fn is_blocked(&self, point: Vec2, mover: MoverClass) -> bool {
        match mover {
            MoverClass::Air => false,
            MoverClass::Ground => {
                let terrain = self.terrain_at(point);
                terrain.blocked || terrain.move_cost > IMPASSABLE_COST
            }
        }
    }

    /// Detection radius multiplier at a world position.
    #[must_use]
    pub fn detection_multiplier(&self, point: Vec2) -> f32 {
        self.terrain_at(point).detect_mult
    }

    /// Samples the segment from `a` to `b` for line-of-sight blockage.
    ///
    /// The segment is sampled every half cell; the first sampled cell whose
    /// terrain blocks line of sight fails the check. A zero-length segment is
    /// always clear. The step count formula is part of the observable
    /// contract and must not change.
    #[must_use]
    pub fn line_of_sight(&self, a: Vec2, b: Vec2) -> bool {
        let distance = a.distance(b);
        if distance == 0.0 {
            return true;
        }

        let steps = ((distance / (self.cell_size as f32 * 0.5)) as usize).max(1);
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let sample = a.lerp(b, t);
            if self.terrain_at(sample).los_blocks {
                return false;
            }
        }
        true
    }

    /// Sets the terrain type of the cell containing `point`.
    ///
    /// Returns false without mutating anything if `terrain_type` is unknown.
    pub fn set_cell(&mut self, point: Vec2, terrain_type: &str) -> bool {
        if !self.terrain_definitions.contains_key(terrain_type) {
            return false;
        }
        let (gx, gy) = self.world_to_grid(point);
        self.grid[gy][gx] = terrain_type.to_string();
        true
    }

    /// Sets the terrain type of every cell in the world-space rectangle
    /// spanned by two corner points.
    ///
    /// Returns false without mutating anything if `terrain_type` is unknown.
    pub fn set_rect(&mut self, corner_a: Vec2, corner_b: Vec2, terrain_type: &str) -> bool {
        if !self.terrain_definitions.contains_key(terrain_type) {
            return false;
        }
        let (gx1, gy1) = self.world_to_grid(corner_a.min(corner_b));
        let (gx2, gy2) = self.world_to_grid(corner_a.max(corner_b));
        for row in &mut self.grid[gy1..=gy2] {
            for cell in &mut row[gx1..=gx2] {
                *cell = terrain_type.to_string();
            }
        }
        true
    }

    /// Counts grid cells per known terrain id.
    ///
    /// Cells holding unresolvable ids are not counted.
    #[must_use]
    pub fn coverage_stats(&self) -> BTreeMap<String, usize> {
        let mut stats: BTreeMap<String, usize> = self
            .terrain_definitions
            .keys()
            .map(|id| (id.clone(), 0))
            .collect();
        for row in &self.grid {
            for cell in row {
                if let Some(count) = stats.get_mut(cell) {
                    *count += 1;
                }
            }
        }
        stats
    }

    /// Builds a grid from a previously serialized JSON value.
    ///
    /// Missing required fields fail deserialization; the caller is expected
    /// to fall back to default terrain.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| EngineError::ScenarioLoad(format!("terrain parse failure: {e}")))
    }

    /// Writes the grid as pretty-printed JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::ScenarioLoad(format!("terrain serialize failure: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| EngineError::ScenarioLoad(format!("terrain write failure: {e}")))
    }

    /// Reads a grid from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::ScenarioLoad(format!("terrain read failure: {e}")))?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::ScenarioLoad(format!("terrain parse failure: {e}")))
    }
}

impl Default for TerrainGrid {
    fn default() -> Self {
        Self::new(800, 600, 20)
    }
}
