// Scene configuration: particle timing, agent population rules, player
// tuning and the color palette. Loaded from TOML; every field has a
// default so a partial file (or no file) is fine.

use std::path::Path;

use glam::{Vec2, Vec3};
use serde::Deserialize;

use super::error::ConfigError;

// ============================================================================
// PARTICLE TIMING
// ============================================================================

/// Age thresholds (in update ticks) for the particle effect.
///
/// `grow_end`:     growth stops, the particle freezes and is hidden.
/// `shrink_start`: lower bound of the shrink window (exclusive).
/// `reset_age`:    age a `reset_counter()` jumps to.
/// `shrink_end`:   shrinking stops, the particle is hidden for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParticleTiming {
    pub grow_end: u32,
    pub shrink_start: u32,
    pub reset_age: u32,
    pub shrink_end: u32,
}

impl Default for ParticleTiming {
    fn default() -> Self {
        Self {
            grow_end: 200,
            shrink_start: 250,
            reset_age: 300,
            shrink_end: 500,
        }
    }
}

impl ParticleTiming {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grow_end > self.shrink_start
            || self.shrink_start >= self.reset_age
            || self.reset_age >= self.shrink_end
        {
            return Err(ConfigError::Invalid(format!(
                "particle timing must satisfy grow_end <= shrink_start < reset_age < shrink_end, got {:?}",
                self
            )));
        }
        Ok(())
    }
}

// ============================================================================
// AGENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum number of live agents.
    pub capacity: usize,
    /// Distance an agent's move node travels per tick while moving.
    pub speed_step: f32,
    /// Agents closer than this (XZ distance) collide.
    pub collision_radius: f32,
    /// Spawn rectangle on the XZ plane, in lobby coordinates.
    pub spawn_min: [f32; 2],
    pub spawn_max: [f32; 2],
    /// Attempts per spawn roll before giving up until a later tick.
    pub retry_budget: u32,
    /// Per-tick probabilities of the three lifecycle events.
    pub spawn_chance: f64,
    pub despawn_chance: f64,
    pub toggle_chance: f64,
    /// Ticks between the despawn flare and structural removal.
    pub despawn_delay: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            speed_step: 0.05,
            collision_radius: 2.0,
            spawn_min: [-17.0, -17.0],
            spawn_max: [17.0, 17.0],
            retry_budget: 64,
            spawn_chance: 0.004,
            despawn_chance: 0.003,
            toggle_chance: 0.005,
            despawn_delay: 200,
        }
    }
}

impl AgentConfig {
    pub fn spawn_min(&self) -> Vec2 {
        Vec2::from(self.spawn_min)
    }

    pub fn spawn_max(&self) -> Vec2 {
        Vec2::from(self.spawn_max)
    }
}

// ============================================================================
// PLAYER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Distance travelled per tick while a move key is held.
    pub step: f32,
    /// Starting XZ position in lobby coordinates.
    pub start: [f32; 2],
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            step: 0.1,
            start: [0.0, 10.0],
        }
    }
}

// ============================================================================
// SCENE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Fixed RNG seed. `None` seeds from the OS.
    pub seed: Option<u64>,
    pub particle: ParticleTiming,
    pub particle_points: usize,
    pub particle_point_size: f32,
    pub agents: AgentConfig,
    pub player: PlayerConfig,
    /// Agent colors. Each live agent holds exactly one slot.
    pub palette: Vec<[f32; 3]>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            seed: None,
            particle: ParticleTiming::default(),
            particle_points: 300,
            particle_point_size: 1.0,
            agents: AgentConfig::default(),
            player: PlayerConfig::default(),
            palette: vec![
                [0.95, 0.77, 0.06],
                [0.20, 0.60, 0.86],
                [0.18, 0.80, 0.44],
                [0.61, 0.35, 0.71],
                [0.90, 0.49, 0.13],
                [0.10, 0.74, 0.61],
                [0.93, 0.44, 0.68],
                [0.58, 0.65, 0.65],
                [0.36, 0.25, 0.20],
                [0.99, 0.99, 0.99],
            ],
        }
    }
}

impl SceneConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml(&contents)?;
        log::info!("Loaded scene config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.particle.validate()?;

        let agents = &self.agents;
        for (name, p) in [
            ("spawn_chance", agents.spawn_chance),
            ("despawn_chance", agents.despawn_chance),
            ("toggle_chance", agents.toggle_chance),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!("{name} must be in [0, 1], got {p}")));
            }
        }
        if agents.capacity > self.palette.len() {
            return Err(ConfigError::Invalid(format!(
                "agent capacity {} exceeds palette size {}",
                agents.capacity,
                self.palette.len()
            )));
        }
        if agents.speed_step <= 0.0 || agents.collision_radius <= 0.0 || self.player.step <= 0.0 {
            return Err(ConfigError::Invalid(
                "speed_step, collision_radius and player.step must be positive".into(),
            ));
        }
        let (min, max) = (agents.spawn_min(), agents.spawn_max());
        if min.x >= max.x || min.y >= max.y {
            return Err(ConfigError::Invalid(format!(
                "spawn rectangle is empty: {min} .. {max}"
            )));
        }
        Ok(())
    }

    pub fn palette_color(&self, slot: usize) -> Vec3 {
        self.palette.get(slot).map(|c| Vec3::from(*c)).unwrap_or(Vec3::ONE)
    }
}
