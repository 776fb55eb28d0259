// Scene context: owns the whole node tree, the static lobby layout, the
// agent registry and the RNG. The frame driver calls `tick` once per
// frame and then `draw` with the root transform.
//
// Tree shape:
//
//   world
//   └── lobby
//       ├── floor / walls / pillars / diagonal walls   (Geometry)
//       ├── player move node ── face node ── body, visor, particle
//       └── agent move node  ── face node ── body, visor, particle   (× N)

use std::f32::consts::PI;

use glam::{Mat4, Quat, Vec2, Vec3};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::collision::{self, LOBBY_HALF, Lobby, Obstacle, PILLAR_RADIUS, WALL_RADIUS};
use super::config::SceneConfig;
use super::error::ConfigError;
use super::geometry::Geometry;
use super::input::MoveIntent;
use super::lifecycle::DespawnState;
use super::node::{DrawList, MaterialId, NodeId};
use super::particle::Particle;
use super::registry::{AgentKey, AgentRegistry};
use super::transform::TransformNode;

const WALL_HEIGHT: f32 = 3.0;
const WALL_THICKNESS: f32 = 0.5;
const PILLAR_HEIGHT: f32 = 4.0;
const FLOOR_COLOR: Vec3 = Vec3::new(0.25, 0.25, 0.3);
const WALL_COLOR: Vec3 = Vec3::new(0.55, 0.55, 0.6);
const PILLAR_COLOR: Vec3 = Vec3::new(0.75, 0.7, 0.55);
const VISOR_COLOR: Vec3 = Vec3::new(0.85, 0.9, 1.0);
const PLAYER_COLOR: Vec3 = Vec3::new(0.9, 0.9, 0.9);

/// The player-controlled astronaut. Not part of the registry.
#[derive(Debug, Clone, Copy)]
pub struct Player {
    pub move_node: NodeId,
    pub face_node: NodeId,
    pub heading: f32,
}

/// Handles produced when an astronaut subtree is built.
pub(super) struct AstronautNodes {
    pub root: TransformNode,
    pub face_node: NodeId,
    pub particle: NodeId,
}

pub struct Scene {
    pub(super) config: SceneConfig,
    pub(super) world: TransformNode,
    pub(super) lobby_node: NodeId,
    pub(super) lobby: Lobby,
    pub(super) registry: AgentRegistry,
    pub(super) player: Player,
    pub(super) despawn: DespawnState,
    pub(super) rng: StdRng,
    ticks: u64,
}

impl Scene {
    /// Standard lobby, RNG seeded from `config.seed` or the OS.
    pub fn new(config: SceneConfig) -> Result<Self, ConfigError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_lobby(config, Lobby::standard(), rng)
    }

    /// Build a scene around an arbitrary obstacle layout. Rejects configs
    /// that fail `SceneConfig::validate`.
    pub fn with_lobby(config: SceneConfig, lobby: Lobby, mut rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut lobby_root = TransformNode::identity();
        for geometry in lobby_geometry(&lobby) {
            lobby_root.add_child(geometry);
        }

        let start = Vec2::from(config.player.start);
        let astronaut = build_astronaut(&config, start, PLAYER_COLOR, config.player.step, &mut rng);
        let mut player_root = astronaut.root;
        player_root.set_moving(true);
        let player = Player {
            move_node: lobby_root.add_child(player_root),
            face_node: astronaut.face_node,
            heading: PI,
        };

        let lobby_node = lobby_root.id();
        let world = TransformNode::identity().with_child(lobby_root);
        let registry = AgentRegistry::new(config.agents.capacity, config.palette.len());

        log::info!(
            "Scene ready: {} obstacles, agent capacity {}",
            lobby.obstacles().len(),
            registry.capacity()
        );

        let mut scene = Self {
            config,
            world,
            lobby_node,
            lobby,
            registry,
            player,
            despawn: DespawnState::Idle,
            rng,
            ticks: 0,
        };
        scene.face_player(PI);
        Ok(scene)
    }

    // ------------------------------------------------------------------------
    // Frame entry points
    // ------------------------------------------------------------------------

    /// Advance one logical tick: lifecycle rolls, movement, then the tree update.
    pub fn tick(&mut self, intent: MoveIntent) {
        self.run_lifecycle();
        self.move_player(intent);
        self.move_agents();
        self.update();
        self.ticks += 1;
    }

    /// Advance all node animation state by one tick.
    pub fn update(&mut self) {
        self.world.update();
    }

    /// Collect this frame's draw requests under `root`.
    pub fn draw(&self, root: Mat4) -> DrawList<'_> {
        let mut list = DrawList::new();
        self.world.draw(root, &mut list);
        list
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn despawn_state(&self) -> DespawnState {
        self.despawn
    }

    /// Player position in lobby coordinates.
    pub fn player_location(&self) -> Vec3 {
        self.world
            .find_transform(self.player.move_node)
            .map(TransformNode::location)
            .unwrap_or(Vec3::ZERO)
    }

    /// Agent position in lobby coordinates.
    pub fn agent_location(&self, key: AgentKey) -> Option<Vec3> {
        let agent = self.registry.get(key)?;
        self.world
            .find_transform(agent.move_node)
            .map(TransformNode::location)
    }

    /// Positions of every live agent, in registry order.
    pub fn agent_positions(&self) -> Vec<(AgentKey, Vec3)> {
        self.registry
            .keys()
            .iter()
            .filter_map(|key| self.agent_location(*key).map(|pos| (*key, pos)))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------------

    fn move_player(&mut self, intent: MoveIntent) {
        let Some(wanted) = intent.heading() else {
            return;
        };
        let pos = self.player_location();
        let others: Vec<Vec3> = self.agent_positions().into_iter().map(|(_, p)| p).collect();
        let heading = collision::steer(
            &self.lobby,
            pos,
            wanted,
            self.config.player.step,
            others,
            self.config.agents.collision_radius,
        );

        if let Some(node) = self.world.find_transform_mut(self.player.move_node) {
            node.advance(heading);
        }
        self.face_player(heading);
        log::trace!("player heading {:.2} at {}", heading, self.player_location());
    }

    fn face_player(&mut self, heading: f32) {
        self.player.heading = heading;
        if let Some(face) = self.world.find_transform_mut(self.player.face_node) {
            face.face(heading);
        }
    }

    /// Steer and advance every agent. Positions are refreshed as agents
    /// move, so later agents see earlier agents' new locations.
    fn move_agents(&mut self) {
        let player_pos = self.player_location();
        let radius = self.config.agents.collision_radius;
        let mut positions = self.agent_positions();

        for i in 0..positions.len() {
            let (key, pos) = positions[i];
            let Some(agent) = self.registry.get(key).copied() else {
                continue;
            };
            let Some(speed) = self.world.find_transform(agent.move_node).map(TransformNode::speed) else {
                log::warn!("agent {:?} has no move node in the tree", key);
                continue;
            };

            let heading = if speed == 0.0 {
                agent.heading
            } else {
                let others = positions
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, (_, p))| *p)
                    .chain(std::iter::once(player_pos));
                collision::steer(&self.lobby, pos, agent.heading, speed, others, radius)
            };

            if let Some(node) = self.world.find_transform_mut(agent.move_node) {
                node.advance(heading);
                positions[i].1 = node.location();
            }
            if let Some(face) = self.world.find_transform_mut(agent.face_node) {
                face.face(heading);
            }
            if let Some(record) = self.registry.get_mut(key) {
                record.heading = heading;
            }
        }
    }
}

#[cfg(test)]
impl Scene {
    pub(super) fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub(super) fn agent_is_moving(&self, key: AgentKey) -> Option<bool> {
        let agent = self.registry.get(key)?;
        self.world
            .find_transform(agent.move_node)
            .map(TransformNode::is_moving)
    }
}

// ============================================================================
// SUBTREE BUILDERS
// ============================================================================

/// Move node at `position` carrying a face node with body, visor and flare.
pub(super) fn build_astronaut(
    config: &SceneConfig,
    position: Vec2,
    color: Vec3,
    step: f32,
    rng: &mut StdRng,
) -> AstronautNodes {
    let body = Geometry::placed(
        MaterialId::PHONG,
        color,
        Vec3::new(0.8, 1.6, 0.5),
        Quat::IDENTITY,
        Vec3::new(0.0, 0.8, 0.0),
    );
    // Visor sits on the +Z side so the facing direction is visible.
    let visor = Geometry::placed(
        MaterialId::FLAT,
        VISOR_COLOR,
        Vec3::new(0.5, 0.3, 0.1),
        Quat::IDENTITY,
        Vec3::new(0.0, 1.3, 0.3),
    );
    let particle = Particle::new(
        MaterialId::FLAT,
        color,
        config.particle_points,
        config.particle_point_size,
        config.particle,
        rng,
    );
    let particle_id = particle.id();

    let face = TransformNode::identity()
        .with_child(body)
        .with_child(visor)
        .with_child(particle);
    let face_node = face.id();

    let root = TransformNode::from_translation(Vec3::new(position.x, 0.0, position.y))
        .with_step(step)
        .with_child(face);

    AstronautNodes { root, face_node, particle: particle_id }
}

/// Renderable stand-ins for the lobby's collision primitives.
fn lobby_geometry(lobby: &Lobby) -> Vec<Geometry> {
    let span = LOBBY_HALF * 2.0;
    let mut out = vec![Geometry::placed(
        MaterialId::PHONG,
        FLOOR_COLOR,
        Vec3::new(span, 0.2, span),
        Quat::IDENTITY,
        Vec3::new(0.0, -0.1, 0.0),
    )];

    for obstacle in lobby.obstacles() {
        let geometry = match *obstacle {
            Obstacle::Wall { normal, offset, .. } => {
                let base = normal * offset - normal * (WALL_THICKNESS * 0.5);
                Geometry::placed(
                    MaterialId::PHONG,
                    WALL_COLOR,
                    Vec3::new(span, WALL_HEIGHT, WALL_THICKNESS),
                    Quat::from_rotation_y(collision::heading_from_vector(normal)),
                    Vec3::new(base.x, WALL_HEIGHT * 0.5, base.y),
                )
            }
            Obstacle::Pillar { center, .. } => Geometry::placed(
                MaterialId::TOON,
                PILLAR_COLOR,
                Vec3::new(PILLAR_RADIUS * 2.0, PILLAR_HEIGHT, PILLAR_RADIUS * 2.0),
                Quat::IDENTITY,
                Vec3::new(center.x, PILLAR_HEIGHT * 0.5, center.y),
            ),
            Obstacle::Segment { a, b, .. } => {
                let along = b - a;
                let mid = (a + b) * 0.5;
                Geometry::placed(
                    MaterialId::PHONG,
                    WALL_COLOR,
                    Vec3::new(along.length(), WALL_HEIGHT, WALL_RADIUS),
                    Quat::from_rotation_y((-along.y).atan2(along.x)),
                    Vec3::new(mid.x, WALL_HEIGHT * 0.5, mid.y),
                )
            }
        };
        out.push(geometry);
    }
    out
}
