// Agent population churn: random toggles, spawns and despawns, rolled
// once per tick in that order before movement.
//
// Despawn is two-phase: the chosen agent's particle flares, and after
// `despawn_delay` ticks the agent's subtree is dropped from the lobby and
// its registry record (and color slot) released. Only one despawn is in
// flight at a time.

use std::f32::consts::PI;

use glam::{Vec2, Vec3};
use rand::Rng;

use super::collision;
use super::registry::{Agent, AgentKey};
use super::scene::{Scene, build_astronaut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DespawnState {
    Idle,
    /// `agent` is flaring and will be removed when `remaining` reaches zero.
    Pending { agent: AgentKey, remaining: u32 },
}

impl Scene {
    pub(super) fn run_lifecycle(&mut self) {
        let agents = &self.config.agents;
        let (toggle, spawn, despawn) = (agents.toggle_chance, agents.spawn_chance, agents.despawn_chance);

        if self.roll(toggle) {
            self.toggle_random_agent();
        }
        if self.roll(spawn) && !self.registry.is_full() {
            self.try_spawn();
        }
        let despawn_rolled = self.roll(despawn);
        self.step_despawn(despawn_rolled);
    }

    fn roll(&mut self, chance: f64) -> bool {
        self.rng.gen_bool(chance.clamp(0.0, 1.0))
    }

    // ------------------------------------------------------------------------
    // Toggle
    // ------------------------------------------------------------------------

    /// Start or stop one uniformly chosen agent. `None` if there are no agents.
    pub fn toggle_random_agent(&mut self) -> Option<AgentKey> {
        let key = self.registry.choose(&mut self.rng)?;
        self.toggle_agent(key).then_some(key)
    }

    pub fn toggle_agent(&mut self, key: AgentKey) -> bool {
        let Some(agent) = self.registry.get(key) else {
            return false;
        };
        match self.world.find_transform_mut(agent.move_node) {
            Some(node) => {
                node.toggle_move();
                log::debug!("agent {:?} toggled, speed now {}", key, node.speed());
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Spawn
    // ------------------------------------------------------------------------

    /// Place a new agent at a free spot with an unused color. `None` when at
    /// capacity or when the retry budget runs out; a later tick tries again.
    pub fn try_spawn(&mut self) -> Option<AgentKey> {
        if self.registry.is_full() {
            return None;
        }
        let budget = self.config.agents.retry_budget;

        let Some(position) = self.sample_spawn_position() else {
            log::warn!("no clear spawn position after {} attempts", budget);
            return None;
        };
        let Some(slot) = self.registry.palette().sample_free(&mut self.rng, budget) else {
            log::warn!("no free color slot after {} attempts", budget);
            return None;
        };
        let heading = self.rng.gen_range(-PI..PI);

        let color = self.config.palette_color(slot);
        let step = self.config.agents.speed_step;
        let astronaut = build_astronaut(&self.config, position, color, step, &mut self.rng);
        let mut root = astronaut.root;
        root.set_moving(true);
        let move_node = root.id();
        if let Some(face) = root.find_transform_mut(astronaut.face_node) {
            face.face(heading);
        }

        let key = self.registry.insert(Agent {
            move_node,
            face_node: astronaut.face_node,
            particle: astronaut.particle,
            heading,
            color_slot: slot,
        })?;

        match self.world.find_transform_mut(self.lobby_node) {
            Some(lobby) => {
                lobby.add_child(root);
            }
            None => {
                log::warn!("lobby node missing, dropping spawned agent");
                self.registry.remove(key);
                return None;
            }
        }

        log::debug!(
            "spawned agent {:?} at ({:.1}, {:.1}) slot {} ({} live)",
            key,
            position.x,
            position.y,
            slot,
            self.registry.len()
        );
        Some(key)
    }

    /// Rejection-sample the spawn rectangle for a point clear of obstacles,
    /// agents and the player.
    fn sample_spawn_position(&mut self) -> Option<Vec2> {
        let agents = &self.config.agents;
        let (min, max) = (agents.spawn_min(), agents.spawn_max());
        let radius = agents.collision_radius;
        let budget = agents.retry_budget;

        let mut occupied: Vec<Vec3> = self.agent_positions().into_iter().map(|(_, p)| p).collect();
        occupied.push(self.player_location());

        for _ in 0..budget {
            let candidate = Vec2::new(
                self.rng.gen_range(min.x..=max.x),
                self.rng.gen_range(min.y..=max.y),
            );
            let pos = Vec3::new(candidate.x, 0.0, candidate.y);
            if !self.lobby.blocks(pos) && collision::is_spawn_clear(pos, occupied.iter().copied(), radius) {
                return Some(candidate);
            }
        }
        None
    }

    // ------------------------------------------------------------------------
    // Despawn
    // ------------------------------------------------------------------------

    /// Count down a pending despawn, or start one if `rolled`.
    fn step_despawn(&mut self, rolled: bool) {
        match self.despawn {
            DespawnState::Pending { agent, remaining } => {
                if remaining <= 1 {
                    self.despawn = DespawnState::Idle;
                    self.remove_agent(agent);
                } else {
                    self.despawn = DespawnState::Pending { agent, remaining: remaining - 1 };
                }
            }
            DespawnState::Idle => {
                if rolled {
                    if let Some(key) = self.registry.choose(&mut self.rng) {
                        self.begin_despawn(key);
                    }
                }
            }
        }
    }

    /// Flare `key`'s particle and schedule its removal. Ignored while another
    /// despawn is pending or if `key` is not live.
    pub fn begin_despawn(&mut self, key: AgentKey) -> bool {
        if self.despawn != DespawnState::Idle {
            return false;
        }
        let Some(agent) = self.registry.get(key).copied() else {
            return false;
        };
        if let Some(particle) = self.world.find_particle_mut(agent.particle) {
            particle.reset_counter();
        }

        let delay = self.config.agents.despawn_delay;
        if delay == 0 {
            return self.remove_agent(key);
        }
        self.despawn = DespawnState::Pending { agent: key, remaining: delay };
        log::debug!("agent {:?} despawning in {} ticks", key, delay);
        true
    }

    /// Drop the agent's subtree from the tree, then its registry record.
    pub fn remove_agent(&mut self, key: AgentKey) -> bool {
        let Some(agent) = self.registry.get(key).copied() else {
            return false;
        };
        if !self.world.remove_descendant(agent.move_node) {
            log::warn!("agent {:?} move node already gone from the tree", key);
        }
        self.registry.remove(key);
        if matches!(self.despawn, DespawnState::Pending { agent, .. } if agent == key) {
            self.despawn = DespawnState::Idle;
        }
        log::debug!("removed agent {:?} ({} live)", key, self.registry.len());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::collision::Lobby;
    use crate::engine::config::SceneConfig;
    use crate::engine::input::MoveIntent;
    use crate::engine::particle::ParticlePhase;
    use glam::Mat4;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn quiet_config() -> SceneConfig {
        let mut config = SceneConfig::default();
        config.agents.spawn_chance = 0.0;
        config.agents.despawn_chance = 0.0;
        config.agents.toggle_chance = 0.0;
        config
    }

    fn scene_with(config: SceneConfig, lobby: Lobby, seed: u64) -> Scene {
        Scene::with_lobby(config, lobby, StdRng::seed_from_u64(seed)).unwrap()
    }

    fn particle_phase(scene: &mut Scene, key: AgentKey) -> ParticlePhase {
        let id = scene.registry().get(key).unwrap().particle;
        scene.world.find_particle_mut(id).unwrap().phase()
    }

    #[test]
    fn test_spawn_on_open_floor() {
        let mut scene = scene_with(quiet_config(), Lobby::default(), 1);
        let key = scene.try_spawn().unwrap();
        assert_eq!(scene.registry().len(), 1);
        let agent = *scene.registry().get(key).unwrap();
        assert!(scene.registry().palette().is_in_use(agent.color_slot));
        assert!(scene.world.find_transform(agent.move_node).is_some());
        assert!(scene.world.find_transform(agent.face_node).is_some());
        assert_eq!(scene.agent_is_moving(key), Some(true));
    }

    #[test]
    fn test_second_spawn_takes_distinct_slot() {
        let mut config = quiet_config();
        config.palette.truncate(2);
        config.agents.capacity = 2;
        config.agents.retry_budget = 1000;
        let mut scene = scene_with(config, Lobby::default(), 2);
        let a = scene.try_spawn().unwrap();
        let b = scene.try_spawn().unwrap();
        let slot_a = scene.registry().get(a).unwrap().color_slot;
        let slot_b = scene.registry().get(b).unwrap().color_slot;
        assert_ne!(slot_a, slot_b);
        // Full now.
        assert!(scene.try_spawn().is_none());
    }

    #[test]
    fn test_spawned_positions_are_collision_free() {
        let mut config = quiet_config();
        config.agents.retry_budget = 500;
        let mut scene = scene_with(config, Lobby::standard(), 3);
        let radius = scene.config().agents.collision_radius;
        for _ in 0..scene.registry().capacity() {
            let Some(key) = scene.try_spawn() else {
                continue;
            };
            let pos = scene.agent_location(key).unwrap();
            assert!(!scene.lobby().blocks(pos));
            let others: Vec<Vec3> = scene
                .agent_positions()
                .into_iter()
                .filter(|(k, _)| *k != key)
                .map(|(_, p)| p)
                .chain(std::iter::once(scene.player_location()))
                .collect();
            assert!(collision::is_spawn_clear(pos, others, radius));
        }
        assert!(scene.registry().len() > 0);
    }

    #[test]
    fn test_spawn_gives_up_when_no_room() {
        let mut config = quiet_config();
        config.agents.spawn_min = [100.0, 100.0];
        config.agents.spawn_max = [101.0, 101.0];
        config.agents.retry_budget = 10;
        // Everything beyond x = 50 is behind this wall.
        let lobby = Lobby::new(vec![collision::Obstacle::Wall {
            normal: Vec2::new(-1.0, 0.0),
            offset: -50.0,
            radius: 1.0,
        }]);
        let mut scene = scene_with(config, lobby, 4);
        assert!(scene.try_spawn().is_none());
        assert!(scene.registry().is_empty());
        assert_eq!(scene.registry().palette().free_count(), scene.config().palette.len());
    }

    #[test]
    fn test_despawn_flares_then_removes() {
        let mut config = quiet_config();
        config.agents.despawn_delay = 5;
        let mut scene = scene_with(config, Lobby::default(), 5);
        let a = scene.try_spawn().unwrap();
        let b = scene.try_spawn().unwrap();
        let c = scene.try_spawn().unwrap();
        let doomed = *scene.registry().get(b).unwrap();

        assert!(scene.begin_despawn(b));
        assert!(matches!(particle_phase(&mut scene, b), ParticlePhase::Shrinking { .. }));
        // A second trigger is ignored while one is pending.
        assert!(!scene.begin_despawn(c));

        for _ in 0..4 {
            scene.tick(MoveIntent::default());
            assert!(scene.registry().contains(b));
        }
        scene.tick(MoveIntent::default());

        assert!(!scene.registry().contains(b));
        assert_eq!(scene.registry().keys(), &[a, c]);
        assert_eq!(scene.despawn_state(), DespawnState::Idle);
        assert!(!scene.registry().palette().is_in_use(doomed.color_slot));
        assert!(scene.world.find_transform(doomed.move_node).is_none());
        assert!(scene.world.find_transform(doomed.face_node).is_none());
    }

    #[test]
    fn test_freed_slot_is_reusable() {
        let mut config = quiet_config();
        config.palette.truncate(1);
        config.agents.capacity = 1;
        config.agents.despawn_delay = 0;
        let mut scene = scene_with(config, Lobby::default(), 6);
        let a = scene.try_spawn().unwrap();
        assert!(scene.try_spawn().is_none());
        assert!(scene.begin_despawn(a));
        assert!(scene.registry().is_empty());
        let b = scene.try_spawn().unwrap();
        assert_eq!(scene.registry().get(b).unwrap().color_slot, 0);
    }

    #[test]
    fn test_structural_noops_on_empty_registry() {
        let mut scene = scene_with(quiet_config(), Lobby::default(), 7);
        assert!(scene.toggle_random_agent().is_none());
        scene.step_despawn(true);
        assert_eq!(scene.despawn_state(), DespawnState::Idle);
        let key = scene.try_spawn().unwrap();
        assert!(scene.remove_agent(key));
        assert!(!scene.remove_agent(key));
        assert!(!scene.toggle_agent(key));
        assert!(!scene.begin_despawn(key));
    }

    #[test]
    fn test_toggle_stops_and_restarts() {
        let mut scene = scene_with(quiet_config(), Lobby::default(), 8);
        let key = scene.try_spawn().unwrap();
        let before = scene.agent_location(key).unwrap();
        assert!(scene.toggle_agent(key));
        assert_eq!(scene.agent_is_moving(key), Some(false));
        scene.tick(MoveIntent::default());
        assert_eq!(scene.agent_location(key).unwrap(), before);
        assert!(scene.toggle_agent(key));
        scene.tick(MoveIntent::default());
        assert_ne!(scene.agent_location(key).unwrap(), before);
    }

    #[test]
    fn test_random_events_fire_with_certain_chance() {
        let mut config = quiet_config();
        config.agents.spawn_chance = 1.0;
        config.agents.capacity = 3;
        let mut scene = scene_with(config, Lobby::standard(), 9);
        for _ in 0..50 {
            scene.tick(MoveIntent::default());
        }
        assert_eq!(scene.registry().len(), 3);

        scene.config.agents.despawn_chance = 1.0;
        scene.config.agents.spawn_chance = 0.0;
        scene.config.agents.despawn_delay = 2;
        scene.tick(MoveIntent::default());
        assert!(matches!(scene.despawn_state(), DespawnState::Pending { remaining: 2, .. }));
        scene.tick(MoveIntent::default());
        scene.tick(MoveIntent::default());
        assert_eq!(scene.registry().len(), 2);
    }

    #[test]
    fn test_agents_stay_inside_lobby() {
        let mut config = quiet_config();
        config.agents.speed_step = 0.3;
        let mut scene = scene_with(config, Lobby::standard(), 10);
        for _ in 0..4 {
            scene.try_spawn();
        }
        for _ in 0..2000 {
            scene.tick(MoveIntent::default());
        }
        for (_, pos) in scene.agent_positions() {
            assert!(pos.x.abs() < collision::LOBBY_HALF);
            assert!(pos.z.abs() < collision::LOBBY_HALF);
            assert!(pos.is_finite());
        }
        // Tree still renders every live agent's body.
        let list = scene.draw(Mat4::IDENTITY);
        assert!(list.len() >= 13 + 2 * (scene.registry().len() + 1));
    }
}
