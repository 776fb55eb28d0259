// Agent bookkeeping: one record per live agent, keyed by a generational
// slot-map key, plus the palette in-use table. Records hold non-owning
// handles into the scene graph; the tree owns the nodes.

use rand::Rng;
use rand::seq::SliceRandom;
use slotmap::{SlotMap, new_key_type};

use super::node::NodeId;

new_key_type! {
    /// Stable agent handle. Stale keys fail to resolve instead of aliasing.
    pub struct AgentKey;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agent {
    /// Translated by `advance` each tick.
    pub move_node: NodeId,
    /// Rotated by `face` each tick.
    pub face_node: NodeId,
    /// Spawn/despawn flare.
    pub particle: NodeId,
    /// Current heading in radians.
    pub heading: f32,
    pub color_slot: usize,
}

// ============================================================================
// PALETTE
// ============================================================================

/// Tracks which palette slots are held by live agents.
#[derive(Debug, Clone)]
pub struct Palette {
    in_use: Vec<bool>,
}

impl Palette {
    pub fn new(size: usize) -> Self {
        Self { in_use: vec![false; size] }
    }

    /// Mark `slot` taken. False if out of range or already taken.
    pub fn claim(&mut self, slot: usize) -> bool {
        match self.in_use.get_mut(slot) {
            Some(used) if !*used => {
                *used = true;
                true
            }
            _ => false,
        }
    }

    /// Mark `slot` free. False if it was not taken.
    pub fn release(&mut self, slot: usize) -> bool {
        match self.in_use.get_mut(slot) {
            Some(used) if *used => {
                *used = false;
                true
            }
            _ => false,
        }
    }

    /// Draw slots uniformly until an unused one comes up, at most
    /// `attempts` times.
    pub fn sample_free(&self, rng: &mut impl Rng, attempts: u32) -> Option<usize> {
        if self.in_use.is_empty() {
            return None;
        }
        (0..attempts)
            .map(|_| rng.gen_range(0..self.in_use.len()))
            .find(|slot| !self.in_use[*slot])
    }
}

#[cfg(test)]
impl Palette {
    pub fn is_in_use(&self, slot: usize) -> bool {
        self.in_use.get(slot).copied().unwrap_or(false)
    }

    pub fn free_count(&self) -> usize {
        self.in_use.iter().filter(|used| !**used).count()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug)]
pub struct AgentRegistry {
    agents: SlotMap<AgentKey, Agent>,
    /// Keys in insertion order.
    order: Vec<AgentKey>,
    palette: Palette,
    capacity: usize,
}

impl AgentRegistry {
    pub fn new(capacity: usize, palette_size: usize) -> Self {
        Self {
            agents: SlotMap::with_key(),
            order: Vec::new(),
            palette: Palette::new(palette_size),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Register an agent and claim its color slot. `None` when at capacity
    /// or when the slot is already held.
    pub fn insert(&mut self, agent: Agent) -> Option<AgentKey> {
        if self.is_full() || !self.palette.claim(agent.color_slot) {
            return None;
        }
        let key = self.agents.insert(agent);
        self.order.push(key);
        Some(key)
    }

    /// Unregister an agent and free its color slot.
    pub fn remove(&mut self, key: AgentKey) -> Option<Agent> {
        let agent = self.agents.remove(key)?;
        self.order.retain(|k| *k != key);
        self.palette.release(agent.color_slot);
        Some(agent)
    }

    pub fn get(&self, key: AgentKey) -> Option<&Agent> {
        self.agents.get(key)
    }

    pub fn get_mut(&mut self, key: AgentKey) -> Option<&mut Agent> {
        self.agents.get_mut(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> &[AgentKey] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentKey, &Agent)> {
        self.order.iter().map(|k| (*k, &self.agents[*k]))
    }

    /// Uniformly random live agent.
    pub fn choose(&self, rng: &mut impl Rng) -> Option<AgentKey> {
        self.order.choose(rng).copied()
    }
}

#[cfg(test)]
impl AgentRegistry {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: AgentKey) -> bool {
        self.agents.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn agent(slot: usize) -> Agent {
        Agent {
            move_node: NodeId::next(),
            face_node: NodeId::next(),
            particle: NodeId::next(),
            heading: 0.0,
            color_slot: slot,
        }
    }

    #[test]
    fn test_insert_claims_slot() {
        let mut reg = AgentRegistry::new(4, 4);
        let key = reg.insert(agent(2)).unwrap();
        assert!(reg.palette().is_in_use(2));
        assert_eq!(reg.get(key).unwrap().color_slot, 2);
        // Same slot again is refused.
        assert!(reg.insert(agent(2)).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut reg = AgentRegistry::new(2, 4);
        assert!(reg.insert(agent(0)).is_some());
        assert!(reg.insert(agent(1)).is_some());
        assert!(reg.is_full());
        assert!(reg.insert(agent(3)).is_none());
        assert!(!reg.palette().is_in_use(3));
    }

    #[test]
    fn test_remove_frees_exactly_its_slot() {
        let mut reg = AgentRegistry::new(4, 4);
        let a = reg.insert(agent(0)).unwrap();
        let b = reg.insert(agent(1)).unwrap();
        let c = reg.insert(agent(3)).unwrap();

        let removed = reg.remove(b).unwrap();
        assert_eq!(removed.color_slot, 1);
        assert_eq!(reg.keys(), &[a, c]);
        assert!(!reg.palette().is_in_use(1));
        assert!(reg.palette().is_in_use(0));
        assert!(reg.palette().is_in_use(3));

        // Stale key.
        assert!(reg.remove(b).is_none());
        assert!(reg.get(b).is_none());

        // Freed slot is usable again.
        assert!(reg.insert(agent(1)).is_some());
    }

    #[test]
    fn test_remove_from_empty_is_noop() {
        let mut reg = AgentRegistry::new(4, 4);
        let key = reg.insert(agent(0)).unwrap();
        reg.remove(key);
        assert!(reg.remove(key).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_choose() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut reg = AgentRegistry::new(4, 4);
        assert!(reg.choose(&mut rng).is_none());
        let key = reg.insert(agent(0)).unwrap();
        assert_eq!(reg.choose(&mut rng), Some(key));
    }

    #[test]
    fn test_sample_free_skips_taken_slots() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut palette = Palette::new(3);
        palette.claim(0);
        palette.claim(2);
        for _ in 0..20 {
            assert_eq!(palette.sample_free(&mut rng, 200), Some(1));
        }
        palette.claim(1);
        assert_eq!(palette.free_count(), 0);
        assert_eq!(palette.sample_free(&mut rng, 50), None);
    }

    #[test]
    fn test_palette_claim_release() {
        let mut palette = Palette::new(2);
        assert!(palette.claim(1));
        assert!(!palette.claim(1));
        assert!(!palette.claim(7));
        assert!(palette.release(1));
        assert!(!palette.release(1));
    }
}
