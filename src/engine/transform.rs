// Transform composite: owns its children and a local matrix, and composes
// that matrix into every child's draw. Agents drive their move and face
// nodes through `advance` / `face`.

use glam::{Mat4, Vec3};

use super::node::{DrawList, Node, NodeId};
use super::particle::Particle;

/// Step used by `toggle_move` unless overridden with `with_step`.
pub const DEFAULT_STEP: f32 = 0.05;

#[derive(Debug)]
pub struct TransformNode {
    id: NodeId,
    local: Mat4,
    /// Snapshot of `local` at construction. `face` is relative to this.
    facing_reference: Mat4,
    /// 0 when stopped, `step` when moving.
    speed: f32,
    step: f32,
    children: Vec<Node>,
}

impl TransformNode {
    pub fn new(local: Mat4) -> Self {
        Self {
            id: NodeId::next(),
            local,
            facing_reference: local,
            speed: 0.0,
            step: DEFAULT_STEP,
            children: Vec::new(),
        }
    }

    pub fn identity() -> Self {
        Self::new(Mat4::IDENTITY)
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(Mat4::from_translation(translation))
    }

    /// Set the distance moved per `advance` while moving.
    pub fn with_step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.add_child(child);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    // ------------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------------

    pub fn draw<'a>(&'a self, parent: Mat4, out: &mut DrawList<'a>) {
        let accumulated = parent * self.local;
        for child in &self.children {
            child.draw(accumulated, out);
        }
    }

    pub fn update(&mut self) {
        for child in &mut self.children {
            child.update();
        }
    }

    // ------------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------------

    /// Append a child and take ownership of it. Returns its handle.
    pub fn add_child(&mut self, child: impl Into<Node>) -> NodeId {
        let child = child.into();
        let id = child.id();
        self.children.push(child);
        id
    }

    /// Drop the direct child `id` and its subtree. False if `id` is not a
    /// direct child.
    pub fn remove_child(&mut self, id: NodeId) -> bool {
        match self.children.iter().position(|c| c.id() == id) {
            Some(index) => {
                self.children.remove(index);
                true
            }
            None => false,
        }
    }

    /// Like `remove_child`, but searches the whole subtree.
    pub fn remove_descendant(&mut self, id: NodeId) -> bool {
        if self.remove_child(id) {
            return true;
        }
        self.children
            .iter_mut()
            .filter_map(Node::as_transform_mut)
            .any(|t| t.remove_descendant(id))
    }

    pub fn find_transform(&self, id: NodeId) -> Option<&TransformNode> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter()
            .filter_map(Node::as_transform)
            .find_map(|t| t.find_transform(id))
    }

    pub fn find_transform_mut(&mut self, id: NodeId) -> Option<&mut TransformNode> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter_mut()
            .filter_map(Node::as_transform_mut)
            .find_map(|t| t.find_transform_mut(id))
    }

    pub fn find_particle_mut(&mut self, id: NodeId) -> Option<&mut Particle> {
        for child in &mut self.children {
            match child {
                Node::Transform(t) => {
                    if let Some(p) = t.find_particle_mut(id) {
                        return Some(p);
                    }
                }
                other => {
                    if other.id() == id {
                        return other.as_particle_mut();
                    }
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------------
    // Animation
    // ------------------------------------------------------------------------

    /// Translate by `speed` along heading `angle` (XZ plane). No-op when stopped.
    pub fn advance(&mut self, angle: f32) {
        if self.speed == 0.0 {
            return;
        }
        let offset = Vec3::new(angle.sin(), 0.0, angle.cos()) * self.speed;
        self.local = Mat4::from_translation(offset) * self.local;
    }

    /// Orient to `angle` about +Y, absolute with respect to the facing
    /// reference.
    pub fn face(&mut self, angle: f32) {
        self.local = Mat4::from_rotation_y(angle) * self.facing_reference;
    }

    pub fn toggle_move(&mut self) {
        self.speed = if self.speed == 0.0 { self.step } else { 0.0 };
    }

    pub fn set_moving(&mut self, moving: bool) {
        self.speed = if moving { self.step } else { 0.0 };
    }

    /// Origin of this node under its own local matrix. Ancestors are not
    /// applied; the result is in the parent's frame.
    pub fn location(&self) -> Vec3 {
        self.local.transform_point3(Vec3::ZERO)
    }
}

#[cfg(test)]
impl TransformNode {
    pub fn local(&self) -> Mat4 {
        self.local
    }

    pub fn is_moving(&self) -> bool {
        self.speed != 0.0
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Child handles in draw order.
    pub fn child_ids(&self) -> Vec<NodeId> {
        self.children.iter().map(Node::id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::ParticleTiming;
    use crate::engine::geometry::Geometry;
    use crate::engine::node::MaterialId;
    use approx::assert_relative_eq;
    use glam::Quat;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::f32::consts::FRAC_PI_2;

    fn leaf() -> Geometry {
        leaf_at(0.0)
    }

    fn leaf_at(x: f32) -> Geometry {
        Geometry::placed(MaterialId::PHONG, Vec3::ONE, Vec3::ONE, Quat::IDENTITY, Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_draw_order_matches_insertion_order() {
        let mut root = TransformNode::identity();
        for i in 0..5 {
            root.add_child(leaf_at(i as f32));
        }
        root.add_child(TransformNode::identity().with_child(leaf_at(5.0)));
        root.add_child(leaf_at(6.0));

        let mut list = DrawList::new();
        root.draw(Mat4::IDENTITY, &mut list);
        let drawn: Vec<f32> = list
            .items()
            .iter()
            .map(|i| i.world_matrix().transform_point3(Vec3::ZERO).x)
            .collect();
        assert_eq!(drawn, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_empty_node_draws_nothing() {
        let root = TransformNode::identity();
        let mut list = DrawList::new();
        root.draw(Mat4::IDENTITY, &mut list);
        assert!(list.items().is_empty());
    }

    #[test]
    fn test_draw_accumulates_transforms() {
        let inner = TransformNode::from_translation(Vec3::new(0.0, 2.0, 0.0)).with_child(leaf());
        let root = TransformNode::from_translation(Vec3::new(1.0, 0.0, 0.0)).with_child(inner);
        let mut list = DrawList::new();
        root.draw(Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0)), &mut list);
        let origin = list.items()[0].transform.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
    }

    #[test]
    fn test_remove_child() {
        let mut root = TransformNode::identity();
        let a = root.add_child(leaf());
        let b = root.add_child(leaf());
        assert!(root.remove_child(a));
        assert_eq!(root.child_ids(), vec![b]);
        // Stale handle is a no-op.
        assert!(!root.remove_child(a));
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn test_remove_descendant_drops_subtree() {
        let mut root = TransformNode::identity();
        let mid = TransformNode::identity().with_child(TransformNode::identity().with_child(leaf()));
        let mid_id = root.add_child(mid);
        let deep_id = root.find_transform(mid_id).unwrap().child_ids()[0];
        assert!(root.remove_descendant(deep_id));
        assert_eq!(root.find_transform(mid_id).unwrap().child_count(), 0);
        assert!(root.find_transform(deep_id).is_none());
        assert!(!root.remove_descendant(deep_id));
    }

    #[test]
    fn test_move_is_noop_while_stopped() {
        let mut node = TransformNode::from_translation(Vec3::new(1.0, 0.0, 1.0));
        let before = node.local();
        node.advance(0.3);
        assert_eq!(node.local(), before);
    }

    #[test]
    fn test_move_translates_along_heading() {
        let mut node = TransformNode::identity().with_step(0.5);
        node.toggle_move();
        node.advance(FRAC_PI_2);
        assert!(node.location().abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
        node.advance(0.0);
        assert!(node.location().abs_diff_eq(Vec3::new(0.5, 0.0, 0.5), 1e-6));
    }

    #[test]
    fn test_toggle_twice_restores_speed() {
        let mut node = TransformNode::identity();
        assert_eq!(node.speed(), 0.0);
        node.toggle_move();
        assert_eq!(node.speed(), DEFAULT_STEP);
        node.toggle_move();
        assert_eq!(node.speed(), 0.0);
    }

    #[test]
    fn test_face_is_absolute() {
        let mut node = TransformNode::from_translation(Vec3::new(2.0, 0.0, 0.0));
        node.toggle_move();
        node.face(0.7);
        let first = node.local();
        node.advance(1.0);
        node.face(0.2);
        node.advance(-2.0);
        node.face(0.7);
        assert_eq!(node.local(), first);
    }

    #[test]
    fn test_face_rotates_forward_onto_heading() {
        let mut node = TransformNode::identity();
        node.face(FRAC_PI_2);
        let forward = node.local().transform_vector3(Vec3::Z);
        assert!(forward.abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_location_ignores_ancestors() {
        let mut root = TransformNode::from_translation(Vec3::new(100.0, 0.0, 0.0));
        let id = root.add_child(TransformNode::from_translation(Vec3::new(1.0, 0.0, 2.0)));
        let loc = root.find_transform(id).unwrap().location();
        assert_relative_eq!(loc.x, 1.0);
        assert_relative_eq!(loc.z, 2.0);
    }

    #[test]
    fn test_update_reaches_nested_particles() {
        let mut rng = StdRng::seed_from_u64(3);
        let particle = Particle::new(MaterialId::FLAT, Vec3::ONE, 8, 1.0, ParticleTiming::default(), &mut rng);
        let pid = particle.id();
        let mut root = TransformNode::identity()
            .with_child(TransformNode::identity().with_child(TransformNode::identity().with_child(particle)));
        for _ in 0..3 {
            root.update();
        }
        assert_eq!(root.find_particle_mut(pid).unwrap().age(), 3);
    }
}
