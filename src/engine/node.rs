// Scene graph node kinds and the per-frame draw list.
//
// The node set is closed: a node is either a transform composite or a
// drawable leaf. Drawing never touches the GPU here; leaves append
// `DrawItem`s which the renderer turns into instances afterwards.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec3};

use super::geometry::Geometry;
use super::particle::Particle;
use super::transform::TransformNode;

// ============================================================================
// IDS AND MATERIALS
// ============================================================================

/// Stable handle to a node. Non-owning; resolve it through the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shading mode a leaf is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// Unlit, color only.
    pub const FLAT: Self = Self(0);
    /// Lambert diffuse plus ambient.
    pub const PHONG: Self = Self(1);
    /// Quantized diffuse bands.
    pub const TOON: Self = Self(2);
}

// ============================================================================
// DRAW LIST
// ============================================================================

/// What a draw item renders.
#[derive(Debug, Clone, Copy)]
pub enum Shape<'a> {
    /// A unit box, shaped by the item's model matrix.
    Solid,
    /// A point cloud in model space.
    Points(&'a [Vec3]),
}

/// One leaf's render request for the current frame.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    pub material: MaterialId,
    /// Accumulated transform of all ancestors.
    pub transform: Mat4,
    /// Leaf-local model matrix, applied after `transform`.
    pub model: Mat4,
    pub color: Vec3,
    pub point_size: f32,
    pub shape: Shape<'a>,
}

impl DrawItem<'_> {
    /// Full object-to-world matrix.
    pub fn world_matrix(&self) -> Mat4 {
        self.transform * self.model
    }
}

/// Frame-local list of draw requests, in traversal order.
#[derive(Debug, Default)]
pub struct DrawList<'a> {
    items: Vec<DrawItem<'a>>,
}

impl<'a> DrawList<'a> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: DrawItem<'a>) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[DrawItem<'a>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

// ============================================================================
// NODES
// ============================================================================

/// A leaf that issues a render request.
#[derive(Debug)]
pub enum Drawable {
    Particle(Particle),
    Geometry(Geometry),
}

impl Drawable {
    pub fn id(&self) -> NodeId {
        match self {
            Drawable::Particle(p) => p.id(),
            Drawable::Geometry(g) => g.id(),
        }
    }

    pub fn draw<'a>(&'a self, parent: Mat4, out: &mut DrawList<'a>) {
        match self {
            Drawable::Particle(p) => p.draw(parent, out),
            Drawable::Geometry(g) => g.draw(parent, out),
        }
    }

    pub fn update(&mut self) {
        match self {
            Drawable::Particle(p) => p.update(),
            // Static geometry has no per-tick state.
            Drawable::Geometry(_) => {}
        }
    }
}

/// Scene graph element.
#[derive(Debug)]
pub enum Node {
    Transform(TransformNode),
    Drawable(Drawable),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Transform(t) => t.id(),
            Node::Drawable(d) => d.id(),
        }
    }

    pub fn draw<'a>(&'a self, parent: Mat4, out: &mut DrawList<'a>) {
        match self {
            Node::Transform(t) => t.draw(parent, out),
            Node::Drawable(d) => d.draw(parent, out),
        }
    }

    pub fn update(&mut self) {
        match self {
            Node::Transform(t) => t.update(),
            Node::Drawable(d) => d.update(),
        }
    }

    pub fn as_transform(&self) -> Option<&TransformNode> {
        match self {
            Node::Transform(t) => Some(t),
            Node::Drawable(_) => None,
        }
    }

    pub fn as_transform_mut(&mut self) -> Option<&mut TransformNode> {
        match self {
            Node::Transform(t) => Some(t),
            Node::Drawable(_) => None,
        }
    }

    pub fn as_particle_mut(&mut self) -> Option<&mut Particle> {
        match self {
            Node::Drawable(Drawable::Particle(p)) => Some(p),
            _ => None,
        }
    }
}

impl From<TransformNode> for Node {
    fn from(node: TransformNode) -> Self {
        Node::Transform(node)
    }
}

impl From<Particle> for Node {
    fn from(particle: Particle) -> Self {
        Node::Drawable(Drawable::Particle(particle))
    }
}

impl From<Geometry> for Node {
    fn from(geometry: Geometry) -> Self {
        Node::Drawable(Drawable::Geometry(geometry))
    }
}
