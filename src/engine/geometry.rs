// Static box geometry leaf: floor, walls, pillars and agent bodies.

use glam::{Mat4, Quat, Vec3};

use super::node::{DrawItem, DrawList, MaterialId, NodeId, Shape};

/// A solid box drawn with a fixed model matrix. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Geometry {
    id: NodeId,
    material: MaterialId,
    color: Vec3,
    model: Mat4,
}

impl Geometry {
    /// Box with explicit size, orientation and centre.
    pub fn placed(material: MaterialId, color: Vec3, extents: Vec3, rotation: Quat, center: Vec3) -> Self {
        Self {
            id: NodeId::next(),
            material,
            color,
            model: Mat4::from_scale_rotation_translation(extents, rotation, center),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn draw<'a>(&'a self, parent: Mat4, out: &mut DrawList<'a>) {
        out.push(DrawItem {
            material: self.material,
            transform: parent,
            model: self.model,
            color: self.color,
            point_size: 1.0,
            shape: Shape::Solid,
        });
    }
}
