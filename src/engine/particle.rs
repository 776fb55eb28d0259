// Particle effect leaf used as the spawn/despawn flare of an agent.
//
// Lifecycle (ages in update ticks, see `ParticleTiming`):
//
//   Growing   [0, grow_end)                 visible, spins +, scales up
//   Steady    age frozen at grow_end         hidden
//   Shrinking (shrink_start, shrink_end)     visible, spins -, scales down
//   Expired   age == shrink_end              hidden
//
// Only `reset_counter()` moves a particle out of Steady.

use glam::{Mat4, Vec3};
use rand::Rng;

use super::config::ParticleTiming;
use super::node::{DrawItem, DrawList, MaterialId, NodeId, Shape};

/// Spin applied per tick while animating.
const SPIN_DEGREES: f32 = 5.0;
const GROW_FACTOR: f32 = 1.005;
const SHRINK_FACTOR: f32 = 0.995;
/// Point size increment per animated tick (both directions).
const POINT_SIZE_STEP: f32 = 0.01;
/// Color the particle flares to when reset.
const FLARE_COLOR: Vec3 = Vec3::new(1.0, 0.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticlePhase {
    /// `tick` updates into growth; age == tick.
    Growing { tick: u32 },
    Steady,
    /// age == shrink_start + tick.
    Shrinking { tick: u32 },
    Expired,
}

#[derive(Debug, Clone)]
pub struct Particle {
    id: NodeId,
    material: MaterialId,
    color: Vec3,
    point_size: f32,
    model: Mat4,
    points: Vec<Vec3>,
    timing: ParticleTiming,
    phase: ParticlePhase,
}

impl Particle {
    /// Build a cloud of `count` points in the half-cube x,z in [-1, 1], y in [0, 1].
    pub fn new(
        material: MaterialId,
        color: Vec3,
        count: usize,
        point_size: f32,
        timing: ParticleTiming,
        rng: &mut impl Rng,
    ) -> Self {
        let points = (0..count)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-1.0..=1.0),
                    rng.gen_range(0.0..=1.0),
                    rng.gen_range(-1.0..=1.0),
                )
            })
            .collect();

        let phase = if timing.grow_end == 0 {
            ParticlePhase::Steady
        } else {
            ParticlePhase::Growing { tick: 0 }
        };

        Self {
            id: NodeId::next(),
            material,
            color,
            point_size,
            model: Mat4::IDENTITY,
            points,
            timing,
            phase,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_visible(&self) -> bool {
        matches!(
            self.phase,
            ParticlePhase::Growing { .. } | ParticlePhase::Shrinking { .. }
        )
    }

    pub fn draw<'a>(&'a self, parent: Mat4, out: &mut DrawList<'a>) {
        if !self.is_visible() {
            return;
        }
        out.push(DrawItem {
            material: self.material,
            transform: parent,
            model: self.model,
            color: self.color,
            point_size: self.point_size,
            shape: Shape::Points(&self.points),
        });
    }

    pub fn update(&mut self) {
        match self.phase {
            ParticlePhase::Growing { tick } => {
                self.animate(SPIN_DEGREES, GROW_FACTOR);
                let tick = tick + 1;
                self.phase = if tick >= self.timing.grow_end {
                    ParticlePhase::Steady
                } else {
                    ParticlePhase::Growing { tick }
                };
            }
            ParticlePhase::Shrinking { tick } => {
                self.animate(-SPIN_DEGREES, SHRINK_FACTOR);
                let tick = tick + 1;
                self.phase = if self.timing.shrink_start + tick >= self.timing.shrink_end {
                    ParticlePhase::Expired
                } else {
                    ParticlePhase::Shrinking { tick }
                };
            }
            ParticlePhase::Steady | ParticlePhase::Expired => {}
        }
    }

    /// Flare red and jump into the shrink window. Used as the despawn trigger.
    pub fn reset_counter(&mut self) {
        self.color = FLARE_COLOR;
        self.phase = ParticlePhase::Shrinking {
            tick: self.timing.reset_age.saturating_sub(self.timing.shrink_start),
        };
    }

    fn spin(&mut self, degrees: f32) {
        self.model *= Mat4::from_rotation_y(degrees.to_radians());
    }

    fn animate(&mut self, spin_degrees: f32, scale: f32) {
        self.spin(spin_degrees);
        self.model = Mat4::from_scale(Vec3::splat(scale)) * self.model;
        self.point_size += POINT_SIZE_STEP;
    }
}

#[cfg(test)]
impl Particle {
    pub fn phase(&self) -> ParticlePhase {
        self.phase
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn point_size(&self) -> f32 {
        self.point_size
    }

    pub fn model(&self) -> Mat4 {
        self.model
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// The flat age counter this phase corresponds to.
    pub fn age(&self) -> u32 {
        match self.phase {
            ParticlePhase::Growing { tick } => tick,
            ParticlePhase::Steady => self.timing.grow_end,
            ParticlePhase::Shrinking { tick } => self.timing.shrink_start + tick,
            ParticlePhase::Expired => self.timing.shrink_end,
        }
    }

    /// Ticks a freshly reset particle stays visible.
    pub fn flare_ticks(&self) -> u32 {
        self.timing.shrink_end - self.timing.reset_age
    }
}
