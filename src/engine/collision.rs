// Planar collision and reflection for lobby agents.
//
// Everything works on the XZ plane: a heading `h` is the direction
// (sin h, cos h) in (x, z). A collision answers with a new heading, the
// old one reflected about the contact normal. Queries are brute force;
// the lobby has a dozen primitives and at most a handful of agents.

use glam::{Vec2, Vec3};

/// Normals shorter than this are treated as degenerate and skipped.
const DEGENERATE_EPSILON: f32 = 1e-6;
/// Headings whose approach `I·N` is above `-GRAZING_EPSILON` run along the
/// surface rather than into it. Axis-aligned headings carry ~1e-7 of noise.
const GRAZING_EPSILON: f32 = 1e-5;

// ============================================================================
// HEADINGS
// ============================================================================

/// Unit XZ direction for a heading.
#[inline]
pub fn heading_vector(heading: f32) -> Vec2 {
    Vec2::new(heading.sin(), heading.cos())
}

/// Heading of an XZ direction. Inverse of `heading_vector`.
#[inline]
pub fn heading_from_vector(v: Vec2) -> f32 {
    v.x.atan2(v.y)
}

/// Project a lobby-frame position onto the XZ plane.
#[inline]
pub fn planar(pos: Vec3) -> Vec2 {
    Vec2::new(pos.x, pos.z)
}

/// Specular reflection of `incident` about unit `normal`.
#[inline]
pub fn reflect(incident: Vec2, normal: Vec2) -> Vec2 {
    incident - 2.0 * incident.dot(normal) * normal
}

/// Reflect `heading` if it points into `normal`'s surface. Grazing
/// headings are left alone so lower-priority primitives get their turn.
fn deflect(heading: f32, normal: Vec2) -> Option<f32> {
    let incident = heading_vector(heading);
    if incident.dot(normal) >= -GRAZING_EPSILON {
        return None;
    }
    Some(heading_from_vector(reflect(incident, normal)))
}

/// Normalize, refusing near-zero vectors.
fn contact_normal(v: Vec2) -> Option<Vec2> {
    let len = v.length();
    (len > DEGENERATE_EPSILON).then(|| v / len)
}

// ============================================================================
// STATIC OBSTACLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Obstacle {
    /// Plane `normal · p = offset`. `normal` is unit length and points into
    /// the walkable side; positions past the plane still count as touching.
    Wall { normal: Vec2, offset: f32, radius: f32 },
    /// Circular column.
    Pillar { center: Vec2, radius: f32 },
    /// Thin wall between two points, collidable from both sides.
    Segment { a: Vec2, b: Vec2, radius: f32 },
}

impl Obstacle {
    /// `Some` if `p` is within collision range, carrying the contact normal
    /// at `p` (`None` when the normal is degenerate).
    fn contact(&self, p: Vec2) -> Option<Option<Vec2>> {
        match *self {
            Obstacle::Wall { normal, offset, radius } => {
                let distance = normal.dot(p) - offset;
                (distance < radius).then_some(Some(normal))
            }
            Obstacle::Pillar { center, radius } => {
                let away = p - center;
                (away.length() < radius).then(|| contact_normal(away))
            }
            Obstacle::Segment { a, b, radius } => {
                let away = p - closest_point_on_segment(p, a, b);
                (away.length() < radius).then(|| contact_normal(away))
            }
        }
    }

    /// True if `p` is inside this obstacle's collision range.
    pub fn overlaps(&self, p: Vec2) -> bool {
        self.contact(p).is_some()
    }

    /// Reflected heading if `p` is in range and `heading` points into the
    /// obstacle.
    pub fn deflect(&self, p: Vec2, heading: f32) -> Option<f32> {
        let normal = self.contact(p)??;
        deflect(heading, normal)
    }
}

fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= DEGENERATE_EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

// ============================================================================
// LOBBY LAYOUT
// ============================================================================

/// Half side length of the square lobby.
pub const LOBBY_HALF: f32 = 20.0;
/// Collision reach of walls and diagonal segments.
pub const WALL_RADIUS: f32 = 1.0;
/// Physical pillar radius; the collision radius adds `WALL_RADIUS` clearance.
pub const PILLAR_RADIUS: f32 = 1.5;

/// The fixed, ordered set of static obstacles. Order is priority: the first
/// deflecting obstacle wins.
#[derive(Debug, Clone, Default)]
pub struct Lobby {
    obstacles: Vec<Obstacle>,
}

impl Lobby {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self { obstacles }
    }

    /// Square room with four walls, four pillars and four diagonal corner
    /// walls, tested in that order.
    pub fn standard() -> Self {
        let h = LOBBY_HALF;
        let mut obstacles = vec![
            Obstacle::Wall { normal: Vec2::new(1.0, 0.0), offset: -h, radius: WALL_RADIUS },
            Obstacle::Wall { normal: Vec2::new(-1.0, 0.0), offset: -h, radius: WALL_RADIUS },
            Obstacle::Wall { normal: Vec2::new(0.0, 1.0), offset: -h, radius: WALL_RADIUS },
            Obstacle::Wall { normal: Vec2::new(0.0, -1.0), offset: -h, radius: WALL_RADIUS },
        ];
        for (x, z) in [(-8.0, -8.0), (8.0, -8.0), (-8.0, 8.0), (8.0, 8.0)] {
            obstacles.push(Obstacle::Pillar {
                center: Vec2::new(x, z),
                radius: PILLAR_RADIUS + WALL_RADIUS,
            });
        }
        let inset = 6.0;
        for (sx, sz) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
            obstacles.push(Obstacle::Segment {
                a: Vec2::new(sx * (h - inset), sz * h),
                b: Vec2::new(sx * h, sz * (h - inset)),
                radius: WALL_RADIUS,
            });
        }
        Self::new(obstacles)
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Static-obstacle query: reflected heading from the first obstacle in
    /// priority order that `pos` touches while heading into it.
    pub fn static_collision(&self, pos: Vec3, heading: f32) -> Option<f32> {
        let p = planar(pos);
        self.obstacles.iter().find_map(|o| o.deflect(p, heading))
    }

    /// True if `pos` is within range of any obstacle.
    pub fn blocks(&self, pos: Vec3) -> bool {
        let p = planar(pos);
        self.obstacles.iter().any(|o| o.overlaps(p))
    }
}

// ============================================================================
// AGENT VS AGENT
// ============================================================================

/// Agent-vs-agent query. `others` must already exclude the querying agent.
/// The first other agent within `radius` that `heading` points toward
/// reflects it about the direction from that agent to `pos`.
pub fn agent_collision(
    pos: Vec3,
    heading: f32,
    others: impl IntoIterator<Item = Vec3>,
    radius: f32,
) -> Option<f32> {
    let p = planar(pos);
    others.into_iter().find_map(|other| {
        let away = p - planar(other);
        if away.length() >= radius {
            return None;
        }
        deflect(heading, contact_normal(away)?)
    })
}

/// Spawn validity: no other agent within `radius` of `pos`.
pub fn is_spawn_clear(pos: Vec3, others: impl IntoIterator<Item = Vec3>, radius: f32) -> bool {
    let p = planar(pos);
    others
        .into_iter()
        .all(|other| (p - planar(other)).length() >= radius)
}

/// One steering step shared by the player and NPC agents: look at where
/// `step` along `heading` would land, and bounce off static geometry first,
/// then other agents.
pub fn steer(
    lobby: &Lobby,
    pos: Vec3,
    heading: f32,
    step: f32,
    others: impl IntoIterator<Item = Vec3>,
    radius: f32,
) -> f32 {
    let dir = heading_vector(heading) * step;
    let candidate = pos + Vec3::new(dir.x, 0.0, dir.y);
    lobby
        .static_collision(candidate, heading)
        .or_else(|| agent_collision(candidate, heading, others, radius))
        .unwrap_or(heading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn wall_east() -> Obstacle {
        // Plane x = 10, walkable side x < 10.
        Obstacle::Wall { normal: Vec2::new(-1.0, 0.0), offset: -10.0, radius: 1.0 }
    }

    #[test]
    fn test_heading_round_trip_convention() {
        assert!(heading_vector(0.0).abs_diff_eq(Vec2::new(0.0, 1.0), 1e-6));
        assert!(heading_vector(FRAC_PI_2).abs_diff_eq(Vec2::new(1.0, 0.0), 1e-6));
        assert_relative_eq!(heading_from_vector(Vec2::new(1.0, 0.0)), FRAC_PI_2);
    }

    #[test]
    fn test_reflection_law() {
        let n = Vec2::new(0.6, 0.8);
        let i = Vec2::new(-0.3, -0.9);
        let r = reflect(i, n);
        assert!(r.abs_diff_eq(i - 2.0 * i.dot(n) * n, 1e-6));
        assert_relative_eq!(r.length(), i.length(), epsilon = 1e-6);
        assert_relative_eq!(r.dot(n), -i.dot(n), epsilon = 1e-6);
    }

    #[test]
    fn test_wall_flips_normal_component() {
        let wall = wall_east();
        let pos = Vec2::new(9.5, 0.0);
        let heading = FRAC_PI_4; // towards +x, +z
        let out = wall.deflect(pos, heading).unwrap();
        let before = heading_vector(heading);
        let after = heading_vector(out);
        assert!(before.x > 0.0);
        assert_relative_eq!(after.x, -before.x, epsilon = 1e-6);
        assert_relative_eq!(after.y, before.y, epsilon = 1e-6);
    }

    #[test]
    fn test_wall_ignores_receding_heading_and_far_positions() {
        let wall = wall_east();
        assert!(wall.deflect(Vec2::new(9.5, 0.0), -FRAC_PI_2).is_none());
        assert!(wall.deflect(Vec2::new(5.0, 0.0), FRAC_PI_2).is_none());
        // Past the plane still collides.
        assert!(wall.overlaps(Vec2::new(12.0, 0.0)));
    }

    #[test]
    fn test_pillar_reflects_about_radial_normal() {
        let pillar = Obstacle::Pillar { center: Vec2::ZERO, radius: 2.0 };
        // Approaching head-on from +z, moving towards -z.
        let out = pillar.deflect(Vec2::new(0.0, 1.5), PI).unwrap();
        assert!(heading_vector(out).abs_diff_eq(Vec2::new(0.0, 1.0), 1e-5));
    }

    #[test]
    fn test_pillar_centre_is_degenerate_not_nan() {
        let pillar = Obstacle::Pillar { center: Vec2::ZERO, radius: 2.0 };
        assert!(pillar.deflect(Vec2::ZERO, 0.3).is_none());
        assert!(pillar.overlaps(Vec2::ZERO));
    }

    #[test]
    fn test_segment_contact() {
        let seg = Obstacle::Segment { a: Vec2::new(-5.0, 0.0), b: Vec2::new(5.0, 0.0), radius: 1.0 };
        let out = seg.deflect(Vec2::new(2.0, 0.5), PI).unwrap();
        assert!(heading_vector(out).y > 0.0);
        // Beyond the endpoint, distance is measured to the endpoint.
        assert!(!seg.overlaps(Vec2::new(6.5, 0.0)));
        assert!(seg.overlaps(Vec2::new(5.5, 0.0)));
    }

    #[test]
    fn test_first_obstacle_wins() {
        let lobby = Lobby::new(vec![
            wall_east(),
            Obstacle::Wall { normal: Vec2::new(0.0, -1.0), offset: -10.0, radius: 1.0 },
        ]);
        // Corner: both walls in range, heading into both.
        let out = lobby.static_collision(Vec3::new(9.5, 0.0, 9.5), FRAC_PI_4).unwrap();
        let v = heading_vector(out);
        // Only the x component flipped.
        assert!(v.x < 0.0);
        assert!(v.y > 0.0);
    }

    #[test]
    fn test_grazing_heading_does_not_deflect() {
        let north = Obstacle::Wall { normal: Vec2::new(0.0, 1.0), offset: -20.0, radius: 1.0 };
        let pos = Vec2::new(13.6, -19.3);
        // Float noise puts heading_vector(PI/2) a hair into the wall.
        assert!(heading_vector(FRAC_PI_2).dot(Vec2::new(0.0, 1.0)) < 0.0);
        assert!(north.overlaps(pos));
        assert!(north.deflect(pos, FRAC_PI_2).is_none());
        assert!(north.deflect(Vec2::new(0.0, -19.3), -FRAC_PI_2).is_none());
    }

    #[test]
    fn test_sliding_along_wall_reaches_corner_segment() {
        let lobby = Lobby::standard();
        // In range of the north wall and the NE diagonal, moving +X.
        let out = lobby.static_collision(Vec3::new(13.6, 0.0, -19.3), FRAC_PI_2).unwrap();
        let v = heading_vector(out);
        assert_abs_diff_eq!(v.x, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(v.y, 1.0, epsilon = 1e-4);

        // Along the west wall towards the north wall.
        let out = lobby.static_collision(Vec3::new(-19.3, 0.0, -19.1), PI).unwrap();
        assert!(heading_vector(out).y > 0.0);
    }

    #[test]
    fn test_standard_lobby() {
        let lobby = Lobby::standard();
        assert_eq!(lobby.obstacles().len(), 12);
        assert!(!lobby.blocks(Vec3::ZERO));
        assert!(lobby.blocks(Vec3::new(8.0, 0.0, 8.0)));
        assert!(lobby.blocks(Vec3::new(19.5, 0.0, 0.0)));
        assert!(lobby.blocks(Vec3::new(17.0, 0.0, 17.0)));
        assert!(lobby.static_collision(Vec3::ZERO, 0.0).is_none());
    }

    #[test]
    fn test_agent_collision() {
        let others = [Vec3::new(0.0, 0.0, 1.0), Vec3::new(50.0, 0.0, 50.0)];
        // Moving straight at the neighbour.
        let out = agent_collision(Vec3::ZERO, 0.0, others, 2.0).unwrap();
        assert_abs_diff_eq!(heading_vector(out).y, -1.0, epsilon = 1e-5);
        // Moving away from it.
        assert!(agent_collision(Vec3::ZERO, PI, others, 2.0).is_none());
        // Out of range.
        assert!(agent_collision(Vec3::ZERO, 0.0, others, 0.5).is_none());
    }

    #[test]
    fn test_coincident_agents_skip() {
        let out = agent_collision(Vec3::ONE, 1.0, [Vec3::ONE], 2.0);
        assert!(out.is_none());
        assert!(!is_spawn_clear(Vec3::ONE, [Vec3::ONE], 2.0));
    }

    #[test]
    fn test_spawn_clear() {
        let others = [Vec3::new(3.0, 0.0, 0.0)];
        assert!(is_spawn_clear(Vec3::ZERO, others, 2.0));
        assert!(!is_spawn_clear(Vec3::new(1.5, 0.0, 0.0), others, 2.0));
        assert!(is_spawn_clear(Vec3::ZERO, [], 2.0));
    }

    #[test]
    fn test_steer_prefers_static_obstacles() {
        let lobby = Lobby::new(vec![wall_east()]);
        let neighbour = [Vec3::new(9.9, 0.0, 0.0)];
        let out = steer(&lobby, Vec3::new(9.0, 0.0, 0.0), FRAC_PI_2, 0.5, neighbour, 2.0);
        assert_relative_eq!(heading_vector(out).x, -1.0, epsilon = 1e-5);
        // Open floor keeps the heading.
        assert_relative_eq!(steer(&lobby, Vec3::ZERO, 0.4, 0.5, [], 2.0), 0.4);
    }
}
