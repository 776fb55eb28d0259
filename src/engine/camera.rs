// Orbit camera around the lobby centre.
//
// Camera model:
//   - Fixed look-at target (the lobby origin, slightly raised)
//   - Yaw orbits around +Y; Q/E turn it a degree per frame
//   - Fixed pitch (elevation angle)
//   - Mouse wheel zooms by adjusting distance along the look vector

use glam::{Mat4, Vec3};
use super::input::InputState;

pub struct OrbitCamera {
    pub target: Vec3,

    /// Distance from target along the look direction.
    /// Private: always clamped to [min_distance, max_distance] in update(). Use distance() to read.
    distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    /// Elevation angle in radians (0 = horizontal, PI/2 = straight down)
    pub pitch: f32,

    /// Horizontal rotation in radians (0 = eye on +Z looking toward -Z)
    pub yaw: f32,

    /// Vertical field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,

    /// Yaw change per frame while Q or E is held, in radians
    pub turn_speed: f32,

    /// Zoom change (in distance units) per scroll line
    pub zoom_speed: f32,
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self {
            target: Vec3::new(0.0, 1.0, 0.0),
            distance: 45.0,
            min_distance: 10.0,
            max_distance: 90.0,
            pitch: 40.0_f32.to_radians(),
            yaw: 0.0,
            fov: 60.0_f32.to_radians(),
            near: 1.0,
            far: 1000.0,
            turn_speed: 1.0_f32.to_radians(),
            zoom_speed: 3.0,
        }
    }

    /// Update camera from input. Call once per frame before rendering.
    pub fn update(&mut self, input: &InputState) {
        self.yaw += input.camera_turn() * self.turn_speed;

        // Zoom: scroll up (positive delta) zooms in (decreases distance)
        self.distance -= input.scroll_delta * self.zoom_speed;
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);
    }

    /// World-space position of the camera eye.
    pub fn camera_position(&self) -> Vec3 {
        self.target + self.eye_offset()
    }

    /// View matrix: looks from the camera eye toward the target.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.camera_position(), self.target, Vec3::Y)
    }

    /// Perspective projection matrix.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    pub fn distance(&self) -> f32 { self.distance }

    // Offset from target to camera eye based on pitch, yaw, and distance.
    fn eye_offset(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos() * self.distance,
            self.pitch.sin() * self.distance,
            self.yaw.cos() * self.pitch.cos() * self.distance,
        )
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::KeyCode;

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = OrbitCamera::new();
        let mut input = InputState::new();
        input.scroll_delta = 1000.0;
        camera.update(&input);
        assert_eq!(camera.distance(), camera.min_distance);
        input.scroll_delta = -1000.0;
        camera.update(&input);
        assert_eq!(camera.distance(), camera.max_distance);
    }

    #[test]
    fn test_turn_rotates_yaw() {
        let mut camera = OrbitCamera::new();
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyE, true);
        camera.update(&input);
        assert!((camera.yaw - 1.0_f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn test_default_eye_is_behind_and_above() {
        let camera = OrbitCamera::new();
        let eye = camera.camera_position();
        assert!(eye.y > camera.target.y);
        assert!(eye.z > 0.0);
        // Target projects to the centre of the screen.
        let clip = camera.view_projection(16.0 / 9.0).project_point3(camera.target);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
    }
}
