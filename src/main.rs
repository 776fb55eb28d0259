// Astronaut lobby: a walled room where the player walks among randomly
// spawning astronauts that bounce off walls, pillars and each other.
// The whole scene is drawn as instanced cubes in a single draw call.
//
// Controls: WASD / arrows move, Q/E orbit the camera, wheel zooms,
// F3 stats panel, F4 collision rings, Escape quits.
//
// Config: first CLI argument or ASTRO_LOBBY_CONFIG points at a TOML file;
// built-in defaults otherwise.

mod engine;

use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, Vec3};
use winit::{
    event::{ElementState, Event as WinitEvent, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use engine::camera::OrbitCamera;
use engine::collision::heading_vector;
use engine::debug_overlay::{project_to_screen, AgentRingDraw, DebugOverlay, DebugStats};
use engine::input::InputState;
use engine::lifecycle::DespawnState;
use engine::renderer::{build_instances, Renderer};
use engine::{RenderError, Scene, SceneConfig};

const CONFIG_ENV: &str = "ASTRO_LOBBY_CONFIG";
const PLAYER_RING_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 255, 255);

// ============================================================================
// APP STATE
// ============================================================================

struct State {
    window: Arc<Window>,
    renderer: Renderer,
    overlay: DebugOverlay,
    scene: Scene,
    camera: OrbitCamera,
    input: InputState,

    // Frame timing (reset every second)
    last_frame: Instant,
    frame_times_ms: Vec<f32>,
    stats: FrameStats,
}

#[derive(Default)]
struct FrameStats {
    fps: u32,
    avg_ms: f32,
    min_ms: f32,
    max_ms: f32,
}

impl State {
    async fn new(window: Arc<Window>, scene: Scene) -> Result<Self, RenderError> {
        let renderer = Renderer::new(window.clone()).await?;
        let overlay = DebugOverlay::new(&window, &renderer.device, renderer.config.format);

        Ok(Self {
            window,
            renderer,
            overlay,
            scene,
            camera: OrbitCamera::new(),
            input: InputState::new(),
            last_frame: Instant::now(),
            frame_times_ms: Vec::with_capacity(240),
            stats: FrameStats::default(),
        })
    }

    fn update(&mut self) {
        self.camera.update(&self.input);
        self.scene.tick(self.input.move_intent());
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let aspect = self.renderer.aspect();
        let view_proj = self.camera.view_projection(aspect);

        let list = self.scene.draw(Mat4::IDENTITY);
        let instances = build_instances(&list);

        let stats = self.overlay.stats_visible.then(|| self.debug_stats(list.len(), instances.len()));
        let rings = self.overlay.rings_visible.then(|| self.agent_rings(view_proj));

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.renderer.config.width, self.renderer.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        let overlay = &mut self.overlay;
        let window = &self.window;
        let draw_overlay = overlay.is_active();
        self.renderer.render(&instances, view_proj, |device, queue, encoder, view| {
            if draw_overlay {
                overlay.render(
                    device,
                    queue,
                    encoder,
                    window,
                    view,
                    &screen_descriptor,
                    stats.as_ref(),
                    rings.as_deref(),
                );
            }
        })
    }

    fn debug_stats(&self, draw_items: usize, instance_count: usize) -> DebugStats {
        let player = self.scene.player_location();
        DebugStats {
            fps: self.stats.fps,
            frame_time_avg_ms: self.stats.avg_ms,
            frame_time_min_ms: self.stats.min_ms,
            frame_time_max_ms: self.stats.max_ms,
            ticks: self.scene.ticks(),
            agent_count: self.scene.registry().len(),
            agent_capacity: self.scene.registry().capacity(),
            despawn_remaining: match self.scene.despawn_state() {
                DespawnState::Pending { remaining, .. } => Some(remaining),
                DespawnState::Idle => None,
            },
            player_position: (player.x, player.z),
            player_heading_deg: self.scene.player().heading.to_degrees(),
            draw_items,
            instance_count,
            resolution: (self.renderer.config.width, self.renderer.config.height),
            camera_distance: self.camera.distance(),
        }
    }

    /// Collision rings for the player and every agent, in screen points.
    fn agent_rings(&self, view_proj: Mat4) -> Vec<AgentRingDraw> {
        let size = (self.renderer.config.width, self.renderer.config.height);
        let ppp = self.overlay.pixels_per_point();
        let radius = self.scene.config().agents.collision_radius;

        let player = (
            self.scene.player_location(),
            self.scene.player().heading,
            PLAYER_RING_COLOR,
        );
        let agents = self.scene.registry().iter().filter_map(|(key, agent)| {
            let pos = self.scene.agent_location(key)?;
            let c = self.scene.config().palette_color(agent.color_slot) * 255.0;
            Some((pos, agent.heading, egui::Color32::from_rgb(c.x as u8, c.y as u8, c.z as u8)))
        });

        std::iter::once(player)
            .chain(agents)
            .filter_map(|(pos, heading, color)| {
                let dir = heading_vector(heading);
                let centre = project_to_screen(view_proj, pos, size, ppp)?;
                let edge = project_to_screen(view_proj, pos + Vec3::new(radius, 0.0, 0.0), size, ppp)?;
                let tip = project_to_screen(view_proj, pos + Vec3::new(dir.x, 0.0, dir.y) * radius, size, ppp)?;
                Some(AgentRingDraw {
                    pos: centre,
                    heading_tip: tip,
                    radius_px: centre.distance(edge),
                    color,
                })
            })
            .collect()
    }

    /// Record one frame time; refresh the FPS figures once per second.
    fn record_frame(&mut self, window_start: &mut Instant) {
        let now = Instant::now();
        self.frame_times_ms.push((now - self.last_frame).as_secs_f32() * 1000.0);
        self.last_frame = now;

        if (now - *window_start).as_secs_f32() >= 1.0 {
            let n = self.frame_times_ms.len().max(1) as f32;
            self.stats = FrameStats {
                fps: self.frame_times_ms.len() as u32,
                avg_ms: self.frame_times_ms.iter().sum::<f32>() / n,
                min_ms: self.frame_times_ms.iter().copied().fold(f32::INFINITY, f32::min),
                max_ms: self.frame_times_ms.iter().copied().fold(0.0, f32::max),
            };
            log::info!(
                "FPS: {} | Agents: {}/{} | Instances: {} | Draw calls: 1",
                self.stats.fps,
                self.scene.registry().len(),
                self.scene.registry().capacity(),
                self.renderer.last_instance_count,
            );
            self.frame_times_ms.clear();
            *window_start = now;
        }
    }
}

fn load_config() -> Result<SceneConfig, engine::ConfigError> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok());
    match path {
        Some(path) => {
            log::info!("Loading config from {path}");
            SceneConfig::load(path)
        }
        None => Ok(SceneConfig::default()),
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let scene = Scene::new(load_config()?)?;

    let event_loop = EventLoop::new().map_err(RenderError::from)?;

    let window_attributes = Window::default_attributes()
        .with_title("Astro Lobby")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

    let window = Arc::new(
        event_loop
            .create_window(window_attributes)
            .map_err(RenderError::from)?,
    );

    let mut state = pollster::block_on(State::new(window.clone(), scene))?;
    let mut fps_window = Instant::now();

    event_loop
        .run(move |event, control_flow| match event {
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                let _ = state.overlay.handle_window_event(&window, event);
                state.input.process_event(event);

                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => control_flow.exit(),
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(key),
                                repeat: false,
                                ..
                            },
                        ..
                    } => match key {
                        KeyCode::F3 => state.overlay.stats_visible = !state.overlay.stats_visible,
                        KeyCode::F4 => state.overlay.rings_visible = !state.overlay.rings_visible,
                        _ => {}
                    },
                    WindowEvent::Resized(physical_size) => {
                        state.renderer.resize(*physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        state.update();
                        match state.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost) => {
                                let size = state.renderer.size;
                                state.renderer.resize(size);
                            }
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                log::error!("GPU out of memory, exiting");
                                control_flow.exit();
                            }
                            Err(e) => log::warn!("Surface error: {e:?}"),
                        }
                        state.input.end_frame();
                        state.record_frame(&mut fps_window);
                    }
                    _ => {}
                }
            }
            WinitEvent::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        })
        .map_err(RenderError::from)?;

    Ok(())
}
