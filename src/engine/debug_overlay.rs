use egui::epaint::Shadow;
use glam::{Mat4, Vec3};

pub struct DebugStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub frame_time_min_ms: f32,
    pub frame_time_max_ms: f32,
    pub ticks: u64,
    pub agent_count: usize,
    pub agent_capacity: usize,
    /// Ticks left before the flaring agent is removed, if one is.
    pub despawn_remaining: Option<u32>,
    pub player_position: (f32, f32),
    pub player_heading_deg: f32,
    pub draw_items: usize,
    pub instance_count: usize,
    pub resolution: (u32, u32),
    pub camera_distance: f32,
}

/// One astronaut's collision ring, already projected to egui screen points.
pub struct AgentRingDraw {
    pub pos: egui::Pos2,
    /// Tip of the heading line in screen points.
    pub heading_tip: egui::Pos2,
    pub radius_px: f32,
    pub color: egui::Color32,
}

/// Project a world point to egui screen points. None when the point is
/// behind the camera.
pub fn project_to_screen(
    view_proj: Mat4,
    world: Vec3,
    size_px: (u32, u32),
    pixels_per_point: f32,
) -> Option<egui::Pos2> {
    let clip = view_proj * world.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    let x = (ndc.x + 1.0) * 0.5 * size_px.0 as f32 / pixels_per_point;
    let y = (1.0 - ndc.y) * 0.5 * size_px.1 as f32 / pixels_per_point;
    Some(egui::pos2(x, y))
}

pub struct DebugOverlay {
    pub stats_visible: bool,
    pub rings_visible: bool,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl DebugOverlay {
    pub fn new(
        window: &winit::window::Window,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let egui_ctx = egui::Context::default();

        // Style: dark, semi-transparent, small monospace white font
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(0, 0, 0, 180);
        visuals.window_stroke = egui::Stroke::NONE;
        visuals.window_shadow = Shadow::NONE;
        visuals.override_text_color = Some(egui::Color32::WHITE);
        egui_ctx.set_visuals(visuals);

        let mut style = (*egui_ctx.style()).clone();
        style.override_font_id = Some(egui::FontId::monospace(13.0));
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            surface_format,
            None,  // no depth
            1,     // msaa samples
            false, // no dithering
        );

        Self {
            stats_visible: false,
            rings_visible: false,
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stats_visible || self.rings_visible
    }

    pub fn pixels_per_point(&self) -> f32 {
        self.egui_ctx.pixels_per_point()
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> egui_winit::EventResponse {
        self.egui_state.on_window_event(window, event)
    }

    /// Render one egui frame with the F3 stats panel and the F4 collision
    /// rings. `None` hides a layer.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        view: &wgpu::TextureView,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        stats: Option<&DebugStats>,
        rings: Option<&[AgentRingDraw]>,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            // ── F4: collision rings on a background layer ────────────────────
            if let Some(rings) = rings {
                let painter = ctx.layer_painter(egui::LayerId::new(
                    egui::Order::Background,
                    egui::Id::new("agent_rings"),
                ));
                for ring in rings {
                    painter.circle_stroke(ring.pos, ring.radius_px, egui::Stroke::new(1.0, ring.color));
                    painter.line_segment([ring.pos, ring.heading_tip], egui::Stroke::new(2.0, ring.color));
                }
            }

            // ── F3: stats panel ──────────────────────────────────────────────
            if let Some(stats) = stats {
                egui::Area::new(egui::Id::new("debug_overlay"))
                    .fixed_pos(egui::pos2(10.0, 10.0))
                    .show(ctx, |ui| {
                        egui::Frame::none()
                            .fill(egui::Color32::from_rgba_premultiplied(0, 0, 0, 180))
                            .inner_margin(egui::Margin::same(8.0))
                            .rounding(4.0)
                            .show(ui, |ui: &mut egui::Ui| {
                                ui.label(format!("FPS: {}", stats.fps));
                                ui.label(format!(
                                    "Frame: {:.2} ms (min: {:.1} | max: {:.1})",
                                    stats.frame_time_avg_ms,
                                    stats.frame_time_min_ms,
                                    stats.frame_time_max_ms
                                ));
                                ui.label(format!("Tick: {}", stats.ticks));
                                ui.label(format!(
                                    "Agents: {} / {}",
                                    stats.agent_count, stats.agent_capacity
                                ));
                                match stats.despawn_remaining {
                                    Some(ticks) => ui.label(format!("Despawn in: {ticks}")),
                                    None => ui.label("Despawn: idle"),
                                };
                                ui.label(format!(
                                    "Player: ({:.2}, {:.2})  heading {:.0}°",
                                    stats.player_position.0,
                                    stats.player_position.1,
                                    stats.player_heading_deg
                                ));
                                ui.label(format!(
                                    "Draw items: {}  Instances: {}",
                                    stats.draw_items, stats.instance_count
                                ));
                                ui.label(format!(
                                    "Resolution: {} x {}",
                                    stats.resolution.0, stats.resolution.1
                                ));
                                ui.label(format!("Camera dist: {:.1}", stats.camera_distance));
                            });
                    });
            }
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, &tris, screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.egui_renderer
                .render(&mut render_pass.forget_lifetime(), &tris, screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}
