use std::cell::RefCell;
use std::rc::Rc;

use crate::assets::{self, AssetHandle};
use crate::config::SceneConfig;
use crate::controller::input::InputState;
use crate::controller::simulation::DriveSim;
use crate::error::Result;
use crate::model::camera::Camera;
use crate::ui::{self, HudStats};
use crate::view::gpu_init::GpuContext;
use crate::view::render::{Overlay, SceneRenderer, TextureSlot};

/// Turns animation-frame timestamps into simulation deltas
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_ms: Option<f64>,
    max_dt: f32,
    paused: bool,
}

impl FrameClock {
    pub fn new(max_dt: f32) -> Self {
        Self {
            last_ms: None,
            max_dt,
            paused: false,
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        if paused != self.paused {
            tracing::debug!(paused, "frame clock");
        }
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Seconds since the previous tick, clamped to `[0, max_dt]`.
    /// `None` while paused; the clock keeps advancing so resuming never
    /// produces one huge step.
    pub fn tick(&mut self, now_ms: f64) -> Option<f32> {
        let dt = match self.last_ms {
            Some(last) => ((now_ms - last) / 1000.0).clamp(0.0, self.max_dt as f64) as f32,
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        (!self.paused).then_some(dt)
    }
}

/// Textures still loading, with the slot each one fills
pub struct PendingTextures {
    loads: Vec<(TextureSlot, AssetHandle<image::RgbaImage>)>,
}

impl PendingTextures {
    pub fn start(scene: &SceneConfig) -> Self {
        let loads = vec![
            (TextureSlot::Grass, assets::load_image(&scene.grass_texture)),
            (TextureSlot::Wheel, assets::load_image(&scene.wheel_texture)),
        ];
        Self { loads }
    }

    /// Install every texture that finished since the last call. Failed loads
    /// leave the slot white.
    pub fn install(&mut self, gpu: &GpuContext, renderer: &mut SceneRenderer) {
        self.loads.retain(|(slot, handle)| match handle.poll() {
            None => true,
            Some(Ok(image)) => {
                renderer.set_texture(gpu, *slot, &image);
                false
            }
            Some(Err(e)) => {
                tracing::warn!(url = handle.url(), error = %e, "texture unavailable, keeping plain colour");
                false
            }
        });
    }
}

/// egui input covering the whole surface, in logical points
pub fn screen_input(
    width: u32,
    height: u32,
    pixels_per_point: f32,
    time_s: f64,
    events: Vec<egui::Event>,
) -> egui::RawInput {
    let mut raw_input = egui::RawInput::default();
    raw_input.time = Some(time_s);
    raw_input.screen_rect = Some(egui::Rect::from_min_size(
        egui::Pos2::ZERO,
        egui::vec2(width as f32 / pixels_per_point, height as f32 / pixels_per_point),
    ));
    raw_input.events = events;
    raw_input
}

/// egui button event for a DOM `MouseEvent.button` code, at `pos` in points
pub fn pointer_button_event(button: i16, pos: egui::Pos2, pressed: bool) -> Option<egui::Event> {
    let button = match button {
        0 => egui::PointerButton::Primary,
        1 => egui::PointerButton::Middle,
        2 => egui::PointerButton::Secondary,
        _ => return None,
    };
    Some(egui::Event::PointerButton {
        pos,
        button,
        pressed,
        modifiers: egui::Modifiers::default(),
    })
}

/// Everything one frame needs: simulation, GPU state and the overlay.
/// Input and the clock are shared with the event listeners.
pub struct FrameLoopContext {
    pub gpu: GpuContext,
    pub renderer: SceneRenderer,
    pub sim: DriveSim,
    pub camera: Camera,
    pub input: Rc<RefCell<InputState>>,
    pub clock: Rc<RefCell<FrameClock>>,
    pub egui_ctx: egui::Context,
    textures: PendingTextures,
}

impl FrameLoopContext {
    pub fn new(gpu: GpuContext, sim: DriveSim, input: Rc<RefCell<InputState>>) -> Self {
        let config = sim.config();
        let renderer = SceneRenderer::new(&gpu, sim.layout(), config);
        let (width, height) = gpu.size();
        let camera = Camera::new(width, height, &config.camera);
        let clock = Rc::new(RefCell::new(FrameClock::new(config.world.max_frame_dt)));
        let textures = PendingTextures::start(&config.scene);

        Self {
            gpu,
            renderer,
            sim,
            camera,
            input,
            clock,
            egui_ctx: egui::Context::default(),
            textures,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.gpu.resize(width, height) {
            self.renderer.resize(&self.gpu);
            self.camera.set_aspect(width, height);
        }
    }

    /// Simulate and draw one frame. Returns egui's platform output, or `None`
    /// when the clock is paused and nothing was drawn.
    pub fn frame(
        &mut self,
        now_ms: f64,
        raw_input: egui::RawInput,
        pixels_per_point: f32,
    ) -> Result<Option<egui::PlatformOutput>> {
        self.textures.install(&self.gpu, &mut self.renderer);

        let Some(dt) = self.clock.borrow_mut().tick(now_ms) else {
            return Ok(None);
        };

        let snapshot = self.sim.update(&mut self.input.borrow_mut(), dt);
        self.camera.pose = snapshot.camera;
        self.renderer.sync(&self.gpu.queue, &snapshot, &self.camera);

        let stats = HudStats {
            snapshot: &snapshot,
            steering: self.sim.steering(),
            flipped_for: self.sim.flipped_for(),
            dt,
            pointer_locked: self.input.borrow().pointer_locked,
        };
        self.egui_ctx.set_pixels_per_point(pixels_per_point);
        let mut full_output = ui::build_ui(&self.egui_ctx, raw_input, &stats);
        let primitives = self
            .egui_ctx
            .tessellate(std::mem::take(&mut full_output.shapes), pixels_per_point);

        self.renderer.render(
            &self.gpu,
            Some(Overlay {
                primitives,
                textures_delta: full_output.textures_delta,
                pixels_per_point,
            }),
        )?;
        Ok(Some(full_output.platform_output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_is_zero() {
        let mut clock = FrameClock::new(0.05);
        assert_eq!(clock.tick(1234.0), Some(0.0));
        let dt = clock.tick(1250.0).unwrap();
        assert!((dt - 0.016).abs() < 1e-6, "dt = {dt}");
    }

    #[test]
    fn test_dt_is_clamped() {
        let mut clock = FrameClock::new(0.05);
        clock.tick(0.0);
        assert_eq!(clock.tick(2000.0), Some(0.05), "a stalled tab must not produce a huge step");
        assert_eq!(clock.tick(1000.0), Some(0.0), "time going backwards clamps to zero");
    }

    #[test]
    fn test_pause_skips_frames_but_keeps_time() {
        let mut clock = FrameClock::new(0.05);
        clock.tick(0.0);
        clock.set_paused(true);
        assert!(clock.is_paused());
        assert_eq!(clock.tick(5000.0), None);

        clock.set_paused(false);
        let dt = clock.tick(5010.0).unwrap();
        assert!((dt - 0.01).abs() < 1e-6, "resume measures from the last paused tick, got {dt}");
    }

    #[test]
    fn test_screen_input_uses_logical_points() {
        let raw = screen_input(1600, 1200, 2.0, 1.5, vec![egui::Event::PointerGone]);
        let rect = raw.screen_rect.unwrap();
        assert_eq!(rect.width(), 800.0);
        assert_eq!(rect.height(), 600.0);
        assert_eq!(raw.time, Some(1.5));
        assert_eq!(raw.events.len(), 1);
    }

    #[test]
    fn test_dom_buttons_map_to_egui() {
        let pos = egui::pos2(12.0, 34.0);
        match pointer_button_event(0, pos, true) {
            Some(egui::Event::PointerButton { pos: p, button, pressed, .. }) => {
                assert_eq!(p, pos);
                assert_eq!(button, egui::PointerButton::Primary);
                assert!(pressed);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            pointer_button_event(2, pos, false),
            Some(egui::Event::PointerButton { button: egui::PointerButton::Secondary, pressed: false, .. })
        ));
        assert!(pointer_button_event(4, pos, true).is_none(), "browser back button is ignored");
    }
}
