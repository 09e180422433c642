use egui::{Context, RichText};

use crate::controller::camera_controller::CameraMode;
use crate::controller::simulation::FrameSnapshot;

/// What the overlay shows for one frame
pub struct HudStats<'a> {
    pub snapshot: &'a FrameSnapshot,
    pub steering: f32,
    /// Seconds the chassis has spent on its side or roof
    pub flipped_for: f32,
    pub dt: f32,
    pub pointer_locked: bool,
}

impl HudStats<'_> {
    pub fn fps(&self) -> f32 {
        if self.dt > 0.0 {
            1.0 / self.dt
        } else {
            0.0
        }
    }

    /// Warning shown while the flip-recovery timer is running
    pub fn flip_warning(&self) -> Option<String> {
        (self.flipped_for > 0.0).then(|| format!("Flipped: {:.1} s", self.flipped_for))
    }

    /// Speed in km/h, taking one world unit as one metre
    pub fn speed_kmh(&self) -> f32 {
        self.snapshot.speed() * 3.6
    }
}

/// Run egui for one frame and return its output
pub fn build_ui(egui_ctx: &Context, raw_input: egui::RawInput, stats: &HudStats) -> egui::FullOutput {
    egui_ctx.run(raw_input, |ctx| draw_hud(ctx, stats))
}

pub fn draw_hud(ctx: &Context, stats: &HudStats) {
    draw_drive_window(ctx, stats);
    draw_controls(ctx, stats.pointer_locked);
    if stats.snapshot.camera_mode == CameraMode::FirstPerson {
        draw_crosshair(ctx);
    }
}

fn draw_drive_window(ctx: &Context, stats: &HudStats) {
    let snap = stats.snapshot;
    let pos = snap.chassis.position;

    egui::Window::new("Drive")
        .default_pos([8.0, 8.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(RichText::new(format!("FPS: {:.0}", stats.fps())).small());
            ui.label(RichText::new(format!("Speed: {:.1} km/h", stats.speed_kmh())).small());
            ui.label(
                RichText::new(format!("Pos: x: {:.1} y: {:.1} z: {:.1}", pos.x, pos.y, pos.z)).small(),
            );
            ui.separator();
            ui.label(RichText::new(format!("Engine: {:.0}", snap.command.engine_force)).small());
            ui.label(RichText::new(format!("Brake: {:.0}", snap.command.brake_force)).small());
            ui.label(RichText::new(format!("Steering: {:+.2}", stats.steering)).small());
            ui.label(RichText::new(format!("Camera: {}", snap.camera_mode.label())).small());
            if let Some(warning) = stats.flip_warning() {
                ui.label(RichText::new(warning).small().color(egui::Color32::LIGHT_RED));
            }
            if snap.recovered {
                ui.label(RichText::new("Recovered").small().color(egui::Color32::YELLOW));
            }
        });
}

fn draw_controls(ctx: &Context, pointer_locked: bool) {
    egui::Area::new(egui::Id::new("controls"))
        .anchor(egui::Align2::LEFT_BOTTOM, [8.0, -8.0])
        .show(ctx, |ui| {
            let text = |s: &str| RichText::new(s).small().color(egui::Color32::WHITE);
            ui.label(text("W/S or arrows - throttle / reverse"));
            ui.label(text("A/D or arrows - steer"));
            ui.label(text("Space - brake"));
            ui.label(text("C, V or P - switch camera"));
            if pointer_locked {
                ui.label(text("Esc - release mouse"));
            } else {
                ui.label(text("Click - capture mouse to look around"));
            }
        });
}

fn draw_crosshair(ctx: &Context) {
    let painter = ctx.layer_painter(egui::LayerId::new(egui::Order::TOP, egui::Id::new("crosshair")));
    let center = ctx.available_rect().center();
    let size = 6.0;
    let stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);
    painter.line_segment(
        [
            egui::Pos2::new(center.x - size, center.y),
            egui::Pos2::new(center.x + size, center.y),
        ],
        stroke,
    );
    painter.line_segment(
        [
            egui::Pos2::new(center.x, center.y - size),
            egui::Pos2::new(center.x, center.y + size),
        ],
        stroke,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::simulation::DriveSim;
    use crate::controller::input::InputState;
    use crate::config::DriveConfig;

    fn snapshot() -> FrameSnapshot {
        let mut sim = DriveSim::new(DriveConfig::default()).unwrap();
        sim.update(&mut InputState::default(), 1.0 / 60.0)
    }

    #[test]
    fn test_flip_warning_only_while_flipped() {
        let snap = snapshot();
        let mut stats = HudStats {
            snapshot: &snap,
            steering: 0.0,
            flipped_for: 0.0,
            dt: 1.0 / 60.0,
            pointer_locked: false,
        };
        assert_eq!(stats.flip_warning(), None);

        stats.flipped_for = 2.4;
        assert_eq!(stats.flip_warning().as_deref(), Some("Flipped: 2.4 s"));
        assert!((stats.fps() - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_hud_runs_headless() {
        let snap = snapshot();
        let stats = HudStats {
            snapshot: &snap,
            steering: 0.1,
            flipped_for: 1.0,
            dt: 0.0,
            pointer_locked: true,
        };
        let ctx = Context::default();
        let output = build_ui(&ctx, egui::RawInput::default(), &stats);
        assert!(!output.shapes.is_empty(), "HUD must draw something");
        assert_eq!(stats.fps(), 0.0);
    }
}
