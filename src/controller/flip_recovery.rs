use glam::{Quat, Vec3};

use crate::config::FlipRecoveryConfig;

/// Tracks how long the chassis has been on its side or roof.
pub struct FlipRecovery {
    config: FlipRecoveryConfig,
    flipped_for: f32,
}

impl FlipRecovery {
    pub fn new(config: FlipRecoveryConfig) -> Self {
        Self {
            config,
            flipped_for: 0.0,
        }
    }

    pub fn flipped_for(&self) -> f32 {
        self.flipped_for
    }

    pub fn lift(&self) -> f32 {
        self.config.lift
    }

    /// Feed the chassis orientation for this frame. Returns true when the
    /// vehicle has been flipped long enough that it must be reset.
    pub fn update(&mut self, rotation: Quat, dt: f32) -> bool {
        self.update_up(rotation * Vec3::Y, dt)
    }

    /// Same as [`update`](Self::update) but takes the chassis up vector directly
    pub fn update_up(&mut self, up: Vec3, dt: f32) -> bool {
        if up.y >= self.config.up_threshold {
            self.flipped_for = 0.0;
            return false;
        }

        self.flipped_for += dt;
        if self.flipped_for > self.config.timeout {
            self.flipped_for = 0.0;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upright_never_fires() {
        let mut flip = FlipRecovery::new(FlipRecoveryConfig::default());
        for _ in 0..1000 {
            assert!(!flip.update(Quat::IDENTITY, 0.05));
        }
        assert_eq!(flip.flipped_for(), 0.0);
    }

    #[test]
    fn test_fires_once_after_timeout() {
        let mut flip = FlipRecovery::new(FlipRecoveryConfig::default());
        let up = Vec3::new(0.0, 0.1, 0.995).normalize();
        let dt = 0.01;
        let frames = (5.1_f32 / dt).round() as usize;

        let mut fired = 0;
        for _ in 0..frames {
            if flip.update_up(up, dt) {
                fired += 1;
                assert_eq!(flip.flipped_for(), 0.0, "timer must reset when recovery fires");
            }
        }
        assert_eq!(fired, 1);
        assert!(flip.flipped_for() < 0.2);
    }

    #[test]
    fn test_upright_frame_resets_timer() {
        let mut flip = FlipRecovery::new(FlipRecoveryConfig::default());
        let upside_down = Quat::from_rotation_z(std::f32::consts::PI);
        for _ in 0..80 {
            assert!(!flip.update(upside_down, 0.05));
        }
        assert!(flip.flipped_for() > 3.9);

        flip.update(Quat::IDENTITY, 0.05);
        assert_eq!(flip.flipped_for(), 0.0);

        for _ in 0..80 {
            assert!(!flip.update(upside_down, 0.05), "timer restarted from zero");
        }
    }

    #[test]
    fn test_side_tilt_counts_as_flipped() {
        let mut flip = FlipRecovery::new(FlipRecoveryConfig::default());
        // ~80 degrees of roll puts up.y at ~0.17
        let tilted = Quat::from_rotation_z(80f32.to_radians());
        flip.update(tilted, 1.0);
        assert_eq!(flip.flipped_for(), 1.0);

        // ~70 degrees is still considered upright enough
        let mut flip = FlipRecovery::new(FlipRecoveryConfig::default());
        flip.update(Quat::from_rotation_z(70f32.to_radians()), 1.0);
        assert_eq!(flip.flipped_for(), 0.0);
    }
}
