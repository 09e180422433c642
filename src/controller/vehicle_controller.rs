use crate::config::{EngineConfig, SteeringConfig};
use crate::controller::input::{DriveKey, InputState};

/// Forces and steering handed to the physics vehicle for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveCommand {
    pub engine_force: f32,
    pub brake_force: f32,
    pub steering: f32,
}

/// Maps held keys to engine, brake and steering values.
///
/// Steering is integrated over time and persists between frames; its rate
/// falls off inversely with speed above `reference_speed`.
pub struct VehicleController {
    engine: EngineConfig,
    steering: SteeringConfig,
    current_steering: f32,
}

impl VehicleController {
    pub fn new(engine: EngineConfig, steering: SteeringConfig) -> Self {
        Self {
            engine,
            steering,
            current_steering: 0.0,
        }
    }

    pub fn current_steering(&self) -> f32 {
        self.current_steering
    }

    /// Compute this frame's command. `speed` is the chassis' linear speed.
    pub fn update(&mut self, input: &InputState, dt: f32, speed: f32) -> DriveCommand {
        let mut engine_force = if input.is_held(DriveKey::Forward) {
            self.engine.max_engine_force
        } else if input.is_held(DriveKey::Backward) {
            -self.engine.max_engine_force * self.engine.reverse_ratio
        } else {
            0.0
        };

        let mut brake_force = 0.0;
        if input.is_held(DriveKey::Brake) {
            brake_force = self.engine.brake_force;
            engine_force = 0.0;
        }

        let step = self.steering_step(dt, speed);
        let clamp = self.steering.clamp;
        let s = self.current_steering;
        self.current_steering = if input.is_held(DriveKey::Left) {
            (s + step).min(clamp)
        } else if input.is_held(DriveKey::Right) {
            (s - step).max(-clamp)
        } else if s > 0.0 {
            (s - step).max(0.0)
        } else if s < 0.0 {
            (s + step).min(0.0)
        } else {
            0.0
        };

        DriveCommand {
            engine_force,
            brake_force,
            steering: self.current_steering,
        }
    }

    /// Steering change for this frame; `increment` is expressed per 1/60 s
    fn steering_step(&self, dt: f32, speed: f32) -> f32 {
        let speed_factor = (speed / self.steering.reference_speed).max(1.0);
        let multiplier = 1.0 / speed_factor;
        self.steering.increment * dt * 60.0 * multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::input::InputEvent;

    const DT: f32 = 1.0 / 60.0;

    fn controller() -> VehicleController {
        VehicleController::new(EngineConfig::default(), SteeringConfig::default())
    }

    fn holding(keys: &[&str]) -> InputState {
        let mut input = InputState::default();
        for k in keys {
            input.process_event(&InputEvent::KeyDown(k.to_string()));
        }
        input
    }

    #[test]
    fn test_engine_policy() {
        let mut c = controller();
        assert_eq!(c.update(&holding(&["w"]), DT, 0.0).engine_force, 6500.0);
        assert_eq!(c.update(&holding(&["s"]), DT, 0.0).engine_force, -3250.0);
        assert_eq!(c.update(&holding(&[]), DT, 0.0).engine_force, 0.0);
        assert_eq!(
            c.update(&holding(&["w", "s"]), DT, 0.0).engine_force,
            6500.0,
            "forward wins over backward"
        );
    }

    #[test]
    fn test_brake_overrides_engine() {
        let mut c = controller();
        for keys in [&["w", " "][..], &["s", " "][..], &[" "][..], &["w", "s", " "][..]] {
            let cmd = c.update(&holding(keys), DT, 3.0);
            assert_eq!(cmd.engine_force, 0.0, "brake must zero engine for {keys:?}");
            assert_eq!(cmd.brake_force, 50.0);
        }
        assert_eq!(c.update(&holding(&["w"]), DT, 3.0).brake_force, 0.0);
    }

    #[test]
    fn test_left_from_rest_at_low_speed() {
        let mut c = controller();
        let cmd = c.update(&holding(&["a"]), DT, 0.0);
        assert!((cmd.steering - 0.1).abs() < 1e-6, "got {}", cmd.steering);
    }

    #[test]
    fn test_steering_rate_falls_off_with_speed() {
        let mut slow = controller();
        let mut fast = controller();
        let s_slow = slow.update(&holding(&["a"]), DT, 8.0).steering;
        let s_fast = fast.update(&holding(&["a"]), DT, 16.0).steering;
        assert!((s_slow - 0.1).abs() < 1e-6);
        assert!((s_fast - 0.05).abs() < 1e-6, "double reference speed halves the rate");
    }

    #[test]
    fn test_steering_stays_clamped() {
        let mut c = controller();
        let combos: [&[&str]; 5] = [&["a"], &["d"], &["a", "d"], &[], &["d", "w"]];
        let dts = [0.0, 0.001, DT, 0.05, 0.5, 10.0];
        for round in 0..50 {
            let keys = combos[round % combos.len()];
            let dt = dts[round % dts.len()];
            let speed = (round as f32) * 1.7;
            let s = c.update(&holding(keys), dt, speed).steering;
            assert!((-0.3..=0.3).contains(&s), "steering {s} escaped clamp");
        }
    }

    #[test]
    fn test_release_returns_to_exactly_zero() {
        let mut c = controller();
        for _ in 0..20 {
            c.update(&holding(&["d"]), DT, 0.0);
        }
        assert!((c.current_steering() + 0.3).abs() < 1e-6);

        let idle = holding(&[]);
        let mut steps = 0;
        while c.current_steering() != 0.0 {
            let before = c.current_steering();
            let after = c.update(&idle, 0.013, 0.0).steering;
            assert!(after <= 0.0, "relaxing must never overshoot past zero");
            assert!(after.abs() < before.abs());
            steps += 1;
            assert!(steps < 100, "steering did not settle");
        }
        assert_eq!(c.current_steering(), 0.0);
    }

    #[test]
    fn test_zero_speed_and_dt_are_safe() {
        let mut c = controller();
        let cmd = c.update(&holding(&["a"]), 0.0, 0.0);
        assert_eq!(cmd.steering, 0.0);
        assert!(cmd.steering.is_finite());
    }
}
