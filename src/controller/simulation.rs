use glam::{Quat, Vec3};

use crate::config::DriveConfig;
use crate::controller::camera_controller::{CameraController, CameraMode};
use crate::controller::flip_recovery::FlipRecovery;
use crate::controller::input::InputState;
use crate::controller::physics::{PhysicsWorld, Vehicle};
use crate::controller::vehicle_controller::{DriveCommand, VehicleController};
use crate::error::{DriveError, Result};
use crate::model::pose::{BodyPose, CameraPose, VehiclePose, WheelPose};
use crate::model::scene::{SceneLayout, Sun};

/// Everything the view needs to draw one frame
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub chassis: VehiclePose,
    pub wheels: Vec<WheelPose>,
    pub balls: Vec<BodyPose>,
    pub camera: CameraPose,
    pub camera_mode: CameraMode,
    pub sun: Sun,
    pub command: DriveCommand,
    /// The chassis was reset onto its wheels this frame
    pub recovered: bool,
}

impl FrameSnapshot {
    pub fn speed(&self) -> f32 {
        self.chassis.speed()
    }
}

/// Owns the physics world and every per-frame controller.
pub struct DriveSim {
    config: DriveConfig,
    world: PhysicsWorld,
    layout: SceneLayout,
    vehicle: Vehicle,
    driver: VehicleController,
    camera: CameraController,
    flip: FlipRecovery,
}

impl DriveSim {
    pub fn new(config: DriveConfig) -> Result<Self> {
        let mut world = PhysicsWorld::new(&config.world);
        let layout = SceneLayout::build(&mut world, &config.scene);
        let vehicle = Vehicle::spawn(&mut world, &config.vehicle)
            .ok_or_else(|| DriveError::Physics("chassis hull is degenerate".to_string()))?;

        Ok(Self {
            driver: VehicleController::new(config.engine.clone(), config.steering.clone()),
            camera: CameraController::new(config.camera.clone()),
            flip: FlipRecovery::new(config.flip_recovery.clone()),
            config,
            world,
            layout,
            vehicle,
        })
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub fn layout(&self) -> &SceneLayout {
        &self.layout
    }

    pub fn camera_mode(&self) -> CameraMode {
        self.camera.mode()
    }

    pub fn steering(&self) -> f32 {
        self.driver.current_steering()
    }

    pub fn flipped_for(&self) -> f32 {
        self.flip.flipped_for()
    }

    fn chassis_pose(&self) -> VehiclePose {
        self.vehicle
            .pose(&self.world)
            .unwrap_or_else(|| VehiclePose::at(self.config.vehicle.spawn, Quat::IDENTITY))
    }

    /// Advance one frame: read controls, step physics, check for a flipped
    /// chassis, then place the camera and collect poses for drawing.
    pub fn update(&mut self, input: &mut InputState, dt: f32) -> FrameSnapshot {
        if input.take_camera_toggle() {
            self.camera.toggle_mode();
        }
        let (dx, dy) = input.consume_look();
        self.camera.apply_look(dx, dy);

        let speed = self.chassis_pose().speed();
        let command = self.driver.update(input, dt, speed);
        self.vehicle.apply(&command);
        self.world.step(dt, Some(&mut self.vehicle));

        let mut chassis = self.chassis_pose();
        let recovered = self.flip.update(chassis.rotation, dt);
        if recovered {
            self.vehicle.recover(&mut self.world, self.flip.lift());
            chassis = self.chassis_pose();
        }

        let world = &self.world;
        let chassis_handle = self.vehicle.chassis;
        let camera = self.camera.pose(&chassis, |origin: Vec3| {
            world.ground_height_below(origin, Some(chassis_handle))
        });

        FrameSnapshot {
            wheels: self.vehicle.wheel_poses(world),
            balls: self.layout.ball_poses(world),
            sun: Sun::following(chassis.position, &self.config.lighting),
            camera,
            camera_mode: self.camera.mode(),
            command,
            recovered,
            chassis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::input::InputEvent;
    use rapier3d::na::{UnitQuaternion, Vector3};

    fn sim() -> DriveSim {
        DriveSim::new(DriveConfig::default()).unwrap()
    }

    fn settle(sim: &mut DriveSim, input: &mut InputState, frames: usize) -> FrameSnapshot {
        let mut last = None;
        for _ in 0..frames {
            last = Some(sim.update(input, 1.0 / 60.0));
        }
        last.unwrap()
    }

    #[test]
    fn test_idle_frame_snapshot() {
        let mut sim = sim();
        let mut input = InputState::default();
        let snap = settle(&mut sim, &mut input, 90);

        assert_eq!(snap.command, DriveCommand::default());
        assert_eq!(snap.wheels.len(), 4);
        assert_eq!(snap.balls.len(), 3);
        assert_eq!(snap.camera_mode, CameraMode::ThirdPerson);
        assert!(!snap.recovered);
        // third-person camera stays behind and above the car
        assert!(snap.camera.position.y > snap.chassis.position.y);
        assert!(snap.camera.position.y >= sim.layout().ground_top() + 0.5 - 1e-4);
    }

    #[test]
    fn test_toggle_key_switches_camera_once() {
        let mut sim = sim();
        let mut input = InputState::default();
        input.process_event(&InputEvent::KeyDown("c".to_string()));
        let snap = sim.update(&mut input, 1.0 / 60.0);
        assert_eq!(snap.camera_mode, CameraMode::FirstPerson);

        // key still held, no repeat toggle
        let snap = sim.update(&mut input, 1.0 / 60.0);
        assert_eq!(snap.camera_mode, CameraMode::FirstPerson);

        input.process_event(&InputEvent::KeyUp("c".to_string()));
        input.process_event(&InputEvent::KeyDown("v".to_string()));
        let snap = sim.update(&mut input, 1.0 / 60.0);
        assert_eq!(snap.camera_mode, CameraMode::ThirdPerson);
    }

    #[test]
    fn test_throttle_drives_forward() {
        let mut sim = sim();
        let mut input = InputState::default();
        settle(&mut sim, &mut input, 60);

        input.process_event(&InputEvent::KeyDown("w".to_string()));
        let snap = settle(&mut sim, &mut input, 120);
        assert_eq!(snap.command.engine_force, 6500.0);
        assert!(snap.speed() > 1.0, "speed {}", snap.speed());
    }

    #[test]
    fn test_steering_persists_and_relaxes() {
        let mut sim = sim();
        let mut input = InputState::default();
        input.process_event(&InputEvent::KeyDown("a".to_string()));
        settle(&mut sim, &mut input, 30);
        assert!((sim.steering() - 0.3).abs() < 1e-5, "steering {}", sim.steering());

        input.process_event(&InputEvent::KeyUp("a".to_string()));
        settle(&mut sim, &mut input, 30);
        assert_eq!(sim.steering(), 0.0);
    }

    #[test]
    fn test_roof_landing_recovers_once() {
        let mut sim = sim();
        let mut input = InputState::default();
        settle(&mut sim, &mut input, 30);

        // roll the chassis onto its roof
        let roof = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::PI);
        if let Some(body) = sim.world.bodies.get_mut(sim.vehicle.chassis) {
            body.set_rotation(roof, true);
        }

        let mut recoveries = Vec::new();
        let mut peak_timer: f32 = 0.0;
        for frame in 0..360 {
            let snap = sim.update(&mut input, 1.0 / 60.0);
            peak_timer = peak_timer.max(sim.flipped_for());
            if snap.recovered {
                recoveries.push(frame);
                let up = snap.chassis.rotation * Vec3::Y;
                assert!(up.y > 0.99, "recovered chassis must be upright, up = {up}");
                assert_eq!(sim.flipped_for(), 0.0, "timer resets when recovery fires");
            }
        }

        assert_eq!(recoveries.len(), 1, "recovery fired at frames {recoveries:?}");
        assert!(peak_timer > 4.9, "flip timer peaked at {peak_timer}");
    }
}
