use glam::{Quat, Vec3};

use crate::config::CameraConfig;
use crate::model::pose::{CameraPose, VehiclePose};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    FirstPerson,
    ThirdPerson,
}

impl CameraMode {
    pub fn toggled(self) -> Self {
        match self {
            CameraMode::FirstPerson => CameraMode::ThirdPerson,
            CameraMode::ThirdPerson => CameraMode::FirstPerson,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CameraMode::FirstPerson => "first person",
            CameraMode::ThirdPerson => "third person",
        }
    }
}

/// Accumulated look angles, radians
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LookAngles {
    pub yaw: f32,
    pub pitch: f32,
}

/// Places the camera relative to the vehicle. Each mode keeps its own look
/// angles so switching back restores where that view was pointing.
pub struct CameraController {
    config: CameraConfig,
    mode: CameraMode,
    first_person: LookAngles,
    third_person: LookAngles,
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        let mode = if config.start_in_first_person {
            CameraMode::FirstPerson
        } else {
            CameraMode::ThirdPerson
        };
        Self {
            config,
            mode,
            first_person: LookAngles::default(),
            third_person: LookAngles::default(),
        }
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        tracing::debug!(mode = self.mode.label(), "camera mode");
    }

    pub fn angles(&self, mode: CameraMode) -> LookAngles {
        match mode {
            CameraMode::FirstPerson => self.first_person,
            CameraMode::ThirdPerson => self.third_person,
        }
    }

    /// Apply a raw pointer delta to the active mode's angles
    pub fn apply_look(&mut self, dx: f32, dy: f32) {
        let sensitivity = self.config.mouse_sensitivity;
        let limit = self.config.pitch_limit;
        let angles = match self.mode {
            CameraMode::FirstPerson => &mut self.first_person,
            CameraMode::ThirdPerson => &mut self.third_person,
        };
        angles.yaw -= dx * sensitivity;
        angles.pitch = (angles.pitch - dy * sensitivity).clamp(-limit, limit);
    }

    /// Camera pose for the active mode. `ground_below` casts a ray straight
    /// down from a point and returns the height of the first hit.
    pub fn pose<F>(&self, vehicle: &VehiclePose, ground_below: F) -> CameraPose
    where
        F: Fn(Vec3) -> Option<f32>,
    {
        match self.mode {
            CameraMode::FirstPerson => self.first_person_pose(vehicle),
            CameraMode::ThirdPerson => self.third_person_pose(vehicle, ground_below),
        }
    }

    pub fn first_person_pose(&self, vehicle: &VehiclePose) -> CameraPose {
        let LookAngles { yaw, pitch } = self.first_person;
        let position = vehicle.position + vehicle.rotation * self.config.first_person_offset;

        // camera looks down -Z, the chassis drives along +Z
        let forward_align = Quat::from_rotation_y(std::f32::consts::PI);
        let relative = forward_align * Quat::from_rotation_y(yaw) * Quat::from_rotation_x(pitch);

        CameraPose {
            position,
            orientation: (vehicle.rotation * relative).normalize(),
        }
    }

    pub fn third_person_pose<F>(&self, vehicle: &VehiclePose, ground_below: F) -> CameraPose
    where
        F: Fn(Vec3) -> Option<f32>,
    {
        let LookAngles { yaw, pitch } = self.third_person;
        let distance = self.config.third_person_distance;

        let offset = Vec3::new(-yaw.sin() * distance, 0.0, -yaw.cos() * distance);
        let mut position = vehicle.position + offset;
        position.y += self.config.third_person_height - pitch.sin() * distance;

        let probe_origin = position + Vec3::Y * self.config.ground_probe_height;
        if let Some(ground_y) = ground_below(probe_origin) {
            position.y = position.y.max(ground_y + self.config.ground_clearance);
        }

        CameraPose::looking_at(position, vehicle.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_3;

    fn controller() -> CameraController {
        CameraController::new(CameraConfig::default())
    }

    fn no_ground(_: Vec3) -> Option<f32> {
        None
    }

    #[test]
    fn test_starts_in_third_person_and_toggles() {
        let mut cam = controller();
        assert_eq!(cam.mode(), CameraMode::ThirdPerson);
        cam.toggle_mode();
        assert_eq!(cam.mode(), CameraMode::FirstPerson);
        cam.toggle_mode();
        assert_eq!(cam.mode(), CameraMode::ThirdPerson);
    }

    #[test]
    fn test_pitch_stays_clamped_in_both_modes() {
        let mut cam = controller();
        for i in 0..400 {
            let dy = if i % 7 < 4 { -900.0 } else { 1300.0 };
            cam.apply_look(13.0, dy);
            if i % 50 == 0 {
                cam.toggle_mode();
            }
            for mode in [CameraMode::FirstPerson, CameraMode::ThirdPerson] {
                let p = cam.angles(mode).pitch;
                assert!((-FRAC_PI_3..=FRAC_PI_3).contains(&p), "pitch {p} escaped for {mode:?}");
            }
        }
    }

    #[test]
    fn test_look_only_moves_active_mode() {
        let mut cam = controller();
        cam.apply_look(100.0, 50.0);
        let third = cam.angles(CameraMode::ThirdPerson);
        assert!((third.yaw + 0.2).abs() < 1e-6);
        assert!((third.pitch + 0.1).abs() < 1e-6);

        cam.toggle_mode();
        assert_eq!(cam.angles(CameraMode::ThirdPerson), third, "switch must not touch the other mode");
        assert_eq!(cam.angles(CameraMode::FirstPerson), LookAngles::default());

        cam.apply_look(-30.0, 0.0);
        assert_eq!(cam.angles(CameraMode::ThirdPerson), third);
        cam.toggle_mode();
        assert_eq!(cam.angles(CameraMode::ThirdPerson), third);
        assert!((cam.angles(CameraMode::FirstPerson).yaw - 0.06).abs() < 1e-6);
    }

    #[test]
    fn test_first_person_looks_along_vehicle_forward() {
        let mut cam = controller();
        cam.toggle_mode();

        let vehicle = VehiclePose::at(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(0.7));
        let pose = cam.pose(&vehicle, no_ground);
        assert!(pose.forward().distance(vehicle.forward()) < 1e-5);

        let expected = vehicle.position + vehicle.rotation * Vec3::new(0.4, 0.45, -0.2);
        assert!(pose.position.distance(expected) < 1e-5);
    }

    #[test]
    fn test_first_person_yaw_then_pitch_order() {
        let mut cam = controller();
        cam.toggle_mode();
        // quarter turn left, then look up a little
        cam.apply_look(-std::f32::consts::FRAC_PI_2 / 0.002, -0.3 / 0.002);
        let pose = cam.first_person_pose(&VehiclePose::at(Vec3::ZERO, Quat::IDENTITY));
        let f = pose.forward();
        // yaw applied before pitch keeps the pitch about the camera's own right axis
        assert!(f.y > 0.29 && f.y < 0.3, "forward {f:?}");
        assert!(f.z.abs() < 1e-4, "forward {f:?}");
    }

    #[test]
    fn test_third_person_sits_behind_vehicle() {
        let cam = controller();
        let vehicle = VehiclePose::at(Vec3::new(10.0, 1.0, -4.0), Quat::IDENTITY);
        let pose = cam.pose(&vehicle, no_ground);
        assert!(pose.position.distance(Vec3::new(10.0, 2.5, -9.0)) < 1e-5);
        let to_car = (vehicle.position - pose.position).normalize();
        assert!(pose.forward().distance(to_car) < 1e-4);
    }

    #[test]
    fn test_third_person_clamped_above_ground() {
        let mut cam = controller();
        // look up hard so the candidate drops below the ground
        cam.apply_look(0.0, -10_000.0);
        let vehicle = VehiclePose::at(Vec3::new(0.0, 0.5, 0.0), Quat::IDENTITY);

        let unclamped = cam.pose(&vehicle, no_ground);
        assert!(unclamped.position.y < 0.0);

        let ground = 0.25;
        let probed = std::cell::Cell::new(None);
        let pose = cam.pose(&vehicle, |origin| {
            probed.set(Some(origin));
            Some(ground)
        });
        assert_eq!(pose.position.y, ground + 0.5);
        let origin = probed.get().unwrap();
        assert!((origin.y - (unclamped.position.y + 10.0)).abs() < 1e-5, "probe starts 10 above candidate");
    }

    #[test]
    fn test_third_person_keeps_height_above_low_ground() {
        let cam = controller();
        let vehicle = VehiclePose::at(Vec3::new(0.0, 0.5, 0.0), Quat::IDENTITY);
        let pose = cam.pose(&vehicle, |_| Some(-3.0));
        assert!((pose.position.y - 2.0).abs() < 1e-5);
    }
}
