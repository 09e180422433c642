use glam::{Mat4, Quat, Vec3};

/// World transform of a rigid body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl BodyPose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }
}

/// Chassis state read back from physics each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehiclePose {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
}

impl VehiclePose {
    pub fn at(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            linear_velocity: Vec3::ZERO,
        }
    }

    pub fn speed(&self) -> f32 {
        self.linear_velocity.length()
    }

    /// Chassis local +Y in world space
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Chassis local +Z in world space; the front wheels sit on +Z
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn body(&self) -> BodyPose {
        BodyPose {
            position: self.position,
            rotation: self.rotation,
        }
    }
}

/// Where a wheel sits on the chassis. Only front wheels steer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelRole {
    FrontRight,
    FrontLeft,
    RearRight,
    RearLeft,
}

impl WheelRole {
    pub const ALL: [WheelRole; 4] = [
        WheelRole::FrontRight,
        WheelRole::FrontLeft,
        WheelRole::RearRight,
        WheelRole::RearLeft,
    ];

    pub fn is_front(self) -> bool {
        matches!(self, WheelRole::FrontRight | WheelRole::FrontLeft)
    }

    pub fn is_right(self) -> bool {
        matches!(self, WheelRole::FrontRight | WheelRole::RearRight)
    }

    pub fn label(self) -> &'static str {
        match self {
            WheelRole::FrontRight => "FR",
            WheelRole::FrontLeft => "FL",
            WheelRole::RearRight => "RR",
            WheelRole::RearLeft => "RL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelPose {
    pub role: WheelRole,
    pub pose: BodyPose,
}

/// Camera placement in world space. The camera looks down its local -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl CameraPose {
    /// Pose at `position` looking at `target` with world +Y up
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let view = Mat4::look_at_rh(position, target, Vec3::Y);
        let orientation = Quat::from_mat4(&view).inverse().normalize();
        Self { position, orientation }
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position).inverse()
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::looking_at(Vec3::new(0.0, 10.0, 15.0), Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looking_at_points_forward_at_target() {
        let eye = Vec3::new(3.0, 4.0, -5.0);
        let target = Vec3::new(0.0, 1.0, 0.0);
        let pose = CameraPose::looking_at(eye, target);
        let expected = (target - eye).normalize();
        assert!(pose.forward().distance(expected) < 1e-4, "{:?} vs {:?}", pose.forward(), expected);

        // no roll: camera right stays horizontal
        let right = pose.orientation * Vec3::X;
        assert!(right.y.abs() < 1e-4);
    }

    #[test]
    fn test_view_matches_look_at() {
        let eye = Vec3::new(-2.0, 3.0, 7.0);
        let target = Vec3::new(1.0, 0.5, 0.0);
        let pose = CameraPose::looking_at(eye, target);
        let a = pose.view();
        let b = Mat4::look_at_rh(eye, target, Vec3::Y);
        assert!(a.abs_diff_eq(b, 1e-4));
    }

    #[test]
    fn test_wheel_roles() {
        let fronts: Vec<_> = WheelRole::ALL.iter().filter(|r| r.is_front()).collect();
        assert_eq!(fronts, vec![&WheelRole::FrontRight, &WheelRole::FrontLeft]);
        assert!(WheelRole::RearRight.is_right());
        assert!(!WheelRole::FrontLeft.is_right());
    }
}
