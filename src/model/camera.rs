use glam::{Mat4, Vec3};

use crate::config::CameraConfig;
use crate::model::pose::CameraPose;

pub struct Camera {
    pub pose: CameraPose,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32, config: &CameraConfig) -> Self {
        Self {
            pose: CameraPose::default(),
            fov_y: config.fov_y_degrees.to_radians(),
            aspect: aspect_ratio(width, height),
            z_near: config.z_near,
            z_far: config.z_far,
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.pose.position
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    pub fn view_proj(&self) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
        proj * self.pose.view()
    }
}

// a zero-height canvas shows up while the page is still laying out
fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}
