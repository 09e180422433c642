// MODEL: poses, shapes and scene layout
pub mod camera;
pub mod geometry;
pub mod pose;
pub mod scene;

pub use camera::Camera;
pub use geometry::Geometry;
pub use pose::{BodyPose, CameraPose, VehiclePose, WheelPose, WheelRole};
pub use scene::{NodeKind, SceneLayout, Sun};
