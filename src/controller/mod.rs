// CONTROLLER: input, driving logic, physics and the frame loop
pub mod input;
pub mod vehicle_controller;
pub mod flip_recovery;
pub mod camera_controller;
pub mod physics;
pub mod simulation;
pub mod frame_loop;

pub use input::{DriveKey, InputEvent, InputState, KeyBindings};
pub use vehicle_controller::{DriveCommand, VehicleController};
pub use flip_recovery::FlipRecovery;
pub use camera_controller::{CameraController, CameraMode, LookAngles};
pub use physics::{PhysicsWorld, Vehicle};
pub use simulation::{DriveSim, FrameSnapshot};
pub use frame_loop::{FrameClock, FrameLoopContext};
