//! Tuning constants for the demo.
//!
//! Every value the simulation, camera or scene depends on lives here so it can be
//! overridden from a TOML file on native builds. Missing fields fall back to the
//! defaults below.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::controller::input::KeyBindings;
use crate::error::{DriveError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub engine: EngineConfig,
    pub steering: SteeringConfig,
    pub flip_recovery: FlipRecoveryConfig,
    pub camera: CameraConfig,
    pub world: WorldConfig,
    pub vehicle: VehicleConfig,
    pub scene: SceneConfig,
    pub lighting: LightingConfig,
    pub bindings: KeyBindings,
}

impl DriveConfig {
    /// Parse and validate a TOML config
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controllers cannot work with, such as negative
    /// clamps, a non-positive frame delta or non-finite numbers.
    pub fn validate(&self) -> Result<()> {
        let e = &self.engine;
        finite("engine.max_engine_force", e.max_engine_force)?;
        finite("engine.reverse_ratio", e.reverse_ratio)?;
        non_negative("engine.brake_force", e.brake_force)?;

        let s = &self.steering;
        non_negative("steering.increment", s.increment)?;
        non_negative("steering.clamp", s.clamp)?;
        positive("steering.reference_speed", s.reference_speed)?;

        let f = &self.flip_recovery;
        finite("flip_recovery.up_threshold", f.up_threshold)?;
        non_negative("flip_recovery.timeout", f.timeout)?;
        finite("flip_recovery.lift", f.lift)?;

        let c = &self.camera;
        finite("camera.mouse_sensitivity", c.mouse_sensitivity)?;
        non_negative("camera.pitch_limit", c.pitch_limit)?;
        positive("camera.z_near", c.z_near)?;
        if !(c.z_far > c.z_near) {
            return Err(invalid("camera.z_far", "must be greater than camera.z_near"));
        }
        if !(c.fov_y_degrees > 0.0 && c.fov_y_degrees < 180.0) {
            return Err(invalid("camera.fov_y_degrees", "must lie in (0, 180)"));
        }

        let w = &self.world;
        finite("world.gravity", w.gravity)?;
        positive("world.max_frame_dt", w.max_frame_dt)?;
        if w.substeps == 0 {
            return Err(invalid("world.substeps", "must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> DriveError {
    DriveError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn finite(field: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, "must be a finite number"))
    }
}

fn non_negative(field: &str, value: f32) -> Result<()> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(invalid(field, "must not be negative"));
    }
    Ok(())
}

fn positive(field: &str, value: f32) -> Result<()> {
    finite(field, value)?;
    if value <= 0.0 {
        return Err(invalid(field, "must be greater than zero"));
    }
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
impl DriveConfig {
    /// Read a config file from disk
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| crate::error::DriveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// `$DRIVE_CONFIG`, else `drive.toml`, else built-in defaults
    pub fn load_or_default() -> Result<Self> {
        let path = std::env::var("DRIVE_CONFIG").unwrap_or_else(|_| "drive.toml".to_string());
        if std::path::Path::new(&path).exists() {
            tracing::info!(%path, "loading config");
            Self::load(&path)
        } else {
            tracing::info!(%path, "no config file, using defaults");
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_engine_force: f32,
    /// Fraction of `max_engine_force` used when reversing
    pub reverse_ratio: f32,
    pub brake_force: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_engine_force: 6500.0,
            reverse_ratio: 0.5,
            brake_force: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Steering change per 1/60 s at full rate
    pub increment: f32,
    pub clamp: f32,
    /// Speed (units/s) above which the steering rate falls off
    pub reference_speed: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            increment: 0.1,
            clamp: 0.3,
            reference_speed: 8.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipRecoveryConfig {
    /// World-up component of the chassis up vector below which it counts as flipped
    pub up_threshold: f32,
    /// Seconds spent flipped before the chassis is reset
    pub timeout: f32,
    pub lift: f32,
}

impl Default for FlipRecoveryConfig {
    fn default() -> Self {
        Self {
            up_threshold: 0.2,
            timeout: 5.0,
            lift: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub mouse_sensitivity: f32,
    pub pitch_limit: f32,
    pub first_person_offset: Vec3,
    pub third_person_distance: f32,
    pub third_person_height: f32,
    /// Height above the candidate camera position the ground ray starts from
    pub ground_probe_height: f32,
    pub ground_clearance: f32,
    pub fov_y_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub start_in_first_person: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            mouse_sensitivity: 0.002,
            pitch_limit: std::f32::consts::FRAC_PI_3,
            first_person_offset: Vec3::new(0.4, 0.45, -0.2),
            third_person_distance: 5.0,
            third_person_height: 1.5,
            ground_probe_height: 10.0,
            ground_clearance: 0.5,
            fov_y_degrees: 75.0,
            z_near: 0.1,
            z_far: 1000.0,
            start_in_first_person: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub gravity: f32,
    /// Physics sub-steps per frame, independent of frame rate
    pub substeps: u32,
    /// Upper bound on the frame delta fed to the simulation
    pub max_frame_dt: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: -19.81,
            substeps: 4,
            max_frame_dt: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub spawn: Vec3,
    pub chassis_mass: f32,
    /// The chassis hull is a sphere of this radius scaled by `chassis_scale`
    pub chassis_radius: f32,
    pub chassis_scale: Vec3,
    /// Hull points below this local height are flattened onto it
    pub chassis_floor: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub wheel_radius: f32,
    pub wheel_width: f32,
    /// Half distance between left and right wheels
    pub wheel_half_track: f32,
    pub wheel_height: f32,
    pub front_axle_z: f32,
    pub rear_axle_z: f32,
    pub suspension: SuspensionConfig,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            spawn: Vec3::new(0.0, 1.0, 0.0),
            chassis_mass: 1000.0,
            chassis_radius: 2.0,
            chassis_scale: Vec3::new(0.6, 0.7, 1.0),
            chassis_floor: -0.5,
            linear_damping: 0.33,
            angular_damping: 0.33,
            wheel_radius: 0.3,
            wheel_width: 0.15,
            wheel_half_track: 0.75,
            wheel_height: 0.5,
            front_axle_z: 1.2,
            rear_axle_z: -1.3,
            suspension: SuspensionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspensionConfig {
    pub rest_length: f32,
    pub stiffness: f32,
    pub compression: f32,
    pub relaxation: f32,
    pub friction_slip: f32,
    pub max_force: f32,
    pub max_travel: f32,
}

impl Default for SuspensionConfig {
    fn default() -> Self {
        Self {
            rest_length: 1.0,
            stiffness: 30.0,
            compression: 1.0,
            relaxation: 10.0,
            friction_slip: 1000.0,
            max_force: 10000.0,
            max_travel: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallConfig {
    pub position: Vec3,
    pub radius: f32,
    pub mass: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    /// Centre of the ramp's low edge on the ground
    pub position: Vec3,
    pub width: f32,
    pub length: f32,
    pub height: f32,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 25.0),
            width: 6.0,
            length: 12.0,
            height: 2.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub ground_size: f32,
    pub ground_thickness: f32,
    pub ground_texture_repeat: f32,
    pub grass_texture: String,
    pub wheel_texture: String,
    pub balls: Vec<BallConfig>,
    pub ball_friction: f32,
    pub ball_restitution: f32,
    pub ramp: Option<RampConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let ball = |x: f32, mass: f32| BallConfig {
            position: Vec3::new(x, 0.0, 30.0),
            radius: 1.5,
            mass,
        };
        Self {
            ground_size: 265.0,
            ground_thickness: 0.1,
            ground_texture_repeat: 64.0,
            grass_texture: "textures/grass.png".to_string(),
            wheel_texture: "textures/wheel.png".to_string(),
            balls: vec![ball(-25.0, 1.0), ball(-30.0, 1000.0), ball(-35.0, 12000.0)],
            ball_friction: 1.0,
            ball_restitution: 0.6,
            ramp: Some(RampConfig::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
    pub sun_intensity: f32,
    /// Sun position relative to the vehicle; the sun always aims at the vehicle
    pub sun_offset: Vec3,
    pub fog_color: Vec3,
    pub fog_density: f32,
    pub sky_color: Vec3,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_color: Vec3::splat(64.0 / 255.0),
            ambient_intensity: 2.0,
            sun_intensity: 1.0,
            sun_offset: Vec3::new(-15.0, 90.0, -30.0),
            fog_color: Vec3::splat(0.8),
            fog_density: 0.007,
            sky_color: Vec3::new(0.53, 0.75, 0.92),
        }
    }
}
