//! Static layout of the driving scene: ground slab, loose balls and a ramp.

use glam::Vec3;
use rapier3d::prelude::RigidBodyHandle;

use crate::config::{LightingConfig, SceneConfig};
use crate::controller::physics::PhysicsWorld;
use crate::model::geometry::{self, Geometry};
use crate::model::pose::{BodyPose, WheelRole};

/// What a drawable node represents. The renderer keys its nodes by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Ground,
    Ramp,
    Chassis,
    Wheel(WheelRole),
    Ball(usize),
}

pub struct Ball {
    pub handle: RigidBodyHandle,
    pub radius: f32,
}

pub struct SceneLayout {
    pub ground_half_extents: Vec3,
    pub ground_center: Vec3,
    pub balls: Vec<Ball>,
    /// World-space ramp mesh, shared by its collider and its visual
    pub ramp: Option<Geometry>,
}

impl SceneLayout {
    /// Insert the scene's bodies into `world`
    pub fn build(world: &mut PhysicsWorld, config: &SceneConfig) -> Self {
        let half = config.ground_size * 0.5;
        let ground_half_extents = Vec3::new(half, config.ground_thickness * 0.5, half);
        // top face sits half a slab below y = 0
        let ground_center = Vec3::new(0.0, -config.ground_thickness, 0.0);
        world.add_fixed_cuboid(ground_center, ground_half_extents);

        let balls = config
            .balls
            .iter()
            .map(|b| Ball {
                handle: world.add_dynamic_ball(
                    b.position,
                    b.radius,
                    b.mass,
                    config.ball_friction,
                    config.ball_restitution,
                ),
                radius: b.radius,
            })
            .collect::<Vec<_>>();

        let ramp = config.ramp.as_ref().map(|r| {
            let geo = geometry::ramp(r.position, r.width, r.length, r.height);
            world.add_fixed_trimesh(&geo);
            geo
        });

        tracing::info!(
            balls = balls.len(),
            ramp = ramp.is_some(),
            bodies = world.body_count(),
            "scene built"
        );

        Self {
            ground_half_extents,
            ground_center,
            balls,
            ramp,
        }
    }

    pub fn ball_poses(&self, world: &PhysicsWorld) -> Vec<BodyPose> {
        self.balls
            .iter()
            .map(|b| world.body_pose(b.handle).unwrap_or(BodyPose::IDENTITY))
            .collect()
    }

    pub fn ground_top(&self) -> f32 {
        self.ground_center.y + self.ground_half_extents.y
    }
}

/// Directional light that follows the vehicle so the lit area travels with it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sun {
    pub position: Vec3,
    /// Unit vector the light travels along
    pub direction: Vec3,
}

impl Sun {
    pub fn following(target: Vec3, lighting: &LightingConfig) -> Self {
        let position = target + lighting.sun_offset;
        Self {
            position,
            direction: (target - position).try_normalize().unwrap_or(Vec3::NEG_Y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;

    #[test]
    fn test_default_scene_bodies() {
        let mut world = PhysicsWorld::new(&WorldConfig::default());
        let layout = SceneLayout::build(&mut world, &SceneConfig::default());
        // ground, three balls, ramp
        assert_eq!(world.body_count(), 5);
        assert_eq!(layout.balls.len(), 3);
        assert!((layout.ground_top() + 0.05).abs() < 1e-6);

        let poses = layout.ball_poses(&world);
        assert_eq!(poses[0].position, Vec3::new(-25.0, 0.0, 30.0));
        assert_eq!(poses[2].position, Vec3::new(-35.0, 0.0, 30.0));
    }

    #[test]
    fn test_ramp_is_solid() {
        let mut world = PhysicsWorld::new(&WorldConfig::default());
        let cfg = SceneConfig::default();
        let layout = SceneLayout::build(&mut world, &cfg);
        assert!(layout.ramp.is_some());

        // the high end of the ramp stands above the ground
        let ramp = cfg.ramp.unwrap();
        let probe = ramp.position + Vec3::new(0.0, 20.0, ramp.length - 0.5);
        let hit = world.ground_height_below(probe, None).unwrap();
        assert!(hit > 2.0, "ramp top at {hit}");
    }

    #[test]
    fn test_scene_without_ramp_or_balls() {
        let mut world = PhysicsWorld::new(&WorldConfig::default());
        let cfg = SceneConfig {
            balls: Vec::new(),
            ramp: None,
            ..SceneConfig::default()
        };
        let layout = SceneLayout::build(&mut world, &cfg);
        assert_eq!(world.body_count(), 1);
        assert!(layout.ball_poses(&world).is_empty());
    }

    #[test]
    fn test_sun_aims_at_target() {
        let target = Vec3::new(10.0, 0.5, -3.0);
        let sun = Sun::following(target, &LightingConfig::default());
        assert_eq!(sun.position, target + Vec3::new(-15.0, 90.0, -30.0));
        assert!(sun.direction.y < -0.9);
        assert!((sun.direction.length() - 1.0).abs() < 1e-5);
    }
}
