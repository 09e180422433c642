use glam::{Quat, Vec3};
use rapier3d::control::{DynamicRayCastVehicleController, WheelTuning};
use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::*;

use crate::config::{VehicleConfig, WorldConfig};
use crate::controller::vehicle_controller::DriveCommand;
use crate::model::geometry::{self, Geometry};
use crate::model::pose::{BodyPose, VehiclePose, WheelPose, WheelRole};

/// Longest downward probe used for camera clamping
const MAX_PROBE_DISTANCE: Real = 1_000.0;

fn na_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

fn na_point(v: Vec3) -> Point<Real> {
    point![v.x, v.y, v.z]
}

fn to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn to_quat(q: &UnitQuaternion<Real>) -> Quat {
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

/// Rigid-body world: bodies, colliders and the pipeline that steps them.
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    substeps: u32,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            gravity: vector![0.0, config.gravity, 0.0],
            substeps: config.substeps.max(1),
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn insert(&mut self, body: RigidBody, collider: Collider) -> RigidBodyHandle {
        let handle = self.bodies.insert(body);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.query_pipeline.update(&self.colliders);
        handle
    }

    /// Fixed box, e.g. the ground slab
    pub fn add_fixed_cuboid(&mut self, center: Vec3, half_extents: Vec3) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(na_vector(center))
            .build();
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .friction(1.0)
            .build();
        self.insert(body, collider)
    }

    /// Fixed triangle mesh given in world coordinates
    pub fn add_fixed_trimesh(&mut self, geo: &Geometry) -> RigidBodyHandle {
        let vertices = geo.positions.iter().map(|p| na_point(*p)).collect();
        let body = RigidBodyBuilder::fixed().build();
        let collider = ColliderBuilder::trimesh(vertices, geo.triangles())
            .friction(1.0)
            .build();
        self.insert(body, collider)
    }

    pub fn add_dynamic_ball(
        &mut self,
        center: Vec3,
        radius: f32,
        mass: f32,
        friction: f32,
        restitution: f32,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(na_vector(center))
            .build();
        let collider = ColliderBuilder::ball(radius)
            .mass(mass)
            .friction(friction)
            .restitution(restitution)
            .build();
        self.insert(body, collider)
    }

    /// Dynamic body with a convex hull collider. None when the points are
    /// degenerate and no hull can be built.
    pub fn add_dynamic_hull(
        &mut self,
        center: Vec3,
        points: &[Vec3],
        mass: f32,
        linear_damping: f32,
        angular_damping: f32,
    ) -> Option<RigidBodyHandle> {
        let points: Vec<Point<Real>> = points.iter().map(|p| na_point(*p)).collect();
        let collider = ColliderBuilder::convex_hull(&points)?.mass(mass).build();
        let body = RigidBodyBuilder::dynamic()
            .translation(na_vector(center))
            .linear_damping(linear_damping)
            .angular_damping(angular_damping)
            .can_sleep(false)
            .build();
        Some(self.insert(body, collider))
    }

    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<BodyPose> {
        let body = self.bodies.get(handle)?;
        Some(BodyPose {
            position: to_vec3(body.translation()),
            rotation: to_quat(body.rotation()),
        })
    }

    /// Height of the first surface straight below `origin`
    pub fn ground_height_below(&self, origin: Vec3, exclude: Option<RigidBodyHandle>) -> Option<f32> {
        let ray = Ray::new(na_point(origin), vector![0.0, -1.0, 0.0]);
        let mut filter = QueryFilter::default();
        if let Some(handle) = exclude {
            filter = filter.exclude_rigid_body(handle);
        }
        self.query_pipeline
            .cast_ray(&self.bodies, &self.colliders, &ray, MAX_PROBE_DISTANCE, true, filter)
            .map(|(_, toi)| origin.y - toi)
    }

    /// Advance the world by `dt`, split into equal sub-steps. The vehicle's
    /// suspension and tyre forces are recomputed before every sub-step.
    pub fn step(&mut self, dt: f32, mut vehicle: Option<&mut Vehicle>) {
        if dt <= 0.0 {
            return;
        }
        let sub_dt = dt / self.substeps as f32;
        let params = IntegrationParameters {
            dt: sub_dt,
            ..IntegrationParameters::default()
        };

        for _ in 0..self.substeps {
            if let Some(vehicle) = vehicle.as_deref_mut() {
                let filter = QueryFilter::default().exclude_rigid_body(vehicle.chassis);
                vehicle.controller.update_vehicle(
                    sub_dt,
                    &mut self.bodies,
                    &self.colliders,
                    &self.query_pipeline,
                    filter,
                );
            }

            self.pipeline.step(
                &self.gravity,
                &params,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd,
                Some(&mut self.query_pipeline),
                &(),
                &(),
            );
        }
    }
}

/// Raycast vehicle: a dynamic chassis carried by four suspension rays.
pub struct Vehicle {
    pub chassis: RigidBodyHandle,
    controller: DynamicRayCastVehicleController,
    roles: Vec<WheelRole>,
}

impl Vehicle {
    pub fn spawn(world: &mut PhysicsWorld, config: &VehicleConfig) -> Option<Self> {
        let hull = geometry::chassis_hull_points(
            config.chassis_radius,
            config.chassis_scale,
            config.chassis_floor,
        );
        let chassis = world.add_dynamic_hull(
            config.spawn,
            &hull,
            config.chassis_mass,
            config.linear_damping,
            config.angular_damping,
        )?;

        let mut controller = DynamicRayCastVehicleController::new(chassis);
        controller.index_up_axis = 1;
        controller.index_forward_axis = 2;

        let s = &config.suspension;
        let tuning = WheelTuning {
            suspension_stiffness: s.stiffness,
            suspension_compression: s.compression,
            suspension_damping: s.relaxation,
            max_suspension_travel: s.max_travel,
            friction_slip: s.friction_slip,
            max_suspension_force: s.max_force,
            ..WheelTuning::default()
        };

        for role in WheelRole::ALL {
            controller.add_wheel(
                na_point(wheel_mount(config, role)),
                vector![0.0, -1.0, 0.0],
                vector![-1.0, 0.0, 0.0],
                s.rest_length,
                config.wheel_radius,
                &tuning,
            );
        }

        tracing::info!(?chassis, wheels = WheelRole::ALL.len(), "vehicle spawned");
        Some(Self {
            chassis,
            controller,
            roles: WheelRole::ALL.to_vec(),
        })
    }

    /// Engine force and brake act on all four wheels; only the front pair steers
    pub fn apply(&mut self, command: &DriveCommand) {
        for (wheel, role) in self.controller.wheels_mut().iter_mut().zip(&self.roles) {
            wheel.engine_force = command.engine_force;
            wheel.brake = command.brake_force;
            wheel.steering = if role.is_front() { command.steering } else { 0.0 };
        }
    }

    pub fn pose(&self, world: &PhysicsWorld) -> Option<VehiclePose> {
        let body = world.bodies.get(self.chassis)?;
        Some(VehiclePose {
            position: to_vec3(body.translation()),
            rotation: to_quat(body.rotation()),
            linear_velocity: to_vec3(body.linvel()),
        })
    }

    /// World transforms of the wheels, including steering and spin
    pub fn wheel_poses(&self, world: &PhysicsWorld) -> Vec<WheelPose> {
        let Some(body) = world.bodies.get(self.chassis) else {
            return Vec::new();
        };
        let chassis_rotation = to_quat(body.rotation());
        self.controller
            .wheels()
            .iter()
            .zip(&self.roles)
            .map(|(wheel, role)| {
                let steer = Quat::from_rotation_y(wheel.steering);
                let spin = Quat::from_rotation_x(-wheel.rotation);
                WheelPose {
                    role: *role,
                    pose: BodyPose {
                        position: Vec3::new(wheel.center().x, wheel.center().y, wheel.center().z),
                        rotation: (chassis_rotation * steer * spin).normalize(),
                    },
                }
            })
            .collect()
    }

    /// Put the chassis back on its wheels: lifted along world Y, upright,
    /// with all motion cancelled
    pub fn recover(&self, world: &mut PhysicsWorld, lift: f32) {
        let Some(body) = world.bodies.get_mut(self.chassis) else {
            return;
        };
        let t = *body.translation();
        body.set_position(Isometry::translation(t.x, t.y + lift, t.z), true);
        body.set_linvel(Vector::zeros(), true);
        body.set_angvel(Vector::zeros(), true);
        tracing::info!(x = t.x, y = t.y + lift, z = t.z, "vehicle recovered");
    }
}

/// Chassis-local suspension mount for a wheel. Right wheels sit on +X.
pub fn wheel_mount(config: &VehicleConfig, role: WheelRole) -> Vec3 {
    let x = if role.is_right() {
        config.wheel_half_track
    } else {
        -config.wheel_half_track
    };
    let z = if role.is_front() {
        config.front_axle_z
    } else {
        config.rear_axle_z
    };
    Vec3::new(x, config.wheel_height, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::na::Quaternion;

    fn set_rotation(world: &mut PhysicsWorld, handle: RigidBodyHandle, q: Quat) {
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z));
        world.bodies.get_mut(handle).unwrap().set_rotation(rotation, true);
    }

    fn flat_world() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(&WorldConfig::default());
        world.add_fixed_cuboid(Vec3::new(0.0, -0.1, 0.0), Vec3::new(132.5, 0.05, 132.5));
        world
    }

    fn run(world: &mut PhysicsWorld, vehicle: &mut Vehicle, frames: usize) {
        for _ in 0..frames {
            world.step(1.0 / 60.0, Some(vehicle));
        }
    }

    #[test]
    fn test_ground_probe_hits_top_surface() {
        let world = flat_world();
        let y = world.ground_height_below(Vec3::new(50.0, 20.0, -40.0), None);
        let y = y.expect("probe over the slab should hit");
        assert!((y + 0.05).abs() < 1e-3, "ground top at {y}");

        assert_eq!(world.ground_height_below(Vec3::new(500.0, 20.0, 0.0), None), None);
    }

    #[test]
    fn test_wheel_mounts_match_layout() {
        let cfg = VehicleConfig::default();
        assert_eq!(wheel_mount(&cfg, WheelRole::FrontRight), Vec3::new(0.75, 0.5, 1.2));
        assert_eq!(wheel_mount(&cfg, WheelRole::FrontLeft), Vec3::new(-0.75, 0.5, 1.2));
        assert_eq!(wheel_mount(&cfg, WheelRole::RearRight), Vec3::new(0.75, 0.5, -1.3));
        assert_eq!(wheel_mount(&cfg, WheelRole::RearLeft), Vec3::new(-0.75, 0.5, -1.3));
    }

    #[test]
    fn test_vehicle_settles_upright_on_suspension() {
        let mut world = flat_world();
        let mut vehicle = Vehicle::spawn(&mut world, &VehicleConfig::default()).unwrap();
        run(&mut world, &mut vehicle, 180);

        let pose = vehicle.pose(&world).unwrap();
        assert!(pose.position.y > 0.0 && pose.position.y < 1.5, "chassis at {:?}", pose.position);
        assert!(pose.up().y > 0.9, "chassis tipped: {:?}", pose.up());
        assert!(pose.speed() < 1.0, "still moving at {}", pose.speed());

        let wheels = vehicle.wheel_poses(&world);
        assert_eq!(wheels.len(), 4);
        for w in &wheels {
            assert!(w.pose.position.y > -0.2, "{} wheel below ground", w.role.label());
        }
    }

    #[test]
    fn test_engine_force_accelerates_vehicle() {
        let mut world = flat_world();
        let mut vehicle = Vehicle::spawn(&mut world, &VehicleConfig::default()).unwrap();
        run(&mut world, &mut vehicle, 60);

        vehicle.apply(&DriveCommand {
            engine_force: 6500.0,
            brake_force: 0.0,
            steering: 0.0,
        });
        run(&mut world, &mut vehicle, 90);
        let speed = vehicle.pose(&world).unwrap().speed();
        assert!(speed > 1.0, "speed after throttle {speed}");
    }

    #[test]
    fn test_steering_only_reaches_front_wheels() {
        let mut world = flat_world();
        let mut vehicle = Vehicle::spawn(&mut world, &VehicleConfig::default()).unwrap();
        vehicle.apply(&DriveCommand {
            engine_force: 100.0,
            brake_force: 5.0,
            steering: 0.25,
        });
        for (wheel, role) in vehicle.controller.wheels().iter().zip(&vehicle.roles) {
            assert_eq!(wheel.brake, 5.0);
            assert_eq!(wheel.engine_force, 100.0, "{} wheel must be driven", role.label());
            let expected = if role.is_front() { 0.25 } else { 0.0 };
            assert_eq!(wheel.steering, expected, "{} wheel steering", role.label());
        }
    }

    #[test]
    fn test_recover_lifts_and_rights_chassis() {
        let mut world = flat_world();
        let mut vehicle = Vehicle::spawn(&mut world, &VehicleConfig::default()).unwrap();
        run(&mut world, &mut vehicle, 30);
        set_rotation(&mut world, vehicle.chassis, Quat::from_rotation_z(std::f32::consts::PI));
        let before = vehicle.pose(&world).unwrap().position;

        vehicle.recover(&mut world, 2.0);
        let after = vehicle.pose(&world).unwrap();
        assert!((after.position.y - (before.y + 2.0)).abs() < 1e-4);
        assert!(after.rotation.abs_diff_eq(Quat::IDENTITY, 1e-5));
        assert_eq!(after.linear_velocity, Vec3::ZERO);
        let angvel = world.bodies.get(vehicle.chassis).unwrap().angvel().norm();
        assert_eq!(angvel, 0.0);
    }

    #[test]
    fn test_probe_can_skip_the_chassis() {
        let mut world = flat_world();
        let vehicle = Vehicle::spawn(&mut world, &VehicleConfig::default()).unwrap();
        let above = Vec3::new(0.0, 20.0, 0.0);
        let hit_roof = world.ground_height_below(above, None).unwrap();
        assert!(hit_roof > 1.0, "roof should be hit first, got {hit_roof}");
        let hit_ground = world.ground_height_below(above, Some(vehicle.chassis)).unwrap();
        assert!((hit_ground + 0.05).abs() < 1e-3);
    }
}
