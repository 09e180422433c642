//! Procedural shapes shared by physics colliders and visual meshes.

use std::f32::consts::PI;

use glam::Vec3;

/// Indexed triangle list. Triangles wind counter-clockwise seen from outside.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangles(&self) -> Vec<[u32; 3]> {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect()
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: [f32; 2]) -> u32 {
        let idx = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        idx
    }

    /// Flat-shaded triangle, normal taken from the winding
    fn push_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) {
        let n = (b - a).cross(c - a).normalize_or_zero();
        let i0 = self.push_vertex(a, n, [0.0, 0.0]);
        let i1 = self.push_vertex(b, n, [1.0, 0.0]);
        let i2 = self.push_vertex(c, n, [1.0, 1.0]);
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    /// Flat-shaded quad split along a-c
    fn push_quad(&mut self, a: Vec3, b: Vec3, c: Vec3, d: Vec3, uv_scale: f32) {
        let n = (b - a).cross(c - a).normalize_or_zero();
        let s = uv_scale;
        let i0 = self.push_vertex(a, n, [0.0, 0.0]);
        let i1 = self.push_vertex(b, n, [s, 0.0]);
        let i2 = self.push_vertex(c, n, [s, s]);
        let i3 = self.push_vertex(d, n, [0.0, s]);
        self.indices.extend_from_slice(&[i0, i1, i2, i0, i2, i3]);
    }

    /// Non-uniform scale; normals are corrected with the inverse transpose
    pub fn scaled(mut self, scale: Vec3) -> Self {
        let inv = scale.recip();
        for p in &mut self.positions {
            *p *= scale;
        }
        for n in &mut self.normals {
            *n = (*n * inv).normalize_or_zero();
        }
        self
    }
}

/// Latitude/longitude sphere centred on the origin
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> Geometry {
    let ws = width_segments.max(3);
    let hs = height_segments.max(2);
    let mut geo = Geometry::default();

    for iy in 0..=hs {
        let v = iy as f32 / hs as f32;
        for ix in 0..=ws {
            let u = ix as f32 / ws as f32;
            let dir = Vec3::new(
                -(u * 2.0 * PI).cos() * (v * PI).sin(),
                (v * PI).cos(),
                (u * 2.0 * PI).sin() * (v * PI).sin(),
            );
            geo.push_vertex(dir * radius, dir, [u, 1.0 - v]);
        }
    }

    let row = ws + 1;
    for iy in 0..hs {
        for ix in 0..ws {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            if iy != 0 {
                geo.indices.extend_from_slice(&[a, b, d]);
            }
            if iy != hs - 1 {
                geo.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    geo
}

/// Axis-aligned box centred on the origin. Each face's UVs span `[0, uv_repeat]`.
pub fn cuboid(half_extents: Vec3, uv_repeat: f32) -> Geometry {
    let h = half_extents;
    let mut geo = Geometry::default();
    // (normal, u, v) with u x v == normal
    let faces = [
        (Vec3::X * h.x, Vec3::Y * h.y, Vec3::Z * h.z),
        (Vec3::NEG_X * h.x, Vec3::Z * h.z, Vec3::Y * h.y),
        (Vec3::Y * h.y, Vec3::Z * h.z, Vec3::X * h.x),
        (Vec3::NEG_Y * h.y, Vec3::X * h.x, Vec3::Z * h.z),
        (Vec3::Z * h.z, Vec3::X * h.x, Vec3::Y * h.y),
        (Vec3::NEG_Z * h.z, Vec3::Y * h.y, Vec3::X * h.x),
    ];
    for (n, u, v) in faces {
        geo.push_quad(n - u - v, n + u - v, n + u + v, n - u + v, uv_repeat);
    }
    geo
}

/// Wheel-shaped cylinder whose axis runs along X
pub fn cylinder_x(radius: f32, width: f32, segments: u32) -> Geometry {
    let segments = segments.max(3);
    let half = width * 0.5;
    let mut geo = Geometry::default();

    let ring = |i: u32| {
        let t = i as f32 / segments as f32 * 2.0 * PI;
        (t.cos(), t.sin(), i as f32 / segments as f32)
    };

    for i in 0..segments {
        let (c0, s0, u0) = ring(i);
        let (c1, s1, u1) = ring(i + 1);
        let n0 = Vec3::new(0.0, c0, s0);
        let n1 = Vec3::new(0.0, c1, s1);
        let a = geo.push_vertex(Vec3::new(-half, c0 * radius, s0 * radius), n0, [u0, 0.0]);
        let b = geo.push_vertex(Vec3::new(half, c0 * radius, s0 * radius), n0, [u0, 1.0]);
        let c = geo.push_vertex(Vec3::new(half, c1 * radius, s1 * radius), n1, [u1, 1.0]);
        let d = geo.push_vertex(Vec3::new(-half, c1 * radius, s1 * radius), n1, [u1, 0.0]);
        geo.indices.extend_from_slice(&[a, c, b, a, d, c]);
    }

    for (x, normal) in [(half, Vec3::X), (-half, Vec3::NEG_X)] {
        let centre = geo.push_vertex(Vec3::new(x, 0.0, 0.0), normal, [0.5, 0.5]);
        for i in 0..segments {
            let (c0, s0, _) = ring(i);
            let (c1, s1, _) = ring(i + 1);
            let p0 = geo.push_vertex(
                Vec3::new(x, c0 * radius, s0 * radius),
                normal,
                [0.5 + 0.5 * c0, 0.5 + 0.5 * s0],
            );
            let p1 = geo.push_vertex(
                Vec3::new(x, c1 * radius, s1 * radius),
                normal,
                [0.5 + 0.5 * c1, 0.5 + 0.5 * s1],
            );
            if normal.x > 0.0 {
                geo.indices.extend_from_slice(&[centre, p0, p1]);
            } else {
                geo.indices.extend_from_slice(&[centre, p1, p0]);
            }
        }
    }
    geo
}

/// Wedge rising along +Z from its low edge at `base` to `height` over `length`
pub fn ramp(base: Vec3, width: f32, length: f32, height: f32) -> Geometry {
    let hw = width * 0.5;
    let p0 = base + Vec3::new(-hw, 0.0, 0.0);
    let p1 = base + Vec3::new(hw, 0.0, 0.0);
    let p2 = base + Vec3::new(hw, height, length);
    let p3 = base + Vec3::new(-hw, height, length);
    let p4 = base + Vec3::new(hw, 0.0, length);
    let p5 = base + Vec3::new(-hw, 0.0, length);

    let mut geo = Geometry::default();
    geo.push_quad(p0, p3, p2, p1, 1.0); // slope
    geo.push_quad(p5, p4, p2, p3, 1.0); // back wall
    geo.push_quad(p0, p1, p4, p5, 1.0); // underside
    geo.push_triangle(p1, p2, p4);
    geo.push_triangle(p0, p5, p3);
    geo
}

/// Convex hull points for the chassis: a scaled sphere with a flat underside
pub fn chassis_hull_points(radius: f32, scale: Vec3, floor: f32) -> Vec<Vec3> {
    uv_sphere(radius, 12, 12)
        .scaled(scale)
        .positions
        .into_iter()
        .map(|p| Vec3::new(p.x, p.y.max(floor), p.z))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward(geo: &Geometry, centre: Vec3) {
        for tri in geo.triangles() {
            let [a, b, c] = tri.map(|i| geo.positions[i as usize]);
            let n = (b - a).cross(c - a);
            let mid = (a + b + c) / 3.0;
            if n.length_squared() < 1e-12 {
                continue; // sphere poles produce slivers
            }
            assert!(n.dot(mid - centre) > 0.0, "triangle {tri:?} faces inward");
        }
    }

    #[test]
    fn test_sphere_counts_and_radius() {
        let geo = uv_sphere(2.0, 12, 12);
        assert_eq!(geo.vertex_count(), 13 * 13);
        assert_eq!(geo.indices.len(), (12 * 12 * 2 - 2 * 12) * 3);
        for p in &geo.positions {
            assert!((p.length() - 2.0).abs() < 1e-4);
        }
        assert_outward(&geo, Vec3::ZERO);
    }

    #[test]
    fn test_cuboid_faces_outward() {
        let geo = cuboid(Vec3::new(3.0, 0.05, 3.0), 1.0);
        assert_eq!(geo.indices.len(), 36);
        assert_outward(&geo, Vec3::ZERO);
        for (p, n) in geo.positions.iter().zip(&geo.normals) {
            assert!(p.dot(*n) > 0.0);
        }
    }

    #[test]
    fn test_wheel_cylinder_faces_outward() {
        let geo = cylinder_x(0.3, 0.15, 12);
        assert_outward(&geo, Vec3::ZERO);
        for p in &geo.positions {
            assert!(p.x.abs() <= 0.075 + 1e-6);
        }
    }

    #[test]
    fn test_ramp_slope_faces_up() {
        let base = Vec3::new(0.0, 0.0, 25.0);
        let geo = ramp(base, 6.0, 12.0, 2.5);
        assert_outward(&geo, base + Vec3::new(0.0, 0.8, 8.0));
        assert!(geo.normals[0].y > 0.9, "first quad is the slope");
        let top = geo.positions.iter().map(|p| p.y).fold(f32::MIN, f32::max);
        assert!((top - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_chassis_hull_is_flattened() {
        let points = chassis_hull_points(2.0, Vec3::new(0.6, 0.7, 1.0), -0.5);
        let lowest = points.iter().map(|p| p.y).fold(f32::MAX, f32::min);
        let highest = points.iter().map(|p| p.y).fold(f32::MIN, f32::max);
        assert_eq!(lowest, -0.5);
        assert!((highest - 1.4).abs() < 1e-4);
        let longest = points.iter().map(|p| p.z.abs()).fold(0.0, f32::max);
        assert!(longest <= 2.0 + 1e-4);
    }
}
