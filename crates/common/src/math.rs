use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Linear interpolation between two scalars.
pub fn flerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Smoothstep easing on `[0, 1]`.
pub fn smooth(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Orthonormal orientation basis: three body axes in world coordinates.
///
/// Kept as explicit axes rather than a quaternion because the simulation
/// spins it incrementally from angular velocity, while interpolation
/// converts through a quaternion for spherical blending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Basis {
    pub x: Vec3,
    pub y: Vec3,
    pub z: Vec3,
}

impl Basis {
    pub const IDENTITY: Basis = Basis {
        x: Vec3::X,
        y: Vec3::Y,
        z: Vec3::Z,
    };

    /// Rebuild a basis from its first two axes, deriving the third.
    ///
    /// This is the on-wire form of an orientation: the third axis is
    /// redundant and recomputed on receipt.
    pub fn from_xy(x: Vec3, y: Vec3) -> Basis {
        let mut b = Basis {
            x,
            y,
            z: x.cross(y),
        };
        b.orthonormalize();
        b
    }

    pub fn from_quat(q: Quat) -> Basis {
        let m = Mat3::from_quat(q);
        Basis {
            x: m.x_axis,
            y: m.y_axis,
            z: m.z_axis,
        }
    }

    pub fn to_quat(&self) -> Quat {
        Quat::from_mat3(&Mat3::from_cols(self.x, self.y, self.z))
    }

    /// Spin the basis by angular velocity `w` (axis scaled by rad/s) over `dt`.
    pub fn rotate(&mut self, w: Vec3, dt: f32) {
        let speed = w.length();
        if speed > f32::EPSILON {
            let q = Quat::from_axis_angle(w / speed, speed * dt);
            self.x = q * self.x;
            self.y = q * self.y;
            self.z = q * self.z;
            self.orthonormalize();
        }
    }

    /// Re-square the axes. Incremental rotation drifts; this keeps the
    /// basis a rotation matrix.
    pub fn orthonormalize(&mut self) {
        self.x = self.x.normalize();
        self.z = self.x.cross(self.y).normalize();
        self.y = self.z.cross(self.x);
    }

    /// Spherical blend between two bases.
    pub fn slerp(a: &Basis, b: &Basis, t: f32) -> Basis {
        Basis::from_quat(a.to_quat().slerp(b.to_quat(), t))
    }
}

impl Default for Basis {
    fn default() -> Self {
        Basis::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_vec3_near(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-5, "{a:?} != {b:?}");
    }

    #[test]
    fn flerp_endpoints() {
        assert_eq!(flerp(2.0, 6.0, 0.0), 2.0);
        assert_eq!(flerp(2.0, 6.0, 1.0), 6.0);
        assert_eq!(flerp(2.0, 6.0, 0.5), 4.0);
    }

    #[test]
    fn smooth_is_monotone_on_unit_interval() {
        assert_eq!(smooth(0.0), 0.0);
        assert_eq!(smooth(1.0), 1.0);
        let mut prev = 0.0;
        for i in 1..=10 {
            let v = smooth(i as f32 / 10.0);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn quarter_turn_about_y() {
        let mut b = Basis::IDENTITY;
        b.rotate(Vec3::Y, FRAC_PI_2);
        assert_vec3_near(b.x, -Vec3::Z);
        assert_vec3_near(b.y, Vec3::Y);
        assert_vec3_near(b.z, Vec3::X);
    }

    #[test]
    fn quat_round_trip() {
        let mut b = Basis::IDENTITY;
        b.rotate(Vec3::new(0.3, 1.0, -0.2), 0.7);
        let rt = Basis::from_quat(b.to_quat());
        assert_vec3_near(rt.x, b.x);
        assert_vec3_near(rt.y, b.y);
        assert_vec3_near(rt.z, b.z);
    }

    #[test]
    fn slerp_endpoints_are_exact_orientations() {
        let a = Basis::IDENTITY;
        let mut b = Basis::IDENTITY;
        b.rotate(Vec3::X, 1.2);
        let at0 = Basis::slerp(&a, &b, 0.0);
        let at1 = Basis::slerp(&a, &b, 1.0);
        assert_vec3_near(at0.y, a.y);
        assert_vec3_near(at1.y, b.y);
    }

    #[test]
    fn stays_orthonormal_under_many_rotations() {
        let mut b = Basis::IDENTITY;
        for i in 0..1000 {
            b.rotate(Vec3::new(1.0, 0.3 * i as f32, -0.5), 0.01);
        }
        assert!((b.x.length() - 1.0).abs() < 1e-4);
        assert!(b.x.dot(b.y).abs() < 1e-4);
        assert!(b.x.dot(b.z).abs() < 1e-4);
    }

    #[test]
    fn from_xy_derives_third_axis() {
        let b = Basis::from_xy(Vec3::X, Vec3::Y);
        assert_vec3_near(b.z, Vec3::Z);
    }
}
