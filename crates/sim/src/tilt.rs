use glam::{Quat, Vec3};

/// Floor tilt: two axis-angle rotations composed into one unit
/// quaternion. The axes follow the camera so "push left" means left on
/// screen; the angles are what the input layer actually drives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tilt {
    pub x: Vec3,
    pub z: Vec3,
    pub rx: f32,
    pub rz: f32,
    q: Quat,
}

impl Tilt {
    pub fn new() -> Tilt {
        Tilt {
            x: Vec3::X,
            z: Vec3::Z,
            rx: 0.0,
            rz: 0.0,
            q: Quat::IDENTITY,
        }
    }

    /// Re-anchor the tilt axes, typically to the camera's ground-plane
    /// basis.
    pub fn set_axes(&mut self, x: Vec3, z: Vec3) {
        self.x = x.normalize_or(Vec3::X);
        self.z = z.normalize_or(Vec3::Z);
        self.recalc();
    }

    /// Set the two tilt angles, in degrees.
    pub fn set_angles(&mut self, rx: f32, rz: f32) {
        self.rx = rx;
        self.rz = rz;
        self.recalc();
    }

    fn recalc(&mut self) {
        let qx = Quat::from_axis_angle(self.x, self.rx.to_radians());
        let qz = Quat::from_axis_angle(self.z, self.rz.to_radians());
        // Renormalized every tick; drift would otherwise feed the
        // gravity vector.
        self.q = (qx * qz).normalize();
    }

    /// Rotate a world vector (gravity, in practice) into the tilted
    /// frame.
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        self.q * v
    }
}

impl Default for Tilt {
    fn default() -> Self {
        Tilt::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiltway_common::consts;

    #[test]
    fn zero_angles_leave_gravity_alone() {
        let t = Tilt::new();
        assert_eq!(t.rotate(consts::GRAVITY_DN), consts::GRAVITY_DN);
    }

    #[test]
    fn x_tilt_pushes_gravity_sideways() {
        let mut t = Tilt::new();
        t.set_angles(10.0, 0.0);
        let g = t.rotate(consts::GRAVITY_DN);
        // Rotation about +X moves the down vector in the z direction.
        assert!(g.z.abs() > 0.1);
        assert!(g.y < 0.0);
        assert!((g.length() - consts::GRAVITY_DN.length()).abs() < 1e-4);
    }

    #[test]
    fn axes_renormalize_on_set() {
        let mut t = Tilt::new();
        t.set_axes(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(t.x, Vec3::X);
        assert_eq!(t.z, Vec3::Z);
    }
}
