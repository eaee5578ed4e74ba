use rand::Rng;
use std::ops::{Add, AddAssign, Div, Index, Mul, MulAssign, Neg, Sub};

/// A 3-component vector used for positions, directions, and colors.
///
/// Implements the standard arithmetic operators plus the geometric utilities
/// (dot, cross, reflection, refraction) needed for light transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

pub type Point3 = Vec3;
pub type Color = Vec3;

impl Vec3 {
    #[inline(always)]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline(always)]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[inline(always)]
    pub const fn ones() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    #[inline(always)]
    pub const fn unit_y() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    /// Squared Euclidean length — avoids the sqrt on hot paths such as
    /// BVH traversal and intersection culling.
    #[inline(always)]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    #[inline(always)]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Returns the unit vector. The caller must not pass a zero-length vector.
    #[inline(always)]
    pub fn normalized(self) -> Self {
        let len = self.length();
        debug_assert!(len > 1e-12, "attempted to normalize a zero-length vector");
        self / len
    }

    #[inline(always)]
    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[inline(always)]
    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Specular reflection of `self` about the surface normal `n`:
    /// I - 2·dot(I, N)·N.
    #[inline(always)]
    pub fn reflect(self, normal: Self) -> Self {
        self - normal * 2.0 * self.dot(normal)
    }

    /// Snell's law refraction. Returns `None` for total internal reflection,
    /// which occurs at grazing angles when leaving a denser medium.
    #[inline]
    pub fn refract(self, normal: Self, eta_ratio: f64) -> Option<Self> {
        let cos_theta = (-self).dot(normal).min(1.0);
        let r_perp = (self + normal * cos_theta) * eta_ratio;
        let discriminant = 1.0 - r_perp.length_squared();
        if discriminant < 0.0 {
            return None;
        }
        let r_parallel = normal * -(discriminant.sqrt());
        Some(r_perp + r_parallel)
    }

    /// Component-wise (Hadamard) product — color modulation where each
    /// channel is attenuated independently by the surface albedo.
    #[inline(always)]
    pub fn hadamard(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    /// Component-wise linear interpolation: self·(1-t) + other·t.
    #[inline(always)]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self * (1.0 - t) + other * t
    }

    /// True when every component is within 1e-8 of zero. Used to catch
    /// degenerate scatter directions before they produce NaN downstream.
    #[inline(always)]
    pub fn near_zero(self) -> bool {
        const EPS: f64 = 1e-8;
        self.x.abs() < EPS && self.y.abs() < EPS && self.z.abs() < EPS
    }

    /// Uniformly distributed random point inside the unit sphere via
    /// rejection sampling.
    pub fn random_in_unit_sphere<R: Rng>(rng: &mut R) -> Self {
        loop {
            let v = Self::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if v.length_squared() < 1.0 {
                return v;
            }
        }
    }

    /// Random unit vector; together with the surface normal this yields the
    /// cosine-weighted scatter distribution of a Lambertian surface.
    pub fn random_unit_vector<R: Rng>(rng: &mut R) -> Self {
        Self::random_in_unit_sphere(rng).normalized()
    }

    /// Random point on the unit disk — jitters the camera ray origin across
    /// the lens aperture for depth of field.
    pub fn random_in_unit_disk<R: Rng>(rng: &mut R) -> Self {
        loop {
            let v = Self::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0);
            if v.length_squared() < 1.0 {
                return v;
            }
        }
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, t: f64) -> Self {
        Self::new(self.x * t, self.y * t, self.z * t)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    #[inline(always)]
    fn mul(self, v: Vec3) -> Vec3 {
        v * self
    }
}

impl MulAssign<f64> for Vec3 {
    #[inline(always)]
    fn mul_assign(&mut self, t: f64) {
        self.x *= t;
        self.y *= t;
        self.z *= t;
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn div(self, t: f64) -> Self {
        let inv = 1.0 / t;
        Self::new(self.x * inv, self.y * inv, self.z * inv)
    }
}

impl Index<usize> for Vec3 {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Vec3 index out of bounds: {i}"),
        }
    }
}

// ─── Ray ────────────────────────────────────────────────────────────────────

/// A parametric ray R(t) = origin + t · direction, stamped with the shutter
/// time at which it was emitted. The time is fixed at construction and
/// carried through every bounce so that moving primitives are sampled
/// consistently along a single light path.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3,
    pub direction: Vec3,
    pub time: f64,
}

impl Ray {
    #[inline(always)]
    pub const fn new(origin: Point3, direction: Vec3, time: f64) -> Self {
        Self {
            origin,
            direction,
            time,
        }
    }

    /// Evaluates the ray at parameter t.
    #[inline(always)]
    pub fn at(self, t: f64) -> Point3 {
        self.origin + self.direction * t
    }
}

// ─── Axis-Aligned Bounding Box ──────────────────────────────────────────────

/// An axis-aligned bounding box used as the bounding volume in the BVH.
/// Intersection uses the slab method: the ray's parameter interval is
/// clipped against all three axis slabs and the box is hit iff the
/// interval stays non-empty.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Slab-method ray-box test over `[t_min, t_max]`. Per-axis slab bounds
    /// are swapped when the reciprocal direction is negative.
    pub fn hit(&self, ray: &Ray, mut t_min: f64, mut t_max: f64) -> bool {
        for axis in 0..3 {
            let inv_d = 1.0 / ray.direction[axis];
            let mut t0 = (self.min[axis] - ray.origin[axis]) * inv_d;
            let mut t1 = (self.max[axis] - ray.origin[axis]) * inv_d;
            if inv_d < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t0.max(t_min);
            t_max = t1.min(t_max);
            if t_max <= t_min {
                return false;
            }
        }
        true
    }

    /// Componentwise min/max envelope of two boxes — used during BVH
    /// construction to bound a set of children.
    pub fn surrounding(a: &Aabb, b: &Aabb) -> Aabb {
        let min = Point3::new(
            a.min.x.min(b.min.x),
            a.min.y.min(b.min.y),
            a.min.z.min(b.min.z),
        );
        let max = Point3::new(
            a.max.x.max(b.max.x),
            a.max.y.max(b.max.y),
            a.max.z.max(b.max.z),
        );
        Aabb::new(min, max)
    }

    /// True when `inner` lies entirely inside `self` (with tolerance).
    pub fn contains(&self, inner: &Aabb) -> bool {
        const EPS: f64 = 1e-9;
        (0..3).all(|axis| {
            self.min[axis] - EPS <= inner.min[axis] && inner.max[axis] <= self.max[axis] + EPS
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const EPS: f64 = 1e-12;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn normalize_is_idempotent() {
        let v = Vec3::new(3.0, -4.0, 12.0);
        let once = v.normalized();
        let twice = once.normalized();
        assert!(approx(once, twice));
        assert!((once.length() - 1.0).abs() < EPS);
    }

    #[test]
    fn near_zero_threshold() {
        assert!(Vec3::new(1e-9, -1e-9, 0.0).near_zero());
        assert!(!Vec3::new(1e-7, 0.0, 0.0).near_zero());
    }

    #[test]
    fn reflect_mirrors_across_normal() {
        let incoming = Vec3::new(1.0, -1.0, 0.0);
        let reflected = incoming.reflect(Vec3::unit_y());
        assert!(approx(reflected, Vec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn refract_reports_total_internal_reflection() {
        // Grazing incidence from a dense medium: eta·sinθ > 1.
        let incoming = Vec3::new(0.999, -0.045, 0.0).normalized();
        assert!(incoming.refract(Vec3::unit_y(), 1.5).is_none());
        // Near-normal incidence refracts.
        let steep = Vec3::new(0.1, -1.0, 0.0).normalized();
        assert!(steep.refract(Vec3::unit_y(), 1.5).is_some());
    }

    #[test]
    fn unit_sphere_samples_are_inside() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(Vec3::random_in_unit_sphere(&mut rng).length_squared() < 1.0);
        }
    }

    #[test]
    fn ray_at_walks_the_parametric_line() {
        let ray = Ray::new(Point3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0), 0.5);
        assert!(approx(ray.at(2.0), Point3::new(1.0, 4.0, 0.0)));
    }

    #[test]
    fn aabb_hit_handles_negative_direction() {
        let bbox = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Point3::new(5.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0), 0.0);
        assert!(bbox.hit(&ray, 0.001, f64::INFINITY));
        let miss = Ray::new(Point3::new(5.0, 3.0, 0.0), Vec3::new(-1.0, 0.0, 0.0), 0.0);
        assert!(!bbox.hit(&miss, 0.001, f64::INFINITY));
    }

    #[test]
    fn aabb_hit_respects_interval() {
        let bbox = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Point3::new(5.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0), 0.0);
        // Box lies beyond t_max.
        assert!(!bbox.hit(&ray, 0.001, 2.0));
    }

    #[test]
    fn surrounding_is_the_envelope() {
        let a = Aabb::new(Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Point3::new(0.0, -2.0, 0.0), Point3::new(3.0, 0.5, 1.0));
        let s = Aabb::surrounding(&a, &b);
        assert_eq!(s.min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(s.max, Point3::new(3.0, 1.0, 1.0));
        assert!(s.contains(&a) && s.contains(&b));
    }
}
