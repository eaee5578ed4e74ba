use crate::geometry::HitRecord;
use crate::math::{Color, Point3, Ray, Vec3};
use crate::texture::{self, Texture, TextureId};
use rand::Rng;

/// Handle into the scene's material arena. Primitives store this instead of
/// a shared pointer so the scene can be sent across the worker pool freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialId(pub(crate) usize);

/// Result of a successful scatter: the continuation ray and the color
/// attenuation applied to whatever radiance it brings back.
pub struct Scatter {
    pub ray: Ray,
    pub attenuation: Color,
}

/// Closed set of surface models. Each variant importance-samples its own
/// BRDF lobe; emission defaults to black for everything but lights.
pub enum Material {
    /// Ideal diffuse reflector with a textured albedo.
    Lambertian { albedo: TextureId },
    /// Mirror reflection perturbed by `fuzz · unit-sphere sample`.
    Metal { albedo: Color, fuzz: f64 },
    /// Clear refractive surface (glass, water) with Schlick reflectance.
    Dielectric { ior: f64 },
    /// Area light: emits its texture value and never scatters.
    DiffuseLight { emit: TextureId },
}

impl Material {
    pub fn metal(albedo: Color, fuzz: f64) -> Self {
        Material::Metal {
            albedo,
            fuzz: fuzz.min(1.0),
        }
    }

    /// Samples the scattered continuation ray for `ray` hitting the surface
    /// described by `hit`. `None` means the path terminates here (absorbed,
    /// or the surface only emits). The scattered ray inherits the incoming
    /// ray's shutter time.
    pub fn scatter<R: Rng>(
        &self,
        textures: &[Texture],
        ray: &Ray,
        hit: &HitRecord,
        rng: &mut R,
    ) -> Option<Scatter> {
        match self {
            Material::Lambertian { albedo } => {
                let mut scatter_dir = hit.normal + Vec3::random_unit_vector(rng);
                if scatter_dir.near_zero() {
                    scatter_dir = hit.normal;
                }
                Some(Scatter {
                    ray: Ray::new(hit.point, scatter_dir, ray.time),
                    attenuation: texture::sample(textures, *albedo, hit.u, hit.v, hit.point),
                })
            }
            Material::Metal { albedo, fuzz } => {
                let reflected = ray.direction.normalized().reflect(hit.normal);
                let scattered = Ray::new(
                    hit.point,
                    reflected + Vec3::random_in_unit_sphere(rng) * *fuzz,
                    ray.time,
                );
                // Fuzzing can push the direction below the surface; those
                // paths are absorbed.
                if scattered.direction.dot(hit.normal) > 0.0 {
                    Some(Scatter {
                        ray: scattered,
                        attenuation: *albedo,
                    })
                } else {
                    None
                }
            }
            Material::Dielectric { ior } => {
                let eta_ratio = if hit.front_face { 1.0 / ior } else { *ior };
                let unit_dir = ray.direction.normalized();
                let cos_theta = (-unit_dir).dot(hit.normal).min(1.0);
                let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

                let cannot_refract = eta_ratio * sin_theta > 1.0;
                let direction = if cannot_refract
                    || schlick_reflectance(cos_theta, eta_ratio) > rng.gen()
                {
                    unit_dir.reflect(hit.normal)
                } else {
                    unit_dir
                        .refract(hit.normal, eta_ratio)
                        .unwrap_or_else(|| unit_dir.reflect(hit.normal))
                };

                Some(Scatter {
                    ray: Ray::new(hit.point, direction, ray.time),
                    attenuation: Color::ones(),
                })
            }
            Material::DiffuseLight { .. } => None,
        }
    }

    /// Emitted radiance at the hit point; black for everything but lights.
    pub fn emitted(&self, textures: &[Texture], u: f64, v: f64, point: Point3) -> Color {
        match self {
            Material::DiffuseLight { emit } => texture::sample(textures, *emit, u, v, point),
            _ => Color::zero(),
        }
    }
}

/// Schlick's polynomial approximation of Fresnel reflectance.
fn schlick_reflectance(cosine: f64, ref_idx: f64) -> f64 {
    let r0 = ((1.0 - ref_idx) / (1.0 + ref_idx)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn solid(color: Color) -> Vec<Texture> {
        vec![Texture::Solid { color }]
    }

    fn hit_at(point: Point3, normal: Vec3, front_face: bool) -> HitRecord {
        HitRecord {
            point,
            normal,
            t: 1.0,
            u: 0.5,
            v: 0.5,
            front_face,
            material: MaterialId(0),
        }
    }

    fn incoming(direction: Vec3) -> Ray {
        Ray::new(Point3::new(0.0, 1.0, 0.0) - direction, direction, 0.25)
    }

    #[test]
    fn lambertian_always_scatters_from_the_hit_point() {
        let textures = solid(Color::new(0.6, 0.3, 0.1));
        let material = Material::Lambertian {
            albedo: TextureId(0),
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let hit = hit_at(Point3::new(0.0, 1.0, 0.0), Vec3::unit_y(), true);
        for _ in 0..50 {
            let ray = incoming(Vec3::new(0.3, -1.0, 0.2));
            let s = material
                .scatter(&textures, &ray, &hit, &mut rng)
                .expect("lambertian must always scatter");
            assert_eq!(s.ray.origin, hit.point);
            assert_eq!(s.attenuation, Color::new(0.6, 0.3, 0.1));
            assert_eq!(s.ray.time, ray.time);
        }
    }

    #[test]
    fn metal_with_zero_fuzz_is_an_ideal_mirror() {
        let material = Material::metal(Color::ones(), 0.0);
        let mut rng = SmallRng::seed_from_u64(2);
        let hit = hit_at(Point3::zero(), Vec3::unit_y(), true);
        let ray = incoming(Vec3::new(1.0, -1.0, 0.0).normalized());
        let s = material.scatter(&[], &ray, &hit, &mut rng).unwrap();
        let expected = ray.direction.normalized().reflect(hit.normal);
        assert!((s.ray.direction - expected).length() < 1e-12);
        assert!((s.ray.direction.length() - ray.direction.normalized().length()).abs() < 1e-12);
    }

    #[test]
    fn metal_absorbs_directions_below_the_surface() {
        // fuzz = 1 with a grazing reflection can leave the hemisphere; run
        // many samples and require every accepted scatter to stay above it.
        let material = Material::metal(Color::ones(), 1.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let hit = hit_at(Point3::zero(), Vec3::unit_y(), true);
        let ray = incoming(Vec3::new(1.0, -0.02, 0.0).normalized());
        let mut absorbed = 0;
        for _ in 0..200 {
            match material.scatter(&[], &ray, &hit, &mut rng) {
                Some(s) => assert!(s.ray.direction.dot(hit.normal) > 0.0),
                None => absorbed += 1,
            }
        }
        assert!(absorbed > 0, "grazing fuzz should absorb some paths");
    }

    #[test]
    fn metal_fuzz_is_clamped_to_one() {
        match Material::metal(Color::ones(), 7.5) {
            Material::Metal { fuzz, .. } => assert_eq!(fuzz, 1.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn dielectric_attenuation_is_white() {
        let material = Material::Dielectric { ior: 1.5 };
        let mut rng = SmallRng::seed_from_u64(4);
        let hit = hit_at(Point3::zero(), Vec3::unit_y(), true);
        let ray = incoming(Vec3::new(0.2, -1.0, 0.1).normalized());
        for _ in 0..50 {
            let s = material.scatter(&[], &ray, &hit, &mut rng).unwrap();
            assert_eq!(s.attenuation, Color::ones());
        }
    }

    #[test]
    fn dielectric_reflects_at_grazing_exit() {
        // Leaving the dense medium (front_face = false) at a shallow angle:
        // eta·sinθ > 1 forces the total-internal-reflection branch.
        let material = Material::Dielectric { ior: 1.5 };
        let mut rng = SmallRng::seed_from_u64(5);
        let hit = hit_at(Point3::zero(), Vec3::unit_y(), false);
        let direction = Vec3::new(0.9, -0.2, 0.0).normalized();
        let ray = incoming(direction);
        let expected = direction.reflect(hit.normal);
        for _ in 0..50 {
            let s = material.scatter(&[], &ray, &hit, &mut rng).unwrap();
            assert!((s.ray.direction - expected).length() < 1e-12);
        }
    }

    #[test]
    fn diffuse_light_emits_and_never_scatters() {
        let textures = solid(Color::new(4.0, 4.0, 4.0));
        let material = Material::DiffuseLight {
            emit: TextureId(0),
        };
        let mut rng = SmallRng::seed_from_u64(6);
        let hit = hit_at(Point3::zero(), Vec3::unit_y(), true);
        let ray = incoming(Vec3::new(0.0, -1.0, 0.0));
        assert!(material.scatter(&textures, &ray, &hit, &mut rng).is_none());
        assert_eq!(
            material.emitted(&textures, 0.5, 0.5, Point3::zero()),
            Color::new(4.0, 4.0, 4.0)
        );
        // Non-emissive materials default to black.
        let lambertian = Material::Lambertian {
            albedo: TextureId(0),
        };
        assert_eq!(
            lambertian.emitted(&textures, 0.5, 0.5, Point3::zero()),
            Color::zero()
        );
    }

    #[test]
    fn schlick_matches_endpoints() {
        // Normal incidence reduces to r0; grazing incidence approaches 1.
        let r0 = ((1.0 - 1.5f64) / (1.0 + 1.5)).powi(2);
        assert!((schlick_reflectance(1.0, 1.5) - r0).abs() < 1e-12);
        assert!(schlick_reflectance(0.0, 1.5) > 0.99);
    }
}
