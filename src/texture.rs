use crate::math::{Color, Point3, Vec3};
use rand::Rng;
use std::path::Path;

/// Handle into the scene's texture arena. Textures are shared between
/// materials by index so the built scene stays `Send + Sync` without
/// reference counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureId(pub(crate) usize);

/// Closed set of procedural and sampled textures. Sampling dispatches on
/// the variant once per call; sub-textures (checker) are resolved through
/// the same arena slice.
pub enum Texture {
    /// Constant color regardless of inputs.
    Solid { color: Color },
    /// 3-D checker: the sign of sin(10x)·sin(10y)·sin(10z) in world
    /// coordinates selects between the two sub-textures.
    Checker { even: TextureId, odd: TextureId },
    /// Marble-like pattern: scaled sine of Z phase-shifted by Perlin
    /// turbulence.
    Noise { perlin: Perlin, scale: f64 },
    /// Nearest-neighbor image lookup. `None` marks a failed load and
    /// samples as debug cyan.
    Image { data: Option<ImageData> },
}

/// 8-bit RGB pixel grid decoded from an image file.
pub struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Texture {
    /// Loads an image texture from disk. A missing or unreadable file is
    /// not fatal: the error is logged and the texture samples as cyan.
    pub fn load_image(path: &Path) -> Texture {
        match image::open(path) {
            Ok(img) => {
                let rgb = img.to_rgb8();
                let (width, height) = (rgb.width(), rgb.height());
                Texture::Image {
                    data: Some(ImageData {
                        width,
                        height,
                        pixels: rgb.into_raw(),
                    }),
                }
            }
            Err(err) => {
                log::error!("could not load texture image {}: {err}", path.display());
                Texture::Image { data: None }
            }
        }
    }
}

/// Samples the texture `id` out of the arena slice at surface coordinates
/// `(u, v)` and world-space `point`.
pub fn sample(textures: &[Texture], id: TextureId, u: f64, v: f64, point: Point3) -> Color {
    match &textures[id.0] {
        Texture::Solid { color } => *color,
        Texture::Checker { even, odd } => {
            let sines =
                (10.0 * point.x).sin() * (10.0 * point.y).sin() * (10.0 * point.z).sin();
            if sines < 0.0 {
                sample(textures, *odd, u, v, point)
            } else {
                sample(textures, *even, u, v, point)
            }
        }
        Texture::Noise { perlin, scale } => {
            Color::ones() * 0.5 * (1.0 + (scale * point.z + 10.0 * perlin.turb(point)).sin())
        }
        Texture::Image { data: None } => Color::new(0.0, 1.0, 1.0),
        Texture::Image { data: Some(img) } => {
            let u = u.clamp(0.0, 1.0);
            let v = 1.0 - v.clamp(0.0, 1.0);

            let i = ((u * img.width as f64) as u32).min(img.width - 1);
            let j = ((v * img.height as f64) as u32).min(img.height - 1);

            let idx = ((j * img.width + i) * 3) as usize;
            let scale = 1.0 / 255.0;
            Color::new(
                scale * img.pixels[idx] as f64,
                scale * img.pixels[idx + 1] as f64,
                scale * img.pixels[idx + 2] as f64,
            )
        }
    }
}

// ─── Perlin Noise ───────────────────────────────────────────────────────────

const POINT_COUNT: usize = 256;

/// Lattice gradient noise: 256 random unit vectors indexed through three
/// XOR-composed axis permutations, trilinearly interpolated with Hermite
/// smoothing. Output is in roughly [-1, 1].
pub struct Perlin {
    ran_vec: Vec<Vec3>,
    perm_x: Vec<usize>,
    perm_y: Vec<usize>,
    perm_z: Vec<usize>,
}

impl Perlin {
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let ran_vec = (0..POINT_COUNT)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                )
                .normalized()
            })
            .collect();

        Perlin {
            ran_vec,
            perm_x: Self::generate_perm(rng),
            perm_y: Self::generate_perm(rng),
            perm_z: Self::generate_perm(rng),
        }
    }

    pub fn noise(&self, point: Point3) -> f64 {
        let u = point.x - point.x.floor();
        let v = point.y - point.y.floor();
        let w = point.z - point.z.floor();

        let i = point.x.floor() as i64;
        let j = point.y.floor() as i64;
        let k = point.z.floor() as i64;

        let mut c = [[[Vec3::zero(); 2]; 2]; 2];
        for (di, plane) in c.iter_mut().enumerate() {
            for (dj, row) in plane.iter_mut().enumerate() {
                for (dk, cell) in row.iter_mut().enumerate() {
                    let xi = self.perm_x[((i + di as i64) & 255) as usize];
                    let yi = self.perm_y[((j + dj as i64) & 255) as usize];
                    let zi = self.perm_z[((k + dk as i64) & 255) as usize];
                    *cell = self.ran_vec[xi ^ yi ^ zi];
                }
            }
        }

        Self::interpolate(&c, u, v, w)
    }

    /// 7-octave self-similar turbulence: each term halves the weight and
    /// doubles the sample point. Returns the absolute value of the sum.
    pub fn turb(&self, point: Point3) -> f64 {
        const DEPTH: usize = 7;
        let mut accum = 0.0;
        let mut temp = point;
        let mut weight = 1.0;

        for _ in 0..DEPTH {
            accum += weight * self.noise(temp);
            weight *= 0.5;
            temp *= 2.0;
        }

        accum.abs()
    }

    fn generate_perm<R: Rng>(rng: &mut R) -> Vec<usize> {
        let mut p: Vec<usize> = (0..POINT_COUNT).collect();
        for i in (1..POINT_COUNT).rev() {
            let target = rng.gen_range(0..=i);
            p.swap(i, target);
        }
        p
    }

    fn interpolate(c: &[[[Vec3; 2]; 2]; 2], u: f64, v: f64, w: f64) -> f64 {
        // Hermite smoothing removes the grid-aligned banding of plain
        // trilinear interpolation.
        let uu = u * u * (3.0 - 2.0 * u);
        let vv = v * v * (3.0 - 2.0 * v);
        let ww = w * w * (3.0 - 2.0 * w);
        let mut accum = 0.0;

        for (i, plane) in c.iter().enumerate() {
            for (j, row) in plane.iter().enumerate() {
                for (k, cell) in row.iter().enumerate() {
                    let (fi, fj, fk) = (i as f64, j as f64, k as f64);
                    let weight = Vec3::new(u - fi, v - fj, w - fk);
                    accum += (fi * uu + (1.0 - fi) * (1.0 - uu))
                        * (fj * vv + (1.0 - fj) * (1.0 - vv))
                        * (fk * ww + (1.0 - fk) * (1.0 - ww))
                        * cell.dot(weight);
                }
            }
        }

        accum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn arena() -> (Vec<Texture>, TextureId, TextureId) {
        let mut textures = vec![
            Texture::Solid {
                color: Color::new(0.9, 0.9, 0.9),
            },
            Texture::Solid {
                color: Color::new(0.1, 0.1, 0.1),
            },
        ];
        let even = TextureId(0);
        let odd = TextureId(1);
        textures.push(Texture::Checker { even, odd });
        (textures, even, odd)
    }

    #[test]
    fn solid_ignores_coordinates() {
        let textures = vec![Texture::Solid {
            color: Color::new(0.2, 0.4, 0.6),
        }];
        let a = sample(&textures, TextureId(0), 0.0, 0.0, Point3::zero());
        let b = sample(&textures, TextureId(0), 0.7, 0.3, Point3::new(5.0, -2.0, 9.0));
        assert_eq!(a, Color::new(0.2, 0.4, 0.6));
        assert_eq!(a, b);
    }

    #[test]
    fn checker_follows_the_sign_of_sines() {
        let (textures, _, _) = arena();
        let checker = TextureId(2);
        // sin(0.5)³ > 0 → even.
        let even = sample(&textures, checker, 0.0, 0.0, Point3::new(0.05, 0.05, 0.05));
        assert_eq!(even, Color::new(0.9, 0.9, 0.9));
        // One negative factor flips the sign → odd.
        let odd = sample(&textures, checker, 0.0, 0.0, Point3::new(-0.05, 0.05, 0.05));
        assert_eq!(odd, Color::new(0.1, 0.1, 0.1));
    }

    #[test]
    fn missing_image_samples_as_cyan() {
        let tex = Texture::load_image(Path::new("definitely/not/a/real/file.png"));
        let textures = vec![tex];
        let c = sample(&textures, TextureId(0), 0.5, 0.5, Point3::zero());
        assert_eq!(c, Color::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn noise_texture_stays_in_unit_range() {
        let mut rng = SmallRng::seed_from_u64(42);
        let textures = vec![Texture::Noise {
            perlin: Perlin::new(&mut rng),
            scale: 4.0,
        }];
        for i in 0..50 {
            let p = Point3::new(i as f64 * 0.37, i as f64 * -0.11, i as f64 * 0.73);
            let c = sample(&textures, TextureId(0), 0.0, 0.0, p);
            assert!((0.0..=1.0).contains(&c.x), "out of range at {p:?}: {c:?}");
            assert_eq!(c.x, c.y);
            assert_eq!(c.y, c.z);
        }
    }

    #[test]
    fn turbulence_is_non_negative() {
        let mut rng = SmallRng::seed_from_u64(9);
        let perlin = Perlin::new(&mut rng);
        for i in 0..50 {
            let p = Point3::new(i as f64 * 0.53, 1.3, i as f64 * -0.29);
            assert!(perlin.turb(p) >= 0.0);
        }
    }

    #[test]
    fn perlin_noise_is_deterministic_per_seed() {
        let mut a = SmallRng::seed_from_u64(123);
        let mut b = SmallRng::seed_from_u64(123);
        let pa = Perlin::new(&mut a);
        let pb = Perlin::new(&mut b);
        let p = Point3::new(1.7, 2.9, -0.4);
        assert_eq!(pa.noise(p), pb.noise(p));
    }
}
