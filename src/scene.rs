use crate::camera::CameraConfig;
use crate::geometry::{self, Bvh, HitRecord, Primitive};
use crate::material::{Material, MaterialId};
use crate::math::{Color, Point3, Ray, Vec3};
use crate::texture::{Perlin, Texture, TextureId};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Shutter interval shared by scene construction (moving-sphere bounds)
/// and the camera (ray time sampling).
pub const SHUTTER_OPEN: f64 = 0.0;
pub const SHUTTER_CLOSE: f64 = 1.0;

/// An immutable, fully built world: texture, material, and primitive
/// arenas plus the BVH over the primitives. Built once per render and
/// shared read-only across the worker pool.
pub struct Scene {
    textures: Vec<Texture>,
    materials: Vec<Material>,
    primitives: Vec<Primitive>,
    bvh: Bvh,
}

impl Scene {
    /// Closest intersection via BVH traversal.
    pub fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<HitRecord> {
        self.bvh.hit(&self.primitives, ray, t_min, t_max)
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }

    /// The flat primitive arena; `geometry::hit_list` over this slice is
    /// the reference the BVH traversal must agree with.
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }
}

/// Accumulates arenas while a scene is assembled, then seals them behind
/// the BVH.
#[derive(Default)]
pub struct SceneBuilder {
    textures: Vec<Texture>,
    materials: Vec<Material>,
    primitives: Vec<Primitive>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() - 1)
    }

    pub fn solid(&mut self, color: Color) -> TextureId {
        self.add_texture(Texture::Solid { color })
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn lambertian(&mut self, color: Color) -> MaterialId {
        let albedo = self.solid(color);
        self.add_material(Material::Lambertian { albedo })
    }

    pub fn diffuse_light(&mut self, color: Color) -> MaterialId {
        let emit = self.solid(color);
        self.add_material(Material::DiffuseLight { emit })
    }

    pub fn add(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    /// Seals the scene: builds the BVH over everything added so far.
    pub fn build<R: Rng>(self, time0: f64, time1: f64, rng: &mut R) -> Scene {
        let bvh = Bvh::build(&self.primitives, time0, time1, rng);
        Scene {
            textures: self.textures,
            materials: self.materials,
            primitives: self.primitives,
            bvh,
        }
    }
}

// ─── Built-in Scenes ────────────────────────────────────────────────────────

/// Built-in scene selector. The discriminants are a stable wire contract:
/// 0 and 1 are the original pair, the rest exercise the remaining texture
/// and light types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SceneId {
    /// Random field of diffuse, metal, and glass spheres (some in motion)
    /// over a checkered ground.
    RandomSpheres,
    /// The classic Cornell box: colored walls, ceiling light, two rotated
    /// boxes.
    CornellBox,
    /// Two large checker-textured spheres.
    TwoSpheres,
    /// Perlin turbulence spheres.
    PerlinSpheres,
    /// An image-textured globe.
    Earth,
    /// Turbulence spheres lit only by a rectangle and a sphere light.
    SimpleLight,
}

impl SceneId {
    /// Resolves the numeric scene identifier carried by render requests.
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(SceneId::RandomSpheres),
            1 => Some(SceneId::CornellBox),
            2 => Some(SceneId::TwoSpheres),
            3 => Some(SceneId::PerlinSpheres),
            4 => Some(SceneId::Earth),
            5 => Some(SceneId::SimpleLight),
            _ => None,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            SceneId::RandomSpheres => 0,
            SceneId::CornellBox => 1,
            SceneId::TwoSpheres => 2,
            SceneId::PerlinSpheres => 3,
            SceneId::Earth => 4,
            SceneId::SimpleLight => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SceneId::RandomSpheres => "Random Spheres",
            SceneId::CornellBox => "Cornell Box",
            SceneId::TwoSpheres => "Two Spheres",
            SceneId::PerlinSpheres => "Perlin Spheres",
            SceneId::Earth => "Earth",
            SceneId::SimpleLight => "Simple Light",
        }
    }

    /// Builds the immutable world for this scene. All randomness (object
    /// placement, Perlin tables, BVH split axes) flows from `seed`, so a
    /// given (scene, seed) pair always produces the same world.
    pub fn build(self, seed: u64) -> Scene {
        let mut rng = SmallRng::seed_from_u64(seed);
        let builder = match self {
            SceneId::RandomSpheres => random_spheres(&mut rng),
            SceneId::CornellBox => cornell_box(),
            SceneId::TwoSpheres => two_spheres(),
            SceneId::PerlinSpheres => perlin_spheres(&mut rng),
            SceneId::Earth => earth(),
            SceneId::SimpleLight => simple_light(&mut rng),
        };
        builder.build(SHUTTER_OPEN, SHUTTER_CLOSE, &mut rng)
    }

    /// Camera parameters the scene was composed for; the JSON scene
    /// configuration can override them.
    pub fn default_camera(self) -> CameraConfig {
        match self {
            SceneId::RandomSpheres => CameraConfig {
                aperture: 0.1,
                ..CameraConfig::default()
            },
            SceneId::CornellBox => CameraConfig {
                look_from: Point3::new(278.0, 278.0, -800.0),
                look_at: Point3::new(278.0, 278.0, 0.0),
                vfov_degrees: 40.0,
                ..CameraConfig::default()
            },
            SceneId::TwoSpheres | SceneId::PerlinSpheres | SceneId::Earth => {
                CameraConfig::default()
            }
            SceneId::SimpleLight => CameraConfig {
                look_from: Point3::new(26.0, 3.0, 6.0),
                look_at: Point3::new(0.0, 2.0, 0.0),
                ..CameraConfig::default()
            },
        }
    }

    /// Background radiance for rays that leave the world. Enclosed or
    /// self-lit scenes default to black.
    pub fn default_background(self) -> Color {
        match self {
            SceneId::CornellBox | SceneId::SimpleLight => Color::zero(),
            _ => Color::new(0.70, 0.80, 1.00),
        }
    }
}

fn random_spheres(rng: &mut SmallRng) -> SceneBuilder {
    let mut world = SceneBuilder::new();

    let even = world.solid(Color::new(0.2, 0.3, 0.1));
    let odd = world.solid(Color::new(0.9, 0.9, 0.9));
    let checker = world.add_texture(Texture::Checker { even, odd });
    let ground = world.add_material(Material::Lambertian { albedo: checker });
    world.add(Primitive::sphere(
        Point3::new(0.0, -1000.0, 0.0),
        1000.0,
        ground,
    ));

    for a in -11..11 {
        for b in -11..11 {
            let center = Point3::new(
                a as f64 + 0.9 * rng.gen::<f64>(),
                0.2,
                b as f64 + 0.9 * rng.gen::<f64>(),
            );
            if (center - Point3::new(4.0, 0.2, 0.0)).length() <= 0.9 {
                continue;
            }

            let choose_mat: f64 = rng.gen();
            if choose_mat < 0.8 {
                let albedo = Color::new(
                    rng.gen::<f64>() * rng.gen::<f64>(),
                    rng.gen::<f64>() * rng.gen::<f64>(),
                    rng.gen::<f64>() * rng.gen::<f64>(),
                );
                let material = world.lambertian(albedo);
                // Diffuse spheres drift upward during the shutter interval.
                let center1 = center + Vec3::new(0.0, rng.gen_range(0.0..0.5), 0.0);
                world.add(Primitive::moving_sphere(
                    center,
                    center1,
                    SHUTTER_OPEN,
                    SHUTTER_CLOSE,
                    0.2,
                    material,
                ));
            } else if choose_mat < 0.95 {
                let albedo = Color::new(
                    rng.gen_range(0.5..1.0),
                    rng.gen_range(0.5..1.0),
                    rng.gen_range(0.5..1.0),
                );
                let fuzz = rng.gen_range(0.0..0.5);
                let material = world.add_material(Material::metal(albedo, fuzz));
                world.add(Primitive::sphere(center, 0.2, material));
            } else {
                let material = world.add_material(Material::Dielectric { ior: 1.5 });
                world.add(Primitive::sphere(center, 0.2, material));
            }
        }
    }

    let glass = world.add_material(Material::Dielectric { ior: 1.5 });
    world.add(Primitive::sphere(Point3::new(0.0, 1.0, 0.0), 1.0, glass));

    let matte = world.lambertian(Color::new(0.4, 0.2, 0.1));
    world.add(Primitive::sphere(Point3::new(-4.0, 1.0, 0.0), 1.0, matte));

    let steel = world.add_material(Material::metal(Color::new(0.7, 0.6, 0.5), 0.0));
    world.add(Primitive::sphere(Point3::new(4.0, 1.0, 0.0), 1.0, steel));

    world
}

fn cornell_box() -> SceneBuilder {
    let mut world = SceneBuilder::new();

    let red = world.lambertian(Color::new(0.65, 0.05, 0.05));
    let white = world.lambertian(Color::new(0.73, 0.73, 0.73));
    let green = world.lambertian(Color::new(0.12, 0.45, 0.15));
    let light = world.diffuse_light(Color::new(15.0, 15.0, 15.0));

    world.add(Primitive::yz_rect(0.0, 555.0, 0.0, 555.0, 555.0, green));
    world.add(Primitive::yz_rect(0.0, 555.0, 0.0, 555.0, 0.0, red));
    world.add(Primitive::xz_rect(213.0, 343.0, 227.0, 332.0, 554.0, light));
    world.add(Primitive::xz_rect(0.0, 555.0, 0.0, 555.0, 0.0, white));
    world.add(Primitive::xz_rect(0.0, 555.0, 0.0, 555.0, 555.0, white));
    world.add(Primitive::xy_rect(0.0, 555.0, 0.0, 555.0, 555.0, white));

    let tall = Primitive::cuboid(
        Point3::zero(),
        Point3::new(165.0, 330.0, 165.0),
        white,
    );
    world.add(Primitive::translate(
        Primitive::rotate_y(tall, 15.0),
        Vec3::new(265.0, 0.0, 295.0),
    ));

    let short = Primitive::cuboid(
        Point3::zero(),
        Point3::new(165.0, 165.0, 165.0),
        white,
    );
    world.add(Primitive::translate(
        Primitive::rotate_y(short, -18.0),
        Vec3::new(130.0, 0.0, 65.0),
    ));

    world
}

fn two_spheres() -> SceneBuilder {
    let mut world = SceneBuilder::new();

    let even = world.solid(Color::new(0.2, 0.3, 0.1));
    let odd = world.solid(Color::new(0.9, 0.9, 0.9));
    let checker = world.add_texture(Texture::Checker { even, odd });
    let material = world.add_material(Material::Lambertian { albedo: checker });

    world.add(Primitive::sphere(Point3::new(0.0, -10.0, 0.0), 10.0, material));
    world.add(Primitive::sphere(Point3::new(0.0, 10.0, 0.0), 10.0, material));

    world
}

fn perlin_spheres(rng: &mut SmallRng) -> SceneBuilder {
    let mut world = SceneBuilder::new();

    let noise = world.add_texture(Texture::Noise {
        perlin: Perlin::new(rng),
        scale: 4.0,
    });
    let material = world.add_material(Material::Lambertian { albedo: noise });

    world.add(Primitive::sphere(
        Point3::new(0.0, -1000.0, 0.0),
        1000.0,
        material,
    ));
    world.add(Primitive::sphere(Point3::new(0.0, 2.0, 0.0), 2.0, material));

    world
}

fn earth() -> SceneBuilder {
    let mut world = SceneBuilder::new();

    let globe_texture = world.add_texture(Texture::load_image(Path::new("assets/earthmap.jpg")));
    let surface = world.add_material(Material::Lambertian {
        albedo: globe_texture,
    });
    world.add(Primitive::sphere(Point3::zero(), 2.0, surface));

    world
}

fn simple_light(rng: &mut SmallRng) -> SceneBuilder {
    let mut world = perlin_spheres(rng);

    let lamp = world.diffuse_light(Color::new(4.0, 4.0, 4.0));
    world.add(Primitive::xy_rect(3.0, 5.0, 1.0, 3.0, -2.0, lamp));
    world.add(Primitive::sphere(Point3::new(0.0, 7.0, 0.0), 2.0, lamp));

    world
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_scene_ids_are_stable() {
        assert_eq!(SceneId::from_index(0), Some(SceneId::RandomSpheres));
        assert_eq!(SceneId::from_index(1), Some(SceneId::CornellBox));
        assert_eq!(SceneId::from_index(99), None);
        for index in 0..6 {
            let scene = SceneId::from_index(index).unwrap();
            assert_eq!(scene.index(), index);
        }
    }

    #[test]
    fn every_scene_builds_nonempty() {
        for index in 0..6 {
            let id = SceneId::from_index(index).unwrap();
            let scene = id.build(7);
            assert!(
                !scene.primitives().is_empty(),
                "{} built empty",
                id.name()
            );
        }
    }

    #[test]
    fn scene_construction_is_deterministic_per_seed() {
        let a = SceneId::RandomSpheres.build(99);
        let b = SceneId::RandomSpheres.build(99);
        assert_eq!(a.primitives().len(), b.primitives().len());
        let ray = Ray::new(Point3::new(13.0, 2.0, 3.0), Vec3::new(-13.0, -1.0, -3.0), 0.5);
        let ha = a.hit(&ray, 0.001, f64::INFINITY);
        let hb = b.hit(&ray, 0.001, f64::INFINITY);
        assert_eq!(ha.map(|h| h.t), hb.map(|h| h.t));
    }

    #[test]
    fn cornell_box_is_enclosed() {
        let scene = SceneId::CornellBox.build(1);
        // A ray from the camera toward the box interior must hit something.
        let ray = Ray::new(
            Point3::new(278.0, 278.0, -800.0),
            Vec3::new(0.0, 0.0, 1.0),
            0.0,
        );
        assert!(scene.hit(&ray, 0.001, f64::INFINITY).is_some());
    }

    #[test]
    fn builder_hands_out_sequential_handles() {
        let mut builder = SceneBuilder::new();
        let a = builder.solid(Color::zero());
        let b = builder.solid(Color::ones());
        assert_ne!(a, b);
        let m1 = builder.lambertian(Color::ones());
        let m2 = builder.diffuse_light(Color::ones());
        assert_ne!(m1, m2);
    }
}
