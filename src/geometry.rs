use crate::material::MaterialId;
use crate::math::{Aabb, Point3, Ray, Vec3};
use rand::Rng;
use std::cmp::Ordering;

/// Padding applied to the degenerate axis of an axis-aligned rectangle's
/// bounding box so the BVH slab test has non-zero width to clip against.
const RECT_PAD: f64 = 1e-4;

// ─── Hit Record ─────────────────────────────────────────────────────────────

/// Populated by a primitive on a successful intersection. The stored normal
/// always points against the incoming ray; `front_face` preserves the
/// geometric orientation so dielectrics can tell entering from leaving.
#[derive(Debug, Clone, Copy)]
pub struct HitRecord {
    pub point: Point3,
    pub normal: Vec3,
    pub t: f64,
    pub u: f64,
    pub v: f64,
    pub front_face: bool,
    pub material: MaterialId,
}

impl HitRecord {
    pub fn set_face_normal(&mut self, ray: &Ray, outward_normal: Vec3) {
        self.front_face = ray.direction.dot(outward_normal) < 0.0;
        self.normal = if self.front_face {
            outward_normal
        } else {
            -outward_normal
        };
    }
}

// ─── Primitives ─────────────────────────────────────────────────────────────

/// Closed set of renderable shapes. One match dispatch per intersection
/// query; transform wrappers nest an inner primitive and compose with the
/// BVH through `bounding_box`.
pub enum Primitive {
    Sphere {
        center: Point3,
        radius: f64,
        material: MaterialId,
    },
    /// Sphere whose center moves linearly between two shutter endpoints.
    MovingSphere {
        center0: Point3,
        center1: Point3,
        time0: f64,
        time1: f64,
        radius: f64,
        material: MaterialId,
    },
    /// Rectangle in the plane z = k spanning [x0,x1]×[y0,y1].
    XyRect {
        x0: f64,
        x1: f64,
        y0: f64,
        y1: f64,
        k: f64,
        material: MaterialId,
    },
    /// Rectangle in the plane y = k spanning [x0,x1]×[z0,z1].
    XzRect {
        x0: f64,
        x1: f64,
        z0: f64,
        z1: f64,
        k: f64,
        material: MaterialId,
    },
    /// Rectangle in the plane x = k spanning [y0,y1]×[z0,z1].
    YzRect {
        y0: f64,
        y1: f64,
        z0: f64,
        z1: f64,
        k: f64,
        material: MaterialId,
    },
    /// Axis-aligned box assembled from six rectangles; intersection is the
    /// closest hit over the sides.
    Cuboid {
        min: Point3,
        max: Point3,
        sides: Vec<Primitive>,
    },
    /// Shifts the inner primitive by `offset` without touching its geometry:
    /// the incoming ray is moved by -offset, the hit point moved back.
    Translate {
        inner: Box<Primitive>,
        offset: Vec3,
    },
    /// Rotates the inner primitive about the Y axis. Sin/cos and the world
    /// bounding box are precomputed at construction.
    RotateY {
        inner: Box<Primitive>,
        sin_theta: f64,
        cos_theta: f64,
        bbox: Option<Aabb>,
    },
}

impl Primitive {
    pub fn sphere(center: Point3, radius: f64, material: MaterialId) -> Self {
        Primitive::Sphere {
            center,
            radius,
            material,
        }
    }

    pub fn moving_sphere(
        center0: Point3,
        center1: Point3,
        time0: f64,
        time1: f64,
        radius: f64,
        material: MaterialId,
    ) -> Self {
        Primitive::MovingSphere {
            center0,
            center1,
            time0,
            time1,
            radius,
            material,
        }
    }

    pub fn xy_rect(x0: f64, x1: f64, y0: f64, y1: f64, k: f64, material: MaterialId) -> Self {
        Primitive::XyRect {
            x0,
            x1,
            y0,
            y1,
            k,
            material,
        }
    }

    pub fn xz_rect(x0: f64, x1: f64, z0: f64, z1: f64, k: f64, material: MaterialId) -> Self {
        Primitive::XzRect {
            x0,
            x1,
            z0,
            z1,
            k,
            material,
        }
    }

    pub fn yz_rect(y0: f64, y1: f64, z0: f64, z1: f64, k: f64, material: MaterialId) -> Self {
        Primitive::YzRect {
            y0,
            y1,
            z0,
            z1,
            k,
            material,
        }
    }

    pub fn cuboid(min: Point3, max: Point3, material: MaterialId) -> Self {
        let sides = vec![
            Primitive::xy_rect(min.x, max.x, min.y, max.y, max.z, material),
            Primitive::xy_rect(min.x, max.x, min.y, max.y, min.z, material),
            Primitive::xz_rect(min.x, max.x, min.z, max.z, max.y, material),
            Primitive::xz_rect(min.x, max.x, min.z, max.z, min.y, material),
            Primitive::yz_rect(min.y, max.y, min.z, max.z, max.x, material),
            Primitive::yz_rect(min.y, max.y, min.z, max.z, min.x, material),
        ];
        Primitive::Cuboid { min, max, sides }
    }

    pub fn translate(inner: Primitive, offset: Vec3) -> Self {
        Primitive::Translate {
            inner: Box::new(inner),
            offset,
        }
    }

    pub fn rotate_y(inner: Primitive, degrees: f64) -> Self {
        let radians = degrees.to_radians();
        let sin_theta = radians.sin();
        let cos_theta = radians.cos();
        let bbox = inner.bounding_box(0.0, 1.0).map(|b| {
            let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
            let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
            // Envelope of the eight rotated corners.
            for i in 0..2 {
                for j in 0..2 {
                    for k in 0..2 {
                        let x = i as f64 * b.max.x + (1 - i) as f64 * b.min.x;
                        let y = j as f64 * b.max.y + (1 - j) as f64 * b.min.y;
                        let z = k as f64 * b.max.z + (1 - k) as f64 * b.min.z;

                        let new_x = cos_theta * x + sin_theta * z;
                        let new_z = -sin_theta * x + cos_theta * z;

                        min.x = min.x.min(new_x);
                        max.x = max.x.max(new_x);
                        min.y = min.y.min(y);
                        max.y = max.y.max(y);
                        min.z = min.z.min(new_z);
                        max.z = max.z.max(new_z);
                    }
                }
            }
            Aabb::new(min, max)
        });

        Primitive::RotateY {
            inner: Box::new(inner),
            sin_theta,
            cos_theta,
            bbox,
        }
    }

    /// Intersects `ray` against this primitive over `[t_min, t_max]`.
    pub fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<HitRecord> {
        match self {
            Primitive::Sphere {
                center,
                radius,
                material,
            } => sphere_hit(*center, *radius, *material, ray, t_min, t_max),
            Primitive::MovingSphere {
                center0,
                center1,
                time0,
                time1,
                radius,
                material,
            } => {
                let center = center0.lerp(*center1, (ray.time - time0) / (time1 - time0));
                sphere_hit(center, *radius, *material, ray, t_min, t_max)
            }
            Primitive::XyRect {
                x0,
                x1,
                y0,
                y1,
                k,
                material,
            } => {
                let t = (k - ray.origin.z) / ray.direction.z;
                // `contains` also rejects the NaN/±inf produced by a ray
                // parallel to the plane.
                if !(t_min..=t_max).contains(&t) {
                    return None;
                }
                let x = ray.origin.x + t * ray.direction.x;
                let y = ray.origin.y + t * ray.direction.y;
                if x < *x0 || x > *x1 || y < *y0 || y > *y1 {
                    return None;
                }
                let mut rec = HitRecord {
                    point: ray.at(t),
                    normal: Vec3::new(0.0, 0.0, 1.0),
                    t,
                    u: (x - x0) / (x1 - x0),
                    v: (y - y0) / (y1 - y0),
                    front_face: true,
                    material: *material,
                };
                rec.set_face_normal(ray, Vec3::new(0.0, 0.0, 1.0));
                Some(rec)
            }
            Primitive::XzRect {
                x0,
                x1,
                z0,
                z1,
                k,
                material,
            } => {
                let t = (k - ray.origin.y) / ray.direction.y;
                if !(t_min..=t_max).contains(&t) {
                    return None;
                }
                let x = ray.origin.x + t * ray.direction.x;
                let z = ray.origin.z + t * ray.direction.z;
                if x < *x0 || x > *x1 || z < *z0 || z > *z1 {
                    return None;
                }
                let mut rec = HitRecord {
                    point: ray.at(t),
                    normal: Vec3::new(0.0, 1.0, 0.0),
                    t,
                    u: (x - x0) / (x1 - x0),
                    v: (z - z0) / (z1 - z0),
                    front_face: true,
                    material: *material,
                };
                rec.set_face_normal(ray, Vec3::new(0.0, 1.0, 0.0));
                Some(rec)
            }
            Primitive::YzRect {
                y0,
                y1,
                z0,
                z1,
                k,
                material,
            } => {
                let t = (k - ray.origin.x) / ray.direction.x;
                if !(t_min..=t_max).contains(&t) {
                    return None;
                }
                let y = ray.origin.y + t * ray.direction.y;
                let z = ray.origin.z + t * ray.direction.z;
                if y < *y0 || y > *y1 || z < *z0 || z > *z1 {
                    return None;
                }
                let mut rec = HitRecord {
                    point: ray.at(t),
                    normal: Vec3::new(1.0, 0.0, 0.0),
                    t,
                    u: (y - y0) / (y1 - y0),
                    v: (z - z0) / (z1 - z0),
                    front_face: true,
                    material: *material,
                };
                rec.set_face_normal(ray, Vec3::new(1.0, 0.0, 0.0));
                Some(rec)
            }
            Primitive::Cuboid { sides, .. } => hit_list(sides, ray, t_min, t_max),
            Primitive::Translate { inner, offset } => {
                let moved = Ray::new(ray.origin - *offset, ray.direction, ray.time);
                let mut rec = inner.hit(&moved, t_min, t_max)?;
                rec.point += *offset;
                Some(rec)
            }
            Primitive::RotateY {
                inner,
                sin_theta,
                cos_theta,
                ..
            } => {
                // World → object: rotate by -θ.
                let origin = Point3::new(
                    cos_theta * ray.origin.x - sin_theta * ray.origin.z,
                    ray.origin.y,
                    sin_theta * ray.origin.x + cos_theta * ray.origin.z,
                );
                let direction = Vec3::new(
                    cos_theta * ray.direction.x - sin_theta * ray.direction.z,
                    ray.direction.y,
                    sin_theta * ray.direction.x + cos_theta * ray.direction.z,
                );
                let rotated = Ray::new(origin, direction, ray.time);

                let mut rec = inner.hit(&rotated, t_min, t_max)?;

                // Object → world: rotate the hit point and normal back by +θ.
                let point = Point3::new(
                    cos_theta * rec.point.x + sin_theta * rec.point.z,
                    rec.point.y,
                    -sin_theta * rec.point.x + cos_theta * rec.point.z,
                );
                let normal = Vec3::new(
                    cos_theta * rec.normal.x + sin_theta * rec.normal.z,
                    rec.normal.y,
                    -sin_theta * rec.normal.x + cos_theta * rec.normal.z,
                );
                rec.point = point;
                rec.set_face_normal(&rotated, normal);
                Some(rec)
            }
        }
    }

    /// Bounding box over the shutter interval, where one exists.
    pub fn bounding_box(&self, time0: f64, time1: f64) -> Option<Aabb> {
        match self {
            Primitive::Sphere { center, radius, .. } => {
                let r = Vec3::new(radius.abs(), radius.abs(), radius.abs());
                Some(Aabb::new(*center - r, *center + r))
            }
            Primitive::MovingSphere {
                center0,
                center1,
                time0: t0,
                time1: t1,
                radius,
                ..
            } => {
                let r = Vec3::new(radius.abs(), radius.abs(), radius.abs());
                let at = |t: f64| center0.lerp(*center1, (t - t0) / (t1 - t0));
                let (c0, c1) = (at(time0), at(time1));
                let box0 = Aabb::new(c0 - r, c0 + r);
                let box1 = Aabb::new(c1 - r, c1 + r);
                Some(Aabb::surrounding(&box0, &box1))
            }
            Primitive::XyRect {
                x0, x1, y0, y1, k, ..
            } => Some(Aabb::new(
                Point3::new(*x0, *y0, k - RECT_PAD),
                Point3::new(*x1, *y1, k + RECT_PAD),
            )),
            Primitive::XzRect {
                x0, x1, z0, z1, k, ..
            } => Some(Aabb::new(
                Point3::new(*x0, k - RECT_PAD, *z0),
                Point3::new(*x1, k + RECT_PAD, *z1),
            )),
            Primitive::YzRect {
                y0, y1, z0, z1, k, ..
            } => Some(Aabb::new(
                Point3::new(k - RECT_PAD, *y0, *z0),
                Point3::new(k + RECT_PAD, *y1, *z1),
            )),
            Primitive::Cuboid { min, max, .. } => Some(Aabb::new(*min, *max)),
            Primitive::Translate { inner, offset } => inner
                .bounding_box(time0, time1)
                .map(|b| Aabb::new(b.min + *offset, b.max + *offset)),
            Primitive::RotateY { bbox, .. } => *bbox,
        }
    }
}

/// Shared sphere intersection: half-b quadratic, nearest root in range,
/// outward normal oriented against the ray, spherical UV.
fn sphere_hit(
    center: Point3,
    radius: f64,
    material: MaterialId,
    ray: &Ray,
    t_min: f64,
    t_max: f64,
) -> Option<HitRecord> {
    let oc = ray.origin - center;
    let a = ray.direction.length_squared();
    let half_b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    let discriminant = half_b * half_b - a * c;

    if discriminant < 0.0 {
        return None;
    }

    let sqrtd = discriminant.sqrt();
    let mut root = (-half_b - sqrtd) / a;
    if root < t_min || root > t_max {
        root = (-half_b + sqrtd) / a;
        if root < t_min || root > t_max {
            return None;
        }
    }

    let point = ray.at(root);
    let outward_normal = (point - center) / radius;
    let (u, v) = sphere_uv(outward_normal);
    let mut rec = HitRecord {
        point,
        normal: outward_normal,
        t: root,
        u,
        v,
        front_face: true,
        material,
    };
    rec.set_face_normal(ray, outward_normal);
    Some(rec)
}

/// Maps a point on the unit sphere (given as its outward normal) to
/// latitude/longitude texture coordinates in [0,1]².
fn sphere_uv(n: Vec3) -> (f64, f64) {
    let theta = (-n.y).acos();
    let phi = (-n.z).atan2(n.x) + std::f64::consts::PI;
    (phi / (2.0 * std::f64::consts::PI), theta / std::f64::consts::PI)
}

/// Closest hit over a flat primitive list — the reference traversal the
/// BVH must agree with, and the intersection routine for small composite
/// shapes.
pub fn hit_list(
    primitives: &[Primitive],
    ray: &Ray,
    t_min: f64,
    t_max: f64,
) -> Option<HitRecord> {
    let mut closest = t_max;
    let mut result = None;
    for primitive in primitives {
        if let Some(rec) = primitive.hit(ray, t_min, closest) {
            closest = rec.t;
            result = Some(rec);
        }
    }
    result
}

// ─── Bounding Volume Hierarchy ──────────────────────────────────────────────

/// One node of the flat BVH: either a leaf referencing a primitive in the
/// scene's arena, or an interior node referencing two other nodes.
#[derive(Debug, Clone, Copy)]
pub enum BvhNode {
    Leaf { primitive: usize, bbox: Aabb },
    Interior { bbox: Aabb, left: usize, right: usize },
}

impl BvhNode {
    fn bbox(&self) -> Aabb {
        match self {
            BvhNode::Leaf { bbox, .. } | BvhNode::Interior { bbox, .. } => *bbox,
        }
    }
}

/// Binary hierarchy over the primitive arena, stored as a single node
/// vector. Built once per scene; immutable and shared read-only across
/// the worker pool afterwards.
pub struct Bvh {
    nodes: Vec<BvhNode>,
    root: Option<usize>,
}

impl Bvh {
    /// Builds the tree bottom-up over `primitives`: random split axis,
    /// ordering by bounding-box minimum along that axis, midpoint split.
    /// A primitive without a bounding box is logged and bounded by a
    /// degenerate box at the origin rather than aborting the build.
    pub fn build<R: Rng>(primitives: &[Primitive], time0: f64, time1: f64, rng: &mut R) -> Self {
        let boxes: Vec<Aabb> = primitives
            .iter()
            .enumerate()
            .map(|(i, p)| match p.bounding_box(time0, time1) {
                Some(bbox) => bbox,
                None => {
                    log::warn!("primitive {i} reported no bounding box during BVH build");
                    Aabb::new(Point3::zero(), Point3::zero())
                }
            })
            .collect();

        if primitives.is_empty() {
            return Bvh {
                nodes: Vec::new(),
                root: None,
            };
        }

        let mut nodes = Vec::with_capacity(2 * primitives.len());
        let mut indices: Vec<usize> = (0..primitives.len()).collect();
        let root = Self::build_range(&mut nodes, &boxes, &mut indices, rng);
        Bvh {
            nodes,
            root: Some(root),
        }
    }

    fn build_range<R: Rng>(
        nodes: &mut Vec<BvhNode>,
        boxes: &[Aabb],
        span: &mut [usize],
        rng: &mut R,
    ) -> usize {
        if span.len() == 1 {
            nodes.push(BvhNode::Leaf {
                primitive: span[0],
                bbox: boxes[span[0]],
            });
            return nodes.len() - 1;
        }

        let axis = rng.gen_range(0..3usize);
        span.sort_by(|&a, &b| {
            boxes[a].min[axis]
                .partial_cmp(&boxes[b].min[axis])
                .unwrap_or(Ordering::Equal)
        });

        let mid = span.len() / 2;
        let (left_span, right_span) = span.split_at_mut(mid);
        let left = Self::build_range(nodes, boxes, left_span, rng);
        let right = Self::build_range(nodes, boxes, right_span, rng);
        let bbox = Aabb::surrounding(&nodes[left].bbox(), &nodes[right].bbox());
        nodes.push(BvhNode::Interior { bbox, left, right });
        nodes.len() - 1
    }

    /// Closest hit via hierarchy traversal. After a left-child hit the
    /// right child is searched only up to that `t`, so the closer of the
    /// two is returned without re-sorting.
    pub fn hit(
        &self,
        primitives: &[Primitive],
        ray: &Ray,
        t_min: f64,
        t_max: f64,
    ) -> Option<HitRecord> {
        self.root
            .and_then(|root| self.hit_node(root, primitives, ray, t_min, t_max))
    }

    fn hit_node(
        &self,
        node: usize,
        primitives: &[Primitive],
        ray: &Ray,
        t_min: f64,
        t_max: f64,
    ) -> Option<HitRecord> {
        match &self.nodes[node] {
            BvhNode::Leaf { primitive, bbox } => {
                if !bbox.hit(ray, t_min, t_max) {
                    return None;
                }
                primitives[*primitive].hit(ray, t_min, t_max)
            }
            BvhNode::Interior { bbox, left, right } => {
                if !bbox.hit(ray, t_min, t_max) {
                    return None;
                }
                let hit_left = self.hit_node(*left, primitives, ray, t_min, t_max);
                let far = hit_left.as_ref().map_or(t_max, |h| h.t);
                let hit_right = self.hit_node(*right, primitives, ray, t_min, far);
                hit_right.or(hit_left)
            }
        }
    }

    #[cfg(test)]
    fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }
}
