//! # prism-tracer
//!
//! An offline Monte Carlo path tracer built around four subsystems:
//!
//! - **Geometry**: spheres (static and moving), axis-aligned rectangles,
//!   boxes, and translate/rotate wrappers, indexed by a bounding-volume
//!   hierarchy ([`geometry`]).
//! - **Shading**: Lambertian, metal, dielectric, and emissive materials
//!   over solid, checker, Perlin-noise, and image textures ([`material`],
//!   [`texture`]).
//! - **Integration**: a recursive radiance estimator with a configurable
//!   depth bound, direct emission, and a background term
//!   ([`renderer::ray_color`]).
//! - **Orchestration**: a tile-parallel renderer that dispatches blocks of
//!   pixels onto a fixed worker pool, accumulates tonemapped RGBA into a
//!   shared frame buffer, and raises a completion signal
//!   ([`renderer::Raytracer`]).
//!
//! Scenes are immutable once built: texture, material, and primitive
//! arenas referenced by index, shared read-only across workers. All
//! randomness flows from a single seed, so a given configuration renders
//! a byte-identical image on every run, at any tile size.

pub mod camera;
pub mod config;
pub mod display;
pub mod error;
pub mod geometry;
pub mod material;
pub mod math;
pub mod renderer;
pub mod scene;
pub mod texture;
