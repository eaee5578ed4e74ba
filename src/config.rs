use crate::error::RenderError;
use crate::math::{Color, Point3, Vec3};
use crate::renderer::RenderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One XYZ triple as it appears in scene configuration files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VectorInfo {
    x: f64,
    y: f64,
    z: f64,
}

impl From<VectorInfo> for Vec3 {
    fn from(v: VectorInfo) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// Camera block of the scene configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CameraInfo {
    look_from: VectorInfo,
    look_at: VectorInfo,
    view_up: VectorInfo,
    distance_to_focus: f64,
    aperture: f64,
    #[serde(rename = "FOV")]
    fov: f64,
}

/// Scene configuration: camera parameters plus the background radiance.
/// Geometry stays code-built per scene id; the file does not carry it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SceneInfo {
    camera_config: CameraInfo,
    background_color: VectorInfo,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SceneFile {
    scene: SceneInfo,
}

impl SceneInfo {
    /// Loads a scene configuration from a JSON file of the form
    ///
    /// ```json
    /// { "Scene": {
    ///     "CameraConfig": {
    ///       "LookFrom": {"X": 13.0, "Y": 2.0, "Z": 3.0},
    ///       "LookAt":   {"X": 0.0, "Y": 0.0, "Z": 0.0},
    ///       "ViewUp":   {"X": 0.0, "Y": 1.0, "Z": 0.0},
    ///       "DistanceToFocus": 10.0, "Aperture": 0.1, "FOV": 20.0 },
    ///     "BackgroundColor": {"X": 0.7, "Y": 0.8, "Z": 1.0} } }
    /// ```
    pub fn load(path: &Path) -> Result<SceneInfo, RenderError> {
        let text = std::fs::read_to_string(path).map_err(|source| RenderError::SceneConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        let file: SceneFile =
            serde_json::from_str(&text).map_err(|source| RenderError::SceneConfigParse {
                path: path.display().to_string(),
                source,
            })?;
        Ok(file.scene)
    }

    /// Overrides the render configuration's camera and background with the
    /// values from the file.
    pub fn apply(&self, config: &mut RenderConfig) {
        config.camera.look_from = Point3::from(self.camera_config.look_from);
        config.camera.look_at = Point3::from(self.camera_config.look_at);
        config.camera.vup = Vec3::from(self.camera_config.view_up);
        config.camera.focus_dist = self.camera_config.distance_to_focus;
        config.camera.aperture = self.camera_config.aperture;
        config.camera.vfov_degrees = self.camera_config.fov;
        config.background = Color::from(self.background_color);
    }
}
