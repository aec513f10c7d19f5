use std::ops::RangeInclusive;

use nalgebra_glm as glm;

/// Slider range for the horizontal slide of the whole row.
pub const TRANSLATE_X_RANGE: RangeInclusive<f32> = -25.0..=0.0;
/// Slider range for the zoom distance.
pub const ZOOM_RANGE: RangeInclusive<f32> = 0.1..=40.0;

/// Camera parameters read by the render loop every frame.
///
/// The eye/center/up triple is fixed; the two scalars are written by the
/// control panel sliders and picked up on the next frame. Everything runs
/// on one thread, so plain fields are enough.
pub struct CameraParams {
    pub eye: glm::Vec3,
    pub center: glm::Vec3,
    pub up: glm::Vec3,
    pub translate_x: f32,
    pub zoom: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            eye: glm::vec3(0.0, 0.0, 3.0),
            center: glm::vec3(0.0, 0.0, 2.0),
            up: glm::vec3(0.0, 1.0, 0.0),
            translate_x: 0.0,
            zoom: 3.0,
        }
    }
}

impl CameraParams {
    /// Model-view matrix for one sphere instance: look-at, then the
    /// horizontal slide plus the instance's slot along X, then zoom as a
    /// translation away from the viewer.
    pub fn view_matrix(&self, instance: u32, instance_offset: f32) -> glm::Mat4 {
        let look_at = glm::look_at(&self.eye, &self.center, &self.up);
        let slide = glm::translate(
            &look_at,
            &glm::vec3(
                self.translate_x + instance as f32 * instance_offset,
                0.0,
                0.0,
            ),
        );
        glm::translate(&slide, &glm::vec3(0.0, 0.0, -self.zoom))
    }
}
