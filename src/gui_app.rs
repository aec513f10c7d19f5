use crate::camera::{CameraParams, TRANSLATE_X_RANGE, ZOOM_RANGE};

/// Control panel drawn on top of the scene. The sliders write straight
/// into the camera parameters; the render loop sees the new values on the
/// next frame.
pub struct GuiApp {}

impl GuiApp {
    pub fn new() -> Self {
        Self {}
    }

    pub fn ui(&mut self, ctx: &egui::Context, camera: &mut CameraParams, fps: f32, frame_time: f32) {
        egui::Window::new("Camera")
            .anchor(egui::Align2::LEFT_TOP, egui::Vec2::new(10.0, 10.0))
            .resizable(false)
            .collapsible(false)
            .show(ctx, |ui| {
                ui.add(
                    egui::Slider::new(&mut camera.translate_x, TRANSLATE_X_RANGE)
                        .text("Translate X"),
                );
                ui.add(egui::Slider::new(&mut camera.zoom, ZOOM_RANGE).text("Zoom"));

                ui.separator();
                ui.label(format!("FPS: {:.2}", fps));
                ui.label(format!("Frame Time: {:.2} ms", frame_time * 1000.0));
            });
    }
}
