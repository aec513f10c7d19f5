use egui_wgpu_backend::{RenderPass as EguiRenderPass, ScreenDescriptor};
use egui_winit_platform::{Platform, PlatformDescriptor};
use nalgebra_glm as glm;
use thiserror::Error;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::camera::CameraParams;
use crate::fps_counter::FpsCounter;
use crate::geometry::{SphereGrid, SphereGridParams};
use crate::gui_app::GuiApp;

const SPHERE_SHADER: &str = include_str!("sphere_shader.wgsl");

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const LIGHT_POSITION: [f32; 3] = [140.0, 70.0, -90.0];
const FOV_Y: f32 = std::f32::consts::FRAC_PI_4;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error(transparent)]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("shader compilation failed for {label}:\n{diagnostic}")]
    ShaderCompile {
        label: &'static str,
        diagnostic: String,
    },
    #[error("pipeline creation failed: {0}")]
    PipelineLink(String),
}

/// Uniform block fed to the sphere shader, one copy per instance.
/// Layout matches `SphereUniforms` in `sphere_shader.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SphereUniforms {
    model_view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    light_position: [f32; 3],
    _padding: f32,
}

impl SphereUniforms {
    fn new(
        camera: &CameraParams,
        projection: &glm::Mat4,
        instance: u32,
        instance_offset: f32,
    ) -> Self {
        Self {
            model_view: camera.view_matrix(instance, instance_offset).into(),
            projection: (*projection).into(),
            light_position: LIGHT_POSITION,
            _padding: 0.0,
        }
    }
}

/// GPU resources owned by one sphere in the row. Each instance keeps its
/// own position/normal buffers even though the contents are identical,
/// mirroring how the buffers are re-bound and re-filled per draw.
struct SphereInstance {
    position_buffer: wgpu::Buffer,
    normal_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct Renderer {
    pub window: Window,

    device: wgpu::Device,
    surface: wgpu::Surface,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,

    depth_view: wgpu::TextureView,

    geometry: SphereGrid,
    index_buffer: wgpu::Buffer,
    instances: Vec<SphereInstance>,
    sphere_pipeline: wgpu::RenderPipeline,
    projection: glm::Mat4,

    pub camera: CameraParams,
    gui: GuiApp,
    fps_counter: FpsCounter,
    fps: f32,
    frame_time: f32,

    pub platform: Platform,
    egui_rpass: EguiRenderPass,
}

impl Renderer {
    pub async fn new(window: Window, params: SphereGridParams) -> Result<Self, RendererError> {
        // Create the instance, adapter, device, and queue, and setup the surface
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            dx12_shader_compiler: Default::default(),
        });

        let surface = unsafe { instance.create_surface(&window) }?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                    label: Some("Device"),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_view(&device, &config);

        // Sphere mesh, generated once at startup.
        let geometry = SphereGrid::generate(params);
        log::info!(
            "generated {} spheres x {} vertices, {} strip indices",
            params.instance_count,
            geometry.instance_vertex_count(),
            geometry.strip_indices.len()
        );

        // Validate the shader up front so a broken source surfaces as a
        // readable diagnostic instead of a device loss.
        validate_wgsl("sphere shader", SPHERE_SHADER)?;
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sphere Shader"),
            source: wgpu::ShaderSource::Wgsl(SPHERE_SHADER.into()),
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Sphere Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sphere Index Buffer"),
            contents: bytemuck::cast_slice(&geometry.strip_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let camera = CameraParams::default();
        let projection = projection_matrix(size.width, size.height);

        let mut instances = Vec::with_capacity(params.instance_count as usize);
        for i in 0..params.instance_count {
            let position_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Sphere Position Buffer"),
                contents: bytemuck::cast_slice(&geometry.positions),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
            let normal_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Sphere Normal Buffer"),
                contents: bytemuck::cast_slice(&geometry.normals),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });

            let uniforms = SphereUniforms::new(&camera, &projection, i, params.instance_offset);
            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Sphere Uniform Buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Sphere Bind Group"),
                layout: &uniform_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

            instances.push(SphereInstance {
                position_buffer,
                normal_buffer,
                uniform_buffer,
                bind_group,
            });
        }

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sphere Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let sphere_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sphere Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader_module,
                entry_point: "vert_main",
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![1 => Float32x3],
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                entry_point: "frag_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: Some(wgpu::IndexFormat::Uint32),
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });
        if let Some(error) = device.pop_error_scope().await {
            return Err(RendererError::PipelineLink(error.to_string()));
        }

        let platform = Platform::new(PlatformDescriptor {
            physical_width: size.width,
            physical_height: size.height,
            scale_factor: window.scale_factor(),
            font_definitions: egui::FontDefinitions::default(),
            style: Default::default(),
        });
        let egui_rpass = EguiRenderPass::new(&device, surface_format, 1);

        Ok(Renderer {
            window,
            device,
            surface,
            queue,
            config,
            size,
            depth_view,
            geometry,
            index_buffer,
            instances,
            sphere_pipeline,
            projection,
            camera,
            gui: GuiApp::new(),
            fps_counter: FpsCounter::new(),
            fps: 0.0,
            frame_time: 0.0,
            platform,
            egui_rpass,
        })
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let instance_offset = self.geometry.params.instance_offset;

        // Refill every instance's buffers. The geometry never changes, so
        // the position/normal writes are redundant, but they happen every
        // frame regardless; only the uniforms actually vary.
        for (i, sphere) in self.instances.iter().enumerate() {
            self.queue.write_buffer(
                &sphere.position_buffer,
                0,
                bytemuck::cast_slice(&self.geometry.positions),
            );
            self.queue.write_buffer(
                &sphere.normal_buffer,
                0,
                bytemuck::cast_slice(&self.geometry.normals),
            );

            let uniforms =
                SphereUniforms::new(&self.camera, &self.projection, i as u32, instance_offset);
            self.queue
                .write_buffer(&sphere.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let output = self.surface.get_current_texture()?;
        let texture_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Sphere Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &texture_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: true,
                    }),
                    stencil_ops: None,
                }),
            });

            render_pass.set_pipeline(&self.sphere_pipeline);
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            for sphere in &self.instances {
                render_pass.set_bind_group(0, &sphere.bind_group, &[]);
                render_pass.set_vertex_buffer(0, sphere.position_buffer.slice(..));
                render_pass.set_vertex_buffer(1, sphere.normal_buffer.slice(..));
                render_pass.draw_indexed(0..self.geometry.instance_index_count(), 0, 0..1);
            }
        }

        // Control panel overlay.
        self.platform.begin_frame();
        let ctx = self.platform.context();
        self.gui
            .ui(&ctx, &mut self.camera, self.fps, self.frame_time);
        let full_output = self.platform.end_frame(Some(&self.window));
        let paint_jobs = ctx.tessellate(full_output.shapes);

        let screen_descriptor = ScreenDescriptor {
            physical_width: self.config.width,
            physical_height: self.config.height,
            scale_factor: self.window.scale_factor() as f32,
        };
        let textures_delta = full_output.textures_delta;
        if let Err(e) = self
            .egui_rpass
            .add_textures(&self.device, &self.queue, &textures_delta)
        {
            log::error!("egui texture upload failed: {e}");
        }
        self.egui_rpass
            .update_buffers(&self.device, &self.queue, &paint_jobs, &screen_descriptor);
        if let Err(e) = self.egui_rpass.execute(
            &mut encoder,
            &texture_view,
            &paint_jobs,
            &screen_descriptor,
            None,
        ) {
            log::error!("egui paint failed: {e}");
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        if let Err(e) = self.egui_rpass.remove_textures(textures_delta) {
            log::error!("egui texture cleanup failed: {e}");
        }

        Ok(())
    }

    pub fn update(&mut self, delta_time: f32) {
        self.fps_counter.update(delta_time);
        self.fps = self.fps_counter.average_fps();
        self.frame_time = delta_time;
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);

        self.depth_view = create_depth_view(&self.device, &self.config);
        self.projection = projection_matrix(new_size.width, new_size.height);
    }
}

fn create_depth_view(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Buffer"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[DEPTH_FORMAT],
    });
    depth_texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Perspective projection, remapped from OpenGL's -1..1 clip depth to
/// wgpu's 0..1.
fn projection_matrix(width: u32, height: u32) -> glm::Mat4 {
    let aspect = width as f32 / height as f32;
    let correction = glm::mat4(
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.5, 0.5, //
        0.0, 0.0, 0.0, 1.0,
    );
    correction * glm::perspective(aspect, FOV_Y, Z_NEAR, Z_FAR)
}

fn validate_wgsl(label: &'static str, source: &str) -> Result<(), RendererError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| RendererError::ShaderCompile {
        label,
        diagnostic: e.emit_to_string(source),
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| RendererError::ShaderCompile {
        label,
        diagnostic: e.emit_to_string(source),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn shipped_shader_compiles() {
        assert!(validate_wgsl("sphere shader", SPHERE_SHADER).is_ok());
    }

    #[test]
    fn broken_shader_yields_a_diagnostic() {
        let result = validate_wgsl("broken", "fn vert_main( -> {");
        match result {
            Err(RendererError::ShaderCompile { label, diagnostic }) => {
                assert_eq!(label, "broken");
                assert!(!diagnostic.is_empty());
            }
            other => panic!("expected a shader compile error, got {other:?}"),
        }
    }

    #[test]
    fn type_error_fails_validation() {
        // Parses, but returns a vec3 where the declared output is a vec4.
        let source = "
            @fragment
            fn frag_main() -> @location(0) vec4<f32> {
                return vec3<f32>(1.0, 0.0, 0.0);
            }
        ";
        assert!(matches!(
            validate_wgsl("broken", source),
            Err(RendererError::ShaderCompile { .. })
        ));
    }

    #[test]
    fn uniform_block_matches_the_wgsl_layout() {
        // Two mat4x4 plus one padded vec3 = 144 bytes.
        assert_eq!(std::mem::size_of::<SphereUniforms>(), 144);
    }

    #[test]
    fn uniforms_track_the_live_camera_state() {
        let mut camera = CameraParams::default();
        let projection = projection_matrix(800, 600);

        let before = SphereUniforms::new(&camera, &projection, 0, 6.0);
        camera.zoom += 5.0;
        let after = SphereUniforms::new(&camera, &projection, 0, 6.0);

        // Column 3 of the model-view holds the translation.
        assert!((after.model_view[3][2] - (before.model_view[3][2] - 5.0)).abs() < EPS);
        assert_eq!(before.light_position, LIGHT_POSITION);
        assert_eq!(after.light_position, LIGHT_POSITION);
    }

    #[test]
    fn instance_uniforms_are_spaced_along_x() {
        let camera = CameraParams::default();
        let projection = projection_matrix(800, 600);
        let offset = 6.0;

        for i in 1..4 {
            let prev = SphereUniforms::new(&camera, &projection, i - 1, offset);
            let cur = SphereUniforms::new(&camera, &projection, i, offset);
            assert!((cur.model_view[3][0] - prev.model_view[3][0] - offset).abs() < EPS);
        }
    }

    #[test]
    fn projection_maps_near_and_far_into_unit_depth() {
        let m = projection_matrix(800, 600);

        let near = m * glm::vec4(0.0, 0.0, -Z_NEAR, 1.0);
        let far = m * glm::vec4(0.0, 0.0, -Z_FAR, 1.0);

        assert!((near.z / near.w).abs() < 1e-4);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
    }
}
