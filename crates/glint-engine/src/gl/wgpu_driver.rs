//! [`Driver`] implementation on top of wgpu.
//!
//! Handles are keys into tables of wgpu objects. Stages are validated and reflected
//! with naga before a `wgpu::ShaderModule` is created, and module and pipeline
//! creation run inside a validation error scope, so compile and link failures
//! surface as [`BuildStatus::Failed`] rather than device errors.
//! Draws are resolved to reference-counted wgpu objects when recorded, with the
//! program's uniform values at that moment, and replayed into a single render
//! pass by [`WgpuDriver::encode_pass`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use super::driver::{BufferTarget, BuildStatus, DrawCall, Driver, Stage, UniformLocation};
use super::error::DriverError;
use super::handle::{BufferHandle, HandleAllocator, ProgramHandle, ShaderHandle};
use super::reflect::{self, AttributeFormat, ProgramInterface, StageInterface};

#[derive(Debug)]
pub struct WgpuDriver {
    device: wgpu::Device,
    target_format: wgpu::TextureFormat,
    state: RefCell<State>,
}

#[derive(Debug, Default)]
struct State {
    ids: HandleAllocator,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    shaders: HashMap<ShaderHandle, GpuShader>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    pending: Vec<PendingDraw>,
}

#[derive(Debug)]
struct GpuBuffer {
    target: BufferTarget,
    buffer: wgpu::Buffer,
}

#[derive(Debug, Clone)]
struct CompiledStage {
    interface: StageInterface,
    module: wgpu::ShaderModule,
}

#[derive(Debug)]
struct GpuShader {
    stage: Stage,
    compiled: Option<CompiledStage>,
}

#[derive(Debug, Default)]
struct GpuProgram {
    attached: Vec<(Stage, Option<CompiledStage>)>,
    linked: Option<LinkedProgram>,
}

#[derive(Debug)]
struct LinkedProgram {
    interface: ProgramInterface,
    pipeline: wgpu::RenderPipeline,
    group_layouts: Vec<wgpu::BindGroupLayout>,
    /// Current uniform bytes, as last set.
    values: HashMap<UniformLocation, Vec<u8>>,
    /// Bind groups built for `values` by the last draw, reused while unchanged.
    snapshot: Option<(HashMap<UniformLocation, Vec<u8>>, Vec<wgpu::BindGroup>)>,
}

impl LinkedProgram {
    /// Bind groups holding a copy of the current uniform values.
    fn bind_groups(&mut self, device: &wgpu::Device) -> Vec<wgpu::BindGroup> {
        if let Some((values, groups)) = &self.snapshot {
            if *values == self.values {
                return groups.clone();
            }
        }

        let groups: Vec<_> = self
            .group_layouts
            .iter()
            .zip(0u32..)
            .map(|(layout, group)| {
                let buffers: Vec<_> = self
                    .interface
                    .uniforms
                    .iter()
                    .filter(|u| u.group == group)
                    .map(|u| {
                        let location = UniformLocation {
                            group,
                            binding: u.binding,
                        };
                        let contents = self.values.get(&location).map(Vec::as_slice).unwrap_or_default();
                        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some(u.name.as_str()),
                            contents,
                            usage: wgpu::BufferUsages::UNIFORM,
                        });
                        (u.binding, buffer)
                    })
                    .collect();

                let entries: Vec<_> = buffers
                    .iter()
                    .map(|(binding, buffer)| wgpu::BindGroupEntry {
                        binding: *binding,
                        resource: buffer.as_entire_binding(),
                    })
                    .collect();

                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("glint uniforms"),
                    layout,
                    entries: &entries,
                })
            })
            .collect();

        self.snapshot = Some((self.values.clone(), groups.clone()));
        groups
    }
}

#[derive(Debug)]
struct PendingDraw {
    pipeline: wgpu::RenderPipeline,
    bind_groups: Vec<wgpu::BindGroup>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl State {
    fn next_raw(&mut self) -> Result<u32, DriverError> {
        self.ids.next_raw().ok_or(DriverError::HandlesExhausted)
    }

    fn linked(&self, program: ProgramHandle) -> Result<&LinkedProgram, DriverError> {
        self.programs
            .get(&program)
            .ok_or(DriverError::UnknownProgram(program))?
            .linked
            .as_ref()
            .ok_or(DriverError::ProgramNotLinked(program))
    }

    fn linked_mut(&mut self, program: ProgramHandle) -> Result<&mut LinkedProgram, DriverError> {
        self.programs
            .get_mut(&program)
            .ok_or(DriverError::UnknownProgram(program))?
            .linked
            .as_mut()
            .ok_or(DriverError::ProgramNotLinked(program))
    }

    fn buffer(&self, handle: BufferHandle, expected: BufferTarget) -> Result<&wgpu::Buffer, DriverError> {
        let stored = self
            .buffers
            .get(&handle)
            .ok_or(DriverError::UnknownBuffer(handle))?;
        if stored.target != expected {
            return Err(DriverError::WrongBufferTarget {
                handle,
                expected,
                actual: stored.target,
            });
        }
        Ok(&stored.buffer)
    }
}

impl WgpuDriver {
    /// `target_format` is the color format programs will render into.
    pub fn new(device: wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            target_format,
            state: RefCell::new(State::default()),
        }
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    /// Number of draws waiting for the next [`encode_pass`](Self::encode_pass).
    pub fn pending_draws(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Replays every draw recorded since the last call into one render pass
    /// that first clears `view` to `clear`.
    pub fn encode_pass(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, clear: wgpu::Color) {
        let draws = std::mem::take(&mut self.state.borrow_mut().pending);

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("glint frame pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for draw in &draws {
            rpass.set_pipeline(&draw.pipeline);
            for (index, group) in draw.bind_groups.iter().enumerate() {
                rpass.set_bind_group(index as u32, group, &[]);
            }
            rpass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
            rpass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..draw.index_count, 0, 0..1);
        }
    }

    /// Runs `f` with validation errors captured instead of reaching the
    /// device's uncaptured-error handler.
    fn validated<T>(&self, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        (value, pollster::block_on(scope.pop()))
    }

    fn build_program(&self, vertex: &CompiledStage, fragment: &CompiledStage, interface: ProgramInterface) -> LinkedProgram {
        let group_layouts: Vec<_> = (0..interface.group_count)
            .map(|group| {
                let entries: Vec<_> = interface
                    .uniforms
                    .iter()
                    .filter(|u| u.group == group)
                    .map(|u| wgpu::BindGroupLayoutEntry {
                        binding: u.binding,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: NonZeroU64::new(u.size),
                        },
                        count: None,
                    })
                    .collect();

                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some("glint uniform bgl"),
                        entries: &entries,
                    })
            })
            .collect();

        let layout_refs: Vec<_> = group_layouts.iter().collect();
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("glint pipeline layout"),
                bind_group_layouts: &layout_refs,
                immediate_size: 0,
            });

        let attributes: Vec<_> = interface
            .vertex_layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: vertex_format(a.format),
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();

        let vertex_buffers = if attributes.is_empty() {
            Vec::new()
        } else {
            vec![wgpu::VertexBufferLayout {
                array_stride: interface.vertex_layout.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }]
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("glint program"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: Some(interface.vertex_entry.as_str()),
                    compilation_options: Default::default(),
                    buffers: &vertex_buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment.module,
                    entry_point: Some(interface.fragment_entry.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.target_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        let values = interface
            .uniforms
            .iter()
            .map(|u| {
                let location = UniformLocation {
                    group: u.group,
                    binding: u.binding,
                };
                (location, vec![0; u.size as usize])
            })
            .collect();

        LinkedProgram {
            interface,
            pipeline,
            group_layouts,
            values,
            snapshot: None,
        }
    }
}

fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32 => wgpu::VertexFormat::Float32,
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        AttributeFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Vertex => "glint vertex stage",
        Stage::Fragment => "glint fragment stage",
    }
}

impl Driver for WgpuDriver {
    fn create_buffer(&self, target: BufferTarget, contents: &[u8]) -> Result<BufferHandle, DriverError> {
        // Buffer copies and index reads work in 4-byte units.
        if contents.len() % 4 != 0 {
            return Err(DriverError::MisalignedUpload {
                len: contents.len(),
                unit: 4,
            });
        }

        let (label, usage) = match target {
            BufferTarget::Vertex => ("glint vertex buffer", wgpu::BufferUsages::VERTEX),
            BufferTarget::Index => ("glint index buffer", wgpu::BufferUsages::INDEX),
        };

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });

        let mut state = self.state.borrow_mut();
        let handle = BufferHandle::from_raw(state.next_raw()?).ok_or(DriverError::HandlesExhausted)?;
        state.buffers.insert(handle, GpuBuffer { target, buffer });
        Ok(handle)
    }

    fn delete_buffer(&self, buffer: BufferHandle) -> Result<(), DriverError> {
        // Dropped, not destroyed: a draw recorded this frame may still hold it.
        self.state
            .borrow_mut()
            .buffers
            .remove(&buffer)
            .map(drop)
            .ok_or(DriverError::UnknownBuffer(buffer))
    }

    fn create_shader(&self, stage: Stage) -> Result<ShaderHandle, DriverError> {
        let mut state = self.state.borrow_mut();
        let handle = ShaderHandle::from_raw(state.next_raw()?).ok_or(DriverError::HandlesExhausted)?;
        state.shaders.insert(
            handle,
            GpuShader {
                stage,
                compiled: None,
            },
        );
        Ok(handle)
    }

    fn compile_shader(&self, shader: ShaderHandle, source: &str) -> Result<BuildStatus, DriverError> {
        let stage = self
            .state
            .borrow()
            .shaders
            .get(&shader)
            .map(|s| s.stage)
            .ok_or(DriverError::UnknownShader(shader))?;

        let (compiled, status) = match reflect::compile(stage, source) {
            Ok(interface) => {
                let (module, error) = self.validated(|| {
                    self.device
                        .create_shader_module(wgpu::ShaderModuleDescriptor {
                            label: Some(stage_label(stage)),
                            source: wgpu::ShaderSource::Wgsl(source.into()),
                        })
                });
                match error {
                    None => (Some(CompiledStage { interface, module }), BuildStatus::Ok),
                    Some(e) => (None, BuildStatus::Failed { log: e.to_string() }),
                }
            }
            Err(log) => (None, BuildStatus::Failed { log }),
        };

        let mut state = self.state.borrow_mut();
        let stored = state
            .shaders
            .get_mut(&shader)
            .ok_or(DriverError::UnknownShader(shader))?;
        stored.compiled = compiled;
        Ok(status)
    }

    fn delete_shader(&self, shader: ShaderHandle) -> Result<(), DriverError> {
        self.state
            .borrow_mut()
            .shaders
            .remove(&shader)
            .map(drop)
            .ok_or(DriverError::UnknownShader(shader))
    }

    fn create_program(&self) -> Result<ProgramHandle, DriverError> {
        let mut state = self.state.borrow_mut();
        let handle = ProgramHandle::from_raw(state.next_raw()?).ok_or(DriverError::HandlesExhausted)?;
        state.programs.insert(handle, GpuProgram::default());
        Ok(handle)
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        let stored = state
            .shaders
            .get(&shader)
            .ok_or(DriverError::UnknownShader(shader))?;
        let entry = (stored.stage, stored.compiled.clone());

        state
            .programs
            .get_mut(&program)
            .ok_or(DriverError::UnknownProgram(program))?
            .attached
            .push(entry);
        Ok(())
    }

    fn link_program(&self, program: ProgramHandle) -> Result<BuildStatus, DriverError> {
        let attached = self
            .state
            .borrow()
            .programs
            .get(&program)
            .ok_or(DriverError::UnknownProgram(program))?
            .attached
            .clone();

        let views: Vec<_> = attached
            .iter()
            .map(|(stage, c)| (*stage, c.as_ref().map(|c| &c.interface)))
            .collect();

        let linked = match reflect::link_attached(&views) {
            Ok(interface) => {
                let find = |stage: Stage| {
                    attached
                        .iter()
                        .find(|(s, _)| *s == stage)
                        .and_then(|(_, c)| c.as_ref())
                };
                match (find(Stage::Vertex), find(Stage::Fragment)) {
                    (Some(vs), Some(fs)) => match self.validated(|| self.build_program(vs, fs, interface)) {
                        (linked, None) => Ok(linked),
                        (_, Some(e)) => Err(e.to_string()),
                    },
                    _ => Err("attached stages are not compiled".to_string()),
                }
            }
            Err(log) => Err(log),
        };

        let mut state = self.state.borrow_mut();
        let stored = state
            .programs
            .get_mut(&program)
            .ok_or(DriverError::UnknownProgram(program))?;

        match linked {
            Ok(linked) => {
                stored.linked = Some(linked);
                Ok(BuildStatus::Ok)
            }
            Err(log) => {
                stored.linked = None;
                Ok(BuildStatus::Failed { log })
            }
        }
    }

    fn delete_program(&self, program: ProgramHandle) -> Result<(), DriverError> {
        self.state
            .borrow_mut()
            .programs
            .remove(&program)
            .map(drop)
            .ok_or(DriverError::UnknownProgram(program))
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Result<Option<UniformLocation>, DriverError> {
        let state = self.state.borrow();
        Ok(state
            .linked(program)?
            .interface
            .uniform(name)
            .map(|u| UniformLocation {
                group: u.group,
                binding: u.binding,
            }))
    }

    fn set_uniform(&self, program: ProgramHandle, location: UniformLocation, bytes: &[u8]) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        let linked = state.linked_mut(program)?;

        let size = linked
            .interface
            .uniform_at(location.group, location.binding)
            .map(|u| u.size)
            .ok_or(DriverError::UnknownUniform {
                group: location.group,
                binding: location.binding,
            })?;

        if size != bytes.len() as u64 {
            return Err(DriverError::UniformSizeMismatch {
                group: location.group,
                binding: location.binding,
                size,
                written: bytes.len() as u64,
            });
        }

        linked.values.insert(location, bytes.to_vec());
        Ok(())
    }

    fn vertex_stride(&self, program: ProgramHandle) -> Result<u64, DriverError> {
        Ok(self.state.borrow().linked(program)?.interface.vertex_layout.stride)
    }

    fn draw_indexed(&self, draw: DrawCall) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();

        let vertex_buffer = state.buffer(draw.vertex_buffer, BufferTarget::Vertex)?.clone();
        let index_buffer = state.buffer(draw.index_buffer, BufferTarget::Index)?.clone();
        let linked = state.linked_mut(draw.program)?;
        let pending = PendingDraw {
            pipeline: linked.pipeline.clone(),
            bind_groups: linked.bind_groups(&self.device),
            vertex_buffer,
            index_buffer,
            index_count: draw.index_count,
        };

        state.pending.push(pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "@vertex
fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 0.0, 1.0);
}
";

    const FRAGMENT: &str = "@group(0) @binding(0) var<uniform> u_Color: vec4<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u_Color;
}
";

    const TINTED_VERTEX: &str = "struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) tint: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> VsOut {
    return VsOut(vec4<f32>(position, 0.0, 1.0), vec3<f32>(1.0));
}
";

    const TINTED_FRAGMENT: &str = "@fragment
fn fs_main(@location(0) tint: vec4<f32>) -> @location(0) vec4<f32> {
    return tint;
}
";

    fn driver(format: wgpu::TextureFormat) -> (WgpuDriver, wgpu::Queue) {
        let (device, queue) = wgpu::Device::noop(&wgpu::DeviceDescriptor::default());
        (WgpuDriver::new(device, format), queue)
    }

    fn compiled(driver: &WgpuDriver, stage: Stage, source: &str) -> ShaderHandle {
        let shader = driver.create_shader(stage).unwrap();
        assert_eq!(driver.compile_shader(shader, source).unwrap(), BuildStatus::Ok);
        shader
    }

    fn linked(driver: &WgpuDriver, vertex: &str, fragment: &str) -> (ProgramHandle, BuildStatus) {
        let vs = compiled(driver, Stage::Vertex, vertex);
        let fs = compiled(driver, Stage::Fragment, fragment);
        let program = driver.create_program().unwrap();
        driver.attach_shader(program, vs).unwrap();
        driver.attach_shader(program, fs).unwrap();
        let status = driver.link_program(program).unwrap();
        driver.delete_shader(vs).unwrap();
        driver.delete_shader(fs).unwrap();
        (program, status)
    }

    fn quad_buffers(driver: &WgpuDriver) -> (BufferHandle, BufferHandle) {
        let positions: [[f32; 2]; 4] = [[-0.5, -0.5], [0.5, -0.5], [0.5, 0.5], [-0.5, 0.5]];
        let indices: [u32; 6] = [0, 1, 2, 2, 3, 0];
        let vbo = driver
            .create_buffer(BufferTarget::Vertex, bytemuck::cast_slice(&positions))
            .unwrap();
        let ibo = driver
            .create_buffer(BufferTarget::Index, bytemuck::cast_slice(&indices))
            .unwrap();
        (vbo, ibo)
    }

    const COLOR: UniformLocation = UniformLocation { group: 0, binding: 0 };

    #[test]
    fn compile_reports_status() {
        let (driver, _queue) = driver(wgpu::TextureFormat::Rgba8UnormSrgb);
        compiled(&driver, Stage::Vertex, VERTEX);

        let shader = driver.create_shader(Stage::Fragment).unwrap();
        let status = driver.compile_shader(shader, "fn fs_main( {").unwrap();
        assert!(matches!(status, BuildStatus::Failed { log } if !log.is_empty()));

        let unknown = ShaderHandle::from_raw(999).unwrap();
        assert_eq!(
            driver.compile_shader(unknown, VERTEX),
            Err(DriverError::UnknownShader(unknown))
        );
    }

    #[test]
    fn links_and_reflects_uniforms() {
        let (driver, _queue) = driver(wgpu::TextureFormat::Rgba8UnormSrgb);
        let (program, status) = linked(&driver, VERTEX, FRAGMENT);

        assert_eq!(status, BuildStatus::Ok);
        assert_eq!(driver.uniform_location(program, "u_Color").unwrap(), Some(COLOR));
        assert_eq!(driver.uniform_location(program, "u_Missing").unwrap(), None);
        assert_eq!(driver.vertex_stride(program).unwrap(), 8);
    }

    #[test]
    fn mismatched_varyings_fail_to_link() {
        let (driver, _queue) = driver(wgpu::TextureFormat::Rgba8UnormSrgb);
        let (program, status) = linked(&driver, TINTED_VERTEX, TINTED_FRAGMENT);

        assert!(matches!(status, BuildStatus::Failed { log } if log.contains("vec3<f32>")));
        assert_eq!(
            driver.vertex_stride(program),
            Err(DriverError::ProgramNotLinked(program))
        );
    }

    #[test]
    fn pipeline_rejected_by_the_device_fails_to_link() {
        // A float color output cannot be blended into an integer target.
        let (driver, _queue) = driver(wgpu::TextureFormat::Rgba8Uint);
        assert_eq!(driver.target_format(), wgpu::TextureFormat::Rgba8Uint);

        let (program, status) = linked(&driver, VERTEX, FRAGMENT);
        assert!(matches!(status, BuildStatus::Failed { log } if !log.is_empty()));
        assert_eq!(
            driver.uniform_location(program, "u_Color"),
            Err(DriverError::ProgramNotLinked(program))
        );
    }

    #[test]
    fn uniform_writes_are_size_checked() {
        let (driver, _queue) = driver(wgpu::TextureFormat::Rgba8UnormSrgb);
        let (program, _) = linked(&driver, VERTEX, FRAGMENT);

        driver
            .set_uniform(program, COLOR, bytemuck::cast_slice(&[0.1f32, 0.2, 0.3, 1.0]))
            .unwrap();
        assert_eq!(
            driver.set_uniform(program, COLOR, &[0; 8]),
            Err(DriverError::UniformSizeMismatch {
                group: 0,
                binding: 0,
                size: 16,
                written: 8
            })
        );
        assert_eq!(
            driver.set_uniform(program, UniformLocation { group: 0, binding: 3 }, &[0; 16]),
            Err(DriverError::UnknownUniform { group: 0, binding: 3 })
        );
    }

    #[test]
    fn draws_keep_their_own_uniform_values() {
        let (driver, _queue) = driver(wgpu::TextureFormat::Rgba8UnormSrgb);
        let (program, _) = linked(&driver, VERTEX, FRAGMENT);
        let (vertex_buffer, index_buffer) = quad_buffers(&driver);
        let draw = DrawCall {
            program,
            vertex_buffer,
            index_buffer,
            index_count: 6,
        };

        let red = [1.0f32, 0.0, 0.0, 1.0];
        let blue = [0.0f32, 0.0, 1.0, 1.0];
        driver.set_uniform(program, COLOR, bytemuck::cast_slice(&red)).unwrap();
        driver.draw_indexed(draw).unwrap();
        driver.draw_indexed(draw).unwrap();
        driver.set_uniform(program, COLOR, bytemuck::cast_slice(&blue)).unwrap();
        driver.draw_indexed(draw).unwrap();

        let state = driver.state.borrow();
        let groups: Vec<_> = state.pending.iter().map(|d| &d.bind_groups).collect();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0], groups[1]);
        assert_ne!(groups[1], groups[2]);
    }

    #[test]
    fn draw_checks_buffer_targets() {
        let (driver, _queue) = driver(wgpu::TextureFormat::Rgba8UnormSrgb);
        let (program, _) = linked(&driver, VERTEX, FRAGMENT);
        let (vertex_buffer, index_buffer) = quad_buffers(&driver);

        let swapped = DrawCall {
            program,
            vertex_buffer: index_buffer,
            index_buffer: vertex_buffer,
            index_count: 6,
        };
        assert_eq!(
            driver.draw_indexed(swapped),
            Err(DriverError::WrongBufferTarget {
                handle: index_buffer,
                expected: BufferTarget::Vertex,
                actual: BufferTarget::Index
            })
        );
        assert_eq!(driver.pending_draws(), 0);

        assert_eq!(
            driver.create_buffer(BufferTarget::Vertex, &[0; 6]),
            Err(DriverError::MisalignedUpload { len: 6, unit: 4 })
        );
    }

    #[test]
    fn encode_pass_replays_and_clears_recorded_draws() {
        let format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let (driver, queue) = driver(format);
        let (program, _) = linked(&driver, VERTEX, FRAGMENT);
        let (vertex_buffer, index_buffer) = quad_buffers(&driver);
        let draw = DrawCall {
            program,
            vertex_buffer,
            index_buffer,
            index_count: 6,
        };

        driver.draw_indexed(draw).unwrap();
        // Deleting after recording must not invalidate the frame.
        driver.delete_buffer(vertex_buffer).unwrap();
        driver.draw_indexed(DrawCall { index_count: 3, ..draw }).unwrap_err();
        assert_eq!(driver.pending_draws(), 1);

        let target = driver.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test target"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = driver
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });

        driver.encode_pass(&mut encoder, &view, wgpu::Color::BLACK);
        queue.submit([encoder.finish()]);
        assert_eq!(driver.pending_draws(), 0);
    }
}
