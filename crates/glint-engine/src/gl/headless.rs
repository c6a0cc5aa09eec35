//! In-memory driver.
//!
//! Runs the same WGSL compile and link checks as the GPU driver, keeps every
//! object in plain tables and records draws instead of executing them. Live
//! object counters make ownership rules observable in tests.

use std::cell::RefCell;
use std::collections::HashMap;

use super::driver::{BufferTarget, BuildStatus, DrawCall, Driver, Stage, UniformLocation};
use super::error::DriverError;
use super::handle::{BufferHandle, HandleAllocator, ProgramHandle, ShaderHandle};
use super::reflect::{self, ProgramInterface, StageInterface};

#[derive(Debug, Default)]
pub struct HeadlessDriver {
    state: RefCell<State>,
}

#[derive(Debug, Default)]
struct State {
    ids: HandleAllocator,
    buffers: HashMap<BufferHandle, StoredBuffer>,
    shaders: HashMap<ShaderHandle, StoredShader>,
    programs: HashMap<ProgramHandle, StoredProgram>,
    draws: Vec<RecordedDraw>,
    failed_deletes: usize,
}

#[derive(Debug)]
struct RecordedDraw {
    call: DrawCall,
    /// Uniform values of the program at the time of the draw.
    uniforms: HashMap<UniformLocation, Vec<u8>>,
}

#[derive(Debug)]
struct StoredBuffer {
    target: BufferTarget,
    contents: Vec<u8>,
}

#[derive(Debug)]
struct StoredShader {
    stage: Stage,
    interface: Option<StageInterface>,
}

#[derive(Debug, Default)]
struct StoredProgram {
    attached: Vec<(Stage, Option<StageInterface>)>,
    linked: Option<ProgramInterface>,
    uniforms: HashMap<UniformLocation, Vec<u8>>,
}

impl State {
    fn next_raw(&mut self) -> Result<u32, DriverError> {
        self.ids.next_raw().ok_or(DriverError::HandlesExhausted)
    }

    fn linked(&self, program: ProgramHandle) -> Result<&ProgramInterface, DriverError> {
        self.programs
            .get(&program)
            .ok_or(DriverError::UnknownProgram(program))?
            .linked
            .as_ref()
            .ok_or(DriverError::ProgramNotLinked(program))
    }

    fn expect_buffer(&self, handle: BufferHandle, expected: BufferTarget) -> Result<(), DriverError> {
        let buffer = self
            .buffers
            .get(&handle)
            .ok_or(DriverError::UnknownBuffer(handle))?;
        if buffer.target != expected {
            return Err(DriverError::WrongBufferTarget {
                handle,
                expected,
                actual: buffer.target,
            });
        }
        Ok(())
    }
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    /// Number of delete calls that named an unknown handle.
    pub fn failed_deletes(&self) -> usize {
        self.state.borrow().failed_deletes
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .buffers
            .get(&buffer)
            .map(|b| b.contents.clone())
    }

    pub fn uniform_value(&self, program: ProgramHandle, location: UniformLocation) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .programs
            .get(&program)?
            .uniforms
            .get(&location)
            .cloned()
    }

    /// Draws recorded so far, oldest first.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state.borrow().draws.iter().map(|d| d.call).collect()
    }

    /// Value a uniform had when draw number `index` was recorded.
    pub fn drawn_uniform(&self, index: usize, location: UniformLocation) -> Option<Vec<u8>> {
        self.state.borrow().draws.get(index)?.uniforms.get(&location).cloned()
    }
}

impl Driver for HeadlessDriver {
    fn create_buffer(&self, target: BufferTarget, contents: &[u8]) -> Result<BufferHandle, DriverError> {
        if contents.len() % 4 != 0 {
            return Err(DriverError::MisalignedUpload {
                len: contents.len(),
                unit: 4,
            });
        }

        let mut state = self.state.borrow_mut();
        let handle = BufferHandle::from_raw(state.next_raw()?).ok_or(DriverError::HandlesExhausted)?;
        state.buffers.insert(
            handle,
            StoredBuffer {
                target,
                contents: contents.to_vec(),
            },
        );
        Ok(handle)
    }

    fn delete_buffer(&self, buffer: BufferHandle) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        if state.buffers.remove(&buffer).is_none() {
            state.failed_deletes += 1;
            return Err(DriverError::UnknownBuffer(buffer));
        }
        Ok(())
    }

    fn create_shader(&self, stage: Stage) -> Result<ShaderHandle, DriverError> {
        let mut state = self.state.borrow_mut();
        let handle = ShaderHandle::from_raw(state.next_raw()?).ok_or(DriverError::HandlesExhausted)?;
        state.shaders.insert(
            handle,
            StoredShader {
                stage,
                interface: None,
            },
        );
        Ok(handle)
    }

    fn compile_shader(&self, shader: ShaderHandle, source: &str) -> Result<BuildStatus, DriverError> {
        let mut state = self.state.borrow_mut();
        let stored = state
            .shaders
            .get_mut(&shader)
            .ok_or(DriverError::UnknownShader(shader))?;

        match reflect::compile(stored.stage, source) {
            Ok(interface) => {
                stored.interface = Some(interface);
                Ok(BuildStatus::Ok)
            }
            Err(log) => {
                stored.interface = None;
                Ok(BuildStatus::Failed { log })
            }
        }
    }

    fn delete_shader(&self, shader: ShaderHandle) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        if state.shaders.remove(&shader).is_none() {
            state.failed_deletes += 1;
            return Err(DriverError::UnknownShader(shader));
        }
        Ok(())
    }

    fn create_program(&self) -> Result<ProgramHandle, DriverError> {
        let mut state = self.state.borrow_mut();
        let handle = ProgramHandle::from_raw(state.next_raw()?).ok_or(DriverError::HandlesExhausted)?;
        state.programs.insert(handle, StoredProgram::default());
        Ok(handle)
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        let stored = state
            .shaders
            .get(&shader)
            .ok_or(DriverError::UnknownShader(shader))?;
        let entry = (stored.stage, stored.interface.clone());

        state
            .programs
            .get_mut(&program)
            .ok_or(DriverError::UnknownProgram(program))?
            .attached
            .push(entry);
        Ok(())
    }

    fn link_program(&self, program: ProgramHandle) -> Result<BuildStatus, DriverError> {
        let mut state = self.state.borrow_mut();
        let stored = state
            .programs
            .get_mut(&program)
            .ok_or(DriverError::UnknownProgram(program))?;

        let attached: Vec<_> = stored
            .attached
            .iter()
            .map(|(stage, iface)| (*stage, iface.as_ref()))
            .collect();

        match reflect::link_attached(&attached) {
            Ok(interface) => {
                stored.uniforms = interface
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
                stored.linked = Some(interface);
                Ok(BuildStatus::Ok)
            }
            Err(log) => {
                stored.linked = None;
                Ok(BuildStatus::Failed { log })
            }
        }
    }

    fn delete_program(&self, program: ProgramHandle) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        if state.programs.remove(&program).is_none() {
            state.failed_deletes += 1;
            return Err(DriverError::UnknownProgram(program));
        }
        Ok(())
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Result<Option<UniformLocation>, DriverError> {
        let state = self.state.borrow();
        Ok(state.linked(program)?.uniform(name).map(|u| UniformLocation {
            group: u.group,
            binding: u.binding,
        }))
    }

    fn set_uniform(&self, program: ProgramHandle, location: UniformLocation, bytes: &[u8]) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        let size = state
            .linked(program)?
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

        if let Some(stored) = state.programs.get_mut(&program) {
            stored.uniforms.insert(location, bytes.to_vec());
        }
        Ok(())
    }

    fn vertex_stride(&self, program: ProgramHandle) -> Result<u64, DriverError> {
        Ok(self.state.borrow().linked(program)?.vertex_layout.stride)
    }

    fn draw_indexed(&self, draw: DrawCall) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        state.linked(draw.program)?;
        state.expect_buffer(draw.vertex_buffer, BufferTarget::Vertex)?;
        state.expect_buffer(draw.index_buffer, BufferTarget::Index)?;

        let uniforms = state
            .programs
            .get(&draw.program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default();
        state.draws.push(RecordedDraw { call: draw, uniforms });
        Ok(())
    }
}
