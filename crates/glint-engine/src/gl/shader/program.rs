use std::rc::Rc;

use crate::gl::context::GlContext;
use crate::gl::driver::{BuildStatus, Driver, Stage, UniformLocation};
use crate::gl::error::{GlError, check};
use crate::gl::handle::{ProgramHandle, ShaderHandle};

use super::ShaderSource;

/// One compiled stage. Transient: consumed by [`link`].
pub struct Shader<D: Driver> {
    driver: Rc<D>,
    handle: ShaderHandle,
    stage: Stage,
}

impl<D: Driver> Shader<D> {
    pub fn handle(&self) -> ShaderHandle {
        self.handle
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}

impl<D: Driver> Drop for Shader<D> {
    fn drop(&mut self) {
        match self.driver.delete_shader(self.handle) {
            Ok(()) => log::trace!("released {:?} ({})", self.handle, self.stage),
            Err(e) => log::warn!("failed to release {:?}: {e}", self.handle),
        }
    }
}

impl<D: Driver> std::fmt::Debug for Shader<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("handle", &self.handle)
            .field("stage", &self.stage)
            .finish()
    }
}

/// Compiles `source` as a `stage` shader.
///
/// On failure the compiler log is reported and the stage object released
/// before the error is returned.
#[track_caller]
pub fn compile_stage<D: Driver>(
    ctx: &GlContext<D>,
    stage: Stage,
    source: &str,
) -> Result<Shader<D>, GlError> {
    let handle = check("create_shader", ctx.driver().create_shader(stage))?;
    let shader = Shader {
        driver: ctx.shared_driver(),
        handle,
        stage,
    };

    match check("compile_shader", ctx.driver().compile_shader(handle, source))? {
        BuildStatus::Ok => {
            log::debug!("compiled {stage} shader {handle:?}");
            Ok(shader)
        }
        BuildStatus::Failed { log } => {
            log::error!("failed to compile {stage} shader:\n{log}");
            Err(GlError::ShaderCompileFailed { stage, log })
        }
    }
}

/// Links two stages into a program.
///
/// Both stages are released once the link attempt is over, whatever its outcome.
#[track_caller]
pub fn link<D: Driver>(
    ctx: &GlContext<D>,
    vertex: Shader<D>,
    fragment: Shader<D>,
) -> Result<Program<D>, GlError> {
    let handle = check("create_program", ctx.driver().create_program())?;
    let program = Program {
        driver: ctx.shared_driver(),
        handle,
    };

    check("attach_shader", ctx.driver().attach_shader(handle, vertex.handle))?;
    check("attach_shader", ctx.driver().attach_shader(handle, fragment.handle))?;
    let status = check("link_program", ctx.driver().link_program(handle))?;

    drop(vertex);
    drop(fragment);

    match status {
        BuildStatus::Ok => {
            log::debug!("linked {handle:?}");
            Ok(program)
        }
        BuildStatus::Failed { log } => {
            log::error!("failed to link program:\n{log}");
            Err(GlError::ShaderLinkFailed { log })
        }
    }
}

/// Compiles both stages of `source` and links them.
#[track_caller]
pub fn create_program<D: Driver>(
    ctx: &GlContext<D>,
    source: &ShaderSource,
) -> Result<Program<D>, GlError> {
    let vertex = compile_stage(ctx, Stage::Vertex, &source.vertex)?;
    let fragment = compile_stage(ctx, Stage::Fragment, &source.fragment)?;
    link(ctx, vertex, fragment)
}

/// Exclusive owner of a linked program; deleted on drop.
pub struct Program<D: Driver> {
    driver: Rc<D>,
    handle: ProgramHandle,
}

impl<D: Driver> Program<D> {
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Looks up a uniform used by the program.
    #[track_caller]
    pub fn uniform_location(&self, name: &str) -> Result<UniformLocation, GlError> {
        check("uniform_location", self.driver.uniform_location(self.handle, name))?.ok_or_else(
            || GlError::UniformNotFound {
                name: name.to_string(),
            },
        )
    }

    /// Writes a `vec4<f32>` uniform.
    ///
    /// Addresses this program directly, bound or not. Draws recorded
    /// afterwards use the new value; earlier draws keep theirs.
    #[track_caller]
    pub fn set_uniform_4f(&self, location: UniformLocation, value: [f32; 4]) -> Result<(), GlError> {
        check(
            "set_uniform_4f",
            self.driver
                .set_uniform(self.handle, location, bytemuck::cast_slice(&value)),
        )
    }

    pub fn bind(&self, ctx: &mut GlContext<D>) {
        ctx.bindings_mut().program = Some(self.handle);
    }

    pub fn unbind(&self, ctx: &mut GlContext<D>) {
        ctx.bindings_mut().program = None;
    }
}

impl<D: Driver> Drop for Program<D> {
    fn drop(&mut self) {
        match self.driver.delete_program(self.handle) {
            Ok(()) => log::trace!("released {:?}", self.handle),
            Err(e) => log::warn!("failed to release {:?}: {e}", self.handle),
        }
    }
}

impl<D: Driver> std::fmt::Debug for Program<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program").field("handle", &self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::headless::HeadlessDriver;

    const VS: &str = r#"
@vertex
fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 0.0, 1.0);
}
"#;

    const FS: &str = r#"
@group(0) @binding(0) var<uniform> u_Color: vec4<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u_Color;
}
"#;

    fn ctx() -> GlContext<HeadlessDriver> {
        GlContext::new(HeadlessDriver::new())
    }

    #[test]
    fn compile_failure_releases_stage_object() {
        let ctx = ctx();
        let err = compile_stage(&ctx, Stage::Vertex, "fn broken( {").unwrap_err();

        assert!(matches!(err, GlError::ShaderCompileFailed { stage: Stage::Vertex, .. }));
        assert_eq!(ctx.driver().live_shaders(), 0);
        assert_eq!(ctx.driver().live_programs(), 0);
    }

    #[test]
    fn empty_stage_source_does_not_compile() {
        let ctx = ctx();
        let err = compile_stage(&ctx, Stage::Fragment, "").unwrap_err();
        assert!(matches!(err, GlError::ShaderCompileFailed { stage: Stage::Fragment, .. }));
    }

    #[test]
    fn link_releases_both_stages() {
        let ctx = ctx();
        let vs = compile_stage(&ctx, Stage::Vertex, VS).unwrap();
        let fs = compile_stage(&ctx, Stage::Fragment, FS).unwrap();
        assert_eq!(ctx.driver().live_shaders(), 2);

        let program = link(&ctx, vs, fs).unwrap();
        assert_eq!(ctx.driver().live_shaders(), 0);
        assert_eq!(ctx.driver().live_programs(), 1);

        drop(program);
        assert_eq!(ctx.driver().live_programs(), 0);
    }

    #[test]
    fn failed_link_releases_stages_and_program() {
        let ctx = ctx();
        let vs = compile_stage(&ctx, Stage::Vertex, VS).unwrap();
        // Stages in the wrong slots.
        let other_vs = compile_stage(&ctx, Stage::Vertex, VS).unwrap();

        let err = link(&ctx, vs, other_vs).unwrap_err();
        assert!(matches!(err, GlError::ShaderLinkFailed { .. }));
        assert_eq!(ctx.driver().live_shaders(), 0);
        assert_eq!(ctx.driver().live_programs(), 0);
    }

    #[test]
    fn uniform_lookup() {
        let ctx = ctx();
        let program = create_program(
            &ctx,
            &ShaderSource {
                vertex: VS.into(),
                fragment: FS.into(),
            },
        )
        .unwrap();

        let loc = program.uniform_location("u_Color").unwrap();
        assert_eq!(loc, UniformLocation { group: 0, binding: 0 });

        program.set_uniform_4f(loc, [0.1, 0.3, 0.8, 1.0]).unwrap();
        assert_eq!(
            ctx.driver().uniform_value(program.handle(), loc).unwrap(),
            bytemuck::cast_slice::<f32, u8>(&[0.1, 0.3, 0.8, 1.0]).to_vec()
        );

        let err = program.uniform_location("u_Missing").unwrap_err();
        assert!(matches!(err, GlError::UniformNotFound { name } if name == "u_Missing"));
    }

    #[test]
    fn bind_and_unbind_program() {
        let mut ctx = ctx();
        let program = create_program(
            &ctx,
            &ShaderSource {
                vertex: VS.into(),
                fragment: FS.into(),
            },
        )
        .unwrap();

        program.bind(&mut ctx);
        assert_eq!(ctx.bindings().program(), Some(program.handle()));
        program.unbind(&mut ctx);
        assert!(ctx.bindings().is_empty());
    }

    #[test]
    fn mismatched_varyings_fail_to_link() {
        let ctx = ctx();
        let source = ShaderSource {
            vertex: r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) v: f32,
};

@vertex
fn vs_main(@location(0) p: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.pos = vec4<f32>(p, 0.0, 1.0);
    out.v = p.y;
    return out;
}
"#
            .into(),
            fragment: r#"
@fragment
fn fs_main(@location(0) v: vec4<f32>) -> @location(0) vec4<f32> {
    return v;
}
"#
            .into(),
        };

        let err = create_program(&ctx, &source).unwrap_err();
        assert!(matches!(err, GlError::ShaderLinkFailed { .. }));
        assert_eq!(ctx.driver().live_shaders(), 0);
        assert_eq!(ctx.driver().live_programs(), 0);
    }

    #[test]
    fn integer_color_output_fails_to_link() {
        let ctx = ctx();
        let source = ShaderSource {
            vertex: VS.into(),
            fragment: r#"
@fragment
fn fs_main() -> @location(0) vec4<i32> {
    return vec4<i32>(1);
}
"#
            .into(),
        };

        let err = create_program(&ctx, &source).unwrap_err();
        assert!(matches!(err, GlError::ShaderLinkFailed { log } if log.contains("vec4<i32>")));
        assert_eq!(ctx.driver().live_programs(), 0);
    }

    #[test]
    fn uniform_can_be_set_without_binding() {
        let ctx = ctx();
        let program = create_program(
            &ctx,
            &ShaderSource {
                vertex: VS.into(),
                fragment: FS.into(),
            },
        )
        .unwrap();
        let loc = program.uniform_location("u_Color").unwrap();

        assert_eq!(ctx.bindings().program(), None);
        program.set_uniform_4f(loc, [1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(
            ctx.driver().uniform_value(program.handle(), loc).unwrap(),
            bytemuck::cast_slice::<f32, u8>(&[1.0, 0.0, 0.0, 1.0]).to_vec()
        );
    }
}
