use anyhow::{Context, Result};

use glint_engine::core::{App, AppControl, FrameCtx};
use glint_engine::gl::{
    GlContext, IndexBuffer, Program, ShaderSource, UniformLocation, VertexBuffer, WgpuDriver,
    create_program,
};

use crate::config::DemoConfig;
use crate::oscillator::ColorOscillator;

const POSITIONS: [[f32; 2]; 4] = [[-0.5, -0.5], [0.5, -0.5], [0.5, 0.5], [-0.5, 0.5]];
const INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

struct Scene {
    vbo: VertexBuffer<WgpuDriver>,
    ibo: IndexBuffer<WgpuDriver>,
    program: Program<WgpuDriver>,
    color: UniformLocation,
}

/// One quad whose red channel oscillates every frame.
pub struct QuadDemo {
    config: DemoConfig,
    oscillator: ColorOscillator,
    scene: Option<Scene>,
}

impl QuadDemo {
    pub fn new(config: DemoConfig) -> Self {
        let oscillator = ColorOscillator::new(config.color_step, config.fixed_channels);
        Self {
            config,
            oscillator,
            scene: None,
        }
    }
}

impl App for QuadDemo {
    fn setup(&mut self, gl: &mut GlContext<WgpuDriver>) -> Result<()> {
        let path = &self.config.shader_path;
        let source = ShaderSource::load(path)?;
        log::debug!(
            "loaded {} ({} vertex bytes, {} fragment bytes)",
            path.display(),
            source.vertex.len(),
            source.fragment.len()
        );

        let vbo = VertexBuffer::new(gl, &POSITIONS).context("creating quad vertices")?;
        let ibo = IndexBuffer::new(gl, &INDICES).context("creating quad indices")?;
        let program = create_program(gl, &source)
            .with_context(|| format!("building program from {}", path.display()))?;
        let color = program.uniform_location("u_Color")?;

        self.scene = Some(Scene {
            vbo,
            ibo,
            program,
            color,
        });
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
        let Some(scene) = &self.scene else {
            return Ok(AppControl::Continue);
        };

        scene.program.bind(ctx.gl);
        scene
            .program
            .set_uniform_4f(scene.color, self.oscillator.color())?;
        scene.vbo.bind(ctx.gl);
        scene.ibo.bind(ctx.gl);
        ctx.gl.draw_elements(scene.ibo.count())?;

        self.oscillator.advance();
        Ok(AppControl::Continue)
    }

    fn teardown(&mut self) {
        self.scene = None;
    }
}
