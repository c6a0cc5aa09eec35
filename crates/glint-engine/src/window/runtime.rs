use anyhow::{Context, Result, anyhow};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl, FrameCtx};
use crate::device::{Gpu, GpuInit, SurfaceErrorAction};
use crate::gl::{GlContext, WgpuDriver};

/// Window options.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub clear_color: wgpu::Color,
    /// Close the window when Escape is pressed.
    pub exit_on_escape: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "glint".to_string(),
            initial_size: LogicalSize::new(640.0, 480.0),
            clear_color: wgpu::Color::BLACK,
            exit_on_escape: true,
        }
    }
}

/// Single-window event loop.
pub struct Runtime;

impl Runtime {
    /// Runs `app` until its window closes.
    ///
    /// Returns the first setup or frame error, after GPU resources were released.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        state.shutdown();
        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct AppState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    // Field order: the GL context (and the driver it shares) before the device.
    gl: Option<GlContext<WgpuDriver>>,
    entry: Option<WindowEntry>,

    frame_index: u64,
    failure: Option<anyhow::Error>,
    exit_requested: bool,
    shut_down: bool,
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            gl: None,
            entry: None,
            frame_index: 0,
            failure: None,
            exit_requested: false,
            shut_down: false,
        }
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        self.shutdown();
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        self.request_exit(event_loop);
    }

    /// Releases app resources, then the driver, then the window and device.
    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if self.gl.is_some() {
            self.app.teardown();
        }
        self.gl = None;
        self.entry = None;
        log::debug!("runtime shut down after {} frame(s)", self.frame_index);
    }

    fn open_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let entry = WindowEntryTryBuilder {
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()
        .context("GPU initialization failed")?;

        let driver = entry.with_gpu(|gpu| WgpuDriver::new(gpu.device().clone(), gpu.surface_format()));
        log::debug!("programs render into {:?}", driver.target_format());
        // Stored before setup so a failing setup still gets `teardown`.
        self.entry = Some(entry);
        let gl = self.gl.insert(GlContext::new(driver));
        self.app.setup(gl).context("application setup failed")?;

        if let Some(entry) = &self.entry {
            let adapter = entry.with_gpu(|gpu| gpu.adapter_info().name.clone());
            log::info!("window `{}` ready on {adapter}", self.config.title);
            entry.with_window(|w| w.request_redraw());
        }
        Ok(())
    }

    fn redraw(&mut self) -> Result<AppControl> {
        let (Some(entry), Some(gl)) = (self.entry.as_mut(), self.gl.as_mut()) else {
            return Ok(AppControl::Continue);
        };
        let app = &mut self.app;
        let frame_index = self.frame_index;
        let clear = self.config.clear_color;

        let control = entry.with_mut(|fields| -> Result<Option<AppControl>> {
            let mut frame = match fields.gpu.begin_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    return match fields.gpu.handle_surface_error(err) {
                        SurfaceErrorAction::Fatal => Err(anyhow!("surface is out of memory")),
                        SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => Ok(None),
                    };
                }
            };

            let mut ctx = FrameCtx {
                gl: &mut *gl,
                frame_index,
                size: fields.gpu.size(),
                clear,
            };
            let control = app
                .on_frame(&mut ctx)
                .with_context(|| format!("frame {frame_index} failed"))?;
            let clear = ctx.clear;

            log::trace!("frame {frame_index}: {} draw(s)", gl.driver().pending_draws());
            gl.driver().encode_pass(&mut frame.encoder, &frame.view, clear);
            fields.window.pre_present_notify();
            fields.gpu.submit(frame);
            Ok(Some(control))
        })?;

        match control {
            Some(control) => {
                self.frame_index += 1;
                Ok(control)
            }
            None => Ok(AppControl::Continue),
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.exit_requested {
            return;
        }

        if let Err(err) = self.open_window(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Animation runs every frame: keep redrawing.
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.request_exit(event_loop);
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.request_exit(event_loop),

            WindowEvent::KeyboardInput { event: key, .. }
                if self.config.exit_on_escape
                    && key.state == ElementState::Pressed
                    && key.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                self.request_exit(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_gpu_mut(|gpu| gpu.resize(*new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_mut() {
                    let new_size = entry.with_window(|w| w.inner_size());
                    entry.with_gpu_mut(|gpu| gpu.resize(new_size));
                }
            }

            WindowEvent::RedrawRequested => match self.redraw() {
                Ok(AppControl::Continue) => {}
                Ok(AppControl::Exit) => self.request_exit(event_loop),
                Err(err) => self.fail(event_loop, err),
            },

            _ => {}
        }
    }
}
