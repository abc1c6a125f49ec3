use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::driver::Driver;
use crate::gpu::{GpuContext, PresentPipeline};
use crate::types::{BenchConfig, RunSummary};

/// GPU state for the windowed path.
///
/// `ctx` is declared before `window` so the surface is dropped while the
/// window it was created from is still alive.
struct WindowState {
    ctx: GpuContext,
    present: PresentPipeline,
    driver: Driver,
    window: Arc<Window>,
}

enum FrameStatus {
    Continue,
    Exit,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &BenchConfig) -> Result<Self> {
        let size = window.inner_size();
        let ctx = GpuContext::new_windowed(window.as_ref(), size, config.dims, config.vsync)?;
        let mut driver = Driver::new(&ctx, config, Instant::now())?;
        let surface_format = ctx
            .surface
            .as_ref()
            .map(|state| state.config.format)
            .ok_or_else(|| anyhow!("windowed context has no surface"))?;
        let present = PresentPipeline::new(
            &ctx.device,
            surface_format,
            driver.session().gpu().view(),
        )?;
        driver.warm_up(&ctx)?;

        Ok(Self {
            ctx,
            present,
            driver,
            window,
        })
    }

    /// Steady-state cycle: decode, present, then counters and reports.
    fn render_frame(&mut self) -> Result<FrameStatus> {
        if self.driver.is_finished() {
            return Ok(FrameStatus::Exit);
        }
        self.driver.run_cycle(&self.ctx, Instant::now())?;

        match self.present.present(&self.ctx) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.ctx.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(anyhow!("surface out of memory"));
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; skipping present this cycle");
            }
            Err(other) => {
                warn!("surface error: {other:?}; skipping present this cycle");
            }
        }

        self.driver.finish_cycle(Instant::now());
        if self.driver.is_finished() {
            Ok(FrameStatus::Exit)
        } else {
            Ok(FrameStatus::Continue)
        }
    }
}

/// Opens an N×N window and runs decode cycles until it is closed or the
/// cycle limit is reached.
pub(crate) fn run_windowed(config: &BenchConfig) -> Result<RunSummary> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title("texbench")
        .with_inner_size(PhysicalSize::new(config.dims.width(), config.dims.height()))
        .with_resizable(false)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, config)?;
    info!(
        width = config.dims.width(),
        height = config.dims.height(),
        strategy = %config.strategy,
        vsync = config.vsync,
        "running windowed decode benchmark"
    );
    if state.driver.is_finished() {
        return Ok(state.driver.summary(&state.ctx));
    }

    let mut failure: Option<anyhow::Error> = None;
    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                state.ctx.resize(new_size);
            }
            WindowEvent::RedrawRequested => match state.render_frame() {
                Ok(FrameStatus::Continue) => {}
                Ok(FrameStatus::Exit) => elwt.exit(),
                Err(err) => {
                    error!("decode cycle failed: {err:#}");
                    failure = Some(err);
                    elwt.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            if state.driver.is_finished() {
                elwt.exit();
            } else {
                state.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Poll);
            }
        }
        _ => {}
    });

    if let Some(err) = failure {
        return Err(err);
    }
    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    Ok(state.driver.summary(&state.ctx))
}
