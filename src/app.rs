// ============================================================================
// app.rs — shader-fluid
// Application state and winit event-loop handler: frame pacing, input,
// simulation stepping and presentation.
// ============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow},
    window::{Window, WindowAttributes},
};

use crate::config::{Variant, VelocityParams, TARGET_FPS, WINDOW_HEIGHT, WINDOW_WIDTH};
use crate::error::SimError;
use crate::input::{InputController, KeyPress};
use crate::pipeline::WgpuBackend;
use crate::renderer::{HudRenderer, HudState, Presenter, BACKGROUND};
use crate::simulation::{SimulationPipeline, SimulationState};
use crate::state_io::{self, ExportMeta};

// ======================== Application ========================

pub struct App {
    state: Option<AppState>,
    variant: Variant,
    /// Startup failure, reported by `main` after the loop exits.
    error: Option<SimError>,
}

struct AppState {
    // GPU
    backend: WgpuBackend,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,

    // Simulation
    pipeline: SimulationPipeline<WgpuBackend>,
    sim: SimulationState,

    // Window
    window: Arc<Window>,

    // Presentation
    presenter: Presenter,
    hud: HudRenderer,

    input: InputController,

    // Timing
    frame_interval: Duration,
    next_frame: Instant,
    last_redraw: Instant,
    fps: f32,
}

impl App {
    pub fn new(variant: Variant) -> Self {
        Self {
            state: None,
            variant,
            error: None,
        }
    }

    pub fn take_error(&mut self) -> Option<SimError> {
        self.error.take()
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match init_state(event_loop, self.variant) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            if Instant::now() >= state.next_frame {
                state.window.request_redraw();
            }
            event_loop.set_control_flow(ControlFlow::WaitUntil(state.next_frame));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && !event.repeat {
                    if let Some(key) = KeyPress::from_winit(&event.logical_key) {
                        state.input.key_pressed(key);
                    }
                }
            }

            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    state.surface_config.width = new_size.width;
                    state.surface_config.height = new_size.height;
                    state
                        .surface
                        .configure(state.backend.device(), &state.surface_config);
                }
            }

            WindowEvent::RedrawRequested => {
                if !redraw(state) {
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            // Let in-flight passes finish before resources drop.
            state.backend.device().poll(wgpu::Maintain::Wait);
            log::info!("Shutting down after {} frames", state.sim.frame);
        }
    }
}

// ======================== Initialization ========================

fn init_state(event_loop: &ActiveEventLoop, variant: Variant) -> Result<AppState, SimError> {
    let window_attrs = WindowAttributes::default()
        .with_title(variant.window_title())
        .with_inner_size(winit::dpi::PhysicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
        .with_resizable(false);
    let window = Arc::new(event_loop.create_window(window_attrs)?);

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let surface = instance.create_surface(window.clone())?;

    let (device, queue, surface_config) =
        pollster::block_on(init_gpu(&instance, &surface, &window))?;
    surface.configure(&device, &surface_config);

    let mut backend = WgpuBackend::new(device, queue);
    let pipeline = SimulationPipeline::new(&mut backend, variant, VelocityParams::default())?;
    let presenter = Presenter::new(backend.device(), surface_config.format, pipeline.scalar());
    let hud = HudRenderer::new(backend.device(), backend.queue(), surface_config.format);

    let frame_interval = Duration::from_secs_f64(1.0 / TARGET_FPS as f64);
    let now = Instant::now();

    Ok(AppState {
        backend,
        surface,
        surface_config,
        pipeline,
        sim: SimulationState::default(),
        window,
        presenter,
        hud,
        input: InputController::new(variant.step_key()),
        frame_interval,
        next_frame: now,
        last_redraw: now,
        fps: 0.0,
    })
}

async fn init_gpu(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
    window: &Window,
) -> Result<(wgpu::Device, wgpu::Queue, wgpu::SurfaceConfiguration), SimError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or(SimError::Adapter)?;

    log::info!("GPU: {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("shader_fluid_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;

    let size = window.inner_size();
    let surface_caps = surface.get_capabilities(&adapter);
    // Field values are linear intensities; present them without sRGB encoding.
    let surface_format = surface_caps
        .formats
        .iter()
        .find(|f| !f.is_srgb())
        .copied()
        .unwrap_or(surface_caps.formats[0]);

    let surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: surface_caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };

    Ok((device, queue, surface_config))
}

// ======================== Frame Rendering ========================

/// Runs one frame. Returns `false` when the application should quit.
fn redraw(state: &mut AppState) -> bool {
    let now = Instant::now();
    let dt = now.duration_since(state.last_redraw).as_secs_f32().max(0.0001);
    state.last_redraw = now;
    state.fps = state.fps * 0.95 + (1.0 / dt) * 0.05;
    // No catch-up: a late frame pushes the schedule back.
    state.next_frame = (state.next_frame + state.frame_interval).max(now);

    let intents = state.input.take();
    if intents.quit {
        return false;
    }

    state
        .pipeline
        .update(&mut state.backend, &mut state.sim, &intents);

    if intents.export {
        export_field(state);
    }

    present(state);
    true
}

fn present(state: &mut AppState) {
    let win_w = state.surface_config.width;
    let win_h = state.surface_config.height;

    let hud = HudState {
        fps: state.fps,
        paused: state.sim.paused,
        frame: state.sim.frame,
        step_key: state.pipeline.variant().step_key(),
    };
    state.hud.prepare(
        state.backend.device(),
        state.backend.queue(),
        &hud,
        win_w,
        win_h,
    );

    let output = match state.surface.get_current_texture() {
        Ok(t) => t,
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            log::warn!("Surface lost or outdated; reconfiguring");
            state
                .surface
                .configure(state.backend.device(), &state.surface_config);
            return;
        }
        Err(e) => {
            log::error!("Surface error: {:?}", e);
            return;
        }
    };

    let view = output
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder =
        state
            .backend
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present_encoder"),
            });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("present_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(BACKGROUND),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        state.presenter.draw(
            &mut pass,
            state.sim.roles.read_index(),
            win_w,
            win_h,
        );
        state.hud.render(&mut pass);
    }
    state
        .backend
        .queue()
        .submit(std::iter::once(encoder.finish()));

    output.present();
    state.hud.trim();
}

fn export_field(state: &mut AppState) {
    let Some(image) = state.pipeline.read_field(&mut state.backend, state.sim.roles) else {
        log::warn!("Export skipped: GPU readback failed");
        return;
    };
    let meta = ExportMeta::new(
        state.pipeline.variant(),
        &image,
        state.sim.frame,
        state.sim.paused,
        state.pipeline.velocity_params(),
    );
    let path = state_io::timestamped_path();
    match state_io::save_field(&path, &image, &meta) {
        Ok(_) => log::info!("Exported field to {}", path.display()),
        Err(err) => log::warn!("Export to {} failed: {}", path.display(), err),
    }
}
