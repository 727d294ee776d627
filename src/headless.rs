// ============================================================================
// headless.rs — shader-fluid
// Windowless runner: steps the same pipeline for a fixed number of frames and
// optionally exports the final field.
// ============================================================================

use std::path::Path;
use std::time::Instant;

use crate::config::{Variant, VelocityParams};
use crate::error::SimError;
use crate::input::Intents;
use crate::pipeline::WgpuBackend;
use crate::simulation::{SimulationPipeline, SimulationState};
use crate::state_io::{self, ExportMeta};

#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    pub variant: Variant,
    pub frames: u32,
    pub export_path: Option<String>,
    pub progress_interval: u32,
}

pub fn run_headless(config: &HeadlessConfig) -> Result<(), SimError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok_or(SimError::Adapter)?;
    log::info!("GPU: {}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("shader_fluid_headless_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
        },
        None,
    ))?;

    let mut backend = WgpuBackend::new(device, queue);
    let mut pipeline =
        SimulationPipeline::new(&mut backend, config.variant, VelocityParams::default())?;
    let mut state = SimulationState::default();

    let grid = pipeline.grid();
    log::info!(
        "Headless run started: {} frames on {}x{}",
        config.frames,
        grid.width,
        grid.height
    );

    let started = Instant::now();
    let idle = Intents::default();
    for step in 0..config.frames {
        pipeline.update(&mut backend, &mut state, &idle);

        if config.progress_interval > 0 && (step + 1) % config.progress_interval == 0 {
            let done = step + 1;
            let elapsed = started.elapsed().as_secs_f64().max(1e-6);
            log::info!(
                "Headless progress: {}/{} | fps={:.0}",
                done,
                config.frames,
                done as f64 / elapsed
            );
        }
    }
    backend.device().poll(wgpu::Maintain::Wait);

    if let Some(path) = &config.export_path {
        let image = pipeline
            .read_field(&mut backend, state.roles)
            .ok_or(SimError::Readback)?;
        let meta = ExportMeta::new(
            config.variant,
            &image,
            state.frame,
            state.paused,
            pipeline.velocity_params(),
        );
        state_io::save_field(Path::new(path), &image, &meta)?;
        log::info!("Saved final field to {}", path);
    }

    Ok(())
}
