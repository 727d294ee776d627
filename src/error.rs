// ============================================================================
// error.rs — shader-fluid
// Startup and export failures. The per-frame simulation path is infallible.
// ============================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("shader program '{program}' has no uniform named '{name}'")]
    MissingUniform {
        program: &'static str,
        name: String,
    },
    #[error("uniform '{name}' of shader program '{program}' does not accept this value type")]
    UniformType {
        program: &'static str,
        name: &'static str,
    },
    #[error("uniform '{name}' of shader program '{program}' sits at byte {actual}, host expects {declared}")]
    UniformOffset {
        program: &'static str,
        name: &'static str,
        declared: usize,
        actual: usize,
    },
    #[error("shader program '{program}': {message}")]
    Shader {
        program: &'static str,
        message: String,
    },
    #[error("shader program '{program}' has no texture input named '{name}'")]
    MissingTexture {
        program: &'static str,
        name: String,
    },
    #[error("no suitable GPU adapter found (Vulkan, Metal, DX12 or GL required)")]
    Adapter,
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to create window surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("GPU readback failed")]
    Readback,
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to serialize export metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Args(String),
}
