// ============================================================================
// config.rs — shader-fluid
// Fixed simulation configurations, velocity parameters, and command-line
// options.
// ============================================================================

use serde::Serialize;

use crate::codec::MIN_RANGE;
use crate::error::SimError;

// ======================== Constants ========================

pub const WINDOW_WIDTH: u32 = 960;
pub const WINDOW_HEIGHT: u32 = 720;
pub const TARGET_FPS: u32 = 60;

/// Diffusion passes executed per simulated frame.
pub const DIFFUSION_ITERATIONS: usize = 20;

pub const DT: f32 = 1.0 / 60.0;
pub const DIFFUSION: f32 = 0.1;
pub const SOURCE_RADIUS: f32 = 1.0;
pub const SOURCE_STRENGTH: f32 = 1.0;

// ======================== Variants ========================

/// Key that triggers a single step while paused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum StepKey {
    ArrowRight,
    N,
}

impl StepKey {
    pub fn label(self) -> &'static str {
        match self {
            StepKey::ArrowRight => "->",
            StepKey::N => "N",
        }
    }
}

/// The two supported grid topologies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// 1024×1024 scalar field advected by a fixed rotational velocity field.
    Velocity,
    /// 256×256 scalar field, diffusion only.
    Scalar,
}

impl Variant {
    pub fn grid_size(self) -> (u32, u32) {
        match self {
            Variant::Velocity => (1024, 1024),
            Variant::Scalar => (256, 256),
        }
    }

    /// Half-width `k` of the square seed block, which spans `[-k, k]`.
    pub fn seed_half_extent(self) -> i32 {
        match self {
            Variant::Velocity => 1,
            Variant::Scalar => 5,
        }
    }

    pub fn has_velocity(self) -> bool {
        matches!(self, Variant::Velocity)
    }

    pub fn step_key(self) -> StepKey {
        match self {
            Variant::Velocity => StepKey::ArrowRight,
            Variant::Scalar => StepKey::N,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Variant::Velocity => "velocity",
            Variant::Scalar => "scalar",
        }
    }

    pub fn window_title(self) -> &'static str {
        match self {
            Variant::Velocity => "Shader Fluid Sim",
            Variant::Scalar => "Shader Diffusion Sim",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "velocity" => Some(Variant::Velocity),
            "scalar" => Some(Variant::Scalar),
            _ => None,
        }
    }
}

// ======================== Velocity Parameters ========================

/// Parameters of the initial rotational velocity field.
///
/// Construct through [`VelocityParams::new`]: it floors `max_speed` and lifts
/// `encode_range` to at least `max_speed`, so the codec never saturates below
/// the field's own speed cap.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct VelocityParams {
    pub strength: f32,
    pub max_speed: f32,
    pub encode_range: f32,
    pub influence_radius: f32,
}

impl VelocityParams {
    pub fn new(strength: f32, max_speed: f32, encode_range: f32, influence_radius: f32) -> Self {
        let max_speed = max_speed.max(MIN_RANGE);
        Self {
            strength,
            max_speed,
            encode_range: encode_range.max(max_speed),
            influence_radius: influence_radius.max(0.0),
        }
    }
}

impl Default for VelocityParams {
    fn default() -> Self {
        Self::new(0.001, 0.03, 0.0001, 20.0)
    }
}

// ======================== Command Line ========================

/// Options selected on the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub variant: Variant,
    /// Run this many frames without a window, then exit.
    pub headless_frames: Option<u32>,
    /// PNG written at the end of a headless run.
    pub export_path: Option<String>,
    pub show_help: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Velocity,
            headless_frames: None,
            export_path: None,
            show_help: false,
        }
    }
}

pub const USAGE: &str = "\
Usage: shader-fluid [--variant velocity|scalar] [--headless <frames>] [--export <file.png>]

  --variant   velocity: 1024x1024 with advection (default); scalar: 256x256 diffusion only
  --headless  run N frames without opening a window
  --export    after a headless run, write the scalar field as PNG";

impl AppConfig {
    pub fn from_env() -> Result<Self, SimError> {
        Self::parse(std::env::args().skip(1))
    }

    pub fn parse<I, S>(args: I) -> Result<Self, SimError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = AppConfig::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--variant" => {
                    let value = args
                        .next()
                        .ok_or_else(|| SimError::Args("--variant needs a value".into()))?;
                    config.variant = Variant::parse(&value).ok_or_else(|| {
                        SimError::Args(format!("unknown variant '{value}'"))
                    })?;
                }
                "--headless" => {
                    let value = args
                        .next()
                        .ok_or_else(|| SimError::Args("--headless needs a frame count".into()))?;
                    let frames = value.parse::<u32>().map_err(|_| {
                        SimError::Args(format!("invalid frame count '{value}'"))
                    })?;
                    config.headless_frames = Some(frames);
                }
                "--export" => {
                    let value = args
                        .next()
                        .ok_or_else(|| SimError::Args("--export needs a path".into()))?;
                    config.export_path = Some(value);
                }
                "-h" | "--help" => config.show_help = true,
                other => return Err(SimError::Args(format!("unknown argument '{other}'"))),
            }
        }

        if config.export_path.is_some() && config.headless_frames.is_none() {
            return Err(SimError::Args("--export requires --headless".into()));
        }

        Ok(config)
    }
}
