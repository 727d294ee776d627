// ============================================================================
// simulation.rs — shader-fluid
// SimulationPipeline: owns the ping-pong field buffers, propagates uniforms
// and drives the fixed per-frame sequence of shader passes.
// ============================================================================

use crate::config::{
    Variant, VelocityParams, DIFFUSION, DIFFUSION_ITERATIONS, DT, SOURCE_RADIUS, SOURCE_STRENGTH,
};
use crate::error::SimError;
use crate::input::Intents;
use crate::shader::{ProgramDesc, ShaderProgram, UniformSlot, UniformValue, ADVECT, DIFFUSE};
use crate::texture::{BufferRoles, FieldImage, Grid, PingPong};
use crate::world::{seeded_scalar_field, velocity_fields};

// ======================== Backend ========================

/// The GPU operations the pipeline needs. Implemented over wgpu for the real
/// application and over plain memory in tests.
pub trait RenderBackend {
    type Texture;
    type Program: ShaderProgram;

    fn create_texture(&mut self, label: &str, grid: Grid) -> Self::Texture;
    /// Compiles `desc` after checking its declared surface against the source.
    fn create_program(&mut self, desc: &'static ProgramDesc) -> Result<Self::Program, SimError>;

    /// Replaces the whole texture with `image`.
    fn upload(&mut self, texture: &Self::Texture, image: &FieldImage);
    /// Overwrites `dst` with an exact copy of `src`.
    fn copy_texture(&mut self, dst: &Self::Texture, src: &Self::Texture);

    fn set_uniform(
        &mut self,
        program: &mut Self::Program,
        slot: UniformSlot,
        value: UniformValue,
    ) -> Result<(), SimError>;
    /// Binds a persistent texture input declared by the program.
    fn bind_texture(
        &mut self,
        program: &mut Self::Program,
        name: &str,
        texture: &Self::Texture,
    ) -> Result<(), SimError>;

    /// Renders `program` over the full extent of `output`, sampling `input`.
    /// `input` and `output` must be different textures.
    fn run_pass(&mut self, program: &Self::Program, input: &Self::Texture, output: &Self::Texture);

    /// Submits everything recorded since the last flush.
    fn flush(&mut self);

    fn read_back(&mut self, texture: &Self::Texture) -> Option<FieldImage>;
}

// ======================== State ========================

/// Per-run control state, updated once per frame from input intents and
/// passes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulationState {
    pub paused: bool,
    /// Set for the single frame in which a paused simulation steps once.
    pub step_requested: bool,
    /// Read/write roles of the scalar buffer pair, swapped after every pass.
    pub roles: BufferRoles,
    /// Simulation iterations executed so far.
    pub frame: u64,
}

impl SimulationState {
    pub fn apply(&mut self, intents: &Intents) {
        if intents.toggle_pause {
            self.paused = !self.paused;
            log::info!("Simulation {}", if self.paused { "paused" } else { "resumed" });
        }
        self.step_requested = intents.step && self.paused;
    }

    /// True when no passes run this frame.
    pub fn halted(&self) -> bool {
        self.paused && !self.step_requested
    }
}

/// What a call to [`SimulationPipeline::update`] did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub reset: bool,
    pub advection_passes: usize,
    pub diffusion_passes: usize,
}

// ======================== Pipeline ========================

struct Program<P> {
    handle: P,
    paused: UniformSlot,
}

struct VelocityStage<B: RenderBackend> {
    u: B::Texture,
    v: B::Texture,
    advect: Program<B::Program>,
}

pub struct SimulationPipeline<B: RenderBackend> {
    variant: Variant,
    grid: Grid,
    velocity_params: VelocityParams,
    scalar: PingPong<B::Texture>,
    diffuse: Program<B::Program>,
    velocity: Option<VelocityStage<B>>,
}

impl<B: RenderBackend> SimulationPipeline<B> {
    /// Allocates buffers, compiles programs, resolves every uniform the
    /// pipeline addresses and writes the startup constants. Fails if a
    /// program does not declare a required uniform or texture input.
    pub fn new(
        backend: &mut B,
        variant: Variant,
        velocity_params: VelocityParams,
    ) -> Result<Self, SimError> {
        let (width, height) = variant.grid_size();
        let grid = Grid::new(width, height);

        let scalar = PingPong::new(
            backend.create_texture("scalar_0", grid),
            backend.create_texture("scalar_1", grid),
        );

        let mut diffuse = backend.create_program(&DIFFUSE)?;
        set_common_uniforms(backend, &mut diffuse, grid)?;
        set_by_name(backend, &mut diffuse, "sourceRadius", UniformValue::Float(SOURCE_RADIUS))?;
        set_by_name(backend, &mut diffuse, "sourceStrength", UniformValue::Float(SOURCE_STRENGTH))?;
        let diffuse = Program {
            paused: diffuse.locate("paused")?,
            handle: diffuse,
        };

        let velocity = if variant.has_velocity() {
            let u = backend.create_texture("velocity_u", grid);
            let v = backend.create_texture("velocity_v", grid);

            let mut advect = backend.create_program(&ADVECT)?;
            set_common_uniforms(backend, &mut advect, grid)?;
            set_by_name(
                backend,
                &mut advect,
                "velocityRange",
                UniformValue::Float(velocity_params.encode_range),
            )?;
            backend.bind_texture(&mut advect, "uVelBuffer", &u)?;
            backend.bind_texture(&mut advect, "vVelBuffer", &v)?;

            Some(VelocityStage {
                u,
                v,
                advect: Program {
                    paused: advect.locate("paused")?,
                    handle: advect,
                },
            })
        } else {
            None
        };

        let pipeline = Self {
            variant,
            grid,
            velocity_params,
            scalar,
            diffuse,
            velocity,
        };
        // Both slots receive the seed, so any starting roles will do.
        pipeline.reset(backend, BufferRoles::default());

        log::info!(
            "Simulation ready: {} variant, {}x{} grid, velocity range {}",
            variant.name(),
            grid.width,
            grid.height,
            velocity_params.encode_range,
        );
        Ok(pipeline)
    }

    /// Reseeds the scalar pair so both roles hold the same initial field, and
    /// rewrites the velocity buffers. Pause state is untouched.
    pub fn reset(&self, backend: &mut B, roles: BufferRoles) {
        let seed = seeded_scalar_field(self.grid, self.variant.seed_half_extent());
        backend.upload(self.scalar.read(roles), &seed);
        backend.copy_texture(self.scalar.write(roles), self.scalar.read(roles));

        if let Some(stage) = &self.velocity {
            let (u, v) = velocity_fields(self.grid, &self.velocity_params);
            backend.upload(&stage.u, &u);
            backend.upload(&stage.v, &v);
        }
        backend.flush();
    }

    /// Runs one displayed frame: applies intents, pushes the pause flag to
    /// every active program and, unless halted, executes one iteration
    /// (advection once, then the diffusion batch).
    pub fn update(
        &mut self,
        backend: &mut B,
        state: &mut SimulationState,
        intents: &Intents,
    ) -> FrameReport {
        let mut report = FrameReport::default();

        state.apply(intents);
        if intents.reset {
            self.reset(backend, state.roles);
            report.reset = true;
            log::info!("Simulation reset");
        }

        let halted = UniformValue::Int(state.halted() as i32);
        push_uniform(backend, &mut self.diffuse, halted);
        if let Some(stage) = &mut self.velocity {
            push_uniform(backend, &mut stage.advect, halted);
        }

        if !state.halted() {
            if let Some(stage) = &self.velocity {
                backend.run_pass(
                    &stage.advect.handle,
                    self.scalar.read(state.roles),
                    self.scalar.write(state.roles),
                );
                state.roles.swap();
                report.advection_passes += 1;
            }
            for _ in 0..DIFFUSION_ITERATIONS {
                backend.run_pass(
                    &self.diffuse.handle,
                    self.scalar.read(state.roles),
                    self.scalar.write(state.roles),
                );
                state.roles.swap();
                report.diffusion_passes += 1;
            }
            state.frame += 1;
            if state.step_requested {
                log::debug!("Single step to frame {}", state.frame);
            }
        }
        state.step_requested = false;

        backend.flush();
        report
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Effective parameters, after construction-time clamping.
    pub fn velocity_params(&self) -> VelocityParams {
        self.velocity_params
    }

    pub fn scalar(&self) -> &PingPong<B::Texture> {
        &self.scalar
    }

    /// Reads back the buffer currently in the read role.
    pub fn read_field(&self, backend: &mut B, roles: BufferRoles) -> Option<FieldImage> {
        backend.read_back(self.scalar.read(roles))
    }
}

fn set_by_name<B: RenderBackend>(
    backend: &mut B,
    program: &mut B::Program,
    name: &str,
    value: UniformValue,
) -> Result<(), SimError> {
    let slot = program.locate(name)?;
    log::debug!("{}.{} -> {:?}", program.desc().name, name, value);
    backend.set_uniform(program, slot, value)
}

fn set_common_uniforms<B: RenderBackend>(
    backend: &mut B,
    program: &mut B::Program,
    grid: Grid,
) -> Result<(), SimError> {
    let resolution = [grid.width as f32, grid.height as f32];
    set_by_name(backend, program, "resolution", UniformValue::Vec2(resolution))?;
    set_by_name(backend, program, "gridSize", UniformValue::Int(grid.width as i32))?;
    set_by_name(backend, program, "dt", UniformValue::Float(DT))?;
    set_by_name(backend, program, "diff", UniformValue::Float(DIFFUSION))?;
    set_by_name(backend, program, "paused", UniformValue::Int(0))
}

fn push_uniform<B: RenderBackend>(
    backend: &mut B,
    program: &mut Program<B::Program>,
    value: UniformValue,
) {
    // The slot was resolved and type-checked at startup.
    if let Err(err) = backend.set_uniform(&mut program.handle, program.paused, value) {
        log::error!("{err}");
    }
}

// ======================== Tests ========================

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use crate::shader::UniformBlock;
    use crate::texture::BLACK;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct PassRecord {
        pub program: &'static str,
        pub input: usize,
        pub output: usize,
    }

    pub struct MockProgram {
        pub desc: &'static ProgramDesc,
        pub block: UniformBlock,
        pub bound: Vec<Option<usize>>,
    }

    impl ShaderProgram for MockProgram {
        fn desc(&self) -> &'static ProgramDesc {
            self.desc
        }
    }

    /// Textures are indices into `images`. A pass copies its input to its
    /// output and bumps the red channel of texel (0, 0), so every executed
    /// pass leaves a visible mark.
    #[derive(Default)]
    pub struct MockBackend {
        pub images: Vec<FieldImage>,
        pub labels: Vec<String>,
        pub passes: Vec<PassRecord>,
        pub flushes: usize,
    }

    impl MockBackend {
        pub fn index_of(&self, label: &str) -> usize {
            self.labels.iter().position(|l| l == label).unwrap()
        }
    }

    impl RenderBackend for MockBackend {
        type Texture = usize;
        type Program = MockProgram;

        fn create_texture(&mut self, label: &str, grid: Grid) -> usize {
            self.images.push(FieldImage::new(grid, BLACK));
            self.labels.push(label.to_string());
            self.images.len() - 1
        }

        fn create_program(
            &mut self,
            desc: &'static ProgramDesc,
        ) -> Result<MockProgram, SimError> {
            desc.verify()?;
            Ok(MockProgram {
                desc,
                block: UniformBlock::new(desc),
                bound: vec![None; desc.textures.len()],
            })
        }

        fn upload(&mut self, texture: &usize, image: &FieldImage) {
            self.images[*texture] = image.clone();
        }

        fn copy_texture(&mut self, dst: &usize, src: &usize) {
            let src = self.images[*src].clone();
            self.images[*dst].copy_from(&src);
        }

        fn set_uniform(
            &mut self,
            program: &mut MockProgram,
            slot: UniformSlot,
            value: UniformValue,
        ) -> Result<(), SimError> {
            program.block.set(slot, value)
        }

        fn bind_texture(
            &mut self,
            program: &mut MockProgram,
            name: &str,
            texture: &usize,
        ) -> Result<(), SimError> {
            let index = program.desc.texture_index(name)?;
            program.bound[index] = Some(*texture);
            Ok(())
        }

        fn run_pass(&mut self, program: &MockProgram, input: &usize, output: &usize) {
            assert_ne!(input, output, "pass reads the buffer it writes");
            let mut image = self.images[*input].clone();
            let mut texel = image.get(0, 0);
            texel[0] = texel[0].wrapping_add(1);
            image.put(0, 0, texel);
            self.images[*output] = image;
            self.passes.push(PassRecord {
                program: program.desc.name,
                input: *input,
                output: *output,
            });
        }

        fn flush(&mut self) {
            self.flushes += 1;
        }

        fn read_back(&mut self, texture: &usize) -> Option<FieldImage> {
            Some(self.images[*texture].clone())
        }
    }
}
