// ============================================================================
// pipeline.rs — shader-fluid
// wgpu implementation of the render backend: fragment-program pipelines,
// bind-group-layout helpers, and pass recording.
// ============================================================================

use crate::error::SimError;
use crate::shader::{ProgramDesc, ShaderProgram, UniformBlock, UniformSlot, UniformValue};
use crate::simulation::RenderBackend;
use crate::texture::{FieldImage, GpuTexture, Grid, TEXTURE_FORMAT};

// ======================== Programs ========================

/// A compiled fragment program with its uniform buffer and the bind groups
/// of its persistent texture inputs.
pub struct GpuProgram {
    desc: &'static ProgramDesc,
    block: UniformBlock,
    uniform_buffer: wgpu::Buffer,
    input_bgl: wgpu::BindGroupLayout,
    texture_bgl: wgpu::BindGroupLayout,
    texture_groups: Vec<Option<wgpu::BindGroup>>,
    pipeline: wgpu::RenderPipeline,
}

impl ShaderProgram for GpuProgram {
    fn desc(&self) -> &'static ProgramDesc {
        self.desc
    }
}

// ======================== Backend ========================

/// Records simulation passes into one command encoder per frame.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    sampler: wgpu::Sampler,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("field_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            device,
            queue,
            sampler,
            encoder: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl RenderBackend for WgpuBackend {
    type Texture = GpuTexture;
    type Program = GpuProgram;

    fn create_texture(&mut self, label: &str, grid: Grid) -> GpuTexture {
        GpuTexture::new(&self.device, label, grid)
    }

    fn create_program(&mut self, desc: &'static ProgramDesc) -> Result<GpuProgram, SimError> {
        desc.verify()?;
        let module = load_shader(&self.device, desc.name, desc.source);

        let input_bgl = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{}_input_bgl", desc.name)),
                entries: &[bgl_uniform(0), bgl_texture(1), bgl_sampler(2)],
            });
        let texture_bgl = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{}_texture_bgl", desc.name)),
                entries: &[bgl_texture(0)],
            });

        let mut layouts = vec![&input_bgl];
        layouts.extend(desc.textures.iter().map(|_| &texture_bgl));
        let pipeline =
            create_fragment_pipeline(&self.device, desc.name, &layouts, &module, TEXTURE_FORMAT);

        let block = UniformBlock::new(desc);
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{}_uniforms", desc.name)),
            size: desc.block_size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(GpuProgram {
            desc,
            block,
            uniform_buffer,
            input_bgl,
            texture_bgl,
            texture_groups: desc.textures.iter().map(|_| None).collect(),
            pipeline,
        })
    }

    fn upload(&mut self, texture: &GpuTexture, image: &FieldImage) {
        // Queue writes land before the next submission; keep them ordered
        // after anything already recorded.
        self.flush();
        texture.upload(&self.queue, image);
    }

    fn copy_texture(&mut self, dst: &GpuTexture, src: &GpuTexture) {
        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("sim_encoder"),
                })
        });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &src.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dst.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            dst.grid.extent(),
        );
    }

    fn set_uniform(
        &mut self,
        program: &mut GpuProgram,
        slot: UniformSlot,
        value: UniformValue,
    ) -> Result<(), SimError> {
        program.block.set(slot, value)?;
        self.queue
            .write_buffer(&program.uniform_buffer, 0, program.block.as_bytes());
        Ok(())
    }

    fn bind_texture(
        &mut self,
        program: &mut GpuProgram,
        name: &str,
        texture: &GpuTexture,
    ) -> Result<(), SimError> {
        let index = program.desc.texture_index(name)?;
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(name),
            layout: &program.texture_bgl,
            entries: &[bg_texture(0, &texture.view)],
        });
        program.texture_groups[index] = Some(group);
        Ok(())
    }

    fn run_pass(&mut self, program: &GpuProgram, input: &GpuTexture, output: &GpuTexture) {
        let input_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_input_bg", program.desc.name)),
            layout: &program.input_bgl,
            entries: &[
                bg_buffer(0, &program.uniform_buffer),
                bg_texture(1, &input.view),
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("sim_encoder"),
                })
        });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(program.desc.name),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &output.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&program.pipeline);
        pass.set_bind_group(0, &input_group, &[]);
        for (i, group) in program.texture_groups.iter().enumerate() {
            match group {
                Some(group) => pass.set_bind_group(1 + i as u32, group, &[]),
                None => log::warn!(
                    "{} pass with unbound texture '{}'",
                    program.desc.name,
                    program.desc.textures[i]
                ),
            }
        }
        pass.draw(0..3, 0..1);
    }

    fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn read_back(&mut self, texture: &GpuTexture) -> Option<FieldImage> {
        self.flush();
        texture.read_back(&self.device, &self.queue)
    }
}

// ======================== Helpers ========================

pub fn load_shader(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

/// Full-screen-triangle pipeline: `vs_main` / `fs_main`, no vertex buffers.
pub fn create_fragment_pipeline(
    device: &wgpu::Device,
    name: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    module: &wgpu::ShaderModule,
    target_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name}_pipeline_layout")),
        bind_group_layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{name}_pipeline")),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

pub fn bgl_uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn bgl_texture(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub fn bgl_sampler(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

pub fn bg_buffer(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

pub fn bg_texture(binding: u32, view: &wgpu::TextureView) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(view),
    }
}
