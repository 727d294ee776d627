// ============================================================================
// texture.rs — shader-fluid
// Grid dimensions, the CPU-side texel image, GPU texture buffers, and the
// ping-pong role pair.
// ============================================================================

pub const BLACK: [u8; 4] = [0, 0, 0, 255];
pub const WHITE: [u8; 4] = [255, 255, 255, 255];

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// ======================== Grid ========================

/// Simulation grid size in cells. One cell maps to one texel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Integer midpoint. For even sizes this is the texel just past the
    /// geometric center.
    pub fn midpoint(&self) -> (i32, i32) {
        ((self.width / 2) as i32, (self.height / 2) as i32)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

// ======================== FieldImage ========================

/// CPU copy of one texture buffer: tightly packed RGBA8 rows, row 0 first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldImage {
    grid: Grid,
    texels: Vec<u8>,
}

impl FieldImage {
    pub fn new(grid: Grid, fill: [u8; 4]) -> Self {
        let mut image = Self {
            grid,
            texels: vec![0; grid.cell_count() * 4],
        };
        image.clear(fill);
        image
    }

    pub fn from_texels(grid: Grid, texels: Vec<u8>) -> Option<Self> {
        (texels.len() == grid.cell_count() * 4).then_some(Self { grid, texels })
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn clear(&mut self, color: [u8; 4]) {
        for texel in self.texels.chunks_exact_mut(4) {
            texel.copy_from_slice(&color);
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.grid.width as usize + x as usize) * 4
    }

    /// Texel at `(x, y)`. Panics when out of bounds.
    #[cfg(test)]
    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.texels[i],
            self.texels[i + 1],
            self.texels[i + 2],
            self.texels[i + 3],
        ]
    }

    /// Writes one texel. Coordinates outside the grid are ignored, matching
    /// how a draw call clips to its render target.
    pub fn put(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if !self.grid.contains(x, y) {
            return;
        }
        let i = self.offset(x as u32, y as u32);
        self.texels[i..i + 4].copy_from_slice(&color);
    }

    /// Clears `self` and copies `src` over it unscaled. CPU counterpart of
    /// the GPU texture copy.
    #[cfg(test)]
    pub fn copy_from(&mut self, src: &FieldImage) {
        self.clear(BLACK);
        let w = self.grid.width.min(src.grid.width);
        let h = self.grid.height.min(src.grid.height);
        for y in 0..h {
            let dst = self.offset(0, y);
            let from = src.offset(0, y);
            let len = w as usize * 4;
            self.texels[dst..dst + len].copy_from_slice(&src.texels[from..from + len]);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.texels
    }
}

// ======================== PingPong ========================

/// Which slot of a [`PingPong`] pair holds the latest state. Read and write
/// are always the two distinct slots.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferRoles {
    read: usize,
}

impl BufferRoles {
    /// Slot holding the latest state.
    pub fn read_index(self) -> usize {
        self.read
    }

    /// Slot the next pass renders into.
    pub fn write_index(self) -> usize {
        1 - self.read
    }

    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }
}

/// Two owned buffers addressed through [`BufferRoles`]. Swapping roles never
/// moves buffer contents.
pub struct PingPong<T> {
    slots: [T; 2],
}

impl<T> PingPong<T> {
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
        }
    }

    pub fn read(&self, roles: BufferRoles) -> &T {
        &self.slots[roles.read_index()]
    }

    pub fn write(&self, roles: BufferRoles) -> &T {
        &self.slots[roles.write_index()]
    }

    pub fn get(&self, index: usize) -> &T {
        &self.slots[index]
    }
}

// ======================== GPU Texture Buffer ========================

/// One GPU render target of grid size.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub grid: Grid,
}

impl GpuTexture {
    pub fn new(device: &wgpu::Device, label: &str, grid: Grid) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: grid.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            grid,
        }
    }

    pub fn upload(&self, queue: &wgpu::Queue, image: &FieldImage) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.grid.width * 4),
                rows_per_image: Some(self.grid.height),
            },
            self.grid.extent(),
        );
    }

    /// Blocking readback into a [`FieldImage`]. Returns `None` if mapping fails.
    pub fn read_back(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Option<FieldImage> {
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let unpadded_bpr = self.grid.width * 4;
        let padded_bpr = unpadded_bpr.div_ceil(align) * align;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("field_readback_staging"),
            size: (padded_bpr * self.grid.height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(self.grid.height),
                },
            },
            self.grid.extent(),
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            _ => return None,
        }

        let data = slice.get_mapped_range();
        let mut texels = Vec::with_capacity(self.grid.cell_count() * 4);
        for row in 0..self.grid.height {
            let start = (row * padded_bpr) as usize;
            texels.extend_from_slice(&data[start..start + unpadded_bpr as usize]);
        }
        drop(data);
        staging.unmap();

        FieldImage::from_texels(self.grid, texels)
    }
}
