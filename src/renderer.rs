// ============================================================================
// renderer.rs — shader-fluid
// Presentation: letterboxed blit of the current field buffer into the window,
// and the HUD text overlay via glyphon.
// ============================================================================

use bytemuck::{Pod, Zeroable};
use glyphon::{
    Attrs, Buffer as TextBuffer, Cache as GlyphCache, Color as GlyphColor, Family, FontSystem,
    Metrics, Resolution, Shaping, SwashCache, TextArea, TextAtlas, TextBounds, TextRenderer,
    Viewport as GlyphViewport,
};
use wgpu::util::DeviceExt;

use crate::config::StepKey;
use crate::pipeline::{
    bg_buffer, bg_texture, bgl_sampler, bgl_texture, bgl_uniform, create_fragment_pipeline,
    load_shader,
};
use crate::texture::{GpuTexture, Grid, PingPong};

pub const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 20.0 / 255.0,
    g: 20.0 / 255.0,
    b: 20.0 / 255.0,
    a: 1.0,
};

// ======================== Layout ========================

/// Destination rectangle in window pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Largest uniformly scaled rectangle of the grid's aspect ratio that fits in
/// the window, centered.
pub fn letterbox(window_width: u32, window_height: u32, grid: Grid) -> Rect {
    let scale = (window_width as f32 / grid.width as f32)
        .min(window_height as f32 / grid.height as f32);
    let width = grid.width as f32 * scale;
    let height = grid.height as f32 * scale;
    Rect {
        x: (window_width as f32 - width) * 0.5,
        y: (window_height as f32 - height) * 0.5,
        width,
        height,
    }
}

/// Source rectangle over the field texture in texels. The height is
/// negative: row 0 of the field is the bottom of the displayed image.
pub fn source_rect(grid: Grid) -> Rect {
    Rect {
        x: 0.0,
        y: 0.0,
        width: grid.width as f32,
        height: -(grid.height as f32),
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct BlitParams {
    pub uv_offset: [f32; 2],
    pub uv_scale: [f32; 2],
}

impl BlitParams {
    /// Maps destination coordinates `t ∈ [0,1]²` (top-left origin) onto the
    /// source rectangle in normalized texture coordinates. A negative source
    /// extent starts at the far edge and walks backwards.
    pub fn from_source(src: Rect, grid: Grid) -> Self {
        let w = grid.width as f32;
        let h = grid.height as f32;
        let start_x = if src.width < 0.0 { src.x - src.width } else { src.x };
        let start_y = if src.height < 0.0 { src.y - src.height } else { src.y };
        Self {
            uv_offset: [start_x / w, start_y / h],
            uv_scale: [src.width / w, src.height / h],
        }
    }
}

// ======================== Presenter ========================

/// Draws the read buffer of the scalar pair into the window.
pub struct Presenter {
    pipeline: wgpu::RenderPipeline,
    bind_groups: [wgpu::BindGroup; 2],
    grid: Grid,
}

impl Presenter {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        scalar: &PingPong<GpuTexture>,
    ) -> Self {
        let grid = scalar.get(0).grid;
        let module = load_shader(device, "blit", include_str!("shaders/blit.wgsl"));

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit_bgl"),
            entries: &[bgl_uniform(0), bgl_texture(1), bgl_sampler(2)],
        });
        let pipeline = create_fragment_pipeline(device, "blit", &[&bgl], &module, surface_format);

        let params = BlitParams::from_source(source_rect(grid), grid);
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("blit_params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit_sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // One bind group per ping-pong slot, selected by the read index.
        let make_group = |index: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("blit_bg_{index}")),
                layout: &bgl,
                entries: &[
                    bg_buffer(0, &params_buffer),
                    bg_texture(1, &scalar.get(index).view),
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            })
        };

        Self {
            pipeline,
            bind_groups: [make_group(0), make_group(1)],
            grid,
        }
    }

    /// Blits the buffer at `read_index` into the letterbox rectangle of a
    /// pass targeting a `window_width`×`window_height` surface.
    pub fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        read_index: usize,
        window_width: u32,
        window_height: u32,
    ) {
        let dest = letterbox(window_width, window_height, self.grid);
        if dest.width < 1.0 || dest.height < 1.0 {
            return;
        }
        pass.set_viewport(dest.x, dest.y, dest.width, dest.height, 0.0, 1.0);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[read_index], &[]);
        pass.draw(0..3, 0..1);
        pass.set_viewport(0.0, 0.0, window_width as f32, window_height as f32, 0.0, 1.0);
    }
}

// ======================== HUD ========================

/// Everything the overlay shows for one frame.
pub struct HudState {
    pub fps: f32,
    pub paused: bool,
    pub frame: u64,
    pub step_key: StepKey,
}

const TEXT_SIZE: f32 = 20.0;
const TEXT_LEFT: f32 = 24.0;
const RUNNING_COLOR: GlyphColor = GlyphColor::rgb(0, 228, 48);
const PAUSED_COLOR: GlyphColor = GlyphColor::rgb(230, 41, 55);
const TEXT_COLOR: GlyphColor = GlyphColor::rgb(245, 245, 245);

/// All glyphon resources needed for HUD text rendering.
pub struct HudRenderer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    glyph_viewport: GlyphViewport,
    text_atlas: TextAtlas,
    text_renderer: TextRenderer,
    fps_buffer: TextBuffer,
    status_buffer: TextBuffer,
    help_buffer: TextBuffer,
}

impl HudRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let mut font_system = FontSystem::new();
        let swash_cache = SwashCache::new();
        let glyph_cache = GlyphCache::new(device);
        let glyph_viewport = GlyphViewport::new(device, &glyph_cache);
        let mut text_atlas = TextAtlas::new(device, queue, &glyph_cache, surface_format);
        let text_renderer =
            TextRenderer::new(&mut text_atlas, device, wgpu::MultisampleState::default(), None);

        let metrics = Metrics::new(TEXT_SIZE, TEXT_SIZE * 1.2);
        let fps_buffer = TextBuffer::new(&mut font_system, metrics);
        let status_buffer = TextBuffer::new(&mut font_system, metrics);
        let help_buffer = TextBuffer::new(&mut font_system, metrics);

        Self {
            font_system,
            swash_cache,
            glyph_viewport,
            text_atlas,
            text_renderer,
            fps_buffer,
            status_buffer,
            help_buffer,
        }
    }

    /// Prepare HUD text for the current frame.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        hud: &HudState,
        win_w: u32,
        win_h: u32,
    ) {
        self.glyph_viewport.update(
            queue,
            Resolution {
                width: win_w,
                height: win_h,
            },
        );

        let font = &mut self.font_system;
        let attrs = Attrs::new().family(Family::Monospace);
        for (buffer, text) in [
            (&mut self.fps_buffer, fps_text(hud)),
            (&mut self.status_buffer, status_text(hud).to_string()),
            (&mut self.help_buffer, help_text(hud.step_key)),
        ] {
            buffer.set_size(font, Some(win_w as f32), Some(win_h as f32));
            buffer.set_text(font, &text, attrs, Shaping::Basic);
            buffer.shape_until_scroll(font, false);
        }

        let line = TEXT_SIZE * 1.2;
        let bounds = TextBounds {
            left: 0,
            top: 0,
            right: win_w as i32,
            bottom: win_h as i32,
        };
        let status_top = win_h as f32 - 120.0;
        let areas = [
            TextArea {
                buffer: &self.fps_buffer,
                left: 10.0,
                top: 10.0,
                scale: 1.0,
                bounds,
                default_color: RUNNING_COLOR,
                custom_glyphs: &[],
            },
            TextArea {
                buffer: &self.status_buffer,
                left: TEXT_LEFT,
                top: status_top,
                scale: 1.0,
                bounds,
                default_color: if hud.paused { PAUSED_COLOR } else { RUNNING_COLOR },
                custom_glyphs: &[],
            },
            TextArea {
                buffer: &self.help_buffer,
                left: TEXT_LEFT,
                top: status_top + line,
                scale: 1.0,
                bounds,
                default_color: TEXT_COLOR,
                custom_glyphs: &[],
            },
        ];

        if let Err(err) = self.text_renderer.prepare(
            device,
            queue,
            &mut self.font_system,
            &mut self.text_atlas,
            &self.glyph_viewport,
            areas,
            &mut self.swash_cache,
        ) {
            log::warn!("HUD prepare failed: {err}");
        }
    }

    /// Render HUD overlay into an active render pass.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        if let Err(err) = self
            .text_renderer
            .render(&self.text_atlas, &self.glyph_viewport, pass)
        {
            log::warn!("HUD render failed: {err}");
        }
    }

    /// Trim the glyph atlas after presenting.
    pub fn trim(&mut self) {
        self.text_atlas.trim();
    }
}

// ======================== HUD Text Builder ========================

fn fps_text(hud: &HudState) -> String {
    format!("{:.0} FPS   frame {}", hud.fps, hud.frame)
}

fn status_text(hud: &HudState) -> &'static str {
    if hud.paused {
        "PAUSED"
    } else {
        "RUNNING"
    }
}

fn help_text(step_key: StepKey) -> String {
    format!(
        "Space: Pause/Resume\n{}: Step once\nR: Reset\nF12: Export",
        step_key.label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_grid_is_pillarboxed_in_landscape_window() {
        let rect = letterbox(960, 720, Grid::new(1024, 1024));
        assert_eq!(rect.width, 720.0);
        assert_eq!(rect.height, 720.0);
        assert_eq!(rect.x, 120.0);
        assert_eq!(rect.y, 0.0);
    }

    #[test]
    fn small_grid_is_scaled_up() {
        let rect = letterbox(960, 720, Grid::new(256, 256));
        assert_eq!(rect.width, 720.0);
        assert_eq!(rect.x, 120.0);
    }

    #[test]
    fn wide_grid_is_letterboxed() {
        let rect = letterbox(800, 800, Grid::new(400, 200));
        assert_eq!(rect.width, 800.0);
        assert_eq!(rect.height, 400.0);
        assert_eq!(rect.y, 200.0);
    }

    #[test]
    fn flipped_source_reads_bottom_row_first() {
        let grid = Grid::new(1024, 1024);
        let params = BlitParams::from_source(source_rect(grid), grid);
        assert_eq!(params.uv_offset, [0.0, 1.0]);
        assert_eq!(params.uv_scale, [1.0, -1.0]);
    }

    #[test]
    fn help_names_the_variant_step_key() {
        assert!(help_text(StepKey::ArrowRight).contains("->: Step once"));
        assert!(help_text(StepKey::N).contains("N: Step once"));
    }
}
