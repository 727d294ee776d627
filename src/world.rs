// ============================================================================
// world.rs — shader-fluid
// Initial contents of the state buffers: the scalar seed block and the
// analytic rotational velocity field.
// ============================================================================

use crate::codec::{encode, grey_texel, ZERO_LEVEL};
use crate::config::VelocityParams;
use crate::texture::{FieldImage, Grid, BLACK, WHITE};

/// Clears `image` to black and stamps a white square of half-width
/// `half_extent` on the integer midpoint, covering `[mid-k, mid+k]` on both
/// axes.
pub fn reset_scalar_field(image: &mut FieldImage, half_extent: i32) {
    image.clear(BLACK);
    let (xmid, ymid) = image.grid().midpoint();
    for y in -half_extent..=half_extent {
        for x in -half_extent..=half_extent {
            image.put(xmid + x, ymid + y, WHITE);
        }
    }
}

/// Fresh scalar field for `grid`.
pub fn seeded_scalar_field(grid: Grid, half_extent: i32) -> FieldImage {
    let mut image = FieldImage::new(grid, BLACK);
    reset_scalar_field(&mut image, half_extent);
    image
}

/// Offset of texel `(x, y)`'s center from the grid center.
fn center_offset(grid: Grid, x: u32, y: u32) -> (f32, f32) {
    (
        x as f32 + 0.5 - grid.width as f32 * 0.5,
        y as f32 + 0.5 - grid.height as f32 * 0.5,
    )
}

/// Rotational velocity at texel `(x, y)`: perpendicular to the radius,
/// falling off as `1 / (d + 1)`, each component clamped to `±max_speed`.
pub fn velocity_at(grid: Grid, x: u32, y: u32, params: &VelocityParams) -> [f32; 2] {
    let (px, py) = center_offset(grid, x, y);
    let dist = (px * px + py * py).sqrt() + 1.0;
    let max_speed = params.max_speed;
    [
        (-py / dist * params.strength).clamp(-max_speed, max_speed),
        (px / dist * params.strength).clamp(-max_speed, max_speed),
    ]
}

/// Builds the x- and y-component velocity images. Texels further than
/// `influence_radius` from the center hold the encoded zero.
pub fn velocity_fields(grid: Grid, params: &VelocityParams) -> (FieldImage, FieldImage) {
    let zero = grey_texel(ZERO_LEVEL);
    let mut u = FieldImage::new(grid, zero);
    let mut v = FieldImage::new(grid, zero);

    for y in 0..grid.height {
        for x in 0..grid.width {
            let (dx, dy) = center_offset(grid, x, y);
            if (dx * dx + dy * dy).sqrt() > params.influence_radius {
                continue;
            }
            let [vx, vy] = velocity_at(grid, x, y, params);
            u.put(x as i32, y as i32, grey_texel(encode(vx, params.encode_range)));
            v.put(x as i32, y as i32, grey_texel(encode(vy, params.encode_range)));
        }
    }

    (u, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;

    #[test]
    fn seed_block_is_centered_on_integer_midpoint() {
        let grid = Grid::new(16, 16);
        let image = seeded_scalar_field(grid, 1);
        let mut lit = Vec::new();
        for y in 0..16 {
            for x in 0..16 {
                if image.get(x, y) == WHITE {
                    lit.push((x, y));
                } else {
                    assert_eq!(image.get(x, y), BLACK);
                }
            }
        }
        assert_eq!(lit.len(), 9);
        assert!(lit.iter().all(|&(x, y)| (7..=9).contains(&x) && (7..=9).contains(&y)));
    }

    #[test]
    fn large_seed_block() {
        let image = seeded_scalar_field(Grid::new(256, 256), 5);
        let lit = (0..256u32)
            .flat_map(|y| (0..256u32).map(move |x| (x, y)))
            .filter(|&(x, y)| image.get(x, y) == WHITE)
            .count();
        assert_eq!(lit, 121);
        assert_eq!(image.get(123, 123), WHITE);
        assert_eq!(image.get(133, 133), WHITE);
        assert_eq!(image.get(122, 128), BLACK);
        assert_eq!(image.get(134, 128), BLACK);
    }

    #[test]
    fn reset_is_not_cumulative() {
        let grid = Grid::new(32, 32);
        let mut image = FieldImage::new(grid, [9, 9, 9, 255]);
        reset_scalar_field(&mut image, 1);
        let once = image.clone();
        reset_scalar_field(&mut image, 1);
        assert_eq!(image, once);
    }

    #[test]
    fn velocity_is_bounded_inside_radius_and_zero_outside() {
        let grid = Grid::new(64, 64);
        let params = VelocityParams::new(0.5, 0.03, 0.0001, 10.0);
        let (u, v) = velocity_fields(grid, &params);
        let step = params.encode_range / 255.0;

        for y in 0..64 {
            for x in 0..64 {
                let dx = x as f32 + 0.5 - 32.0;
                let dy = y as f32 + 0.5 - 32.0;
                let inside = (dx * dx + dy * dy).sqrt() <= params.influence_radius;
                let cu = u.get(x, y)[0];
                let cv = v.get(x, y)[0];
                if inside {
                    assert!(decode(cu, params.encode_range).abs() <= params.max_speed + step);
                    assert!(decode(cv, params.encode_range).abs() <= params.max_speed + step);
                } else {
                    assert_eq!(cu, ZERO_LEVEL);
                    assert_eq!(cv, ZERO_LEVEL);
                }
            }
        }
    }

    #[test]
    fn velocity_rotates_counter_clockwise() {
        let grid = Grid::new(64, 64);
        let params = VelocityParams::new(0.001, 0.03, 0.0, 20.0);
        // Right of center: flow points +y. Above center: flow points -x.
        let right = velocity_at(grid, 40, 31, &params);
        assert!(right[1] > 0.0);
        let above = velocity_at(grid, 31, 40, &params);
        assert!(above[0] < 0.0);
    }

    #[test]
    fn velocity_components_are_clamped() {
        let grid = Grid::new(32, 32);
        let params = VelocityParams::new(100.0, 0.03, 0.0, 100.0);
        for (x, y) in [(0, 0), (16, 16), (31, 5)] {
            let [vx, vy] = velocity_at(grid, x, y, &params);
            assert!(vx.abs() <= 0.03 && vy.abs() <= 0.03);
        }
    }
}
