//! Cursor marker drawn onto desktop screenshots so the reasoning service can
//! see where the pointer is before choosing a relative move.
use image::RgbaImage;

use crate::perception::types::Point;

const MARKER_RADIUS: i32 = 10;
const MARKER_ARM: i32 = 20;
const MARKER_WIDTH: i32 = 2;
const MARKER_COLOUR: [u8; 4] = [255, 0, 0, 255];

/// Draw a red circle with a crosshair centred on `at`. Parts outside the canvas are clipped.
pub fn draw_cursor_marker(canvas: &mut RgbaImage, at: Point) {
    draw_ring(canvas, at, MARKER_RADIUS, MARKER_WIDTH, MARKER_COLOUR);
    draw_hline(canvas, at.x - MARKER_ARM, at.x + MARKER_ARM, at.y, MARKER_WIDTH, MARKER_COLOUR);
    draw_vline(canvas, at.x, at.y - MARKER_ARM, at.y + MARKER_ARM, MARKER_WIDTH, MARKER_COLOUR);
}

// ── Drawing primitives ──────────────────────────────────────────────────────

fn draw_ring(canvas: &mut RgbaImage, c: Point, radius: i32, width: i32, col: [u8; 4]) {
    let outer = radius * radius;
    let inner = (radius - width).max(0).pow(2);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d = dx * dx + dy * dy;
            if d <= outer && d > inner {
                put(canvas, c.x + dx, c.y + dy, col);
            }
        }
    }
}

fn draw_hline(canvas: &mut RgbaImage, x1: i32, x2: i32, y: i32, width: i32, col: [u8; 4]) {
    for t in 0..width {
        for x in x1..=x2 {
            put(canvas, x, y - width / 2 + t, col);
        }
    }
}

fn draw_vline(canvas: &mut RgbaImage, x: i32, y1: i32, y2: i32, width: i32, col: [u8; 4]) {
    for t in 0..width {
        for y in y1..=y2 {
            put(canvas, x - width / 2 + t, y, col);
        }
    }
}

fn put(canvas: &mut RgbaImage, x: i32, y: i32, col: [u8; 4]) {
    let (w, h) = canvas.dimensions();
    if x < 0 || y < 0 || x >= w as i32 || y >= h as i32 {
        return;
    }
    let p = canvas.get_pixel_mut(x as u32, y as u32);
    let a = col[3] as f32 / 255.0;
    p[0] = (p[0] as f32 * (1.0 - a) + col[0] as f32 * a).round() as u8;
    p[1] = (p[1] as f32 * (1.0 - a) + col[1] as f32 * a).round() as u8;
    p[2] = (p[2] as f32 * (1.0 - a) + col[2] as f32 * a).round() as u8;
    p[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn red(canvas: &RgbaImage, x: u32, y: u32) -> bool {
        canvas.get_pixel(x, y) == &Rgba([255, 0, 0, 255])
    }

    #[test]
    fn marker_draws_ring_and_arms() {
        let mut canvas = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        draw_cursor_marker(&mut canvas, Point::new(50, 50));
        // arm tips
        assert!(red(&canvas, 70, 50));
        assert!(red(&canvas, 50, 30));
        // ring, off the arms
        assert!(red(&canvas, 57, 57));
        // inside the ring, off the arms
        assert!(!red(&canvas, 53, 53));
        // beyond the arms
        assert!(!red(&canvas, 75, 50));
    }

    #[test]
    fn marker_near_edge_is_clipped() {
        let mut canvas = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        draw_cursor_marker(&mut canvas, Point::new(0, 0));
        assert!(red(&canvas, 0, 0));
        draw_cursor_marker(&mut canvas, Point::new(-500, 900));
    }
}
