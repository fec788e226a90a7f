/// Draw a marker dot on a screenshot at a resolved click position.
///
/// The annotated image is saved next to the screenshots so a run can be
/// audited frame by frame: every pointer action leaves behind an image
/// showing exactly where the grounding model pointed.
use crate::errors::SandpilotResult;
use crate::perception::grounding::Position;

const DOT_RADIUS: i32 = 12;
const RING_WIDTH: i32 = 3;
const DOT_COLOUR: [u8; 4] = [255, 68, 68, 230]; // red
const RING_COLOUR: [u8; 4] = [255, 255, 255, 230]; // white

/// Annotate `src_bytes` (PNG/JPEG) with a filled dot at `position`.
/// Returns PNG-encoded bytes of the annotated image.
pub fn draw_marker(src_bytes: &[u8], position: Position) -> SandpilotResult<Vec<u8>> {
    let img = image::load_from_memory(src_bytes)?;
    let mut canvas = img.to_rgba8();
    let (w, h) = canvas.dimensions();

    let cx = position.x as i32;
    let cy = position.y as i32;
    let outer = DOT_RADIUS + RING_WIDTH;

    for dy in -outer..=outer {
        for dx in -outer..=outer {
            let x = cx + dx;
            let y = cy + dy;
            if x < 0 || y < 0 || x >= w as i32 || y >= h as i32 {
                continue;
            }
            let dist_sq = dx * dx + dy * dy;
            if dist_sq <= DOT_RADIUS * DOT_RADIUS {
                set_pixel(&mut canvas, x as u32, y as u32, DOT_COLOUR);
            } else if dist_sq <= outer * outer {
                set_pixel(&mut canvas, x as u32, y as u32, RING_COLOUR);
            }
        }
    }

    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)?;

    Ok(out)
}

fn set_pixel(canvas: &mut image::RgbaImage, x: u32, y: u32, col: [u8; 4]) {
    let p = canvas.get_pixel_mut(x, y);
    let a = col[3] as f32 / 255.0;
    p[0] = (p[0] as f32 * (1.0 - a) + col[0] as f32 * a).round() as u8;
    p[1] = (p[1] as f32 * (1.0 - a) + col[1] as f32 * a).round() as u8;
    p[2] = (p[2] as f32 * (1.0 - a) + col[2] as f32 * a).round() as u8;
    p[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn marker_is_drawn_at_position() {
        let src = white_png(64, 64);
        let out = draw_marker(&src, Position { x: 32, y: 32 }).unwrap();

        let img = image::load_from_memory(&out).unwrap().to_rgba8();
        let centre = img.get_pixel(32, 32);
        // Red dot dominates the centre pixel.
        assert!(centre[0] > 200 && centre[1] < 120);
        // A corner stays untouched.
        assert_eq!(img.get_pixel(0, 0), &image::Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn marker_near_edge_does_not_panic() {
        let src = white_png(16, 16);
        draw_marker(&src, Position { x: 0, y: 0 }).unwrap();
        draw_marker(&src, Position { x: 15, y: 15 }).unwrap();
        // Positions outside the frame are clipped rather than rejected.
        draw_marker(&src, Position { x: 100, y: 100 }).unwrap();
    }
}
