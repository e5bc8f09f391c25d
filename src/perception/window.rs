use async_trait::async_trait;
use image::DynamicImage;

use crate::errors::{PilotError, PilotResult};
use crate::perception::encode::encode_bounded_jpeg;
use crate::perception::overlay::draw_cursor_marker;
use crate::perception::screenshot::pointer_location;
use crate::perception::traits::CaptureGateway;
use crate::perception::types::{JpegSettings, Observation, Point};

const MAX_EDGE: u32 = 1600;

/// Captures the first window whose title contains a fixed string,
/// e.g. the macOS "iPhone Mirroring" app.
pub struct WindowCapture {
    title: String,
    jpeg: JpegSettings,
}

impl WindowCapture {
    pub fn new(title: impl Into<String>, jpeg: JpegSettings) -> Self {
        Self {
            title: title.into(),
            jpeg,
        }
    }
}

#[async_trait]
impl CaptureGateway for WindowCapture {
    async fn capture(&self) -> PilotResult<Observation> {
        let title = self.title.clone();
        let jpeg = self.jpeg;
        tokio::task::spawn_blocking(move || capture_window(&title, jpeg))
            .await
            .map_err(|e| PilotError::Capture(format!("capture task panicked: {e}")))?
    }
}

fn capture_window(title: &str, jpeg: JpegSettings) -> PilotResult<Observation> {
    let windows = xcap::Window::all().map_err(|e| PilotError::Capture(e.to_string()))?;
    let window = windows
        .into_iter()
        .find(|w| w.title().contains(title))
        .ok_or_else(|| PilotError::Capture(format!("no window titled '{title}'")))?;

    let mut canvas = window
        .capture_image()
        .map_err(|e| PilotError::Capture(e.to_string()))?;
    let (full_w, full_h) = canvas.dimensions();

    let (cx, cy) = pointer_location()?;
    let local = Point::new(cx - window.x(), cy - window.y());
    draw_cursor_marker(&mut canvas, local);

    let img = DynamicImage::ImageRgba8(canvas).thumbnail(MAX_EDGE, MAX_EDGE);
    let anchor = scale_point(local, (full_w, full_h), (img.width(), img.height()));

    tracing::debug!(
        window = %window.title(),
        width = img.width(),
        height = img.height(),
        cursor = %anchor,
        "window captured"
    );

    let image = encode_bounded_jpeg(&img, jpeg)?;
    Ok(Observation {
        image,
        anchor,
        ui_description: None,
    })
}

/// Map a point from a `from`-sized image onto its resized `to` counterpart.
fn scale_point(p: Point, from: (u32, u32), to: (u32, u32)) -> Point {
    if from.0 == 0 || from.1 == 0 {
        return p;
    }
    Point::new(
        (p.x as f64 * to.0 as f64 / from.0 as f64).round() as i32,
        (p.y as f64 * to.1 as f64 / from.1 as f64).round() as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_anchor_with_thumbnail() {
        assert_eq!(
            scale_point(Point::new(1000, 500), (3200, 2000), (1600, 1000)),
            Point::new(500, 250)
        );
        assert_eq!(scale_point(Point::new(7, 9), (0, 0), (10, 10)), Point::new(7, 9));
    }
}
