use async_trait::async_trait;
use image::DynamicImage;

use crate::errors::{PilotError, PilotResult};
use crate::perception::encode::encode_bounded_jpeg;
use crate::perception::overlay::draw_cursor_marker;
use crate::perception::traits::CaptureGateway;
use crate::perception::types::{JpegSettings, Observation, Point};

/// Captures the primary monitor and marks the pointer position on it.
pub struct DesktopCapture {
    jpeg: JpegSettings,
}

impl DesktopCapture {
    pub fn new(jpeg: JpegSettings) -> Self {
        Self { jpeg }
    }
}

#[async_trait]
impl CaptureGateway for DesktopCapture {
    async fn capture(&self) -> PilotResult<Observation> {
        let jpeg = self.jpeg;
        tokio::task::spawn_blocking(move || capture_primary(jpeg))
            .await
            .map_err(|e| PilotError::Capture(format!("capture task panicked: {e}")))?
    }
}

fn capture_primary(jpeg: JpegSettings) -> PilotResult<Observation> {
    let monitors = xcap::Monitor::all().map_err(|e| PilotError::Capture(e.to_string()))?;
    let monitor = monitors
        .into_iter()
        .find(|m| m.is_primary())
        .ok_or_else(|| PilotError::Capture("no primary monitor found".into()))?;

    let mut canvas = monitor
        .capture_image()
        .map_err(|e| PilotError::Capture(e.to_string()))?;

    let (cx, cy) = pointer_location()?;
    let anchor = Point::new(cx - monitor.x(), cy - monitor.y());
    draw_cursor_marker(&mut canvas, anchor);

    tracing::debug!(
        width = canvas.width(),
        height = canvas.height(),
        cursor = %anchor,
        "primary monitor captured"
    );

    let image = encode_bounded_jpeg(&DynamicImage::ImageRgba8(canvas), jpeg)?;
    Ok(Observation {
        image,
        anchor,
        ui_description: None,
    })
}

/// Current pointer position in global screen coordinates.
pub(crate) fn pointer_location() -> PilotResult<(i32, i32)> {
    use enigo::{Enigo, Mouse, Settings};
    let enigo = Enigo::new(&Settings::default())
        .map_err(|e| PilotError::Capture(format!("input connection failed: {e}")))?;
    enigo
        .location()
        .map_err(|e| PilotError::Capture(format!("cursor position unavailable: {e}")))
}
