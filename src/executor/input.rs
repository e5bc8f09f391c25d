// Physical input simulation for the local desktop via enigo.
// Each primitive opens its own connection on a blocking thread; the
// connection is not Send on every platform.

use std::time::Duration;

use async_trait::async_trait;
use enigo::{Button, Coordinate, Direction as Press, Enigo, Key, Keyboard, Mouse, Settings};

use crate::errors::{PilotError, PilotResult};
use crate::executor::actions::SystemKey;
use crate::executor::device::Device;
use crate::perception::types::Point;

pub struct DesktopDevice;

async fn with_enigo<F>(op: F) -> PilotResult<()>
where
    F: FnOnce(&mut Enigo) -> Result<(), String> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| PilotError::Executor(format!("input connection failed: {e}")))?;
        op(&mut enigo).map_err(PilotError::Executor)
    })
    .await
    .map_err(|e| PilotError::Executor(format!("input task panicked: {e}")))?
}

fn click_at(enigo: &mut Enigo, at: Point) -> Result<(), String> {
    enigo
        .move_mouse(at.x, at.y, Coordinate::Abs)
        .map_err(|e| e.to_string())?;
    enigo
        .button(Button::Left, Press::Click)
        .map_err(|e| e.to_string())
}

#[async_trait]
impl Device for DesktopDevice {
    fn name(&self) -> &str {
        "desktop"
    }

    async fn move_relative(&self, dx: i32, dy: i32) -> PilotResult<()> {
        tracing::debug!(dx, dy, "mouse move (relative)");
        with_enigo(move |e| e.move_mouse(dx, dy, Coordinate::Rel).map_err(|e| e.to_string())).await
    }

    async fn click(&self) -> PilotResult<()> {
        tracing::debug!("mouse click");
        with_enigo(|e| e.button(Button::Left, Press::Click).map_err(|e| e.to_string())).await
    }

    async fn tap(&self, at: Point) -> PilotResult<()> {
        with_enigo(move |e| click_at(e, at)).await
    }

    async fn long_press(&self, at: Point, duration_ms: u64) -> PilotResult<()> {
        with_enigo(move |e| {
            e.move_mouse(at.x, at.y, Coordinate::Abs).map_err(|e| e.to_string())?;
            e.button(Button::Left, Press::Press).map_err(|e| e.to_string())?;
            std::thread::sleep(Duration::from_millis(duration_ms));
            e.button(Button::Left, Press::Release).map_err(|e| e.to_string())
        })
        .await
    }

    async fn swipe(&self, from: Point, to: Point, duration_ms: u64) -> PilotResult<()> {
        with_enigo(move |e| {
            e.move_mouse(from.x, from.y, Coordinate::Abs).map_err(|e| e.to_string())?;
            e.button(Button::Left, Press::Press).map_err(|e| e.to_string())?;
            std::thread::sleep(Duration::from_millis(duration_ms));
            e.move_mouse(to.x, to.y, Coordinate::Abs).map_err(|e| e.to_string())?;
            e.button(Button::Left, Press::Release).map_err(|e| e.to_string())
        })
        .await
    }

    async fn input_text(&self, at: Point, text: &str) -> PilotResult<()> {
        let text = text.to_string();
        with_enigo(move |e| {
            click_at(e, at)?;
            e.text(&text).map_err(|e| e.to_string())
        })
        .await
    }

    async fn press_key(&self, key: SystemKey) -> PilotResult<()> {
        let mapped = match key {
            SystemKey::Enter => Key::Return,
            SystemKey::Delete => Key::Backspace,
            other => {
                return Err(PilotError::Executor(format!(
                    "desktop has no {} key",
                    other.as_str()
                )))
            }
        };
        with_enigo(move |e| e.key(mapped, Press::Click).map_err(|e| e.to_string())).await
    }
}
