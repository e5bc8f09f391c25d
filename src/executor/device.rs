use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::executor::actions::SystemKey;
use crate::perception::types::Point;

/// Primitive operations a device backend can perform.
///
/// Every method defaults to an "unsupported" executor error so a backend only
/// implements the primitives it actually has.
#[async_trait]
pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    async fn move_relative(&self, _dx: i32, _dy: i32) -> PilotResult<()> {
        Err(unsupported(self.name(), "relative cursor moves"))
    }

    async fn click(&self) -> PilotResult<()> {
        Err(unsupported(self.name(), "cursor clicks"))
    }

    async fn tap(&self, _at: Point) -> PilotResult<()> {
        Err(unsupported(self.name(), "taps"))
    }

    async fn long_press(&self, _at: Point, _duration_ms: u64) -> PilotResult<()> {
        Err(unsupported(self.name(), "long presses"))
    }

    async fn swipe(&self, _from: Point, _to: Point, _duration_ms: u64) -> PilotResult<()> {
        Err(unsupported(self.name(), "swipes"))
    }

    async fn input_text(&self, _at: Point, _text: &str) -> PilotResult<()> {
        Err(unsupported(self.name(), "text input"))
    }

    async fn press_key(&self, _key: SystemKey) -> PilotResult<()> {
        Err(unsupported(self.name(), "system keys"))
    }
}

fn unsupported(device: &str, what: &str) -> PilotError {
    PilotError::Executor(format!("{device} does not support {what}"))
}
