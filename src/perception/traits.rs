use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::perception::types::Observation;

/// Source of device observations.
/// Implementations: primary monitor, mirrored window, and ADB-attached Android device.
#[async_trait]
pub trait CaptureGateway: Send + Sync {
    async fn capture(&self) -> PilotResult<Observation>;
}
