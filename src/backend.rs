use std::sync::Arc;

use crate::config::{BackendKind, DeviceConfig};
use crate::errors::PilotResult;
use crate::executor::adb::{AdbBridge, AdbDevice};
use crate::executor::device::Device;
use crate::perception::adb::AdbCapture;
use crate::perception::traits::CaptureGateway;
use crate::perception::types::JpegSettings;

/// Capture source and device driver for one configured backend.
pub struct Backend {
    pub capture: Arc<dyn CaptureGateway>,
    pub device: Arc<dyn Device>,
    /// Human-readable device name used in the system prompt.
    pub device_name: String,
}

pub fn connect(config: &DeviceConfig) -> PilotResult<Backend> {
    let jpeg = JpegSettings::from_config(config);
    let device_name = config
        .device_name
        .clone()
        .unwrap_or_else(|| default_device_name(config.backend).to_string());

    let (capture, device): (Arc<dyn CaptureGateway>, Arc<dyn Device>) = match config.backend {
        BackendKind::Adb => {
            let bridge = Arc::new(AdbBridge::new(
                config.adb_path.clone(),
                config.adb_serial.clone(),
            ));
            (
                Arc::new(AdbCapture::new(bridge.clone(), jpeg)?),
                Arc::new(AdbDevice::new(bridge)),
            )
        }
        BackendKind::Desktop | BackendKind::Window => desktop::connect(config, jpeg)?,
    };

    tracing::info!(backend = ?config.backend, device = %device_name, "backend connected");
    Ok(Backend {
        capture,
        device,
        device_name,
    })
}

pub fn default_device_name(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Desktop => "desktop computer",
        BackendKind::Window => "iPhone",
        BackendKind::Adb => "Android device",
    }
}

#[cfg(feature = "desktop")]
mod desktop {
    use super::*;
    use crate::executor::input::DesktopDevice;
    use crate::perception::screenshot::DesktopCapture;
    use crate::perception::window::WindowCapture;

    pub(super) fn connect(
        config: &DeviceConfig,
        jpeg: JpegSettings,
    ) -> PilotResult<(Arc<dyn CaptureGateway>, Arc<dyn Device>)> {
        let capture: Arc<dyn CaptureGateway> = match config.backend {
            BackendKind::Window => Arc::new(WindowCapture::new(config.window_title.clone(), jpeg)),
            _ => Arc::new(DesktopCapture::new(jpeg)),
        };
        Ok((capture, Arc::new(DesktopDevice)))
    }
}

#[cfg(not(feature = "desktop"))]
mod desktop {
    use super::*;
    use crate::errors::PilotError;

    pub(super) fn connect(
        config: &DeviceConfig,
        _jpeg: JpegSettings,
    ) -> PilotResult<(Arc<dyn CaptureGateway>, Arc<dyn Device>)> {
        Err(PilotError::Config(format!(
            "the {:?} backend needs a build with the `desktop` feature",
            config.backend
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PilotError;

    #[test]
    fn adb_backend_connects_without_a_device() {
        let config = DeviceConfig {
            backend: BackendKind::Adb,
            ..DeviceConfig::default()
        };
        let backend = connect(&config).unwrap();
        assert_eq!(backend.device_name, "Android device");
        assert_eq!(backend.device.name(), "adb");
    }

    #[cfg(not(feature = "desktop"))]
    #[test]
    fn desktop_backend_requires_feature() {
        let config = DeviceConfig {
            backend: BackendKind::Desktop,
            ..DeviceConfig::default()
        };
        assert!(matches!(connect(&config), Err(PilotError::Config(_))));
    }

    #[cfg(not(feature = "desktop"))]
    #[test]
    fn default_backend_connects_in_a_default_build() {
        assert!(connect(&DeviceConfig::default()).is_ok());
    }
}
