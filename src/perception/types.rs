use serde::{Deserialize, Serialize};

use crate::llm::types::EncodedImage;

/// A pixel position in the coordinate space of the captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One captured device state. Lives until the next successful capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub image: EncodedImage,
    /// Cursor position for pointer devices, last touch point for touch devices.
    pub anchor: Point,
    /// Structured UI summary, when the backend can produce one.
    pub ui_description: Option<String>,
}

/// Encoding limits shared by every capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegSettings {
    pub quality: u8,
    pub max_bytes: usize,
}

impl JpegSettings {
    pub fn from_config(device: &crate::config::DeviceConfig) -> Self {
        Self {
            quality: device.jpeg_quality,
            max_bytes: device.max_image_bytes,
        }
    }
}

impl Default for JpegSettings {
    fn default() -> Self {
        Self {
            quality: 85,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}
