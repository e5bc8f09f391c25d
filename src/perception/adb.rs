use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::errors::{PilotError, PilotResult};
use crate::executor::adb::AdbBridge;
use crate::perception::encode::encode_bounded_jpeg;
use crate::perception::traits::CaptureGateway;
use crate::perception::types::{JpegSettings, Observation, Point};

const DUMP_PATH: &str = "/sdcard/window_dump.xml";
const MAX_UI_LINES: usize = 80;

/// Screenshots and UI hierarchy from an ADB-attached Android device.
pub struct AdbCapture {
    bridge: Arc<AdbBridge>,
    jpeg: JpegSettings,
    summarizer: HierarchySummarizer,
}

impl AdbCapture {
    pub fn new(bridge: Arc<AdbBridge>, jpeg: JpegSettings) -> PilotResult<Self> {
        Ok(Self {
            bridge,
            jpeg,
            summarizer: HierarchySummarizer::new()?,
        })
    }

    async fn dump_ui(&self) -> PilotResult<String> {
        self.bridge.shell(&["uiautomator", "dump", DUMP_PATH]).await?;
        let xml = self.bridge.exec_out(&["cat", DUMP_PATH]).await?;
        Ok(self.summarizer.summarize(&String::from_utf8_lossy(&xml)))
    }
}

#[async_trait]
impl CaptureGateway for AdbCapture {
    async fn capture(&self) -> PilotResult<Observation> {
        let png = self
            .bridge
            .exec_out(&["screencap", "-p"])
            .await
            .map_err(|e| PilotError::Capture(e.to_string()))?;
        let jpeg = self.jpeg;
        let (image, (width, height)) = tokio::task::spawn_blocking(move || {
            let img = image::load_from_memory(&png)?;
            let dims = (img.width(), img.height());
            encode_bounded_jpeg(&img, jpeg).map(|encoded| (encoded, dims))
        })
        .await
        .map_err(|e| PilotError::Capture(format!("encode task panicked: {e}")))?
        .map_err(|e| match e {
            PilotError::Capture(_) => e,
            other => PilotError::Capture(other.to_string()),
        })?;

        let anchor = self
            .bridge
            .last_touch()
            .unwrap_or_else(|| Point::new(width as i32 / 2, height as i32 / 2));

        // A missing hierarchy only degrades the observation.
        let ui_description = match self.dump_ui().await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(error = %e, "UI hierarchy dump failed");
                None
            }
        };

        tracing::debug!(width, height, anchor = %anchor, bytes = image.len(), "adb screen captured");
        Ok(Observation {
            image,
            anchor,
            ui_description,
        })
    }
}

/// Reduces a `uiautomator dump` document to one line per labelled or
/// clickable node: label, widget class, bounds and centre.
pub struct HierarchySummarizer {
    node: Regex,
    attr: Regex,
    bounds: Regex,
}

impl HierarchySummarizer {
    pub fn new() -> PilotResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| PilotError::Config(format!("bad UI pattern: {e}")))
        };
        Ok(Self {
            node: compile(r"<node\b[^>]*>")?,
            attr: compile(r#"([\w:-]+)="([^"]*)""#)?,
            bounds: compile(r"^\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]$")?,
        })
    }

    pub fn summarize(&self, xml: &str) -> String {
        let mut lines = Vec::new();
        for node in self.node.find_iter(xml) {
            let mut text = "";
            let mut desc = "";
            let mut class = "";
            let mut clickable = false;
            let mut bounds = "";
            for cap in self.attr.captures_iter(node.as_str()) {
                let value = cap.get(2).map_or("", |m| m.as_str());
                match cap.get(1).map_or("", |m| m.as_str()) {
                    "text" => text = value,
                    "content-desc" => desc = value,
                    "class" => class = value,
                    "clickable" => clickable = value == "true",
                    "bounds" => bounds = value,
                    _ => {}
                }
            }

            let label = if !text.is_empty() { text } else { desc };
            if label.is_empty() && !clickable {
                continue;
            }
            let Some(b) = self.bounds.captures(bounds) else {
                continue;
            };
            let n = |i: usize| b.get(i).and_then(|m| m.as_str().parse::<i32>().ok()).unwrap_or(0);
            let (x1, y1, x2, y2) = (n(1), n(2), n(3), n(4));
            let widget = class.rsplit('.').next().unwrap_or(class);
            let label = html_escape::decode_html_entities(label);

            lines.push(format!(
                "- \"{label}\" {widget}{} bounds [{x1},{y1}][{x2},{y2}] centre ({}, {})",
                if clickable { " clickable" } else { "" },
                (x1 + x2) / 2,
                (y1 + y2) / 2,
            ));
            if lines.len() == MAX_UI_LINES {
                lines.push("- … (truncated)".into());
                break;
            }
        }

        if lines.is_empty() {
            "No labelled UI elements found.".to_string()
        } else {
            format!("UI elements:\n{}", lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" text="" resource-id="" class="android.widget.FrameLayout" content-desc="" clickable="false" bounds="[0,0][1080,2400]">
    <node index="1" text="Settings" resource-id="app:id/title" class="android.widget.TextView" content-desc="" clickable="true" bounds="[40,300][200,380]" />
    <node index="2" text="" resource-id="" class="android.widget.ImageButton" content-desc="Search &amp; find" clickable="true" bounds="[900,100][1000,200]" />
    <node index="3" text="" resource-id="" class="android.view.View" content-desc="" clickable="false" bounds="[0,0][10,10]" />
  </node>
</hierarchy>"#;

    #[test]
    fn keeps_labelled_and_clickable_nodes() {
        let summary = HierarchySummarizer::new().unwrap().summarize(DUMP);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "UI elements:");
        assert_eq!(
            lines[1],
            "- \"Settings\" TextView clickable bounds [40,300][200,380] centre (120, 340)"
        );
        assert_eq!(
            lines[2],
            "- \"Search & find\" ImageButton clickable bounds [900,100][1000,200] centre (950, 150)"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_dump() {
        assert_eq!(
            HierarchySummarizer::new().unwrap().summarize("<hierarchy/>"),
            "No labelled UI elements found."
        );
    }
}
