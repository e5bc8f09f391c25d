use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::{PilotError, PilotResult};
use crate::executor::actions::SystemKey;
use crate::executor::device::Device;
use crate::executor::text_input::escape_for_adb;
use crate::perception::types::Point;

/// Connection to one ADB-attached device, shared by the ADB capture backend
/// and the ADB device driver.
pub struct AdbBridge {
    adb_path: String,
    serial: Option<String>,
    last_touch: Mutex<Option<Point>>,
}

impl AdbBridge {
    pub fn new(adb_path: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial,
            last_touch: Mutex::new(None),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.args(["-s", serial]);
        }
        cmd.args(args);
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(&self, args: &[&str]) -> PilotResult<Vec<u8>> {
        tracing::debug!(adb = %self.adb_path, serial = ?self.serial, ?args, "running adb");
        let output = self.command(args).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PilotError::Executor(format!(
                "adb {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    /// `adb exec-out …`, returning raw stdout bytes.
    pub async fn exec_out(&self, args: &[&str]) -> PilotResult<Vec<u8>> {
        let mut full = vec!["exec-out"];
        full.extend_from_slice(args);
        self.run(&full).await
    }

    /// `adb shell …`, returning stdout as text.
    pub async fn shell(&self, args: &[&str]) -> PilotResult<String> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        let out = self.run(&full).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn record_touch(&self, at: Point) {
        let mut guard = self.last_touch.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(at);
    }

    pub fn last_touch(&self) -> Option<Point> {
        *self.last_touch.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Touch device driven through `adb shell input`.
pub struct AdbDevice {
    bridge: std::sync::Arc<AdbBridge>,
}

impl AdbDevice {
    pub fn new(bridge: std::sync::Arc<AdbBridge>) -> Self {
        Self { bridge }
    }

    async fn input(&self, args: &[String]) -> PilotResult<()> {
        let mut full = vec!["input"];
        full.extend(args.iter().map(String::as_str));
        self.bridge.shell(&full).await.map(|_| ())
    }
}

#[async_trait]
impl Device for AdbDevice {
    fn name(&self) -> &str {
        "adb"
    }

    async fn tap(&self, at: Point) -> PilotResult<()> {
        self.input(&tap_args(at)).await?;
        self.bridge.record_touch(at);
        Ok(())
    }

    async fn long_press(&self, at: Point, duration_ms: u64) -> PilotResult<()> {
        // A swipe that does not move is a press-and-hold.
        self.input(&swipe_args(at, at, duration_ms)).await?;
        self.bridge.record_touch(at);
        Ok(())
    }

    async fn swipe(&self, from: Point, to: Point, duration_ms: u64) -> PilotResult<()> {
        self.input(&swipe_args(from, to, duration_ms)).await?;
        self.bridge.record_touch(to);
        Ok(())
    }

    async fn input_text(&self, at: Point, text: &str) -> PilotResult<()> {
        let escaped = escape_for_adb(text)?;
        self.tap(at).await?;
        self.input(&["text".to_string(), escaped]).await
    }

    async fn press_key(&self, key: SystemKey) -> PilotResult<()> {
        self.input(&["keyevent".to_string(), key.android_keycode().to_string()])
            .await
    }
}

fn tap_args(at: Point) -> Vec<String> {
    vec!["tap".into(), at.x.to_string(), at.y.to_string()]
}

fn swipe_args(from: Point, to: Point, duration_ms: u64) -> Vec<String> {
    vec![
        "swipe".into(),
        from.x.to_string(),
        from.y.to_string(),
        to.x.to_string(),
        to.y.to_string(),
        duration_ms.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gesture_arguments() {
        assert_eq!(tap_args(Point::new(120, 340)), vec!["tap", "120", "340"]);
        assert_eq!(
            swipe_args(Point::new(1, 2), Point::new(3, 4), 300),
            vec!["swipe", "1", "2", "3", "4", "300"]
        );
    }

    #[test]
    fn bridge_remembers_last_touch() {
        let bridge = AdbBridge::new("adb", None);
        assert_eq!(bridge.last_touch(), None);
        bridge.record_touch(Point::new(5, 6));
        assert_eq!(bridge.last_touch(), Some(Point::new(5, 6)));
    }

    #[tokio::test]
    async fn missing_adb_binary_is_an_error() {
        let bridge = AdbBridge::new("/nonexistent/touchpilot-adb", Some("emulator-5554".into()));
        assert!(bridge.shell(&["true"]).await.is_err());
    }
}
