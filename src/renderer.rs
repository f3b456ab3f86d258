use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MotionReplayError, Result};
use crate::sample::{Sample, SensorKind};

/// Anything that can draw one motion sample
pub trait Renderer {
    /// Must tolerate the same sample being presented repeatedly
    fn present(&mut self, sample: &Sample);
}

/// Cube orientation in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CubePose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CubePose {
    /// Acceleration samples use their derived rotation; angular rates are
    /// integrated over one frame interval.
    pub fn from_sample(sample: &Sample, frame_interval: Duration) -> Self {
        match sample.derived_rotation() {
            Some(rotation) => Self {
                x: rotation.x,
                y: rotation.y,
                z: rotation.z,
            },
            None => {
                let axes = sample.axes() * frame_interval.as_secs_f64();
                Self {
                    x: axes.x,
                    y: axes.y,
                    z: axes.z,
                }
            }
        }
    }
}

/// Messages posted into the embedded web view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Frame {
        kind: SensorKind,
        captured_at_millis: i64,
        rotation: CubePose,
    },
}

/// Messages the web view posts back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Scene finished loading and wants the current frame
    Ready,
    Log { message: String },
    Error { message: String },
}

/// Renderer that drives a web-view cube through JSON messages
pub struct WebViewBridge {
    post: Box<dyn FnMut(String) + Send>,
    frame_interval: Duration,
    last_posted: Option<String>,
}

impl WebViewBridge {
    pub fn new(frame_interval: Duration, post: impl FnMut(String) + Send + 'static) -> Self {
        Self {
            post: Box::new(post),
            frame_interval,
            last_posted: None,
        }
    }

    pub fn frame_message(&self, sample: &Sample) -> OutboundMessage {
        OutboundMessage::Frame {
            kind: sample.kind(),
            captured_at_millis: sample.captured_at_millis(),
            rotation: CubePose::from_sample(sample, self.frame_interval),
        }
    }

    /// Parse a message from the web view. Bad payloads are logged and
    /// reported, never propagated as a panic.
    pub fn handle_inbound(&mut self, payload: &str) -> Result<InboundMessage> {
        let message: InboundMessage = match serde_json::from_str(payload) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("[webview] dropping malformed message: {e}");
                return Err(MotionReplayError::MalformedMessage(e.to_string()));
            }
        };

        match &message {
            InboundMessage::Ready => {
                if let Some(last) = self.last_posted.clone() {
                    (self.post)(last);
                }
            }
            InboundMessage::Log { message } => log::debug!("[webview] {message}"),
            InboundMessage::Error { message } => log::warn!("[webview] scene error: {message}"),
        }
        Ok(message)
    }
}

impl Renderer for WebViewBridge {
    fn present(&mut self, sample: &Sample) {
        let json = match serde_json::to_string(&self.frame_message(sample)) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("[webview] failed to encode frame: {e}");
                return;
            }
        };

        if self.last_posted.as_deref() == Some(json.as_str()) {
            return;
        }
        (self.post)(json.clone());
        self.last_posted = Some(json);
    }
}

/// Renderer that writes cube poses to the log
#[derive(Debug, Default)]
pub struct LogRenderer {
    frame_interval: Duration,
    presented: usize,
}

impl LogRenderer {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            presented: 0,
        }
    }

    pub fn presented(&self) -> usize {
        self.presented
    }
}

impl Renderer for LogRenderer {
    fn present(&mut self, sample: &Sample) {
        let pose = CubePose::from_sample(sample, self.frame_interval);
        self.presented += 1;
        log::info!(
            "[frame] t={} {} rot=({:.2}, {:.2}, {:.2})",
            sample.captured_at_millis(),
            sample.kind(),
            pose.x,
            pose.y,
            pose.z
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    fn bridge() -> (WebViewBridge, Arc<Mutex<Vec<String>>>) {
        let posted = Arc::new(Mutex::new(Vec::new()));
        let sink = posted.clone();
        let bridge = WebViewBridge::new(Duration::from_millis(100), move |json| {
            sink.lock().unwrap().push(json);
        });
        (bridge, posted)
    }

    #[test]
    fn test_angular_rate_pose_integrates_one_frame() {
        let gyro = Sample::angular_rate(1.0, -2.0, 0.5, 0);
        let pose = CubePose::from_sample(&gyro, Duration::from_millis(100));
        assert_relative_eq!(pose.x, 0.1);
        assert_relative_eq!(pose.y, -0.2);
        assert_relative_eq!(pose.z, 0.05);
    }

    #[test]
    fn test_present_posts_frame_json() {
        let (mut bridge, posted) = bridge();
        bridge.present(&Sample::linear_acceleration(0.0, 0.0, 9.81, 123));

        let posted = posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].contains("\"type\":\"frame\""));
        assert!(posted[0].contains("\"captured_at_millis\":123"));
    }

    #[test]
    fn test_repeated_present_is_idempotent() {
        let (mut bridge, posted) = bridge();
        let sample = Sample::angular_rate(0.1, 0.2, 0.3, 7);
        bridge.present(&sample);
        bridge.present(&sample);
        assert_eq!(posted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_inbound_is_reported() {
        let (mut bridge, _) = bridge();
        let result = bridge.handle_inbound("{\"type\": 42");
        assert!(matches!(result, Err(MotionReplayError::MalformedMessage(_))));

        let result = bridge.handle_inbound("{\"type\":\"unknown\"}");
        assert!(matches!(result, Err(MotionReplayError::MalformedMessage(_))));
    }

    #[test]
    fn test_ready_replays_last_frame() {
        let (mut bridge, posted) = bridge();
        assert_eq!(bridge.handle_inbound("{\"type\":\"ready\"}").unwrap(), InboundMessage::Ready);
        assert!(posted.lock().unwrap().is_empty());

        bridge.present(&Sample::angular_rate(0.1, 0.2, 0.3, 7));
        bridge.handle_inbound("{\"type\":\"ready\"}").unwrap();

        let posted = posted.lock().unwrap();
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0], posted[1]);
    }

    #[test]
    fn test_log_renderer_counts_frames() {
        let mut renderer = LogRenderer::new(Duration::from_millis(100));
        renderer.present(&Sample::angular_rate(0.0, 0.0, 0.0, 0));
        renderer.present(&Sample::angular_rate(0.0, 0.0, 0.0, 0));
        assert_eq!(renderer.presented(), 2);
    }
}
