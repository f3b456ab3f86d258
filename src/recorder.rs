use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sample::{round2, Sample, SensorKind};
use crate::sensor::SensorFeed;

/// Recording state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    /// Samples are discarded
    Idle,
    /// Samples are appended to the log
    Recording,
}

/// Audit record for a state transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub action: &'static str,
    pub from: RecordingState,
    pub to: RecordingState,
    pub len_before: usize,
    pub len_after: usize,
}

impl fmt::Display for TransitionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:?} -> {:?}, log {} -> {}",
            self.action, self.from, self.to, self.len_before, self.len_after
        )
    }
}

/// Audit record for one accepted sample
#[derive(Debug, Clone, PartialEq)]
pub struct AppendRecord {
    pub len_before: usize,
    pub len_after: usize,
    pub kind: SensorKind,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl fmt::Display for AppendRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "append: log {} -> {}, {} ({:.2}, {:.2}, {:.2})",
            self.len_before, self.len_after, self.kind, self.x, self.y, self.z
        )
    }
}

/// Recording half of the controller: state, sample log and sensor feed
#[derive(Debug)]
pub struct Recorder {
    state: RecordingState,
    log: Vec<Sample>,
    feed: SensorFeed,
}

impl Recorder {
    /// Create recorder in Idle state with an empty log
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            log: Vec::with_capacity(500),
            feed: SensorFeed::new(),
        }
    }

    /// Rehydrate from a persisted snapshot
    pub fn restore(log: Vec<Sample>, is_recording: bool) -> Self {
        let state = if is_recording {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        };
        Self {
            state,
            log,
            feed: SensorFeed::new(),
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    pub fn log(&self) -> &[Sample] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn feed(&self) -> &SensorFeed {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut SensorFeed {
        &mut self.feed
    }

    /// Begin a fresh session. Restarts the session when already recording.
    pub fn start_recording(&mut self) -> TransitionRecord {
        let from = self.state;
        let len_before = self.log.len();
        self.log.clear();
        self.state = RecordingState::Recording;
        self.transition("start", from, len_before)
    }

    /// Freeze the log as the finished recording
    pub fn stop_recording(&mut self) -> TransitionRecord {
        let from = self.state;
        let len_before = self.log.len();
        self.state = RecordingState::Idle;
        self.transition("stop", from, len_before)
    }

    /// Empty the log and force Idle
    pub fn clear(&mut self) -> TransitionRecord {
        let from = self.state;
        let len_before = self.log.len();
        self.log.clear();
        self.state = RecordingState::Idle;
        self.transition("clear", from, len_before)
    }

    /// Append while recording; samples outside a recording window are ignored
    pub fn add_data_point(&mut self, sample: Sample) -> Option<AppendRecord> {
        if !self.is_recording() {
            return None;
        }

        // Keep capture time non-decreasing when two sensors interleave
        let sample = match self.log.last() {
            Some(last) if sample.captured_at_millis() < last.captured_at_millis() => {
                let floor = last.captured_at_millis();
                sample.with_captured_at_millis(floor)
            }
            _ => sample,
        };

        let len_before = self.log.len();
        let axes = sample.axes();
        let kind = sample.kind();
        self.log.push(sample);

        Some(AppendRecord {
            len_before,
            len_after: self.log.len(),
            kind,
            x: round2(axes.x),
            y: round2(axes.y),
            z: round2(axes.z),
        })
    }

    fn transition(
        &self,
        action: &'static str,
        from: RecordingState,
        len_before: usize,
    ) -> TransitionRecord {
        TransitionRecord {
            action,
            from,
            to: self.state,
            len_before,
            len_after: self.log.len(),
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accel(x: f64, millis: i64) -> Sample {
        Sample::linear_acceleration(x, 0.0, 9.81, millis)
    }

    #[test]
    fn test_recording_state_transitions() {
        let mut recorder = Recorder::new();

        // Initial state is Idle
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert!(!recorder.is_recording());

        // Idle → Recording
        let record = recorder.start_recording();
        assert_eq!(record.from, RecordingState::Idle);
        assert_eq!(record.to, RecordingState::Recording);

        // Recording → Idle
        recorder.stop_recording();
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn test_idle_samples_discarded() {
        let mut recorder = Recorder::new();
        for i in 0..10 {
            assert!(recorder.add_data_point(accel(i as f64, i)).is_none());
        }
        assert!(recorder.is_empty());

        recorder.start_recording();
        recorder.add_data_point(accel(1.0, 1));
        recorder.stop_recording();
        for i in 0..10 {
            assert!(recorder.add_data_point(accel(i as f64, 100 + i)).is_none());
        }
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_start_always_clears_log() {
        let mut recorder = Recorder::new();
        recorder.start_recording();
        recorder.add_data_point(accel(0.1, 1));
        recorder.add_data_point(accel(0.2, 2));

        // Restart while recording
        let record = recorder.start_recording();
        assert_eq!(record.len_before, 2);
        assert_eq!(record.len_after, 0);
        assert!(recorder.is_empty());
        assert!(recorder.is_recording());

        // Restart from Idle after a finished recording
        recorder.add_data_point(accel(0.3, 3));
        recorder.stop_recording();
        recorder.start_recording();
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_three_sample_recording() {
        let mut recorder = Recorder::new();
        recorder.start_recording();
        for (i, x) in [0.1, 0.2, 0.3].iter().enumerate() {
            recorder.add_data_point(accel(*x, i as i64 * 10));
        }
        recorder.stop_recording();

        assert_eq!(recorder.len(), 3);
        assert!(!recorder.is_recording());
        let xs: Vec<f64> = recorder.log().iter().map(|s| s.axes().x).collect();
        assert_eq!(xs, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_clear_from_recording() {
        let mut recorder = Recorder::new();
        recorder.start_recording();
        recorder.add_data_point(accel(0.1, 1));

        let record = recorder.clear();
        assert_eq!(record.from, RecordingState::Recording);
        assert_eq!(record.to, RecordingState::Idle);
        assert!(recorder.is_empty());
        assert!(recorder.add_data_point(accel(0.2, 2)).is_none());
    }

    #[test]
    fn test_append_record_rounds_axes() {
        let mut recorder = Recorder::new();
        recorder.start_recording();
        let record = recorder
            .add_data_point(Sample::angular_rate(0.123, -0.456, 1.0, 5))
            .unwrap();

        assert_eq!(record.len_before, 0);
        assert_eq!(record.len_after, 1);
        assert_eq!(record.kind, SensorKind::AngularRate);
        assert_eq!(record.x, 0.12);
        assert_eq!(record.y, -0.46);
        assert_eq!(record.to_string(), "append: log 0 -> 1, angular rate (0.12, -0.46, 1.00)");
    }

    #[test]
    fn test_capture_time_non_decreasing() {
        let mut recorder = Recorder::new();
        recorder.start_recording();
        recorder.add_data_point(accel(0.1, 100));
        recorder.add_data_point(Sample::angular_rate(0.0, 0.0, 0.0, 99));

        let times: Vec<i64> = recorder.log().iter().map(Sample::captured_at_millis).collect();
        assert_eq!(times, vec![100, 100]);
    }

    #[test]
    fn test_restore_recording_flag() {
        let recorder = Recorder::restore(vec![accel(0.1, 1)], true);
        assert!(recorder.is_recording());
        assert_eq!(recorder.len(), 1);
    }
}
