use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::sample::{Sample, SensorKind};
use crate::store::SessionSnapshot;

/// Complete session export (JSON-serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub exported_at: String,
    pub saved_at: String,
    pub stats: SessionStats,
    pub samples: Vec<Sample>,
}

impl SessionExport {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            exported_at: chrono::Utc::now().to_rfc3339(),
            saved_at: snapshot.saved_at.clone(),
            stats: SessionStats::from_log(&snapshot.log),
            samples: snapshot.log.clone(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One row per sample; rotation columns are empty for angular rate
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("kind,captured_at_millis,x,y,z,rot_x,rot_y,rot_z\n");
        for sample in &self.samples {
            let axes = sample.axes();
            let kind = match sample.kind() {
                SensorKind::LinearAcceleration => "linear_acceleration",
                SensorKind::AngularRate => "angular_rate",
            };
            let _ = write!(
                csv,
                "{},{},{},{},{}",
                kind,
                sample.captured_at_millis(),
                axes.x,
                axes.y,
                axes.z
            );
            match sample.derived_rotation() {
                Some(rotation) => {
                    let _ = writeln!(csv, ",{},{},{}", rotation.x, rotation.y, rotation.z);
                }
                None => csv.push_str(",,,\n"),
            }
        }
        csv
    }
}

/// Session statistics for display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub sample_count: usize,
    pub linear_acceleration_count: usize,
    pub angular_rate_count: usize,
    pub duration_millis: i64,
    pub peak_acceleration: f64,
    pub peak_angular_rate: f64,
}

impl SessionStats {
    pub fn from_log(log: &[Sample]) -> Self {
        let mut stats = SessionStats {
            sample_count: log.len(),
            ..Default::default()
        };

        for sample in log {
            let magnitude = sample.magnitude();
            match sample.kind() {
                SensorKind::LinearAcceleration => {
                    stats.linear_acceleration_count += 1;
                    stats.peak_acceleration = stats.peak_acceleration.max(magnitude);
                }
                SensorKind::AngularRate => {
                    stats.angular_rate_count += 1;
                    stats.peak_angular_rate = stats.peak_angular_rate.max(magnitude);
                }
            }
        }

        if let (Some(first), Some(last)) = (log.first(), log.last()) {
            stats.duration_millis = last.captured_at_millis() - first.captured_at_millis();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot::new(
            false,
            0,
            vec![
                Sample::linear_acceleration(3.0, 4.0, 0.0, 1000),
                Sample::angular_rate(0.6, 0.8, 0.0, 1050),
                Sample::linear_acceleration(0.0, 0.0, 1.0, 1250),
            ],
        )
    }

    #[test]
    fn test_stats_from_log() {
        let stats = SessionStats::from_log(&snapshot().log);
        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.linear_acceleration_count, 2);
        assert_eq!(stats.angular_rate_count, 1);
        assert_eq!(stats.duration_millis, 250);
        assert_relative_eq!(stats.peak_acceleration, 5.0);
        assert_relative_eq!(stats.peak_angular_rate, 1.0);
    }

    #[test]
    fn test_stats_empty_log() {
        assert_eq!(SessionStats::from_log(&[]), SessionStats::default());
    }

    #[test]
    fn test_export_json_serialization() {
        let json = SessionExport::from_snapshot(&snapshot()).to_json().unwrap();
        assert!(json.contains("\"sample_count\": 3"));
        assert!(json.contains("angular_rate"));
    }

    #[test]
    fn test_csv_rows() {
        let csv = SessionExport::from_snapshot(&snapshot()).to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "kind,captured_at_millis,x,y,z,rot_x,rot_y,rot_z");
        assert!(lines[1].starts_with("linear_acceleration,1000,3,4,0,"));
        assert_eq!(lines[2], "angular_rate,1050,0.6,0.8,0,,,");
    }
}
