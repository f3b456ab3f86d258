use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which physical sensor produced a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    LinearAcceleration,
    AngularRate,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::LinearAcceleration => write!(f, "linear acceleration"),
            SensorKind::AngularRate => write!(f, "angular rate"),
        }
    }
}

/// Cube rotation (radians) remapped from raw acceleration axes at capture time
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedRotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl DerivedRotation {
    /// Roll about x, pitch about y, planar heading about z.
    pub fn from_axes(axes: &Vector3<f64>) -> Self {
        let roll = axes.y.atan2(axes.z);
        let pitch = (-axes.x).atan2((axes.y * axes.y + axes.z * axes.z).sqrt());
        let heading = axes.y.atan2(axes.x);
        Self {
            x: roll,
            y: pitch,
            z: heading,
        }
    }
}

/// One motion reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sample {
    LinearAcceleration {
        captured_at_millis: i64,
        x: f64,
        y: f64,
        z: f64,
        derived_rotation: DerivedRotation,
    },
    AngularRate {
        captured_at_millis: i64,
        x: f64,
        y: f64,
        z: f64,
    },
}

impl Sample {
    pub fn linear_acceleration(x: f64, y: f64, z: f64, captured_at_millis: i64) -> Self {
        let derived_rotation = DerivedRotation::from_axes(&Vector3::new(x, y, z));
        Sample::LinearAcceleration {
            captured_at_millis,
            x,
            y,
            z,
            derived_rotation,
        }
    }

    pub fn angular_rate(x: f64, y: f64, z: f64, captured_at_millis: i64) -> Self {
        Sample::AngularRate {
            captured_at_millis,
            x,
            y,
            z,
        }
    }

    pub fn kind(&self) -> SensorKind {
        match self {
            Sample::LinearAcceleration { .. } => SensorKind::LinearAcceleration,
            Sample::AngularRate { .. } => SensorKind::AngularRate,
        }
    }

    pub fn captured_at_millis(&self) -> i64 {
        match self {
            Sample::LinearAcceleration {
                captured_at_millis, ..
            }
            | Sample::AngularRate {
                captured_at_millis, ..
            } => *captured_at_millis,
        }
    }

    pub fn with_captured_at_millis(mut self, millis: i64) -> Self {
        match &mut self {
            Sample::LinearAcceleration {
                captured_at_millis, ..
            }
            | Sample::AngularRate {
                captured_at_millis, ..
            } => *captured_at_millis = millis,
        }
        self
    }

    pub fn axes(&self) -> Vector3<f64> {
        match self {
            Sample::LinearAcceleration { x, y, z, .. } | Sample::AngularRate { x, y, z, .. } => {
                Vector3::new(*x, *y, *z)
            }
        }
    }

    /// Only linear acceleration carries a derived rotation
    pub fn derived_rotation(&self) -> Option<&DerivedRotation> {
        match self {
            Sample::LinearAcceleration {
                derived_rotation, ..
            } => Some(derived_rotation),
            Sample::AngularRate { .. } => None,
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.axes().norm()
    }
}

/// Round to two decimals for diagnostic output
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
