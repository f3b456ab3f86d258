// Motion Replay Library
// Records accelerometer/gyroscope samples and replays them frame by frame

pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod player;
pub mod recorder;
pub mod renderer;
pub mod sample;
pub mod sensor;
pub mod store;
pub mod ticker;

pub use config::Config;
pub use controller::{Command, Event, LiveReadout, MotionController};
pub use error::{MotionReplayError, Result};
pub use player::{Frame, PlaybackState, Player};
pub use recorder::{Recorder, RecordingState};
pub use renderer::{LogRenderer, Renderer, WebViewBridge};
pub use sample::{DerivedRotation, Sample, SensorKind};
pub use sensor::{SensorFeed, SensorSource, SimulatedSensor, Subscription};
pub use store::{JsonFileStore, MemoryStore, PersistentStore, SessionSnapshot};
