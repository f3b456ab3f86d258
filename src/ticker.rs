use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::{MotionReplayError, Result};
use crate::sensor::Delivery;

/// Fixed-rate playback tick source
#[derive(Debug, Default)]
pub struct Ticker {
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Fire `on_tick` every `period`, first after one full period.
    /// Restarts the ticker when it is already running.
    pub fn start<F>(&mut self, period: Duration, mut on_tick: F) -> Result<()>
    where
        F: FnMut() -> Delivery + Send + 'static,
    {
        if period.is_zero() {
            return Err(MotionReplayError::InvalidConfig(
                "playback interval must be positive".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MotionReplayError::Internal(format!("no async runtime: {e}")))?;
        self.stop();

        self.task = Some(runtime.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if on_tick() == Delivery::Closed {
                    break;
                }
            }
        }));
        log::debug!("[playback] ticker started at {:?}", period);
        Ok(())
    }

    /// Safe to call when never started or already stopped
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            log::debug!("[playback] ticker stopped");
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
