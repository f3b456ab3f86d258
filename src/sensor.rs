use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::f64::consts::PI;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::{MotionReplayError, Result};
use crate::sample::{Sample, SensorKind};

/// What happened to a sample handed to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    /// Subscriber is busy; the sample was dropped
    Dropped,
    /// Subscriber is gone; the producer should stop
    Closed,
}

pub type SampleCallback = Box<dyn FnMut(Sample) -> Delivery + Send>;

/// A physical (or simulated) motion sensor
pub trait SensorSource: Send {
    fn kind(&self) -> SensorKind;

    fn is_available(&self) -> bool;

    fn request_permission(&self) -> BoxFuture<'_, bool>;

    fn set_sampling_period(&mut self, period: Duration);

    /// Start delivering samples to `on_sample` until the returned handle is released
    fn subscribe(&mut self, on_sample: SampleCallback) -> Result<Subscription>;
}

/// Handle for one live sensor subscription. Released on drop.
pub struct Subscription {
    kind: SensorKind,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(kind: SensorKind, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            kind,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Safe to call any number of times
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
            log::debug!("[sensor] unsubscribed from {}", self.kind);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("active", &self.is_active())
            .finish()
    }
}

/// The set of subscriptions feeding the recorder
#[derive(Debug, Default)]
pub struct SensorFeed {
    subscriptions: Vec<Subscription>,
}

impl SensorFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    pub fn kinds(&self) -> Vec<SensorKind> {
        self.subscriptions.iter().map(Subscription::kind).collect()
    }

    /// Subscribe to every source. Availability and permission are checked for
    /// all sources before any subscription is made, so a refusal leaves the
    /// feed untouched.
    pub async fn attach<F>(
        &mut self,
        sources: &mut [Box<dyn SensorSource>],
        mut make_callback: F,
    ) -> Result<()>
    where
        F: FnMut(SensorKind) -> SampleCallback,
    {
        if self.is_attached() {
            return Ok(());
        }
        if sources.is_empty() {
            return Err(MotionReplayError::SensorFailed("no sensor sources".to_string()));
        }

        for source in sources.iter() {
            let kind = source.kind();
            if !source.is_available() {
                return Err(MotionReplayError::SensorUnavailable(kind));
            }
            if !source.request_permission().await {
                return Err(MotionReplayError::PermissionDenied(kind));
            }
        }

        let mut subscriptions = Vec::with_capacity(sources.len());
        for source in sources.iter_mut() {
            let kind = source.kind();
            // Partial subscriptions are dropped (and released) on error
            subscriptions.push(source.subscribe(make_callback(kind))?);
            log::info!("[sensor] subscribed to {}", kind);
        }

        self.subscriptions = subscriptions;
        Ok(())
    }

    /// Unsubscribe everything. Safe when never attached.
    pub fn release(&mut self) {
        for subscription in self.subscriptions.iter_mut() {
            subscription.unsubscribe();
        }
        self.subscriptions.clear();
    }
}

impl Drop for SensorFeed {
    fn drop(&mut self) {
        self.release();
    }
}

/// Shortest period a simulated sensor will sample at
pub const MIN_SAMPLING_PERIOD: Duration = Duration::from_millis(1);

/// Zero periods are raised to `MIN_SAMPLING_PERIOD`
fn effective_period(period: Duration) -> Duration {
    if period < MIN_SAMPLING_PERIOD {
        log::warn!(
            "[sensor] sampling period {:?} raised to {:?}",
            period,
            MIN_SAMPLING_PERIOD
        );
        return MIN_SAMPLING_PERIOD;
    }
    period
}

/// Synthetic sensor driven by a tokio interval
pub struct SimulatedSensor {
    kind: SensorKind,
    available: bool,
    permission_granted: bool,
    period_tx: watch::Sender<Duration>,
}

impl SimulatedSensor {
    pub fn new(kind: SensorKind, period: Duration) -> Self {
        let (period_tx, _) = watch::channel(effective_period(period));
        Self {
            kind,
            available: true,
            permission_granted: true,
            period_tx,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn without_permission(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    pub fn sampling_period(&self) -> Duration {
        *self.period_tx.borrow()
    }
}

impl SensorSource for SimulatedSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn request_permission(&self) -> BoxFuture<'_, bool> {
        let granted = self.permission_granted;
        async move { granted }.boxed()
    }

    fn set_sampling_period(&mut self, period: Duration) {
        // Running subscriptions pick this up on their next tick
        self.period_tx.send_replace(effective_period(period));
    }

    fn subscribe(&mut self, on_sample: SampleCallback) -> Result<Subscription> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MotionReplayError::SensorFailed(format!("no async runtime: {e}")))?;

        let kind = self.kind;
        let period_rx = self.period_tx.subscribe();
        let task = runtime.spawn(sample_loop(kind, period_rx, on_sample));
        Ok(Subscription::new(kind, move || task.abort()))
    }
}

async fn sample_loop(
    kind: SensorKind,
    mut period_rx: watch::Receiver<Duration>,
    mut on_sample: SampleCallback,
) {
    let mut period = (*period_rx.borrow_and_update()).max(MIN_SAMPLING_PERIOD);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sample_count = 0u64;
    let mut last_millis = i64::MIN;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = period_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                period = (*period_rx.borrow_and_update()).max(MIN_SAMPLING_PERIOD);
                ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                continue;
            }
        }

        let captured_at_millis = Utc::now().timestamp_millis().max(last_millis);
        last_millis = captured_at_millis;
        let t = sample_count as f64 * period.as_secs_f64();

        match on_sample(synthetic_sample(kind, t, captured_at_millis)) {
            Delivery::Accepted => {
                sample_count += 1;
                if sample_count % 100 == 0 {
                    log::debug!("[sensor] {} {} samples", kind, sample_count);
                }
            }
            Delivery::Dropped => {}
            Delivery::Closed => {
                log::debug!("[sensor] {} channel closed after {} samples", kind, sample_count);
                break;
            }
        }
    }
}

/// Smooth synthetic motion: a slow wobble around gravity for acceleration,
/// small oscillating turn rates for angular rate.
pub fn synthetic_sample(kind: SensorKind, t: f64, captured_at_millis: i64) -> Sample {
    match kind {
        SensorKind::LinearAcceleration => Sample::linear_acceleration(
            (t * 2.0 * PI).sin() * 0.5,
            (t * 2.0 * PI).cos() * 0.3,
            9.81 + (t * PI).sin() * 0.1,
            captured_at_millis,
        ),
        SensorKind::AngularRate => Sample::angular_rate(
            (t * 0.5).sin() * 0.05,
            (t * 0.3).cos() * 0.03,
            t.sin() * 0.1,
            captured_at_millis,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn forward_to(tx: mpsc::Sender<Sample>) -> SampleCallback {
        Box::new(move |sample| match tx.try_send(sample) {
            Ok(_) => Delivery::Accepted,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        })
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut subscription = Subscription::new(SensorKind::AngularRate, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(subscription.is_active());
        subscription.unsubscribe();
        subscription.unsubscribe();
        drop(subscription);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_never_attached_feed() {
        let mut feed = SensorFeed::new();
        feed.release();
        feed.release();
        assert!(!feed.is_attached());
    }

    #[tokio::test]
    async fn test_simulated_sensor_delivers_samples() {
        let mut sensor =
            SimulatedSensor::new(SensorKind::LinearAcceleration, Duration::from_millis(2));
        let (tx, mut rx) = mpsc::channel(16);
        let mut subscription = sensor.subscribe(forward_to(tx)).unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        subscription.unsubscribe();

        assert_eq!(first.kind(), SensorKind::LinearAcceleration);
        assert!(first.derived_rotation().is_some());
        assert!(second.captured_at_millis() >= first.captured_at_millis());
    }

    #[tokio::test]
    async fn test_feed_refuses_unavailable_source() {
        let mut sources: Vec<Box<dyn SensorSource>> = vec![
            Box::new(SimulatedSensor::new(
                SensorKind::LinearAcceleration,
                Duration::from_millis(10),
            )),
            Box::new(
                SimulatedSensor::new(SensorKind::AngularRate, Duration::from_millis(10))
                    .unavailable(),
            ),
        ];
        let (tx, _rx) = mpsc::channel(16);
        let mut feed = SensorFeed::new();

        let result = feed.attach(&mut sources, |_| forward_to(tx.clone())).await;

        assert_eq!(
            result,
            Err(MotionReplayError::SensorUnavailable(SensorKind::AngularRate))
        );
        assert!(!feed.is_attached());
    }

    #[tokio::test]
    async fn test_feed_refuses_empty_sources() {
        let mut sources: Vec<Box<dyn SensorSource>> = Vec::new();
        let (tx, _rx) = mpsc::channel(16);
        let mut feed = SensorFeed::new();

        let result = feed.attach(&mut sources, |_| forward_to(tx.clone())).await;

        assert!(matches!(result, Err(MotionReplayError::SensorFailed(_))));
        assert!(!feed.is_attached());
    }

    #[tokio::test]
    async fn test_feed_refuses_denied_permission() {
        let mut sources: Vec<Box<dyn SensorSource>> = vec![Box::new(
            SimulatedSensor::new(SensorKind::AngularRate, Duration::from_millis(10))
                .without_permission(),
        )];
        let (tx, _rx) = mpsc::channel(16);
        let mut feed = SensorFeed::new();

        let result = feed.attach(&mut sources, |_| forward_to(tx.clone())).await;

        assert_eq!(
            result,
            Err(MotionReplayError::PermissionDenied(SensorKind::AngularRate))
        );
    }

    #[tokio::test]
    async fn test_feed_attach_and_release() {
        let mut sources: Vec<Box<dyn SensorSource>> = vec![
            Box::new(SimulatedSensor::new(
                SensorKind::LinearAcceleration,
                Duration::from_millis(5),
            )),
            Box::new(SimulatedSensor::new(
                SensorKind::AngularRate,
                Duration::from_millis(5),
            )),
        ];
        let (tx, mut rx) = mpsc::channel(64);
        let mut feed = SensorFeed::new();

        feed.attach(&mut sources, |_| forward_to(tx.clone())).await.unwrap();
        assert_eq!(
            feed.kinds(),
            vec![SensorKind::LinearAcceleration, SensorKind::AngularRate]
        );
        assert!(rx.recv().await.is_some());

        feed.release();
        feed.release();
        assert!(!feed.is_attached());
    }

    #[tokio::test]
    async fn test_set_sampling_period() {
        let mut sensor = SimulatedSensor::new(SensorKind::AngularRate, Duration::from_millis(100));
        sensor.set_sampling_period(Duration::from_millis(20));
        assert_eq!(sensor.sampling_period(), Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_zero_sampling_period_still_delivers() {
        let mut sensor = SimulatedSensor::new(SensorKind::AngularRate, Duration::ZERO);
        assert_eq!(sensor.sampling_period(), MIN_SAMPLING_PERIOD);

        sensor.set_sampling_period(Duration::ZERO);
        assert_eq!(sensor.sampling_period(), MIN_SAMPLING_PERIOD);

        let (tx, mut rx) = mpsc::channel(16);
        let mut subscription = sensor.subscribe(forward_to(tx)).unwrap();
        let sample = rx.recv().await.unwrap();
        subscription.unsubscribe();

        assert_eq!(sample.kind(), SensorKind::AngularRate);
    }
}
