use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{MotionReplayError, Result};
use crate::player::{Frame, PlaybackState, Player, TickOutcome};
use crate::recorder::{Recorder, RecordingState};
use crate::renderer::Renderer;
use crate::sample::{Sample, SensorKind};
use crate::sensor::{Delivery, SampleCallback, SensorSource};
use crate::store::{PersistentStore, SessionSnapshot};
use crate::ticker::Ticker;

/// User actions from the Record and Visualize screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartRecording,
    StopRecording,
    Clear,
    Play,
    Pause,
    TogglePlay,
    Next,
    Previous,
    Seek(usize),
    Shutdown,
}

/// Everything that can reach the controller's queue
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Sample(Sample),
    /// Playback tick, tagged with the generation of the ticker that sent it
    Tick(u64),
    Command(Command),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Most recent reading per sensor, for the live readout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveReadout {
    pub linear_acceleration: Option<Sample>,
    pub angular_rate: Option<Sample>,
}

impl LiveReadout {
    fn update(&mut self, sample: &Sample) {
        let slot = match sample.kind() {
            SensorKind::LinearAcceleration => &mut self.linear_acceleration,
            SensorKind::AngularRate => &mut self.angular_rate,
        };
        *slot = Some(sample.clone());
    }
}

/// Owns the recording session, the playback cursor and their collaborators.
///
/// All mutation goes through one event queue: sensor callbacks and playback
/// ticks post events, `run` handles them one at a time.
pub struct MotionController<S: PersistentStore, R: Renderer> {
    recorder: Recorder,
    player: Player,
    ticker: Ticker,
    sources: Vec<Box<dyn SensorSource>>,
    store: S,
    renderer: R,
    live: LiveReadout,
    playback_interval: Duration,
    tick_generation: u64,
    events_tx: mpsc::Sender<Event>,
    events_rx: Option<mpsc::Receiver<Event>>,
}

impl<S: PersistentStore, R: Renderer> MotionController<S, R> {
    /// Build the controller and rehydrate the stored session.
    /// An unreadable store starts an empty session instead; an invalid
    /// config is refused.
    pub fn open(
        config: &Config,
        mut sources: Vec<Box<dyn SensorSource>>,
        store: S,
        renderer: R,
    ) -> Result<Self> {
        config.validate()?;

        let snapshot = match store.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => SessionSnapshot::empty(),
            Err(e) => {
                log::warn!("[store] load failed, starting empty session: {e}");
                SessionSnapshot::empty()
            }
        };

        log::info!(
            "[session] restored {} samples (recording={}, cursor={})",
            snapshot.log.len(),
            snapshot.is_recording,
            snapshot.current_index
        );

        for source in sources.iter_mut() {
            source.set_sampling_period(config.sampling_period());
        }

        let player = Player::restore(snapshot.current_index, snapshot.log.len());
        let recorder = Recorder::restore(snapshot.log, snapshot.is_recording);
        let (events_tx, events_rx) = mpsc::channel(config.event_queue_capacity);

        Ok(Self {
            recorder,
            player,
            ticker: Ticker::new(),
            sources,
            store,
            renderer,
            live: LiveReadout::default(),
            playback_interval: config.playback_interval(),
            tick_generation: 0,
            events_tx,
            events_rx: Some(events_rx),
        })
    }

    /// Sender for posting commands into the queue
    pub fn events(&self) -> mpsc::Sender<Event> {
        self.events_tx.clone()
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn live(&self) -> &LiveReadout {
        &self.live
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recorder.state()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.player.state()
    }

    pub fn log(&self) -> &[Sample] {
        self.recorder.log()
    }

    pub fn current_index(&self) -> usize {
        self.player.current_index()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_running()
    }

    /// Generation carried by ticks from the current ticker
    pub fn tick_generation(&self) -> u64 {
        self.tick_generation
    }

    pub fn current_frame(&self) -> Frame<'_> {
        self.player.current_frame(self.recorder.log())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::new(
            self.recorder.is_recording(),
            self.player.current_index(),
            self.recorder.log().to_vec(),
        )
    }

    /// Subscribe to every sensor for live readout. No-op when attached.
    pub async fn attach_sensors(&mut self) -> Result<()> {
        let tx = self.events_tx.clone();
        self.recorder
            .feed_mut()
            .attach(&mut self.sources, |_| forward_samples(tx.clone()))
            .await
    }

    /// Re-attach sensors for a session that was persisted mid-recording.
    /// If the sensors refuse, the restored session is stopped.
    pub async fn resume(&mut self) {
        if !self.recorder.is_recording() {
            return;
        }
        if let Err(e) = self.attach_sensors().await {
            log::warn!("[session] cannot resume recording: {e}");
            let record = self.recorder.stop_recording();
            log::info!("[session] {record}");
            self.persist();
        }
    }

    pub async fn start_recording(&mut self) -> Result<()> {
        if let Err(e) = self.attach_sensors().await {
            log::warn!("[session] recording not started: {e}");
            return Err(e);
        }

        self.halt_playback();
        let record = self.recorder.start_recording();
        self.player.reset();
        log::info!("[session] {record}");
        self.persist();
        Ok(())
    }

    pub fn stop_recording(&mut self) {
        let record = self.recorder.stop_recording();
        self.player.clamp(self.recorder.len());
        log::info!("[session] {record}");
        self.persist();
    }

    pub fn clear(&mut self) {
        self.halt_playback();
        let record = self.recorder.clear();
        self.player.reset();
        log::info!("[session] {record}");
        self.persist();
    }

    /// Ingest one live sample: record it if recording, and pass it through
    /// to the renderer unless playback owns the renderer.
    pub fn add_data_point(&mut self, sample: Sample) {
        self.live.update(&sample);

        if !self.player.is_playing() {
            self.renderer.present(&sample);
        }

        if let Some(record) = self.recorder.add_data_point(sample) {
            log::debug!("[session] {record}");
            self.persist();
        }
    }

    /// Returns true when playback started
    pub fn play(&mut self) -> bool {
        if !self.player.play(self.recorder.len()) {
            return false;
        }

        // Ticks still queued from an earlier ticker carry an older generation
        self.tick_generation += 1;
        let generation = self.tick_generation;
        let tx = self.events_tx.clone();
        let started = self.ticker.start(self.playback_interval, move || {
            match tx.try_send(Event::Tick(generation)) {
                Ok(_) => Delivery::Accepted,
                Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
                Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
            }
        });
        if let Err(e) = started {
            log::warn!("[playback] could not start ticker: {e}");
            self.player.pause();
            return false;
        }

        log::info!(
            "[playback] playing from frame {} of {}",
            self.player.current_index(),
            self.recorder.len()
        );
        self.present_current();
        true
    }

    pub fn pause(&mut self) {
        if self.halt_playback() {
            log::info!("[playback] paused at frame {}", self.player.current_index());
        }
    }

    pub fn toggle_play(&mut self) {
        if self.player.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn next(&mut self) {
        if self.player.advance(self.recorder.len()) {
            self.present_current();
            self.persist();
        }
    }

    pub fn previous(&mut self) {
        if self.player.retreat(self.recorder.len()) {
            self.present_current();
            self.persist();
        }
    }

    pub fn seek(&mut self, index: usize) {
        let before = self.player.current_index();
        self.player.seek(index, self.recorder.len());
        if self.player.current_index() != before {
            self.present_current();
            self.persist();
        }
    }

    pub fn on_tick(&mut self) {
        match self.player.tick(self.recorder.len()) {
            TickOutcome::Advanced(_) => {
                self.present_current();
                self.persist();
            }
            TickOutcome::Finished => {
                self.ticker.stop();
                log::info!("[playback] pass complete, rewound to frame 0");
                self.present_current();
                self.persist();
            }
            TickOutcome::Ignored => {}
        }
    }

    pub async fn handle_event(&mut self, event: Event) -> Flow {
        match event {
            Event::Sample(sample) => self.add_data_point(sample),
            Event::Tick(generation) if generation == self.tick_generation => self.on_tick(),
            Event::Tick(generation) => {
                log::debug!("[playback] dropped stale tick from generation {generation}");
            }
            Event::Command(command) => return self.handle_command(command).await,
        }
        Flow::Continue
    }

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::StartRecording => {
                // Refusal is already logged; the session stays Idle
                let _ = self.start_recording().await;
            }
            Command::StopRecording => self.stop_recording(),
            Command::Clear => self.clear(),
            Command::Play => {
                self.play();
            }
            Command::Pause => self.pause(),
            Command::TogglePlay => self.toggle_play(),
            Command::Next => self.next(),
            Command::Previous => self.previous(),
            Command::Seek(index) => self.seek(index),
            Command::Shutdown => return Flow::Shutdown,
        }
        Flow::Continue
    }

    /// Drain the event queue until a Shutdown command, then release
    /// sensors and the ticker.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(|_| false).await
    }

    /// Like `run`, but also stops once `done` holds after an event
    pub async fn run_until<F>(&mut self, mut done: F) -> Result<()>
    where
        F: FnMut(&Self) -> bool,
    {
        let mut events_rx = self.events_rx.take().ok_or_else(|| {
            MotionReplayError::Internal("controller event loop already running".to_string())
        })?;

        while let Some(event) = events_rx.recv().await {
            if self.handle_event(event).await == Flow::Shutdown || done(&*self) {
                break;
            }
        }

        self.shutdown();
        self.events_rx = Some(events_rx);
        Ok(())
    }

    /// Release sensor subscriptions and stop the ticker. Idempotent.
    pub fn shutdown(&mut self) {
        self.halt_playback();
        self.recorder.feed_mut().release();
        log::debug!("[session] sensors and ticker released");
    }

    fn halt_playback(&mut self) -> bool {
        self.ticker.stop();
        self.player.pause()
    }

    fn present_current(&mut self) {
        if let Frame::Sample(sample) = self.player.current_frame(self.recorder.log()) {
            self.renderer.present(sample);
        }
    }

    /// Write-through snapshot; failures keep the in-memory session authoritative
    fn persist(&mut self) {
        let snapshot = self.snapshot();
        if let Err(e) = self.store.save(&snapshot) {
            log::warn!("[store] snapshot not saved: {e}");
        }
    }
}

fn forward_samples(tx: mpsc::Sender<Event>) -> SampleCallback {
    Box::new(move |sample| match tx.try_send(Event::Sample(sample)) {
        Ok(_) => Delivery::Accepted,
        Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
        Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
    })
}
