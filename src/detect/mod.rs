//! Detection loops and the runtime that drives them.
//!
//! Every loop runs on its own thread: wait, capture its region, classify,
//! act on the outcome. Loops share one [`Context`] and never wait on each
//! other; everything they exchange goes through the event log, the team
//! counters and the scoreboard.

pub mod clock;
pub mod confirm;
pub mod defeated;
pub mod energy;
pub mod kos;
pub mod objectives;
pub mod phase;
pub mod preview;
pub mod scheduler;
pub mod score_option;
pub mod scores;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::{Frame, FrameSource, Rect};
use crate::config::Config;
use crate::error::AppResult;
use crate::events::EventLog;
use crate::history::MatchHistory;
use crate::matcher::{Classify, Correlate, TemplateLibrary};
use crate::messaging::{EventBus, HudEvent};
use crate::notify::Notifier;
use crate::scoreboard::Scoreboard;
use crate::team::Teams;

pub use preview::{PreviewSlot, Previews};
pub use scheduler::Detector;

/// State shared by every loop. Cloning shares it.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<RwLock<Config>>,
    pub source: Arc<dyn FrameSource>,
    pub classifier: Arc<dyn Classify>,
    pub library: Arc<TemplateLibrary>,
    pub correlator: Arc<dyn Correlate>,
    pub teams: Arc<Teams>,
    pub log: EventLog,
    pub scoreboard: Arc<Scoreboard>,
    pub notifier: Notifier,
    pub history: Arc<MatchHistory>,
    pub previews: Arc<Previews>,
    idle: Arc<AtomicBool>,
    shutdown: Receiver<()>,
}

/// Stops every loop sharing the context it was created with.
pub struct ShutdownHandle(Sender<()>);

impl ShutdownHandle {
    /// Wake sleeping loops; each returns at its next wait.
    pub fn trigger(self) {
        drop(self.0);
    }
}

impl Context {
    pub fn new(
        config: Config,
        source: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classify>,
        library: Arc<TemplateLibrary>,
        correlator: Arc<dyn Correlate>,
        bus: EventBus,
    ) -> (Self, ShutdownHandle) {
        let (tx, rx) = bounded(0);
        let log = EventLog::with_capacity(config.event_log_capacity);
        let idle = Arc::new(AtomicBool::new(config.start_idle));

        let context = Self {
            config: Arc::new(RwLock::new(config)),
            source,
            classifier,
            library,
            correlator,
            teams: Arc::new(Teams::new()),
            log,
            scoreboard: Arc::new(Scoreboard::new(bus.clone())),
            notifier: Notifier::new(bus),
            history: Arc::new(MatchHistory::new()),
            previews: Arc::new(Previews::new()),
            idle,
            shutdown: rx,
        };

        (context, ShutdownHandle(tx))
    }

    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Relaxed)
    }

    /// Suspend or resume every loop without stopping it.
    pub fn set_idle(&self, idle: bool) {
        if self.idle.swap(idle, Ordering::Relaxed) != idle {
            tracing::info!("Detection {}", if idle { "paused" } else { "resumed" });
        }
    }

    /// Sleep for `duration`. Returns false when shutdown was requested.
    pub fn sleep(&self, duration: Duration) -> bool {
        match self.shutdown.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => true,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Match clock as shown in feed lines and log entries.
    pub fn clock(&self) -> String {
        self.scoreboard.clock()
    }

    /// Capture `area`, logging failures. Loops retry on their next tick.
    pub fn capture(&self, area: Rect, what: &str) -> Option<Frame> {
        match self.source.capture(area) {
            Ok(frame) => Some(frame),
            Err(err) => {
                tracing::warn!("Failed to capture {} area {:?}: {}", what, area.as_array(), err);
                None
            }
        }
    }
}

/// Every detection loop running on its own thread.
pub struct Runtime {
    context: Context,
    handles: Vec<JoinHandle<()>>,
    shutdown: Option<ShutdownHandle>,
}

impl Runtime {
    /// The full set of loops.
    pub fn detectors() -> Vec<Box<dyn Detector>> {
        use crate::team::Side;

        vec![
            Box::new(scores::ScoresLoop::new(Side::Purple)),
            Box::new(scores::ScoresLoop::new(Side::Orange)),
            Box::new(energy::EnergyLoop::new()),
            Box::new(score_option::ScoreOptionLoop::new()),
            Box::new(defeated::DefeatedLoop::new()),
            Box::new(objectives::ObjectivesLoop::new()),
            Box::new(kos::KosLoop::new()),
            Box::new(clock::ClockLoop::new()),
            Box::new(phase::PhaseLoop::new()),
            Box::new(preview::PreviewLoop::new()),
        ]
    }

    pub fn spawn(context: Context, shutdown: ShutdownHandle) -> AppResult<Self> {
        Self::spawn_with(context, shutdown, Self::detectors())
    }

    pub fn spawn_with(
        context: Context,
        shutdown: ShutdownHandle,
        detectors: Vec<Box<dyn Detector>>,
    ) -> AppResult<Self> {
        let mut handles = Vec::with_capacity(detectors.len());

        for detector in detectors {
            let name = format!("hudwatch-{}", detector.name());
            let ctx = context.clone();
            let handle = std::thread::Builder::new()
                .name(name.clone())
                .spawn(move || scheduler::run(detector, ctx))
                .map_err(|e| anyhow::anyhow!("Failed to spawn {}: {}", name, e))?;
            handles.push(handle);
        }

        tracing::info!("Started {} detection loops", handles.len());

        Ok(Self {
            context,
            handles,
            shutdown: Some(shutdown),
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Stop every loop and wait for them.
    pub fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.trigger();
        }
        self.context.notifier.bus().publish(HudEvent::Shutdown);
        self.join_all();
        tracing::info!("Detection stopped");
    }

    fn join_all(&mut self) {
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("detector").to_string();
            if handle.join().is_err() {
                tracing::error!("{} panicked", name);
            }
        }
    }
}
