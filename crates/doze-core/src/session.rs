//! Sensor subscription lifecycle
//!
//! `enable` and `disable` only queue work. A single worker task applies the
//! queued operations in order, so a register can never race an unregister
//! issued right after it. Readings arrive on the sensor's own thread and go
//! straight to the classifier through [`GestureListener`].

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{
    clock::Clock,
    gesture::{ClassifierState, GestureClassifier, GestureSettings, ProximitySample},
    pulse::PulseAction,
    sensor::{SamplingRate, SensorListener, SensorSource},
};

enum Command {
    Enable(oneshot::Sender<()>),
    Disable(oneshot::Sender<()>),
}

impl Command {
    const fn label(&self) -> &'static str {
        match self {
            Self::Enable(_) => "enable",
            Self::Disable(_) => "disable",
        }
    }
}

/// Completion handle for a queued enable/disable
///
/// Dropping it is fine; the operation still runs.
#[derive(Debug)]
pub struct Pending {
    done: Option<oneshot::Receiver<()>>,
}

impl Pending {
    const fn ready() -> Self {
        Self { done: None }
    }

    /// Wait until the worker has applied the operation
    pub async fn wait(self) {
        if let Some(done) = self.done {
            if done.await.is_err() {
                log::warn!("Sensor session worker stopped before finishing a request");
            }
        }
    }
}

/// Bridges raw sensor callbacks to the gesture classifier
///
/// Readings are dropped unless the listener is live. The live flag is read
/// again while holding the classifier lock, and `disarm` clears it under
/// that same lock, so once `disarm` returns no reading reaches the
/// classifier and no pulse fires. `is_live` never takes the lock.
pub struct GestureListener {
    classifier: Mutex<GestureClassifier>,
    live: AtomicBool,
    maximum_range: f32,
    pulse: Arc<dyn PulseAction>,
}

impl GestureListener {
    #[must_use]
    pub fn new(
        settings: Arc<dyn GestureSettings>,
        maximum_range: f32,
        pulse: Arc<dyn PulseAction>,
    ) -> Self {
        Self {
            classifier: Mutex::new(GestureClassifier::new(settings)),
            live: AtomicBool::new(false),
            maximum_range,
            pulse,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GestureClassifier> {
        self.classifier.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start accepting readings, measuring from `reference_nanos`
    pub(crate) fn arm(&self, reference_nanos: i64) {
        let mut classifier = self.lock();
        classifier.reset(reference_nanos);
        self.live.store(true, Ordering::SeqCst);
    }

    /// Stop accepting readings
    pub(crate) fn disarm(&self) {
        let _classifier = self.lock();
        self.live.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Snapshot of the classifier state
    ///
    /// Waits for any reading in flight, so it must not be called from a
    /// [`PulseAction`]; `is_live` is safe there.
    #[must_use]
    pub fn classifier_state(&self) -> ClassifierState {
        self.lock().state()
    }
}

impl SensorListener for GestureListener {
    fn on_event(&self, raw_value: f32, timestamp_nanos: i64) {
        if !raw_value.is_finite() {
            log::debug!("Discarding non-finite proximity reading at {timestamp_nanos}");
            return;
        }
        if !self.is_live() {
            log::trace!("Dropping proximity reading delivered after unsubscribe");
            return;
        }
        let sample = ProximitySample {
            is_near: raw_value < self.maximum_range,
            timestamp_nanos,
        };

        let mut classifier = self.lock();
        if !self.is_live() {
            log::trace!("Dropping proximity reading that raced an unsubscribe");
            return;
        }
        if let Some(trigger) = classifier.observe(sample) {
            self.pulse.fire_pulse(&trigger);
        }
    }

    fn on_accuracy_changed(&self, accuracy: i32) {
        log::trace!("Proximity accuracy changed to {accuracy}, ignoring");
    }
}

struct SessionWorker {
    source: Arc<dyn SensorSource>,
    listener: Arc<GestureListener>,
    handle: Arc<dyn SensorListener>,
    clock: Arc<dyn Clock>,
}

impl SessionWorker {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            log::debug!("Applying sensor session {}", command.label());
            match command {
                Command::Enable(done) => {
                    self.subscribe();
                    let _ = done.send(());
                }
                Command::Disable(done) => {
                    self.unsubscribe();
                    let _ = done.send(());
                }
            }
        }

        if self.listener.is_live() {
            self.unsubscribe();
        }
        log::debug!("Sensor session worker stopped");
    }

    fn subscribe(&self) {
        self.listener.arm(self.clock.now_nanos());
        if let Err(e) = self
            .source
            .register_listener(self.handle.clone(), SamplingRate::Normal)
        {
            log::warn!("Failed to register with {}: {e}", self.source.name());
            self.listener.disarm();
            return;
        }
        log::info!("Listening to {}", self.source.name());
    }

    fn unsubscribe(&self) {
        self.source.unregister_listener(&self.handle);
        self.listener.disarm();
        log::info!("Stopped listening to {}", self.source.name());
    }
}

/// Owns the proximity subscription for one screen-off period at a time
///
/// Call [`SensorSession::enable`] when the display turns off and
/// [`SensorSession::disable`] when it turns back on. Without a sensor both are
/// no-ops.
pub struct SensorSession {
    commands: Option<mpsc::UnboundedSender<Command>>,
    listener: Option<Arc<GestureListener>>,
    worker: Option<JoinHandle<()>>,
}

impl SensorSession {
    /// Create a session and start its worker task
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime while a sensor is
    /// present
    pub fn new(
        source: Option<Arc<dyn SensorSource>>,
        settings: Arc<dyn GestureSettings>,
        clock: Arc<dyn Clock>,
        pulse: Arc<dyn PulseAction>,
    ) -> Result<Self> {
        let Some(source) = source else {
            log::warn!("No proximity sensor available, gestures are disabled");
            return Ok(Self {
                commands: None,
                listener: None,
                worker: None,
            });
        };

        let runtime = tokio::runtime::Handle::try_current()
            .context("sensor session must be created inside a tokio runtime")?;

        let listener = Arc::new(GestureListener::new(
            settings,
            source.maximum_range(),
            pulse,
        ));
        let handle: Arc<dyn SensorListener> = listener.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = SessionWorker {
            source,
            listener: listener.clone(),
            handle,
            clock,
        };

        Ok(Self {
            commands: Some(tx),
            listener: Some(listener),
            worker: Some(runtime.spawn(worker.run(rx))),
        })
    }

    /// Whether a sensor was found at construction
    #[must_use]
    pub const fn has_sensor(&self) -> bool {
        self.commands.is_some()
    }

    /// Queue a subscription; called when the display turns off
    pub fn enable(&self) -> Pending {
        log::debug!("Enabling proximity gestures");
        self.submit(Command::Enable)
    }

    /// Queue an unsubscription; called when the display turns on
    pub fn disable(&self) -> Pending {
        log::debug!("Disabling proximity gestures");
        self.submit(Command::Disable)
    }

    /// Whether readings currently reach the classifier
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| listener.is_live())
    }

    /// Classifier state, if a sensor is present
    ///
    /// Must not be called from a [`PulseAction`], see
    /// [`GestureListener::classifier_state`].
    #[must_use]
    pub fn classifier_state(&self) -> Option<ClassifierState> {
        self.listener
            .as_ref()
            .map(|listener| listener.classifier_state())
    }

    /// Stop the worker, unsubscribing first if needed
    pub async fn shutdown(mut self) {
        self.commands.take();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                log::error!("Sensor session worker failed: {e}");
            }
        }
    }

    fn submit(&self, make: fn(oneshot::Sender<()>) -> Command) -> Pending {
        let Some(commands) = &self.commands else {
            return Pending::ready();
        };
        let (done_tx, done_rx) = oneshot::channel();
        if commands.send(make(done_tx)).is_err() {
            log::warn!("Sensor session worker is gone, dropping request");
            return Pending::ready();
        }
        Pending {
            done: Some(done_rx),
        }
    }
}
