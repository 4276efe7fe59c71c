//! Proximity gesture classification
//!
//! Turns an ordered stream of near/far readings into pulse decisions:
//! - Handwave: the sensor is covered and uncovered again within a second
//! - Pocket: the sensor stays covered for at least 2.5s before it clears
//!
//! Durations between the two bands are ambiguous and never fire.


use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Maximum time for the hand to cover the sensor
pub const HANDWAVE_MAX_DELTA_MS: i64 = 1000;

/// Minimum time until the device is considered to have been in a pocket
pub const POCKET_MIN_DELTA_MS: i64 = 2500;

const NANOS_PER_MILLI: i64 = 1_000_000;

/// A single near/far reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProximitySample {
    pub is_near: bool,
    /// Monotonic timestamp in nanoseconds
    pub timestamp_nanos: i64,
}

impl ProximitySample {
    #[must_use]
    pub const fn near(timestamp_nanos: i64) -> Self {
        Self {
            is_near: true,
            timestamp_nanos,
        }
    }

    #[must_use]
    pub const fn far(timestamp_nanos: i64) -> Self {
        Self {
            is_near: false,
            timestamp_nanos,
        }
    }
}

/// Recognized gesture kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gesture {
    Handwave,
    Pocket,
}

impl Gesture {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Handwave => "handwave",
            Self::Pocket => "pocket",
        }
    }
}

impl std::fmt::Display for Gesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted when a near-to-far transition qualifies for a pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSignal {
    pub gesture: Gesture,
    /// How long the sensor was covered, in milliseconds
    pub delta_ms: i64,
    /// Timestamp of the far reading that completed the gesture
    pub timestamp_nanos: i64,
}

/// Which gestures are allowed to pulse the display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureConfig {
    pub handwave_enabled: bool,
    pub pocket_enabled: bool,
}

impl GestureConfig {
    #[must_use]
    pub const fn new(handwave_enabled: bool, pocket_enabled: bool) -> Self {
        Self {
            handwave_enabled,
            pocket_enabled,
        }
    }

    /// True when at least one gesture can fire
    #[must_use]
    pub const fn any_enabled(&self) -> bool {
        self.handwave_enabled || self.pocket_enabled
    }
}

/// Source of the current gesture toggles.
///
/// Read on demand at every transition check, so implementations may change
/// their answers at any time.
pub trait GestureSettings: Send + Sync {
    fn handwave_enabled(&self) -> bool;

    fn pocket_enabled(&self) -> bool;

    /// Current toggles as a plain value
    fn snapshot(&self) -> GestureConfig {
        GestureConfig::new(self.handwave_enabled(), self.pocket_enabled())
    }
}

impl GestureSettings for GestureConfig {
    fn handwave_enabled(&self) -> bool {
        self.handwave_enabled
    }

    fn pocket_enabled(&self) -> bool {
        self.pocket_enabled
    }
}

/// Gesture toggles that can be flipped while a session is running
#[derive(Debug, Default)]
pub struct SharedGestureConfig {
    handwave: AtomicBool,
    pocket: AtomicBool,
}

impl SharedGestureConfig {
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            handwave: AtomicBool::new(config.handwave_enabled),
            pocket: AtomicBool::new(config.pocket_enabled),
        }
    }

    pub fn set_handwave(&self, enabled: bool) {
        self.handwave.store(enabled, Ordering::SeqCst);
    }

    pub fn set_pocket(&self, enabled: bool) {
        self.pocket.store(enabled, Ordering::SeqCst);
    }

    pub fn update(&self, config: GestureConfig) {
        self.set_handwave(config.handwave_enabled);
        self.set_pocket(config.pocket_enabled);
    }
}

impl GestureSettings for SharedGestureConfig {
    fn handwave_enabled(&self) -> bool {
        self.handwave.load(Ordering::SeqCst)
    }

    fn pocket_enabled(&self) -> bool {
        self.pocket.load(Ordering::SeqCst)
    }
}

/// Previous reading and when the reading last changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierState {
    pub last_near: bool,
    pub last_transition_nanos: i64,
}

/// Classify a cover duration against the enabled gestures
///
/// Handwave is checked first; the bands `[0, 1000)` and `[2500, inf)` are
/// disjoint so only one can match.
#[must_use]
pub fn evaluate(delta_ms: i64, config: GestureConfig) -> Option<Gesture> {
    if delta_ms < 0 {
        return None;
    }
    if delta_ms < HANDWAVE_MAX_DELTA_MS && config.handwave_enabled {
        Some(Gesture::Handwave)
    } else if delta_ms >= POCKET_MIN_DELTA_MS && config.pocket_enabled {
        Some(Gesture::Pocket)
    } else {
        None
    }
}

/// State machine deciding when a near-to-far transition should pulse
pub struct GestureClassifier {
    state: ClassifierState,
    settings: Arc<dyn GestureSettings>,
}

impl GestureClassifier {
    #[must_use]
    pub fn new(settings: Arc<dyn GestureSettings>) -> Self {
        Self {
            state: ClassifierState::default(),
            settings,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ClassifierState {
        self.state
    }

    /// Forget the previous reading and start measuring from `reference_nanos`
    pub fn reset(&mut self, reference_nanos: i64) {
        self.state = ClassifierState {
            last_near: false,
            last_transition_nanos: reference_nanos,
        };
    }

    /// Feed one reading; returns a signal when the caller should pulse
    pub fn observe(&mut self, sample: ProximitySample) -> Option<TriggerSignal> {
        if sample.timestamp_nanos < 0 {
            log::debug!(
                "Discarding proximity sample with negative timestamp {}",
                sample.timestamp_nanos
            );
            return None;
        }

        let mut trigger = None;
        if self.state.last_near && !sample.is_near {
            let delta_ms = sample
                .timestamp_nanos
                .saturating_sub(self.state.last_transition_nanos)
                .div_euclid(NANOS_PER_MILLI);
            let config = self.settings.snapshot();
            match evaluate(delta_ms, config) {
                Some(gesture) => {
                    log::debug!("Recognized {gesture} after {delta_ms}ms");
                    trigger = Some(TriggerSignal {
                        gesture,
                        delta_ms,
                        timestamp_nanos: sample.timestamp_nanos,
                    });
                }
                None => {
                    log::trace!("Cover of {delta_ms}ms does not qualify ({config:?})");
                }
            }
        }

        if sample.is_near != self.state.last_near {
            self.state.last_transition_nanos = sample.timestamp_nanos;
        }
        self.state.last_near = sample.is_near;

        trigger
    }
}

impl std::fmt::Debug for GestureClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureClassifier")
            .field("state", &self.state)
            .field("settings", &self.settings.snapshot())
            .finish()
    }
}
