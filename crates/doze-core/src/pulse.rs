use crate::gesture::TriggerSignal;

/// Action run when a gesture qualifies, typically a brief ambient display pulse
///
/// Called on the sensor delivery thread, so implementations should hand work
/// off rather than block.
pub trait PulseAction: Send + Sync {
    fn fire_pulse(&self, trigger: &TriggerSignal);
}

impl<F> PulseAction for F
where
    F: Fn(&TriggerSignal) + Send + Sync,
{
    fn fire_pulse(&self, trigger: &TriggerSignal) {
        self(trigger);
    }
}

/// Pulse action that only records the pulse in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPulse;

impl PulseAction for LogPulse {
    fn fire_pulse(&self, trigger: &TriggerSignal) {
        log::info!(
            "Doze pulse: {} after {}ms cover",
            trigger.gesture,
            trigger.delta_ms
        );
    }
}
