use std::sync::{Arc, Mutex, PoisonError};

use super::{SamplingRate, SensorError, SensorListener, SensorSource};

/// Range reported by common proximity sensors, in centimeters
pub const DEFAULT_MAXIMUM_RANGE: f32 = 5.0;

/// In-process proximity sensor fed by the caller
///
/// Events pushed through [`VirtualProximitySensor::deliver`] are dispatched
/// synchronously, on the caller's thread, to every registered listener. A
/// listener registered twice receives each event twice.
pub struct VirtualProximitySensor {
    name: String,
    maximum_range: f32,
    wakeup: bool,
    listeners: Mutex<Vec<Arc<dyn SensorListener>>>,
    reject_registrations: bool,
}

impl std::fmt::Debug for VirtualProximitySensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualProximitySensor")
            .field("name", &self.name)
            .field("maximum_range", &self.maximum_range)
            .field("wakeup", &self.wakeup)
            .field("reject_registrations", &self.reject_registrations)
            .finish_non_exhaustive()
    }
}

impl VirtualProximitySensor {
    #[must_use]
    pub fn new(maximum_range: f32, wakeup: bool) -> Self {
        let name = if wakeup {
            "virtual-proximity (wake-up)"
        } else {
            "virtual-proximity"
        };
        Self {
            name: name.to_string(),
            maximum_range,
            wakeup,
            listeners: Mutex::new(Vec::new()),
            reject_registrations: false,
        }
    }

    /// A sensor that refuses every listener, for exercising error paths
    #[must_use]
    pub fn rejecting(maximum_range: f32) -> Self {
        Self {
            reject_registrations: true,
            ..Self::new(maximum_range, false)
        }
    }

    #[must_use]
    pub const fn is_wakeup(&self) -> bool {
        self.wakeup
    }

    /// Number of live registrations, duplicates included
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Push a reading to every registered listener
    pub fn deliver(&self, raw_value: f32, timestamp_nanos: i64) {
        for listener in self.snapshot() {
            listener.on_event(raw_value, timestamp_nanos);
        }
    }

    /// Push an accuracy change to every registered listener
    pub fn deliver_accuracy(&self, accuracy: i32) {
        for listener in self.snapshot() {
            listener.on_accuracy_changed(accuracy);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn SensorListener>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SensorSource for VirtualProximitySensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn maximum_range(&self) -> f32 {
        self.maximum_range
    }

    fn register_listener(
        &self,
        listener: Arc<dyn SensorListener>,
        rate: SamplingRate,
    ) -> Result<(), SensorError> {
        if self.reject_registrations {
            return Err(SensorError::RegistrationRejected(format!(
                "{} accepts no listeners",
                self.name
            )));
        }
        log::trace!(
            "Registering listener on {} every {}us",
            self.name,
            rate.delay_micros()
        );
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
        Ok(())
    }

    fn unregister_listener(&self, listener: &Arc<dyn SensorListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }
}
