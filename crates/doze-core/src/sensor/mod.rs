use std::sync::Arc;
use thiserror::Error;

pub mod virtual_sensor;

pub use virtual_sensor::VirtualProximitySensor;

/// Errors raised by a sensor source
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("no usable proximity sensor: {0}")]
    Unavailable(String),
    #[error("sensor rejected listener registration: {0}")]
    RegistrationRejected(String),
}

/// Delivery rate hint passed when registering a listener
///
/// Gesture detection only needs the slow "normal" rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingRate {
    Normal,
}

impl SamplingRate {
    /// Suggested delay between events in microseconds
    #[must_use]
    pub const fn delay_micros(&self) -> u32 {
        match self {
            Self::Normal => 200_000,
        }
    }
}

/// Receiver of sensor callbacks
pub trait SensorListener: Send + Sync {
    /// A new reading was produced
    fn on_event(&self, raw_value: f32, timestamp_nanos: i64);

    /// The sensor reported a change in accuracy
    fn on_accuracy_changed(&self, accuracy: i32);
}

/// Platform proximity sensor
///
/// Events are delivered on whatever thread the source uses; listeners must
/// tolerate that.
pub trait SensorSource: Send + Sync {
    /// Human readable sensor name
    fn name(&self) -> &str;

    /// Readings below this value count as "near"
    fn maximum_range(&self) -> f32;

    /// Start delivering events to `listener`
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor refuses the registration
    fn register_listener(
        &self,
        listener: Arc<dyn SensorListener>,
        rate: SamplingRate,
    ) -> Result<(), SensorError>;

    /// Stop delivering events to `listener`; once this returns no further
    /// callbacks are started for it
    fn unregister_listener(&self, listener: &Arc<dyn SensorListener>);
}

/// Which proximity sensor to ask the platform for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPreference {
    /// Prefer a wake-up sensor, which can deliver while the device sleeps
    pub wakeup: bool,
    pub maximum_range: f32,
}

impl Default for SensorPreference {
    fn default() -> Self {
        Self {
            wakeup: true,
            maximum_range: virtual_sensor::DEFAULT_MAXIMUM_RANGE,
        }
    }
}

/// Look up the proximity sensor for this device
///
/// # Errors
///
/// Returns [`SensorError::Unavailable`] when the device has no usable
/// proximity sensor; callers are expected to degrade to doing nothing.
pub fn create_sensor(
    preference: SensorPreference,
) -> Result<Arc<VirtualProximitySensor>, SensorError> {
    if !preference.maximum_range.is_finite() || preference.maximum_range <= 0.0 {
        return Err(SensorError::Unavailable(format!(
            "maximum range {} is not positive",
            preference.maximum_range
        )));
    }

    let sensor = VirtualProximitySensor::new(preference.maximum_range, preference.wakeup);
    log::debug!(
        "Using proximity sensor '{}' (range {})",
        sensor.name(),
        sensor.maximum_range()
    );
    Ok(Arc::new(sensor))
}
