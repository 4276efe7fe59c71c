pub mod clock;
pub mod config;
pub mod gesture;
pub mod pulse;
pub mod sensor;
pub mod session;

pub use clock::Clock;
pub use gesture::{
    Gesture, GestureClassifier, GestureConfig, GestureSettings, ProximitySample,
    SharedGestureConfig, TriggerSignal,
};
pub use pulse::{LogPulse, PulseAction};
pub use sensor::{SensorListener, SensorSource, VirtualProximitySensor};
pub use session::{Pending, SensorSession};
