/// Monotonic time source used to seed the gesture reference point
///
/// Implementations must share a timeline with the sensor's event timestamps.
pub trait Clock: Send + Sync {
    /// Nanoseconds on a monotonic timeline shared with sensor timestamps
    fn now_nanos(&self) -> i64;
}
