/// Replay a recorded proximity trace through a live sensor session
use anyhow::{Context, Result};
use doze_core::{
    Clock, GestureSettings, LogPulse, PulseAction, SensorSession, SensorSource,
    SharedGestureConfig, TriggerSignal, VirtualProximitySensor,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tabled::{Table, Tabled};

const NANOS_PER_MILLI: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenState {
    On,
    Off,
}

/// One line of a trace file
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TraceEvent {
    Screen { screen: ScreenState },
    Proximity { proximity: f32, timestamp_ms: i64 },
    Accuracy { accuracy: i32 },
}

/// Parse a JSON-lines trace; blank lines and `#` comments are skipped
pub fn parse_trace(content: &str) -> Result<Vec<TraceEvent>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line.trim())
                .with_context(|| format!("Invalid trace event on line {}", index + 1))
        })
        .collect()
}

/// Clock that follows the trace timeline instead of wall time
#[derive(Default)]
struct TraceClock(AtomicI64);

impl TraceClock {
    fn advance_to(&self, timestamp_nanos: i64) {
        self.0.fetch_max(timestamp_nanos, Ordering::SeqCst);
    }
}

impl Clock for TraceClock {
    fn now_nanos(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub events: usize,
    pub dropped: usize,
    pub pulses: Vec<TriggerSignal>,
}

/// Drive `events` through a session built on `sensor`
///
/// Screen transitions are awaited so that readings land in the same order as
/// in the trace. Without a sensor, readings are counted as dropped.
pub async fn run_replay(
    events: &[TraceEvent],
    sensor: Option<Arc<VirtualProximitySensor>>,
    settings: Arc<dyn GestureSettings>,
) -> Result<ReplayReport> {
    let clock = Arc::new(TraceClock::default());
    let pulses: Arc<Mutex<Vec<TriggerSignal>>> = Arc::default();
    let sink = pulses.clone();
    let action = move |trigger: &TriggerSignal| {
        LogPulse.fire_pulse(trigger);
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*trigger);
    };

    let source = sensor.clone().map(|s| s as Arc<dyn SensorSource>);
    let session = SensorSession::new(source, settings, clock.clone(), Arc::new(action))?;

    let mut report = ReplayReport {
        events: events.len(),
        ..ReplayReport::default()
    };

    for event in events {
        match *event {
            TraceEvent::Screen {
                screen: ScreenState::Off,
            } => session.enable().wait().await,
            TraceEvent::Screen {
                screen: ScreenState::On,
            } => session.disable().wait().await,
            TraceEvent::Proximity {
                proximity,
                timestamp_ms,
            } => {
                let timestamp_nanos = timestamp_ms.saturating_mul(NANOS_PER_MILLI);
                clock.advance_to(timestamp_nanos);
                match &sensor {
                    Some(sensor) if session.is_subscribed() => {
                        sensor.deliver(proximity, timestamp_nanos);
                    }
                    _ => {
                        log::debug!(
                            "Screen is on or no sensor, dropping reading at {timestamp_ms}ms"
                        );
                        report.dropped += 1;
                    }
                }
            }
            TraceEvent::Accuracy { accuracy } => {
                if let Some(sensor) = &sensor {
                    sensor.deliver_accuracy(accuracy);
                }
            }
        }
    }

    session.shutdown().await;
    report.pulses = std::mem::take(&mut *pulses.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(report)
}

#[derive(Tabled)]
struct PulseRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Gesture")]
    gesture: String,
    #[tabled(rename = "Cover (ms)")]
    cover_ms: i64,
    #[tabled(rename = "At (ms)")]
    at_ms: i64,
}

pub async fn handle_replay(
    trace: &Path,
    settings: Arc<SharedGestureConfig>,
    sensor: Option<Arc<VirtualProximitySensor>>,
) -> Result<()> {
    let content = std::fs::read_to_string(trace)
        .with_context(|| format!("Failed to read trace {}", trace.display()))?;
    let events = parse_trace(&content)?;

    let config = settings.snapshot();
    if !config.any_enabled() {
        log::warn!("Both gestures are disabled, no pulse can fire");
    }
    log::info!(
        "Replaying {} events (handwave: {}, pocket: {})",
        events.len(),
        config.handwave_enabled,
        config.pocket_enabled
    );

    let report = run_replay(&events, sensor, settings).await?;

    if report.pulses.is_empty() {
        println!("No pulses fired.");
    } else {
        let rows: Vec<PulseRow> = report
            .pulses
            .iter()
            .enumerate()
            .map(|(i, trigger)| PulseRow {
                index: i + 1,
                gesture: trigger.gesture.to_string(),
                cover_ms: trigger.delta_ms,
                at_ms: trigger.timestamp_nanos / NANOS_PER_MILLI,
            })
            .collect();
        println!("{}", Table::new(rows));
    }
    println!(
        "\n{} events, {} pulses, {} readings dropped",
        report.events,
        report.pulses.len(),
        report.dropped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use doze_core::{Gesture, GestureConfig};

    const TRACE: &str = r#"
# screen goes off, quick wave, then a pocket pull
{"screen":"off"}
{"proximity":5.0,"timestamp_ms":0}
{"proximity":0.0,"timestamp_ms":100}
{"proximity":5.0,"timestamp_ms":400}
{"accuracy":3}
{"proximity":0.0,"timestamp_ms":1000}
{"proximity":5.0,"timestamp_ms":4500}
{"screen":"on"}
{"proximity":0.0,"timestamp_ms":5000}
{"proximity":5.0,"timestamp_ms":5200}
"#;

    fn sensor() -> Option<Arc<VirtualProximitySensor>> {
        Some(Arc::new(VirtualProximitySensor::new(5.0, true)))
    }

    #[test]
    fn test_parse_trace() {
        let events = parse_trace(TRACE).unwrap();
        assert_eq!(events.len(), 10);
        assert_eq!(
            events[0],
            TraceEvent::Screen {
                screen: ScreenState::Off
            }
        );
        assert_eq!(events[4], TraceEvent::Accuracy { accuracy: 3 });
        assert!(matches!(
            events[2],
            TraceEvent::Proximity {
                timestamp_ms: 100,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_trace_reports_line() {
        let err = parse_trace("{\"screen\":\"off\"}\n{\"screen\":\"dim\"}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_replay_both_gestures() {
        let events = parse_trace(TRACE).unwrap();
        let settings = Arc::new(GestureConfig::new(true, true));
        let report = run_replay(&events, sensor(), settings).await.unwrap();

        let gestures: Vec<Gesture> = report.pulses.iter().map(|t| t.gesture).collect();
        assert_eq!(gestures, vec![Gesture::Handwave, Gesture::Pocket]);
        assert_eq!(report.pulses[0].delta_ms, 300);
        assert_eq!(report.pulses[1].delta_ms, 3500);
        assert_eq!(report.dropped, 2);
    }

    #[tokio::test]
    async fn test_replay_respects_settings() {
        let events = parse_trace(TRACE).unwrap();
        let settings = Arc::new(GestureConfig::new(false, true));
        let report = run_replay(&events, sensor(), settings).await.unwrap();
        assert_eq!(report.pulses.len(), 1);
        assert_eq!(report.pulses[0].gesture, Gesture::Pocket);
    }

    #[tokio::test]
    async fn test_replay_without_sensor() {
        let events = parse_trace(TRACE).unwrap();
        let settings = Arc::new(GestureConfig::new(true, true));
        let report = run_replay(&events, None, settings).await.unwrap();
        assert!(report.pulses.is_empty());
        assert_eq!(report.dropped, 7);
    }

    #[tokio::test]
    async fn test_screen_off_seeds_trace_time() {
        let events = parse_trace(
            r#"
{"proximity":0.0,"timestamp_ms":100}
{"screen":"off"}
{"proximity":0.0,"timestamp_ms":2000}
{"proximity":5.0,"timestamp_ms":2300}
"#,
        )
        .unwrap();
        let settings = Arc::new(GestureConfig::new(true, false));
        let report = run_replay(&events, sensor(), settings).await.unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(report.pulses.len(), 1);
        assert_eq!(report.pulses[0].delta_ms, 300);
    }
}
