//! ## scenaria-telemetry::metrics
//! **Prometheus counters for scenario transitions**

use prometheus::{IntCounter, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub transitions: IntCounter,
    pub auto_resolutions: IntCounter,
    pub fallbacks: IntCounter,
    pub bonus_events: IntCounter,
    pub failed_transitions: IntCounter,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let transitions = counter(
            "scenaria_transitions_total",
            "Resolved scenario transitions",
        )?;
        let auto_resolutions = counter(
            "scenaria_auto_resolutions_total",
            "Transitions resolved by conditions rather than a user choice",
        )?;
        let fallbacks = counter(
            "scenaria_fallbacks_total",
            "Transitions that used a node fallback",
        )?;
        let bonus_events = counter(
            "scenaria_bonus_events_total",
            "Bonus events whose draw succeeded",
        )?;
        let failed_transitions = counter(
            "scenaria_failed_transitions_total",
            "Transitions that failed and left the store unchanged",
        )?;

        Ok(Self {
            registry,
            transitions,
            auto_resolutions,
            fallbacks,
            bonus_events,
            failed_transitions,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_counters() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.transitions.inc();
        metrics.transitions.inc();
        metrics.bonus_events.inc();

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("scenaria_transitions_total 2"), "{text}");
        assert!(text.contains("scenaria_bonus_events_total 1"), "{text}");
        assert!(text.contains("scenaria_fallbacks_total 0"), "{text}");
    }
}
