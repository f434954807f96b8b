//! Threshold resolution: patient-specific -> device default -> hard-coded
//! physiological range.

use std::collections::HashMap;

use zmon_models::{AlarmPriority, AlarmThreshold, MetricKind};

use crate::error::AlarmError;

#[derive(Default)]
pub struct ThresholdResolver {
    patient_overrides: HashMap<(String, String), AlarmThreshold>,
    device_defaults: HashMap<String, AlarmThreshold>,
}

impl ThresholdResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_patient_threshold(
        &mut self,
        patient_id: &str,
        threshold: AlarmThreshold,
    ) -> Result<(), AlarmError> {
        validate_range(&threshold)?;
        self.patient_overrides
            .insert((patient_id.to_string(), threshold.metric.as_str().to_string()), threshold);
        Ok(())
    }

    pub fn set_device_default(&mut self, threshold: AlarmThreshold) -> Result<(), AlarmError> {
        validate_range(&threshold)?;
        self.device_defaults.insert(threshold.metric.as_str().to_string(), threshold);
        Ok(())
    }

    #[must_use]
    pub fn resolve(&self, patient_id: &str, metric: &MetricKind) -> AlarmThreshold {
        let metric_key = metric.as_str();
        if let Some(t) = self.patient_overrides.get(&(patient_id.to_string(), metric_key.to_string()))
        {
            return t.clone();
        }
        if let Some(t) = self.device_defaults.get(metric_key) {
            return t.clone();
        }
        hardcoded_range(metric)
    }
}

fn validate_range(threshold: &AlarmThreshold) -> Result<(), AlarmError> {
    if threshold.low >= threshold.high {
        return Err(AlarmError::ThresholdOutOfRange {
            metric: threshold.metric.as_str().to_string(),
            low: threshold.low,
            high: threshold.high,
        });
    }
    Ok(())
}

/// Hard-coded adult physiological ranges, the last fallback in resolution
/// order. Unrecognized metrics have no known range and resolve disabled.
fn hardcoded_range(metric: &MetricKind) -> AlarmThreshold {
    let (low, high, hysteresis, priority) = match metric {
        MetricKind::HeartRate => (50.0, 120.0, 2.0, AlarmPriority::High),
        MetricKind::OxygenSaturation => (90.0, 100.0, 1.0, AlarmPriority::High),
        MetricKind::RespirationRate => (8.0, 30.0, 1.0, AlarmPriority::Medium),
        MetricKind::PerfusionIndex => (0.3, 20.0, 0.1, AlarmPriority::Low),
        MetricKind::Other(_) => {
            return AlarmThreshold {
                metric: metric.clone(),
                low: f64::MIN,
                high: f64::MAX,
                hysteresis: 0.0,
                onset_delay_ms: AlarmThreshold::default_onset_delay_ms(),
                enabled: false,
                priority: AlarmPriority::Low,
            };
        }
    };
    AlarmThreshold {
        metric: metric.clone(),
        low,
        high,
        hysteresis,
        onset_delay_ms: AlarmThreshold::default_onset_delay_ms(),
        enabled: true,
        priority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_override_wins_over_device_default() {
        let mut resolver = ThresholdResolver::new();
        resolver
            .set_device_default(AlarmThreshold {
                metric: MetricKind::HeartRate,
                low: 55.0,
                high: 110.0,
                hysteresis: 2.0,
                onset_delay_ms: 2_000,
                enabled: true,
                priority: AlarmPriority::High,
            })
            .unwrap();
        resolver
            .set_patient_threshold(
                "p1",
                AlarmThreshold {
                    metric: MetricKind::HeartRate,
                    low: 60.0,
                    high: 100.0,
                    hysteresis: 2.0,
                    onset_delay_ms: 2_000,
                    enabled: true,
                    priority: AlarmPriority::High,
                },
            )
            .unwrap();
        let resolved = resolver.resolve("p1", &MetricKind::HeartRate);
        assert_eq!(resolved.high, 100.0);
        let fallback = resolver.resolve("p2", &MetricKind::HeartRate);
        assert_eq!(fallback.high, 110.0);
    }

    #[test]
    fn unresolved_metric_falls_back_to_hardcoded_range() {
        let resolver = ThresholdResolver::new();
        let resolved = resolver.resolve("p1", &MetricKind::OxygenSaturation);
        assert_eq!(resolved.low, 90.0);
        assert!(resolved.enabled);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut resolver = ThresholdResolver::new();
        let err = resolver
            .set_patient_threshold(
                "p1",
                AlarmThreshold {
                    metric: MetricKind::HeartRate,
                    low: 100.0,
                    high: 90.0,
                    hysteresis: 1.0,
                    onset_delay_ms: 2_000,
                    enabled: true,
                    priority: AlarmPriority::High,
                },
            )
            .unwrap_err();
        assert!(matches!(err, AlarmError::ThresholdOutOfRange { .. }));
    }
}
