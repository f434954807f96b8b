//! Alarm state machine and evaluation loop.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;
use zmon_models::{AlarmEvent, AlarmKind, AlarmPriority, AlarmStatus, AlarmThreshold, VitalRecord};

use crate::error::AlarmError;
use crate::onset::{Direction, OnsetKey, OnsetTracker};
use crate::threshold::ThresholdResolver;

fn escalation_interval_ms(priority: AlarmPriority) -> u64 {
    match priority {
        AlarmPriority::High => 60_000,
        AlarmPriority::Medium => 120_000,
        AlarmPriority::Low => 300_000,
    }
}

/// Hard cap on audible silence duration regardless of requested length.
fn silence_cap_ms(priority: AlarmPriority) -> u64 {
    match priority {
        AlarmPriority::High => 120_000,
        AlarmPriority::Medium | AlarmPriority::Low => 600_000,
    }
}

pub struct AlarmEngine {
    thresholds: ThresholdResolver,
    onset: OnsetTracker,
    active: HashMap<String, AlarmEvent>,
    open_index: HashMap<OnsetKey, String>,
    last_escalation_ms: HashMap<String, u64>,
    silence_origin: HashMap<String, AlarmStatus>,
}

impl AlarmEngine {
    #[must_use]
    pub fn new(thresholds: ThresholdResolver) -> Self {
        Self {
            thresholds,
            onset: OnsetTracker::new(),
            active: HashMap::new(),
            open_index: HashMap::new(),
            last_escalation_ms: HashMap::new(),
            silence_origin: HashMap::new(),
        }
    }

    pub fn thresholds_mut(&mut self) -> &mut ThresholdResolver {
        &mut self.thresholds
    }

    #[must_use]
    pub fn get(&self, alarm_id: &str) -> Option<&AlarmEvent> {
        self.active.get(alarm_id)
    }

    #[must_use]
    pub fn active_alarms(&self) -> impl Iterator<Item = &AlarmEvent> {
        self.active.values()
    }

    /// Evaluates one vital record, returning every alarm-lifecycle
    /// transition it produces. Depends only on the record, the resolved
    /// threshold, and this engine's onset/alarm state for the record's
    /// (patient, metric, direction) key.
    pub fn evaluate(&mut self, record: &VitalRecord, now_ns: u64, now_wall_ms: u64) -> Vec<AlarmEvent> {
        let mut emitted = Vec::new();
        if record.patient_id.is_empty() || !record.quality.is_alarm_eligible() {
            return emitted;
        }
        let threshold = self.thresholds.resolve(&record.patient_id, &record.metric);
        if !threshold.enabled {
            return emitted;
        }
        let metric_key = record.metric.as_str().to_string();

        let onset_high = threshold.high + threshold.hysteresis;
        let offset_high = threshold.high - threshold.hysteresis;
        let high_key: OnsetKey = (record.patient_id.clone(), metric_key.clone(), Direction::High);
        if record.value > onset_high {
            self.raise_or_continue(
                high_key,
                &threshold,
                AlarmKind::high_for(&record.metric),
                threshold.high,
                record,
                now_ns,
                now_wall_ms,
                &mut emitted,
            );
        } else if record.value < offset_high {
            self.resolve_if_open(&high_key, &mut emitted);
        }

        let onset_low = threshold.low - threshold.hysteresis;
        let offset_low = threshold.low + threshold.hysteresis;
        let low_key: OnsetKey = (record.patient_id.clone(), metric_key, Direction::Low);
        if record.value < onset_low {
            self.raise_or_continue(
                low_key,
                &threshold,
                AlarmKind::low_for(&record.metric),
                threshold.low,
                record,
                now_ns,
                now_wall_ms,
                &mut emitted,
            );
        } else if record.value > offset_low {
            self.resolve_if_open(&low_key, &mut emitted);
        }

        emitted
    }

    #[allow(clippy::too_many_arguments)]
    fn raise_or_continue(
        &mut self,
        key: OnsetKey,
        threshold: &AlarmThreshold,
        kind: AlarmKind,
        threshold_value: f64,
        record: &VitalRecord,
        now_ns: u64,
        now_wall_ms: u64,
        emitted: &mut Vec<AlarmEvent>,
    ) {
        let onset_delay_ns = threshold.onset_delay_ms.saturating_mul(1_000_000);
        let elapsed = self.onset.observe(key.clone(), now_ns);
        if elapsed < onset_delay_ns {
            return;
        }
        if self.open_index.contains_key(&key) {
            return;
        }
        let event = AlarmEvent {
            id: Uuid::new_v4().to_string(),
            patient_id: record.patient_id.clone(),
            kind,
            priority: threshold.priority,
            status: AlarmStatus::Active,
            start_wall_time_ms: now_wall_ms,
            triggering_value: record.value,
            threshold_value,
            ack_user: None,
            ack_wall_time_ms: None,
            silence_expiry_wall_time_ms: None,
            escalation_level: 0,
            context: serde_json::json!({
                "metric": record.metric.as_str(),
                "onset_delay_ms": threshold.onset_delay_ms,
            }),
        };
        self.last_escalation_ms.insert(event.id.clone(), now_wall_ms);
        self.open_index.insert(key, event.id.clone());
        self.active.insert(event.id.clone(), event.clone());
        emitted.push(event);
    }

    fn resolve_if_open(&mut self, key: &OnsetKey, emitted: &mut Vec<AlarmEvent>) {
        self.onset.cancel(key);
        if let Some(id) = self.open_index.remove(key) {
            if let Some(alarm) = self.active.get_mut(&id) {
                alarm.status = AlarmStatus::Resolved;
                emitted.push(alarm.clone());
            }
            self.last_escalation_ms.remove(&id);
            self.silence_origin.remove(&id);
        }
    }

    pub fn acknowledge(
        &mut self,
        alarm_id: &str,
        user: &str,
        now_wall_ms: u64,
    ) -> Result<AlarmEvent, AlarmError> {
        let alarm = self
            .active
            .get_mut(alarm_id)
            .ok_or_else(|| AlarmError::NotFound(alarm_id.to_string()))?;
        if alarm.status.is_terminal() {
            return Err(AlarmError::AlreadyResolved(alarm_id.to_string()));
        }
        alarm.status = AlarmStatus::Acknowledged;
        alarm.ack_user = Some(user.to_string());
        alarm.ack_wall_time_ms = Some(now_wall_ms);
        Ok(alarm.clone())
    }

    /// Silences an alarm for `duration_ms`, capped per priority.
    pub fn silence(
        &mut self,
        alarm_id: &str,
        duration_ms: u64,
        now_wall_ms: u64,
    ) -> Result<AlarmEvent, AlarmError> {
        let (priority, prior_status) = {
            let alarm = self
                .active
                .get(alarm_id)
                .ok_or_else(|| AlarmError::NotFound(alarm_id.to_string()))?;
            if alarm.status.is_terminal() {
                return Err(AlarmError::AlreadyResolved(alarm_id.to_string()));
            }
            (alarm.priority, alarm.status)
        };
        if duration_ms == 0 {
            return Err(AlarmError::SilenceExpiryInPast);
        }
        let max_ms = silence_cap_ms(priority);
        if duration_ms > max_ms {
            return Err(AlarmError::SilenceDurationExceeded { requested_ms: duration_ms, max_ms });
        }
        let alarm = self.active.get_mut(alarm_id).expect("existence checked above");
        alarm.status = AlarmStatus::Silenced;
        alarm.silence_expiry_wall_time_ms = Some(now_wall_ms + duration_ms);
        self.silence_origin.insert(alarm_id.to_string(), prior_status);
        Ok(alarm.clone())
    }

    /// Reverts any expired silence to the alarm's prior state.
    pub fn expire_silences(&mut self, now_wall_ms: u64) -> Vec<AlarmEvent> {
        let mut emitted = Vec::new();
        let expired: Vec<String> = self
            .active
            .iter()
            .filter(|(_, a)| {
                a.status == AlarmStatus::Silenced
                    && a.silence_expiry_wall_time_ms.is_some_and(|t| t <= now_wall_ms)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            let prior = self.silence_origin.remove(&id).unwrap_or(AlarmStatus::Active);
            if let Some(alarm) = self.active.get_mut(&id) {
                alarm.status = prior;
                alarm.silence_expiry_wall_time_ms = None;
                emitted.push(alarm.clone());
            }
        }
        emitted
    }

    /// Ticks escalation timers for every `Active` alarm.
    pub fn check_escalations(&mut self, now_wall_ms: u64) -> Vec<AlarmEvent> {
        let mut emitted = Vec::new();
        let due: Vec<String> = self
            .active
            .iter()
            .filter(|(_, a)| a.status == AlarmStatus::Active)
            .filter_map(|(id, a)| {
                let last = *self.last_escalation_ms.get(id).unwrap_or(&a.start_wall_time_ms);
                let interval = escalation_interval_ms(a.priority);
                (now_wall_ms.saturating_sub(last) >= interval).then(|| id.clone())
            })
            .collect();
        for id in due {
            self.last_escalation_ms.insert(id.clone(), now_wall_ms);
            if let Some(alarm) = self.active.get_mut(&id) {
                alarm.escalation_level += 1;
                if alarm.escalation_level >= 2 {
                    warn!(alarm_id = %id, level = alarm.escalation_level, "alarm escalation due");
                }
                emitted.push(alarm.clone());
            }
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zmon_models::{MetricKind, Quality};

    fn record(patient: &str, value: f64, wall_ms: u64) -> VitalRecord {
        VitalRecord {
            monotonic_ns: wall_ms * 1_000_000,
            wall_time_ms: wall_ms,
            patient_id: patient.to_string(),
            metric: MetricKind::HeartRate,
            value,
            unit: "bpm".into(),
            quality: Quality::Good,
            sensor_origin: "ecg0".into(),
            device_id: "dev-1".into(),
        }
    }

    fn hr_threshold() -> AlarmThreshold {
        AlarmThreshold {
            metric: MetricKind::HeartRate,
            low: 60.0,
            high: 100.0,
            hysteresis: 2.0,
            onset_delay_ms: 2_000,
            enabled: true,
            priority: AlarmPriority::High,
        }
    }

    fn engine_with_hr_default() -> AlarmEngine {
        let mut resolver = ThresholdResolver::new();
        resolver.set_device_default(hr_threshold()).unwrap();
        AlarmEngine::new(resolver)
    }

    /// HR 90,95,103,104,105(t=4s),105,105(t=6s); alarm opens only once
    /// the onset delay elapses at t=6s.
    #[test]
    fn s1_alarm_onset_after_two_second_delay() {
        let mut engine = engine_with_hr_default();
        let samples = [
            (90.0, 0u64),
            (95.0, 1_000),
            (103.0, 2_000),
            (104.0, 3_000),
            (105.0, 4_000),
            (105.0, 5_000),
            (105.0, 6_000),
        ];
        let mut all_emitted = Vec::new();
        for (value, wall_ms) in samples {
            let events = engine.evaluate(&record("p1", value, wall_ms), wall_ms * 1_000_000, wall_ms);
            all_emitted.extend(events);
        }
        assert_eq!(all_emitted.len(), 1);
        let alarm = &all_emitted[0];
        assert_eq!(alarm.priority, AlarmPriority::High);
        assert_eq!(alarm.kind, AlarmKind::HrHigh);
        assert_eq!(alarm.triggering_value, 105.0);
        assert_eq!(alarm.threshold_value, 100.0);
    }

    #[test]
    fn exact_boundary_does_not_alarm() {
        let mut engine = engine_with_hr_default();
        // high(100) + hysteresis(2) = 102 exactly: not yet alarming.
        let events = engine.evaluate(&record("p1", 102.0, 0), 3_000_000_000, 0);
        assert!(events.is_empty());
        let events = engine.evaluate(&record("p1", 102.0, 3_000), 3_000_000_000, 3_000);
        assert!(events.is_empty());
    }

    #[test]
    fn epsilon_past_boundary_starts_onset_and_eventually_alarms() {
        let mut engine = engine_with_hr_default();
        let value = 102.0 + 1e-6;
        let e0 = engine.evaluate(&record("p1", value, 0), 0, 0);
        assert!(e0.is_empty());
        let e1 = engine.evaluate(&record("p1", value, 2_000), 2_000_000_000, 2_000);
        assert_eq!(e1.len(), 1);
    }

    #[test]
    fn acknowledge_then_silence_then_expiry_restores_acknowledged() {
        let mut engine = engine_with_hr_default();
        engine.evaluate(&record("p1", 105.0, 0), 0, 0);
        let events = engine.evaluate(&record("p1", 105.0, 2_000), 2_000_000_000, 2_000);
        let alarm_id = events[0].id.clone();

        let acked = engine.acknowledge(&alarm_id, "NURSE01", 2_500).unwrap();
        assert_eq!(acked.status, AlarmStatus::Acknowledged);

        let silenced = engine.silence(&alarm_id, 10_000, 3_000).unwrap();
        assert_eq!(silenced.status, AlarmStatus::Silenced);

        let restored = engine.expire_silences(13_001);
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].status, AlarmStatus::Acknowledged);
    }

    /// A silence request of 900s on a low priority alarm (policy max
    /// 600s) is rejected.
    #[test]
    fn s2_silence_over_policy_max_is_rejected() {
        let mut resolver = ThresholdResolver::new();
        resolver
            .set_device_default(AlarmThreshold {
                metric: MetricKind::RespirationRate,
                low: 8.0,
                high: 30.0,
                hysteresis: 1.0,
                onset_delay_ms: 2_000,
                enabled: true,
                priority: AlarmPriority::Low,
            })
            .unwrap();
        let mut engine = AlarmEngine::new(resolver);
        let rr = |v: f64, ms: u64| VitalRecord {
            monotonic_ns: ms * 1_000_000,
            wall_time_ms: ms,
            patient_id: "p1".to_string(),
            metric: MetricKind::RespirationRate,
            value: v,
            unit: "breaths/min".into(),
            quality: Quality::Good,
            sensor_origin: "resp0".into(),
            device_id: "dev-1".into(),
        };
        engine.evaluate(&rr(35.0, 0), 0, 0);
        let events = engine.evaluate(&rr(35.0, 2_000), 2_000_000_000, 2_000);
        let alarm_id = events[0].id.clone();

        let err = engine.silence(&alarm_id, 900_000, 2_500).unwrap_err();
        assert!(matches!(err, AlarmError::SilenceDurationExceeded { requested_ms: 900_000, max_ms: 600_000 }));
        assert_eq!(engine.get(&alarm_id).unwrap().status, AlarmStatus::Active);
    }

    #[test]
    fn re_entering_band_resolves_active_alarm() {
        let mut engine = engine_with_hr_default();
        engine.evaluate(&record("p1", 105.0, 0), 0, 0);
        let events = engine.evaluate(&record("p1", 105.0, 2_000), 2_000_000_000, 2_000);
        assert_eq!(events.len(), 1);
        // offset level = 100 - 2 = 98; value below that resolves.
        let events = engine.evaluate(&record("p1", 90.0, 3_000), 3_000_000_000, 3_000);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, AlarmStatus::Resolved);
    }

    proptest::proptest! {
        #[test]
        fn priority_never_decreases_across_a_single_alarm_lifetime(
            values in proptest::collection::vec(90.0f64..115.0, 1..30)
        ) {
            let mut engine = engine_with_hr_default();
            let mut seen_priority: Option<AlarmPriority> = None;
            for (i, value) in values.into_iter().enumerate() {
                let wall_ms = (i as u64) * 2_500;
                let events = engine.evaluate(&record("p1", value, wall_ms), wall_ms * 1_000_000, wall_ms);
                for event in events {
                    if let Some(prev) = seen_priority {
                        proptest::prop_assert!(event.priority >= prev);
                    }
                    seen_priority = Some(event.priority);
                    if event.status == AlarmStatus::Resolved {
                        seen_priority = None;
                    }
                }
            }
        }
    }
}
