//! Per-interaction state: current state index, per-policy counters, the
//! cached resolved IP, activity-period and timeout gating. One
//! [`InteractionData`] exists per kernel-queue interaction; its mutable
//! fields are serialized by a single mutex (spec.md §5).

use std::net::IpAddr;
use std::sync::Mutex;

use chrono::{Datelike, NaiveDateTime};

/// One field of a cron-like spec: either a fixed value or the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronField {
    Any,
    Value(u32),
}

impl CronField {
    fn parse(token: &str) -> Self {
        match token.trim().parse::<u32>() {
            Ok(v) => Self::Value(v),
            Err(_) => Self::Any,
        }
    }
}

/// A four-field cron-like spec: minute, hour, day-of-month, day-of-week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronSpec {
    pub minute: CronField,
    pub hour: CronField,
    pub day_of_month: CronField,
    pub day_of_week: CronField,
}

impl CronSpec {
    pub fn parse(s: &str) -> Self {
        let mut fields = s.split_whitespace();
        let minute = fields.next().map(CronField::parse).unwrap_or(CronField::Any);
        let hour = fields.next().map(CronField::parse).unwrap_or(CronField::Any);
        let day_of_month = fields.next().map(CronField::parse).unwrap_or(CronField::Any);
        let day_of_week = fields.next().map(CronField::parse).unwrap_or(CronField::Any);
        Self { minute, hour, day_of_month, day_of_week }
    }

    fn day_matches(&self, date: chrono::NaiveDate) -> bool {
        let dom_ok = match self.day_of_month {
            CronField::Any => true,
            CronField::Value(d) => date.day() == d,
        };
        let dow_ok = match self.day_of_week {
            CronField::Any => true,
            CronField::Value(d) => date.weekday().num_days_from_sunday() == d,
        };
        dom_ok && dow_ok
    }

    /// Explicit backward search for the latest trigger time ≤ `now`
    /// satisfying this start spec. Wildcard minute/hour fields resolve to
    /// their maxima (59/23) on the qualifying day, per spec.
    fn previous_trigger(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        for days_back in 0..=366i64 {
            let candidate_date = today - chrono::Duration::days(days_back);
            if !self.day_matches(candidate_date) {
                continue;
            }
            let hour = match self.hour {
                CronField::Value(h) => h,
                CronField::Any => 23,
            };
            let minute = match self.minute {
                CronField::Value(m) => m,
                CronField::Any => 59,
            };
            if let Some(candidate) = candidate_date.and_hms_opt(hour, minute, 0) {
                if candidate <= now {
                    return candidate;
                }
            }
        }
        now
    }

    /// Interprets this spec as a duration: minute and hour contribute their
    /// value in seconds (wildcard ⇒ 0); day fields do not apply to a
    /// duration and are ignored.
    fn as_duration_seconds(&self) -> i64 {
        let minutes = match self.minute {
            CronField::Value(m) => m as i64,
            CronField::Any => 0,
        };
        let hours = match self.hour {
            CronField::Value(h) => h as i64,
            CronField::Any => 0,
        };
        minutes * 60 + hours * 3600
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActivityPeriod {
    pub start: CronSpec,
    pub duration: CronSpec,
}

impl ActivityPeriod {
    pub fn new(start: &str, duration: &str) -> Self {
        Self { start: CronSpec::parse(start), duration: CronSpec::parse(duration) }
    }

    /// True iff `now` falls in `[start, start + duration)` for the most
    /// recent qualifying start time at or before `now`.
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        let trigger = self.start.previous_trigger(now);
        let duration = chrono::Duration::seconds(self.duration.as_duration_seconds());
        now >= trigger && now < trigger + duration
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Counter {
    pub initialized: bool,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub packet_count: Counter,
    pub duration_micros: Counter,
}

impl Counters {
    /// Records a policy match: increments packet-count and, if this is the
    /// first match in the current state, initializes the duration clock.
    pub fn record_match(&mut self, now_micros: u64) {
        self.packet_count.value += 1;
        self.packet_count.initialized = true;
        if !self.duration_micros.initialized {
            self.duration_micros.value = now_micros;
            self.duration_micros.initialized = true;
        }
    }

    pub fn reset(&mut self) {
        *self = Counters::default();
    }
}

/// Default timeout in seconds when a threshold of `0` is configured.
pub const DEFAULT_TIMEOUT_SECS: i64 = 3600;

/// `threshold == 0` uses [`DEFAULT_TIMEOUT_SECS`]; `threshold < 0` disables
/// the gate; otherwise timed-out iff `now - last_request > threshold`.
pub fn is_timed_out(threshold_secs: i64, last_request: Option<u64>, now_secs: u64) -> bool {
    if threshold_secs < 0 {
        return false;
    }
    let threshold = if threshold_secs == 0 { DEFAULT_TIMEOUT_SECS } else { threshold_secs };
    match last_request {
        None => false,
        Some(last) => (now_secs.saturating_sub(last) as i64) > threshold,
    }
}

struct InteractionInner {
    current_state: usize,
    counters: Vec<Counters>,
    cached_ip: Option<IpAddr>,
    timeout_secs: i64,
    last_request: Option<u64>,
    activity_period: Option<ActivityPeriod>,
    in_loop: bool,
}

/// Shared, mutex-guarded state for one queued interaction.
pub struct InteractionData {
    pub queue_id_base: u16,
    pub number_of_policies: usize,
    pub number_of_states: usize,
    inner: Mutex<InteractionInner>,
}

impl InteractionData {
    pub fn new(queue_id_base: u16, number_of_policies: usize, number_of_states: usize, timeout_secs: i64) -> Self {
        Self {
            queue_id_base,
            number_of_policies,
            number_of_states,
            inner: Mutex::new(InteractionInner {
                current_state: 0,
                counters: vec![Counters::default(); number_of_policies],
                cached_ip: None,
                timeout_secs,
                last_request: None,
                activity_period: None,
                in_loop: false,
            }),
        }
    }

    pub fn set_activity_period(&self, period: Option<ActivityPeriod>) {
        self.inner.lock().expect("interaction mutex poisoned").activity_period = period;
    }

    pub fn current_state(&self) -> usize {
        self.inner.lock().expect("interaction mutex poisoned").current_state
    }

    pub fn set_state(&self, state: usize) {
        assert!(state < self.number_of_states, "state index out of range");
        self.inner.lock().expect("interaction mutex poisoned").current_state = state;
    }

    pub fn cached_ip(&self) -> Option<IpAddr> {
        self.inner.lock().expect("interaction mutex poisoned").cached_ip
    }

    pub fn set_cached_ip(&self, ip: IpAddr) {
        self.inner.lock().expect("interaction mutex poisoned").cached_ip = Some(ip);
    }

    pub fn record_match(&self, policy_index: usize, now_micros: u64) {
        let mut inner = self.inner.lock().expect("interaction mutex poisoned");
        inner.counters[policy_index].record_match(now_micros);
    }

    pub fn counters(&self, policy_index: usize) -> Counters {
        self.inner.lock().expect("interaction mutex poisoned").counters[policy_index]
    }

    pub fn touch_last_request(&self, now_secs: u64) {
        self.inner.lock().expect("interaction mutex poisoned").last_request = Some(now_secs);
    }

    pub fn is_timed_out(&self, now_secs: u64) -> bool {
        let inner = self.inner.lock().expect("interaction mutex poisoned");
        is_timed_out(inner.timeout_secs, inner.last_request, now_secs)
    }

    pub fn is_in_activity_period(&self, now: NaiveDateTime) -> bool {
        let inner = self.inner.lock().expect("interaction mutex poisoned");
        match &inner.activity_period {
            Some(period) => period.is_active(now),
            None => true,
        }
    }

    pub fn set_in_loop(&self, in_loop: bool) {
        self.inner.lock().expect("interaction mutex poisoned").in_loop = in_loop;
    }

    pub fn in_loop(&self) -> bool {
        self.inner.lock().expect("interaction mutex poisoned").in_loop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(hour: u32, minute: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap().and_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn activity_period_in_window() {
        let period = ActivityPeriod::new("0 9 * *", "0 1 * *");
        assert!(period.is_active(dt(9, 30)));
    }

    #[test]
    fn activity_period_outside_window() {
        let period = ActivityPeriod::new("0 9 * *", "0 1 * *");
        assert!(!period.is_active(dt(10, 30)));
    }

    #[test]
    fn timeout_zero_uses_default() {
        assert!(!is_timed_out(0, Some(0), 3000));
        assert!(is_timed_out(0, Some(0), 3601));
    }

    #[test]
    fn timeout_negative_disables_gate() {
        assert!(!is_timed_out(-1, Some(0), 1_000_000));
    }

    #[test]
    fn timeout_no_prior_request_never_times_out() {
        assert!(!is_timed_out(60, None, 1_000_000));
    }

    #[test]
    fn counters_record_match_initializes_duration_once() {
        let mut counters = Counters::default();
        counters.record_match(1000);
        counters.record_match(2000);
        assert_eq!(counters.packet_count.value, 2);
        assert_eq!(counters.duration_micros.value, 1000);
    }

    #[test]
    fn interaction_state_defaults_to_zero_and_is_bounds_checked() {
        let data = InteractionData::new(100, 2, 3, 0);
        assert_eq!(data.current_state(), 0);
        data.set_state(2);
        assert_eq!(data.current_state(), 2);
    }

    #[test]
    #[should_panic]
    fn interaction_state_out_of_range_panics() {
        let data = InteractionData::new(100, 2, 3, 0);
        data.set_state(3);
    }
}
