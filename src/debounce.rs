//! Debounce gates for per-frame pose conditions
//!
//! Pose detections repeat on every frame while the user holds a pose. These
//! gates turn that stream of booleans into logical events:
//!
//! - [`EdgeGate`] fires once per contiguous run of `true` samples and re-arms
//!   only after a `false` sample.
//! - [`CooldownGate`] fires whenever the condition holds and at least the
//!   cooldown period has elapsed since its last fire, without needing a
//!   release in between.
//!
//! Time is supplied by the caller as an offset from session start so the
//! gates are deterministic under test.

use std::time::Duration;

/// Last-fired timestamp plus a minimum period between fires
#[derive(Debug, Clone)]
pub struct CooldownTimer {
    period: Duration,
    last_fired: Option<Duration>,
}

impl CooldownTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_fired: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn last_fired(&self) -> Option<Duration> {
        self.last_fired
    }

    /// Whether at least `period` has elapsed since the last fire
    ///
    /// A timer that has never fired is always ready.
    pub fn ready(&self, now: Duration) -> bool {
        match self.last_fired {
            Some(last) => now.saturating_sub(last) >= self.period,
            None => true,
        }
    }

    /// Record a fire at `now`
    pub fn mark(&mut self, now: Duration) {
        self.last_fired = Some(now);
    }

    /// Fire if ready, recording the fire
    pub fn try_fire(&mut self, now: Duration) -> bool {
        if self.ready(now) {
            self.mark(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

/// Rising-edge detector
#[derive(Debug, Clone, Default)]
pub struct EdgeGate {
    latched: bool,
}

impl EdgeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample; returns `true` only on a false→true transition
    pub fn update(&mut self, condition: bool) -> bool {
        let fire = condition && !self.latched;
        self.latched = condition;
        fire
    }

    /// Whether the gate is holding after a fire, waiting for a `false`
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub fn reset(&mut self) {
        self.latched = false;
    }
}

/// Held-repeat gate limited by a cooldown period
#[derive(Debug, Clone)]
pub struct CooldownGate {
    timer: CooldownTimer,
}

impl CooldownGate {
    pub fn new(period: Duration) -> Self {
        Self {
            timer: CooldownTimer::new(period),
        }
    }

    /// Feed one sample at `now`; returns `true` when the guarded action fires
    pub fn update(&mut self, condition: bool, now: Duration) -> bool {
        condition && self.timer.try_fire(now)
    }

    pub fn timer(&self) -> &CooldownTimer {
        &self.timer
    }

    pub fn reset(&mut self) {
        self.timer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_edge_gate_fires_once_per_run() {
        for run_length in [1, 2, 10, 500] {
            let mut gate = EdgeGate::new();
            let fires = (0..run_length).filter(|_| gate.update(true)).count();
            assert_eq!(fires, 1, "run of {} frames", run_length);
        }
    }

    #[test]
    fn test_edge_gate_rearms_after_false() {
        let mut gate = EdgeGate::new();
        let samples = [true, true, false, true, true, true, false, false, true];
        let fires: Vec<bool> = samples.iter().map(|&s| gate.update(s)).collect();
        assert_eq!(
            fires,
            vec![true, false, false, true, false, false, false, false, true]
        );
    }

    #[test]
    fn test_edge_gate_latch_state() {
        let mut gate = EdgeGate::new();
        assert!(!gate.is_latched());
        gate.update(true);
        assert!(gate.is_latched());
        gate.reset();
        assert!(gate.update(true));
    }

    #[test]
    fn test_cooldown_gate_never_fires_twice_within_period() {
        let mut gate = CooldownGate::new(Duration::from_secs(2));
        let fire_times: Vec<u64> = (0..=6000)
            .step_by(33)
            .filter(|&t| gate.update(true, ms(t)))
            .collect();
        for pair in fire_times.windows(2) {
            assert!(pair[1] - pair[0] >= 2000, "fired at {:?}", pair);
        }
        assert_eq!(fire_times.first(), Some(&0));
        assert_eq!(fire_times.len(), 3);
    }

    #[test]
    fn test_cooldown_gate_fires_when_period_elapses() {
        let mut gate = CooldownGate::new(Duration::from_secs(2));
        assert!(gate.update(true, ms(1000)));
        assert!(!gate.update(true, ms(2999)));
        assert!(gate.update(true, ms(3000)));
    }

    #[test]
    fn test_cooldown_gate_ignores_false() {
        let mut gate = CooldownGate::new(Duration::from_secs(2));
        assert!(!gate.update(false, ms(0)));
        assert!(gate.timer().last_fired().is_none());
        assert!(gate.update(true, ms(10)));
        assert_eq!(gate.timer().last_fired(), Some(ms(10)));
    }

    #[test]
    fn test_shared_timer_mark_delays_fire() {
        let mut timer = CooldownTimer::new(Duration::from_secs(2));
        assert!(timer.ready(ms(0)));
        timer.mark(ms(500));
        assert!(!timer.try_fire(ms(2000)));
        assert!(timer.try_fire(ms(2500)));
        timer.reset();
        assert!(timer.ready(ms(2501)));
    }
}
