use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::data::model::Sample;

// ---------------------------------------------------------------------------
// Edge policies
// ---------------------------------------------------------------------------

/// A change of breathing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Inhale,
    Exhale,
}

/// Decides when a new sample starts an inhale or an exhale, and what rate a
/// new inhale implies.
pub trait EdgePolicy: Send {
    fn transition(&self, prev: &Sample, latest: &Sample, inhaling: bool) -> Option<Transition>;

    /// Instantaneous breaths per minute for an inhale at `now`.
    ///
    /// `last_breath` is the time of the previous inhale and `breaths_before`
    /// the number of breaths counted before this one.
    fn rate_at(&self, last_breath: f64, now: f64, breaths_before: usize) -> Option<f64>;
}

/// Inhale starts at a tidal-volume trough, exhale at a peak.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeEdge;

impl EdgePolicy for VolumeEdge {
    fn transition(&self, prev: &Sample, latest: &Sample, inhaling: bool) -> Option<Transition> {
        if latest.volume >= prev.volume && !inhaling {
            Some(Transition::Inhale)
        } else if latest.volume < prev.volume && inhaling {
            Some(Transition::Exhale)
        } else {
            None
        }
    }

    /// Breaths so far over elapsed recording time.
    fn rate_at(&self, _last_breath: f64, now: f64, breaths_before: usize) -> Option<f64> {
        (now > 0.0).then(|| breaths_before as f64 / (now / 60.0))
    }
}

/// Inhale/exhale follow the sign of the flow, with a dead band of
/// `threshold` L/s around zero.
#[derive(Debug, Clone, Copy)]
pub struct FlowEdge {
    pub threshold: f64,
}

impl EdgePolicy for FlowEdge {
    fn transition(&self, _prev: &Sample, latest: &Sample, inhaling: bool) -> Option<Transition> {
        if latest.flow > self.threshold && !inhaling {
            Some(Transition::Inhale)
        } else if latest.flow < -self.threshold && inhaling {
            Some(Transition::Exhale)
        } else {
            None
        }
    }

    /// One breath per inhale-to-inhale interval.
    fn rate_at(&self, last_breath: f64, now: f64, _breaths_before: usize) -> Option<f64> {
        let interval = now - last_breath;
        (interval > 0.0).then(|| 60.0 / interval)
    }
}

/// Configurable choice of [`EdgePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorPolicy {
    #[default]
    Volume,
    Flow,
}

impl DetectorPolicy {
    pub const ALL: [DetectorPolicy; 2] = [DetectorPolicy::Volume, DetectorPolicy::Flow];

    pub fn label(self) -> &'static str {
        match self {
            DetectorPolicy::Volume => "Volume troughs",
            DetectorPolicy::Flow => "Flow reversals",
        }
    }

    pub fn build(self, flow_threshold: f64) -> Box<dyn EdgePolicy> {
        match self {
            DetectorPolicy::Volume => Box::new(VolumeEdge),
            DetectorPolicy::Flow => Box::new(FlowEdge {
                threshold: flow_threshold,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Counts breaths in a live sample stream and estimates breaths per minute.
///
/// Fed the newest visible sample every frame. The same sample usually shows up
/// for several frames in a row, so anything not newer than the last observed
/// sample is ignored.
pub struct BreathCycleDetector {
    policy: Box<dyn EdgePolicy>,
    history_len: usize,
    min_breaths: usize,

    prev: Option<Sample>,
    inhaling: bool,
    last_breath_time: Option<f64>,
    breath_count: usize,
    rate_history: VecDeque<f64>,
}

impl BreathCycleDetector {
    /// `history_len` bounds how many instantaneous rates are averaged;
    /// no rate is reported before `min_breaths` breaths were counted.
    pub fn new(policy: Box<dyn EdgePolicy>, history_len: usize, min_breaths: usize) -> Self {
        BreathCycleDetector {
            policy,
            history_len: history_len.max(1),
            min_breaths,
            prev: None,
            inhaling: false,
            last_breath_time: None,
            breath_count: 0,
            rate_history: VecDeque::new(),
        }
    }

    /// Swap the edge policy and start counting afresh.
    pub fn set_policy(&mut self, policy: Box<dyn EdgePolicy>) {
        self.policy = policy;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.prev = None;
        self.inhaling = false;
        self.last_breath_time = None;
        self.breath_count = 0;
        self.rate_history.clear();
    }

    pub fn is_inhaling(&self) -> bool {
        self.inhaling
    }

    pub fn breath_count(&self) -> usize {
        self.breath_count
    }

    /// Mean of the recent instantaneous rates, once enough breaths were seen.
    pub fn rate(&self) -> Option<f64> {
        if self.breath_count < self.min_breaths || self.rate_history.is_empty() {
            return None;
        }
        Some(self.rate_history.iter().sum::<f64>() / self.rate_history.len() as f64)
    }

    /// Feed the newest sample and return the current rate estimate.
    pub fn observe(&mut self, latest: &Sample) -> Option<f64> {
        if let Some(prev) = self.prev {
            if latest.time <= prev.time {
                return self.rate();
            }
        }
        // the first sample is compared against a zero baseline
        let prev = self.prev.unwrap_or(Sample {
            time: latest.time,
            ..Default::default()
        });

        match self.policy.transition(&prev, latest, self.inhaling) {
            Some(Transition::Inhale) => {
                self.inhaling = true;
                let rate = self
                    .last_breath_time
                    .and_then(|last| self.policy.rate_at(last, latest.time, self.breath_count));
                if let Some(rate) = rate {
                    self.rate_history.push_back(rate);
                    while self.rate_history.len() > self.history_len {
                        self.rate_history.pop_front();
                    }
                }
                self.last_breath_time = Some(latest.time);
                self.breath_count += 1;
            }
            Some(Transition::Exhale) => self.inhaling = false,
            None => {}
        }

        self.prev = Some(*latest);
        self.rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sawtooth volume: period 4 s, amplitude 1, sampled every 0.1 s.
    fn sawtooth(cycles: usize) -> Vec<Sample> {
        (0..cycles * 40)
            .map(|i| Sample {
                time: i as f64 * 0.1,
                volume: (i % 40) as f64 / 40.0,
                ..Default::default()
            })
            .collect()
    }

    fn volume_detector() -> BreathCycleDetector {
        BreathCycleDetector::new(Box::new(VolumeEdge), 10, 3)
    }

    fn run(detector: &mut BreathCycleDetector, samples: &[Sample]) -> Option<f64> {
        let mut rate = None;
        for s in samples {
            rate = detector.observe(s);
        }
        rate
    }

    #[test]
    fn sawtooth_volume_converges_to_fifteen() {
        let mut detector = volume_detector();
        let rate = run(&mut detector, &sawtooth(4)).expect("rate after 3 cycles");
        assert!((rate - 15.0).abs() < 0.5, "rate {rate}");

        let mut detector = volume_detector();
        let rate = run(&mut detector, &sawtooth(20)).unwrap();
        assert!((rate - 15.0).abs() < 0.1, "rate {rate}");
        assert_eq!(detector.breath_count(), 20);
    }

    #[test]
    fn suppresses_rate_until_enough_breaths() {
        let mut detector = volume_detector();
        assert_eq!(run(&mut detector, &sawtooth(2)), None);
    }

    #[test]
    fn repeated_samples_do_not_count_as_breaths() {
        let samples = sawtooth(6);
        let mut detector = volume_detector();
        for s in &samples {
            for _ in 0..5 {
                detector.observe(s);
            }
        }
        assert_eq!(detector.breath_count(), 6);
    }

    #[test]
    fn flat_stream_never_reports() {
        let mut detector = volume_detector();
        let flat: Vec<Sample> = (0..1000)
            .map(|i| Sample {
                time: i as f64 * 0.1,
                volume: 0.5,
                ..Default::default()
            })
            .collect();
        assert_eq!(run(&mut detector, &flat), None);
        assert_eq!(detector.breath_count(), 1);
    }

    #[test]
    fn flow_policy_tracks_sign_changes() {
        let samples: Vec<Sample> = (0..800)
            .map(|i| {
                let time = i as f64 * 0.1;
                Sample {
                    time,
                    flow: (2.0 * std::f64::consts::PI * time / 4.0).sin(),
                    ..Default::default()
                }
            })
            .collect();
        let mut detector = BreathCycleDetector::new(Box::new(FlowEdge { threshold: 0.05 }), 10, 3);
        let rate = run(&mut detector, &samples).unwrap();
        assert!((rate - 15.0).abs() < 0.2, "rate {rate}");
    }

    /// Flow sine whose rate switches after `switch_at` seconds, phase continuous.
    fn flow_rate_change(before_bpm: f64, after_bpm: f64, switch_at: f64, end: f64) -> Vec<Sample> {
        let dt = 0.05;
        let mut phase = 0.0_f64;
        (0..(end / dt) as usize)
            .map(|i| {
                let time = i as f64 * dt;
                let bpm = if time < switch_at { before_bpm } else { after_bpm };
                let s = Sample {
                    time,
                    flow: phase.sin(),
                    ..Default::default()
                };
                phase += 2.0 * std::f64::consts::PI * bpm / 60.0 * dt;
                s
            })
            .collect()
    }

    #[test]
    fn flow_policy_follows_a_rate_change() {
        let samples = flow_rate_change(10.0, 30.0, 120.0, 180.0);
        let (slow, fast) = samples.split_at(samples.iter().position(|s| s.time >= 120.0).unwrap());
        let mut detector = BreathCycleDetector::new(Box::new(FlowEdge { threshold: 0.05 }), 5, 3);

        let rate = run(&mut detector, slow).unwrap();
        assert!((rate - 10.0).abs() < 0.5, "rate {rate}");
        let rate = run(&mut detector, fast).unwrap();
        assert!((rate - 30.0).abs() < 2.0, "rate {rate}");
    }

    #[test]
    fn policies_use_their_own_rate_rule() {
        // third inhale at 30 s, previous one at 28 s
        assert_eq!(FlowEdge { threshold: 0.0 }.rate_at(28.0, 30.0, 2), Some(30.0));
        assert_eq!(VolumeEdge.rate_at(28.0, 30.0, 2), Some(4.0));
        assert_eq!(FlowEdge { threshold: 0.0 }.rate_at(30.0, 30.0, 2), None);
        assert_eq!(VolumeEdge.rate_at(0.0, 0.0, 0), None);
    }

    #[test]
    fn flow_dead_band_ignores_noise() {
        let mut detector = BreathCycleDetector::new(Box::new(FlowEdge { threshold: 0.1 }), 10, 3);
        for i in 0..100 {
            let flow = if i % 2 == 0 { 0.05 } else { -0.05 };
            detector.observe(&Sample {
                time: i as f64 * 0.1,
                flow,
                ..Default::default()
            });
        }
        assert_eq!(detector.breath_count(), 0);
    }

    #[test]
    fn reset_clears_state() {
        let mut detector = volume_detector();
        run(&mut detector, &sawtooth(5));
        detector.reset();
        assert_eq!(detector.breath_count(), 0);
        assert_eq!(detector.rate(), None);
        assert!(!detector.is_inhaling());
    }

    #[test]
    fn policy_names_parse_from_config() {
        let p: DetectorPolicy = serde_json::from_str("\"flow\"").unwrap();
        assert_eq!(p, DetectorPolicy::Flow);
    }
}
