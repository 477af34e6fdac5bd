//! Per-session delay buffer.
//!
//! Accepted samples are held back by up to [`WINDOW_CAPACITY`] positions
//! before they are committed. While a sample sits in the window, the
//! pass-through rule can still judge it against both of its neighbours and
//! evict it retroactively: a spike that looked plausible against the previous
//! fix alone never reaches the sink.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::chain::{ChainOutcome, RuleChain};
use super::rule::{Evaluation, HeuristicRule, RuleKind};
use super::FilterError;
use crate::config::TrackingProfile;
use crate::sample::LocationSample;
use crate::store::StorageError;

/// Maximum number of samples held back before emission.
pub const WINDOW_CAPACITY: usize = 2;

/// Default pass-through threshold (m/s).
pub const DEFAULT_PASS_THROUGH_SPEED_MPS: f64 = 50.0;

/// Receiver of committed samples.
///
/// Called outside the window lock, once per committed sample and in
/// commit order for a single producer.
pub trait SampleSink: Send + Sync {
    fn on_accepted(&self, session_id: &str, sample: &LocationSample) -> Result<(), StorageError>;
}

/// Sink that records everything it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<(String, LocationSample)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.received.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.lock().is_empty()
    }

    /// Received samples in arrival order.
    pub fn samples(&self) -> Vec<LocationSample> {
        self.received
            .lock()
            .iter()
            .map(|(_, sample)| sample.clone())
            .collect()
    }

    /// Received (session id, sample) pairs in arrival order.
    pub fn received(&self) -> Vec<(String, LocationSample)> {
        self.received.lock().clone()
    }
}

impl SampleSink for RecordingSink {
    fn on_accepted(&self, session_id: &str, sample: &LocationSample) -> Result<(), StorageError> {
        self.received
            .lock()
            .push((session_id.to_string(), sample.clone()));
        Ok(())
    }
}

/// What happened to a sample handed to [`FilterWindow::add_sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Filtering is disabled; the sample was committed immediately.
    Bypassed,
    /// The named rule flagged the sample; it was dropped.
    Rejected(RuleKind),
    /// The sample was buffered and nothing was committed.
    Buffered { evicted: bool },
    /// The sample was buffered and the oldest buffered sample was committed.
    Committed { evicted: bool },
}

impl Admission {
    /// Whether the sample itself was accepted (buffered or committed).
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Admission::Rejected(_))
    }

    /// Whether a previously buffered sample was evicted by the pass-through rule.
    pub fn evicted(&self) -> bool {
        matches!(
            self,
            Admission::Buffered { evicted: true } | Admission::Committed { evicted: true }
        )
    }
}

struct WindowState {
    pending: VecDeque<LocationSample>,
    chain: RuleChain,
    pass_through: HeuristicRule,
    enabled: bool,
}

/// Delay buffer running the outlier filter for one session.
///
/// All state sits behind one lock; the sink is called after it is released.
pub struct FilterWindow {
    session_id: String,
    state: Mutex<WindowState>,
    sink: Arc<dyn SampleSink>,
}

impl FilterWindow {
    /// Create an enabled window with the default pass-through threshold.
    pub fn new(session_id: impl Into<String>, chain: RuleChain, sink: Arc<dyn SampleSink>) -> Self {
        Self {
            session_id: session_id.into(),
            state: Mutex::new(WindowState {
                pending: VecDeque::with_capacity(WINDOW_CAPACITY + 1),
                chain,
                pass_through: HeuristicRule::PassThroughSpeed {
                    threshold: DEFAULT_PASS_THROUGH_SPEED_MPS,
                },
                enabled: true,
            }),
            sink,
        }
    }

    /// Create a window configured from a tracking profile.
    pub fn from_profile(
        session_id: impl Into<String>,
        profile: &TrackingProfile,
        sink: Arc<dyn SampleSink>,
    ) -> Self {
        Self::new(session_id, RuleChain::from_profile(profile), sink)
            .with_pass_through_threshold(profile.pass_through_speed_mps)
            .with_enabled(profile.outlier_removal_enabled)
    }

    pub fn with_pass_through_threshold(self, threshold: f64) -> Self {
        self.set_pass_through_threshold(threshold);
        self
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.set_enabled(enabled);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Feed one sample through the filter.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if committing a sample failed. The window
    /// state is not rolled back: the committed sample has left the buffer.
    pub fn add_sample(&self, sample: LocationSample) -> Result<Admission, StorageError> {
        let (admission, committed) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            if !state.enabled {
                (Admission::Bypassed, Some(sample))
            } else {
                let outcome = match state.pending.back() {
                    Some(previous) => state.chain.evaluate(&Evaluation::Pair {
                        current: &sample,
                        previous,
                    }),
                    None => state.chain.evaluate(&Evaluation::Single(&sample)),
                };

                if let ChainOutcome::Rejected(kind) = outcome {
                    debug!(
                        session = %self.session_id,
                        rule = %kind,
                        sample = %sample,
                        "Sample rejected"
                    );
                    return Ok(Admission::Rejected(kind));
                }

                let evicted = Self::evict_pass_through(
                    &self.session_id,
                    &mut state.pending,
                    &state.pass_through,
                    &sample,
                );

                state.pending.push_back(sample);
                let committed = if state.pending.len() > WINDOW_CAPACITY {
                    state.pending.pop_front()
                } else {
                    None
                };

                let admission = if committed.is_some() {
                    Admission::Committed { evicted }
                } else {
                    Admission::Buffered { evicted }
                };
                (admission, committed)
            }
        };

        if let Some(sample) = committed {
            self.sink.on_accepted(&self.session_id, &sample)?;
        }

        Ok(admission)
    }

    /// Drop the newest buffered sample if the path through it is too fast.
    fn evict_pass_through(
        session_id: &str,
        pending: &mut VecDeque<LocationSample>,
        pass_through: &HeuristicRule,
        incoming: &LocationSample,
    ) -> bool {
        if pending.len() < WINDOW_CAPACITY {
            return false;
        }

        let (Some(earlier), Some(previous)) = (pending.front(), pending.back()) else {
            return false;
        };

        let fires = pass_through
            .is_outlier(&Evaluation::Triple {
                current: incoming,
                previous,
                earlier,
            })
            .unwrap_or(false);

        if fires {
            if let Some(evicted) = pending.pop_back() {
                debug!(
                    session = %session_id,
                    sample = %evicted,
                    "Buffered sample evicted by pass-through check"
                );
            }
        }

        fires
    }

    /// Discard all buffered samples without committing them.
    ///
    /// Returns how many were discarded.
    pub fn clear_queue(&self) -> usize {
        let mut state = self.state.lock();
        let discarded = state.pending.len();
        state.pending.clear();
        if discarded > 0 {
            trace!(session = %self.session_id, discarded, "Window cleared");
        }
        discarded
    }

    /// Commit all buffered samples, oldest first.
    ///
    /// # Errors
    ///
    /// Stops at the first sink failure. Samples after the failing one are lost.
    pub fn flush(&self) -> Result<usize, StorageError> {
        let drained: Vec<LocationSample> = self.state.lock().pending.drain(..).collect();

        for sample in &drained {
            self.sink.on_accepted(&self.session_id, sample)?;
        }

        Ok(drained.len())
    }

    /// Number of buffered samples.
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn insert_rule(&self, rule: HeuristicRule) -> Option<HeuristicRule> {
        self.state.lock().chain.insert(rule)
    }

    pub fn replace_rule(&self, rule: HeuristicRule) -> Result<HeuristicRule, FilterError> {
        self.state.lock().chain.replace(rule)
    }

    pub fn remove_rule(&self, kind: RuleKind) -> Option<HeuristicRule> {
        self.state.lock().chain.remove(kind)
    }

    pub fn clear_rules(&self) {
        self.state.lock().chain.clear();
    }

    /// Rule kinds currently in the chain, in evaluation order.
    pub fn rule_kinds(&self) -> Vec<RuleKind> {
        self.state.lock().chain.kinds()
    }

    pub fn set_pass_through_threshold(&self, threshold: f64) {
        self.state.lock().pass_through = HeuristicRule::PassThroughSpeed { threshold };
    }

    /// Reconfigure thresholds from a profile, keeping rule positions.
    ///
    /// Optional rules the profile no longer configures are removed. Buffered
    /// samples are kept.
    pub fn apply_profile(&self, profile: &TrackingProfile) {
        let mut state = self.state.lock();
        let chain = &mut state.chain;

        chain.insert(HeuristicRule::Accuracy {
            threshold: profile.minimum_accuracy_m,
        });
        chain.insert(HeuristicRule::Speed {
            threshold: profile.maximum_speed_mps,
        });
        match profile.minimum_satellites {
            Some(min_count) => {
                chain.insert(HeuristicRule::Satellite { min_count });
            }
            None => {
                chain.remove(RuleKind::Satellite);
            }
        }
        match profile.maximum_calculated_speed_mps {
            Some(threshold) => {
                chain.insert(HeuristicRule::CalculatedSpeed { threshold });
            }
            None => {
                chain.remove(RuleKind::CalculatedSpeed);
            }
        }

        state.pass_through = HeuristicRule::PassThroughSpeed {
            threshold: profile.pass_through_speed_mps,
        };
        state.enabled = profile.outlier_removal_enabled;
    }
}

impl std::fmt::Debug for FilterWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FilterWindow")
            .field("session_id", &self.session_id)
            .field("pending", &state.pending.len())
            .field("rules", &state.chain.kinds())
            .field("enabled", &state.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const M_PER_DEG: f64 = std::f64::consts::PI / 180.0 * crate::geo::EARTH_RADIUS_M;

    /// A sample `meters` east of (0, 0) at `seconds`, with 5 m accuracy.
    fn at(meters: f64, seconds: i64) -> LocationSample {
        LocationSample::new(0.0, meters / M_PER_DEG)
            .with_accuracy(5.0)
            .at_millis(seconds * 1000)
    }

    fn window_with(chain: RuleChain) -> (FilterWindow, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let window = FilterWindow::new("1", chain, sink.clone());
        (window, sink)
    }

    fn accuracy_chain() -> RuleChain {
        [HeuristicRule::Accuracy { threshold: 40.0 }].into_iter().collect()
    }

    struct FailingSink;

    impl SampleSink for FailingSink {
        fn on_accepted(&self, _: &str, _: &LocationSample) -> Result<(), StorageError> {
            Err(StorageError::Backend("disk full".to_string()))
        }
    }

    #[test]
    fn test_disabled_window_commits_immediately() {
        let (window, sink) = window_with(accuracy_chain());
        window.set_enabled(false);

        // Would be rejected if filtering were on
        let bad = at(0.0, 0).with_accuracy(500.0);
        assert_eq!(window.add_sample(bad.clone()).unwrap(), Admission::Bypassed);

        assert_eq!(sink.samples(), vec![bad]);
        assert_eq!(window.pending(), 0);
    }

    #[test]
    fn test_two_sample_delay() {
        let (window, sink) = window_with(accuracy_chain());

        assert_eq!(
            window.add_sample(at(0.0, 0)).unwrap(),
            Admission::Buffered { evicted: false }
        );
        assert_eq!(
            window.add_sample(at(10.0, 1)).unwrap(),
            Admission::Buffered { evicted: false }
        );
        assert!(sink.is_empty());

        assert_eq!(
            window.add_sample(at(20.0, 2)).unwrap(),
            Admission::Committed { evicted: false }
        );
        assert_eq!(sink.samples(), vec![at(0.0, 0)]);
        assert_eq!(window.pending(), WINDOW_CAPACITY);
    }

    #[test]
    fn test_rejected_sample_leaves_buffer_untouched() {
        let (window, sink) = window_with(accuracy_chain());
        window.add_sample(at(0.0, 0)).unwrap();

        let vague = at(10.0, 1).with_accuracy(41.0);
        assert_eq!(
            window.add_sample(vague).unwrap(),
            Admission::Rejected(RuleKind::Accuracy)
        );
        assert_eq!(window.pending(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_pair_rules_compare_against_newest_buffered() {
        let chain: RuleChain = [HeuristicRule::CalculatedSpeed { threshold: 30.0 }]
            .into_iter()
            .collect();
        let (window, _sink) = window_with(chain);

        // First sample has no predecessor; pair rules do not apply
        assert!(window.add_sample(at(0.0, 0)).unwrap().is_accepted());
        // 1000 m in 1 s
        assert_eq!(
            window.add_sample(at(1000.0, 1)).unwrap(),
            Admission::Rejected(RuleKind::CalculatedSpeed)
        );
        // 20 m in 1 s from the buffered sample
        assert!(window.add_sample(at(20.0, 1)).unwrap().is_accepted());
    }

    #[test]
    fn test_pass_through_evicts_middle_sample() {
        let (window, sink) = window_with(RuleChain::new());

        let a = at(0.0, 0);
        let spike = LocationSample::new(500.0 / M_PER_DEG, 0.0)
            .with_accuracy(5.0)
            .at_millis(10_000);
        let c = at(20.0, 20);

        window.add_sample(a.clone()).unwrap();
        window.add_sample(spike).unwrap();

        // Roughly 1000 m over 20 s through the spike
        window.set_pass_through_threshold(40.0);
        assert_eq!(
            window.add_sample(c.clone()).unwrap(),
            Admission::Buffered { evicted: true }
        );

        // Spike was discarded, a and c are buffered
        assert!(sink.is_empty());
        assert_eq!(window.pending(), 2);

        window.add_sample(at(30.0, 25)).unwrap();
        window.add_sample(at(40.0, 30)).unwrap();
        assert_eq!(sink.samples(), vec![a, c]);
    }

    #[test]
    fn test_pass_through_needs_full_buffer() {
        let (window, _sink) = window_with(RuleChain::new());
        window.set_pass_through_threshold(0.0);

        window.add_sample(at(0.0, 0)).unwrap();
        assert_eq!(
            window.add_sample(at(100.0, 1)).unwrap(),
            Admission::Buffered { evicted: false }
        );
    }

    #[test]
    fn test_clear_queue_is_idempotent() {
        let (window, sink) = window_with(RuleChain::new());
        window.add_sample(at(0.0, 0)).unwrap();
        window.add_sample(at(10.0, 1)).unwrap();

        assert_eq!(window.clear_queue(), 2);
        assert_eq!(window.clear_queue(), 0);
        assert_eq!(window.pending(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_flush_commits_oldest_first() {
        let (window, sink) = window_with(RuleChain::new());
        window.add_sample(at(0.0, 0)).unwrap();
        window.add_sample(at(10.0, 1)).unwrap();

        assert_eq!(window.flush().unwrap(), 2);
        assert_eq!(sink.samples(), vec![at(0.0, 0), at(10.0, 1)]);
        assert_eq!(window.flush().unwrap(), 0);
    }

    #[test]
    fn test_toggling_keeps_buffered_samples() {
        let (window, sink) = window_with(RuleChain::new());
        window.add_sample(at(0.0, 0)).unwrap();

        window.set_enabled(false);
        assert!(!window.is_enabled());
        assert_eq!(window.pending(), 1);

        window.add_sample(at(10.0, 1)).unwrap();
        assert_eq!(sink.samples(), vec![at(10.0, 1)]);

        window.set_enabled(true);
        assert_eq!(window.pending(), 1);
    }

    #[test]
    fn test_sink_error_propagates() {
        let window = FilterWindow::new("7", RuleChain::new(), Arc::new(FailingSink));

        window.add_sample(at(0.0, 0)).unwrap();
        window.add_sample(at(10.0, 1)).unwrap();
        let err = window.add_sample(at(20.0, 2)).unwrap_err();

        assert!(matches!(err, StorageError::Backend(_)));
        // The committed sample already left the buffer
        assert_eq!(window.pending(), 2);
    }

    #[test]
    fn test_sink_receives_session_id() {
        let sink = Arc::new(RecordingSink::new());
        let window = FilterWindow::new("42", RuleChain::new(), sink.clone()).with_enabled(false);
        window.add_sample(at(0.0, 0)).unwrap();

        assert_eq!(sink.received()[0].0, "42");
        assert_eq!(window.session_id(), "42");
    }

    #[test]
    fn test_rule_mutators() {
        let (window, _sink) = window_with(accuracy_chain());

        assert!(window
            .insert_rule(HeuristicRule::Speed { threshold: 5.0 })
            .is_none());
        assert!(window
            .replace_rule(HeuristicRule::Accuracy { threshold: 10.0 })
            .is_ok());
        assert_eq!(
            window.replace_rule(HeuristicRule::Overlap),
            Err(FilterError::RuleNotRegistered(RuleKind::Overlap))
        );
        assert!(window.remove_rule(RuleKind::Speed).is_some());
        assert_eq!(window.rule_kinds(), vec![RuleKind::Accuracy]);

        window.clear_rules();
        assert!(window.rule_kinds().is_empty());
    }

    #[test]
    fn test_apply_profile_keeps_positions() {
        let profile = TrackingProfile::default();
        let sink = Arc::new(RecordingSink::new());
        let window = FilterWindow::from_profile("1", &profile, sink);
        let before = window.rule_kinds();

        let updated = TrackingProfile {
            minimum_accuracy_m: 10.0,
            minimum_satellites: Some(5),
            outlier_removal_enabled: false,
            ..profile
        };
        window.apply_profile(&updated);

        let mut expected = before;
        expected.push(RuleKind::Satellite);
        assert_eq!(window.rule_kinds(), expected);
        assert!(!window.is_enabled());

        window.apply_profile(&TrackingProfile::default());
        assert!(!window.rule_kinds().contains(&RuleKind::Satellite));
        assert!(window.is_enabled());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn stream() -> impl Strategy<Value = Vec<(f64, f32)>> {
            prop::collection::vec((0.0..5.0_f64, 0.0..200.0_f32), 0..30)
        }

        /// Build a chronologically ordered sample stream from (step meters, accuracy).
        fn samples(steps: &[(f64, f32)]) -> Vec<LocationSample> {
            let mut meters = 0.0;
            steps
                .iter()
                .enumerate()
                .map(|(i, (step, accuracy))| {
                    meters += step;
                    at(meters, i as i64).with_accuracy(*accuracy)
                })
                .collect()
        }

        proptest! {
            #[test]
            fn test_disabled_mode_is_fifo_pass_through(steps in stream()) {
                let (window, sink) = window_with(accuracy_chain());
                window.set_enabled(false);

                let input = samples(&steps);
                for sample in &input {
                    prop_assert_eq!(window.add_sample(sample.clone()).unwrap(), Admission::Bypassed);
                }
                prop_assert_eq!(sink.samples(), input);
            }

            #[test]
            fn test_accepted_samples_lag_by_two(steps in stream()) {
                let (window, sink) = window_with(RuleChain::new());
                window.set_pass_through_threshold(f64::INFINITY);

                let input = samples(&steps);
                for sample in &input {
                    prop_assert!(window.add_sample(sample.clone()).unwrap().is_accepted());
                }

                let expected = input.len().saturating_sub(WINDOW_CAPACITY);
                prop_assert_eq!(sink.samples(), input[..expected].to_vec());
                prop_assert_eq!(window.pending(), input.len() - expected);
            }
        }
    }
}
