//! Heuristic outlier rules.
//!
//! Rules form a closed set of kinds, each carrying its parameters. Some rules
//! judge a single sample, others need history: every kind declares which
//! evaluation [`Arity`] it supports and callers only invoke those.
//!
//! | Kind             | Single | Pair | Triple |
//! |------------------|:------:|:----:|:------:|
//! | Accuracy         |   ✓    |  ✓   |   ✓    |
//! | Speed            |   ✓    |  ✓   |   ✓    |
//! | Satellite        |   ✓    |  ✓   |   ✓    |
//! | CalculatedSpeed  |        |  ✓   |   ✓    |
//! | Overlap          |        |  ✓   |   ✓    |
//! | PassThroughSpeed |        |      |   ✓    |
//!
//! Single-sample rules judge only the current sample at every arity; pair
//! rules judge (current, previous) when given a triple.

use std::fmt;

use tracing::debug;

use super::FilterError;
use crate::geo::{are_overlapping, geodesic_distance};
use crate::sample::LocationSample;

/// Number of samples an evaluation looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Single,
    Pair,
    Triple,
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Single => f.write_str("single"),
            Arity::Pair => f.write_str("pair"),
            Arity::Triple => f.write_str("triple"),
        }
    }
}

/// Samples handed to a rule, newest first.
#[derive(Debug, Clone, Copy)]
pub enum Evaluation<'a> {
    Single(&'a LocationSample),
    Pair {
        current: &'a LocationSample,
        previous: &'a LocationSample,
    },
    Triple {
        current: &'a LocationSample,
        previous: &'a LocationSample,
        earlier: &'a LocationSample,
    },
}

impl<'a> Evaluation<'a> {
    pub fn arity(&self) -> Arity {
        match self {
            Evaluation::Single(_) => Arity::Single,
            Evaluation::Pair { .. } => Arity::Pair,
            Evaluation::Triple { .. } => Arity::Triple,
        }
    }

    /// The sample being judged.
    pub fn current(&self) -> &'a LocationSample {
        match *self {
            Evaluation::Single(current)
            | Evaluation::Pair { current, .. }
            | Evaluation::Triple { current, .. } => current,
        }
    }

    /// The sample immediately before the current one, if any.
    pub fn previous(&self) -> Option<&'a LocationSample> {
        match *self {
            Evaluation::Single(_) => None,
            Evaluation::Pair { previous, .. } | Evaluation::Triple { previous, .. } => {
                Some(previous)
            }
        }
    }
}

/// Outcome of one rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The rule finds nothing wrong.
    Valid,
    /// The rule flags the evaluation as an outlier.
    Outlier,
    /// The rule cannot judge these samples (missing data, zero interval).
    Abstain,
}

impl Verdict {
    pub fn is_outlier(&self) -> bool {
        matches!(self, Verdict::Outlier)
    }

    fn from_flag(is_outlier: bool) -> Self {
        if is_outlier {
            Verdict::Outlier
        } else {
            Verdict::Valid
        }
    }
}

/// Tag identifying a rule kind, independent of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    Accuracy,
    Speed,
    Satellite,
    CalculatedSpeed,
    Overlap,
    PassThroughSpeed,
}

impl RuleKind {
    /// Whether rules of this kind can be evaluated at `arity`.
    pub fn supports(&self, arity: Arity) -> bool {
        match self {
            RuleKind::Accuracy | RuleKind::Speed | RuleKind::Satellite => true,
            RuleKind::CalculatedSpeed | RuleKind::Overlap => arity != Arity::Single,
            RuleKind::PassThroughSpeed => arity == Arity::Triple,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Accuracy => "accuracy",
            RuleKind::Speed => "speed",
            RuleKind::Satellite => "satellite",
            RuleKind::CalculatedSpeed => "calculated-speed",
            RuleKind::Overlap => "overlap",
            RuleKind::PassThroughSpeed => "pass-through-speed",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A heuristic outlier rule with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum HeuristicRule {
    /// Outlier when the accuracy radius exceeds `threshold` meters.
    Accuracy { threshold: f32 },
    /// Outlier when the reported speed exceeds `threshold` m/s.
    Speed { threshold: f32 },
    /// Outlier when fewer than `min_count` satellites were used.
    /// Abstains when the provider did not report a count.
    Satellite { min_count: u32 },
    /// Outlier when the speed implied by distance over monotonic time since
    /// the previous sample exceeds `threshold` m/s.
    CalculatedSpeed { threshold: f64 },
    /// Outlier when the current fix overlaps the previous one and is less
    /// precise, i.e. prefer the more precise of two ambiguous fixes.
    Overlap,
    /// Outlier when the average speed along earlier → previous → current
    /// exceeds `threshold` m/s. Catches a bad middle sample whose
    /// neighbours each look plausible.
    PassThroughSpeed { threshold: f64 },
}

impl HeuristicRule {
    pub fn kind(&self) -> RuleKind {
        match self {
            HeuristicRule::Accuracy { .. } => RuleKind::Accuracy,
            HeuristicRule::Speed { .. } => RuleKind::Speed,
            HeuristicRule::Satellite { .. } => RuleKind::Satellite,
            HeuristicRule::CalculatedSpeed { .. } => RuleKind::CalculatedSpeed,
            HeuristicRule::Overlap => RuleKind::Overlap,
            HeuristicRule::PassThroughSpeed { .. } => RuleKind::PassThroughSpeed,
        }
    }

    pub fn supports(&self, arity: Arity) -> bool {
        self.kind().supports(arity)
    }

    /// Judge the given samples.
    ///
    /// # Errors
    ///
    /// [`FilterError::UnsupportedEvaluation`] when this rule kind does not
    /// support the evaluation's arity. Check [`supports`](Self::supports)
    /// first; the error marks a caller bug, not bad data.
    pub fn evaluate(&self, evaluation: &Evaluation<'_>) -> Result<Verdict, FilterError> {
        let arity = evaluation.arity();
        if !self.supports(arity) {
            return Err(FilterError::UnsupportedEvaluation {
                kind: self.kind(),
                arity,
            });
        }

        let verdict = match (self, *evaluation) {
            (HeuristicRule::Accuracy { threshold }, eval) => {
                Verdict::from_flag(eval.current().accuracy > *threshold)
            }
            (HeuristicRule::Speed { threshold }, eval) => {
                Verdict::from_flag(eval.current().speed > *threshold)
            }
            (HeuristicRule::Satellite { min_count }, eval) => match eval.current().satellites() {
                Some(count) => Verdict::from_flag(count < u64::from(*min_count)),
                None => Verdict::Abstain,
            },
            (
                HeuristicRule::CalculatedSpeed { threshold },
                Evaluation::Pair { current, previous }
                | Evaluation::Triple {
                    current, previous, ..
                },
            ) => calculated_speed(previous, current)
                .map_or(Verdict::Abstain, |speed| Verdict::from_flag(speed > *threshold)),
            (
                HeuristicRule::Overlap,
                Evaluation::Pair { current, previous }
                | Evaluation::Triple {
                    current, previous, ..
                },
            ) => {
                let distance = geodesic_distance(previous, current);
                Verdict::from_flag(
                    are_overlapping(distance, previous.accuracy, current.accuracy)
                        && current.accuracy > previous.accuracy,
                )
            }
            (
                HeuristicRule::PassThroughSpeed { threshold },
                Evaluation::Triple {
                    current,
                    previous,
                    earlier,
                },
            ) => pass_through_speed(earlier, previous, current)
                .map_or(Verdict::Abstain, |speed| Verdict::from_flag(speed > *threshold)),
            // Unsupported arities were rejected above
            _ => Verdict::Abstain,
        };

        if verdict.is_outlier() {
            debug!(
                rule = %self.kind(),
                arity = %arity,
                sample = %evaluation.current(),
                "Outlier detected"
            );
        }

        Ok(verdict)
    }

    /// Convenience wrapper returning only whether the rule fires.
    pub fn is_outlier(&self, evaluation: &Evaluation<'_>) -> Result<bool, FilterError> {
        Ok(self.evaluate(evaluation)?.is_outlier())
    }
}

/// Speed in m/s between two samples, using monotonic time.
///
/// `None` when the interval is not positive.
pub(crate) fn calculated_speed(previous: &LocationSample, current: &LocationSample) -> Option<f64> {
    let seconds = current.seconds_since(previous);
    if seconds <= 0.0 {
        return None;
    }
    Some(geodesic_distance(previous, current) / seconds)
}

/// Average speed in m/s along earlier → previous → current.
///
/// `None` when the total interval is not positive.
pub(crate) fn pass_through_speed(
    earlier: &LocationSample,
    previous: &LocationSample,
    current: &LocationSample,
) -> Option<f64> {
    let seconds = current.seconds_since(earlier);
    if seconds <= 0.0 {
        return None;
    }
    let path = geodesic_distance(earlier, previous) + geodesic_distance(previous, current);
    Some(path / seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Meters per degree of longitude at the equator.
    const M_PER_DEG: f64 = std::f64::consts::PI / 180.0 * crate::geo::EARTH_RADIUS_M;

    /// A sample `meters` east of (0, 0) at `seconds` on both clocks.
    fn at(meters: f64, seconds: f64) -> LocationSample {
        LocationSample::new(0.0, meters / M_PER_DEG).at_millis((seconds * 1000.0) as i64)
    }

    #[test]
    fn test_capabilities() {
        assert!(RuleKind::Accuracy.supports(Arity::Single));
        assert!(RuleKind::Satellite.supports(Arity::Triple));
        assert!(!RuleKind::Overlap.supports(Arity::Single));
        assert!(RuleKind::CalculatedSpeed.supports(Arity::Triple));
        assert!(!RuleKind::PassThroughSpeed.supports(Arity::Pair));
        assert!(RuleKind::PassThroughSpeed.supports(Arity::Triple));
    }

    #[test]
    fn test_accuracy_boundary() {
        let rule = HeuristicRule::Accuracy { threshold: 40.0 };

        let exact = LocationSample::new(0.0, 0.0).with_accuracy(40.0);
        let worse = LocationSample::new(0.0, 0.0).with_accuracy(40.5);

        assert_eq!(rule.evaluate(&Evaluation::Single(&exact)), Ok(Verdict::Valid));
        assert_eq!(rule.evaluate(&Evaluation::Single(&worse)), Ok(Verdict::Outlier));
    }

    #[test]
    fn test_single_sample_rules_judge_current_at_every_arity() {
        let rule = HeuristicRule::Speed { threshold: 10.0 };
        let fast = LocationSample::new(0.0, 0.0).with_speed(20.0);
        let slow = LocationSample::new(0.0, 0.0).with_speed(5.0);

        let pair = Evaluation::Pair {
            current: &fast,
            previous: &slow,
        };
        let triple = Evaluation::Triple {
            current: &slow,
            previous: &fast,
            earlier: &fast,
        };

        assert_eq!(rule.is_outlier(&pair), Ok(true));
        assert_eq!(rule.is_outlier(&triple), Ok(false));
    }

    #[test]
    fn test_satellite_rule_abstains_without_count() {
        let rule = HeuristicRule::Satellite { min_count: 4 };

        let unknown = LocationSample::new(0.0, 0.0);
        let few = LocationSample::new(0.0, 0.0).with_satellites(3);
        let enough = LocationSample::new(0.0, 0.0).with_satellites(4);

        assert_eq!(rule.evaluate(&Evaluation::Single(&unknown)), Ok(Verdict::Abstain));
        assert_eq!(rule.evaluate(&Evaluation::Single(&few)), Ok(Verdict::Outlier));
        assert_eq!(rule.evaluate(&Evaluation::Single(&enough)), Ok(Verdict::Valid));
    }

    #[test]
    fn test_calculated_speed_ten_meters_per_second() {
        let previous = at(0.0, 0.0);
        let current = at(100.0, 10.0);
        let pair = Evaluation::Pair {
            current: &current,
            previous: &previous,
        };

        let speed = calculated_speed(&previous, &current).unwrap();
        assert!((speed - 10.0).abs() < 0.05, "speed {}", speed);

        let strict = HeuristicRule::CalculatedSpeed { threshold: 9.9 };
        let lenient = HeuristicRule::CalculatedSpeed { threshold: 10.1 };
        assert_eq!(strict.is_outlier(&pair), Ok(true));
        assert_eq!(lenient.is_outlier(&pair), Ok(false));
    }

    #[test]
    fn test_calculated_speed_uses_monotonic_clock() {
        let previous = at(0.0, 0.0);
        // Wall clock jumped backwards; monotonic clock is 10s later
        let current = at(100.0, 10.0).with_timestamp_ms(-50_000);

        let rule = HeuristicRule::CalculatedSpeed { threshold: 10.1 };
        let pair = Evaluation::Pair {
            current: &current,
            previous: &previous,
        };
        assert_eq!(rule.is_outlier(&pair), Ok(false));
    }

    #[test]
    fn test_calculated_speed_abstains_on_zero_interval() {
        let previous = at(0.0, 5.0);
        let current = at(100.0, 5.0);
        let rule = HeuristicRule::CalculatedSpeed { threshold: 1.0 };

        let pair = Evaluation::Pair {
            current: &current,
            previous: &previous,
        };
        assert_eq!(rule.evaluate(&pair), Ok(Verdict::Abstain));
    }

    #[test]
    fn test_pair_rules_reject_single_evaluation() {
        let sample = at(0.0, 0.0);

        for rule in [
            HeuristicRule::Overlap,
            HeuristicRule::CalculatedSpeed { threshold: 1.0 },
            HeuristicRule::PassThroughSpeed { threshold: 1.0 },
        ] {
            let err = rule.evaluate(&Evaluation::Single(&sample)).unwrap_err();
            assert_eq!(
                err,
                FilterError::UnsupportedEvaluation {
                    kind: rule.kind(),
                    arity: Arity::Single
                }
            );
        }
    }

    #[test]
    fn test_overlap_prefers_the_more_precise_fix() {
        let rule = HeuristicRule::Overlap;
        let precise = at(0.0, 0.0).with_accuracy(5.0);
        let vague_nearby = at(10.0, 1.0).with_accuracy(20.0);
        let sharper_nearby = at(10.0, 1.0).with_accuracy(5.0);
        let vague_far = at(100.0, 1.0).with_accuracy(20.0);

        let flagged = Evaluation::Pair {
            current: &vague_nearby,
            previous: &precise,
        };
        let equal = Evaluation::Pair {
            current: &sharper_nearby,
            previous: &precise,
        };
        let apart = Evaluation::Pair {
            current: &vague_far,
            previous: &precise,
        };

        assert_eq!(rule.is_outlier(&flagged), Ok(true));
        assert_eq!(rule.is_outlier(&equal), Ok(false));
        assert_eq!(rule.is_outlier(&apart), Ok(false));
    }

    #[test]
    fn test_overlap_triple_judges_current_against_previous() {
        let rule = HeuristicRule::Overlap;
        let earlier = at(0.0, 0.0).with_accuracy(1.0);
        let previous = at(500.0, 1.0).with_accuracy(5.0);
        let current = at(505.0, 2.0).with_accuracy(30.0);

        let triple = Evaluation::Triple {
            current: &current,
            previous: &previous,
            earlier: &earlier,
        };
        assert_eq!(rule.is_outlier(&triple), Ok(true));
    }

    #[test]
    fn test_pass_through_speed_twenty_meters_per_second() {
        let earlier = at(0.0, 0.0);
        let previous = at(40.0, 2.0);
        let current = at(80.0, 4.0);

        let speed = pass_through_speed(&earlier, &previous, &current).unwrap();
        assert!((speed - 20.0).abs() < 0.1, "speed {}", speed);

        let triple = Evaluation::Triple {
            current: &current,
            previous: &previous,
            earlier: &earlier,
        };
        assert_eq!(
            HeuristicRule::PassThroughSpeed { threshold: 19.5 }.is_outlier(&triple),
            Ok(true)
        );
        assert_eq!(
            HeuristicRule::PassThroughSpeed { threshold: 20.5 }.is_outlier(&triple),
            Ok(false)
        );
    }

    #[test]
    fn test_pass_through_catches_spike_in_the_middle() {
        // Middle sample spikes 500 m away and back within 20 s
        let earlier = at(0.0, 0.0);
        let spike = LocationSample::new(500.0 / M_PER_DEG, 0.0).at_millis(10_000);
        let current = at(20.0, 20.0);

        let triple = Evaluation::Triple {
            current: &current,
            previous: &spike,
            earlier: &earlier,
        };
        let rule = HeuristicRule::PassThroughSpeed { threshold: 40.0 };
        assert_eq!(rule.is_outlier(&triple), Ok(true));

        // The endpoints alone are perfectly plausible
        assert!(calculated_speed(&earlier, &current).unwrap() < 2.0);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(RuleKind::PassThroughSpeed.to_string(), "pass-through-speed");
        assert_eq!(HeuristicRule::Overlap.kind(), RuleKind::Overlap);
        assert_eq!(Arity::Pair.to_string(), "pair");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_accuracy_rule_matches_threshold(
                accuracy in 0.0..500.0_f32,
                threshold in 0.0..500.0_f32,
            ) {
                let rule = HeuristicRule::Accuracy { threshold };
                let sample = LocationSample::new(0.0, 0.0).with_accuracy(accuracy);
                let flagged = rule.is_outlier(&Evaluation::Single(&sample)).unwrap();
                prop_assert_eq!(flagged, accuracy > threshold);
            }

            #[test]
            fn test_overlap_never_flags_the_more_precise_fix(
                offset in 0.0..50.0_f64,
                acc_a in 1.0..30.0_f32,
                acc_b in 1.0..30.0_f32,
            ) {
                let a = at(0.0, 0.0).with_accuracy(acc_a);
                let b = at(offset, 1.0).with_accuracy(acc_b);
                let flagged = HeuristicRule::Overlap
                    .is_outlier(&Evaluation::Pair { current: &b, previous: &a })
                    .unwrap();

                let overlapping = geodesic_distance(&a, &b) < f64::from(acc_a) + f64::from(acc_b);
                prop_assert_eq!(flagged, overlapping && acc_b > acc_a);
            }
        }
    }
}
