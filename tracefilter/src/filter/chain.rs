//! Ordered AND chain of heuristic rules.

use tracing::trace;

use super::rule::{Evaluation, HeuristicRule, RuleKind, Verdict};
use super::FilterError;
use crate::config::TrackingProfile;

/// Result of running a sample through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// No rule flagged the evaluation.
    Valid,
    /// The first rule (in chain order) that flagged the evaluation.
    Rejected(RuleKind),
}

impl ChainOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ChainOutcome::Valid)
    }
}

/// Ordered set of rules, at most one per [`RuleKind`].
///
/// Evaluation is a short-circuit AND in insertion order. Rules that do not
/// support the evaluation's arity are skipped, and an abstaining rule does
/// not reject.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleChain {
    rules: Vec<HeuristicRule>,
}

impl RuleChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the default chain for a tracking profile.
    ///
    /// Accuracy, speed and overlap rules are always present. Satellite and
    /// calculated-speed rules are added only when the profile configures them.
    pub fn from_profile(profile: &TrackingProfile) -> Self {
        let mut chain = Self::new();
        chain.insert(HeuristicRule::Accuracy {
            threshold: profile.minimum_accuracy_m,
        });
        chain.insert(HeuristicRule::Speed {
            threshold: profile.maximum_speed_mps,
        });
        chain.insert(HeuristicRule::Overlap);

        if let Some(min_count) = profile.minimum_satellites {
            chain.insert(HeuristicRule::Satellite { min_count });
        }
        if let Some(threshold) = profile.maximum_calculated_speed_mps {
            chain.insert(HeuristicRule::CalculatedSpeed { threshold });
        }

        chain
    }

    /// Insert a rule, replacing the one of the same kind in place.
    ///
    /// Returns the replaced rule, if any. New kinds are appended.
    pub fn insert(&mut self, rule: HeuristicRule) -> Option<HeuristicRule> {
        match self.position(rule.kind()) {
            Some(index) => Some(std::mem::replace(&mut self.rules[index], rule)),
            None => {
                self.rules.push(rule);
                None
            }
        }
    }

    /// Replace the existing rule of the same kind.
    ///
    /// # Errors
    ///
    /// [`FilterError::RuleNotRegistered`] if no rule of that kind is present.
    pub fn replace(&mut self, rule: HeuristicRule) -> Result<HeuristicRule, FilterError> {
        let kind = rule.kind();
        let index = self
            .position(kind)
            .ok_or(FilterError::RuleNotRegistered(kind))?;
        Ok(std::mem::replace(&mut self.rules[index], rule))
    }

    pub fn remove(&mut self, kind: RuleKind) -> Option<HeuristicRule> {
        let index = self.position(kind)?;
        Some(self.rules.remove(index))
    }

    pub fn get(&self, kind: RuleKind) -> Option<&HeuristicRule> {
        self.rules.iter().find(|rule| rule.kind() == kind)
    }

    pub fn contains(&self, kind: RuleKind) -> bool {
        self.position(kind).is_some()
    }

    /// Rule kinds in evaluation order.
    pub fn kinds(&self) -> Vec<RuleKind> {
        self.rules.iter().map(HeuristicRule::kind).collect()
    }

    pub fn rules(&self) -> &[HeuristicRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Run every applicable rule until one rejects.
    pub fn evaluate(&self, evaluation: &Evaluation<'_>) -> ChainOutcome {
        let arity = evaluation.arity();

        for rule in self.rules.iter().filter(|rule| rule.supports(arity)) {
            match rule.evaluate(evaluation) {
                Ok(Verdict::Outlier) => return ChainOutcome::Rejected(rule.kind()),
                Ok(Verdict::Valid) => {}
                Ok(Verdict::Abstain) => {
                    trace!(rule = %rule.kind(), "Rule abstained");
                }
                // Filtered by `supports` above
                Err(_) => {}
            }
        }

        ChainOutcome::Valid
    }

    fn position(&self, kind: RuleKind) -> Option<usize> {
        self.rules.iter().position(|rule| rule.kind() == kind)
    }
}

impl FromIterator<HeuristicRule> for RuleChain {
    fn from_iter<I: IntoIterator<Item = HeuristicRule>>(iter: I) -> Self {
        let mut chain = Self::new();
        for rule in iter {
            chain.insert(rule);
        }
        chain
    }
}
