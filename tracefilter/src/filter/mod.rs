//! Outlier filtering.
//!
//! - [`HeuristicRule`]: one unit of outlier judgement over one, two or three
//!   chronologically ordered samples.
//! - [`RuleChain`]: an ordered AND of rules, at most one per [`RuleKind`].
//! - [`FilterWindow`]: the per-session delay buffer that runs the chain,
//!   applies the retroactive pass-through check and commits samples to a
//!   [`SampleSink`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tracefilter::filter::{FilterWindow, HeuristicRule, RecordingSink, RuleChain};
//! use tracefilter::sample::LocationSample;
//!
//! let mut chain = RuleChain::new();
//! chain.insert(HeuristicRule::Accuracy { threshold: 40.0 });
//!
//! let sink = Arc::new(RecordingSink::default());
//! let window = FilterWindow::new("1", chain, sink.clone());
//!
//! for i in 0..3 {
//!     let sample = LocationSample::new(0.0, i as f64 * 0.0001)
//!         .with_accuracy(5.0)
//!         .at_millis(i * 1000);
//!     window.add_sample(sample).unwrap();
//! }
//!
//! // Two samples are still held back by the window
//! assert_eq!(sink.len(), 1);
//! ```

mod chain;
mod rule;
mod window;

pub use chain::{ChainOutcome, RuleChain};
pub use rule::{Arity, Evaluation, HeuristicRule, RuleKind, Verdict};
pub use window::{
    Admission, FilterWindow, RecordingSink, SampleSink, DEFAULT_PASS_THROUGH_SPEED_MPS,
    WINDOW_CAPACITY,
};

use thiserror::Error;

/// Errors raised by the rule engine.
///
/// Both variants are contract violations by the caller, not data errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A rule was evaluated at an arity it does not implement.
    #[error("{kind} rule cannot evaluate {arity} samples")]
    UnsupportedEvaluation { kind: RuleKind, arity: Arity },

    /// A rule replacement targeted a kind that is not in the chain.
    #[error("No {0} rule registered")]
    RuleNotRegistered(RuleKind),
}
