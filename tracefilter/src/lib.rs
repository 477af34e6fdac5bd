//! TraceFilter - outlier filtering for live location tracking
//!
//! This library decides, sample by sample, whether a location fix is
//! trustworthy enough to become part of a persisted track, and accumulates
//! trip statistics (distance, speed distribution) for the accepted samples.
//!
//! # Architecture
//!
//! ```text
//! raw sample ──► Tracker::ingest ──► FilterWindow::add_sample
//!                                        │  RuleChain (AND of HeuristicRules)
//!                                        │  3-point pass-through eviction
//!                                        ▼
//!                                  SampleSink::on_accepted (TrackCommitter)
//!                                        │
//!                         TrackAggregator::update + SessionStore::append_sample
//! ```

pub mod activity;
pub mod config;
pub mod filter;
pub mod geo;
pub mod logging;
pub mod sample;
pub mod store;
pub mod track;
pub mod tracker;
