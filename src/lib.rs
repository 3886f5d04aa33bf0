//! heartsync library - heart-rate synchronization dashboard core
//!
//! Readings flow one way per event:
//! reading → [`reading::ReadingFilter`] → [`sync::SyncEvaluator`] →
//! {[`visual::ColorMapper`], [`visual::SpatialMapper`],
//! [`audio::AudioSynthesisEngine`]} → [`visual::OutputSink`].
//! [`dashboard::Dashboard`] owns all of it.

pub mod audio;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod params;
pub mod reading;
pub mod scheduler;
pub mod sync;
pub mod transport;
pub mod visual;
