//! Frame pipeline and configuration sweep of the keypoint benchmark.
//!
//! A [`Sweep`] pairs every configured descriptor with every configured
//! detector, feeds the frames of a [`FrameSource`] through a
//! [`RunController`] and hands the per-frame [`RunMetrics`] to a
//! [`ReportSink`].

mod buffer;
mod config;
mod error;
mod pipeline;
mod report;
mod roi;
mod source;
mod sweep;
mod visualize;

pub use buffer::{Frame, FrameBuffer};
pub use config::BenchConfig;
pub use error::{BenchError, BenchResult, ConfigError, SourceError};
pub use pipeline::{FrameMetrics, RunController, RunMetrics};
pub use report::{CSV_HEADER, ConsoleReport, CsvReport, MultiReport, ReportSink};
pub use roi::{RegionFilter, VEHICLE_RECT};
pub use source::{FrameSource, ImageSequence, InMemorySource};
pub use sweep::{Outcome, Sweep, run_sweep};
pub use visualize::MatchVisualizer;
