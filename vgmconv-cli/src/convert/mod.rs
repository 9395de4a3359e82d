//! Conversion of inputs to WAV files

pub mod driver;
pub mod naming;

pub use driver::{describe, Converter, FileSink, OutputSink, RunSummary};
