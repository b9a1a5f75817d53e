//! Image preprocessing for header-field recognition and bubble detection
//!
//! Provides the individual filters and a preset-driven pipeline that
//! prepares small text crops for the recognizer.

pub mod pipeline;
pub mod steps;

pub use pipeline::{Pipeline, PreprocessingResult, Preset, StepTiming};
