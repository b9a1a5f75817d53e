//! Optical mark recognition for fixed-layout answer sheets

pub mod bubbles;
pub mod config;
pub mod diagnostics;
pub mod geometry;
pub mod grid;
pub mod header;
pub mod pipeline;
pub mod rectify;
pub mod result;
pub mod rotation;

pub use config::OmrConfig;
pub use header::{StudentInfo, NOT_DETECTED};
pub use pipeline::OmrPipeline;
pub use rectify::Rectification;
pub use result::{AnswersMap, LowConfidence, SheetScan};
