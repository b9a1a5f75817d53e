//! Optical mark recognition for multiple-choice answer sheets
//!
//! Reads a photographed or scanned sheet, extracts the student header
//! fields and the marked bubbles, and grades them against a versioned
//! answer key. The [`server`] module exposes the same operations over HTTP.

pub mod answer_key;
pub mod config;
pub mod decode;
pub mod engine;
pub mod engines;
pub mod error;
pub mod omr;
pub mod preprocessing;
pub mod server;

pub use engine::{OcrResult, RegionHint, Rotation, TextRecognizer};
pub use error::OmrError;
pub use omr::{OmrConfig, OmrPipeline, SheetScan};
