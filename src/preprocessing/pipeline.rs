use crate::error::OmrError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::steps;

/// Preprocessing preset names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Hand the crop over untouched
    None,
    /// Grayscale and enlarge only, for clean printed text
    Minimal,
    /// Steps: grayscale, denoise, contrast, threshold, upscale
    #[default]
    Default,
    /// Default plus a closing pass that rejoins broken handwriting
    Aggressive,
}

impl Preset {
    /// Parse from a configuration or query string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "minimal" => Some(Self::Minimal),
            "default" => Some(Self::Default),
            "aggressive" => Some(Self::Aggressive),
            _ => None,
        }
    }

    /// Get the preset name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Default => "default",
            Self::Aggressive => "aggressive",
        }
    }
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Preprocessed image (not serialized)
    #[serde(skip)]
    pub image: DynamicImage,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Preset used
    pub preset: String,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

/// Preprocessing pipeline that applies steps based on preset
pub struct Pipeline {
    preset: Preset,
    upscale: u32,
}

impl Pipeline {
    pub fn new(preset: Preset) -> Self {
        Self {
            preset,
            upscale: steps::resize::DEFAULT_UPSCALE,
        }
    }

    /// Override the enlargement factor applied as the last step
    pub fn with_upscale(mut self, factor: u32) -> Self {
        self.upscale = factor;
        self
    }

    /// Process an image according to the configured preset
    pub fn process(&self, image: DynamicImage) -> Result<PreprocessingResult, OmrError> {
        let start = Instant::now();
        let mut steps_timing = Vec::new();

        if self.preset == Preset::None {
            return Ok(PreprocessingResult {
                image,
                total_time_ms: 0,
                preset: Preset::None.as_str().to_string(),
                steps: vec![],
            });
        }

        let mut img = image;

        // All presets except None do grayscale
        img = self.run_step("grayscale", img, &mut steps_timing, steps::grayscale::apply)?;

        if self.preset != Preset::Minimal {
            img = self.run_step("denoise", img, &mut steps_timing, steps::denoise::apply)?;
            img = self.run_step("contrast", img, &mut steps_timing, steps::contrast::apply)?;
            img = self.run_step("threshold", img, &mut steps_timing, steps::threshold::apply)?;
        }

        let factor = self.upscale;
        img = self.run_step("upscale", img, &mut steps_timing, |img| {
            steps::resize::upscale(img, factor)
        })?;

        // Aggressive only: rejoin strokes after enlargement
        if self.preset == Preset::Aggressive {
            img = self.run_step("close", img, &mut steps_timing, steps::morphology::apply)?;
        }

        Ok(PreprocessingResult {
            image: img,
            total_time_ms: start.elapsed().as_millis() as u64,
            preset: self.preset.as_str().to_string(),
            steps: steps_timing,
        })
    }

    fn run_step<F>(
        &self,
        name: &str,
        img: DynamicImage,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> Result<DynamicImage, OmrError>
    where
        F: FnOnce(DynamicImage) -> Result<DynamicImage, OmrError>,
    {
        let step_start = Instant::now();
        let result = step_fn(img)?;
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        Ok(result)
    }
}
