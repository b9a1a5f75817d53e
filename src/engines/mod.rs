//! Text recognition engine implementations
//!
//! This module contains implementations of the TextRecognizer trait for
//! different OCR backends. Engines are conditionally compiled based on
//! feature flags.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

#[cfg(feature = "engine-leptess")]
pub mod leptess;

#[cfg(any(feature = "engine-ocrs", feature = "engine-leptess"))]
mod download;

use crate::config::Config;
use crate::engine::TextRecognizer;
use crate::error::OmrError;
use serde::Serialize;
use std::sync::Arc;

/// Information about an available engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub supported_languages: Vec<String>,
}

/// Registry of available recognition engines
pub struct EngineRegistry {
    engines: Vec<Arc<dyn TextRecognizer>>,
    default_engine: String,
}

impl EngineRegistry {
    /// Create a new engine registry with all compiled-in engines initialized
    #[allow(unused_variables, unused_mut)]
    pub fn new(config: &Config) -> Result<Self, OmrError> {
        let mut engines: Vec<Arc<dyn TextRecognizer>> = Vec::new();

        #[cfg(feature = "engine-ocrs")]
        {
            tracing::info!("Initializing ocrs engine...");
            engines.push(Arc::new(ocrs::OcrsEngine::new(config)?));
        }

        #[cfg(feature = "engine-leptess")]
        {
            tracing::info!("Initializing leptess engine...");
            engines.push(Arc::new(leptess::LeptessEngine::new(config)?));
        }

        Self::from_engines(engines)
    }

    /// Build a registry from already constructed engines; the first one
    /// becomes the default
    pub fn from_engines(engines: Vec<Arc<dyn TextRecognizer>>) -> Result<Self, OmrError> {
        let default_engine = engines
            .first()
            .map(|e| e.name().to_string())
            .ok_or_else(|| {
                OmrError::InitializationError(
                    "No recognition engines available. \
                     Build with --features engine-ocrs or --features engine-leptess"
                        .to_string(),
                )
            })?;

        Ok(Self {
            engines,
            default_engine,
        })
    }

    /// Get an engine by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn TextRecognizer>> {
        self.engines.iter().find(|e| e.name() == name).cloned()
    }

    /// Get the default engine
    pub fn default_engine(&self) -> Option<Arc<dyn TextRecognizer>> {
        self.get(&self.default_engine)
    }

    /// Get the default engine name
    pub fn default_name(&self) -> &str {
        &self.default_engine
    }

    /// Resolve an optional engine name, falling back to the default
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn TextRecognizer>, OmrError> {
        match name {
            Some(name) => self
                .get(name)
                .ok_or_else(|| OmrError::UnknownEngine(name.to_string())),
            None => self.default_engine().ok_or_else(|| {
                OmrError::Internal("Default engine missing from registry".to_string())
            }),
        }
    }

    /// List all available engine names
    pub fn list(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Get info about all available engines
    pub fn info(&self) -> Vec<EngineInfo> {
        self.engines
            .iter()
            .map(|e| EngineInfo {
                name: e.name(),
                description: e.description(),
                supported_languages: e.supported_languages(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{OcrResult, RegionHint};
    use image::DynamicImage;

    struct Named(&'static str);

    impl TextRecognizer for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> &'static str {
            "test engine"
        }

        fn recognize(
            &self,
            _image: &DynamicImage,
            _hint: &RegionHint,
        ) -> Result<OcrResult, OmrError> {
            Ok(OcrResult {
                text: self.0.to_string(),
                confidence: 1.0,
            })
        }

        fn supported_languages(&self) -> Vec<String> {
            vec!["eng".to_string()]
        }
    }

    fn registry() -> EngineRegistry {
        EngineRegistry::from_engines(vec![Arc::new(Named("first")), Arc::new(Named("second"))])
            .unwrap()
    }

    #[test]
    fn test_first_engine_is_default() {
        let registry = registry();
        assert_eq!(registry.default_name(), "first");
        assert_eq!(registry.list(), vec!["first", "second"]);
    }

    #[test]
    fn test_resolve_by_name() {
        let registry = registry();
        assert_eq!(registry.resolve(Some("second")).unwrap().name(), "second");
        assert_eq!(registry.resolve(None).unwrap().name(), "first");
        assert!(matches!(
            registry.resolve(Some("missing")),
            Err(OmrError::UnknownEngine(_))
        ));
    }

    #[test]
    fn test_empty_registry_is_rejected() {
        assert!(EngineRegistry::from_engines(vec![]).is_err());
    }
}
