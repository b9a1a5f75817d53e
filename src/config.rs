use crate::error::OmrError;
use crate::omr::OmrConfig;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "sheet-omr-server")]
#[command(about = "Answer sheet scanning and grading server")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OMR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OMR_PORT", default_value = "9393")]
    pub port: u16,

    /// Default language for text recognition (e.g., "eng", "sin")
    #[arg(long, env = "OMR_DEFAULT_LANGUAGE", default_value = "eng")]
    pub default_language: String,

    /// Maximum upload size in bytes (default: 50MB)
    #[arg(long, env = "OMR_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Path to tessdata directory (uses TESSDATA_PREFIX env var if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// JSON file overriding detection thresholds and sheet layout
    #[arg(long, env = "OMR_CONFIG")]
    pub omr_config: Option<PathBuf>,

    /// Directory for per-scan diagnostic images
    #[arg(long, env = "OMR_DEBUG_DIR")]
    pub debug_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub default_language: String,
    pub max_file_size: usize,
    pub tessdata_path: Option<String>,
    pub omr: Arc<OmrConfig>,
    pub debug_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9393,
            default_language: "eng".to_string(),
            max_file_size: 52_428_800,
            tessdata_path: None,
            omr: Arc::new(OmrConfig::default()),
            debug_dir: None,
        }
    }
}

impl TryFrom<Args> for Config {
    type Error = OmrError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let omr = match &args.omr_config {
            Some(path) => {
                tracing::info!("Loading detection settings from {}", path.display());
                OmrConfig::load(path)?
            }
            None => OmrConfig::default(),
        };

        Ok(Self {
            host: args.host,
            port: args.port,
            default_language: args.default_language,
            max_file_size: args.max_file_size,
            tessdata_path: args.tessdata_path,
            omr: Arc::new(omr),
            debug_dir: args.debug_dir,
        })
    }
}
