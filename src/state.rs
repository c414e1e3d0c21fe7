use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::encoder::SiameseEncoder;
use crate::core::index::ReferenceIndex;
use crate::error::{AppError, Result};

/// Configuration for the application
#[derive(Clone, Debug)]
pub struct Config {
    /// Root directory of the reference image tree (one subdirectory per label)
    pub dataset_dir: PathBuf,
    /// Path to the encoder weights (safetensors)
    pub weights_path: PathBuf,
    /// Socket address the server binds to
    pub bind_addr: SocketAddr,
    /// Maximum request body size in bytes
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("dataset"),
            weights_path: PathBuf::from("siamese_model.safetensors"),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_upload_bytes: 25 * 1024 * 1024, // 25MB
        }
    }
}

impl Config {
    /// Read configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `REFMATCH_DATASET_DIR`, `REFMATCH_WEIGHTS`,
    /// `REFMATCH_ADDR`, `REFMATCH_MAX_UPLOAD_BYTES`. A `.env` file is honored
    /// if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let dataset_dir = std::env::var("REFMATCH_DATASET_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.dataset_dir);
        let weights_path = std::env::var("REFMATCH_WEIGHTS")
            .map(PathBuf::from)
            .unwrap_or(defaults.weights_path);
        let bind_addr = match std::env::var("REFMATCH_ADDR") {
            Ok(addr) => addr
                .parse()
                .map_err(|e| AppError::Config(format!("invalid REFMATCH_ADDR {addr:?}: {e}")))?,
            Err(_) => defaults.bind_addr,
        };
        let max_upload_bytes = match std::env::var("REFMATCH_MAX_UPLOAD_BYTES") {
            Ok(value) => value.parse().map_err(|e| {
                AppError::Config(format!("invalid REFMATCH_MAX_UPLOAD_BYTES {value:?}: {e}"))
            })?,
            Err(_) => defaults.max_upload_bytes,
        };

        Ok(Self {
            dataset_dir,
            weights_path,
            bind_addr,
            max_upload_bytes,
        })
    }

    /// Fail fast on paths that must exist before serving can start.
    pub fn validate(&self) -> Result<()> {
        if !self.dataset_dir.is_dir() {
            return Err(AppError::Config(format!(
                "reference dataset directory {} does not exist",
                self.dataset_dir.display()
            )));
        }
        if !self.weights_path.is_file() {
            return Err(AppError::Config(format!(
                "encoder weights file {} does not exist",
                self.weights_path.display()
            )));
        }
        Ok(())
    }
}

/// Application state shared across handlers.
///
/// Built once at startup and read-only thereafter; handlers only ever read
/// the encoder and the index, so no synchronization is needed.
#[derive(Debug)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Shared encoder instance
    pub encoder: SiameseEncoder,
    /// Reference embeddings, populated at startup
    pub index: ReferenceIndex,
}

impl AppState {
    /// Validate the configuration, load the encoder, and build the reference
    /// index. Any failure here is startup-fatal.
    pub fn load(config: Config) -> Result<Arc<Self>> {
        config.validate()?;

        log::info!("loading encoder weights from {}", config.weights_path.display());
        let encoder = SiameseEncoder::load(&config.weights_path)?;

        log::info!("indexing reference images under {}", config.dataset_dir.display());
        let index = ReferenceIndex::build(&config.dataset_dir, &encoder)?;
        log::info!("indexed {} reference images", index.len());

        Ok(Arc::new(Self {
            config,
            encoder,
            index,
        }))
    }

    /// Assemble state from already constructed parts.
    pub fn from_parts(config: Config, encoder: SiameseEncoder, index: ReferenceIndex) -> Arc<Self> {
        Arc::new(Self {
            config,
            encoder,
            index,
        })
    }
}
