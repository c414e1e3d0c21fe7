#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # refmatch
//!
//! An object recognition service: a pretrained siamese convolutional encoder
//! maps images to 128-dimensional embeddings, and uploaded images are matched
//! against a labeled reference set by smallest Euclidean distance.
//!
//! At startup the service loads the encoder weights and embeds every image in
//! the reference directory tree (one subdirectory per class label). Each
//! `POST /predict` request embeds the uploaded image, scans the reference
//! embeddings linearly, and returns the closest label together with its
//! distance.
//!
//! ## Running the server
//!
//! ```rust,no_run
//! use refmatch::{create_router, AppState, Config};
//!
//! #[tokio::main]
//! async fn main() -> refmatch::Result<()> {
//!     refmatch::init()?;
//!     let config = Config::from_env()?;
//!     let state = AppState::load(config)?;
//!     let app = create_router(&state.config).with_state(state.clone());
//!     let listener = tokio::net::TcpListener::bind(state.config.bind_addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

/// HTTP routes, handlers, and wire types.
pub mod api;
/// The encoder and the reference index.
pub mod core;
/// Defines the application's error types and result aliases.
pub mod error;
/// Configuration and shared application state.
pub mod state;

// Public API exports
pub use crate::{
    api::{create_router, handlers::predict, health_check, responses::MatchResponse},
    core::{
        encoder::SiameseEncoder,
        index::{Match, ReferenceIndex},
    },
    error::{AppError, ErrorResponse, Result},
    state::{AppState, Config},
};

/// Initialize the application with default settings
///
/// Sets up logging. Call once, early in startup.
///
/// # Errors
///
/// Returns an error if logging initialization fails.
pub fn init() -> Result<()> {
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .init();

    log::info!("initializing refmatch");
    Ok(())
}
