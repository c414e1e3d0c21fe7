//! Core functionality: the image encoder and the reference index it feeds.

/// The siamese encoder's single-branch inference path.
pub mod encoder;
/// In-memory reference embeddings and the nearest-match scan.
pub mod index;
