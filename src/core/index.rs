use std::path::Path;

use ndarray::Array1;

use crate::core::encoder::SiameseEncoder;
use crate::error::{AppError, Result};

/// One indexed reference image.
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    /// File name of the source image, kept for logging.
    pub name: String,
    /// Class label, taken from the containing directory's name.
    pub label: String,
    /// Embedding computed by the shared encoder.
    pub embedding: Array1<f32>,
}

/// Result of a nearest-match scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Label of the closest reference entry.
    pub label: String,
    /// Euclidean distance to that entry.
    pub distance: f64,
}

/// Read-only set of reference embeddings, built once at startup.
///
/// The tree under the root directory has one immediate subdirectory per class
/// label, each containing reference images for that label. The index is never
/// mutated after construction, so handlers can read it concurrently without
/// synchronization.
#[derive(Debug)]
pub struct ReferenceIndex {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceIndex {
    /// Walk the reference directory tree and embed every readable image.
    ///
    /// A file that fails to read or decode is logged and skipped; an index
    /// that ends up empty is a fatal misconfiguration and fails construction.
    pub fn build<P: AsRef<Path>>(root: P, encoder: &SiameseEncoder) -> Result<Self> {
        let root = root.as_ref();
        let mut entries = Vec::new();

        for class_dir in std::fs::read_dir(root)? {
            let class_dir = class_dir?;
            if !class_dir.file_type()?.is_dir() {
                continue;
            }
            let label = class_dir.file_name().to_string_lossy().into_owned();

            for file in std::fs::read_dir(class_dir.path())? {
                let file = file?;
                if !file.file_type()?.is_file() {
                    continue;
                }
                let path = file.path();
                let name = file.file_name().to_string_lossy().into_owned();

                match Self::embed_file(&path, encoder) {
                    Ok(embedding) => entries.push(ReferenceEntry {
                        name,
                        label: label.clone(),
                        embedding,
                    }),
                    Err(e) => {
                        log::warn!("skipping reference image {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::from_entries(entries)
    }

    /// Build an index from precomputed entries. Scan order follows entry
    /// order; an empty set is rejected.
    pub fn from_entries(entries: Vec<ReferenceEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(AppError::Config(
                "no reference images could be indexed".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    fn embed_file(path: &Path, encoder: &SiameseEncoder) -> Result<Array1<f32>> {
        let data = std::fs::read(path)?;
        let img = image::load_from_memory(&data)?;
        encoder.embed(&img)
    }

    /// Number of indexed reference images.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed index; kept for API completeness.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Linear scan for the reference entry closest to `query`.
    ///
    /// Strict `<` comparison: the first minimal distance wins ties, and a NaN
    /// distance can never displace the running minimum. Returns `None` only
    /// when no comparison ever produced a finite winner.
    pub fn nearest(&self, query: &Array1<f32>) -> Option<Match> {
        let mut best_label: Option<&str> = None;
        let mut min_distance = f64::INFINITY;

        for entry in &self.entries {
            let distance = euclidean_distance(query, &entry.embedding);
            if distance < min_distance {
                min_distance = distance;
                best_label = Some(&entry.label);
            }
        }

        best_label.map(|label| Match {
            label: label.to_string(),
            distance: min_distance,
        })
    }
}

/// Unnormalized Euclidean distance between two embeddings.
pub fn euclidean_distance(a: &Array1<f32>, b: &Array1<f32>) -> f64 {
    let diff = a - b;
    (diff.dot(&diff) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::encoder::EMBEDDING_DIM;
    use crate::core::test_util::{gradient_image, test_encoder};
    use std::fs;

    fn entry(label: &str, value: f32) -> ReferenceEntry {
        ReferenceEntry {
            name: format!("{label}.png"),
            label: label.to_string(),
            embedding: Array1::from_elem(EMBEDDING_DIM, value),
        }
    }

    #[test]
    fn builds_index_from_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("cup")).unwrap();
        fs::create_dir(dir.path().join("plate")).unwrap();
        gradient_image(40, 40, 10)
            .save(dir.path().join("cup/cup1.png"))
            .unwrap();
        gradient_image(40, 40, 240)
            .save(dir.path().join("plate/plate1.png"))
            .unwrap();

        let index = ReferenceIndex::build(dir.path(), test_encoder()).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn corrupt_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("cup")).unwrap();
        gradient_image(40, 40, 10)
            .save(dir.path().join("cup/cup1.png"))
            .unwrap();
        fs::write(dir.path().join("cup/broken.jpg"), b"not an image").unwrap();

        let index = ReferenceIndex::build(dir.path(), test_encoder()).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn empty_tree_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("cup")).unwrap();

        let result = ReferenceIndex::build(dir.path(), test_encoder());
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn missing_root_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReferenceIndex::build(dir.path().join("gone"), test_encoder());
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[test]
    fn from_entries_rejects_empty_set() {
        assert!(matches!(
            ReferenceIndex::from_entries(Vec::new()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn identical_query_matches_its_own_label_at_distance_zero() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("cup")).unwrap();
        fs::create_dir(dir.path().join("plate")).unwrap();
        let query_path = dir.path().join("cup/cup1.png");
        gradient_image(40, 40, 10).save(&query_path).unwrap();
        gradient_image(40, 40, 240)
            .save(dir.path().join("plate/plate1.png"))
            .unwrap();

        let encoder = test_encoder();
        let index = ReferenceIndex::build(dir.path(), encoder).unwrap();
        let query = image::load_from_memory(&fs::read(&query_path).unwrap()).unwrap();
        let best = index.nearest(&encoder.embed(&query).unwrap()).unwrap();

        assert_eq!(best.label, "cup");
        assert!(best.distance < 1e-3, "distance was {}", best.distance);
    }

    #[test]
    fn first_minimal_entry_wins_ties() {
        let index =
            ReferenceIndex::from_entries(vec![entry("first", 1.0), entry("second", 1.0)]).unwrap();
        let query = Array1::from_elem(EMBEDDING_DIM, 0.0);

        let best = index.nearest(&query).unwrap();
        assert_eq!(best.label, "first");
    }

    #[test]
    fn nan_embedding_never_wins_the_scan() {
        let mut bad = entry("bad", 0.0);
        bad.embedding[0] = f32::NAN;
        let index = ReferenceIndex::from_entries(vec![bad, entry("good", 2.0)]).unwrap();
        let query = Array1::from_elem(EMBEDDING_DIM, 0.0);

        let best = index.nearest(&query).unwrap();
        assert_eq!(best.label, "good");
        assert!(best.distance.is_finite());
    }

    #[test]
    fn all_nan_scan_yields_no_match() {
        let mut bad = entry("bad", 0.0);
        bad.embedding[0] = f32::NAN;
        let index = ReferenceIndex::from_entries(vec![bad]).unwrap();
        let query = Array1::from_elem(EMBEDDING_DIM, 0.0);

        assert!(index.nearest(&query).is_none());
    }

    #[test]
    fn euclidean_distance_is_nonnegative_and_symmetric() {
        let a = Array1::from_elem(EMBEDDING_DIM, 1.5);
        let b = Array1::from_elem(EMBEDDING_DIM, -0.5);
        let d = euclidean_distance(&a, &b);
        assert!(d > 0.0);
        assert!((d - euclidean_distance(&b, &a)).abs() < 1e-9);
        assert_eq!(euclidean_distance(&a, &a), 0.0);
    }
}
