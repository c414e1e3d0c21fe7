use serde::{Deserialize, Serialize};

use crate::core::index::Match;

/// Wire sentinel for a non-finite distance. JSON has no Infinity literal, so
/// a degenerate comparison is reported as this value instead.
pub const DISTANCE_SENTINEL: f64 = f64::MAX;

/// Body of a successful predict response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    /// Label of the closest reference class, if any comparison won the scan.
    pub recognized_object: Option<String>,
    /// Distance to the closest reference embedding, or [`DISTANCE_SENTINEL`]
    /// when the true minimum was NaN or infinite.
    pub distance: f64,
}

impl MatchResponse {
    /// Convert a scan result into the wire format, coercing degenerate
    /// distances to the sentinel. A non-finite minimum is a low-confidence
    /// result, not an error; the tracked label is still reported.
    pub fn from_scan(best: Option<Match>) -> Self {
        match best {
            Some(m) if m.distance.is_finite() => Self {
                recognized_object: Some(m.label),
                distance: m.distance,
            },
            Some(m) => {
                log::warn!("non-finite match distance {} for label {}", m.distance, m.label);
                Self {
                    recognized_object: Some(m.label),
                    distance: DISTANCE_SENTINEL,
                }
            }
            None => {
                log::warn!("nearest-match scan produced no finite comparison");
                Self {
                    recognized_object: None,
                    distance: DISTANCE_SENTINEL,
                }
            }
        }
    }
}
