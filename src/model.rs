//! JSON shapes returned to callers.
//!
//! Signatures are rendered as decimal strings: they are full 64-bit values
//! and JSON consumers that read numbers as doubles would corrupt them.

use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::query::SimilarMatch;
use crate::resolve::ResolvedSample;
use crate::service::SimilarResult;

pub const NO_MATCHES_MESSAGE: &str = "no matches";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureResponse {
    pub point: [i32; 3],
    pub signature: String,
}

impl From<&ResolvedSample> for SignatureResponse {
    fn from(sample: &ResolvedSample) -> Self {
        Self {
            point: sample.point.to_array(),
            signature: sample.signature.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub point: [i32; 3],
    pub dist: u32,
    pub score: f64,
}

impl From<&SimilarMatch> for MatchResponse {
    fn from(m: &SimilarMatch) -> Self {
        Self {
            point: m.point.to_array(),
            dist: m.dist,
            score: m.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchesResponse {
    pub matches: Vec<MatchResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&SimilarResult> for MatchesResponse {
    fn from(result: &SimilarResult) -> Self {
        let matches: Vec<MatchResponse> = result.matches.iter().map(MatchResponse::from).collect();
        let message = matches
            .is_empty()
            .then(|| NO_MATCHES_MESSAGE.to_string());
        Self { matches, message }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub not_found: bool,
}

impl From<&LookupError> for ErrorResponse {
    fn from(err: &LookupError) -> Self {
        Self {
            message: err.to_string(),
            not_found: err.is_not_found(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigsearch_core::Point;

    #[test]
    fn test_signature_response_json() {
        let sample = ResolvedSample {
            point: Point::new(18416, 16369, 26467),
            signature: i64::MIN,
            distance: 0.0,
        };
        let json = serde_json::to_value(SignatureResponse::from(&sample)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"point": [18416, 16369, 26467], "signature": "-9223372036854775808"})
        );
    }

    #[test]
    fn test_empty_matches_carry_message() {
        let empty = SimilarResult {
            point: Point::new(0, 0, 0),
            signature: 1,
            matches: Vec::new(),
        };
        let json = serde_json::to_value(MatchesResponse::from(&empty)).unwrap();
        assert_eq!(json, serde_json::json!({"matches": [], "message": "no matches"}));

        let full = SimilarResult {
            matches: vec![SimilarMatch {
                point: Point::new(1, 2, 3),
                dist: 2,
                score: 0.75,
            }],
            ..empty
        };
        let json = serde_json::to_value(MatchesResponse::from(&full)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"matches": [{"point": [1, 2, 3], "dist": 2, "score": 0.75}]})
        );
    }
}
