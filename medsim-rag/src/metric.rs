//! Distance metrics used to rank stored vectors against a query.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// How a collection measures the distance between two embeddings.
///
/// Every variant is a *distance*: lower values mean more similar vectors.
/// Scores surfaced by the retriever are raw values of this function, so their
/// range depends on the metric (`Cosine` lies in `[0, 2]`, `SquaredL2` in
/// `[0, 4]` for unit vectors).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`.
    #[default]
    Cosine,
    /// `Σ (a_i - b_i)²`.
    #[serde(rename = "l2")]
    SquaredL2,
    /// `1 - a · b`; equals cosine distance on unit vectors.
    #[serde(rename = "ip")]
    InnerProduct,
}

impl DistanceMetric {
    /// Distance between `a` and `b`. Vectors of different length get `f32::MAX`.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return f32::MAX;
        }
        match self {
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
            }
            Self::SquaredL2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Self::InnerProduct => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }

    /// Always `true`; kept explicit so callers can assert the ordering they rely on.
    pub fn lower_is_better(&self) -> bool {
        true
    }

    /// Identifier used in configuration and on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::SquaredL2 => "l2",
            Self::InnerProduct => "ip",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::SquaredL2),
            "ip" | "inner_product" | "dot" => Ok(Self::InnerProduct),
            other => Err(RagError::Config(format!(
                "unknown distance metric '{other}' (expected cosine, l2 or ip)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_zero_distance() {
        let v = [0.6, 0.8];
        for metric in [DistanceMetric::Cosine, DistanceMetric::SquaredL2, DistanceMetric::InnerProduct]
        {
            assert!(metric.distance(&v, &v).abs() < 1e-6, "{metric}");
        }
    }

    #[test]
    fn opposite_vectors_are_farthest_under_cosine() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((d - 2.0).abs() < 1e-6);
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("COSINE".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("euclidean".parse::<DistanceMetric>().unwrap(), DistanceMetric::SquaredL2);
        assert_eq!("dot".parse::<DistanceMetric>().unwrap(), DistanceMetric::InnerProduct);
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn serializes_with_short_names() {
        assert_eq!(serde_json::to_string(&DistanceMetric::SquaredL2).unwrap(), "\"l2\"");
        assert_eq!(serde_json::to_string(&DistanceMetric::Cosine).unwrap(), "\"cosine\"");
    }
}
