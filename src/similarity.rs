use crate::error::ScoringError;
use crate::model::Report;
use crate::vectors::{DenseVector, SparseVector};

/// Cosine similarity of two lexical vectors. Both must come from the same
/// fitted vocabulary; that is not checked here.
pub fn tfidf_similarity(left: &SparseVector, right: &SparseVector) -> f64 {
    let denominator = left.norm() * right.norm();
    if denominator <= 0.0 {
        return 0.0;
    }

    (left.dot(right) / denominator).clamp(-1.0, 1.0)
}

pub fn embedding_similarity(left: &DenseVector, right: &DenseVector) -> Result<f64, ScoringError> {
    if left.len() != right.len() {
        return Err(ScoringError::DimensionMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    if left.is_empty() {
        return Ok(0.0);
    }

    let (dot, left_norm, right_norm) = left.as_slice().iter().zip(right.as_slice()).fold(
        (0.0_f64, 0.0_f64, 0.0_f64),
        |(dot, left_norm, right_norm), (left_value, right_value)| {
            let left_value = f64::from(*left_value);
            let right_value = f64::from(*right_value);
            (
                dot + left_value * right_value,
                left_norm + left_value * left_value,
                right_norm + right_value * right_value,
            )
        },
    );

    let denominator = left_norm.sqrt() * right_norm.sqrt();
    if denominator <= 0.0 {
        return Ok(0.0);
    }

    Ok((dot / denominator).clamp(-1.0, 1.0))
}

pub fn categorical_similarity(left: &Report, right: &Report) -> f64 {
    let mut score = 0.0;
    if left.product == right.product {
        score += 0.5;
    }
    if left.component == right.component {
        score += 0.5;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::report;

    const TOLERANCE: f64 = 1e-6;

    #[test]
    fn tfidf_self_similarity_is_one() {
        let vectors = [
            SparseVector::new(8, vec![(0, 0.3), (5, 0.7)]),
            SparseVector::new(1000, vec![(999, 12.0)]),
            SparseVector::new(4, vec![(0, 1.0), (1, 1.0), (2, 1.0), (3, 1.0)]),
        ];
        for vector in &vectors {
            assert!((tfidf_similarity(vector, vector) - 1.0).abs() < TOLERANCE);
        }
    }

    #[test]
    fn tfidf_similarity_is_zero_for_disjoint_or_empty_vectors() {
        let left = SparseVector::new(8, vec![(0, 0.3), (1, 0.7)]);
        let right = SparseVector::new(8, vec![(2, 0.3), (3, 0.7)]);
        assert_eq!(tfidf_similarity(&left, &right), 0.0);
        assert_eq!(tfidf_similarity(&left, &SparseVector::default()), 0.0);
    }

    #[test]
    fn tfidf_similarity_matches_hand_computed_cosine() {
        let left = SparseVector::new(3, vec![(0, 1.0), (1, 1.0)]);
        let right = SparseVector::new(3, vec![(1, 1.0), (2, 1.0)]);
        assert!((tfidf_similarity(&left, &right) - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn embedding_self_similarity_is_one() {
        let vector = DenseVector::new(vec![0.2, -0.4, 0.9, 0.05]);
        let score = embedding_similarity(&vector, &vector).expect("same length");
        assert!((score - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn embedding_similarity_of_opposite_vectors_is_minus_one() {
        let left = DenseVector::new(vec![1.0, 2.0]);
        let right = DenseVector::new(vec![-1.0, -2.0]);
        let score = embedding_similarity(&left, &right).expect("same length");
        assert!((score + 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn embedding_similarity_rejects_dimension_mismatch() {
        let left = DenseVector::new(vec![1.0, 2.0, 3.0]);
        let right = DenseVector::new(vec![1.0, 2.0]);
        let error = embedding_similarity(&left, &right).expect_err("lengths differ");
        assert!(matches!(
            error,
            ScoringError::DimensionMismatch { left: 3, right: 2 }
        ));
    }

    #[test]
    fn categorical_similarity_is_symmetric_and_discrete() {
        let products = ["P1", "P2", "p1"];
        let components = ["C1", "C2"];
        let mut reports = Vec::new();
        let mut id = 1;
        for product in products {
            for component in components {
                reports.push(report(id, product, component, "dev"));
                id += 1;
            }
        }

        for left in &reports {
            for right in &reports {
                let forward = categorical_similarity(left, right);
                assert_eq!(forward, categorical_similarity(right, left));
                assert!([0.0, 0.5, 1.0].contains(&forward));
            }
        }
    }

    #[test]
    fn categorical_similarity_is_case_sensitive() {
        let left = report(1, "Firefox", "Networking", "dev");
        let right = report(2, "firefox", "Networking", "dev");
        assert_eq!(categorical_similarity(&left, &right), 0.5);
        assert_eq!(
            categorical_similarity(&left, &report(3, "Firefox", "Networking", "x")),
            1.0
        );
        assert_eq!(
            categorical_similarity(&left, &report(4, "Core", "DOM", "x")),
            0.0
        );
    }
}
