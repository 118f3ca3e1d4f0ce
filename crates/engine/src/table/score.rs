//! Score math shared by the similarity scan
//!
//! All scores are "higher = more similar". No implicit normalization of
//! vectors: lengths are used as stored.

use simdb_core::ScoreFormula;

/// Dot product (inner product)
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Squared Euclidean length, as stored after each record's marker
pub fn squared_length(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum()
}

/// Turn a dot product and both squared lengths into a score
///
/// Returns 0.0 if either vector has zero length, or if the lengths or the
/// score overflow `f32` (components large enough to square past `f32::MAX`).
pub fn finalize(dot: f32, squared_len_a: f32, squared_len_b: f32, formula: ScoreFormula) -> f32 {
    if !(squared_len_a > 0.0 && squared_len_a.is_finite())
        || !(squared_len_b > 0.0 && squared_len_b.is_finite())
    {
        return 0.0;
    }
    let score = match formula {
        ScoreFormula::SquaredCosine => dot * dot / squared_len_a / squared_len_b,
        ScoreFormula::Cosine => dot / (squared_len_a.sqrt() * squared_len_b.sqrt()),
    };
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Score two vectors directly
pub fn similarity(a: &[f32], b: &[f32], formula: ScoreFormula) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Dimension mismatch in score computation");
    finalize(
        dot_product(a, b),
        squared_length(a),
        squared_length(b),
        formula,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors_score_one() {
        let v = [0.6, 0.8];
        assert!((similarity(&v, &v, ScoreFormula::SquaredCosine) - 1.0).abs() < 1e-6);
        assert!((similarity(&v, &v, ScoreFormula::Cosine) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_squared_cosine_is_cosine_squared() {
        let a = [0.6, 0.8];
        let b = [0.0, 1.0];
        let cosine = similarity(&a, &b, ScoreFormula::Cosine);
        let squared = similarity(&a, &b, ScoreFormula::SquaredCosine);
        assert!((cosine - 0.8).abs() < 1e-6);
        assert!((squared - 0.64).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!(similarity(&a, &b, ScoreFormula::SquaredCosine).abs() < 1e-6);
        assert!(similarity(&a, &b, ScoreFormula::Cosine).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_handling() {
        let zero = [0.0, 0.0];
        let nonzero = [0.5, 0.5];
        assert_eq!(similarity(&zero, &nonzero, ScoreFormula::SquaredCosine), 0.0);
        assert_eq!(similarity(&nonzero, &zero, ScoreFormula::Cosine), 0.0);
        assert_eq!(similarity(&zero, &zero, ScoreFormula::Cosine), 0.0);
    }

    #[test]
    fn test_overflowing_lengths_score_zero() {
        let huge = [1e20, 1e20];
        let small = [0.5, 0.5];
        assert!(squared_length(&huge).is_infinite());
        for formula in [ScoreFormula::SquaredCosine, ScoreFormula::Cosine] {
            assert_eq!(similarity(&huge, &small, formula), 0.0);
            assert_eq!(similarity(&small, &huge, formula), 0.0);
            assert_eq!(similarity(&huge, &huge, formula), 0.0);
        }
        // Finite lengths whose product still overflows
        assert_eq!(finalize(f32::MAX, 1e30, 1e30, ScoreFormula::SquaredCosine), 0.0);
    }

    #[test]
    fn test_squared_cosine_loses_sign() {
        let a = [1.0, 0.0];
        let b = [-1.0, 0.0];
        assert!((similarity(&a, &b, ScoreFormula::SquaredCosine) - 1.0).abs() < 1e-6);
        assert!((similarity(&a, &b, ScoreFormula::Cosine) + 1.0).abs() < 1e-6);
    }
}
