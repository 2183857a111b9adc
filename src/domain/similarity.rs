//! Vector and string similarity primitives used by the ranker.

use super::errors::DomainError;

/// Cosine of the angle between two equally sized vectors.
///
/// Returns `0.0` when either vector has zero magnitude, so a degenerate
/// embedding never turns an aggregate score into `NaN`.
pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, DomainError> {
    if query.len() != candidate.len() {
        return Err(DomainError::dimension_mismatch(query.len(), candidate.len()));
    }

    let mut dot = 0.0f32;
    let mut q_norm = 0.0f32;
    let mut c_norm = 0.0f32;

    for (q, c) in query.iter().zip(candidate.iter()) {
        dot += q * c;
        q_norm += q * q;
        c_norm += c * c;
    }

    let denom = q_norm.sqrt() * c_norm.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Ok(0.0);
    }

    let cosine = dot / denom;
    if cosine.is_finite() {
        Ok(cosine.clamp(-1.0, 1.0))
    } else {
        Ok(0.0)
    }
}

/// Minimum number of single-character inserts, deletes and substitutions
/// turning `a` into `b`. Operates on chars, not bytes.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();

    let mut dp: Vec<usize> = (0..=b_len).collect();
    for (i, ac) in a.chars().enumerate() {
        let mut prev = dp[0];
        dp[0] = i + 1;

        for (j, bc) in b_chars.iter().enumerate() {
            let temp = dp[j + 1];
            let cost = usize::from(ac != *bc);
            dp[j + 1] = (dp[j + 1] + 1).min(dp[j] + 1).min(prev + cost);
            prev = temp;
        }
    }

    dp[b_len]
}

/// `1 - distance / max(len(a), len(b))`, in `[0, 1]`. Two empty strings are identical.
pub fn edit_similarity(a: &str, b: &str) -> f32 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f32 / longest as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_are_fully_similar() {
        let v = [0.3, -1.2, 4.0];
        let score = cosine_similarity(&v, &v).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_and_opposite_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
        let opposite = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]).unwrap();
        assert!((opposite + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_yields_zero_not_nan() {
        let score = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert_eq!(score, 0.0);
        let score = cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn mismatched_lengths_fail_fast() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            DomainError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn levenshtein_known_distances() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("flaw", "lawn"), 2);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn levenshtein_counts_chars_not_bytes() {
        assert_eq!(levenshtein_distance("café", "cafe"), 1);
        assert_eq!(levenshtein_distance("naïve", "naive"), 1);
    }

    #[test]
    fn edit_similarity_is_normalised() {
        assert_eq!(edit_similarity("", ""), 1.0);
        assert_eq!(edit_similarity("abc", "abc"), 1.0);
        assert_eq!(edit_similarity("abc", "xyz"), 0.0);
        // kitten -> sitting: 3 edits over 7 chars
        let expected = 1.0 - 3.0 / 7.0;
        assert!((edit_similarity("kitten", "sitting") - expected).abs() < 1e-6);
    }
}
