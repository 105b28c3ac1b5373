use async_trait::async_trait;

use crate::attendance::error::AttendanceError;

/// Accept/reject decision from comparing a live sample against the enrolled
/// reference. Confidence is normalized to [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct BiometricCheck {
    pub is_match: bool,
    pub confidence: f64,
}

/// Pluggable comparison backend. Deployments wire in an external face-match
/// model here; the service only applies the threshold policy on top.
#[async_trait]
pub trait BiometricVerifier: Send + Sync {
    async fn verify(
        &self,
        sample: &[f32],
        reference: &[f32],
        threshold: f64,
    ) -> Result<BiometricCheck, AttendanceError>;
}

/// Default backend: cosine similarity between the two encodings, clamped to
/// [0, 1]. Mismatched encoding lengths and degenerate (all-zero) vectors
/// score a confidence of 0.
pub struct CosineVerifier;

impl CosineVerifier {
    pub fn confidence(sample: &[f32], reference: &[f32]) -> f64 {
        if sample.is_empty() || sample.len() != reference.len() {
            return 0.0;
        }
        let mut dot = 0.0f64;
        let mut norm_s = 0.0f64;
        let mut norm_r = 0.0f64;
        for (a, b) in sample.iter().zip(reference) {
            dot += f64::from(*a) * f64::from(*b);
            norm_s += f64::from(*a) * f64::from(*a);
            norm_r += f64::from(*b) * f64::from(*b);
        }
        if norm_s == 0.0 || norm_r == 0.0 {
            return 0.0;
        }
        (dot / (norm_s.sqrt() * norm_r.sqrt())).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl BiometricVerifier for CosineVerifier {
    async fn verify(
        &self,
        sample: &[f32],
        reference: &[f32],
        threshold: f64,
    ) -> Result<BiometricCheck, AttendanceError> {
        let confidence = Self::confidence(sample, reference);
        Ok(BiometricCheck {
            is_match: confidence >= threshold,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify(sample: &[f32], reference: &[f32], threshold: f64) -> BiometricCheck {
        futures::executor::block_on(CosineVerifier.verify(sample, reference, threshold)).unwrap()
    }

    #[test]
    fn identical_encodings_match_with_full_confidence() {
        let enc = [0.3, -0.1, 0.9, 0.2];
        let check = verify(&enc, &enc, 0.8);
        assert!(check.is_match);
        assert!((check.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_encodings_score_zero() {
        let check = verify(&[1.0, 0.0], &[0.0, 1.0], 0.8);
        assert!(!check.is_match);
        assert_eq!(check.confidence, 0.0);
    }

    #[test]
    fn confidence_below_threshold_is_rejected() {
        let sample = [1.0, 0.0];
        let reference = [0.75, (1.0f32 - 0.75 * 0.75).sqrt()];
        let check = verify(&sample, &reference, 0.8);
        assert!((check.confidence - 0.75).abs() < 1e-6);
        assert!(!check.is_match);
    }

    #[test]
    fn confidence_above_threshold_is_accepted() {
        let sample = [1.0, 0.0];
        let reference = [0.85, (1.0f32 - 0.85 * 0.85).sqrt()];
        let check = verify(&sample, &reference, 0.8);
        assert!((check.confidence - 0.85).abs() < 1e-6);
        assert!(check.is_match);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let enc = [1.0, 1.0, 1.0];
        let check = verify(&enc, &enc, 1.0);
        assert!(check.is_match);
    }

    #[test]
    fn length_mismatch_scores_zero() {
        let check = verify(&[1.0, 0.0, 0.0], &[1.0, 0.0], 0.5);
        assert!(!check.is_match);
        assert_eq!(check.confidence, 0.0);
    }

    #[test]
    fn zero_vector_scores_zero() {
        let check = verify(&[0.0, 0.0], &[1.0, 0.0], 0.5);
        assert_eq!(check.confidence, 0.0);
    }
}
