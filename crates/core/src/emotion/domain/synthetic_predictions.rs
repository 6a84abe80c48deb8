use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::emotion::Emotion;
use super::prediction::{ExpressionScores, PredictionSet};

/// Maximum absolute noise added to each baseline confidence.
pub const NOISE_AMPLITUDE: f32 = 0.05;

/// Generates plausible placeholder predictions when no real detection is
/// available: each label's baseline confidence plus independent uniform
/// noise in `[-NOISE_AMPLITUDE, +NOISE_AMPLITUDE]`, clamped to `[0, 1]`.
pub struct SyntheticPredictions {
    rng: StdRng,
}

impl SyntheticPredictions {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for reproducible runs and tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self, timestamp: DateTime<Utc>) -> PredictionSet {
        let scores: ExpressionScores = Emotion::ALL
            .into_iter()
            .map(|emotion| {
                let noise = self.rng.gen_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE);
                (emotion, emotion.baseline_confidence() + noise)
            })
            .collect();
        PredictionSet::from_scores(&scores, timestamp)
    }
}

impl Default for SyntheticPredictions {
    fn default() -> Self {
        Self::new()
    }
}
