use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::emotion::Emotion;

/// Confidence for one emotion label at one capture instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub emotion: Emotion,
    pub confidence: f32,
    /// Serialized as integer epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Prediction {
    pub fn new(emotion: Emotion, confidence: f32, timestamp: DateTime<Utc>) -> Self {
        Self {
            emotion,
            confidence,
            timestamp,
        }
    }

    /// Confidence as a percentage (0-100).
    pub fn percent(&self) -> f32 {
        self.confidence * 100.0
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PredictionSetError {
    #[error("label {0} appears more than once")]
    DuplicateLabel(Emotion),
    #[error("confidence {value} for {emotion} is outside [0, 1]")]
    ConfidenceOutOfRange { emotion: Emotion, value: f32 },
}

/// Per-label scores for a single detected face, as reported by a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionScores(BTreeMap<Emotion, f32>);

impl ExpressionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the score for `emotion`, replacing any earlier value.
    pub fn set(&mut self, emotion: Emotion, score: f32) {
        self.0.insert(emotion, score);
    }

    /// Adds `score` onto the existing value for `emotion`.
    pub fn add(&mut self, emotion: Emotion, score: f32) {
        *self.0.entry(emotion).or_insert(0.0) += score;
    }

    pub fn get(&self, emotion: Emotion) -> Option<f32> {
        self.0.get(&emotion).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        self.0.iter().map(|(e, s)| (*e, *s))
    }
}

impl FromIterator<(Emotion, f32)> for ExpressionScores {
    fn from_iter<I: IntoIterator<Item = (Emotion, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Ranked predictions from one inference call.
///
/// Always sorted by descending confidence with unique labels; ties are
/// ordered by label so the ranking is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Prediction>", into = "Vec<Prediction>")]
pub struct PredictionSet(Vec<Prediction>);

impl PredictionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validates and ranks `predictions`.
    pub fn new(mut predictions: Vec<Prediction>) -> Result<Self, PredictionSetError> {
        for (i, p) in predictions.iter().enumerate() {
            if !(0.0..=1.0).contains(&p.confidence) {
                return Err(PredictionSetError::ConfidenceOutOfRange {
                    emotion: p.emotion,
                    value: p.confidence,
                });
            }
            if predictions[..i].iter().any(|q| q.emotion == p.emotion) {
                return Err(PredictionSetError::DuplicateLabel(p.emotion));
            }
        }
        predictions.sort_by(rank);
        Ok(Self(predictions))
    }

    /// Ranks model scores, clamping each into `[0, 1]` (NaN becomes 0) and
    /// stamping every entry with `timestamp`.
    pub fn from_scores(scores: &ExpressionScores, timestamp: DateTime<Utc>) -> Self {
        let mut predictions: Vec<Prediction> = scores
            .iter()
            .map(|(emotion, score)| {
                let confidence = if score.is_nan() {
                    0.0
                } else {
                    score.clamp(0.0, 1.0)
                };
                Prediction::new(emotion, confidence, timestamp)
            })
            .collect();
        predictions.sort_by(rank);
        Self(predictions)
    }

    /// The highest-confidence prediction, if any.
    pub fn top(&self) -> Option<&Prediction> {
        self.0.first()
    }

    pub fn confidence_of(&self, emotion: Emotion) -> Option<f32> {
        self.0
            .iter()
            .find(|p| p.emotion == emotion)
            .map(|p| p.confidence)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Prediction] {
        &self.0
    }
}

fn rank(a: &Prediction, b: &Prediction) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
        .then(a.emotion.cmp(&b.emotion))
}

impl TryFrom<Vec<Prediction>> for PredictionSet {
    type Error = PredictionSetError;

    fn try_from(predictions: Vec<Prediction>) -> Result<Self, Self::Error> {
        Self::new(predictions)
    }
}

impl From<PredictionSet> for Vec<Prediction> {
    fn from(set: PredictionSet) -> Self {
        set.0
    }
}

impl<'a> IntoIterator for &'a PredictionSet {
    type Item = &'a Prediction;
    type IntoIter = std::slice::Iter<'a, Prediction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
