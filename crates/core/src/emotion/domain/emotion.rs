use serde::{Deserialize, Serialize};

/// The closed set of facial expressions the system reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgusted,
    Fearful,
    Happy,
    Neutral,
    Sad,
    Surprised,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgusted,
        Emotion::Fearful,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprised,
    ];

    /// Lowercase wire label (`"happy"`, `"sad"`, ...).
    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgusted => "disgusted",
            Emotion::Fearful => "fearful",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprised => "surprised",
        }
    }

    pub fn from_label(label: &str) -> Option<Emotion> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.label().eq_ignore_ascii_case(label))
    }

    /// Confidence used for this label when synthesizing placeholder output.
    pub fn baseline_confidence(self) -> f32 {
        match self {
            Emotion::Happy => 0.72,
            Emotion::Neutral => 0.15,
            Emotion::Surprised => 0.08,
            Emotion::Sad => 0.03,
            Emotion::Angry => 0.01,
            Emotion::Fearful => 0.01,
            Emotion::Disgusted => 0.00,
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Emotion::Angry => write!(f, "Angry"),
            Emotion::Disgusted => write!(f, "Disgusted"),
            Emotion::Fearful => write!(f, "Fearful"),
            Emotion::Happy => write!(f, "Happy"),
            Emotion::Neutral => write!(f, "Neutral"),
            Emotion::Sad => write!(f, "Sad"),
            Emotion::Surprised => write!(f, "Surprised"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case("happy", Some(Emotion::Happy))]
    #[case("Surprised", Some(Emotion::Surprised))]
    #[case("FEARFUL", Some(Emotion::Fearful))]
    #[case("contempt", None)]
    #[case("", None)]
    fn test_from_label(#[case] label: &str, #[case] expected: Option<Emotion>) {
        assert_eq!(Emotion::from_label(label), expected);
    }

    #[test]
    fn test_labels_are_unique() {
        let mut labels: Vec<_> = Emotion::ALL.iter().map(|e| e.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), Emotion::ALL.len());
    }

    #[test]
    fn test_serde_uses_lowercase_label() {
        for emotion in Emotion::ALL {
            let json = serde_json::to_string(&emotion).unwrap();
            assert_eq!(json, format!("\"{}\"", emotion.label()));
        }
        let parsed: Emotion = serde_json::from_str("\"neutral\"").unwrap();
        assert_eq!(parsed, Emotion::Neutral);
    }

    #[test]
    fn test_baseline_sums_to_one() {
        let total: f32 = Emotion::ALL.iter().map(|e| e.baseline_confidence()).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-6);
    }
}
