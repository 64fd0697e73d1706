//! Emotion prototypes and nearest-prototype classification.
//!
//! The catalog is ordered and the order is observable: when two prototypes
//! are exactly equidistant from a sample, the one listed first wins.

use std::collections::HashSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::va::VaCoordinate;

/// A named reference point in VA space.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionPrototype {
    pub name: String,
    pub valence: f64,
    pub arousal: f64,
}

impl EmotionPrototype {
    pub fn new(name: impl Into<String>, valence: f64, arousal: f64) -> Self {
        Self {
            name: name.into(),
            valence,
            arousal,
        }
    }

    pub fn coordinate(&self) -> VaCoordinate {
        VaCoordinate::new(self.valence, self.arousal)
    }
}

const BUILTIN_PROTOTYPES: [(&str, f64, f64); 18] = [
    // valence > 0, arousal > 0
    ("Happy", 0.95, 0.5),
    ("Excited", 0.75, 0.85),
    ("Confident", 0.8, 0.2),
    ("Aroused", 0.2, 1.1),
    // valence > 0, arousal < 0
    ("Pleased", 1.1, -0.15),
    ("Content", 0.75, -0.45),
    ("Relaxed", 0.7, -0.8),
    ("Calm", 0.2, -1.1),
    // valence < 0, arousal > 0
    ("Tense", -0.2, 1.1),
    ("Anxious", -0.7, 1.0),
    ("Angry", -0.9, 0.69),
    ("Annoyed", -0.95, 0.45),
    ("Frustrated", -1.0, 0.2),
    // valence < 0, arousal < 0
    ("Depressed", -1.1, -0.2),
    ("Sad", -1.0, -0.55),
    ("Bored", -0.5, -0.7),
    ("Tired", -0.2, -1.1),
    ("Neutral", 0.0, 0.0),
];

/// Immutable, ordered prototype catalog. Built once per process.
#[derive(Debug, Clone)]
pub struct EmotionCatalog {
    prototypes: Vec<EmotionPrototype>,
}

impl Default for EmotionCatalog {
    fn default() -> Self {
        Self {
            prototypes: BUILTIN_PROTOTYPES
                .iter()
                .map(|(name, valence, arousal)| EmotionPrototype::new(*name, *valence, *arousal))
                .collect(),
        }
    }
}

impl EmotionCatalog {
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Builds a custom catalog. Names must be unique and coordinates finite.
    pub fn new(prototypes: Vec<EmotionPrototype>) -> Result<Self> {
        if prototypes.is_empty() {
            bail!("emotion catalog must contain at least one prototype");
        }

        let mut seen = HashSet::new();
        for prototype in &prototypes {
            if prototype.name.trim().is_empty() {
                bail!("emotion prototype names must not be empty");
            }
            if prototype.name.contains([',', '\n', '\r']) {
                bail!("emotion prototype name '{}' cannot be stored in a row", prototype.name);
            }
            if !seen.insert(prototype.name.as_str()) {
                bail!("duplicate emotion prototype '{}'", prototype.name);
            }
            if !prototype.coordinate().is_finite() {
                bail!("prototype '{}' has a non-finite coordinate", prototype.name);
            }
        }

        Ok(Self { prototypes })
    }

    pub fn prototypes(&self) -> &[EmotionPrototype] {
        &self.prototypes
    }

    /// Returns the prototype closest to `point`.
    ///
    /// No input is rejected: points outside the unit disk are compared as-is,
    /// so callers clamp first when they want clamped semantics. Only a strictly
    /// smaller distance displaces the current best, which makes the earlier
    /// catalog entry win ties.
    pub fn classify(&self, point: VaCoordinate) -> &EmotionPrototype {
        let mut best = &self.prototypes[0];
        let mut best_distance = point.distance_to(&best.coordinate());

        for candidate in &self.prototypes[1..] {
            let distance = point.distance_to(&candidate.coordinate());
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }

        best
    }
}
