//! Observation data model.
//!
//! An observation is one confirmed affective sample: when it was taken, where
//! it sits in VA space, and the label and color derived from it.

use serde::{Deserialize, Serialize};

use crate::affect::{AffectTransform, ColorEncoding, EmotionPrototype, VaCoordinate};
use crate::clock::CanonicalTimestamp;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    /// Picked directly on the VA display.
    Manual,
    /// Returned by the external predictor.
    Predicted,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Manual => "manual",
            Provenance::Predicted => "predicted",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub timestamp: CanonicalTimestamp,
    /// The sample exactly as reported; label and color come from its
    /// unit-disk projection.
    pub va: VaCoordinate,
    pub label: EmotionPrototype,
    pub color: ColorEncoding,
    pub provenance: Provenance,
}

impl Observation {
    pub fn new(
        timestamp: CanonicalTimestamp,
        va: VaCoordinate,
        provenance: Provenance,
        transform: &AffectTransform,
    ) -> Self {
        let percept = transform.perceive(va);
        Self {
            timestamp,
            va,
            label: percept.label,
            color: percept.color,
            provenance,
        }
    }
}
