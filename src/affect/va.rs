use serde::{Deserialize, Serialize};

use crate::errors::AffectError;

/// A point in valence/arousal space.
///
/// Components are nominally in `[-1, 1]`, but samples are kept as reported;
/// consumers that need the unit-disk guarantee call [`VaCoordinate::clamped`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VaCoordinate {
    pub valence: f64,
    pub arousal: f64,
}

impl VaCoordinate {
    pub const ORIGIN: VaCoordinate = VaCoordinate {
        valence: 0.0,
        arousal: 0.0,
    };

    pub fn new(valence: f64, arousal: f64) -> Self {
        Self { valence, arousal }
    }

    /// Parses user-supplied text. Anything that is not a finite number is
    /// rejected before it can reach a collaborator.
    pub fn parse(valence: &str, arousal: &str) -> Result<Self, AffectError> {
        let valence = parse_component("valence", valence)?;
        let arousal = parse_component("arousal", arousal)?;
        Ok(Self { valence, arousal })
    }

    pub fn is_finite(&self) -> bool {
        self.valence.is_finite() && self.arousal.is_finite()
    }

    /// Euclidean distance from the origin.
    pub fn norm(&self) -> f64 {
        self.valence.hypot(self.arousal)
    }

    pub fn distance_to(&self, other: &VaCoordinate) -> f64 {
        (self.valence - other.valence).hypot(self.arousal - other.arousal)
    }

    /// Projects points outside the unit disk onto its boundary along the same
    /// angle. Points inside the disk are returned unchanged.
    pub fn clamped(&self) -> VaCoordinate {
        let norm = self.norm();
        if norm <= 1.0 || !norm.is_finite() {
            return *self;
        }
        VaCoordinate {
            valence: self.valence / norm,
            arousal: self.arousal / norm,
        }
    }
}

fn parse_component(field: &str, raw: &str) -> Result<f64, AffectError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AffectError::Validation(format!("{field} must be a number, got '{raw}'")))?;
    if !value.is_finite() {
        return Err(AffectError::Validation(format!(
            "{field} must be finite, got '{raw}'"
        )));
    }
    Ok(value)
}
