pub mod catalog;
pub mod color;
pub mod va;

pub use catalog::{EmotionCatalog, EmotionPrototype};
pub use color::{ColorEncoder, ColorEncoding, Rgb, DEFAULT_NEUTRAL_ZONE};
pub use va::VaCoordinate;

/// Label and color derived from one VA sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Percept {
    pub label: EmotionPrototype,
    pub color: ColorEncoding,
}

/// Classifier and encoder bundled so every code path derives percepts the
/// same way.
#[derive(Debug, Clone, Default)]
pub struct AffectTransform {
    catalog: EmotionCatalog,
    encoder: ColorEncoder,
}

impl AffectTransform {
    pub fn new(catalog: EmotionCatalog, encoder: ColorEncoder) -> Self {
        Self { catalog, encoder }
    }

    /// Both the label and the color are computed from the unit-disk projection
    /// of `sample`.
    pub fn perceive(&self, sample: VaCoordinate) -> Percept {
        let point = sample.clamped();
        Percept {
            label: self.catalog.classify(point).clone(),
            color: self.encoder.encode(point),
        }
    }
}
