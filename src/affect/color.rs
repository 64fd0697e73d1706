use serde::Serialize;

use super::va::VaCoordinate;

/// Both axes strictly below this magnitude render as white.
pub const DEFAULT_NEUTRAL_ZONE: f64 = 0.3;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Hue in degrees, saturation and brightness in `[0, 1]`.
///
/// `rgb` is derived in the constructor and there is no setter, so it can
/// always be recomputed from the other three fields.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ColorEncoding {
    hue: f64,
    saturation: f64,
    brightness: f64,
    rgb: Rgb,
}

impl ColorEncoding {
    pub fn from_hsv(hue: f64, saturation: f64, brightness: f64) -> Self {
        let hue = hue.rem_euclid(360.0);
        let saturation = saturation.clamp(0.0, 1.0);
        let brightness = brightness.clamp(0.0, 1.0);
        Self {
            hue,
            saturation,
            brightness,
            rgb: hsv_to_rgb(hue, saturation, brightness),
        }
    }

    pub fn white() -> Self {
        Self::from_hsv(0.0, 0.0, 1.0)
    }

    pub fn hue(&self) -> f64 {
        self.hue
    }

    pub fn saturation(&self) -> f64 {
        self.saturation
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    pub fn rgb(&self) -> Rgb {
        self.rgb
    }
}

/// Six-sector HSV conversion. `hue` is in degrees.
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb {
    let scaled = hue.rem_euclid(360.0) / 60.0;
    let sector = scaled.floor();
    let f = scaled - sector;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - f * saturation);
    let t = value * (1.0 - (1.0 - f) * saturation);

    let (r, g, b) = match (sector as i64).rem_euclid(6) {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    };

    Rgb {
        r: to_channel(r),
        g: to_channel(g),
        b: to_channel(b),
    }
}

fn to_channel(component: f64) -> u8 {
    (component.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// The single VA -> color transform, shared by the confirmation preview,
/// the persisted rows and the lamp push.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorEncoder {
    neutral_zone: Option<f64>,
}

impl Default for ColorEncoder {
    fn default() -> Self {
        Self {
            neutral_zone: Some(DEFAULT_NEUTRAL_ZONE),
        }
    }
}

impl ColorEncoder {
    pub fn new(neutral_zone: Option<f64>) -> Self {
        Self { neutral_zone }
    }

    pub fn encode(&self, point: VaCoordinate) -> ColorEncoding {
        let point = point.clamped();

        if let Some(threshold) = self.neutral_zone {
            if point.valence.abs() < threshold && point.arousal.abs() < threshold {
                return ColorEncoding::white();
            }
        }

        let saturation = (2.0 * point.norm()).min(1.0);
        let brightness = (0.5 + 0.5 * point.arousal).clamp(0.0, 1.0);

        ColorEncoding::from_hsv(quadrant_hue(point), saturation, brightness)
    }
}

/// Zero counts as positive on both axes.
fn quadrant_hue(point: VaCoordinate) -> f64 {
    match (point.valence >= 0.0, point.arousal >= 0.0) {
        (true, true) => 120.0,
        (true, false) => 60.0,
        (false, true) => 0.0,
        (false, false) => 240.0,
    }
}
