use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    affect::{AffectTransform, ColorEncoder, EmotionCatalog, EmotionPrototype, DEFAULT_NEUTRAL_ZONE},
    clock::TimeNormalizer,
    collaborators::CommandSpec,
    store::StorePaths,
};

pub const CONFIG_PATH_ENV: &str = "AFFECT_LAMP_CONFIG";
pub const DEBUG_ENV: &str = "AFFECT_LAMP_DEBUG";
const DEFAULT_CONFIG_FILE: &str = "affect_lamp.json";

const MAX_OFFSET_MINUTES: i32 = 18 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub manual_store_file: String,
    pub predicted_store_file: String,
    pub poll_interval_secs: u64,
    pub predictor: CommandSpec,
    pub lamp: CommandSpec,
    pub reference_utc_offset_minutes: i32,
    pub source_utc_offset_minutes: i32,
    pub neutral_zone_threshold: Option<f64>,
    pub catalog: Option<Vec<EmotionPrototype>>,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            manual_store_file: "emotion_data.csv".into(),
            predicted_store_file: "predictions.csv".into(),
            poll_interval_secs: 5,
            predictor: CommandSpec::new("python3", &["models/predict_emotion.py"]),
            lamp: CommandSpec::new("python3", &["light/change_color.py"]),
            reference_utc_offset_minutes: 120,
            source_utc_offset_minutes: 0,
            neutral_zone_threshold: Some(DEFAULT_NEUTRAL_ZONE),
            catalog: None,
            debug: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        for (name, offset) in [
            ("reference_utc_offset_minutes", self.reference_utc_offset_minutes),
            ("source_utc_offset_minutes", self.source_utc_offset_minutes),
        ] {
            if offset.abs() > MAX_OFFSET_MINUTES {
                bail!("{name} must be within ±18 hours, got {offset}");
            }
        }
        if let Some(threshold) = self.neutral_zone_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                bail!("neutral_zone_threshold must be a non-negative number, got {threshold}");
            }
        }
        for (name, command) in [("predictor", &self.predictor), ("lamp", &self.lamp)] {
            if command.program.trim().is_empty() {
                bail!("{name}.program must not be empty");
            }
        }
        for (name, file) in [
            ("manual_store_file", &self.manual_store_file),
            ("predicted_store_file", &self.predicted_store_file),
        ] {
            if file.trim().is_empty() {
                bail!("{name} must not be empty");
            }
        }
        if self.manual_store_file == self.predicted_store_file {
            bail!("manual and predicted stores must be different files");
        }
        if self.catalog.as_ref().is_some_and(Vec::is_empty) {
            bail!("catalog must not be empty when provided");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::new(
            &self.data_dir,
            &self.manual_store_file,
            &self.predicted_store_file,
        )
    }

    pub fn normalizer(&self) -> Result<TimeNormalizer> {
        TimeNormalizer::new(
            self.source_utc_offset_minutes,
            self.reference_utc_offset_minutes,
        )
    }

    pub fn transform(&self) -> Result<AffectTransform> {
        let catalog = match &self.catalog {
            Some(prototypes) => {
                EmotionCatalog::new(prototypes.clone()).context("invalid custom catalog")?
            }
            None => EmotionCatalog::builtin(),
        };
        Ok(AffectTransform::new(
            catalog,
            ColorEncoder::new(self.neutral_zone_threshold),
        ))
    }
}

/// Settings as loaded from disk, with the path they came from.
pub struct SettingsStore {
    path: PathBuf,
    data: Settings,
}

impl SettingsStore {
    /// A missing file yields defaults; an unreadable or malformed one is an
    /// error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut data: Settings = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            Settings::default()
        };

        if debug_from_env() {
            data.debug = true;
        }
        data.validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;

        Ok(Self { path, data })
    }

    /// Loads from `AFFECT_LAMP_CONFIG`, or `affect_lamp.json` in the working
    /// directory.
    pub fn from_env() -> Result<Self> {
        let path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.data
    }
}

fn debug_from_env() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
