//! Delimited row formats for the two observation stores.
//!
//! Rows are decoded against a fixed schema: every field must parse and fall
//! in range, otherwise the row is rejected with the offending field named.

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use crate::affect::VaCoordinate;
use crate::clock::CanonicalTimestamp;
use crate::models::Observation;

pub const MANUAL_HEADER: &str = "timestamp,valence,arousal,emotion,hue,saturation,brightness";
pub const PREDICTED_HEADER: &str = "timestamp,valence,arousal,emotion";

const MANUAL_FIELDS: usize = 7;
const PREDICTED_FIELDS: usize = 4;

/// One row of the manual store.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManualRow {
    pub timestamp: CanonicalTimestamp,
    pub va: VaCoordinate,
    pub emotion: String,
    pub hue: f64,
    pub saturation: f64,
    pub brightness: f64,
}

impl From<&Observation> for ManualRow {
    fn from(observation: &Observation) -> Self {
        Self {
            timestamp: observation.timestamp,
            va: observation.va,
            emotion: observation.label.name.clone(),
            hue: observation.color.hue(),
            saturation: observation.color.saturation(),
            brightness: observation.color.brightness(),
        }
    }
}

impl ManualRow {
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.timestamp,
            self.va.valence,
            self.va.arousal,
            self.emotion,
            format_decimal(self.hue),
            format_decimal(self.saturation),
            format_decimal(self.brightness),
        )
    }

    pub fn decode(line: &str) -> Result<Self> {
        let fields = split_fields(line, MANUAL_FIELDS)?;

        let hue = parse_number(fields[4], "hue")?;
        if !(0.0..360.0).contains(&hue) {
            bail!("hue {hue} outside [0, 360)");
        }

        Ok(Self {
            timestamp: CanonicalTimestamp::parse(fields[0]).context("timestamp")?,
            va: VaCoordinate::new(
                parse_number(fields[1], "valence")?,
                parse_number(fields[2], "arousal")?,
            ),
            emotion: parse_name(fields[3])?,
            hue,
            saturation: parse_unit(fields[5], "saturation")?,
            brightness: parse_unit(fields[6], "brightness")?,
        })
    }
}

/// One row of the predicted store. Carries no color fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictedRow {
    pub timestamp: CanonicalTimestamp,
    pub va: VaCoordinate,
    pub emotion: String,
}

impl From<&Observation> for PredictedRow {
    fn from(observation: &Observation) -> Self {
        Self {
            timestamp: observation.timestamp,
            va: observation.va,
            emotion: observation.label.name.clone(),
        }
    }
}

impl PredictedRow {
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.timestamp, self.va.valence, self.va.arousal, self.emotion
        )
    }

    pub fn decode(line: &str) -> Result<Self> {
        let fields = split_fields(line, PREDICTED_FIELDS)?;
        Ok(Self {
            timestamp: CanonicalTimestamp::parse(fields[0]).context("timestamp")?,
            va: VaCoordinate::new(
                parse_number(fields[1], "valence")?,
                parse_number(fields[2], "arousal")?,
            ),
            emotion: parse_name(fields[3])?,
        })
    }
}

/// Returns the final non-empty line of `contents`, or `None` when the store
/// holds nothing beyond `header`.
pub fn last_data_line<'a>(contents: &'a str, header: &str) -> Option<&'a str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .filter(|line| *line != header)
}

fn split_fields(line: &str, expected: usize) -> Result<Vec<&str>> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if fields.len() != expected {
        bail!("expected {expected} fields, found {}", fields.len());
    }
    Ok(fields)
}

fn parse_number(raw: &str, field: &str) -> Result<f64> {
    let value: f64 = raw
        .parse()
        .map_err(|_| anyhow!("{field} '{raw}' is not a number"))?;
    if !value.is_finite() {
        bail!("{field} '{raw}' is not finite");
    }
    Ok(value)
}

fn parse_unit(raw: &str, field: &str) -> Result<f64> {
    let value = parse_number(raw, field)?;
    if !(0.0..=1.0).contains(&value) {
        bail!("{field} {value} outside [0, 1]");
    }
    Ok(value)
}

fn parse_name(raw: &str) -> Result<String> {
    if raw.is_empty() {
        bail!("emotion name is empty");
    }
    Ok(raw.to_string())
}

/// Four decimal places at most, without trailing zeros.
fn format_decimal(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    format!("{rounded}")
}
