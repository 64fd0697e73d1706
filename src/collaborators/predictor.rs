use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::affect::VaCoordinate;
use crate::clock::CanonicalTimestamp;
use crate::errors::AffectError;

use super::{run_collaborator, CommandSpec};

const COLLABORATOR: &str = "predictor";

/// One prediction, stamped with the canonical time it was requested for.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictedSample {
    pub timestamp: CanonicalTimestamp,
    pub va: VaCoordinate,
    /// The predictor's own label. Informational; the catalog decides the
    /// label that gets persisted.
    pub emotion: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictorReply {
    Failure { error: String },
    Sample { valence: f64, arousal: f64, emotion: String },
}

/// Produces VA predictions for a canonical timestamp.
pub trait Predictor: Send + Sync + 'static {
    fn predict(
        &self,
        at: CanonicalTimestamp,
    ) -> impl Future<Output = Result<PredictedSample, AffectError>> + Send;
}

/// Decodes predictor stdout. Only the last line is considered; earlier lines
/// are free-form diagnostics.
pub fn parse_predictor_output(
    stdout: &str,
    at: CanonicalTimestamp,
) -> Result<PredictedSample, AffectError> {
    let last = stdout
        .trim()
        .lines()
        .last()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(|| AffectError::malformed(COLLABORATOR, "empty output"))?;

    let reply: PredictorReply = serde_json::from_str(last)
        .map_err(|err| AffectError::malformed(COLLABORATOR, format!("{err}: '{last}'")))?;

    match reply {
        PredictorReply::Failure { error } => Err(AffectError::PredictorReportedError(error)),
        PredictorReply::Sample {
            valence,
            arousal,
            emotion,
        } => {
            let va = VaCoordinate::new(valence, arousal);
            if !va.is_finite() {
                return Err(AffectError::malformed(COLLABORATOR, "non-finite coordinate"));
            }
            Ok(PredictedSample {
                timestamp: at,
                va,
                emotion,
            })
        }
    }
}

/// Runs the predictor program with the canonical timestamp as its final
/// argument.
#[derive(Debug, Clone)]
pub struct ProcessPredictor {
    command: CommandSpec,
}

impl ProcessPredictor {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

impl Predictor for ProcessPredictor {
    fn predict(
        &self,
        at: CanonicalTimestamp,
    ) -> impl Future<Output = Result<PredictedSample, AffectError>> + Send {
        let command = self.command.clone();
        async move {
            let stdout = run_collaborator(COLLABORATOR, &command, &[at.to_string()]).await?;
            parse_predictor_output(&stdout, at)
        }
    }
}
