use thiserror::Error;

/// Failures that originate at a collaborator boundary or at user input.
///
/// The classifier and the color encoder are pure and never produce one of
/// these; everything here comes from a subprocess, the filesystem, or text
/// typed by the user.
#[derive(Debug, Error)]
pub enum AffectError {
    /// The process could not be spawned, or it exited with a non-zero status.
    #[error("{collaborator} unavailable: {detail}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        detail: String,
    },

    /// The process ran but its output could not be decoded.
    #[error("malformed {collaborator} response: {detail}")]
    MalformedResponse {
        collaborator: &'static str,
        detail: String,
    },

    /// The predictor answered with an `{"error": ...}` object.
    #[error("predictor reported: {0}")]
    PredictorReportedError(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("invalid input: {0}")]
    Validation(String),
}

impl AffectError {
    pub fn unavailable(collaborator: &'static str, detail: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            collaborator,
            detail: detail.into(),
        }
    }

    pub fn malformed(collaborator: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            collaborator,
            detail: detail.into(),
        }
    }

    /// Transient errors mean "no new data this cycle" and are retried by the
    /// next poll rather than surfaced to the user.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CollaboratorUnavailable { .. }
                | Self::MalformedResponse { .. }
                | Self::PredictorReportedError(_)
        )
    }
}
