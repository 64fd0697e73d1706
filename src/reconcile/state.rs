//! Session state for prediction reconciliation.
//!
//! One [`ReconcileSession`] exists per client session. It owns the current
//! phase, the last-processed marker used for deduplication, and the transform
//! that turns samples into labelled, colored observations. All mutation goes
//! through [`ReconcileSession::apply`]; I/O is left to the controller, which
//! acts on the returned [`Step`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::affect::{AffectTransform, VaCoordinate};
use crate::clock::CanonicalTimestamp;
use crate::collaborators::PredictedSample;
use crate::models::{Observation, Provenance};

/// The most recently handled predicted sample.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastProcessedMarker {
    pub timestamp: CanonicalTimestamp,
    pub valence: f64,
    pub arousal: f64,
}

impl LastProcessedMarker {
    fn of(observation: &Observation) -> Self {
        Self {
            timestamp: observation.timestamp,
            valence: observation.va.valence,
            arousal: observation.va.arousal,
        }
    }

    /// Exact comparison: a prediction is a repeat only if all three fields are
    /// identical.
    pub fn matches(&self, sample: &PredictedSample) -> bool {
        self.timestamp == sample.timestamp
            && self.valence == sample.va.valence
            && self.arousal == sample.va.arousal
    }
}

/// An observation waiting for the user to confirm or cancel it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingObservation {
    pub observation: Observation,
    /// Label the predictor itself suggested, when the sample came from it.
    pub reported_emotion: Option<String>,
}

impl PendingObservation {
    pub fn predicted(sample: PredictedSample, transform: &AffectTransform) -> Self {
        Self {
            observation: Observation::new(
                sample.timestamp,
                sample.va,
                Provenance::Predicted,
                transform,
            ),
            reported_emotion: Some(sample.emotion),
        }
    }

    pub fn manual(at: CanonicalTimestamp, va: VaCoordinate, transform: &AffectTransform) -> Self {
        Self {
            observation: Observation::new(at, va, Provenance::Manual, transform),
            reported_emotion: None,
        }
    }

    pub fn provenance(&self) -> Provenance {
        self.observation.provenance
    }

    /// True when the predictor's label differs from the catalog's.
    pub fn label_disagrees(&self) -> bool {
        self.reported_emotion
            .as_deref()
            .is_some_and(|reported| reported != self.observation.label.name)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum ReconcilePhase {
    Idle,
    #[serde(rename_all = "camelCase")]
    PredictionPending { requested_for: CanonicalTimestamp },
    ConfirmationShown(PendingObservation),
    Persisting(PendingObservation),
}

impl ReconcilePhase {
    pub fn name(&self) -> &'static str {
        match self {
            ReconcilePhase::Idle => "idle",
            ReconcilePhase::PredictionPending { .. } => "prediction pending",
            ReconcilePhase::ConfirmationShown(_) => "confirmation shown",
            ReconcilePhase::Persisting(_) => "persisting",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ReconcilePhase::Idle)
    }

    pub fn pending(&self) -> Option<&PendingObservation> {
        match self {
            ReconcilePhase::ConfirmationShown(pending) | ReconcilePhase::Persisting(pending) => {
                Some(pending)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ReconcileEvent {
    /// The poll timer fired; `at` is the floor-aligned "now".
    PollDue { at: CanonicalTimestamp },
    PredictionArrived(PredictedSample),
    /// The predictor failed or had nothing to offer this cycle.
    PredictionUnavailable,
    /// The user picked a point on the VA display; `at` is nearest-aligned.
    PointerSelected {
        at: CanonicalTimestamp,
        va: VaCoordinate,
    },
    Confirm,
    Cancel,
    PersistSucceeded,
    PersistFailed,
}

impl ReconcileEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ReconcileEvent::PollDue { .. } => "poll",
            ReconcileEvent::PredictionArrived(_) => "accept a prediction",
            ReconcileEvent::PredictionUnavailable => "drop a prediction",
            ReconcileEvent::PointerSelected { .. } => "select a point",
            ReconcileEvent::Confirm => "confirm",
            ReconcileEvent::Cancel => "cancel",
            ReconcileEvent::PersistSucceeded => "finish persisting",
            ReconcileEvent::PersistFailed => "abort persisting",
        }
    }
}

/// What the controller has to do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    RequestPrediction(CanonicalTimestamp),
    PollSkipped { phase: &'static str },
    Duplicate,
    NothingNew,
    Prompt(PendingObservation),
    Persist(Observation),
    Dismissed { marked: bool },
    Committed(Observation),
    PersistAborted(Observation),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot {event} while {phase}")]
pub struct TransitionError {
    pub phase: &'static str,
    pub event: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub phase: ReconcilePhase,
    pub last_processed: Option<LastProcessedMarker>,
}

#[derive(Debug, Clone)]
pub struct ReconcileSession {
    id: String,
    started_at: DateTime<Utc>,
    phase: ReconcilePhase,
    last_processed: Option<LastProcessedMarker>,
    transform: AffectTransform,
}

impl ReconcileSession {
    pub fn new(transform: AffectTransform, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at,
            phase: ReconcilePhase::Idle,
            last_processed: None,
            transform,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> &ReconcilePhase {
        &self.phase
    }

    pub fn last_processed(&self) -> Option<&LastProcessedMarker> {
        self.last_processed.as_ref()
    }

    pub fn transform(&self) -> &AffectTransform {
        &self.transform
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            started_at: self.started_at,
            phase: self.phase.clone(),
            last_processed: self.last_processed,
        }
    }

    /// Single transition function. A rejected event leaves the session exactly
    /// as it was.
    pub fn apply(&mut self, event: ReconcileEvent) -> Result<Step, TransitionError> {
        let current = std::mem::replace(&mut self.phase, ReconcilePhase::Idle);
        let (next, step) = self.transition(current, event);
        self.phase = next;
        step
    }

    fn transition(
        &mut self,
        phase: ReconcilePhase,
        event: ReconcileEvent,
    ) -> (ReconcilePhase, Result<Step, TransitionError>) {
        use ReconcileEvent as E;
        use ReconcilePhase as P;

        match (phase, event) {
            (P::Idle, E::PollDue { at }) => (
                P::PredictionPending { requested_for: at },
                Ok(Step::RequestPrediction(at)),
            ),
            // At most one prediction round-trip in flight.
            (phase, E::PollDue { .. }) => {
                let name = phase.name();
                (phase, Ok(Step::PollSkipped { phase: name }))
            }

            (P::PredictionPending { .. }, E::PredictionArrived(sample)) => {
                if self
                    .last_processed
                    .is_some_and(|marker| marker.matches(&sample))
                {
                    return (P::Idle, Ok(Step::Duplicate));
                }
                let pending = PendingObservation::predicted(sample, &self.transform);
                (P::ConfirmationShown(pending.clone()), Ok(Step::Prompt(pending)))
            }
            (P::PredictionPending { .. }, E::PredictionUnavailable) => {
                (P::Idle, Ok(Step::NothingNew))
            }

            (P::Idle, E::PointerSelected { at, va }) => {
                let pending = PendingObservation::manual(at, va, &self.transform);
                (P::ConfirmationShown(pending.clone()), Ok(Step::Prompt(pending)))
            }
            // A new pick replaces whatever is on screen; a replaced prediction
            // counts as dismissed.
            (P::ConfirmationShown(previous), E::PointerSelected { at, va }) => {
                self.mark_if_predicted(&previous);
                let pending = PendingObservation::manual(at, va, &self.transform);
                (P::ConfirmationShown(pending.clone()), Ok(Step::Prompt(pending)))
            }

            (P::ConfirmationShown(pending), E::Confirm) => {
                let observation = pending.observation.clone();
                (P::Persisting(pending), Ok(Step::Persist(observation)))
            }
            (P::ConfirmationShown(pending), E::Cancel) => {
                let marked = self.mark_if_predicted(&pending);
                (P::Idle, Ok(Step::Dismissed { marked }))
            }

            (P::Persisting(pending), E::PersistSucceeded) => {
                self.mark_if_predicted(&pending);
                (P::Idle, Ok(Step::Committed(pending.observation)))
            }
            // The marker stays put so the same prediction is offered again.
            (P::Persisting(pending), E::PersistFailed) => {
                (P::Idle, Ok(Step::PersistAborted(pending.observation)))
            }

            (phase, event) => {
                let error = TransitionError {
                    phase: phase.name(),
                    event: event.name(),
                };
                (phase, Err(error))
            }
        }
    }

    fn mark_if_predicted(&mut self, pending: &PendingObservation) -> bool {
        if pending.provenance() != Provenance::Predicted {
            return false;
        }
        self.last_processed = Some(LastProcessedMarker::of(&pending.observation));
        true
    }
}
