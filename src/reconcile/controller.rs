use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    affect::{AffectTransform, VaCoordinate},
    clock::{Clock, TimeNormalizer},
    collaborators::{LampDriver, Predictor},
    errors::AffectError,
    models::Observation,
    store::{ManualRow, ObservationStore, StoreKind},
};

use super::{
    poller::poll_loop,
    state::{
        PendingObservation, ReconcileEvent, ReconcilePhase, ReconcileSession, SessionSnapshot,
        Step,
    },
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Notices pushed to whatever front end is attached.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum UiEvent {
    Status { message: String },
    ConfirmationRequested { pending: PendingObservation },
    Saved { observation: Observation, store: &'static str },
    LampWarning { message: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", content = "pending", rename_all = "camelCase")]
pub enum PollOutcome {
    /// The session was busy; the predictor was not called.
    Skipped,
    /// The predictor failed or had nothing for this minute.
    NoNewData,
    Duplicate,
    Prompted(PendingObservation),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum LampOutcome {
    Updated,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOutcome {
    pub observation: Observation,
    pub store: &'static str,
    pub lamp: LampOutcome,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    /// Whether the dismissed sample now counts as processed.
    pub marked_processed: bool,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
    pub normalizer: TimeNormalizer,
    pub transform: AffectTransform,
}

struct PollerHandle {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Drives one reconciliation session: polls the predictor, asks for
/// confirmation, persists and lights the lamp.
pub struct ReconcileController<P: Predictor, L: LampDriver> {
    session: Arc<Mutex<ReconcileSession>>,
    store: ObservationStore,
    predictor: Arc<P>,
    lamp: Arc<L>,
    normalizer: TimeNormalizer,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<UiEvent>,
    poller: Arc<Mutex<Option<PollerHandle>>>,
    poll_interval: Duration,
}

impl<P: Predictor, L: LampDriver> Clone for ReconcileController<P, L> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            store: self.store.clone(),
            predictor: self.predictor.clone(),
            lamp: self.lamp.clone(),
            normalizer: self.normalizer,
            clock: self.clock.clone(),
            events: self.events.clone(),
            poller: self.poller.clone(),
            poll_interval: self.poll_interval,
        }
    }
}

impl<P: Predictor, L: LampDriver> ReconcileController<P, L> {
    pub fn new(
        config: ControllerConfig,
        store: ObservationStore,
        predictor: P,
        lamp: L,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = ReconcileSession::new(config.transform, clock.now());
        log_info!("reconcile session {} started", session.id());

        let controller = Self {
            session: Arc::new(Mutex::new(session)),
            store,
            predictor: Arc::new(predictor),
            lamp: Arc::new(lamp),
            normalizer: config.normalizer,
            clock,
            events,
            poller: Arc::new(Mutex::new(None)),
            poll_interval: config.poll_interval,
        };
        (controller, receiver)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    /// One poll cycle. The session lock is released while the predictor runs,
    /// so user actions are never blocked behind it.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let at = self.normalizer.floor_align(self.clock.now());
        let step = self.apply(ReconcileEvent::PollDue { at }).await?;

        match step {
            Step::RequestPrediction(_) => {}
            Step::PollSkipped { phase } => {
                log_debug!("poll at {at} skipped while {phase}");
                return Ok(PollOutcome::Skipped);
            }
            other => return Err(anyhow!("unexpected poll transition: {other:?}")),
        }

        self.emit_status("Checking for new predictions...");

        let event = match self.predictor.predict(at).await {
            Ok(sample) => ReconcileEvent::PredictionArrived(sample),
            Err(err) if err.is_transient() => {
                log_warn!("no prediction for {at}: {err}");
                ReconcileEvent::PredictionUnavailable
            }
            Err(err) => {
                log_error!("predictor failed for {at}: {err}");
                ReconcileEvent::PredictionUnavailable
            }
        };

        match self.apply(event).await? {
            Step::Duplicate => {
                log_debug!("prediction for {at} already processed");
                Ok(PollOutcome::Duplicate)
            }
            Step::NothingNew => Ok(PollOutcome::NoNewData),
            Step::Prompt(pending) => {
                if pending.label_disagrees() {
                    log_warn!(
                        "predictor labelled {at} as {:?} but the nearest prototype is {}",
                        pending.reported_emotion,
                        pending.observation.label.name
                    );
                }
                self.emit_status("New prediction available");
                self.emit(UiEvent::ConfirmationRequested {
                    pending: pending.clone(),
                });
                Ok(PollOutcome::Prompted(pending))
            }
            other => Err(anyhow!("unexpected prediction transition: {other:?}")),
        }
    }

    /// Releases a poll that will never finish, e.g. when the poller is torn
    /// down mid-request.
    pub(crate) async fn abandon_poll(&self) {
        let mut session = self.session.lock().await;
        if matches!(session.phase(), ReconcilePhase::PredictionPending { .. }) {
            let _ = session.apply(ReconcileEvent::PredictionUnavailable);
            log_debug!("abandoned in-flight poll");
        }
    }

    /// Opens a manual confirmation for a point picked on the VA display.
    pub async fn select_point(&self, va: VaCoordinate) -> Result<PendingObservation> {
        if !va.is_finite() {
            return Err(AffectError::Validation("coordinates must be finite".into()).into());
        }

        let at = self.normalizer.nearest_align(self.clock.now());
        match self.apply(ReconcileEvent::PointerSelected { at, va }).await? {
            Step::Prompt(pending) => {
                self.emit(UiEvent::ConfirmationRequested {
                    pending: pending.clone(),
                });
                Ok(pending)
            }
            other => Err(anyhow!("unexpected pointer transition: {other:?}")),
        }
    }

    /// Persists the shown observation to the store matching its provenance,
    /// then pushes it to the lamp. A lamp failure is a warning; a persistence
    /// failure is returned once and the session goes back to idle.
    pub async fn confirm(&self) -> Result<ConfirmOutcome> {
        let observation = match self.apply(ReconcileEvent::Confirm).await? {
            Step::Persist(observation) => observation,
            other => return Err(anyhow!("unexpected confirm transition: {other:?}")),
        };

        let store = match self.store.append(&observation).await {
            Ok(kind) => kind,
            Err(err) => {
                log_error!("failed to persist observation at {}: {err:#}", observation.timestamp);
                self.apply(ReconcileEvent::PersistFailed).await?;
                self.emit_status("Checking for new predictions...");
                return Err(AffectError::Persistence(format!("{err:#}")).into());
            }
        };

        self.apply(ReconcileEvent::PersistSucceeded).await?;
        let store = store_name(store);
        log_info!(
            "saved {} observation {} at {}",
            observation.provenance.as_str(),
            observation.label.name,
            observation.timestamp
        );
        self.emit(UiEvent::Saved {
            observation: observation.clone(),
            store,
        });

        let lamp = match self.lamp.push(observation.va).await {
            Ok(()) => LampOutcome::Updated,
            Err(err) => {
                log_warn!("lamp update failed: {err}");
                let message = err.to_string();
                self.emit(UiEvent::LampWarning {
                    message: message.clone(),
                });
                LampOutcome::Failed(message)
            }
        };

        self.emit_status("Checking for new predictions...");
        Ok(ConfirmOutcome {
            observation,
            store,
            lamp,
        })
    }

    pub async fn cancel(&self) -> Result<CancelOutcome> {
        match self.apply(ReconcileEvent::Cancel).await? {
            Step::Dismissed { marked } => {
                self.emit_status("Checking for new predictions...");
                Ok(CancelOutcome {
                    marked_processed: marked,
                })
            }
            other => Err(anyhow!("unexpected cancel transition: {other:?}")),
        }
    }

    /// The most recent manual observation, if any has been stored. An
    /// unreadable store or a malformed final row is a `Persistence` error.
    pub async fn latest_observation(&self) -> Result<Option<ManualRow>> {
        self.store
            .latest_manual()
            .await
            .map_err(|err| AffectError::Persistence(format!("{err:#}")).into())
    }

    /// Raw manual-store text, header included; empty before the first write.
    pub async fn manual_store_text(&self) -> Result<String> {
        let contents = self
            .store
            .manual_contents()
            .await
            .map_err(|err| AffectError::Persistence(format!("{err:#}")))?;
        Ok(contents.unwrap_or_default())
    }

    /// Drives the lamp directly from textual coordinates.
    pub async fn control_lamp(&self, valence: &str, arousal: &str) -> Result<()> {
        let va = VaCoordinate::parse(valence, arousal)?;
        self.lamp.push(va).await?;
        log_info!("lamp set to ({}, {})", va.valence, va.arousal);
        Ok(())
    }

    /// Starts the background poll loop, replacing any running one.
    pub async fn spawn_poller(&self) {
        let mut guard = self.poller.lock().await;
        if let Some(previous) = guard.take() {
            stop_poller(previous).await;
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(self.clone(), cancel_token.clone()));
        *guard = Some(PollerHandle {
            handle,
            cancel_token,
        });
    }

    pub async fn shutdown(&self) {
        if let Some(poller) = self.poller.lock().await.take() {
            stop_poller(poller).await;
        }
        self.abandon_poll().await;
    }

    async fn apply(&self, event: ReconcileEvent) -> Result<Step> {
        let mut session = self.session.lock().await;
        Ok(session.apply(event)?)
    }

    fn emit_status(&self, message: &str) {
        self.emit(UiEvent::Status {
            message: message.to_string(),
        });
    }

    fn emit(&self, event: UiEvent) {
        // Nobody listening is fine; the session keeps running headless.
        let _ = self.events.send(event);
    }
}

async fn stop_poller(poller: PollerHandle) {
    poller.cancel_token.cancel();
    if let Err(err) = poller.handle.await {
        log_error!("poll loop task failed to join: {err}");
    }
}

fn store_name(kind: StoreKind) -> &'static str {
    match kind {
        StoreKind::Manual => "manual",
        StoreKind::Predicted => "predicted",
    }
}
