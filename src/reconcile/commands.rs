//! Front-end entry points. Every command takes plain text and hands back a
//! serializable value or a displayable error message.

use crate::{
    affect::VaCoordinate,
    collaborators::{LampDriver, Predictor},
    store::ManualRow,
};

use super::{
    CancelOutcome, ConfirmOutcome, PendingObservation, PollOutcome, ReconcileController,
    SessionSnapshot,
};

pub async fn get_session_state<P: Predictor, L: LampDriver>(
    controller: &ReconcileController<P, L>,
) -> Result<SessionSnapshot, String> {
    Ok(controller.snapshot().await)
}

pub async fn poll_now<P: Predictor, L: LampDriver>(
    controller: &ReconcileController<P, L>,
) -> Result<PollOutcome, String> {
    controller.poll_once().await.map_err(|e| e.to_string())
}

pub async fn select_point<P: Predictor, L: LampDriver>(
    controller: &ReconcileController<P, L>,
    valence: &str,
    arousal: &str,
) -> Result<PendingObservation, String> {
    let va = VaCoordinate::parse(valence, arousal).map_err(|e| e.to_string())?;
    controller.select_point(va).await.map_err(|e| e.to_string())
}

pub async fn confirm_pending<P: Predictor, L: LampDriver>(
    controller: &ReconcileController<P, L>,
) -> Result<ConfirmOutcome, String> {
    controller.confirm().await.map_err(|e| e.to_string())
}

pub async fn cancel_pending<P: Predictor, L: LampDriver>(
    controller: &ReconcileController<P, L>,
) -> Result<CancelOutcome, String> {
    controller.cancel().await.map_err(|e| e.to_string())
}

pub async fn latest_observation<P: Predictor, L: LampDriver>(
    controller: &ReconcileController<P, L>,
) -> Result<Option<ManualRow>, String> {
    controller
        .latest_observation()
        .await
        .map_err(|e| format!("{e:#}"))
}

pub async fn read_manual_store<P: Predictor, L: LampDriver>(
    controller: &ReconcileController<P, L>,
) -> Result<String, String> {
    controller
        .manual_store_text()
        .await
        .map_err(|e| format!("{e:#}"))
}

pub async fn control_lamp<P: Predictor, L: LampDriver>(
    controller: &ReconcileController<P, L>,
    valence: &str,
    arousal: &str,
) -> Result<(), String> {
    controller
        .control_lamp(valence, arousal)
        .await
        .map_err(|e| e.to_string())
}
