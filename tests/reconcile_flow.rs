mod common;

use std::{sync::Arc, time::Duration};

use affect_lamp_lib::{
    affect::VaCoordinate,
    errors::AffectError,
    models::Provenance,
    reconcile::{LampOutcome, PollOutcome, ReconcilePhase, UiEvent},
    store::{MANUAL_HEADER, PREDICTED_HEADER},
};
use approx::assert_relative_eq;
use tokio::sync::Semaphore;

use common::{confirmation_count, Harness, Reply, ScriptedPredictor};

const HAPPY: Reply = Reply::Sample(0.95, 0.5, "Happy");

#[tokio::test]
async fn confirmed_prediction_is_saved_lit_and_never_offered_again() {
    let mut harness = Harness::new(ScriptedPredictor::repeating(HAPPY));

    let outcome = harness.controller.poll_once().await.unwrap();
    let PollOutcome::Prompted(pending) = outcome else {
        panic!("expected a prompt, got {outcome:?}");
    };
    assert_eq!(pending.observation.label.name, "Happy");
    assert_eq!(pending.observation.color.hue(), 120.0);
    assert_eq!(pending.provenance(), Provenance::Predicted);
    assert_eq!(
        pending.observation.timestamp.to_string(),
        "2024-05-01T12:46:00+02:00"
    );
    assert_eq!(
        harness.predictor.calls()[0].to_string(),
        "2024-05-01T12:46:00+02:00"
    );
    assert_eq!(confirmation_count(&harness.drain_events()), 1);

    let saved = harness.controller.confirm().await.unwrap();
    assert_eq!(saved.store, "predicted");
    assert_eq!(saved.lamp, LampOutcome::Updated);

    assert_eq!(
        harness.read(harness.predicted_path()).unwrap(),
        format!("{PREDICTED_HEADER}\n2024-05-01T12:46:00+02:00,0.95,0.5,Happy\n")
    );
    assert!(harness.read(harness.manual_path()).is_none());
    assert_eq!(
        harness.lamp.pushes(),
        vec![["0.95".to_string(), "0.5".to_string()]]
    );

    let snapshot = harness.controller.snapshot().await;
    assert!(snapshot.phase.is_idle());
    assert_eq!(snapshot.last_processed.unwrap().valence, 0.95);

    assert_eq!(
        harness.controller.poll_once().await.unwrap(),
        PollOutcome::Duplicate
    );
    assert_eq!(confirmation_count(&harness.drain_events()), 0);
    assert_eq!(harness.lamp.pushes().len(), 1);
}

#[tokio::test]
async fn cancelled_prediction_writes_nothing_and_is_not_reoffered() {
    let mut harness = Harness::new(ScriptedPredictor::repeating(HAPPY));

    harness.controller.poll_once().await.unwrap();
    let cancelled = harness.controller.cancel().await.unwrap();
    assert!(cancelled.marked_processed);

    assert!(harness.read(harness.predicted_path()).is_none());
    assert!(harness.read(harness.manual_path()).is_none());
    assert!(harness.lamp.pushes().is_empty());

    harness.drain_events();
    assert_eq!(
        harness.controller.poll_once().await.unwrap(),
        PollOutcome::Duplicate
    );
    assert_eq!(confirmation_count(&harness.drain_events()), 0);
}

#[tokio::test]
async fn a_changed_sample_is_offered_again() {
    let predictor = ScriptedPredictor::new(
        vec![HAPPY, HAPPY],
        Reply::Sample(0.95, 0.51, "Happy"),
        None,
    );
    let harness = Harness::new(predictor);

    harness.controller.poll_once().await.unwrap();
    harness.controller.cancel().await.unwrap();
    assert_eq!(
        harness.controller.poll_once().await.unwrap(),
        PollOutcome::Duplicate
    );
    assert!(matches!(
        harness.controller.poll_once().await.unwrap(),
        PollOutcome::Prompted(_)
    ));
}

#[tokio::test]
async fn poll_is_skipped_while_a_prediction_is_in_flight() {
    let gate = Arc::new(Semaphore::new(0));
    let mut harness = Harness::new(ScriptedPredictor::gated(HAPPY, gate.clone()));

    let controller = harness.controller.clone();
    let first = tokio::spawn(async move { controller.poll_once().await });

    while !matches!(
        harness.controller.snapshot().await.phase,
        ReconcilePhase::PredictionPending { .. }
    ) {
        tokio::task::yield_now().await;
    }

    assert_eq!(
        harness.controller.poll_once().await.unwrap(),
        PollOutcome::Skipped
    );
    assert_eq!(harness.predictor.calls().len(), 1);

    gate.add_permits(1);
    assert!(matches!(first.await.unwrap().unwrap(), PollOutcome::Prompted(_)));

    assert_eq!(confirmation_count(&harness.drain_events()), 1);

    // Still busy: the confirmation is on screen. Skipped ticks stay out of
    // the notice stream.
    assert_eq!(
        harness.controller.poll_once().await.unwrap(),
        PollOutcome::Skipped
    );
    assert_eq!(harness.predictor.calls().len(), 1);
    assert!(harness.drain_events().is_empty());
}

#[tokio::test]
async fn predictor_failures_mean_no_new_data() {
    let predictor = ScriptedPredictor::new(
        vec![Reply::Unavailable, Reply::Reported("No matching data point found")],
        HAPPY,
        None,
    );
    let mut harness = Harness::new(predictor);

    for _ in 0..2 {
        assert_eq!(
            harness.controller.poll_once().await.unwrap(),
            PollOutcome::NoNewData
        );
        assert!(harness.controller.snapshot().await.phase.is_idle());
    }
    assert_eq!(confirmation_count(&harness.drain_events()), 0);

    // The next cycle recovers on its own.
    assert!(matches!(
        harness.controller.poll_once().await.unwrap(),
        PollOutcome::Prompted(_)
    ));
}

#[tokio::test]
async fn persist_failure_returns_to_idle_and_keeps_the_sample_pending() {
    let harness = Harness::new(ScriptedPredictor::repeating(HAPPY));
    // A directory where the predicted store file should be makes every append fail.
    std::fs::create_dir_all(harness.predicted_path()).unwrap();

    harness.controller.poll_once().await.unwrap();
    let err = harness.controller.confirm().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AffectError>(),
        Some(AffectError::Persistence(_))
    ));

    let snapshot = harness.controller.snapshot().await;
    assert!(snapshot.phase.is_idle());
    assert!(snapshot.last_processed.is_none());
    assert!(harness.lamp.pushes().is_empty());

    assert!(matches!(
        harness.controller.poll_once().await.unwrap(),
        PollOutcome::Prompted(_)
    ));
}

#[tokio::test]
async fn lamp_failure_does_not_undo_the_save() {
    let mut harness = Harness::new(ScriptedPredictor::repeating(HAPPY));
    harness.lamp.set_failing(true);

    harness.controller.poll_once().await.unwrap();
    let saved = harness.controller.confirm().await.unwrap();
    assert!(matches!(saved.lamp, LampOutcome::Failed(_)));

    assert!(harness.read(harness.predicted_path()).is_some());
    assert!(harness.controller.snapshot().await.phase.is_idle());
    assert!(harness
        .drain_events()
        .iter()
        .any(|event| matches!(event, UiEvent::LampWarning { .. })));
}

#[tokio::test]
async fn pointer_selection_goes_to_the_manual_store() {
    let harness = Harness::new(ScriptedPredictor::repeating(HAPPY));

    let pending = harness
        .controller
        .select_point(VaCoordinate::new(0.5, 0.5))
        .await
        .unwrap();
    assert_eq!(pending.provenance(), Provenance::Manual);
    assert_eq!(
        pending.observation.timestamp.to_string(),
        "2024-05-01T12:48:00+02:00"
    );

    let saved = harness.controller.confirm().await.unwrap();
    assert_eq!(saved.store, "manual");
    assert_eq!(
        harness.read(harness.manual_path()).unwrap(),
        format!("{MANUAL_HEADER}\n2024-05-01T12:48:00+02:00,0.5,0.5,Confident,120,1,0.75\n")
    );
    assert!(harness.read(harness.predicted_path()).is_none());
    assert_eq!(
        harness.lamp.pushes(),
        vec![["0.5".to_string(), "0.5".to_string()]]
    );

    // Manual entries leave the dedup marker alone.
    assert!(harness.controller.snapshot().await.last_processed.is_none());

    let latest = harness.controller.latest_observation().await.unwrap().unwrap();
    assert_eq!(latest.emotion, "Confident");
    assert_relative_eq!(latest.brightness, 0.75);
}

#[tokio::test]
async fn pointer_replaces_a_shown_prediction() {
    let harness = Harness::new(ScriptedPredictor::repeating(HAPPY));

    harness.controller.poll_once().await.unwrap();
    let pending = harness
        .controller
        .select_point(VaCoordinate::new(-0.6, 0.4))
        .await
        .unwrap();
    assert_eq!(pending.provenance(), Provenance::Manual);

    harness.controller.cancel().await.unwrap();
    assert_eq!(
        harness.controller.poll_once().await.unwrap(),
        PollOutcome::Duplicate
    );
}

#[tokio::test]
async fn pointer_is_rejected_while_a_prediction_is_in_flight() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = Harness::new(ScriptedPredictor::gated(HAPPY, gate.clone()));

    let controller = harness.controller.clone();
    let first = tokio::spawn(async move { controller.poll_once().await });
    while !matches!(
        harness.controller.snapshot().await.phase,
        ReconcilePhase::PredictionPending { .. }
    ) {
        tokio::task::yield_now().await;
    }

    let err = harness
        .controller
        .select_point(VaCoordinate::new(0.1, 0.1))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("prediction pending"));

    gate.add_permits(1);
    let outcome = first.await.unwrap().unwrap();
    let PollOutcome::Prompted(pending) = outcome else {
        panic!("expected a prompt, got {outcome:?}");
    };
    assert_eq!(pending.provenance(), Provenance::Predicted);
}

#[tokio::test]
async fn confirm_and_cancel_need_something_on_screen() {
    let harness = Harness::new(ScriptedPredictor::repeating(HAPPY));

    let err = harness.controller.confirm().await.unwrap_err();
    assert_eq!(err.to_string(), "cannot confirm while idle");
    assert!(harness.controller.cancel().await.is_err());

    assert!(harness.read(harness.manual_path()).is_none());
    assert!(harness.read(harness.predicted_path()).is_none());
}

#[tokio::test]
async fn out_of_disk_samples_are_colored_from_their_projection() {
    let harness = Harness::new(ScriptedPredictor::repeating(Reply::Sample(
        1.5, 1.5, "Excited",
    )));

    let outcome = harness.controller.poll_once().await.unwrap();
    let PollOutcome::Prompted(pending) = outcome else {
        panic!("expected a prompt, got {outcome:?}");
    };
    let color = pending.observation.color;
    assert_eq!(color.hue(), 120.0);
    assert_relative_eq!(color.saturation(), 1.0);
    assert_relative_eq!(color.brightness(), 0.5 + 0.5 * std::f64::consts::FRAC_1_SQRT_2);
    assert_eq!(pending.observation.label.name, "Excited");

    harness.controller.confirm().await.unwrap();
    assert_eq!(
        harness.lamp.pushes(),
        vec![["1.5".to_string(), "1.5".to_string()]]
    );
}

#[tokio::test]
async fn background_poller_prompts_and_stops_cleanly() {
    let mut harness = Harness::with_interval(
        ScriptedPredictor::repeating(HAPPY),
        Duration::from_millis(20),
    );

    harness.controller.spawn_poller().await;

    let pending = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match harness.events.recv().await {
                Some(UiEvent::ConfirmationRequested { pending }) => break pending,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("poller never prompted");
    assert_eq!(pending.observation.label.name, "Happy");

    harness.controller.shutdown().await;
    assert!(matches!(
        harness.controller.snapshot().await.phase,
        ReconcilePhase::ConfirmationShown(_)
    ));
    assert_eq!(harness.predictor.calls().len(), 1);
}

#[tokio::test]
async fn lamp_control_validates_before_driving_the_lamp() {
    let harness = Harness::new(ScriptedPredictor::repeating(HAPPY));

    let err = harness.controller.control_lamp("abc", "0.1").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AffectError>(),
        Some(AffectError::Validation(_))
    ));
    assert!(harness.controller.control_lamp("0.3", "NaN").await.is_err());
    assert!(harness.lamp.pushes().is_empty());

    harness.controller.control_lamp("0.3", "-0.2").await.unwrap();
    assert_eq!(
        harness.lamp.pushes(),
        vec![["0.3".to_string(), "-0.2".to_string()]]
    );
    // Direct lamp control never touches the session.
    assert!(harness.controller.snapshot().await.phase.is_idle());
}

#[tokio::test]
async fn empty_store_has_no_latest_observation() {
    let harness = Harness::new(ScriptedPredictor::repeating(HAPPY));
    assert!(harness.controller.latest_observation().await.unwrap().is_none());
    assert_eq!(harness.controller.manual_store_text().await.unwrap(), "");
}

#[tokio::test]
async fn malformed_latest_row_is_a_persistence_error() {
    let harness = Harness::new(ScriptedPredictor::repeating(HAPPY));
    std::fs::create_dir_all(&harness.data_dir).unwrap();
    std::fs::write(
        harness.manual_path(),
        format!("{MANUAL_HEADER}\n2024-05-01T12:48:00+02:00,0.5,0.5,Confident,120,1\n"),
    )
    .unwrap();

    let err = harness.controller.latest_observation().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AffectError>(),
        Some(AffectError::Persistence(_))
    ));
    assert!(err.to_string().contains("expected 7 fields, found 6"));
}
