#![allow(dead_code)]

use std::{
    collections::VecDeque,
    future::Future,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use affect_lamp_lib::{
    affect::{AffectTransform, VaCoordinate},
    clock::{CanonicalTimestamp, Clock, ManualClock, TimeNormalizer},
    collaborators::{lamp::lamp_args, LampDriver, PredictedSample, Predictor},
    errors::AffectError,
    reconcile::{ControllerConfig, ReconcileController, UiEvent},
    store::{ObservationStore, StorePaths},
};
use chrono::{TimeZone, Utc};
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

pub const MANUAL_FILE: &str = "emotion_data.csv";
pub const PREDICTED_FILE: &str = "predictions.csv";

#[derive(Debug, Clone)]
pub enum Reply {
    Sample(f64, f64, &'static str),
    Unavailable,
    Reported(&'static str),
}

struct PredictorInner {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: Mutex<Vec<CanonicalTimestamp>>,
    gate: Option<Arc<Semaphore>>,
}

/// Answers from a script; once the script runs out it repeats `fallback`.
#[derive(Clone)]
pub struct ScriptedPredictor {
    inner: Arc<PredictorInner>,
}

impl ScriptedPredictor {
    pub fn repeating(reply: Reply) -> Self {
        Self::new(Vec::new(), reply, None)
    }

    /// Every call waits for a permit on `gate` before answering.
    pub fn gated(reply: Reply, gate: Arc<Semaphore>) -> Self {
        Self::new(Vec::new(), reply, Some(gate))
    }

    pub fn new(script: Vec<Reply>, fallback: Reply, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            inner: Arc::new(PredictorInner {
                replies: Mutex::new(script.into()),
                fallback,
                calls: Mutex::new(Vec::new()),
                gate,
            }),
        }
    }

    pub fn calls(&self) -> Vec<CanonicalTimestamp> {
        self.inner.calls.lock().unwrap().clone()
    }
}

impl Predictor for ScriptedPredictor {
    fn predict(
        &self,
        at: CanonicalTimestamp,
    ) -> impl Future<Output = Result<PredictedSample, AffectError>> + Send {
        self.inner.calls.lock().unwrap().push(at);
        let reply = self
            .inner
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.inner.fallback.clone());
        let gate = self.inner.gate.clone();

        async move {
            if let Some(gate) = gate {
                gate.acquire().await.unwrap().forget();
            }
            match reply {
                Reply::Sample(valence, arousal, emotion) => Ok(PredictedSample {
                    timestamp: at,
                    va: VaCoordinate::new(valence, arousal),
                    emotion: emotion.to_string(),
                }),
                Reply::Unavailable => Err(AffectError::unavailable("predictor", "exit status 1")),
                Reply::Reported(message) => Err(AffectError::PredictorReportedError(message.into())),
            }
        }
    }
}

/// Records the textual arguments a real lamp process would have received.
#[derive(Clone, Default)]
pub struct RecordingLamp {
    pushes: Arc<Mutex<Vec<[String; 2]>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingLamp {
    pub fn pushes(&self) -> Vec<[String; 2]> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl LampDriver for RecordingLamp {
    fn push(&self, va: VaCoordinate) -> impl Future<Output = Result<(), AffectError>> + Send {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(AffectError::unavailable("lamp", "exited with exit status: 1"))
        } else {
            self.pushes.lock().unwrap().push(lamp_args(va));
            Ok(())
        };
        async move { result }
    }
}

pub fn temp_data_dir() -> PathBuf {
    std::env::temp_dir().join(format!("affect-lamp-test-{}", Uuid::new_v4()))
}

pub struct Harness {
    pub controller: ReconcileController<ScriptedPredictor, RecordingLamp>,
    pub events: mpsc::UnboundedReceiver<UiEvent>,
    pub predictor: ScriptedPredictor,
    pub lamp: RecordingLamp,
    pub clock: Arc<ManualClock>,
    pub data_dir: PathBuf,
}

impl Harness {
    /// Wall clock at 10:47:30 UTC, i.e. 12:47:30 in the +02:00 reference
    /// zone: polls stamp 12:46, pointer picks stamp 12:48.
    pub fn new(predictor: ScriptedPredictor) -> Self {
        Self::with_interval(predictor, Duration::from_secs(5))
    }

    pub fn with_interval(predictor: ScriptedPredictor, poll_interval: Duration) -> Self {
        let data_dir = temp_data_dir();
        let store =
            ObservationStore::open(StorePaths::new(&data_dir, MANUAL_FILE, PREDICTED_FILE)).unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 47, 30).unwrap(),
        ));
        let lamp = RecordingLamp::default();

        let config = ControllerConfig {
            poll_interval,
            normalizer: TimeNormalizer::new(0, 120).unwrap(),
            transform: AffectTransform::default(),
        };
        let (controller, events) = ReconcileController::new(
            config,
            store,
            predictor.clone(),
            lamp.clone(),
            clock.clone() as Arc<dyn Clock>,
        );

        Self {
            controller,
            events,
            predictor,
            lamp,
            clock,
            data_dir,
        }
    }

    pub fn manual_path(&self) -> PathBuf {
        self.data_dir.join(MANUAL_FILE)
    }

    pub fn predicted_path(&self) -> PathBuf {
        self.data_dir.join(PREDICTED_FILE)
    }

    pub fn read(&self, path: PathBuf) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }

    /// Every notice emitted so far.
    pub fn drain_events(&mut self) -> Vec<UiEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

pub fn confirmation_count(events: &[UiEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, UiEvent::ConfirmationRequested { .. }))
        .count()
}
