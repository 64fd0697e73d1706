pub mod commands;
pub mod controller;
pub mod poller;
pub mod state;

pub use controller::{
    CancelOutcome, ConfirmOutcome, ControllerConfig, LampOutcome, PollOutcome,
    ReconcileController, UiEvent,
};
pub use state::{
    LastProcessedMarker, PendingObservation, ReconcileEvent, ReconcilePhase, ReconcileSession,
    SessionSnapshot, Step, TransitionError,
};
