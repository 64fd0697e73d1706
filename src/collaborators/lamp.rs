use std::future::Future;

use crate::affect::VaCoordinate;
use crate::errors::AffectError;

use super::{run_collaborator, CommandSpec};

const COLLABORATOR: &str = "lamp";

/// Pushes a VA sample to the ambient lamp. Output is never interpreted;
/// only success or failure matters.
pub trait LampDriver: Send + Sync + 'static {
    fn push(&self, va: VaCoordinate) -> impl Future<Output = Result<(), AffectError>> + Send;
}

/// Valence and arousal as the two textual arguments the driver expects.
pub fn lamp_args(va: VaCoordinate) -> [String; 2] {
    [va.valence.to_string(), va.arousal.to_string()]
}

#[derive(Debug, Clone)]
pub struct ProcessLamp {
    command: CommandSpec,
}

impl ProcessLamp {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

impl LampDriver for ProcessLamp {
    fn push(&self, va: VaCoordinate) -> impl Future<Output = Result<(), AffectError>> + Send {
        let command = self.command.clone();
        async move {
            run_collaborator(COLLABORATOR, &command, &lamp_args(va)).await?;
            Ok(())
        }
    }
}
