use anyhow::{Context, Result};

use crate::models::{Observation, Provenance};
use crate::store::{
    rows::{last_data_line, ManualRow, PredictedRow, MANUAL_HEADER, PREDICTED_HEADER},
    ObservationStore, StoreKind,
};

impl ObservationStore {
    /// Routes by provenance: manual entries go to the manual store, predicted
    /// entries to the predicted store, never the other way round.
    pub async fn append(&self, observation: &Observation) -> Result<StoreKind> {
        match observation.provenance {
            Provenance::Manual => {
                self.append_manual(observation).await?;
                Ok(StoreKind::Manual)
            }
            Provenance::Predicted => {
                self.append_predicted(observation).await?;
                Ok(StoreKind::Predicted)
            }
        }
    }

    pub async fn append_manual(&self, observation: &Observation) -> Result<()> {
        let line = ManualRow::from(observation).to_line();
        self.execute(move |files| files.append_row(StoreKind::Manual, &line))
            .await
            .context("failed to append manual observation")
    }

    pub async fn append_predicted(&self, observation: &Observation) -> Result<()> {
        let line = PredictedRow::from(observation).to_line();
        self.execute(move |files| files.append_row(StoreKind::Predicted, &line))
            .await
            .context("failed to append predicted observation")
    }

    /// Raw manual-store text, header included. `None` when the store has not
    /// been created yet.
    pub async fn manual_contents(&self) -> Result<Option<String>> {
        self.execute(|files| files.read_contents(StoreKind::Manual))
            .await
    }

    pub async fn predicted_contents(&self) -> Result<Option<String>> {
        self.execute(|files| files.read_contents(StoreKind::Predicted))
            .await
    }

    /// The most recent manual observation. Only the final non-empty row is
    /// decoded; earlier rows are archival.
    pub async fn latest_manual(&self) -> Result<Option<ManualRow>> {
        let Some(contents) = self.manual_contents().await? else {
            return Ok(None);
        };

        last_data_line(&contents, MANUAL_HEADER)
            .map(|line| {
                ManualRow::decode(line)
                    .with_context(|| format!("malformed row in manual store: '{line}'"))
            })
            .transpose()
    }

    pub async fn latest_predicted(&self) -> Result<Option<PredictedRow>> {
        let Some(contents) = self.predicted_contents().await? else {
            return Ok(None);
        };

        last_data_line(&contents, PREDICTED_HEADER)
            .map(|line| {
                PredictedRow::decode(line)
                    .with_context(|| format!("malformed row in predicted store: '{line}'"))
            })
            .transpose()
    }
}
