use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::collaborators::{LampDriver, Predictor};

use super::controller::{PollOutcome, ReconcileController};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Polls the predictor once per interval until cancelled. The first poll
/// happens one full interval after start.
pub async fn poll_loop<P: Predictor, L: LampDriver>(
    controller: ReconcileController<P, L>,
    cancel_token: CancellationToken,
) {
    let period = controller.poll_interval();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log_info!("poll loop started ({}s interval)", period.as_secs_f64());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel_token.cancelled() => break,
        }

        tokio::select! {
            outcome = controller.poll_once() => match outcome {
                Ok(PollOutcome::Prompted(pending)) => log_info!(
                    "awaiting confirmation for {} at {}",
                    pending.observation.label.name,
                    pending.observation.timestamp
                ),
                Ok(outcome) => log_debug!("poll finished: {outcome:?}"),
                Err(err) => log_error!("poll cycle failed: {err:#}"),
            },
            _ = cancel_token.cancelled() => {
                // The in-flight predictor call is dropped with the future.
                controller.abandon_poll().await;
                break;
            }
        }
    }

    log_info!("poll loop shutting down");
}
