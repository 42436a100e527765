use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::core::state::AppState;
use crate::services::board::ReorderCoordinator;
use crate::services::question_store::QUESTIONS_BY_ORDER;

/// Running feed task; `stop` signals it and waits for it to exit.
pub(crate) struct FeedHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub(crate) async fn stop(self) {
        if self.shutdown.send(true).is_err() {
            tracing::warn!("Question feed already stopped");
        }
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "Question feed task join failed");
        }
    }
}

pub(crate) fn spawn(state: &AppState) -> FeedHandle {
    let retry = Duration::from_secs(state.settings().board().feed_retry_seconds);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(feed_loop(state.board().clone(), retry, shutdown_rx));

    FeedHandle { shutdown, task }
}

/// Keeps the board hydrated from the live question subscription, resubscribing
/// after `retry` whenever the feed cannot be opened or ends.
async fn feed_loop(
    board: Arc<ReorderCoordinator>,
    retry: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let store = board.store().clone();
        let subscribed = tokio::select! {
            _ = shutdown.changed() => break,
            result = store.subscribe(QUESTIONS_BY_ORDER) => result,
        };

        match subscribed {
            Ok(mut subscription) => {
                tracing::info!("Question feed subscribed");
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        snapshot = subscription.next() => match snapshot {
                            Some(documents) => {
                                let count = board.apply_snapshot(&documents);
                                tracing::debug!(questions = count, "Applied question snapshot");
                            }
                            None => {
                                tracing::warn!("Question feed ended; resubscribing");
                                break;
                            }
                        },
                    }
                }
            }
            Err(err) => tracing::error!(error = %err, "Failed to subscribe to question feed"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(retry) => {}
        }
    }

    tracing::info!("Question feed stopped");
}
