//! Periodic polling of configured endpoints.
//!
//! Every tick issues a deduplicated, supervised request. A poll that is
//! still in flight when the next tick arrives is reused rather than
//! reissued, and a poll that outlives its timeout is cancelled by the
//! supervisor.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::client::RequestClient;
use crate::config::WatchConfig;
use crate::supervisor::ControllerOptions;
use crate::transport::{Outcome, Params, Transport};

pub struct Poller<T: Transport> {
    watch: Arc<WatchConfig>,
    client: RequestClient<T>,
}

impl<T: Transport> Poller<T> {
    pub fn new(watch: WatchConfig, client: RequestClient<T>) -> Self {
        Self {
            watch: Arc::new(watch),
            client,
        }
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            watch = %self.watch.name,
            url = %self.watch.url,
            every_ms = self.watch.every_ms,
            supervisor = %self.client.supervisor().name(),
            "Poller starting"
        );

        let mut ticker = time::interval(Duration::from_millis(self.watch.every_ms));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll();
                    self.client.dedup().purge_completed();
                }
                _ = shutdown.recv() => {
                    tracing::info!(watch = %self.watch.name, "Poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Issue one poll and spawn a task that reports its outcome.
    fn poll(&self) {
        let params: Params = self.watch.params.iter().collect();

        let name = self.watch.name.clone();
        let mut options = ControllerOptions::new().on_timeout(move |_| {
            tracing::warn!(watch = %name, "Poll timed out");
        });
        if let Some(ms) = self.watch.timeout_ms {
            options = options.timeout_ms(ms);
        }

        let (handle, controller) =
            self.client
                .single_supervised(self.watch.method, &self.watch.url, params, options);

        let watch = self.watch.clone();
        tokio::spawn(async move {
            let outcome = handle.wait().await;
            controller.unregister();

            metrics::counter!(
                "poll_outcomes_total",
                "watch" => watch.name.clone(),
                "outcome" => outcome.label()
            )
            .increment(1);

            match outcome {
                Outcome::Completed(response) => tracing::debug!(
                    watch = %watch.name,
                    handle = %handle.id(),
                    status = response.status,
                    bytes = response.body.len(),
                    "Poll completed"
                ),
                Outcome::Failed(e) => tracing::warn!(
                    watch = %watch.name,
                    handle = %handle.id(),
                    error = %e,
                    "Poll failed"
                ),
                Outcome::Aborted => tracing::debug!(
                    watch = %watch.name,
                    handle = %handle.id(),
                    "Poll aborted"
                ),
            }
        });
    }
}
