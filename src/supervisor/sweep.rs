//! Periodic sweep loop.
//!
//! The timer is re-armed after each tick finishes, so ticks never overlap
//! and the interval stays constant whatever the tick found. An empty
//! registry still ticks (idle backoff) so new registrations are picked up
//! within one interval; a registration landing on an empty registry
//! restarts the timer.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::supervisor::registry::RequestSupervisor;

impl RequestSupervisor {
    /// Run the sweep loop until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            supervisor = %self.name(),
            interval_ms = self.interval().as_millis() as u64,
            "Sweep loop starting"
        );

        let timer = time::sleep(self.interval());
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => {
                    match self.sweep() {
                        Ok(report) if report.expired > 0 => {
                            tracing::debug!(
                                supervisor = %self.name(),
                                inspected = report.inspected,
                                expired = report.expired,
                                "Sweep expired requests"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(supervisor = %self.name(), error = %e, "Sweep usage error"),
                    }
                    timer.as_mut().reset(Instant::now() + self.interval());
                }
                _ = self.restart.notified() => {
                    timer.as_mut().reset(Instant::now() + self.interval());
                }
                _ = shutdown.recv() => {
                    tracing::info!(supervisor = %self.name(), "Sweep loop received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self: &Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweepConfig;
    use crate::lifecycle::Shutdown;
    use crate::supervisor::{ControllerOptions, RequestController};
    use crate::transport::{Method, RequestHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_registered_request_times_out_once() {
        let shutdown = Shutdown::new();
        let sup = Arc::new(RequestSupervisor::new(&SweepConfig::new("ajax", 1000)));
        let task = sup.spawn(shutdown.subscribe());

        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let handle = RequestHandle::new(Method::Get, "/api");
        let _controller = RequestController::new(
            &sup,
            handle.clone(),
            ControllerOptions::new()
                .timeout_ms(1000)
                .on_timeout(move |_| {
                    f.fetch_add(1, Ordering::SeqCst);
                }),
        );

        time::sleep(Duration::from_millis(900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(sup.count(), 0);
        assert!(handle.is_complete());

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_loop_keeps_ticking() {
        let shutdown = Shutdown::new();
        let sup = Arc::new(RequestSupervisor::new(&SweepConfig::new("jsonp", 1001)));
        let task = sup.spawn(shutdown.subscribe());

        time::sleep(Duration::from_millis(3500)).await;
        assert!(sup.ticks() >= 3);
        assert_eq!(sup.count(), 0);
        assert!(!task.is_finished());

        // Still responsive after idling.
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let _controller = RequestController::new(
            &sup,
            RequestHandle::new(Method::Get, "/late"),
            ControllerOptions::new().timeout_ms(500).on_timeout(move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );
        time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_request_never_times_out() {
        let shutdown = Shutdown::new();
        let sup = Arc::new(RequestSupervisor::new(&SweepConfig::new("ajax", 1000)));
        let task = sup.spawn(shutdown.subscribe());

        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let controller = RequestController::new(
            &sup,
            RequestHandle::new(Method::Post, "/save"),
            ControllerOptions::new().timeout_ms(1000).on_timeout(move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );
        time::sleep(Duration::from_millis(500)).await;
        assert!(controller.unregister());

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!controller.handle().is_complete());

        shutdown.trigger();
        task.await.unwrap();
    }
}
