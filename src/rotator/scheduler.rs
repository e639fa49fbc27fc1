use std::time::Duration;
use tokio::sync::watch;

use crate::config::Config;

use super::pipeline::{Pipeline, StepFailure};
use super::policy::{Decision, FailurePolicy};

/// Sending half of the shutdown signal
pub struct ShutdownHandle(watch::Sender<bool>);

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }
}

#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown is requested. Never resolves if the handle is
    /// dropped without triggering.
    pub async fn triggered(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle(tx), ShutdownSignal(rx))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerOutcome {
    Cancelled { cycles: u64 },
    CycleLimitReached { cycles: u64 },
}

/// Runs the pipeline, waits `interval`, runs it again.
///
/// The delay is measured from the end of a cycle, so start times drift by
/// however long each cycle takes. Retries wait their own delay instead and
/// do not count towards `max_cycles`.
pub struct PollScheduler {
    interval: Duration,
    policy: FailurePolicy,
    max_cycles: Option<u64>,
}

impl PollScheduler {
    pub fn new(interval: Duration, policy: FailurePolicy, max_cycles: Option<u64>) -> Self {
        Self {
            interval,
            policy,
            max_cycles,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.interval, config.failure_policy, config.max_cycles)
    }

    pub async fn run(
        &self,
        pipeline: &Pipeline,
        mut shutdown: ShutdownSignal,
    ) -> Result<SchedulerOutcome, StepFailure> {
        let mut cycles: u64 = 0;
        let mut retries: u32 = 0;

        loop {
            if shutdown.is_triggered() {
                return Ok(SchedulerOutcome::Cancelled { cycles });
            }

            let result = tokio::select! {
                result = pipeline.run_cycle() => result,
                _ = shutdown.triggered() => {
                    log::info!("Shutdown requested, abandoning cycle in progress");
                    return Ok(SchedulerOutcome::Cancelled { cycles });
                }
            };

            let pause = match result {
                Ok(report) => {
                    retries = 0;
                    cycles += 1;
                    log::info!(
                        "Cycle {} done: {}x{} {} -> {}x{} {}, {} bytes uploaded for {}",
                        report.cycle_id,
                        report.original.width,
                        report.original.height,
                        report.original.format.to_mime_type(),
                        report.rotated.width,
                        report.rotated.height,
                        report.rotated.format.to_mime_type(),
                        report.uploaded_bytes,
                        report.display_name
                    );
                    match serde_json::to_string(&report) {
                        Ok(json) => log::debug!("Cycle report: {}", json),
                        Err(e) => log::debug!("Could not serialize cycle report: {}", e),
                    }
                    self.interval
                }
                Err(failure) => match self.policy.decide(&failure.error, retries) {
                    Decision::Terminate => return Err(failure),
                    Decision::Retry(delay) => {
                        retries += 1;
                        log::warn!("{} (retry {} in {:?})", failure, retries, delay);
                        if !pause_unless_shutdown(delay, &mut shutdown).await {
                            return Ok(SchedulerOutcome::Cancelled { cycles });
                        }
                        continue;
                    }
                    Decision::Skip => {
                        retries = 0;
                        cycles += 1;
                        log::warn!("{}; skipping to the next cycle", failure);
                        self.interval
                    }
                },
            };

            if self.max_cycles.is_some_and(|max| cycles >= max) {
                return Ok(SchedulerOutcome::CycleLimitReached { cycles });
            }

            log::debug!("Sleeping for {:?}", pause);
            if !pause_unless_shutdown(pause, &mut shutdown).await {
                return Ok(SchedulerOutcome::Cancelled { cycles });
            }
        }
    }
}

/// `false` if shutdown came first
async fn pause_unless_shutdown(duration: Duration, shutdown: &mut ShutdownSignal) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.triggered() => false,
    }
}
