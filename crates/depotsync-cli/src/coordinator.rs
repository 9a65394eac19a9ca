use std::fmt;
use std::future::Future;
use std::time::Duration;

use depotsync_installer::{ApplyReport, InstallerTool, UpdateCheck, UpdateEngine, UpdateError};
use depotsync_resolver::{ClusterApi, RestartError, RestartReport, WorkloadRestarter};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// The retryable stages of an update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Apply,
    Validate,
    Restart,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Validate => "validate",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Update(#[from] UpdateError),
    #[error(transparent)]
    Restart(#[from] RestartError),
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("update check failed (retry count {retry_count}): {source}")]
    Check {
        retry_count: u32,
        #[source]
        source: UpdateError,
    },
    #[error("{stage} failed (attempt {attempt}/{max_retries}): {source}")]
    Stage {
        stage: Stage,
        attempt: u32,
        max_retries: u32,
        #[source]
        source: StageError,
    },
    #[error("{stage} failed after {attempts} attempts, giving up on this update: {source}")]
    Exhausted {
        stage: Stage,
        attempts: u32,
        #[source]
        source: StageError,
    },
}

impl CycleError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Check { .. } => "check",
            Self::Stage { stage, .. } | Self::Exhausted { stage, .. } => stage.as_str(),
        }
    }

    /// Captured installer output for failures that came from a tool run.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Check { source, .. } => source.output(),
            Self::Stage { source, .. } | Self::Exhausted { source, .. } => match source {
                StageError::Update(err) => err.output(),
                StageError::Restart(_) => None,
            },
        }
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    UpToDate {
        check: UpdateCheck,
    },
    Updated {
        check: UpdateCheck,
        apply: ApplyReport,
        restart: RestartReport,
    },
}

/// Runs update cycles and owns the retry budget shared between them.
///
/// The retry counter counts consecutive failed cycles. It resets after a cycle
/// that applied, validated and restarted successfully, and after the budget is
/// exhausted.
pub struct Coordinator<T, A> {
    engine: UpdateEngine<T>,
    restarter: WorkloadRestarter<A>,
    selector: String,
    policy: RetryPolicy,
    retry_count: u32,
}

impl<T: InstallerTool, A: ClusterApi> Coordinator<T, A> {
    pub fn new(
        engine: UpdateEngine<T>,
        restarter: WorkloadRestarter<A>,
        selector: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            engine,
            restarter,
            selector: selector.into(),
            policy,
            retry_count: 0,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Polls on `check_interval` until `shutdown` resolves. The in-flight cycle
    /// is dropped on shutdown, which kills any running installer process.
    pub async fn run<F>(&mut self, check_interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("update controller started");
        let mut ticker = tokio::time::interval(check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                result = self.run_cycle() => result,
            };
            self.log_cycle(result);
        }

        info!("update controller stopping");
    }

    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        info!("checking for updates");
        let retry_count = self.retry_count;
        let check = self
            .engine
            .check_update()
            .await
            .map_err(|source| CycleError::Check {
                retry_count,
                source,
            })?;

        if !check.needs_update() {
            info!(status = %check.summary(), "installation is current");
            return Ok(CycleOutcome::UpToDate { check });
        }
        info!(status = %check.summary(), "update available, starting update process");

        info!("downloading and installing update");
        let apply = match self.engine.apply_update().await {
            Ok(apply) => apply,
            Err(err) => return Err(self.record_failure(Stage::Apply, err.into()).await),
        };

        info!("validating update");
        if let Err(err) = self.engine.validate_update().await {
            return Err(self.record_failure(Stage::Validate, err.into()).await);
        }

        info!("update successful, restarting affected pods");
        let restart = match self.restarter.restart_matching(&self.selector).await {
            Ok(restart) => restart,
            Err(err) => return Err(self.record_failure(Stage::Restart, err.into()).await),
        };

        self.retry_count = 0;
        Ok(CycleOutcome::Updated {
            check,
            apply,
            restart,
        })
    }

    fn log_cycle(&self, result: Result<CycleOutcome, CycleError>) {
        match result {
            Ok(CycleOutcome::UpToDate { check }) => {
                info!(status = %check.summary(), "no updates available, continuing monitoring");
            }
            Ok(CycleOutcome::Updated {
                check,
                apply,
                restart,
            }) => {
                info!(
                    status = %check.summary(),
                    recovered = apply.recovered,
                    restarted = restart.restarted.len(),
                    units = restart.units,
                    "update process completed successfully"
                );
            }
            Err(err) => {
                if let Some(output) = err.output() {
                    debug!(stage = err.stage(), output, "captured installer output");
                }
                error!(
                    stage = err.stage(),
                    retry_count = self.retry_count,
                    error = %err,
                    "update cycle failed"
                );
            }
        }
    }

    async fn record_failure(&mut self, stage: Stage, source: StageError) -> CycleError {
        self.retry_count += 1;
        let attempt = self.retry_count;
        let max_retries = self.policy.max_retries;
        error!(stage = %stage, attempt, max_retries, error = %source, "update failed");

        if attempt >= max_retries {
            error!(stage = %stage, "max retries exceeded, giving up on this update");
            self.retry_count = 0;
            return CycleError::Exhausted {
                stage,
                attempts: attempt,
                source,
            };
        }

        info!(
            delay = %humantime::format_duration(self.policy.retry_delay),
            "will retry after delay"
        );
        tokio::time::sleep(self.policy.retry_delay).await;
        CycleError::Stage {
            stage,
            attempt,
            max_retries,
            source,
        }
    }
}
