//! Status polling for long-running jobs.
//!
//! A poller fetches the job once right away, then again every
//! [`PollerConfig::interval`] until the job reaches a terminal status. The
//! task is owned through a [`PollHandle`]: cancelling it, or dropping it,
//! guarantees no further fetch starts.
//!
//! Fetch errors are reported on the handle one by one and do not stop the
//! loop. Consecutive failures back off exponentially, and after
//! [`PollerConfig::max_consecutive_errors`] of them in a row the poller gives
//! up instead of hammering a job id that will never resolve.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, info_span, warn, Instrument};

use super::JobRecord;
use crate::error::ApiError;

/// Polling cadence and retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Delay between two successful fetches.
    pub interval: Duration,
    /// Consecutive failed fetches after which the poller gives up.
    pub max_consecutive_errors: u32,
    /// Upper bound of the backoff delay after failures.
    pub max_backoff: Duration,
    /// Spread backoff delays by up to ±10%.
    pub jitter: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_consecutive_errors: 5,
            max_backoff: Duration::from_secs(120),
            jitter: true,
        }
    }
}

impl PollerConfig {
    /// Delay before the next fetch after `consecutive_errors` failures in a row.
    ///
    /// Starts at the regular interval and doubles per failure, capped at
    /// `max_backoff`.
    pub fn backoff(&self, consecutive_errors: u32) -> Duration {
        let exponent = consecutive_errors.saturating_sub(1).min(16);
        let delay = self
            .interval
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff.max(self.interval));

        if self.jitter {
            delay.mul_f64(0.9 + fastrand::f64() * 0.2)
        } else {
            delay
        }
    }
}

/// Observable state of a poller.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    /// Spawned, first fetch not answered yet.
    Idle,
    /// Job still running; `job` is the latest snapshot, if any fetch succeeded.
    Polling {
        job: Option<JobRecord>,
        consecutive_errors: u32,
    },
    /// The job reached `completed` or `failed`.
    Terminal(JobRecord),
    Cancelled { last: Option<JobRecord> },
    GaveUp { last: Option<JobRecord>, attempts: u32 },
}

impl PollState {
    /// Latest job snapshot known in this state.
    pub fn job(&self) -> Option<&JobRecord> {
        match self {
            PollState::Idle => None,
            PollState::Polling { job, .. } => job.as_ref(),
            PollState::Terminal(job) => Some(job),
            PollState::Cancelled { last } | PollState::GaveUp { last, .. } => last.as_ref(),
        }
    }

    /// True once no further fetch will happen.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            PollState::Terminal(_) | PollState::Cancelled { .. } | PollState::GaveUp { .. }
        )
    }
}

/// How a poller ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Terminal(JobRecord),
    Cancelled,
    GaveUp { attempts: u32, last_error: String },
}

/// Owner of a running poller.
///
/// Dropping the handle cancels the poller.
#[derive(Debug)]
pub struct PollHandle {
    job_id: String,
    cancel: CancellationToken,
    state: watch::Receiver<PollState>,
    errors: mpsc::UnboundedReceiver<ApiError>,
    task: JoinHandle<PollOutcome>,
    _guard: DropGuard,
}

impl PollHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stops the poller. No fetch starts after this returns, and a fetch in
    /// flight is abandoned.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this poller, e.g. for a Ctrl-C handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current state.
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    /// Next fetch error, or `None` once the poller has finished and every
    /// error was read.
    pub async fn next_error(&mut self) -> Option<ApiError> {
        self.errors.recv().await
    }

    /// Waits for the poller to finish.
    pub async fn wait(self) -> PollOutcome {
        let PollHandle { task, _guard, .. } = self;
        match task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => PollOutcome::Cancelled,
        }
    }
}

/// Spawns a poller for `job_id`.
///
/// `fetch` is called with the job id on every tick. `on_terminal` runs once,
/// inside the poller task, when the job reaches a terminal status, and
/// before that status is published to subscribers. It is not called on
/// cancellation or give-up.
pub fn spawn<F, Fut, H>(
    job_id: impl Into<String>,
    config: PollerConfig,
    fetch: F,
    on_terminal: H,
) -> PollHandle
where
    F: Fn(String) -> Fut + Send + 'static,
    Fut: Future<Output = Result<JobRecord, ApiError>> + Send + 'static,
    H: FnOnce(&JobRecord) + Send + 'static,
{
    let job_id = job_id.into();
    let cancel = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(PollState::Idle);
    let (error_tx, error_rx) = mpsc::unbounded_channel();

    let span = info_span!("job_poller", job_id = %job_id);
    let poll = {
        let job_id = job_id.clone();
        let cancel = cancel.clone();
        async move {
            run(job_id, config, fetch, on_terminal, state_tx, error_tx, cancel).await
        }
    };
    let task = tokio::spawn(poll.instrument(span));

    PollHandle {
        job_id,
        _guard: cancel.clone().drop_guard(),
        cancel,
        state: state_rx,
        errors: error_rx,
        task,
    }
}

async fn run<F, Fut, H>(
    job_id: String,
    config: PollerConfig,
    fetch: F,
    on_terminal: H,
    state: watch::Sender<PollState>,
    errors: mpsc::UnboundedSender<ApiError>,
    cancel: CancellationToken,
) -> PollOutcome
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<JobRecord, ApiError>>,
    H: FnOnce(&JobRecord),
{
    let mut last: Option<JobRecord> = None;
    let mut consecutive_errors = 0u32;

    let cancelled = |last: Option<JobRecord>| {
        info!("⏹️ Polling cancelled");
        state.send_replace(PollState::Cancelled { last });
        PollOutcome::Cancelled
    };

    loop {
        if cancel.is_cancelled() {
            return cancelled(last);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(last),
            result = fetch(job_id.clone()) => result,
        };

        let delay = match result {
            Ok(job) => {
                consecutive_errors = 0;
                if job.status.is_terminal() {
                    info!(status = %job.status, "✅ Job finished");
                    // side effects land before anyone can observe the terminal state
                    on_terminal(&job);
                    state.send_replace(PollState::Terminal(job.clone()));
                    return PollOutcome::Terminal(job);
                }

                debug!(
                    status = %job.status,
                    processed = job.processed_tracks,
                    total = job.total_tracks,
                    "job still running"
                );
                state.send_replace(PollState::Polling {
                    job: Some(job.clone()),
                    consecutive_errors,
                });
                last = Some(job);
                config.interval
            }
            Err(err) => {
                consecutive_errors += 1;
                warn!(attempt = consecutive_errors, "Job status fetch failed: {}", err);
                let message = err.to_string();
                // the receiver may already be gone; polling goes on regardless
                let _ = errors.send(err);

                if consecutive_errors >= config.max_consecutive_errors {
                    warn!("❌ Giving up after {} consecutive failures", consecutive_errors);
                    state.send_replace(PollState::GaveUp {
                        last,
                        attempts: consecutive_errors,
                    });
                    return PollOutcome::GaveUp {
                        attempts: consecutive_errors,
                        last_error: message,
                    };
                }

                state.send_replace(PollState::Polling {
                    job: last.clone(),
                    consecutive_errors,
                });
                config.backoff(consecutive_errors)
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(last),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
