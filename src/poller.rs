// Job poller: drives a `Job` to a terminal status by repeated refresh.
//
// The poller owns a single job handle and only ever replaces it with the
// latest refresh response. It never infers a status locally. A refresh
// transport failure ends the current wait; the whole wait is then retried
// once before giving up with an unreadable verdict. Abandoning the wait via
// `CancelToken` leaves the remote job running.

use crate::api::ApiError;
use crate::schema::{Job, JobStatus, DELETE_BUSINESS_JOB};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Pause between two refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How often a wait that stalled on a refresh failure is restarted.
const WAIT_RETRIES: u32 = 1;

/// Anything that can fetch the latest snapshot of a job.
pub trait JobSource {
    fn refresh_job(&self, business_id: &str, job_id: &str) -> Result<Job, ApiError>;
}

impl<T: JobSource + ?Sized> JobSource for &T {
    fn refresh_job(&self, business_id: &str, job_id: &str) -> Result<Job, ApiError> {
        (**self).refresh_job(business_id, job_id)
    }
}

/// Receives presentation events while the poller runs.
pub trait PollObserver {
    /// Called before every refresh with the status-derived message.
    fn progress(&mut self, message: &str, elapsed: Duration);

    fn refresh_failed(&mut self, _error: &ApiError) {}

    fn settled(&mut self, job: &Job, verdict: &Verdict);

    fn abandoned(&mut self, job: &Job);
}

/// Pause between poll iterations. Implementations may trip `cancel` while
/// waiting, e.g. on a key press.
pub trait Ticker {
    fn pause(&mut self, interval: Duration, cancel: &CancelToken);
}

/// Plain `thread::sleep`, no interrupt watching.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepTicker;

impl Ticker for SleepTicker {
    fn pause(&mut self, interval: Duration, _cancel: &CancelToken) {
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
}

/// Cooperative cancellation flag, checked between poll iterations.
#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a wait that was not abandoned ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Succeeded,
    Failed { error: Option<String> },
    /// The job never became readable as terminal. Its true state is unknown.
    Unreadable,
    /// Unreadable deletion job; the deleted business takes the job with it.
    Deleted,
}

impl Verdict {
    pub fn of(job: &Job) -> Self {
        match job.status {
            JobStatus::Success => Verdict::Succeeded,
            JobStatus::Failed => Verdict::Failed {
                error: job.error.clone(),
            },
            _ if job.job_type == DELETE_BUSINESS_JOB => Verdict::Deleted,
            _ => Verdict::Unreadable,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Verdict::Succeeded => "Job finished successfully".to_string(),
            Verdict::Failed { error: Some(error) } => {
                format!("Job failed with error message: {error}")
            }
            Verdict::Failed { error: None } => {
                "Job was unsuccessful but had no error message".to_string()
            }
            Verdict::Unreadable => "Job was unable to be read and failed".to_string(),
            Verdict::Deleted => "Deleted!".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The wait ended on its own. `job` is the last known snapshot, which is
    /// non-terminal when the verdict is `Unreadable` or `Deleted`.
    Settled { job: Job, verdict: Verdict },
    /// The caller stopped waiting. The job keeps running remotely.
    Abandoned { job_id: String, business_id: String },
}

impl WaitOutcome {
    /// The final job when it succeeded; `None` for failures and abandonment.
    pub fn succeeded(self) -> Option<Job> {
        match self {
            WaitOutcome::Settled {
                job,
                verdict: Verdict::Succeeded,
            } => Some(job),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("job {job_id} returned a malformed refresh response: {source}")]
    MalformedRefresh {
        job_id: String,
        #[source]
        source: ApiError,
    },
}

/// Status line shown while waiting.
pub fn progress_message(job: &Job) -> &str {
    match job.status {
        JobStatus::Pending => "Initialising",
        JobStatus::InProgress => job.message.as_deref().unwrap_or("Running"),
        JobStatus::Success | JobStatus::Failed => "Finished",
    }
}

/// `HH:MM:SS`; hours keep counting past a day.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

fn elapsed_since_start(job: &Job) -> Duration {
    // A server clock ahead of ours yields a negative span; show zero instead.
    (Utc::now() - job.started_at).to_std().unwrap_or_default()
}

enum Pass {
    Stopped,
    Abandoned,
}

pub struct Poller<S, O, T = SleepTicker> {
    job: Job,
    source: S,
    observer: O,
    ticker: T,
    interval: Duration,
}

impl<S, O> Poller<S, O, SleepTicker>
where
    S: JobSource,
    O: PollObserver,
{
    pub fn new(job: Job, source: S, observer: O) -> Self {
        Poller {
            job,
            source,
            observer,
            ticker: SleepTicker,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl<S, O, T> Poller<S, O, T>
where
    S: JobSource,
    O: PollObserver,
    T: Ticker,
{
    pub fn with_ticker<U: Ticker>(self, ticker: U) -> Poller<S, O, U> {
        Poller {
            job: self.job,
            source: self.source,
            observer: self.observer,
            ticker,
            interval: self.interval,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Wait until the job is terminal, the wait is abandoned, or refreshing
    /// keeps failing.
    ///
    /// Only malformed refresh responses are returned as errors; a failed job
    /// is a normal outcome.
    pub fn await_completion(&mut self, cancel: &CancelToken) -> Result<WaitOutcome, PollError> {
        let mut retries_left = WAIT_RETRIES;
        loop {
            if let Pass::Abandoned = self.pass(cancel)? {
                info!(
                    job_id = %self.job.job_id,
                    business_id = %self.job.business_id,
                    "stopped waiting for job"
                );
                self.observer.abandoned(&self.job);
                return Ok(WaitOutcome::Abandoned {
                    job_id: self.job.job_id.clone(),
                    business_id: self.job.business_id.clone(),
                });
            }
            if self.job.status.is_terminal() || retries_left == 0 {
                break;
            }
            retries_left -= 1;
            debug!(job_id = %self.job.job_id, status = %self.job.status, "retrying wait");
        }

        let verdict = Verdict::of(&self.job);
        info!(job_id = %self.job.job_id, status = %self.job.status, ?verdict, "job wait finished");
        self.observer.settled(&self.job, &verdict);
        Ok(WaitOutcome::Settled {
            job: self.job.clone(),
            verdict,
        })
    }

    /// One run of the refresh loop. Stops at a terminal status or at the
    /// first refresh transport failure.
    fn pass(&mut self, cancel: &CancelToken) -> Result<Pass, PollError> {
        while !self.job.status.is_terminal() {
            if cancel.is_cancelled() {
                return Ok(Pass::Abandoned);
            }
            self.observer
                .progress(progress_message(&self.job), elapsed_since_start(&self.job));

            match self.source.refresh_job(&self.job.business_id, &self.job.job_id) {
                Ok(latest) => self.job = latest,
                Err(source) if source.is_malformed() => {
                    return Err(PollError::MalformedRefresh {
                        job_id: self.job.job_id.clone(),
                        source,
                    });
                }
                Err(error) => {
                    // The spinner owns the terminal here; keep this off the default filter.
                    debug!(job_id = %self.job.job_id, %error, "job refresh failed");
                    self.observer.refresh_failed(&error);
                    return Ok(Pass::Stopped);
                }
            }

            if !self.job.status.is_terminal() {
                self.ticker.pause(self.interval, cancel);
            }
        }
        Ok(Pass::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reqwest::StatusCode;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    fn job(status: JobStatus) -> Job {
        Job {
            job_id: "job-1".into(),
            job_type: "business_plan".into(),
            business_id: "biz-1".into(),
            status,
            message: None,
            cost: None,
            error: None,
            result: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn in_progress(message: &str) -> Job {
        Job {
            message: Some(message.into()),
            ..job(JobStatus::InProgress)
        }
    }

    fn unavailable() -> ApiError {
        ApiError::Status {
            action: "get job",
            status: StatusCode::BAD_GATEWAY,
            body: "upstream down".into(),
        }
    }

    /// Replays scripted refresh responses, then answers with an outage.
    #[derive(Default)]
    struct Scripted {
        replies: RefCell<VecDeque<Result<Job, ApiError>>>,
        calls: Cell<usize>,
        cancel_on_call: Option<(usize, CancelToken)>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Job, ApiError>>) -> Self {
            Scripted {
                replies: RefCell::new(replies.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.get()
        }
    }

    impl JobSource for Scripted {
        fn refresh_job(&self, business_id: &str, job_id: &str) -> Result<Job, ApiError> {
            assert_eq!(business_id, "biz-1");
            assert_eq!(job_id, "job-1");
            self.calls.set(self.calls.get() + 1);
            if let Some((n, token)) = &self.cancel_on_call {
                if *n == self.calls.get() {
                    token.cancel();
                }
            }
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(unavailable()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        messages: Vec<String>,
        failures: usize,
        settled: Vec<Verdict>,
        abandoned: Vec<(String, JobStatus)>,
    }

    impl PollObserver for Recorder {
        fn progress(&mut self, message: &str, _elapsed: Duration) {
            self.messages.push(message.to_string());
        }

        fn refresh_failed(&mut self, _error: &ApiError) {
            self.failures += 1;
        }

        fn settled(&mut self, _job: &Job, verdict: &Verdict) {
            self.settled.push(verdict.clone());
        }

        fn abandoned(&mut self, job: &Job) {
            self.abandoned.push((job.job_id.clone(), job.status));
        }
    }

    fn poller(seed: Job, source: &Scripted) -> Poller<&Scripted, Recorder> {
        Poller::new(seed, source, Recorder::default()).with_interval(Duration::ZERO)
    }

    #[test]
    fn terminal_job_is_returned_without_refreshing() {
        for status in [JobStatus::Success, JobStatus::Failed] {
            let source = Scripted::new(vec![]);
            let mut poller = poller(job(status), &source);

            let outcome = poller.await_completion(&CancelToken::new()).unwrap();

            assert_eq!(source.calls(), 0);
            assert!(poller.observer().messages.is_empty());
            match outcome {
                WaitOutcome::Settled { job, .. } => assert_eq!(job.status, status),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
    }

    #[test]
    fn progress_message_follows_status() {
        assert_eq!(progress_message(&job(JobStatus::Pending)), "Initialising");
        assert_eq!(progress_message(&job(JobStatus::InProgress)), "Running");
        assert_eq!(progress_message(&in_progress("Drafting plan")), "Drafting plan");
        assert_eq!(progress_message(&job(JobStatus::Success)), "Finished");
        assert_eq!(progress_message(&job(JobStatus::Failed)), "Finished");
    }

    #[test]
    fn pending_job_runs_to_success() {
        let done = Job {
            result: Some(serde_json::json!({"business_plan": "..."})),
            ..job(JobStatus::Success)
        };
        let source = Scripted::new(vec![
            Ok(in_progress("Step 1")),
            Ok(in_progress("Step 2")),
            Ok(done),
        ]);
        let mut poller = poller(job(JobStatus::Pending), &source);

        let outcome = poller.await_completion(&CancelToken::new()).unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(
            poller.observer().messages,
            vec!["Initialising", "Step 1", "Step 2"]
        );
        assert_eq!(poller.observer().settled, vec![Verdict::Succeeded]);
        let job = outcome.succeeded().expect("job should have succeeded");
        assert_eq!(job.status, JobStatus::Success);
        assert!(job.result.is_some());
    }

    #[test]
    fn failed_job_is_reported_not_raised() {
        let source = Scripted::new(vec![Ok(Job {
            error: Some("quota exceeded".into()),
            ..job(JobStatus::Failed)
        })]);
        let mut poller = poller(job(JobStatus::InProgress), &source);

        let outcome = poller.await_completion(&CancelToken::new()).unwrap();

        let verdict = Verdict::Failed {
            error: Some("quota exceeded".into()),
        };
        assert_eq!(verdict.describe(), "Job failed with error message: quota exceeded");
        assert_eq!(poller.observer().settled, vec![verdict]);
        assert!(outcome.succeeded().is_none());
    }

    #[test]
    fn failed_job_without_error_has_fallback_description() {
        let verdict = Verdict::of(&job(JobStatus::Failed));
        assert_eq!(verdict, Verdict::Failed { error: None });
        assert_eq!(
            verdict.describe(),
            "Job was unsuccessful but had no error message"
        );
    }

    #[test]
    fn refresh_outage_retries_once_then_gives_up() {
        let source = Scripted::new(vec![]);
        let mut poller = poller(in_progress("Working"), &source);

        let outcome = poller.await_completion(&CancelToken::new()).unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(poller.observer().failures, 2);
        match outcome {
            WaitOutcome::Settled { job, verdict } => {
                assert_eq!(verdict, Verdict::Unreadable);
                assert_eq!(job.status, JobStatus::InProgress);
                assert_eq!(job.message.as_deref(), Some("Working"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn refresh_outage_stays_quiet_under_default_filter() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
            .with_writer(move || writer.clone())
            .finish();
        let source = Scripted::new(vec![]);

        tracing::subscriber::with_default(subscriber, || {
            poller(in_progress("Working"), &source)
                .await_completion(&CancelToken::new())
                .unwrap();
        });

        assert_eq!(source.calls(), 2);
        assert!(captured.0.lock().unwrap().is_empty());
    }

    #[test]
    fn retry_can_still_reach_success() {
        let source = Scripted::new(vec![
            Ok(in_progress("Step 1")),
            Err(unavailable()),
            Ok(job(JobStatus::Success)),
        ]);
        let mut poller = poller(job(JobStatus::Pending), &source);

        let outcome = poller.await_completion(&CancelToken::new()).unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(poller.observer().settled, vec![Verdict::Succeeded]);
        assert!(outcome.succeeded().is_some());
    }

    #[test]
    fn unreadable_deletion_counts_as_deleted() {
        let source = Scripted::new(vec![]);
        let seed = Job {
            job_type: DELETE_BUSINESS_JOB.into(),
            ..job(JobStatus::Pending)
        };
        let mut poller = poller(seed, &source);

        let outcome = poller.await_completion(&CancelToken::new()).unwrap();

        assert_eq!(source.calls(), 2);
        match outcome {
            WaitOutcome::Settled { verdict, .. } => {
                assert_eq!(verdict, Verdict::Deleted);
                assert_eq!(verdict.describe(), "Deleted!");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn malformed_refresh_is_a_hard_error() {
        let malformed = ApiError::Decode {
            action: "get job",
            source: serde_json::from_str::<Job>("{}").unwrap_err(),
        };
        let source = Scripted::new(vec![Err(malformed)]);
        let mut poller = poller(job(JobStatus::Pending), &source);

        let err = poller.await_completion(&CancelToken::new()).unwrap_err();

        assert!(matches!(err, PollError::MalformedRefresh { ref job_id, .. } if job_id == "job-1"));
        assert_eq!(source.calls(), 1);
        assert!(poller.observer().settled.is_empty());
    }

    #[test]
    fn abandoning_stops_refreshing_and_reports_identity() {
        let cancel = CancelToken::new();
        let source = Scripted {
            cancel_on_call: Some((2, cancel.clone())),
            ..Scripted::new(vec![
                Ok(in_progress("Step 1")),
                Ok(in_progress("Step 2")),
                Ok(job(JobStatus::Success)),
            ])
        };
        let mut poller = poller(job(JobStatus::Pending), &source);

        let outcome = poller.await_completion(&cancel).unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(
            outcome,
            WaitOutcome::Abandoned {
                job_id: "job-1".into(),
                business_id: "biz-1".into(),
            }
        );
        assert_eq!(
            poller.observer().abandoned,
            vec![("job-1".to_string(), JobStatus::InProgress)]
        );
        assert!(poller.observer().settled.is_empty());
    }

    #[test]
    fn ticker_can_abandon_between_refreshes() {
        struct InterruptingTicker;
        impl Ticker for InterruptingTicker {
            fn pause(&mut self, _interval: Duration, cancel: &CancelToken) {
                cancel.cancel();
            }
        }

        let source = Scripted::new(vec![Ok(in_progress("Step 1"))]);
        let mut poller = poller(job(JobStatus::Pending), &source)
            .with_ticker(InterruptingTicker);

        let outcome = poller.await_completion(&CancelToken::new()).unwrap();

        assert_eq!(source.calls(), 1);
        assert!(matches!(outcome, WaitOutcome::Abandoned { .. }));
    }

    #[test]
    fn elapsed_is_formatted_as_clock() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(61)), "00:01:01");
        assert_eq!(format_elapsed(Duration::from_secs(3 * 3600 + 25)), "03:00:25");
        assert_eq!(format_elapsed(Duration::from_secs(26 * 3600)), "26:00:00");
    }

    #[test]
    fn elapsed_never_goes_negative() {
        let future = Job {
            started_at: Utc::now() + chrono::Duration::minutes(5),
            ..job(JobStatus::Pending)
        };
        assert_eq!(elapsed_since_start(&future), Duration::ZERO);
    }
}
