//! Submit/poll state machine for remote agent jobs
//!
//! A job moves `submitted -> {pending, processing}* -> {completed | failed | cancelled}`.
//! [`AsyncJobClient::await_job`] polls strictly sequentially, sleeping one
//! interval before every poll, and stops at the first terminal state or once
//! `max_attempts` polls have been made. Transport errors end the wait
//! immediately; nothing here retries.

use super::job::{JobStatus, RemoteJob, SubmitResponse};
use super::transport::JobTransport;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Poll cadence and budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    /// 2s x 150 polls, five minutes in total
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 150,
        }
    }
}

impl PollConfig {
    /// Upper bound on time spent polling one job
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

#[derive(Clone)]
pub struct AsyncJobClient {
    transport: Arc<dyn JobTransport>,
    poll: PollConfig,
}

impl std::fmt::Debug for AsyncJobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncJobClient")
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl AsyncJobClient {
    pub fn new(transport: Arc<dyn JobTransport>, poll: PollConfig) -> Self {
        Self { transport, poll }
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    pub async fn ping(&self) -> bool {
        self.transport.ping().await
    }

    /// Submit a prompt and return the job id assigned by the service
    pub async fn submit(&self, prompt: &str) -> Result<String> {
        let raw = self.transport.submit(prompt).await?;
        let parsed: SubmitResponse = serde_json::from_value(raw.clone())
            .map_err(|_| Error::MalformedSubmitResponse(raw.to_string()))?;

        let job_id = parsed
            .accepted_job_id()
            .ok_or_else(|| Error::MalformedSubmitResponse(raw.to_string()))?
            .to_string();

        tracing::info!(job_id = %job_id, "Remote job submitted");
        Ok(job_id)
    }

    /// Poll `job_id` until it reaches a terminal state.
    ///
    /// Returns the completed job; `failed` and `cancelled` become errors.
    pub async fn await_job(&self, job_id: &str) -> Result<RemoteJob> {
        let mut last_status: Option<JobStatus> = None;

        for attempt in 1..=self.poll.max_attempts {
            tokio::time::sleep(self.poll.interval).await;

            let raw = self.transport.status(job_id).await.map_err(|e| match e {
                Error::PollTransport(_) => e,
                other => Error::PollTransport(other.to_string()),
            })?;
            let job: RemoteJob = serde_json::from_value(raw)
                .map_err(|e| Error::PollTransport(format!("Invalid job status payload: {}", e)))?;

            if last_status != Some(job.status) {
                if job.status == JobStatus::Unknown {
                    tracing::warn!(job_id, attempt, "Remote job reported an unrecognized status");
                } else {
                    tracing::info!(job_id, status = %job.status, attempt, "Remote job status changed");
                }
                last_status = Some(job.status);
            }
            if let Some(message) = job.latest_update() {
                tracing::debug!(job_id, update = message, "Remote job progress");
            }

            if job.status.is_terminal() {
                return match job.status {
                    JobStatus::Completed => Ok(job),
                    JobStatus::Failed => Err(Error::RemoteJobFailed(
                        job.error_message()
                            .unwrap_or_else(|| "no error details".to_string()),
                    )),
                    _ => Err(Error::RemoteJobCancelled(job_id.to_string())),
                };
            }
        }

        Err(Error::RemoteJobTimeout {
            job_id: job_id.to_string(),
            attempts: self.poll.max_attempts,
        })
    }

    /// Submit and wait in one call
    pub async fn run(&self, prompt: &str) -> Result<RemoteJob> {
        let job_id = self.submit(prompt).await?;
        self.await_job(&job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::transport::testing::{accepted, job, ScriptedTransport};
    use serde_json::json;
    use std::sync::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Records the message of every event
    #[derive(Clone, Default)]
    struct CaptureLayer {
        messages: Arc<Mutex<Vec<String>>>,
    }

    struct MessageVisitor(Option<String>);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = Some(format!("{:?}", value));
            }
        }
    }

    impl<S: Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor(None);
            event.record(&mut visitor);
            if let Some(message) = visitor.0 {
                self.messages.lock().unwrap().push(message);
            }
        }
    }

    fn fast(max_attempts: u32) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    fn client(transport: &Arc<ScriptedTransport>, poll: PollConfig) -> AsyncJobClient {
        AsyncJobClient::new(transport.clone(), poll)
    }

    #[tokio::test]
    async fn test_completed_after_progress_logs_each_status_once() {
        let capture = CaptureLayer::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut done = job("job-1", "completed");
        done["response"] = json!("All set");
        let transport = Arc::new(ScriptedTransport::new(
            accepted("job-1"),
            vec![
                job("job-1", "pending"),
                job("job-1", "pending"),
                job("job-1", "processing"),
                job("job-1", "processing"),
                done,
            ],
        ));

        let result = client(&transport, fast(10)).run("do it").await.unwrap();

        assert_eq!(result.job_id, "job-1");
        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.response_text(), "All set");
        assert_eq!(transport.polls(), 5);

        let changes = capture
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == "Remote job status changed")
            .count();
        assert_eq!(changes, 3);
    }

    #[tokio::test]
    async fn test_timeout_after_exactly_max_attempts() {
        let transport = Arc::new(ScriptedTransport::new(
            accepted("slow"),
            vec![job("slow", "pending"), job("slow", "processing")],
        ));

        let err = client(&transport, fast(7)).run("wait").await.unwrap_err();

        assert!(matches!(
            err,
            Error::RemoteJobTimeout { ref job_id, attempts: 7 } if job_id == "slow"
        ));
        assert_eq!(transport.polls(), 7);
    }

    #[tokio::test]
    async fn test_malformed_submit_is_not_polled() {
        let transport = Arc::new(ScriptedTransport::new(
            json!({ "success": false, "message": "bad key" }),
            vec![job("x", "completed")],
        ));

        let err = client(&transport, fast(3)).run("hi").await.unwrap_err();

        assert!(matches!(err, Error::MalformedSubmitResponse(_)));
        assert_eq!(transport.polls(), 0);
    }

    #[tokio::test]
    async fn test_submit_without_job_id() {
        let transport = Arc::new(ScriptedTransport::new(json!({ "success": true }), vec![]));

        assert!(matches!(
            client(&transport, fast(3)).submit("hi").await,
            Err(Error::MalformedSubmitResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_job() {
        let mut failed = job("j", "failed");
        failed["error"] = json!("slippage exceeded");
        let transport = Arc::new(ScriptedTransport::new(
            accepted("j"),
            vec![job("j", "processing"), failed],
        ));

        let err = client(&transport, fast(5)).run("swap").await.unwrap_err();

        assert!(matches!(err, Error::RemoteJobFailed(ref m) if m == "slippage exceeded"));
        assert_eq!(transport.polls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_job() {
        let transport = Arc::new(ScriptedTransport::new(
            accepted("j"),
            vec![job("j", "cancelled")],
        ));

        let err = client(&transport, fast(5)).run("swap").await.unwrap_err();

        assert!(matches!(err, Error::RemoteJobCancelled(ref id) if id == "j"));
    }

    #[tokio::test]
    async fn test_transport_error_fails_fast() {
        let transport = Arc::new(ScriptedTransport::failing("connection reset"));

        let err = client(&transport, fast(50)).run("swap").await.unwrap_err();

        assert!(matches!(err, Error::PollTransport(ref m) if m.contains("connection reset")));
        assert_eq!(transport.polls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_status_keeps_polling() {
        let transport = Arc::new(ScriptedTransport::new(
            accepted("j"),
            vec![job("j", "queued"), job("j", "completed")],
        ));

        let result = client(&transport, fast(5)).run("swap").await.unwrap();

        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(transport.polls(), 2);
    }

    #[test]
    fn test_default_budget_is_five_minutes() {
        assert_eq!(PollConfig::default().budget(), Duration::from_secs(300));
    }
}
