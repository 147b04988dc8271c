//! Remote job wire model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a remote job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    /// Anything the service reports that we do not know about
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a successful submit call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub job_id: Option<String>,
}

impl SubmitResponse {
    /// The job id, if the service accepted the prompt
    pub fn accepted_job_id(&self) -> Option<&str> {
        match self.job_id.as_deref() {
            Some(id) if self.success && !id.is_empty() => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// A job as reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteJob {
    #[serde(default)]
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub response: Option<String>,
    /// Loosely typed candidate result objects
    #[serde(default)]
    pub rich_data: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub status_updates: Option<Vec<StatusUpdate>>,
}

impl RemoteJob {
    pub fn rich_data(&self) -> &[Value] {
        self.rich_data.as_deref().unwrap_or_default()
    }

    pub fn response_text(&self) -> &str {
        self.response.as_deref().unwrap_or_default()
    }

    /// Most recent progress message, if any
    pub fn latest_update(&self) -> Option<&str> {
        self.status_updates
            .as_deref()
            .and_then(|updates| updates.last())
            .and_then(|update| update.message.as_deref())
    }

    /// Error reported by the service, flattened to text
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| Some(Value::Object(map.clone()).to_string())),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_status_payload() {
        let job: RemoteJob = serde_json::from_value(json!({
            "success": true,
            "jobId": "job-1",
            "status": "processing",
            "statusUpdates": [
                { "message": "Thinking" },
                { "message": "Building transaction", "timestamp": 1700000000 }
            ]
        }))
        .unwrap();

        assert_eq!(job.job_id, "job-1");
        assert_eq!(job.status, JobStatus::Processing);
        assert!(!job.status.is_terminal());
        assert_eq!(job.latest_update(), Some("Building transaction"));
        assert!(job.rich_data().is_empty());
        assert_eq!(job.response_text(), "");
    }

    #[test]
    fn test_unknown_status_does_not_fail_parse() {
        let job: RemoteJob =
            serde_json::from_value(json!({ "jobId": "j", "status": "queued" })).unwrap();
        assert_eq!(job.status, JobStatus::Unknown);
    }

    #[test]
    fn test_null_rich_data() {
        let job: RemoteJob = serde_json::from_value(json!({
            "jobId": "j",
            "status": "completed",
            "richData": null
        }))
        .unwrap();
        assert!(job.rich_data().is_empty());
    }

    #[test]
    fn test_error_message_shapes() {
        let mut job: RemoteJob =
            serde_json::from_value(json!({ "jobId": "j", "status": "failed" })).unwrap();
        assert_eq!(job.error_message(), None);

        job.error = Some(json!("out of gas"));
        assert_eq!(job.error_message().as_deref(), Some("out of gas"));

        job.error = Some(json!({ "message": "nonce too low", "code": -32000 }));
        assert_eq!(job.error_message().as_deref(), Some("nonce too low"));

        job.error = Some(json!({ "code": 7 }));
        assert_eq!(job.error_message().as_deref(), Some(r#"{"code":7}"#));
    }

    #[test]
    fn test_submit_response_acceptance() {
        let ok: SubmitResponse =
            serde_json::from_value(json!({ "success": true, "jobId": "abc" })).unwrap();
        assert_eq!(ok.accepted_job_id(), Some("abc"));

        let rejected: SubmitResponse =
            serde_json::from_value(json!({ "success": false, "jobId": "abc" })).unwrap();
        assert_eq!(rejected.accepted_job_id(), None);

        let empty: SubmitResponse =
            serde_json::from_value(json!({ "success": true, "jobId": "" })).unwrap();
        assert_eq!(empty.accepted_job_id(), None);
    }
}
