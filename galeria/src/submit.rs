//! Decisions taken on the processing endpoint's reply.

use serde::{Deserialize, Serialize};

use crate::routes::{results_url, RESULTS_PATH};

/// Shown when the server rejects a run without a message.
pub const GENERIC_REJECTION: &str = "Error inesperado";
/// Shown when the request itself fails or the reply is not JSON.
pub const NETWORK_ERROR_MESSAGE: &str = "Error de red o servidor";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SubmitResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// A run the server accepted but has not finished yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartedJob {
    pub thread_id: String,
    pub run_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Server refused the run; show `message` and stop.
    Rejected { message: String },
    /// Run finished inside the request; go straight to the results page.
    Completed { results_url: String },
    /// Run continues in the background; poll its status.
    Started(StartedJob),
    /// Accepted but without a thread id to poll.
    Untracked,
}

impl SubmitResponse {
    pub fn outcome(&self) -> SubmitOutcome {
        if self.status != "ok" {
            let message = self
                .message
                .as_deref()
                .filter(|m| !m.is_empty())
                .unwrap_or(GENERIC_REJECTION)
                .to_string();
            return SubmitOutcome::Rejected { message };
        }
        if self.completed {
            let run_id = self.run_id.as_deref().unwrap_or_default();
            return SubmitOutcome::Completed {
                results_url: results_url(RESULTS_PATH, run_id),
            };
        }
        match self.thread_id.as_deref() {
            Some(thread_id) if !thread_id.is_empty() => SubmitOutcome::Started(StartedJob {
                thread_id: thread_id.to_string(),
                run_id: self.run_id.clone().filter(|r| !r.is_empty()),
            }),
            _ => SubmitOutcome::Untracked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SubmitResponse {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn synchronous_completion_goes_to_results() {
        let outcome = parse(r#"{"status":"ok","completed":true,"run_id":"42"}"#).outcome();
        assert_eq!(
            outcome,
            SubmitOutcome::Completed {
                results_url: "/resultados?run_id=42".to_string()
            }
        );
    }

    #[test]
    fn asynchronous_completion_starts_polling() {
        let outcome =
            parse(r#"{"status":"ok","completed":false,"thread_id":"abc","run_id":"r1"}"#).outcome();
        assert_eq!(
            outcome,
            SubmitOutcome::Started(StartedJob {
                thread_id: "abc".to_string(),
                run_id: Some("r1".to_string()),
            })
        );
        let no_flag = parse(r#"{"status":"ok","thread_id":"abc"}"#).outcome();
        assert!(matches!(no_flag, SubmitOutcome::Started(_)));
    }

    #[test]
    fn rejection_uses_message_or_fallback() {
        let with_message =
            parse(r#"{"status":"error","message":"Faltan datos en sesión."}"#).outcome();
        assert_eq!(
            with_message,
            SubmitOutcome::Rejected {
                message: "Faltan datos en sesión.".to_string()
            }
        );
        let bare = parse(r#"{}"#).outcome();
        assert_eq!(
            bare,
            SubmitOutcome::Rejected {
                message: GENERIC_REJECTION.to_string()
            }
        );
    }

    #[test]
    fn missing_thread_id_is_untracked() {
        let outcome = parse(r#"{"status":"ok","completed":false}"#).outcome();
        assert_eq!(outcome, SubmitOutcome::Untracked);
    }

    #[test]
    fn completed_without_run_id_uses_bare_results_path() {
        let outcome = parse(r#"{"status":"ok","completed":true}"#).outcome();
        assert_eq!(
            outcome,
            SubmitOutcome::Completed {
                results_url: "/resultados".to_string()
            }
        );
    }
}
