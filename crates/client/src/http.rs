// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the server client.

use crate::types::{
    ActionRecord, ClaimParams, NewTask, OrchestratorInfo, PollData, TaskPatch,
};
use crate::{ClientError, ServerClient};
use fm_core::{OrchestratorId, Queue, Task, TaskId};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Blocking HTTP client for the task metadata server.
///
/// Every request carries a hard timeout; a slow server surfaces as a
/// transport error the caller logs and skips, never a hung tick.
pub struct HttpServerClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpServerClient {
    pub fn new(base_url: impl Into<String>) -> HttpServerClient {
        HttpServerClient::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> HttpServerClient {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        HttpServerClient { base_url, agent }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, ClientError> {
        let body = response
            .into_string()
            .map_err(|e| ClientError::Transport(format!("reading response body: {e}")))?;
        Ok(serde_json::from_str(&body)?)
    }

    fn map_err(error: ureq::Error) -> ClientError {
        match error {
            ureq::Error::Status(status, response) => ClientError::Status {
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(t) => ClientError::Transport(t.to_string()),
        }
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.agent.get(&self.url(path)).call().map_err(Self::map_err)?;
        Self::decode(response)
    }

    fn post_json(&self, path: &str, body: serde_json::Value) -> Result<ureq::Response, ClientError> {
        self.agent.post(&self.url(path)).send_json(body).map_err(Self::map_err)
    }
}

impl ServerClient for HttpServerClient {
    fn list_tasks(&self, queue: Option<Queue>) -> Result<Vec<Task>, ClientError> {
        let path = match queue {
            Some(queue) => format!("/tasks?queue={queue}"),
            None => "/tasks".to_string(),
        };
        self.get(&path)
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, ClientError> {
        match self.agent.get(&self.url(&format!("/tasks/{id}"))).call() {
            Ok(response) => Ok(Some(Self::decode(response)?)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(Self::map_err(e)),
        }
    }

    fn create_task(&self, new_task: &NewTask) -> Result<Task, ClientError> {
        let response = self.post_json("/tasks", serde_json::to_value(new_task)?)?;
        Self::decode(response)
    }

    fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), ClientError> {
        self.post_json(&format!("/tasks/{id}/update"), serde_json::to_value(patch)?)?;
        Ok(())
    }

    fn update_queue(
        &self,
        id: &TaskId,
        queue: Queue,
        patch: &TaskPatch,
    ) -> Result<(), ClientError> {
        let mut body = serde_json::to_value(patch)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("queue".to_string(), serde_json::Value::String(queue.to_string()));
        }
        self.post_json(&format!("/tasks/{id}/update_queue"), body)?;
        Ok(())
    }

    fn claim_task(&self, params: &ClaimParams<'_>) -> Result<Option<Task>, ClientError> {
        let response = self.post_json("/tasks/claim", serde_json::to_value(params)?)?;
        let value: serde_json::Value = Self::decode(response)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    fn submit_raw(
        &self,
        id: &TaskId,
        commits_count: u32,
        turns_used: u32,
    ) -> Result<(), ClientError> {
        self.post_json(
            &format!("/tasks/{id}/submit"),
            serde_json::json!({ "commits_count": commits_count, "turns_used": turns_used }),
        )?;
        Ok(())
    }

    fn accept_task(&self, id: &TaskId, accepted_by: &str) -> Result<(), ClientError> {
        self.post_json(
            &format!("/tasks/{id}/accept"),
            serde_json::json!({ "accepted_by": accepted_by }),
        )?;
        Ok(())
    }

    fn reject_task(
        &self,
        id: &TaskId,
        reason: &str,
        feedback: Option<&str>,
    ) -> Result<(), ClientError> {
        self.post_json(
            &format!("/tasks/{id}/reject"),
            serde_json::json!({ "reason": reason, "feedback": feedback }),
        )?;
        Ok(())
    }

    fn register_orchestrator(&self, info: &OrchestratorInfo) -> Result<(), ClientError> {
        self.post_json("/orchestrators/register", serde_json::to_value(info)?)?;
        Ok(())
    }

    fn heartbeat(&self, id: &OrchestratorId) -> Result<(), ClientError> {
        self.post_json(&format!("/orchestrators/{id}/heartbeat"), serde_json::json!({}))?;
        Ok(())
    }

    fn list_actions(&self, status: &str) -> Result<Vec<ActionRecord>, ClientError> {
        self.get(&format!("/actions?status={status}"))
    }

    fn complete_action(&self, id: &str, result: &serde_json::Value) -> Result<(), ClientError> {
        self.post_json(&format!("/actions/{id}/complete"), serde_json::json!({ "result": result }))?;
        Ok(())
    }

    fn fail_action(&self, id: &str, error: &str) -> Result<(), ClientError> {
        self.post_json(&format!("/actions/{id}/fail"), serde_json::json!({ "error": error }))?;
        Ok(())
    }

    fn poll(&self) -> Result<PollData, ClientError> {
        self.get("/poll")
    }
}
