use anyhow::{anyhow, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;

use crate::stream::FrameDecoder;

// Fixed bounds on agent-internal work and sampling parameters; the service
// expects these with every request.
const MAX_RETRIES: u32 = 2;
const MAX_STEPS: u32 = 5;
const TEMPERATURE: f64 = 0.5;
const TOP_P: f64 = 1.0;

/// Marks requests as coming from a development/preview client.
const DEV_PLAYGROUND_HEADER: &str = "x-mastra-dev-playground";

#[derive(Serialize)]
struct TurnMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TurnRequest {
    messages: Vec<TurnMessage>,
    run_id: String,
    max_retries: u32,
    max_steps: u32,
    temperature: f64,
    top_p: f64,
    runtime_context: serde_json::Value,
    thread_id: u64,
    resource_id: String,
}

#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
    agent_id: String,
    thread_id: u64,
}

impl AgentClient {
    pub fn new(base_url: &str, agent_id: &str, thread_id: u64) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            agent_id: agent_id.to_string(),
            thread_id,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn build_request(&self, text: &str) -> TurnRequest {
        TurnRequest {
            messages: vec![TurnMessage {
                role: "user".to_string(),
                content: text.to_string(),
            }],
            run_id: self.agent_id.clone(),
            max_retries: MAX_RETRIES,
            max_steps: MAX_STEPS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            runtime_context: serde_json::json!({}),
            thread_id: self.thread_id,
            resource_id: self.agent_id.clone(),
        }
    }

    /// Sends one user turn to the agent. A non-success status is a hard
    /// failure for the turn; no partial decode is attempted.
    pub async fn open_stream(&self, text: &str) -> Result<AgentStream> {
        let url = format!("{}/api/agents/{}/stream", self.base_url, self.agent_id);
        tracing::debug!(%url, "sending turn to agent");

        let response = self
            .client
            .post(&url)
            .header(DEV_PLAYGROUND_HEADER, "true")
            .json(&self.build_request(text))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "agent request failed with status: {}",
                response.status()
            ));
        }

        Ok(AgentStream { response })
    }
}

/// A readable response stream for one in-flight turn.
pub struct AgentStream {
    response: reqwest::Response,
}

impl AgentStream {
    /// Drains the stream chunk by chunk, in arrival order, and returns the
    /// decoded answer. `None` means no payload frames arrived.
    pub async fn collect_text(self) -> Result<Option<String>> {
        let mut decoder = FrameDecoder::new();
        let mut chunks = self.response.bytes_stream();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            tracing::trace!(len = chunk.len(), "received chunk");
            decoder.push_chunk(&chunk);
        }

        Ok(decoder.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AgentClient {
        AgentClient::new("https://agents.example.com", "weatherAgent", 2)
    }

    #[test]
    fn test_request_body_shape() {
        let request = client().build_request("Will it rain tomorrow?");
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Will it rain tomorrow?");
        assert_eq!(body["runId"], "weatherAgent");
        assert_eq!(body["resourceId"], "weatherAgent");
        assert_eq!(body["maxRetries"], 2);
        assert_eq!(body["maxSteps"], 5);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["topP"], 1.0);
        assert_eq!(body["threadId"], 2);
        assert_eq!(body["runtimeContext"], serde_json::json!({}));
    }

    #[test]
    fn test_request_body_is_deterministic() {
        let a = serde_json::to_value(client().build_request("same input")).unwrap();
        let b = serde_json::to_value(client().build_request("same input")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_base_url_trailing_slashes_trimmed() {
        let client = AgentClient::new("https://agents.example.com///", "weatherAgent", 2);
        assert_eq!(client.base_url, "https://agents.example.com");
    }
}
