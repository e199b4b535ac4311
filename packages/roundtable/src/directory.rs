//! Agent directory client.
//!
//! Read-only view of the agents a user may converse with, via
//! `GET /api/agents/enabled/list`. Disabled agents never appear here.

use agent_wire::AgentDescriptor;
use tracing::debug;

use crate::config::RoundtableConfig;
use crate::error::DirectoryError;

#[derive(Debug, Clone)]
pub struct AgentDirectory {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl AgentDirectory {
    pub fn new(config: &RoundtableConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.api_url("/api/agents/enabled/list"),
            token: config.token.clone(),
        }
    }

    pub async fn enabled_agents(&self) -> Result<Vec<AgentDescriptor>, DirectoryError> {
        let response = self
            .http
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(DirectoryError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status));
        }

        let agents: Vec<AgentDescriptor> = response
            .json()
            .await
            .map_err(DirectoryError::from_reqwest)?;
        debug!(count = agents.len(), "fetched enabled agents");
        Ok(agents)
    }
}
