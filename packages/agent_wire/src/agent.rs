//! Agent directory and dispatch API models.

use serde::{Deserialize, Serialize};

/// Generation parameters and platform wiring for one agent.
///
/// `model_id`/`kl_assist_id` keep the backend's camelCase wire names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(rename = "modelId", default = "default_model_id")]
    pub model_id: String,
    /// Free-form generation parameters (temperature, top_p, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Knowledge-assistant to consult, when configured.
    #[serde(rename = "klAssistId", default, skip_serializing_if = "Option::is_none")]
    pub kl_assist_id: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_model_id() -> String {
    "jiutian-lan".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            params: None,
            kl_assist_id: None,
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// An agent as returned by the directory read API.
///
/// Immutable from the session's perspective: fetched, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub agent_uid: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AgentConfig>,
    #[serde(default)]
    pub owner_user_id: String,
}

fn default_enabled() -> bool {
    true
}

/// Body of `POST /api/multi-chat`.
///
/// `history` is the backend's `[[question, answer], ...]` context format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiChatRequest {
    pub conv_id: String,
    pub user_id: String,
    pub message: String,
    pub agent_uids: Vec<String>,
    #[serde(default)]
    pub history: Vec<(String, String)>,
}

pub const STATUS_ACCEPTED: &str = "accepted";

/// Response to a dispatch. Anything but `status == "accepted"` is a refusal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiChatResponse {
    pub conv_id: String,
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl MultiChatResponse {
    pub fn is_accepted(&self) -> bool {
        self.status == STATUS_ACCEPTED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_from_directory_json() {
        let json = r#"{
            "agent_uid": "agent-1",
            "name": "Tutor",
            "enabled": true,
            "owner_user_id": "admin-1",
            "config": {
                "modelId": "jiutian-lan",
                "params": {"temperature": 0.8, "top_p": 0.95},
                "klAssistId": "kl-7",
                "timeout": 45
            }
        }"#;
        let agent: AgentDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(agent.agent_uid, "agent-1");
        assert!(agent.enabled);
        let config = agent.config.unwrap();
        assert_eq!(config.model_id, "jiutian-lan");
        assert_eq!(config.kl_assist_id.as_deref(), Some("kl-7"));
        assert_eq!(config.timeout, 45);
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn descriptor_without_config() {
        let json = r#"{"agent_uid":"agent-2","name":"Critic"}"#;
        let agent: AgentDescriptor = serde_json::from_str(json).unwrap();
        assert!(agent.enabled);
        assert!(agent.config.is_none());
        assert_eq!(agent.owner_user_id, "");
    }

    #[test]
    fn config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.model_id, "jiutian-lan");
        assert_eq!(config.timeout, 30);
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn multi_chat_request_history_serializes_as_pairs() {
        let request = MultiChatRequest {
            conv_id: "conv-1".to_string(),
            user_id: "user-1".to_string(),
            message: "hello".to_string(),
            agent_uids: vec!["a".to_string()],
            history: vec![("q1".to_string(), "a1".to_string())],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["history"][0][0], "q1");
        assert_eq!(json["history"][0][1], "a1");
    }

    #[test]
    fn multi_chat_response_accepted() {
        let json = r#"{"conv_id":"conv-1","status":"accepted","message":"Request accepted. Processing 2 agents."}"#;
        let response: MultiChatResponse = serde_json::from_str(json).unwrap();
        assert!(response.is_accepted());
    }

    #[test]
    fn multi_chat_response_rejected() {
        let json = r#"{"conv_id":"conv-1","status":"rejected"}"#;
        let response: MultiChatResponse = serde_json::from_str(json).unwrap();
        assert!(!response.is_accepted());
        assert_eq!(response.message, "");
    }
}
