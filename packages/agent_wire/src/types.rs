//! Streamed message payloads.
//!
//! These are the bodies of `multi-agent-message` and `multi-agent-system`
//! envelopes. Field names match the backend's JSON exactly; timestamps are
//! milliseconds since the Unix epoch.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Token accounting attached to a final chunk by the model platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Citation snippet from a knowledge-assistant lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub content: String,
    /// Relevance score as reported by the platform.
    #[serde(default)]
    pub score: f64,
}

/// One agent's stream payload, discriminated by `type`.
///
/// `delta` may carry the increment alone or the whole accumulated response so
/// far — the payload decides, not the consumer. `complete` and `error` are
/// terminal for the agent within the current dispatch; `status` is purely
/// informational and never affects stream state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentData {
    Delta {
        content: String,
        /// Full response so far. When present it supersedes `content`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accumulated: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_name: Option<String>,
    },
    Complete {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        references: Option<Vec<Reference>>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        finished: bool,
    },
    Error {
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        finished: bool,
    },
    Status {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_name: Option<String>,
    },
}

impl AgentData {
    /// Display name carried by the payload, when the backend included one.
    pub fn agent_name(&self) -> Option<&str> {
        match self {
            AgentData::Delta { agent_name, .. }
            | AgentData::Complete { agent_name, .. }
            | AgentData::Status { agent_name, .. } => agent_name.as_deref(),
            AgentData::Error { .. } => None,
        }
    }
}

/// A streamed event from one agent, as broadcast to the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conv_id: Option<String>,
    pub agent_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub data: AgentData,
}

impl AgentMessage {
    /// Wire timestamp as UTC; falls back to "now" for out-of-range values.
    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Discriminator for room-wide system messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemKind {
    /// Fan-out started; `agent_count`/`agent_names` describe the roster.
    Start,
    /// All agents have finished — the dispatch is settled.
    Complete,
    /// The fan-out failed as a whole; no further events will follow.
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemData {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_names: Option<Vec<String>>,
}

/// A room-wide message from the backend itself rather than any agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conv_id: Option<String>,
    pub message_type: SystemKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub data: SystemData,
}

impl SystemMessage {
    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_with_accumulated_from_raw_json() {
        let json = r#"{"type":"delta","content":" there","accumulated":"Hi there","agent_name":"Tutor"}"#;
        let data: AgentData = serde_json::from_str(json).unwrap();
        match data {
            AgentData::Delta {
                content,
                accumulated,
                agent_name,
            } => {
                assert_eq!(content, " there");
                assert_eq!(accumulated, Some("Hi there".to_string()));
                assert_eq!(agent_name, Some("Tutor".to_string()));
            }
            _ => panic!("Expected Delta"),
        }
    }

    #[test]
    fn delta_without_accumulated() {
        let json = r#"{"type":"delta","content":"Hi"}"#;
        let data: AgentData = serde_json::from_str(json).unwrap();
        match data {
            AgentData::Delta { accumulated, .. } => assert!(accumulated.is_none()),
            _ => panic!("Expected Delta"),
        }
    }

    #[test]
    fn complete_with_usage_and_references() {
        let json = r#"{
            "type": "complete",
            "content": "Final answer",
            "agent_name": "Tutor",
            "finished": true,
            "usage": {"prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46},
            "references": [{"file_name": "notes.pdf", "content": "excerpt", "score": 0.92}]
        }"#;
        let data: AgentData = serde_json::from_str(json).unwrap();
        match data {
            AgentData::Complete {
                content,
                usage,
                references,
                finished,
                ..
            } => {
                assert_eq!(content, "Final answer");
                assert!(finished);
                assert_eq!(usage.unwrap().total_tokens, 46);
                let refs = references.unwrap();
                assert_eq!(refs.len(), 1);
                assert_eq!(refs[0].file_name, "notes.pdf");
                assert!((refs[0].score - 0.92).abs() < f64::EPSILON);
            }
            _ => panic!("Expected Complete"),
        }
    }

    #[test]
    fn complete_minimal() {
        let json = r#"{"type":"complete","content":"done"}"#;
        let data: AgentData = serde_json::from_str(json).unwrap();
        match data {
            AgentData::Complete {
                usage,
                references,
                finished,
                ..
            } => {
                assert!(usage.is_none());
                assert!(references.is_none());
                assert!(!finished);
            }
            _ => panic!("Expected Complete"),
        }
    }

    #[test]
    fn error_payload() {
        let json = r#"{"type":"error","content":"Request timeout for agent Tutor","finished":true}"#;
        let data: AgentData = serde_json::from_str(json).unwrap();
        match data {
            AgentData::Error { content, finished } => {
                assert!(content.contains("timeout"));
                assert!(finished);
            }
            _ => panic!("Expected Error"),
        }
    }

    #[test]
    fn status_payload() {
        let json = r#"{"type":"status","content":"Agent Tutor is thinking...","agent_name":"Tutor"}"#;
        let data: AgentData = serde_json::from_str(json).unwrap();
        assert_eq!(data.agent_name(), Some("Tutor"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = r#"{"type":"chunk","content":"x"}"#;
        let result: Result<AgentData, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn delta_serializes_without_none_fields() {
        let data = AgentData::Delta {
            content: "Hi".to_string(),
            accumulated: None,
            agent_name: None,
        };
        let json = serde_json::to_string(&data).unwrap();
        assert!(!json.contains("accumulated"));
        assert!(!json.contains("agent_name"));
    }

    #[test]
    fn agent_message_roundtrip() {
        let msg = AgentMessage {
            conv_id: Some("conv-1".to_string()),
            agent_id: "agent-1".to_string(),
            timestamp: 1_700_000_000_000,
            data: AgentData::Delta {
                content: "Hi".to_string(),
                accumulated: None,
                agent_name: None,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        let decoded: AgentMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn agent_message_timestamp_utc() {
        let msg = AgentMessage {
            conv_id: None,
            agent_id: "a".to_string(),
            timestamp: 1_700_000_000_000,
            data: AgentData::Status {
                content: "x".to_string(),
                agent_name: None,
            },
        };
        assert_eq!(msg.timestamp_utc().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn system_message_start_from_raw_json() {
        let json = r#"{
            "conv_id": "conv-1",
            "message_type": "start",
            "timestamp": 1700000000000,
            "data": {
                "message": "Starting conversation with 2 agents",
                "agent_count": 2,
                "agent_names": ["Tutor", "Critic"]
            }
        }"#;
        let msg: SystemMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_type, SystemKind::Start);
        assert_eq!(msg.data.agent_count, Some(2));
        assert_eq!(
            msg.data.agent_names.as_deref(),
            Some(["Tutor".to_string(), "Critic".to_string()].as_slice())
        );
    }

    #[test]
    fn system_message_complete_minimal_data() {
        let json = r#"{"message_type":"complete","timestamp":0,"data":{"message":"All agents have completed their responses"}}"#;
        let msg: SystemMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_type, SystemKind::Complete);
        assert!(msg.data.agent_count.is_none());
    }

    #[test]
    fn usage_defaults_missing_counters_to_zero() {
        let usage: Usage = serde_json::from_str(r#"{"total_tokens": 10}"#).unwrap();
        assert_eq!(usage.prompt_tokens, 0);
        assert_eq!(usage.completion_tokens, 0);
        assert_eq!(usage.total_tokens, 10);
    }
}
