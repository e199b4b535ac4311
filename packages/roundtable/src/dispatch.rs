//! Dispatch client.
//!
//! Submits one user utterance for backend fan-out via `POST /api/multi-chat`.
//! A dispatch only enqueues work: agent replies stream back later over the
//! session channel, never in this response.

use agent_wire::{MultiChatRequest, MultiChatResponse};
use tracing::debug;

use crate::config::RoundtableConfig;
use crate::error::DispatchError;

#[derive(Debug, Clone)]
pub struct DispatchClient {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl DispatchClient {
    pub fn new(config: &RoundtableConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.api_url("/api/multi-chat"),
            token: config.token.clone(),
        }
    }

    pub async fn send(&self, request: &MultiChatRequest) -> Result<MultiChatResponse, DispatchError> {
        debug!(conv_id = %request.conv_id, agents = request.agent_uids.len(), "dispatching message");
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(DispatchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.to_string(),
                message,
            });
        }

        let accepted: MultiChatResponse = response
            .json()
            .await
            .map_err(DispatchError::from_reqwest)?;
        if !accepted.is_accepted() {
            return Err(DispatchError::Rejected {
                status: accepted.status.clone(),
                message: accepted.message,
            });
        }
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};

    fn request() -> MultiChatRequest {
        MultiChatRequest {
            conv_id: "conv-1".to_string(),
            user_id: "user-1".to_string(),
            message: "hello".to_string(),
            agent_uids: vec!["a".to_string(), "b".to_string()],
            history: vec![],
        }
    }

    fn config(port: u16) -> RoundtableConfig {
        RoundtableConfig {
            server_url: format!("http://127.0.0.1:{port}"),
            token: "tok".to_string(),
            user_id: "user-1".to_string(),
        }
    }

    async fn spawn_server(app: Router) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }

    #[tokio::test]
    async fn accepted_dispatch() {
        let app = Router::new().route(
            "/api/multi-chat",
            post(|Json(body): Json<MultiChatRequest>| async move {
                Json(MultiChatResponse {
                    conv_id: body.conv_id,
                    status: "accepted".to_string(),
                    message: "Request accepted. Processing 2 agents.".to_string(),
                })
            }),
        );
        let port = spawn_server(app).await;

        let client = DispatchClient::new(&config(port));
        let response = client.send(&request()).await.unwrap();
        assert!(response.is_accepted());
        assert_eq!(response.conv_id, "conv-1");
    }

    #[tokio::test]
    async fn http_level_rejection() {
        let app = Router::new().route(
            "/api/multi-chat",
            post(|| async { (StatusCode::UNAUTHORIZED, "Authentication required") }),
        );
        let port = spawn_server(app).await;

        let err = DispatchClient::new(&config(port))
            .send(&request())
            .await
            .unwrap_err();
        match err {
            DispatchError::Rejected { status, message } => {
                assert!(status.contains("401"));
                assert_eq!(message, "Authentication required");
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn application_level_rejection() {
        let app = Router::new().route(
            "/api/multi-chat",
            post(|| async {
                Json(MultiChatResponse {
                    conv_id: "conv-1".to_string(),
                    status: "busy".to_string(),
                    message: "A dispatch is already running".to_string(),
                })
            }),
        );
        let port = spawn_server(app).await;

        let err = DispatchClient::new(&config(port))
            .send(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { status, .. } if status == "busy"));
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let err = DispatchClient::new(&config(1))
            .send(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unavailable));
    }
}
