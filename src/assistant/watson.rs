use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::info;

use super::AssistantClient;
use super::iam::IamAuthenticator;
use crate::error::RemoteError;
use crate::types::{MessageParams, MessageResponse, SessionResponse};

/// Watson Assistant v2 REST client.
pub struct WatsonClient {
    client: Client,
    auth: IamAuthenticator,
    service_url: String,
    version: String,
}

impl WatsonClient {
    pub fn new(version: String, api_key: String, service_url: String) -> Self {
        let client = Client::new();
        let auth = IamAuthenticator::new(client.clone(), api_key);
        Self::with_authenticator(client, auth, version, service_url)
    }

    pub fn with_authenticator(
        client: Client,
        auth: IamAuthenticator,
        version: String,
        service_url: String,
    ) -> Self {
        Self {
            client,
            auth,
            service_url: service_url.trim_end_matches('/').to_string(),
            version,
        }
    }

    fn sessions_url(&self, assistant_id: &str) -> String {
        format!("{}/v2/assistants/{assistant_id}/sessions", self.service_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let token = self.auth.bearer_token().await?;
        let response = request
            .query(&[("version", self.version.as_str())])
            .bearer_auth(token)
            .header("accept", "application/json")
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(RemoteError::new(Some(status.as_u16()), error_message(&text)))
    }
}

/// Pull the `error` field out of a service error body, falling back to the
/// raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl AssistantClient for WatsonClient {
    async fn create_session(&self, assistant_id: &str) -> Result<SessionResponse, RemoteError> {
        let request = self.client.post(self.sessions_url(assistant_id));
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn message(&self, params: &MessageParams) -> Result<MessageResponse, RemoteError> {
        let url = format!(
            "{}/{}/message",
            self.sessions_url(&params.assistant_id),
            params.session_id
        );
        let mut body = serde_json::Map::new();
        if let Some(input) = &params.input {
            body.insert(
                "input".into(),
                serde_json::to_value(input).map_err(|e| RemoteError::new(None, e.to_string()))?,
            );
        }
        if let Some(context) = &params.context {
            body.insert("context".into(), context.clone());
        }

        let response = self.send(self.client.post(url).json(&body)).await?;
        Ok(response.json().await?)
    }

    async fn delete_session(
        &self,
        assistant_id: &str,
        session_id: &str,
    ) -> Result<(), RemoteError> {
        let url = format!("{}/{session_id}", self.sessions_url(assistant_id));
        self.send(self.client.delete(url)).await?;
        info!(session_id = %session_id, "assistant session deleted");
        Ok(())
    }
}
