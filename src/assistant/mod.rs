pub mod iam;
pub mod watson;

use async_trait::async_trait;
use tracing::debug;

use crate::error::RemoteError;
use crate::types::{MessageParams, MessageResponse, SessionResponse};

pub use watson::WatsonClient;

/// Remote conversational-AI service used by the middleware.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn create_session(&self, assistant_id: &str) -> Result<SessionResponse, RemoteError>;

    async fn message(&self, params: &MessageParams) -> Result<MessageResponse, RemoteError>;

    async fn delete_session(&self, assistant_id: &str, session_id: &str)
    -> Result<(), RemoteError>;
}

/// Forward a payload to the assistant and return the response body.
///
/// No retry and no timeout beyond the transport's own; failures are passed
/// through unchanged.
pub async fn post_message(
    client: &dyn AssistantClient,
    payload: &MessageParams,
) -> Result<MessageResponse, RemoteError> {
    debug!(
        request = %serde_json::to_string(payload).unwrap_or_default(),
        "assistant request"
    );
    let response = client.message(payload).await?;
    debug!(
        response = %serde_json::to_string(&response).unwrap_or_default(),
        "assistant response"
    );
    Ok(response)
}
