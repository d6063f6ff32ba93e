pub mod gate;
pub mod merge;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::assistant::{self, AssistantClient, WatsonClient};
use crate::config::MiddlewareConfig;
use crate::error::{MiddlewareError, Result};
use crate::session::{ActiveSession, Clock, SessionManager, SystemClock};
use crate::store::{self, Storage};
use crate::types::{ContextDelta, InboundMessage, MessageParams, MessageResponse};

/// Extension points run around the remote call.
///
/// Both default to passing their input through untouched.
#[async_trait]
pub trait Hooks: Send + Sync {
    async fn before(
        &self,
        _message: &InboundMessage,
        payload: MessageParams,
    ) -> anyhow::Result<MessageParams> {
        Ok(payload)
    }

    async fn after(
        &self,
        _message: &InboundMessage,
        response: MessageResponse,
    ) -> anyhow::Result<MessageResponse> {
        Ok(response)
    }
}

pub struct Passthrough;

impl Hooks for Passthrough {}

/// The bot worker handling the current event. Supplies the shared store.
#[derive(Clone)]
pub struct BotWorker {
    pub storage: Arc<dyn Storage>,
}

impl BotWorker {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

/// Last stage an exchange reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Started,
    ContextLoaded,
    SessionReady,
    PayloadBuilt,
    Sent,
    Persisted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Started => "started",
            Stage::ContextLoaded => "context_loaded",
            Stage::SessionReady => "session_ready",
            Stage::PayloadBuilt => "payload_built",
            Stage::Sent => "sent",
            Stage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// How a call to [`WatsonMiddleware::send_to_watson`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Suppressed by the gate; an empty response was attached.
    Filtered,
    /// Response attached and context persisted.
    Persisted,
    /// An error was attached; `after` is the last stage that completed.
    Failed { after: Stage },
}

/// Bridges bot messages to a Watson Assistant.
///
/// One backend session is shared by every user this instance serves; the
/// per-user conversation context lives in the bot's store.
pub struct WatsonMiddleware {
    client: Arc<dyn AssistantClient>,
    sessions: SessionManager,
    hooks: Arc<dyn Hooks>,
    storage: RwLock<Option<Arc<dyn Storage>>>,
    inactivity_timeout_minutes: u32,
    minimum_confidence: f64,
}

impl WatsonMiddleware {
    /// Middleware talking to Watson over HTTP with IAM authentication.
    pub fn new(config: &MiddlewareConfig) -> Self {
        debug!(
            service_url = %config.service_url,
            assistant_id = %config.assistant_id,
            api_version = %config.api_version,
            "creating assistant client"
        );
        let client = WatsonClient::new(
            config.api_version.clone(),
            config.api_key.clone(),
            config.service_url.clone(),
        );
        Self::with_client(Arc::new(client), config)
    }

    /// Middleware over any assistant client. Only the assistant id, timeout
    /// and confidence settings of `config` are used.
    pub fn with_client(client: Arc<dyn AssistantClient>, config: &MiddlewareConfig) -> Self {
        let sessions = SessionManager::new(
            Arc::clone(&client),
            config.assistant_id.clone(),
            config.inactivity_timeout_minutes,
            Arc::new(SystemClock),
        );
        Self {
            client,
            sessions,
            hooks: Arc::new(Passthrough),
            storage: RwLock::new(None),
            inactivity_timeout_minutes: config.inactivity_timeout_minutes,
            minimum_confidence: config.minimum_confidence,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the time source. Any tracked session is dropped.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.sessions = SessionManager::new(
            Arc::clone(&self.client),
            self.sessions.assistant_id().to_string(),
            self.inactivity_timeout_minutes,
            clock,
        );
        self
    }

    pub fn minimum_confidence(&self) -> f64 {
        self.minimum_confidence
    }

    /// The tracked backend session, if any.
    pub async fn session(&self) -> Option<ActiveSession> {
        self.sessions.current().await
    }

    /// Whether the response already attached to `message` recognized one of
    /// `patterns` with at least the minimum confidence.
    pub fn hear(&self, patterns: &[&str], message: &InboundMessage) -> bool {
        gate::intents_match(
            patterns,
            message.watson_data.as_ref(),
            self.minimum_confidence,
        )
    }

    /// Open a new backend session and return its expiry in epoch millis.
    pub async fn create_session(&self) -> Result<i64> {
        Ok(self.sessions.create_session().await?.timestamp_millis())
    }

    /// Make sure a live session exists, creating one if needed.
    pub async fn check_expiring_session(&self) -> Result<()> {
        self.sessions.ensure_live_session().await.map(|_| ())
    }

    pub async fn before(
        &self,
        message: &InboundMessage,
        payload: MessageParams,
    ) -> Result<MessageParams> {
        self.hooks
            .before(message, payload)
            .await
            .map_err(MiddlewareError::Hook)
    }

    pub async fn after(
        &self,
        message: &InboundMessage,
        response: MessageResponse,
    ) -> Result<MessageResponse> {
        self.hooks
            .after(message, response)
            .await
            .map_err(MiddlewareError::Hook)
    }

    /// Forward `message` without a context delta.
    pub async fn receive(&self, bot: &BotWorker, message: &mut InboundMessage) -> Outcome {
        self.send_to_watson(bot, message, None).await
    }

    /// Same as [`receive`](Self::receive).
    pub async fn interpret(&self, bot: &BotWorker, message: &mut InboundMessage) -> Outcome {
        self.send_to_watson(bot, message, None).await
    }

    /// Run one exchange with the assistant for `message`.
    ///
    /// Never fails: the response lands in `message.watson_data`, any error in
    /// `message.watson_error`.
    pub async fn send_to_watson(
        &self,
        bot: &BotWorker,
        message: &mut InboundMessage,
        context_delta: Option<&ContextDelta>,
    ) -> Outcome {
        if gate::is_suppressed(message) {
            debug!(
                user = %message.user,
                message_type = %message.message_type,
                "message not forwarded"
            );
            message.watson_data = Some(MessageResponse::empty());
            return Outcome::Filtered;
        }

        *self.storage.write().await = Some(Arc::clone(&bot.storage));

        let mut stage = Stage::Started;
        match self
            .exchange(bot.storage.as_ref(), message, context_delta, &mut stage)
            .await
        {
            Ok(()) => Outcome::Persisted,
            Err(e) => {
                warn!(user = %message.user, stage = %stage, "assistant exchange failed: {e}");
                message.watson_error = Some(e.to_string());
                Outcome::Failed { after: stage }
            }
        }
    }

    async fn exchange(
        &self,
        storage: &dyn Storage,
        message: &mut InboundMessage,
        context_delta: Option<&ContextDelta>,
        stage: &mut Stage,
    ) -> Result<()> {
        let user_context = store::read_context(&message.user, storage).await;
        *stage = Stage::ContextLoaded;

        let session_id = self.sessions.ensure_live_session().await?;
        *stage = Stage::SessionReady;

        let payload = gate::build_payload(
            self.sessions.assistant_id(),
            &session_id,
            message,
            user_context,
            context_delta,
        );
        let request = self.before(message, payload).await?;
        *stage = Stage::PayloadBuilt;

        let response = assistant::post_message(self.client.as_ref(), &request).await?;
        let response = self.after(message, response).await?;
        *stage = Stage::Sent;

        message.watson_data = Some(response.clone());
        store::update_context(&message.user, storage, response).await?;
        *stage = Stage::Persisted;
        Ok(())
    }

    async fn bound_storage(&self, op: &'static str) -> Result<Arc<dyn Storage>> {
        self.storage
            .read()
            .await
            .clone()
            .ok_or(MiddlewareError::StateNotInitialized(op))
    }

    /// Stored context for `user`, using the store bound by the last forwarded
    /// message.
    pub async fn read_context(&self, user: &str) -> Result<Option<Value>> {
        let storage = self.bound_storage("read_context").await?;
        Ok(store::read_context(user, storage.as_ref()).await)
    }

    /// Persist `response.context` for `user` and return the response.
    pub async fn update_context(
        &self,
        user: &str,
        response: MessageResponse,
    ) -> Result<MessageResponse> {
        let storage = self.bound_storage("update_context").await?;
        store::update_context(user, storage.as_ref(), response).await
    }

    /// Delete a backend session, including the user data Watson keeps for it.
    ///
    /// `session_id` may differ from the tracked session; the configured
    /// assistant id is always used.
    pub async fn delete_user_data(&self, session_id: &str) -> Result<()> {
        self.sessions.delete_session(session_id).await?;
        info!(session_id = %session_id, "user data deleted");
        Ok(())
    }
}
