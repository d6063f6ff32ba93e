use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::assistant::AssistantClient;
use crate::error::{MiddlewareError, Result};

/// Source of the current time for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The live backend session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

impl ActiveSession {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Owns the single assistant session shared by every user of a middleware
/// instance.
///
/// Expiry is checked lazily before each use. The state lock is released
/// while the remote create call is in flight, so two callers that both see
/// an expired session may each create one; the last to finish wins.
pub struct SessionManager {
    client: Arc<dyn AssistantClient>,
    assistant_id: String,
    inactivity_timeout: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<ActiveSession>>,
}

impl SessionManager {
    pub fn new(
        client: Arc<dyn AssistantClient>,
        assistant_id: impl Into<String>,
        inactivity_timeout_minutes: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            assistant_id: assistant_id.into(),
            inactivity_timeout: Duration::minutes(i64::from(inactivity_timeout_minutes)),
            clock,
            state: Mutex::new(None),
        }
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Snapshot of the tracked session, live or not.
    pub async fn current(&self) -> Option<ActiveSession> {
        self.state.lock().await.clone()
    }

    /// Open a new remote session and make it the tracked one.
    ///
    /// Returns the computed expiry.
    pub async fn create_session(&self) -> Result<DateTime<Utc>> {
        let created = self.open().await?;
        Ok(created.expires_at)
    }

    async fn open(&self) -> Result<ActiveSession> {
        let response = self
            .client
            .create_session(&self.assistant_id)
            .await
            .map_err(MiddlewareError::SessionCreation)?;

        let session = ActiveSession {
            session_id: response.session_id,
            expires_at: self.clock.now() + self.inactivity_timeout,
        };
        info!(
            session_id = %session.session_id,
            expires_at = %session.expires_at,
            "assistant session created"
        );

        *self.state.lock().await = Some(session.clone());
        Ok(session)
    }

    /// Return the live session id, creating a session first when none is
    /// tracked or the tracked one has expired.
    pub async fn ensure_live_session(&self) -> Result<String> {
        {
            let state = self.state.lock().await;
            if let Some(session) = state.as_ref() {
                if session.is_live(self.clock.now()) {
                    return Ok(session.session_id.clone());
                }
                debug!(session_id = %session.session_id, "assistant session expired");
            }
        }

        Ok(self.open().await?.session_id)
    }

    /// Delete `session_id` on the backend using the configured assistant id.
    ///
    /// The id need not be the tracked session. When it is, tracking is
    /// cleared so the next forward opens a fresh session.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.ensure_live_session().await?;

        self.client
            .delete_session(&self.assistant_id, session_id)
            .await
            .map_err(MiddlewareError::SessionDeletion)?;

        let mut state = self.state.lock().await;
        if state.as_ref().is_some_and(|s| s.session_id == session_id) {
            *state = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ActiveSession;
    use chrono::{Duration, Utc};

    #[test]
    fn session_is_not_live_at_its_expiry_instant() {
        let now = Utc::now();
        let session = ActiveSession {
            session_id: "s".into(),
            expires_at: now,
        };
        assert!(!session.is_live(now));
        assert!(session.is_live(now - Duration::milliseconds(1)));
    }
}
