#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use watson_middleware::assistant::AssistantClient;
use watson_middleware::config::MiddlewareConfig;
use watson_middleware::error::{MiddlewareError, RemoteError, Result};
use watson_middleware::session::Clock;
use watson_middleware::store::{MemoryStorage, Storage};
use watson_middleware::types::{MessageParams, MessageResponse, SessionResponse};

pub const ASSISTANT_ID: &str = "asst-1";

pub fn test_config() -> MiddlewareConfig {
    MiddlewareConfig::new(
        "2021-06-14",
        "test-key",
        "https://assistant.example.test",
        ASSISTANT_ID,
    )
}

/// Scripted assistant that records every call.
///
/// Replies echo the text and return `{"turn": n, "sent": <request context>}`
/// as the new context.
#[derive(Default)]
pub struct FakeAssistant {
    pub creates: AtomicUsize,
    pub requests: Mutex<Vec<MessageParams>>,
    pub deletes: Mutex<Vec<(String, String)>>,
    pub fail_create: Option<RemoteError>,
    pub fail_message: Option<RemoteError>,
    pub fail_delete: Option<RemoteError>,
    pub intents: Vec<(String, f64)>,
}

impl FakeAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn message_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> MessageParams {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no message request recorded")
    }
}

#[async_trait]
impl AssistantClient for FakeAssistant {
    async fn create_session(
        &self,
        assistant_id: &str,
    ) -> std::result::Result<SessionResponse, RemoteError> {
        assert_eq!(assistant_id, ASSISTANT_ID);
        if let Some(e) = &self.fail_create {
            return Err(e.clone());
        }
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionResponse {
            session_id: format!("session-{n}"),
        })
    }

    async fn message(
        &self,
        params: &MessageParams,
    ) -> std::result::Result<MessageResponse, RemoteError> {
        if let Some(e) = &self.fail_message {
            return Err(e.clone());
        }
        let turn = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(params.clone());
            requests.len()
        };

        let mut response = MessageResponse {
            context: Some(json!({
                "turn": turn,
                "sent": params.context.clone().unwrap_or(Value::Null),
            })),
            ..Default::default()
        };
        if let Some(input) = &params.input {
            response.output.text.push(format!("echo: {}", input.text));
        }
        response.output.intents = self
            .intents
            .iter()
            .map(|(name, confidence)| watson_middleware::types::RuntimeIntent {
                intent: name.clone(),
                confidence: *confidence,
            })
            .collect();
        Ok(response)
    }

    async fn delete_session(
        &self,
        assistant_id: &str,
        session_id: &str,
    ) -> std::result::Result<(), RemoteError> {
        if let Some(e) = &self.fail_delete {
            return Err(e.clone());
        }
        self.deletes
            .lock()
            .unwrap()
            .push((assistant_id.to_string(), session_id.to_string()));
        Ok(())
    }
}

/// Memory storage that counts calls and can refuse writes.
#[derive(Default)]
pub struct CountingStorage {
    pub inner: MemoryStorage,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub fail_writes: bool,
}

impl CountingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(keys).await
    }

    async fn write(&self, changes: HashMap<String, Value>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(MiddlewareError::Storage("disk full".into()));
        }
        self.inner.write(changes).await
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
