use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::Storage;
use crate::error::Result;
use crate::types::MessageResponse;

/// Namespace for per-user records in the shared store.
pub const STORAGE_PREFIX: &str = "user.";

fn item_id(user_id: &str) -> String {
    format!("{STORAGE_PREFIX}{user_id}")
}

/// Load the stored conversation context for a user.
///
/// A missing record, a record without context, and a failed read all yield
/// `None`; read failures are logged and never surfaced.
pub async fn read_context(user_id: &str, storage: &dyn Storage) -> Option<Value> {
    let key = item_id(user_id);

    match storage.read(std::slice::from_ref(&key)).await {
        Ok(mut result) => {
            let context = result
                .remove(&key)
                .and_then(|mut record| record.get_mut("context").map(Value::take))
                .filter(|c| !c.is_null());
            if let Some(ref c) = context {
                debug!(user = %user_id, context = %c, "loaded user context");
            }
            context
        }
        Err(e) => {
            warn!(user = %user_id, "read context error: {e}");
            None
        }
    }
}

/// Persist the context from `response` as the user's record and hand the
/// response back unchanged.
///
/// Other fields of an existing record are kept. A failed read starts from an
/// empty record; a failed write is returned to the caller.
pub async fn update_context(
    user_id: &str,
    storage: &dyn Storage,
    response: MessageResponse,
) -> Result<MessageResponse> {
    let key = item_id(user_id);

    let mut user_data = match storage.read(std::slice::from_ref(&key)).await {
        Ok(mut result) => match result.remove(&key) {
            Some(Value::Object(record)) => {
                debug!(user = %user_id, "updating existing user record");
                record
            }
            _ => Map::new(),
        },
        Err(e) => {
            warn!(user = %user_id, "read context error: {e}");
            Map::new()
        }
    };

    user_data.insert("id".into(), Value::String(user_id.to_string()));
    user_data.insert(
        "context".into(),
        response.context.clone().unwrap_or(Value::Null),
    );

    let changes = HashMap::from([(key, Value::Object(user_data))]);
    storage.write(changes).await?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MiddlewareError;
    use crate::store::MemoryStorage;
    use async_trait::async_trait;
    use serde_json::json;

    struct BrokenStorage;

    #[async_trait]
    impl Storage for BrokenStorage {
        async fn read(&self, _keys: &[String]) -> Result<HashMap<String, Value>> {
            Err(MiddlewareError::Storage("read refused".into()))
        }
        async fn write(&self, _changes: HashMap<String, Value>) -> Result<()> {
            Err(MiddlewareError::Storage("write refused".into()))
        }
    }

    #[tokio::test]
    async fn read_failure_is_reported_as_absent() {
        assert!(read_context("u1", &BrokenStorage).await.is_none());
    }

    #[tokio::test]
    async fn write_failure_propagates() {
        let response = MessageResponse {
            context: Some(json!({"a": 1})),
            ..Default::default()
        };
        let err = update_context("u1", &BrokenStorage, response)
            .await
            .expect_err("write must fail");
        assert!(err.to_string().contains("write refused"));
    }

    #[tokio::test]
    async fn update_keeps_unrelated_record_fields() {
        let storage = MemoryStorage::new();
        storage
            .write(HashMap::from([(
                "user.u1".to_string(),
                json!({"id": "u1", "nickname": "ada", "context": {"old": true}}),
            )]))
            .await
            .unwrap();

        let response = MessageResponse {
            context: Some(json!({"new": true})),
            ..Default::default()
        };
        update_context("u1", &storage, response).await.unwrap();

        let record = storage.get("user.u1").await.unwrap();
        assert_eq!(
            record,
            json!({"id": "u1", "nickname": "ada", "context": {"new": true}})
        );
    }

    #[tokio::test]
    async fn record_without_context_reads_as_absent() {
        let storage = MemoryStorage::new();
        storage
            .write(HashMap::from([("user.u2".to_string(), json!({"id": "u2"}))]))
            .await
            .unwrap();
        assert!(read_context("u2", &storage).await.is_none());
    }
}
