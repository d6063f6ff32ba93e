use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::RemoteError;

pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";

const GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Tokens are refreshed this long before the server-side expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Absolute expiry, seconds since the epoch.
    expiration: i64,
}

struct CachedToken {
    access_token: String,
    refresh_at: DateTime<Utc>,
}

/// Exchanges an API key for IAM bearer tokens and caches them.
pub struct IamAuthenticator {
    client: Client,
    api_key: String,
    url: String,
    token: Mutex<Option<CachedToken>>,
}

impl IamAuthenticator {
    pub fn new(client: Client, api_key: String) -> Self {
        Self::with_url(client, api_key, DEFAULT_IAM_URL.to_string())
    }

    pub fn with_url(client: Client, api_key: String, url: String) -> Self {
        Self {
            client,
            api_key,
            url,
            token: Mutex::new(None),
        }
    }

    /// Current bearer token, fetching a new one when missing or close to
    /// expiry.
    pub async fn bearer_token(&self) -> Result<String, RemoteError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .client
            .post(&self.url)
            .header("accept", "application/json")
            .form(&[("grant_type", GRANT_TYPE), ("apikey", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RemoteError::new(
                Some(status.as_u16()),
                format!("IAM token request failed: {text}"),
            ));
        }

        let body: TokenResponse = response.json().await?;
        let refresh_at = DateTime::<Utc>::from_timestamp(body.expiration, 0)
            .map(|t| t - Duration::seconds(REFRESH_MARGIN_SECS))
            .unwrap_or_else(Utc::now);
        debug!(refresh_at = %refresh_at, "obtained IAM token");

        *cached = Some(CachedToken {
            access_token: body.access_token.clone(),
            refresh_at,
        });
        Ok(body.access_token)
    }
}
