use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub watson: MiddlewareConfig,
    pub store: StoreConfig,
}

/// Settings for one middleware instance.
#[derive(Debug, Clone, Deserialize)]
pub struct MiddlewareConfig {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub service_url: String,
    #[serde(default)]
    pub assistant_id: String,
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_minutes: u32,
    #[serde(default = "default_minimum_confidence")]
    pub minimum_confidence: f64,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            api_version: String::new(),
            api_key: String::new(),
            service_url: String::new(),
            assistant_id: String::new(),
            inactivity_timeout_minutes: default_inactivity_timeout(),
            minimum_confidence: default_minimum_confidence(),
        }
    }
}

impl MiddlewareConfig {
    pub fn new(
        api_version: impl Into<String>,
        api_key: impl Into<String>,
        service_url: impl Into<String>,
        assistant_id: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            api_key: api_key.into(),
            service_url: service_url.into(),
            assistant_id: assistant_id.into(),
            ..Default::default()
        }
    }
}

fn default_inactivity_timeout() -> u32 {
    5
}
fn default_minimum_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    state_dir().join("store.json")
}

/// Directory holding config, credentials and the default store.
pub fn state_dir() -> PathBuf {
    if let Ok(path) = std::env::var("WATSON_MIDDLEWARE_CONFIG") {
        if let Some(parent) = PathBuf::from(path).parent() {
            return parent.to_path_buf();
        }
    }
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".watson-middleware")
}

/// Load configuration from file or use defaults.
///
/// Search order:
/// 1. `WATSON_MIDDLEWARE_CONFIG` env var
/// 2. `~/.watson-middleware/config.toml`
/// 3. Defaults (no file needed, but not valid until the required fields are set)
pub fn load() -> anyhow::Result<AppConfig> {
    let path = config_path();

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display()))?;
        info!("loaded config from {}", path.display());
        config
    } else {
        info!("no config file found, using defaults");
        AppConfig::default()
    };

    resolve_api_key(&mut config.watson);
    Ok(config)
}

fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("WATSON_MIDDLEWARE_CONFIG") {
        return PathBuf::from(path);
    }
    state_dir().join("config.toml")
}

/// Fill a missing API key from `WATSON_APIKEY`, then the credentials file.
pub fn resolve_api_key(config: &mut MiddlewareConfig) {
    if !config.api_key.trim().is_empty() {
        return;
    }
    if let Some(key) = std::env::var("WATSON_APIKEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
    {
        config.api_key = key;
        return;
    }
    if let Some(key) = crate::secrets::load_api_key() {
        config.api_key = key;
    }
}

/// Validate the config and return clear error messages.
pub fn validate(config: &MiddlewareConfig) -> anyhow::Result<()> {
    let required = [
        ("watson.api_version", &config.api_version),
        ("watson.api_key", &config.api_key),
        ("watson.service_url", &config.service_url),
        ("watson.assistant_id", &config.assistant_id),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            anyhow::bail!("{name} is required");
        }
    }

    let url = url::Url::parse(&config.service_url)
        .map_err(|e| anyhow::anyhow!("invalid watson.service_url '{}': {e}", config.service_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!(
            "watson.service_url must be http or https, got '{}'",
            url.scheme()
        );
    }

    if config.inactivity_timeout_minutes == 0 {
        anyhow::bail!("watson.inactivity_timeout_minutes must be > 0");
    }

    if !(0.0..=1.0).contains(&config.minimum_confidence) {
        anyhow::bail!(
            "watson.minimum_confidence must be within [0, 1], got {}",
            config.minimum_confidence
        );
    }

    Ok(())
}
