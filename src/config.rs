use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    pub store: PathBuf,
    pub app_name: String,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
    pub auth: Option<AuthConfig>,
    pub dispatch: DispatchConfig,
    pub eva: Option<EvaConfig>,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub key: String,
    pub token_ttl: time::Duration,
}

#[derive(Clone)]
pub struct DispatchConfig {
    /// Cadence of the background dispatch loop.
    pub interval: std::time::Duration,
    /// Cap on due notifications processed per invocation.
    pub batch_size: usize,
    /// How long past fire-at a notification without any registered device
    /// stays re-selectable before it is marked failed.
    pub retry_window: time::Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(60),
            batch_size: 100,
            retry_window: time::Duration::hours(24),
        }
    }
}

#[derive(Clone)]
pub struct EvaConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: std::env::temp_dir().join("byb-default-store"),
            app_name: "BYB".to_string(),
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            auth: None,
            dispatch: DispatchConfig::default(),
            eva: None,
        }
    }
}
