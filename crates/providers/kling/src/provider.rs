use std::sync::Arc;

use crate::reqwest_transport::ReqwestTransport;
use crate::sdk_core::transport::TransportConfig;
use crate::sdk_core::SdkError;
use crate::sdk_storage::ObjectStore;

use crate::provider_kling::image::image_model::{KlingImageConfig, KlingImageModel};
use crate::provider_kling::token::KlingTokenIssuer;

pub const DEFAULT_BASE_URL: &str = "https://api.klingai.com";

/// Settings provided by the application layer. Unset fields fall back to the
/// environment: `KLING_ACCESS_KEY`, `KLING_SECRET_KEY`, `KLING_API_BASE_URL`.
#[derive(Debug, Clone, Default)]
pub struct KlingSettings {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub base_url: Option<String>,
    /// Extra headers sent on every request.
    pub headers: Vec<(String, String)>,
}

impl KlingSettings {
    pub fn from_env() -> Self {
        Self {
            access_key: std::env::var("KLING_ACCESS_KEY").ok(),
            secret_key: std::env::var("KLING_SECRET_KEY").ok(),
            base_url: std::env::var("KLING_API_BASE_URL").ok(),
            headers: Vec::new(),
        }
    }

    fn resolved_access_key(&self) -> String {
        self.access_key
            .clone()
            .or_else(|| std::env::var("KLING_ACCESS_KEY").ok())
            .unwrap_or_default()
    }

    fn resolved_secret_key(&self) -> String {
        self.secret_key
            .clone()
            .or_else(|| std::env::var("KLING_SECRET_KEY").ok())
            .unwrap_or_default()
    }

    fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .or_else(|| std::env::var("KLING_API_BASE_URL").ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim()
            .to_string()
    }
}

/// Build a ready image model for the given Kling model id.
///
/// Missing credentials surface immediately as an auth configuration error
/// rather than on the first request.
pub fn build_kling_image(
    settings: &KlingSettings,
    model_id: &str,
    store: Arc<dyn ObjectStore>,
) -> Result<KlingImageModel<ReqwestTransport>, SdkError> {
    let issuer = KlingTokenIssuer::new(
        settings.resolved_access_key(),
        settings.resolved_secret_key(),
    )?;
    let base_url = settings.resolved_base_url();

    tracing::debug!(
        target: "image_sdk::provider::kling",
        model_id,
        base_url = %base_url,
        "building kling image model"
    );

    let transport_cfg = TransportConfig::default();
    let http = ReqwestTransport::try_new(&transport_cfg).map_err(SdkError::Transport)?;

    let cfg = KlingImageConfig {
        base_url,
        headers: settings.headers.clone(),
        http,
        transport_cfg,
        store,
        cancel: None,
    };
    Ok(KlingImageModel::new(model_id, issuer, cfg))
}
