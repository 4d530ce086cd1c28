use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sdk_core::image::{ImageModel, ImageResponse, ImageResponseMeta};
use crate::sdk_core::options::is_internal_sdk_header;
use crate::sdk_core::transport::{HttpTransport, TransportConfig};
use crate::sdk_core::SdkError;
use crate::sdk_storage::ObjectStore;
use crate::sdk_types::common as ct;
use crate::sdk_types::image::{ImageData, ImageOptions, ImageWarning};

use crate::provider_kling::error::map_transport_error_to_sdk_error;
use crate::provider_kling::image::aspect_ratio::{
    is_supported_ratio, is_supported_size, nearest_aspect_ratio,
};
use crate::provider_kling::image::options::{
    parse_kling_image_provider_options, KlingImageProviderOptions,
};
use crate::provider_kling::token::KlingTokenIssuer;

/// Fixed poll policy. The remote job usually completes within tens of
/// seconds, so a flat interval beats exponential backoff on latency; the
/// attempt cap bounds the whole call at roughly a minute.
const MAX_POLL_ATTEMPTS: u32 = 30;
const POLL_INTERVAL: Duration = Duration::from_millis(2000);

const GENERATIONS_PATH: &str = "/v1/images/generations";

pub struct KlingImageConfig<T: HttpTransport> {
    pub base_url: String,
    pub headers: Vec<(String, String)>,
    pub http: T,
    pub transport_cfg: TransportConfig,
    pub store: Arc<dyn ObjectStore>,
    /// External abort signal, observed before each poll attempt and inside
    /// each inter-attempt delay.
    pub cancel: Option<CancellationToken>,
}

pub struct KlingImageModel<T: HttpTransport = crate::reqwest_transport::ReqwestTransport> {
    model_id: String,
    issuer: KlingTokenIssuer,
    cfg: KlingImageConfig<T>,
}

/// Remote job status as observed by the poll loop. Transitions are observed,
/// never driven: the loop only ever reads the remote state.
#[derive(Debug)]
enum TaskState {
    Pending,
    Succeeded(Vec<String>),
    Failed(String),
}

struct PollOutcome {
    image_urls: Vec<String>,
    response_body: JsonValue,
    response_headers: Vec<(String, String)>,
}

impl<T: HttpTransport> KlingImageModel<T> {
    pub fn new(
        model_id: impl Into<String>,
        issuer: KlingTokenIssuer,
        cfg: KlingImageConfig<T>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            issuer,
            cfg,
        }
    }

    fn generations_url(&self) -> String {
        let base = self.cfg.base_url.trim_end_matches('/');
        format!("{base}{GENERATIONS_PATH}")
    }

    fn task_url(&self, task_id: &str) -> String {
        format!("{}/{}", self.generations_url(), task_id)
    }

    fn canonicalize_header(lc: &str) -> String {
        lc.split('-')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    None => String::new(),
                    Some(f) => {
                        f.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                    }
                }
            })
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Merge configured and per-call headers, then stamp a fresh bearer
    /// token. The token always wins over caller-supplied authorization.
    fn build_headers(
        &self,
        extra: &HashMap<String, String>,
        include_content_type: bool,
    ) -> Result<Vec<(String, String)>, SdkError> {
        let mut hdrs: BTreeMap<String, String> = BTreeMap::new();
        for (k, v) in &self.cfg.headers {
            if is_internal_sdk_header(k) {
                continue;
            }
            hdrs.insert(k.to_ascii_lowercase(), v.clone());
        }
        for (k, v) in extra {
            if is_internal_sdk_header(k) {
                continue;
            }
            hdrs.insert(k.to_ascii_lowercase(), v.clone());
        }
        hdrs.insert(
            "authorization".into(),
            format!("Bearer {}", self.issuer.bearer_token()?),
        );
        if include_content_type {
            hdrs.entry("content-type".into())
                .or_insert_with(|| "application/json".into());
        }
        hdrs.entry("accept".into())
            .or_insert_with(|| "application/json".into());
        Ok(hdrs
            .into_iter()
            .map(|(k, v)| (Self::canonicalize_header(&k), v))
            .collect())
    }

    fn headers_vec_to_map(headers: Vec<(String, String)>) -> Option<ct::Headers> {
        if headers.is_empty() {
            return None;
        }
        Some(
            headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
        )
    }

    fn warnings_for_options(&self, options: &ImageOptions) -> Vec<ImageWarning> {
        let mut warnings = Vec::new();
        if let Some(size) = &options.size {
            if !is_supported_size(size) {
                warnings.push(ImageWarning::Unsupported {
                    feature: "size".into(),
                    details: Some(format!(
                        "Size {size} is not supported; the nearest supported aspect ratio is used instead."
                    )),
                });
            }
        }
        if let Some(ratio) = &options.aspect_ratio {
            if !is_supported_ratio(ratio) {
                warnings.push(ImageWarning::Unsupported {
                    feature: "aspectRatio".into(),
                    details: Some(format!("Aspect ratio {ratio} is not supported.")),
                });
            }
        }
        if options.seed.is_some() {
            warnings.push(ImageWarning::Unsupported {
                feature: "seed".into(),
                details: None,
            });
        }
        warnings
    }

    /// An explicitly requested supported ratio wins; otherwise the ratio is
    /// derived from the requested size, defaulting to square.
    fn resolve_aspect_ratio(options: &ImageOptions) -> String {
        if let Some(ratio) = &options.aspect_ratio {
            if is_supported_ratio(ratio) {
                return ratio.clone();
            }
        }
        match &options.size {
            Some(size) => nearest_aspect_ratio(size).to_string(),
            None => "1:1".to_string(),
        }
    }

    fn build_generation_body(
        &self,
        options: &ImageOptions,
        aspect_ratio: &str,
    ) -> Result<JsonValue, SdkError> {
        let prompt = options
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SdkError::InvalidArgument {
                message: "prompt must not be empty".into(),
            })?;

        let (prov_opts, prov_extras) =
            parse_kling_image_provider_options(&options.provider_options);
        let KlingImageProviderOptions { negative_prompt } = prov_opts;

        let mut body_map = serde_json::Map::new();
        body_map.insert("model_name".into(), json!(self.model_id));
        body_map.insert("prompt".into(), json!(prompt));
        body_map.insert("aspect_ratio".into(), json!(aspect_ratio));
        body_map.insert("n".into(), json!(options.n));
        if let Some(negative_prompt) = negative_prompt {
            body_map.insert("negative_prompt".into(), json!(negative_prompt));
        }

        if let Some(extras) = prov_extras {
            for (k, v) in extras {
                body_map.insert(k, v);
            }
        }

        Ok(JsonValue::Object(body_map))
    }

    async fn submit(
        &self,
        body: &JsonValue,
        extra_headers: &HashMap<String, String>,
    ) -> Result<String, SdkError> {
        let headers = self.build_headers(extra_headers, true)?;
        let url = self.generations_url();
        let (response, _headers) = self
            .cfg
            .http
            .post_json(&url, &headers, body, &self.cfg.transport_cfg)
            .await
            .map_err(map_transport_error_to_sdk_error)?;

        let parsed: KlingTaskEnvelope =
            serde_json::from_value(response).map_err(SdkError::Serde)?;
        let task_id = parsed
            .data
            .and_then(|data| data.task_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SdkError::Protocol {
                message: "generation response is missing data.task_id".into(),
            })?;

        debug!(
            target: "image_sdk::provider::kling",
            task_id = %task_id,
            "generation task submitted"
        );
        Ok(task_id)
    }

    fn checkpoint_cancelled(&self) -> Result<(), SdkError> {
        match &self.cfg.cancel {
            Some(cancel) if cancel.is_cancelled() => Err(SdkError::Cancelled),
            _ => Ok(()),
        }
    }

    async fn wait_between_attempts(&self) -> Result<(), SdkError> {
        match &self.cfg.cancel {
            Some(cancel) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(SdkError::Cancelled),
                    _ = tokio::time::sleep(POLL_INTERVAL) => Ok(()),
                }
            }
            None => {
                tokio::time::sleep(POLL_INTERVAL).await;
                Ok(())
            }
        }
    }

    async fn await_completion(
        &self,
        task_id: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<PollOutcome, SdkError> {
        let url = self.task_url(task_id);
        for attempt in 1..=MAX_POLL_ATTEMPTS {
            self.checkpoint_cancelled()?;
            // Re-authenticate every attempt; the token may cross its refresh
            // window during a long poll.
            let headers = self.build_headers(extra_headers, false)?;
            match self
                .cfg
                .http
                .get_json(&url, &headers, &self.cfg.transport_cfg)
                .await
            {
                Err(err) => {
                    // A failed status check is transient, not a failed job.
                    warn!(
                        target: "image_sdk::provider::kling",
                        task_id = %task_id,
                        attempt,
                        error = %err.sanitized_message(),
                        "status poll failed; retrying on next attempt"
                    );
                }
                Ok((body, response_headers)) => match parse_task_state(&body)? {
                    TaskState::Succeeded(image_urls) => {
                        debug!(
                            target: "image_sdk::provider::kling",
                            task_id = %task_id,
                            attempt,
                            images = image_urls.len(),
                            "generation task succeeded"
                        );
                        return Ok(PollOutcome {
                            image_urls,
                            response_body: body,
                            response_headers,
                        });
                    }
                    TaskState::Failed(message) => {
                        debug!(
                            target: "image_sdk::provider::kling",
                            task_id = %task_id,
                            attempt,
                            "generation task failed"
                        );
                        return Err(SdkError::GenerationFailed { message });
                    }
                    TaskState::Pending => {
                        debug!(
                            target: "image_sdk::provider::kling",
                            task_id = %task_id,
                            attempt,
                            "generation task still pending"
                        );
                    }
                },
            }
            if attempt < MAX_POLL_ATTEMPTS {
                self.wait_between_attempts().await?;
            }
        }
        Err(SdkError::Timeout)
    }

    /// Persist each asset independently; per-asset failures degrade to the
    /// provider URL instead of failing the batch. Order follows the source
    /// result list.
    async fn materialize(&self, image_urls: Vec<String>) -> (Vec<ImageData>, Vec<ImageWarning>) {
        let minted_at = chrono::Utc::now().timestamp_millis();
        let uploads = image_urls.iter().enumerate().map(|(index, url)| {
            let key = format!("generations/{minted_at}-{index}.png");
            self.materialize_asset(url, key, index)
        });
        let results = futures_util::future::join_all(uploads).await;

        let mut images = Vec::with_capacity(results.len());
        let mut warnings = Vec::new();
        for (image, warning) in results {
            images.push(image);
            warnings.extend(warning);
        }
        (images, warnings)
    }

    async fn materialize_asset(
        &self,
        url: &str,
        key: String,
        index: usize,
    ) -> (ImageData, Option<ImageWarning>) {
        let bytes = match self
            .cfg
            .http
            .get_bytes(url, &[], &self.cfg.transport_cfg)
            .await
        {
            Ok((bytes, _headers)) => bytes,
            Err(err) => {
                warn!(
                    target: "image_sdk::provider::kling",
                    index,
                    error = %err.sanitized_message(),
                    "asset download failed; returning provider url"
                );
                return (
                    ImageData::Url(url.to_string()),
                    Some(ImageWarning::Other {
                        message: format!(
                            "image {index} could not be downloaded for persistence; returning the provider url"
                        ),
                    }),
                );
            }
        };

        match self
            .cfg
            .store
            .put(&key, bytes.to_vec(), "image/png", "inline")
            .await
        {
            Ok(public_url) => (ImageData::Url(public_url), None),
            Err(err) => {
                warn!(
                    target: "image_sdk::provider::kling",
                    index,
                    key = %key,
                    error = %err,
                    "asset upload failed; returning provider url"
                );
                (
                    ImageData::Url(url.to_string()),
                    Some(ImageWarning::Other {
                        message: format!(
                            "image {index} could not be uploaded to storage; returning the provider url"
                        ),
                    }),
                )
            }
        }
    }
}

#[async_trait::async_trait]
impl<T: HttpTransport + Send + Sync> ImageModel for KlingImageModel<T> {
    fn provider_name(&self) -> &'static str {
        "kling"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn max_images_per_call(&self) -> Option<usize> {
        Some(9)
    }

    async fn do_generate(&self, options: ImageOptions) -> Result<ImageResponse, SdkError> {
        let mut warnings = self.warnings_for_options(&options);
        let aspect_ratio = Self::resolve_aspect_ratio(&options);
        let body = self.build_generation_body(&options, &aspect_ratio)?;

        let task_id = self.submit(&body, &options.headers).await?;
        let outcome = self.await_completion(&task_id, &options.headers).await?;
        let (images, asset_warnings) = self.materialize(outcome.image_urls).await;
        warnings.extend(asset_warnings);

        let mut provider_metadata = ct::ProviderMetadata::new();
        provider_metadata.insert(
            "kling".into(),
            HashMap::from([("taskId".into(), json!(task_id))]),
        );

        Ok(ImageResponse {
            images,
            warnings,
            provider_metadata: Some(provider_metadata),
            response: ImageResponseMeta {
                timestamp: SystemTime::now(),
                model_id: self.model_id.clone(),
                headers: Self::headers_vec_to_map(outcome.response_headers),
            },
            response_body: Some(outcome.response_body),
            request_body: Some(body),
        })
    }
}

/// Tri-state decode of the wire status, isolated so wire-format drift stays a
/// one-line fix. The service spells terminal success "succeed"; "succeeded"
/// is accepted as well. Anything non-terminal counts as pending.
fn parse_task_state(body: &JsonValue) -> Result<TaskState, SdkError> {
    let parsed: KlingTaskEnvelope =
        serde_json::from_value(body.clone()).map_err(SdkError::Serde)?;
    let Some(data) = parsed.data else {
        return Ok(TaskState::Pending);
    };
    match data.task_status.as_deref() {
        Some("succeed") | Some("succeeded") => {
            let result = data.task_result.ok_or_else(|| SdkError::Protocol {
                message: "succeeded task is missing task_result".into(),
            })?;
            let urls = result
                .images
                .into_iter()
                .filter_map(|image| image.url)
                .collect();
            Ok(TaskState::Succeeded(urls))
        }
        Some("failed") => Ok(TaskState::Failed(data.task_status_msg.unwrap_or_else(
            || "generation failed without a status message".into(),
        ))),
        _ => Ok(TaskState::Pending),
    }
}

#[derive(Debug, Deserialize)]
struct KlingTaskEnvelope {
    #[serde(default)]
    data: Option<KlingTaskData>,
}

#[derive(Debug, Deserialize)]
struct KlingTaskData {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    task_status: Option<String>,
    #[serde(default)]
    task_status_msg: Option<String>,
    #[serde(default)]
    task_result: Option<KlingTaskResult>,
}

#[derive(Debug, Deserialize)]
struct KlingTaskResult {
    #[serde(default)]
    images: Vec<KlingTaskImage>,
}

#[derive(Debug, Deserialize)]
struct KlingTaskImage {
    #[serde(default)]
    url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{parse_task_state, TaskState};
    use crate::sdk_core::SdkError;
    use serde_json::json;

    #[test]
    fn wire_literal_succeed_is_terminal_success() {
        let state = parse_task_state(&json!({
            "data": {
                "task_id": "t1",
                "task_status": "succeed",
                "task_result": {"images": [{"url": "https://cdn.kling.test/a.png"}]}
            }
        }))
        .expect("state");
        match state {
            TaskState::Succeeded(urls) => {
                assert_eq!(urls, vec!["https://cdn.kling.test/a.png".to_string()])
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn failed_status_carries_the_remote_message() {
        let state = parse_task_state(&json!({
            "data": {"task_status": "failed", "task_status_msg": "quota exceeded"}
        }))
        .expect("state");
        match state {
            TaskState::Failed(message) => assert_eq!(message, "quota exceeded"),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn unknown_statuses_count_as_pending() {
        for body in [
            json!({"data": {"task_status": "submitted"}}),
            json!({"data": {"task_status": "processing"}}),
            json!({"data": {}}),
            json!({}),
        ] {
            assert!(matches!(
                parse_task_state(&body).expect("state"),
                TaskState::Pending
            ));
        }
    }

    #[test]
    fn succeeded_without_result_is_a_protocol_error() {
        let err = parse_task_state(&json!({"data": {"task_status": "succeed"}}))
            .expect_err("missing task_result must not parse");
        assert!(matches!(err, SdkError::Protocol { .. }));
    }
}
