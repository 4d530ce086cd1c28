use crate::sdk_core::error::{display_body_for_error, TransportError};
use crate::sdk_core::transport::{
    emit_transport_event, HttpTransport, TransportBody, TransportConfig, TransportEvent,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde_json::Value;
use std::error::Error as StdError;
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    fn configure_builder(
        mut builder: reqwest::ClientBuilder,
        cfg: &TransportConfig,
    ) -> reqwest::ClientBuilder {
        builder = builder
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive_interval(Duration::from_secs(30));
        if let Some(req_timeout) = cfg.request_timeout {
            builder = builder.timeout(req_timeout);
        }
        // connect timeout
        builder.connect_timeout(cfg.connect_timeout)
    }

    fn try_new_with_builder(
        cfg: &TransportConfig,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self, TransportError> {
        let builder = Self::configure_builder(builder, cfg);
        let client = builder.build().map_err(|err| {
            TransportError::Other(format!(
                "reqwest client build failed: {}",
                format_reqwest_error_chain(&err)
            ))
        })?;
        Ok(Self { client })
    }

    fn new_with_builder(cfg: &TransportConfig, builder: reqwest::ClientBuilder) -> Self {
        // Keep compatibility with existing call sites while removing panics.
        match Self::try_new_with_builder(cfg, builder) {
            Ok(transport) => transport,
            Err(err) => {
                debug!(
                    target: "image_sdk::transport::reqwest",
                    error = %err,
                    "falling back to reqwest::Client::new after transport init failure"
                );
                Self {
                    client: Client::new(),
                }
            }
        }
    }

    pub fn try_new(cfg: &TransportConfig) -> Result<Self, TransportError> {
        Self::try_new_with_builder(cfg, Client::builder())
    }

    pub fn new(cfg: &TransportConfig) -> Self {
        Self::new_with_builder(cfg, Client::builder())
    }

    async fn execute_json(
        &self,
        req: reqwest::RequestBuilder,
        fallback_method: &str,
        url: &str,
        headers: &[(String, String)],
        request_body: Option<TransportBody>,
        cfg: &TransportConfig,
    ) -> Result<(Value, Vec<(String, String)>), TransportError> {
        let started_at = SystemTime::now();
        let start_instant = Instant::now();
        let request_snapshot = req.try_clone().and_then(|r| r.build().ok());
        let (method, request_url, request_headers) = if let Some(req) = request_snapshot.as_ref() {
            (
                req.method().to_string(),
                req.url().to_string(),
                header_pairs(req.headers()),
            )
        } else {
            (fallback_method.to_string(), url.to_string(), headers.to_vec())
        };

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                let detail = format_reqwest_error_chain(&e);
                debug!(target: "image_sdk::transport::reqwest", %detail, "reqwest send failed");
                emit_transport_event(TransportEvent {
                    started_at,
                    latency: Some(start_instant.elapsed()),
                    method,
                    url: request_url,
                    status: None,
                    request_headers,
                    response_headers: Vec::new(),
                    request_body,
                    response_body: None,
                    response_size: None,
                    error: Some(detail.clone()),
                });
                return Err(if e.is_connect() {
                    TransportError::Network(format!("connect: {detail}"))
                } else if e.is_timeout() {
                    TransportError::ConnectTimeout(cfg.connect_timeout)
                } else {
                    TransportError::Network(detail)
                });
            }
        };

        let status = resp.status();
        let res_headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect::<Vec<_>>();

        if !status.is_success() {
            let retry_after_ms = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|h| h.to_str().ok())
                .and_then(parse_retry_after_ms);
            let body_text = resp.text().await.unwrap_or_default();
            let sanitized = display_body_for_error(&body_text);
            emit_transport_event(TransportEvent {
                started_at,
                latency: Some(start_instant.elapsed()),
                method,
                url: request_url,
                status: Some(status.as_u16()),
                request_headers,
                response_headers: res_headers.clone(),
                request_body,
                response_body: Some(TransportBody::Text(body_text.clone())),
                response_size: Some(body_text.len()),
                error: Some(format!("HTTP {}: {}", status.as_u16(), sanitized)),
            });
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: body_text,
                retry_after_ms,
                sanitized,
                headers: res_headers,
            });
        }

        // Success: parse JSON
        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::BodyRead(e.to_string()))?;
        let json: Value = serde_json::from_str(&text)
            .map_err(|_| TransportError::BodyRead("invalid json".into()))?;
        emit_transport_event(TransportEvent {
            started_at,
            latency: Some(start_instant.elapsed()),
            method,
            url: request_url,
            status: Some(status.as_u16()),
            request_headers,
            response_headers: res_headers.clone(),
            request_body,
            response_body: Some(TransportBody::Json(json.clone())),
            response_size: Some(text.len()),
            error: None,
        });
        Ok((json, res_headers))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        cfg: &TransportConfig,
    ) -> Result<(Value, Vec<(String, String)>), TransportError> {
        // Clean body by stripping null fields if configured
        let cleaned_body: Value = if cfg.strip_null_fields {
            crate::sdk_core::json::without_null_fields(body)
        } else {
            body.clone()
        };
        let mut req = self.client.post(url).json(&cleaned_body);
        for (k, v) in headers {
            if !k.eq_ignore_ascii_case("content-type") {
                req = req.header(k, v);
            }
        }
        let request_body = Some(TransportBody::Json(cleaned_body));
        self.execute_json(req, "POST", url, headers, request_body, cfg)
            .await
    }

    async fn get_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        cfg: &TransportConfig,
    ) -> Result<(Value, Vec<(String, String)>), TransportError> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        self.execute_json(req, "GET", url, headers, None, cfg).await
    }

    async fn get_bytes(
        &self,
        url: &str,
        headers: &[(String, String)],
        cfg: &TransportConfig,
    ) -> Result<(Bytes, Vec<(String, String)>), TransportError> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let started_at = SystemTime::now();
        let start_instant = Instant::now();
        let request_snapshot = req.try_clone().and_then(|r| r.build().ok());
        let (method, request_url, request_headers) = if let Some(req) = request_snapshot.as_ref() {
            (
                req.method().to_string(),
                req.url().to_string(),
                header_pairs(req.headers()),
            )
        } else {
            ("GET".to_string(), url.to_string(), headers.to_vec())
        };

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                let detail = format_reqwest_error_chain(&e);
                debug!(target: "image_sdk::transport::reqwest", %detail, "reqwest send failed");
                emit_transport_event(TransportEvent {
                    started_at,
                    latency: Some(start_instant.elapsed()),
                    method,
                    url: request_url,
                    status: None,
                    request_headers,
                    response_headers: Vec::new(),
                    request_body: None,
                    response_body: None,
                    response_size: None,
                    error: Some(detail.clone()),
                });
                return Err(if e.is_connect() {
                    TransportError::Network(format!("connect: {detail}"))
                } else if e.is_timeout() {
                    TransportError::ConnectTimeout(cfg.connect_timeout)
                } else {
                    TransportError::Network(detail)
                });
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let retry_after_ms = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|h| h.to_str().ok())
                .and_then(parse_retry_after_ms);
            let res_headers = resp
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
                .collect::<Vec<_>>();
            let body_text = resp.text().await.unwrap_or_default();
            let sanitized = display_body_for_error(&body_text);
            emit_transport_event(TransportEvent {
                started_at,
                latency: Some(start_instant.elapsed()),
                method,
                url: request_url,
                status: Some(status.as_u16()),
                request_headers,
                response_headers: res_headers.clone(),
                request_body: None,
                response_body: Some(TransportBody::Text(body_text.clone())),
                response_size: Some(body_text.len()),
                error: Some(format!("HTTP {}: {}", status.as_u16(), sanitized)),
            });
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: body_text,
                retry_after_ms,
                sanitized,
                headers: res_headers,
            });
        }

        let res_headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect::<Vec<_>>();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::BodyRead(e.to_string()))?;

        emit_transport_event(TransportEvent {
            started_at,
            latency: Some(start_instant.elapsed()),
            method,
            url: request_url,
            status: Some(status.as_u16()),
            request_headers,
            response_headers: res_headers.clone(),
            request_body: None,
            response_body: None,
            response_size: Some(bytes.len()),
            error: None,
        });

        Ok((bytes, res_headers))
    }
}

fn header_pairs(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

fn parse_retry_after_ms(s: &str) -> Option<u64> {
    // RFC 7231: either delta-seconds or HTTP date; support simple delta only
    if let Ok(secs) = s.trim().parse::<u64>() {
        return Some(secs * 1000);
    }
    None
}

fn format_reqwest_error_chain(err: &reqwest::Error) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(src) = current {
        out.push_str(": ");
        out.push_str(&src.to_string());
        current = src.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_new_returns_transport_error_when_client_build_fails() {
        let cfg = TransportConfig::default();
        let err = match ReqwestTransport::try_new_with_builder(
            &cfg,
            Client::builder().user_agent("bad\nagent"),
        ) {
            Ok(_) => panic!("invalid user-agent should fail reqwest client build"),
            Err(err) => err,
        };
        match err {
            TransportError::Other(message) => {
                assert!(
                    message.contains("reqwest client build failed"),
                    "unexpected message: {message}"
                );
            }
            other => panic!("unexpected transport error variant: {other:?}"),
        }
    }

    #[test]
    fn new_with_builder_does_not_panic_when_client_build_fails() {
        let cfg = TransportConfig::default();
        let _transport =
            ReqwestTransport::new_with_builder(&cfg, Client::builder().user_agent("bad\nagent"));
    }

    #[test]
    fn retry_after_parses_delta_seconds_only() {
        assert_eq!(parse_retry_after_ms("2"), Some(2000));
        assert_eq!(parse_retry_after_ms(" 10 "), Some(10000));
        assert_eq!(parse_retry_after_ms("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
