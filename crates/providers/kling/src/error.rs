use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::sdk_core::error::{
    map_http_status_to_rate_limited_error, map_http_status_to_upstream_error, SdkError,
    TransportError,
};

/// Error body shape returned by the Kling API on non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KlingErrorData {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Attempt to parse a Kling JSON error body and map to an SdkError.
pub fn map_transport_error_to_sdk_error(te: TransportError) -> SdkError {
    match te {
        TransportError::HttpStatus {
            status,
            body,
            retry_after_ms,
            headers,
            ..
        } => {
            // Unauthorized and rate limit have special mapping
            if status == 401 {
                return SdkError::Unauthorized;
            }
            if status == 429 {
                return map_http_status_to_rate_limited_error(
                    status,
                    body,
                    retry_after_ms,
                    headers,
                );
            }

            // Try to parse body to extract message
            let message = serde_json::from_str::<JsonValue>(&body)
                .ok()
                .and_then(|v| serde_json::from_value::<KlingErrorData>(v).ok())
                .map(|err| err.message);
            map_http_status_to_upstream_error(status, body, retry_after_ms, headers, message)
        }
        other => SdkError::Transport(other),
    }
}

#[cfg(test)]
mod tests {
    use super::map_transport_error_to_sdk_error;
    use crate::sdk_core::error::{build_http_status_transport_error, SdkError, TransportError};

    #[test]
    fn parses_kling_error_message_from_body() {
        let te = build_http_status_transport_error(
            400,
            "{\"code\":1201,\"message\":\"prompt too long\",\"request_id\":\"req-1\"}".into(),
            None,
            Vec::new(),
        );
        match map_transport_error_to_sdk_error(te) {
            SdkError::Upstream {
                status, message, ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "prompt too long");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn unparseable_body_falls_back_to_status_message() {
        let te = build_http_status_transport_error(
            502,
            "<html>bad gateway</html>".into(),
            None,
            Vec::new(),
        );
        match map_transport_error_to_sdk_error(te) {
            SdkError::Upstream { message, .. } => assert_eq!(message, "http status 502"),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn auth_and_rate_limit_statuses_map_to_typed_variants() {
        let unauthorized = build_http_status_transport_error(401, String::new(), None, Vec::new());
        assert!(matches!(
            map_transport_error_to_sdk_error(unauthorized),
            SdkError::Unauthorized
        ));

        let limited = build_http_status_transport_error(429, String::new(), Some(1200), Vec::new());
        match map_transport_error_to_sdk_error(limited) {
            SdkError::RateLimited { retry_after_ms, .. } => {
                assert_eq!(retry_after_ms, Some(1200))
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn non_http_errors_stay_transport_errors() {
        let mapped = map_transport_error_to_sdk_error(TransportError::Network("reset".into()));
        assert!(matches!(mapped, SdkError::Transport(_)));
    }
}
