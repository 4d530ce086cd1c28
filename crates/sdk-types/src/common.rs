use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Provider-specific input options passed through to providers.
/// Outer key is the provider id; inner keys are provider-defined option names.
pub type ProviderOptions = HashMap<String, HashMap<String, JsonValue>>;

/// Provider-specific output metadata passed through from providers.
/// Outer key is the provider id; inner keys are provider-defined metadata keys.
pub type ProviderMetadata = HashMap<String, HashMap<String, JsonValue>>;

/// HTTP headers map for response metadata.
pub type Headers = HashMap<String, String>;

pub(crate) fn headers_is_empty(map: &HashMap<String, String>) -> bool {
    map.is_empty()
}

pub(crate) fn provider_options_is_empty(map: &ProviderOptions) -> bool {
    map.is_empty()
}
