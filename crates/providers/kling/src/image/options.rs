use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::sdk_types::common as ct;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KlingImageProviderOptions {
    pub negative_prompt: Option<String>,
}

/// Parse providerOptions for the "kling" scope only.
/// Returns typed options and a map of extra keys not covered by typed fields.
pub fn parse_kling_image_provider_options(
    provider_options: &ct::ProviderOptions,
) -> (
    KlingImageProviderOptions,
    Option<JsonMap<String, JsonValue>>,
) {
    let Some(map) = provider_options.get("kling") else {
        return (KlingImageProviderOptions::default(), None);
    };

    let negative_prompt = map
        .get("negativePrompt")
        .and_then(|v| v.as_str())
        .map(|value| value.to_string());

    let mut extras = JsonMap::new();
    for (k, v) in map.iter() {
        if k == "negativePrompt" {
            continue;
        }
        extras.insert(k.clone(), v.clone());
    }

    let extras = if extras.is_empty() {
        None
    } else {
        Some(extras)
    };

    (KlingImageProviderOptions { negative_prompt }, extras)
}

#[cfg(test)]
mod tests {
    use super::parse_kling_image_provider_options;
    use crate::sdk_types::common::ProviderOptions;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn splits_typed_options_from_extras() {
        let mut provider_options = ProviderOptions::new();
        provider_options.insert(
            "kling".into(),
            HashMap::from([
                ("negativePrompt".into(), json!("blurry, low quality")),
                ("cfg_scale".into(), json!(0.6)),
            ]),
        );

        let (typed, extras) = parse_kling_image_provider_options(&provider_options);
        assert_eq!(typed.negative_prompt.as_deref(), Some("blurry, low quality"));
        let extras = extras.expect("extras");
        assert_eq!(extras.get("cfg_scale"), Some(&json!(0.6)));
        assert!(!extras.contains_key("negativePrompt"));
    }

    #[test]
    fn other_scopes_are_ignored() {
        let mut provider_options = ProviderOptions::new();
        provider_options.insert(
            "openai".into(),
            HashMap::from([("user".into(), json!("someone"))]),
        );

        let (typed, extras) = parse_kling_image_provider_options(&provider_options);
        assert!(typed.negative_prompt.is_none());
        assert!(extras.is_none());
    }
}
