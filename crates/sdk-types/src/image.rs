use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::common::{headers_is_empty, provider_options_is_empty, ProviderOptions};

/// One generated image. Async job providers return assets by URL; providers
/// that inline the payload use the bytes form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ImageData {
    Url(String),
    Bytes {
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
}

impl ImageData {
    /// Returns the URL if this image is URL-addressed.
    pub fn as_url(&self) -> Option<&str> {
        match self {
            ImageData::Url(url) => Some(url),
            ImageData::Bytes { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageWarning {
    Unsupported {
        feature: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Other {
        message: String,
    },
}

fn default_image_count() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default = "default_image_count")]
    pub n: u32,
    /// Requested pixel size as "WIDTHxHEIGHT", e.g. "1920x1080".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "aspectRatio"
    )]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "headers_is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(
        default,
        skip_serializing_if = "provider_options_is_empty",
        rename = "providerOptions"
    )]
    pub provider_options: ProviderOptions,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            prompt: None,
            n: default_image_count(),
            size: None,
            aspect_ratio: None,
            seed: None,
            headers: HashMap::new(),
            provider_options: ProviderOptions::new(),
        }
    }
}

impl ImageOptions {
    pub fn new(prompt: Option<String>) -> Self {
        Self {
            prompt,
            ..Default::default()
        }
    }
}
