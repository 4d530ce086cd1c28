/// Returns true if a header key is reserved for internal SDK use.
///
/// Internal headers carry SDK plumbing between layers and must never be
/// forwarded to a provider endpoint.
pub fn is_internal_sdk_header(key: &str) -> bool {
    key.to_ascii_lowercase().starts_with("x-image-sdk-")
}

#[cfg(test)]
mod tests {
    use super::is_internal_sdk_header;

    #[test]
    fn internal_prefix_is_case_insensitive() {
        assert!(is_internal_sdk_header("X-Image-SDK-Options"));
        assert!(is_internal_sdk_header("x-image-sdk-trace"));
        assert!(!is_internal_sdk_header("authorization"));
    }
}
