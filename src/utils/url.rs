//! Endpoint URL construction.

/// Join a base URL and an endpoint path with exactly one slash between them.
///
/// ```
/// use sensai::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:30000/v1/", "/chat/completions"),
///     "http://localhost:30000/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_without_doubled_slashes() {
        for (base, endpoint) in [
            ("http://34.28.28.107:30000/v1", "chat/completions"),
            ("http://34.28.28.107:30000/v1/", "chat/completions"),
            ("http://34.28.28.107:30000/v1///", "/chat/completions"),
            ("http://34.28.28.107:30000/v1", "///chat/completions"),
        ] {
            assert_eq!(
                construct_api_url(base, endpoint),
                "http://34.28.28.107:30000/v1/chat/completions"
            );
        }
    }

    #[test]
    fn bare_host_gets_a_single_separator() {
        assert_eq!(
            construct_api_url("http://localhost:8080", "chat/completions"),
            "http://localhost:8080/chat/completions"
        );
    }
}
