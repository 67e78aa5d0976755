use crate::error::ProviderError;
use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;

/// Markers after which a credential-looking token may appear in upstream
/// error bodies.
const MARKERS: [&str; 6] = [
    "sk-",
    "Authorization: Bearer ",
    "authorization: bearer ",
    "api_key=",
    "access_token=",
    "\"api_key\":\"",
];

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=')
}

/// Redact credential-looking tokens from provider error strings before they
/// reach logs.
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    if !MARKERS.iter().any(|m| input.contains(m)) {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for marker in MARKERS {
        let mut from = 0;
        while let Some(rel) = scrubbed[from..].find(marker) {
            let start = from + rel;
            let token_start = start + marker.len();
            let token_len = scrubbed[token_start..]
                .chars()
                .take_while(|c| is_token_char(*c))
                .map(char::len_utf8)
                .sum::<usize>();
            if token_len == 0 {
                from = token_start;
                continue;
            }
            scrubbed.replace_range(start..token_start + token_len, "[REDACTED]");
            from = start + "[REDACTED]".len();
        }
    }
    Cow::Owned(scrubbed)
}

/// Scrub secrets and bound the length of upstream error text.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);
    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed.into_owned();
    }

    let scrubbed = scrubbed.as_ref();
    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    ProviderError::Upstream {
        provider: provider.to_string(),
        status: status.to_string(),
        body: sanitize_api_error(&body),
    }
}
