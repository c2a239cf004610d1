//! Log Redaction Layer
//!
//! Push endpoints are bearer capabilities: anyone holding the URL can push
//! to that browser. Logs only ever see a shortened form, and key material in
//! subscription JSON or VAPID headers is scrubbed.

use regex::Regex;
use std::sync::LazyLock;

static KEY_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(p256dh|auth|privateKey|private_key)"\s*:\s*"[^"]*""#).unwrap()
});
static VAPID_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"vapid\s+t=[A-Za-z0-9\-_\.]+(,\s*k=[A-Za-z0-9\-_]+)?").unwrap());

/// Number of characters of the endpoint token kept in logs.
const TOKEN_PREFIX_LEN: usize = 8;

/// Shorten a push endpoint to `scheme://host/<token prefix>…`.
pub fn redact_endpoint(endpoint: &str) -> String {
    let Some(scheme_end) = endpoint.find("://") else {
        return shorten(endpoint);
    };
    let after_scheme = &endpoint[scheme_end + 3..];
    match after_scheme.find('/') {
        Some(slash) => {
            let origin = &endpoint[..scheme_end + 3 + slash];
            let token = after_scheme[slash + 1..].rsplit('/').next().unwrap_or_default();
            format!("{origin}/{}", shorten(token))
        }
        None => endpoint.to_string(),
    }
}

fn shorten(token: &str) -> String {
    if token.chars().count() <= TOKEN_PREFIX_LEN {
        token.to_string()
    } else {
        let prefix: String = token.chars().take(TOKEN_PREFIX_LEN).collect();
        format!("{prefix}…")
    }
}

/// Redacts key material in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = KEY_FIELD_RE.replace_all(input, r#""$1":"[REDACTED]""#);
    VAPID_HEADER_RE
        .replace_all(&redacted, "vapid [REDACTED_TOKEN]")
        .to_string()
}
