//! Joins a configured host with an endpoint URL.
//!
//! The rules, first match wins:
//! 1. an endpoint URL with its own host replaces the base entirely, a
//!    scheme-relative `//host/path` taking the base's scheme;
//! 2. when both sides carry a path, the paths are concatenated with exactly
//!    one `/` between them and attached to the base's scheme and authority;
//! 3. anything else follows ordinary RFC 3986 reference resolution.

use url::Url;

/// Compose `custom` onto `base`.
///
/// Never fails: inputs that cannot be parsed as URLs are joined as plain
/// path strings.
pub fn compose(base: &str, custom: &str) -> String {
    if custom.is_empty() {
        return base.to_string();
    }
    if base.is_empty() || has_host(custom) {
        return custom.to_string();
    }

    let Ok(base_url) = Url::parse(base) else {
        return if is_network_path(custom) {
            custom.to_string()
        } else {
            join_plain(base, custom)
        };
    };
    if is_network_path(custom) {
        return base_url
            .join(custom)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| custom.to_string());
    }

    let (custom_path, custom_tail) = split_path(custom);
    let base_path = trim_slashes(base_url.path());
    let custom_path = trim_slashes(custom_path);

    if !base_path.is_empty() && !custom_path.is_empty() {
        let mut joined = base_url.clone();
        joined.set_path(&format!("/{base_path}/{custom_path}"));
        joined.set_query(None);
        joined.set_fragment(None);
        return format!("{joined}{custom_tail}");
    }

    match base_url.join(custom) {
        Ok(url) => url.to_string(),
        Err(_) => join_plain(base, custom),
    }
}

/// A scheme-relative reference such as `//cdn.example.com/x` names its own
/// host even though it does not parse as an absolute URL.
fn is_network_path(candidate: &str) -> bool {
    candidate.starts_with("//")
}

fn has_host(candidate: &str) -> bool {
    Url::parse(candidate).map(|url| url.has_host()).unwrap_or(false)
}

/// Split a relative reference into its path and the `?query#fragment` tail.
fn split_path(reference: &str) -> (&str, &str) {
    match reference.find(['?', '#']) {
        Some(index) => reference.split_at(index),
        None => (reference, ""),
    }
}

fn trim_slashes(path: &str) -> &str {
    path.trim_matches('/')
}

fn join_plain(base: &str, custom: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), custom.trim_start_matches('/'))
}
