// Server paths and URL helpers shared by the browser and terminal clients.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub const SUBMIT_PATH: &str = "/procesar_todas_galerias";
pub const STATUS_PATH_PREFIX: &str = "/api/logs/";
pub const RESULTS_PATH: &str = "/resultados";
pub const CSRF_HEADER: &str = "X-CSRFToken";

// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Status endpoint for `thread_id`.
pub fn status_path(thread_id: &str) -> String {
    format!("{STATUS_PATH_PREFIX}{}", encode_component(thread_id))
}

/// `base` with `run_id` appended as a query parameter, respecting an existing
/// query string. An empty run id leaves `base` unchanged.
pub fn results_url(base: &str, run_id: &str) -> String {
    if run_id.is_empty() {
        return base.to_string();
    }
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}run_id={}", encode_component(run_id))
}

/// Join a server origin and an absolute path without doubling the slash.
pub fn join(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_url_appends_run_id() {
        assert_eq!(results_url("/resultados", "42"), "/resultados?run_id=42");
        assert_eq!(
            results_url("/resultados?tab=1", "42"),
            "/resultados?tab=1&run_id=42"
        );
        assert_eq!(results_url("/resultados", ""), "/resultados");
    }

    #[test]
    fn encoding_matches_uri_component_rules() {
        assert_eq!(encode_component("a b/c?d"), "a%20b%2Fc%3Fd");
        assert_eq!(encode_component("1697040000.123"), "1697040000.123");
        assert_eq!(encode_component("x-y_z!~*'()"), "x-y_z!~*'()");
        assert_eq!(encode_component("ñ"), "%C3%B1");
    }

    #[test]
    fn status_path_encodes_thread_id() {
        assert_eq!(status_path("abc"), "/api/logs/abc");
        assert_eq!(status_path("a/b"), "/api/logs/a%2Fb");
    }

    #[test]
    fn join_handles_trailing_slash() {
        assert_eq!(join("http://host:5000/", "/api"), "http://host:5000/api");
        assert_eq!(join("http://host:5000", "api"), "http://host:5000/api");
    }
}
